use std::sync::Arc;

use axum::{routing::get, Json, Router};
use serde_json::{json, Value};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::auth::SESSION_COOKIE;
use crate::models;
use crate::routes;

#[derive(OpenApi)]
#[openapi(
	paths(
		routes::auth::sign_up,
		routes::auth::sign_in,
		routes::auth::sign_out,
		routes::auth::refresh,
		routes::auth::current_session,
		routes::pages::home,
		routes::pages::sign_in,
		routes::pages::sign_up,
		routes::pages::student_dashboard,
		routes::pages::instructor_dashboard,
		routes::pages::admin_dashboard,
		routes::health::health
	),
	components(
		schemas(
			crate::auth::Role,
			models::user::User,
			models::user::AuthResponse,
			models::user::SignInRequest,
			models::user::SignUpRequest,
			models::user::SessionView,
			models::user::SessionUser,
			models::user::UserMetadata,
			models::page::Page,
			models::page::PageNotice,
			models::page::Viewer,
			routes::auth::MessageResponse,
			routes::health::HealthResponse
		)
	),
	tags(
		(name = "Auth", description = "Session provider endpoints"),
		(name = "Pages", description = "Guarded and public pages"),
		(name = "Health", description = "Liveness and database probe")
	)
)]
pub struct ApiDoc;

pub fn build_openapi(port: u16) -> anyhow::Result<utoipa::openapi::OpenApi> {
	let mut doc = serde_json::to_value(ApiDoc::openapi())?;

	ensure_security_components(&mut doc);
	ensure_servers(&mut doc, port);

	Ok(serde_json::from_value(doc)?)
}

pub fn swagger_routes(doc: utoipa::openapi::OpenApi) -> anyhow::Result<Router> {
	let swagger_config = utoipa_swagger_ui::Config::new(["/api-docs/openapi.json"])
		.try_it_out_enabled(true)
		.with_credentials(true)
		.persist_authorization(true);

	let doc_json = Arc::new(serde_json::to_value(&doc)?);

	let json_route = {
		let doc_json = Arc::clone(&doc_json);
		get(move || {
			let doc_json = Arc::clone(&doc_json);
			async move { Json((*doc_json).clone()) }
		})
	};

	Ok(Router::new()
		.route("/api-docs/openapi.json", json_route)
		.merge(SwaggerUi::new("/docs").config(swagger_config)))
}

fn ensure_security_components(doc: &mut Value) {
	let Some(root) = doc.as_object_mut() else {
		return;
	};

	let components = root.entry("components").or_insert_with(|| json!({}));
	if let Some(components) = components.as_object_mut() {
		let schemes = components.entry("securitySchemes").or_insert_with(|| json!({}));
		if let Some(schemes) = schemes.as_object_mut() {
			schemes.insert(
				"sessionCookie".to_string(),
				json!({"type": "apiKey", "in": "cookie", "name": SESSION_COOKIE}),
			);
			schemes.insert(
				"bearerAuth".to_string(),
				json!({"type": "http", "scheme": "bearer", "bearerFormat": "JWT"}),
			);
		}
	}

	root.entry("security")
		.or_insert_with(|| json!([{"sessionCookie": []}, {"bearerAuth": []}]));
}

fn ensure_servers(doc: &mut Value, port: u16) {
	if let Some(root) = doc.as_object_mut() {
		root.insert(
			"servers".to_string(),
			json!([{"url": format!("http://localhost:{port}"), "description": "local"}]),
		);
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn openapi_lists_auth_and_dashboard_paths() {
		let doc = build_openapi(8000).unwrap();
		let value = serde_json::to_value(&doc).unwrap();
		let paths = value["paths"].as_object().unwrap();
		for path in ["/api/auth/signin", "/api/auth/session", "/dashboard2/admin", "/api/health"] {
			assert!(paths.contains_key(path), "missing {path}");
		}
		assert_eq!(
			value["components"]["securitySchemes"]["sessionCookie"]["name"],
			json!(SESSION_COOKIE)
		);
		assert_eq!(value["servers"][0]["url"], json!("http://localhost:8000"));
	}
}
