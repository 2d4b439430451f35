use axum::extract::{Request, State};
use axum::http::{header, HeaderValue};
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};

use super::policy::Decision;
use super::session::{session_cookie, Session, SESSION_COOKIE};
use crate::app::AppState;
use crate::db::users;

const EXCLUDED_PREFIXES: [&str; 4] = ["/static/", "/_image", "/favicon.ico", "/api/auth/callback"];
const EXCLUDED_EXTENSIONS: [&str; 6] = ["svg", "png", "jpg", "jpeg", "gif", "webp"];

/// Static assets and the auth callback are never guarded.
pub fn is_excluded(path: &str) -> bool {
    if EXCLUDED_PREFIXES.iter().any(|prefix| path.starts_with(prefix)) {
        return true;
    }

    path.rsplit_once('.')
        .map(|(_, ext)| EXCLUDED_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Applies the access policy to every guarded request.
pub async fn route_guard(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let path = request.uri().path().to_string();
    if is_excluded(&path) {
        return next.run(request).await;
    }

    let session = state.sessions.resolve(request.headers());
    let role = match &session {
        Some(session) => state.roles.resolve_role(Some(session)).await,
        None => None,
    };

    let decision = state.policy.decide(&path, role, session.is_some());

    let Some(location) = decision.location() else {
        let mut response = next.run(request).await;
        if let Some(session) = session.filter(|s| state.sessions.needs_refresh(s)) {
            attach_refreshed_cookie(&state, &session, &mut response).await;
        }
        return response;
    };

    match &decision {
        Decision::RedirectSignIn { .. } => {
            tracing::debug!(path = %path, "unauthenticated request to protected route");
        }
        Decision::RedirectRoleHome { reason, target, .. } => {
            tracing::info!(
                path = %path,
                role = ?role,
                reason = reason.as_str(),
                target = %target,
                "route access denied"
            );
        }
        Decision::Allow => {}
    }

    Redirect::temporary(&location).into_response()
}

async fn attach_refreshed_cookie(state: &AppState, session: &Session, response: &mut Response) {
    let prefix = format!("{SESSION_COOKIE}=");
    let handler_set_cookie = response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .any(|value| value.to_str().map(|v| v.starts_with(&prefix)).unwrap_or(false));
    if handler_set_cookie {
        return;
    }

    // The claim in the old token may have been revoked since it was issued.
    let role_claim = match users::find_by_id(&state.pool, session.user.id).await {
        Ok(Some(user)) => user.role_claim,
        Ok(None) => {
            tracing::warn!(user_id = %session.user.id, "session refresh skipped, account no longer exists");
            return;
        }
        Err(err) => {
            tracing::warn!(user_id = %session.user.id, error = %err, "session refresh skipped, account lookup failed");
            return;
        }
    };

    let refreshed = match state.sessions.refresh(session, role_claim.as_deref()) {
        Ok(refreshed) => refreshed,
        Err(err) => {
            tracing::warn!(user_id = %session.user.id, error = %err, "session refresh failed");
            return;
        }
    };

    match HeaderValue::from_str(&session_cookie(&refreshed).to_string()) {
        Ok(value) => {
            tracing::debug!(user_id = %session.user.id, "session refreshed");
            response.headers_mut().append(header::SET_COOKIE, value);
        }
        Err(err) => tracing::warn!(error = %err, "refreshed session cookie is not a valid header"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_assets_are_excluded() {
        assert!(is_excluded("/static/app.js"));
        assert!(is_excluded("/_image/logo"));
        assert!(is_excluded("/favicon.ico"));
        assert!(is_excluded("/api/auth/callback"));
        assert!(is_excluded("/img/banner.PNG"));
        assert!(is_excluded("/dashboard/student/avatar.webp"));
    }

    #[test]
    fn pages_and_api_are_guarded() {
        assert!(!is_excluded("/"));
        assert!(!is_excluded("/dashboard/student"));
        assert!(!is_excluded("/api/auth/signin"));
        assert!(!is_excluded("/reports/summary.pdf"));
    }
}
