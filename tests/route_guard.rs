use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use axum::body::{self, Body};
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use serde_json::{json, Value};
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::SqlitePool;
use tempfile::{tempdir, TempDir};
use tower::util::ServiceExt;
use url::form_urlencoded;
use uuid::Uuid;

use academy_gate::auth::{ProfileStore, Role, SESSION_COOKIE, UNAUTHORIZED_MESSAGE};
use academy_gate::db::users;
use academy_gate::errors::{AppError, AppResult};
use academy_gate::jwt::JwtConfig;
use academy_gate::{build_router, AppState};

async fn test_pool(dir: &TempDir) -> Result<SqlitePool> {
    let opts = SqliteConnectOptions::new()
        .filename(dir.path().join("guard.db"))
        .create_if_missing(true);
    let pool = SqlitePool::connect_with(opts).await?;

    let migrator =
        sqlx::migrate::Migrator::new(std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations")).await?;
    migrator.run(&pool).await?;
    Ok(pool)
}

async fn send(app: &Router, method: &str, uri: &str, cookie: Option<&str>, body: Option<Value>) -> Result<Response> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    let req = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))?,
        None => builder.body(Body::empty())?,
    };
    Ok(app.clone().oneshot(req).await?)
}

/// `name=value` pair of the session cookie set by `resp`, if any.
fn session_cookie(resp: &Response) -> Option<String> {
    let prefix = format!("{SESSION_COOKIE}=");
    resp.headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with(&prefix))
        .and_then(|v| v.split(';').next())
        .map(str::to_string)
}

fn location(resp: &Response) -> Result<(String, Vec<(String, String)>)> {
    let raw = resp
        .headers()
        .get(header::LOCATION)
        .context("missing location header")?
        .to_str()?;
    let (path, query) = raw.split_once('?').unwrap_or((raw, ""));
    let pairs = form_urlencoded::parse(query.as_bytes()).into_owned().collect();
    Ok((path.to_string(), pairs))
}

async fn json_body(resp: Response) -> Result<Value> {
    let bytes = body::to_bytes(resp.into_body(), 1_048_576).await?;
    Ok(serde_json::from_slice(&bytes)?)
}

async fn sign_up(app: &Router, email: &str) -> Result<String> {
    let resp = send(
        app,
        "POST",
        "/api/auth/signup",
        None,
        Some(json!({"name": "테스트 사용자", "email": email, "password": "password123"})),
    )
    .await?;
    assert_eq!(resp.status(), StatusCode::CREATED);
    session_cookie(&resp).context("signup did not set a session cookie")
}

#[tokio::test]
async fn anonymous_requests_are_sent_to_sign_in() -> Result<()> {
    let dir = tempdir()?;
    let pool = test_pool(&dir).await?;
    let app = build_router(AppState::new(pool, JwtConfig::new("test-secret")));

    for path in ["/dashboard/student", "/dashboard/instructor", "/dashboard2/admin", "/dashboard2/admin/sales"] {
        let resp = send(&app, "GET", path, None, None).await?;
        assert_eq!(resp.status(), StatusCode::TEMPORARY_REDIRECT, "{path}");
        let (target, query) = location(&resp)?;
        assert_eq!(target, "/signin");
        assert_eq!(query, vec![("redirectedFrom".to_string(), path.to_string())]);
    }

    let resp = send(&app, "GET", "/", None, None).await?;
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = send(&app, "GET", "/signin?redirectedFrom=%2Fdashboard%2Fstudent", None, None).await?;
    assert_eq!(resp.status(), StatusCode::OK);
    let page = json_body(resp).await?;
    assert_eq!(page["page"], json!("signin"));
    assert_eq!(page["notice"]["redirectedFrom"], json!("/dashboard/student"));

    Ok(())
}

#[tokio::test]
async fn student_reaches_own_dashboard_only() -> Result<()> {
    let dir = tempdir()?;
    let pool = test_pool(&dir).await?;
    let app = build_router(AppState::new(pool, JwtConfig::new("test-secret")));
    let cookie = sign_up(&app, "student@academy.example").await?;

    let resp = send(&app, "GET", "/dashboard/student", Some(&cookie), None).await?;
    assert_eq!(resp.status(), StatusCode::OK);
    let page = json_body(resp).await?;
    assert_eq!(page["viewer"]["role"], json!("student"));

    let resp = send(&app, "GET", "/dashboard2/admin", Some(&cookie), None).await?;
    assert_eq!(resp.status(), StatusCode::TEMPORARY_REDIRECT);
    let (target, query) = location(&resp)?;
    assert_eq!(target, "/dashboard/student");
    assert_eq!(query[0], ("error".to_string(), "access_denied".to_string()));
    assert_eq!(query[1].0, "message");

    let resp = send(&app, "GET", "/dashboard/instructor", Some(&cookie), None).await?;
    let (target, query) = location(&resp)?;
    assert_eq!(target, "/dashboard/student");
    assert_eq!(query[0].1, "access_denied");

    // Sign-in page still renders with a live session.
    let resp = send(&app, "GET", "/signin", Some(&cookie), None).await?;
    assert_eq!(resp.status(), StatusCode::OK);

    Ok(())
}

#[tokio::test]
async fn profile_role_changes_apply_on_next_request() -> Result<()> {
    let dir = tempdir()?;
    let pool = test_pool(&dir).await?;
    let app = build_router(AppState::new(pool.clone(), JwtConfig::new("test-secret")));
    let cookie = sign_up(&app, "promoted@academy.example").await?;

    let user = users::require_by_email(&pool, "promoted@academy.example").await?;
    users::set_profile_role(&pool, user.uuid()?, Some(Role::Instructor)).await?;

    let resp = send(&app, "GET", "/dashboard/student", Some(&cookie), None).await?;
    let (target, query) = location(&resp)?;
    assert_eq!(target, "/dashboard/instructor");
    assert_eq!(query[0].1, "access_denied");

    let resp = send(&app, "GET", "/dashboard/instructor", Some(&cookie), None).await?;
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = send(&app, "GET", "/dashboard2/admin", Some(&cookie), None).await?;
    let (target, _) = location(&resp)?;
    assert_eq!(target, "/dashboard/instructor");

    // Clearing the role leaves an authenticated user without access.
    users::set_profile_role(&pool, user.uuid()?, None).await?;
    let resp = send(&app, "GET", "/dashboard/instructor", Some(&cookie), None).await?;
    let (target, query) = location(&resp)?;
    assert_eq!(target, "/dashboard/student");
    assert_eq!(
        query,
        vec![
            ("error".to_string(), "unauthorized".to_string()),
            ("message".to_string(), UNAUTHORIZED_MESSAGE.to_string()),
        ]
    );

    Ok(())
}

#[tokio::test]
async fn embedded_claim_overrides_profile_after_refresh() -> Result<()> {
    let dir = tempdir()?;
    let pool = test_pool(&dir).await?;
    let app = build_router(AppState::new(pool.clone(), JwtConfig::new("test-secret")));
    let cookie = sign_up(&app, "owner@academy.example").await?;

    let user = users::require_by_email(&pool, "owner@academy.example").await?;
    users::set_role_claim(&pool, user.uuid()?, Some(Role::Admin)).await?;

    // The old token carries no claim yet.
    let resp = send(&app, "GET", "/dashboard2/admin", Some(&cookie), None).await?;
    assert_eq!(resp.status(), StatusCode::TEMPORARY_REDIRECT);

    let resp = send(&app, "POST", "/api/auth/refresh", Some(&cookie), None).await?;
    assert_eq!(resp.status(), StatusCode::OK);
    let refreshed = session_cookie(&resp).context("refresh did not set a cookie")?;
    let body = json_body(resp).await?;
    assert_eq!(body["session"]["user"]["metadata"]["role"], json!("admin"));
    assert_eq!(body["home"], json!("/dashboard2/admin"));

    for path in ["/dashboard2/admin", "/dashboard/instructor"] {
        let resp = send(&app, "GET", path, Some(&refreshed), None).await?;
        assert_eq!(resp.status(), StatusCode::OK, "{path}");
    }

    let resp = send(&app, "GET", "/dashboard/student", Some(&refreshed), None).await?;
    let (target, _) = location(&resp)?;
    assert_eq!(target, "/dashboard2/admin");

    Ok(())
}

struct UnavailableProfiles;

#[async_trait]
impl ProfileStore for UnavailableProfiles {
    async fn select_role(&self, _user_id: Uuid) -> AppResult<Option<String>> {
        Err(AppError::internal("profile store unavailable"))
    }
}

#[tokio::test]
async fn profile_store_failure_never_grants_access() -> Result<()> {
    let dir = tempdir()?;
    let pool = test_pool(&dir).await?;
    let state = AppState::with_profile_store(pool, JwtConfig::new("test-secret"), Arc::new(UnavailableProfiles));
    let app = build_router(state.clone());

    let session = state.sessions.issue(Uuid::new_v4(), None)?;
    let cookie = format!("{SESSION_COOKIE}={}", session.token);

    for (path, home) in [
        ("/dashboard/student", "/"),
        ("/dashboard/instructor", "/dashboard/student"),
        ("/dashboard2/admin", "/dashboard/student"),
    ] {
        let resp = send(&app, "GET", path, Some(&cookie), None).await?;
        assert_eq!(resp.status(), StatusCode::TEMPORARY_REDIRECT, "{path}");
        let (target, query) = location(&resp)?;
        assert_eq!(target, home);
        assert_eq!(query[0].1, "unauthorized");
    }

    // A claim still works without touching the store.
    let session = state.sessions.issue(Uuid::new_v4(), Some("Student"))?;
    let cookie = format!("{SESSION_COOKIE}={}", session.token);
    let resp = send(&app, "GET", "/dashboard/student", Some(&cookie), None).await?;
    assert_eq!(resp.status(), StatusCode::OK);

    Ok(())
}

#[tokio::test]
async fn sessions_near_expiry_are_reissued() -> Result<()> {
    let dir = tempdir()?;
    let pool = test_pool(&dir).await?;
    let mut jwt = JwtConfig::new("test-secret");
    jwt.exp_hours = 1;
    jwt.refresh_minutes = 120;
    let app = build_router(AppState::new(pool, jwt));
    let cookie = sign_up(&app, "late@academy.example").await?;

    let resp = send(&app, "GET", "/dashboard/student", Some(&cookie), None).await?;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(session_cookie(&resp).is_some(), "expected a refreshed session cookie");

    let resp = send(&app, "GET", "/dashboard2/admin", Some(&cookie), None).await?;
    assert_eq!(resp.status(), StatusCode::TEMPORARY_REDIRECT);
    assert!(session_cookie(&resp).is_none());

    Ok(())
}

#[tokio::test]
async fn reissued_sessions_drop_a_revoked_claim() -> Result<()> {
    let dir = tempdir()?;
    let pool = test_pool(&dir).await?;
    let mut jwt = JwtConfig::new("test-secret");
    jwt.exp_hours = 1;
    jwt.refresh_minutes = 120;
    let app = build_router(AppState::new(pool.clone(), jwt));
    let cookie = sign_up(&app, "former-admin@academy.example").await?;

    let user = users::require_by_email(&pool, "former-admin@academy.example").await?;
    users::set_role_claim(&pool, user.uuid()?, Some(Role::Admin)).await?;
    let resp = send(&app, "POST", "/api/auth/refresh", Some(&cookie), None).await?;
    let admin_cookie = session_cookie(&resp).context("refresh did not set a cookie")?;
    let resp = send(&app, "GET", "/dashboard2/admin", Some(&admin_cookie), None).await?;
    assert_eq!(resp.status(), StatusCode::OK);

    users::set_role_claim(&pool, user.uuid()?, None).await?;
    let resp = send(&app, "GET", "/", Some(&admin_cookie), None).await?;
    assert_eq!(resp.status(), StatusCode::OK);
    let reissued = session_cookie(&resp).context("expected a re-issued session cookie")?;

    let resp = send(&app, "GET", "/dashboard2/admin", Some(&reissued), None).await?;
    assert_eq!(resp.status(), StatusCode::TEMPORARY_REDIRECT);
    let (target, query) = location(&resp)?;
    assert_eq!(target, "/dashboard/student");
    assert_eq!(query[0].1, "access_denied");

    Ok(())
}

#[tokio::test]
async fn sessions_for_removed_accounts_are_not_reissued() -> Result<()> {
    let dir = tempdir()?;
    let pool = test_pool(&dir).await?;
    let mut jwt = JwtConfig::new("test-secret");
    jwt.exp_hours = 1;
    jwt.refresh_minutes = 120;
    let state = AppState::new(pool, jwt);
    let app = build_router(state.clone());

    let session = state.sessions.issue(Uuid::new_v4(), Some("student"))?;
    let cookie = format!("{SESSION_COOKIE}={}", session.token);
    let resp = send(&app, "GET", "/dashboard/student", Some(&cookie), None).await?;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(session_cookie(&resp).is_none());

    Ok(())
}

#[tokio::test]
async fn unknown_and_static_paths_pass_through() -> Result<()> {
    let dir = tempdir()?;
    let pool = test_pool(&dir).await?;
    let app = build_router(AppState::new(pool, JwtConfig::new("test-secret")));

    for path in ["/about", "/favicon.ico", "/dashboard/student/avatar.png"] {
        let resp = send(&app, "GET", path, None, None).await?;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND, "{path}");
    }

    Ok(())
}
