use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use axum_extra::extract::CookieJar;
use serde::Serialize;
use utoipa::ToSchema;

use crate::app::AppState;
use crate::auth::{
    hash_password, removal_cookie, session_cookie, verify_password, CurrentSession, MaybeSession, Role,
    Session,
};
use crate::db::users;
use crate::errors::{AppError, AppResult};
use crate::models::user::{AuthResponse, DbUser, SessionView, SignInRequest, SignUpRequest, User};

#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    message: String,
}

#[utoipa::path(
    post,
    path = "/api/auth/signup",
    tag = "Auth",
    request_body = SignUpRequest,
    responses(
        (status = 201, description = "Account created and signed in", body = AuthResponse),
        (status = 400, description = "Invalid name or password"),
        (status = 409, description = "Email already in use")
    )
)]
pub async fn sign_up(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(payload): Json<SignUpRequest>,
) -> AppResult<(StatusCode, CookieJar, Json<AuthResponse>)> {
    if payload.name.trim().is_empty() {
        return Err(AppError::bad_request("name must not be empty"));
    }
    if !payload.email.contains('@') {
        return Err(AppError::bad_request("email is not valid"));
    }

    let password_hash = hash_password(&payload.password)?;
    let db_user =
        users::create_with_profile(&state.pool, &payload.name, &payload.email, &password_hash, Role::Student).await?;
    tracing::info!(user_id = %db_user.id, "account created");

    let (jar, response) = start_session(&state, jar, db_user).await?;
    Ok((StatusCode::CREATED, jar, Json(response)))
}

#[utoipa::path(
    post,
    path = "/api/auth/signin",
    tag = "Auth",
    request_body = SignInRequest,
    responses(
        (status = 200, description = "Signed in", body = AuthResponse),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn sign_in(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(payload): Json<SignInRequest>,
) -> AppResult<(CookieJar, Json<AuthResponse>)> {
    let db_user = users::find_by_email(&state.pool, &payload.email)
        .await?
        .ok_or_else(|| AppError::unauthorized("invalid credentials"))?;

    if !verify_password(&payload.password, &db_user.password_hash)? {
        tracing::debug!(user_id = %db_user.id, "password mismatch");
        return Err(AppError::unauthorized("invalid credentials"));
    }

    let (jar, response) = start_session(&state, jar, db_user).await?;
    Ok((jar, Json(response)))
}

#[utoipa::path(
    post,
    path = "/api/auth/signout",
    tag = "Auth",
    responses((status = 200, description = "Session cookie cleared", body = MessageResponse))
)]
pub async fn sign_out(jar: CookieJar, MaybeSession(session): MaybeSession) -> (CookieJar, Json<MessageResponse>) {
    if let Some(session) = session {
        tracing::info!(user_id = %session.user.id, "signed out");
    }

    (
        jar.remove(removal_cookie()),
        Json(MessageResponse {
            message: "Signed out".to_string(),
        }),
    )
}

#[utoipa::path(
    post,
    path = "/api/auth/refresh",
    tag = "Auth",
    responses(
        (status = 200, description = "Session re-issued", body = AuthResponse),
        (status = 401, description = "No active session")
    )
)]
pub async fn refresh(
    State(state): State<AppState>,
    jar: CookieJar,
    CurrentSession(session): CurrentSession,
) -> AppResult<(CookieJar, Json<AuthResponse>)> {
    // Re-read the account so claim changes made since sign-in take effect.
    let db_user = users::find_by_id(&state.pool, session.user.id)
        .await?
        .ok_or_else(|| AppError::unauthorized("account no longer exists"))?;

    let (jar, response) = start_session(&state, jar, db_user).await?;
    Ok((jar, Json(response)))
}

#[utoipa::path(
    get,
    path = "/api/auth/session",
    tag = "Auth",
    responses((status = 200, description = "Current session, or null", body = SessionView))
)]
pub async fn current_session(MaybeSession(session): MaybeSession) -> Json<Option<SessionView>> {
    Json(session.as_ref().map(SessionView::from))
}

async fn start_session(state: &AppState, jar: CookieJar, db_user: DbUser) -> AppResult<(CookieJar, AuthResponse)> {
    let user: User = db_user.try_into()?;
    let session: Session = state.sessions.issue(user.id, user.role_claim.as_deref())?;

    let home = state
        .roles
        .resolve_role(Some(&session))
        .await
        .map(|role| role.home_path())
        .unwrap_or("/")
        .to_string();

    let response = AuthResponse {
        token: session.token.clone(),
        session: SessionView::from(&session),
        user,
        home,
    };

    Ok((jar.add(session_cookie(&session)), response))
}
