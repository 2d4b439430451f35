use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::{header, HeaderMap};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::app::AppState;
use crate::errors::AppError;
use crate::jwt::{Claims, JwtConfig};

pub const SESSION_COOKIE: &str = "academy_session";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserIdentity {
    pub id: Uuid,
    pub role_claim: Option<String>,
}

/// A verified, unexpired session token and the identity it carries.
#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    pub user: UserIdentity,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    fn from_claims(token: String, claims: Claims) -> Self {
        Self {
            issued_at: claims.issued_at(),
            expires_at: claims.expires_at(),
            user: UserIdentity {
                id: claims.sub,
                role_claim: claims.role,
            },
            token,
        }
    }

    pub fn expires_within(&self, window: chrono::Duration, now: DateTime<Utc>) -> bool {
        self.expires_at - now <= window
    }
}

/// Reads and issues session tokens.
#[derive(Debug, Clone)]
pub struct SessionResolver {
    jwt: Arc<JwtConfig>,
}

impl SessionResolver {
    pub fn new(jwt: Arc<JwtConfig>) -> Self {
        Self { jwt }
    }

    /// Current session from the session cookie, else from a bearer header.
    /// Any failure is treated as "no session".
    pub fn resolve(&self, headers: &HeaderMap) -> Option<Session> {
        let token = token_from_headers(headers)?;

        match self.jwt.decode(&token) {
            Ok(claims) => Some(Session::from_claims(token, claims)),
            Err(err) => {
                tracing::debug!(error = %err, "discarding unusable session token");
                None
            }
        }
    }

    pub fn issue(&self, user_id: Uuid, role_claim: Option<&str>) -> Result<Session, AppError> {
        let token = self.jwt.encode(user_id, role_claim)?;
        let claims = self.jwt.decode(&token)?;
        Ok(Session::from_claims(token, claims))
    }

    pub fn needs_refresh(&self, session: &Session) -> bool {
        session.expires_within(self.jwt.refresh_window(), Utc::now())
    }

    /// Re-issues `session` with a fresh expiry for the same user. The claim
    /// is the account's current one, not the claim inside the old token.
    pub fn refresh(&self, session: &Session, role_claim: Option<&str>) -> Result<Session, AppError> {
        self.issue(session.user.id, role_claim)
    }
}

fn token_from_headers(headers: &HeaderMap) -> Option<String> {
    let jar = CookieJar::from_headers(headers);
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        if !cookie.value().is_empty() {
            return Some(cookie.value().to_string());
        }
    }

    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
}

pub fn session_cookie(session: &Session) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, session.token.clone()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build()
}

/// Cookie shape used to remove the session cookie from a jar.
pub fn removal_cookie() -> Cookie<'static> {
    Cookie::build(SESSION_COOKIE).path("/").build()
}

/// Extractor for handlers that need the caller's session.
#[derive(Debug, Clone)]
pub struct CurrentSession(pub Session);

#[async_trait]
impl FromRequestParts<AppState> for CurrentSession {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        state
            .sessions
            .resolve(&parts.headers)
            .map(CurrentSession)
            .ok_or_else(|| AppError::unauthorized("no active session"))
    }
}

/// Like [`CurrentSession`] but never rejects.
#[derive(Debug, Clone)]
pub struct MaybeSession(pub Option<Session>);

#[async_trait]
impl FromRequestParts<AppState> for MaybeSession {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        Ok(MaybeSession(state.sessions.resolve(&parts.headers)))
    }
}
