use std::sync::Arc;

use axum::http::Method;
use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use sqlx::SqlitePool;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::auth::{route_guard, AccessPolicy, ProfileStore, RoleResolver, SessionResolver};
use crate::db::SqliteProfileStore;
use crate::errors::AppError;
use crate::jwt::JwtConfig;
use crate::routes::{auth, health, pages};

/// Process-wide state. Everything here is read-only after start-up.
#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub jwt: Arc<JwtConfig>,
    pub sessions: Arc<SessionResolver>,
    pub roles: Arc<RoleResolver>,
    pub policy: Arc<AccessPolicy>,
}

impl AppState {
    pub fn new(pool: SqlitePool, jwt: JwtConfig) -> Self {
        let profiles = Arc::new(SqliteProfileStore::new(pool.clone()));
        Self::with_profile_store(pool, jwt, profiles)
    }

    pub fn with_profile_store(pool: SqlitePool, jwt: JwtConfig, profiles: Arc<dyn ProfileStore>) -> Self {
        let jwt = Arc::new(jwt);
        Self {
            pool,
            sessions: Arc::new(SessionResolver::new(Arc::clone(&jwt))),
            roles: Arc::new(RoleResolver::new(profiles)),
            policy: Arc::new(AccessPolicy::academy()),
            jwt,
        }
    }
}

pub async fn create_app(pool: SqlitePool) -> Result<Router, AppError> {
    let jwt_config = JwtConfig::from_env()?;
    Ok(build_router(AppState::new(pool, jwt_config)))
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_origin(Any)
        .allow_headers(Any);

    let auth_routes = Router::new()
        .route("/signin", post(auth::sign_in))
        .route("/signup", post(auth::sign_up))
        .route("/signout", post(auth::sign_out))
        .route("/refresh", post(auth::refresh))
        .route("/session", get(auth::current_session));

    Router::new()
        .route("/", get(pages::home))
        .route("/signin", get(pages::sign_in))
        .route("/signup", get(pages::sign_up))
        .route("/dashboard/student", get(pages::student_dashboard))
        .route("/dashboard/instructor", get(pages::instructor_dashboard))
        .route("/dashboard2/admin", get(pages::admin_dashboard))
        .route("/api/health", get(health::health))
        .nest("/api/auth", auth_routes)
        .layer(middleware::from_fn_with_state(state.clone(), route_guard))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
