//! Access control for the academy dashboards.
//!
//! Request flow: [`SessionResolver`] reads the session cookie,
//! [`RoleResolver`] turns the session into a [`Role`], [`AccessPolicy`]
//! decides, and [`route_guard`] forwards or redirects.

mod middleware;
mod password;
mod policy;
mod resolver;
mod role;
mod session;

pub use middleware::{is_excluded, route_guard};
pub use password::{hash_password, verify_password, MIN_PASSWORD_LENGTH};
pub use policy::{
    has_required_role, redirect_target, AccessPolicy, Decision, DenialReason, ProtectedRoute, SIGN_IN_PATH,
    UNAUTHORIZED_MESSAGE,
};
pub use resolver::{ProfileStore, RoleResolution, RoleResolver};
pub use role::Role;
pub use session::{
    removal_cookie, session_cookie, CurrentSession, MaybeSession, Session, SessionResolver, UserIdentity,
    SESSION_COOKIE,
};
