use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use super::role::Role;
use super::session::Session;
use crate::errors::AppResult;

/// Read access to the `profiles` table, the fallback source of a user's role.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Raw `role` column for `user_id`; `Ok(None)` when the row or value is absent.
    async fn select_role(&self, user_id: Uuid) -> AppResult<Option<String>>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoleResolution {
    Resolved(Role),
    Missing,
    Failed(String),
}

impl RoleResolution {
    pub fn role(&self) -> Option<Role> {
        match self {
            RoleResolution::Resolved(role) => Some(*role),
            RoleResolution::Missing | RoleResolution::Failed(_) => None,
        }
    }
}

/// Resolves the role of a session: embedded claim first, then the profile row.
///
/// Failures never escalate to a default role; they resolve to no role so the
/// access policy falls back to redirects.
#[derive(Clone)]
pub struct RoleResolver {
    profiles: Arc<dyn ProfileStore>,
}

impl RoleResolver {
    pub fn new(profiles: Arc<dyn ProfileStore>) -> Self {
        Self { profiles }
    }

    pub async fn resolve(&self, session: Option<&Session>) -> RoleResolution {
        let Some(session) = session else {
            tracing::debug!("no user object, defaulting to null");
            return RoleResolution::Missing;
        };
        let user_id = session.user.id;

        if let Some(claim) = session.user.role_claim.as_deref().filter(|c| !c.trim().is_empty()) {
            match Role::parse(claim) {
                Some(role) => {
                    tracing::debug!(user_id = %user_id, role = %role, "role from embedded claim");
                    return RoleResolution::Resolved(role);
                }
                None => {
                    tracing::debug!(user_id = %user_id, claim = %claim, "unrecognised role claim, checking profile");
                }
            }
        }

        match self.profiles.select_role(user_id).await {
            Ok(Some(raw)) => match Role::parse(&raw) {
                Some(role) => {
                    tracing::debug!(user_id = %user_id, role = %role, "role from profile");
                    RoleResolution::Resolved(role)
                }
                None => {
                    tracing::debug!(user_id = %user_id, value = %raw, "profile role empty or unrecognised");
                    RoleResolution::Missing
                }
            },
            Ok(None) => {
                tracing::debug!(user_id = %user_id, "no profile role");
                RoleResolution::Missing
            }
            Err(err) => {
                tracing::error!(user_id = %user_id, error = %err, "profile role lookup failed");
                RoleResolution::Failed(err.to_string())
            }
        }
    }

    pub async fn resolve_role(&self, session: Option<&Session>) -> Option<Role> {
        self.resolve(session).await.role()
    }
}
