//! Route access policy.
//!
//! A pure decision procedure over a static, ordered table of protected route
//! rules. It never touches the request or the network, so every outcome can
//! be tested from a path, an optional role and an authentication flag.

use url::form_urlencoded;

use super::role::Role;

/// Pages that must always render, even with a live session, so the client
/// can clear or refresh its session state.
const BYPASS_PREFIXES: [&str; 2] = ["/signin", "/signup"];

pub const SIGN_IN_PATH: &str = "/signin";

/// Generic denial text for role-hierarchy failures.
pub const UNAUTHORIZED_MESSAGE: &str = "접근 권한이 없습니다.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtectedRoute {
    pub path: &'static str,
    pub required_role: Role,
    pub deny_roles: &'static [Role],
    pub message: &'static str,
}

impl ProtectedRoute {
    /// Exact match, or `path` followed by a `/` segment boundary.
    pub fn matches(&self, request_path: &str) -> bool {
        match request_path.strip_prefix(self.path) {
            Some(rest) => rest.is_empty() || rest.starts_with('/'),
            None => false,
        }
    }

    pub fn denies(&self, role: Option<Role>) -> bool {
        role.map(|r| self.deny_roles.contains(&r)).unwrap_or(false)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenialReason {
    AccessDenied,
    Unauthorized,
}

impl DenialReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DenialReason::AccessDenied => "access_denied",
            DenialReason::Unauthorized => "unauthorized",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow,
    RedirectSignIn {
        redirected_from: String,
    },
    RedirectRoleHome {
        target: String,
        reason: DenialReason,
        message: String,
    },
}

impl Decision {
    /// Redirect location including its query string, `None` for `Allow`.
    pub fn location(&self) -> Option<String> {
        match self {
            Decision::Allow => None,
            Decision::RedirectSignIn { redirected_from } => {
                Some(with_query(SIGN_IN_PATH, &[("redirectedFrom", redirected_from.as_str())]))
            }
            Decision::RedirectRoleHome {
                target,
                reason,
                message,
            } => Some(with_query(
                target,
                &[("error", reason.as_str()), ("message", message.as_str())],
            )),
        }
    }
}

fn with_query(base: &str, pairs: &[(&str, &str)]) -> String {
    let mut query = form_urlencoded::Serializer::new(String::new());
    for (key, value) in pairs {
        query.append_pair(key, value);
    }
    format!("{}?{}", base, query.finish())
}

/// `None` never satisfies a requirement. Admin inherits instructor routes;
/// student-level routes accept any role.
pub fn has_required_role(user_role: Option<Role>, required_role: Role) -> bool {
    let Some(user_role) = user_role else {
        return false;
    };

    match required_role {
        Role::Admin => user_role == Role::Admin,
        Role::Instructor => matches!(user_role, Role::Admin | Role::Instructor),
        Role::Student => true,
    }
}

/// Where a denied role is sent, keyed by the rule that denied it.
pub fn redirect_target(rule_path: &str, role: Option<Role>) -> &'static str {
    match (rule_path, role) {
        ("/dashboard/student", Some(Role::Instructor)) => "/dashboard/instructor",
        ("/dashboard/student", Some(Role::Admin)) => "/dashboard2/admin",
        ("/dashboard/student", _) => "/",
        ("/dashboard/instructor", Some(Role::Admin)) => "/dashboard2/admin",
        ("/dashboard/instructor", _) => "/dashboard/student",
        ("/dashboard2/admin", Some(Role::Instructor)) => "/dashboard/instructor",
        ("/dashboard2/admin", _) => "/dashboard/student",
        _ => "/",
    }
}

#[derive(Debug, Clone)]
pub struct AccessPolicy {
    rules: Vec<ProtectedRoute>,
}

impl Default for AccessPolicy {
    fn default() -> Self {
        Self::academy()
    }
}

impl AccessPolicy {
    pub fn new(rules: Vec<ProtectedRoute>) -> Self {
        Self { rules }
    }

    /// The three dashboard rules, in evaluation order.
    pub fn academy() -> Self {
        Self::new(vec![
            ProtectedRoute {
                path: "/dashboard/student",
                required_role: Role::Student,
                deny_roles: &[Role::Instructor, Role::Admin],
                message: "학생만 접근할 수 있는 페이지입니다.",
            },
            ProtectedRoute {
                path: "/dashboard/instructor",
                required_role: Role::Instructor,
                deny_roles: &[Role::Student],
                message: "강사만 접근할 수 있는 페이지입니다.",
            },
            ProtectedRoute {
                path: "/dashboard2/admin",
                required_role: Role::Admin,
                deny_roles: &[Role::Student, Role::Instructor],
                message: "관리자만 접근할 수 있는 페이지입니다.",
            },
        ])
    }

    pub fn rules(&self) -> &[ProtectedRoute] {
        &self.rules
    }

    pub fn matching_rule(&self, path: &str) -> Option<&ProtectedRoute> {
        self.rules.iter().find(|rule| rule.matches(path))
    }

    pub fn decide(&self, path: &str, role: Option<Role>, is_authenticated: bool) -> Decision {
        if BYPASS_PREFIXES.iter().any(|prefix| path.starts_with(prefix)) {
            return Decision::Allow;
        }

        let Some(rule) = self.matching_rule(path) else {
            return Decision::Allow;
        };

        if !is_authenticated {
            return Decision::RedirectSignIn {
                redirected_from: path.to_string(),
            };
        }

        if rule.denies(role) {
            return Decision::RedirectRoleHome {
                target: redirect_target(rule.path, role).to_string(),
                reason: DenialReason::AccessDenied,
                message: rule.message.to_string(),
            };
        }

        if !has_required_role(role, rule.required_role) {
            return Decision::RedirectRoleHome {
                target: redirect_target(rule.path, role).to_string(),
                reason: DenialReason::Unauthorized,
                message: UNAUTHORIZED_MESSAGE.to_string(),
            };
        }

        Decision::Allow
    }
}
