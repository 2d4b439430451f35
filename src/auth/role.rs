use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::errors::AppError;

/// Academy role attached to an authenticated identity.
///
/// Raw role strings only enter the system through [`Role::parse`], so the
/// rest of the crate never has to re-normalise case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Instructor,
    Student,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Admin, Role::Instructor, Role::Student];

    /// Trims and lowercases `raw`; empty or unknown values are no role.
    pub fn parse(raw: &str) -> Option<Role> {
        match raw.trim().to_lowercase().as_str() {
            "admin" => Some(Role::Admin),
            "instructor" => Some(Role::Instructor),
            "student" => Some(Role::Student),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Instructor => "instructor",
            Role::Student => "student",
        }
    }

    /// Dashboard a user with this role lands on after signing in.
    pub fn home_path(&self) -> &'static str {
        match self {
            Role::Admin => "/dashboard2/admin",
            Role::Instructor => "/dashboard/instructor",
            Role::Student => "/dashboard/student",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::parse(s).ok_or_else(|| AppError::bad_request(format!("unknown role: {s}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_normalises_case_and_whitespace() {
        assert_eq!(Role::parse("Instructor"), Some(Role::Instructor));
        assert_eq!(Role::parse("  ADMIN "), Some(Role::Admin));
        assert_eq!(Role::parse("student"), Some(Role::Student));
    }

    #[test]
    fn parse_rejects_empty_and_unknown() {
        assert_eq!(Role::parse(""), None);
        assert_eq!(Role::parse("   "), None);
        assert_eq!(Role::parse("teacher"), None);
    }

    #[test]
    fn serde_uses_lowercase_names() {
        let json = serde_json::to_string(&Role::Instructor).unwrap();
        assert_eq!(json, "\"instructor\"");
        let back: Role = serde_json::from_str("\"admin\"").unwrap();
        assert_eq!(back, Role::Admin);
    }

    #[test]
    fn from_str_reports_unknown_roles() {
        assert!("parent".parse::<Role>().is_err());
        assert_eq!("Student".parse::<Role>().unwrap(), Role::Student);
    }
}
