// src/core/acl/role.rs

use crate::core::AccessError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use strum::IntoEnumIterator;
use strum_macros::{AsRefStr, Display, EnumIter, EnumString, IntoStaticStr};
use tracing::warn;

/// The coarse capability class of a user.
///
/// Parsing from user input is strict (`Role::from_str`), while values read
/// back from a store go through [`Role::from_stored`], which degrades unknown
/// values to `Readonly` instead of granting anything.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
    IntoStaticStr,
)]
#[serde(from = "String", into = "&'static str")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    Admin,
    User,
    Readonly,
}

impl Role {
    /// Strict parse for values supplied by a caller.
    pub fn parse(value: &str) -> Result<Self, AccessError> {
        Role::from_str(value).map_err(|_| {
            let valid: Vec<&'static str> = Role::iter().map(Into::into).collect();
            AccessError::InvalidRole(format!(
                "'{value}' is not a valid role. Must be one of: {}",
                valid.join(", ")
            ))
        })
    }

    /// Lenient parse for persisted values. A corrupt or unknown role never
    /// grants more than view access.
    pub fn from_stored(value: &str) -> Self {
        match Role::from_str(value) {
            Ok(role) => role,
            Err(_) => {
                warn!(r#"Unknown stored role "{}", treating as readonly"#, value);
                Role::Readonly
            }
        }
    }

    pub fn is_admin(self) -> bool {
        self == Role::Admin
    }
}

impl From<String> for Role {
    fn from(value: String) -> Self {
        Role::from_stored(&value)
    }
}

/// Describes a role for display in an administration UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoleInfo {
    pub id: Role,
    pub name: &'static str,
    pub description: &'static str,
    /// The API scopes a session holding this role is granted.
    pub scopes: &'static [&'static str],
}

/// The catalog of assignable roles, most privileged first.
pub fn available_roles() -> Vec<RoleInfo> {
    Role::iter().map(describe).collect()
}

fn describe(role: Role) -> RoleInfo {
    match role {
        Role::Admin => RoleInfo {
            id: role,
            name: "Administrator",
            description: "Full access - can manage users, hosts, containers, and all settings",
            scopes: &["admin"],
        },
        Role::User => RoleInfo {
            id: role,
            name: "Standard User",
            description: "Can manage containers and hosts but cannot manage users",
            scopes: &["read", "write"],
        },
        Role::Readonly => RoleInfo {
            id: role,
            name: "Read Only",
            description: "View-only access - cannot make any modifications",
            scopes: &["read"],
        },
    }
}
