// src/core/acl/enforcer.rs

use crate::core::AccessError;
use crate::core::acl::role::Role;
use crate::core::directory::UserId;
use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use strum_macros::Display;
use tracing::warn;

bitflags! {
    /// The capabilities a role grants.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub struct Capabilities: u8 {
        /// Read-only access to hosts, containers and settings.
        const VIEW             = 1 << 0;
        /// Start/stop/update containers and manage hosts.
        const MANAGE_RESOURCES = 1 << 1;
        /// Create, update, delete and reset users.
        const MANAGE_USERS     = 1 << 2;
    }
}

/// An operation class that must be authorized before it runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "kebab-case")]
pub enum Operation {
    View,
    ManageResources,
    ManageUsers,
}

impl Operation {
    fn required(self) -> Capabilities {
        match self {
            Operation::View => Capabilities::VIEW,
            Operation::ManageResources => Capabilities::MANAGE_RESOURCES,
            Operation::ManageUsers => Capabilities::MANAGE_USERS,
        }
    }
}

impl Role {
    /// The static capability table.
    pub fn capabilities(self) -> Capabilities {
        match self {
            Role::Admin => Capabilities::all(),
            Role::User => Capabilities::VIEW | Capabilities::MANAGE_RESOURCES,
            Role::Readonly => Capabilities::VIEW,
        }
    }
}

/// Returns whether `role` may perform `operation`.
pub fn can(role: Role, operation: Operation) -> bool {
    role.capabilities().contains(operation.required())
}

/// The authenticated caller of an operation, as supplied by the session or
/// API-key layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: UserId,
    pub username: String,
    pub role: Role,
}

impl Actor {
    pub fn new(id: UserId, username: impl Into<String>, role: Role) -> Self {
        Self {
            id,
            username: username.into(),
            role,
        }
    }

    pub fn can(&self, operation: Operation) -> bool {
        can(self.role, operation)
    }
}

/// Enforcement point: fails closed with `Forbidden` unless the actor's role
/// explicitly grants `operation`.
pub fn authorize(actor: &Actor, operation: Operation) -> Result<(), AccessError> {
    if actor.can(operation) {
        return Ok(());
    }
    warn!(
        "Denied '{}' (role '{}') permission to {}",
        actor.username, actor.role, operation
    );
    Err(AccessError::Forbidden(format!(
        "role '{}' is not permitted to {}",
        actor.role,
        describe_operation(operation)
    )))
}

fn describe_operation(operation: Operation) -> &'static str {
    match operation {
        Operation::View => "view resources",
        Operation::ManageResources => "manage containers or hosts",
        Operation::ManageUsers => "manage users",
    }
}
