// src/core/acl/mod.rs

//! Role-based authorization: roles, their capabilities, and the enforcement
//! point every administrative operation passes through.

pub mod enforcer;
pub mod role;

pub use enforcer::{Actor, Capabilities, Operation, authorize, can};
pub use role::{Role, RoleInfo, available_roles};
