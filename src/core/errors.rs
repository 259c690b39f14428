// src/core/errors.rs

//! Defines the primary error type for the access-control core.

use std::sync::Arc;
use strum_macros::{AsRefStr, Display};
use thiserror::Error;

/// The main error enum, representing every way a directory, credential or
/// authorization operation can fail. Each variant carries a human-readable
/// detail; mapping to status codes is left to the transport layer.
#[derive(Error, Debug)]
pub enum AccessError {
    #[error("Invalid username: {0}")]
    InvalidUsername(String),

    #[error("Invalid role: {0}")]
    InvalidRole(String),

    #[error("Invalid credential: {0}")]
    InvalidCredential(String),

    #[error("Invalid display name: {0}")]
    InvalidDisplayName(String),

    #[error("Username already exists: {0}")]
    DuplicateUsername(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Cannot delete your own account")]
    SelfDeleteForbidden,

    #[error("Last admin violation: {0}")]
    LastAdminViolation(String),

    #[error("IO Error: {0}")]
    Io(Arc<std::io::Error>),

    #[error("Storage Error: {0}")]
    Storage(String),

    #[error("Internal Error: {0}")]
    Internal(String),
}

/// A payload-free classification of `AccessError`, for callers that only
/// need to branch on the failure kind (e.g. to pick an HTTP status).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    InvalidUsername,
    InvalidRole,
    InvalidCredential,
    InvalidDisplayName,
    DuplicateUsername,
    NotFound,
    Forbidden,
    SelfDeleteForbidden,
    LastAdminViolation,
    Storage,
    Internal,
}

impl AccessError {
    /// Returns the kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            AccessError::InvalidUsername(_) => ErrorKind::InvalidUsername,
            AccessError::InvalidRole(_) => ErrorKind::InvalidRole,
            AccessError::InvalidCredential(_) => ErrorKind::InvalidCredential,
            AccessError::InvalidDisplayName(_) => ErrorKind::InvalidDisplayName,
            AccessError::DuplicateUsername(_) => ErrorKind::DuplicateUsername,
            AccessError::NotFound(_) => ErrorKind::NotFound,
            AccessError::Forbidden(_) => ErrorKind::Forbidden,
            AccessError::SelfDeleteForbidden => ErrorKind::SelfDeleteForbidden,
            AccessError::LastAdminViolation(_) => ErrorKind::LastAdminViolation,
            AccessError::Io(_) | AccessError::Storage(_) => ErrorKind::Storage,
            AccessError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// True for errors caused by the caller's input or permissions, as opposed
    /// to failures of the backing store.
    pub fn is_client_error(&self) -> bool {
        !matches!(self.kind(), ErrorKind::Storage | ErrorKind::Internal)
    }
}

// Manual implementation of Clone because `std::io::Error` is not cloneable.
impl Clone for AccessError {
    fn clone(&self) -> Self {
        match self {
            AccessError::InvalidUsername(s) => AccessError::InvalidUsername(s.clone()),
            AccessError::InvalidRole(s) => AccessError::InvalidRole(s.clone()),
            AccessError::InvalidCredential(s) => AccessError::InvalidCredential(s.clone()),
            AccessError::InvalidDisplayName(s) => AccessError::InvalidDisplayName(s.clone()),
            AccessError::DuplicateUsername(s) => AccessError::DuplicateUsername(s.clone()),
            AccessError::NotFound(s) => AccessError::NotFound(s.clone()),
            AccessError::Forbidden(s) => AccessError::Forbidden(s.clone()),
            AccessError::SelfDeleteForbidden => AccessError::SelfDeleteForbidden,
            AccessError::LastAdminViolation(s) => AccessError::LastAdminViolation(s.clone()),
            AccessError::Io(e) => AccessError::Io(Arc::clone(e)),
            AccessError::Storage(s) => AccessError::Storage(s.clone()),
            AccessError::Internal(s) => AccessError::Internal(s.clone()),
        }
    }
}

// Two errors are equal when they are of the same kind; details are compared
// only for the IO variant, which has no other identity.
impl PartialEq for AccessError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (AccessError::Io(e1), AccessError::Io(e2)) => e1.to_string() == e2.to_string(),
            _ => core::mem::discriminant(self) == core::mem::discriminant(other),
        }
    }
}

// --- From trait implementations for easy error conversion ---

impl From<std::io::Error> for AccessError {
    fn from(e: std::io::Error) -> Self {
        AccessError::Io(Arc::new(e))
    }
}

impl From<serde_json::Error> for AccessError {
    fn from(e: serde_json::Error) -> Self {
        AccessError::Storage(format!("JSON serialization/deserialization error: {e}"))
    }
}

impl From<argon2::password_hash::Error> for AccessError {
    fn from(e: argon2::password_hash::Error) -> Self {
        AccessError::Internal(format!("Password hashing failed: {e}"))
    }
}

impl From<tokio::task::JoinError> for AccessError {
    fn from(e: tokio::task::JoinError) -> Self {
        AccessError::Internal(format!("Background task panicked: {e}"))
    }
}
