// src/core/mod.rs

//! The central module containing the access-control logic and data structures.

pub mod acl;
pub mod credential;
pub mod directory;
pub mod errors;
pub mod visibility;

pub use directory::UserDirectory;
pub use errors::{AccessError, ErrorKind};
pub use visibility::{TagFilter, is_visible};
