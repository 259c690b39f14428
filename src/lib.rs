// src/lib.rs

pub mod config;
pub mod core;

// Re-export
pub use crate::core::{AccessError, UserDirectory};
