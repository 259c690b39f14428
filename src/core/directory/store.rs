// src/core/directory/store.rs

//! Backing stores for the user directory.
//!
//! The directory always hands the store a complete snapshot, so a store only
//! has to make each `save` all-or-nothing.

use crate::core::AccessError;
use crate::core::directory::UserRecord;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[async_trait]
pub trait UserStore: Send + Sync + std::fmt::Debug {
    /// Loads every persisted record, in creation order.
    async fn load(&self) -> Result<Vec<UserRecord>, AccessError>;

    /// Replaces the persisted records with `users`. On error, the previously
    /// persisted snapshot must remain intact.
    async fn save(&self, users: Vec<UserRecord>) -> Result<(), AccessError>;
}

/// Keeps the snapshot in memory. Used when no users file is configured and
/// in tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    users: Mutex<Vec<UserRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_users(users: Vec<UserRecord>) -> Self {
        Self {
            users: Mutex::new(users),
        }
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn load(&self) -> Result<Vec<UserRecord>, AccessError> {
        Ok(self.users.lock().clone())
    }

    async fn save(&self, users: Vec<UserRecord>) -> Result<(), AccessError> {
        *self.users.lock() = users;
        Ok(())
    }
}

/// The on-disk layout of the users file (e.g., users.json).
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct UsersFile {
    pub users: Vec<UserRecord>,
}

/// Persists the directory as a JSON users file. Saves write and fsync a
/// temporary file next to the target, then rename it into place, so neither
/// readers nor a crash can observe a half-written file.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl UserStore for JsonFileStore {
    async fn load(&self) -> Result<Vec<UserRecord>, AccessError> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || -> Result<Vec<UserRecord>, AccessError> {
            if !path.exists() {
                info!(
                    "Users file '{}' does not exist yet, starting empty",
                    path.display()
                );
                return Ok(Vec::new());
            }
            let contents = std::fs::read_to_string(&path)?;
            let file: UsersFile = serde_json::from_str(&contents).map_err(|e| {
                AccessError::Storage(format!(
                    "Failed to parse users file '{}': {e}",
                    path.display()
                ))
            })?;
            debug!(
                "Loaded {} users from '{}'",
                file.users.len(),
                path.display()
            );
            Ok(file.users)
        })
        .await?
    }

    async fn save(&self, users: Vec<UserRecord>) -> Result<(), AccessError> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || -> Result<(), AccessError> {
            let count = users.len();
            let json_string = serde_json::to_string_pretty(&UsersFile { users })?;

            let temp_path = PathBuf::from(format!(
                "{}.tmp-users-save-{}",
                path.display(),
                rand::random::<u32>()
            ));

            let written = std::fs::File::create(&temp_path).and_then(|mut file| {
                file.write_all(json_string.as_bytes())?;
                file.sync_all()
            });
            if let Err(e) = written {
                let _ = std::fs::remove_file(&temp_path);
                return Err(AccessError::Storage(format!(
                    "Failed to write temp users file: {e}"
                )));
            }

            if let Err(e) = std::fs::rename(&temp_path, &path) {
                let _ = std::fs::remove_file(&temp_path);
                return Err(AccessError::Storage(format!(
                    "Failed to atomically rename users file: {e}"
                )));
            }

            debug!("Saved {} users to '{}'", count, path.display());
            Ok(())
        })
        .await?
    }
}
