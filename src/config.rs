// src/config.rs

//! Manages configuration: loading, defaults, and validation.

use crate::core::directory::validate;
use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fs;
use tracing::warn;

/// Settings for the credential policy: secret length bounds, the length of
/// generated temporary secrets, and the Argon2id cost parameters.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CredentialConfig {
    /// Minimum number of characters in a supplied secret.
    #[serde(default = "default_min_length")]
    pub min_length: usize,
    /// Maximum number of characters in a supplied secret.
    #[serde(default = "default_max_length")]
    pub max_length: usize,
    /// Length of secrets generated on create-without-secret and on reset.
    #[serde(default = "default_generated_length")]
    pub generated_length: usize,
    /// Argon2 memory cost in KiB.
    #[serde(default = "default_hash_memory_kib")]
    pub hash_memory_kib: u32,
    /// Argon2 time cost (iterations).
    #[serde(default = "default_hash_iterations")]
    pub hash_iterations: u32,
    /// Argon2 degree of parallelism.
    #[serde(default = "default_hash_parallelism")]
    pub hash_parallelism: u32,
}

fn default_min_length() -> usize {
    8
}
fn default_max_length() -> usize {
    100
}
fn default_generated_length() -> usize {
    16
}
fn default_hash_memory_kib() -> u32 {
    19 * 1024 // 19 MiB
}
fn default_hash_iterations() -> u32 {
    2
}
fn default_hash_parallelism() -> u32 {
    1
}

impl Default for CredentialConfig {
    fn default() -> Self {
        Self {
            min_length: default_min_length(),
            max_length: default_max_length(),
            generated_length: default_generated_length(),
            hash_memory_kib: default_hash_memory_kib(),
            hash_iterations: default_hash_iterations(),
            hash_parallelism: default_hash_parallelism(),
        }
    }
}

/// A raw representation of the config file before validation.
#[derive(Deserialize)]
struct RawConfig {
    #[serde(default = "default_log_level")]
    log_level: String,
    #[serde(default)]
    users_file: Option<String>,
    #[serde(default = "default_bootstrap_admin")]
    bootstrap_admin: String,
    #[serde(default)]
    credentials: CredentialConfig,
}

fn default_log_level() -> String {
    "info".to_string()
}
fn default_bootstrap_admin() -> String {
    "admin".to_string()
}

/// Represents the final, validated configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub log_level: String,
    /// Path of the JSON users file. `None` keeps the directory in memory only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub users_file: Option<String>,
    /// Username of the administrator created when the directory has no admin.
    pub bootstrap_admin: String,
    #[serde(default)]
    pub credentials: CredentialConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            users_file: None,
            bootstrap_admin: default_bootstrap_admin(),
            credentials: CredentialConfig::default(),
        }
    }
}

impl Config {
    /// Creates a new `Config` instance by reading and parsing a TOML file.
    pub fn from_file(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file at '{path}'"))?;
        Self::from_toml_str(&contents).with_context(|| format!("Invalid config in '{path}'"))
    }

    /// Parses and validates configuration from TOML text.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let raw_config: RawConfig = toml::from_str(contents).context("Failed to parse TOML")?;

        let config = Config {
            log_level: raw_config.log_level,
            users_file: raw_config.users_file,
            bootstrap_admin: raw_config.bootstrap_admin,
            credentials: raw_config.credentials,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration to ensure logical consistency.
    pub fn validate(&self) -> Result<()> {
        if self.log_level.trim().is_empty() {
            return Err(anyhow!("log_level cannot be empty"));
        }
        if let Some(path) = &self.users_file
            && path.trim().is_empty()
        {
            return Err(anyhow!("users_file cannot be an empty path"));
        }
        validate::username(&self.bootstrap_admin)
            .map_err(|e| anyhow!("bootstrap_admin is not a valid username: {e}"))?;

        let creds = &self.credentials;
        if creds.min_length == 0 {
            return Err(anyhow!("credentials.min_length cannot be 0"));
        }
        if creds.max_length < creds.min_length {
            return Err(anyhow!(
                "credentials.max_length ({}) cannot be less than credentials.min_length ({})",
                creds.max_length,
                creds.min_length
            ));
        }
        if !(creds.min_length..=creds.max_length).contains(&creds.generated_length) {
            return Err(anyhow!(
                "credentials.generated_length ({}) must lie between min_length and max_length",
                creds.generated_length
            ));
        }
        if creds.generated_length < 16 {
            warn!(
                "credentials.generated_length is {}. Temporary secrets shorter than 16 characters are weak.",
                creds.generated_length
            );
        }
        if creds.hash_iterations == 0 {
            return Err(anyhow!("credentials.hash_iterations cannot be 0"));
        }
        if creds.hash_parallelism == 0 {
            return Err(anyhow!("credentials.hash_parallelism cannot be 0"));
        }
        if creds.hash_memory_kib < 8 * creds.hash_parallelism {
            return Err(anyhow!(
                "credentials.hash_memory_kib must be at least 8 * hash_parallelism"
            ));
        }
        Ok(())
    }
}
