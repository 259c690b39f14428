// src/core/credential/mod.rs

//! The credential policy: when a stored credential is acceptable, how
//! temporary secrets are generated, and when rotation becomes mandatory.
//!
//! Hashing uses Argon2id and produces PHC strings. Persistence is the
//! directory's concern; nothing here keeps state between calls.

mod secret;

pub use secret::TemporarySecret;

use crate::config::CredentialConfig;
use crate::core::AccessError;
use argon2::password_hash::SaltString;
use argon2::{Algorithm, Argon2, Params, PasswordHash, PasswordHasher, PasswordVerifier, Version};
use rand::rngs::OsRng;
use std::fmt;

/// The result of issuing a user's first credential.
#[derive(Debug)]
pub struct IssuedCredential {
    pub hash: String,
    pub must_change: bool,
    /// Present only when the secret was generated.
    pub plaintext: Option<TemporarySecret>,
}

/// The result of an administrator-triggered reset. Rotation is always
/// mandatory afterwards.
#[derive(Debug)]
pub struct ResetCredential {
    pub hash: String,
    pub plaintext: TemporarySecret,
}

#[derive(Clone)]
pub struct CredentialPolicy {
    config: CredentialConfig,
    hasher: Argon2<'static>,
}

impl fmt::Debug for CredentialPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialPolicy")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl CredentialPolicy {
    pub fn new(config: CredentialConfig) -> Result<Self, AccessError> {
        let params = Params::new(
            config.hash_memory_kib,
            config.hash_iterations,
            config.hash_parallelism,
            None,
        )
        .map_err(|e| AccessError::Internal(format!("Invalid Argon2 parameters: {e}")))?;

        Ok(Self {
            hasher: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
            config,
        })
    }

    pub fn config(&self) -> &CredentialConfig {
        &self.config
    }

    /// Checks a supplied secret against the length bounds. Lengths are counted
    /// in characters; out-of-range secrets are rejected, never adjusted.
    pub fn validate(&self, secret: &str) -> Result<(), AccessError> {
        let len = secret.chars().count();
        if len < self.config.min_length {
            return Err(AccessError::InvalidCredential(format!(
                "password must be at least {} characters",
                self.config.min_length
            )));
        }
        if len > self.config.max_length {
            return Err(AccessError::InvalidCredential(format!(
                "password must be at most {} characters",
                self.config.max_length
            )));
        }
        Ok(())
    }

    /// Issues the credential for a new account. A supplied secret is validated
    /// and hashed; without one, a temporary secret is generated and rotation is
    /// required on first use.
    pub fn issue_initial(&self, provided: Option<&str>) -> Result<IssuedCredential, AccessError> {
        match provided {
            Some(secret) => {
                self.validate(secret)?;
                Ok(IssuedCredential {
                    hash: self.hash(secret)?,
                    must_change: false,
                    plaintext: None,
                })
            }
            None => {
                let generated = self.generate();
                Ok(IssuedCredential {
                    hash: self.hash(generated.expose())?,
                    must_change: true,
                    plaintext: Some(generated),
                })
            }
        }
    }

    /// Generates and hashes a fresh temporary secret. Each call yields a
    /// different plaintext.
    pub fn reset(&self) -> Result<ResetCredential, AccessError> {
        let plaintext = self.generate();
        Ok(ResetCredential {
            hash: self.hash(plaintext.expose())?,
            plaintext,
        })
    }

    /// Validates and hashes a user-chosen replacement secret.
    pub fn rotate(&self, new_secret: &str) -> Result<String, AccessError> {
        self.validate(new_secret)?;
        self.hash(new_secret)
    }

    /// Verifies `secret` against a stored PHC hash. A malformed hash never
    /// verifies.
    pub fn verify(&self, secret: &str, hash: &str) -> bool {
        match PasswordHash::new(hash) {
            Ok(parsed) => self
                .hasher
                .verify_password(secret.as_bytes(), &parsed)
                .is_ok(),
            Err(_) => false,
        }
    }

    fn generate(&self) -> TemporarySecret {
        TemporarySecret::generate(self.config.generated_length)
    }

    fn hash(&self, secret: &str) -> Result<String, AccessError> {
        let salt = SaltString::generate(&mut OsRng);
        Ok(self
            .hasher
            .hash_password(secret.as_bytes(), &salt)?
            .to_string())
    }
}
