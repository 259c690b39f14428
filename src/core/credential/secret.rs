// src/core/credential/secret.rs

use rand::Rng;
use rand::rngs::OsRng;
use serde::{Serialize, Serializer};
use std::fmt;

/// The URL-safe alphabet temporary secrets are drawn from (64 symbols,
/// 6 bits of entropy per character).
const SECRET_ALPHABET: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_";

/// A generated plaintext secret handed to the caller exactly once.
///
/// It is never stored by the directory. `Debug` is redacted so the value cannot
/// leak through logs; the plaintext is only reachable through [`expose`] or
/// by consuming the value.
///
/// [`expose`]: TemporarySecret::expose
#[derive(Clone, PartialEq, Eq)]
pub struct TemporarySecret(String);

impl TemporarySecret {
    /// Generates a new secret of `len` characters using the OS RNG.
    pub fn generate(len: usize) -> Self {
        let mut rng = OsRng;
        let secret: String = (0..len)
            .map(|_| SECRET_ALPHABET[rng.gen_range(0..SECRET_ALPHABET.len())] as char)
            .collect();
        TemporarySecret(secret)
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Debug for TemporarySecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("TemporarySecret(<redacted>)")
    }
}

// Serialized as the bare plaintext, for the single response that carries it.
impl Serialize for TemporarySecret {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}
