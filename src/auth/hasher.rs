//! Salted SHA-256 credential hashing.
//!
//! Encoded form: standard Base64 of `salt || SHA-256(salt || password)`,
//! with a 32-byte salt drawn from the operating system RNG.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use miette::Diagnostic;
use rand::TryRngCore;
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use thiserror::Error;

/// Salt length in bytes.
pub const SALT_LEN: usize = 32;

#[derive(Error, Diagnostic, Debug)]
pub enum CredentialError {
    #[error("Secure random source unavailable: {message}")]
    #[diagnostic(
        code(todos::auth::random_source),
        help("The operating system did not provide random bytes for a password salt")
    )]
    RandomSource { message: String },
}

/// One-way password hasher.
#[derive(Debug, Clone, Copy, Default)]
pub struct CredentialHasher;

impl CredentialHasher {
    pub fn new() -> Self {
        Self
    }

    /// Hash `password` with a fresh random salt.
    pub fn hash(&self, password: &str) -> Result<String, CredentialError> {
        let mut salt = [0u8; SALT_LEN];
        OsRng
            .try_fill_bytes(&mut salt)
            .map_err(|e| CredentialError::RandomSource {
                message: e.to_string(),
            })?;

        let digest = digest(&salt, password);

        let mut encoded = Vec::with_capacity(SALT_LEN + digest.len());
        encoded.extend_from_slice(&salt);
        encoded.extend_from_slice(&digest);
        Ok(BASE64_STANDARD.encode(encoded))
    }

    /// Check `password` against an encoded hash.
    ///
    /// Malformed input verifies as `false` rather than failing.
    pub fn verify(&self, password: &str, encoded: &str) -> bool {
        let Ok(decoded) = BASE64_STANDARD.decode(encoded) else {
            return false;
        };
        if decoded.len() < SALT_LEN {
            return false;
        }

        let (salt, stored) = decoded.split_at(SALT_LEN);
        let computed = digest(salt, password);
        computed.as_slice().ct_eq(stored).into()
    }
}

fn digest(salt: &[u8], password: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(password.as_bytes());
    hasher.finalize().to_vec()
}
