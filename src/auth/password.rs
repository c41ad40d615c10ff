//! Salted, cost-parameterised password hashing (Argon2id)

use argon2::password_hash::{self, PasswordHash, SaltString};
use argon2::{Algorithm, Argon2, Params, PasswordHasher as _, PasswordVerifier as _, Version};
use rand::rngs::OsRng;
use std::sync::Arc;

use crate::error::HashError;

/// Work-factor knobs for Argon2id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashCost {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

/// Hashes and verifies passwords. Digests are PHC strings, so the salt and
/// the cost that produced them travel with the digest.
#[derive(Clone)]
pub struct PasswordHasher {
    argon2: Argon2<'static>,
    /// Verified against when the looked-up principal does not exist
    dummy_digest: String,
}

impl PasswordHasher {
    pub fn new(cost: HashCost) -> Result<Self, HashError> {
        let params = Params::new(cost.memory_kib, cost.iterations, cost.parallelism, None)
            .map_err(|e| HashError::Hashing(format!("invalid cost parameters: {}", e)))?;
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

        let mut hasher = Self {
            argon2,
            dummy_digest: String::new(),
        };
        hasher.dummy_digest = hasher.hash("dummy-password-for-timing-equalisation")?;
        Ok(hasher)
    }

    pub fn hash(&self, plaintext: &str) -> Result<String, HashError> {
        let salt = SaltString::generate(&mut OsRng);
        self.argon2
            .hash_password(plaintext.as_bytes(), &salt)
            .map(|digest| digest.to_string())
            .map_err(|e| HashError::Hashing(e.to_string()))
    }

    /// Returns `Ok(false)` on mismatch and `Err(CorruptDigest)` when the
    /// stored digest cannot be parsed. Comparison is constant-time inside
    /// `password-hash`.
    pub fn verify(&self, plaintext: &str, digest: &str) -> Result<bool, HashError> {
        let parsed = PasswordHash::new(digest).map_err(|_| HashError::CorruptDigest)?;
        match self.argon2.verify_password(plaintext.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(password_hash::Error::Password) => Ok(false),
            Err(_) => Err(HashError::CorruptDigest),
        }
    }

    /// Burns the same CPU as a real verification; always false
    pub fn verify_dummy(&self, plaintext: &str) -> bool {
        let _ = self.verify(plaintext, &self.dummy_digest);
        false
    }

    /// [`hash`](Self::hash) on the blocking pool
    pub async fn hash_blocking(self: &Arc<Self>, plaintext: String) -> Result<String, HashError> {
        let hasher = Arc::clone(self);
        tokio::task::spawn_blocking(move || hasher.hash(&plaintext))
            .await
            .map_err(|e| HashError::Hashing(format!("hashing task failed: {}", e)))?
    }

    /// [`verify`](Self::verify) on the blocking pool
    pub async fn verify_blocking(
        self: &Arc<Self>,
        plaintext: String,
        digest: String,
    ) -> Result<bool, HashError> {
        let hasher = Arc::clone(self);
        tokio::task::spawn_blocking(move || hasher.verify(&plaintext, &digest))
            .await
            .map_err(|e| HashError::Hashing(format!("verification task failed: {}", e)))?
    }

    pub async fn verify_dummy_blocking(self: &Arc<Self>, plaintext: String) {
        let hasher = Arc::clone(self);
        if let Err(e) = tokio::task::spawn_blocking(move || hasher.verify_dummy(&plaintext)).await {
            log::warn!("Dummy verification task failed: {}", e);
        }
    }
}
