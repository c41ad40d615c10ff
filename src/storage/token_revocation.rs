//! Token revocation storage and management
//!
//! Bearer tokens are self-contained, so revocation needs a deny-list the
//! guard consults on every request. Two kinds of entries are kept:
//! individual tokens (by `jti`, until the token would have expired anyway)
//! and per-principal cut-offs (every token issued at or before the cut-off
//! is rejected).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::auth::token::Claims;
use crate::storage::traits::StoreResult;

/// Information about a revoked token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevokedToken {
    /// JWT ID (jti)
    pub token_id: String,
    /// Principal who owned the token
    pub principal_id: String,
    /// When the token was revoked
    pub revoked_at: DateTime<Utc>,
    /// When the original token expires (for cleanup)
    pub expires_at: DateTime<Utc>,
    pub reason: RevocationReason,
}

impl RevokedToken {
    pub fn from_claims(claims: &Claims, reason: RevocationReason) -> Self {
        Self {
            token_id: claims.jti.clone(),
            principal_id: claims.sub.clone(),
            revoked_at: Utc::now(),
            expires_at: DateTime::from_timestamp(claims.exp, 0).unwrap_or_else(Utc::now),
            reason,
        }
    }
}

/// Reason for token revocation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RevocationReason {
    /// User initiated logout
    UserLogout,
    /// Refresh token exchanged for a new pair
    Rotated,
    /// Administrative forced logout
    AdminRevocation,
    /// Account suspended or deactivated
    AccountSuspension,
}

/// Token revocation storage trait
#[async_trait]
pub trait TokenRevocationStore: Send + Sync {
    /// Add a token to the revocation list
    async fn revoke_token(&self, revoked_token: RevokedToken) -> StoreResult<()>;

    /// Revoke a single-use token, returning `false` if it was already
    /// revoked. The check and the insert happen atomically.
    async fn consume_token(&self, revoked_token: RevokedToken) -> StoreResult<bool>;

    /// Reject every token for `principal_id` issued at or before `before`
    async fn revoke_principal(
        &self,
        principal_id: &str,
        before: DateTime<Utc>,
        reason: RevocationReason,
    ) -> StoreResult<()>;

    /// Whether the token described by `claims` has been revoked
    async fn is_revoked(&self, claims: &Claims) -> StoreResult<bool>;

    /// Clean up entries whose tokens have expired on their own
    async fn cleanup_expired_revocations(&self) -> StoreResult<usize>;
}

#[derive(Debug, Clone)]
struct PrincipalCutoff {
    before: DateTime<Utc>,
    reason: RevocationReason,
}

/// In-memory implementation of token revocation store
pub struct MemoryTokenRevocationStore {
    /// Map of token_id -> RevokedToken
    revoked_tokens: RwLock<HashMap<String, RevokedToken>>,
    /// principal_id -> cut-off
    cutoffs: RwLock<HashMap<String, PrincipalCutoff>>,
    /// Cut-offs older than this no longer matter (longest token lifetime)
    cutoff_retention: Duration,
}

impl MemoryTokenRevocationStore {
    pub fn new(cutoff_retention: Duration) -> Self {
        Self {
            revoked_tokens: RwLock::new(HashMap::new()),
            cutoffs: RwLock::new(HashMap::new()),
            cutoff_retention,
        }
    }

    /// Start background cleanup task
    pub fn start_cleanup_task(self: Arc<Self>, every: Duration) {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            loop {
                interval.tick().await;
                if let Err(e) = self.cleanup_expired_revocations().await {
                    log::error!("Failed to cleanup expired token revocations: {}", e);
                }
            }
        });
    }

    pub async fn revoked_token_count(&self) -> usize {
        self.revoked_tokens.read().await.len()
    }
}

#[async_trait]
impl TokenRevocationStore for MemoryTokenRevocationStore {
    async fn revoke_token(&self, revoked_token: RevokedToken) -> StoreResult<()> {
        log::debug!(
            "Token {} revoked for principal {} ({:?})",
            revoked_token.token_id,
            revoked_token.principal_id,
            revoked_token.reason
        );
        self.revoked_tokens
            .write()
            .await
            .insert(revoked_token.token_id.clone(), revoked_token);
        Ok(())
    }

    async fn consume_token(&self, revoked_token: RevokedToken) -> StoreResult<bool> {
        let mut revoked_tokens = self.revoked_tokens.write().await;
        if revoked_tokens.contains_key(&revoked_token.token_id) {
            return Ok(false);
        }
        log::debug!(
            "Token {} consumed for principal {} ({:?})",
            revoked_token.token_id,
            revoked_token.principal_id,
            revoked_token.reason
        );
        revoked_tokens.insert(revoked_token.token_id.clone(), revoked_token);
        Ok(true)
    }

    async fn revoke_principal(
        &self,
        principal_id: &str,
        before: DateTime<Utc>,
        reason: RevocationReason,
    ) -> StoreResult<()> {
        let mut cutoffs = self.cutoffs.write().await;
        let entry = cutoffs
            .entry(principal_id.to_string())
            .or_insert(PrincipalCutoff { before, reason });
        // Cut-offs only move forward
        if before >= entry.before {
            entry.before = before;
            entry.reason = reason;
        }
        log::info!(
            "Tokens for principal {} issued up to {} revoked ({:?})",
            principal_id,
            before,
            reason
        );
        Ok(())
    }

    async fn is_revoked(&self, claims: &Claims) -> StoreResult<bool> {
        if self.revoked_tokens.read().await.contains_key(&claims.jti) {
            return Ok(true);
        }
        let cutoffs = self.cutoffs.read().await;
        Ok(cutoffs
            .get(&claims.sub)
            .map(|cutoff| claims.issued_at_millis() <= cutoff.before.timestamp_millis())
            .unwrap_or(false))
    }

    async fn cleanup_expired_revocations(&self) -> StoreResult<usize> {
        let now = Utc::now();
        let mut removed_count = 0;

        {
            let mut revoked_tokens = self.revoked_tokens.write().await;
            let before = revoked_tokens.len();
            revoked_tokens.retain(|_, token| token.expires_at > now);
            removed_count += before - revoked_tokens.len();
        }

        {
            let retention = chrono::Duration::from_std(self.cutoff_retention)
                .unwrap_or_else(|_| chrono::Duration::days(365));
            let mut cutoffs = self.cutoffs.write().await;
            let before = cutoffs.len();
            cutoffs.retain(|_, cutoff| cutoff.before + retention > now);
            removed_count += before - cutoffs.len();
        }

        if removed_count > 0 {
            log::info!("Cleaned up {} expired token revocations", removed_count);
        }

        Ok(removed_count)
    }
}

/// Shared reference to token revocation store
pub type SharedTokenRevocationStore = Arc<dyn TokenRevocationStore>;
