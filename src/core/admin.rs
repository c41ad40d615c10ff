//! Administrative actions on principals

use chrono::Utc;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::auth::identifier::IdentifierGenerator;
use crate::auth::password::PasswordHasher;
use crate::auth::principal::{PrincipalSummary, ProfileUpdate};
use crate::auth::role::{AccountStatus, Role};
use crate::core::guard::AuthContext;
use crate::core::provisioning::StudentProvisioning;
use crate::core::session::{validate_new_password, Registration};
use crate::error::{CampusError, Result, StoreError};
use crate::security::events::{log_security_event, SecurityEvent};
use crate::storage::token_revocation::{RevocationReason, SharedTokenRevocationStore};
use crate::storage::traits::{PrincipalFilter, PrincipalStore, SequenceStore};

/// Head counts for the admin dashboard
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStats {
    pub total_users: usize,
    pub active_users: usize,
    /// Active students
    pub total_students: usize,
    /// Active faculty
    pub total_faculty: usize,
    pub users_by_role: BTreeMap<String, usize>,
}

pub struct UserAdministration {
    store: Arc<dyn PrincipalStore>,
    identifiers: IdentifierGenerator,
    hasher: Arc<PasswordHasher>,
    revocations: SharedTokenRevocationStore,
    provisioning: Arc<StudentProvisioning>,
}

impl UserAdministration {
    pub fn new(
        store: Arc<dyn PrincipalStore>,
        sequences: Arc<dyn SequenceStore>,
        hasher: Arc<PasswordHasher>,
        revocations: SharedTokenRevocationStore,
        provisioning: Arc<StudentProvisioning>,
    ) -> Self {
        Self {
            store,
            identifiers: IdentifierGenerator::new(sequences),
            hasher,
            revocations,
            provisioning,
        }
    }

    pub async fn get(&self, principal_id: &str) -> Result<PrincipalSummary> {
        self.store
            .find_by_id(principal_id)
            .await?
            .map(|p| p.summary())
            .ok_or_else(|| not_found(principal_id))
    }

    /// Newest first
    pub async fn list(&self, filter: &PrincipalFilter) -> Result<Vec<PrincipalSummary>> {
        Ok(self
            .store
            .list(filter)
            .await?
            .iter()
            .map(|p| p.summary())
            .collect())
    }

    pub async fn stats(&self) -> Result<UserStats> {
        let everyone = self.store.list(&PrincipalFilter::default()).await?;
        let mut stats = UserStats {
            total_users: everyone.len(),
            active_users: 0,
            total_students: 0,
            total_faculty: 0,
            users_by_role: BTreeMap::new(),
        };
        for principal in &everyone {
            *stats
                .users_by_role
                .entry(principal.role.as_str().to_string())
                .or_insert(0) += 1;
            if !principal.status.is_active() {
                continue;
            }
            stats.active_users += 1;
            match principal.role {
                Role::Student => stats.total_students += 1,
                Role::Faculty => stats.total_faculty += 1,
                _ => {}
            }
        }
        Ok(stats)
    }

    /// Creates an account on someone's behalf. Same id allocation and
    /// password policy as self-registration; students get a wallet.
    pub async fn create_user(
        &self,
        actor: &AuthContext,
        registration: Registration,
    ) -> Result<PrincipalSummary> {
        let mut registration = registration.validated()?;
        if self.store.email_exists(&registration.email).await? {
            return Err(CampusError::Conflict(
                "User with this email already exists".to_string(),
            ));
        }

        let password = std::mem::take(&mut registration.password);
        let digest = self.hasher.hash_blocking(password).await?;
        let principal = self
            .identifiers
            .insert_with_fresh_id(self.store.as_ref(), registration.into_candidate(digest))
            .await?;

        log_security_event(SecurityEvent::AccountCreated {
            actor: actor.id(),
            principal_id: &principal.id,
            human_id: &principal.human_id,
            role: principal.role,
        });
        self.provisioning.provision(&principal).await;
        Ok(principal.summary())
    }

    /// Edits profile fields and, unlike the self-service path, the role.
    /// Outstanding access tokens then carry a stale role and are refused
    /// until refreshed.
    pub async fn update_user(
        &self,
        actor: &AuthContext,
        principal_id: &str,
        update: ProfileUpdate,
    ) -> Result<PrincipalSummary> {
        let update = update.normalized()?;
        if update.is_empty() {
            return Err(CampusError::ValidationError("No fields to update".to_string()));
        }
        let updated = self
            .store
            .update_profile(principal_id, update)
            .await
            .map_err(|e| store_error(e, principal_id))?;
        log::info!("Principal {} updated user {}", actor.id(), principal_id);
        Ok(updated.summary())
    }

    /// Sets a new password without knowing the old one. Existing sessions
    /// are left alone; pair with [`revoke_sessions`](Self::revoke_sessions)
    /// for a compromised account.
    pub async fn reset_password(
        &self,
        actor: &AuthContext,
        principal_id: &str,
        new_password: String,
    ) -> Result<PrincipalSummary> {
        validate_new_password(&new_password)?;
        let principal = self
            .store
            .find_by_id(principal_id)
            .await?
            .ok_or_else(|| not_found(principal_id))?;

        let digest = self.hasher.hash_blocking(new_password).await?;
        self.store
            .update_password_digest(&principal.id, digest)
            .await
            .map_err(|e| store_error(e, principal_id))?;

        log_security_event(SecurityEvent::PasswordReset {
            actor: actor.id(),
            principal_id: &principal.id,
        });
        Ok(principal.summary())
    }

    /// Changes account status. Leaving `active` also ends every session.
    pub async fn set_status(
        &self,
        actor: &AuthContext,
        principal_id: &str,
        status: AccountStatus,
    ) -> Result<PrincipalSummary> {
        let updated = self
            .store
            .set_status(principal_id, status)
            .await
            .map_err(|e| store_error(e, principal_id))?;

        log::info!(
            "Principal {} set status of {} to {}",
            actor.id(),
            principal_id,
            status.as_str()
        );

        if !status.is_active() {
            self.revoke(principal_id, RevocationReason::AccountSuspension)
                .await?;
        }
        Ok(updated.summary())
    }

    /// Forced logout without a status change
    pub async fn revoke_sessions(&self, actor: &AuthContext, principal_id: &str) -> Result<()> {
        if self.store.find_by_id(principal_id).await?.is_none() {
            return Err(not_found(principal_id));
        }
        log::info!("Principal {} revoked sessions of {}", actor.id(), principal_id);
        self.revoke(principal_id, RevocationReason::AdminRevocation)
            .await
    }

    /// Returns how many principals are still waiting for a wallet
    pub async fn retry_provisioning(&self) -> Result<usize> {
        self.provisioning.retry_pending(self.store.as_ref()).await
    }

    async fn revoke(&self, principal_id: &str, reason: RevocationReason) -> Result<()> {
        self.revocations
            .revoke_principal(principal_id, Utc::now(), reason)
            .await?;
        log_security_event(SecurityEvent::TokensRevoked {
            principal_id,
            reason: match reason {
                RevocationReason::AccountSuspension => "account suspension",
                _ => "admin revocation",
            },
        });
        Ok(())
    }
}

fn not_found(principal_id: &str) -> CampusError {
    CampusError::NotFound(format!("principal {}", principal_id))
}

fn store_error(err: StoreError, principal_id: &str) -> CampusError {
    match err {
        StoreError::NotFound => not_found(principal_id),
        other => other.into(),
    }
}
