//! Best-effort creation of records other subsystems expect to exist for a
//! new principal (currently: the student wallet). Failures never fail the
//! registration; they are logged and queued for operator retry.

use chrono::Utc;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::auth::principal::Principal;
use crate::auth::role::Role;
use crate::constants::DEFAULT_MONTHLY_SPENDING_LIMIT;
use crate::error::Result;
use crate::security::events::{log_security_event, SecurityEvent};
use crate::storage::traits::{PrincipalStore, StudentWallet, WalletProvisioner};

pub struct StudentProvisioning {
    wallets: Arc<dyn WalletProvisioner>,
    daily_spending_limit: u64,
    /// Principal ids whose wallet could not be created
    pending: Mutex<Vec<String>>,
}

impl StudentProvisioning {
    pub fn new(wallets: Arc<dyn WalletProvisioner>, daily_spending_limit: u64) -> Self {
        Self {
            wallets,
            daily_spending_limit,
            pending: Mutex::new(Vec::new()),
        }
    }

    /// Runs post-create provisioning for `principal`. Returns whether it
    /// succeeded; on failure the principal is queued.
    pub async fn provision(&self, principal: &Principal) -> bool {
        if principal.role != Role::Student {
            return true;
        }
        match self.wallets.create_wallet(self.wallet_for(principal)).await {
            Ok(()) => true,
            Err(e) => {
                log_security_event(SecurityEvent::ProvisioningFailed {
                    principal_id: &principal.id,
                    error: e.to_string(),
                });
                let mut pending = self.pending.lock().await;
                if !pending.contains(&principal.id) {
                    pending.push(principal.id.clone());
                }
                false
            }
        }
    }

    pub async fn pending(&self) -> Vec<String> {
        self.pending.lock().await.clone()
    }

    /// Retries every queued principal; returns how many remain queued
    pub async fn retry_pending(&self, store: &dyn PrincipalStore) -> Result<usize> {
        let queued = std::mem::take(&mut *self.pending.lock().await);
        let mut still_pending = Vec::new();

        for (idx, principal_id) in queued.iter().enumerate() {
            let principal = match store.find_by_id(principal_id).await {
                Ok(Some(principal)) => principal,
                Ok(None) => {
                    log::warn!("Dropping provisioning for vanished principal {}", principal_id);
                    continue;
                }
                Err(e) => {
                    // Put back everything not yet attempted before bailing out
                    still_pending.extend(queued[idx..].iter().cloned());
                    self.pending.lock().await.extend(still_pending);
                    return Err(e.into());
                }
            };
            if let Err(e) = self.wallets.create_wallet(self.wallet_for(&principal)).await {
                log::warn!("Wallet provisioning retry failed for {}: {}", principal_id, e);
                still_pending.push(principal_id.clone());
            }
        }

        let mut pending = self.pending.lock().await;
        pending.extend(still_pending);
        let remaining = pending.len();
        log::info!(
            "Provisioning retry finished: {} attempted, {} still pending",
            queued.len(),
            remaining
        );
        Ok(remaining)
    }

    fn wallet_for(&self, principal: &Principal) -> StudentWallet {
        StudentWallet {
            wallet_id: format!("WALLET-{}", principal.human_id),
            principal_id: principal.id.clone(),
            balance: 0,
            daily_spending_limit: self.daily_spending_limit,
            monthly_spending_limit: DEFAULT_MONTHLY_SPENDING_LIMIT,
            created_at: Utc::now(),
        }
    }
}
