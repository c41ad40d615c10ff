//! Application state that wires the components together for the HTTP layer

use std::sync::Arc;

use crate::auth::password::PasswordHasher;
use crate::auth::token::TokenService;
use crate::config::ServerConfig;
use crate::core::admin::UserAdministration;
use crate::core::guard::AuthorizationGuard;
use crate::core::provisioning::StudentProvisioning;
use crate::core::session::SessionController;
use crate::error::Result;
use crate::storage::memory::{MemoryPrincipalStore, MemorySequenceStore, MemoryWalletProvisioner};
use crate::storage::token_revocation::{MemoryTokenRevocationStore, SharedTokenRevocationStore};
use crate::storage::traits::{PrincipalStore, SequenceStore, WalletProvisioner};

/// Storage backends the core runs against
pub struct Backends {
    pub principals: Arc<dyn PrincipalStore>,
    pub sequences: Arc<dyn SequenceStore>,
    pub wallets: Arc<dyn WalletProvisioner>,
    pub revocations: SharedTokenRevocationStore,
}

/// Shared, cheaply clonable state handed to every filter
#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionController>,
    pub guard: Arc<AuthorizationGuard>,
    pub admin: Arc<UserAdministration>,
    /// Path segment after `/api/`
    pub api_version: String,
    pub development_mode: bool,
}

impl AppState {
    pub fn new(config: &ServerConfig, backends: Backends) -> Result<Self> {
        let hasher = Arc::new(PasswordHasher::new(config.hash_cost())?);
        let tokens = Arc::new(TokenService::new(&config.token_settings()));
        let provisioning = Arc::new(StudentProvisioning::new(
            backends.wallets,
            config.daily_spending_limit,
        ));

        let sessions = SessionController::new(
            config,
            backends.principals.clone(),
            hasher.clone(),
            tokens.clone(),
            backends.sequences.clone(),
            backends.revocations.clone(),
            provisioning.clone(),
        );
        let guard = AuthorizationGuard::new(
            tokens,
            backends.principals.clone(),
            backends.revocations.clone(),
        );
        let admin = UserAdministration::new(
            backends.principals,
            backends.sequences,
            hasher,
            backends.revocations,
            provisioning,
        );

        Ok(Self {
            sessions: Arc::new(sessions),
            guard: Arc::new(guard),
            admin: Arc::new(admin),
            api_version: config.api_version.clone(),
            development_mode: config.development_mode,
        })
    }

    /// Everything in memory. Starts the deny-list cleanup task, so this must
    /// be called inside a Tokio runtime.
    pub fn in_memory(config: &ServerConfig) -> Result<Self> {
        let revocations = Arc::new(MemoryTokenRevocationStore::new(config.refresh_token_ttl));
        revocations
            .clone()
            .start_cleanup_task(config.revocation_cleanup_interval);

        Self::new(
            config,
            Backends {
                principals: Arc::new(MemoryPrincipalStore::new()),
                sequences: Arc::new(MemorySequenceStore::new()),
                wallets: Arc::new(MemoryWalletProvisioner::new()),
                revocations,
            },
        )
    }
}
