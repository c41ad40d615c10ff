//! In-memory storage implementation for development and testing
//!
//! Uniqueness and counter atomicity come from holding a single write lock
//! across check-and-insert, which is the same guarantee a unique index and
//! an atomic `$inc` give in a document store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::traits::*;
use crate::auth::principal::{NewPrincipal, Principal, ProfileUpdate};
use crate::auth::role::{AccountStatus, Role};
use crate::error::{StoreError, UniqueField};

#[derive(Default)]
struct PrincipalTables {
    by_id: HashMap<String, Principal>,
    email_index: HashMap<String, String>,    // email -> id
    human_id_index: HashMap<String, String>, // human_id -> id
}

/// In-memory credential store
pub struct MemoryPrincipalStore {
    tables: Arc<RwLock<PrincipalTables>>,
    available: AtomicBool,
}

impl MemoryPrincipalStore {
    pub fn new() -> Self {
        Self {
            tables: Arc::new(RwLock::new(PrincipalTables::default())),
            available: AtomicBool::new(true),
        }
    }

    /// Simulate a store outage
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub async fn len(&self) -> usize {
        self.tables.read().await.by_id.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn check_available(&self) -> StoreResult<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable("memory store marked unavailable".to_string()))
        }
    }
}

impl Default for MemoryPrincipalStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PrincipalStore for MemoryPrincipalStore {
    async fn insert(&self, new: NewPrincipal) -> StoreResult<Principal> {
        self.check_available()?;
        let mut tables = self.tables.write().await;

        if tables.email_index.contains_key(&new.email) {
            return Err(StoreError::Duplicate(UniqueField::Email));
        }
        if tables.human_id_index.contains_key(&new.human_id) {
            return Err(StoreError::Duplicate(UniqueField::HumanId));
        }

        let principal = Principal {
            id: Uuid::new_v4().to_string(),
            human_id: new.human_id,
            email: new.email,
            password_digest: new.password_digest,
            name: new.name,
            phone: new.phone,
            department: new.department,
            role: new.role,
            status: new.status,
            last_login_at: None,
            created_at: Utc::now(),
            attributes: new.attributes,
        };

        tables
            .email_index
            .insert(principal.email.clone(), principal.id.clone());
        tables
            .human_id_index
            .insert(principal.human_id.clone(), principal.id.clone());
        tables.by_id.insert(principal.id.clone(), principal.clone());

        Ok(principal)
    }

    async fn find_by_id(&self, id: &str) -> StoreResult<Option<Principal>> {
        self.check_available()?;
        Ok(self.tables.read().await.by_id.get(id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<Principal>> {
        self.check_available()?;
        let tables = self.tables.read().await;
        Ok(tables
            .email_index
            .get(email)
            .and_then(|id| tables.by_id.get(id))
            .cloned())
    }

    async fn find_by_human_id(&self, human_id: &str) -> StoreResult<Option<Principal>> {
        self.check_available()?;
        let tables = self.tables.read().await;
        Ok(tables
            .human_id_index
            .get(human_id)
            .and_then(|id| tables.by_id.get(id))
            .cloned())
    }

    async fn record_login(&self, id: &str, at: DateTime<Utc>) -> StoreResult<()> {
        self.check_available()?;
        let mut tables = self.tables.write().await;
        let principal = tables.by_id.get_mut(id).ok_or(StoreError::NotFound)?;
        principal.last_login_at = Some(at);
        Ok(())
    }

    async fn update_password_digest(&self, id: &str, digest: String) -> StoreResult<()> {
        self.check_available()?;
        let mut tables = self.tables.write().await;
        let principal = tables.by_id.get_mut(id).ok_or(StoreError::NotFound)?;
        principal.password_digest = digest;
        Ok(())
    }

    async fn set_status(&self, id: &str, status: AccountStatus) -> StoreResult<Principal> {
        self.check_available()?;
        let mut tables = self.tables.write().await;
        let principal = tables.by_id.get_mut(id).ok_or(StoreError::NotFound)?;
        principal.status = status;
        Ok(principal.clone())
    }

    async fn update_profile(&self, id: &str, update: ProfileUpdate) -> StoreResult<Principal> {
        self.check_available()?;
        let mut tables = self.tables.write().await;
        let principal = tables.by_id.get_mut(id).ok_or(StoreError::NotFound)?;
        update.apply(principal);
        Ok(principal.clone())
    }

    async fn list(&self, filter: &PrincipalFilter) -> StoreResult<Vec<Principal>> {
        self.check_available()?;
        let tables = self.tables.read().await;
        let mut found: Vec<Principal> = tables
            .by_id
            .values()
            .filter(|p| filter.matches(p))
            .cloned()
            .collect();
        found.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.human_id.cmp(&a.human_id))
        });
        Ok(found)
    }
}

/// In-memory per-(role, year) counters
pub struct MemorySequenceStore {
    counters: RwLock<HashMap<(Role, i32), u64>>,
}

impl MemorySequenceStore {
    pub fn new() -> Self {
        Self {
            counters: RwLock::new(HashMap::new()),
        }
    }

    /// Start a counter at `value` so the next allocation yields `value + 1`
    pub async fn seed(&self, role: Role, year: i32, value: u64) {
        self.counters.write().await.insert((role, year), value);
    }
}

impl Default for MemorySequenceStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SequenceStore for MemorySequenceStore {
    async fn next_value(&self, role: Role, year: i32) -> StoreResult<u64> {
        let mut counters = self.counters.write().await;
        let counter = counters.entry((role, year)).or_insert(0);
        *counter += 1;
        Ok(*counter)
    }
}

/// In-memory wallet provisioning
pub struct MemoryWalletProvisioner {
    wallets: RwLock<HashMap<String, StudentWallet>>, // principal_id -> wallet
    available: AtomicBool,
}

impl MemoryWalletProvisioner {
    pub fn new() -> Self {
        Self {
            wallets: RwLock::new(HashMap::new()),
            available: AtomicBool::new(true),
        }
    }

    /// Simulate an outage of the wallet backend
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub async fn wallet_for(&self, principal_id: &str) -> Option<StudentWallet> {
        self.wallets.read().await.get(principal_id).cloned()
    }
}

impl Default for MemoryWalletProvisioner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WalletProvisioner for MemoryWalletProvisioner {
    async fn create_wallet(&self, wallet: StudentWallet) -> StoreResult<()> {
        if !self.available.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("wallet backend unavailable".to_string()));
        }
        // Idempotent so provisioning retries are safe
        self.wallets
            .write()
            .await
            .entry(wallet.principal_id.clone())
            .or_insert(wallet);
        Ok(())
    }
}
