//! Abstract storage interfaces for pluggable backends
//!
//! The auth core only needs a keyed record repository with lookups by unique
//! field, a handful of targeted updates, and one atomic counter primitive.
//! Any document store that offers unique indexes and an atomic
//! increment-and-fetch can back these traits.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::principal::{NewPrincipal, Principal, ProfileUpdate};
use crate::auth::role::{AccountStatus, Role};
use crate::error::StoreError;

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Listing criteria; every given field must match
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrincipalFilter {
    pub role: Option<Role>,
    pub status: Option<AccountStatus>,
    pub department: Option<String>,
}

impl PrincipalFilter {
    pub fn matches(&self, principal: &Principal) -> bool {
        self.role.map_or(true, |role| principal.role == role)
            && self.status.map_or(true, |status| principal.status == status)
            && self
                .department
                .as_deref()
                .map_or(true, |dept| principal.department.as_deref() == Some(dept))
    }
}

/// Credential store interface
#[async_trait]
pub trait PrincipalStore: Send + Sync {
    /// Insert a principal, enforcing uniqueness of email and human id.
    /// Assigns and returns the stored record including its `id`.
    async fn insert(&self, principal: NewPrincipal) -> StoreResult<Principal>;

    /// Get principal by store id
    async fn find_by_id(&self, id: &str) -> StoreResult<Option<Principal>>;

    /// Get principal by (already normalised) email
    async fn find_by_email(&self, email: &str) -> StoreResult<Option<Principal>>;

    /// Get principal by human-readable id
    async fn find_by_human_id(&self, human_id: &str) -> StoreResult<Option<Principal>>;

    /// Whether an email is already taken
    async fn email_exists(&self, email: &str) -> StoreResult<bool> {
        Ok(self.find_by_email(email).await?.is_some())
    }

    /// Update the advisory last-login timestamp
    async fn record_login(&self, id: &str, at: DateTime<Utc>) -> StoreResult<()>;

    /// Replace the password digest
    async fn update_password_digest(&self, id: &str, digest: String) -> StoreResult<()>;

    /// Administrative status change; returns the updated record
    async fn set_status(&self, id: &str, status: AccountStatus) -> StoreResult<Principal>;

    /// Applies a profile update; returns the updated record
    async fn update_profile(&self, id: &str, update: ProfileUpdate) -> StoreResult<Principal>;

    /// Principals matching `filter`, newest first
    async fn list(&self, filter: &PrincipalFilter) -> StoreResult<Vec<Principal>>;
}

/// Atomic per-role, per-year sequence counters
#[async_trait]
pub trait SequenceStore: Send + Sync {
    /// Atomically increment and return the next value (first call yields 1)
    async fn next_value(&self, role: Role, year: i32) -> StoreResult<u64>;
}

/// Zero-balance wallet created for every new student
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentWallet {
    pub wallet_id: String,
    pub principal_id: String,
    pub balance: u64,
    pub daily_spending_limit: u64,
    pub monthly_spending_limit: u64,
    pub created_at: DateTime<Utc>,
}

/// Provisioning of records owned by other subsystems
#[async_trait]
pub trait WalletProvisioner: Send + Sync {
    async fn create_wallet(&self, wallet: StudentWallet) -> StoreResult<()>;
}
