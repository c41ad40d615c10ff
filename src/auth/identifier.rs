//! Role-prefixed, year-scoped, sequential display identifiers
//!
//! `STU2024007` = prefix for the role, the current year, and a zero-padded
//! sequence number. The number comes from an atomic counter per
//! (role, year), never from counting existing records.

use chrono::{Datelike, Utc};
use std::sync::Arc;

use crate::auth::principal::{NewPrincipal, Principal};
use crate::auth::role::Role;
use crate::constants::{HUMAN_ID_SEQUENCE_WIDTH, MAX_ID_ALLOCATION_ATTEMPTS};
use crate::error::{CampusError, StoreError, UniqueField};
use crate::storage::traits::{PrincipalStore, SequenceStore};

pub struct IdentifierGenerator {
    sequences: Arc<dyn SequenceStore>,
}

impl IdentifierGenerator {
    pub fn new(sequences: Arc<dyn SequenceStore>) -> Self {
        Self { sequences }
    }

    /// Next identifier for `role` in the current year
    pub async fn next(&self, role: Role) -> Result<String, StoreError> {
        self.next_for_year(role, Utc::now().year()).await
    }

    pub async fn next_for_year(&self, role: Role, year: i32) -> Result<String, StoreError> {
        let sequence = self.sequences.next_value(role, year).await?;
        Ok(format_human_id(role, year, sequence))
    }

    /// Inserts `candidate` under a freshly drawn identifier, drawing again
    /// when the store already holds that identifier. Whatever `human_id` the
    /// candidate carries is replaced.
    pub async fn insert_with_fresh_id(
        &self,
        store: &dyn PrincipalStore,
        mut candidate: NewPrincipal,
    ) -> crate::error::Result<Principal> {
        let role = candidate.role;
        for attempt in 1..=MAX_ID_ALLOCATION_ATTEMPTS {
            candidate.human_id = self.next(role).await?;
            match store.insert(candidate.clone()).await {
                Ok(stored) => return Ok(stored),
                // Counter fell behind records written by other means; draw again
                Err(StoreError::Duplicate(UniqueField::HumanId)) => {
                    log::warn!(
                        "User id collision for role {} (attempt {}/{})",
                        role,
                        attempt,
                        MAX_ID_ALLOCATION_ATTEMPTS
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(CampusError::SystemError(format!(
            "could not allocate a unique user id for role {}",
            role
        )))
    }
}

pub fn format_human_id(role: Role, year: i32, sequence: u64) -> String {
    format!(
        "{}{}{:0width$}",
        role.id_prefix(),
        year,
        sequence,
        width = HUMAN_ID_SEQUENCE_WIDTH
    )
}
