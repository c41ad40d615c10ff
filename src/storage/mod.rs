//! Storage interfaces and their in-memory implementations

pub mod memory;
pub mod token_revocation;
pub mod traits;

pub use memory::{MemoryPrincipalStore, MemorySequenceStore, MemoryWalletProvisioner};
pub use token_revocation::{MemoryTokenRevocationStore, SharedTokenRevocationStore, TokenRevocationStore};
pub use traits::{
    PrincipalFilter, PrincipalStore, SequenceStore, StoreResult, StudentWallet, WalletProvisioner,
};
