//! Authentication primitives: roles, principals, passwords, tokens, user ids

pub mod identifier;
pub mod password;
pub mod principal;
pub mod role;
pub mod token;

// Re-export main components
pub use identifier::IdentifierGenerator;
pub use password::{HashCost, PasswordHasher};
pub use principal::{NewPrincipal, Principal, PrincipalSummary, ProfileUpdate};
pub use role::{AccountStatus, Role, RoleSet};
pub use token::{Claims, TokenClass, TokenService};
