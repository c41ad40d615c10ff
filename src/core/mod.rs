//! Core services composed from the auth primitives and the stores

pub mod admin;
pub mod guard;
pub mod provisioning;
pub mod rate_limiter;
pub mod server;
pub mod session;

// Re-export main components for convenience
pub use admin::{UserAdministration, UserStats};
pub use guard::{AuthContext, AuthorizationGuard};
pub use provisioning::StudentProvisioning;
pub use rate_limiter::{LoginThrottle, Reservation};
pub use server::{AppState, Backends};
pub use session::{LoginAttempt, LoginIdentifier, Registration, SessionController, SessionGrant};
