//! Security-focused logging of authentication and authorization events
//!
//! Events go to the `security` log target so operators can route or filter
//! them separately (`RUST_LOG=security=info`). Never pass raw passwords or
//! raw tokens into an event.

use crate::auth::role::{Role, RoleSet};

pub const SECURITY_TARGET: &str = "security";

/// Types of security events to track
#[derive(Debug, Clone)]
pub enum SecurityEvent<'a> {
    // Authentication events
    LoginSucceeded { principal_id: &'a str, role: Role },
    LoginFailed { identifier: &'a str, reason: &'a str },
    LoginThrottled { identifier: &'a str },
    TokenRejected { reason: String },
    CorruptCredential { principal_id: &'a str },

    // Authorization events
    AccessDenied { principal_id: &'a str, role: Role, allowed: RoleSet },
    InactiveAccount { principal_id: &'a str },

    // Lifecycle events
    Registered { principal_id: &'a str, human_id: &'a str, role: Role },
    AccountCreated { actor: &'a str, principal_id: &'a str, human_id: &'a str, role: Role },
    PasswordChanged { principal_id: &'a str },
    PasswordReset { actor: &'a str, principal_id: &'a str },
    TokensRevoked { principal_id: &'a str, reason: &'a str },
    ProvisioningFailed { principal_id: &'a str, error: String },
}

/// Log a security event at a level matching its severity
pub fn log_security_event(event: SecurityEvent<'_>) {
    match event {
        SecurityEvent::LoginSucceeded { principal_id, role } => {
            log::info!(target: SECURITY_TARGET, "login ok principal={} role={}", principal_id, role)
        }
        SecurityEvent::LoginFailed { identifier, reason } => {
            log::warn!(target: SECURITY_TARGET, "login failed identifier={} reason={}", identifier, reason)
        }
        SecurityEvent::LoginThrottled { identifier } => {
            log::warn!(target: SECURITY_TARGET, "login throttled identifier={}", identifier)
        }
        SecurityEvent::TokenRejected { reason } => {
            log::info!(target: SECURITY_TARGET, "token rejected reason={}", reason)
        }
        SecurityEvent::CorruptCredential { principal_id } => {
            log::error!(target: SECURITY_TARGET, "corrupt password digest principal={}", principal_id)
        }
        SecurityEvent::AccessDenied { principal_id, role, allowed } => log::warn!(
            target: SECURITY_TARGET,
            "access denied principal={} role={} allowed={:?}",
            principal_id,
            role,
            allowed.roles()
        ),
        SecurityEvent::InactiveAccount { principal_id } => {
            log::warn!(target: SECURITY_TARGET, "inactive account rejected principal={}", principal_id)
        }
        SecurityEvent::Registered { principal_id, human_id, role } => log::info!(
            target: SECURITY_TARGET,
            "registered principal={} user_id={} role={}",
            principal_id,
            human_id,
            role
        ),
        SecurityEvent::AccountCreated { actor, principal_id, human_id, role } => log::info!(
            target: SECURITY_TARGET,
            "account created by={} principal={} user_id={} role={}",
            actor,
            principal_id,
            human_id,
            role
        ),
        SecurityEvent::PasswordReset { actor, principal_id } => {
            log::warn!(target: SECURITY_TARGET, "password reset by={} principal={}", actor, principal_id)
        }
        SecurityEvent::PasswordChanged { principal_id } => {
            log::info!(target: SECURITY_TARGET, "password changed principal={}", principal_id)
        }
        SecurityEvent::TokensRevoked { principal_id, reason } => {
            log::info!(target: SECURITY_TARGET, "tokens revoked principal={} reason={}", principal_id, reason)
        }
        SecurityEvent::ProvisioningFailed { principal_id, error } => log::error!(
            target: SECURITY_TARGET,
            "wallet provisioning failed principal={} error={} (queued for retry)",
            principal_id,
            error
        ),
    }
}
