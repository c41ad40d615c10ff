//! Per-request authorization: bearer token -> live principal -> role check

use std::sync::Arc;

use crate::auth::principal::Principal;
use crate::auth::role::{Role, RoleSet};
use crate::auth::token::{extract_bearer_token, Claims, TokenClass, TokenService};
use crate::error::{AuthFailure, CampusError, Result, TokenError};
use crate::security::events::{log_security_event, SecurityEvent};
use crate::storage::token_revocation::SharedTokenRevocationStore;
use crate::storage::traits::PrincipalStore;

/// A request that passed the guard
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// The principal as currently stored, not as the token remembers it
    pub principal: Principal,
    pub claims: Claims,
}

impl AuthContext {
    pub fn id(&self) -> &str {
        &self.principal.id
    }

    pub fn role(&self) -> Role {
        self.principal.role
    }
}

pub struct AuthorizationGuard {
    tokens: Arc<TokenService>,
    store: Arc<dyn PrincipalStore>,
    revocations: SharedTokenRevocationStore,
}

impl AuthorizationGuard {
    pub fn new(
        tokens: Arc<TokenService>,
        store: Arc<dyn PrincipalStore>,
        revocations: SharedTokenRevocationStore,
    ) -> Self {
        Self {
            tokens,
            store,
            revocations,
        }
    }

    /// Authorize a request from its `Authorization` header value.
    ///
    /// Nothing is cached between requests: deletion, suspension and role
    /// changes take effect on the next call.
    pub async fn authorize(&self, header: Option<&str>, allowed: RoleSet) -> Result<AuthContext> {
        let token = match header {
            None => return Err(reject(AuthFailure::MissingToken)),
            Some(value) => extract_bearer_token(value)
                .ok_or_else(|| reject(AuthFailure::Token(TokenError::Malformed)))?,
        };

        let claims = self
            .tokens
            .verify(token, TokenClass::Access)
            .map_err(|e| reject(AuthFailure::Token(e)))?;

        if self.revocations.is_revoked(&claims).await? {
            return Err(reject(AuthFailure::Revoked));
        }

        let principal = self
            .store
            .find_by_id(&claims.sub)
            .await?
            .ok_or_else(|| reject(AuthFailure::UnknownPrincipal))?;

        if !principal.status.is_active() {
            log_security_event(SecurityEvent::InactiveAccount {
                principal_id: &principal.id,
            });
            return Err(CampusError::AccountInactive);
        }

        if claims.role != Some(principal.role) {
            return Err(reject(AuthFailure::StaleClaims));
        }

        if !allowed.contains(principal.role) {
            log_security_event(SecurityEvent::AccessDenied {
                principal_id: &principal.id,
                role: principal.role,
                allowed,
            });
            return Err(CampusError::Forbidden(
                "You do not have access to this resource".to_string(),
            ));
        }

        Ok(AuthContext { principal, claims })
    }
}

fn reject(reason: AuthFailure) -> CampusError {
    log_security_event(SecurityEvent::TokenRejected {
        reason: reason.to_string(),
    });
    CampusError::Unauthenticated(reason)
}
