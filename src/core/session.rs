//! Session lifecycle: registration, login, refresh, logout, password change

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::auth::identifier::IdentifierGenerator;
use crate::auth::password::PasswordHasher;
use crate::auth::principal::{
    normalize_email, normalize_human_id, NewPrincipal, Principal, PrincipalSummary, ProfileUpdate,
};
use crate::auth::role::{AccountStatus, Role, RoleSet};
use crate::auth::token::{TokenClass, TokenService};
use crate::config::ServerConfig;
use crate::constants::{MAX_PASSWORD_LENGTH, MIN_PASSWORD_LENGTH};
use crate::core::guard::AuthContext;
use crate::core::provisioning::StudentProvisioning;
use crate::core::rate_limiter::LoginThrottle;
use crate::error::{AuthFailure, CampusError, HashError, Result, StoreError};
use crate::security::events::{log_security_event, SecurityEvent};
use crate::security::timing::AuthTimer;
use crate::storage::token_revocation::{RevocationReason, RevokedToken, SharedTokenRevocationStore};
use crate::storage::traits::{PrincipalStore, SequenceStore};

/// Registration input. No `Debug`: it carries the plaintext password.
#[derive(Clone)]
pub struct Registration {
    pub email: String,
    pub password: String,
    pub name: String,
    pub phone: Option<String>,
    pub department: Option<String>,
    pub role: Role,
    pub attributes: HashMap<String, Value>,
}

impl Registration {
    /// Normalises email and name and applies the password policy
    pub fn validated(mut self) -> Result<Self> {
        self.email = normalize_email(&self.email)?;
        self.name = self.name.trim().to_string();
        if self.name.is_empty() {
            return Err(CampusError::ValidationError("Name is required".to_string()));
        }
        validate_new_password(&self.password)?;
        Ok(self)
    }

    /// Active principal with the given digest; the human id is filled in by
    /// [`IdentifierGenerator::insert_with_fresh_id`]
    pub fn into_candidate(self, password_digest: String) -> NewPrincipal {
        NewPrincipal {
            human_id: String::new(),
            email: self.email,
            password_digest,
            name: self.name,
            phone: self.phone,
            department: self.department,
            role: self.role,
            status: AccountStatus::Active,
            attributes: self.attributes,
        }
    }
}

/// Which key a login request identifies the principal by
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginIdentifier {
    Email(String),
    HumanId(String),
}

impl LoginIdentifier {
    /// Normalised form, also the throttle key
    fn normalized(&self) -> String {
        match self {
            // Not validated: a malformed address must fail like an unknown one
            Self::Email(raw) => raw.trim().to_lowercase(),
            Self::HumanId(raw) => normalize_human_id(raw),
        }
    }
}

#[derive(Clone)]
pub struct LoginAttempt {
    pub identifier: LoginIdentifier,
    pub password: String,
    /// Portal the client is signing in to, if it declared one
    pub portal: Option<Role>,
}

/// Result of a successful register/login/refresh
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionGrant {
    pub user: PrincipalSummary,
    #[serde(rename = "token")]
    pub access_token: String,
    pub refresh_token: String,
}

pub fn validate_new_password(password: &str) -> Result<()> {
    let length = password.chars().count();
    if length < MIN_PASSWORD_LENGTH {
        return Err(CampusError::ValidationError(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LENGTH
        )));
    }
    if length > MAX_PASSWORD_LENGTH {
        return Err(CampusError::ValidationError(format!(
            "Password must be at most {} characters",
            MAX_PASSWORD_LENGTH
        )));
    }
    Ok(())
}

pub struct SessionController {
    store: Arc<dyn PrincipalStore>,
    hasher: Arc<PasswordHasher>,
    tokens: Arc<TokenService>,
    identifiers: IdentifierGenerator,
    revocations: SharedTokenRevocationStore,
    provisioning: Arc<StudentProvisioning>,
    throttle: LoginThrottle,
    login_min_duration: Duration,
}

impl SessionController {
    pub fn new(
        config: &ServerConfig,
        store: Arc<dyn PrincipalStore>,
        hasher: Arc<PasswordHasher>,
        tokens: Arc<TokenService>,
        sequences: Arc<dyn SequenceStore>,
        revocations: SharedTokenRevocationStore,
        provisioning: Arc<StudentProvisioning>,
    ) -> Self {
        Self {
            store,
            hasher,
            tokens,
            identifiers: IdentifierGenerator::new(sequences),
            revocations,
            provisioning,
            throttle: LoginThrottle::new(config.login_max_failures, config.login_window),
            login_min_duration: config.login_min_duration,
        }
    }

    pub async fn register(&self, registration: Registration) -> Result<SessionGrant> {
        let mut registration = registration.validated()?;

        if self.store.email_exists(&registration.email).await? {
            return Err(CampusError::Conflict(
                "User already exists with this email".to_string(),
            ));
        }

        let role = registration.role;
        let password = std::mem::take(&mut registration.password);
        let digest = self.hasher.hash_blocking(password).await?;

        let mut principal = self
            .identifiers
            .insert_with_fresh_id(self.store.as_ref(), registration.into_candidate(digest))
            .await?;

        log_security_event(SecurityEvent::Registered {
            principal_id: &principal.id,
            human_id: &principal.human_id,
            role,
        });

        self.provisioning.provision(&principal).await;

        let now = Utc::now();
        self.store.record_login(&principal.id, now).await?;
        principal.last_login_at = Some(now);

        self.grant(&principal)
    }

    pub async fn login(&self, attempt: LoginAttempt) -> Result<SessionGrant> {
        let key = attempt.identifier.normalized();
        if key.is_empty() || attempt.password.is_empty() {
            return Err(CampusError::ValidationError(
                "Please provide email/userId and password".to_string(),
            ));
        }

        let reservation = match self.throttle.reserve(&key).await {
            Ok(reservation) => reservation,
            Err(retry_after) => {
                log_security_event(SecurityEvent::LoginThrottled { identifier: &key });
                return Err(CampusError::RateLimited {
                    retry_after_secs: retry_after.as_secs(),
                });
            }
        };

        let timer = AuthTimer::new(self.login_min_duration);
        let mut principal = match self.check_credentials(&attempt, &key).await {
            Ok(principal) => principal,
            Err(CampusError::Unauthenticated(AuthFailure::InvalidCredentials)) => {
                timer.wait().await;
                return Err(CampusError::Unauthenticated(AuthFailure::InvalidCredentials));
            }
            // Store outage or corrupt record: no verdict on the password
            Err(e) => {
                self.throttle.release(&key, reservation).await;
                return Err(e);
            }
        };
        self.throttle.clear(&key).await;

        // Past this point the caller has proven the password, so status and
        // portal failures may be reported distinctly.
        if !principal.status.is_active() {
            log_security_event(SecurityEvent::InactiveAccount {
                principal_id: &principal.id,
            });
            return Err(CampusError::AccountInactive);
        }
        if let Some(portal) = attempt.portal {
            if portal != principal.role {
                log_security_event(SecurityEvent::AccessDenied {
                    principal_id: &principal.id,
                    role: principal.role,
                    allowed: RoleSet::only(portal),
                });
                return Err(CampusError::Forbidden(format!(
                    "This account cannot sign in to the {} portal",
                    portal
                )));
            }
        }

        let now = Utc::now();
        self.store.record_login(&principal.id, now).await?;
        principal.last_login_at = Some(now);

        log_security_event(SecurityEvent::LoginSucceeded {
            principal_id: &principal.id,
            role: principal.role,
        });
        self.grant(&principal)
    }

    pub fn me(&self, ctx: &AuthContext) -> PrincipalSummary {
        ctx.principal.summary()
    }

    /// Exchanges a refresh token for a fresh pair. The role is re-read from
    /// the store and the presented token is consumed.
    pub async fn refresh(&self, refresh_token: &str) -> Result<SessionGrant> {
        let claims = self
            .tokens
            .verify(refresh_token, TokenClass::Refresh)
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

        // Single use: of several concurrent exchanges only one wins
        let consumed = self
            .revocations
            .consume_token(RevokedToken::from_claims(&claims, RevocationReason::Rotated))
            .await?;
        if !consumed {
            return Err(reject(AuthFailure::Revoked));
        }

        log::debug!("Rotated refresh token for principal {}", principal.id);
        self.grant(&principal)
    }

    /// Revokes the access token the request was made with and, if given, the
    /// caller's refresh token.
    pub async fn logout(&self, ctx: &AuthContext, refresh_token: Option<&str>) -> Result<()> {
        self.revocations
            .revoke_token(RevokedToken::from_claims(&ctx.claims, RevocationReason::UserLogout))
            .await?;

        if let Some(token) = refresh_token {
            match self.tokens.verify(token, TokenClass::Refresh) {
                Ok(claims) if claims.sub == ctx.principal.id => {
                    self.revocations
                        .revoke_token(RevokedToken::from_claims(
                            &claims,
                            RevocationReason::UserLogout,
                        ))
                        .await?;
                }
                Ok(_) => log::warn!(
                    "Ignoring refresh token of another principal on logout by {}",
                    ctx.principal.id
                ),
                Err(e) => log::debug!("Ignoring unusable refresh token on logout: {}", e),
            }
        }

        log_security_event(SecurityEvent::TokensRevoked {
            principal_id: &ctx.principal.id,
            reason: "logout",
        });
        Ok(())
    }

    /// Existing tokens stay valid after a password change
    pub async fn change_password(
        &self,
        ctx: &AuthContext,
        current_password: String,
        new_password: String,
    ) -> Result<()> {
        if current_password.is_empty() {
            return Err(CampusError::ValidationError(
                "Current password is required".to_string(),
            ));
        }
        validate_new_password(&new_password)?;

        let principal = self
            .store
            .find_by_id(ctx.id())
            .await?
            .ok_or_else(|| reject(AuthFailure::UnknownPrincipal))?;

        match self
            .hasher
            .verify_blocking(current_password, principal.password_digest.clone())
            .await
        {
            Ok(true) => {}
            Ok(false) => return Err(CampusError::Unauthenticated(AuthFailure::WrongPassword)),
            Err(HashError::CorruptDigest) => {
                log_security_event(SecurityEvent::CorruptCredential {
                    principal_id: &principal.id,
                });
                return Err(HashError::CorruptDigest.into());
            }
            Err(e) => return Err(e.into()),
        }

        let digest = self.hasher.hash_blocking(new_password).await?;
        self.store
            .update_password_digest(&principal.id, digest)
            .await?;

        log_security_event(SecurityEvent::PasswordChanged {
            principal_id: &principal.id,
        });
        Ok(())
    }

    /// Self-service edit of name, phone, department and profile attributes.
    /// Email, role and status are not editable here.
    pub async fn update_profile(
        &self,
        ctx: &AuthContext,
        update: ProfileUpdate,
    ) -> Result<PrincipalSummary> {
        let update = ProfileUpdate { role: None, ..update }.normalized()?;
        if update.is_empty() {
            return Err(CampusError::ValidationError(
                "No profile fields to update".to_string(),
            ));
        }

        let updated = self
            .store
            .update_profile(ctx.id(), update)
            .await
            .map_err(|e| match e {
                StoreError::NotFound => reject(AuthFailure::UnknownPrincipal),
                other => other.into(),
            })?;
        log::info!("Principal {} updated their profile", updated.id);
        Ok(updated.summary())
    }

    fn grant(&self, principal: &Principal) -> Result<SessionGrant> {
        Ok(SessionGrant {
            user: principal.summary(),
            access_token: self.tokens.issue_access_token(principal)?,
            refresh_token: self.tokens.issue_refresh_token(principal)?,
        })
    }

    /// Looks the principal up and verifies the password. Unknown identifier
    /// and wrong password both come back as `InvalidCredentials`.
    async fn check_credentials(&self, attempt: &LoginAttempt, key: &str) -> Result<Principal> {
        let found = match &attempt.identifier {
            LoginIdentifier::Email(_) => self.store.find_by_email(key).await?,
            LoginIdentifier::HumanId(_) => self.store.find_by_human_id(key).await?,
        };

        let Some(principal) = found else {
            self.hasher.verify_dummy_blocking(attempt.password.clone()).await;
            log_security_event(SecurityEvent::LoginFailed {
                identifier: key,
                reason: "unknown identifier",
            });
            return Err(CampusError::Unauthenticated(AuthFailure::InvalidCredentials));
        };

        match self
            .hasher
            .verify_blocking(attempt.password.clone(), principal.password_digest.clone())
            .await
        {
            Ok(true) => Ok(principal),
            Ok(false) => {
                log_security_event(SecurityEvent::LoginFailed {
                    identifier: key,
                    reason: "wrong password",
                });
                Err(CampusError::Unauthenticated(AuthFailure::InvalidCredentials))
            }
            Err(HashError::CorruptDigest) => {
                log_security_event(SecurityEvent::CorruptCredential {
                    principal_id: &principal.id,
                });
                Err(HashError::CorruptDigest.into())
            }
            Err(e) => Err(e.into()),
        }
    }

}

fn reject(reason: AuthFailure) -> CampusError {
    log_security_event(SecurityEvent::TokenRejected {
        reason: reason.to_string(),
    });
    CampusError::Unauthenticated(reason)
}
