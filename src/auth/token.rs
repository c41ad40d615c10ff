use chrono::Utc;
use jsonwebtoken::errors::ErrorKind as JwtErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

use crate::auth::principal::Principal;
use crate::auth::role::Role;
use crate::constants::MAX_BEARER_TOKEN_LENGTH;
use crate::error::TokenError;

/// Which of the two token classes a token belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenClass {
    Access,
    Refresh,
}

/// JWT Claims structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (principal id)
    pub sub: String,
    /// Role, present on access tokens only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    pub class: TokenClass,
    /// Issued at (as UTC timestamp)
    pub iat: i64,
    /// Issued at in milliseconds, compared against revocation cut-offs
    #[serde(default)]
    pub iat_ms: i64,
    /// Expiration time (as UTC timestamp)
    pub exp: i64,
    /// Unique token id, the key for per-token revocation
    pub jti: String,
}

impl Claims {
    /// Claims for an access token carrying the principal's role
    pub fn access(principal_id: &str, role: Role, ttl: Duration) -> Self {
        Self::build(principal_id, Some(role), TokenClass::Access, ttl)
    }

    /// Claims for a refresh token; carries no role so it is re-derived from
    /// the store on refresh
    pub fn refresh(principal_id: &str, ttl: Duration) -> Self {
        Self::build(principal_id, None, TokenClass::Refresh, ttl)
    }

    fn build(principal_id: &str, role: Option<Role>, class: TokenClass, ttl: Duration) -> Self {
        let issued = Utc::now();
        let now = issued.timestamp();
        Self {
            sub: principal_id.to_string(),
            role,
            class,
            iat: now,
            iat_ms: issued.timestamp_millis(),
            exp: now + ttl.as_secs() as i64,
            jti: Uuid::new_v4().to_string(),
        }
    }

    /// Issue time in milliseconds; falls back to `iat` for tokens minted
    /// without `iat_ms`
    pub fn issued_at_millis(&self) -> i64 {
        if self.iat_ms > 0 {
            self.iat_ms
        } else {
            self.iat.saturating_mul(1000)
        }
    }

    /// Check if the token is expired
    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() >= self.exp
    }
}

/// Signing material and lifetimes for both token classes
#[derive(Clone)]
pub struct TokenSettings {
    pub access_secret: String,
    pub refresh_secret: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
}

struct KeyPair {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl KeyPair {
    fn from_secret(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }
}

/// Mints and verifies access and refresh tokens, each class under its own key
pub struct TokenService {
    access_keys: KeyPair,
    refresh_keys: KeyPair,
    access_ttl: Duration,
    refresh_ttl: Duration,
    validation: Validation,
}

impl TokenService {
    pub fn new(settings: &TokenSettings) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            access_keys: KeyPair::from_secret(&settings.access_secret),
            refresh_keys: KeyPair::from_secret(&settings.refresh_secret),
            access_ttl: settings.access_ttl,
            refresh_ttl: settings.refresh_ttl,
            validation,
        }
    }

    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    pub fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }

    pub fn issue_access_token(&self, principal: &Principal) -> Result<String, TokenError> {
        self.sign(&Claims::access(&principal.id, principal.role, self.access_ttl))
    }

    pub fn issue_refresh_token(&self, principal: &Principal) -> Result<String, TokenError> {
        self.sign(&Claims::refresh(&principal.id, self.refresh_ttl))
    }

    /// Signs arbitrary claims with the key belonging to their class
    pub fn sign(&self, claims: &Claims) -> Result<String, TokenError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.keys(claims.class).encoding)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    /// Checks signature, expiry and class
    pub fn verify(&self, token: &str, expected: TokenClass) -> Result<Claims, TokenError> {
        if token.is_empty()
            || token.len() > MAX_BEARER_TOKEN_LENGTH
            || token.chars().any(|c| c.is_control() || c.is_whitespace())
        {
            return Err(TokenError::Malformed);
        }

        let data = decode::<Claims>(token, &self.keys(expected).decoding, &self.validation)
            .map_err(|e| match e.kind() {
                JwtErrorKind::ExpiredSignature => TokenError::Expired,
                JwtErrorKind::InvalidSignature => TokenError::SignatureInvalid,
                _ => TokenError::Malformed,
            })?;
        let claims = data.claims;

        if claims.class != expected {
            return Err(TokenError::WrongClass);
        }
        if claims.sub.is_empty() || (expected == TokenClass::Access && claims.role.is_none()) {
            return Err(TokenError::Malformed);
        }
        if claims.is_expired() {
            return Err(TokenError::Expired);
        }

        Ok(claims)
    }

    fn keys(&self, class: TokenClass) -> &KeyPair {
        match class {
            TokenClass::Access => &self.access_keys,
            TokenClass::Refresh => &self.refresh_keys,
        }
    }
}

/// Extracts bearer token from Authorization header
pub fn extract_bearer_token(auth_header: &str) -> Option<&str> {
    let (scheme, token) = auth_header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> TokenSettings {
        TokenSettings {
            access_secret: "access-key-for-unit-tests-0123456789ab".to_string(),
            refresh_secret: "refresh-key-for-unit-tests-0123456789cd".to_string(),
            access_ttl: Duration::from_secs(900),
            refresh_ttl: Duration::from_secs(86400),
        }
    }

    #[test]
    fn test_access_token_round_trip() {
        let service = TokenService::new(&settings());
        let claims = Claims::access("p-1", Role::Faculty, service.access_ttl());
        let token = service.sign(&claims).unwrap();

        let verified = service.verify(&token, TokenClass::Access).unwrap();
        assert_eq!(verified, claims);
        assert_eq!(verified.role, Some(Role::Faculty));
    }

    #[test]
    fn test_refresh_token_has_no_role() {
        let service = TokenService::new(&settings());
        let token = service
            .sign(&Claims::refresh("p-1", service.refresh_ttl()))
            .unwrap();

        let verified = service.verify(&token, TokenClass::Refresh).unwrap();
        assert_eq!(verified.role, None);
        assert_eq!(verified.class, TokenClass::Refresh);
    }

    #[test]
    fn test_expired_token_rejected_despite_valid_signature() {
        let service = TokenService::new(&settings());
        let mut claims = Claims::access("p-1", Role::Student, Duration::from_secs(60));
        claims.iat -= 7200;
        claims.exp = claims.iat + 60;
        let token = service.sign(&claims).unwrap();

        assert_eq!(service.verify(&token, TokenClass::Access), Err(TokenError::Expired));
    }

    #[test]
    fn test_classes_are_not_interchangeable() {
        let service = TokenService::new(&settings());
        let access = service
            .sign(&Claims::access("p-1", Role::Admin, Duration::from_secs(60)))
            .unwrap();
        let refresh = service
            .sign(&Claims::refresh("p-1", Duration::from_secs(60)))
            .unwrap();

        assert!(service.verify(&access, TokenClass::Refresh).is_err());
        assert!(service.verify(&refresh, TokenClass::Access).is_err());
    }

    #[test]
    fn test_class_claim_checked_even_with_shared_key() {
        let mut shared = settings();
        shared.refresh_secret = shared.access_secret.clone();
        let service = TokenService::new(&shared);
        let refresh = service
            .sign(&Claims::refresh("p-1", Duration::from_secs(60)))
            .unwrap();

        assert_eq!(service.verify(&refresh, TokenClass::Access), Err(TokenError::WrongClass));
    }

    #[test]
    fn test_foreign_signature_rejected() {
        let service = TokenService::new(&settings());
        let mut other_settings = settings();
        other_settings.access_secret = "a-completely-different-access-key-987654".to_string();
        let other = TokenService::new(&other_settings);
        let token = other
            .sign(&Claims::access("p-1", Role::Admin, Duration::from_secs(60)))
            .unwrap();

        assert_eq!(
            service.verify(&token, TokenClass::Access),
            Err(TokenError::SignatureInvalid)
        );
    }

    #[test]
    fn test_garbage_is_malformed() {
        let service = TokenService::new(&settings());
        assert_eq!(service.verify("invalid.token.here", TokenClass::Access), Err(TokenError::Malformed));
        assert_eq!(service.verify("", TokenClass::Access), Err(TokenError::Malformed));
        assert_eq!(service.verify("abc\ndef", TokenClass::Access), Err(TokenError::Malformed));
    }

    #[test]
    fn test_extract_bearer_token() {
        assert_eq!(extract_bearer_token("Bearer abc.def.ghi"), Some("abc.def.ghi"));
        assert_eq!(extract_bearer_token("bearer   xyz "), Some("xyz"));
        assert_eq!(extract_bearer_token("Basic dXNlcjpwYXNz"), None);
        assert_eq!(extract_bearer_token("Bearer "), None);
        assert_eq!(extract_bearer_token("Bearer"), None);
    }
}
