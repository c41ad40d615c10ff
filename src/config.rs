//! Server configuration module
//! Loads every tunable from the environment and validates signing secrets

use base64::Engine;
use rand::RngCore;
use std::env;
use std::time::Duration;

use crate::auth::password::HashCost;
use crate::auth::token::TokenSettings;
use crate::constants::*;
use crate::error::{CampusError, Result};

/// Server configuration parameters
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Path segment after `/api/`, e.g. `v1`
    pub api_version: String,
    /// Secret for access token signing/validation
    pub access_token_secret: String,
    /// Secret for refresh tokens (must differ from the access secret)
    pub refresh_token_secret: String,
    pub access_token_ttl: Duration,
    pub refresh_token_ttl: Duration,
    /// Argon2id cost
    pub hash_memory_kib: u32,
    pub hash_iterations: u32,
    pub hash_parallelism: u32,
    /// Failed logins allowed per identifier per window (0 disables)
    pub login_max_failures: u32,
    pub login_window: Duration,
    /// Minimum duration of a failed login response
    pub login_min_duration: Duration,
    pub revocation_cleanup_interval: Duration,
    pub daily_spending_limit: u64,
    /// Development mode (adds diagnostic detail to error bodies)
    pub development_mode: bool,
}

impl ServerConfig {
    /// Configuration for tests: fresh random secrets on every call and cheap
    /// hashing. Never use in production.
    pub fn for_testing() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 0,
            api_version: DEFAULT_API_VERSION.to_string(),
            access_token_secret: generate_ephemeral_secret(),
            refresh_token_secret: generate_ephemeral_secret(),
            access_token_ttl: Duration::from_secs(DEFAULT_ACCESS_TOKEN_TTL_SECS),
            refresh_token_ttl: Duration::from_secs(DEFAULT_REFRESH_TOKEN_TTL_SECS),
            hash_memory_kib: 1024,
            hash_iterations: 1,
            hash_parallelism: 1,
            login_max_failures: DEFAULT_LOGIN_MAX_FAILURES,
            login_window: Duration::from_secs(DEFAULT_LOGIN_WINDOW_SECS),
            login_min_duration: Duration::ZERO,
            revocation_cleanup_interval: Duration::from_secs(DEFAULT_REVOCATION_CLEANUP_SECS),
            daily_spending_limit: DEFAULT_DAILY_SPENDING_LIMIT,
            development_mode: false,
        }
    }

    pub fn token_settings(&self) -> TokenSettings {
        TokenSettings {
            access_secret: self.access_token_secret.clone(),
            refresh_secret: self.refresh_token_secret.clone(),
            access_ttl: self.access_token_ttl,
            refresh_ttl: self.refresh_token_ttl,
        }
    }

    pub fn hash_cost(&self) -> HashCost {
        HashCost {
            memory_kib: self.hash_memory_kib,
            iterations: self.hash_iterations,
            parallelism: self.hash_parallelism,
        }
    }

    /// Validate that a secret meets security requirements
    fn validate_secret(secret: &str, secret_type: &str) -> Result<()> {
        if secret.len() < 32 {
            return Err(CampusError::ConfigError(format!(
                "{} secret must be at least 32 characters long",
                secret_type
            )));
        }

        // Check for insecure default or example values
        let insecure_patterns = [
            "your-secret-key",
            "your_jwt_secret",
            "change-this",
            "changeme",
            "test-secret",
            "default",
            "secret",
            "password",
            "12345",
        ];

        let lowered = secret.to_lowercase();
        for pattern in &insecure_patterns {
            if lowered.contains(pattern) {
                return Err(CampusError::ConfigError(format!(
                    "{} secret contains insecure pattern '{}'. Please use a secure random value generated with: openssl rand -base64 32",
                    secret_type, pattern
                )));
            }
        }

        // Ensure some complexity
        if secret.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(CampusError::ConfigError(format!(
                "{} secret should contain mixed characters (letters, numbers, symbols)",
                secret_type
            )));
        }

        Ok(())
    }

    /// Access and refresh tokens must be signed with different keys
    fn validate_secrets_are_different(access: &str, refresh: &str) -> Result<()> {
        if access == refresh {
            return Err(CampusError::ConfigError(
                "Access and refresh token secrets must be different".to_string(),
            ));
        }
        Ok(())
    }

    /// Load configuration from environment variables if available
    pub fn from_env() -> Result<Self> {
        let development_mode = env_flag("COCAMPUS_DEVELOPMENT_MODE")
            .or_else(|| env::var("NODE_ENV").ok().map(|v| v == "development"))
            .unwrap_or(false); // SECURITY: Default to production mode

        let host = env::var("COCAMPUS_HOST").unwrap_or(DEFAULT_HOST.to_string());
        let port = env_first(&["COCAMPUS_PORT", "PORT"])
            .and_then(|p| p.parse().ok())
            .unwrap_or(DEFAULT_PORT);
        let api_version = env_first(&["COCAMPUS_API_VERSION", "API_VERSION"])
            .unwrap_or(DEFAULT_API_VERSION.to_string());
        if api_version.is_empty() || api_version.contains('/') {
            return Err(CampusError::ConfigError(format!(
                "Invalid API version segment: '{}'",
                api_version
            )));
        }

        let access_token_secret = Self::load_secret(
            &["COCAMPUS_ACCESS_TOKEN_SECRET", "JWT_SECRET"],
            "access token",
            development_mode,
        )?;
        let refresh_token_secret = Self::load_secret(
            &["COCAMPUS_REFRESH_TOKEN_SECRET", "JWT_REFRESH_SECRET"],
            "refresh token",
            development_mode,
        )?;

        let access_token_ttl = env_duration(
            &["COCAMPUS_ACCESS_TOKEN_TTL", "JWT_EXPIRES_IN"],
            Duration::from_secs(DEFAULT_ACCESS_TOKEN_TTL_SECS),
        )?;
        let refresh_token_ttl = env_duration(
            &["COCAMPUS_REFRESH_TOKEN_TTL", "JWT_REFRESH_EXPIRES_IN"],
            Duration::from_secs(DEFAULT_REFRESH_TOKEN_TTL_SECS),
        )?;
        if refresh_token_ttl <= access_token_ttl {
            log::warn!("Refresh token lifetime is not longer than access token lifetime");
        }

        let hash_memory_kib = env_parse("COCAMPUS_HASH_MEMORY_KIB", DEFAULT_HASH_MEMORY_KIB);
        let hash_iterations = env_parse("COCAMPUS_HASH_ITERATIONS", DEFAULT_HASH_ITERATIONS);
        let hash_parallelism = env_parse("COCAMPUS_HASH_PARALLELISM", DEFAULT_HASH_PARALLELISM);

        let login_max_failures = env_parse("COCAMPUS_LOGIN_MAX_FAILURES", DEFAULT_LOGIN_MAX_FAILURES);
        let login_window = env_duration(
            &["COCAMPUS_LOGIN_WINDOW"],
            Duration::from_secs(DEFAULT_LOGIN_WINDOW_SECS),
        )?;
        let login_min_duration = Duration::from_millis(env_parse(
            "COCAMPUS_LOGIN_MIN_DURATION_MS",
            DEFAULT_LOGIN_MIN_DURATION_MS,
        ));
        let revocation_cleanup_interval = env_duration(
            &["COCAMPUS_REVOCATION_CLEANUP_INTERVAL"],
            Duration::from_secs(DEFAULT_REVOCATION_CLEANUP_SECS),
        )?;

        let daily_spending_limit = env_first(&["COCAMPUS_DAILY_SPENDING_LIMIT", "DAILY_SPENDING_LIMIT"])
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_DAILY_SPENDING_LIMIT);

        Self::validate_secret(&access_token_secret, "Access token")?;
        Self::validate_secret(&refresh_token_secret, "Refresh token")?;
        Self::validate_secrets_are_different(&access_token_secret, &refresh_token_secret)?;

        Ok(Self {
            host,
            port,
            api_version,
            access_token_secret,
            refresh_token_secret,
            access_token_ttl,
            refresh_token_ttl,
            hash_memory_kib,
            hash_iterations,
            hash_parallelism,
            login_max_failures,
            login_window,
            login_min_duration,
            revocation_cleanup_interval,
            daily_spending_limit,
            development_mode,
        })
    }

    fn load_secret(names: &[&str], what: &str, development_mode: bool) -> Result<String> {
        match env_first(names) {
            Some(secret) => Ok(secret),
            None if development_mode => {
                log::warn!(
                    "{} is not set; using an ephemeral random {} secret (development mode only, tokens will not survive a restart)",
                    names[0],
                    what
                );
                Ok(generate_ephemeral_secret())
            }
            None => Err(CampusError::ConfigError(format!(
                "{} environment variable is required. Generate one with: openssl rand -base64 32",
                names[0]
            ))),
        }
    }
}

/// 48 random bytes, URL-safe base64
pub fn generate_ephemeral_secret() -> String {
    let mut bytes = [0u8; 48];
    rand::thread_rng().fill_bytes(&mut bytes);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// Parses `30d`, `12h`, `15m`, `45s` or a bare number of seconds
pub fn parse_duration(raw: &str) -> Option<Duration> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    let (digits, multiplier) = match raw.char_indices().last() {
        Some((idx, 'd')) => (&raw[..idx], 86_400),
        Some((idx, 'h')) => (&raw[..idx], 3_600),
        Some((idx, 'm')) => (&raw[..idx], 60),
        Some((idx, 's')) => (&raw[..idx], 1),
        _ => (raw, 1),
    };
    let value: u64 = digits.trim().parse().ok()?;
    value.checked_mul(multiplier).map(Duration::from_secs)
}

fn env_first(names: &[&str]) -> Option<String> {
    names
        .iter()
        .find_map(|name| env::var(name).ok())
        .filter(|v| !v.trim().is_empty())
}

fn env_flag(name: &str) -> Option<bool> {
    env::var(name)
        .ok()
        .map(|v| v.to_lowercase() == "true" || v == "1")
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_duration(names: &[&str], default: Duration) -> Result<Duration> {
    match env_first(names) {
        Some(raw) => parse_duration(&raw).ok_or_else(|| {
            CampusError::ConfigError(format!("{} has an invalid duration: '{}'", names[0], raw))
        }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("30d"), Some(Duration::from_secs(30 * 86_400)));
        assert_eq!(parse_duration("12h"), Some(Duration::from_secs(12 * 3_600)));
        assert_eq!(parse_duration("15m"), Some(Duration::from_secs(900)));
        assert_eq!(parse_duration("45s"), Some(Duration::from_secs(45)));
        assert_eq!(parse_duration("120"), Some(Duration::from_secs(120)));
        assert_eq!(parse_duration("soon"), None);
        assert_eq!(parse_duration(""), None);
    }

    #[test]
    fn test_for_testing_secrets_are_fresh_and_distinct() {
        let a = ServerConfig::for_testing();
        let b = ServerConfig::for_testing();
        assert_ne!(a.access_token_secret, a.refresh_token_secret);
        assert_ne!(a.access_token_secret, b.access_token_secret);
        assert!(ServerConfig::validate_secret(&a.access_token_secret, "Access token").is_ok());
    }

    #[test]
    fn test_secret_rules() {
        assert!(ServerConfig::validate_secret("short", "Access token").is_err());
        assert!(ServerConfig::validate_secret(
            "my_jwt_secret_value_that_is_long_enough_42",
            "Access token"
        )
        .is_err());
        assert!(ServerConfig::validate_secret(
            "onlylettersbutlongenoughtopassthelengthcheck",
            "Access token"
        )
        .is_err());
        assert!(ServerConfig::validate_secret(
            "Zq3-vN8r_K1xP0wL5sT7yU2mB4cD6eF9gH",
            "Access token"
        )
        .is_ok());
    }

    #[test]
    fn test_same_secrets_rejected() {
        let same = "Zq3-vN8r_K1xP0wL5sT7yU2mB4cD6eF9gH";
        assert!(ServerConfig::validate_secrets_are_different(same, same).is_err());
    }
}
