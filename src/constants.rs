// Fundamental configuration constants
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_API_VERSION: &str = "v1";
pub const HEALTH_PATH: &str = "health";

// Token lifetimes (seconds)
pub const DEFAULT_ACCESS_TOKEN_TTL_SECS: u64 = 15 * 60;
pub const DEFAULT_REFRESH_TOKEN_TTL_SECS: u64 = 7 * 24 * 3600;

// Argon2id cost parameters
pub const DEFAULT_HASH_MEMORY_KIB: u32 = 19 * 1024;
pub const DEFAULT_HASH_ITERATIONS: u32 = 2;
pub const DEFAULT_HASH_PARALLELISM: u32 = 1;

// Login throttling
pub const DEFAULT_LOGIN_MAX_FAILURES: u32 = 5;
pub const DEFAULT_LOGIN_WINDOW_SECS: u64 = 15 * 60;
pub const DEFAULT_LOGIN_MIN_DURATION_MS: u64 = 100;
pub const MAX_THROTTLE_TRACKED_KEYS: usize = 10_000;

// Revocation list housekeeping
pub const DEFAULT_REVOCATION_CLEANUP_SECS: u64 = 3600;

// Registration
pub const MIN_PASSWORD_LENGTH: usize = 8;
pub const MAX_PASSWORD_LENGTH: usize = 128;
pub const MAX_ID_ALLOCATION_ATTEMPTS: usize = 5;
pub const HUMAN_ID_SEQUENCE_WIDTH: usize = 3;

// Student wallet defaults
pub const DEFAULT_DAILY_SPENDING_LIMIT: u64 = 5000;
pub const DEFAULT_MONTHLY_SPENDING_LIMIT: u64 = 15000;

// Request bodies
pub const MAX_JSON_BODY_BYTES: u64 = 16 * 1024;
pub const MAX_BEARER_TOKEN_LENGTH: usize = 2048;
