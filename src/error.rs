use std::error::Error;
use std::fmt;

/// Why a request failed to authenticate. Kept for logging only; the wire
/// response for every variant except `WrongPassword` is the same.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthFailure {
    MissingToken,
    Token(TokenError),
    Revoked,
    UnknownPrincipal,
    /// Token claims disagree with the stored principal
    StaleClaims,
    InvalidCredentials,
    WrongPassword,
}

/// Token verification failures
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    Malformed,
    SignatureInvalid,
    Expired,
    /// A token of the other class was presented
    WrongClass,
    /// Signing failed (key or serialization problem)
    Signing(String),
}

/// Password hashing failures
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HashError {
    /// The stored digest could not be parsed
    CorruptDigest,
    Hashing(String),
}

/// Fields carrying a uniqueness constraint in the credential store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniqueField {
    Email,
    HumanId,
}

/// Credential store failures
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    Duplicate(UniqueField),
    NotFound,
    /// Transient backend failure; callers may retry
    Unavailable(String),
}

/// Wire-level error taxonomy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    ValidationFailed,
    Conflict,
    Unauthenticated,
    Forbidden,
    NotFound,
    RateLimited,
    Infrastructure,
}

#[derive(Debug)]
pub enum CampusError {
    // Input errors
    ValidationError(String),
    Conflict(String),

    // Auth errors
    Unauthenticated(AuthFailure),
    Forbidden(String),
    AccountInactive,
    RateLimited { retry_after_secs: u64 },

    // Lookup errors
    NotFound(String),

    // Component errors
    Token(TokenError),
    Hash(HashError),
    Storage(StoreError),

    // System errors
    SystemError(String),

    // Configuration errors
    ConfigError(String),
}

impl fmt::Display for TokenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed => write!(f, "malformed token"),
            Self::SignatureInvalid => write!(f, "token signature invalid"),
            Self::Expired => write!(f, "token expired"),
            Self::WrongClass => write!(f, "token class mismatch"),
            Self::Signing(msg) => write!(f, "token signing failed: {}", msg),
        }
    }
}

impl fmt::Display for HashError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CorruptDigest => write!(f, "stored password digest is corrupt"),
            Self::Hashing(msg) => write!(f, "password hashing failed: {}", msg),
        }
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Duplicate(UniqueField::Email) => write!(f, "duplicate value for email"),
            Self::Duplicate(UniqueField::HumanId) => write!(f, "duplicate value for userId"),
            Self::NotFound => write!(f, "record not found"),
            Self::Unavailable(msg) => write!(f, "store unavailable: {}", msg),
        }
    }
}

impl fmt::Display for AuthFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingToken => write!(f, "missing bearer token"),
            Self::Token(e) => write!(f, "{}", e),
            Self::Revoked => write!(f, "token revoked"),
            Self::UnknownPrincipal => write!(f, "principal no longer exists"),
            Self::StaleClaims => write!(f, "token claims no longer match principal"),
            Self::InvalidCredentials => write!(f, "invalid credentials"),
            Self::WrongPassword => write!(f, "current password mismatch"),
        }
    }
}

impl fmt::Display for CampusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            Self::Conflict(msg) => write!(f, "Conflict: {}", msg),
            Self::Unauthenticated(reason) => write!(f, "Unauthenticated: {}", reason),
            Self::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            Self::AccountInactive => write!(f, "Forbidden: account is not active"),
            Self::RateLimited { retry_after_secs } => {
                write!(f, "Rate limited: retry after {}s", retry_after_secs)
            }
            Self::NotFound(what) => write!(f, "Not found: {}", what),
            Self::Token(e) => write!(f, "Token error: {}", e),
            Self::Hash(e) => write!(f, "Hash error: {}", e),
            Self::Storage(e) => write!(f, "Storage error: {}", e),
            Self::SystemError(msg) => write!(f, "System error: {}", msg),
            Self::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl Error for TokenError {}
impl Error for HashError {}
impl Error for StoreError {}
impl Error for CampusError {}

impl From<TokenError> for CampusError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Signing(_) => CampusError::Token(err),
            other => CampusError::Unauthenticated(AuthFailure::Token(other)),
        }
    }
}

impl From<HashError> for CampusError {
    fn from(err: HashError) -> Self {
        CampusError::Hash(err)
    }
}

impl From<StoreError> for CampusError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate(UniqueField::Email) => {
                CampusError::Conflict("User already exists with this email".to_string())
            }
            other => CampusError::Storage(other),
        }
    }
}

impl CampusError {
    /// Maps the error onto the wire taxonomy
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ValidationError(_) => ErrorKind::ValidationFailed,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::Unauthenticated(_) => ErrorKind::Unauthenticated,
            Self::Forbidden(_) | Self::AccountInactive => ErrorKind::Forbidden,
            Self::RateLimited { .. } => ErrorKind::RateLimited,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Storage(StoreError::NotFound) => ErrorKind::NotFound,
            Self::Token(_)
            | Self::Hash(_)
            | Self::Storage(_)
            | Self::SystemError(_)
            | Self::ConfigError(_) => ErrorKind::Infrastructure,
        }
    }

    pub fn status_code(&self) -> u16 {
        match self.kind() {
            ErrorKind::ValidationFailed | ErrorKind::Conflict => 400,
            ErrorKind::Unauthenticated => 401,
            ErrorKind::Forbidden => 403,
            ErrorKind::NotFound => 404,
            ErrorKind::RateLimited => 429,
            ErrorKind::Infrastructure => 500,
        }
    }

    /// Message safe to return to a client
    pub fn public_message(&self) -> String {
        match self {
            Self::ValidationError(msg) | Self::Conflict(msg) => msg.clone(),
            Self::Unauthenticated(AuthFailure::InvalidCredentials) => {
                "Invalid credentials".to_string()
            }
            Self::Unauthenticated(AuthFailure::WrongPassword) => {
                "Current password is incorrect".to_string()
            }
            Self::Unauthenticated(_) => "Not authorized. Please log in again".to_string(),
            Self::Forbidden(msg) => msg.clone(),
            Self::AccountInactive => {
                "Your account is not active. Please contact admin".to_string()
            }
            Self::RateLimited { .. } => {
                "Too many failed login attempts. Please try again later".to_string()
            }
            Self::NotFound(_) | Self::Storage(StoreError::NotFound) => {
                "Resource not found".to_string()
            }
            _ => "Internal Server Error".to_string(),
        }
    }

    /// Whether a caller may retry the same operation unchanged
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage(StoreError::Unavailable(_)))
    }
}

// Generic result type for the crate
pub type Result<T> = std::result::Result<T, CampusError>;
