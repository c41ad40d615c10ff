//! Security utilities: response headers, timing padding, security event log

pub mod events;
pub mod headers;
pub mod timing;

pub use events::{log_security_event, SecurityEvent};
pub use headers::with_api_security_headers;
pub use timing::AuthTimer;
