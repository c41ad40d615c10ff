//! CoCampus Auth - identity and access control for the campus portals
//!
//! This library provides credential storage, password hashing, user id
//! allocation, token issuance and per-request role gating, plus the warp
//! filter tree that exposes them over HTTP.

pub mod auth;
pub mod config;
pub mod constants;
pub mod core;
pub mod error;
pub mod handlers;
pub mod security;
pub mod storage;

// Re-export main components
pub use config::ServerConfig;
pub use core::server::{AppState, Backends};
pub use error::{CampusError, Result};
pub use handlers::api_routes;
