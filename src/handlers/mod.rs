//! HTTP handlers and the warp filter tree

pub mod auth;
pub mod portal;
pub mod routes;
pub mod users;

use serde::Serialize;
use serde_json::json;
use warp::http::StatusCode;

pub use routes::{api_routes, handle_rejection};

/// `{status:"success", message?, data}` envelope every handler replies with
pub(crate) fn success<T: Serialize>(
    status: StatusCode,
    message: Option<&str>,
    data: &T,
) -> warp::reply::WithStatus<warp::reply::Json> {
    let body = match message {
        Some(message) => json!({ "status": "success", "message": message, "data": data }),
        None => json!({ "status": "success", "data": data }),
    };
    warp::reply::with_status(warp::reply::json(&body), status)
}
