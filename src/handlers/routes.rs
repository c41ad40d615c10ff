//! Filter tree: routing, authentication filter and rejection rendering

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde_json::json;
use std::convert::Infallible;
use warp::http::header::{HeaderValue, RETRY_AFTER};
use warp::http::StatusCode;
use warp::hyper::body::Bytes;
use warp::{Filter, Rejection, Reply};

use crate::auth::role::{Role, RoleSet};
use crate::constants::{HEALTH_PATH, MAX_JSON_BODY_BYTES};
use crate::core::guard::AuthContext;
use crate::core::server::AppState;
use crate::error::{CampusError, ErrorKind};
use crate::handlers::{auth, portal, users};
use crate::security::headers::with_api_security_headers;

impl warp::reject::Reject for CampusError {}

/// Helper function to include app state in a request
pub fn with_state(state: AppState) -> impl Filter<Extract = (AppState,), Error = Infallible> + Clone {
    warp::any().map(move || state.clone())
}

/// Runs the authorization guard against the `Authorization` header
pub fn with_auth(
    state: AppState,
    allowed: RoleSet,
) -> impl Filter<Extract = (AuthContext,), Error = Rejection> + Clone {
    warp::header::optional::<String>("authorization")
        .and(with_state(state))
        .and_then(move |header: Option<String>, state: AppState| async move {
            state
                .guard
                .authorize(header.as_deref(), allowed)
                .await
                .map_err(warp::reject::custom)
        })
}

fn json_body<T: DeserializeOwned + Send>() -> impl Filter<Extract = (T,), Error = Rejection> + Clone {
    warp::body::content_length_limit(MAX_JSON_BODY_BYTES).and(warp::body::json())
}

/// Body that may be absent entirely (no `Content-Length`)
fn optional_body() -> impl Filter<Extract = (Bytes,), Error = Rejection> + Clone {
    warp::header::optional::<u64>("content-length")
        .and_then(|length: Option<u64>| async move {
            match length {
                Some(length) if length > MAX_JSON_BODY_BYTES => Err(warp::reject::custom(
                    CampusError::ValidationError("Request body too large".to_string()),
                )),
                _ => Ok(()),
            }
        })
        .untuple_one()
        .and(warp::body::bytes())
}

/// The complete HTTP surface: `/health` plus everything under `/api/{version}`
pub fn api_routes(state: AppState) -> impl Filter<Extract = impl Reply, Error = Infallible> + Clone {
    let development_mode = state.development_mode;
    let admins = RoleSet::only(Role::Admin);

    let health = warp::path(HEALTH_PATH)
        .and(warp::path::end())
        .and(warp::get())
        .map(|| {
            warp::reply::json(&json!({
                "status": "success",
                "message": "Server is running",
                "timestamp": Utc::now(),
            }))
        });

    // Auth routes
    let register = warp::path!("auth" / "register")
        .and(warp::post())
        .and(json_body())
        .and(with_state(state.clone()))
        .and_then(auth::register);
    let login = warp::path!("auth" / "login")
        .and(warp::post())
        .and(json_body())
        .and(with_state(state.clone()))
        .and_then(auth::login);
    let refresh = warp::path!("auth" / "refresh")
        .and(warp::post())
        .and(json_body())
        .and(with_state(state.clone()))
        .and_then(auth::refresh);
    let me = warp::path!("auth" / "me")
        .and(warp::get())
        .and(with_auth(state.clone(), RoleSet::any()))
        .and(with_state(state.clone()))
        .and_then(auth::me);
    let logout = warp::path!("auth" / "logout")
        .and(warp::post())
        .and(with_auth(state.clone(), RoleSet::any()))
        .and(optional_body())
        .and(with_state(state.clone()))
        .and_then(auth::logout);
    let change_password = warp::path!("auth" / "change-password")
        .and(warp::put())
        .and(with_auth(state.clone(), RoleSet::any()))
        .and(json_body())
        .and(with_state(state.clone()))
        .and_then(auth::change_password);
    let update_profile = warp::path!("auth" / "profile")
        .and(warp::put())
        .and(with_auth(state.clone(), RoleSet::any()))
        .and(json_body())
        .and(with_state(state.clone()))
        .and_then(auth::update_profile);

    // Administration routes; `users/stats` must be tried before `users/{id}`
    let list_users = warp::path!("users")
        .and(warp::get())
        .and(warp::query::<users::ListUsersQuery>())
        .and(with_auth(state.clone(), admins))
        .and(with_state(state.clone()))
        .and_then(users::list_users);
    let create_user = warp::path!("users")
        .and(warp::post())
        .and(with_auth(state.clone(), admins))
        .and(json_body())
        .and(with_state(state.clone()))
        .and_then(users::create_user);
    let user_stats = warp::path!("users" / "stats")
        .and(warp::get())
        .and(with_auth(state.clone(), admins))
        .and(with_state(state.clone()))
        .and_then(users::user_stats);
    let update_user = warp::path!("users" / String)
        .and(warp::put())
        .and(with_auth(state.clone(), admins))
        .and(json_body())
        .and(with_state(state.clone()))
        .and_then(users::update_user);
    let deactivate_user = warp::path!("users" / String)
        .and(warp::delete())
        .and(with_auth(state.clone(), admins))
        .and(with_state(state.clone()))
        .and_then(users::deactivate_user);
    let reset_password = warp::path!("users" / String / "reset-password")
        .and(warp::put())
        .and(with_auth(state.clone(), admins))
        .and(json_body())
        .and(with_state(state.clone()))
        .and_then(users::reset_password);
    let get_user = warp::path!("users" / String)
        .and(warp::get())
        .and(with_auth(state.clone(), admins))
        .and(with_state(state.clone()))
        .and_then(users::get_user);
    let set_status = warp::path!("users" / String / "status")
        .and(warp::put())
        .and(with_auth(state.clone(), admins))
        .and(json_body())
        .and(with_state(state.clone()))
        .and_then(users::set_status);
    let revoke_sessions = warp::path!("users" / String / "revoke-sessions")
        .and(warp::post())
        .and(with_auth(state.clone(), admins))
        .and(with_state(state.clone()))
        .and_then(users::revoke_sessions);
    let retry_provisioning = warp::path!("admin" / "provisioning" / "retry")
        .and(warp::post())
        .and(with_auth(state.clone(), admins))
        .and(with_state(state.clone()))
        .and_then(users::retry_provisioning);

    // Portal entry points
    let dashboards = warp::path!(String / "dashboard")
        .and(warp::get())
        .and(warp::header::optional::<String>("authorization"))
        .and(with_state(state.clone()))
        .and_then(portal::dashboard);

    let api = warp::path("api").and(warp::path(state.api_version.clone())).and(
        register
            .or(login)
            .or(refresh)
            .or(me)
            .or(logout)
            .or(change_password)
            .or(update_profile)
            .or(list_users)
            .or(create_user)
            .or(user_stats)
            .or(get_user)
            .or(update_user)
            .or(deactivate_user)
            .or(reset_password)
            .or(set_status)
            .or(revoke_sessions)
            .or(retry_provisioning)
            .or(dashboards),
    );

    health
        .or(api)
        .recover(move |rejection| handle_rejection(rejection, development_mode))
        .map(with_api_security_headers)
}

/// Renders every rejection as `{status:"error", statusCode, message[, detail]}`
pub async fn handle_rejection(
    err: Rejection,
    development_mode: bool,
) -> Result<warp::reply::Response, Infallible> {
    let mut retry_after = None;

    let (status, message, detail) = if let Some(e) = err.find::<CampusError>() {
        if e.kind() == ErrorKind::Infrastructure {
            log::error!("Request failed: {}", e);
        } else {
            log::debug!("Request rejected: {}", e);
        }
        if let CampusError::RateLimited { retry_after_secs } = e {
            retry_after = Some(*retry_after_secs);
        }
        let status =
            StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, e.public_message(), Some(e.to_string()))
    } else if let Some(e) = err.find::<warp::filters::body::BodyDeserializeError>() {
        (
            StatusCode::BAD_REQUEST,
            "Invalid request body".to_string(),
            Some(e.to_string()),
        )
    } else if let Some(e) = err.find::<warp::reject::InvalidQuery>() {
        (
            StatusCode::BAD_REQUEST,
            "Invalid query string".to_string(),
            Some(e.to_string()),
        )
    } else if err.find::<warp::reject::PayloadTooLarge>().is_some() {
        (
            StatusCode::PAYLOAD_TOO_LARGE,
            "Request body too large".to_string(),
            None,
        )
    } else if err.find::<warp::reject::LengthRequired>().is_some() {
        (
            StatusCode::LENGTH_REQUIRED,
            "Content-Length required".to_string(),
            None,
        )
    } else if err.find::<warp::reject::UnsupportedMediaType>().is_some() {
        (
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            "Expected a JSON body".to_string(),
            None,
        )
    } else if let Some(e) = err.find::<warp::reject::InvalidHeader>() {
        (
            StatusCode::BAD_REQUEST,
            "Invalid request header".to_string(),
            Some(e.to_string()),
        )
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        (
            StatusCode::METHOD_NOT_ALLOWED,
            "Method not allowed".to_string(),
            None,
        )
    } else if err.is_not_found() {
        (StatusCode::NOT_FOUND, "Resource not found".to_string(), None)
    } else {
        log::error!("Unhandled rejection: {:?}", err);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal Server Error".to_string(),
            None,
        )
    };

    let mut body = json!({
        "status": "error",
        "statusCode": status.as_u16(),
        "message": message,
    });
    if development_mode {
        if let Some(detail) = detail {
            body["detail"] = json!(detail);
        }
    }

    let mut response = warp::reply::with_status(warp::reply::json(&body), status).into_response();
    if let Some(secs) = retry_after {
        response
            .headers_mut()
            .insert(RETRY_AFTER, HeaderValue::from(secs));
    }
    Ok(response)
}
