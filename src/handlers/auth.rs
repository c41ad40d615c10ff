//! `/auth/*` endpoints

use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use warp::http::StatusCode;
use warp::hyper::body::Bytes;
use warp::{Rejection, Reply};

use crate::auth::principal::ProfileUpdate;
use crate::auth::role::Role;
use crate::core::guard::AuthContext;
use crate::core::server::AppState;
use crate::core::session::{LoginAttempt, LoginIdentifier, Registration};
use crate::error::{CampusError, Result};
use crate::handlers::success;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub role: Option<String>,
    pub department: Option<String>,
    /// Role-specific attributes, stored as given
    #[serde(default)]
    pub profile: HashMap<String, Value>,
}

impl RegisterRequest {
    pub(crate) fn into_registration(self) -> Result<Registration> {
        let role = parse_role(self.role.as_deref())?.ok_or_else(|| {
            CampusError::ValidationError("Role is required".to_string())
        })?;
        Ok(Registration {
            email: required(self.email, "Email")?,
            password: required(self.password, "Password")?,
            name: required(self.name, "Name")?,
            phone: non_empty(self.phone),
            department: non_empty(self.department),
            role,
            attributes: self.profile,
        })
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub email: Option<String>,
    pub user_id: Option<String>,
    pub password: Option<String>,
    /// Portal being signed in to
    pub role: Option<String>,
}

impl LoginRequest {
    fn into_attempt(self) -> Result<LoginAttempt> {
        let identifier = match (non_empty(self.email), non_empty(self.user_id)) {
            (Some(email), None) => LoginIdentifier::Email(email),
            (None, Some(user_id)) => LoginIdentifier::HumanId(user_id),
            (Some(_), Some(_)) => {
                return Err(CampusError::ValidationError(
                    "Provide either email or userId, not both".to_string(),
                ))
            }
            (None, None) => {
                return Err(CampusError::ValidationError(
                    "Please provide email/userId and password".to_string(),
                ))
            }
        };
        let password = self.password.filter(|p| !p.is_empty()).ok_or_else(|| {
            CampusError::ValidationError("Please provide email/userId and password".to_string())
        })?;
        Ok(LoginAttempt {
            identifier,
            password,
            portal: parse_role(self.role.as_deref())?,
        })
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: Option<String>,
    pub new_password: Option<String>,
}

/// Editable profile fields; anything else in the body is ignored
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileRequest {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub department: Option<String>,
    pub profile: Option<HashMap<String, Value>>,
}

impl ProfileRequest {
    pub(crate) fn into_update(self) -> ProfileUpdate {
        ProfileUpdate {
            name: self.name,
            phone: self.phone,
            department: self.department,
            attributes: self.profile,
            role: None,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct LogoutRequest {
    pub refresh_token: Option<String>,
}

pub async fn register(body: RegisterRequest, state: AppState) -> std::result::Result<impl Reply, Rejection> {
    let registration = body.into_registration().map_err(warp::reject::custom)?;
    let grant = state
        .sessions
        .register(registration)
        .await
        .map_err(warp::reject::custom)?;
    Ok(success(
        StatusCode::CREATED,
        Some("User registered successfully"),
        &grant,
    ))
}

pub async fn login(body: LoginRequest, state: AppState) -> std::result::Result<impl Reply, Rejection> {
    let attempt = body.into_attempt().map_err(warp::reject::custom)?;
    let grant = state
        .sessions
        .login(attempt)
        .await
        .map_err(warp::reject::custom)?;
    Ok(success(StatusCode::OK, Some("Login successful"), &grant))
}

pub async fn me(ctx: AuthContext, state: AppState) -> std::result::Result<impl Reply, Rejection> {
    let user = state.sessions.me(&ctx);
    Ok(success(StatusCode::OK, None, &json!({ "user": user })))
}

/// The body is optional; when present it may carry the refresh token to revoke
pub async fn logout(
    ctx: AuthContext,
    body: Bytes,
    state: AppState,
) -> std::result::Result<impl Reply, Rejection> {
    let request: LogoutRequest = if body.iter().all(u8::is_ascii_whitespace) {
        LogoutRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|_| {
            warp::reject::custom(CampusError::ValidationError(
                "Request body must be a JSON object".to_string(),
            ))
        })?
    };
    state
        .sessions
        .logout(&ctx, request.refresh_token.as_deref())
        .await
        .map_err(warp::reject::custom)?;
    Ok(success(
        StatusCode::OK,
        Some("Logged out successfully"),
        &json!({}),
    ))
}

pub async fn change_password(
    ctx: AuthContext,
    body: ChangePasswordRequest,
    state: AppState,
) -> std::result::Result<impl Reply, Rejection> {
    let current = body.current_password.unwrap_or_default();
    let new = required(body.new_password, "New password").map_err(warp::reject::custom)?;
    state
        .sessions
        .change_password(&ctx, current, new)
        .await
        .map_err(warp::reject::custom)?;
    Ok(success(
        StatusCode::OK,
        Some("Password updated successfully"),
        &json!({}),
    ))
}

pub async fn update_profile(
    ctx: AuthContext,
    body: ProfileRequest,
    state: AppState,
) -> std::result::Result<impl Reply, Rejection> {
    let user = state
        .sessions
        .update_profile(&ctx, body.into_update())
        .await
        .map_err(warp::reject::custom)?;
    Ok(success(
        StatusCode::OK,
        Some("Profile updated successfully"),
        &json!({ "user": user }),
    ))
}

pub async fn refresh(body: RefreshRequest, state: AppState) -> std::result::Result<impl Reply, Rejection> {
    let token = required(body.refresh_token, "Refresh token").map_err(warp::reject::custom)?;
    let grant = state
        .sessions
        .refresh(&token)
        .await
        .map_err(warp::reject::custom)?;
    Ok(success(StatusCode::OK, None, &grant))
}

pub(crate) fn parse_role(raw: Option<&str>) -> Result<Option<Role>> {
    match raw.map(str::trim).filter(|r| !r.is_empty()) {
        Some(role) => role.parse().map(Some),
        None => Ok(None),
    }
}

pub(crate) fn required(value: Option<String>, field: &str) -> Result<String> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| CampusError::ValidationError(format!("{} is required", field)))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
