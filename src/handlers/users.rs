//! Admin-only user administration endpoints

use serde::Deserialize;
use serde_json::json;
use warp::http::StatusCode;
use warp::{Rejection, Reply};

use crate::auth::role::AccountStatus;
use crate::core::guard::AuthContext;
use crate::core::server::AppState;
use crate::error::{CampusError, Result};
use crate::handlers::auth::{parse_role, required, ProfileRequest, RegisterRequest};
use crate::handlers::success;
use crate::storage::traits::PrincipalFilter;

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: Option<String>,
}

/// `GET /users?role=&status=&department=`
#[derive(Debug, Default, Deserialize)]
pub struct ListUsersQuery {
    pub role: Option<String>,
    pub status: Option<String>,
    pub department: Option<String>,
}

impl ListUsersQuery {
    fn into_filter(self) -> Result<PrincipalFilter> {
        let status = match self.status.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(status) => Some(status.parse::<AccountStatus>()?),
            None => None,
        };
        Ok(PrincipalFilter {
            role: parse_role(self.role.as_deref())?,
            status,
            department: self
                .department
                .map(|d| d.trim().to_string())
                .filter(|d| !d.is_empty()),
        })
    }
}

#[derive(Deserialize)]
pub struct UpdateUserRequest {
    #[serde(flatten)]
    pub profile: ProfileRequest,
    pub role: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub new_password: Option<String>,
}

pub async fn list_users(
    query: ListUsersQuery,
    _ctx: AuthContext,
    state: AppState,
) -> std::result::Result<impl Reply, Rejection> {
    let filter = query.into_filter().map_err(warp::reject::custom)?;
    let users = state
        .admin
        .list(&filter)
        .await
        .map_err(warp::reject::custom)?;
    Ok(success(
        StatusCode::OK,
        None,
        &json!({ "count": users.len(), "users": users }),
    ))
}

pub async fn user_stats(
    _ctx: AuthContext,
    state: AppState,
) -> std::result::Result<impl Reply, Rejection> {
    let stats = state.admin.stats().await.map_err(warp::reject::custom)?;
    Ok(success(StatusCode::OK, None, &stats))
}

pub async fn create_user(
    ctx: AuthContext,
    body: RegisterRequest,
    state: AppState,
) -> std::result::Result<impl Reply, Rejection> {
    let registration = body.into_registration().map_err(warp::reject::custom)?;
    let user = state
        .admin
        .create_user(&ctx, registration)
        .await
        .map_err(warp::reject::custom)?;
    Ok(success(
        StatusCode::CREATED,
        Some("User created successfully"),
        &json!({ "user": user, "userId": user.user_id }),
    ))
}

pub async fn update_user(
    principal_id: String,
    ctx: AuthContext,
    body: UpdateUserRequest,
    state: AppState,
) -> std::result::Result<impl Reply, Rejection> {
    let mut update = body.profile.into_update();
    update.role = parse_role(body.role.as_deref()).map_err(warp::reject::custom)?;
    let user = state
        .admin
        .update_user(&ctx, &principal_id, update)
        .await
        .map_err(warp::reject::custom)?;
    Ok(success(
        StatusCode::OK,
        Some("User updated successfully"),
        &json!({ "user": user }),
    ))
}

/// Soft delete: the account is deactivated and its sessions end
pub async fn deactivate_user(
    principal_id: String,
    ctx: AuthContext,
    state: AppState,
) -> std::result::Result<impl Reply, Rejection> {
    state
        .admin
        .set_status(&ctx, &principal_id, AccountStatus::Inactive)
        .await
        .map_err(warp::reject::custom)?;
    Ok(success(
        StatusCode::OK,
        Some("User deactivated successfully"),
        &json!({}),
    ))
}

pub async fn reset_password(
    principal_id: String,
    ctx: AuthContext,
    body: ResetPasswordRequest,
    state: AppState,
) -> std::result::Result<impl Reply, Rejection> {
    let new_password =
        required(body.new_password, "New password").map_err(warp::reject::custom)?;
    let user = state
        .admin
        .reset_password(&ctx, &principal_id, new_password)
        .await
        .map_err(warp::reject::custom)?;
    Ok(success(
        StatusCode::OK,
        Some("Password reset successfully"),
        &json!({ "userId": user.user_id, "email": user.email }),
    ))
}

pub async fn get_user(
    principal_id: String,
    _ctx: AuthContext,
    state: AppState,
) -> std::result::Result<impl Reply, Rejection> {
    let user = state
        .admin
        .get(&principal_id)
        .await
        .map_err(warp::reject::custom)?;
    Ok(success(StatusCode::OK, None, &json!({ "user": user })))
}

pub async fn set_status(
    principal_id: String,
    ctx: AuthContext,
    body: StatusRequest,
    state: AppState,
) -> std::result::Result<impl Reply, Rejection> {
    let status: AccountStatus = body
        .status
        .as_deref()
        .ok_or_else(|| CampusError::ValidationError("Status is required".to_string()))
        .and_then(str::parse)
        .map_err(warp::reject::custom)?;

    let user = state
        .admin
        .set_status(&ctx, &principal_id, status)
        .await
        .map_err(warp::reject::custom)?;
    Ok(success(
        StatusCode::OK,
        Some("User status updated"),
        &json!({ "user": user }),
    ))
}

pub async fn revoke_sessions(
    principal_id: String,
    ctx: AuthContext,
    state: AppState,
) -> std::result::Result<impl Reply, Rejection> {
    state
        .admin
        .revoke_sessions(&ctx, &principal_id)
        .await
        .map_err(warp::reject::custom)?;
    Ok(success(
        StatusCode::OK,
        Some("All sessions revoked"),
        &json!({}),
    ))
}

pub async fn retry_provisioning(
    _ctx: AuthContext,
    state: AppState,
) -> std::result::Result<impl Reply, Rejection> {
    let pending = state
        .admin
        .retry_provisioning()
        .await
        .map_err(warp::reject::custom)?;
    Ok(success(StatusCode::OK, None, &json!({ "pending": pending })))
}
