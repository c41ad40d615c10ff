//! Role-gated entry points of the ten campus portals. What lives behind
//! each dashboard belongs to other services; this layer only decides who
//! gets in.

use serde_json::json;
use warp::http::StatusCode;
use warp::{Rejection, Reply};

use crate::auth::role::{Role, RoleSet};
use crate::core::server::AppState;
use crate::handlers::success;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Portal {
    Student,
    Faculty,
    Hod,
    Principal,
    Admin,
    Club,
    Hostel,
    Canteen,
    Stall,
    Sports,
}

impl Portal {
    pub const ALL: [Portal; 10] = [
        Portal::Student,
        Portal::Faculty,
        Portal::Hod,
        Portal::Principal,
        Portal::Admin,
        Portal::Club,
        Portal::Hostel,
        Portal::Canteen,
        Portal::Stall,
        Portal::Sports,
    ];

    /// URL path segment
    pub fn segment(&self) -> &'static str {
        match self {
            Portal::Student => "student",
            Portal::Faculty => "faculty",
            Portal::Hod => "hod",
            Portal::Principal => "principal",
            Portal::Admin => "admin",
            Portal::Club => "club",
            Portal::Hostel => "hostel",
            Portal::Canteen => "canteen",
            Portal::Stall => "stall",
            Portal::Sports => "sports",
        }
    }

    pub fn from_segment(segment: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|p| p.segment() == segment)
    }

    pub fn allowed_roles(&self) -> RoleSet {
        match self {
            Portal::Student => RoleSet::only(Role::Student),
            Portal::Faculty => RoleSet::only(Role::Faculty),
            Portal::Hod => RoleSet::only(Role::Hod),
            Portal::Principal => RoleSet::only(Role::Principal),
            Portal::Admin => RoleSet::only(Role::Admin),
            Portal::Club => RoleSet::only(Role::Club),
            Portal::Hostel => RoleSet::only(Role::Warden),
            Portal::Canteen => RoleSet::only(Role::Canteen),
            Portal::Stall => RoleSet::only(Role::Stall),
            // Students and faculty book facilities through the sports portal
            Portal::Sports => RoleSet::of(&[Role::Sports, Role::Student, Role::Faculty]),
        }
    }
}

pub async fn dashboard(
    segment: String,
    auth_header: Option<String>,
    state: AppState,
) -> Result<impl Reply, Rejection> {
    let portal = Portal::from_segment(&segment).ok_or_else(warp::reject::not_found)?;
    let ctx = state
        .guard
        .authorize(auth_header.as_deref(), portal.allowed_roles())
        .await
        .map_err(warp::reject::custom)?;

    Ok(success(
        StatusCode::OK,
        None,
        &json!({
            "portal": portal.segment(),
            "user": ctx.principal.summary(),
        }),
    ))
}
