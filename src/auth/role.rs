use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CampusError;

/// The closed set of principal kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Faculty,
    Hod,
    Principal,
    Admin,
    Warden,
    Canteen,
    Stall,
    Sports,
    Club,
}

impl Role {
    pub const ALL: [Role; 10] = [
        Role::Student,
        Role::Faculty,
        Role::Hod,
        Role::Principal,
        Role::Admin,
        Role::Warden,
        Role::Canteen,
        Role::Stall,
        Role::Sports,
        Role::Club,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Faculty => "faculty",
            Role::Hod => "hod",
            Role::Principal => "principal",
            Role::Admin => "admin",
            Role::Warden => "warden",
            Role::Canteen => "canteen",
            Role::Stall => "stall",
            Role::Sports => "sports",
            Role::Club => "club",
        }
    }

    /// Prefix used for human-readable identifiers
    pub fn id_prefix(&self) -> &'static str {
        match self {
            Role::Student => "STU",
            Role::Faculty => "FAC",
            Role::Hod => "HOD",
            Role::Principal => "PRI",
            Role::Admin => "ADMIN",
            Role::Warden => "WRD",
            Role::Canteen => "CAN",
            Role::Stall => "STALL",
            Role::Sports => "SPT",
            Role::Club => "CLB",
        }
    }

    fn bit(self) -> u16 {
        1 << (self as u16)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = CampusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Role::ALL
            .iter()
            .copied()
            .find(|role| role.as_str() == wanted)
            .ok_or_else(|| CampusError::ValidationError(format!("Invalid role: {}", s.trim())))
    }
}

/// Route allow-list over [`Role`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RoleSet(u16);

impl RoleSet {
    /// Admits every role (authentication only)
    pub fn any() -> Self {
        Role::ALL.iter().fold(Self(0), |set, role| set.with(*role))
    }

    pub fn only(role: Role) -> Self {
        Self(role.bit())
    }

    pub fn of(roles: &[Role]) -> Self {
        roles.iter().fold(Self(0), |set, role| set.with(*role))
    }

    pub fn with(self, role: Role) -> Self {
        Self(self.0 | role.bit())
    }

    pub fn contains(&self, role: Role) -> bool {
        self.0 & role.bit() != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn roles(&self) -> Vec<Role> {
        Role::ALL.iter().copied().filter(|r| self.contains(*r)).collect()
    }
}

/// Account status; only `Active` may log in or pass the guard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    Active,
    Inactive,
    Suspended,
}

impl AccountStatus {
    pub fn is_active(&self) -> bool {
        matches!(self, AccountStatus::Active)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AccountStatus::Active => "active",
            AccountStatus::Inactive => "inactive",
            AccountStatus::Suspended => "suspended",
        }
    }
}

impl FromStr for AccountStatus {
    type Err = CampusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "active" => Ok(AccountStatus::Active),
            "inactive" => Ok(AccountStatus::Inactive),
            "suspended" => Ok(AccountStatus::Suspended),
            other => Err(CampusError::ValidationError(format!("Invalid status: {}", other))),
        }
    }
}
