use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::OnceLock;

use crate::auth::role::{AccountStatus, Role};
use crate::error::{CampusError, Result};

const EMAIL_PATTERN: &str = r"^\w+([.-]?\w+)*@\w+([.-]?\w+)*(\.\w{2,3})+$";

fn email_regex() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| Regex::new(EMAIL_PATTERN).expect("email pattern is valid"))
}

/// Trims, lowercases and validates an email address
pub fn normalize_email(raw: &str) -> Result<String> {
    let email = raw.trim().to_lowercase();
    if email.is_empty() {
        return Err(CampusError::ValidationError("Email is required".to_string()));
    }
    if !email_regex().is_match(&email) {
        return Err(CampusError::ValidationError(
            "Please provide a valid email".to_string(),
        ));
    }
    Ok(email)
}

/// Human identifiers are stored upper-case
pub fn normalize_human_id(raw: &str) -> String {
    raw.trim().to_ascii_uppercase()
}

/// A stored principal. Deliberately not `Serialize`: the digest must never
/// leave the process, use [`PrincipalSummary`] for external representations.
#[derive(Clone)]
pub struct Principal {
    pub id: String,
    pub human_id: String,
    pub email: String,
    pub password_digest: String,
    pub name: String,
    pub phone: Option<String>,
    pub department: Option<String>,
    pub role: Role,
    pub status: AccountStatus,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    /// Role-specific attributes, opaque to the auth core
    pub attributes: HashMap<String, Value>,
}

impl fmt::Debug for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Principal")
            .field("id", &self.id)
            .field("human_id", &self.human_id)
            .field("email", &self.email)
            .field("password_digest", &"<redacted>")
            .field("role", &self.role)
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

impl Principal {
    pub fn summary(&self) -> PrincipalSummary {
        PrincipalSummary::from(self)
    }
}

/// Everything needed to insert a principal; the store assigns `id`
#[derive(Clone)]
pub struct NewPrincipal {
    pub human_id: String,
    pub email: String,
    pub password_digest: String,
    pub name: String,
    pub phone: Option<String>,
    pub department: Option<String>,
    pub role: Role,
    pub status: AccountStatus,
    pub attributes: HashMap<String, Value>,
}

/// Partial update of the editable profile fields. `None` leaves a field
/// untouched; an empty phone or department clears it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub department: Option<String>,
    /// Merged into the stored attributes key by key
    pub attributes: Option<HashMap<String, Value>>,
    /// Only ever set by administrators
    pub role: Option<Role>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.phone.is_none()
            && self.department.is_none()
            && self.attributes.is_none()
            && self.role.is_none()
    }

    /// Trims values and rejects an empty name
    pub fn normalized(mut self) -> Result<Self> {
        if let Some(name) = self.name.take() {
            let name = name.trim().to_string();
            if name.is_empty() {
                return Err(CampusError::ValidationError("Name cannot be empty".to_string()));
            }
            self.name = Some(name);
        }
        self.phone = self.phone.map(|v| v.trim().to_string());
        self.department = self.department.map(|v| v.trim().to_string());
        Ok(self)
    }

    /// Applies the update to a stored record
    pub fn apply(self, principal: &mut Principal) {
        if let Some(name) = self.name {
            principal.name = name;
        }
        if let Some(phone) = self.phone {
            principal.phone = Some(phone).filter(|v| !v.is_empty());
        }
        if let Some(department) = self.department {
            principal.department = Some(department).filter(|v| !v.is_empty());
        }
        if let Some(attributes) = self.attributes {
            principal.attributes.extend(attributes);
        }
        if let Some(role) = self.role {
            principal.role = role;
        }
    }
}

/// Client-facing view of a principal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrincipalSummary {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub status: AccountStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_login_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "HashMap::is_empty", default)]
    pub profile: HashMap<String, Value>,
}

impl From<&Principal> for PrincipalSummary {
    fn from(p: &Principal) -> Self {
        Self {
            id: p.id.clone(),
            user_id: p.human_id.clone(),
            name: p.name.clone(),
            email: p.email.clone(),
            role: p.role,
            status: p.status,
            department: p.department.clone(),
            phone: p.phone.clone(),
            last_login_at: p.last_login_at,
            profile: p.attributes.clone(),
        }
    }
}
