//! Data models
//!
//! Rust structs representing database entities.
//! Status and type are stored as stable integer codes; new variants
//! must be appended, never renumbered.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::AppError;

// =============================================================================
// User status
// =============================================================================

/// Lifecycle state of a user
///
/// Ordered by lifecycle progress, except `Deleted` which is terminal
/// from any state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    #[default]
    Undefined,
    Pending,
    Invited,
    Active,
    Inactive,
    Deleted,
}

impl UserStatus {
    /// Stable integer code stored in the database
    pub fn code(self) -> i64 {
        match self {
            Self::Undefined => 0,
            Self::Pending => 1,
            Self::Invited => 2,
            Self::Active => 3,
            Self::Inactive => 4,
            Self::Deleted => 5,
        }
    }

    /// Decode a stored integer code
    ///
    /// # Errors
    /// Returns `AppError::Validation` for codes outside the known range
    pub fn from_code(code: i64) -> Result<Self, AppError> {
        match code {
            0 => Ok(Self::Undefined),
            1 => Ok(Self::Pending),
            2 => Ok(Self::Invited),
            3 => Ok(Self::Active),
            4 => Ok(Self::Inactive),
            5 => Ok(Self::Deleted),
            _ => Err(AppError::Validation(format!(
                "invalid status {code} provided"
            ))),
        }
    }

    /// A persisted user never carries `Undefined`
    pub fn is_valid(self) -> bool {
        self != Self::Undefined
    }

    /// Whether a successful sign-in moves this status to `Active`
    pub fn promotes_on_login(self) -> bool {
        matches!(self, Self::Pending | Self::Invited | Self::Inactive)
    }

    /// Whether a user in this status may authenticate at all
    pub fn can_authenticate(self) -> bool {
        !matches!(self, Self::Undefined | Self::Deleted)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Undefined => "",
            Self::Pending => "pending",
            Self::Invited => "invited",
            Self::Active => "active",
            Self::Inactive => "inactive",
            Self::Deleted => "deleted",
        }
    }
}

impl fmt::Display for UserStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// User type
// =============================================================================

/// Authorization tier of a user
///
/// Ordered from least to highest privilege.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserType {
    #[default]
    Undefined,
    Recruit,
    Volunteer,
    Admin,
}

impl UserType {
    /// Stable integer code stored in the database
    pub fn code(self) -> i64 {
        match self {
            Self::Undefined => 0,
            Self::Recruit => 1,
            Self::Volunteer => 2,
            Self::Admin => 3,
        }
    }

    /// Decode a stored integer code
    ///
    /// # Errors
    /// Returns `AppError::Validation` for codes outside the known range
    pub fn from_code(code: i64) -> Result<Self, AppError> {
        match code {
            0 => Ok(Self::Undefined),
            1 => Ok(Self::Recruit),
            2 => Ok(Self::Volunteer),
            3 => Ok(Self::Admin),
            _ => Err(AppError::Validation(format!("invalid type {code} provided"))),
        }
    }

    pub fn is_valid(self) -> bool {
        self != Self::Undefined
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Undefined => "",
            Self::Recruit => "recruit",
            Self::Volunteer => "volunteer",
            Self::Admin => "admin",
        }
    }
}

impl fmt::Display for UserType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// User
// =============================================================================

/// A person known to the scheduler
///
/// `email` is the business key. `remote_id` is the identity provider's
/// user id; once stored it is never overwritten.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Local id, `None` until persisted
    pub id: Option<i64>,
    pub name: Option<String>,
    pub email: String,
    pub remote_id: Option<String>,
    pub status: UserStatus,
    #[serde(rename = "type")]
    pub user_type: UserType,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Build an unpersisted user
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        status: UserStatus,
        user_type: UserType,
    ) -> Self {
        let name = name.into();
        let now = Utc::now();
        Self {
            id: None,
            name: normalize_name(name),
            email: email.into().trim().to_string(),
            remote_id: None,
            status,
            user_type,
            created_at: now,
            updated_at: now,
        }
    }

    /// Build a pending volunteer, validated
    pub fn new_volunteer(name: &str, email: &str) -> Result<Self, AppError> {
        let user = Self::new(name, email, UserStatus::Pending, UserType::Volunteer);
        user.validate()
            .map_err(|e| e.context("invalid user"))?;
        Ok(user)
    }

    /// Check status, type and email before any write
    ///
    /// All problems are reported together.
    pub fn validate(&self) -> Result<(), AppError> {
        let mut problems = Vec::new();
        if !self.status.is_valid() {
            problems.push(format!("invalid status {} provided", self.status.code()));
        }
        if !self.user_type.is_valid() {
            problems.push(format!("invalid type {} provided", self.user_type.code()));
        }
        if !is_plausible_email(&self.email) {
            problems.push(format!("invalid email {:?} provided", self.email));
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(problems.join("; ")))
        }
    }

    /// Name to greet the user with, falling back to the email
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.email)
    }
}

fn normalize_name(name: String) -> Option<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn is_plausible_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && !domain.is_empty() && !email.chars().any(char::is_whitespace)
        }
        None => false,
    }
}

/// Raw `users` row as stored in SQLite
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserRow {
    pub id: i64,
    pub name: Option<String>,
    pub email: String,
    pub remote_id: Option<String>,
    pub status: i64,
    #[sqlx(rename = "type")]
    pub user_type: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = AppError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: Some(row.id),
            name: row.name,
            email: row.email,
            remote_id: row.remote_id.filter(|id| !id.is_empty()),
            status: UserStatus::from_code(row.status)?,
            user_type: UserType::from_code(row.user_type)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
