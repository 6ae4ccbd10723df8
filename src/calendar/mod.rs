//! Calendar provisioning
//!
//! Creates shared calendars and grants users access to them.

mod google;

pub use google::GoogleCalendarClient;

use axum::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// A provisioned calendar
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Calendar {
    pub id: String,
    pub summary: String,
}

/// Access level granted on a calendar
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AclRole {
    #[default]
    Reader,
    Writer,
    Owner,
}

impl AclRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Reader => "reader",
            Self::Writer => "writer",
            Self::Owner => "owner",
        }
    }
}

/// Operations consumed from the calendar provider
#[async_trait]
pub trait CalendarProvider: Send + Sync {
    /// Create a new secondary calendar
    async fn create_calendar(&self, summary: &str) -> Result<Calendar, AppError>;

    /// Grant `email` access to a calendar
    async fn share_calendar(
        &self,
        calendar_id: &str,
        email: &str,
        role: AclRole,
    ) -> Result<(), AppError>;
}
