//! Google Calendar v3 REST client

use std::time::Instant;

use axum::async_trait;
use serde::{Deserialize, Serialize};

use super::{AclRole, Calendar, CalendarProvider};
use crate::config::CalendarConfig;
use crate::error::AppError;

/// Calendar provider backed by Google Calendar
pub struct GoogleCalendarClient {
    http: reqwest::Client,
    api_base: String,
    access_token: String,
}

#[derive(Debug, Serialize)]
struct InsertCalendarRequest<'a> {
    summary: &'a str,
}

#[derive(Debug, Deserialize)]
struct CalendarResource {
    id: String,
    #[serde(default)]
    summary: String,
}

#[derive(Debug, Serialize)]
struct AclRuleRequest<'a> {
    role: &'static str,
    scope: AclScope<'a>,
}

#[derive(Debug, Serialize)]
struct AclScope<'a> {
    #[serde(rename = "type")]
    scope_type: &'static str,
    value: &'a str,
}

impl GoogleCalendarClient {
    /// Build a client from configuration
    ///
    /// # Returns
    /// `None` when no access token is configured
    pub fn from_config(config: &CalendarConfig, http: reqwest::Client) -> Option<Self> {
        let access_token = config
            .access_token
            .as_deref()
            .map(str::trim)
            .filter(|token| !token.is_empty())?;

        Some(Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            access_token: access_token.to_string(),
        })
    }

    async fn post_json<B: Serialize + Sync>(
        &self,
        operation: &str,
        path: &str,
        body: &B,
    ) -> Result<reqwest::Response, AppError> {
        let started = Instant::now();
        let result = self
            .http
            .post(format!("{}{}", self.api_base, path))
            .bearer_auth(&self.access_token)
            .json(body)
            .send()
            .await;

        let result = match result {
            Ok(response) if response.status().is_success() => Ok(response),
            Ok(response) => {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                Err(AppError::Calendar(format!(
                    "{operation} failed: provider returned {status}: {body}"
                )))
            }
            Err(e) => Err(AppError::Calendar(format!("{operation} failed: {e}"))),
        };

        let status = if result.is_ok() { "ok" } else { "failed" };
        crate::metrics::observe_upstream("google_calendar", operation, status, started.elapsed());
        result
    }
}

#[async_trait]
impl CalendarProvider for GoogleCalendarClient {
    async fn create_calendar(&self, summary: &str) -> Result<Calendar, AppError> {
        let response = self
            .post_json(
                "calendars_insert",
                "/calendars",
                &InsertCalendarRequest { summary },
            )
            .await?;

        let resource: CalendarResource = response
            .json()
            .await
            .map_err(|e| AppError::Calendar(format!("failed to insert calendar: {e}")))?;

        tracing::info!(calendar_id = %resource.id, summary = %summary, "Calendar created");

        Ok(Calendar {
            id: resource.id,
            summary: if resource.summary.is_empty() {
                summary.to_string()
            } else {
                resource.summary
            },
        })
    }

    async fn share_calendar(
        &self,
        calendar_id: &str,
        email: &str,
        role: AclRole,
    ) -> Result<(), AppError> {
        let request = AclRuleRequest {
            role: role.as_str(),
            scope: AclScope {
                scope_type: "user",
                value: email,
            },
        };
        let path = format!("/calendars/{}/acl", urlencoding::encode(calendar_id));
        self.post_json("acl_insert", &path, &request).await?;

        tracing::info!(calendar_id = %calendar_id, email = %email, role = role.as_str(), "Calendar shared");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_requires_access_token() {
        let http = reqwest::Client::new();
        assert!(GoogleCalendarClient::from_config(&CalendarConfig::default(), http.clone()).is_none());

        let config = CalendarConfig {
            access_token: Some("  ".to_string()),
            ..CalendarConfig::default()
        };
        assert!(GoogleCalendarClient::from_config(&config, http.clone()).is_none());

        let config = CalendarConfig {
            access_token: Some("ya29.test".to_string()),
            ..CalendarConfig::default()
        };
        assert!(GoogleCalendarClient::from_config(&config, http).is_some());
    }

    #[test]
    fn acl_rule_shape() {
        let request = AclRuleRequest {
            role: AclRole::Writer.as_str(),
            scope: AclScope {
                scope_type: "user",
                value: "jo@example.com",
            },
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            serde_json::json!({"role": "writer", "scope": {"type": "user", "value": "jo@example.com"}})
        );
    }
}
