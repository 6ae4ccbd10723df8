//! Stytch REST client
//!
//! Talks to the Stytch v1 API with HTTP basic auth (project id / secret).

use std::time::Instant;

use axum::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::{AuthenticatedSession, IdentityProvider};
use crate::config::IdentityConfig;
use crate::error::AppError;

/// Identity provider backed by Stytch
pub struct StytchClient {
    http: reqwest::Client,
    base_url: String,
    project_id: String,
    secret: String,
    session_duration_minutes: u32,
}

/// Why a provider call failed
#[derive(Debug)]
enum CallError {
    /// The provider answered with a 4xx
    Rejected { status: u16, message: String },
    /// Transport failure, 5xx or unreadable body
    Unavailable(String),
}

impl CallError {
    fn into_app_error(self, context: &str) -> AppError {
        match self {
            CallError::Rejected { status, message } => {
                AppError::Identity(format!("{context}: provider returned {status}: {message}"))
            }
            CallError::Unavailable(message) => AppError::Identity(format!("{context}: {message}")),
        }
    }
}

/// Error body returned by the provider
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error_type: String,
    #[serde(default)]
    error_message: String,
}

// =============================================================================
// Wire types
// =============================================================================

#[derive(Debug, Serialize)]
struct OAuthAuthenticateRequest<'a> {
    token: &'a str,
    session_duration_minutes: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    session_token: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct OAuthAuthenticateResponse {
    session_token: String,
}

#[derive(Debug, Serialize)]
struct SessionsAuthenticateRequest<'a> {
    session_token: &'a str,
    session_duration_minutes: u32,
}

#[derive(Debug, Deserialize)]
struct SessionsAuthenticateResponse {
    session_token: String,
    user: UserRef,
}

#[derive(Debug, Serialize)]
struct SessionsRevokeRequest<'a> {
    session_token: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmptyResponse {}

#[derive(Debug, Serialize)]
struct UsersSearchRequest<'a> {
    limit: u32,
    query: SearchQuery<'a>,
}

#[derive(Debug, Serialize)]
struct SearchQuery<'a> {
    operator: &'static str,
    operands: Vec<SearchOperand<'a>>,
}

#[derive(Debug, Serialize)]
struct SearchOperand<'a> {
    filter_name: &'static str,
    filter_value: Vec<&'a str>,
}

#[derive(Debug, Deserialize)]
struct UsersSearchResponse {
    #[serde(default)]
    results: Vec<UserRef>,
}

#[derive(Debug, Serialize)]
struct UsersCreateRequest<'a> {
    email: &'a str,
    create_user_as_pending: bool,
}

#[derive(Debug, Deserialize)]
struct UserRef {
    user_id: String,
}

impl StytchClient {
    /// Create a client for the configured environment
    pub fn new(config: &IdentityConfig, http: reqwest::Client) -> Self {
        Self {
            http,
            base_url: config.api_base().trim_end_matches('/').to_string(),
            project_id: config.project_id.clone(),
            secret: config.secret.clone(),
            session_duration_minutes: config.session_duration_minutes,
        }
    }

    async fn post<B, R>(&self, operation: &str, path: &str, body: &B) -> Result<R, CallError>
    where
        B: Serialize + Sync,
        R: DeserializeOwned,
    {
        let started = Instant::now();
        let result = self.post_inner(path, body).await;
        let status = match &result {
            Ok(_) => "ok",
            Err(CallError::Rejected { .. }) => "rejected",
            Err(CallError::Unavailable(_)) => "unavailable",
        };
        crate::metrics::observe_upstream("stytch", operation, status, started.elapsed());
        result
    }

    async fn post_inner<B, R>(&self, path: &str, body: &B) -> Result<R, CallError>
    where
        B: Serialize + Sync,
        R: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .http
            .post(&url)
            .basic_auth(&self.project_id, Some(&self.secret))
            .json(body)
            .send()
            .await
            .map_err(|e| CallError::Unavailable(e.to_string()))?;

        let status = response.status();
        if status.is_client_error() {
            let message = match response.json::<ErrorBody>().await {
                Ok(body) if !body.error_message.is_empty() => {
                    format!("{} ({})", body.error_message, body.error_type)
                }
                _ => status.to_string(),
            };
            return Err(CallError::Rejected {
                status: status.as_u16(),
                message,
            });
        }
        if !status.is_success() {
            return Err(CallError::Unavailable(format!("provider returned {status}")));
        }

        response
            .json::<R>()
            .await
            .map_err(|e| CallError::Unavailable(format!("invalid response body: {e}")))
    }

    async fn search_user_by_email(&self, email: &str) -> Result<Option<String>, CallError> {
        let request = UsersSearchRequest {
            limit: 1,
            query: SearchQuery {
                operator: "AND",
                operands: vec![SearchOperand {
                    filter_name: "email_address",
                    filter_value: vec![email],
                }],
            },
        };
        let response: UsersSearchResponse =
            self.post("users_search", "/v1/users/search", &request).await?;
        Ok(response.results.into_iter().next().map(|user| user.user_id))
    }
}

#[async_trait]
impl IdentityProvider for StytchClient {
    async fn authenticate_oauth(
        &self,
        oauth_token: &str,
        session_token: Option<&str>,
    ) -> Result<String, AppError> {
        if oauth_token.is_empty() {
            return Err(AppError::Unauthorized("empty oauth token".to_string()));
        }

        let request = OAuthAuthenticateRequest {
            token: oauth_token,
            session_duration_minutes: self.session_duration_minutes,
            session_token: session_token.filter(|token| !token.is_empty()),
        };
        let response: OAuthAuthenticateResponse = self
            .post("oauth_authenticate", "/v1/oauth/authenticate", &request)
            .await
            .map_err(|e| match e {
                CallError::Rejected { message, .. } => AppError::Unauthorized(format!(
                    "unable to authenticate oauth token: {message}"
                )),
                other => other.into_app_error("unable to authenticate oauth token"),
            })?;

        Ok(response.session_token)
    }

    async fn authenticate_session(
        &self,
        session_token: &str,
    ) -> Result<AuthenticatedSession, AppError> {
        let request = SessionsAuthenticateRequest {
            session_token,
            session_duration_minutes: self.session_duration_minutes,
        };
        let response: SessionsAuthenticateResponse = self
            .post("sessions_authenticate", "/v1/sessions/authenticate", &request)
            .await
            .map_err(|e| match e {
                CallError::Rejected { message, .. } => AppError::Unauthorized(format!(
                    "unable to authenticate session token: {message}"
                )),
                other => other.into_app_error("unable to authenticate session token"),
            })?;

        Ok(AuthenticatedSession {
            user_id: response.user.user_id,
            session_token: response.session_token,
        })
    }

    async fn revoke_session(&self, session_token: &str) -> Result<(), AppError> {
        let request = SessionsRevokeRequest { session_token };
        let _: EmptyResponse = self
            .post("sessions_revoke", "/v1/sessions/revoke", &request)
            .await
            .map_err(|e| e.into_app_error("failed to revoke session"))?;
        Ok(())
    }

    async fn create_user(&self, email: &str) -> Result<String, AppError> {
        match self.search_user_by_email(email).await {
            Ok(Some(user_id)) => {
                tracing::debug!(email = %email, user_id = %user_id, "Identity user already exists");
                return Ok(user_id);
            }
            Ok(None) => {}
            // A failed search falls through to create; the provider dedups
            // by email and rejects true duplicates.
            Err(error) => {
                tracing::warn!(email = %email, ?error, "Identity user search failed");
            }
        }

        let request = UsersCreateRequest {
            email,
            create_user_as_pending: true,
        };
        let response: UserRef = self
            .post("users_create", "/v1/users", &request)
            .await
            .map_err(|e| e.into_app_error("failed to create user in identity provider"))?;

        tracing::info!(email = %email, user_id = %response.user_id, "Identity user created");
        Ok(response.user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oauth_request_omits_empty_session_token() {
        let request = OAuthAuthenticateRequest {
            token: "oauth-token",
            session_duration_minutes: 60,
            session_token: None,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"token": "oauth-token", "session_duration_minutes": 60})
        );
    }

    #[test]
    fn search_request_filters_by_email() {
        let request = UsersSearchRequest {
            limit: 1,
            query: SearchQuery {
                operator: "AND",
                operands: vec![SearchOperand {
                    filter_name: "email_address",
                    filter_value: vec!["jo@example.com"],
                }],
            },
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["query"]["operands"][0]["filter_value"][0], "jo@example.com");
        assert_eq!(json["query"]["operator"], "AND");
    }

    #[test]
    fn session_response_reads_nested_user_id() {
        let body = r#"{
            "status_code": 200,
            "session_token": "rotated-token",
            "session": {"session_id": "session-test-1"},
            "user": {"user_id": "user-test-1", "emails": []}
        }"#;
        let response: SessionsAuthenticateResponse = serde_json::from_str(body).unwrap();
        assert_eq!(response.user.user_id, "user-test-1");
        assert_eq!(response.session_token, "rotated-token");
    }

    #[test]
    fn rejected_calls_keep_provider_message() {
        let error = CallError::Rejected {
            status: 404,
            message: "session not found (session_not_found)".to_string(),
        }
        .into_app_error("failed to revoke session");
        assert!(matches!(
            error,
            AppError::Identity(msg) if msg.contains("404") && msg.contains("session_not_found")
        ));
    }
}
