//! Identity provider client
//!
//! Handles:
//! - OAuth token exchange (sign-in with Google through the provider)
//! - Session authentication and revocation
//! - Registering users by email

mod stytch;

pub use stytch::StytchClient;

use axum::async_trait;

use crate::error::AppError;

/// Result of a successful session authentication
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedSession {
    /// Provider user id
    pub user_id: String,
    /// Session token, possibly rotated by the provider
    pub session_token: String,
}

/// Operations consumed from the identity provider
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Exchange an OAuth token for a session token
    ///
    /// An existing session token, when given, is extended instead of
    /// replaced.
    async fn authenticate_oauth(
        &self,
        oauth_token: &str,
        session_token: Option<&str>,
    ) -> Result<String, AppError>;

    /// Validate a session token and extend its lifetime
    ///
    /// # Errors
    /// `AppError::Unauthorized` when the token is expired, revoked or
    /// unknown; `AppError::Identity` when the provider cannot be reached
    async fn authenticate_session(
        &self,
        session_token: &str,
    ) -> Result<AuthenticatedSession, AppError>;

    /// Revoke a session token
    async fn revoke_session(&self, session_token: &str) -> Result<(), AppError>;

    /// Return the provider id for `email`, creating a pending provider
    /// user if none exists yet
    async fn create_user(&self, email: &str) -> Result<String, AppError>;
}
