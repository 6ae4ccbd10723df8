//! Session to principal resolution
//!
//! Plain sequence run by the auth middleware:
//! session token → identity provider → local user → status promotion.

use crate::data::{User, UserType};
use crate::error::AppError;
use crate::identity::IdentityProvider;
use crate::metrics::AUTH_ATTEMPTS_TOTAL;
use crate::service::UserDirectory;
use crate::session::{SESSION_TOKEN_KEY, Session, SessionManager};

/// Authenticated user attached to a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    /// Identity provider user id
    pub remote_id: String,
    /// Local user record, already promoted if needed
    pub user: User,
    /// Stored roles plus the directory type, ascending
    pub roles: Vec<UserType>,
}

impl Principal {
    pub fn new(remote_id: impl Into<String>, user: User, mut roles: Vec<UserType>) -> Self {
        if user.user_type.is_valid() && !roles.contains(&user.user_type) {
            roles.push(user.user_type);
        }
        roles.sort();
        Self {
            remote_id: remote_id.into(),
            user,
            roles,
        }
    }

    /// Whether any effective role is at least `min`
    pub fn has_role_at_least(&self, min: UserType) -> bool {
        self.roles.iter().any(|role| *role >= min)
    }
}

/// Collaborators the pipeline reads from
pub struct Authenticator<'a> {
    pub identity: &'a dyn IdentityProvider,
    pub directory: &'a UserDirectory,
    pub sessions: &'a SessionManager,
}

impl Authenticator<'_> {
    /// Resolve the principal behind a session
    ///
    /// # Errors
    /// `AppError::Unauthorized` when the session has no token, the provider
    /// rejects it, the user is unknown or its status cannot sign in. Store
    /// and database failures keep their own variant.
    pub async fn authenticate(&self, session: &Session) -> Result<Principal, AppError> {
        let Some(token) = session.get(SESSION_TOKEN_KEY) else {
            record("missing_token");
            return Err(AppError::Unauthorized("session token not found".to_string()));
        };

        let authenticated = match self.identity.authenticate_session(token).await {
            Ok(authenticated) => authenticated,
            Err(error) => {
                record("rejected");
                tracing::debug!(%error, "Session token rejected");
                return Err(match error {
                    AppError::Unauthorized(msg) => AppError::Unauthorized(msg),
                    other => AppError::Unauthorized(format!(
                        "unable to authenticate session token: {other}"
                    )),
                });
            }
        };
        let remote_id = authenticated.user_id;

        let Some(mut user) = self
            .directory
            .find_by_remote_id(&remote_id)
            .await
            .map_err(|e| e.context("failed to get user"))?
        else {
            record("unknown_user");
            tracing::warn!(remote_id = %remote_id, "Authenticated user not in directory");
            return Err(AppError::Unauthorized("user not found".to_string()));
        };

        if !user.status.can_authenticate() {
            record("invalid_status");
            tracing::warn!(remote_id = %remote_id, status = %user.status, "Sign-in refused");
            return Err(AppError::Unauthorized(format!(
                "invalid status {}",
                user.status
            )));
        }

        self.directory.promote_on_login(&mut user).await?;

        let roles = self.sessions.roles(&remote_id).await?;

        record("success");
        Ok(Principal::new(remote_id, user, roles))
    }
}

fn record(outcome: &str) {
    AUTH_ATTEMPTS_TOTAL.with_label_values(&[outcome]).inc();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::UserStatus;

    fn user(user_type: UserType) -> User {
        User::new("Jo", "jo@example.com", UserStatus::Active, user_type)
    }

    #[test]
    fn directory_type_joins_stored_roles() {
        let principal = Principal::new("user-test-jo", user(UserType::Volunteer), vec![UserType::Recruit]);
        assert_eq!(principal.roles, vec![UserType::Recruit, UserType::Volunteer]);
        assert!(principal.has_role_at_least(UserType::Volunteer));
        assert!(!principal.has_role_at_least(UserType::Admin));
    }

    #[test]
    fn undefined_type_adds_no_role() {
        let principal = Principal::new("user-test-jo", user(UserType::Undefined), Vec::new());
        assert!(principal.roles.is_empty());
        assert!(!principal.has_role_at_least(UserType::Recruit));
    }
}
