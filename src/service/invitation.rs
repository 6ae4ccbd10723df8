//! Volunteer invitation flow

use std::sync::Arc;

use super::UserDirectory;
use crate::data::{User, UserStatus, UserType};
use crate::error::AppError;
use crate::identity::IdentityProvider;
use crate::mail::{Mailbox, Mailer, templates};
use crate::metrics::INVITATIONS_TOTAL;

/// Registers volunteers and sends them an invitation email
#[derive(Clone)]
pub struct InvitationService {
    directory: UserDirectory,
    identity: Arc<dyn IdentityProvider>,
    mailer: Arc<dyn Mailer>,
    /// Public base URL, e.g. "https://scheduler.example.org"
    base_url: String,
}

impl InvitationService {
    pub fn new(
        directory: UserDirectory,
        identity: Arc<dyn IdentityProvider>,
        mailer: Arc<dyn Mailer>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            directory,
            identity,
            mailer,
            base_url: base_url.into(),
        }
    }

    /// Link sent in the invitation email
    pub fn dashboard_url(&self) -> String {
        format!("{}/dash", self.base_url.trim_end_matches('/'))
    }

    /// Invite a new volunteer
    ///
    /// # Steps
    /// 1. Build a pending volunteer
    /// 2. Register the email with the identity provider
    /// 3. Upsert the user with the provider id
    /// 4. Send the invitation email
    /// 5. Mark the user as invited
    ///
    /// A failure stops the flow where it happened. Earlier steps are not
    /// undone, so the user may stay `Pending`.
    ///
    /// Re-inviting a volunteer who has not signed in yet resends the email.
    /// Any other existing user is left untouched and the call fails with
    /// `AppError::Validation`.
    pub async fn invite(&self, name: &str, email: &str) -> Result<User, AppError> {
        let result = self.run(name, email).await;
        let outcome = if result.is_ok() { "sent" } else { "failed" };
        INVITATIONS_TOTAL.with_label_values(&[outcome]).inc();
        result
    }

    async fn run(&self, name: &str, email: &str) -> Result<User, AppError> {
        let mut user = User::new_volunteer(name, email)?;

        let remote_id = self
            .identity
            .create_user(&user.email)
            .await
            .map_err(|e| e.context("failed to create user in identity provider"))?;
        user.remote_id = Some(remote_id);

        if let Some(existing) = self.existing_user(&user).await? {
            if !is_open_invitation(&existing) {
                return Err(AppError::Validation(format!(
                    "{} is already registered as {} ({})",
                    existing.email, existing.user_type, existing.status
                )));
            }
            user.id = existing.id;
            user.status = existing.status;
            tracing::info!(email = %user.email, "Resending invitation");
        }

        self.directory
            .upsert(&mut user)
            .await
            .map_err(|e| e.context("failed to upsert user"))?;

        let message = templates::invitation(
            Mailbox::new(user.display_name(), user.email.clone()),
            &self.dashboard_url(),
        );
        self.mailer
            .send(&message)
            .await
            .map_err(|e| e.context("failed to send invitation email"))?;

        user.status = UserStatus::Invited;
        self.directory
            .upsert(&mut user)
            .await
            .map_err(|e| e.context("failed to mark user as invited"))?;

        tracing::info!(
            user_id = ?user.id,
            remote_id = ?user.remote_id,
            email = %user.email,
            "Volunteer invited"
        );
        Ok(user)
    }

    async fn existing_user(&self, user: &User) -> Result<Option<User>, AppError> {
        let by_remote_id = match user.remote_id.as_deref() {
            Some(remote_id) => self.directory.find_by_remote_id(remote_id).await,
            None => Ok(None),
        }
        .map_err(|e| e.context("failed to select existing user"))?;
        if by_remote_id.is_some() {
            return Ok(by_remote_id);
        }

        self.directory
            .find_by_email(&user.email)
            .await
            .map_err(|e| e.context("failed to select existing user"))
    }
}

/// Volunteer who was registered but never signed in
fn is_open_invitation(user: &User) -> bool {
    user.user_type == UserType::Volunteer
        && matches!(user.status, UserStatus::Pending | UserStatus::Invited)
}
