//! User directory service
//!
//! Owns the user status/type state machine and the upsert rules.

use std::sync::Arc;

use crate::data::{Database, User, UserStatus, UserType};
use crate::error::AppError;

/// Directory of local users
#[derive(Clone)]
pub struct UserDirectory {
    db: Arc<Database>,
}

impl UserDirectory {
    /// Create new user directory
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Look up a user by identity provider id
    pub async fn find_by_remote_id(&self, remote_id: &str) -> Result<Option<User>, AppError> {
        self.db.get_user_by_remote_id(remote_id).await
    }

    /// Look up a user by email
    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        self.db.get_user_by_email(email).await
    }

    /// All users
    pub async fn list(&self) -> Result<Vec<User>, AppError> {
        self.db.list_users().await
    }

    /// All users of one type
    pub async fn list_by_type(&self, user_type: UserType) -> Result<Vec<User>, AppError> {
        self.db.list_users_by_type(user_type).await
    }

    /// Insert or update `user`, never duplicating it
    ///
    /// Without a local id the stored row is found by remote id if one is
    /// set, else by email. No match inserts; a match adopts the stored id
    /// and updates. The lookup and the insert are separate statements, so
    /// two concurrent calls for the same new key can both insert.
    ///
    /// On success `user.id` is set.
    ///
    /// # Errors
    /// Returns `AppError::Validation` before touching the database if
    /// the user is invalid
    pub async fn upsert(&self, user: &mut User) -> Result<(), AppError> {
        user.validate().map_err(|e| e.context("invalid user"))?;

        let id = match user.id {
            Some(id) => id,
            None => {
                let existing = match user.remote_id.as_deref().filter(|id| !id.is_empty()) {
                    Some(remote_id) => self.db.get_user_by_remote_id(remote_id).await,
                    None => self.db.get_user_by_email(&user.email).await,
                }
                .map_err(|e| e.context("failed to select existing user"))?;

                match existing {
                    Some(existing) => existing
                        .id
                        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("stored user without id")))?,
                    None => {
                        let id = self
                            .db
                            .insert_user(user)
                            .await
                            .map_err(|e| e.context("failed to insert user"))?;
                        user.id = Some(id);
                        tracing::info!(
                            user_id = id,
                            email = %user.email,
                            status = %user.status,
                            "User inserted"
                        );
                        return Ok(());
                    }
                }
            }
        };

        let updated = self
            .db
            .update_user(id, user)
            .await
            .map_err(|e| e.context("failed to update user"))?;
        if !updated {
            return Err(AppError::NotFound);
        }
        user.id = Some(id);

        tracing::debug!(user_id = id, status = %user.status, "User updated");
        Ok(())
    }

    /// Move a signed-in user to `Active` if their status allows it
    ///
    /// # Returns
    /// `true` if the user was promoted and persisted
    pub async fn promote_on_login(&self, user: &mut User) -> Result<bool, AppError> {
        if !user.status.promotes_on_login() {
            return Ok(false);
        }

        let previous = user.status;
        user.status = UserStatus::Active;
        if let Err(error) = self.upsert(user).await {
            user.status = previous;
            return Err(error.context("failed to activate user"));
        }

        crate::metrics::STATUS_PROMOTIONS_TOTAL
            .with_label_values(&[previous.as_str()])
            .inc();
        tracing::info!(
            user_id = ?user.id,
            from = %previous,
            "User activated on sign-in"
        );
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn directory() -> (UserDirectory, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db = Database::connect(&temp_dir.path().join("test.db"))
            .await
            .unwrap();
        (UserDirectory::new(Arc::new(db)), temp_dir)
    }

    fn volunteer(remote_id: Option<&str>) -> User {
        let mut user = User::new_volunteer("Jo", "jo@example.com").unwrap();
        user.remote_id = remote_id.map(ToOwned::to_owned);
        user
    }

    #[tokio::test]
    async fn upsert_twice_by_remote_id_keeps_one_row() {
        let (directory, _temp_dir) = directory().await;

        let mut first = volunteer(Some("user-test-jo"));
        directory.upsert(&mut first).await.unwrap();

        let mut second = volunteer(Some("user-test-jo"));
        second.status = UserStatus::Invited;
        second.name = Some("Jo Doe".to_string());
        directory.upsert(&mut second).await.unwrap();

        assert_eq!(first.id, second.id);
        let users = directory.list().await.unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].status, UserStatus::Invited);
        assert_eq!(users[0].name.as_deref(), Some("Jo Doe"));
    }

    #[tokio::test]
    async fn upsert_same_value_twice_is_idempotent() {
        let (directory, _temp_dir) = directory().await;

        let mut user = volunteer(Some("user-test-jo"));
        directory.upsert(&mut user).await.unwrap();
        directory.upsert(&mut user).await.unwrap();

        assert_eq!(directory.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn upsert_without_remote_id_matches_by_email() {
        let (directory, _temp_dir) = directory().await;

        let mut first = volunteer(None);
        directory.upsert(&mut first).await.unwrap();
        let mut second = volunteer(None);
        directory.upsert(&mut second).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(directory.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn invalid_user_is_rejected_before_write() {
        let (directory, _temp_dir) = directory().await;

        let mut user = volunteer(None);
        user.status = UserStatus::Undefined;
        let error = directory.upsert(&mut user).await.expect_err("must fail");
        assert!(matches!(error, AppError::Validation(_)));
        assert!(directory.list().await.unwrap().is_empty());
        assert_eq!(user.id, None);
    }

    #[tokio::test]
    async fn promotion_only_moves_forward() {
        let (directory, _temp_dir) = directory().await;

        let mut user = volunteer(Some("user-test-jo"));
        user.status = UserStatus::Invited;
        directory.upsert(&mut user).await.unwrap();

        assert!(directory.promote_on_login(&mut user).await.unwrap());
        assert_eq!(user.status, UserStatus::Active);
        assert!(!directory.promote_on_login(&mut user).await.unwrap());

        let stored = directory
            .find_by_remote_id("user-test-jo")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.status, UserStatus::Active);
    }

    #[tokio::test]
    async fn deleted_users_are_never_promoted() {
        let (directory, _temp_dir) = directory().await;

        let mut user = volunteer(Some("user-test-jo"));
        user.status = UserStatus::Deleted;
        directory.upsert(&mut user).await.unwrap();

        assert!(!directory.promote_on_login(&mut user).await.unwrap());
        assert_eq!(user.status, UserStatus::Deleted);
    }
}
