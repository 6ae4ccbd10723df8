//! Database tests

use super::*;
use tempfile::TempDir;

/// Helper to create a test database
async fn create_test_db() -> (Database, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.db");
    let db = Database::connect(&db_path).await.unwrap();
    (db, temp_dir)
}

fn volunteer(email: &str, remote_id: Option<&str>) -> User {
    let mut user = User::new("Test User", email, UserStatus::Pending, UserType::Volunteer);
    user.remote_id = remote_id.map(ToOwned::to_owned);
    user
}

#[tokio::test]
async fn test_database_connection() {
    let (db, _temp_dir) = create_test_db().await;
    assert_eq!(db.count_users().await.unwrap(), 0);
}

#[tokio::test]
async fn test_user_insert_and_lookups() {
    let (db, _temp_dir) = create_test_db().await;

    let user = volunteer("jo@example.com", Some("user-test-jo"));
    let id = db.insert_user(&user).await.unwrap();
    assert!(id > 0);

    let by_id = db.get_user(id).await.unwrap().expect("user by id");
    assert_eq!(by_id.email, "jo@example.com");
    assert_eq!(by_id.status, UserStatus::Pending);
    assert_eq!(by_id.user_type, UserType::Volunteer);
    assert_eq!(by_id.id, Some(id));

    let by_email = db.get_user_by_email("jo@example.com").await.unwrap();
    assert_eq!(by_email.and_then(|u| u.id), Some(id));

    let by_remote = db.get_user_by_remote_id("user-test-jo").await.unwrap();
    assert_eq!(by_remote.and_then(|u| u.id), Some(id));

    assert!(db.get_user_by_email("nobody@example.com").await.unwrap().is_none());
    assert!(db.get_user_by_remote_id("").await.unwrap().is_none());
}

#[tokio::test]
async fn test_update_never_overwrites_remote_id() {
    let (db, _temp_dir) = create_test_db().await;

    let id = db
        .insert_user(&volunteer("jo@example.com", Some("user-test-first")))
        .await
        .unwrap();

    let mut changed = volunteer("jo@example.com", Some("user-test-second"));
    changed.status = UserStatus::Invited;
    changed.name = Some("Jo".to_string());
    assert!(db.update_user(id, &changed).await.unwrap());

    let stored = db.get_user(id).await.unwrap().unwrap();
    assert_eq!(stored.remote_id.as_deref(), Some("user-test-first"));
    assert_eq!(stored.status, UserStatus::Invited);
    assert_eq!(stored.name.as_deref(), Some("Jo"));
}

#[tokio::test]
async fn test_update_sets_missing_remote_id_once() {
    let (db, _temp_dir) = create_test_db().await;

    let id = db.insert_user(&volunteer("jo@example.com", None)).await.unwrap();
    db.update_user(id, &volunteer("jo@example.com", Some("user-test-jo")))
        .await
        .unwrap();

    let stored = db.get_user(id).await.unwrap().unwrap();
    assert_eq!(stored.remote_id.as_deref(), Some("user-test-jo"));
}

#[tokio::test]
async fn test_update_missing_row() {
    let (db, _temp_dir) = create_test_db().await;
    let updated = db
        .update_user(42, &volunteer("jo@example.com", None))
        .await
        .unwrap();
    assert!(!updated);
}

#[tokio::test]
async fn test_list_users_by_type() {
    let (db, _temp_dir) = create_test_db().await;

    db.insert_user(&volunteer("a@example.com", None)).await.unwrap();
    db.insert_user(&volunteer("b@example.com", None)).await.unwrap();
    let admin = User::new("Admin", "admin@example.com", UserStatus::Active, UserType::Admin);
    db.insert_user(&admin).await.unwrap();

    let volunteers = db.list_users_by_type(UserType::Volunteer).await.unwrap();
    assert_eq!(volunteers.len(), 2);
    assert!(volunteers.iter().all(|u| u.user_type == UserType::Volunteer));

    let everyone = db.list_users().await.unwrap();
    assert_eq!(everyone.len(), 3);
    assert_eq!(everyone[2].email, "admin@example.com");
}

#[tokio::test]
async fn test_purge_users_resets_ids() {
    let (db, _temp_dir) = create_test_db().await;

    db.insert_user(&volunteer("a@example.com", None)).await.unwrap();
    db.insert_user(&volunteer("b@example.com", None)).await.unwrap();

    assert_eq!(db.purge_users().await.unwrap(), 2);
    assert_eq!(db.count_users().await.unwrap(), 0);

    let id = db.insert_user(&volunteer("c@example.com", None)).await.unwrap();
    assert_eq!(id, 1);
}
