//! In-memory session store
//!
//! Volatile: sessions and role sets are lost on restart.
//! Uses Moka for TTL-based session expiry.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use axum::async_trait;
use moka::future::Cache;
use tokio::sync::RwLock;

use super::{SessionStore, SessionValues};
use crate::error::AppError;

/// Session store kept in process memory
pub struct MemorySessionStore {
    /// Session id -> values
    sessions: Cache<String, Arc<SessionValues>>,
    /// Role set key -> members
    roles: RwLock<HashMap<String, BTreeSet<String>>>,
}

impl MemorySessionStore {
    /// Create a store whose sessions expire `max_age_seconds` after their
    /// last save, holding at most `max_entries` sessions
    pub fn new(max_age_seconds: u64, max_entries: u64) -> Self {
        let sessions = Cache::builder()
            .max_capacity(max_entries.max(1))
            .time_to_live(Duration::from_secs(max_age_seconds.max(1)))
            .build();

        Self {
            sessions,
            roles: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self, session_id: &str) -> Result<Option<SessionValues>, AppError> {
        Ok(self
            .sessions
            .get(session_id)
            .await
            .map(|values| values.as_ref().clone()))
    }

    async fn save(&self, session_id: &str, values: &SessionValues) -> Result<(), AppError> {
        self.sessions
            .insert(session_id.to_string(), Arc::new(values.clone()))
            .await;
        Ok(())
    }

    async fn destroy(&self, session_id: &str) -> Result<(), AppError> {
        self.sessions.invalidate(session_id).await;
        Ok(())
    }

    async fn role_members(&self, key: &str) -> Result<Vec<String>, AppError> {
        let roles = self.roles.read().await;
        Ok(roles
            .get(key)
            .map(|members| members.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn add_role_member(&self, key: &str, member: &str) -> Result<(), AppError> {
        let mut roles = self.roles.write().await;
        roles
            .entry(key.to_string())
            .or_default()
            .insert(member.to_string());
        Ok(())
    }
}
