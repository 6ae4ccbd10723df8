//! Server-side sessions
//!
//! The browser only holds an opaque session id in a cookie. Everything
//! else (identity provider token, post-login redirect, last auth error)
//! lives in a [`SessionStore`]. The store also keeps per-user role sets
//! keyed by the identity provider's user id.

mod memory;

pub use memory::MemorySessionStore;

use std::collections::HashMap;
use std::sync::Arc;

use axum::async_trait;
use axum_extra::extract::CookieJar;
use axum_extra::extract::cookie::{Cookie, SameSite};
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::RngCore;

use crate::config::AppConfig;
use crate::data::UserType;
use crate::error::AppError;

/// Identity provider session token
pub const SESSION_TOKEN_KEY: &str = "session_token";
/// Path to return to after signing in
pub const AUTH_REDIRECT_KEY: &str = "auth_redirect";
/// Why the last authentication attempt failed
pub const AUTH_ERROR_KEY: &str = "auth_error";

/// Key of the role set for a remote user
pub fn user_roles_key(remote_id: &str) -> String {
    format!("user:{remote_id}:roles")
}

/// Key/value pairs of one session
pub type SessionValues = HashMap<String, String>;

/// Storage backend for sessions and role side data
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Load session values, `None` if unknown or expired
    async fn load(&self, session_id: &str) -> Result<Option<SessionValues>, AppError>;

    /// Create or replace session values
    async fn save(&self, session_id: &str, values: &SessionValues) -> Result<(), AppError>;

    /// Remove a session
    async fn destroy(&self, session_id: &str) -> Result<(), AppError>;

    /// Raw members of a role set
    async fn role_members(&self, key: &str) -> Result<Vec<String>, AppError>;

    /// Add one raw member to a role set
    async fn add_role_member(&self, key: &str, member: &str) -> Result<(), AppError>;
}

/// Parse raw role members into tiers
///
/// Values outside the known tiers are skipped; non-numeric values are an
/// error.
pub fn parse_roles(raw: &[String]) -> Result<Vec<UserType>, AppError> {
    let mut roles = Vec::new();
    for value in raw {
        let code: i64 = value.trim().parse().map_err(|_| {
            AppError::Session(format!("failed to convert raw role {value:?} to int"))
        })?;
        if let Ok(role) = UserType::from_code(code) {
            if role.is_valid() && !roles.contains(&role) {
                roles.push(role);
            }
        }
    }
    roles.sort();
    Ok(roles)
}

// =============================================================================
// Session
// =============================================================================

/// One request's view of a server-side session
#[derive(Debug, Clone)]
pub struct Session {
    id: String,
    values: SessionValues,
    fresh: bool,
}

impl Session {
    fn new() -> Self {
        Self {
            id: generate_session_id(),
            values: SessionValues::new(),
            fresh: true,
        }
    }

    /// Non-empty value for `key`
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .get(key)
            .map(String::as_str)
            .filter(|value| !value.is_empty())
    }

    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        self.values.insert(key.to_string(), value.into());
    }

    /// Remove and return the value for `key`
    pub fn take(&mut self, key: &str) -> Option<String> {
        self.values.remove(key).filter(|value| !value.is_empty())
    }
}

/// 32 random bytes, URL-safe base64
fn generate_session_id() -> String {
    let mut bytes = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

// =============================================================================
// Session manager
// =============================================================================

/// Binds a [`SessionStore`] to the session cookie
#[derive(Clone)]
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    cookie_name: String,
    secure: bool,
}

impl SessionManager {
    pub fn new(store: Arc<dyn SessionStore>, config: &AppConfig) -> Self {
        Self {
            store,
            cookie_name: config.session.cookie_name.clone(),
            secure: config.should_use_secure_cookies(),
        }
    }

    /// Resolve the session for a request
    ///
    /// A missing cookie or an unknown/expired id yields a fresh session
    /// with a new id.
    ///
    /// # Errors
    /// Returns `AppError::Session` if the store cannot be reached
    pub async fn load(&self, jar: &CookieJar) -> Result<Session, AppError> {
        let Some(session_id) = jar
            .get(&self.cookie_name)
            .map(|cookie| cookie.value().to_string())
            .filter(|id| !id.is_empty())
        else {
            return Ok(Session::new());
        };

        match self
            .store
            .load(&session_id)
            .await
            .map_err(|e| e.context("failed to get session"))?
        {
            Some(values) => Ok(Session {
                id: session_id,
                values,
                fresh: false,
            }),
            None => Ok(Session::new()),
        }
    }

    /// Persist the session and make sure the cookie points at it
    pub async fn save(&self, jar: CookieJar, session: &Session) -> Result<CookieJar, AppError> {
        self.store
            .save(&session.id, &session.values)
            .await
            .map_err(|e| e.context("failed to save session"))?;

        Ok(jar.add(self.session_cookie(session.id.clone())))
    }

    /// Move the session to a new id, dropping the old one from the store
    ///
    /// Values are kept. Call before saving whenever the session gains
    /// privileges.
    pub async fn rotate(&self, session: &mut Session) -> Result<(), AppError> {
        if !session.fresh {
            self.store
                .destroy(&session.id)
                .await
                .map_err(|e| e.context("failed to rotate session"))?;
        }
        session.id = generate_session_id();
        session.fresh = true;
        Ok(())
    }

    /// Remove the session from the store and expire the cookie
    pub async fn destroy(&self, jar: CookieJar, session: Session) -> Result<CookieJar, AppError> {
        if !session.fresh {
            self.store
                .destroy(&session.id)
                .await
                .map_err(|e| e.context("failed to destroy session"))?;
        }

        Ok(jar.remove(self.session_cookie(String::new())))
    }

    /// Stored roles of a remote user
    pub async fn roles(&self, remote_id: &str) -> Result<Vec<UserType>, AppError> {
        let raw = self
            .store
            .role_members(&user_roles_key(remote_id))
            .await
            .map_err(|e| e.context("failed to get roles"))?;
        parse_roles(&raw)
    }

    /// Add a role to a remote user's role set
    pub async fn grant_role(&self, remote_id: &str, role: UserType) -> Result<(), AppError> {
        if !role.is_valid() {
            return Err(AppError::Validation(format!(
                "invalid role {} provided",
                role.code()
            )));
        }
        self.store
            .add_role_member(&user_roles_key(remote_id), &role.code().to_string())
            .await
    }

    fn session_cookie(&self, value: String) -> Cookie<'static> {
        Cookie::build((self.cookie_name.clone(), value))
            .path("/")
            .http_only(true)
            .secure(self.secure)
            .same_site(SameSite::Lax)
            .build()
    }
}
