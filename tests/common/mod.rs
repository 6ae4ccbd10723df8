//! Common test utilities for E2E tests

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use axum::async_trait;
use scheduler::calendar::{AclRole, Calendar, CalendarProvider};
use scheduler::data::{User, UserStatus, UserType};
use scheduler::error::AppError;
use scheduler::identity::{AuthenticatedSession, IdentityProvider};
use scheduler::mail::{MailMessage, Mailer};
use scheduler::session::{MemorySessionStore, SESSION_TOKEN_KEY, SessionStore, SessionValues};
use scheduler::{AppState, config};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool};
use tempfile::TempDir;
use tokio::net::TcpListener;

pub const COOKIE_NAME: &str = "scheduler_session";

// =============================================================================
// Fakes
// =============================================================================

/// Identity provider keeping sessions in memory
///
/// OAuth token `oauth-<remote_id>` exchanges into session token
/// `session-<remote_id>`. Users created by email get id `user-test-<local part>`.
#[derive(Default)]
pub struct FakeIdentity {
    sessions: Mutex<HashMap<String, String>>,
    pub revoked: Mutex<Vec<String>>,
    pub oauth_calls: AtomicUsize,
    pub session_calls: AtomicUsize,
    pub created: Mutex<HashSet<String>>,
}

impl FakeIdentity {
    /// Register a valid session token for `remote_id`
    pub fn issue_session(&self, remote_id: &str) -> String {
        let token = format!("session-{remote_id}");
        self.sessions
            .lock()
            .unwrap()
            .insert(token.clone(), remote_id.to_string());
        token
    }

    pub fn session_calls(&self) -> usize {
        self.session_calls.load(Ordering::SeqCst)
    }

    pub fn oauth_calls(&self) -> usize {
        self.oauth_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdentityProvider for FakeIdentity {
    async fn authenticate_oauth(
        &self,
        oauth_token: &str,
        _session_token: Option<&str>,
    ) -> Result<String, AppError> {
        self.oauth_calls.fetch_add(1, Ordering::SeqCst);
        match oauth_token.strip_prefix("oauth-") {
            Some(remote_id) => Ok(self.issue_session(remote_id)),
            None => Err(AppError::Unauthorized("oauth token not found".to_string())),
        }
    }

    async fn authenticate_session(
        &self,
        session_token: &str,
    ) -> Result<AuthenticatedSession, AppError> {
        self.session_calls.fetch_add(1, Ordering::SeqCst);
        let sessions = self.sessions.lock().unwrap();
        match sessions.get(session_token) {
            Some(remote_id) => Ok(AuthenticatedSession {
                user_id: remote_id.clone(),
                session_token: session_token.to_string(),
            }),
            None => Err(AppError::Unauthorized("session not found".to_string())),
        }
    }

    async fn revoke_session(&self, session_token: &str) -> Result<(), AppError> {
        self.sessions.lock().unwrap().remove(session_token);
        self.revoked.lock().unwrap().push(session_token.to_string());
        Ok(())
    }

    async fn create_user(&self, email: &str) -> Result<String, AppError> {
        let local = email.split('@').next().unwrap_or_default();
        self.created.lock().unwrap().insert(email.to_string());
        Ok(format!("user-test-{local}"))
    }
}

/// Mailer keeping every message it was asked to send
#[derive(Default)]
pub struct RecordingMailer {
    pub sent: Mutex<Vec<MailMessage>>,
}

impl RecordingMailer {
    pub fn sent(&self) -> Vec<MailMessage> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, message: &MailMessage) -> Result<(), AppError> {
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }
}

/// Calendar provider recording created calendars and ACL grants
#[derive(Default)]
pub struct FakeCalendar {
    pub created: Mutex<Vec<String>>,
    pub shared: Mutex<Vec<(String, String, AclRole)>>,
}

#[async_trait]
impl CalendarProvider for FakeCalendar {
    async fn create_calendar(&self, summary: &str) -> Result<Calendar, AppError> {
        let mut created = self.created.lock().unwrap();
        created.push(summary.to_string());
        Ok(Calendar {
            id: format!("calendar-test-{}", created.len()),
            summary: summary.to_string(),
        })
    }

    async fn share_calendar(
        &self,
        calendar_id: &str,
        email: &str,
        role: AclRole,
    ) -> Result<(), AppError> {
        self.shared
            .lock()
            .unwrap()
            .push((calendar_id.to_string(), email.to_string(), role));
        Ok(())
    }
}

// =============================================================================
// Test server
// =============================================================================

/// Test server instance
pub struct TestServer {
    pub addr: String,
    pub state: AppState,
    pub store: Arc<MemorySessionStore>,
    pub identity: Arc<FakeIdentity>,
    pub mailer: Arc<RecordingMailer>,
    pub calendar: Arc<FakeCalendar>,
    pub db_path: PathBuf,
    pub _temp_dir: TempDir,
    /// Client that does not follow redirects
    pub client: reqwest::Client,
}

impl TestServer {
    /// Create a new test server instance
    pub async fn new() -> Self {
        scheduler::metrics::init_metrics();

        // Create temporary directory for test database
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");

        // Create test configuration
        let config = config::AppConfig {
            server: config::ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0, // Let OS assign port
                domain: "localhost:3000".to_string(),
                protocol: "http".to_string(),
            },
            database: config::DatabaseConfig {
                path: db_path.clone(),
            },
            session: config::SessionConfig {
                cookie_name: COOKIE_NAME.to_string(),
                max_age: 3600,
                max_entries: 1000,
            },
            identity: config::IdentityConfig {
                project_id: "project-test-123".to_string(),
                secret: "secret-test-123".to_string(),
                environment: config::IdentityEnvironment::Test,
                api_base: None,
                public_token: "public-token-test-123".to_string(),
                oauth_start_url: "https://test.stytch.com/v1/public/oauth/google/start"
                    .to_string(),
                session_duration_minutes: 60,
            },
            mail: config::MailConfig {
                provider: config::MailProvider::Console,
                api_key: None,
                from_name: "Scheduler Admin".to_string(),
                from_email: "admin@example.org".to_string(),
            },
            calendar: config::CalendarConfig::default(),
            admin: config::AdminConfig::default(),
            logging: config::LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        };

        let db = scheduler::data::Database::connect(&config.database.path)
            .await
            .unwrap();
        let store = Arc::new(MemorySessionStore::new(3600, 1000));
        let identity = Arc::new(FakeIdentity::default());
        let mailer = Arc::new(RecordingMailer::default());
        let calendar = Arc::new(FakeCalendar::default());

        let state = AppState::from_parts(
            config,
            Arc::new(db),
            store.clone(),
            identity.clone(),
            mailer.clone(),
            Some(calendar.clone() as Arc<dyn CalendarProvider>),
        );

        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .unwrap();

        // Bind to random port
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let addr_str = format!("http://{}", addr);

        let app = scheduler::build_router(state.clone());

        // Spawn server in background
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr: addr_str,
            state,
            store,
            identity,
            mailer,
            calendar,
            db_path,
            _temp_dir: temp_dir,
            client,
        }
    }

    /// Get base URL for requests
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.addr, path)
    }

    /// Store a user directly in the directory
    pub async fn create_user(
        &self,
        email: &str,
        status: UserStatus,
        user_type: UserType,
        remote_id: &str,
    ) -> User {
        let mut user = User::new("Test User", email, status, user_type);
        user.remote_id = Some(remote_id.to_string());
        self.state.directory.upsert(&mut user).await.unwrap();
        user
    }

    /// Create a server-side session holding `session_token`
    ///
    /// # Returns
    /// `Cookie` header value pointing at the session
    pub async fn session_cookie(&self, session_id: &str, session_token: &str) -> String {
        let mut values = SessionValues::new();
        values.insert(SESSION_TOKEN_KEY.to_string(), session_token.to_string());
        self.store.save(session_id, &values).await.unwrap();
        format!("{COOKIE_NAME}={session_id}")
    }

    /// Sign `remote_id` in and return the `Cookie` header value
    pub async fn sign_in(&self, remote_id: &str) -> String {
        let token = self.identity.issue_session(remote_id);
        self.session_cookie(&format!("test-session-{remote_id}"), &token)
            .await
    }

    /// Separate pool on the test database, bypassing the directory
    pub async fn raw_pool(&self) -> SqlitePool {
        SqlitePool::connect_with(SqliteConnectOptions::new().filename(&self.db_path))
            .await
            .unwrap()
    }

    /// Overwrite the stored status code of a user
    pub async fn set_status_code(&self, remote_id: &str, code: i64) {
        let pool = self.raw_pool().await;
        sqlx::query("UPDATE users SET status = ? WHERE remote_id = ?")
            .bind(code)
            .bind(remote_id)
            .execute(&pool)
            .await
            .unwrap();
        pool.close().await;
    }

    /// Stored status code of a user
    pub async fn status_code(&self, remote_id: &str) -> i64 {
        let pool = self.raw_pool().await;
        let (code,): (i64,) = sqlx::query_as("SELECT status FROM users WHERE remote_id = ?")
            .bind(remote_id)
            .fetch_one(&pool)
            .await
            .unwrap();
        pool.close().await;
        code
    }

    /// Values of a stored session
    pub async fn session_values(&self, session_id: &str) -> Option<SessionValues> {
        self.store.load(session_id).await.unwrap()
    }
}

/// Session id from a `Set-Cookie` response header
pub fn session_id_from(response: &reqwest::Response) -> Option<String> {
    response
        .headers()
        .get_all("set-cookie")
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find_map(|value| {
            let pair = value.split(';').next()?;
            let (name, id) = pair.split_once('=')?;
            (name.trim() == COOKIE_NAME && !id.is_empty()).then(|| id.to_string())
        })
}

/// `Location` header of a redirect
pub fn location(response: &reqwest::Response) -> String {
    response
        .headers()
        .get("location")
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string()
}
