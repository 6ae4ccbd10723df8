//! Scheduler - volunteer scheduling with identity-provider sign-in
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      HTTP Layer (Axum)                       │
//! │  - Login / OAuth callback / logout                          │
//! │  - Dashboard and admin portal                               │
//! │  - Auth middleware → type/role gates                        │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Service Layer                            │
//! │  - User directory (status/type state machine, upsert)       │
//! │  - Invitation flow                                          │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                Data Layer / Collaborators                    │
//! │  - SQLite (sqlx)           - Session store (moka)           │
//! │  - Identity provider       - Mail provider                  │
//! │  - Calendar provider                                        │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - `api`: Pages, admin portal and metrics handlers
//! - `auth`: Sign-in routes, auth middleware and gates
//! - `service`: User directory and invitation flow
//! - `data`: Database layer and user model
//! - `session`: Server-side sessions and role sets
//! - `identity`: Identity provider client
//! - `mail`: Mail providers and templates
//! - `calendar`: Calendar provider client
//! - `config`: Configuration management
//! - `error`: Error types

pub mod api;
pub mod auth;
pub mod calendar;
pub mod config;
pub mod data;
pub mod error;
pub mod identity;
pub mod mail;
pub mod metrics;
pub mod service;
pub mod session;

use std::sync::Arc;

use calendar::CalendarProvider;
use identity::IdentityProvider;
use mail::Mailer;
use session::SessionStore;

/// Application state shared across all handlers
///
/// Cloned for each request. Every external collaborator sits behind a
/// trait object so tests can swap in fakes through [`AppState::from_parts`].
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<config::AppConfig>,

    /// Session cookie and store
    pub sessions: session::SessionManager,

    /// Identity provider
    pub identity: Arc<dyn IdentityProvider>,

    /// Local user directory
    pub directory: service::UserDirectory,

    /// Volunteer invitations
    pub invitations: service::InvitationService,

    /// Calendar provider, if configured
    pub calendar: Option<Arc<dyn CalendarProvider>>,
}

impl AppState {
    /// Initialize application state with the production collaborators
    ///
    /// # Steps
    /// 1. Connect to SQLite database
    /// 2. Initialize session store
    /// 3. Initialize HTTP client
    /// 4. Build identity, mail and calendar clients
    ///
    /// # Errors
    /// Returns error if any initialization step fails
    pub async fn new(config: config::AppConfig) -> Result<Self, error::AppError> {
        tracing::info!("Initializing application state...");

        // 1. Connect to SQLite database
        let db = data::Database::connect(&config.database.path).await?;
        tracing::info!("Database connected");

        // 2. Initialize session store
        let store = session::MemorySessionStore::new(
            config.session.max_age.unsigned_abs(),
            config.session.max_entries,
        );
        tracing::info!("Session store initialized");

        // 3. Initialize HTTP client
        let http_client = build_http_client()?;

        // 4. Collaborators
        let identity = build_identity(&config.identity, http_client.clone());
        let mailer = build_mailer(&config.mail, http_client.clone());
        let calendar = calendar::GoogleCalendarClient::from_config(&config.calendar, http_client)
            .map(|client| Arc::new(client) as Arc<dyn CalendarProvider>);
        if calendar.is_none() {
            tracing::warn!("calendar.access_token not set; calendar routes are disabled");
        }

        tracing::info!("Application state initialized successfully");

        Ok(Self::from_parts(
            config,
            Arc::new(db),
            Arc::new(store),
            identity,
            mailer,
            calendar,
        ))
    }

    /// Assemble state from already-built collaborators
    pub fn from_parts(
        config: config::AppConfig,
        db: Arc<data::Database>,
        store: Arc<dyn SessionStore>,
        identity: Arc<dyn IdentityProvider>,
        mailer: Arc<dyn Mailer>,
        calendar: Option<Arc<dyn CalendarProvider>>,
    ) -> Self {
        let sessions = session::SessionManager::new(store, &config);
        let directory = service::UserDirectory::new(db);
        let invitations = service::InvitationService::new(
            directory.clone(),
            identity.clone(),
            mailer,
            config.server.base_url(),
        );

        Self {
            config: Arc::new(config),
            sessions,
            identity,
            directory,
            invitations,
            calendar,
        }
    }
}

/// Shared outbound HTTP client
pub fn build_http_client() -> Result<reqwest::Client, error::AppError> {
    reqwest::Client::builder()
        .user_agent(concat!("Scheduler/", env!("CARGO_PKG_VERSION")))
        .timeout(std::time::Duration::from_secs(30))
        .build()
        .map_err(|e| error::AppError::Internal(e.into()))
}

/// Build the identity provider client from configuration
pub fn build_identity(
    config: &config::IdentityConfig,
    http_client: reqwest::Client,
) -> Arc<dyn IdentityProvider> {
    Arc::new(identity::StytchClient::new(config, http_client))
}

fn build_mailer(config: &config::MailConfig, http_client: reqwest::Client) -> Arc<dyn Mailer> {
    let from = mail::Mailbox::new(config.from_name.clone(), config.from_email.clone());
    match (config.provider, config.api_key.as_deref()) {
        (config::MailProvider::SendGrid, Some(api_key)) => {
            tracing::info!("Using SendGrid mail provider");
            Arc::new(mail::SendGridMailer::new(http_client, api_key, from))
        }
        _ => {
            tracing::info!("Using console mail provider");
            Arc::new(mail::ConsoleMailer::new())
        }
    }
}

/// Build the Axum router with all routes.
///
/// This is shared by the binary and integration tests to keep route
/// composition consistent across environments.
pub fn build_router(state: AppState) -> axum::Router {
    use axum::Router;
    use tower_http::{compression::CompressionLayer, trace::TraceLayer};

    let cors_layer = build_cors_layer(&state.config.server);

    Router::new()
        .route("/health", axum::routing::get(health_check))
        .merge(auth::auth_router())
        .merge(api::pages_router(state.clone()))
        .merge(api::account_router(state.clone()))
        .nest("/admin", api::admin_router(state.clone()))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer)
        .with_state(state)
        .merge(api::metrics_router())
}

fn build_cors_layer(server: &config::ServerConfig) -> tower_http::cors::CorsLayer {
    use axum::http::HeaderValue;
    use tower_http::cors::{Any, CorsLayer};

    if !server.protocol.eq_ignore_ascii_case("https") {
        return CorsLayer::permissive();
    }

    let allowed_origin = server.base_url();
    match HeaderValue::from_str(&allowed_origin) {
        Ok(origin) => CorsLayer::new()
            .allow_origin([origin])
            .allow_methods(Any)
            .allow_headers(Any),
        Err(error) => {
            tracing::error!(
                %error,
                origin = %allowed_origin,
                "Failed to parse CORS origin from server base URL; denying cross-origin requests"
            );
            CorsLayer::new().allow_methods(Any).allow_headers(Any)
        }
    }
}

async fn health_check() -> &'static str {
    "OK"
}
