//! Configuration management
//!
//! Loads configuration from:
//! 1. Default values
//! 2. Configuration file (config/default.toml, config/local.toml)
//! 3. Environment variables (SCHEDULER__SECTION__KEY, override)

use serde::Deserialize;
use std::{net::IpAddr, path::PathBuf};

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub session: SessionConfig,
    pub identity: IdentityConfig,
    pub mail: MailConfig,
    #[serde(default)]
    pub calendar: CalendarConfig,
    #[serde(default)]
    pub admin: AdminConfig,
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0")
    pub host: String,
    /// Port number (e.g., 3000)
    pub port: u16,
    /// Public domain (e.g., "scheduler.example.org")
    pub domain: String,
    /// Protocol ("http" or "https")
    pub protocol: String,
}

impl ServerConfig {
    /// Get the public base URL
    ///
    /// # Returns
    /// Full URL like "https://scheduler.example.org"
    pub fn base_url(&self) -> String {
        format!("{}://{}", self.protocol, self.domain)
    }
}

/// Database configuration (SQLite only)
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to SQLite database file
    pub path: PathBuf,
}

/// Server-side session configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Cookie carrying the session id
    pub cookie_name: String,
    /// Session lifetime in seconds (default: 86400 = 24h)
    pub max_age: i64,
    /// Upper bound on stored sessions (default: 10000)
    pub max_entries: u64,
}

/// Identity provider environment
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum IdentityEnvironment {
    #[default]
    Test,
    Live,
}

impl IdentityEnvironment {
    pub fn base_url(self) -> &'static str {
        match self {
            Self::Test => "https://test.stytch.com",
            Self::Live => "https://api.stytch.com",
        }
    }
}

/// Identity provider (Stytch) configuration
#[derive(Debug, Clone, Deserialize)]
pub struct IdentityConfig {
    pub project_id: String,
    pub secret: String,
    #[serde(default)]
    pub environment: IdentityEnvironment,
    /// Overrides the environment's API host (used by tests and proxies)
    pub api_base: Option<String>,
    /// Public token appended to the OAuth start URL
    pub public_token: String,
    /// Provider URL starting the Google OAuth flow
    pub oauth_start_url: String,
    /// Provider session lifetime in minutes (default: 60)
    pub session_duration_minutes: u32,
}

impl IdentityConfig {
    pub fn api_base(&self) -> String {
        self.api_base
            .clone()
            .unwrap_or_else(|| self.environment.base_url().to_string())
    }

    /// Login link rendered on the login page
    pub fn login_url(&self) -> String {
        format!(
            "{}?public_token={}",
            self.oauth_start_url,
            urlencoding::encode(&self.public_token)
        )
    }
}

/// Mail provider selector
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum MailProvider {
    /// Log messages instead of sending them
    #[default]
    Console,
    SendGrid,
}

/// Mail configuration
#[derive(Debug, Clone, Deserialize)]
pub struct MailConfig {
    #[serde(default)]
    pub provider: MailProvider,
    /// SendGrid API key (required for provider = "sendgrid")
    pub api_key: Option<String>,
    pub from_name: String,
    pub from_email: String,
}

/// Google Calendar configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CalendarConfig {
    /// OAuth access token with the calendar scope; calendar routes are
    /// disabled when absent
    pub access_token: Option<String>,
    #[serde(default = "default_calendar_api_base")]
    pub api_base: String,
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            access_token: None,
            api_base: default_calendar_api_base(),
        }
    }
}

fn default_calendar_api_base() -> String {
    "https://www.googleapis.com/calendar/v3".to_string()
}

/// First admin user, seeded by `scheduler-db --init`
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AdminConfig {
    pub name: Option<String>,
    pub email: Option<String>,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    pub level: String,
    /// Log format: "pretty" or "json"
    pub format: String,
}

impl LoggingConfig {
    /// Filter directives used when `RUST_LOG` is not set
    pub fn default_directives(&self) -> String {
        format!(
            "scheduler={},tower_http=debug",
            self.level.trim().to_ascii_lowercase()
        )
    }

    pub fn is_json(&self) -> bool {
        self.format.trim().eq_ignore_ascii_case("json")
    }
}

impl AppConfig {
    /// Load configuration from file and environment
    ///
    /// # Loading Order
    /// 1. Default values
    /// 2. config/default.toml (if exists)
    /// 3. config/local.toml (if exists)
    /// 4. Environment variables (SCHEDULER__*)
    ///
    /// # Errors
    /// Returns error if configuration is invalid
    pub fn load() -> Result<Self, crate::error::AppError> {
        use config::{Config, Environment, File};

        let config = Config::builder()
            // Start with default values
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 3000)?
            .set_default("server.domain", "localhost:3000")?
            .set_default("server.protocol", "http")?
            .set_default("database.path", "data/scheduler.db")?
            .set_default("session.cookie_name", "scheduler_session")?
            .set_default("session.max_age", 86400)?
            .set_default("session.max_entries", 10_000)?
            .set_default("identity.environment", "test")?
            .set_default("identity.session_duration_minutes", 60)?
            .set_default("mail.provider", "console")?
            .set_default("mail.from_name", "Scheduler Admin")?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            // Load from config/default.toml if it exists
            .add_source(File::with_name("config/default").required(false))
            // Load from config/local.toml if it exists (overrides default)
            .add_source(File::with_name("config/local").required(false))
            // Load from environment variables (SCHEDULER__*)
            .add_source(
                Environment::with_prefix("SCHEDULER")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;

        let app_config: Self = config
            .try_deserialize()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;
        app_config.validate()?;
        Ok(app_config)
    }

    pub fn should_use_secure_cookies(&self) -> bool {
        self.server.protocol.eq_ignore_ascii_case("https")
            || !is_local_server_domain(&self.server.domain)
    }

    pub fn validate(&self) -> Result<(), crate::error::AppError> {
        use crate::error::AppError;

        if self.session.max_age <= 0 {
            return Err(AppError::Config(
                "session.max_age must be greater than 0".to_string(),
            ));
        }

        if self.session.max_entries == 0 {
            return Err(AppError::Config(
                "session.max_entries must be greater than 0".to_string(),
            ));
        }

        if self.session.cookie_name.trim().is_empty() {
            return Err(AppError::Config(
                "session.cookie_name must not be empty".to_string(),
            ));
        }

        if self.identity.session_duration_minutes == 0 {
            return Err(AppError::Config(
                "identity.session_duration_minutes must be greater than 0".to_string(),
            ));
        }

        let level = self.logging.level.trim().to_ascii_lowercase();
        if !matches!(level.as_str(), "trace" | "debug" | "info" | "warn" | "error") {
            return Err(AppError::Config(format!(
                "logging.level must be one of trace, debug, info, warn, error (got {:?})",
                self.logging.level
            )));
        }

        let format = self.logging.format.trim();
        if !format.eq_ignore_ascii_case("pretty") && !format.eq_ignore_ascii_case("json") {
            return Err(AppError::Config(format!(
                "logging.format must be pretty or json (got {:?})",
                self.logging.format
            )));
        }

        if self.mail.provider == MailProvider::SendGrid
            && self
                .mail
                .api_key
                .as_deref()
                .map(str::trim)
                .unwrap_or_default()
                .is_empty()
        {
            return Err(AppError::Config(
                "mail.api_key is required when mail.provider=sendgrid".to_string(),
            ));
        }

        if !self.should_use_secure_cookies() {
            let host = normalized_server_host(&self.server.domain);
            tracing::warn!(
                host = %host,
                protocol = %self.server.protocol,
                "Using insecure session cookies for local development"
            );
        } else if !self.server.protocol.eq_ignore_ascii_case("https") {
            return Err(AppError::Config(
                "server.protocol must be https for non-local server domains".to_string(),
            ));
        }

        Ok(())
    }
}

fn normalized_server_host(domain: &str) -> String {
    let trimmed = domain.trim();
    let parsed_host = url::Url::parse(&format!("http://{trimmed}"))
        .ok()
        .and_then(|url| url.host_str().map(|host| host.to_string()));
    let host = parsed_host.unwrap_or_else(|| trimmed.to_string());
    host.trim_end_matches('.').to_ascii_lowercase()
}

fn is_local_server_domain(domain: &str) -> bool {
    let host = normalized_server_host(domain);
    if host == "localhost" || host.ends_with(".localhost") {
        return true;
    }

    if let Ok(ip) = host.parse::<IpAddr>() {
        return ip.is_loopback() || ip.is_unspecified();
    }

    false
}
