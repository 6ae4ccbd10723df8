//! Database initialization tool
//!
//! ```text
//! scheduler-db --init           create tables and seed the admin user
//! scheduler-db --init --drop    purge existing users first
//! ```

use clap::Parser;
use scheduler::config::AppConfig;
use scheduler::data::{Database, User, UserStatus, UserType};
use scheduler::error::AppError;
use scheduler::service::UserDirectory;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "scheduler-db", version, about = "Initialize the scheduler database")]
struct Args {
    /// Create the users table and seed the configured admin
    #[arg(long)]
    init: bool,

    /// Delete all users before initializing
    #[arg(long)]
    drop: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "scheduler=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    if !args.init && !args.drop {
        println!("Nothing to do; pass --init (and optionally --drop)");
        return Ok(());
    }

    let config = AppConfig::load()?;
    let db = Database::connect(&config.database.path).await?;

    if args.drop {
        let removed = db.purge_users().await?;
        tracing::info!(removed, "Users purged");
    }

    let db = Arc::new(db);
    if args.init {
        seed_admin(&config, db.clone()).await?;
    }

    tracing::info!(users = db.count_users().await?, "Database ready");

    Ok(())
}

/// Register the configured admin with the identity provider and store them
async fn seed_admin(config: &AppConfig, db: Arc<Database>) -> Result<(), AppError> {
    let email = config
        .admin
        .email
        .as_deref()
        .map(str::trim)
        .filter(|email| !email.is_empty())
        .ok_or_else(|| AppError::Config("admin.email is required for --init".to_string()))?;
    let name = config.admin.name.clone().unwrap_or_default();

    let http_client = scheduler::build_http_client()?;
    let identity = scheduler::build_identity(&config.identity, http_client);

    let mut admin = User::new(name, email, UserStatus::Invited, UserType::Admin);
    admin.validate()?;
    admin.remote_id = Some(
        identity
            .create_user(&admin.email)
            .await
            .map_err(|e| e.context("failed to register admin"))?,
    );

    UserDirectory::new(db)
        .upsert(&mut admin)
        .await
        .map_err(|e| e.context("failed to store admin"))?;

    tracing::info!(
        user_id = ?admin.id,
        email = %admin.email,
        remote_id = ?admin.remote_id,
        "Admin user seeded"
    );
    Ok(())
}
