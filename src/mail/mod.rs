//! Email sending abstractions

mod console;
mod sendgrid;
pub mod templates;

pub use console::ConsoleMailer;
pub use sendgrid::SendGridMailer;

use axum::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Name and address of a sender or recipient
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mailbox {
    pub name: String,
    #[serde(rename = "email")]
    pub address: String,
}

impl Mailbox {
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
        }
    }
}

/// A single rendered email
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailMessage {
    pub to: Mailbox,
    pub subject: String,
    /// Plaintext body
    pub text: String,
    /// Rendered HTML body
    pub html: String,
}

/// Trait for sending emails
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Send one message
    ///
    /// # Errors
    /// Returns `AppError::Mail` if the provider rejects or cannot be reached
    async fn send(&self, message: &MailMessage) -> Result<(), AppError>;
}
