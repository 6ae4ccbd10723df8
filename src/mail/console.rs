//! Console-based mailer for development

use axum::async_trait;

use super::{MailMessage, Mailer};
use crate::error::AppError;

/// Mailer that logs messages instead of sending them
pub struct ConsoleMailer;

impl ConsoleMailer {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ConsoleMailer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Mailer for ConsoleMailer {
    async fn send(&self, message: &MailMessage) -> Result<(), AppError> {
        println!();
        println!("========================================");
        println!("  EMAIL TO: {} <{}>", message.to.name, message.to.address);
        println!("  SUBJECT: {}", message.subject);
        println!();
        println!("{}", message.text);
        println!("========================================");
        println!();

        tracing::info!(
            to = %message.to.address,
            subject = %message.subject,
            "Email logged to console"
        );

        crate::metrics::MAILS_SENT_TOTAL.inc();
        Ok(())
    }
}
