//! SendGrid mailer for production

use std::time::Instant;

use axum::async_trait;
use serde::Serialize;

use super::{MailMessage, Mailbox, Mailer};
use crate::error::AppError;

const API_BASE: &str = "https://api.sendgrid.com";

/// Mailer backed by the SendGrid v3 API
pub struct SendGridMailer {
    http: reqwest::Client,
    api_key: String,
    from: Mailbox,
}

#[derive(Debug, Serialize)]
struct SendRequest<'a> {
    personalizations: Vec<Personalization<'a>>,
    from: &'a Mailbox,
    subject: &'a str,
    content: Vec<Content<'a>>,
}

#[derive(Debug, Serialize)]
struct Personalization<'a> {
    to: Vec<&'a Mailbox>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    #[serde(rename = "type")]
    content_type: &'static str,
    value: &'a str,
}

impl<'a> SendRequest<'a> {
    fn new(from: &'a Mailbox, message: &'a MailMessage) -> Self {
        // SendGrid requires text/plain before text/html
        Self {
            personalizations: vec![Personalization {
                to: vec![&message.to],
            }],
            from,
            subject: &message.subject,
            content: vec![
                Content {
                    content_type: "text/plain",
                    value: &message.text,
                },
                Content {
                    content_type: "text/html",
                    value: &message.html,
                },
            ],
        }
    }
}

impl SendGridMailer {
    pub fn new(http: reqwest::Client, api_key: impl Into<String>, from: Mailbox) -> Self {
        Self {
            http,
            api_key: api_key.into(),
            from,
        }
    }
}

#[async_trait]
impl Mailer for SendGridMailer {
    async fn send(&self, message: &MailMessage) -> Result<(), AppError> {
        let started = Instant::now();
        let request = SendRequest::new(&self.from, message);

        let response = self
            .http
            .post(format!("{API_BASE}/v3/mail/send"))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await;

        let outcome = match response {
            Ok(response) if response.status().is_success() => Ok(()),
            Ok(response) => {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                Err(AppError::Mail(format!(
                    "failed to send mail to {}: provider returned {status}: {body}",
                    message.to.address
                )))
            }
            Err(e) => Err(AppError::Mail(format!(
                "failed to send mail to {}: {e}",
                message.to.address
            ))),
        };

        let status = if outcome.is_ok() { "ok" } else { "failed" };
        crate::metrics::observe_upstream("sendgrid", "mail_send", status, started.elapsed());

        if outcome.is_ok() {
            crate::metrics::MAILS_SENT_TOTAL.inc();
            tracing::info!(to = %message.to.address, subject = %message.subject, "Email sent");
        }
        outcome
    }
}
