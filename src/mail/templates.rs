//! Email and page templates
//!
//! Templates are plain Rust string formatting; every interpolated value
//! is HTML-escaped.

use html_escape::{encode_double_quoted_attribute, encode_text};

use super::{MailMessage, Mailbox};

pub const INVITATION_SUBJECT: &str = "Scheduler Invitation";

/// Wrap body HTML in the shared email layout
pub fn email_layout(title: &str, body_html: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><title>{title}</title></head>
<body style="font-family: sans-serif; max-width: 600px; margin: 0 auto;">
<h1>{title}</h1>
{body_html}
<p style="color: #888; font-size: 12px;">Sent by Scheduler</p>
</body>
</html>
"#,
        title = encode_text(title),
    )
}

/// Render the invitation email for a new volunteer
///
/// # Arguments
/// * `to` - Recipient
/// * `dashboard_url` - Absolute URL of the dashboard
pub fn invitation(to: Mailbox, dashboard_url: &str) -> MailMessage {
    let text = format!(
        "Please click the following link to accept our invitation to the Scheduler tool: {dashboard_url}"
    );
    let body = format!(
        r#"<p>Hello {name},</p>
<p>You have been invited to join the Scheduler tool.</p>
<p><a href="{href}">Accept invitation</a></p>"#,
        name = encode_text(&to.name),
        href = encode_double_quoted_attribute(dashboard_url),
    );

    MailMessage {
        to,
        subject: INVITATION_SUBJECT.to_string(),
        text,
        html: email_layout(INVITATION_SUBJECT, &body),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invitation_contains_dashboard_link() {
        let message = invitation(
            Mailbox::new("Jo", "jo@example.com"),
            "https://scheduler.example.org/dash",
        );
        assert_eq!(message.subject, "Scheduler Invitation");
        assert!(message.text.ends_with("https://scheduler.example.org/dash"));
        assert!(message.html.contains(r#"href="https://scheduler.example.org/dash""#));
        assert!(message.html.contains("Hello Jo,"));
    }

    #[test]
    fn names_are_escaped() {
        let message = invitation(
            Mailbox::new("<script>alert(1)</script>", "x@example.com"),
            "https://scheduler.example.org/dash",
        );
        assert!(!message.html.contains("<script>"));
        assert!(message.html.contains("&lt;script&gt;"));
    }
}
