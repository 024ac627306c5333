//! Email notifier for ticket issuance and cancellation notices

use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox, Message, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    SmtpTransport, Transport,
};
use std::str::FromStr;

use crate::{
    config::EmailConfig,
    error::{AppError, AppResult},
};

use super::notifications::{Notification, NotificationTemplate, Notifier};

#[derive(Clone)]
pub struct EmailService {
    config: EmailConfig,
}

impl EmailService {
    pub fn new(config: EmailConfig) -> Self {
        Self { config }
    }

    /// Subject and plain-text body for a notification
    fn compose(notification: &Notification) -> (String, String) {
        let field = |key: &str| {
            notification
                .data
                .get(key)
                .and_then(|v| v.as_str())
                .unwrap_or("-")
                .to_string()
        };
        let greeting = notification
            .recipient
            .name
            .as_deref()
            .map(|name| format!("Hello {},", name))
            .unwrap_or_else(|| "Hello,".to_string());

        match notification.template {
            NotificationTemplate::TicketIssued => (
                format!("Your visit ticket {}", field("ticket_number")),
                format!(
                    r#"
{greeting}

Your request has been approved and a visit ticket was issued.

Ticket: {ticket}
Category: {category}
Date: {date}
Time slot: {slot}

Please bring this ticket with you. It can be used once, on the visit date only.
"#,
                    greeting = greeting,
                    ticket = field("ticket_number"),
                    category = field("category"),
                    date = field("visit_date"),
                    slot = field("time_slot"),
                ),
            ),
            NotificationTemplate::TicketCancelled => (
                format!("Your visit ticket {} was cancelled", field("ticket_number")),
                format!(
                    r#"
{greeting}

Your visit ticket {ticket} has been cancelled.

Reason: {reason}

Your help request is still on file and a new ticket can be issued later.
"#,
                    greeting = greeting,
                    ticket = field("ticket_number"),
                    reason = field("reason"),
                ),
            ),
        }
    }

    /// Generic email sending function
    /// Escaped HTML rendering of a plain-text body
    fn html_body(body: &str) -> String {
        let escaped = body
            .replace('&', "&amp;")
            .replace('<', "&lt;")
            .replace('>', "&gt;");
        format!(r#"<html><body><pre>{}</pre></body></html>"#, escaped)
    }

    async fn send_email(&self, to: &str, subject: &str, body: &str) -> AppResult<()> {
        let from_name = self
            .config
            .smtp_from_name
            .as_deref()
            .unwrap_or("Visitdesk");
        let from_mailbox = Mailbox::from_str(&format!("{} <{}>", from_name, self.config.smtp_from))
            .map_err(|e| AppError::Internal(format!("Invalid from address: {}", e)))?;

        let to_mailbox = Mailbox::from_str(to)
            .map_err(|e| AppError::Validation(format!("Invalid to address: {}", e)))?;

        let email = Message::builder()
            .from(from_mailbox)
            .to(to_mailbox)
            .subject(subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(body.to_string()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(Self::html_body(body)),
                    ),
            )
            .map_err(|e| AppError::Internal(format!("Failed to build email: {}", e)))?;

        let mailer_builder = if self.config.smtp_use_tls {
            SmtpTransport::starttls_relay(&self.config.smtp_host)
                .map_err(|e| AppError::Internal(format!("Failed to create SMTP transport: {}", e)))?
        } else {
            SmtpTransport::builder_dangerous(&self.config.smtp_host)
        }
        .port(self.config.smtp_port);

        let mailer_builder = if let (Some(username), Some(password)) = (
            &self.config.smtp_username,
            &self.config.smtp_password,
        ) {
            mailer_builder.credentials(Credentials::new(username.clone(), password.clone()))
        } else {
            mailer_builder
        };

        let mailer = mailer_builder.build();

        // The SMTP transport is blocking
        tokio::task::spawn_blocking(move || mailer.send(&email))
            .await
            .map_err(|e| AppError::Internal(format!("Email task failed: {}", e)))?
            .map_err(|e| AppError::Internal(format!("Failed to send email: {}", e)))?;

        Ok(())
    }
}

#[async_trait]
impl Notifier for EmailService {
    async fn send(&self, notification: &Notification) -> AppResult<()> {
        let to = notification.recipient.email.as_deref().ok_or_else(|| {
            AppError::Validation(format!(
                "User {} has no email address",
                notification.recipient.user_id
            ))
        })?;

        let (subject, body) = Self::compose(notification);
        self.send_email(to, &subject, &body).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::notifications::Recipient;
    use serde_json::json;

    fn notification(template: NotificationTemplate, email: Option<&str>) -> Notification {
        Notification {
            recipient: Recipient {
                user_id: 3,
                name: Some("Sam".into()),
                email: email.map(String::from),
            },
            template,
            data: json!({
                "ticket_number": "TKT-20261019-Q7W8E9",
                "category": "Food",
                "visit_date": "2026-10-19",
                "time_slot": "morning",
                "reason": "Distribution postponed",
            }),
        }
    }

    #[test]
    fn test_compose_issued() {
        let (subject, body) =
            EmailService::compose(&notification(NotificationTemplate::TicketIssued, None));
        assert_eq!(subject, "Your visit ticket TKT-20261019-Q7W8E9");
        assert!(body.contains("Hello Sam,"));
        assert!(body.contains("Time slot: morning"));
    }

    #[test]
    fn test_compose_cancelled() {
        let (subject, body) =
            EmailService::compose(&notification(NotificationTemplate::TicketCancelled, None));
        assert!(subject.ends_with("was cancelled"));
        assert!(body.contains("Reason: Distribution postponed"));
    }

    #[test]
    fn test_html_body_is_escaped() {
        let html = EmailService::html_body("Reason: <b>closed</b> & moved\nSee you");
        assert!(html.contains("Reason: &lt;b&gt;closed&lt;/b&gt; &amp; moved\nSee you"));
        assert!(!html.contains("<br>"));
    }

    #[tokio::test]
    async fn test_missing_address_is_rejected_before_smtp() {
        let service = EmailService::new(EmailConfig::default());
        let result = service
            .send(&notification(NotificationTemplate::TicketIssued, None))
            .await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }
}
