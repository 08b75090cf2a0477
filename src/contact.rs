//! The contact form: validation and hand-off to a mail relay.

use std::sync::OnceLock;

use regex::Regex;
use serde::Deserialize;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ContactPayload {
    pub name: String,
    pub email: String,
    pub message: String,
    /// Honeypot. Hidden from people, so anything in it came from a bot.
    pub hp: String,
}

/// A validated message ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactMessage {
    pub reply_to: String,
    pub subject: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContactError {
    #[error("name, email and message are required")]
    MissingFields,

    #[error("email address is not valid")]
    InvalidEmail,

    #[error("message could not be sent: {0}")]
    Relay(String),
}

pub trait MailRelay: Send + Sync {
    fn send(&self, message: &ContactMessage) -> Result<(), ContactError>;
}

/// Records messages in the log instead of sending them.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogRelay;

impl MailRelay for LogRelay {
    fn send(&self, message: &ContactMessage) -> Result<(), ContactError> {
        tracing::info!(
            reply_to = %message.reply_to,
            subject = %message.subject,
            "contact message received\n{}",
            message.text
        );
        Ok(())
    }
}

/// What happened to a submission that passed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Sent,
    /// The honeypot was filled; the sender is told it worked.
    Dropped,
}

fn email_pattern() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email pattern"))
}

pub fn validate(payload: &ContactPayload, sent_at: OffsetDateTime) -> Result<ContactMessage, ContactError> {
    if payload.name.is_empty() || payload.email.is_empty() || payload.message.is_empty() {
        return Err(ContactError::MissingFields);
    }
    if !email_pattern().is_match(&payload.email) {
        return Err(ContactError::InvalidEmail);
    }
    let sent_at = sent_at
        .format(&Rfc3339)
        .unwrap_or_else(|_| sent_at.unix_timestamp().to_string());
    let text = [
        format!("Name: {}", payload.name),
        format!("Email: {}", payload.email),
        String::new(),
        "-- Message --".to_string(),
        payload.message.clone(),
        String::new(),
        format!("Sent at: {sent_at}"),
    ]
    .join("\n");
    Ok(ContactMessage {
        reply_to: payload.email.clone(),
        subject: format!("[Contact] from {}", payload.name),
        text,
    })
}

pub fn submit(
    relay: &dyn MailRelay,
    payload: &ContactPayload,
    sent_at: OffsetDateTime,
) -> Result<Delivery, ContactError> {
    if !payload.hp.is_empty() {
        tracing::debug!("dropping contact submission with filled honeypot");
        return Ok(Delivery::Dropped);
    }
    let message = validate(payload, sent_at)?;
    relay.send(&message)?;
    Ok(Delivery::Sent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingRelay {
        sent: Mutex<Vec<ContactMessage>>,
        fail: bool,
    }

    impl MailRelay for RecordingRelay {
        fn send(&self, message: &ContactMessage) -> Result<(), ContactError> {
            if self.fail {
                return Err(ContactError::Relay("provider unavailable".to_string()));
            }
            self.sent.lock().unwrap().push(message.clone());
            Ok(())
        }
    }

    fn payload() -> ContactPayload {
        ContactPayload {
            name: "Taro".to_string(),
            email: "taro@example.com".to_string(),
            message: "Hello".to_string(),
            hp: String::new(),
        }
    }

    #[test]
    fn valid_submission_is_relayed() {
        let relay = RecordingRelay::default();
        let delivery = submit(&relay, &payload(), OffsetDateTime::UNIX_EPOCH).unwrap();
        assert_eq!(delivery, Delivery::Sent);

        let sent = relay.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].reply_to, "taro@example.com");
        assert_eq!(sent[0].subject, "[Contact] from Taro");
        assert!(sent[0].text.contains("\nHello\n"));
        assert!(sent[0].text.ends_with("Sent at: 1970-01-01T00:00:00Z"));
    }

    #[test]
    fn honeypot_is_dropped_silently() {
        let relay = RecordingRelay::default();
        let bot = ContactPayload {
            hp: "spam".to_string(),
            email: "not an email".to_string(),
            ..payload()
        };
        assert_eq!(
            submit(&relay, &bot, OffsetDateTime::UNIX_EPOCH),
            Ok(Delivery::Dropped)
        );
        assert!(relay.sent.lock().unwrap().is_empty());
    }

    #[test]
    fn missing_fields_and_bad_email_are_rejected() {
        let relay = RecordingRelay::default();
        let empty_message = ContactPayload {
            message: String::new(),
            ..payload()
        };
        assert_eq!(
            submit(&relay, &empty_message, OffsetDateTime::UNIX_EPOCH),
            Err(ContactError::MissingFields)
        );

        for email in ["taro", "taro@example", "ta ro@example.com", "@example.com"] {
            let bad = ContactPayload {
                email: email.to_string(),
                ..payload()
            };
            assert_eq!(
                submit(&relay, &bad, OffsetDateTime::UNIX_EPOCH),
                Err(ContactError::InvalidEmail),
                "{email}"
            );
        }
    }

    #[test]
    fn relay_failure_is_reported() {
        let relay = RecordingRelay {
            fail: true,
            ..RecordingRelay::default()
        };
        assert!(matches!(
            submit(&relay, &payload(), OffsetDateTime::UNIX_EPOCH),
            Err(ContactError::Relay(_))
        ));
    }

    #[test]
    fn missing_json_fields_default_to_empty() {
        let parsed: ContactPayload = serde_json::from_str(r#"{"name":"A"}"#).unwrap();
        assert_eq!(parsed.email, "");
        assert_eq!(parsed.hp, "");
    }
}
