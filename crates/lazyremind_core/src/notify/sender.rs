//! Notification sender contract and dry-run implementation.

use crate::notify::message::EmailMessage;
use crate::repo::user_directory::is_valid_email;
use log::info;
use std::error::Error;
use std::fmt::{Display, Formatter};

const MAX_ERROR_BODY_CHARS: usize = 200;

/// Delivery failure for one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Recipient address failed the shape check; nothing was sent.
    InvalidRecipient(String),
    /// Provider answered with a non-success status.
    Http { status: u16, body: String },
    /// Connection, TLS, or timeout failure before a status was received.
    Network(String),
}

impl TransportError {
    pub(crate) fn http(status: u16, body: &str) -> Self {
        Self::Http {
            status,
            body: body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
        }
    }
}

impl Display for TransportError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidRecipient(value) => write!(f, "invalid recipient: `{value}`"),
            Self::Http { status, body } => write!(f, "provider returned {status}: {body}"),
            Self::Network(message) => write!(f, "network failure: {message}"),
        }
    }
}

impl Error for TransportError {}

/// Delivers one message to one recipient.
pub trait NotificationSender {
    fn send(&self, message: &EmailMessage) -> Result<(), TransportError>;
}

impl<N: NotificationSender + ?Sized> NotificationSender for &N {
    fn send(&self, message: &EmailMessage) -> Result<(), TransportError> {
        (**self).send(message)
    }
}

/// Sender that only logs delivery metadata. Used for dry runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogOnlySender;

impl NotificationSender for LogOnlySender {
    fn send(&self, message: &EmailMessage) -> Result<(), TransportError> {
        if !is_valid_email(&message.to) {
            return Err(TransportError::InvalidRecipient(message.to.clone()));
        }
        info!(
            "event=notify_send module=notify status=dry_run subject_chars={} body_chars={}",
            message.subject.chars().count(),
            message.text.chars().count()
        );
        Ok(())
    }
}
