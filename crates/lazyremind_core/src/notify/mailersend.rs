//! MailerSend HTTP transport.
//!
//! # Responsibility
//! - Translate `EmailMessage` into the MailerSend `/v1/email` payload.
//! - Map provider statuses and network failures to `TransportError`.
//!
//! # Invariants
//! - The API key is only ever placed in the `Authorization` header.
//! - Invalid recipients are rejected before any request is made.

use crate::notify::message::EmailMessage;
use crate::notify::sender::{NotificationSender, TransportError};
use crate::repo::user_directory::is_valid_email;
use log::{debug, warn};
use serde::Serialize;
use std::time::Duration;

pub const MAILERSEND_ENDPOINT: &str = "https://api.mailersend.com/v1/email";

/// Verified sender identity used in the `from` block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SenderIdentity {
    pub email: String,
    pub name: String,
}

/// Blocking MailerSend client.
pub struct MailerSendSender {
    agent: ureq::Agent,
    endpoint: String,
    api_key: String,
    from: SenderIdentity,
}

impl MailerSendSender {
    pub fn new(api_key: impl Into<String>, from: SenderIdentity) -> Self {
        Self {
            agent: http_agent(),
            endpoint: MAILERSEND_ENDPOINT.to_string(),
            api_key: api_key.into(),
            from,
        }
    }

    /// Overrides the API endpoint, e.g. for a local mock server.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

impl NotificationSender for MailerSendSender {
    fn send(&self, message: &EmailMessage) -> Result<(), TransportError> {
        if !is_valid_email(&message.to) {
            return Err(TransportError::InvalidRecipient(message.to.clone()));
        }

        let payload = EmailPayload::build(&self.from, message);
        let result = self
            .agent
            .post(&self.endpoint)
            .set("Authorization", &format!("Bearer {}", self.api_key))
            .send_json(&payload);

        match result {
            Ok(response) => {
                debug!(
                    "event=notify_send module=notify status=ok http_status={}",
                    response.status()
                );
                Ok(())
            }
            Err(ureq::Error::Status(status, response)) => {
                let body = response.into_string().unwrap_or_default();
                warn!("event=notify_send module=notify status=error http_status={status}");
                Err(TransportError::http(status, &body))
            }
            Err(err) => {
                warn!("event=notify_send module=notify status=error error_code=network");
                Err(TransportError::Network(err.to_string()))
            }
        }
    }
}

fn http_agent() -> ureq::Agent {
    ureq::AgentBuilder::new()
        .timeout_connect(Duration::from_secs(10))
        .timeout_read(Duration::from_secs(20))
        .timeout_write(Duration::from_secs(20))
        .build()
}

#[derive(Debug, Serialize)]
struct Address<'a> {
    email: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct EmailPayload<'a> {
    from: Address<'a>,
    to: Vec<Address<'a>>,
    subject: &'a str,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    html: Option<&'a str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    cc: Vec<Address<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    bcc: Vec<Address<'a>>,
}

impl<'a> EmailPayload<'a> {
    fn build(from: &'a SenderIdentity, message: &'a EmailMessage) -> Self {
        Self {
            from: Address {
                email: &from.email,
                name: Some(&from.name),
            },
            to: vec![plain_address(&message.to)],
            subject: &message.subject,
            text: &message.text,
            html: message.html.as_deref(),
            cc: message.cc.iter().map(|email| plain_address(email)).collect(),
            bcc: message.bcc.iter().map(|email| plain_address(email)).collect(),
        }
    }
}

fn plain_address(email: &str) -> Address<'_> {
    Address { email, name: None }
}
