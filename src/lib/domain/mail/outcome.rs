//! Response classification

use serde_json::Value;

/// Message recorded when SendGrid answers with a 5xx status
pub const SERVICE_UNAVAILABLE_MESSAGE: &str = "Access to SendGrid failed. Please try again later.";

/// Message recorded when neither a text nor an HTML body was given
pub const MISSING_BODY_MESSAGE: &str = "At minimum, either text or html must be provided.";

/// A raw response returned by a [`Transport`](super::Transport)
#[derive(Clone, Debug, PartialEq)]
pub struct TransportResponse {
    /// The HTTP status code
    pub status: u16,

    /// The decoded response body
    pub body: Value,
}

impl TransportResponse {
    /// Create a new response
    pub fn new(status: u16, body: Value) -> Self {
        Self { status, body }
    }

    fn is_server_error(&self) -> bool {
        (500..=599).contains(&self.status)
    }

    fn first_error(&self) -> Option<String> {
        let first = self.body.get("errors")?.as_array()?.first()?;

        Some(match first {
            Value::String(error) => error.clone(),
            other => other.to_string(),
        })
    }

    fn is_success(&self) -> bool {
        self.body.get("message").and_then(Value::as_str) == Some("success")
    }
}

/// The result of a send, as interpreted from the SendGrid response
#[derive(Clone, Debug, PartialEq)]
pub enum SendOutcome {
    /// SendGrid accepted the message
    Sent,

    /// SendGrid was unavailable or rejected the message
    Failed(String),

    /// The response matched no known shape and is returned as-is
    Unrecognized(Value),
}

impl SendOutcome {
    /// Classify a transport response. The first matching rule wins: a 5xx
    /// status, then a non-empty `errors` list, then `message == "success"`.
    pub fn classify(response: TransportResponse) -> Self {
        if response.is_server_error() {
            return SendOutcome::Failed(SERVICE_UNAVAILABLE_MESSAGE.to_string());
        }

        if let Some(error) = response.first_error() {
            return SendOutcome::Failed(format!("{error}."));
        }

        if response.is_success() {
            return SendOutcome::Sent;
        }

        SendOutcome::Unrecognized(response.body)
    }

    /// `Some(true)` when sent, `Some(false)` when failed, [`None`] when the
    /// response could not be interpreted
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Sent => Some(true),
            Self::Failed(_) => Some(false),
            Self::Unrecognized(_) => None,
        }
    }

    /// The failure message, if the send failed
    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Failed(message) => Some(message),
            _ => None,
        }
    }
}

/// The outcome of a single send, together with the error it recorded
#[derive(Clone, Debug, PartialEq)]
pub struct SendReport {
    /// How the response was classified
    pub outcome: SendOutcome,

    /// The error recorded by this call: the failure message, otherwise the
    /// unenforced body validation message
    pub error_message: Option<String>,
}

impl SendReport {
    /// Whether SendGrid accepted the message
    pub fn is_sent(&self) -> bool {
        self.outcome == SendOutcome::Sent
    }
}
