//! Mail sender

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use tracing::{debug, error, warn};

use super::{
    errors::{ConfigError, MailerError},
    outcome::MISSING_BODY_MESSAGE,
    Credentials, MailMessage, Payload, ResponseFormat, SendOutcome, SendReport, Transport,
};

/// How strictly the sender treats questionable input
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ValidationPolicy {
    /// Record problems and carry on: a missing body is recorded as the last
    /// error but the message is still sent, an unknown format becomes `json`.
    #[default]
    Lenient,

    /// Reject a missing body before sending and an unknown format at
    /// construction.
    Strict,
}

/// Settings fixed for the lifetime of a sender
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SenderConfig {
    credentials: Credentials,
    format: ResponseFormat,
    policy: ValidationPolicy,
}

impl SenderConfig {
    /// Create a new sender configuration.
    ///
    /// # Errors
    /// Under [`ValidationPolicy::Strict`], returns [`ConfigError::InvalidFormat`]
    /// if `format` is neither `json` nor `xml`.
    pub fn new(
        credentials: Credentials,
        format: &str,
        policy: ValidationPolicy,
    ) -> Result<Self, ConfigError> {
        let format = match policy {
            ValidationPolicy::Lenient => ResponseFormat::normalize(format),
            ValidationPolicy::Strict => format.parse()?,
        };

        Ok(Self {
            credentials,
            format,
            policy,
        })
    }

    /// The account credentials
    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// The response format
    pub fn format(&self) -> ResponseFormat {
        self.format
    }

    /// The validation policy
    pub fn policy(&self) -> ValidationPolicy {
        self.policy
    }
}

/// Mail sender
#[async_trait]
pub trait MailSender: Clone + Send + Sync + 'static {
    /// Sends a message through the SendGrid mail API.
    ///
    /// # Arguments
    /// * `message` - The [`MailMessage`] to send.
    ///
    /// # Returns
    /// A [`Result`] which is [`Ok`] containing a [`SendReport`] describing how
    /// SendGrid answered, or an [`Err`] containing a [`MailerError`] if the
    /// message was rejected before sending or the transport failed.
    async fn send(&self, message: &MailMessage) -> Result<SendReport, MailerError>;

    /// The most recently recorded error message, empty if none was recorded.
    fn last_error_message(&self) -> String;
}

/// Mail sender implementation
#[derive(Debug, Clone)]
pub struct MailSenderImpl<T>
where
    T: Transport,
{
    config: SenderConfig,
    transport: Arc<T>,
    last_error: Arc<Mutex<String>>,
}

impl<T> MailSenderImpl<T>
where
    T: Transport,
{
    /// Create a new mail sender
    pub fn new(config: SenderConfig, transport: Arc<T>) -> Self {
        debug!(format = %config.format, "SendGrid mail sender initialized");

        Self {
            config,
            transport,
            last_error: Arc::new(Mutex::new(String::new())),
        }
    }

    /// The sender configuration
    pub fn config(&self) -> &SenderConfig {
        &self.config
    }

    fn record_error(&self, message: &str) {
        let mut last_error = self.last_error.lock().unwrap_or_else(PoisonError::into_inner);
        *last_error = message.to_string();
    }
}

#[async_trait]
impl<T> MailSender for MailSenderImpl<T>
where
    T: Transport,
{
    async fn send(&self, message: &MailMessage) -> Result<SendReport, MailerError> {
        let mut error_message = None;

        if !message.has_body() {
            match self.config.policy {
                ValidationPolicy::Strict => return Err(MailerError::MissingBody),
                ValidationPolicy::Lenient => {
                    warn!(to = %message.to, "{}", MISSING_BODY_MESSAGE);

                    self.record_error(MISSING_BODY_MESSAGE);
                    error_message = Some(MISSING_BODY_MESSAGE.to_string());
                }
            }
        }

        let payload = Payload::from_message(message).with_credentials(&self.config.credentials);
        let path = self.config.format.send_path();

        let fields: Vec<&str> = payload.keys().collect();
        debug!(path = %path, to = %message.to, ?fields, "sending mail");

        let response = self.transport.post(&path, self.config.format, &payload).await?;
        let status = response.status;
        let outcome = SendOutcome::classify(response);

        match &outcome {
            SendOutcome::Failed(failure) => {
                error!(status, "mail was not sent: {failure}");

                self.record_error(failure);
                error_message = Some(failure.clone());
            }
            SendOutcome::Sent => debug!(status, "mail sent"),
            SendOutcome::Unrecognized(_) => warn!(status, "unrecognized mail send response"),
        }

        Ok(SendReport {
            outcome,
            error_message,
        })
    }

    fn last_error_message(&self) -> String {
        self.last_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
