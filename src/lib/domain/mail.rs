//! SendGrid mail module

mod credentials;
mod format;
mod message;
mod outcome;
mod payload;
mod sender;
mod transport;

pub mod errors;

pub use credentials::Credentials;
pub use errors::{ConfigError, MailerError, TransportError};
pub use format::ResponseFormat;
pub use message::{MailMessage, MailMessageBuilder, Recipients, RecipientsError};
pub use outcome::{
    SendOutcome, SendReport, TransportResponse, MISSING_BODY_MESSAGE, SERVICE_UNAVAILABLE_MESSAGE,
};
pub use payload::{Payload, PayloadValue};
pub use sender::{MailSender, MailSenderImpl, SenderConfig, ValidationPolicy};
pub use transport::Transport;

/// Soft limit on the combined size of attachments, in bytes. Not enforced.
pub const ATTACHMENT_SIZE_LIMIT: u64 = 7 * 1024 * 1024;
