//! Mailer errors

use std::path::PathBuf;

use thiserror::Error;

/// Errors returned by [`MailSender::send`](super::MailSender::send)
#[derive(Debug, Error)]
pub enum MailerError {
    /// Neither a text nor an HTML body was provided under the strict policy
    #[error("At minimum, either text or html must be provided.")]
    MissingBody,

    /// The transport could not complete the request
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Errors raised by a [`Transport`](super::Transport)
#[derive(Debug, Error)]
pub enum TransportError {
    /// An attachment could not be read from disk
    #[error("could not read attachment {}", path.display())]
    Attachment {
        /// The attachment path
        path: PathBuf,

        /// The underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// Two attachments share a file name, so one would overwrite the other
    #[error("more than one attachment is named {name}")]
    DuplicateAttachment {
        /// The shared file name
        name: String,
    },

    /// The request could not be sent or its response could not be read
    #[error("request to {url} failed")]
    Request {
        /// The requested URL
        url: String,

        /// The underlying error
        #[source]
        source: anyhow::Error,
    },

    /// Unknown error
    #[error(transparent)]
    UnknownError(#[from] anyhow::Error),
}

/// Errors raised while building the sender configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The response format is neither `json` nor `xml`
    #[error("unsupported response format \"{0}\", expected \"json\" or \"xml\"")]
    InvalidFormat(String),
}
