//! Response format

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::errors::ConfigError;

/// The wire encoding negotiated through the endpoint path suffix.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseFormat {
    /// `mail.send.json`
    #[default]
    Json,

    /// `mail.send.xml`
    Xml,
}

impl ResponseFormat {
    /// Parses a format, falling back to [`ResponseFormat::Json`] for anything
    /// other than `json` or `xml`.
    pub fn normalize(raw: &str) -> Self {
        raw.parse().unwrap_or_else(|_| {
            warn!("unsupported response format \"{raw}\", using json");

            ResponseFormat::Json
        })
    }

    /// The format's name as used in the endpoint path
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Xml => "xml",
        }
    }

    /// The endpoint path for sending mail in this format
    pub fn send_path(&self) -> String {
        format!("mail.send.{}", self.as_str())
    }
}

impl FromStr for ResponseFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "json" => Ok(Self::Json),
            "xml" => Ok(Self::Xml),
            other => Err(ConfigError::InvalidFormat(other.to_string())),
        }
    }
}

impl fmt::Display for ResponseFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
