//! Mail message

use std::{collections::BTreeMap, fmt, path::PathBuf};

use chrono::{DateTime, TimeZone};
use serde::{de, Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// An error that can occur when building a recipient list
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RecipientsError {
    /// No recipient address was given
    #[error("at least one recipient is required")]
    Empty,
}

/// One or more recipient addresses. Deserializes from a single address or
/// a list of them.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(into = "Vec<String>")]
pub struct Recipients(Vec<String>);

/// An address field given either as a single string or as a list
#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl From<OneOrMany> for Vec<String> {
    fn from(value: OneOrMany) -> Self {
        match value {
            OneOrMany::One(address) => vec![address],
            OneOrMany::Many(addresses) => addresses,
        }
    }
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<OneOrMany>::deserialize(deserializer)?.map(Into::into))
}

impl Recipients {
    /// Create a recipient list holding a single address
    pub fn one(address: impl Into<String>) -> Self {
        Self(vec![address.into()])
    }

    /// Add another address
    pub fn push(&mut self, address: impl Into<String>) {
        self.0.push(address.into());
    }

    /// The addresses, in insertion order
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    /// Number of addresses
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always `false`: a recipient list holds at least one address
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl TryFrom<Vec<String>> for Recipients {
    type Error = RecipientsError;

    fn try_from(addresses: Vec<String>) -> Result<Self, Self::Error> {
        if addresses.is_empty() {
            return Err(RecipientsError::Empty);
        }

        Ok(Self(addresses))
    }
}

impl<'de> Deserialize<'de> for Recipients {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let addresses: Vec<String> = OneOrMany::deserialize(deserializer)?.into();

        Self::try_from(addresses).map_err(de::Error::custom)
    }
}

impl From<&str> for Recipients {
    fn from(address: &str) -> Self {
        Self::one(address)
    }
}

impl From<String> for Recipients {
    fn from(address: String) -> Self {
        Self::one(address)
    }
}

impl From<Recipients> for Vec<String> {
    fn from(recipients: Recipients) -> Self {
        recipients.0
    }
}

impl fmt::Display for Recipients {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join(", "))
    }
}

/// An email to be sent through the SendGrid mail API.
///
/// Optional fields left as [`None`] are omitted from the request entirely;
/// `Some(String::new())` is sent as an empty value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MailMessage {
    /// Recipient address(es)
    pub to: Recipients,

    /// The subject of the email
    pub subject: String,

    /// The plain text body. Required if `html` is left empty.
    #[serde(default)]
    pub text: Option<String>,

    /// The HTML body. Required if `text` is left empty.
    #[serde(default)]
    pub html: Option<String>,

    /// Sender address from your domain
    pub from: String,

    /// Recipient names, one per address in `to`
    #[serde(default)]
    pub to_names: Option<Vec<String>>,

    /// SMTP API extension header, passed through verbatim
    #[serde(default)]
    pub x_smtpapi: Option<serde_json::Value>,

    /// Blind copy address(es)
    #[serde(default, deserialize_with = "one_or_many")]
    pub bcc: Option<Vec<String>>,

    /// Name appended to the `from` address
    #[serde(default)]
    pub from_name: Option<String>,

    /// Address used for replies from the recipient
    #[serde(default)]
    pub reply_to: Option<String>,

    /// RFC 2822 formatted date used in the email header
    #[serde(default)]
    pub date: Option<String>,

    /// Paths of files to attach. Must be less than
    /// [`ATTACHMENT_SIZE_LIMIT`](super::ATTACHMENT_SIZE_LIMIT) bytes in total.
    #[serde(default)]
    pub files: Option<Vec<PathBuf>>,

    /// Extra headers to place into the email
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

impl MailMessage {
    /// Start building a message from its required fields
    pub fn builder(
        to: impl Into<Recipients>,
        subject: impl Into<String>,
        from: impl Into<String>,
    ) -> MailMessageBuilder {
        MailMessageBuilder {
            message: MailMessage {
                to: to.into(),
                subject: subject.into(),
                text: None,
                html: None,
                from: from.into(),
                to_names: None,
                x_smtpapi: None,
                bcc: None,
                from_name: None,
                reply_to: None,
                date: None,
                files: None,
                headers: BTreeMap::new(),
            },
        }
    }

    /// Whether a text or an HTML body is present
    pub fn has_body(&self) -> bool {
        self.text.is_some() || self.html.is_some()
    }
}

/// Builder for [`MailMessage`]
#[derive(Debug)]
pub struct MailMessageBuilder {
    message: MailMessage,
}

impl MailMessageBuilder {
    /// Add another recipient
    pub fn to(mut self, address: impl Into<String>) -> Self {
        self.message.to.push(address);
        self
    }

    /// Set the plain text body
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.message.text = Some(text.into());
        self
    }

    /// Set the HTML body
    pub fn html(mut self, html: impl Into<String>) -> Self {
        self.message.html = Some(html.into());
        self
    }

    /// Set the recipient display names
    pub fn to_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.message.to_names = Some(names.into_iter().map(Into::into).collect());
        self
    }

    /// Set the SMTP API extension header
    pub fn x_smtpapi(mut self, value: serde_json::Value) -> Self {
        self.message.x_smtpapi = Some(value);
        self
    }

    /// Add a blind copy recipient
    pub fn bcc(mut self, address: impl Into<String>) -> Self {
        self.message
            .bcc
            .get_or_insert_with(Vec::new)
            .push(address.into());
        self
    }

    /// Set the sender display name
    pub fn from_name(mut self, name: impl Into<String>) -> Self {
        self.message.from_name = Some(name.into());
        self
    }

    /// Set the reply-to address
    pub fn reply_to(mut self, address: impl Into<String>) -> Self {
        self.message.reply_to = Some(address.into());
        self
    }

    /// Set the date header from a preformatted RFC 2822 string
    pub fn date(mut self, date: impl Into<String>) -> Self {
        self.message.date = Some(date.into());
        self
    }

    /// Set the date header from a timestamp
    pub fn date_at<Tz>(self, date: &DateTime<Tz>) -> Self
    where
        Tz: TimeZone,
        Tz::Offset: fmt::Display,
    {
        self.date(date.to_rfc2822())
    }

    /// Attach a file
    pub fn file(mut self, path: impl Into<PathBuf>) -> Self {
        self.message
            .files
            .get_or_insert_with(Vec::new)
            .push(path.into());
        self
    }

    /// Add a custom header
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.message.headers.insert(name.into(), value.into());
        self
    }

    /// Finish building the message
    pub fn build(self) -> MailMessage {
        self.message
    }
}
