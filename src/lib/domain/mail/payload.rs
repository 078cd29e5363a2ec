//! Request payload

use std::{
    collections::{btree_map, BTreeMap},
    path::PathBuf,
};

use super::{Credentials, MailMessage};

/// A single payload value
#[derive(Clone, Debug, PartialEq)]
pub enum PayloadValue {
    /// A plain string field
    Text(String),

    /// A repeated field, sent as `key[]`
    List(Vec<String>),

    /// An opaque JSON value, sent JSON encoded
    Json(serde_json::Value),

    /// A header map, sent JSON encoded
    Headers(BTreeMap<String, String>),

    /// Attachment paths, sent as `files[<name>]` file parts
    Files(Vec<PathBuf>),
}

/// The field mapping sent as the HTTP request body
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Payload {
    fields: BTreeMap<String, PayloadValue>,
}

impl Payload {
    /// Build the payload for a message. Optional fields only appear when set.
    pub fn from_message(message: &MailMessage) -> Self {
        let mut payload = Payload::default();

        payload.insert("to", PayloadValue::List(message.to.as_slice().to_vec()));
        payload.insert("subject", PayloadValue::Text(message.subject.clone()));
        payload.insert("from", PayloadValue::Text(message.from.clone()));

        if let Some(text) = &message.text {
            payload.insert("text", PayloadValue::Text(text.clone()));
        }
        if let Some(html) = &message.html {
            payload.insert("html", PayloadValue::Text(html.clone()));
        }
        if let Some(to_names) = &message.to_names {
            payload.insert("toname", PayloadValue::List(to_names.clone()));
        }
        if let Some(x_smtpapi) = &message.x_smtpapi {
            payload.insert("x-smtpapi", PayloadValue::Json(x_smtpapi.clone()));
        }
        if let Some(bcc) = &message.bcc {
            payload.insert("bcc", PayloadValue::List(bcc.clone()));
        }
        if let Some(from_name) = &message.from_name {
            payload.insert("fromname", PayloadValue::Text(from_name.clone()));
        }
        if let Some(reply_to) = &message.reply_to {
            payload.insert("replyto", PayloadValue::Text(reply_to.clone()));
        }
        if let Some(date) = &message.date {
            payload.insert("date", PayloadValue::Text(date.clone()));
        }
        if let Some(files) = &message.files {
            payload.insert("files", PayloadValue::Files(files.clone()));
        }
        if !message.headers.is_empty() {
            payload.insert("headers", PayloadValue::Headers(message.headers.clone()));
        }

        payload
    }

    /// Merge account credentials into the payload. Credentials win over any
    /// field of the same name.
    pub fn with_credentials(mut self, credentials: &Credentials) -> Self {
        self.insert(
            "api_user",
            PayloadValue::Text(credentials.api_user().to_string()),
        );
        self.insert(
            "api_key",
            PayloadValue::Text(credentials.api_key().to_string()),
        );
        self
    }

    /// Set a field, replacing any previous value
    pub fn insert(&mut self, key: impl Into<String>, value: PayloadValue) {
        self.fields.insert(key.into(), value);
    }

    /// Get a field
    pub fn get(&self, key: &str) -> Option<&PayloadValue> {
        self.fields.get(key)
    }

    /// Whether the field is present
    pub fn contains(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    /// Field names, in key order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Iterate over all fields
    pub fn iter(&self) -> btree_map::Iter<'_, String, PayloadValue> {
        self.fields.iter()
    }

    /// Attachment paths, if any
    pub fn files(&self) -> &[PathBuf] {
        match self.fields.get("files") {
            Some(PayloadValue::Files(files)) => files,
            _ => &[],
        }
    }

    /// Flatten every non-file field into `(name, value)` pairs for form
    /// encoding. Lists become repeated `name[]` pairs; JSON values and header
    /// maps are JSON encoded.
    pub fn form_fields(&self) -> Result<Vec<(String, String)>, serde_json::Error> {
        let mut pairs = Vec::with_capacity(self.fields.len());

        for (key, value) in &self.fields {
            match value {
                PayloadValue::Text(text) => pairs.push((key.clone(), text.clone())),
                PayloadValue::List(items) => {
                    let name = format!("{key}[]");
                    pairs.extend(items.iter().map(|item| (name.clone(), item.clone())));
                }
                PayloadValue::Json(json) => {
                    pairs.push((key.clone(), serde_json::to_string(json)?));
                }
                PayloadValue::Headers(headers) => {
                    pairs.push((key.clone(), serde_json::to_string(headers)?));
                }
                PayloadValue::Files(_) => {}
            }
        }

        Ok(pairs)
    }
}

impl<'a> IntoIterator for &'a Payload {
    type Item = (&'a String, &'a PayloadValue);
    type IntoIter = btree_map::Iter<'a, String, PayloadValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
