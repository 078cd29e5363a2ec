//! Account credentials

use std::fmt;

/// SendGrid account credentials, merged into every outgoing payload.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    api_user: String,
    api_key: String,
}

impl Credentials {
    /// Create a new set of credentials
    pub fn new(api_user: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            api_user: api_user.into(),
            api_key: api_key.into(),
        }
    }

    /// The API user name
    pub fn api_user(&self) -> &str {
        &self.api_user
    }

    /// The API key
    pub fn api_key(&self) -> &str {
        &self.api_key
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_user", &self.api_user)
            .field("api_key", &"[redacted]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_api_key() {
        let credentials = Credentials::new("user", "SG.secret");

        let debug = format!("{:?}", credentials);

        assert!(debug.contains("user"));
        assert!(!debug.contains("SG.secret"));
    }
}
