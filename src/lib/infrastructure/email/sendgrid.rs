//! SendGrid HTTP transport

use std::{collections::HashSet, fmt, path::Path, time::Duration};

use anyhow::anyhow;
use async_trait::async_trait;
use clap::Parser;
use reqwest::{
    multipart::{Form, Part},
    Client,
};
use serde_json::Value;
use tracing::{debug, warn};

use crate::domain::mail::{
    ConfigError, Credentials, Payload, ResponseFormat, SenderConfig, Transport, TransportError,
    TransportResponse, ValidationPolicy, ATTACHMENT_SIZE_LIMIT,
};

use super::xml;

/// The SendGrid v2 API endpoint
pub const DEFAULT_ENDPOINT: &str = "https://sendgrid.com/api/";

/// SendGrid configuration
#[derive(Clone, Parser)]
pub struct SendgridConfig {
    /// The SendGrid API user
    #[clap(long, env = "SENDGRID_API_USER")]
    pub api_user: String,

    /// The SendGrid API key
    #[clap(long, env = "SENDGRID_API_KEY", hide_env_values = true)]
    pub api_key: String,

    /// The response format, `json` or `xml`
    #[clap(long, env = "SENDGRID_API_FORMAT", default_value = "json")]
    pub api_format: String,

    /// The API endpoint
    #[clap(long, env = "SENDGRID_API_ENDPOINT", default_value = DEFAULT_ENDPOINT)]
    pub endpoint: String,

    /// Request timeout in seconds
    #[clap(long, env = "SENDGRID_TIMEOUT_SECS", default_value = "30")]
    pub timeout_secs: u64,
}

impl SendgridConfig {
    /// Resolve the sender configuration. Fields set in `overrides` replace
    /// the loaded values; everything else falls back to them.
    pub fn sender_config(
        &self,
        overrides: ConfigOverrides,
        policy: ValidationPolicy,
    ) -> Result<SenderConfig, ConfigError> {
        let credentials = Credentials::new(
            overrides.api_user.unwrap_or_else(|| self.api_user.clone()),
            overrides.api_key.unwrap_or_else(|| self.api_key.clone()),
        );
        let format = overrides
            .api_format
            .unwrap_or_else(|| self.api_format.clone());

        SenderConfig::new(credentials, &format, policy)
    }
}

impl fmt::Debug for SendgridConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SendgridConfig")
            .field("api_user", &self.api_user)
            .field("api_key", &"[redacted]")
            .field("api_format", &self.api_format)
            .field("endpoint", &self.endpoint)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Per-sender overrides of the loaded configuration
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConfigOverrides {
    /// Replaces the configured API user
    pub api_user: Option<String>,

    /// Replaces the configured API key
    pub api_key: Option<String>,

    /// Replaces the configured response format
    pub api_format: Option<String>,
}

/// HTTP transport for the SendGrid API
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    endpoint: String,
}

impl HttpTransport {
    /// Create a new transport from the loaded configuration
    pub fn new(config: &SendgridConfig) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| TransportError::UnknownError(e.into()))?;

        Ok(Self::with_endpoint(client, &config.endpoint))
    }

    /// Create a new transport posting to `endpoint` with the given client
    pub fn with_endpoint(client: Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }

    /// The full URL for an API path
    pub fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.endpoint.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    async fn multipart(&self, payload: &Payload) -> Result<Form, TransportError> {
        let mut form = Form::new();

        for (name, value) in form_fields(payload)? {
            form = form.text(name, value);
        }

        let mut names = HashSet::new();
        let mut total_size: u64 = 0;

        for path in payload.files() {
            let file_name = attachment_name(path);

            if !names.insert(file_name.clone()) {
                return Err(TransportError::DuplicateAttachment { name: file_name });
            }

            let bytes = tokio::fs::read(path)
                .await
                .map_err(|source| TransportError::Attachment {
                    path: path.to_path_buf(),
                    source,
                })?;

            total_size += bytes.len() as u64;

            let part = Part::bytes(bytes).file_name(file_name.clone());

            form = form.part(format!("files[{file_name}]"), part);
        }

        if exceeds_size_limit(total_size) {
            warn!(
                total_size,
                limit = ATTACHMENT_SIZE_LIMIT,
                "attachments exceed the SendGrid size limit"
            );
        }

        Ok(form)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post(
        &self,
        path: &str,
        format: ResponseFormat,
        payload: &Payload,
    ) -> Result<TransportResponse, TransportError> {
        let url = self.url(path);
        let request = self.client.post(&url);

        let request = if payload.files().is_empty() {
            request.form(&form_fields(payload)?)
        } else {
            request.multipart(self.multipart(payload).await?)
        };

        let response = request
            .send()
            .await
            .map_err(|e| TransportError::Request {
                url: url.clone(),
                source: e.into(),
            })?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| TransportError::Request {
                url: url.clone(),
                source: e.into(),
            })?;

        debug!(url = %url, status, "received SendGrid response");

        Ok(TransportResponse::new(status, decode_body(format, text)))
    }
}

fn form_fields(payload: &Payload) -> Result<Vec<(String, String)>, TransportError> {
    payload
        .form_fields()
        .map_err(|e| TransportError::UnknownError(anyhow!(e).context("could not encode payload")))
}

/// Whether the combined attachment size is over the SendGrid limit
fn exceeds_size_limit(total_size: u64) -> bool {
    total_size > ATTACHMENT_SIZE_LIMIT
}

fn attachment_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

/// Decode a response body in the given format. Bodies that cannot be decoded
/// are returned as a JSON string holding the raw text.
fn decode_body(format: ResponseFormat, text: String) -> Value {
    let decoded = match format {
        ResponseFormat::Json => serde_json::from_str(&text).ok(),
        ResponseFormat::Xml => xml::decode(&text),
    };

    decoded.unwrap_or(Value::String(text))
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use testresult::TestResult;

    use super::*;

    fn config() -> SendgridConfig {
        SendgridConfig {
            api_user: "user".to_string(),
            api_key: "key".to_string(),
            api_format: "json".to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout_secs: 30,
        }
    }

    #[test]
    fn test_url_joins_endpoint_and_path() -> TestResult {
        let transport = HttpTransport::new(&config())?;

        assert_eq!(
            transport.url("mail.send.json"),
            "https://sendgrid.com/api/mail.send.json"
        );

        let transport = HttpTransport::with_endpoint(Client::new(), "http://localhost:8080");
        assert_eq!(
            transport.url("/mail.send.xml"),
            "http://localhost:8080/mail.send.xml"
        );

        Ok(())
    }

    #[test]
    fn test_sender_config_uses_loaded_values() -> TestResult {
        let sender_config =
            config().sender_config(ConfigOverrides::default(), ValidationPolicy::Lenient)?;

        assert_eq!(sender_config.credentials(), &Credentials::new("user", "key"));
        assert_eq!(sender_config.format(), ResponseFormat::Json);

        Ok(())
    }

    #[test]
    fn test_sender_config_applies_overrides() -> TestResult {
        let overrides = ConfigOverrides {
            api_key: Some("other".to_string()),
            api_format: Some("xml".to_string()),
            ..Default::default()
        };

        let sender_config = config().sender_config(overrides, ValidationPolicy::Lenient)?;

        assert_eq!(sender_config.credentials(), &Credentials::new("user", "other"));
        assert_eq!(sender_config.format(), ResponseFormat::Xml);

        Ok(())
    }

    #[test]
    fn test_sender_config_normalizes_invalid_format() -> TestResult {
        let overrides = ConfigOverrides {
            api_format: Some("yaml".to_string()),
            ..Default::default()
        };

        let sender_config = config().sender_config(overrides.clone(), ValidationPolicy::Lenient)?;
        assert_eq!(sender_config.format(), ResponseFormat::Json);

        let result = config().sender_config(overrides, ValidationPolicy::Strict);
        assert!(matches!(result, Err(ConfigError::InvalidFormat(_))));

        Ok(())
    }

    #[test]
    fn test_config_debug_redacts_api_key() {
        let debug = format!("{:?}", config());

        assert!(!debug.contains("\"key\""));
        assert!(debug.contains("[redacted]"));
    }

    #[test]
    fn test_config_from_args() {
        let config = SendgridConfig::parse_from([
            "test",
            "--api-user",
            "user",
            "--api-key",
            "key",
            "--api-format",
            "xml",
        ]);

        assert_eq!(config.api_format, "xml");
        assert_eq!(config.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(config.timeout_secs, 30);
    }

    #[test]
    fn test_decode_body() {
        assert_eq!(
            decode_body(ResponseFormat::Json, r#"{"message":"success"}"#.to_string()),
            json!({"message": "success"})
        );
        assert_eq!(
            decode_body(
                ResponseFormat::Xml,
                "<result><message>success</message></result>".to_string()
            ),
            json!({"message": "success"})
        );
        assert_eq!(
            decode_body(ResponseFormat::Json, "Bad Gateway".to_string()),
            json!("Bad Gateway")
        );
    }

    #[test]
    fn test_attachment_name() {
        assert_eq!(attachment_name(Path::new("/tmp/report.pdf")), "report.pdf");
    }

    #[test]
    fn test_exceeds_size_limit() {
        assert!(!exceeds_size_limit(0));
        assert!(!exceeds_size_limit(ATTACHMENT_SIZE_LIMIT));
        assert!(exceeds_size_limit(ATTACHMENT_SIZE_LIMIT + 1));
    }
}

#[cfg(test)]
mod integration_tests {
    use std::{io::Write, sync::Arc};

    use serde_json::json;
    use testresult::TestResult;
    use wiremock::{
        matchers::{body_string_contains, header_regex, method, path},
        Mock, MockServer, ResponseTemplate,
    };

    use crate::domain::mail::{MailMessage, MailSender, MailSenderImpl, SendOutcome};

    use super::*;

    fn sender(server: &MockServer, format: &str) -> MailSenderImpl<HttpTransport> {
        let config = SendgridConfig {
            api_user: "testuser".to_string(),
            api_key: "testapikey".to_string(),
            api_format: format.to_string(),
            endpoint: format!("{}/api/", server.uri()),
            timeout_secs: 5,
        };

        let transport = HttpTransport::new(&config).expect("client builds");
        let sender_config = config
            .sender_config(ConfigOverrides::default(), ValidationPolicy::Lenient)
            .expect("valid configuration");

        MailSenderImpl::new(sender_config, Arc::new(transport))
    }

    fn message() -> MailMessage {
        MailMessage::builder("to@example.com", "Hello", "from@example.com")
            .to("other@example.com")
            .text("hi")
            .build()
    }

    #[tokio::test]
    async fn test_send_json_success() -> TestResult {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/mail.send.json"))
            .and(header_regex("content-type", "application/x-www-form-urlencoded"))
            .and(body_string_contains("api_user=testuser"))
            .and(body_string_contains("api_key=testapikey"))
            .and(body_string_contains("to%5B%5D=to%40example.com"))
            .and(body_string_contains("to%5B%5D=other%40example.com"))
            .and(body_string_contains("text=hi"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message": "success"})))
            .expect(1)
            .mount(&server)
            .await;

        let report = sender(&server, "json").send(&message()).await?;

        assert!(report.is_sent());

        Ok(())
    }

    #[tokio::test]
    async fn test_send_json_errors() -> TestResult {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/mail.send.json"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "message": "error",
                "errors": ["Bad username / password", "Missing destination email"],
            })))
            .mount(&server)
            .await;

        let sender = sender(&server, "json");
        let report = sender.send(&message()).await?;

        assert_eq!(
            report.outcome,
            SendOutcome::Failed("Bad username / password.".to_string())
        );
        assert_eq!(sender.last_error_message(), "Bad username / password.");

        Ok(())
    }

    #[tokio::test]
    async fn test_send_xml_errors() -> TestResult {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/mail.send.xml"))
            .respond_with(ResponseTemplate::new(400).set_body_string(
                r#"<?xml version="1.0" encoding="ISO-8859-1"?>
                <result>
                  <message>error</message>
                  <errors>
                    <error>Bad username / password</error>
                  </errors>
                </result>"#,
            ))
            .mount(&server)
            .await;

        let report = sender(&server, "xml").send(&message()).await?;

        assert_eq!(
            report.error_message.as_deref(),
            Some("Bad username / password.")
        );

        Ok(())
    }

    #[tokio::test]
    async fn test_send_xml_success() -> TestResult {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/mail.send.xml"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("<result><message>success</message></result>"),
            )
            .mount(&server)
            .await;

        let report = sender(&server, "xml").send(&message()).await?;

        assert!(report.is_sent());

        Ok(())
    }

    #[tokio::test]
    async fn test_send_service_unavailable() -> TestResult {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("Service Unavailable"))
            .mount(&server)
            .await;

        let sender = sender(&server, "json");
        let report = sender.send(&message()).await?;

        assert_eq!(report.outcome.as_bool(), Some(false));
        assert_eq!(
            sender.last_error_message(),
            "Access to SendGrid failed. Please try again later."
        );

        Ok(())
    }

    #[tokio::test]
    async fn test_send_unrecognized_plain_text() -> TestResult {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("queued"))
            .mount(&server)
            .await;

        let report = sender(&server, "json").send(&message()).await?;

        assert_eq!(report.outcome, SendOutcome::Unrecognized(json!("queued")));

        Ok(())
    }

    #[tokio::test]
    async fn test_send_with_attachment_is_multipart() -> TestResult {
        let server = MockServer::start().await;

        let mut file = tempfile::Builder::new().suffix(".txt").tempfile()?;
        write!(file, "attachment contents")?;
        let file_name = attachment_name(file.path());

        Mock::given(method("POST"))
            .and(path("/api/mail.send.json"))
            .and(header_regex("content-type", "multipart/form-data"))
            .and(body_string_contains(format!("name=\"files[{file_name}]\"")))
            .and(body_string_contains("attachment contents"))
            .and(body_string_contains("name=\"api_user\""))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message": "success"})))
            .expect(1)
            .mount(&server)
            .await;

        let message = MailMessage::builder("to@example.com", "Hello", "from@example.com")
            .text("see attached")
            .file(file.path())
            .build();

        let report = sender(&server, "json").send(&message).await?;

        assert!(report.is_sent());

        Ok(())
    }

    #[tokio::test]
    async fn test_duplicate_attachment_names_are_rejected() -> TestResult {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message": "success"})))
            .expect(0)
            .mount(&server)
            .await;

        let first = tempfile::tempdir()?;
        let second = tempfile::tempdir()?;
        std::fs::write(first.path().join("report.txt"), "first report")?;
        std::fs::write(second.path().join("report.txt"), "second report")?;

        let message = MailMessage::builder("to@example.com", "Hello", "from@example.com")
            .text("see attached")
            .file(first.path().join("report.txt"))
            .file(second.path().join("report.txt"))
            .build();

        let result = sender(&server, "json").send(&message).await;

        assert!(matches!(
            result,
            Err(crate::domain::mail::MailerError::Transport(
                TransportError::DuplicateAttachment { ref name }
            )) if name == "report.txt"
        ));

        Ok(())
    }

    #[tokio::test]
    async fn test_oversized_attachments_are_still_sent() -> TestResult {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/mail.send.json"))
            .and(header_regex("content-type", "multipart/form-data"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "message": "error",
                "errors": ["Attachments exceed the size limit"],
            })))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir()?;
        let large = dir.path().join("large.bin");
        let size = usize::try_from(ATTACHMENT_SIZE_LIMIT)? + 1;
        std::fs::write(&large, vec![0u8; size])?;

        let message = MailMessage::builder("to@example.com", "Hello", "from@example.com")
            .text("see attached")
            .file(&large)
            .build();

        let report = sender(&server, "json").send(&message).await?;

        assert_eq!(
            report.outcome,
            SendOutcome::Failed("Attachments exceed the size limit.".to_string())
        );

        Ok(())
    }

    #[tokio::test]
    async fn test_missing_attachment_is_a_transport_error() {
        let server = MockServer::start().await;

        let message = MailMessage::builder("to@example.com", "Hello", "from@example.com")
            .text("see attached")
            .file("/nonexistent/attachment.pdf")
            .build();

        let result = sender(&server, "json").send(&message).await;

        assert!(matches!(
            result,
            Err(crate::domain::mail::MailerError::Transport(
                TransportError::Attachment { .. }
            ))
        ));
    }

    #[tokio::test]
    async fn test_connection_failure_is_a_transport_error() -> TestResult {
        let transport = HttpTransport::with_endpoint(Client::new(), "http://127.0.0.1:1/api/");
        let payload = Payload::from_message(&message());

        let result = transport
            .post("mail.send.json", ResponseFormat::Json, &payload)
            .await;

        assert!(matches!(result, Err(TransportError::Request { .. })));

        Ok(())
    }
}
