//! Transport seam

use async_trait::async_trait;

#[cfg(test)]
use mockall::mock;

use super::{errors::TransportError, Payload, ResponseFormat, TransportResponse};

/// Posts payloads to the SendGrid API
#[async_trait]
pub trait Transport: Clone + Send + Sync + 'static {
    /// Post a payload.
    ///
    /// # Arguments
    /// * `path` - The portion of the URL after the API endpoint, e.g. `mail.send.json`.
    /// * `format` - The [`ResponseFormat`] used to decode the response body.
    /// * `payload` - The [`Payload`] to encode as the request body.
    ///
    /// # Returns
    /// A [`Result`] which is [`Ok`] containing the [`TransportResponse`] for any
    /// HTTP status, or an [`Err`] containing a [`TransportError`] if no response
    /// could be obtained.
    async fn post(
        &self,
        path: &str,
        format: ResponseFormat,
        payload: &Payload,
    ) -> Result<TransportResponse, TransportError>;
}

#[cfg(test)]
mock! {
    pub Transport {}

    impl Clone for Transport {
        fn clone(&self) -> Self;
    }

    #[async_trait]
    impl Transport for Transport {
        async fn post(
            &self,
            path: &str,
            format: ResponseFormat,
            payload: &Payload,
        ) -> Result<TransportResponse, TransportError>;
    }
}
