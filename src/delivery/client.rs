//! HTTP transport for the spreadsheet endpoint (a deployed web-app script).
//!
//! The endpoint appends a row and answers `{success, message|error, timestamp}`.
//! In opaque mode the reply is never read: any completed call is `Presumed`.

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::transport::{Encoding, RemoteTransport, TransportError};
use crate::config::EndpointConfig;
use crate::types::{DeliveryOutcome, Submission};

/// Reply body written by the endpoint script.
#[derive(Debug, Deserialize)]
struct SinkReply {
    success: bool,
    #[serde(default)]
    error: Option<String>,
}

/// reqwest-backed [`RemoteTransport`].
#[derive(Clone)]
pub struct HttpTransport {
    http: reqwest::Client,
    url: String,
    opaque: bool,
}

impl HttpTransport {
    /// Build a transport for the configured endpoint.
    ///
    /// Fails with [`TransportError::NotConfigured`] when delivery is switched off.
    pub fn new(config: &EndpointConfig) -> Result<Self, TransportError> {
        let url = config.active_url().ok_or(TransportError::NotConfigured)?;
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| TransportError::Http(e.to_string()))?;

        Ok(Self {
            http,
            url: url.to_string(),
            opaque: config.opaque_responses,
        })
    }

    fn map_send_error(&self, err: &reqwest::Error) -> TransportError {
        if err.is_timeout() {
            TransportError::Http(format!("request to {} timed out", self.url))
        } else {
            TransportError::Http(err.to_string())
        }
    }
}

/// Interpret an endpoint reply.
fn classify(status: u16, body: &[u8], opaque: bool) -> Result<DeliveryOutcome, TransportError> {
    if opaque {
        return Ok(DeliveryOutcome::Presumed);
    }
    if !(200..300).contains(&status) {
        return Err(TransportError::Status(status));
    }
    match serde_json::from_slice::<SinkReply>(body) {
        Ok(SinkReply { success: true, .. }) => Ok(DeliveryOutcome::Confirmed),
        Ok(SinkReply { success: false, error }) => Err(TransportError::Rejected(
            error.unwrap_or_else(|| "no reason given".to_string()),
        )),
        Err(_) => Ok(DeliveryOutcome::Presumed),
    }
}

#[async_trait]
impl RemoteTransport for HttpTransport {
    async fn deliver(
        &self,
        submission: &Submission,
        encoding: Encoding,
        cancel: CancellationToken,
    ) -> Result<DeliveryOutcome, TransportError> {
        let document = serde_json::to_string(submission)
            .map_err(|e| TransportError::Serialization(e.to_string()))?;

        let request = match encoding {
            Encoding::Json => self
                .http
                .post(&self.url)
                .header(CONTENT_TYPE, "application/json")
                .body(document),
            Encoding::FormField => self.http.post(&self.url).form(&[("data", document)]),
        };

        let exchange = async {
            let response = request.send().await.map_err(|e| self.map_send_error(&e))?;
            let status = response.status().as_u16();
            if self.opaque {
                return Ok((status, Vec::new()));
            }
            let body = response
                .bytes()
                .await
                .map_err(|e| self.map_send_error(&e))?;
            Ok::<_, TransportError>((status, body.to_vec()))
        };

        let (status, body) = tokio::select! {
            () = cancel.cancelled() => return Err(TransportError::Cancelled),
            result = exchange => result?,
        };

        debug!(status, encoding = encoding.as_str(), "Endpoint replied");
        classify(status, &body, self.opaque)
    }

    async fn probe(&self) -> Result<(), TransportError> {
        // Any HTTP answer, whatever the status, means the endpoint is reachable
        self.http
            .get(&self.url)
            .send()
            .await
            .map(|_| ())
            .map_err(|e| self.map_send_error(&e))
    }
}
