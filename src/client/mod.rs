//! Generation service client — submit a job, poll for its result.
//!
//! Stateless on the client side: no job registry is kept. The document
//! identifier is the only handle, and completion is discovered by re-querying.

pub mod error;
pub mod types;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

pub use error::{ClientError, ClientResult};
pub use types::{GenerationResult, GenerationStatus, SubmitRequest};

/// The remote generation service as the workflow sees it.
///
/// `RequestClient` is the HTTP implementation; tests inject scripted fakes.
#[async_trait]
pub trait GenerationService: Send + Sync {
    /// Submit a generation job. `identifier` suffixes the endpoint when present.
    async fn submit(
        &self,
        identifier: Option<&str>,
        request: &SubmitRequest,
    ) -> ClientResult<GenerationResult>;

    /// Fetch the current status of a previously submitted job.
    async fn poll(&self, identifier: Option<&str>) -> ClientResult<GenerationResult>;
}

/// HTTP client for the generation service.
#[derive(Debug, Clone)]
pub struct RequestClient {
    http: Client,
    endpoint: String,
    timeout: Duration,
}

impl RequestClient {
    /// Create a client for `endpoint` with a hard per-request timeout.
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> ClientResult<Self> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            timeout,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// `<endpoint>[/<identifier>]`
    fn url_for(&self, identifier: Option<&str>) -> String {
        match identifier {
            Some(id) => format!("{}/{id}", self.endpoint),
            None => self.endpoint.clone(),
        }
    }

    /// Check status, read the body, decode. Shared by submit and poll.
    async fn read_response(response: reqwest::Response) -> ClientResult<GenerationResult> {
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_else(|_| "(no body)".into());
            return Err(ClientError::ServerError {
                status: status.as_u16(),
                message: body,
            });
        }

        let body = response.text().await.map_err(ClientError::from_reqwest)?;
        types::decode_response(&body)
    }
}

#[async_trait]
impl GenerationService for RequestClient {
    async fn submit(
        &self,
        identifier: Option<&str>,
        request: &SubmitRequest,
    ) -> ClientResult<GenerationResult> {
        let url = self.url_for(identifier);
        debug!(%url, bytes = request.code.len(), "submitting generation job");

        let response = self
            .http
            .post(&url)
            .header("content-type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(ClientError::from_reqwest)?;

        Self::read_response(response).await
    }

    async fn poll(&self, identifier: Option<&str>) -> ClientResult<GenerationResult> {
        let url = self.url_for(identifier);
        debug!(%url, "polling generation job");

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(ClientError::from_reqwest)?;

        Self::read_response(response).await
    }
}
