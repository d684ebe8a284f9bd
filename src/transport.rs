use async_trait::async_trait;
use http::header::{HeaderMap, LOCATION};
use http::StatusCode;
use reqwest::redirect::Policy;
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("network failure: {0}")]
    Network(String),
    #[error("target {0:?} is not usable in a request")]
    InvalidTarget(String),
}

/// One outbound probe, fully built: the final URL plus any routing headers.
#[derive(Debug, Clone)]
pub struct ProbeRequest {
    pub url: Url,
    pub headers: HeaderMap,
}

#[derive(Debug, Clone)]
pub struct ProbeResponse {
    pub status: StatusCode,
    pub location: Option<String>,
    pub content_length: Option<u64>,
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: ProbeRequest) -> Result<ProbeResponse, ProbeError>;
}

pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Redirects are left unfollowed so the raw 3xx from the distribution
    /// stays visible to the caller. Certificate validation is off, origins
    /// probed by address rarely carry a matching certificate.
    pub fn new() -> Result<ReqwestTransport, reqwest::Error> {
        let client = Client::builder()
            .redirect(Policy::none())
            .danger_accept_invalid_certs(true)
            .timeout(Duration::from_secs(15))
            .build()?;

        Ok(ReqwestTransport { client })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: ProbeRequest) -> Result<ProbeResponse, ProbeError> {
        let resp = self
            .client
            .get(request.url)
            .headers(request.headers)
            .send()
            .await
            .map_err(|e| ProbeError::Network(e.to_string()))?;

        let location = resp
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        Ok(ProbeResponse {
            status: resp.status(),
            location,
            content_length: resp.content_length(),
        })
    }
}
