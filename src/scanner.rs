use futures::{stream, Stream, StreamExt};
use http::header::{HeaderMap, HeaderValue};
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use url::Url;

use crate::transport::{ProbeError, ProbeRequest, ProbeResponse, ReqwestTransport, Transport};

/// Routing fields read by the edge function in front of the origin. Sent as
/// request headers or as query parameters, depending on the encoding.
pub const ORIGIN_FIELD: &str = "cdn-proxy-origin";
pub const HOST_FIELD: &str = "cdn-proxy-host";

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("at most one routing hostname is supported, got {0}")]
    InvalidConfig(usize),
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// How the routing fields travel to the distribution. Some calling contexts
/// cannot set arbitrary request headers, the edge function accepts the same
/// fields as query parameters for those.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Headers,
    QueryString,
}

impl FromStr for Encoding {
    type Err = String;

    fn from_str(s: &str) -> Result<Encoding, String> {
        match s {
            "header" | "headers" => Ok(Encoding::Headers),
            "query" => Ok(Encoding::QueryString),
            other => Err(format!(
                "unknown encoding {:?}, expected \"header\" or \"query\"",
                other
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScannerConfig {
    pub endpoint: Url,
    pub hostnames: Vec<String>,
    pub encoding: Encoding,
    pub workers: usize,
}

/// Outcome of a single probe. `outcome` is `Ok` for any HTTP response the
/// distribution returned, whatever the status; `Err` only when the transport
/// itself failed.
#[derive(Debug)]
pub struct ProbeResult {
    pub origin: String,
    pub outcome: Result<ProbeResponse, ProbeError>,
}

pub struct Scanner {
    endpoint: Url,
    hostname: Option<String>,
    encoding: Encoding,
    workers: usize,
    transport: Arc<dyn Transport>,
}

impl Scanner {
    pub fn new(config: ScannerConfig) -> Result<Scanner, ScanError> {
        let transport = Arc::new(ReqwestTransport::new()?);
        Scanner::with_transport(config, transport)
    }

    pub fn with_transport(
        config: ScannerConfig,
        transport: Arc<dyn Transport>,
    ) -> Result<Scanner, ScanError> {
        let mut hostnames = config.hostnames;
        if hostnames.len() > 1 {
            return Err(ScanError::InvalidConfig(hostnames.len()));
        }

        Ok(Scanner {
            endpoint: config.endpoint,
            hostname: hostnames.pop(),
            encoding: config.encoding,
            workers: config.workers.max(1),
            transport,
        })
    }

    fn build_request(&self, target: &str) -> Result<ProbeRequest, ProbeError> {
        let host = self.hostname.as_deref().unwrap_or(target);

        let mut url = self.endpoint.clone();
        let mut headers = HeaderMap::new();
        match self.encoding {
            Encoding::Headers => {
                headers.insert(
                    ORIGIN_FIELD,
                    HeaderValue::from_str(target)
                        .map_err(|_| ProbeError::InvalidTarget(target.to_string()))?,
                );
                headers.insert(
                    HOST_FIELD,
                    HeaderValue::from_str(host)
                        .map_err(|_| ProbeError::InvalidTarget(host.to_string()))?,
                );
            }
            Encoding::QueryString => {
                url.query_pairs_mut()
                    .append_pair(ORIGIN_FIELD, target)
                    .append_pair(HOST_FIELD, host);
            }
        }

        Ok(ProbeRequest { url, headers })
    }

    /// Sends one probe through the distribution. `cdn-proxy-origin` names the
    /// backend to reach; `cdn-proxy-host` is the Host header forwarded to it,
    /// falling back to the target itself when no override is configured.
    pub async fn probe(&self, target: &str) -> Result<ProbeResponse, ProbeError> {
        let request = self.build_request(target)?;
        self.transport.send(request).await
    }

    /// Probes every target, submitting in input order with at most `workers`
    /// in flight. Results are yielded in completion order; one target failing
    /// never disturbs the others.
    pub fn scan(&self, targets: Vec<String>) -> impl Stream<Item = ProbeResult> + '_ {
        stream::iter(targets)
            .map(move |origin| async move {
                let outcome = self.probe(&origin).await;
                ProbeResult { origin, outcome }
            })
            .buffer_unordered(self.workers)
    }
}
