use prettytable::{Cell, Row, Table};
use serde::Serialize;
use std::fmt;

use crate::scanner::ProbeResult;
use crate::transport::ProbeResponse;

/// State of the origin behind the distribution, judged from the proxied
/// response. CloudFront answers 502 when the origin closed the connection
/// and 504 when nothing answered, so those codes describe the origin rather
/// than the edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceState {
    Open,
    AccessDenied,
    Closed,
    Filtered,
    ProxyError,
    Unknown,
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ServiceState::Open => "open",
            ServiceState::AccessDenied => "access denied",
            ServiceState::Closed => "closed",
            ServiceState::Filtered => "filtered",
            ServiceState::ProxyError => "proxy error",
            ServiceState::Unknown => "unknown",
        })
    }
}

pub fn classify(response: &ProbeResponse) -> ServiceState {
    match response.status.as_u16() {
        403 => ServiceState::AccessDenied,
        502 => ServiceState::Closed,
        504 => ServiceState::Filtered,
        200..=499 => ServiceState::Open,
        _ => ServiceState::Unknown,
    }
}

#[derive(Debug, Serialize)]
pub struct ProbeRecord {
    pub origin: String,
    pub state: ServiceState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_length: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&ProbeResult> for ProbeRecord {
    fn from(result: &ProbeResult) -> ProbeRecord {
        match &result.outcome {
            Ok(response) => ProbeRecord {
                origin: result.origin.clone(),
                state: classify(response),
                status: Some(response.status.as_u16()),
                location: response.location.clone(),
                content_length: response.content_length,
                error: None,
            },
            Err(err) => ProbeRecord {
                origin: result.origin.clone(),
                state: ServiceState::ProxyError,
                status: None,
                location: None,
                content_length: None,
                error: Some(err.to_string()),
            },
        }
    }
}

pub fn render_table(records: &[ProbeRecord]) -> Table {
    let mut table = Table::new();
    table.set_titles(Row::new(vec![
        Cell::new("target"),
        Cell::new("state"),
        Cell::new("status"),
        Cell::new("detail"),
    ]));

    for record in records {
        let status = record
            .status
            .map(|s| s.to_string())
            .unwrap_or_else(|| "-".to_string());
        let detail = record
            .location
            .as_deref()
            .or_else(|| record.error.as_deref())
            .unwrap_or("");

        table.add_row(Row::new(vec![
            Cell::new(&record.origin),
            Cell::new(&record.state.to_string()),
            Cell::new(&status),
            Cell::new(detail),
        ]));
    }

    table
}

pub fn render_json(records: &[ProbeRecord]) -> serde_json::Result<String> {
    serde_json::to_string_pretty(records)
}
