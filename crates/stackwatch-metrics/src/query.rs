//! Prometheus query API client.
//!
//! Issues instant queries against `GET <endpoint>/api/v1/query` and
//! decodes the JSON envelope. Validation is a pure read: one query per
//! metric, no retries.

use std::collections::BTreeMap;
use std::time::Duration;

use http::Uri;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use stackwatch_core::http::{get, parse_http_url};
use stackwatch_core::{ConfigError, TransportError, ValidationResult};

/// Why a query produced no usable answer.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("invalid query url: {0}")]
    Url(#[from] ConfigError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("query endpoint answered {0}")]
    Status(http::StatusCode),

    #[error("failed to decode query response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("query failed: {0}")]
    Api(String),
}

/// One series returned by an instant query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sample {
    pub labels: BTreeMap<String, String>,
    pub value: f64,
}

impl Sample {
    /// Render as `name{k="v",...} value`.
    pub fn display_line(&self) -> String {
        let name = self.labels.get("__name__").map(String::as_str).unwrap_or("");
        let labels: Vec<String> = self
            .labels
            .iter()
            .filter(|(k, _)| k.as_str() != "__name__")
            .map(|(k, v)| format!("{k}=\"{v}\""))
            .collect();
        if labels.is_empty() {
            format!("{name} {}", self.value)
        } else {
            format!("{name}{{{}}} {}", labels.join(","), self.value)
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    status: String,
    #[serde(default)]
    data: Option<ApiData>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "resultType", content = "result", rename_all = "lowercase")]
enum ApiData {
    Vector(Vec<VectorSeries>),
    Matrix(Vec<MatrixSeries>),
    Scalar((f64, String)),
    String((f64, String)),
}

#[derive(Debug, Deserialize)]
struct VectorSeries {
    #[serde(default)]
    metric: BTreeMap<String, String>,
    value: (f64, String),
}

#[derive(Debug, Deserialize)]
struct MatrixSeries {
    #[serde(default)]
    metric: BTreeMap<String, String>,
    values: Vec<(f64, String)>,
}

/// Build `<endpoint>/api/v1/query?query=<encoded>`.
pub fn query_url(endpoint: &Uri, query: &str) -> Result<Uri, ConfigError> {
    let scheme = endpoint.scheme_str().unwrap_or("http");
    let authority = endpoint.authority().map(|a| a.as_str()).unwrap_or("");
    let base = endpoint.path().trim_end_matches('/');
    parse_http_url(&format!(
        "{scheme}://{authority}{base}/api/v1/query?query={}",
        encode_query_value(query)
    ))
}

/// Percent-encode a query string value (RFC 3986 unreserved set kept as-is).
fn encode_query_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

/// Decode a query API body into samples.
pub fn parse_response(body: &[u8]) -> Result<Vec<Sample>, QueryError> {
    let resp: ApiResponse = serde_json::from_slice(body)?;
    if resp.status != "success" {
        return Err(QueryError::Api(
            resp.error.unwrap_or_else(|| format!("status {}", resp.status)),
        ));
    }

    let samples = match resp.data {
        None => Vec::new(),
        Some(ApiData::Vector(series)) => series
            .into_iter()
            .map(|s| Sample {
                labels: s.metric,
                value: parse_value(&s.value.1),
            })
            .collect(),
        Some(ApiData::Matrix(series)) => series
            .into_iter()
            .filter_map(|s| {
                let last = s.values.last()?;
                Some(Sample {
                    value: parse_value(&last.1),
                    labels: s.metric,
                })
            })
            .collect(),
        Some(ApiData::Scalar((_, value))) => vec![Sample {
            labels: BTreeMap::new(),
            value: parse_value(&value),
        }],
        // String results carry no numeric sample.
        Some(ApiData::String(_)) => Vec::new(),
    };

    Ok(samples)
}

fn parse_value(raw: &str) -> f64 {
    raw.parse::<f64>().unwrap_or(f64::NAN)
}

/// Run one instant query.
pub async fn query_samples(
    query: &str,
    endpoint: &Uri,
    timeout: Duration,
) -> Result<Vec<Sample>, QueryError> {
    let uri = query_url(endpoint, query)?;
    let resp = get(&uri, timeout).await?;
    if !resp.is_success() {
        return Err(QueryError::Status(resp.status));
    }
    parse_response(&resp.body)
}

/// Check that each metric has at least one series in Prometheus.
///
/// Every failure degrades to `present: false`; nothing is retried.
pub async fn validate_metrics(
    metric_names: &[String],
    query_endpoint: &Uri,
    timeout: Duration,
) -> Vec<ValidationResult> {
    let mut results = Vec::with_capacity(metric_names.len());

    for name in metric_names {
        let result = match query_samples(name, query_endpoint, timeout).await {
            Ok(samples) => ValidationResult {
                metric_name: name.clone(),
                present: !samples.is_empty(),
                sample_value: samples.first().map(|s| s.value),
            },
            Err(e) => {
                debug!(metric = %name, error = %e, "metric query failed");
                ValidationResult::absent(name)
            }
        };

        if result.present {
            debug!(metric = %name, sample = ?result.sample_value, "metric present");
        } else {
            warn!(metric = %name, "metric missing");
        }
        results.push(result);
    }

    let present = results.iter().filter(|r| r.present).count();
    info!(present, total = results.len(), "metrics validated");
    results
}
