//! Error types for stackwatch.
//!
//! Configuration errors are fatal and raised before any network I/O.
//! Transport errors are transient: callers fold them into a failed probe,
//! a failed load request or an absent metric.

use thiserror::Error;

/// Result type alias for configuration handling.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Malformed input to the orchestrator.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("no services configured")]
    NoServices,

    #[error("invalid url {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("unsupported scheme in {0:?} (only http:// is supported)")]
    UnsupportedScheme(String),

    #[error("service {0:?}: max_attempts must be at least 1")]
    ZeroAttempts(String),

    #[error("load concurrency must be at least 1")]
    ZeroConcurrency,

    #[error("no load targets configured")]
    NoTargets,

    #[error("duplicate service name {0:?}")]
    DuplicateService(String),

    #[error("service {service:?} depends on unknown service {dependency:?}")]
    UnknownDependency { service: String, dependency: String },

    #[error("dependency cycle between services: {}", .0.join(", "))]
    DependencyCycle(Vec<String>),

    #[error("invalid duration {0:?}")]
    InvalidDuration(String),
}

/// A single request that could not complete.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connect to {address} failed: {source}")]
    Connect {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("http handshake failed: {0}")]
    Handshake(#[source] hyper::Error),

    #[error("request failed: {0}")]
    Request(#[source] hyper::Error),

    #[error("failed to read response body: {0}")]
    Body(#[source] hyper::Error),

    #[error("timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("failed to build request: {0}")]
    Build(#[from] http::Error),
}
