//! stackwatch.toml configuration parser.
//!
//! Everything here is validated up front: a malformed URL, an empty
//! service list or a zero attempt budget is a [`ConfigError`] raised
//! before the orchestrator touches the network.

use std::path::Path;
use std::time::Duration;

use http::Uri;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{ConfigError, ConfigResult};
use crate::http::{parse_http_url, parse_tcp_address};
use crate::types::{Probe, ServiceSpec};

/// Default config file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "stackwatch.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackConfig {
    #[serde(default)]
    pub compose: ComposeConfig,
    #[serde(default)]
    pub defaults: ProbeDefaults,
    #[serde(default)]
    pub services: Vec<ServiceConfig>,
    #[serde(default)]
    pub load: LoadConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComposeConfig {
    /// Program and leading arguments, e.g. `["docker", "compose"]`.
    #[serde(default = "default_compose_command")]
    pub command: Vec<String>,
    #[serde(default = "default_compose_file")]
    pub file: String,
    pub project_name: Option<String>,
    /// Pass `--build` to `up`.
    #[serde(default)]
    pub build: bool,
}

/// Probe timings applied to services that do not override them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeDefaults {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_poll_interval")]
    pub poll_interval: String,
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub probe: Probe,
    pub max_attempts: Option<u32>,
    pub poll_interval: Option<String>,
    pub probe_timeout: Option<String>,
    #[serde(default = "default_true")]
    pub mandatory: bool,
    #[serde(default)]
    pub depends_on: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadConfig {
    #[serde(default)]
    pub targets: Vec<String>,
    #[serde(default = "default_requests")]
    pub requests: u32,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_probe_timeout")]
    pub timeout: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Base URL of the Prometheus server.
    #[serde(default = "default_query_endpoint")]
    pub query_endpoint: String,
    #[serde(default)]
    pub names: Vec<String>,
    #[serde(default = "default_probe_timeout")]
    pub timeout: String,
    /// Delay between load generation and validation, giving the
    /// scraper time to pick up fresh samples.
    #[serde(default = "default_settle")]
    pub settle: String,
}

fn default_compose_command() -> Vec<String> {
    vec!["docker-compose".to_string()]
}

fn default_compose_file() -> String {
    "docker-compose.yml".to_string()
}

fn default_max_attempts() -> u32 {
    30
}

fn default_poll_interval() -> String {
    "2s".to_string()
}

fn default_probe_timeout() -> String {
    "5s".to_string()
}

fn default_true() -> bool {
    true
}

fn default_requests() -> u32 {
    100
}

fn default_concurrency() -> usize {
    10
}

fn default_query_endpoint() -> String {
    "http://localhost:9090".to_string()
}

fn default_settle() -> String {
    "15s".to_string()
}

impl Default for ComposeConfig {
    fn default() -> Self {
        Self {
            command: default_compose_command(),
            file: default_compose_file(),
            project_name: None,
            build: false,
        }
    }
}

impl Default for ProbeDefaults {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            poll_interval: default_poll_interval(),
            probe_timeout: default_probe_timeout(),
        }
    }
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            targets: Vec::new(),
            requests: default_requests(),
            concurrency: default_concurrency(),
            timeout: default_probe_timeout(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            query_endpoint: default_query_endpoint(),
            names: Vec::new(),
            timeout: default_probe_timeout(),
            settle: default_settle(),
        }
    }
}

impl StackConfig {
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Read `path` if it exists, otherwise fall back to the demo stack.
    pub fn load_or_default(path: &Path) -> ConfigResult<Self> {
        if path.is_file() {
            let config = Self::from_file(path)?;
            info!(path = %path.display(), services = config.services.len(), "loaded stack config");
            Ok(config)
        } else {
            info!(path = %path.display(), "config not found, using built-in demo stack");
            Ok(Self::demo_stack())
        }
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Validate every service entry and resolve default timings.
    pub fn service_specs(&self) -> ConfigResult<Vec<ServiceSpec>> {
        if self.services.is_empty() {
            return Err(ConfigError::NoServices);
        }

        let default_interval = parse_duration(&self.defaults.poll_interval)?;
        let default_timeout = parse_duration(&self.defaults.probe_timeout)?;

        self.services
            .iter()
            .map(|svc| {
                validate_probe(&svc.probe)?;

                let max_attempts = svc.max_attempts.unwrap_or(self.defaults.max_attempts);
                if max_attempts == 0 {
                    return Err(ConfigError::ZeroAttempts(svc.name.clone()));
                }

                let poll_interval = match &svc.poll_interval {
                    Some(s) => parse_duration(s)?,
                    None => default_interval,
                };
                let probe_timeout = match &svc.probe_timeout {
                    Some(s) => parse_duration(s)?,
                    None => default_timeout,
                };

                let spec = ServiceSpec {
                    name: svc.name.clone(),
                    probe: svc.probe.clone(),
                    max_attempts,
                    poll_interval,
                    probe_timeout,
                    mandatory: svc.mandatory,
                    depends_on: svc.depends_on.clone(),
                };
                if spec.checked_wait_budget().is_none() {
                    return Err(ConfigError::InvalidDuration(format!(
                        "wait budget of service {:?} overflows",
                        spec.name
                    )));
                }
                Ok(spec)
            })
            .collect()
    }

    /// Rails app with postgres, redis, exporters, Prometheus, Alertmanager and Grafana.
    pub fn demo_stack() -> Self {
        let http = |url: &str, expect_json: bool| Probe::Http {
            url: url.to_string(),
            expect_json,
        };
        let tcp = |address: &str| Probe::Tcp {
            address: address.to_string(),
        };

        let services = vec![
            ServiceConfig::new("postgres", tcp("localhost:5432")),
            ServiceConfig::new("redis", tcp("localhost:6379")),
            ServiceConfig {
                max_attempts: Some(60),
                ..ServiceConfig::new("app", http("http://localhost:3000/health", true))
                    .depends_on(&["postgres", "redis"])
            },
            ServiceConfig::new("postgres-exporter", http("http://localhost:9187/metrics", false))
                .depends_on(&["postgres"])
                .optional(),
            ServiceConfig::new("redis-exporter", http("http://localhost:9121/metrics", false))
                .depends_on(&["redis"])
                .optional(),
            ServiceConfig::new("node-exporter", http("http://localhost:9100/metrics", false))
                .optional(),
            ServiceConfig::new("prometheus", http("http://localhost:9090/-/ready", false))
                .depends_on(&["app"]),
            ServiceConfig::new("alertmanager", http("http://localhost:9093/-/healthy", false))
                .depends_on(&["prometheus"])
                .optional(),
            ServiceConfig::new("grafana", http("http://localhost:3001/api/health", true))
                .depends_on(&["prometheus"])
                .optional(),
        ];

        Self {
            compose: ComposeConfig {
                project_name: Some("rails-monitoring".to_string()),
                build: true,
                ..ComposeConfig::default()
            },
            defaults: ProbeDefaults::default(),
            services,
            load: LoadConfig {
                targets: vec![
                    "http://localhost:3000/".to_string(),
                    "http://localhost:3000/health".to_string(),
                    "http://localhost:3000/api/users".to_string(),
                ],
                ..LoadConfig::default()
            },
            metrics: MetricsConfig {
                names: [
                    "up",
                    "rails_up",
                    "rails_requests_total",
                    "pg_up",
                    "redis_up",
                    "node_cpu_seconds_total",
                ]
                .into_iter()
                .map(String::from)
                .collect(),
                ..MetricsConfig::default()
            },
        }
    }
}

impl ServiceConfig {
    pub fn new(name: &str, probe: Probe) -> Self {
        Self {
            name: name.to_string(),
            probe,
            max_attempts: None,
            poll_interval: None,
            probe_timeout: None,
            mandatory: true,
            depends_on: Vec::new(),
        }
    }

    pub fn depends_on(mut self, deps: &[&str]) -> Self {
        self.depends_on = deps.iter().map(|d| d.to_string()).collect();
        self
    }

    pub fn optional(mut self) -> Self {
        self.mandatory = false;
        self
    }
}

impl LoadConfig {
    pub fn target_uris(&self) -> ConfigResult<Vec<Uri>> {
        if self.targets.is_empty() {
            return Err(ConfigError::NoTargets);
        }
        if self.concurrency == 0 {
            return Err(ConfigError::ZeroConcurrency);
        }
        self.targets.iter().map(|t| parse_http_url(t)).collect()
    }

    pub fn timeout(&self) -> ConfigResult<Duration> {
        parse_duration(&self.timeout)
    }
}

impl MetricsConfig {
    pub fn endpoint(&self) -> ConfigResult<Uri> {
        parse_http_url(&self.query_endpoint)
    }

    pub fn timeout(&self) -> ConfigResult<Duration> {
        parse_duration(&self.timeout)
    }

    pub fn settle(&self) -> ConfigResult<Duration> {
        parse_duration(&self.settle)
    }
}

fn validate_probe(probe: &Probe) -> ConfigResult<()> {
    match probe {
        Probe::Http { url, .. } => parse_http_url(url).map(|_| ()),
        Probe::Tcp { address } => parse_tcp_address(address).map(|_| ()),
    }
}

/// Parse a duration string like "5s", "500ms", "1m". A bare number is seconds.
pub fn parse_duration(s: &str) -> ConfigResult<Duration> {
    let trimmed = s.trim();
    let invalid = || ConfigError::InvalidDuration(s.to_string());

    let parsed = if let Some(ms) = trimmed.strip_suffix("ms") {
        ms.parse::<u64>().ok().map(Duration::from_millis)
    } else if let Some(secs) = trimmed.strip_suffix('s') {
        secs.parse::<u64>().ok().map(Duration::from_secs)
    } else if let Some(mins) = trimmed.strip_suffix('m') {
        mins.parse::<u64>()
            .ok()
            .and_then(|m| m.checked_mul(60))
            .map(Duration::from_secs)
    } else {
        trimmed.parse::<u64>().ok().map(Duration::from_secs)
    };

    parsed.ok_or_else(invalid)
}
