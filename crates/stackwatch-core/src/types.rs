//! Shared types used across stackwatch crates.

use std::time::Duration;

use serde::{Deserialize, Serialize};

// ── Services ──────────────────────────────────────────────────────

/// Slack added to a wait budget for connection setup and scheduling.
pub const WAIT_GRACE: Duration = Duration::from_secs(1);

/// How a service is checked for readiness.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Probe {
    /// `GET url`, healthy on 2xx. With `expect_json`, the body must
    /// also parse as JSON.
    Http {
        url: String,
        #[serde(default)]
        expect_json: bool,
    },
    /// Healthy if a TCP connection to `address` (host:port) succeeds.
    Tcp { address: String },
}

impl Probe {
    /// Human-readable target, used in logs and reports.
    pub fn target(&self) -> &str {
        match self {
            Probe::Http { url, .. } => url,
            Probe::Tcp { address } => address,
        }
    }
}

/// An immutable description of one service in the stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceSpec {
    pub name: String,
    pub probe: Probe,
    /// Maximum number of probes before giving up. Always >= 1.
    pub max_attempts: u32,
    /// Delay between two consecutive probes.
    pub poll_interval: Duration,
    /// Timeout applied to each individual probe.
    pub probe_timeout: Duration,
    /// A mandatory service that never becomes healthy fails the run.
    pub mandatory: bool,
    /// Names of services that must be probed before this one.
    pub depends_on: Vec<String>,
}

impl ServiceSpec {
    /// Build a spec with default timings (30 attempts, 2s apart, 5s probe timeout).
    pub fn new(name: &str, probe: Probe) -> Self {
        Self {
            name: name.to_string(),
            probe,
            max_attempts: 30,
            poll_interval: Duration::from_secs(2),
            probe_timeout: Duration::from_secs(5),
            mandatory: true,
            depends_on: Vec::new(),
        }
    }

    pub fn with_attempts(mut self, max_attempts: u32, poll_interval: Duration) -> Self {
        self.max_attempts = max_attempts;
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    pub fn optional(mut self) -> Self {
        self.mandatory = false;
        self
    }

    pub fn depends_on(mut self, deps: &[&str]) -> Self {
        self.depends_on = deps.iter().map(|d| d.to_string()).collect();
        self
    }

    /// Upper bound for a whole wait loop on this service.
    ///
    /// Covers every probe timeout and the sleeps between them, plus one
    /// spare probe timeout and [`WAIT_GRACE`] so the final attempt is
    /// never cut short. Saturates at [`Duration::MAX`].
    pub fn wait_budget(&self) -> Duration {
        self.checked_wait_budget().unwrap_or(Duration::MAX)
    }

    /// [`wait_budget`](Self::wait_budget), or `None` if it overflows.
    pub fn checked_wait_budget(&self) -> Option<Duration> {
        let probes = self
            .probe_timeout
            .checked_mul(self.max_attempts)?
            .checked_add(self.probe_timeout)?;
        let sleeps = self
            .poll_interval
            .checked_mul(self.max_attempts.saturating_sub(1))?;
        probes.checked_add(sleeps)?.checked_add(WAIT_GRACE)
    }
}

/// Readiness state of a service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceState {
    /// Not yet probed, or still being polled.
    Pending,
    /// Probe succeeded. Terminal.
    Healthy,
    /// Last probe failed. Only produced by one-shot snapshots.
    Unhealthy,
    /// Every attempt failed. Terminal.
    TimedOut,
}

impl ServiceState {
    pub fn is_terminal(self) -> bool {
        matches!(self, ServiceState::Healthy | ServiceState::TimedOut)
    }

    pub fn label(self) -> &'static str {
        match self {
            ServiceState::Pending => "pending",
            ServiceState::Healthy => "healthy",
            ServiceState::Unhealthy => "unhealthy",
            ServiceState::TimedOut => "timed out",
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            ServiceState::Healthy => "✓",
            ServiceState::Pending => "…",
            ServiceState::Unhealthy | ServiceState::TimedOut => "✗",
        }
    }
}

/// Observed status of one service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceStatus {
    pub name: String,
    pub state: ServiceState,
    /// Number of probes performed so far.
    pub attempts: u32,
    pub mandatory: bool,
}

impl ServiceStatus {
    pub fn pending(spec: &ServiceSpec) -> Self {
        Self {
            name: spec.name.clone(),
            state: ServiceState::Pending,
            attempts: 0,
            mandatory: spec.mandatory,
        }
    }

    /// Whether this status should fail the overall run.
    pub fn is_blocking(&self) -> bool {
        self.mandatory && self.state != ServiceState::Healthy
    }
}

// ── Metrics ───────────────────────────────────────────────────────

/// Outcome of querying one metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub metric_name: String,
    pub present: bool,
    pub sample_value: Option<f64>,
}

impl ValidationResult {
    pub fn absent(metric_name: &str) -> Self {
        Self {
            metric_name: metric_name.to_string(),
            present: false,
            sample_value: None,
        }
    }
}

// ── Load ──────────────────────────────────────────────────────────

/// Tally of a load-generation run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadReport {
    pub requested: u64,
    pub succeeded: u64,
    pub failed: u64,
    #[serde(with = "millis")]
    pub elapsed: Duration,
}

impl LoadReport {
    pub fn completed(&self) -> u64 {
        self.succeeded + self.failed
    }

    pub fn record(&mut self, ok: bool) {
        if ok {
            self.succeeded += 1;
        } else {
            self.failed += 1;
        }
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}
