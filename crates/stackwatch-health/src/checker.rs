//! Health check probe logic.
//!
//! A probe is a single request/response exchange against a service.
//! Failures never escape this module as errors: they are folded into a
//! [`ProbeResult`] so that the wait loop can count them as attempts.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use stackwatch_core::http::{get, parse_http_url};
use stackwatch_core::{Probe, ServiceSpec, ServiceState, ServiceStatus};

/// Result of a single health probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeResult {
    /// The service answered and satisfied its predicate.
    Healthy,
    /// The service answered non-2xx, or the body failed the predicate.
    Unhealthy,
    /// The probe could not be executed (connection error, timeout).
    Failed,
}

impl ProbeResult {
    pub fn is_healthy(self) -> bool {
        self == ProbeResult::Healthy
    }
}

/// Performs probes on behalf of the wait loop.
pub trait Prober: Sync {
    fn probe(&self, spec: &ServiceSpec) -> impl Future<Output = ProbeResult> + Send;
}

/// Probes services over the network, honoring each spec's probe timeout.
#[derive(Debug, Clone, Copy, Default)]
pub struct NetworkProber;

impl Prober for NetworkProber {
    fn probe(&self, spec: &ServiceSpec) -> impl Future<Output = ProbeResult> + Send {
        let probe = spec.probe.clone();
        let timeout = spec.probe_timeout;
        async move {
            match &probe {
                Probe::Http { url, expect_json } => http_probe(url, *expect_json, timeout).await,
                Probe::Tcp { address } => tcp_probe(address, timeout).await,
            }
        }
    }
}

/// Perform an HTTP health probe against `url`.
///
/// Returns `Healthy` if the response is 2xx (and, with `expect_json`,
/// the body parses as JSON), `Unhealthy` otherwise, or `Failed` if the
/// request could not complete.
pub async fn http_probe(url: &str, expect_json: bool, timeout: Duration) -> ProbeResult {
    let uri = match parse_http_url(url) {
        Ok(uri) => uri,
        Err(e) => {
            warn!(error = %e, %url, "health probe has an invalid url");
            return ProbeResult::Failed;
        }
    };

    match get(&uri, timeout).await {
        Ok(resp) if !resp.is_success() => {
            debug!(status = %resp.status, %url, "health probe non-2xx");
            ProbeResult::Unhealthy
        }
        Ok(resp) if expect_json => {
            if serde_json::from_slice::<serde_json::Value>(&resp.body).is_ok() {
                ProbeResult::Healthy
            } else {
                debug!(%url, "health probe body is not json");
                ProbeResult::Unhealthy
            }
        }
        Ok(_) => ProbeResult::Healthy,
        Err(e) => {
            debug!(error = %e, %url, "health probe failed");
            ProbeResult::Failed
        }
    }
}

/// Perform a TCP connect probe against `address` (host:port).
pub async fn tcp_probe(address: &str, timeout: Duration) -> ProbeResult {
    match tokio::time::timeout(timeout, tokio::net::TcpStream::connect(address)).await {
        Ok(Ok(_)) => ProbeResult::Healthy,
        Ok(Err(e)) => {
            debug!(error = %e, %address, "tcp probe connection failed");
            ProbeResult::Failed
        }
        Err(_) => {
            debug!(%address, "tcp probe timed out");
            ProbeResult::Failed
        }
    }
}

/// Tracks the attempts made for one service and owns its status.
///
/// The status moves from `Pending` to `Healthy` or `TimedOut` exactly
/// once; results recorded after that are ignored.
#[derive(Debug)]
pub struct AttemptTracker {
    status: ServiceStatus,
    max_attempts: u32,
}

impl AttemptTracker {
    pub fn new(spec: &ServiceSpec) -> Self {
        Self {
            status: ServiceStatus::pending(spec),
            max_attempts: spec.max_attempts,
        }
    }

    /// Record a probe result and return the resulting state.
    pub fn record(&mut self, result: ProbeResult) -> ServiceState {
        if self.status.state.is_terminal() {
            return self.status.state;
        }

        self.status.attempts += 1;

        if result.is_healthy() {
            debug!(
                service = %self.status.name,
                attempts = self.status.attempts,
                "service became healthy"
            );
            self.status.state = ServiceState::Healthy;
        } else if self.status.attempts >= self.max_attempts {
            warn!(
                service = %self.status.name,
                attempts = self.status.attempts,
                "service never became healthy"
            );
            self.status.state = ServiceState::TimedOut;
        }

        self.status.state
    }

    /// Give up early, e.g. when the overall wait budget elapsed.
    pub fn expire(&mut self) -> ServiceState {
        if !self.status.state.is_terminal() {
            self.status.state = ServiceState::TimedOut;
        }
        self.status.state
    }

    pub fn state(&self) -> ServiceState {
        self.status.state
    }

    pub fn attempts(&self) -> u32 {
        self.status.attempts
    }

    pub fn into_status(self) -> ServiceStatus {
        self.status
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stackwatch_core::testing::{MockResponse, MockServer};

    fn spec(max_attempts: u32) -> ServiceSpec {
        ServiceSpec::new(
            "app",
            Probe::Tcp {
                address: "localhost:3000".into(),
            },
        )
        .with_attempts(max_attempts, Duration::from_millis(1))
    }

    #[test]
    fn tracker_starts_pending() {
        let tracker = AttemptTracker::new(&spec(3));
        assert_eq!(tracker.state(), ServiceState::Pending);
        assert_eq!(tracker.attempts(), 0);
    }

    #[test]
    fn tracker_becomes_healthy_on_first_success() {
        let mut tracker = AttemptTracker::new(&spec(3));
        assert_eq!(tracker.record(ProbeResult::Healthy), ServiceState::Healthy);
        assert_eq!(tracker.attempts(), 1);
    }

    #[test]
    fn tracker_stays_pending_under_budget() {
        let mut tracker = AttemptTracker::new(&spec(3));
        assert_eq!(tracker.record(ProbeResult::Unhealthy), ServiceState::Pending);
        assert_eq!(tracker.record(ProbeResult::Failed), ServiceState::Pending);
        assert_eq!(tracker.attempts(), 2);
    }

    #[test]
    fn tracker_times_out_when_budget_is_spent() {
        let mut tracker = AttemptTracker::new(&spec(3));
        tracker.record(ProbeResult::Failed);
        tracker.record(ProbeResult::Unhealthy);
        assert_eq!(tracker.record(ProbeResult::Failed), ServiceState::TimedOut);
        assert_eq!(tracker.attempts(), 3);
    }

    #[test]
    fn terminal_states_never_regress() {
        let mut tracker = AttemptTracker::new(&spec(1));
        assert_eq!(tracker.record(ProbeResult::Failed), ServiceState::TimedOut);
        assert_eq!(tracker.record(ProbeResult::Healthy), ServiceState::TimedOut);
        assert_eq!(tracker.attempts(), 1);

        let mut tracker = AttemptTracker::new(&spec(3));
        tracker.record(ProbeResult::Healthy);
        assert_eq!(tracker.record(ProbeResult::Failed), ServiceState::Healthy);
        assert_eq!(tracker.expire(), ServiceState::Healthy);
        assert_eq!(tracker.attempts(), 1);
    }

    #[test]
    fn expire_times_out_pending_service() {
        let mut tracker = AttemptTracker::new(&spec(5));
        tracker.record(ProbeResult::Failed);
        assert_eq!(tracker.expire(), ServiceState::TimedOut);
        assert_eq!(tracker.into_status().attempts, 1);
    }

    #[tokio::test]
    async fn http_probe_healthy_on_2xx() {
        let server = MockServer::always("ok").await;
        let result = http_probe(&server.url("/health"), false, Duration::from_secs(1)).await;
        assert_eq!(result, ProbeResult::Healthy);
    }

    #[tokio::test]
    async fn http_probe_unhealthy_on_503() {
        let server = MockServer::start(|_, _| {
            MockResponse::status(http::StatusCode::SERVICE_UNAVAILABLE, "starting")
        })
        .await;
        let result = http_probe(&server.url("/health"), false, Duration::from_secs(1)).await;
        assert_eq!(result, ProbeResult::Unhealthy);
    }

    #[tokio::test]
    async fn http_probe_checks_json_body() {
        let server = MockServer::always("<html>maintenance</html>").await;
        let result = http_probe(&server.url("/health"), true, Duration::from_secs(1)).await;
        assert_eq!(result, ProbeResult::Unhealthy);

        let server = MockServer::always(r#"{"status":"ok","database":"connected"}"#).await;
        let result = http_probe(&server.url("/health"), true, Duration::from_secs(1)).await;
        assert_eq!(result, ProbeResult::Healthy);
    }

    #[tokio::test]
    async fn http_probe_fails_without_listener() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let url = format!("http://127.0.0.1:{port}/health");
        let result = http_probe(&url, false, Duration::from_secs(1)).await;
        assert_eq!(result, ProbeResult::Failed);
    }

    #[tokio::test]
    async fn tcp_probe_connects() {
        let server = MockServer::always("").await;
        let result = tcp_probe(&server.addr().to_string(), Duration::from_secs(1)).await;
        assert_eq!(result, ProbeResult::Healthy);
    }

    #[tokio::test]
    async fn network_prober_dispatches_on_probe_kind() {
        let server = MockServer::always("{}").await;
        let http_spec = ServiceSpec::new(
            "app",
            Probe::Http {
                url: server.url("/health"),
                expect_json: true,
            },
        );
        let tcp_spec = ServiceSpec::new(
            "db",
            Probe::Tcp {
                address: server.addr().to_string(),
            },
        );

        assert_eq!(NetworkProber.probe(&http_spec).await, ProbeResult::Healthy);
        assert_eq!(NetworkProber.probe(&tcp_spec).await, ProbeResult::Healthy);
        assert_eq!(server.hits(), 1);
    }
}
