//! Bounded readiness waits.
//!
//! [`wait_for_healthy`] polls one service until it is healthy or its
//! attempt budget is spent. [`run_startup_sequence`] walks an ordered
//! list of services strictly one after another, so a service is only
//! probed once everything declared before it has reached a terminal state.

use std::time::Instant;

use tracing::{debug, info, warn};

use stackwatch_core::{ServiceSpec, ServiceState, ServiceStatus};

use crate::checker::{AttemptTracker, ProbeResult, Prober};

/// Poll `spec` until it is healthy or `max_attempts` probes have failed.
///
/// Never fails: exhaustion is reported as [`ServiceState::TimedOut`] and
/// left to the caller to act on. The whole loop is additionally bounded
/// by [`ServiceSpec::wait_budget`], which leaves room for the final probe
/// to run out its own timeout.
pub async fn wait_for_healthy<P: Prober>(spec: &ServiceSpec, prober: &P) -> ServiceStatus {
    let mut tracker = AttemptTracker::new(spec);
    let budget = spec.wait_budget();
    let started = Instant::now();

    info!(
        service = %spec.name,
        target = %spec.probe.target(),
        max_attempts = spec.max_attempts,
        interval = ?spec.poll_interval,
        "waiting for service"
    );

    let poll = async {
        loop {
            let result = prober.probe(spec).await;
            let state = tracker.record(result);
            if state.is_terminal() {
                break;
            }
            debug!(
                service = %spec.name,
                attempt = tracker.attempts(),
                ?result,
                "service not ready yet"
            );
            tokio::time::sleep(spec.poll_interval).await;
        }
    };

    let outcome = tokio::time::timeout(budget, poll).await;
    if outcome.is_err() {
        warn!(service = %spec.name, ?budget, "wait budget exhausted");
        tracker.expire();
    }

    let status = tracker.into_status();
    match status.state {
        ServiceState::Healthy => info!(
            service = %status.name,
            attempts = status.attempts,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "service healthy"
        ),
        _ => warn!(
            service = %status.name,
            attempts = status.attempts,
            mandatory = status.mandatory,
            "service timed out"
        ),
    }
    status
}

/// Wait for every service in `specs`, in order.
///
/// Each wait runs to completion before the next begins. A timed-out
/// service does not stop the sequence: later services are still
/// attempted and every status is returned.
pub async fn run_startup_sequence<P: Prober>(
    specs: &[ServiceSpec],
    prober: &P,
) -> Vec<ServiceStatus> {
    let mut statuses: Vec<ServiceStatus> = Vec::with_capacity(specs.len());

    for spec in specs {
        let unready: Vec<&str> = spec
            .depends_on
            .iter()
            .filter(|dep| {
                !statuses
                    .iter()
                    .any(|s| &s.name == *dep && s.state == ServiceState::Healthy)
            })
            .map(String::as_str)
            .collect();
        if !unready.is_empty() {
            warn!(
                service = %spec.name,
                dependencies = ?unready,
                "probing service whose dependencies are not healthy"
            );
        }

        statuses.push(wait_for_healthy(spec, prober).await);
    }

    let healthy = statuses
        .iter()
        .filter(|s| s.state == ServiceState::Healthy)
        .count();
    info!(healthy, total = statuses.len(), "startup sequence finished");

    statuses
}

/// Probe each service once, without waiting.
///
/// Yields `Healthy` or `Unhealthy` per service; used for status reports.
pub async fn snapshot<P: Prober>(specs: &[ServiceSpec], prober: &P) -> Vec<ServiceStatus> {
    let mut statuses = Vec::with_capacity(specs.len());
    for spec in specs {
        let result = prober.probe(spec).await;
        let mut status = ServiceStatus::pending(spec);
        status.attempts = 1;
        status.state = if result == ProbeResult::Healthy {
            ServiceState::Healthy
        } else {
            ServiceState::Unhealthy
        };
        debug!(service = %spec.name, state = status.state.label(), "snapshot probe");
        statuses.push(status);
    }
    statuses
}
