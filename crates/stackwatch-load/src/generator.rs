//! Bounded fan-out load generation.
//!
//! Request `i` goes to `targets[i % targets.len()]`. A semaphore caps the
//! number of requests in flight; every spawned request is joined before
//! [`generate_load`] returns, so no background work outlives the call.
//! The [`LoadReport`] tally is owned and written by the joining loop alone.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use http::Uri;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use stackwatch_core::http::get;
use stackwatch_core::{ConfigError, ConfigResult, LoadReport};

/// Issues one load request and reports whether it succeeded.
pub trait RequestSender: Send + Sync + 'static {
    fn send(&self, target: &Uri) -> impl Future<Output = bool> + Send;
}

/// Plain `GET` over HTTP/1.1; 2xx counts as success, the body is discarded.
#[derive(Debug, Clone, Copy)]
pub struct HttpSender {
    timeout: Duration,
}

impl HttpSender {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl RequestSender for HttpSender {
    fn send(&self, target: &Uri) -> impl Future<Output = bool> + Send {
        let timeout = self.timeout;
        let target = target.clone();
        async move {
            match get(&target, timeout).await {
                Ok(resp) => resp.is_success(),
                Err(e) => {
                    debug!(error = %e, %target, "load request failed");
                    false
                }
            }
        }
    }
}

/// Issue `total_requests` GETs round-robin across `targets`, at most
/// `concurrency` at a time, and wait for all of them.
///
/// Individual failures are counted, never returned. Only an empty target
/// list or a zero concurrency limit is an error.
pub async fn generate_load<S: RequestSender>(
    targets: &[Uri],
    total_requests: u32,
    concurrency: usize,
    sender: Arc<S>,
) -> ConfigResult<LoadReport> {
    if targets.is_empty() {
        return Err(ConfigError::NoTargets);
    }
    if concurrency == 0 {
        return Err(ConfigError::ZeroConcurrency);
    }

    info!(
        requests = total_requests,
        concurrency,
        targets = targets.len(),
        "generating load"
    );

    let started = Instant::now();
    let semaphore = Arc::new(Semaphore::new(concurrency));
    let mut in_flight: JoinSet<bool> = JoinSet::new();
    let mut report = LoadReport {
        requested: u64::from(total_requests),
        ..LoadReport::default()
    };

    for i in 0..total_requests as usize {
        let Ok(permit) = semaphore.clone().acquire_owned().await else {
            break;
        };
        let target = targets[i % targets.len()].clone();
        let sender = sender.clone();

        in_flight.spawn(async move {
            let ok = sender.send(&target).await;
            drop(permit);
            ok
        });

        while let Some(joined) = in_flight.try_join_next() {
            tally(&mut report, joined);
        }
    }

    while let Some(joined) = in_flight.join_next().await {
        tally(&mut report, joined);
    }

    report.elapsed = started.elapsed();

    if report.failed > 0 {
        warn!(
            succeeded = report.succeeded,
            failed = report.failed,
            "some load requests failed"
        );
    }
    info!(
        succeeded = report.succeeded,
        failed = report.failed,
        elapsed_ms = report.elapsed.as_millis() as u64,
        "load generation finished"
    );

    Ok(report)
}

fn tally(report: &mut LoadReport, joined: Result<bool, tokio::task::JoinError>) {
    match joined {
        Ok(ok) => report.record(ok),
        Err(e) => {
            warn!(error = %e, "load request task panicked");
            report.record(false);
        }
    }
}
