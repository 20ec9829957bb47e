//! `stackwatch deploy`: the full bring-up pipeline.
//!
//! compose up → ordered readiness waits → synthetic traffic → settle →
//! metrics validation. Traffic and validation only run once every
//! mandatory service is healthy.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};

use stackwatch_compose::ComposeStack;
use stackwatch_core::{plan_startup_order, StackConfig};
use stackwatch_health::{run_startup_sequence, NetworkProber};
use stackwatch_load::{generate_load, HttpSender};
use stackwatch_metrics::{validate_metrics, Report};

#[derive(Debug, Clone, Default)]
pub struct DeployOptions {
    pub skip_compose: bool,
    pub requests: Option<u32>,
    pub concurrency: Option<usize>,
}

pub async fn deploy(config: &StackConfig, opts: &DeployOptions) -> Result<Report> {
    // Reject a bad config before anything is started.
    let specs = plan_startup_order(&config.service_specs()?)?;

    let mut load = config.load.clone();
    if let Some(requests) = opts.requests {
        load.requests = requests;
    }
    if let Some(concurrency) = opts.concurrency {
        load.concurrency = concurrency;
    }
    let targets = if load.targets.is_empty() {
        None
    } else {
        Some(load.target_uris()?)
    };
    let load_timeout = load.timeout()?;
    let endpoint = config.metrics.endpoint()?;
    let metrics_timeout = config.metrics.timeout()?;
    let settle = config.metrics.settle()?;

    if opts.skip_compose {
        info!("skipping compose up");
    } else {
        ComposeStack::new(&config.compose)
            .up()
            .await
            .context("failed to bring the stack up")?;
    }

    let services = run_startup_sequence(&specs, &NetworkProber).await;
    let mut report = Report {
        services,
        ..Report::default()
    };

    let blocking = report.blocking_services().len();
    if blocking > 0 {
        warn!(
            blocking,
            "mandatory services not healthy, skipping traffic and metrics validation"
        );
        return Ok(report);
    }

    match targets {
        Some(targets) => {
            let sender = Arc::new(HttpSender::new(load_timeout));
            report.load =
                Some(generate_load(&targets, load.requests, load.concurrency, sender).await?);
        }
        None => info!("no load targets configured, skipping traffic"),
    }

    if !settle.is_zero() {
        info!(?settle, "waiting for metrics to be scraped");
        tokio::time::sleep(settle).await;
    }

    report.metrics = validate_metrics(&config.metrics.names, &endpoint, metrics_timeout).await;

    Ok(report)
}
