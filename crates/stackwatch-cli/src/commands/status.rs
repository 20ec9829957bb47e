//! `stackwatch status`: one-shot view of a running stack.

use anyhow::Result;
use serde::Serialize;
use tracing::warn;

use stackwatch_compose::ComposeStack;
use stackwatch_core::StackConfig;
use stackwatch_health::{snapshot, NetworkProber};
use stackwatch_metrics::{query_samples, Report, Sample};

use crate::OutputFormat;

#[derive(Debug, Serialize)]
pub struct StatusOutput {
    #[serde(flatten)]
    pub report: Report,
    /// `compose ps` listing, if compose could be reached.
    pub containers: Option<String>,
    /// Current `up` series from Prometheus.
    pub samples: Vec<Sample>,
}

impl StatusOutput {
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        if let Some(containers) = &self.containers {
            out.push_str("Containers:\n");
            out.push_str(containers);
            if !containers.ends_with('\n') {
                out.push('\n');
            }
            out.push('\n');
        }
        if !self.samples.is_empty() {
            out.push_str("Targets (up):\n");
            for sample in &self.samples {
                out.push_str(&format!("  {}\n", sample.display_line()));
            }
            out.push('\n');
        }
        out.push_str(&self.report.render_text());
        out
    }
}

/// Probe every service once, list containers and sample `up`.
///
/// Returns the process exit code: non-zero if a mandatory service is
/// currently unhealthy.
pub async fn status(config: &StackConfig, format: OutputFormat) -> Result<u8> {
    let output = collect(config, true).await?;

    match format {
        OutputFormat::Text => print!("{}", output.render_text()),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&output)?),
    }

    Ok(output.report.exit_code(false))
}

pub async fn collect(config: &StackConfig, with_compose: bool) -> Result<StatusOutput> {
    let specs = config.service_specs()?;
    let endpoint = config.metrics.endpoint()?;
    let timeout = config.metrics.timeout()?;

    let services = snapshot(&specs, &NetworkProber).await;

    let containers = if with_compose {
        match ComposeStack::new(&config.compose).ps().await {
            Ok(listing) => Some(listing),
            Err(e) => {
                warn!(error = %e, "could not list containers");
                None
            }
        }
    } else {
        None
    };

    let samples = match query_samples("up", &endpoint, timeout).await {
        Ok(samples) => samples,
        Err(e) => {
            warn!(error = %e, "could not query metrics");
            Vec::new()
        }
    };

    Ok(StatusOutput {
        report: Report {
            services,
            ..Report::default()
        },
        containers,
        samples,
    })
}
