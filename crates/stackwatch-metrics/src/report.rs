//! Final run report.
//!
//! Collects every service status, metric validation result and the load
//! tally of a run, and decides the process exit code.

use serde::Serialize;

use stackwatch_core::{LoadReport, ServiceState, ServiceStatus, ValidationResult};

/// Everything a run observed.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Report {
    pub services: Vec<ServiceStatus>,
    pub metrics: Vec<ValidationResult>,
    pub load: Option<LoadReport>,
}

impl Report {
    /// Mandatory services that did not become healthy.
    pub fn blocking_services(&self) -> Vec<&ServiceStatus> {
        self.services.iter().filter(|s| s.is_blocking()).collect()
    }

    /// Metrics with no series.
    pub fn missing_metrics(&self) -> Vec<&ValidationResult> {
        self.metrics.iter().filter(|m| !m.present).collect()
    }

    /// `0` on full success, `1` if a mandatory service failed or, with
    /// `strict_metrics`, if any metric is missing.
    pub fn exit_code(&self, strict_metrics: bool) -> u8 {
        if !self.blocking_services().is_empty() {
            return 1;
        }
        if strict_metrics && !self.missing_metrics().is_empty() {
            return 1;
        }
        0
    }

    pub fn render_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn render_text(&self) -> String {
        let mut out = String::new();

        if !self.services.is_empty() {
            let width = self.services.iter().map(|s| s.name.len()).max().unwrap_or(0);
            out.push_str("Services:\n");
            for s in &self.services {
                let note = match (s.state, s.mandatory) {
                    (ServiceState::Healthy, _) => String::new(),
                    (_, true) => "  (mandatory)".to_string(),
                    (_, false) => "  (optional)".to_string(),
                };
                out.push_str(&format!(
                    "  {} {:<width$}  {:<9}  {} attempt{}{note}\n",
                    s.state.symbol(),
                    s.name,
                    s.state.label(),
                    s.attempts,
                    if s.attempts == 1 { "" } else { "s" },
                ));
            }
            out.push('\n');
        }

        if let Some(load) = &self.load {
            out.push_str(&format!(
                "Traffic: {} requests, {} ok, {} failed in {:.1}s\n\n",
                load.requested,
                load.succeeded,
                load.failed,
                load.elapsed.as_secs_f64()
            ));
        }

        if !self.metrics.is_empty() {
            let width = self
                .metrics
                .iter()
                .map(|m| m.metric_name.len())
                .max()
                .unwrap_or(0);
            out.push_str("Metrics:\n");
            for m in &self.metrics {
                let (symbol, detail) = match (m.present, m.sample_value) {
                    (true, Some(v)) => ("✓", format!("sample {v}")),
                    (true, None) => ("✓", "present".to_string()),
                    (false, _) => ("✗", "missing".to_string()),
                };
                out.push_str(&format!("  {symbol} {:<width$}  {detail}\n", m.metric_name));
            }
            out.push('\n');
        }

        let blocking = self.blocking_services();
        let missing = self.missing_metrics().len();
        if blocking.is_empty() {
            out.push_str("Result: all mandatory services healthy");
        } else {
            let names: Vec<&str> = blocking.iter().map(|s| s.name.as_str()).collect();
            out.push_str(&format!("Result: FAILED ({} not healthy)", names.join(", ")));
        }
        if missing > 0 {
            out.push_str(&format!(", {missing} metric(s) missing"));
        }
        out.push('\n');

        out
    }
}
