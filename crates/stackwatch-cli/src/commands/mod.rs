pub mod cleanup;
pub mod deploy;
pub mod metrics;
pub mod status;
pub mod traffic;

use stackwatch_metrics::Report;

use crate::OutputFormat;

/// Print a run report on stdout in the requested format.
pub fn emit(report: &Report, format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Text => print!("{}", report.render_text()),
        OutputFormat::Json => println!("{}", report.render_json()?),
    }
    Ok(())
}
