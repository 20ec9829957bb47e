use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use stackwatch_core::{StackConfig, DEFAULT_CONFIG_FILE};

mod commands;

#[derive(Parser)]
#[command(
    name = "stackwatch",
    about = "stackwatch — bring up a monitored stack and verify it end to end",
    version,
    propagate_version = true,
)]
struct Cli {
    /// Stack config file. The built-in demo stack is used if it does not exist.
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Output format for reports.
    #[arg(short, long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Emit logs as JSON lines on stderr.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Bring the stack up, wait for every service, generate traffic and
    /// validate metrics.
    ///
    /// Exits non-zero if a mandatory service never becomes healthy.
    Deploy {
        /// Do not run `compose up`; only wait, load and validate.
        #[arg(long)]
        skip_compose: bool,
        /// Treat missing metrics as a failure.
        #[arg(long)]
        strict_metrics: bool,
        /// Override the number of load requests.
        #[arg(long)]
        requests: Option<u32>,
        /// Override the load concurrency.
        #[arg(long)]
        concurrency: Option<usize>,
    },
    /// Probe every service once and show a metrics sample.
    Status,
    /// Check that metrics are visible through the query API.
    TestMetrics {
        /// Metric to check (repeatable). Defaults to the configured list.
        #[arg(short, long = "metric")]
        metrics: Vec<String>,
        /// Exit non-zero if any metric is missing.
        #[arg(long)]
        strict: bool,
    },
    /// Send synthetic traffic to the application.
    GenerateTraffic {
        /// Number of requests.
        #[arg(short, long)]
        requests: Option<u32>,
        /// Maximum requests in flight.
        #[arg(short = 'j', long)]
        concurrency: Option<usize>,
        /// Target URL (repeatable). Defaults to the configured targets.
        #[arg(short, long = "target")]
        targets: Vec<String>,
    },
    /// Tear the stack down.
    Cleanup {
        /// Also remove named volumes.
        #[arg(long)]
        volumes: bool,
    },
}

fn init_tracing(log_json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,stackwatch=info"));
    // Reports go to stdout; keep logs off it.
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if log_json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let config = StackConfig::load_or_default(&cli.config)?;

    let code = match cli.command {
        Commands::Deploy {
            skip_compose,
            strict_metrics,
            requests,
            concurrency,
        } => {
            let opts = commands::deploy::DeployOptions {
                skip_compose,
                requests,
                concurrency,
            };
            let report = commands::deploy::deploy(&config, &opts).await?;
            commands::emit(&report, cli.format)?;
            report.exit_code(strict_metrics)
        }
        Commands::Status => commands::status::status(&config, cli.format).await?,
        Commands::TestMetrics { metrics, strict } => {
            let report = commands::metrics::test_metrics(&config, &metrics).await?;
            commands::emit(&report, cli.format)?;
            report.exit_code(strict)
        }
        Commands::GenerateTraffic {
            requests,
            concurrency,
            targets,
        } => {
            let report =
                commands::traffic::generate_traffic(&config, requests, concurrency, &targets)
                    .await?;
            commands::emit(&report, cli.format)?;
            report.exit_code(false)
        }
        Commands::Cleanup { volumes } => {
            commands::cleanup::cleanup(&config, volumes).await?;
            0
        }
    };

    Ok(ExitCode::from(code))
}
