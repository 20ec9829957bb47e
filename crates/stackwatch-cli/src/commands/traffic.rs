//! `stackwatch generate-traffic`

use std::sync::Arc;

use anyhow::Result;

use stackwatch_core::StackConfig;
use stackwatch_load::{generate_load, HttpSender};
use stackwatch_metrics::Report;

/// Send traffic using the configured load settings, with command-line
/// overrides taking precedence.
pub async fn generate_traffic(
    config: &StackConfig,
    requests: Option<u32>,
    concurrency: Option<usize>,
    targets: &[String],
) -> Result<Report> {
    let mut load = config.load.clone();
    if let Some(requests) = requests {
        load.requests = requests;
    }
    if let Some(concurrency) = concurrency {
        load.concurrency = concurrency;
    }
    if !targets.is_empty() {
        load.targets = targets.to_vec();
    }

    let uris = load.target_uris()?;
    let sender = Arc::new(HttpSender::new(load.timeout()?));
    let report = generate_load(&uris, load.requests, load.concurrency, sender).await?;

    Ok(Report {
        load: Some(report),
        ..Report::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use stackwatch_core::testing::{MockResponse, MockServer};

    #[tokio::test]
    async fn sends_to_overridden_targets() {
        let server = MockServer::start(|uri, _| {
            if uri.path() == "/broken" {
                MockResponse::status(http::StatusCode::INTERNAL_SERVER_ERROR, "boom")
            } else {
                MockResponse::ok("ok")
            }
        })
        .await;

        let report = generate_traffic(
            &StackConfig::demo_stack(),
            Some(10),
            Some(2),
            &[server.url("/"), server.url("/broken")],
        )
        .await
        .unwrap();

        let load = report.load.unwrap();
        assert_eq!(load.requested, 10);
        assert_eq!(load.succeeded, 5);
        assert_eq!(load.failed, 5);
        assert_eq!(server.hits(), 10);
        assert!(server.max_in_flight() <= 2);
        // Failed requests never fail the command.
        assert_eq!(report.services.len(), 0);
    }

    #[tokio::test]
    async fn zero_concurrency_is_rejected() {
        let result = generate_traffic(
            &StackConfig::demo_stack(),
            Some(10),
            Some(0),
            &["http://127.0.0.1:9/".to_string()],
        )
        .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn no_targets_is_rejected() {
        let mut config = StackConfig::demo_stack();
        config.load.targets.clear();
        assert!(generate_traffic(&config, None, None, &[]).await.is_err());
    }
}
