//! `stackwatch test-metrics`: validation without deploying.

use anyhow::Result;

use stackwatch_core::StackConfig;
use stackwatch_metrics::{validate_metrics, Report};

/// Validate `metrics`, or the configured list when it is empty.
pub async fn test_metrics(config: &StackConfig, metrics: &[String]) -> Result<Report> {
    let endpoint = config.metrics.endpoint()?;
    let timeout = config.metrics.timeout()?;
    let names = if metrics.is_empty() {
        &config.metrics.names[..]
    } else {
        metrics
    };

    Ok(Report {
        metrics: validate_metrics(names, &endpoint, timeout).await,
        ..Report::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use stackwatch_core::testing::{MockResponse, MockServer};

    async fn prometheus() -> MockServer {
        MockServer::start(|uri, _| {
            let body = if uri.query() == Some("query=rails_up") {
                r#"{"status":"success","data":{"resultType":"vector","result":[{"metric":{"__name__":"rails_up"},"value":[1,"1"]}]}}"#
            } else {
                r#"{"status":"success","data":{"resultType":"vector","result":[]}}"#
            };
            MockResponse::ok(body)
        })
        .await
    }

    fn config(endpoint: String) -> StackConfig {
        let mut config = StackConfig::demo_stack();
        config.metrics.query_endpoint = endpoint;
        config.metrics.names = vec!["rails_up".to_string(), "pg_up".to_string()];
        config
    }

    #[tokio::test]
    async fn uses_configured_names_by_default() {
        let server = prometheus().await;
        let report = test_metrics(&config(server.url("")), &[]).await.unwrap();

        assert_eq!(report.metrics.len(), 2);
        assert!(report.metrics[0].present);
        assert!(!report.metrics[1].present);
        assert_eq!(report.exit_code(false), 0);
        assert_eq!(report.exit_code(true), 1);
    }

    #[tokio::test]
    async fn explicit_names_replace_the_list() {
        let server = prometheus().await;
        let report = test_metrics(&config(server.url("")), &["rails_up".to_string()])
            .await
            .unwrap();

        assert_eq!(report.metrics.len(), 1);
        assert_eq!(server.hits(), 1);
        assert_eq!(report.exit_code(true), 0);
    }

    #[tokio::test]
    async fn bad_endpoint_is_a_config_error() {
        let mut config = StackConfig::demo_stack();
        config.metrics.query_endpoint = "https://prometheus:9090".to_string();
        assert!(test_metrics(&config, &[]).await.is_err());
    }
}
