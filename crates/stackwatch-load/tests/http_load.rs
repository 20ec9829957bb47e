//! Load generation against a real in-process HTTP server.

use std::sync::Arc;
use std::time::Duration;

use http::{StatusCode, Uri};
use stackwatch_core::http::parse_http_url;
use stackwatch_core::testing::{MockResponse, MockServer};
use stackwatch_load::{generate_load, HttpSender};

fn sender() -> Arc<HttpSender> {
    Arc::new(HttpSender::new(Duration::from_secs(2)))
}

#[tokio::test]
async fn thirty_requests_ten_at_a_time() {
    let server = MockServer::start(|_, _| {
        MockResponse::ok("hello").delayed(Duration::from_millis(20))
    })
    .await;
    let targets: Vec<Uri> = vec![parse_http_url(&server.url("/")).unwrap()];

    let report = generate_load(&targets, 30, 10, sender()).await.unwrap();

    assert_eq!(report.succeeded, 30);
    assert_eq!(report.failed, 0);
    assert_eq!(server.hits(), 30);
    assert!(server.max_in_flight() <= 10);
}

#[tokio::test]
async fn spreads_requests_over_targets() {
    let first = MockServer::always("a").await;
    let second = MockServer::always("b").await;
    let targets = vec![
        parse_http_url(&first.url("/")).unwrap(),
        parse_http_url(&second.url("/users")).unwrap(),
    ];

    let report = generate_load(&targets, 10, 3, sender()).await.unwrap();

    assert_eq!(report.completed(), 10);
    assert_eq!(first.hits(), 5);
    assert_eq!(second.hits(), 5);
}

#[tokio::test]
async fn server_errors_and_dead_targets_are_counted() {
    let flaky = MockServer::start(|_, hit| {
        if hit % 2 == 0 {
            MockResponse::status(StatusCode::INTERNAL_SERVER_ERROR, "boom")
        } else {
            MockResponse::ok("fine")
        }
    })
    .await;

    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let dead_port = listener.local_addr().unwrap().port();
    drop(listener);

    let targets = vec![
        parse_http_url(&flaky.url("/")).unwrap(),
        parse_http_url(&format!("http://127.0.0.1:{dead_port}/")).unwrap(),
    ];

    let report = generate_load(&targets, 8, 1, sender()).await.unwrap();

    // 4 hit the flaky server (2 succeed), 4 hit nothing.
    assert_eq!(flaky.hits(), 4);
    assert_eq!(report.succeeded, 2);
    assert_eq!(report.failed, 6);
}
