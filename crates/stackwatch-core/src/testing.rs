//! In-process HTTP server for tests.
//!
//! Binds `127.0.0.1:0`, answers every request through a handler closure
//! and records how many requests arrived and how many were in flight at
//! once. The server shuts down when the [`MockServer`] is dropped.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http::{Response, StatusCode, Uri};
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::Request;
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tokio::sync::watch;

/// What the mock answers for one request.
#[derive(Debug, Clone)]
pub struct MockResponse {
    pub status: StatusCode,
    pub body: String,
    /// Held before answering, to keep the request in flight.
    pub delay: Duration,
}

impl MockResponse {
    pub fn ok(body: &str) -> Self {
        Self::status(StatusCode::OK, body)
    }

    pub fn status(status: StatusCode, body: &str) -> Self {
        Self {
            status,
            body: body.to_string(),
            delay: Duration::ZERO,
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// Handler invoked with the request URI and the 1-based hit number.
pub type MockHandler = Arc<dyn Fn(&Uri, usize) -> MockResponse + Send + Sync>;

#[derive(Default)]
struct Counters {
    hits: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

pub struct MockServer {
    addr: SocketAddr,
    counters: Arc<Counters>,
    shutdown: watch::Sender<bool>,
}

impl MockServer {
    pub async fn start<F>(handler: F) -> Self
    where
        F: Fn(&Uri, usize) -> MockResponse + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock server");
        let addr = listener.local_addr().expect("mock server address");
        let counters = Arc::new(Counters::default());
        let handler: MockHandler = Arc::new(handler);
        let (shutdown, mut shutdown_rx) = watch::channel(false);

        let loop_counters = counters.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    accepted = listener.accept() => {
                        let Ok((stream, _)) = accepted else { break };
                        let handler = handler.clone();
                        let counters = loop_counters.clone();
                        tokio::spawn(async move {
                            let svc = service_fn(move |req: Request<Incoming>| {
                                let handler = handler.clone();
                                let counters = counters.clone();
                                async move { Ok::<_, Infallible>(answer(req, &handler, &counters).await) }
                            });
                            let _ = http1::Builder::new()
                                .serve_connection(TokioIo::new(stream), svc)
                                .await;
                        });
                    }
                    _ = shutdown_rx.changed() => break,
                }
            }
        });

        Self {
            addr,
            counters,
            shutdown,
        }
    }

    /// Server answering 200 with `body` to every request.
    pub async fn always(body: &'static str) -> Self {
        Self::start(move |_, _| MockResponse::ok(body)).await
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn hits(&self) -> usize {
        self.counters.hits.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.counters.max_in_flight.load(Ordering::SeqCst)
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        let _ = self.shutdown.send(true);
    }
}

async fn answer(
    req: Request<Incoming>,
    handler: &MockHandler,
    counters: &Counters,
) -> Response<Full<Bytes>> {
    let hit = counters.hits.fetch_add(1, Ordering::SeqCst) + 1;
    let now = counters.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
    counters.max_in_flight.fetch_max(now, Ordering::SeqCst);

    let mock = handler(req.uri(), hit);
    if !mock.delay.is_zero() {
        tokio::time::sleep(mock.delay).await;
    }

    counters.in_flight.fetch_sub(1, Ordering::SeqCst);

    let mut resp = Response::new(Full::new(Bytes::from(mock.body)));
    *resp.status_mut() = mock.status;
    resp
}
