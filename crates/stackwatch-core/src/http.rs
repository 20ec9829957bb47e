//! Minimal HTTP/1.1 GET client.
//!
//! Opens one TCP connection per request, performs the hyper handshake,
//! and reads the full response body. Every probe, load request and
//! metrics query in stackwatch goes through [`get`].

use std::time::Duration;

use bytes::Bytes;
use http::header::{HOST, USER_AGENT};
use http::{Method, Request, StatusCode, Uri};
use http_body_util::{BodyExt, Empty};
use hyper_util::rt::TokioIo;
use tokio::net::TcpStream;
use tracing::trace;

use crate::error::{ConfigError, ConfigResult, TransportError};

const CLIENT_AGENT: &str = concat!("stackwatch/", env!("CARGO_PKG_VERSION"));

/// A fully-read HTTP response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

/// Parse and validate an `http://` URL.
pub fn parse_http_url(url: &str) -> ConfigResult<Uri> {
    let uri: Uri = url.parse().map_err(|e: http::uri::InvalidUri| ConfigError::InvalidUrl {
        url: url.to_string(),
        reason: e.to_string(),
    })?;

    match uri.scheme_str() {
        Some("http") => {}
        Some(_) => return Err(ConfigError::UnsupportedScheme(url.to_string())),
        None => {
            return Err(ConfigError::InvalidUrl {
                url: url.to_string(),
                reason: "missing scheme".to_string(),
            })
        }
    }

    if uri.host().is_none_or(str::is_empty) {
        return Err(ConfigError::InvalidUrl {
            url: url.to_string(),
            reason: "missing host".to_string(),
        });
    }

    Ok(uri)
}

/// Validate a `host:port` TCP address.
pub fn parse_tcp_address(address: &str) -> ConfigResult<String> {
    let invalid = |reason: &str| ConfigError::InvalidUrl {
        url: address.to_string(),
        reason: reason.to_string(),
    };

    let (host, port) = address.rsplit_once(':').ok_or_else(|| invalid("expected host:port"))?;
    if host.is_empty() {
        return Err(invalid("missing host"));
    }
    port.parse::<u16>().map_err(|_| invalid("invalid port"))?;
    Ok(address.to_string())
}

/// Perform `GET uri` with an overall timeout covering connect, request and body.
pub async fn get(uri: &Uri, timeout: Duration) -> Result<HttpResponse, TransportError> {
    match tokio::time::timeout(timeout, get_inner(uri)).await {
        Ok(result) => result,
        Err(_) => Err(TransportError::Timeout(timeout)),
    }
}

async fn get_inner(uri: &Uri) -> Result<HttpResponse, TransportError> {
    let host = uri.host().unwrap_or("localhost");
    let address = format!("{host}:{}", uri.port_u16().unwrap_or(80));

    let stream = TcpStream::connect(&address)
        .await
        .map_err(|source| TransportError::Connect {
            address: address.clone(),
            source,
        })?;

    let io = TokioIo::new(stream);
    let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
        .await
        .map_err(TransportError::Handshake)?;

    // Drive the connection in the background.
    tokio::spawn(async move {
        let _ = conn.await;
    });

    let target = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
    let authority = uri.authority().map(|a| a.as_str()).unwrap_or(host);

    let req = Request::builder()
        .method(Method::GET)
        .uri(target)
        .header(HOST, authority)
        .header(USER_AGENT, CLIENT_AGENT)
        .body(Empty::<Bytes>::new())?;

    let resp = sender.send_request(req).await.map_err(TransportError::Request)?;
    let status = resp.status();
    let body = resp
        .into_body()
        .collect()
        .await
        .map_err(TransportError::Body)?
        .to_bytes();

    trace!(%uri, %status, bytes = body.len(), "http get complete");
    Ok(HttpResponse { status, body })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_http_url() {
        let uri = parse_http_url("http://localhost:3000/health").unwrap();
        assert_eq!(uri.host(), Some("localhost"));
        assert_eq!(uri.port_u16(), Some(3000));
        assert_eq!(uri.path(), "/health");
    }

    #[test]
    fn rejects_https() {
        let err = parse_http_url("https://localhost/health").unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedScheme(_)));
    }

    #[test]
    fn rejects_missing_scheme() {
        let err = parse_http_url("localhost:3000/health").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidUrl { .. }));
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_http_url("http://exa mple.com").is_err());
        assert!(parse_http_url("").is_err());
    }

    #[test]
    fn tcp_address_needs_port() {
        assert!(parse_tcp_address("localhost:5432").is_ok());
        assert!(parse_tcp_address("localhost").is_err());
        assert!(parse_tcp_address("localhost:http").is_err());
        assert!(parse_tcp_address(":5432").is_err());
    }

    #[tokio::test]
    async fn connection_refused_is_transport_error() {
        // Bind then drop to obtain a port with nothing listening.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let uri = parse_http_url(&format!("http://127.0.0.1:{port}/")).unwrap();
        let err = get(&uri, Duration::from_secs(1)).await.unwrap_err();
        assert!(matches!(err, TransportError::Connect { .. }));
    }

    #[tokio::test]
    async fn reads_status_and_body() {
        let server = crate::testing::MockServer::always(r#"{"status":"ok"}"#).await;
        let uri = parse_http_url(&server.url("/health?verbose=1")).unwrap();

        let resp = get(&uri, Duration::from_secs(2)).await.unwrap();
        assert!(resp.is_success());
        assert_eq!(&resp.body[..], br#"{"status":"ok"}"#);
        assert_eq!(server.hits(), 1);
    }

    #[tokio::test]
    async fn slow_response_times_out() {
        let server = crate::testing::MockServer::start(|_, _| {
            crate::testing::MockResponse::ok("late").delayed(Duration::from_millis(500))
        })
        .await;
        let uri = parse_http_url(&server.url("/")).unwrap();

        let err = get(&uri, Duration::from_millis(50)).await.unwrap_err();
        assert!(matches!(err, TransportError::Timeout(_)));
    }
}
