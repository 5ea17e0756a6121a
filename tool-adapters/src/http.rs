//! JSON-over-HTTP adapter backed by `hyper` and `rustls`.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use hyper::body::to_bytes;
use hyper::client::HttpConnector;
use hyper::header::ACCEPT;
use hyper::{Body, Client, Request, Uri};
use hyper_rustls::HttpsConnector;
use rustls::{ClientConfig, OwnedTrustAnchor, RootCertStore};
use serde_json::Value;
use tokio::time::timeout;
use tracing::debug;
use webpki_roots::TLS_SERVER_ROOTS;

use crate::traits::{AdapterError, AdapterResult, JsonFetcher};

type HyperClient = Client<HttpsConnector<HttpConnector>, Body>;

/// Configuration for [`HttpJsonClient`].
#[derive(Clone, Debug)]
pub struct HttpJsonConfig {
    timeout: Duration,
}

impl HttpJsonConfig {
    /// Creates a configuration with a ten second request timeout.
    #[must_use]
    pub fn new() -> Self {
        Self {
            timeout: Duration::from_secs(10),
        }
    }

    /// Sets the timeout covering connect, request and body download.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Returns the configured timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl Default for HttpJsonConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Issues GET requests and decodes JSON bodies.
pub struct HttpJsonClient {
    client: HyperClient,
    timeout: Duration,
}

impl fmt::Debug for HttpJsonClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpJsonClient")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl HttpJsonClient {
    /// Constructs a client from the supplied configuration.
    #[must_use]
    pub fn new(config: &HttpJsonConfig) -> Self {
        Self {
            client: Client::builder().build(connector()),
            timeout: config.timeout,
        }
    }

    async fn fetch(&self, uri: Uri) -> AdapterResult<Value> {
        let request = Request::get(uri)
            .header(ACCEPT, "application/json")
            .body(Body::empty())
            .map_err(|err| AdapterError::transport(format!("failed to build request: {err}")))?;

        let response = self
            .client
            .request(request)
            .await
            .map_err(|err| AdapterError::transport(format!("request failed: {err}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AdapterError::Status {
                status: status.as_u16(),
            });
        }

        let bytes = to_bytes(response.into_body())
            .await
            .map_err(|err| AdapterError::transport(format!("failed to read response: {err}")))?;

        serde_json::from_slice(&bytes)
            .map_err(|err| AdapterError::response(format!("failed to decode JSON body: {err}")))
    }
}

#[async_trait]
impl JsonFetcher for HttpJsonClient {
    async fn get_json(&self, uri: &str) -> AdapterResult<Value> {
        let uri = parse_uri(uri)?;
        debug!(%uri, "issuing GET");

        timeout(self.timeout, self.fetch(uri))
            .await
            .map_err(|_| {
                AdapterError::transport(format!("request timed out after {:?}", self.timeout))
            })?
    }
}

/// Connector that accepts both `http://` and `https://`, trusting the bundled
/// web PKI roots.
fn connector() -> HttpsConnector<HttpConnector> {
    let mut roots = RootCertStore::empty();
    roots.add_trust_anchors(TLS_SERVER_ROOTS.iter().map(|anchor| {
        OwnedTrustAnchor::from_subject_spki_name_constraints(
            anchor.subject,
            anchor.spki,
            anchor.name_constraints,
        )
    }));
    let tls = ClientConfig::builder()
        .with_safe_defaults()
        .with_root_certificates(roots)
        .with_no_client_auth();

    let mut http = HttpConnector::new();
    http.enforce_http(false);
    HttpsConnector::from((http, Arc::new(tls)))
}

fn parse_uri(input: &str) -> AdapterResult<Uri> {
    let trimmed = input.trim();
    if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
        return Err(AdapterError::configuration(format!(
            "endpoint `{trimmed}` must start with http:// or https://"
        )));
    }
    trimmed
        .parse::<Uri>()
        .map_err(|err| AdapterError::configuration(format!("invalid endpoint `{trimmed}`: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serves exactly one canned HTTP response on an ephemeral port.
    async fn serve_once(status_line: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0_u8; 4096];
            let mut read = Vec::new();
            while !read.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                read.extend_from_slice(&buf[..n]);
            }
            let response = format!(
                "{status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
        });
        format!("http://{addr}/json")
    }

    fn client() -> HttpJsonClient {
        HttpJsonClient::new(&HttpJsonConfig::new().with_timeout(Duration::from_secs(5)))
    }

    #[tokio::test]
    async fn decodes_success_body() {
        let url = serve_once("HTTP/1.1 200 OK", r#"{"slideshow":{"title":"Sample"}}"#).await;
        let value = client().get_json(&url).await.unwrap();
        assert_eq!(value, json!({ "slideshow": { "title": "Sample" } }));
    }

    #[tokio::test]
    async fn non_success_status_is_an_error() {
        let url = serve_once("HTTP/1.1 503 Service Unavailable", "{}").await;
        let err = client().get_json(&url).await.expect_err("503 should fail");
        assert!(matches!(err, AdapterError::Status { status: 503 }));
    }

    #[tokio::test]
    async fn undecodable_body_is_an_error() {
        let url = serve_once("HTTP/1.1 200 OK", "<html>nope</html>").await;
        let err = client().get_json(&url).await.expect_err("html should fail");
        assert!(matches!(err, AdapterError::Response { .. }));
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_a_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = client()
            .get_json(&format!("http://{addr}/json"))
            .await
            .expect_err("closed port should fail");
        assert!(matches!(err, AdapterError::Transport { .. }));
    }

    #[tokio::test]
    async fn rejects_endpoint_without_scheme() {
        let err = client()
            .get_json("httpbin.org/json")
            .await
            .expect_err("missing scheme should error");
        assert!(matches!(err, AdapterError::Configuration { .. }));
    }

    #[test]
    fn config_defaults_to_ten_seconds() {
        assert_eq!(HttpJsonConfig::default().timeout(), Duration::from_secs(10));
    }
}
