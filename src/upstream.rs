//! Upstream dependencies: an optional database and an HTTP client.
//!
//! An [`Upstream`] is assembled once at startup, then shared by `Arc` with
//! whatever needs it (the health probe, application handlers). Both
//! capabilities are trait objects so tests can swap in fakes:
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use waypost::upstream::{Database, PingFuture, Upstream};
//!
//! struct Pool;
//!
//! impl Database for Pool {
//!     fn ping(&self) -> PingFuture<'_> {
//!         Box::pin(async { Ok(()) })
//!     }
//! }
//!
//! let mut upstream = Upstream::new();
//! upstream.set_database(Arc::new(Pool));
//! let upstream = Arc::new(upstream);
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;
use http::StatusCode;

/// Failures talking to an upstream dependency.
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("upstream request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The call completed but the status differed from the one expected.
    /// The drained body is kept so callers can inspect it.
    #[error("status code was {actual}, instead of the expected {expected}")]
    UnexpectedStatus {
        expected: StatusCode,
        actual: StatusCode,
        body: Bytes,
    },

    #[error("database: {0}")]
    Database(String),

    #[error("cancelled before the upstream answered")]
    Cancelled,
}

impl UpstreamError {
    /// The drained response body, if the call got that far.
    pub fn body(&self) -> Option<&Bytes> {
        match self {
            Self::UnexpectedStatus { body, .. } => Some(body),
            _ => None,
        }
    }
}

// ── Database ──────────────────────────────────────────────────────────────────

pub type PingFuture<'a> = Pin<Box<dyn Future<Output = Result<(), UpstreamError>> + Send + 'a>>;

/// A database handle that can report its own liveness.
///
/// Connection pooling and synchronisation are the implementation's business;
/// waypost only ever calls `ping`.
pub trait Database: Send + Sync + 'static {
    fn ping(&self) -> PingFuture<'_>;
}

// ── HTTP client ───────────────────────────────────────────────────────────────

pub type CallFuture<'a> = Pin<Box<dyn Future<Output = Result<Bytes, UpstreamError>> + Send + 'a>>;

/// Outbound HTTP capability.
pub trait HttpClient: Send + Sync + 'static {
    /// Sends `req` and returns the fully drained body, whatever the status.
    fn call(&self, req: reqwest::Request) -> CallFuture<'_>;

    /// Sends `req`, drains the body, and fails with
    /// [`UpstreamError::UnexpectedStatus`] when the status is not `expected`.
    fn call_for_status(&self, req: reqwest::Request, expected: StatusCode) -> CallFuture<'_>;
}

/// [`HttpClient`] backed by a shared [`reqwest::Client`].
#[derive(Clone, Debug, Default)]
pub struct ReqwestClient {
    inner: reqwest::Client,
}

impl ReqwestClient {
    pub fn new(inner: reqwest::Client) -> Self {
        Self { inner }
    }
}

impl HttpClient for ReqwestClient {
    fn call(&self, req: reqwest::Request) -> CallFuture<'_> {
        Box::pin(async move {
            let res = self.inner.execute(req).await?;
            Ok(res.bytes().await?)
        })
    }

    fn call_for_status(&self, req: reqwest::Request, expected: StatusCode) -> CallFuture<'_> {
        Box::pin(async move {
            let res = self.inner.execute(req).await?;
            let actual = res.status();
            let body = res.bytes().await?;

            if actual != expected {
                return Err(UpstreamError::UnexpectedStatus { expected, actual, body });
            }
            Ok(body)
        })
    }
}

// ── Upstream ──────────────────────────────────────────────────────────────────

/// Process-wide upstream dependencies.
pub struct Upstream {
    db: Option<Arc<dyn Database>>,
    http: Arc<dyn HttpClient>,
}

impl Upstream {
    /// No database; HTTP calls go through a default [`ReqwestClient`].
    pub fn new() -> Self {
        Self { db: None, http: Arc::new(ReqwestClient::default()) }
    }

    pub fn set_database(&mut self, db: Arc<dyn Database>) {
        self.db = Some(db);
    }

    pub fn set_http_client(&mut self, client: Arc<dyn HttpClient>) {
        self.http = client;
    }

    pub fn database(&self) -> Option<&Arc<dyn Database>> {
        self.db.as_ref()
    }

    pub fn http(&self) -> &Arc<dyn HttpClient> {
        &self.http
    }
}

impl Default for Upstream {
    fn default() -> Self { Self::new() }
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use super::*;

    /// Answers exactly one request with a canned raw HTTP/1.1 response.
    async fn one_shot_server(status_line: &'static str, body: &'static str) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 1024];
            let _ = stream.read(&mut buf).await.unwrap();
            let raw = format!(
                "HTTP/1.1 {status_line}\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len(),
            );
            stream.write_all(raw.as_bytes()).await.unwrap();
        });
        addr
    }

    fn get(addr: SocketAddr) -> reqwest::Request {
        reqwest::Request::new(
            reqwest::Method::GET,
            format!("http://{addr}/thing").parse().unwrap(),
        )
    }

    #[tokio::test]
    async fn call_drains_body_regardless_of_status() {
        let addr = one_shot_server("500 Internal Server Error", "boom").await;
        let body = ReqwestClient::default().call(get(addr)).await.unwrap();
        assert_eq!(body, "boom");
    }

    #[tokio::test]
    async fn call_for_status_accepts_expected_status() {
        let addr = one_shot_server("201 Created", "made").await;
        let body = ReqwestClient::default()
            .call_for_status(get(addr), StatusCode::CREATED)
            .await
            .unwrap();
        assert_eq!(body, "made");
    }

    #[tokio::test]
    async fn call_for_status_keeps_body_on_mismatch() {
        let addr = one_shot_server("418 I'm a teapot", "short and stout").await;
        let err = ReqwestClient::default()
            .call_for_status(get(addr), StatusCode::OK)
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "status code was 418 I'm a teapot, instead of the expected 200 OK");
        assert_eq!(err.body().map(|b| &b[..]), Some(&b"short and stout"[..]));
    }

    struct CannedClient;

    impl HttpClient for CannedClient {
        fn call(&self, _req: reqwest::Request) -> CallFuture<'_> {
            Box::pin(async { Ok(Bytes::from_static(b"canned")) })
        }

        fn call_for_status(&self, req: reqwest::Request, _expected: StatusCode) -> CallFuture<'_> {
            self.call(req)
        }
    }

    #[tokio::test]
    async fn http_client_can_be_substituted() {
        let mut upstream = Upstream::new();
        assert!(upstream.database().is_none());

        upstream.set_http_client(Arc::new(CannedClient));
        let req = reqwest::Request::new(reqwest::Method::GET, "http://unused.invalid/".parse().unwrap());
        let body = upstream.http().call(req).await.unwrap();
        assert_eq!(body, "canned");
    }
}
