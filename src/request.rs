//! Incoming HTTP request type.
//!
//! Besides the usual method / path / headers / body, every request carries a
//! **cancellation scope**: a [`CancellationToken`] owned by the request's
//! processing lifetime. The server cancels it when the connection goes away
//! or the response has been produced; the timeout middleware derives a child
//! scope that is also cancelled when its deadline fires.
//!
//! Handlers that do slow work should race it against [`Request::cancelled`]:
//!
//! ```rust,no_run
//! use waypost::{Request, Response};
//! use http::StatusCode;
//!
//! async fn report(req: Request) -> Response {
//!     tokio::select! {
//!         () = req.cancelled() => Response::status(StatusCode::REQUEST_TIMEOUT),
//!         body = build_report() => Response::json(body),
//!     }
//! }
//! # async fn build_report() -> Vec<u8> { vec![] }
//! ```

use std::collections::HashMap;

use bytes::Bytes;
use http::{HeaderMap, Method, Uri};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// An incoming HTTP request.
pub struct Request {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
    params: HashMap<String, String>,
    scope: CancellationToken,
    deadline: Option<Instant>,
}

impl Request {
    pub fn method(&self) -> &Method { &self.method }
    pub fn path(&self) -> &str { self.uri.path() }
    pub fn uri(&self) -> &Uri { &self.uri }
    pub fn headers(&self) -> &HeaderMap { &self.headers }
    pub fn body(&self) -> &[u8] { &self.body }

    /// Case-insensitive header lookup. Non-UTF-8 values are treated as absent.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Returns a named path parameter.
    ///
    /// For a route `/users/{id}`, `req.param("id")` on `/users/42` returns `Some("42")`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// The point in time after which the pipeline stops waiting for this
    /// request, if a timeout is in force.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Resolves once the request's cancellation scope is cancelled: deadline
    /// expiry, client disconnect, or processing finished.
    pub async fn cancelled(&self) {
        self.scope.cancelled().await
    }

    pub fn is_cancelled(&self) -> bool {
        self.scope.is_cancelled()
    }

    pub(crate) fn scope(&self) -> &CancellationToken {
        &self.scope
    }

    pub(crate) fn set_params(&mut self, params: HashMap<String, String>) {
        self.params = params;
    }

    /// Replaces the cancellation scope with a child of the current one bound
    /// to `deadline`. An earlier deadline already in force is kept.
    ///
    /// Returns the child token and the deadline now in force. The caller owns
    /// the token and must cancel it when the deadline passes or processing
    /// ends.
    pub(crate) fn with_deadline(mut self, deadline: Instant) -> (Self, CancellationToken, Instant) {
        let child = self.scope.child_token();
        self.scope = child.clone();
        let effective = match self.deadline {
            Some(existing) if existing < deadline => existing,
            _ => deadline,
        };
        self.deadline = Some(effective);
        (self, child, effective)
    }
}

impl From<http::Request<Bytes>> for Request {
    fn from(req: http::Request<Bytes>) -> Self {
        let (parts, body) = req.into_parts();
        Self {
            method: parts.method,
            uri: parts.uri,
            headers: parts.headers,
            body,
            params: HashMap::new(),
            scope: CancellationToken::new(),
            deadline: None,
        }
    }
}
