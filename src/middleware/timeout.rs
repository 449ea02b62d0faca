//! Request timeout.
//!
//! Bounds how long the client waits. The rest of the chain runs on its own
//! tokio task and reports back over a oneshot channel; this middleware waits
//! for whichever comes first:
//!
//! ```text
//!            ┌── completion (oneshot) ──▶ handler's response, unmodified
//! select! ───┼── deadline (sleep_until) ─▶ 408 Request Timeout
//!            └── parent scope cancelled ─▶ 408 Request Timeout
//! ```
//!
//! # Cancellation is cooperative
//!
//! When the deadline wins, the spawned task is **not** aborted. Its request
//! scope is cancelled, so handlers awaiting [`Request::cancelled`] stop, but a
//! handler that ignores its scope keeps running to completion in the
//! background. Whatever it returns then is dropped: the 408 has already been
//! sent, and the response is a value, so a late handler cannot write over it.

use std::sync::Arc;
use std::time::Duration;

use http::StatusCode;
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{error, warn};

use crate::error::Error;
use crate::handler::BoxFuture;
use crate::middleware::{Middleware, Next};
use crate::request::Request;
use crate::response::Response;

/// `middleware.timeout` settings.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    pub enabled: bool,
    /// Seconds.
    pub length: i64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { enabled: true, length: 30 }
    }
}

/// See the [module docs](self).
pub struct TimeoutMiddleware {
    length: Option<Duration>,
}

impl TimeoutMiddleware {
    /// # Errors
    ///
    /// [`Error::InvalidTimeout`] if enabled with `length <= 0`, or with a
    /// length too large to add to the clock. Callers treat this as fatal.
    pub fn new(config: TimeoutConfig) -> Result<Self, Error> {
        if !config.enabled {
            return Ok(Self { length: None });
        }
        let length = u64::try_from(config.length)
            .ok()
            .filter(|&secs| secs > 0)
            .map(Duration::from_secs)
            .filter(|&length| Instant::now().checked_add(length).is_some());
        match length {
            Some(length) => Ok(Self { length: Some(length) }),
            None => Err(Error::InvalidTimeout(config.length)),
        }
    }

    /// `None` when disabled.
    pub fn length(&self) -> Option<Duration> {
        self.length
    }
}

impl Middleware for TimeoutMiddleware {
    fn handle(self: Arc<Self>, req: Request, next: Next) -> BoxFuture {
        let Some(length) = self.length else {
            return next.run(req);
        };

        Box::pin(async move {
            let parent = req.scope().clone();
            let Some(until) = Instant::now().checked_add(length) else {
                error!(timeout = ?length, "deadline out of clock range");
                return Response::status(StatusCode::INTERNAL_SERVER_ERROR);
            };
            let (req, scope, deadline) = req.with_deadline(until);
            let path = req.path().to_owned();

            // Cancels the derived scope on every way out of this block.
            let _release = scope.drop_guard();

            let (done_tx, done_rx) = oneshot::channel();
            tokio::spawn(async move {
                let res = next.run(req).await;
                // Receiver gone means the deadline already won.
                let _ = done_tx.send(res);
            });

            tokio::select! {
                biased;

                res = done_rx => match res {
                    Ok(res) => res,
                    Err(_) => {
                        error!(%path, "handler task ended without a response");
                        Response::status(StatusCode::INTERNAL_SERVER_ERROR)
                    }
                },

                () = tokio::time::sleep_until(deadline) => {
                    warn!(%path, timeout = ?length, "request timed out");
                    Response::status(StatusCode::REQUEST_TIMEOUT)
                }

                () = parent.cancelled() => {
                    warn!(%path, "request cancelled before completion");
                    Response::status(StatusCode::REQUEST_TIMEOUT)
                }
            }
        })
    }
}
