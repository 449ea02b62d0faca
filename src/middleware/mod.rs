//! Middleware layer.
//!
//! Middleware intercepts a request on its way to the router and the response
//! on its way back. Each one implements [`Middleware`]: it receives the
//! request plus a [`Next`] handle for the rest of the chain, and decides
//! whether, when and how to call it.
//!
//! Built-in middleware, in the order [`Pipeline::from_config`] stacks them:
//!
//! | Middleware | Does |
//! |---|---|
//! | [`TimeoutMiddleware`] | Races the rest of the chain against a deadline → `408` |
//! | [`GzipMiddleware`] | Compresses response bodies for clients that accept gzip |
//! | [`CorsMiddleware`] | Answers preflight, enforces origin / method allow-lists |
//! | [`AuthMiddleware`] | Enforces HTTP Basic credentials (except on `/health`) |
//!
//! Every built-in takes an `enabled` flag. A disabled middleware hands the
//! request straight to `next` and adds nothing.
//!
//! [`Pipeline::from_config`]: crate::Pipeline::from_config

use std::sync::Arc;

use crate::handler::BoxFuture;
use crate::request::Request;
use crate::router::Router;

pub mod auth;
pub mod cors;
pub mod gzip;
pub mod timeout;

pub use auth::{AuthConfig, AuthMiddleware};
pub use cors::{CorsConfig, CorsMiddleware};
pub use gzip::{GzipConfig, GzipMiddleware};
pub use timeout::{TimeoutConfig, TimeoutMiddleware};

/// A request interceptor.
///
/// `handle` takes `self: Arc<Self>` so the returned future can own a handle
/// to the middleware and be `'static` (the timeout middleware moves the rest
/// of the chain onto another task).
///
/// ```rust
/// use std::sync::Arc;
/// use waypost::{BoxFuture, Middleware, Next, Request};
///
/// struct PoweredBy;
///
/// impl Middleware for PoweredBy {
///     fn handle(self: Arc<Self>, req: Request, next: Next) -> BoxFuture {
///         Box::pin(async move {
///             let mut res = next.run(req).await;
///             res.headers_mut().insert("x-powered-by", "waypost".parse().unwrap());
///             res
///         })
///     }
/// }
/// ```
pub trait Middleware: Send + Sync + 'static {
    fn handle(self: Arc<Self>, req: Request, next: Next) -> BoxFuture;
}

/// The remainder of the chain after the current middleware.
///
/// Cheap to clone (two `Arc`s and an index) and `'static`, so it can be moved
/// into spawned tasks.
#[derive(Clone)]
pub struct Next {
    stack: Arc<[Arc<dyn Middleware>]>,
    position: usize,
    endpoint: Arc<Router>,
}

impl Next {
    pub(crate) fn new(stack: Arc<[Arc<dyn Middleware>]>, endpoint: Arc<Router>) -> Self {
        Self { stack, position: 0, endpoint }
    }

    /// Passes `req` to the next middleware, or to the router once the stack
    /// is exhausted.
    pub fn run(self, req: Request) -> BoxFuture {
        match self.stack.get(self.position) {
            Some(middleware) => {
                let middleware = Arc::clone(middleware);
                let next = Self { position: self.position + 1, ..self };
                middleware.handle(req, next)
            }
            None => self.endpoint.dispatch(req),
        }
    }
}
