//! Ordered middleware composition.
//!
//! A [`Pipeline`] is an explicit, ordered list of [`Middleware`] in front of
//! a [`Router`]. The first middleware added is the outermost: it sees the
//! request first and the response last.
//!
//! ```rust,no_run
//! use waypost::{Pipeline, Router};
//! use waypost::middleware::{AuthConfig, AuthMiddleware, GzipConfig, GzipMiddleware};
//!
//! let auth = AuthConfig { enabled: true, user: "ops".into(), password: "s3cret".into() };
//! let pipeline = Pipeline::builder()
//!     .layer(GzipMiddleware::new(GzipConfig { enabled: true }))
//!     .layer_if(auth.enabled, AuthMiddleware::new(auth.clone()))
//!     .build(Router::new());
//! ```

use std::sync::Arc;

use crate::config::Config;
use crate::error::Error;
use crate::handler::BoxFuture;
use crate::middleware::{
    AuthMiddleware, CorsMiddleware, GzipMiddleware, Middleware, Next, TimeoutMiddleware,
};
use crate::request::Request;
use crate::router::Router;

/// A router wrapped in an ordered stack of middleware.
#[derive(Clone)]
pub struct Pipeline {
    stack: Arc<[Arc<dyn Middleware>]>,
    endpoint: Arc<Router>,
}

impl Pipeline {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder { stack: Vec::new() }
    }

    /// The reference chain: Timeout → Gzip → Cors → Auth → `router`.
    ///
    /// Every middleware is present; each one's `enabled` flag decides whether
    /// it acts or passes through.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidTimeout`] when the timeout is enabled with a length
    /// that cannot bound a request.
    pub fn from_config(config: &Config, router: Router) -> Result<Self, Error> {
        let mw = &config.middleware;
        Ok(Self::builder()
            .layer(TimeoutMiddleware::new(mw.timeout.clone())?)
            .layer(GzipMiddleware::new(mw.gzip.clone()))
            .layer(CorsMiddleware::new(mw.cors.clone()))
            .layer(AuthMiddleware::new(mw.auth.clone()))
            .build(router))
    }

    /// Number of middleware in front of the router.
    pub fn len(&self) -> usize {
        self.stack.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    /// Runs `req` through the whole chain.
    pub fn handle(&self, req: Request) -> BoxFuture {
        Next::new(Arc::clone(&self.stack), Arc::clone(&self.endpoint)).run(req)
    }
}

/// Collects middleware in order. Obtain via [`Pipeline::builder`].
pub struct PipelineBuilder {
    stack: Vec<Arc<dyn Middleware>>,
}

impl PipelineBuilder {
    /// Appends `middleware` inside everything added so far.
    pub fn layer(mut self, middleware: impl Middleware) -> Self {
        self.stack.push(Arc::new(middleware));
        self
    }

    /// Appends `middleware` only when `include` is true.
    pub fn layer_if(self, include: bool, middleware: impl Middleware) -> Self {
        if include { self.layer(middleware) } else { self }
    }

    pub fn build(self, router: Router) -> Pipeline {
        Pipeline { stack: self.stack.into(), endpoint: Arc::new(router) }
    }
}
