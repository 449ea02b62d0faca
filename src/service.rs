//! Service assembly.
//!
//! A [`Service`] owns the loaded [`Config`] and the shared [`Upstream`], and
//! wires them into a health route, a middleware pipeline and a server.
//! Nothing here is global: build one, pass references to whatever needs them.
//!
//! ```rust,no_run
//! use clap::Parser;
//! use waypost::{Cli, Request, Response, Service};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = Cli::parse().load().unwrap_or_else(|e| waypost::logging::fatal(e));
//!     let service = Service::new(config);
//!     let app = service.router().get("/hello", hello);
//!     service.serve(app).await.unwrap_or_else(|e| waypost::logging::fatal(e));
//! }
//!
//! async fn hello(_req: Request) -> Response {
//!     Response::text("hello")
//! }
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use crate::config::Config;
use crate::error::Error;
use crate::health::{HEALTH_PATH, HealthProbe};
use crate::logging;
use crate::pipeline::Pipeline;
use crate::router::Router;
use crate::server::Server;
use crate::upstream::Upstream;

pub struct Service {
    config: Arc<Config>,
    upstream: Arc<Upstream>,
}

impl Service {
    /// No database; default HTTP client.
    pub fn new(config: Config) -> Self {
        Self::with_upstream(config, Upstream::new())
    }

    /// Use a pre-assembled `upstream` (database set, custom HTTP client, …).
    pub fn with_upstream(config: Config, upstream: Upstream) -> Self {
        Self { config: Arc::new(config), upstream: Arc::new(upstream) }
    }

    pub fn config(&self) -> &Arc<Config> {
        &self.config
    }

    pub fn upstream(&self) -> &Arc<Upstream> {
        &self.upstream
    }

    /// A router with `GET /health` already registered.
    pub fn router(&self) -> Router {
        let probe = HealthProbe::new(Arc::clone(&self.upstream));
        Router::new().get(HEALTH_PATH, probe.into_handler())
    }

    /// Wraps `app` in the configured middleware chain.
    pub fn pipeline(&self, app: Router) -> Result<Pipeline, Error> {
        Pipeline::from_config(&self.config, app)
    }

    /// Serves `app` on `0.0.0.0:<port>` until SIGTERM / Ctrl-C.
    ///
    /// A middleware configuration that cannot be served safely (see
    /// [`Error::InvalidTimeout`]) is logged and terminates the process.
    pub async fn serve(self, app: Router) -> Result<(), Error> {
        logging::init(&self.config.log.level);

        let pipeline = match self.pipeline(app) {
            Ok(pipeline) => pipeline,
            Err(e) => logging::fatal(format!("error in config: {e}")),
        };

        let addr = SocketAddr::from(([0, 0, 0, 0], self.config.port));
        Server::bind(addr).serve(pipeline).await
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use http::{Method, StatusCode};

    use super::*;
    use crate::request::Request;

    fn request(method: Method, path: &str) -> Request {
        http::Request::builder().method(method).uri(path).body(Bytes::new()).unwrap().into()
    }

    #[tokio::test]
    async fn router_answers_health() {
        let service = Service::new(Config::default());
        let res = service.router().dispatch(request(Method::GET, "/health")).await;
        assert_eq!(res.status_code(), StatusCode::OK);
        assert_eq!(res.body(), br#"{"status":"UP"}"#);

        let res = service.router().dispatch(request(Method::POST, "/health")).await;
        assert_eq!(res.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn pipeline_propagates_config_errors() {
        let mut config = Config::default();
        config.middleware.timeout.length = -3;
        let service = Service::new(config);
        assert!(matches!(service.pipeline(Router::new()), Err(Error::InvalidTimeout(-3))));
    }
}
