//! Liveness probe.
//!
//! | Request | Database | Response |
//! |---|---|---|
//! | `GET /health` | none configured | `200 {"status":"UP"}` |
//! | `GET /health` | ping succeeds | `200 {"status":"UP"}` |
//! | `GET /health` | ping fails or request cancelled | `424 Failed Dependency`, no body |
//! | anything else routed here | — | `404` |
//!
//! [`Service::router`](crate::Service::router) registers the probe for you.
//! To register it on a router of your own:
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use waypost::{Router, health::HealthProbe, upstream::Upstream};
//!
//! let probe = HealthProbe::new(Arc::new(Upstream::new()));
//! let app = Router::new().get("/health", probe.into_handler());
//! ```

use std::sync::Arc;

use http::StatusCode;
use serde::Serialize;
use tracing::error;

use crate::handler::Handler;
use crate::request::Request;
use crate::response::{IntoResponse, Json, Response};
use crate::upstream::{Upstream, UpstreamError};

/// The only path the probe answers.
pub const HEALTH_PATH: &str = "/health";

#[derive(Debug, Serialize)]
struct Health {
    status: &'static str,
}

/// Answers liveness queries, pinging the upstream database when one is set.
#[derive(Clone)]
pub struct HealthProbe {
    upstream: Arc<Upstream>,
}

impl HealthProbe {
    pub fn new(upstream: Arc<Upstream>) -> Self {
        Self { upstream }
    }

    pub async fn probe(&self, req: Request) -> Response {
        if req.path() != HEALTH_PATH {
            return Response::status(StatusCode::NOT_FOUND);
        }

        if let Some(db) = self.upstream.database() {
            let ping = tokio::select! {
                res = db.ping() => res,
                () = req.cancelled() => Err(UpstreamError::Cancelled),
            };
            if let Err(e) = ping {
                error!("database ping failed: {e}");
                return Response::status(StatusCode::FAILED_DEPENDENCY);
            }
        }

        Json(Health { status: "UP" }).into_response()
    }

    /// Wraps the probe as a route handler.
    pub fn into_handler(self) -> impl Handler {
        move |req: Request| {
            let probe = self.clone();
            async move { probe.probe(req).await }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use bytes::Bytes;

    use super::*;
    use crate::upstream::{Database, PingFuture};

    struct Db(Result<(), &'static str>);

    impl Database for Db {
        fn ping(&self) -> PingFuture<'_> {
            let res = self.0.map_err(|e| UpstreamError::Database(e.to_owned()));
            Box::pin(async move { res })
        }
    }

    struct Hung;

    impl Database for Hung {
        fn ping(&self) -> PingFuture<'_> {
            Box::pin(async {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(())
            })
        }
    }

    fn probe(db: Option<Arc<dyn Database>>) -> HealthProbe {
        let mut upstream = Upstream::new();
        if let Some(db) = db {
            upstream.set_database(db);
        }
        HealthProbe::new(Arc::new(upstream))
    }

    fn request(path: &str) -> Request {
        http::Request::builder().uri(path).body(Bytes::new()).unwrap().into()
    }

    #[tokio::test]
    async fn up_without_database() {
        let res = probe(None).probe(request("/health")).await;
        assert_eq!(res.status_code(), StatusCode::OK);
        assert_eq!(res.header("content-type"), Some("application/json"));
        assert_eq!(res.body(), br#"{"status":"UP"}"#);
    }

    #[tokio::test]
    async fn up_when_ping_succeeds() {
        let res = probe(Some(Arc::new(Db(Ok(()))))).probe(request("/health")).await;
        assert_eq!(res.status_code(), StatusCode::OK);
        assert_eq!(res.body(), br#"{"status":"UP"}"#);
    }

    #[tokio::test]
    async fn failed_dependency_when_ping_fails() {
        let res = probe(Some(Arc::new(Db(Err("connection refused"))))).probe(request("/health")).await;
        assert_eq!(res.status_code(), StatusCode::FAILED_DEPENDENCY);
        assert!(res.body().is_empty());
    }

    #[tokio::test]
    async fn cancellation_aborts_the_ping() {
        let req = request("/health");
        req.scope().cancel();
        let res = probe(Some(Arc::new(Hung))).probe(req).await;
        assert_eq!(res.status_code(), StatusCode::FAILED_DEPENDENCY);
    }

    #[tokio::test]
    async fn other_paths_are_not_found() {
        let res = probe(None).probe(request("/healthz")).await;
        assert_eq!(res.status_code(), StatusCode::NOT_FOUND);
    }
}
