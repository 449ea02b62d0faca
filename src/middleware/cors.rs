//! Cross-Origin Resource Sharing.
//!
//! # Preflight
//!
//! Every `OPTIONS` request is answered here and never reaches the router:
//!
//! ```text
//! Access-Control-Allow-Credentials: true
//! Access-Control-Allow-Origin:      <request Origin, echoed>
//! Access-Control-Allow-Methods:     <allowed methods, ", "-joined>
//! Access-Control-Allow-Headers:     Content-Type, Authorization
//! ```
//!
//! # Actual requests
//!
//! | Check | Failure |
//! |---|---|
//! | `Origin` in the allow-list (or the list is `{"*"}`) | `401` envelope |
//! | Method in the allow-list | `405` envelope |
//!
//! Requests that pass get the same four headers on their response. A header
//! the application already set is left as it is.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use http::header::{
    ACCESS_CONTROL_ALLOW_CREDENTIALS, ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
    ACCESS_CONTROL_ALLOW_ORIGIN, HeaderMap, HeaderName, HeaderValue, ORIGIN,
};
use http::Method;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{error, warn};

use crate::exception::ErrorWriter;
use crate::handler::BoxFuture;
use crate::middleware::{Middleware, Next};
use crate::request::Request;
use crate::response::Response;

/// Matches every origin.
pub const ANY_ORIGIN: &str = "*";

const ALLOW_HEADERS: &str = "Content-Type, Authorization";

/// Methods a config file may allow. `OPTIONS` is always handled.
const CONFIGURABLE_METHODS: [&str; 4] = ["GET", "PUT", "POST", "DELETE"];

// ── Config ────────────────────────────────────────────────────────────────────

/// `middleware.cors` settings.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CorsConfig {
    pub enabled: bool,
    #[serde(deserialize_with = "deserialize_origins")]
    allowed_origins: HashSet<String>,
    #[serde(deserialize_with = "deserialize_methods")]
    allowed_methods: BTreeSet<String>,
}

impl CorsConfig {
    /// Origins containing `"*"` collapse to exactly `{"*"}`. Methods are
    /// upper-cased.
    pub fn new<O, M>(enabled: bool, origins: O, methods: M) -> Self
    where
        O: IntoIterator,
        O::Item: Into<String>,
        M: IntoIterator,
        M::Item: Into<String>,
    {
        Self {
            enabled,
            allowed_origins: normalize_origins(origins.into_iter().map(Into::into)),
            allowed_methods: methods.into_iter().map(|m| m.into().to_ascii_uppercase()).collect(),
        }
    }

    /// Permissive policy: any origin; GET, HEAD, PUT, PATCH, POST, DELETE.
    /// Enabled.
    pub fn default_policy() -> Self {
        Self::new(
            true,
            [ANY_ORIGIN],
            [Method::GET, Method::HEAD, Method::PUT, Method::PATCH, Method::POST, Method::DELETE]
                .iter()
                .map(Method::as_str),
        )
    }

    pub fn allowed_origins(&self) -> &HashSet<String> {
        &self.allowed_origins
    }

    pub fn allowed_methods(&self) -> &BTreeSet<String> {
        &self.allowed_methods
    }

    /// `"*"` short-circuits: no other entry is consulted.
    pub fn allows_origin(&self, origin: &str) -> bool {
        self.allowed_origins.contains(ANY_ORIGIN) || self.allowed_origins.contains(origin)
    }

    pub fn allows_method(&self, method: &Method) -> bool {
        self.allowed_methods.contains(method.as_str())
    }
}

/// Disabled; any origin; `GET` only.
impl Default for CorsConfig {
    fn default() -> Self {
        Self::new(false, [ANY_ORIGIN], ["GET"])
    }
}

fn normalize_origins(origins: impl Iterator<Item = String>) -> HashSet<String> {
    let mut set = HashSet::new();
    for origin in origins {
        if origin == ANY_ORIGIN {
            return HashSet::from([origin]);
        }
        set.insert(origin);
    }
    set
}

fn deserialize_origins<'de, D: Deserializer<'de>>(d: D) -> Result<HashSet<String>, D::Error> {
    let raw = Vec::<String>::deserialize(d)?;
    Ok(normalize_origins(raw.into_iter()))
}

/// Keeps only [`CONFIGURABLE_METHODS`], case-insensitively; the rest are
/// dropped with a warning.
fn deserialize_methods<'de, D: Deserializer<'de>>(d: D) -> Result<BTreeSet<String>, D::Error> {
    let raw = Vec::<String>::deserialize(d)?;
    let mut set = BTreeSet::new();
    for method in raw {
        let upper = method.to_ascii_uppercase();
        if CONFIGURABLE_METHODS.contains(&upper.as_str()) {
            set.insert(upper);
        } else {
            warn!(%method, "ignoring unsupported CORS method");
        }
    }
    Ok(set)
}

// ── Middleware ────────────────────────────────────────────────────────────────

pub struct CorsMiddleware {
    config: CorsConfig,
    errors: ErrorWriter,
    /// Pre-joined once; the set never changes after construction.
    allow_methods: HeaderValue,
}

impl CorsMiddleware {
    pub fn new(config: CorsConfig) -> Self {
        let joined = config.allowed_methods.iter().map(String::as_str).collect::<Vec<_>>().join(", ");
        // Methods are upper-cased tokens, always a valid header value.
        let allow_methods = HeaderValue::try_from(joined).unwrap_or(HeaderValue::from_static(""));
        Self { config, errors: ErrorWriter::default(), allow_methods }
    }

    /// Rejections use `errors` instead of the default JSON envelope.
    pub fn with_error_writer(mut self, errors: ErrorWriter) -> Self {
        self.errors = errors;
        self
    }

    fn cors_headers(&self, origin: &HeaderValue) -> [(HeaderName, HeaderValue); 4] {
        [
            (ACCESS_CONTROL_ALLOW_CREDENTIALS, HeaderValue::from_static("true")),
            (ACCESS_CONTROL_ALLOW_ORIGIN, origin.clone()),
            (ACCESS_CONTROL_ALLOW_METHODS, self.allow_methods.clone()),
            (ACCESS_CONTROL_ALLOW_HEADERS, HeaderValue::from_static(ALLOW_HEADERS)),
        ]
    }
}

impl Middleware for CorsMiddleware {
    fn handle(self: Arc<Self>, req: Request, next: Next) -> BoxFuture {
        if !self.config.enabled {
            return next.run(req);
        }

        let origin_value = req.headers().get(ORIGIN).cloned()
            .unwrap_or(HeaderValue::from_static(""));
        let origin = origin_value.to_str().unwrap_or_default().to_owned();

        if req.method() == Method::OPTIONS {
            let mut res = Response::builder().no_body();
            res.headers_mut().extend(self.cors_headers(&origin_value));
            return Box::pin(async move { res });
        }

        if !self.config.allows_origin(&origin) {
            error!(%origin, "a request from {origin} has been blocked");
            let res = self.errors.unauthorised("Requests from your domain aren't allowed");
            return Box::pin(async move { res });
        }

        if !self.config.allows_method(req.method()) {
            let method = req.method().clone();
            error!(%origin, %method, "a {method} request from {origin} has been blocked");
            let res = self.errors.method_not_allowed("Method not allowed");
            return Box::pin(async move { res });
        }

        Box::pin(async move {
            let mut res = next.run(req).await;
            attach(res.headers_mut(), self.cors_headers(&origin_value));
            res
        })
    }
}

fn attach(headers: &mut HeaderMap, cors: [(HeaderName, HeaderValue); 4]) {
    for (name, value) in cors {
        headers.entry(name).or_insert(value);
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use http::StatusCode;

    use super::*;
    use crate::exception::Encoding;
    use crate::pipeline::Pipeline;
    use crate::router::Router;

    fn pipeline(config: CorsConfig) -> Pipeline {
        let ok = |_req: Request| async { Response::text("ok") };
        Pipeline::builder()
            .layer(CorsMiddleware::new(config))
            .build(
                Router::new()
                    .get("/", ok)
                    .put("/", ok)
                    .delete("/", ok)
                    .get("/styled", |_req: Request| async {
                        Response::builder()
                            .header("access-control-allow-headers", "X-Custom")
                            .text("styled")
                    }),
            )
    }

    fn request(method: Method, path: &str, origin: Option<&str>) -> Request {
        let mut builder = http::Request::builder().method(method).uri(path);
        if let Some(origin) = origin {
            builder = builder.header("origin", origin);
        }
        builder.body(Bytes::new()).unwrap().into()
    }

    fn methods_of(res: &Response) -> BTreeSet<String> {
        res.header("access-control-allow-methods")
            .unwrap()
            .split(", ")
            .map(str::to_owned)
            .collect()
    }

    fn message(res: &Response) -> String {
        let body: serde_json::Value = serde_json::from_slice(res.body()).unwrap();
        body["message"].as_str().unwrap().to_owned()
    }

    fn restricted() -> CorsConfig {
        CorsConfig::new(true, ["https://app.example.com"], ["GET", "put"])
    }

    #[test]
    fn default_policy_is_permissive() {
        let config = CorsConfig::default_policy();
        assert!(config.enabled);
        assert_eq!(config.allowed_origins(), &HashSet::from(["*".to_owned()]));
        let expected: BTreeSet<String> = ["GET", "HEAD", "PUT", "PATCH", "POST", "DELETE"]
            .into_iter()
            .map(str::to_owned)
            .collect();
        assert_eq!(config.allowed_methods(), &expected);
    }

    #[test]
    fn wildcard_collapses_origin_set() {
        let config = CorsConfig::new(true, ["https://a.example", "*", "https://b.example"], ["GET"]);
        assert_eq!(config.allowed_origins().len(), 1);
        assert!(config.allows_origin("https://anything.example"));
        assert!(config.allows_origin(""));
    }

    #[tokio::test]
    async fn preflight_is_answered_directly() {
        let res = pipeline(restricted())
            .handle(request(Method::OPTIONS, "/not-routed", Some("https://elsewhere.example")))
            .await;

        assert_eq!(res.status_code(), StatusCode::OK);
        assert!(res.body().is_empty());
        assert_eq!(res.header("access-control-allow-credentials"), Some("true"));
        assert_eq!(res.header("access-control-allow-origin"), Some("https://elsewhere.example"));
        assert_eq!(res.header("access-control-allow-headers"), Some("Content-Type, Authorization"));
        assert_eq!(methods_of(&res), BTreeSet::from(["GET".to_owned(), "PUT".to_owned()]));
    }

    #[tokio::test]
    async fn disallowed_origin_is_401() {
        let res = pipeline(restricted())
            .handle(request(Method::GET, "/", Some("https://evil.example")))
            .await;

        assert_eq!(res.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(message(&res), "Requests from your domain aren't allowed");
    }

    #[tokio::test]
    async fn xml_writer_shapes_the_rejection() {
        let pipeline = Pipeline::builder()
            .layer(CorsMiddleware::new(restricted()).with_error_writer(ErrorWriter::new(Encoding::Xml)))
            .build(Router::new().get("/", |_req: Request| async { Response::text("ok") }));

        let res = pipeline
            .handle(request(Method::GET, "/", Some("https://evil.example")))
            .await;
        assert_eq!(res.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(res.header("content-type"), Some("application/xml"));

        let body = std::str::from_utf8(res.body()).unwrap();
        assert!(body.starts_with("<exception>"));
        assert!(body.contains("<status>401</status>"));
        assert!(body.contains("<error>Unauthorized</error>"));
    }

    #[tokio::test]
    async fn missing_origin_needs_wildcard() {
        let res = pipeline(restricted()).handle(request(Method::GET, "/", None)).await;
        assert_eq!(res.status_code(), StatusCode::UNAUTHORIZED);

        let open = CorsConfig::new(true, ["*"], ["GET"]);
        let res = pipeline(open).handle(request(Method::GET, "/", None)).await;
        assert_eq!(res.status_code(), StatusCode::OK);
    }

    #[tokio::test]
    async fn disallowed_method_is_405() {
        let res = pipeline(restricted())
            .handle(request(Method::DELETE, "/", Some("https://app.example.com")))
            .await;

        assert_eq!(res.status_code(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(message(&res), "Method not allowed");
    }

    #[tokio::test]
    async fn allowed_request_carries_cors_headers() {
        let res = pipeline(restricted())
            .handle(request(Method::PUT, "/", Some("https://app.example.com")))
            .await;

        assert_eq!(res.status_code(), StatusCode::OK);
        assert_eq!(res.body(), b"ok");
        assert_eq!(res.header("access-control-allow-origin"), Some("https://app.example.com"));
        assert_eq!(res.header("access-control-allow-credentials"), Some("true"));
        assert_eq!(methods_of(&res).len(), 2);
    }

    #[tokio::test]
    async fn application_headers_win() {
        let res = pipeline(CorsConfig::new(true, ["*"], ["GET"]))
            .handle(request(Method::GET, "/styled", Some("https://app.example.com")))
            .await;

        assert_eq!(res.header("access-control-allow-headers"), Some("X-Custom"));
        assert_eq!(res.header("access-control-allow-origin"), Some("https://app.example.com"));
    }

    #[tokio::test]
    async fn disabled_passes_everything() {
        let config = CorsConfig::new(false, ["https://app.example.com"], ["GET"]);
        let res = pipeline(config.clone())
            .handle(request(Method::DELETE, "/", Some("https://evil.example")))
            .await;
        assert_eq!(res.status_code(), StatusCode::OK);
        assert!(res.header("access-control-allow-origin").is_none());

        // Preflight falls through to the router, which has no OPTIONS routes.
        let res = pipeline(config)
            .handle(request(Method::OPTIONS, "/", Some("https://evil.example")))
            .await;
        assert_eq!(res.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn config_file_methods_are_restricted() {
        let config: CorsConfig = toml::from_str(
            r#"
            enabled = true
            allowed-origins = ["https://a.example", "https://b.example"]
            allowed-methods = ["get", "Post", "PATCH", "TRACE", "DELETE"]
            "#,
        )
        .unwrap();

        assert_eq!(config.allowed_origins().len(), 2);
        assert!(!config.allows_origin("https://c.example"));
        assert_eq!(
            config.allowed_methods().iter().map(String::as_str).collect::<Vec<_>>(),
            ["DELETE", "GET", "POST"],
        );
    }
}
