//! Response compression.
//!
//! Compresses the response body with gzip when the client lists `gzip` in
//! `Accept-Encoding` (with a non-zero q-value). Bodies that are empty,
//! already encoded, or attached to `204` / `304` are left alone.

use std::io::Write;
use std::sync::Arc;

use flate2::Compression;
use flate2::write::GzEncoder;
use http::header::{ACCEPT_ENCODING, CONTENT_ENCODING, CONTENT_LENGTH, HeaderValue, VARY};
use http::StatusCode;
use serde::{Deserialize, Serialize};

use crate::handler::BoxFuture;
use crate::middleware::{Middleware, Next};
use crate::request::Request;
use crate::response::Response;

/// `middleware.gzip` settings.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct GzipConfig {
    pub enabled: bool,
}

impl Default for GzipConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

pub struct GzipMiddleware {
    config: GzipConfig,
}

impl GzipMiddleware {
    pub fn new(config: GzipConfig) -> Self {
        Self { config }
    }
}

impl Middleware for GzipMiddleware {
    fn handle(self: Arc<Self>, req: Request, next: Next) -> BoxFuture {
        if !self.config.enabled {
            return next.run(req);
        }

        let wants_gzip = req.header(ACCEPT_ENCODING.as_str()).is_some_and(accepts_gzip);

        Box::pin(async move {
            let mut res = next.run(req).await;
            if wants_gzip && compressible(&res) {
                compress(&mut res);
            }
            res
        })
    }
}

/// `true` when `header` lists `gzip` (or `*`) without `q=0`.
fn accepts_gzip(header: &str) -> bool {
    header.split(',').any(|item| {
        let mut parts = item.split(';').map(str::trim);
        let coding = parts.next().unwrap_or_default();
        if !coding.eq_ignore_ascii_case("gzip") && coding != "*" {
            return false;
        }
        parts
            .filter_map(|p| p.strip_prefix("q="))
            .all(|q| q.parse::<f32>().is_ok_and(|q| q > 0.0))
    })
}

fn compressible(res: &Response) -> bool {
    !res.body().is_empty()
        && !res.headers().contains_key(CONTENT_ENCODING)
        && res.status_code() != StatusCode::NO_CONTENT
        && res.status_code() != StatusCode::NOT_MODIFIED
}

fn compress(res: &mut Response) {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    let encoded = encoder.write_all(res.body()).and_then(|()| encoder.finish());

    match encoded {
        Ok(body) => {
            res.set_body(body);
            let headers = res.headers_mut();
            headers.remove(CONTENT_LENGTH);
            headers.insert(CONTENT_ENCODING, HeaderValue::from_static("gzip"));
            headers.append(VARY, HeaderValue::from_static("accept-encoding"));
        }
        Err(e) => tracing::warn!("gzip failed, sending uncompressed: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use bytes::Bytes;
    use flate2::read::GzDecoder;

    use super::*;
    use crate::pipeline::Pipeline;
    use crate::router::Router;

    const BODY: &str = "the quick brown fox jumps over the lazy dog, repeatedly";

    fn pipeline(enabled: bool) -> Pipeline {
        Pipeline::builder()
            .layer(GzipMiddleware::new(GzipConfig { enabled }))
            .build(
                Router::new()
                    .get("/", |_req: Request| async { Response::text(BODY) })
                    .get("/empty", |_req: Request| async { StatusCode::NO_CONTENT }),
            )
    }

    fn request(path: &str, accept: Option<&str>) -> Request {
        let mut builder = http::Request::builder().uri(path);
        if let Some(accept) = accept {
            builder = builder.header("accept-encoding", accept);
        }
        builder.body(Bytes::new()).unwrap().into()
    }

    #[test]
    fn accept_encoding_parsing() {
        assert!(accepts_gzip("gzip"));
        assert!(accepts_gzip("deflate, GZIP;q=0.5"));
        assert!(accepts_gzip("br, *"));
        assert!(!accepts_gzip("gzip;q=0"));
        assert!(!accepts_gzip("deflate, br"));
        assert!(!accepts_gzip(""));
    }

    #[tokio::test]
    async fn compresses_when_accepted() {
        let res = pipeline(true).handle(request("/", Some("gzip, deflate"))).await;

        assert_eq!(res.header("content-encoding"), Some("gzip"));
        assert_eq!(res.header("vary"), Some("accept-encoding"));

        let mut decoded = String::new();
        GzDecoder::new(res.body()).read_to_string(&mut decoded).unwrap();
        assert_eq!(decoded, BODY);
    }

    #[tokio::test]
    async fn plain_without_accept_encoding() {
        let res = pipeline(true).handle(request("/", None)).await;
        assert!(res.header("content-encoding").is_none());
        assert_eq!(res.body(), BODY.as_bytes());
    }

    #[tokio::test]
    async fn disabled_never_compresses() {
        let res = pipeline(false).handle(request("/", Some("gzip"))).await;
        assert!(res.header("content-encoding").is_none());
        assert_eq!(res.body(), BODY.as_bytes());
    }

    #[tokio::test]
    async fn empty_bodies_are_left_alone() {
        let res = pipeline(true).handle(request("/empty", Some("gzip"))).await;
        assert_eq!(res.status_code(), StatusCode::NO_CONTENT);
        assert!(res.header("content-encoding").is_none());
    }
}
