//! HTTP Basic authentication.
//!
//! Requests to [`HEALTH_PATH`] always pass: liveness probes must never need
//! credentials.
//!
//! Credentials are compared with plain string equality. There is no hashing
//! and no constant-time comparison.

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use http::header::AUTHORIZATION;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::exception::ErrorWriter;
use crate::handler::BoxFuture;
use crate::health::HEALTH_PATH;
use crate::middleware::{Middleware, Next};
use crate::request::Request;

/// `middleware.auth` settings.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    pub enabled: bool,
    pub user: String,
    #[serde(skip_serializing)]
    pub password: String,
}

pub struct AuthMiddleware {
    config: AuthConfig,
    errors: ErrorWriter,
}

impl AuthMiddleware {
    pub fn new(config: AuthConfig) -> Self {
        Self { config, errors: ErrorWriter::default() }
    }

    /// Rejections use `errors` instead of the default JSON envelope.
    pub fn with_error_writer(mut self, errors: ErrorWriter) -> Self {
        self.errors = errors;
        self
    }
}

impl Middleware for AuthMiddleware {
    fn handle(self: Arc<Self>, req: Request, next: Next) -> BoxFuture {
        if !self.config.enabled || req.path() == HEALTH_PATH {
            return next.run(req);
        }

        let Some((user, password)) = basic_credentials(&req) else {
            warn!(path = req.path(), "no credentials");
            let res = self.errors.unauthorised("No credentials");
            return Box::pin(async move { res });
        };

        if user != self.config.user || password != self.config.password {
            warn!(path = req.path(), %user, "bad credentials");
            let res = self.errors.unauthorised("Bad credentials");
            return Box::pin(async move { res });
        }

        next.run(req)
    }
}

/// Decodes `Authorization: Basic <base64(user:password)>`.
///
/// The scheme is matched case-insensitively; the password may itself
/// contain `:`. Anything malformed counts as no credentials.
pub fn basic_credentials(req: &Request) -> Option<(String, String)> {
    let header = req.header(AUTHORIZATION.as_str())?;
    let (scheme, encoded) = header.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }

    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (user, password) = decoded.split_once(':')?;
    Some((user.to_owned(), password.to_owned()))
}
