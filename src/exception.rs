//! Uniform error envelope.
//!
//! Every rejection the pipeline produces (bad credentials, blocked origin,
//! disallowed method, …) carries the same body:
//!
//! ```json
//! {"timestamp":"2026-10-16T08:00:00Z","status":401,"error":"Unauthorized","message":"…"}
//! ```

use http::StatusCode;
use serde::Serialize;

use crate::response::{Json, Response, Xml};

/// The error envelope. Built fresh for every error, never mutated.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename = "exception")]
pub struct Exception {
    pub timestamp: String,
    pub status: u16,
    pub error: String,
    pub message: String,
}

impl Exception {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            timestamp: jiff::Timestamp::now().to_string(),
            status: status.as_u16(),
            error: status.canonical_reason().unwrap_or_default().to_owned(),
            message: message.into(),
        }
    }
}

/// Wire format for [`Exception`] bodies.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Encoding {
    #[default]
    Json,
    Xml,
}

/// Turns a status + message into an envelope response.
#[derive(Clone, Copy, Debug, Default)]
pub struct ErrorWriter {
    encoding: Encoding,
}

impl ErrorWriter {
    pub fn new(encoding: Encoding) -> Self {
        Self { encoding }
    }

    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    /// Envelope response with an arbitrary status.
    pub fn exception(&self, status: StatusCode, message: impl Into<String>) -> Response {
        let body = Exception::new(status, message);
        match self.encoding {
            Encoding::Json => Json(body).with_status(status),
            Encoding::Xml  => Xml(body).with_status(status),
        }
    }

    /// `204 No Content`, no envelope.
    pub fn no_content(&self) -> Response {
        Response::status(StatusCode::NO_CONTENT)
    }

    pub fn unauthorised(&self, message: impl Into<String>) -> Response {
        self.exception(StatusCode::UNAUTHORIZED, message)
    }

    pub fn method_not_allowed(&self, message: impl Into<String>) -> Response {
        self.exception(StatusCode::METHOD_NOT_ALLOWED, message)
    }

    pub fn internal_server_error(&self, message: impl Into<String>) -> Response {
        self.exception(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    /// `400` for a query parameter that is missing or invalid.
    pub fn bad_parameters(&self, parameter: &str) -> Response {
        self.exception(
            StatusCode::BAD_REQUEST,
            format!("Parameter '{parameter}' is either missing or invalid"),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn envelope(res: &Response) -> serde_json::Value {
        serde_json::from_slice(res.body()).unwrap()
    }

    #[test]
    fn json_envelope_has_all_fields() {
        let res = ErrorWriter::default().unauthorised("go away");
        assert_eq!(res.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(res.header("content-type"), Some("application/json"));

        let body = envelope(&res);
        assert_eq!(body["status"], 401);
        assert_eq!(body["error"], "Unauthorized");
        assert_eq!(body["message"], "go away");
        assert!(body["timestamp"].as_str().is_some_and(|t| !t.is_empty()));
    }

    #[test]
    fn bad_parameters_names_the_parameter() {
        let res = ErrorWriter::default().bad_parameters("page");
        assert_eq!(res.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(envelope(&res)["message"], "Parameter 'page' is either missing or invalid");
    }

    #[test]
    fn xml_envelope() {
        let res = ErrorWriter::new(Encoding::Xml).method_not_allowed("nope");
        assert_eq!(res.status_code(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(res.header("content-type"), Some("application/xml"));

        let body = std::str::from_utf8(res.body()).unwrap();
        assert!(body.starts_with("<exception>"));
        assert!(body.contains("<status>405</status>"));
        assert!(body.contains("<error>Method Not Allowed</error>"));
        assert!(body.contains("<message>nope</message>"));
    }

    #[test]
    fn no_content_has_no_body() {
        let res = ErrorWriter::default().no_content();
        assert_eq!(res.status_code(), StatusCode::NO_CONTENT);
        assert!(res.body().is_empty());
    }
}
