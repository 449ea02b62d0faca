//! Unified error type.

/// The error type returned by waypost's fallible operations.
///
/// Per-request failures (401, 405, 408, 424, …) are expressed as HTTP
/// [`Response`](crate::Response) values, not as `Error`s. This type surfaces
/// infrastructure and configuration failures: binding to a port, reading a
/// config file, or a middleware setting that cannot be served safely.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("config: {0}")]
    Config(String),

    #[error("config: {0}")]
    Toml(#[from] toml::de::Error),

    /// A timeout length that cannot bound a request (zero or negative).
    #[error("config: timeout length must be a positive number of seconds, got {0}")]
    InvalidTimeout(i64),

    #[error("invalid socket address `{0}`")]
    InvalidAddress(String),
}
