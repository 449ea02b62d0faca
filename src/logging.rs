//! Leveled logging.
//!
//! Every log line in waypost goes through [`tracing`]. This module only adds
//! the two things `tracing` does not ship: a one-call subscriber setup, and a
//! `fatal` level that terminates the process after logging.
//!
//! The level is always a parameter, never process-wide state, so concurrent
//! requests can log at different levels without stepping on each other.

use std::fmt;

use tracing_subscriber::EnvFilter;

/// Severity of a log message.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Level {
    Info,
    Warning,
    Error,
    /// Logged at error severity, then the process exits with status 1.
    Fatal,
}

impl Level {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Info    => "INFO",
            Self::Warning => "WARNING",
            Self::Error   => "ERROR",
            Self::Fatal   => "FATAL",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Installs a `fmt` subscriber.
///
/// `RUST_LOG` wins when set; otherwise `default_level` (e.g. `"info"`,
/// `"waypost=debug"`) is used. Calling this twice is harmless: the second
/// call leaves the first subscriber in place.
pub fn init(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Emits `message` at `level`.
///
/// [`Level::Fatal`] is logged but does **not** exit here. Use [`fatal`] for
/// that.
pub fn emit(level: Level, message: impl fmt::Display) {
    match level {
        Level::Info    => tracing::info!("{message}"),
        Level::Warning => tracing::warn!("{message}"),
        Level::Error   => tracing::error!("{message}"),
        Level::Fatal   => tracing::error!(fatal = true, "{message}"),
    }
}

/// Logs `message` and terminates the process with exit status 1.
///
/// Reserved for configuration errors discovered at startup. Per-request
/// failures never end up here.
pub fn fatal(message: impl fmt::Display) -> ! {
    emit(Level::Fatal, &message);
    if !has_subscriber() {
        // Config errors surface before `init` runs.
        eprintln!("[{}] {message}", Level::Fatal);
    }
    std::process::exit(1)
}

fn has_subscriber() -> bool {
    tracing::dispatcher::has_been_set()
}
