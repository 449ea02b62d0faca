//! Configuration.
//!
//! Sources, lowest precedence first:
//!
//! 1. Built-in defaults
//! 2. A TOML file (`--config <file>`, else `./.config.toml` when present)
//! 3. Environment variables (`PORT`, `API_USER`, `API_PASSWORD`, `DB_*`)
//! 4. Command-line flags (`--port`)
//!
//! ```toml
//! port = 8080
//!
//! [log]
//! level = "info"
//!
//! [middleware.timeout]
//! enabled = true
//! length = 30
//!
//! [middleware.gzip]
//! enabled = true
//!
//! [middleware.auth]
//! enabled = false
//! user = ""
//! password = ""
//!
//! [middleware.cors]
//! enabled = false
//! allowed-origins = ["*"]
//! allowed-methods = ["GET"]
//!
//! [db]
//! url = ""
//! ```
//!
//! The resulting [`Config`] is read-only once loaded.

use std::path::{Path, PathBuf};

use clap::Parser;
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::middleware::{AuthConfig, CorsConfig, GzipConfig, TimeoutConfig};

/// Used when `--config` is not given and this file exists.
pub const DEFAULT_CONFIG_FILE: &str = ".config.toml";

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub port: u16,
    pub log: LogConfig,
    pub middleware: MiddlewareConfig,
    pub db: DbConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            log: LogConfig::default(),
            middleware: MiddlewareConfig::default(),
            db: DbConfig::default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct LogConfig {
    /// An `EnvFilter` directive. `RUST_LOG` overrides it.
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self { level: "info".to_owned() }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct MiddlewareConfig {
    pub timeout: TimeoutConfig,
    pub gzip: GzipConfig,
    pub auth: AuthConfig,
    pub cors: CorsConfig,
}

/// Database coordinates for the application's own pool. waypost does not
/// connect; hand the pool to [`Upstream::set_database`](crate::upstream::Upstream::set_database).
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct DbConfig {
    /// Including the port.
    pub url: String,
    pub name: String,
    pub user: String,
    #[serde(skip_serializing)]
    pub password: String,
}

impl Config {
    pub fn from_toml(source: &str) -> Result<Self, Error> {
        Ok(toml::from_str(source)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, Error> {
        let source = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_toml(&source)
    }

    /// Applies environment overrides from the process environment.
    pub fn apply_env(&mut self) -> Result<(), Error> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Applies environment overrides, reading variables through `lookup`.
    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), Error> {
        if let Some(port) = lookup("PORT") {
            self.port = port
                .parse()
                .map_err(|_| Error::Config(format!("PORT is not a valid port: `{port}`")))?;
        }

        let auth = &mut self.middleware.auth;
        let db = &mut self.db;
        let bindings: [(&str, &mut String); 6] = [
            ("API_USER", &mut auth.user),
            ("API_PASSWORD", &mut auth.password),
            ("DB_URL", &mut db.url),
            ("DB_NAME", &mut db.name),
            ("DB_USER", &mut db.user),
            ("DB_PASSWORD", &mut db.password),
        ];
        for (key, field) in bindings {
            if let Some(value) = lookup(key) {
                *field = value;
            }
        }
        Ok(())
    }
}

// ── Command line ──────────────────────────────────────────────────────────────

/// Command-line flags.
#[derive(Debug, Default, Parser)]
#[command(version, about)]
pub struct Cli {
    /// Config file (default is ./.config.toml)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Print application configuration on startup
    #[arg(long)]
    pub print_config: bool,

    /// Port to run the application server on
    #[arg(short, long)]
    pub port: Option<u16>,
}

impl Cli {
    /// Resolves the effective configuration: defaults, file, environment,
    /// then flags. Prints it as JSON first when `--print-config` is set.
    pub fn load(&self) -> Result<Config, Error> {
        let mut config = match &self.config {
            Some(path) => Config::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Config::from_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => Config::default(),
        };

        config.apply_env()?;

        if let Some(port) = self.port {
            config.port = port;
        }

        if self.print_config {
            let pretty = serde_json::to_string_pretty(&config)
                .map_err(|e| Error::Config(e.to_string()))?;
            println!("{pretty}");
        }

        Ok(config)
    }
}
