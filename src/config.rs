//! Server configuration from an optional TOML file plus `FEEDREADER_*`
//! environment overrides.
//!
//! Every key is optional. Environment variables win over the file.
use serde::Deserialize;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::util::HostPolicy;

/// Prefix of every environment override.
pub const ENV_PREFIX: &str = "FEEDREADER_";

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Cannot read config: {0}")]
    Io(#[from] io::Error),

    /// Syntax error or a value of the wrong type.
    #[error("Invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Config file too big: {0}")]
    TooLarge(String),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level server configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Address the HTTP API listens on.
    pub bind: String,
    pub port: u16,
    /// SQLite file, created on first start.
    pub database_path: String,
    /// Deadline for one paginated listing, in seconds.
    pub request_timeout_secs: u64,
    /// Permit subscribing to localhost and private-range hosts.
    pub allow_private_hosts: bool,
    pub poller: PollerConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PollerConfig {
    pub enabled: bool,
    pub interval_minutes: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: 8080,
            database_path: "feedreader.db".to_string(),
            request_timeout_secs: 10,
            allow_private_hosts: false,
            poller: PollerConfig::default(),
        }
    }
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_minutes: 60,
        }
    }
}

impl Config {
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 6] = [
        "bind",
        "port",
        "database_path",
        "request_timeout_secs",
        "allow_private_hosts",
        "poller",
    ];
    const KNOWN_POLLER_KEYS: [&'static str; 2] = ["enabled", "interval_minutes"];

    /// Read `path`, falling back to defaults when it is missing or blank.
    ///
    /// Keys this version does not know are logged and otherwise ignored, so
    /// an older binary still starts with a newer config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let Some(content) = read_capped(path, Self::MAX_FILE_SIZE)? else {
            tracing::debug!(path = %path.display(), "No config file found, using defaults");
            return Ok(Self::default());
        };
        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        let table: toml::Table = content.parse()?;
        warn_unknown_keys(&table);

        let config: Config = toml::Value::Table(table).try_into()?;
        tracing::info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Apply `FEEDREADER_*` overrides read through `lookup`.
    ///
    /// Values that do not parse for their key are ignored with a warning.
    /// `lookup` is usually `|key| std::env::var(key).ok()`.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |suffix: &str| {
            let key = format!("{ENV_PREFIX}{suffix}");
            lookup(&key).map(|value| (key, value))
        };

        if let Some((_, value)) = var("BIND") {
            self.bind = value;
        }
        if let Some((_, value)) = var("DATABASE_PATH") {
            self.database_path = value;
        }
        override_parsed(&mut self.port, var("PORT"));
        override_parsed(&mut self.request_timeout_secs, var("REQUEST_TIMEOUT_SECS"));
        override_parsed(&mut self.allow_private_hosts, var("ALLOW_PRIVATE_HOSTS"));
        override_parsed(&mut self.poller.enabled, var("POLLER_ENABLED"));
        override_parsed(&mut self.poller.interval_minutes, var("POLLER_INTERVAL_MINUTES"));
    }

    /// `bind:port`, ready for `TcpListener::bind`.
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn host_policy(&self) -> HostPolicy {
        if self.allow_private_hosts {
            HostPolicy::AllowPrivate
        } else {
            HostPolicy::PublicOnly
        }
    }
}

impl PollerConfig {
    /// Poll interval, at least one minute.
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_minutes.max(1).saturating_mul(60))
    }
}

/// Whole file as text, `None` if it does not exist.
fn read_capped(path: &Path, max: u64) -> Result<Option<String>, ConfigError> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let mut content = String::new();
    file.take(max + 1).read_to_string(&mut content)?;
    if content.len() as u64 > max {
        return Err(ConfigError::TooLarge(format!(
            "{} exceeds {} bytes",
            path.display(),
            max
        )));
    }
    Ok(Some(content))
}

fn warn_unknown_keys(table: &toml::Table) {
    let unknown_top = table
        .keys()
        .filter(|key| !Config::KNOWN_KEYS.contains(&key.as_str()))
        .cloned();
    let unknown_poller = table
        .get("poller")
        .and_then(toml::Value::as_table)
        .into_iter()
        .flat_map(|poller| poller.keys())
        .filter(|key| !Config::KNOWN_POLLER_KEYS.contains(&key.as_str()))
        .map(|key| format!("poller.{key}"));

    for key in unknown_top.chain(unknown_poller) {
        tracing::warn!(key = %key, "Unknown config key ignored");
    }
}

fn override_parsed<T: FromStr>(field: &mut T, var: Option<(String, String)>) {
    let Some((key, raw)) = var else {
        return;
    };
    match raw.trim().parse::<T>() {
        Ok(value) => *field = value,
        Err(_) => tracing::warn!(key = %key, value = %raw, "Ignoring unparseable environment override"),
    }
}

// ============================================================================
// Tests
// ============================================================================
