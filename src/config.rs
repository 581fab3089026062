// src/config.rs
//! Service configuration: defaults, optional TOML file, then environment.
//!
//! Lookup order for the file:
//! 1) $STATS_CONFIG_PATH (must exist when set)
//! 2) config/stats.toml (optional)
//!
//! Environment variables always win over the file. A value that fails to
//! parse is ignored and the previous value (file or default) is kept; the
//! result is then checked by [`Config::validate`].

use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

// --- env names ---
pub const ENV_CONFIG_PATH: &str = "STATS_CONFIG_PATH";
pub const ENV_HOST: &str = "HOST";
pub const ENV_PORT: &str = "PORT";
pub const ENV_WINDOW_SECONDS: &str = "STATS_WINDOW_SECONDS";
pub const ENV_READ_TIMEOUT: &str = "READ_TIMEOUT";
pub const ENV_WRITE_TIMEOUT: &str = "WRITE_TIMEOUT";
pub const ENV_IDLE_TIMEOUT: &str = "IDLE_TIMEOUT";
pub const ENV_SHUTDOWN_TIMEOUT: &str = "SHUTDOWN_TIMEOUT";
pub const ENV_LOG_LEVEL: &str = "LOG_LEVEL";
pub const ENV_LOG_FORMAT: &str = "LOG_FORMAT";
pub const ENV_METRICS_ROUTE: &str = "METRICS_ROUTE";

pub const DEFAULT_CONFIG_PATH: &str = "config/stats.toml";

// --- defaults ---
const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: &str = "8080";
const DEFAULT_WINDOW_SECONDS: i64 = 60;
/// Ten years. Longer windows are refused by `validate`.
pub const MAX_WINDOW_SECONDS: i64 = 10 * 365 * 24 * 60 * 60;
const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(15);
const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

impl LogFormat {
    fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "compact" | "text" | "" => Some(LogFormat::Compact),
            "json" => Some(LogFormat::Json),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub host: String,
    pub port: String,
    pub read_timeout: Duration,
    pub write_timeout: Duration,
    /// Validated and logged at startup only; `axum::serve` has no idle
    /// setting, so it does not affect connections.
    pub idle_timeout: Duration,
    pub shutdown_timeout: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatsConfig {
    pub window_seconds: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub server: ServerConfig,
    pub stats: StatsConfig,
    pub log_level: String,
    /// Raw value; checked by `validate`, read through [`Config::log_format`].
    pub log_format: String,
    pub metrics_route: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: DEFAULT_HOST.to_string(),
                port: DEFAULT_PORT.to_string(),
                read_timeout: DEFAULT_READ_TIMEOUT,
                write_timeout: DEFAULT_WRITE_TIMEOUT,
                idle_timeout: DEFAULT_IDLE_TIMEOUT,
                shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            },
            stats: StatsConfig {
                window_seconds: DEFAULT_WINDOW_SECONDS,
            },
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            log_format: "compact".to_string(),
            metrics_route: false,
        }
    }
}

/* ----------------------------
File schema (all optional)
---------------------------- */

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    #[serde(default)]
    server: FileServer,
    #[serde(default)]
    stats: FileStats,
    #[serde(default)]
    log: FileLog,
    #[serde(default)]
    metrics_route: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileServer {
    host: Option<String>,
    port: Option<PortValue>,
    read_timeout: Option<String>,
    write_timeout: Option<String>,
    idle_timeout: Option<String>,
    shutdown_timeout: Option<String>,
}

/// Ports may be written as `8080` or `"8080"`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PortValue {
    Num(u16),
    Text(String),
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileStats {
    window_seconds: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileLog {
    level: Option<String>,
    format: Option<String>,
}

impl Config {
    /// Defaults → config file → process environment, then validate.
    pub fn load() -> Result<Self> {
        let mut cfg = Config::default();
        if let Some(path) = config_file_path()? {
            cfg.apply_file(&path)?;
        }
        cfg.apply_env(|k| std::env::var(k).ok());
        cfg.validate()
            .context("configuration validation failed")?;
        Ok(cfg)
    }

    /// Merge values from a TOML file.
    pub fn apply_file(&mut self, path: &Path) -> Result<()> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        self.apply_toml(&content)
            .with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn apply_toml(&mut self, content: &str) -> Result<()> {
        let file: FileConfig = toml::from_str(content)?;

        if let Some(h) = file.server.host {
            self.server.host = h;
        }
        match file.server.port {
            Some(PortValue::Num(p)) => self.server.port = p.to_string(),
            Some(PortValue::Text(p)) => self.server.port = p,
            None => {}
        }
        for (raw, slot, name) in [
            (file.server.read_timeout, &mut self.server.read_timeout, "read_timeout"),
            (file.server.write_timeout, &mut self.server.write_timeout, "write_timeout"),
            (file.server.idle_timeout, &mut self.server.idle_timeout, "idle_timeout"),
            (
                file.server.shutdown_timeout,
                &mut self.server.shutdown_timeout,
                "shutdown_timeout",
            ),
        ] {
            if let Some(raw) = raw {
                *slot = parse_duration(&raw)
                    .ok_or_else(|| anyhow!("server.{name}: invalid duration '{raw}'"))?;
            }
        }
        if let Some(w) = file.stats.window_seconds {
            self.stats.window_seconds = w;
        }
        if let Some(l) = file.log.level {
            self.log_level = l;
        }
        if let Some(f) = file.log.format {
            self.log_format = f;
        }
        if let Some(m) = file.metrics_route {
            self.metrics_route = m;
        }
        Ok(())
    }

    /// Merge values from an environment-like lookup. Unparsable values are skipped.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |k: &str| lookup(k).filter(|v| !v.trim().is_empty());

        if let Some(h) = get(ENV_HOST) {
            self.server.host = h;
        }
        if let Some(p) = get(ENV_PORT) {
            self.server.port = p.trim().to_string();
        }
        if let Some(w) = get(ENV_WINDOW_SECONDS).and_then(|v| v.trim().parse::<i64>().ok()) {
            self.stats.window_seconds = w;
        }
        for (key, slot) in [
            (ENV_READ_TIMEOUT, &mut self.server.read_timeout),
            (ENV_WRITE_TIMEOUT, &mut self.server.write_timeout),
            (ENV_IDLE_TIMEOUT, &mut self.server.idle_timeout),
            (ENV_SHUTDOWN_TIMEOUT, &mut self.server.shutdown_timeout),
        ] {
            if let Some(d) = get(key).and_then(|v| parse_duration(&v)) {
                *slot = d;
            }
        }
        if let Some(l) = get(ENV_LOG_LEVEL) {
            self.log_level = l.trim().to_string();
        }
        if let Some(f) = get(ENV_LOG_FORMAT) {
            self.log_format = f;
        }
        if let Some(m) = get(ENV_METRICS_ROUTE) {
            self.metrics_route = matches!(
                m.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            );
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.stats.window_seconds <= 0 {
            bail!("{ENV_WINDOW_SECONDS} must be greater than zero");
        }
        if self.stats.window_seconds > MAX_WINDOW_SECONDS {
            bail!(
                "{ENV_WINDOW_SECONDS} must be at most {MAX_WINDOW_SECONDS} seconds, got {}",
                self.stats.window_seconds
            );
        }
        if self.server.port.is_empty() {
            bail!("{ENV_PORT} must not be empty");
        }
        self.server
            .port
            .parse::<u16>()
            .map_err(|_| anyhow!("{ENV_PORT} must be a valid TCP port, got '{}'", self.server.port))?;
        for (name, d) in [
            (ENV_READ_TIMEOUT, self.server.read_timeout),
            (ENV_WRITE_TIMEOUT, self.server.write_timeout),
            (ENV_IDLE_TIMEOUT, self.server.idle_timeout),
            (ENV_SHUTDOWN_TIMEOUT, self.server.shutdown_timeout),
        ] {
            if d.is_zero() {
                bail!("{name} must be greater than zero");
            }
        }
        if LogFormat::parse(&self.log_format).is_none() {
            bail!(
                "{ENV_LOG_FORMAT} must be 'compact' or 'json', got '{}'",
                self.log_format
            );
        }
        Ok(())
    }

    pub fn log_format(&self) -> LogFormat {
        LogFormat::parse(&self.log_format).unwrap_or_default()
    }

    /// Window length; saturates for counts chrono cannot represent, which
    /// `validate` refuses anyway.
    pub fn window(&self) -> chrono::Duration {
        chrono::Duration::try_seconds(self.stats.window_seconds).unwrap_or(chrono::Duration::MAX)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

fn config_file_path() -> Result<Option<PathBuf>> {
    if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return Ok(Some(pb));
        }
        bail!("{ENV_CONFIG_PATH} points to non-existent path {}", pb.display());
    }
    let default = PathBuf::from(DEFAULT_CONFIG_PATH);
    Ok(default.exists().then_some(default))
}

/// Parse `250ms`, `5s`, `1m30s`, `2h` style durations. A bare integer is seconds.
pub fn parse_duration(literal: &str) -> Option<Duration> {
    let literal = literal.trim();
    if literal.is_empty() {
        return None;
    }
    if let Ok(secs) = literal.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }

    let mut total = Duration::ZERO;
    let mut rest = literal;
    while !rest.is_empty() {
        let digits = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
        if digits == 0 {
            return None;
        }
        let value: u64 = rest[..digits].parse().ok()?;
        rest = &rest[digits..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit())
            .unwrap_or(rest.len());
        let unit = &rest[..unit_len];
        rest = &rest[unit_len..];

        let part = match unit {
            "ns" => Duration::from_nanos(value),
            "us" | "µs" => Duration::from_micros(value),
            "ms" => Duration::from_millis(value),
            "s" => Duration::from_secs(value),
            "m" => Duration::from_secs(value.checked_mul(60)?),
            "h" => Duration::from_secs(value.checked_mul(3600)?),
            _ => return None,
        };
        total = total.checked_add(part)?;
    }
    Some(total)
}
