// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration for the logging backbone.
//!
//! Every option can be supplied programmatically through [`Config`]'s builder
//! methods or through an environment variable; the builder wins where both are
//! present.  Resolution happens once, at [`setup`](crate::setup) time, and is
//! the only place in the crate that is allowed to fail: a bad option value is
//! a [`ConfigError`] before any logging begins, never a surprise later on the
//! emission path.
//!
//! Recognized environment variables:
//!
//! | variable | meaning | default |
//! |---|---|---|
//! | `SERVICE_NAME` | tag on every record | `app` |
//! | `LOG_LEVEL` | `DEBUG`/`INFO`/`WARNING`/`ERROR` threshold | `INFO` |
//! | `LOG_OUTPUT` | `stdout`, `file`, or `both` | `stdout` in production/staging, `both` otherwise |
//! | `LOG_DIR` | log file directory, created if absent | `logs` |
//! | `LOG_MAX_MB` | rotation size threshold in MB | `15` |
//! | `LOG_RETENTION_COUNT` | units to retain | `7` |
//! | `LOG_RETENTION_TYPE` | `days`, `hours`, `weeks`, or `files` | `days` |
//! | `JSON_LOGS` | `true` forces JSON console output | auto |
//! | `ENVIRONMENT` | `development`, `staging`, `production` | `development` |
//!
//! JSON output auto-detects: production and staging environments get JSON,
//! development gets the human console format.

use crate::Level;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Errors surfaced at setup time.  Fail-fast: none of these can occur after
/// [`setup`](crate::setup) returns `Ok`.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("invalid log level {0:?}, must be one of DEBUG, INFO, WARNING, ERROR")]
    InvalidLevel(String),
    #[error("invalid log output {0:?}, must be one of stdout, file, both")]
    InvalidOutput(String),
    #[error("invalid retention_type {0:?}, must be one of days, hours, weeks, files")]
    InvalidRetentionType(String),
    #[error("max_mb must be positive, got {0}")]
    InvalidMaxMb(f64),
    #[error("retention_count must be positive")]
    InvalidRetentionCount,
    #[error("queue capacity must be positive")]
    InvalidQueueCapacity,
    #[error("environment variable {name} has unparseable value {value:?}")]
    InvalidEnvVar { name: &'static str, value: String },
    #[error("cannot create log directory: {0}")]
    Io(#[from] std::io::Error),
}

/// Where records are routed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogOutput {
    Stdout,
    File,
    Both,
}

impl LogOutput {
    pub(crate) fn console(self) -> bool {
        matches!(self, LogOutput::Stdout | LogOutput::Both)
    }

    pub(crate) fn file(self) -> bool {
        matches!(self, LogOutput::File | LogOutput::Both)
    }
}

impl FromStr for LogOutput {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "stdout" => Ok(LogOutput::Stdout),
            "file" => Ok(LogOutput::File),
            "both" => Ok(LogOutput::Both),
            _ => Err(ConfigError::InvalidOutput(s.to_string())),
        }
    }
}

/// Unit for [`RetentionPolicy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetentionUnit {
    Files,
    Hours,
    Days,
    Weeks,
}

impl FromStr for RetentionUnit {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "files" => Ok(RetentionUnit::Files),
            "hours" => Ok(RetentionUnit::Hours),
            "days" => Ok(RetentionUnit::Days),
            "weeks" => Ok(RetentionUnit::Weeks),
            _ => Err(ConfigError::InvalidRetentionType(s.to_string())),
        }
    }
}

/// How many rotated files (or how much rotated-file age) to keep.
///
/// Evaluated by the writer daemon after every rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    pub count: u32,
    pub unit: RetentionUnit,
}

impl RetentionPolicy {
    /// Maximum rotated-file age, or `None` for count-based retention.
    pub(crate) fn max_age(&self) -> Option<Duration> {
        let secs_per_unit = match self.unit {
            RetentionUnit::Files => return None,
            RetentionUnit::Hours => 3_600,
            RetentionUnit::Days => 86_400,
            RetentionUnit::Weeks => 604_800,
        };
        Some(Duration::from_secs(u64::from(self.count) * secs_per_unit))
    }
}

/// What to do with a new record when the queue is full.
///
/// Either way the producing call returns immediately; logging never creates
/// backpressure on request handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DropPolicy {
    /// Evict the oldest queued record to make room for the new one.
    #[default]
    Oldest,
    /// Discard the new record, keeping the queued backlog intact.
    Newest,
}

/// Builder for logger configuration.
///
/// ```
/// use reqwise::{Config, Level};
///
/// let config = Config::new()
///     .service_name("my-api")
///     .level(Level::Debug);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Config {
    service_name: Option<String>,
    level: Option<Level>,
    json_output: Option<bool>,
    log_output: Option<LogOutput>,
    log_dir: Option<PathBuf>,
    max_mb: Option<f64>,
    retention_count: Option<u32>,
    retention_type: Option<RetentionUnit>,
    rotate_after: Option<Duration>,
    queue_capacity: Option<usize>,
    drop_policy: Option<DropPolicy>,
    lock_timeout: Option<Duration>,
    shutdown_grace: Option<Duration>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Service identifier included on every record as `service.name`.
    pub fn service_name(mut self, name: impl Into<String>) -> Self {
        self.service_name = Some(name.into());
        self
    }

    /// Minimum level to emit.  Records below the threshold are rejected
    /// before any formatting work.
    pub fn level(mut self, level: Level) -> Self {
        self.level = Some(level);
        self
    }

    /// Force (or suppress) JSON console output instead of auto-detecting
    /// from `ENVIRONMENT`.
    pub fn json_output(mut self, json: bool) -> Self {
        self.json_output = Some(json);
        self
    }

    pub fn log_output(mut self, output: LogOutput) -> Self {
        self.log_output = Some(output);
        self
    }

    /// Directory for the active and rotated log files.  Created if absent.
    pub fn log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_dir = Some(dir.into());
        self
    }

    /// Rotation size threshold in megabytes.  Fractional values are accepted
    /// so tests can rotate on tiny files.
    pub fn max_mb(mut self, mb: f64) -> Self {
        self.max_mb = Some(mb);
        self
    }

    pub fn retention_count(mut self, count: u32) -> Self {
        self.retention_count = Some(count);
        self
    }

    pub fn retention_type(mut self, unit: RetentionUnit) -> Self {
        self.retention_type = Some(unit);
        self
    }

    /// Also rotate the active file once it reaches this age, regardless of
    /// size.  Checked on the writer's idle tick, so it fires even with no
    /// traffic.  No environment fallback.
    pub fn rotate_after(mut self, age: Duration) -> Self {
        self.rotate_after = Some(age);
        self
    }

    /// Capacity of the pending-record queue feeding the writer daemon.
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = Some(capacity);
        self
    }

    pub fn drop_policy(mut self, policy: DropPolicy) -> Self {
        self.drop_policy = Some(policy);
        self
    }

    /// Bound on waiting for the cross-process file lock per write attempt.
    pub fn lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = Some(timeout);
        self
    }

    /// Bound on draining remaining records at shutdown.
    pub fn shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = Some(grace);
        self
    }

    /// Applies environment fallbacks and defaults, validating everything.
    pub(crate) fn resolve(self) -> Result<ResolvedConfig, ConfigError> {
        let environment = env_or("ENVIRONMENT", "development");
        let production_like = matches!(environment.as_str(), "production" | "staging");

        let service_name = self
            .service_name
            .unwrap_or_else(|| env_or("SERVICE_NAME", "app"));

        let level = match self.level {
            Some(level) => level,
            None => match std::env::var("LOG_LEVEL") {
                Ok(raw) => raw.parse()?,
                Err(_) => Level::Info,
            },
        };

        let output = match self.log_output {
            Some(output) => output,
            None => match std::env::var("LOG_OUTPUT") {
                Ok(raw) => raw.parse()?,
                // stdout-only is the safer default for multi-worker production
                Err(_) if production_like => LogOutput::Stdout,
                Err(_) => LogOutput::Both,
            },
        };

        let json = self.json_output.unwrap_or_else(|| {
            production_like
                || std::env::var("JSON_LOGS")
                    .map(|v| v.eq_ignore_ascii_case("true"))
                    .unwrap_or(false)
        });

        let log_dir = self
            .log_dir
            .unwrap_or_else(|| PathBuf::from(env_or("LOG_DIR", "logs")));

        let max_mb = match self.max_mb {
            Some(mb) => mb,
            None => parse_env("LOG_MAX_MB", 15.0)?,
        };
        if !(max_mb > 0.0) {
            return Err(ConfigError::InvalidMaxMb(max_mb));
        }
        let max_bytes = (max_mb * 1024.0 * 1024.0) as u64;

        let retention_count = match self.retention_count {
            Some(count) => count,
            None => parse_env("LOG_RETENTION_COUNT", 7u32)?,
        };
        if retention_count == 0 {
            return Err(ConfigError::InvalidRetentionCount);
        }

        let retention_unit = match self.retention_type {
            Some(unit) => unit,
            None => match std::env::var("LOG_RETENTION_TYPE") {
                Ok(raw) => raw.parse()?,
                Err(_) => RetentionUnit::Days,
            },
        };

        let queue_capacity = self.queue_capacity.unwrap_or(8_192);
        if queue_capacity == 0 {
            return Err(ConfigError::InvalidQueueCapacity);
        }

        Ok(ResolvedConfig {
            service_name,
            environment,
            level,
            json,
            output,
            log_dir,
            max_bytes,
            retention: RetentionPolicy {
                count: retention_count,
                unit: retention_unit,
            },
            rotate_after: self.rotate_after,
            queue_capacity,
            drop_policy: self.drop_policy.unwrap_or_default(),
            lock_timeout: self.lock_timeout.unwrap_or(Duration::from_secs(1)),
            shutdown_grace: self.shutdown_grace.unwrap_or(Duration::from_secs(5)),
        })
    }
}

/// Fully-resolved configuration, past the point where anything can fail.
#[derive(Debug, Clone)]
pub(crate) struct ResolvedConfig {
    pub(crate) service_name: String,
    pub(crate) environment: String,
    pub(crate) level: Level,
    pub(crate) json: bool,
    pub(crate) output: LogOutput,
    pub(crate) log_dir: PathBuf,
    pub(crate) max_bytes: u64,
    pub(crate) retention: RetentionPolicy,
    pub(crate) rotate_after: Option<Duration>,
    pub(crate) queue_capacity: usize,
    pub(crate) drop_policy: DropPolicy,
    pub(crate) lock_timeout: Duration,
    pub(crate) shutdown_grace: Duration,
}

impl ResolvedConfig {
    /// Console-only defaults with no environment input, for degrading when
    /// lazy initialization hits a bad environment.  Cannot fail.
    pub(crate) fn fallback() -> ResolvedConfig {
        ResolvedConfig {
            service_name: "app".to_string(),
            environment: "development".to_string(),
            level: Level::Info,
            json: false,
            output: LogOutput::Stdout,
            log_dir: PathBuf::from("logs"),
            max_bytes: 15 * 1024 * 1024,
            retention: RetentionPolicy {
                count: 7,
                unit: RetentionUnit::Days,
            },
            rotate_after: None,
            queue_capacity: 8_192,
            drop_policy: DropPolicy::Oldest,
            lock_timeout: Duration::from_secs(1),
            shutdown_grace: Duration::from_secs(5),
        }
    }
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn parse_env<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match std::env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| ConfigError::InvalidEnvVar { name, value: raw }),
        Err(_) => Ok(default),
    }
}
