// SPDX-License-Identifier: MIT OR Apache-2.0

//! Process-wide logger management.
//!
//! One configured logging backbone per process, lazily creatable and safely
//! reconfigurable: [`setup`] resolves configuration (failing fast on bad
//! values) and installs the facade; [`logger`] hands out the installed
//! facade, initializing from environment variables on first use so
//! `reqwise::logger().info("...")` works without ceremony.  Reconfiguring
//! flushes the previous file sink before the new one takes over, so no
//! queued records are stranded.
//!
//! All state lives behind a `OnceLock`; there is no hidden global mutation
//! anywhere else in the crate.

use std::sync::{Mutex, OnceLock};
use std::time::Duration;

use crate::config::{Config, ConfigError};
use crate::lifecycle;
use crate::logger::Logger;
use crate::writer::FileSink;

static GLOBAL: OnceLock<Mutex<Option<Logger>>> = OnceLock::new();

fn slot() -> &'static Mutex<Option<Logger>> {
    GLOBAL.get_or_init(|| Mutex::new(None))
}

/// Configures the process-wide logger and returns the facade.
///
/// Fails fast: invalid option values surface here as [`ConfigError`] before
/// any logging begins.  When the configuration includes a file sink, the
/// log directory is created, the writer daemon starts, and shutdown hooks
/// (SIGTERM/SIGINT) are registered so the queue is flushed on termination.
///
/// Calling `setup` again reconfigures: the previous file sink is flushed
/// and retired first.
///
/// ```no_run
/// use reqwise::{Config, Level, LogOutput};
///
/// let logger = reqwise::setup(
///     Config::new()
///         .service_name("my-api")
///         .level(Level::Debug)
///         .log_output(LogOutput::Both)
///         .log_dir("/var/log/my-api"),
/// ).expect("logger configuration");
/// logger.info("service started");
/// ```
pub fn setup(config: Config) -> Result<Logger, ConfigError> {
    let resolved = config.resolve()?;

    let file = if resolved.output.file() {
        let sink = FileSink::start(&resolved)?;
        lifecycle::register_sink(sink.clone());
        Some(sink)
    } else {
        None
    };

    let logger = Logger::from_resolved(resolved, file);

    let mut guard = match slot().lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    if let Some(previous) = guard.replace(logger.clone()) {
        // Retire the old backbone without stranding queued records.
        previous.flush_within(Duration::from_secs(2));
        if let Some(sink) = previous.file_sink() {
            lifecycle::unregister_sink(&sink);
        }
    }
    Ok(logger)
}

/// Returns the process-wide facade, initializing from environment variables
/// on first use.
///
/// Never fails: if lazy initialization hits a configuration error (say, an
/// unparseable `LOG_MAX_MB` in the environment), the error is reported once
/// to stderr and a console-only facade is installed instead -- degraded,
/// not crashed.
pub fn logger() -> Logger {
    {
        let guard = match slot().lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(logger) = &*guard {
            return logger.clone();
        }
    }
    match setup(Config::new()) {
        Ok(logger) => logger,
        Err(e) => {
            eprintln!("reqwise: lazy logger setup failed ({e}); falling back to console only");
            let logger = Logger::from_resolved(crate::config::ResolvedConfig::fallback(), None);
            let mut guard = match slot().lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            guard.get_or_insert_with(|| logger.clone()).clone()
        }
    }
}

/// Flushes every live file sink and stops the writer daemons, bounded by
/// the configured grace period.
///
/// The structured-teardown entry point for normal process exit; the signal
/// hooks call the same path on SIGTERM/SIGINT.  Idempotent.
pub fn shutdown() {
    lifecycle::flush_all();
}
