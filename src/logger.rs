// SPDX-License-Identifier: MIT OR Apache-2.0

//! The emission facade and the sink abstraction behind it.
//!
//! A [`Logger`] is a cheap handle: configuration and sinks live behind an
//! `Arc`, and the only per-handle state is the set of permanently-bound
//! fields, so [`bind`](Logger::bind) can mint scoped loggers freely.
//!
//! Emission never raises into application code.  The threshold check runs
//! before any formatting work; everything after it either succeeds or
//! degrades with at most a one-line stderr notice inside the sink.

use std::fmt::Debug;
use std::sync::Arc;

use crate::Level;
use crate::config::ResolvedConfig;
use crate::console_logger::ConsoleLogger;
use crate::context::Context;
use crate::log_record::{Fields, LogRecord, Origin};
use crate::writer::FileSink;

/// A destination for finished log records.
///
/// The console sink writes synchronously (interactive output is assumed
/// low-volume); the file sink enqueues for the writer daemon and returns
/// immediately.  Implementations must not panic: a sink failure degrades to
/// a stderr notice, never into the caller.
pub trait Sink: Debug + Send + Sync {
    /// Submits the record for output.
    fn finish_log_record(&self, record: LogRecord);

    /// The application may imminently exit.  Ensure all buffers are flushed
    /// and up to date.
    fn prepare_to_die(&self);
}

#[derive(Debug)]
struct LoggerShared {
    service_name: String,
    environment: String,
    min_level: Level,
    sinks: Vec<Arc<dyn Sink>>,
    /// The file sink, if configured, kept separately so flush can reach it.
    file: Option<Arc<FileSink>>,
}

/// The public emission API.
///
/// ```no_run
/// use reqwise::{Config, Level, fields};
///
/// let logger = reqwise::setup(
///     Config::new().service_name("my-api").level(Level::Debug),
/// ).unwrap();
/// logger.info("service started");
///
/// let scoped = logger.bind(fields! { "component" => "ingest" });
/// scoped.warning_with("slow batch", fields! { "duration_ms" => 1500 });
/// ```
#[derive(Debug, Clone)]
pub struct Logger {
    shared: Arc<LoggerShared>,
    bound: Fields,
}

impl Logger {
    pub(crate) fn from_resolved(resolved: ResolvedConfig, file: Option<Arc<FileSink>>) -> Logger {
        let mut sinks: Vec<Arc<dyn Sink>> = Vec::new();
        if resolved.output.console() {
            sinks.push(Arc::new(ConsoleLogger::new(resolved.json)));
        }
        if let Some(file) = &file {
            sinks.push(file.clone() as Arc<dyn Sink>);
        }
        Logger {
            shared: Arc::new(LoggerShared {
                service_name: resolved.service_name,
                environment: resolved.environment,
                min_level: resolved.level,
                sinks,
                file,
            }),
            bound: Fields::new(),
        }
    }

    /// Returns a new facade with additional permanently-bound fields.
    ///
    /// The original facade is not mutated; bound fields merge below the
    /// request context and call-site fields, which override on collision.
    pub fn bind(&self, fields: Fields) -> Logger {
        let mut bound = self.bound.clone();
        for (key, value) in fields {
            bound.insert(key, value);
        }
        Logger {
            shared: self.shared.clone(),
            bound,
        }
    }

    /// Returns a new facade that also routes records to `sink`.
    ///
    /// Useful for tee-ing output, e.g. into an [`InMemoryLogger`](crate::InMemoryLogger)
    /// in tests.
    pub fn with_sink(&self, sink: Arc<dyn Sink>) -> Logger {
        let mut sinks = self.shared.sinks.clone();
        sinks.push(sink);
        Logger {
            shared: Arc::new(LoggerShared {
                service_name: self.shared.service_name.clone(),
                environment: self.shared.environment.clone(),
                min_level: self.shared.min_level,
                sinks,
                file: self.shared.file.clone(),
            }),
            bound: self.bound.clone(),
        }
    }

    /// Emits a record at `level`.
    ///
    /// Merges, in override order: bound fields, the task's request context,
    /// the memory snapshot (when tracking is active), then `fields`.  Routes
    /// to every configured sink.  Never raises.
    #[track_caller]
    pub fn emit(&self, level: Level, message: impl Into<String>, fields: Fields) {
        self.emit_at(level, message.into(), fields, Origin::caller());
    }

    #[track_caller]
    pub fn debug(&self, message: impl Into<String>) {
        self.emit_at(Level::Debug, message.into(), Fields::new(), Origin::caller());
    }

    #[track_caller]
    pub fn info(&self, message: impl Into<String>) {
        self.emit_at(Level::Info, message.into(), Fields::new(), Origin::caller());
    }

    #[track_caller]
    pub fn warning(&self, message: impl Into<String>) {
        self.emit_at(Level::Warning, message.into(), Fields::new(), Origin::caller());
    }

    #[track_caller]
    pub fn error(&self, message: impl Into<String>) {
        self.emit_at(Level::Error, message.into(), Fields::new(), Origin::caller());
    }

    #[track_caller]
    pub fn debug_with(&self, message: impl Into<String>, fields: Fields) {
        self.emit_at(Level::Debug, message.into(), fields, Origin::caller());
    }

    #[track_caller]
    pub fn info_with(&self, message: impl Into<String>, fields: Fields) {
        self.emit_at(Level::Info, message.into(), fields, Origin::caller());
    }

    #[track_caller]
    pub fn warning_with(&self, message: impl Into<String>, fields: Fields) {
        self.emit_at(Level::Warning, message.into(), fields, Origin::caller());
    }

    #[track_caller]
    pub fn error_with(&self, message: impl Into<String>, fields: Fields) {
        self.emit_at(Level::Error, message.into(), fields, Origin::caller());
    }

    fn emit_at(&self, level: Level, message: String, call_fields: Fields, origin: Origin) {
        // Cheap rejection path: nothing below is reached for filtered levels.
        if level < self.shared.min_level {
            return;
        }

        let context = Context::current();

        let mut fields = Fields::new();
        fields.insert("service.name".to_string(), self.shared.service_name.as_str().into());
        fields.insert(
            "service.environment".to_string(),
            self.shared.environment.as_str().into(),
        );
        fields.insert("log.origin.file".to_string(), origin.file.into());
        fields.insert("log.origin.line".to_string(), origin.line.into());
        for (key, value) in &self.bound {
            fields.insert(key.clone(), value.clone());
        }
        for (key, value) in context.request_fields() {
            fields.insert(key, value);
        }
        if let Some(session) = context.memory_session() {
            if session.is_active() {
                for (key, value) in session.observe().fields() {
                    fields.insert(key, value);
                }
            }
        }
        for (key, value) in call_fields {
            fields.insert(key, value);
        }

        let record = LogRecord::new(level, message, fields, origin);
        for sink in &self.shared.sinks {
            sink.finish_log_record(record.clone());
        }
    }

    /// Drains the file sink (bounded by the configured grace period) so
    /// everything emitted so far is on disk.
    pub fn flush(&self) {
        if let Some(file) = &self.shared.file {
            file.flush();
        }
    }

    pub(crate) fn flush_within(&self, grace: std::time::Duration) {
        if let Some(file) = &self.shared.file {
            file.flush_within(grace);
        }
    }

    pub(crate) fn file_sink(&self) -> Option<Arc<FileSink>> {
        self.shared.file.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LogOutput;
    use crate::fields;
    use crate::inmemory_logger::InMemoryLogger;

    /// A facade with no console/file sink, so tests observe exactly what
    /// they tee in.  Built without environment input so tests that mutate
    /// `LOG_*` variables can't interfere.
    fn quiet_logger(level: Level) -> Logger {
        let mut resolved = crate::config::ResolvedConfig::fallback();
        resolved.service_name = "test-svc".to_string();
        resolved.level = level;
        resolved.output = LogOutput::File;
        Logger::from_resolved(resolved, None)
    }

    fn captured(sink: &InMemoryLogger) -> Vec<serde_json::Value> {
        sink.drain_logs()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[test]
    fn threshold_rejects_cheaply() {
        let sink = Arc::new(InMemoryLogger::new());
        let logger = quiet_logger(Level::Warning).with_sink(sink.clone());
        logger.debug("nope");
        logger.info("nope");
        logger.warning("yes");
        logger.error("also yes");
        let lines = captured(&sink);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["log.level"], "WARNING");
        assert_eq!(lines[1]["log.level"], "ERROR");
    }

    #[test]
    fn merge_order_and_overrides() {
        let sink = Arc::new(InMemoryLogger::new());
        let logger = quiet_logger(Level::Debug)
            .bind(fields! { "component" => "ingest", "shadowed" => "bound" })
            .with_sink(sink.clone());

        crate::set_request_context("req-merge", Some("10.1.1.1"), Fields::new());
        logger.info_with("m", fields! { "shadowed" => "call-site", "extra" => 7 });
        crate::clear_request_context();

        let line = &captured(&sink)[0];
        assert_eq!(line["service.name"], "test-svc");
        assert_eq!(line["component"], "ingest");
        assert_eq!(line["request.id"], "req-merge");
        assert_eq!(line["client.ip"], "10.1.1.1");
        // Later sources win on key collision.
        assert_eq!(line["shadowed"], "call-site");
        assert_eq!(line["extra"], 7);
        assert_eq!(line["log.origin.file"], file!());
    }

    #[test]
    fn bind_does_not_mutate_original() {
        let sink = Arc::new(InMemoryLogger::new());
        let base = quiet_logger(Level::Debug).with_sink(sink.clone());
        let _scoped = base.bind(fields! { "scope" => "child" });
        base.info("from base");
        let line = &captured(&sink)[0];
        assert!(line.get("scope").is_none());
    }

    #[test]
    fn memory_fields_absent_when_disabled() {
        let sink = Arc::new(InMemoryLogger::new());
        let logger = quiet_logger(Level::Debug).with_sink(sink.clone());
        logger.info("no tracking");
        let line = &captured(&sink)[0];
        assert!(line.get("memory.allocated_mb").is_none());
    }

    #[test]
    fn memory_fields_present_when_tracking() {
        let sink = Arc::new(InMemoryLogger::new());
        let logger = quiet_logger(Level::Debug).with_sink(sink.clone());
        crate::start_memory_tracking();
        logger.info("tracked");
        crate::stop_memory_tracking();
        let line = &captured(&sink)[0];
        assert!(line.get("memory.allocated_mb").is_some());
        assert!(line.get("memory.peak_mb").is_some());
        assert!(line.get("memory.current_mb").is_some());
    }
}
