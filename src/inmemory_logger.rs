// SPDX-License-Identifier: MIT OR Apache-2.0

//! # In-Memory Logger
//!
//! A sink that captures output in memory instead of writing it anywhere,
//! for unit tests and for programmatically examining log output.  It stores
//! the rendered JSON line for each record -- byte-for-byte what the file
//! sink would persist -- so assertions can parse exactly what production
//! would see.

use std::sync::Mutex;

use crate::log_record::LogRecord;
use crate::logger::Sink;

/// An in-memory sink that stores rendered JSON lines.
///
/// Thread-safe; share it with `Arc` and tee it into a facade with
/// [`Logger::with_sink`](crate::Logger::with_sink).
///
/// ```
/// use std::sync::Arc;
/// use reqwise::{Config, InMemoryLogger, LogOutput};
///
/// let sink = Arc::new(InMemoryLogger::new());
/// let logger = reqwise::setup(Config::new().log_output(LogOutput::Stdout))
///     .unwrap()
///     .with_sink(sink.clone());
///
/// logger.info("captured");
/// assert!(sink.drain_logs().contains("captured"));
/// ```
#[derive(Debug)]
pub struct InMemoryLogger {
    lines: Mutex<Vec<String>>,
}

impl Default for InMemoryLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryLogger {
    pub fn new() -> Self {
        Self {
            lines: Mutex::new(Vec::new()),
        }
    }

    /// Drains all captured lines into a single newline-joined string,
    /// clearing the buffer.
    pub fn drain_logs(&self) -> String {
        let mut lines = self.lines.lock().unwrap();
        let result = lines.join("\n");
        lines.clear();
        result
    }

    pub fn len(&self) -> usize {
        self.lines.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Sink for InMemoryLogger {
    fn finish_log_record(&self, record: LogRecord) {
        let line = crate::format::json_line(&record);
        let mut lines = self.lines.lock().unwrap();
        lines.push(line);
    }

    /// No-op: memory needs no flushing.
    fn prepare_to_die(&self) {}
}
