// SPDX-License-Identifier: MIT OR Apache-2.0

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::log_record::LogRecord;
use crate::logger::Sink;

/// Emitted at most once so a broken stdout doesn't turn into a stderr flood.
static WRITE_FAILED: AtomicBool = AtomicBool::new(false);

/**
The console sink: synchronous, line-buffered writes to stdout.

Interactive/low-volume output is the assumption here, so blocking briefly on
the write is acceptable; the file sink is the one that must never stall the
caller.  Renders the human development format or, with `json`, the same
JSON lines the file sink writes (for deployments that ship stdout to an
aggregator).
 */
#[derive(Debug, Clone, Copy)]
pub struct ConsoleLogger {
    json: bool,
}

impl ConsoleLogger {
    pub const fn new(json: bool) -> Self {
        Self { json }
    }
}

impl Sink for ConsoleLogger {
    fn finish_log_record(&self, record: LogRecord) {
        let line = if self.json {
            crate::format::json_line(&record)
        } else {
            crate::format::console_line(&record)
        };
        let mut lock = std::io::stdout().lock();
        let outcome = lock
            .write_all(line.as_bytes())
            .and_then(|()| lock.write_all(b"\n"));
        if let Err(e) = outcome {
            if !WRITE_FAILED.swap(true, Ordering::Relaxed) {
                eprintln!("reqwise: cannot write to stdout: {e}");
            }
        }
    }

    fn prepare_to_die(&self) {
        let _ = std::io::stdout().flush();
    }
}
