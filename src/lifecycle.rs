// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shutdown hooks: flush-before-exit under both normal and signal-driven
//! termination.
//!
//! Every live file sink registers here.  The first registration also
//! installs a signal watcher (SIGTERM for container orchestrators, SIGINT
//! for local Ctrl-C): on delivery it flushes every registered sink within
//! its grace period, then re-emulates the default handler so the process
//! still terminates with the conventional status.  Without this, a SIGTERM
//! from Docker/Kubernetes would discard whatever the writer daemon had
//! queued.
//!
//! Normal exit goes through [`shutdown`](crate::shutdown) -- ordinary
//! structured teardown, no finalizer magic.

use std::sync::{Arc, Mutex, OnceLock};

use signal_hook::consts::{SIGINT, SIGTERM};

use crate::writer::FileSink;

static SINKS: Mutex<Vec<Arc<FileSink>>> = Mutex::new(Vec::new());

pub(crate) fn register_sink(sink: Arc<FileSink>) {
    if let Ok(mut sinks) = SINKS.lock() {
        sinks.push(sink);
    }
    install_signal_hooks();
}

pub(crate) fn unregister_sink(sink: &Arc<FileSink>) {
    if let Ok(mut sinks) = SINKS.lock() {
        sinks.retain(|registered| !Arc::ptr_eq(registered, sink));
    }
}

/// Flushes all registered sinks.  Each sink's flush is idempotent, so
/// overlapping shutdown paths (explicit + signal) are harmless.
pub(crate) fn flush_all() {
    let sinks = match SINKS.lock() {
        Ok(sinks) => sinks.clone(),
        Err(_) => return,
    };
    for sink in sinks {
        sink.flush();
    }
}

fn install_signal_hooks() {
    static INSTALLED: OnceLock<()> = OnceLock::new();
    INSTALLED.get_or_init(|| {
        let mut signals = match signal_hook::iterator::Signals::new([SIGTERM, SIGINT]) {
            Ok(signals) => signals,
            Err(e) => {
                eprintln!("reqwise: cannot register shutdown signal handlers: {e}");
                return;
            }
        };
        let spawned = std::thread::Builder::new()
            .name("reqwise-signals".to_string())
            .spawn(move || {
                if let Some(signal) = signals.forever().next() {
                    flush_all();
                    // Hand back to the default disposition so the process
                    // still dies with the expected status/signal.
                    let _ = signal_hook::low_level::emulate_default_handler(signal);
                }
            });
        if let Err(e) = spawned {
            eprintln!("reqwise: cannot start shutdown signal watcher: {e}");
        }
    });
}
