//SPDX-License-Identifier: MIT OR Apache-2.0
/*!
# reqwise

reqwise is an opinionated context-aware logger for concurrent request-serving
processes.

# Development status

reqwise is experimental and the API may change.

# The problem

A server handles many requests at once, and the logs that matter are the ones
you can trace: which request produced this line, from which client, with
which job id?  Threading that metadata through every function signature
doesn't scale, and stuffing it into thread-locals breaks the moment a task
suspends and resumes on a different worker thread -- or worse, leaks one
request's metadata into the next request that reuses the thread.

The other half of the problem is persistence.  A request handler must never
wait on a disk write, log files must rotate before they eat the volume, and
when four worker processes share one log directory, two of them writing at
once must not interleave half-lines into the file.

These problems are the actual substance of server-side logging, so here we
are.

# The shape of the crate

* A **task-affine context store**: [`set_request_context`] at request entry,
  [`clear_request_context`] at exit, and every record emitted in between
  carries the request's metadata.  Context follows the logical task -- across
  threads, across await points -- via [`Context`] snapshots and the
  [`ApplyContext`] future wrapper.
* A **non-blocking file sink**: emission enqueues into a bounded queue and
  returns; a dedicated writer daemon drains it, rotates by size (and
  optionally age), enforces retention, and serializes cross-process access
  with an advisory file lock.  Overload drops records by policy and counts
  what it dropped; it never blocks the caller.
* An opt-in **per-request memory sampler**: install [`TrackingAllocator`],
  call [`start_memory_tracking`] in middleware, and every log line in that
  request reports `memory.allocated_mb` / `memory.peak_mb` /
  `memory.current_mb`.

# The API

```no_run
use reqwise::{Config, Level, fields};

let logger = reqwise::setup(
    Config::new().service_name("my-api").level(Level::Debug),
).expect("logger configuration");

reqwise::set_request_context("req-8f41", Some("203.0.113.9"), fields! {
    "user_id" => "usr-9",
});
logger.info("request accepted");
logger.info_with("lookup done", fields! { "rows" => 42 });
reqwise::clear_request_context();

reqwise::shutdown();
```

Console output is a human-readable line in development; in production (or
with `JSON_LOGS=true`) every record is one ECS-flavored JSON object per
line, friendly to whatever tails the files or stdout.

# The contract

A logging call never destabilizes the caller.  Bad configuration fails fast
in [`setup`]; after that, every failure inside the backbone -- a full queue,
a contended lock, a failed write -- degrades to fewer logs plus at most a
one-line stderr notice.  Misusing the context or memory APIs with no active
scope yields empty or zero values, not errors.

# Multithreading

Logging is safe from any thread.  Context is deliberately *not* shared
between threads: capture [`Context::current`] when handing work off and
[`Context::attach`] it on the other side, or wrap futures in
[`ApplyContext`] and forget about it.
*/

mod config;
mod console_logger;
mod format;
mod global_logger;
mod inmemory_logger;
mod level;
mod lifecycle;
mod log_record;
mod logger;
mod macros;
mod memory;
mod queue;
mod rotation;
mod writer;

pub mod context;

pub use config::{Config, ConfigError, DropPolicy, LogOutput, RetentionPolicy, RetentionUnit};
pub use console_logger::ConsoleLogger;
pub use context::{ApplyContext, Context, clear_request_context, get_context, set_request_context};
pub use global_logger::{logger, setup, shutdown};
pub use inmemory_logger::InMemoryLogger;
pub use level::Level;
pub use log_record::{Fields, LogRecord, Origin};
pub use logger::{Logger, Sink};
pub use memory::{
    MemorySnapshot, TrackingAllocator, get_memory_context, is_memory_monitoring_enabled,
    start_memory_tracking, stop_memory_tracking,
};
