// SPDX-License-Identifier: MIT OR Apache-2.0

//! Log record type for the reqwise logging system.
//!
//! This module defines [`LogRecord`], the immutable value that travels from the
//! emission site to a sink.  A record is built exactly once by the facade --
//! which merges bound fields, the active request context, and the memory
//! snapshot into one ordered field map -- and is consumed exactly once by the
//! sink that serializes it.  Nothing mutates a record after creation, which is
//! what makes handing it to a background writer thread safe and cheap to reason
//! about.

use crate::Level;
use std::panic::Location;
use std::time::Instant;

use chrono::{DateTime, Utc};

/// Ordered map of structured fields attached to a record.
///
/// Backed by `serde_json::Map` with the `preserve_order` feature, so the merge
/// order chosen at emission time is the order keys appear in serialized
/// output.
pub type Fields = serde_json::Map<String, serde_json::Value>;

/// Source location of an emission call, captured via `#[track_caller]`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Origin {
    pub file: &'static str,
    pub line: u32,
}

impl Origin {
    #[track_caller]
    pub(crate) fn caller() -> Self {
        let location = Location::caller();
        Self {
            file: location.file(),
            line: location.line(),
        }
    }
}

/**
A single log record.

Carries both clocks: the wall-clock timestamp is what gets serialized
(ISO-8601 UTC), while the monotonic instant lets in-process consumers order
records reliably even across a wall-clock step.  The field map is already
fully merged; sinks serialize it as-is and never consult the context store
themselves.
*/
#[derive(Debug, Clone)]
pub struct LogRecord {
    wall: DateTime<Utc>,
    monotonic: Instant,
    level: Level,
    message: String,
    fields: Fields,
    origin: Origin,
}

impl LogRecord {
    /// Creates a record stamped with the current time.
    pub fn new(level: Level, message: String, fields: Fields, origin: Origin) -> Self {
        Self {
            wall: Utc::now(),
            monotonic: Instant::now(),
            level,
            message,
            fields,
            origin,
        }
    }

    pub fn level(&self) -> Level {
        self.level
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    pub fn wall(&self) -> DateTime<Utc> {
        self.wall
    }

    pub fn monotonic(&self) -> Instant {
        self.monotonic
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }
}

/*
Boilerplate notes for LogRecord:

IMPLEMENTED:
- Debug: Derived - essential for diagnostics
- Clone: Derived - records fan out to more than one sink

NOT IMPLEMENTED:
- PartialEq/Eq/Hash: Instant and f64 field values make equality semantics
  murky; nothing compares records
- Default: a record without a timestamp or level is not a sensible value
- Display: rendering depends on the sink (console line vs JSON line), so it
  lives in the format module rather than here
- Copy: String and Map are heap-allocated

AUTOMATIC:
- Send: all members are Send, which is what lets a record cross into the
  writer daemon's thread
*/
