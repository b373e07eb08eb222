// SPDX-License-Identifier: MIT OR Apache-2.0

//! Record rendering: the human console line and the ECS-flavored JSON line.
//!
//! A record arrives here with its field map fully merged; rendering never
//! consults the context store.  The JSON form is one object per line with
//! `@timestamp` / `log.level` / `message` first and the merged fields after,
//! in insertion order.  The console form is the development format:
//!
//! ```text
//! 2026-02-02 10:30:00 | INFO     | [req:abc123 | user:42] User logged in
//! ```

use chrono::SecondsFormat;

use crate::log_record::{Fields, LogRecord};

/// Field namespaces that are system bookkeeping rather than request
/// metadata; the console prefix hides them to stay scannable.
const SYSTEM_PREFIXES: &[&str] = &["service.", "log.origin.", "memory."];

/// Renders one JSON object (no trailing newline).
pub(crate) fn json_line(record: &LogRecord) -> String {
    let mut map = Fields::new();
    map.insert(
        "@timestamp".to_string(),
        record
            .wall()
            .to_rfc3339_opts(SecondsFormat::Millis, true)
            .into(),
    );
    map.insert("log.level".to_string(), record.level().as_str().into());
    map.insert("message".to_string(), record.message().into());
    for (key, value) in record.fields() {
        map.insert(key.clone(), value.clone());
    }
    serde_json::Value::Object(map).to_string()
}

/// Renders the human console line (no trailing newline).
pub(crate) fn console_line(record: &LogRecord) -> String {
    let timestamp = record
        .wall()
        .with_timezone(&chrono::Local)
        .format("%Y-%m-%d %H:%M:%S");

    let fields = record.fields();
    let mut parts = Vec::new();
    if let Some(id) = fields.get("request.id").and_then(|v| v.as_str()) {
        if id != "-" {
            parts.push(format!("req:{id}"));
        }
    }
    for (key, value) in fields {
        if key == "request.id" || key == "client.ip" || value.is_null() {
            continue;
        }
        if SYSTEM_PREFIXES.iter().any(|p| key.starts_with(p)) {
            continue;
        }
        // Keys abbreviate to four characters to keep the prefix compact.
        let abbrev: String = key.chars().take(4).collect();
        parts.push(format!("{abbrev}:{}", scalar(value)));
    }
    let prefix = if parts.is_empty() {
        String::new()
    } else {
        format!("[{}] ", parts.join(" | "))
    };

    format!(
        "{timestamp} | {level:<8} | {prefix}{message}",
        level = record.level().as_str(),
        message = record.message()
    )
}

/// Strings render bare (no quotes) in the console prefix.
fn scalar(value: &serde_json::Value) -> String {
    match value.as_str() {
        Some(s) => s.to_string(),
        None => value.to_string(),
    }
}
