// SPDX-License-Identifier: MIT OR Apache-2.0

//! Rotated-file naming, rotation state, and retention.
//!
//! The active file is always `app.log`; rotation renames it to
//! `app.<UTC stamp>.log` (microsecond precision, so two rotations in the
//! same second -- even from different processes -- don't collide).  All
//! rotation state is recovered from file metadata: size via stat, age via
//! created/modified time.  Nothing is persisted elsewhere, which is what
//! lets the writer resume correctly after a restart and coexist with other
//! processes rotating the same directory.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Utc};

use crate::config::RetentionPolicy;

pub(crate) const ACTIVE_FILE: &str = "app.log";
pub(crate) const LOCK_FILE: &str = "app.lock";

/// Size and age of the active file, owned exclusively by the writer daemon.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RotationState {
    pub(crate) size: u64,
    pub(crate) opened_at: SystemTime,
}

impl RotationState {
    /// Recovers state from the file on disk, so a restarted process picks up
    /// where the previous one left off.  A missing file is a fresh state.
    pub(crate) fn from_disk(active: &Path) -> RotationState {
        match std::fs::metadata(active) {
            Ok(meta) => RotationState {
                size: meta.len(),
                opened_at: meta
                    .created()
                    .or_else(|_| meta.modified())
                    .unwrap_or_else(|_| SystemTime::now()),
            },
            Err(_) => RotationState {
                size: 0,
                opened_at: SystemTime::now(),
            },
        }
    }
}

/// Target path for rotating the active file at `now`.
pub(crate) fn rotated_path(dir: &Path, now: DateTime<Utc>) -> PathBuf {
    let stamp = now.format("%Y%m%d_%H%M%S_%6f");
    dir.join(format!("app.{stamp}.log"))
}

/// Whether `name` is a rotated (not active, not lock) log file.
pub(crate) fn is_rotated_file(name: &str) -> bool {
    name != ACTIVE_FILE && name.starts_with("app.") && name.ends_with(".log")
}

/// Rotated files in `dir`, newest first.
fn rotated_files(dir: &Path) -> Vec<(PathBuf, SystemTime)> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut files: Vec<(PathBuf, SystemTime)> = entries
        .filter_map(|entry| {
            let entry = entry.ok()?;
            let name = entry.file_name();
            if !is_rotated_file(name.to_str()?) {
                return None;
            }
            let modified = entry.metadata().ok()?.modified().ok()?;
            Some((entry.path(), modified))
        })
        .collect();
    // The stamp in the name breaks mtime ties from coarse filesystems.
    files.sort_by(|a, b| (&b.1, &b.0).cmp(&(&a.1, &a.0)));
    files
}

/// Deletes rotated files that fall outside the policy.  Returns how many
/// were removed.  Deletion failures (permissions, file in use) get a stderr
/// notice and do not abort the sweep.
pub(crate) fn apply_retention(dir: &Path, policy: &RetentionPolicy) -> usize {
    let files = rotated_files(dir);
    let doomed: Vec<&PathBuf> = match policy.max_age() {
        None => files
            .iter()
            .skip(policy.count as usize)
            .map(|(path, _)| path)
            .collect(),
        Some(max_age) => {
            let now = SystemTime::now();
            files
                .iter()
                .filter(|(_, modified)| {
                    now.duration_since(*modified)
                        .map(|age| age > max_age)
                        .unwrap_or(false)
                })
                .map(|(path, _)| path)
                .collect()
        }
    };

    let mut removed = 0;
    for path in doomed {
        match std::fs::remove_file(path) {
            Ok(()) => removed += 1,
            Err(e) => {
                eprintln!("reqwise: could not delete rotated log {}: {e}", path.display());
            }
        }
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetentionUnit;

    #[test]
    fn rotated_names() {
        let dir = Path::new("/var/log/svc");
        let stamp = "2026-02-02T10:30:00.123456Z".parse::<DateTime<Utc>>().unwrap();
        let path = rotated_path(dir, stamp);
        assert_eq!(
            path,
            Path::new("/var/log/svc/app.20260202_103000_123456.log")
        );

        assert!(is_rotated_file("app.20260202_103000_123456.log"));
        assert!(!is_rotated_file(ACTIVE_FILE));
        assert!(!is_rotated_file(LOCK_FILE));
        assert!(!is_rotated_file("other.log"));
    }

    #[test]
    fn count_retention_keeps_newest() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..5 {
            let path = dir.path().join(format!("app.20260101_00000{i}_000000.log"));
            std::fs::write(&path, b"x").unwrap();
            // Stagger mtimes so "newest" is well-defined even on coarse
            // filesystems; the name is the tiebreaker regardless.
            std::thread::sleep(std::time::Duration::from_millis(5));
        }
        let policy = RetentionPolicy {
            count: 3,
            unit: RetentionUnit::Files,
        };
        let removed = apply_retention(dir.path(), &policy);
        assert_eq!(removed, 2);

        let mut remaining: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        remaining.sort();
        assert_eq!(
            remaining,
            vec![
                "app.20260101_000002_000000.log",
                "app.20260101_000003_000000.log",
                "app.20260101_000004_000000.log",
            ]
        );
    }

    #[test]
    fn age_retention_spares_fresh_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("app.20260101_000000_000000.log"), b"x").unwrap();
        let policy = RetentionPolicy {
            count: 7,
            unit: RetentionUnit::Days,
        };
        // Freshly written, nowhere near seven days old.
        assert_eq!(apply_retention(dir.path(), &policy), 0);
    }

    #[test]
    fn active_and_lock_files_are_never_swept() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(ACTIVE_FILE), b"x").unwrap();
        std::fs::write(dir.path().join(LOCK_FILE), b"").unwrap();
        let policy = RetentionPolicy {
            count: 1,
            unit: RetentionUnit::Files,
        };
        assert_eq!(apply_retention(dir.path(), &policy), 0);
        assert!(dir.path().join(ACTIVE_FILE).exists());
        assert!(dir.path().join(LOCK_FILE).exists());
    }
}
