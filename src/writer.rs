// SPDX-License-Identifier: MIT OR Apache-2.0

/*!
The file sink and its writer daemon.

One dedicated background thread per process drains the record queue in
batches and appends JSON lines to the active file.  The caller-facing
surface ([`FileSink::push`]) only enqueues; everything slow -- locking,
rotation, retention, disk writes -- happens on the daemon thread.

Multiple OS processes may share one log directory (multi-worker
deployments), so every write batch and every rotation happens under an
advisory lock on a sibling `app.lock` file.  The lock wait is bounded: a
contended attempt skips, re-queues the batch at the head, and retries next
cycle rather than stalling the daemon indefinitely.  Size is re-stat'ed
inside the lock because a neighbouring process may have rotated the file in
the meantime.

Shutdown is a bounded flush: flag the daemon, wait up to the grace period
for it to finish, then write whatever is still queued directly.  Past the
grace period the process exits regardless; losing the very last records
beats hanging exit.
*/

use std::fs::{OpenOptions, TryLockError};
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant, SystemTime};

use chrono::Utc;

use crate::Level;
use crate::config::{ResolvedConfig, RetentionPolicy};
use crate::format;
use crate::log_record::{Fields, LogRecord, Origin};
use crate::logger::Sink;
use crate::queue::RecordQueue;
use crate::rotation::{self, RotationState};

/// Max records per write batch.
const BATCH_MAX: usize = 100;
/// Idle wait per drain; also the cadence of time-rotation checks.
const TICK: Duration = Duration::from_millis(100);
/// Poll interval while waiting for the advisory lock.
const LOCK_POLL: Duration = Duration::from_millis(10);

#[derive(Debug)]
struct WriterShared {
    dir: PathBuf,
    active: PathBuf,
    lock_path: PathBuf,
    max_bytes: u64,
    rotate_after: Option<Duration>,
    retention: RetentionPolicy,
    lock_timeout: Duration,
    /// service.* fields for daemon-synthesized records (overload notices).
    notice_fields: Fields,
    queue: Arc<RecordQueue>,
    shutdown: AtomicBool,
    /// Set by the daemon when its loop exits; flush waits on this.
    done: (Mutex<bool>, Condvar),
}

/// The queue-fronted file sink.  `push` never blocks the caller beyond the
/// queue's mutex; the daemon owns all file I/O.
#[derive(Debug)]
pub(crate) struct FileSink {
    queue: Arc<RecordQueue>,
    shared: Arc<WriterShared>,
    flushed: AtomicBool,
    grace: Duration,
}

impl FileSink {
    /// Creates the log directory, starts the daemon thread, and returns the
    /// sink handle.
    pub(crate) fn start(resolved: &ResolvedConfig) -> std::io::Result<Arc<FileSink>> {
        std::fs::create_dir_all(&resolved.log_dir)?;

        let queue = Arc::new(RecordQueue::new(
            resolved.queue_capacity,
            resolved.drop_policy,
        ));

        let mut notice_fields = Fields::new();
        notice_fields.insert(
            "service.name".to_string(),
            resolved.service_name.as_str().into(),
        );
        notice_fields.insert(
            "service.environment".to_string(),
            resolved.environment.as_str().into(),
        );

        let shared = Arc::new(WriterShared {
            dir: resolved.log_dir.clone(),
            active: resolved.log_dir.join(rotation::ACTIVE_FILE),
            lock_path: resolved.log_dir.join(rotation::LOCK_FILE),
            max_bytes: resolved.max_bytes,
            rotate_after: resolved.rotate_after,
            retention: resolved.retention,
            lock_timeout: resolved.lock_timeout,
            notice_fields,
            queue: queue.clone(),
            shutdown: AtomicBool::new(false),
            done: (Mutex::new(false), Condvar::new()),
        });

        let daemon_shared = shared.clone();
        std::thread::Builder::new()
            .name("reqwise-writer".to_string())
            .spawn(move || writer_loop(daemon_shared))?;

        Ok(Arc::new(FileSink {
            queue,
            shared,
            flushed: AtomicBool::new(false),
            grace: resolved.shutdown_grace,
        }))
    }

    pub(crate) fn push(&self, record: LogRecord) {
        self.queue.push(record);
    }

    /// Flushes with the configured grace period.  Idempotent.
    pub(crate) fn flush(&self) {
        self.flush_within(self.grace);
    }

    /// Stops the daemon and drains everything queued, bounded by `grace`.
    pub(crate) fn flush_within(&self, grace: Duration) {
        if self.flushed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.shared.shutdown.store(true, Ordering::SeqCst);
        self.queue.wake();

        // Wait for the daemon to finish its final drain.
        let deadline = Instant::now() + grace;
        let (lock, cvar) = &self.shared.done;
        if let Ok(mut done) = lock.lock() {
            while !*done {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    break;
                }
                match cvar.wait_timeout(done, remaining) {
                    Ok((guard, _)) => done = guard,
                    // A poisoned flag means the daemon panicked; fall through
                    // and salvage what's still queued.
                    Err(_) => break,
                }
            }
        }

        // Residue, in case the daemon didn't finish inside the grace period.
        let mut residue = Vec::new();
        loop {
            let batch = self.queue.drain(BATCH_MAX, Duration::ZERO);
            if batch.is_empty() {
                break;
            }
            residue.extend(batch);
        }
        if !residue.is_empty() {
            let lines: Vec<String> = residue.iter().map(format::json_line).collect();
            let mut state = RotationState::from_disk(&self.shared.active);
            let lock = acquire_lock(&self.shared, self.shared.lock_timeout);
            // Locked if possible; an unlocked tail write beats losing the
            // records outright.
            if let Err(e) = write_batch(&self.shared, &mut state, &lines) {
                eprintln!("reqwise: final flush write failed: {e}");
            }
            if let Some(file) = lock {
                let _ = file.unlock();
            }
        }
    }
}

impl Sink for FileSink {
    fn finish_log_record(&self, record: LogRecord) {
        self.push(record);
    }

    fn prepare_to_die(&self) {
        self.flush();
    }
}

fn writer_loop(shared: Arc<WriterShared>) {
    let mut state = RotationState::from_disk(&shared.active);

    loop {
        let batch = shared.queue.drain(BATCH_MAX, TICK);

        if batch.is_empty() {
            // Idle tick: age-based rotation fires even with no traffic.
            if shared.rotate_after.is_some() {
                if let Some(file) = acquire_lock(&shared, shared.lock_timeout) {
                    if let Err(e) = rotate_if_aged(&shared, &mut state) {
                        eprintln!("reqwise: time-based rotation failed: {e}");
                    }
                    let _ = file.unlock();
                }
            }
            if shared.shutdown.load(Ordering::Relaxed) && shared.queue.len() == 0 {
                break;
            }
            continue;
        }

        match acquire_lock(&shared, shared.lock_timeout) {
            Some(file) => {
                // The drop counter is consumed only once a write is actually
                // going to happen, so a skipped cycle can't eat the notice.
                let drops = shared.queue.dropped_since_last_report();
                let mut lines = Vec::with_capacity(batch.len() + 1);
                if drops > 0 {
                    lines.push(format::json_line(&overload_notice(&shared, drops)));
                }
                lines.extend(batch.iter().map(format::json_line));
                if let Err(e) = write_batch(&shared, &mut state, &lines) {
                    eprintln!("reqwise: file sink write failed, dropping batch: {e}");
                }
                let _ = file.unlock();
            }
            None => {
                // Not silently lost: back at the head of the queue for the
                // next cycle.  Sustained contention eventually engages the
                // queue's drop policy.
                eprintln!(
                    "reqwise: could not lock {} within {:?}, re-queueing {} records",
                    shared.lock_path.display(),
                    shared.lock_timeout,
                    batch.len()
                );
                shared.queue.requeue_front(batch);
            }
        }

        if shared.shutdown.load(Ordering::Relaxed) && shared.queue.len() == 0 {
            break;
        }
    }

    let (lock, cvar) = &shared.done;
    if let Ok(mut done) = lock.lock() {
        *done = true;
    }
    cvar.notify_all();
}

/// Acquires the advisory lock with a bounded wait; `None` means contended
/// past the bound (or the lock file is unusable) and the attempt should be
/// skipped.
fn acquire_lock(shared: &WriterShared, timeout: Duration) -> Option<std::fs::File> {
    let file = match OpenOptions::new()
        .create(true)
        .write(true)
        .open(&shared.lock_path)
    {
        Ok(file) => file,
        Err(e) => {
            eprintln!(
                "reqwise: cannot open lock file {}: {e}",
                shared.lock_path.display()
            );
            return None;
        }
    };
    let deadline = Instant::now() + timeout;
    loop {
        match file.try_lock() {
            Ok(()) => return Some(file),
            Err(TryLockError::WouldBlock) => {
                if Instant::now() >= deadline {
                    return None;
                }
                std::thread::sleep(LOCK_POLL);
            }
            Err(TryLockError::Error(e)) => {
                eprintln!(
                    "reqwise: lock on {} failed: {e}",
                    shared.lock_path.display()
                );
                return None;
            }
        }
    }
}

/// Appends `lines` to the active file, rotating whenever the next line
/// would cross the size threshold.  Caller holds the advisory lock.
fn write_batch(
    shared: &WriterShared,
    state: &mut RotationState,
    lines: &[String],
) -> std::io::Result<()> {
    // Another process may have rotated or appended since our last write.
    *state = RotationState::from_disk(&shared.active);

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&shared.active)?;

    for line in lines {
        let needed = line.len() as u64 + 1;
        if state.size > 0 && state.size + needed > shared.max_bytes {
            drop(file);
            rotate(shared, state)?;
            file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&shared.active)?;
        }
        file.write_all(line.as_bytes())?;
        file.write_all(b"\n")?;
        state.size += needed;
    }
    file.flush()
}

/// Renames the active file into the rotated set and applies retention.
fn rotate(shared: &WriterShared, state: &mut RotationState) -> std::io::Result<()> {
    let target = rotation::rotated_path(&shared.dir, Utc::now());
    match std::fs::rename(&shared.active, &target) {
        Ok(()) => {}
        // Already rotated by a neighbouring process.
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }
    rotation::apply_retention(&shared.dir, &shared.retention);
    *state = RotationState {
        size: 0,
        opened_at: SystemTime::now(),
    };
    Ok(())
}

/// Time-based rotation, evaluated against on-disk state under the lock.
fn rotate_if_aged(shared: &WriterShared, state: &mut RotationState) -> std::io::Result<()> {
    let Some(max_age) = shared.rotate_after else {
        return Ok(());
    };
    let disk = RotationState::from_disk(&shared.active);
    if disk.size == 0 {
        return Ok(());
    }
    let aged = SystemTime::now()
        .duration_since(disk.opened_at)
        .map(|age| age >= max_age)
        .unwrap_or(false);
    if aged {
        rotate(shared, state)?;
    }
    Ok(())
}

fn overload_notice(shared: &WriterShared, drops: u64) -> LogRecord {
    let mut fields = shared.notice_fields.clone();
    fields.insert("dropped".to_string(), drops.into());
    fields.insert(
        "dropped_total".to_string(),
        shared.queue.dropped_total().into(),
    );
    LogRecord::new(
        Level::Warning,
        format!("dropped {drops} log records under queue overload"),
        fields,
        Origin::caller(),
    )
}
