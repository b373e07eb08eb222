// SPDX-License-Identifier: MIT OR Apache-2.0

/*!
Per-task memory usage sampling.

Attributes allocation deltas to the logical task that is running, so a
request's logs can carry `memory.allocated_mb` / `memory.peak_mb` /
`memory.current_mb` fields.  Two opt-ins are required, because byte
accounting is not free (operators report a fixed cost in the 5-10% range
when it is on):

1. Per process, the host installs [`TrackingAllocator`] as its global
   allocator.  Without it every query reports zeros and nothing else
   changes.

   ```no_run
   use std::alloc::System;
   use reqwise::TrackingAllocator;

   #[global_allocator]
   static ALLOC: TrackingAllocator<System> = TrackingAllocator::new(System);
   ```

2. Per logical task, middleware calls [`start_memory_tracking`] at entry
   and [`stop_memory_tracking`] at exit.  Tasks that never start a session
   pay nothing beyond the allocator's counter updates.

The session handle lives inside the task's [`Context`](crate::Context), so
it is isolated between concurrent tasks exactly the way the request scope
is.  Peak is the maximum instantaneous process total observed during the
session (monotone non-decreasing within it), combining the totals seen at
each query with the allocator's own high-water mark so a spike between two
queries is still caught.
*/

use std::alloc::{GlobalAlloc, Layout, System};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::context::Context;
use crate::log_record::Fields;

/// Live bytes allocated through the tracking allocator.
static CURRENT: AtomicUsize = AtomicUsize::new(0);
/// High-water mark of [`CURRENT`] since process start.  Monotone.
static PEAK: AtomicUsize = AtomicUsize::new(0);

/// Counting wrapper around a real allocator.
///
/// Maintains process-wide current/peak byte counters that
/// [`MemorySession`]s read.  The wrapper adds two relaxed atomic operations
/// per allocation and one per deallocation; the real cost of the feature is
/// in snapshotting, which is why sessions are opt-in per task.
#[derive(Debug)]
pub struct TrackingAllocator<A = System> {
    inner: A,
}

impl TrackingAllocator<System> {
    /// Tracks on top of the system allocator.
    pub const fn system() -> Self {
        Self { inner: System }
    }
}

impl<A> TrackingAllocator<A> {
    pub const fn new(inner: A) -> Self {
        Self { inner }
    }
}

fn record_alloc(size: usize) {
    let current = CURRENT.fetch_add(size, Ordering::Relaxed) + size;
    PEAK.fetch_max(current, Ordering::Relaxed);
}

unsafe impl<A: GlobalAlloc> GlobalAlloc for TrackingAllocator<A> {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        let ptr = unsafe { self.inner.alloc(layout) };
        if !ptr.is_null() {
            record_alloc(layout.size());
        }
        ptr
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        let ptr = unsafe { self.inner.alloc_zeroed(layout) };
        if !ptr.is_null() {
            record_alloc(layout.size());
        }
        ptr
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        unsafe { self.inner.dealloc(ptr, layout) };
        CURRENT.fetch_sub(layout.size(), Ordering::Relaxed);
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        let new_ptr = unsafe { self.inner.realloc(ptr, layout, new_size) };
        if !new_ptr.is_null() {
            CURRENT.fetch_sub(layout.size(), Ordering::Relaxed);
            record_alloc(new_size);
        }
        new_ptr
    }
}

/// One task's tracking session: baseline at start, peak observed so far.
#[derive(Debug)]
pub struct MemorySession {
    baseline: usize,
    /// Max total observed during this session.  Only grows.
    peak: AtomicUsize,
    /// Global high-water mark at session start; growth past it means the
    /// new maximum happened during this session.
    peak_mark: usize,
    active: AtomicBool,
}

impl MemorySession {
    fn begin() -> Self {
        let current = CURRENT.load(Ordering::Relaxed);
        Self {
            baseline: current,
            peak: AtomicUsize::new(current),
            peak_mark: PEAK.load(Ordering::Relaxed),
            active: AtomicBool::new(true),
        }
    }

    pub(crate) fn is_active(&self) -> bool {
        self.active.load(Ordering::Relaxed)
    }

    pub(crate) fn observe(&self) -> MemorySnapshot {
        let current = CURRENT.load(Ordering::Relaxed);
        let global_peak = PEAK.load(Ordering::Relaxed);
        let mut candidate = current;
        if global_peak > self.peak_mark {
            candidate = candidate.max(global_peak);
        }
        let prior = self.peak.fetch_max(candidate, Ordering::Relaxed);
        let peak = prior.max(candidate);
        MemorySnapshot {
            allocated_mb: to_mb(current as f64 - self.baseline as f64),
            peak_mb: to_mb(peak as f64),
            current_mb: to_mb(current as f64),
        }
    }
}

/// Memory metrics in fractional megabytes, rounded to 3 decimal places.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct MemorySnapshot {
    /// Delta against the session baseline.  May be negative if the task
    /// freed more than it allocated.
    pub allocated_mb: f64,
    pub peak_mb: f64,
    pub current_mb: f64,
}

impl MemorySnapshot {
    pub const ZERO: MemorySnapshot = MemorySnapshot {
        allocated_mb: 0.0,
        peak_mb: 0.0,
        current_mb: 0.0,
    };

    /// The snapshot as record fields, in the order they serialize.
    pub(crate) fn fields(&self) -> Fields {
        let mut fields = Fields::new();
        fields.insert("memory.allocated_mb".to_string(), self.allocated_mb.into());
        fields.insert("memory.peak_mb".to_string(), self.peak_mb.into());
        fields.insert("memory.current_mb".to_string(), self.current_mb.into());
        fields
    }
}

fn to_mb(bytes: f64) -> f64 {
    (bytes / (1024.0 * 1024.0) * 1000.0).round() / 1000.0
}

/// Starts memory tracking for the calling logical task.
///
/// Captures a baseline so the final metrics report what this task
/// allocated.  Starting again replaces the session with a fresh baseline.
pub fn start_memory_tracking() {
    let ctx = Context::current();
    ctx.with_memory(Some(Arc::new(MemorySession::begin()))).attach();
}

/// Stops tracking and returns the final metrics for the calling task.
///
/// With no active session this returns [`MemorySnapshot::ZERO`] rather than
/// failing; calling it twice in a row is safe.
pub fn stop_memory_tracking() -> MemorySnapshot {
    let ctx = Context::current();
    let snapshot = match ctx.memory_session() {
        Some(session) if session.active.swap(false, Ordering::Relaxed) => session.observe(),
        _ => MemorySnapshot::ZERO,
    };
    ctx.with_memory(None).attach();
    snapshot
}

/// A live sample without stopping tracking, for inclusion in logs.
///
/// Returns [`MemorySnapshot::ZERO`] when monitoring is not active for this
/// task.
pub fn get_memory_context() -> MemorySnapshot {
    match Context::current().memory_session() {
        Some(session) if session.is_active() => session.observe(),
        _ => MemorySnapshot::ZERO,
    }
}

/// Whether memory monitoring is active for the calling task.
pub fn is_memory_monitoring_enabled() -> bool {
    Context::current()
        .memory_session()
        .map(|session| session.is_active())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    // The unit-test binary opts into tracking, like a host process would.
    #[global_allocator]
    static ALLOC: TrackingAllocator<System> = TrackingAllocator::system();

    #[test]
    fn zero_when_disabled() {
        assert!(!is_memory_monitoring_enabled());
        assert_eq!(get_memory_context(), MemorySnapshot::ZERO);
        assert_eq!(stop_memory_tracking(), MemorySnapshot::ZERO);
    }

    #[test]
    fn tracks_an_allocation() {
        start_memory_tracking();
        assert!(is_memory_monitoring_enabled());

        let ballast = vec![0u8; 8 * 1024 * 1024];
        let sampled = get_memory_context();
        // 8 MiB held; concurrent test threads may drift the totals by a
        // little, not by megabytes.
        assert!(sampled.allocated_mb > 7.0, "allocated {}", sampled.allocated_mb);
        assert!(sampled.peak_mb >= sampled.current_mb);
        drop(ballast);

        let finished = stop_memory_tracking();
        assert!(finished.peak_mb >= finished.allocated_mb);
        assert!(finished.peak_mb >= sampled.current_mb);
        assert!(!is_memory_monitoring_enabled());
    }

    #[test]
    fn peak_dominates_every_sample() {
        start_memory_tracking();
        let mut max_seen_current: f64 = 0.0;
        let mut last_peak: f64 = 0.0;
        let mut keep = Vec::new();
        for chunk in 0..4 {
            keep.push(vec![chunk as u8; 512 * 1024]);
            let sample = get_memory_context();
            assert!(sample.peak_mb >= last_peak, "peak regressed");
            last_peak = sample.peak_mb;
            max_seen_current = max_seen_current.max(sample.current_mb);
        }
        let finished = stop_memory_tracking();
        assert!(finished.peak_mb >= max_seen_current);
        assert!(finished.peak_mb >= finished.allocated_mb);
    }

    #[test]
    fn double_stop_is_safe() {
        start_memory_tracking();
        let _hold = vec![1u8; 1024 * 1024];
        let first = stop_memory_tracking();
        let second = stop_memory_tracking();
        assert!(first.peak_mb > 0.0);
        assert_eq!(second, MemorySnapshot::ZERO);
    }

    #[test]
    fn session_survives_request_context_changes() {
        start_memory_tracking();
        crate::set_request_context("req-mem", None, Fields::new());
        assert!(is_memory_monitoring_enabled());
        crate::clear_request_context();
        assert!(is_memory_monitoring_enabled());
        stop_memory_tracking();
        assert!(!is_memory_monitoring_enabled());
    }

    #[test]
    fn snapshot_fields_are_ordered() {
        let snapshot = MemorySnapshot {
            allocated_mb: 1.5,
            peak_mb: 2.25,
            current_mb: 1.75,
        };
        let keys: Vec<_> = snapshot.fields().keys().cloned().collect();
        assert_eq!(
            keys,
            vec!["memory.allocated_mb", "memory.peak_mb", "memory.current_mb"]
        );
    }
}
