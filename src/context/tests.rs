// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tests for the context module.

use super::scope_impl::Context;
use super::{ApplyContext, clear_request_context, get_context, set_request_context};
use crate::fields;
use crate::log_record::Fields;

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Barrier};
use std::task::{Poll, Waker};

#[test]
fn set_get_clear_round_trip() {
    set_request_context("req-123", Some("192.168.1.1"), fields! {
        "user_id" => "usr-456",
    });

    let ctx = get_context();
    assert_eq!(ctx["request.id"], "req-123");
    assert_eq!(ctx["client.ip"], "192.168.1.1");
    assert_eq!(ctx["user_id"], "usr-456");

    clear_request_context();

    let ctx = get_context();
    assert_eq!(ctx["request.id"], "-");
    assert_eq!(ctx["client.ip"], "-");
    assert!(!ctx.contains_key("user_id"));
}

#[test]
fn clear_is_idempotent() {
    set_request_context("req-once", None, Fields::new());
    clear_request_context();
    // Second clear with no active scope is a no-op, not an error.
    clear_request_context();
    assert_eq!(get_context()["request.id"], "-");
}

#[test]
fn null_extras_are_dropped() {
    set_request_context("req-n", None, fields! {
        "present" => 1,
        "absent" => serde_json::Value::Null,
    });
    let ctx = get_context();
    assert!(ctx.contains_key("present"));
    assert!(!ctx.contains_key("absent"));
    clear_request_context();
}

#[test]
fn scopes_do_not_leak_between_threads() {
    let barrier = Arc::new(Barrier::new(2));

    let handles: Vec<_> = ["req-AAA", "req-BBB"]
        .into_iter()
        .map(|request_id| {
            let barrier = barrier.clone();
            std::thread::spawn(move || {
                set_request_context(request_id, None, Fields::new());
                // Both scopes are live at this point; neither thread may see
                // the other's.
                barrier.wait();
                let seen = get_context()["request.id"].clone();
                clear_request_context();
                assert_eq!(seen, request_id);
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("isolation thread panicked");
    }
}

/// Asserts the current request id at every poll, yielding once in between so
/// the caller can move it across threads mid-flight.
struct AssertRequestId {
    expected: &'static str,
    polled: bool,
}

impl Future for AssertRequestId {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, _cx: &mut std::task::Context<'_>) -> Poll<()> {
        assert_eq!(get_context()["request.id"], self.expected);
        if self.polled {
            Poll::Ready(())
        } else {
            self.polled = true;
            Poll::Pending
        }
    }
}

#[test]
fn apply_context_survives_thread_migration() {
    let task_ctx = Context::empty().with_request("req-TASK".to_string(), None, Fields::new());
    let mut future = Box::pin(ApplyContext::new(
        task_ctx,
        AssertRequestId {
            expected: "req-TASK",
            polled: false,
        },
    ));

    // First poll happens on a worker that belongs to an unrelated request.
    set_request_context("req-WORKER-1", None, Fields::new());
    let mut cx = std::task::Context::from_waker(Waker::noop());
    assert_eq!(future.as_mut().poll(&mut cx), Poll::Pending);
    // The worker's own scope is restored after the poll.
    assert_eq!(get_context()["request.id"], "req-WORKER-1");
    clear_request_context();

    // Resume on a different thread with a different ambient scope.
    std::thread::spawn(move || {
        set_request_context("req-WORKER-2", None, Fields::new());
        let mut cx = std::task::Context::from_waker(Waker::noop());
        assert_eq!(future.as_mut().poll(&mut cx), Poll::Ready(()));
        assert_eq!(get_context()["request.id"], "req-WORKER-2");
    })
    .join()
    .expect("migration thread panicked");
}

#[test_executors::async_test]
async fn apply_context_wraps_an_async_task() {
    let task_ctx = Context::empty().with_request("req-async".to_string(), None, Fields::new());
    ApplyContext::new(task_ctx, async {
        assert_eq!(get_context()["request.id"], "req-async");
    })
    .await;
    assert_eq!(get_context()["request.id"], "-");
}

#[test]
fn attach_hands_scope_to_spawned_thread() {
    set_request_context("req-parent", Some("10.0.0.7"), Fields::new());
    let snapshot = Context::current();
    clear_request_context();

    std::thread::spawn(move || {
        snapshot.attach();
        let ctx = get_context();
        assert_eq!(ctx["request.id"], "req-parent");
        assert_eq!(ctx["client.ip"], "10.0.0.7");
    })
    .join()
    .expect("attach thread panicked");
}
