// SPDX-License-Identifier: MIT OR Apache-2.0

/*!
Task-affine request context.

Every log record is enriched with the metadata of the logical task (request,
background job) that emitted it -- without callers threading a request id
through every function signature.  The metadata lives in a [`Context`]: an
immutable, cheaply-cloneable snapshot held in a thread-local slot.

Thread-locals alone are not enough: a context set in task A must not leak
into task B just because both happen to run on the same worker thread, and
it must survive task A suspending and resuming on a *different* thread.  So
the slot only ever holds a snapshot, and the snapshot travels with the task:

* synchronous hand-offs capture [`Context::current`] and call
  [`Context::attach`] on the other side;
* async tasks wrap their future in [`ApplyContext`], which saves and
  restores the slot around every poll, so the context follows the task
  across whatever threads the executor schedules it on.

The crate-level helpers [`set_request_context`], [`clear_request_context`]
and [`get_context`] operate on the calling task's slot and never fail:
reading with no context set yields placeholder values, and clearing twice is
a no-op.
*/

mod apply_context;
mod scope_impl;

#[cfg(test)]
mod tests;

pub use apply_context::ApplyContext;
pub use scope_impl::Context;

use crate::log_record::Fields;

/// Establishes the request context for the calling logical task.
///
/// Replaces whatever scope the current thread inherited from an unrelated
/// prior task.  `Null` values in `extra` are dropped to keep logs clean.
/// An active memory-tracking session is preserved across the call.
///
/// ```
/// use reqwise::fields;
///
/// reqwise::set_request_context("req-123", Some("192.168.1.1"), fields! {
///     "user_id" => "usr-456",
/// });
/// let ctx = reqwise::get_context();
/// assert_eq!(ctx["request.id"], "req-123");
/// reqwise::clear_request_context();
/// ```
pub fn set_request_context(
    request_id: impl Into<String>,
    client_ip: Option<&str>,
    extra: Fields,
) {
    let current = Context::current();
    current
        .with_request(request_id.into(), client_ip.map(str::to_owned), extra)
        .attach();
}

/// Removes the calling task's request context.
///
/// Idempotent: clearing with no active scope is a no-op, not an error.
/// Call at request exit so the worker thread does not carry a stale scope
/// into the next task it picks up.
pub fn clear_request_context() {
    let current = Context::current();
    current.without_request().attach();
}

/// Returns the active scope's fields in insertion order.
///
/// Always contains `request.id` and `client.ip` (`-` when unset, e.g.
/// during startup or shutdown), followed by any extra fields.  Never fails.
pub fn get_context() -> Fields {
    Context::current().request_fields()
}
