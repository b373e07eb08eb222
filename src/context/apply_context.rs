// SPDX-License-Identifier: MIT OR Apache-2.0

//! Async context preservation.

use std::future::Future;
use std::pin::Pin;
use std::task::Poll;

use super::scope_impl::Context;

/// A [`Future`] wrapper that preserves request context across async executor
/// boundaries.
///
/// Executors generally don't preserve thread-local state between poll calls:
/// a task may be polled on a different worker thread after every await point,
/// and between polls the same worker runs unrelated tasks.  `ApplyContext`
/// saves the worker's context, installs the task's own, polls, and restores
/// the worker's context -- so the request scope follows the logical task, not
/// the thread, and neighbouring tasks never observe it.
///
/// # Examples
///
/// ```
/// use reqwise::{ApplyContext, Context};
///
/// async fn handle_request() {
///     // logs here see the request context
/// }
///
/// # async fn example() {
/// reqwise::set_request_context("req-9", None, reqwise::Fields::new());
/// let future = ApplyContext::new(Context::current(), handle_request());
/// future.await;
/// # }
/// ```
pub struct ApplyContext<F>(Context, F);

impl<F> ApplyContext<F> {
    /// Wraps `f` so that `context` is current during every poll.
    pub fn new(context: Context, f: F) -> Self {
        Self(context, f)
    }
}

impl<F> Future for ApplyContext<F>
where
    F: Future,
{
    type Output = F::Output;

    fn poll(self: Pin<&mut Self>, cx: &mut std::task::Context<'_>) -> Poll<Self::Output> {
        let (context, fut) = unsafe {
            let d = self.get_unchecked_mut();
            (d.0.clone(), Pin::new_unchecked(&mut d.1))
        };
        let prior_context = Context::current();
        context.attach();
        let r = fut.poll(cx);
        prior_context.attach();
        r
    }
}
