// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core Context implementation.

use std::cell::{Cell, OnceCell};
use std::sync::Arc;

use crate::log_record::Fields;
use crate::memory::MemorySession;

/// Placeholder for "no request context", e.g. during startup/shutdown.
const UNSET: &str = "-";

#[derive(Debug)]
struct ContextInner {
    request_id: Option<String>,
    client_ip: Option<String>,
    extra: Fields,
    /// Memory-tracking session for this task, if tracking was started.
    memory: Option<Arc<MemorySession>>,
}

/// Immutable per-task context snapshot.
///
/// A `Context` holds the request metadata (and, if started, the
/// memory-tracking session) of one logical task.  Contexts are cheap to
/// clone (Arc-based) and thread-safe; mutation is expressed by building a
/// new snapshot and [`attach`](Context::attach)ing it, which is what keeps
/// concurrently-running tasks isolated even when they share worker threads
/// over their lifetimes.
#[derive(Debug, Clone)]
pub struct Context {
    inner: Arc<ContextInner>,
}

impl PartialEq for Context {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Context {}

thread_local! {
    static CONTEXT: OnceCell<Cell<Context>> = const { OnceCell::new() };
}

/// Lazily initializes and returns the thread-local context cell.
fn get_or_init_context(once: &OnceCell<Cell<Context>>) -> &Cell<Context> {
    once.get_or_init(|| Cell::new(Context::empty()))
}

impl Context {
    /// The empty context: no request scope, no memory session.
    pub(crate) fn empty() -> Context {
        Context {
            inner: Arc::new(ContextInner {
                request_id: None,
                client_ip: None,
                extra: Fields::new(),
                memory: None,
            }),
        }
    }

    /// Returns the current context for the calling task.
    ///
    /// Every thread starts with an empty context; hand-offs between tasks
    /// replace it via [`attach`](Context::attach) or [`ApplyContext`](super::ApplyContext).
    #[inline]
    pub fn current() -> Context {
        CONTEXT.with(|once| {
            let c = get_or_init_context(once);
            //safety: we don't let anyone get a mutable reference to this
            unsafe { &*c.as_ptr() }.clone()
        })
    }

    /// Installs this context as the calling thread's current context.
    ///
    /// All subsequent emissions on this thread are enriched from this
    /// context until it is replaced.  When handing work to another thread,
    /// capture [`Context::current`] on the producing side and `attach` it on
    /// the consuming side before doing anything that logs.
    pub fn attach(self) {
        CONTEXT.with(|once| {
            get_or_init_context(once).replace(self);
        });
    }

    /// A new snapshot with the given request scope, preserving any active
    /// memory session.
    pub(crate) fn with_request(
        &self,
        request_id: String,
        client_ip: Option<String>,
        extra: Fields,
    ) -> Context {
        // Null values are dropped so absent optional metadata doesn't show
        // up as "null" in every record.
        let extra: Fields = extra
            .into_iter()
            .filter(|(_, v)| !v.is_null())
            .collect();
        Context {
            inner: Arc::new(ContextInner {
                request_id: Some(request_id),
                client_ip,
                extra,
                memory: self.inner.memory.clone(),
            }),
        }
    }

    /// A new snapshot with the request scope removed, preserving any active
    /// memory session.
    pub(crate) fn without_request(&self) -> Context {
        Context {
            inner: Arc::new(ContextInner {
                request_id: None,
                client_ip: None,
                extra: Fields::new(),
                memory: self.inner.memory.clone(),
            }),
        }
    }

    /// A new snapshot carrying `session`, preserving the request scope.
    pub(crate) fn with_memory(&self, session: Option<Arc<MemorySession>>) -> Context {
        Context {
            inner: Arc::new(ContextInner {
                request_id: self.inner.request_id.clone(),
                client_ip: self.inner.client_ip.clone(),
                extra: self.inner.extra.clone(),
                memory: session,
            }),
        }
    }

    pub(crate) fn memory_session(&self) -> Option<&Arc<MemorySession>> {
        self.inner.memory.as_ref()
    }

    /// The scope rendered as ordered fields: `request.id`, `client.ip`
    /// (placeholder `-` when unset), then extras.
    pub(crate) fn request_fields(&self) -> Fields {
        let mut fields = Fields::new();
        fields.insert(
            "request.id".to_string(),
            self.inner.request_id.as_deref().unwrap_or(UNSET).into(),
        );
        fields.insert(
            "client.ip".to_string(),
            self.inner.client_ip.as_deref().unwrap_or(UNSET).into(),
        );
        for (key, value) in &self.inner.extra {
            fields.insert(key.clone(), value.clone());
        }
        fields
    }
}
