//     ______   __  __     __         ______     ______
//    /\  == \ /\ \/\ \   /\ \       /\  ___\   /\  ___\
//    \ \  _-/ \ \ \_\ \  \ \ \____  \ \___  \  \ \  __\
//     \ \_\    \ \_____\  \ \_____\  \/\_____\  \ \_____\
//      \/_/     \/_____/   \/_____/   \/_____/   \/_____/
//
// Author: Colin MacRitchie / Ripple Group
//! Thread handles and the providers that choose which threads get sampled
//!
//! When a blockage is confirmed the detector asks its
//! [`ThreadSnapshotProvider`] for the threads to capture. The order returned
//! is the order of stack traces in the resulting event.

#![forbid(unsafe_code)]

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, LazyLock};
use std::thread::{self, ThreadId};

use dashmap::DashMap;

use crate::stack::{self, CaptureError, ShadowStack, StackSampler, StackTrace};

#[cfg(feature = "tracing")]
use tracing::debug;

/// A thread whose stack can be captured
#[derive(Clone)]
pub struct ThreadHandle {
    id: ThreadId,
    name: String,
    sampler: Arc<dyn StackSampler>,
}

impl ThreadHandle {
    /// Create a handle from its parts
    pub fn new(id: ThreadId, name: impl Into<String>, sampler: Arc<dyn StackSampler>) -> Self {
        Self {
            id,
            name: name.into(),
            sampler,
        }
    }

    /// Thread identifier
    pub fn id(&self) -> ThreadId {
        self.id
    }

    /// Thread name, `"<unnamed>"` for anonymous threads
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Capture the thread's current stack
    ///
    /// # Errors
    ///
    /// Propagates the sampler's [`CaptureError`].
    pub fn capture(&self) -> Result<StackTrace, CaptureError> {
        self.sampler.sample()
    }
}

impl fmt::Debug for ThreadHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadHandle")
            .field("id", &self.id)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Chooses the threads whose stacks go into a blocked-thread event
pub trait ThreadSnapshotProvider: Send + Sync {
    /// Threads to capture, in reporting order
    ///
    /// # Errors
    ///
    /// Returns [`CaptureError`] when no usable thread list is available; the
    /// detector retries on its next poll.
    fn threads(&self) -> Result<Vec<ThreadHandle>, CaptureError>;
}

/// Provider returning a fixed list of threads
#[derive(Debug, Clone)]
pub struct PredefinedThreadProvider {
    threads: Vec<ThreadHandle>,
}

impl PredefinedThreadProvider {
    /// Provide exactly these threads in this order
    pub fn new(threads: impl IntoIterator<Item = ThreadHandle>) -> Self {
        Self {
            threads: threads.into_iter().collect(),
        }
    }
}

impl ThreadSnapshotProvider for PredefinedThreadProvider {
    fn threads(&self) -> Result<Vec<ThreadHandle>, CaptureError> {
        Ok(self.threads.clone())
    }
}

/// Provider that keeps only the threads accepted by a predicate
pub struct FilteredThreadProvider<P, F> {
    inner: P,
    filter: F,
}

impl<P, F> FilteredThreadProvider<P, F>
where
    P: ThreadSnapshotProvider,
    F: Fn(&ThreadHandle) -> bool + Send + Sync,
{
    /// Wrap `inner`, dropping every thread `filter` rejects
    pub fn new(inner: P, filter: F) -> Self {
        Self { inner, filter }
    }
}

impl<P, F> ThreadSnapshotProvider for FilteredThreadProvider<P, F>
where
    P: ThreadSnapshotProvider,
    F: Fn(&ThreadHandle) -> bool + Send + Sync,
{
    fn threads(&self) -> Result<Vec<ThreadHandle>, CaptureError> {
        let mut threads = self.inner.threads()?;
        threads.retain(|thread| (self.filter)(thread));
        Ok(threads)
    }
}

/// Provider returning every registered thread, oldest registration first
#[derive(Debug, Clone, Copy, Default)]
pub struct ActiveThreadProvider;

impl ThreadSnapshotProvider for ActiveThreadProvider {
    fn threads(&self) -> Result<Vec<ThreadHandle>, CaptureError> {
        Ok(registered_threads())
    }
}

struct RegisteredThread {
    order: u64,
    handle: ThreadHandle,
}

/* Process-wide registry of threads that publish a shadow stack */
static REGISTRY: LazyLock<DashMap<ThreadId, RegisteredThread>> = LazyLock::new(DashMap::new);
static REGISTRATION_ORDER: AtomicU64 = AtomicU64::new(0);

/// Keeps the calling thread registered until dropped
#[must_use = "the thread is unregistered as soon as the guard is dropped"]
#[derive(Debug)]
pub struct RegistrationGuard {
    id: ThreadId,
    handle: ThreadHandle,
    previous: Option<Arc<ShadowStack>>,
}

impl RegistrationGuard {
    /// Handle of the registered thread
    pub fn handle(&self) -> &ThreadHandle {
        &self.handle
    }
}

impl Drop for RegistrationGuard {
    fn drop(&mut self) {
        REGISTRY.remove(&self.id);
        stack::install_current(self.previous.take());

        #[cfg(feature = "tracing")]
        debug!(thread = %self.handle.name, "Thread unregistered");
    }
}

/// Register the calling thread so its shadow stack can be sampled
///
/// Registering twice from the same thread replaces the earlier entry; the
/// newest guard owns the registration.
pub fn register_current_thread() -> RegistrationGuard {
    let current = thread::current();
    let id = current.id();
    let name = current.name().unwrap_or("<unnamed>").to_string();
    let shadow = Arc::new(ShadowStack::new());
    let handle = ThreadHandle::new(id, name, shadow.clone());

    let previous = stack::install_current(Some(shadow));
    let order = REGISTRATION_ORDER.fetch_add(1, Ordering::Relaxed);
    REGISTRY.insert(
        id,
        RegisteredThread {
            order,
            handle: handle.clone(),
        },
    );

    #[cfg(feature = "tracing")]
    debug!(thread = %handle.name, "Thread registered for stack capture");

    RegistrationGuard {
        id,
        handle,
        previous,
    }
}

/// Snapshot of every registered thread, oldest registration first
pub fn registered_threads() -> Vec<ThreadHandle> {
    let mut entries: Vec<(u64, ThreadHandle)> = REGISTRY
        .iter()
        .map(|entry| (entry.order, entry.handle.clone()))
        .collect();
    entries.sort_by_key(|(order, _)| *order);
    entries.into_iter().map(|(_, handle)| handle).collect()
}
