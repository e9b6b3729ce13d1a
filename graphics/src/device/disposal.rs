//! Deferred, double-buffered disposal of native handles.
//!
//! Dropping a resource must never touch the native API directly: the drop may
//! happen on any thread, and the GPU may still be reading the object for the
//! frame that is in flight. Instead the handles are queued and destroyed on
//! the render thread one full frame later.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                DisposalQueue                 │
//! │   ┌───────────┐            ┌───────────┐     │
//! │   │  current  │ <── swap ──│   next    │ <── enqueue (any thread)
//! │   └───────────┘            └───────────┘     │
//! └──────────────────────────────────────────────┘
//!
//! On Present (render thread):
//!   1. Take everything in "current" (queued during the previous frame)
//!   2. Swap "current" and "next"
//!   3. Destroy the taken handles outside the lock
//! ```
//!
//! A handle enqueued during frame K therefore survives the Present of frame K
//! and is destroyed at the Present of frame K+1.
//!
//! Native context handles have their own [`ContextDisposalQueue`], drained on
//! window lifecycle events instead of on Present.

use parking_lot::Mutex;

use crate::backend::{BackendAdapter, ResourceHandle};
use crate::resources::ResourceId;

/// A handle waiting for destruction, tagged with the resource that owned it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DisposalEntry {
    /// Resource that owned the handle, if it was owned by one.
    pub owner: Option<ResourceId>,
    /// Handle to destroy.
    pub handle: ResourceHandle,
}

/// Outcome of draining handles.
#[derive(Debug, Default)]
pub struct DrainReport {
    /// Handles destroyed through the backend.
    pub destroyed: usize,
    /// Handles skipped because the backend reported them already dead.
    pub skipped: usize,
    /// Handles whose destroy call failed and was ignored.
    pub failed: usize,
    /// Every entry taken from the queue, destroyed or not.
    pub retired: Vec<DisposalEntry>,
}

impl DrainReport {
    /// Resource ids whose handles were retired, deduplicated.
    pub fn retired_owners(&self) -> Vec<ResourceId> {
        let mut owners: Vec<ResourceId> = self.retired.iter().filter_map(|e| e.owner).collect();
        owners.sort_unstable();
        owners.dedup();
        owners
    }
}

#[derive(Debug, Default)]
struct Buffers {
    current: Vec<DisposalEntry>,
    next: Vec<DisposalEntry>,
}

/// Mutex-guarded double buffer of handles pending destruction.
///
/// Shared between the device, every resource it created and every
/// [`DeviceHandle`](crate::DeviceHandle) through an `Arc`.
#[derive(Debug, Default)]
pub struct DisposalQueue {
    buffers: Mutex<Buffers>,
}

impl DisposalQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a handle for destruction after the next full frame.
    ///
    /// Callable from any thread; holds the lock only for the push.
    pub fn enqueue(&self, owner: Option<ResourceId>, handle: ResourceHandle) {
        self.buffers.lock().next.push(DisposalEntry { owner, handle });
    }

    /// Queue several handles owned by the same resource under one lock.
    pub fn enqueue_all(&self, owner: Option<ResourceId>, handles: &[ResourceHandle]) {
        let mut buffers = self.buffers.lock();
        buffers
            .next
            .extend(handles.iter().map(|&handle| DisposalEntry { owner, handle }));
    }

    /// Destroy everything queued before the previous flip, then flip.
    ///
    /// Must be called on the render thread, once per presented frame. When
    /// `query_liveness` is set, handles the backend reports as already dead
    /// are skipped instead of destroyed.
    pub fn flip_and_drain(
        &self,
        backend: &mut dyn BackendAdapter,
        query_liveness: bool,
    ) -> DrainReport {
        let ready = {
            let mut buffers = self.buffers.lock();
            let ready = std::mem::take(&mut buffers.current);
            let buffers = &mut *buffers;
            std::mem::swap(&mut buffers.current, &mut buffers.next);
            ready
        };
        destroy_entries(backend, ready, query_liveness)
    }

    /// Destroy every queued handle immediately, regardless of frame timing.
    ///
    /// Only valid when the GPU is idle, e.g. at device shutdown.
    pub fn flush_all(&self, backend: &mut dyn BackendAdapter, query_liveness: bool) -> DrainReport {
        let ready = {
            let mut buffers = self.buffers.lock();
            let mut ready = std::mem::take(&mut buffers.current);
            ready.append(&mut buffers.next);
            ready
        };
        destroy_entries(backend, ready, query_liveness)
    }

    /// Number of handles waiting in either buffer.
    pub fn pending_count(&self) -> usize {
        let buffers = self.buffers.lock();
        buffers.current.len() + buffers.next.len()
    }

    /// Number of handles that will be destroyed at the next flip.
    pub fn ready_count(&self) -> usize {
        self.buffers.lock().current.len()
    }
}

/// Queue of native context handles retired by the window collaborator.
#[derive(Debug, Default)]
pub struct ContextDisposalQueue {
    pending: Mutex<Vec<ResourceHandle>>,
}

impl ContextDisposalQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a context handle. Callable from any thread.
    pub fn enqueue(&self, handle: ResourceHandle) {
        self.pending.lock().push(handle);
    }

    /// Destroy every queued context handle.
    pub fn drain(&self, backend: &mut dyn BackendAdapter, query_liveness: bool) -> DrainReport {
        let ready: Vec<DisposalEntry> = self
            .pending
            .lock()
            .drain(..)
            .map(|handle| DisposalEntry {
                owner: None,
                handle,
            })
            .collect();
        destroy_entries(backend, ready, query_liveness)
    }

    /// Number of queued context handles.
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }
}

/// What happened to a handle handed to [`destroy_quietly`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DestroyOutcome {
    Destroyed,
    Skipped,
    Failed,
}

/// Destroy a handle, tolerating handles that are already invalid.
pub(crate) fn destroy_quietly(
    backend: &mut dyn BackendAdapter,
    handle: ResourceHandle,
    query_liveness: bool,
) -> DestroyOutcome {
    if query_liveness && backend.is_live(handle) == Some(false) {
        log::debug!("Disposal: {handle} already invalid, skipping");
        return DestroyOutcome::Skipped;
    }
    match backend.destroy(handle) {
        Ok(()) => DestroyOutcome::Destroyed,
        Err(err) => {
            log::debug!("Disposal: ignoring failed destroy of {handle}: {err}");
            DestroyOutcome::Failed
        }
    }
}

fn destroy_entries(
    backend: &mut dyn BackendAdapter,
    entries: Vec<DisposalEntry>,
    query_liveness: bool,
) -> DrainReport {
    let mut report = DrainReport::default();
    for entry in &entries {
        match destroy_quietly(backend, entry.handle, query_liveness) {
            DestroyOutcome::Destroyed => report.destroyed += 1,
            DestroyOutcome::Skipped => report.skipped += 1,
            DestroyOutcome::Failed => report.failed += 1,
        }
    }
    if !entries.is_empty() {
        log::debug!(
            "Disposal: drained {} handles ({} destroyed, {} skipped, {} failed)",
            entries.len(),
            report.destroyed,
            report.skipped,
            report.failed
        );
    }
    report.retired = entries;
    report
}

static_assertions::assert_impl_all!(DisposalQueue: Send, Sync);
static_assertions::assert_impl_all!(ContextDisposalQueue: Send, Sync);

#[cfg(all(test, feature = "dummy"))]
mod tests {
    use super::*;
    use crate::backend::{BackendKind, DummyBackend};
    use crate::types::{TextureDescriptor, TextureFormat};

    fn texture(backend: &mut DummyBackend) -> ResourceHandle {
        backend
            .create_texture(&TextureDescriptor::new_2d(4, 4, TextureFormat::Rgba8Unorm))
            .unwrap()
    }

    #[test]
    fn test_destroyed_after_second_flip() {
        let mut backend = DummyBackend::new();
        let recorder = backend.recorder();
        let queue = DisposalQueue::new();
        let handle = texture(&mut backend);

        queue.enqueue(None, handle);
        let first = queue.flip_and_drain(&mut backend, true);
        assert_eq!(first.destroyed, 0);
        assert!(recorder.is_live(handle));
        assert_eq!(queue.ready_count(), 1);

        let second = queue.flip_and_drain(&mut backend, true);
        assert_eq!(second.destroyed, 1);
        assert!(!recorder.is_live(handle));
        assert_eq!(queue.pending_count(), 0);
    }

    #[test]
    fn test_invalid_handle_skipped_silently() {
        let mut backend = DummyBackend::new();
        let recorder = backend.recorder();
        let queue = DisposalQueue::new();
        let handle = texture(&mut backend);
        recorder.invalidate(handle);

        queue.enqueue(None, handle);
        let report = queue.flush_all(&mut backend, true);
        assert_eq!(report.skipped, 1);
        assert!(recorder.destroyed().is_empty());
    }

    #[test]
    fn test_failed_destroy_is_tolerated_without_liveness_query() {
        let mut backend = DummyBackend::with_kind(BackendKind::ContextObject);
        let recorder = backend.recorder();
        let queue = DisposalQueue::new();
        let handle = texture(&mut backend);
        recorder.invalidate(handle);

        queue.enqueue(None, handle);
        let report = queue.flush_all(&mut backend, true);
        assert_eq!(report.failed, 1);
        assert_eq!(report.retired.len(), 1);
    }

    #[test]
    fn test_retired_owners_deduplicated() {
        let mut backend = DummyBackend::new();
        let queue = DisposalQueue::new();
        let owner = ResourceId::next();
        let a = texture(&mut backend);
        let b = texture(&mut backend);

        queue.enqueue_all(Some(owner), &[a, b]);
        let report = queue.flush_all(&mut backend, false);
        assert_eq!(report.destroyed, 2);
        assert_eq!(report.retired_owners(), vec![owner]);
    }

    #[test]
    fn test_context_queue_drains_on_demand() {
        let mut backend = DummyBackend::new();
        let recorder = backend.recorder();
        let queue = ContextDisposalQueue::new();
        let context = texture(&mut backend);

        queue.enqueue(context);
        assert_eq!(queue.pending_count(), 1);
        let report = queue.drain(&mut backend, true);
        assert_eq!(report.destroyed, 1);
        assert!(!recorder.is_live(context));
    }
}
