//! GPU query resource.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::backend::ResourceHandle;
use crate::device::DisposalQueue;
use crate::types::QueryKind;

use super::{DisposalGuard, ResourceId};

/// An occlusion query.
///
/// Begin and end it around draws with [`GraphicsDevice::begin_query`] and
/// [`GraphicsDevice::end_query`], then poll [`GraphicsDevice::query_result`].
///
/// [`GraphicsDevice::begin_query`]: crate::GraphicsDevice::begin_query
/// [`GraphicsDevice::end_query`]: crate::GraphicsDevice::end_query
/// [`GraphicsDevice::query_result`]: crate::GraphicsDevice::query_result
pub struct Query {
    id: ResourceId,
    handle: ResourceHandle,
    kind: QueryKind,
    active: AtomicBool,
    _guard: DisposalGuard,
}

impl Query {
    /// Create a new query (called by GraphicsDevice).
    pub(crate) fn new(handle: ResourceHandle, kind: QueryKind, queue: Arc<DisposalQueue>) -> Self {
        let id = ResourceId::next();
        Self {
            id,
            handle,
            kind,
            active: AtomicBool::new(false),
            _guard: DisposalGuard::new(id, vec![handle], queue),
        }
    }

    pub fn id(&self) -> ResourceId {
        self.id
    }

    pub fn handle(&self) -> ResourceHandle {
        self.handle
    }

    pub fn kind(&self) -> QueryKind {
        self.kind
    }

    /// Whether the query is between begin and end.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub(crate) fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::Release);
    }
}

impl std::fmt::Debug for Query {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Query")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("active", &self.is_active())
            .finish()
    }
}

static_assertions::assert_impl_all!(Query: Send, Sync);
