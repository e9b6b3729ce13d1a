//! GPU resources.
//!
//! This module contains the GPU resource types that are created by [`GraphicsDevice`]:
//! - [`Texture`] - sampleable 2D, cube or array texture
//! - [`RenderTarget`] - texture that can be rendered into, with optional MSAA and depth storage
//! - [`VertexBuffer`] / [`IndexBuffer`] - geometry buffers
//! - [`Shader`] - vertex or pixel shader with reflection data
//! - [`Query`] - occlusion query
//!
//! Resources are reference-counted with [`Arc`] and can be shared and dropped on
//! any thread. They never call the backend when dropped: their native handles
//! go to the device's [`DisposalQueue`] and are destroyed on the render thread
//! a full frame later.
//!
//! [`GraphicsDevice`]: crate::GraphicsDevice
//! [`Arc`]: std::sync::Arc

mod buffer;
mod query;
mod render_target;
mod shader;
mod texture;

pub use buffer::{IndexBuffer, VertexBuffer};
pub use query::Query;
pub use render_target::RenderTarget;
pub use shader::Shader;
pub use texture::Texture;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::backend::ResourceHandle;
use crate::device::DisposalQueue;

static NEXT_RESOURCE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a resource object.
///
/// Caches key on ids rather than native handles, since backends may recycle
/// native names after destruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(u64);

impl ResourceId {
    /// Placeholder that never names a resource.
    pub(crate) const INVALID: Self = Self(0);

    /// Allocate a fresh id.
    pub(crate) fn next() -> Self {
        Self(NEXT_RESOURCE_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw id value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ResourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Owns the native handles of one resource until it is dropped.
pub(crate) struct DisposalGuard {
    owner: ResourceId,
    handles: Vec<ResourceHandle>,
    queue: Arc<DisposalQueue>,
}

impl DisposalGuard {
    pub(crate) fn new(
        owner: ResourceId,
        handles: Vec<ResourceHandle>,
        queue: Arc<DisposalQueue>,
    ) -> Self {
        Self {
            owner,
            handles,
            queue,
        }
    }
}

impl Drop for DisposalGuard {
    fn drop(&mut self) {
        self.queue.enqueue_all(Some(self.owner), &self.handles);
    }
}

impl std::fmt::Debug for DisposalGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DisposalGuard")
            .field("owner", &self.owner)
            .field("handles", &self.handles)
            .finish()
    }
}

/// A texture that can be bound to a sampler slot.
#[derive(Debug, Clone)]
pub enum TextureRef {
    /// A plain texture.
    Texture(Arc<Texture>),
    /// The sampleable texture of a render target.
    RenderTarget(Arc<RenderTarget>),
}

impl TextureRef {
    /// Identity of the referenced resource.
    pub fn id(&self) -> ResourceId {
        match self {
            Self::Texture(texture) => texture.id(),
            Self::RenderTarget(target) => target.id(),
        }
    }

    /// Sampleable native texture.
    pub fn handle(&self) -> ResourceHandle {
        match self {
            Self::Texture(texture) => texture.handle(),
            Self::RenderTarget(target) => target.texture_handle(),
        }
    }
}

impl From<Arc<Texture>> for TextureRef {
    fn from(texture: Arc<Texture>) -> Self {
        Self::Texture(texture)
    }
}

impl From<&Arc<Texture>> for TextureRef {
    fn from(texture: &Arc<Texture>) -> Self {
        Self::Texture(Arc::clone(texture))
    }
}

impl From<Arc<RenderTarget>> for TextureRef {
    fn from(target: Arc<RenderTarget>) -> Self {
        Self::RenderTarget(target)
    }
}

impl From<&Arc<RenderTarget>> for TextureRef {
    fn from(target: &Arc<RenderTarget>) -> Self {
        Self::RenderTarget(Arc::clone(target))
    }
}

static_assertions::assert_impl_all!(ResourceId: Send, Sync);
static_assertions::assert_impl_all!(TextureRef: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::ResourceKind;

    #[test]
    fn test_ids_are_unique() {
        let a = ResourceId::next();
        let b = ResourceId::next();
        assert_ne!(a, b);
        assert!(b > a);
    }

    #[test]
    fn test_guard_enqueues_on_drop() {
        let queue = Arc::new(DisposalQueue::new());
        let owner = ResourceId::next();
        let handles = vec![
            ResourceHandle::new(ResourceKind::Texture, 1),
            ResourceHandle::new(ResourceKind::Renderbuffer, 2),
        ];
        let guard = DisposalGuard::new(owner, handles, Arc::clone(&queue));
        assert_eq!(queue.pending_count(), 0);

        drop(guard);
        assert_eq!(queue.pending_count(), 2);
        assert_eq!(queue.ready_count(), 0);
    }
}
