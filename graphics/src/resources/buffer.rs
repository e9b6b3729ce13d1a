//! GPU vertex and index buffer resources.

use std::sync::Arc;

use crate::backend::ResourceHandle;
use crate::device::DisposalQueue;
use crate::types::{BufferDescriptor, BufferUsage, IndexElementSize, VertexDeclaration};

use super::{DisposalGuard, ResourceId};

/// A GPU vertex buffer.
///
/// Vertex buffers are created by [`GraphicsDevice::create_vertex_buffer`] and carry the
/// [`VertexDeclaration`] describing their contents.
///
/// # Example
///
/// ```ignore
/// let declaration = Arc::new(VertexDeclaration::from_elements(vec![
///     VertexElement::position(0),
///     VertexElement::color(12),
/// ]));
/// let buffer = device.create_vertex_buffer(declaration, 4, BufferUsage::WRITE_ONLY)?;
/// device.set_vertex_data(&buffer, 0, &vertices)?;
/// ```
///
/// [`GraphicsDevice::create_vertex_buffer`]: crate::GraphicsDevice::create_vertex_buffer
pub struct VertexBuffer {
    id: ResourceId,
    handle: ResourceHandle,
    declaration: Arc<VertexDeclaration>,
    vertex_count: u32,
    usage: BufferUsage,
    _guard: DisposalGuard,
}

impl VertexBuffer {
    /// Create a new vertex buffer (called by GraphicsDevice).
    pub(crate) fn new(
        handle: ResourceHandle,
        declaration: Arc<VertexDeclaration>,
        vertex_count: u32,
        usage: BufferUsage,
        queue: Arc<DisposalQueue>,
    ) -> Self {
        let id = ResourceId::next();
        Self {
            id,
            handle,
            declaration,
            vertex_count,
            usage,
            _guard: DisposalGuard::new(id, vec![handle], queue),
        }
    }

    /// Unique identity of this buffer.
    pub fn id(&self) -> ResourceId {
        self.id
    }

    /// Native buffer handle.
    pub fn handle(&self) -> ResourceHandle {
        self.handle
    }

    /// Layout of each vertex.
    pub fn declaration(&self) -> &Arc<VertexDeclaration> {
        &self.declaration
    }

    /// Capacity in vertices.
    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    /// Usage flags.
    pub fn usage(&self) -> BufferUsage {
        self.usage
    }

    /// Size in bytes.
    pub fn size(&self) -> u64 {
        u64::from(self.vertex_count) * u64::from(self.declaration.stride())
    }

    pub(crate) fn descriptor(
        declaration: &VertexDeclaration,
        vertex_count: u32,
        usage: BufferUsage,
    ) -> BufferDescriptor {
        BufferDescriptor::new(
            u64::from(vertex_count) * u64::from(declaration.stride()),
            usage | BufferUsage::VERTEX,
        )
    }
}

impl std::fmt::Debug for VertexBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VertexBuffer")
            .field("id", &self.id)
            .field("vertex_count", &self.vertex_count)
            .field("stride", &self.declaration.stride())
            .field("usage", &self.usage)
            .finish()
    }
}

/// A GPU index buffer.
pub struct IndexBuffer {
    id: ResourceId,
    handle: ResourceHandle,
    element_size: IndexElementSize,
    index_count: u32,
    usage: BufferUsage,
    _guard: DisposalGuard,
}

impl IndexBuffer {
    /// Create a new index buffer (called by GraphicsDevice).
    pub(crate) fn new(
        handle: ResourceHandle,
        element_size: IndexElementSize,
        index_count: u32,
        usage: BufferUsage,
        queue: Arc<DisposalQueue>,
    ) -> Self {
        let id = ResourceId::next();
        Self {
            id,
            handle,
            element_size,
            index_count,
            usage,
            _guard: DisposalGuard::new(id, vec![handle], queue),
        }
    }

    /// Unique identity of this buffer.
    pub fn id(&self) -> ResourceId {
        self.id
    }

    /// Native buffer handle.
    pub fn handle(&self) -> ResourceHandle {
        self.handle
    }

    /// Width of each index.
    pub fn element_size(&self) -> IndexElementSize {
        self.element_size
    }

    /// Capacity in indices.
    pub fn index_count(&self) -> u32 {
        self.index_count
    }

    /// Usage flags.
    pub fn usage(&self) -> BufferUsage {
        self.usage
    }

    /// Size in bytes.
    pub fn size(&self) -> u64 {
        u64::from(self.index_count) * u64::from(self.element_size.bytes())
    }
}

impl std::fmt::Debug for IndexBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexBuffer")
            .field("id", &self.id)
            .field("index_count", &self.index_count)
            .field("element_size", &self.element_size)
            .finish()
    }
}

// Ensure buffers are Send + Sync
static_assertions::assert_impl_all!(VertexBuffer: Send, Sync);
static_assertions::assert_impl_all!(IndexBuffer: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::ResourceKind;
    use crate::types::VertexElement;

    #[test]
    fn test_vertex_buffer_size() {
        let queue = Arc::new(DisposalQueue::new());
        let declaration = Arc::new(VertexDeclaration::from_elements(vec![
            VertexElement::position(0),
            VertexElement::color(12),
        ]));
        let buffer = VertexBuffer::new(
            ResourceHandle::new(ResourceKind::Buffer, 1),
            declaration,
            10,
            BufferUsage::WRITE_ONLY,
            queue,
        );
        assert_eq!(buffer.size(), 160);
        let debug = format!("{:?}", buffer);
        assert!(debug.contains("VertexBuffer"));
    }

    #[test]
    fn test_index_buffer_size() {
        let queue = Arc::new(DisposalQueue::new());
        let buffer = IndexBuffer::new(
            ResourceHandle::new(ResourceKind::Buffer, 1),
            IndexElementSize::SixteenBits,
            6,
            BufferUsage::empty(),
            Arc::clone(&queue),
        );
        assert_eq!(buffer.size(), 12);
        drop(buffer);
        assert_eq!(queue.pending_count(), 1);
    }
}
