//! GPU texture resource.

use std::sync::Arc;

use crate::backend::ResourceHandle;
use crate::device::DisposalQueue;
use crate::types::{TextureDescriptor, TextureDimension, TextureFormat};

use super::{DisposalGuard, ResourceId};

/// A GPU texture resource.
///
/// Textures are created by [`GraphicsDevice::create_texture`] and are reference-counted.
/// Dropping the last reference queues the native texture for deferred disposal.
///
/// # Example
///
/// ```ignore
/// let texture = device.create_texture(&TextureDescriptor::new_2d(
///     256, 256,
///     TextureFormat::Rgba8Unorm,
/// ))?;
/// device.set_texture_data(&texture, 0, 0, &pixels)?;
/// ```
///
/// [`GraphicsDevice::create_texture`]: crate::GraphicsDevice::create_texture
pub struct Texture {
    id: ResourceId,
    handle: ResourceHandle,
    descriptor: TextureDescriptor,
    _guard: DisposalGuard,
}

impl Texture {
    /// Create a new texture (called by GraphicsDevice).
    pub(crate) fn new(
        handle: ResourceHandle,
        descriptor: TextureDescriptor,
        queue: Arc<DisposalQueue>,
    ) -> Self {
        let id = ResourceId::next();
        Self {
            id,
            handle,
            descriptor,
            _guard: DisposalGuard::new(id, vec![handle], queue),
        }
    }

    /// Unique identity of this texture.
    pub fn id(&self) -> ResourceId {
        self.id
    }

    /// Native texture handle.
    pub fn handle(&self) -> ResourceHandle {
        self.handle
    }

    /// Get the texture descriptor.
    pub fn descriptor(&self) -> &TextureDescriptor {
        &self.descriptor
    }

    /// Get the texture width.
    pub fn width(&self) -> u32 {
        self.descriptor.width
    }

    /// Get the texture height.
    pub fn height(&self) -> u32 {
        self.descriptor.height
    }

    /// Get the texture format.
    pub fn format(&self) -> TextureFormat {
        self.descriptor.format
    }

    /// Get the texture shape.
    pub fn dimension(&self) -> TextureDimension {
        self.descriptor.dimension
    }

    /// Get the mip level count.
    pub fn mip_level_count(&self) -> u32 {
        self.descriptor.mip_level_count
    }

    /// Get the array layer count (6 for cube maps).
    pub fn array_layers(&self) -> u32 {
        self.descriptor.array_layers
    }

    /// Bytes of pixel data expected for one layer of `level`.
    pub fn level_size(&self, level: u32) -> usize {
        let width = (self.descriptor.width >> level).max(1) as usize;
        let height = (self.descriptor.height >> level).max(1) as usize;
        width * height * self.descriptor.format.block_size() as usize
    }

    /// Get the texture label, if set.
    pub fn label(&self) -> Option<&str> {
        self.descriptor.label.as_deref()
    }
}

impl std::fmt::Debug for Texture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Texture")
            .field("id", &self.id)
            .field("size", &(self.descriptor.width, self.descriptor.height))
            .field("format", &self.descriptor.format)
            .field("dimension", &self.descriptor.dimension)
            .field("label", &self.descriptor.label)
            .finish()
    }
}

// Ensure Texture is Send + Sync
static_assertions::assert_impl_all!(Texture: Send, Sync);
