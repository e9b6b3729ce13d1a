//! Render target resource.

use std::sync::Arc;

use crate::backend::ResourceHandle;
use crate::device::DisposalQueue;
use crate::types::{
    DepthFormat, RenderTargetDescriptor, RenderTargetUsage, TextureDimension, TextureFormat,
};

use super::{DisposalGuard, ResourceId};

/// A texture that can be bound as a color attachment.
///
/// A render target owns up to three native objects:
/// - the sampleable texture, always present;
/// - a multisampled color renderbuffer when the (clamped) sample count is above one;
/// - a depth/stencil renderbuffer when a depth format was requested.
///
/// When multisampled, rendering goes into the renderbuffer and is resolved into
/// the texture when the target is unbound.
pub struct RenderTarget {
    id: ResourceId,
    descriptor: RenderTargetDescriptor,
    texture: ResourceHandle,
    msaa_color: Option<ResourceHandle>,
    depth_stencil: Option<ResourceHandle>,
    _guard: DisposalGuard,
}

impl RenderTarget {
    /// Create a new render target (called by GraphicsDevice).
    ///
    /// `descriptor.sample_count` must already be clamped to the device capabilities.
    pub(crate) fn new(
        descriptor: RenderTargetDescriptor,
        texture: ResourceHandle,
        msaa_color: Option<ResourceHandle>,
        depth_stencil: Option<ResourceHandle>,
        queue: Arc<DisposalQueue>,
    ) -> Self {
        let id = ResourceId::next();
        let handles = std::iter::once(texture)
            .chain(msaa_color)
            .chain(depth_stencil)
            .collect();
        Self {
            id,
            descriptor,
            texture,
            msaa_color,
            depth_stencil,
            _guard: DisposalGuard::new(id, handles, queue),
        }
    }

    /// Unique identity of this render target.
    pub fn id(&self) -> ResourceId {
        self.id
    }

    /// Get the render target descriptor, with the effective sample count.
    pub fn descriptor(&self) -> &RenderTargetDescriptor {
        &self.descriptor
    }

    /// Native sampleable texture.
    pub fn texture_handle(&self) -> ResourceHandle {
        self.texture
    }

    /// Native multisampled color storage, if multisampled.
    pub fn msaa_handle(&self) -> Option<ResourceHandle> {
        self.msaa_color
    }

    /// Native depth/stencil storage, if any.
    pub fn depth_stencil_handle(&self) -> Option<ResourceHandle> {
        self.depth_stencil
    }

    pub fn width(&self) -> u32 {
        self.descriptor.width
    }

    pub fn height(&self) -> u32 {
        self.descriptor.height
    }

    pub fn format(&self) -> TextureFormat {
        self.descriptor.format
    }

    pub fn depth_format(&self) -> DepthFormat {
        self.descriptor.depth_format
    }

    /// Effective sample count after clamping.
    pub fn sample_count(&self) -> u32 {
        self.descriptor.sample_count
    }

    /// Whether rendering goes through a multisampled renderbuffer.
    pub fn is_multisampled(&self) -> bool {
        self.msaa_color.is_some()
    }

    pub fn usage(&self) -> RenderTargetUsage {
        self.descriptor.usage
    }

    pub fn dimension(&self) -> TextureDimension {
        self.descriptor.dimension
    }

    /// Number of bindable slices: cube faces or array layers.
    pub fn array_layers(&self) -> u32 {
        self.descriptor.array_layers
    }

    pub fn mip_level_count(&self) -> u32 {
        self.descriptor.mip_level_count
    }

    /// Get the render target label, if set.
    pub fn label(&self) -> Option<&str> {
        self.descriptor.label.as_deref()
    }
}

impl std::fmt::Debug for RenderTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderTarget")
            .field("id", &self.id)
            .field("size", &(self.descriptor.width, self.descriptor.height))
            .field("format", &self.descriptor.format)
            .field("samples", &self.descriptor.sample_count)
            .field("label", &self.descriptor.label)
            .finish()
    }
}

static_assertions::assert_impl_all!(RenderTarget: Send, Sync);
