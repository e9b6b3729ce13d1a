//! Native backend abstraction layer.
//!
//! This module provides the single trait the device core is written against,
//! allowing the same state cache, framebuffer cache and disposal logic to
//! drive different native graphics APIs.
//!
//! # Backend models
//!
//! Two programming models are supported through one interface:
//!
//! - [`BackendKind::GlobalState`]: OpenGL-style APIs where every call mutates
//!   ambient bind points of the current context. Framebuffers are real native
//!   objects and handle liveness can be queried (`glIsProgram` and friends).
//! - [`BackendKind::ContextObject`]: Direct3D-style immediate contexts where
//!   state is set on a context object per draw. A "framebuffer" is the
//!   adapter's grouping of render-target views; liveness cannot be queried.
//!
//! The device never branches on the kind. Adapters absorb the difference.
//!
//! # Available Backends
//!
//! - `dummy` (default feature): recording backend for tests and tooling.
//!
//! # Threading
//!
//! Adapters are used only from the render thread. They must be [`Send`] so the
//! device can be moved onto that thread once, but need not be `Sync`.

pub mod error;
pub mod handle;

#[cfg(feature = "dummy")]
pub mod dummy;

pub use error::BackendError;
pub use handle::{ResourceHandle, ResourceKind};

#[cfg(feature = "dummy")]
pub use dummy::{CallKind, CallRecorder, DummyBackend};

use crate::types::{
    BlendState, BufferDescriptor, ClearOptions, Color, DepthFormat, DepthStencilState,
    IndexElementSize, PrimitiveType, QueryKind, RasterizerState, RenderbufferDescriptor,
    SamplerState, ScissorRect, ShaderDescriptor, ShaderStage, TextureDescriptor,
    VertexElementFormat, Viewport,
};

/// Programming model of a native backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BackendKind {
    /// OpenGL-style global bind points.
    #[default]
    GlobalState,
    /// Direct3D-style immediate context object.
    ContextObject,
}

/// Result of a framebuffer completeness check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FramebufferStatus {
    /// Ready to render.
    Complete,
    /// An attachment is not renderable.
    IncompleteAttachment,
    /// No color or depth attachment.
    MissingAttachment,
    /// Attachments disagree on size.
    IncompleteDimensions,
    /// Attachments disagree on sample count.
    IncompleteMultisample,
    /// The combination of formats is not supported by the driver.
    Unsupported,
}

impl std::fmt::Display for FramebufferStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            Self::Complete => "complete",
            Self::IncompleteAttachment => "incomplete attachment",
            Self::MissingAttachment => "missing attachment",
            Self::IncompleteDimensions => "incomplete dimensions",
            Self::IncompleteMultisample => "incomplete multisample",
            Self::Unsupported => "unsupported",
        };
        f.write_str(text)
    }
}

/// Storage attached to a framebuffer color slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColorAttachment {
    /// A level and layer (array slice or cube face) of a texture.
    Texture {
        texture: ResourceHandle,
        level: u32,
        layer: u32,
    },
    /// A multisampled renderbuffer.
    Renderbuffer(ResourceHandle),
}

/// Index buffer binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IndexBinding {
    pub buffer: ResourceHandle,
    pub element_size: IndexElementSize,
}

/// Vertex buffer bound to an input slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexStream {
    pub buffer: ResourceHandle,
    pub stride: u32,
    /// Byte offset of the first vertex.
    pub offset: u64,
    /// Zero for per-vertex data, otherwise instances per element.
    pub instance_frequency: u32,
}

/// One shader input location sourced from a vertex buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AttributePointer {
    pub location: u32,
    pub buffer: ResourceHandle,
    pub format: VertexElementFormat,
    pub stride: u32,
    /// Absolute byte offset of this attribute for the first vertex drawn.
    pub offset: u64,
    pub instance_frequency: u32,
}

/// Native API surface consumed by the device core.
///
/// Every method is a thin wrapper around one category of native call. Adapters
/// must not cache state themselves; redundancy elimination is the device's job.
pub trait BackendAdapter: Send {
    /// Get the backend name.
    fn name(&self) -> &'static str;

    /// Programming model of this backend.
    fn kind(&self) -> BackendKind;

    // ------------------------------------------------------------------
    // Resource creation
    // ------------------------------------------------------------------

    /// Create a buffer resource.
    fn create_buffer(&mut self, descriptor: &BufferDescriptor)
    -> Result<ResourceHandle, BackendError>;

    /// Upload data into a buffer.
    fn write_buffer(
        &mut self,
        buffer: ResourceHandle,
        offset: u64,
        data: &[u8],
    ) -> Result<(), BackendError>;

    /// Create a texture resource.
    fn create_texture(
        &mut self,
        descriptor: &TextureDescriptor,
    ) -> Result<ResourceHandle, BackendError>;

    /// Upload pixels into one level/layer of a texture.
    fn write_texture(
        &mut self,
        texture: ResourceHandle,
        level: u32,
        layer: u32,
        data: &[u8],
    ) -> Result<(), BackendError>;

    /// Create renderbuffer storage.
    fn create_renderbuffer(
        &mut self,
        descriptor: &RenderbufferDescriptor,
    ) -> Result<ResourceHandle, BackendError>;

    /// Create a shader object from precompiled bytecode.
    fn create_shader(
        &mut self,
        descriptor: &ShaderDescriptor,
    ) -> Result<ResourceHandle, BackendError>;

    /// Link a vertex and pixel shader into a program.
    fn create_program(
        &mut self,
        vertex: ResourceHandle,
        pixel: ResourceHandle,
    ) -> Result<ResourceHandle, BackendError>;

    /// Create a query object.
    fn create_query(&mut self, kind: QueryKind) -> Result<ResourceHandle, BackendError>;

    /// Create an empty framebuffer.
    fn create_framebuffer(&mut self) -> Result<ResourceHandle, BackendError>;

    // ------------------------------------------------------------------
    // Destruction
    // ------------------------------------------------------------------

    /// Destroy any native object.
    fn destroy(&mut self, handle: ResourceHandle) -> Result<(), BackendError>;

    /// Whether `handle` still names a live object.
    ///
    /// Returns `None` when the backend has no way to ask.
    fn is_live(&self, handle: ResourceHandle) -> Option<bool>;

    // ------------------------------------------------------------------
    // Framebuffers
    // ------------------------------------------------------------------

    /// Attach color storage at `index`.
    fn attach_color(
        &mut self,
        framebuffer: ResourceHandle,
        index: u32,
        attachment: ColorAttachment,
    ) -> Result<(), BackendError>;

    /// Attach a depth/stencil renderbuffer.
    fn attach_depth_stencil(
        &mut self,
        framebuffer: ResourceHandle,
        renderbuffer: ResourceHandle,
        format: DepthFormat,
    ) -> Result<(), BackendError>;

    /// Check framebuffer completeness.
    fn framebuffer_status(&mut self, framebuffer: ResourceHandle) -> FramebufferStatus;

    /// Bind a framebuffer, or the back buffer when `None`.
    fn bind_framebuffer(&mut self, framebuffer: Option<ResourceHandle>)
    -> Result<(), BackendError>;

    /// Copy one color attachment between framebuffers, resolving samples.
    ///
    /// The scissor test must be disabled by the caller. The framebuffer
    /// binding is unspecified afterwards.
    fn blit_framebuffer(
        &mut self,
        source: ResourceHandle,
        destination: ResourceHandle,
        attachment: u32,
        width: u32,
        height: u32,
    ) -> Result<(), BackendError>;

    /// Regenerate the mip chain of a texture from level 0.
    ///
    /// Texture slot bindings are left as they were.
    fn generate_mipmaps(&mut self, texture: ResourceHandle) -> Result<(), BackendError>;

    // ------------------------------------------------------------------
    // Fixed-function state
    // ------------------------------------------------------------------

    fn set_viewport(&mut self, viewport: &Viewport) -> Result<(), BackendError>;

    fn set_rasterizer_state(&mut self, state: &RasterizerState) -> Result<(), BackendError>;

    /// Toggle only the scissor test, leaving the rest of the rasterizer state.
    fn set_scissor_test_enabled(&mut self, enabled: bool) -> Result<(), BackendError>;

    fn set_scissor_rect(&mut self, rect: &ScissorRect) -> Result<(), BackendError>;

    fn set_blend_state(&mut self, state: &BlendState) -> Result<(), BackendError>;

    fn set_blend_factor(&mut self, factor: Color) -> Result<(), BackendError>;

    fn set_depth_stencil_state(&mut self, state: &DepthStencilState) -> Result<(), BackendError>;

    fn set_clear_color(&mut self, color: Color) -> Result<(), BackendError>;

    fn set_clear_depth(&mut self, depth: f32) -> Result<(), BackendError>;

    fn set_clear_stencil(&mut self, stencil: i32) -> Result<(), BackendError>;

    /// Clear the bound framebuffer using the current clear values.
    ///
    /// Adapters clear regardless of the current color/depth/stencil write masks.
    fn clear(&mut self, options: ClearOptions) -> Result<(), BackendError>;

    // ------------------------------------------------------------------
    // Bindings
    // ------------------------------------------------------------------

    fn bind_index_buffer(&mut self, binding: Option<IndexBinding>) -> Result<(), BackendError>;

    /// Bind vertex buffers to input slots starting at slot 0.
    fn bind_vertex_buffers(&mut self, streams: &[Option<VertexStream>])
    -> Result<(), BackendError>;

    /// Point shader input locations at the vertex buffer in `slot`.
    fn set_vertex_attributes(
        &mut self,
        slot: u32,
        pointers: &[AttributePointer],
    ) -> Result<(), BackendError>;

    fn set_vertex_attribute_enabled(
        &mut self,
        location: u32,
        enabled: bool,
    ) -> Result<(), BackendError>;

    fn use_program(&mut self, program: Option<ResourceHandle>) -> Result<(), BackendError>;

    fn bind_texture(
        &mut self,
        stage: ShaderStage,
        slot: u32,
        texture: Option<ResourceHandle>,
    ) -> Result<(), BackendError>;

    fn bind_sampler(
        &mut self,
        stage: ShaderStage,
        slot: u32,
        state: &SamplerState,
    ) -> Result<(), BackendError>;

    // ------------------------------------------------------------------
    // Draws
    // ------------------------------------------------------------------

    fn draw_arrays(
        &mut self,
        primitive: PrimitiveType,
        first_vertex: u32,
        vertex_count: u32,
    ) -> Result<(), BackendError>;

    fn draw_indexed(
        &mut self,
        primitive: PrimitiveType,
        first_index: u32,
        index_count: u32,
    ) -> Result<(), BackendError>;

    fn draw_indexed_instanced(
        &mut self,
        primitive: PrimitiveType,
        first_index: u32,
        index_count: u32,
        instance_count: u32,
        base_instance: u32,
    ) -> Result<(), BackendError>;

    // ------------------------------------------------------------------
    // Queries and presentation
    // ------------------------------------------------------------------

    fn begin_query(&mut self, query: ResourceHandle) -> Result<(), BackendError>;

    fn end_query(&mut self, query: ResourceHandle) -> Result<(), BackendError>;

    /// Result of a finished query, or `None` while it is still pending.
    fn query_result(&mut self, query: ResourceHandle) -> Result<Option<u64>, BackendError>;

    /// Present the back buffer.
    fn present(&mut self) -> Result<(), BackendError>;

    /// Pop the oldest error recorded by the native API, if any.
    fn take_error(&mut self) -> Option<BackendError>;
}
