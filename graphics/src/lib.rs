//! # Duet Graphics
//!
//! Graphics device core that sits between a rendering client and a native
//! graphics API.
//!
//! ## Overview
//!
//! This crate provides:
//! - [`GraphicsDevice`] - facade owning every cache in front of the backend
//! - [`StateCache`] - dirty-flag pipeline state, applied with the fewest native calls
//! - [`FramebufferCache`] - render target sets to native framebuffers, with MSAA resolve
//! - [`DisposalQueue`] - double-buffered, thread-safe deferred destruction
//! - [`AttributeBinder`] - vertex declaration to shader input binding
//! - [`BackendAdapter`] - trait implemented per native API, plus a recording
//!   [`DummyBackend`] for tests
//!
//! ## Example
//!
//! ```ignore
//! use duet_graphics::{DeviceDescriptor, DummyBackend, GraphicsDevice, PresentationParameters};
//!
//! let mut device = GraphicsDevice::new(
//!     Box::new(DummyBackend::new()),
//!     DeviceDescriptor::new(PresentationParameters::new(1280, 720)),
//! );
//! device.clear(ClearOptions::all(), Color::CORNFLOWER_BLUE, 1.0, 0)?;
//! device.present()?;
//! ```

pub mod backend;
pub mod capabilities;
pub mod config;
pub mod device;
pub mod error;
pub mod resources;
pub mod types;

// Re-export main types for convenience
#[cfg(feature = "dummy")]
pub use backend::{CallKind, CallRecorder, DummyBackend};
pub use backend::{
    BackendAdapter, BackendError, BackendKind, ColorAttachment, FramebufferStatus,
    ResourceHandle, ResourceKind,
};
pub use capabilities::Capabilities;
pub use config::{
    DeviceConfig, DeviceDescriptor, IncompleteFramebufferPolicy, PresentationParameters,
};
pub use device::{
    AttributeBinder, ContextDisposalQueue, DeviceHandle, DisposalQueue, FramebufferCache,
    GraphicsDevice, GraphicsMetrics, ProgramCache, RenderTargetBinding, RenderTargetSet,
    StateCache, StateCategories, VertexBufferBinding,
};
pub use error::GraphicsError;
pub use resources::{
    IndexBuffer, Query, RenderTarget, ResourceId, Shader, Texture, TextureRef, VertexBuffer,
};
pub use types::{
    BlendState, BufferUsage, ClearOptions, Color, DepthFormat, DepthStencilState,
    IndexElementSize, PrimitiveType, QueryKind, RasterizerState, RenderTargetDescriptor,
    RenderTargetUsage, SamplerState, ScissorRect, ShaderAttribute, ShaderDescriptor, ShaderStage,
    TextureDescriptor, TextureFormat, VertexDeclaration, VertexElement, VertexElementFormat,
    VertexElementUsage, Viewport,
};

/// Graphics library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[cfg(feature = "dummy")]
    #[test]
    fn test_dummy_backend() {
        let backend = DummyBackend::new();
        assert_eq!(backend.name(), "Dummy Backend");
    }
}
