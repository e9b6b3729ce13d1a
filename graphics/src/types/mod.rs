//! Common types and descriptors for graphics resources and pipeline state.
//!
//! This module contains format enums, usage flags, descriptor structs and the
//! fixed-function state objects used throughout the graphics system.

mod buffer;
mod common;
mod shader;
mod state;
mod texture;
mod vertex;

pub use buffer::{BufferDescriptor, BufferUsage, IndexElementSize};
pub use common::{ClearOptions, Color, ScissorRect, Viewport};
pub use shader::{QueryKind, ShaderAttribute, ShaderDescriptor, ShaderStage};
pub use state::{
    Blend, BlendFunction, BlendState, ColorWriteChannels, CompareFunction, CullMode,
    DepthStencilState, FillMode, RasterizerState, SamplerState, StencilOperation,
    TextureAddressMode, TextureFilter,
};
pub use texture::{
    DepthFormat, RenderTargetDescriptor, RenderTargetUsage, RenderbufferDescriptor,
    RenderbufferFormat, TextureDescriptor, TextureDimension, TextureFormat,
};
pub use vertex::{
    PrimitiveType, VertexDeclaration, VertexElement, VertexElementFormat, VertexElementUsage,
};
