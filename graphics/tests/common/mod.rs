//! Common utilities for device integration tests.
//!
//! Every test runs against the recording dummy backend, once per backend
//! programming model, and inspects the native calls through its recorder.

use std::sync::Arc;

use duet_graphics::{
    BackendKind, BufferUsage, CallRecorder, Capabilities, DeviceDescriptor, DummyBackend,
    GraphicsDevice, IndexBuffer, IndexElementSize, PresentationParameters, RenderTarget,
    RenderTargetDescriptor, RenderTargetUsage, Shader, ShaderAttribute, ShaderDescriptor,
    TextureFormat, VertexBuffer, VertexBufferBinding, VertexDeclaration, VertexElement,
    VertexElementUsage,
};

/// Back buffer size used by every test device.
pub const BACK_BUFFER_WIDTH: u32 = 800;
pub const BACK_BUFFER_HEIGHT: u32 = 600;

/// Interleaved position + packed color vertex.
#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ColorVertex {
    pub position: [f32; 3],
    pub color: [u8; 4],
}

pub const QUAD_VERTICES: [ColorVertex; 4] = [
    ColorVertex { position: [-1.0, -1.0, 0.0], color: [255, 0, 0, 255] },
    ColorVertex { position: [1.0, -1.0, 0.0], color: [0, 255, 0, 255] },
    ColorVertex { position: [1.0, 1.0, 0.0], color: [0, 0, 255, 255] },
    ColorVertex { position: [-1.0, 1.0, 0.0], color: [255, 255, 255, 255] },
];

pub const QUAD_INDICES: [u16; 6] = [0, 1, 2, 0, 2, 3];

/// Capabilities matching what the dummy backend of `kind` can do.
pub fn capabilities_for(kind: BackendKind) -> Capabilities {
    Capabilities {
        supports_handle_queries: kind == BackendKind::GlobalState,
        ..Capabilities::desktop()
    }
}

/// Position + color declaration shared by the quad helpers.
pub fn color_vertex_declaration() -> Arc<VertexDeclaration> {
    Arc::new(VertexDeclaration::from_elements(vec![
        VertexElement::position(0),
        VertexElement::color(12),
    ]))
}

// ============================================================================
// Test Context
// ============================================================================

/// A device over a dummy backend plus the recorder observing it.
pub struct TestContext {
    pub device: GraphicsDevice,
    pub recorder: CallRecorder,
}

impl TestContext {
    /// Create a device for the given backend model with desktop capabilities.
    pub fn new(kind: BackendKind) -> Self {
        Self::with_capabilities(kind, capabilities_for(kind))
    }

    pub fn with_capabilities(kind: BackendKind, capabilities: Capabilities) -> Self {
        Self::with_descriptor(
            kind,
            DeviceDescriptor::new(PresentationParameters::new(
                BACK_BUFFER_WIDTH,
                BACK_BUFFER_HEIGHT,
            ))
            .with_capabilities(capabilities),
        )
    }

    pub fn with_descriptor(kind: BackendKind, descriptor: DeviceDescriptor) -> Self {
        let _ = env_logger::builder().is_test(true).try_init();
        let backend = DummyBackend::with_kind(kind);
        let recorder = backend.recorder();
        let device = GraphicsDevice::new(Box::new(backend), descriptor);
        Self { device, recorder }
    }

    /// Vertex shader reading position at location 0 and color at location 1,
    /// plus a pixel shader sampling slot 0.
    pub fn create_shader_pair(&mut self) -> (Arc<Shader>, Arc<Shader>) {
        let vertex = self
            .device
            .create_shader(
                &ShaderDescriptor::vertex(b"vs_main".to_vec())
                    .with_label("test_vs")
                    .with_attribute(ShaderAttribute::new(VertexElementUsage::Position, 0, 0))
                    .with_attribute(ShaderAttribute::new(VertexElementUsage::Color, 0, 1)),
            )
            .expect("Failed to create vertex shader");
        let pixel = self
            .device
            .create_shader(
                &ShaderDescriptor::pixel(b"ps_main".to_vec())
                    .with_label("test_ps")
                    .with_sampler(0),
            )
            .expect("Failed to create pixel shader");
        (vertex, pixel)
    }

    /// Four-vertex quad buffer filled with [`QUAD_VERTICES`].
    pub fn create_quad_buffer(&mut self) -> Arc<VertexBuffer> {
        let buffer = self
            .device
            .create_vertex_buffer(color_vertex_declaration(), 4, BufferUsage::WRITE_ONLY)
            .expect("Failed to create vertex buffer");
        self.device
            .set_vertex_data(&buffer, 0, &QUAD_VERTICES)
            .expect("Failed to upload vertices");
        buffer
    }

    /// Six-index buffer filled with [`QUAD_INDICES`].
    pub fn create_quad_indices(&mut self) -> Arc<IndexBuffer> {
        let buffer = self
            .device
            .create_index_buffer(IndexElementSize::SixteenBits, 6, BufferUsage::WRITE_ONLY)
            .expect("Failed to create index buffer");
        self.device
            .set_index_data(&buffer, 0, &QUAD_INDICES)
            .expect("Failed to upload indices");
        buffer
    }

    /// Bind shaders, vertex and index buffers for drawing the quad.
    pub fn bind_quad(&mut self) -> QuadResources {
        let (vertex_shader, pixel_shader) = self.create_shader_pair();
        let vertices = self.create_quad_buffer();
        let indices = self.create_quad_indices();
        self.device
            .set_vertex_shader(Some(Arc::clone(&vertex_shader)))
            .expect("Failed to bind vertex shader");
        self.device
            .set_pixel_shader(Some(Arc::clone(&pixel_shader)))
            .expect("Failed to bind pixel shader");
        self.device
            .set_vertex_buffers(&[VertexBufferBinding::new(Arc::clone(&vertices))])
            .expect("Failed to bind vertex buffer");
        self.device.set_index_buffer(Some(Arc::clone(&indices)));
        QuadResources {
            vertex_shader,
            pixel_shader,
            vertices,
            indices,
        }
    }

    /// Single-sampled render target whose contents survive rebinding.
    pub fn create_target(&mut self, width: u32, height: u32) -> Arc<RenderTarget> {
        self.device
            .create_render_target(
                &RenderTargetDescriptor::new_2d(width, height, TextureFormat::Rgba8Unorm)
                    .with_usage(RenderTargetUsage::PreserveContents),
            )
            .expect("Failed to create render target")
    }
}

/// Resources bound by [`TestContext::bind_quad`].
#[allow(dead_code)]
pub struct QuadResources {
    pub vertex_shader: Arc<Shader>,
    pub pixel_shader: Arc<Shader>,
    pub vertices: Arc<VertexBuffer>,
    pub indices: Arc<IndexBuffer>,
}
