//! Graphics device.
//!
//! The [`GraphicsDevice`] is the single entry point for rendering. It owns the
//! backend adapter and every cache that sits in front of it:
//!
//! ```text
//!                      ┌──────────────────────────────┐
//!   client calls ────> │        GraphicsDevice        │
//!                      │  ┌────────────┐ ┌──────────┐ │
//!                      │  │ StateCache │ │ Program  │ │
//!                      │  └────────────┘ │  Cache   │ │
//!                      │  ┌────────────┐ └──────────┘ │
//!                      │  │Framebuffer │ ┌──────────┐ │
//!                      │  │   Cache    │ │Attribute │ │
//!                      │  └────────────┘ │  Binder  │ │
//!                      │                 └──────────┘ │
//!                      └──────────────┬───────────────┘
//!                                     │ native calls
//!                                     v
//!                            dyn BackendAdapter
//! ```
//!
//! Everything above runs on the render thread that created the device. Other
//! threads reach it through a [`DeviceHandle`]; resources dropped anywhere go
//! through the shared [`DisposalQueue`].

mod attribute_binder;
mod disposal;
mod framebuffer_cache;
mod marshal;
mod metrics;
mod program_cache;
mod state_cache;

pub use attribute_binder::{
    AttributeBinder, AttributeLayout, AttributeStats, LayoutEntry, VertexBufferBinding,
};
pub use disposal::{ContextDisposalQueue, DisposalEntry, DisposalQueue, DrainReport};
pub use framebuffer_cache::{
    FramebufferCache, RenderTargetBinding, RenderTargetSet, ResolveStats, TargetSlice,
    validate_bindings,
};
pub use marshal::DeviceHandle;
pub use metrics::GraphicsMetrics;
pub use program_cache::ProgramCache;
pub use state_cache::{ApplyStats, StateCache, StateCategories};

use std::sync::Arc;
use std::sync::mpsc;
use std::thread::ThreadId;

use crate::backend::{BackendAdapter, BackendKind, IndexBinding, ResourceHandle, VertexStream};
use crate::capabilities::{Capabilities, MAX_VERTEX_BUFFERS};
use crate::config::{DeviceConfig, DeviceDescriptor, PresentationParameters};
use crate::error::GraphicsError;
use crate::resources::{
    IndexBuffer, Query, RenderTarget, ResourceId, Shader, Texture, TextureRef, VertexBuffer,
};
use crate::types::{
    BlendState, BufferUsage, ClearOptions, Color, DepthFormat, DepthStencilState,
    IndexElementSize, PrimitiveType, QueryKind, RasterizerState, RenderTargetDescriptor,
    RenderTargetUsage, RenderbufferDescriptor, RenderbufferFormat, SamplerState, ScissorRect,
    ShaderDescriptor, ShaderStage, TextureDescriptor, VertexDeclaration, Viewport,
};

use disposal::destroy_quietly;
use marshal::RenderThreadWork;

/// The rendering device.
///
/// Created on the render thread with a backend adapter; every method must be
/// called on that thread. Use [`GraphicsDevice::handle`] to create resources
/// from other threads.
///
/// # Example
///
/// ```ignore
/// let mut device = GraphicsDevice::new(
///     Box::new(DummyBackend::new()),
///     DeviceDescriptor::new(PresentationParameters::new(1280, 720)),
/// );
///
/// let target = device.create_render_target(&RenderTargetDescriptor::new_2d(
///     512, 512,
///     TextureFormat::Rgba8Unorm,
/// ))?;
/// device.set_render_targets(&[RenderTargetBinding::new(target)])?;
/// device.clear(ClearOptions::all(), Color::CORNFLOWER_BLUE, 1.0, 0)?;
/// device.set_render_targets(&[])?;
/// device.present()?;
/// ```
pub struct GraphicsDevice {
    backend: Box<dyn BackendAdapter>,
    capabilities: Capabilities,
    config: DeviceConfig,
    presentation: PresentationParameters,

    state: StateCache,
    framebuffers: FramebufferCache,
    programs: ProgramCache,
    binder: AttributeBinder,

    disposal: Arc<DisposalQueue>,
    contexts: Arc<ContextDisposalQueue>,

    render_targets: Vec<RenderTargetBinding>,
    vertex_buffers: Vec<Option<VertexBufferBinding>>,
    index_buffer: Option<Arc<IndexBuffer>>,
    vertex_shader: Option<Arc<Shader>>,
    pixel_shader: Option<Arc<Shader>>,

    metrics: GraphicsMetrics,
    last_frame_metrics: GraphicsMetrics,
    frame_index: u64,

    work_sender: mpsc::Sender<RenderThreadWork>,
    work_receiver: mpsc::Receiver<RenderThreadWork>,
    render_thread: ThreadId,
    disposed: bool,
}

impl GraphicsDevice {
    /// Create a device on the calling thread, which becomes the render thread.
    pub fn new(backend: Box<dyn BackendAdapter>, descriptor: DeviceDescriptor) -> Self {
        let DeviceDescriptor {
            capabilities,
            presentation,
            config,
        } = descriptor;
        log::info!(
            "GraphicsDevice: creating on {} backend ({:?}), back buffer {}x{}",
            backend.name(),
            backend.kind(),
            presentation.back_buffer_width,
            presentation.back_buffer_height
        );

        let mut state = StateCache::new(capabilities.texture_slot_limit());
        let width = presentation.back_buffer_width;
        let height = presentation.back_buffer_height;
        state.set_viewport(Viewport::from_dimensions(width, height));
        state.set_scissor_rect(ScissorRect::from_dimensions(width, height));

        let (work_sender, work_receiver) = mpsc::channel();
        Self {
            backend,
            capabilities,
            framebuffers: FramebufferCache::new(config.incomplete_framebuffer_policy),
            config,
            presentation,
            state,
            programs: ProgramCache::new(),
            binder: AttributeBinder::new(capabilities.max_vertex_attributes),
            disposal: Arc::new(DisposalQueue::new()),
            contexts: Arc::new(ContextDisposalQueue::new()),
            render_targets: Vec::new(),
            vertex_buffers: Vec::new(),
            index_buffer: None,
            vertex_shader: None,
            pixel_shader: None,
            metrics: GraphicsMetrics::ZERO,
            last_frame_metrics: GraphicsMetrics::ZERO,
            frame_index: 0,
            work_sender,
            work_receiver,
            render_thread: std::thread::current().id(),
            disposed: false,
        }
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    /// Name of the backend adapter.
    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Object model of the backend adapter.
    pub fn backend_kind(&self) -> BackendKind {
        self.backend.kind()
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    pub fn presentation(&self) -> &PresentationParameters {
        &self.presentation
    }

    /// Pipeline state cache.
    pub fn state(&self) -> &StateCache {
        &self.state
    }

    pub fn framebuffer_cache(&self) -> &FramebufferCache {
        &self.framebuffers
    }

    pub fn program_cache(&self) -> &ProgramCache {
        &self.programs
    }

    pub fn attribute_binder(&self) -> &AttributeBinder {
        &self.binder
    }

    /// Shared queue that dropped resources enqueue their handles on.
    pub fn disposal_queue(&self) -> &Arc<DisposalQueue> {
        &self.disposal
    }

    /// Counters of the frame in progress.
    pub fn metrics(&self) -> &GraphicsMetrics {
        &self.metrics
    }

    /// Counters of the last presented frame.
    pub fn last_frame_metrics(&self) -> &GraphicsMetrics {
        &self.last_frame_metrics
    }

    /// Number of frames presented so far.
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    /// Handle for using this device from other threads.
    pub fn handle(&self) -> DeviceHandle {
        DeviceHandle::new(
            self.work_sender.clone(),
            self.render_thread,
            Arc::clone(&self.disposal),
            Arc::clone(&self.contexts),
        )
    }

    fn query_liveness(&self) -> bool {
        self.capabilities.supports_handle_queries
    }

    // ------------------------------------------------------------------
    // Resource creation
    // ------------------------------------------------------------------

    /// Create a texture.
    ///
    /// # Errors
    ///
    /// Returns an error if the dimensions are zero or exceed device limits, or
    /// if the backend fails to create it.
    pub fn create_texture(
        &mut self,
        descriptor: &TextureDescriptor,
    ) -> Result<Arc<Texture>, GraphicsError> {
        self.validate_texture_size(descriptor.width, descriptor.height)?;
        if descriptor.mip_level_count == 0 || descriptor.array_layers == 0 {
            return Err(GraphicsError::InvalidParameter(
                "texture needs at least one mip level and one array layer".to_string(),
            ));
        }

        let handle = self.backend.create_texture(descriptor)?;
        log::trace!(
            "GraphicsDevice: created texture {:?}, size={}x{}",
            descriptor.label,
            descriptor.width,
            descriptor.height
        );
        Ok(Arc::new(Texture::new(
            handle,
            descriptor.clone(),
            Arc::clone(&self.disposal),
        )))
    }

    /// Create a render target.
    ///
    /// The sample count is clamped to what the device supports. Any native
    /// object created before a failure is destroyed again.
    pub fn create_render_target(
        &mut self,
        descriptor: &RenderTargetDescriptor,
    ) -> Result<Arc<RenderTarget>, GraphicsError> {
        self.validate_texture_size(descriptor.width, descriptor.height)?;
        if descriptor.mip_level_count == 0 || descriptor.array_layers == 0 {
            return Err(GraphicsError::InvalidParameter(
                "render target needs at least one mip level and one array layer".to_string(),
            ));
        }

        let mut descriptor = descriptor.clone();
        let requested = descriptor.sample_count;
        descriptor.sample_count = self.capabilities.clamp_sample_count(requested);
        if descriptor.sample_count != requested {
            log::debug!(
                "GraphicsDevice: clamped render target sample count {requested} -> {}",
                descriptor.sample_count
            );
        }

        let mut created = Vec::with_capacity(3);
        match Self::create_render_target_storage(self.backend.as_mut(), &descriptor, &mut created)
        {
            Ok((texture, msaa_color, depth_stencil)) => {
                log::trace!(
                    "GraphicsDevice: created render target {:?}, size={}x{}, samples={}",
                    descriptor.label,
                    descriptor.width,
                    descriptor.height,
                    descriptor.sample_count
                );
                Ok(Arc::new(RenderTarget::new(
                    descriptor,
                    texture,
                    msaa_color,
                    depth_stencil,
                    Arc::clone(&self.disposal),
                )))
            }
            Err(err) => {
                for handle in created {
                    destroy_quietly(self.backend.as_mut(), handle, false);
                }
                Err(err.into())
            }
        }
    }

    #[allow(clippy::type_complexity)]
    fn create_render_target_storage(
        backend: &mut dyn BackendAdapter,
        descriptor: &RenderTargetDescriptor,
        created: &mut Vec<ResourceHandle>,
    ) -> Result<
        (ResourceHandle, Option<ResourceHandle>, Option<ResourceHandle>),
        crate::backend::BackendError,
    > {
        let texture = backend.create_texture(&descriptor.texture_descriptor())?;
        created.push(texture);

        let msaa_color = if descriptor.sample_count > 1 {
            let renderbuffer = backend.create_renderbuffer(&RenderbufferDescriptor {
                width: descriptor.width,
                height: descriptor.height,
                format: RenderbufferFormat::Color(descriptor.format),
                sample_count: descriptor.sample_count,
            })?;
            created.push(renderbuffer);
            Some(renderbuffer)
        } else {
            None
        };

        let depth_stencil = if descriptor.depth_format != DepthFormat::None {
            let renderbuffer = backend.create_renderbuffer(&RenderbufferDescriptor {
                width: descriptor.width,
                height: descriptor.height,
                format: RenderbufferFormat::DepthStencil(descriptor.depth_format),
                sample_count: descriptor.sample_count,
            })?;
            created.push(renderbuffer);
            Some(renderbuffer)
        } else {
            None
        };

        Ok((texture, msaa_color, depth_stencil))
    }

    fn validate_texture_size(&self, width: u32, height: u32) -> Result<(), GraphicsError> {
        if width == 0 || height == 0 {
            return Err(GraphicsError::InvalidParameter(
                "texture dimensions cannot be zero".to_string(),
            ));
        }
        let max = self.capabilities.max_texture_size;
        if width > max || height > max {
            return Err(GraphicsError::InvalidParameter(format!(
                "texture size {width}x{height} exceeds maximum {max}"
            )));
        }
        Ok(())
    }

    /// Create a vertex buffer holding `vertex_count` vertices of `declaration`.
    pub fn create_vertex_buffer(
        &mut self,
        declaration: Arc<VertexDeclaration>,
        vertex_count: u32,
        usage: BufferUsage,
    ) -> Result<Arc<VertexBuffer>, GraphicsError> {
        if vertex_count == 0 || declaration.stride() == 0 {
            return Err(GraphicsError::InvalidParameter(
                "vertex buffer size cannot be zero".to_string(),
            ));
        }
        let descriptor = VertexBuffer::descriptor(&declaration, vertex_count, usage);
        let handle = self.backend.create_buffer(&descriptor)?;
        log::trace!(
            "GraphicsDevice: created vertex buffer, {vertex_count} vertices of {} bytes",
            declaration.stride()
        );
        Ok(Arc::new(VertexBuffer::new(
            handle,
            declaration,
            vertex_count,
            usage,
            Arc::clone(&self.disposal),
        )))
    }

    /// Create an index buffer holding `index_count` indices.
    pub fn create_index_buffer(
        &mut self,
        element_size: IndexElementSize,
        index_count: u32,
        usage: BufferUsage,
    ) -> Result<Arc<IndexBuffer>, GraphicsError> {
        if index_count == 0 {
            return Err(GraphicsError::InvalidParameter(
                "index buffer size cannot be zero".to_string(),
            ));
        }
        let size = u64::from(index_count) * u64::from(element_size.bytes());
        let handle = self
            .backend
            .create_buffer(&crate::types::BufferDescriptor::new(size, usage | BufferUsage::INDEX))?;
        log::trace!("GraphicsDevice: created index buffer, {index_count} x {element_size:?}");
        Ok(Arc::new(IndexBuffer::new(
            handle,
            element_size,
            index_count,
            usage,
            Arc::clone(&self.disposal),
        )))
    }

    /// Create a shader from precompiled bytecode.
    pub fn create_shader(
        &mut self,
        descriptor: &ShaderDescriptor,
    ) -> Result<Arc<Shader>, GraphicsError> {
        if descriptor.bytecode.is_empty() {
            return Err(GraphicsError::InvalidParameter(
                "shader bytecode cannot be empty".to_string(),
            ));
        }
        let handle = self.backend.create_shader(descriptor)?;
        log::trace!(
            "GraphicsDevice: created {} shader {:?}",
            descriptor.stage,
            descriptor.label
        );
        Ok(Arc::new(Shader::new(
            handle,
            descriptor,
            Arc::clone(&self.disposal),
        )))
    }

    pub fn create_query(&mut self, kind: QueryKind) -> Result<Arc<Query>, GraphicsError> {
        let handle = self.backend.create_query(kind)?;
        Ok(Arc::new(Query::new(handle, kind, Arc::clone(&self.disposal))))
    }

    // ------------------------------------------------------------------
    // Data upload
    // ------------------------------------------------------------------

    /// Write vertices starting at `start_vertex`.
    ///
    /// The data's size must be a whole number of vertices and fit the buffer.
    pub fn set_vertex_data<T: bytemuck::Pod>(
        &mut self,
        buffer: &VertexBuffer,
        start_vertex: u32,
        data: &[T],
    ) -> Result<(), GraphicsError> {
        let bytes: &[u8] = bytemuck::cast_slice(data);
        let stride = u64::from(buffer.declaration().stride());
        let len = bytes.len() as u64;
        if len % stride != 0 {
            return Err(GraphicsError::InvalidParameter(format!(
                "vertex data of {len} bytes is not a multiple of the {stride}-byte stride"
            )));
        }
        let offset = u64::from(start_vertex) * stride;
        if offset + len > buffer.size() {
            return Err(GraphicsError::InvalidParameter(format!(
                "vertex data [{offset}, {}) exceeds buffer size {}",
                offset + len,
                buffer.size()
            )));
        }
        self.backend.write_buffer(buffer.handle(), offset, bytes)?;
        Ok(())
    }

    /// Write indices starting at `start_index`. `T` must match the element size.
    pub fn set_index_data<T: bytemuck::Pod>(
        &mut self,
        buffer: &IndexBuffer,
        start_index: u32,
        data: &[T],
    ) -> Result<(), GraphicsError> {
        let element_bytes = buffer.element_size().bytes() as usize;
        if std::mem::size_of::<T>() != element_bytes {
            return Err(GraphicsError::InvalidParameter(format!(
                "index type is {} bytes, buffer holds {element_bytes}-byte indices",
                std::mem::size_of::<T>()
            )));
        }
        let bytes: &[u8] = bytemuck::cast_slice(data);
        let offset = u64::from(start_index) * element_bytes as u64;
        if offset + bytes.len() as u64 > buffer.size() {
            return Err(GraphicsError::InvalidParameter(format!(
                "index data exceeds buffer of {} indices",
                buffer.index_count()
            )));
        }
        self.backend.write_buffer(buffer.handle(), offset, bytes)?;
        Ok(())
    }

    /// Replace the pixels of one level and layer of a texture.
    pub fn set_texture_data<T: bytemuck::Pod>(
        &mut self,
        texture: &Texture,
        level: u32,
        layer: u32,
        data: &[T],
    ) -> Result<(), GraphicsError> {
        if level >= texture.mip_level_count() || layer >= texture.array_layers() {
            return Err(GraphicsError::InvalidParameter(format!(
                "level {level} / layer {layer} out of range for texture {}",
                texture.id()
            )));
        }
        let bytes: &[u8] = bytemuck::cast_slice(data);
        let expected = texture.level_size(level);
        if bytes.len() != expected {
            return Err(GraphicsError::InvalidParameter(format!(
                "texture level {level} expects {expected} bytes, got {}",
                bytes.len()
            )));
        }
        self.backend
            .write_texture(texture.handle(), level, layer, bytes)?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Render targets
    // ------------------------------------------------------------------

    /// Bind a set of render targets, or the back buffer when `bindings` is empty.
    ///
    /// The previously bound set is resolved first. The viewport and scissor
    /// rectangle are reset to the primary target's size, and a primary target
    /// with [`RenderTargetUsage::DiscardContents`] is cleared to
    /// [`Color::DISCARD`].
    pub fn set_render_targets(
        &mut self,
        bindings: &[RenderTargetBinding],
    ) -> Result<(), GraphicsError> {
        validate_bindings(bindings, &self.capabilities)?;
        if bindings == self.render_targets.as_slice() {
            return Ok(());
        }

        self.resolve_current_targets()?;

        let framebuffer = if bindings.is_empty() {
            None
        } else {
            Some(
                self.framebuffers
                    .get_or_create_framebuffer(self.backend.as_mut(), bindings)?,
            )
        };
        self.state.set_framebuffer(framebuffer);

        let (width, height) = match bindings.first() {
            Some(primary) => (primary.target().width(), primary.target().height()),
            None => (
                self.presentation.back_buffer_width,
                self.presentation.back_buffer_height,
            ),
        };
        self.state.set_viewport(Viewport::from_dimensions(width, height));
        self.state
            .set_scissor_rect(ScissorRect::from_dimensions(width, height));

        self.render_targets = bindings.to_vec();
        self.metrics.target_count += 1;

        if let Some(primary) = bindings.first()
            && primary.target().usage() == RenderTargetUsage::DiscardContents
        {
            let mut options = ClearOptions::TARGET;
            if primary.target().depth_format() != DepthFormat::None {
                options |= ClearOptions::DEPTH_BUFFER;
                if primary.target().depth_format().has_stencil() {
                    options |= ClearOptions::STENCIL;
                }
            }
            self.clear(options, Color::DISCARD, 1.0, 0)?;
        }
        Ok(())
    }

    /// Bind a single render target, or the back buffer.
    pub fn set_render_target(
        &mut self,
        target: Option<&Arc<RenderTarget>>,
    ) -> Result<(), GraphicsError> {
        match target {
            Some(target) => self.set_render_targets(&[RenderTargetBinding::from(target)]),
            None => self.set_render_targets(&[]),
        }
    }

    /// Currently bound render targets; empty when drawing to the back buffer.
    pub fn get_render_targets(&self) -> &[RenderTargetBinding] {
        &self.render_targets
    }

    fn resolve_current_targets(&mut self) -> Result<(), GraphicsError> {
        if self.render_targets.is_empty() {
            return Ok(());
        }
        let stats = self.framebuffers.resolve(
            self.backend.as_mut(),
            &self.render_targets,
            &self.capabilities,
            self.state.applied_scissor_test(),
        )?;
        if stats.blits > 0 {
            self.state.forget_framebuffer();
        }
        Ok(())
    }

    /// Destroy every cached framebuffer referencing `target`.
    ///
    /// Used by the window collaborator when it recreates a target. If the
    /// target is currently bound its framebuffer is rebuilt.
    pub fn invalidate_for_target(&mut self, target: ResourceId) -> Result<(), GraphicsError> {
        let query_liveness = self.query_liveness();
        let removed =
            self.framebuffers
                .invalidate_for_target(self.backend.as_mut(), target, query_liveness);
        for framebuffer in removed {
            self.state.forget_handle(framebuffer);
        }
        if self
            .render_targets
            .iter()
            .any(|binding| binding.target().id() == target)
        {
            let framebuffer = self
                .framebuffers
                .get_or_create_framebuffer(self.backend.as_mut(), &self.render_targets)?;
            self.state.set_framebuffer(Some(framebuffer));
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Pipeline state
    // ------------------------------------------------------------------

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.state.set_viewport(viewport);
    }

    pub fn viewport(&self) -> Viewport {
        self.state.viewport()
    }

    pub fn set_scissor_rect(&mut self, rect: ScissorRect) {
        self.state.set_scissor_rect(rect);
    }

    pub fn scissor_rect(&self) -> ScissorRect {
        self.state.scissor_rect()
    }

    pub fn set_rasterizer_state(&mut self, state: RasterizerState) {
        self.state.set_rasterizer_state(state);
    }

    pub fn set_blend_state(&mut self, state: BlendState) {
        self.state.set_blend_state(state);
    }

    pub fn set_blend_factor(&mut self, factor: Color) {
        self.state.set_blend_factor(factor);
    }

    pub fn set_depth_stencil_state(&mut self, state: DepthStencilState) {
        self.state.set_depth_stencil_state(state);
    }

    /// Bind vertex buffers to consecutive slots starting at 0.
    pub fn set_vertex_buffers(
        &mut self,
        bindings: &[VertexBufferBinding],
    ) -> Result<(), GraphicsError> {
        if bindings.len() > MAX_VERTEX_BUFFERS {
            return Err(GraphicsError::InvalidParameter(format!(
                "{} vertex buffers bound, at most {MAX_VERTEX_BUFFERS} supported",
                bindings.len()
            )));
        }
        self.vertex_buffers = bindings.iter().cloned().map(Some).collect();
        Ok(())
    }

    /// Bind one vertex buffer to slot 0, or unbind all.
    pub fn set_vertex_buffer(&mut self, binding: Option<VertexBufferBinding>) {
        self.vertex_buffers = binding.into_iter().map(Some).collect();
    }

    pub fn set_index_buffer(&mut self, buffer: Option<Arc<IndexBuffer>>) {
        self.state.set_index_buffer(buffer.as_ref().map(|buffer| IndexBinding {
            buffer: buffer.handle(),
            element_size: buffer.element_size(),
        }));
        self.index_buffer = buffer;
    }

    pub fn set_vertex_shader(&mut self, shader: Option<Arc<Shader>>) -> Result<(), GraphicsError> {
        self.set_shader(ShaderStage::Vertex, shader)
    }

    pub fn set_pixel_shader(&mut self, shader: Option<Arc<Shader>>) -> Result<(), GraphicsError> {
        self.set_shader(ShaderStage::Pixel, shader)
    }

    fn set_shader(
        &mut self,
        stage: ShaderStage,
        shader: Option<Arc<Shader>>,
    ) -> Result<(), GraphicsError> {
        if let Some(shader) = &shader
            && shader.stage() != stage
        {
            return Err(GraphicsError::InvalidParameter(format!(
                "{} shader {} bound to the {stage} stage",
                shader.stage(),
                shader.id()
            )));
        }
        let id = shader.as_ref().map(|shader| shader.id());
        if self.state.shader(stage) != id {
            match stage {
                ShaderStage::Vertex => self.metrics.vertex_shader_count += 1,
                ShaderStage::Pixel => self.metrics.pixel_shader_count += 1,
            }
        }
        self.state.set_shader(stage, id);
        match stage {
            ShaderStage::Vertex => self.vertex_shader = shader,
            ShaderStage::Pixel => self.pixel_shader = shader,
        }
        Ok(())
    }

    /// Bind a texture, or a render target's texture, to a stage slot.
    pub fn set_texture(
        &mut self,
        stage: ShaderStage,
        slot: usize,
        texture: Option<TextureRef>,
    ) -> Result<(), GraphicsError> {
        let changed = self.state.texture(stage, slot).map(TextureRef::id)
            != texture.as_ref().map(TextureRef::id);
        self.state.set_texture(stage, slot, texture)?;
        if changed {
            self.metrics.texture_count += 1;
        }
        Ok(())
    }

    pub fn set_sampler_state(
        &mut self,
        stage: ShaderStage,
        slot: usize,
        state: SamplerState,
    ) -> Result<(), GraphicsError> {
        self.state.set_sampler(stage, slot, state)
    }

    // ------------------------------------------------------------------
    // Clears and draws
    // ------------------------------------------------------------------

    /// Clear the bound render targets (or back buffer).
    pub fn clear(
        &mut self,
        options: ClearOptions,
        color: Color,
        depth: f32,
        stencil: i32,
    ) -> Result<(), GraphicsError> {
        if options.is_empty() {
            return Ok(());
        }
        if options.contains(ClearOptions::TARGET) {
            self.state.set_clear_color(color);
        }
        if options.contains(ClearOptions::DEPTH_BUFFER) {
            self.state.set_clear_depth(depth);
        }
        if options.contains(ClearOptions::STENCIL) {
            self.state.set_clear_stencil(stencil);
        }
        self.state
            .apply_dirty_state(self.backend.as_mut(), false, self.config.debug_checks)?;
        self.backend.clear(options)?;
        self.check_backend_error("clear")?;
        self.metrics.clear_count += 1;
        Ok(())
    }

    /// Draw non-indexed primitives from the bound vertex buffers.
    pub fn draw_primitives(
        &mut self,
        primitive: PrimitiveType,
        start_vertex: u32,
        primitive_count: u32,
    ) -> Result<(), GraphicsError> {
        Self::check_primitive_count(primitive_count)?;
        self.prepare_draw(0, 0)?;
        self.backend
            .draw_arrays(primitive, start_vertex, primitive.vertex_count(primitive_count))?;
        self.check_backend_error("draw_arrays")?;
        self.metrics.record_draw(primitive_count, 1);
        Ok(())
    }

    /// Draw indexed primitives; `base_vertex` is added to every index.
    pub fn draw_indexed_primitives(
        &mut self,
        primitive: PrimitiveType,
        base_vertex: u32,
        start_index: u32,
        primitive_count: u32,
    ) -> Result<(), GraphicsError> {
        Self::check_primitive_count(primitive_count)?;
        self.require_index_buffer()?;
        self.prepare_draw(base_vertex, 0)?;
        self.backend
            .draw_indexed(primitive, start_index, primitive.vertex_count(primitive_count))?;
        self.check_backend_error("draw_indexed")?;
        self.metrics.record_draw(primitive_count, 1);
        Ok(())
    }

    /// Draw `instance_count` instances of indexed primitives.
    ///
    /// Per-instance vertex data needs instancing support and a non-zero
    /// `base_instance` needs base-instance support; both are checked before
    /// any native call.
    #[allow(clippy::too_many_arguments)]
    pub fn draw_instanced_primitives(
        &mut self,
        primitive: PrimitiveType,
        base_vertex: u32,
        start_index: u32,
        primitive_count: u32,
        instance_count: u32,
        base_instance: u32,
    ) -> Result<(), GraphicsError> {
        Self::check_primitive_count(primitive_count)?;
        if !self.capabilities.supports_instancing {
            return Err(GraphicsError::UnsupportedFeature(
                "instanced drawing requires instancing support".to_string(),
            ));
        }
        self.require_index_buffer()?;
        self.prepare_draw(base_vertex, base_instance)?;
        self.backend.draw_indexed_instanced(
            primitive,
            start_index,
            primitive.vertex_count(primitive_count),
            instance_count,
            base_instance,
        )?;
        self.check_backend_error("draw_indexed_instanced")?;
        self.metrics.record_draw(primitive_count, instance_count);
        Ok(())
    }

    fn check_primitive_count(primitive_count: u32) -> Result<(), GraphicsError> {
        if primitive_count == 0 {
            return Err(GraphicsError::InvalidParameter(
                "primitive count must be positive".to_string(),
            ));
        }
        Ok(())
    }

    fn require_index_buffer(&self) -> Result<(), GraphicsError> {
        if self.index_buffer.is_none() {
            return Err(GraphicsError::InvalidOperation(
                "indexed draw without an index buffer".to_string(),
            ));
        }
        Ok(())
    }

    /// Link the program, apply dirty state and vertex attributes for a draw.
    fn prepare_draw(&mut self, base_vertex: u32, base_instance: u32) -> Result<(), GraphicsError> {
        self.state.check_shaders()?;
        AttributeBinder::check_instancing(&self.capabilities, &self.vertex_buffers, base_instance)?;
        let vertex_shader = self
            .vertex_shader
            .as_ref()
            .ok_or(GraphicsError::MissingShaderStage(ShaderStage::Vertex))?;
        let pixel_shader = self
            .pixel_shader
            .as_ref()
            .ok_or(GraphicsError::MissingShaderStage(ShaderStage::Pixel))?;

        let program =
            self.programs
                .get_or_link(self.backend.as_mut(), vertex_shader, pixel_shader)?;
        self.state.set_program(Some(program));

        let streams: Vec<Option<VertexStream>> = self
            .vertex_buffers
            .iter()
            .map(|binding| {
                binding.as_ref().map(|binding| {
                    let mut stream = binding.stream();
                    stream.offset += u64::from(base_vertex) * u64::from(stream.stride);
                    stream
                })
            })
            .collect();
        self.state.set_vertex_streams(&streams);

        self.state
            .apply_dirty_state(self.backend.as_mut(), true, self.config.debug_checks)?;
        self.binder.apply_attributes(
            self.backend.as_mut(),
            vertex_shader,
            pixel_shader.id(),
            &self.vertex_buffers,
            base_vertex,
        )?;
        Ok(())
    }

    fn check_backend_error(&mut self, call: &str) -> Result<(), GraphicsError> {
        if !self.config.debug_checks {
            return Ok(());
        }
        match self.backend.take_error() {
            Some(err) => {
                log::warn!("GraphicsDevice: backend error after {call}: {err}");
                Err(err.into())
            }
            None => Ok(()),
        }
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn begin_query(&mut self, query: &Query) -> Result<(), GraphicsError> {
        if query.is_active() {
            return Err(GraphicsError::InvalidOperation(format!(
                "query {} is already active",
                query.id()
            )));
        }
        self.backend.begin_query(query.handle())?;
        query.set_active(true);
        Ok(())
    }

    pub fn end_query(&mut self, query: &Query) -> Result<(), GraphicsError> {
        if !query.is_active() {
            return Err(GraphicsError::InvalidOperation(format!(
                "query {} is not active",
                query.id()
            )));
        }
        self.backend.end_query(query.handle())?;
        query.set_active(false);
        Ok(())
    }

    /// Result of a finished query, or `None` while the GPU has not produced it.
    pub fn query_result(&mut self, query: &Query) -> Result<Option<u64>, GraphicsError> {
        if query.is_active() {
            return Err(GraphicsError::InvalidOperation(format!(
                "query {} is still active",
                query.id()
            )));
        }
        Ok(self.backend.query_result(query.handle())?)
    }

    // ------------------------------------------------------------------
    // Frame lifecycle
    // ------------------------------------------------------------------

    /// Present the back buffer and end the frame.
    ///
    /// Handles queued before the previous present are destroyed, caches that
    /// referenced their resources are invalidated, and marshaled work from
    /// other threads is serviced.
    pub fn present(&mut self) -> Result<(), GraphicsError> {
        if !self.render_targets.is_empty() {
            return Err(GraphicsError::InvalidOperation(
                "cannot present while a render target is bound".to_string(),
            ));
        }
        self.backend.present()?;
        self.frame_index += 1;

        let query_liveness = self.query_liveness();
        let report = self
            .disposal
            .flip_and_drain(self.backend.as_mut(), query_liveness);
        self.forget_retired(&report);

        self.last_frame_metrics = std::mem::take(&mut self.metrics);
        self.process_marshaled_work();
        Ok(())
    }

    /// Drop every cache entry that referenced a retired resource.
    fn forget_retired(&mut self, report: &DrainReport) {
        let query_liveness = self.query_liveness();
        for owner in report.retired_owners() {
            let framebuffers = self.framebuffers.invalidate_for_target(
                self.backend.as_mut(),
                owner,
                query_liveness,
            );
            let programs =
                self.programs
                    .invalidate_for_shader(self.backend.as_mut(), owner, query_liveness);
            for handle in framebuffers.into_iter().chain(programs) {
                self.state.forget_handle(handle);
            }
            self.binder.forget_shader(owner);
        }
        for entry in &report.retired {
            self.state.forget_handle(entry.handle);
            self.binder.forget_buffer(entry.handle);
        }
    }

    /// Run work marshaled from other threads. Returns the number of jobs run.
    pub fn process_marshaled_work(&mut self) -> usize {
        let mut processed = 0;
        while let Ok(work) = self.work_receiver.try_recv() {
            work(self);
            processed += 1;
        }
        if processed > 0 {
            log::trace!("GraphicsDevice: ran {processed} marshaled job(s)");
        }
        processed
    }

    /// Queue a native context handle for destruction on the next presentation change.
    pub fn retire_context(&self, context: ResourceHandle) {
        self.contexts.enqueue(context);
    }

    /// React to the window collaborator changing the presentation parameters.
    ///
    /// Updates the back-buffer size, resets viewport and scissor when the back
    /// buffer is bound, and destroys retired contexts.
    pub fn presentation_changed(&mut self, presentation: PresentationParameters) {
        log::info!(
            "GraphicsDevice: presentation changed to {}x{}",
            presentation.back_buffer_width,
            presentation.back_buffer_height
        );
        self.presentation = presentation;
        if self.render_targets.is_empty() {
            let width = self.presentation.back_buffer_width;
            let height = self.presentation.back_buffer_height;
            self.state.set_viewport(Viewport::from_dimensions(width, height));
            self.state
                .set_scissor_rect(ScissorRect::from_dimensions(width, height));
        }
        let query_liveness = self.query_liveness();
        self.contexts.drain(self.backend.as_mut(), query_liveness);
    }

    /// Forget all backend state after device loss.
    ///
    /// Every state category is re-sent on the next apply, and all cached
    /// framebuffers, programs and attribute layouts are discarded. The bound
    /// render target set gets a fresh framebuffer.
    pub fn reset_device_state(&mut self) -> Result<(), GraphicsError> {
        log::info!("GraphicsDevice: resetting device state");
        let query_liveness = self.query_liveness();
        self.state.invalidate_applied();
        self.framebuffers
            .clear(self.backend.as_mut(), query_liveness);
        self.programs.clear(self.backend.as_mut(), query_liveness);
        self.binder.reset();
        if !self.render_targets.is_empty() {
            let framebuffer = self
                .framebuffers
                .get_or_create_framebuffer(self.backend.as_mut(), &self.render_targets)?;
            self.state.set_framebuffer(Some(framebuffer));
        }
        Ok(())
    }

    /// Destroy everything the device still holds, immediately.
    ///
    /// Bound resources are released, cached objects destroyed, and both
    /// disposal queues flushed without waiting for a frame boundary. Called
    /// automatically on drop.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        self.process_marshaled_work();

        self.render_targets.clear();
        self.vertex_buffers.clear();
        self.index_buffer = None;
        self.vertex_shader = None;
        self.pixel_shader = None;
        self.state = StateCache::new(self.capabilities.texture_slot_limit());

        let query_liveness = self.query_liveness();
        self.framebuffers
            .clear(self.backend.as_mut(), query_liveness);
        self.programs.clear(self.backend.as_mut(), query_liveness);
        let flushed = self
            .disposal
            .flush_all(self.backend.as_mut(), query_liveness);
        let contexts = self
            .contexts
            .drain(self.backend.as_mut(), query_liveness);
        log::info!(
            "GraphicsDevice: disposed, flushed {} handle(s) and {} context(s)",
            flushed.retired.len(),
            contexts.retired.len()
        );
    }
}

impl Drop for GraphicsDevice {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for GraphicsDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphicsDevice")
            .field("backend", &self.backend.name())
            .field("frame_index", &self.frame_index)
            .field("render_targets", &self.render_targets.len())
            .field("framebuffers", &self.framebuffers.len())
            .field("pending_disposals", &self.disposal.pending_count())
            .finish()
    }
}

static_assertions::assert_impl_all!(GraphicsDevice: Send);
static_assertions::assert_impl_all!(DisposalQueue: Send, Sync);
