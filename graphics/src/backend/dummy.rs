//! Dummy GPU backend for testing and development.
//!
//! This backend doesn't perform actual GPU operations. It records every native
//! call it receives in a shared [`CallRecorder`] so tests can assert exactly
//! which calls the device issued, and it tracks handle liveness the way a
//! driver would.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::types::{
    BlendState, BufferDescriptor, ClearOptions, Color, DepthFormat, DepthStencilState,
    PrimitiveType, QueryKind, RasterizerState, RenderbufferDescriptor, SamplerState,
    ScissorRect, ShaderDescriptor, ShaderStage, TextureDescriptor, Viewport,
};

use super::{
    AttributePointer, BackendAdapter, BackendError, BackendKind, ColorAttachment,
    FramebufferStatus, IndexBinding, ResourceHandle, ResourceKind, VertexStream,
};

/// Error code reported for calls configured to fail.
const INVALID_OPERATION: u32 = 0x0502;

/// Category of native call recorded by the dummy backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallKind {
    CreateBuffer,
    WriteBuffer,
    CreateTexture,
    WriteTexture,
    CreateRenderbuffer,
    CreateShader,
    CreateProgram,
    CreateQuery,
    CreateFramebuffer,
    Destroy,
    AttachColor,
    AttachDepthStencil,
    FramebufferStatus,
    BindFramebuffer,
    BlitFramebuffer,
    GenerateMipmaps,
    SetViewport,
    SetRasterizerState,
    SetScissorTestEnabled,
    SetScissorRect,
    SetBlendState,
    SetBlendFactor,
    SetDepthStencilState,
    SetClearColor,
    SetClearDepth,
    SetClearStencil,
    Clear,
    BindIndexBuffer,
    BindVertexBuffers,
    SetVertexAttributes,
    SetVertexAttributeEnabled,
    UseProgram,
    BindTexture,
    BindSampler,
    DrawArrays,
    DrawIndexed,
    DrawIndexedInstanced,
    BeginQuery,
    EndQuery,
    QueryResult,
    Present,
}

impl CallKind {
    /// Native-style name used in error reports.
    pub fn name(&self) -> &'static str {
        match self {
            Self::CreateBuffer => "create_buffer",
            Self::WriteBuffer => "write_buffer",
            Self::CreateTexture => "create_texture",
            Self::WriteTexture => "write_texture",
            Self::CreateRenderbuffer => "create_renderbuffer",
            Self::CreateShader => "create_shader",
            Self::CreateProgram => "create_program",
            Self::CreateQuery => "create_query",
            Self::CreateFramebuffer => "create_framebuffer",
            Self::Destroy => "destroy",
            Self::AttachColor => "attach_color",
            Self::AttachDepthStencil => "attach_depth_stencil",
            Self::FramebufferStatus => "framebuffer_status",
            Self::BindFramebuffer => "bind_framebuffer",
            Self::BlitFramebuffer => "blit_framebuffer",
            Self::GenerateMipmaps => "generate_mipmaps",
            Self::SetViewport => "set_viewport",
            Self::SetRasterizerState => "set_rasterizer_state",
            Self::SetScissorTestEnabled => "set_scissor_test_enabled",
            Self::SetScissorRect => "set_scissor_rect",
            Self::SetBlendState => "set_blend_state",
            Self::SetBlendFactor => "set_blend_factor",
            Self::SetDepthStencilState => "set_depth_stencil_state",
            Self::SetClearColor => "set_clear_color",
            Self::SetClearDepth => "set_clear_depth",
            Self::SetClearStencil => "set_clear_stencil",
            Self::Clear => "clear",
            Self::BindIndexBuffer => "bind_index_buffer",
            Self::BindVertexBuffers => "bind_vertex_buffers",
            Self::SetVertexAttributes => "set_vertex_attributes",
            Self::SetVertexAttributeEnabled => "set_vertex_attribute_enabled",
            Self::UseProgram => "use_program",
            Self::BindTexture => "bind_texture",
            Self::BindSampler => "bind_sampler",
            Self::DrawArrays => "draw_arrays",
            Self::DrawIndexed => "draw_indexed",
            Self::DrawIndexedInstanced => "draw_indexed_instanced",
            Self::BeginQuery => "begin_query",
            Self::EndQuery => "end_query",
            Self::QueryResult => "query_result",
            Self::Present => "present",
        }
    }

    /// Whether this call issues geometry.
    pub fn is_draw(&self) -> bool {
        matches!(
            self,
            Self::DrawArrays | Self::DrawIndexed | Self::DrawIndexedInstanced
        )
    }
}

#[derive(Debug, Default)]
struct RecorderState {
    calls: Vec<CallKind>,
    next_id: u64,
    live: HashSet<ResourceHandle>,
    destroyed: Vec<ResourceHandle>,
    forced_status: Option<FramebufferStatus>,
    failing: HashSet<CallKind>,
    errors: VecDeque<BackendError>,
    color_attachments: HashMap<ResourceHandle, Vec<(u32, ColorAttachment)>>,
    attribute_pointers: HashMap<u32, Vec<AttributePointer>>,
    enabled_attributes: HashSet<u32>,
    bound_framebuffer: Option<ResourceHandle>,
    bound_program: Option<ResourceHandle>,
    scissor_enabled: bool,
    blits_with_scissor: usize,
    clear_color: Option<Color>,
    clears: Vec<(Option<ResourceHandle>, ClearOptions, Option<Color>)>,
}

/// Shared view of everything a [`DummyBackend`] has been asked to do.
///
/// Cloning the recorder is cheap; all clones observe the same backend, so a
/// test can keep one after moving the backend into a device.
#[derive(Debug, Clone, Default)]
pub struct CallRecorder {
    state: Arc<Mutex<RecorderState>>,
}

impl CallRecorder {
    /// Number of recorded calls of `kind`.
    pub fn count(&self, kind: CallKind) -> usize {
        self.state.lock().calls.iter().filter(|&&c| c == kind).count()
    }

    /// Number of recorded calls of any kind.
    pub fn total_calls(&self) -> usize {
        self.state.lock().calls.len()
    }

    /// Number of recorded draw calls.
    pub fn draw_calls(&self) -> usize {
        self.state.lock().calls.iter().filter(|c| c.is_draw()).count()
    }

    /// All recorded calls in issue order.
    pub fn calls(&self) -> Vec<CallKind> {
        self.state.lock().calls.clone()
    }

    /// Forget recorded calls. Liveness and bindings are kept.
    pub fn reset_calls(&self) {
        let mut state = self.state.lock();
        state.calls.clear();
        state.clears.clear();
        state.blits_with_scissor = 0;
    }

    /// Whether `handle` names a live native object.
    pub fn is_live(&self, handle: ResourceHandle) -> bool {
        self.state.lock().live.contains(&handle)
    }

    /// Number of live native objects of `kind`.
    pub fn live_count(&self, kind: ResourceKind) -> usize {
        self.state
            .lock()
            .live
            .iter()
            .filter(|h| h.kind() == kind)
            .count()
    }

    /// Handles destroyed so far, in destruction order.
    pub fn destroyed(&self) -> Vec<ResourceHandle> {
        self.state.lock().destroyed.clone()
    }

    /// Drop `handle` without a destroy call, as a driver does on context loss.
    pub fn invalidate(&self, handle: ResourceHandle) {
        self.state.lock().live.remove(&handle);
    }

    /// Mint a live context handle, as a window layer does when it creates one.
    pub fn create_context(&self) -> ResourceHandle {
        let mut state = self.state.lock();
        state.next_id += 1;
        let handle = ResourceHandle::new(ResourceKind::Context, state.next_id);
        state.live.insert(handle);
        handle
    }

    /// Make every following completeness check report `status`.
    ///
    /// `None` restores the default of reporting complete.
    pub fn force_framebuffer_status(&self, status: Option<FramebufferStatus>) {
        self.state.lock().forced_status = status;
    }

    /// Make every following call of `kind` fail.
    pub fn fail_call(&self, kind: CallKind) {
        self.state.lock().failing.insert(kind);
    }

    /// Queue an error to be returned by the next `take_error`.
    pub fn raise_error(&self, error: BackendError) {
        self.state.lock().errors.push_back(error);
    }

    /// Color attachments of a framebuffer, in attach order.
    pub fn color_attachments(&self, framebuffer: ResourceHandle) -> Vec<(u32, ColorAttachment)> {
        self.state
            .lock()
            .color_attachments
            .get(&framebuffer)
            .cloned()
            .unwrap_or_default()
    }

    /// Attribute pointers last set for a vertex buffer slot.
    pub fn attribute_pointers(&self, slot: u32) -> Vec<AttributePointer> {
        self.state
            .lock()
            .attribute_pointers
            .get(&slot)
            .cloned()
            .unwrap_or_default()
    }

    /// Currently enabled attribute locations, sorted.
    pub fn enabled_attributes(&self) -> Vec<u32> {
        let mut locations: Vec<u32> = self.state.lock().enabled_attributes.iter().copied().collect();
        locations.sort_unstable();
        locations
    }

    /// Framebuffer currently bound, `None` for the back buffer.
    pub fn bound_framebuffer(&self) -> Option<ResourceHandle> {
        self.state.lock().bound_framebuffer
    }

    /// Program currently in use.
    pub fn bound_program(&self) -> Option<ResourceHandle> {
        self.state.lock().bound_program
    }

    /// Blits issued while the scissor test was enabled.
    pub fn blits_with_scissor(&self) -> usize {
        self.state.lock().blits_with_scissor
    }

    /// Recorded clears: target framebuffer, options and clear color at the time.
    pub fn clears(&self) -> Vec<(Option<ResourceHandle>, ClearOptions, Option<Color>)> {
        self.state.lock().clears.clone()
    }
}

/// Dummy GPU backend.
#[derive(Debug)]
pub struct DummyBackend {
    kind: BackendKind,
    recorder: CallRecorder,
}

impl DummyBackend {
    /// Create a new dummy backend using the global-state model.
    pub fn new() -> Self {
        Self::with_kind(BackendKind::GlobalState)
    }

    /// Create a dummy backend emulating the given programming model.
    ///
    /// Context-object backends cannot answer liveness queries.
    pub fn with_kind(kind: BackendKind) -> Self {
        Self {
            kind,
            recorder: CallRecorder::default(),
        }
    }

    /// Shared recorder observing this backend.
    pub fn recorder(&self) -> CallRecorder {
        self.recorder.clone()
    }

    fn record(&self, kind: CallKind) -> Result<(), BackendError> {
        let mut state = self.recorder.state.lock();
        state.calls.push(kind);
        if state.failing.contains(&kind) {
            return Err(BackendError::NativeCall {
                call: kind.name(),
                code: INVALID_OPERATION,
            });
        }
        Ok(())
    }

    fn mint(&self, call: CallKind, kind: ResourceKind) -> Result<ResourceHandle, BackendError> {
        self.record(call)?;
        let mut state = self.recorder.state.lock();
        state.next_id += 1;
        let handle = ResourceHandle::new(kind, state.next_id);
        state.live.insert(handle);
        log::trace!("DummyBackend: created {handle}");
        Ok(handle)
    }

    fn require_live(&self, handle: ResourceHandle) -> Result<(), BackendError> {
        if self.recorder.state.lock().live.contains(&handle) {
            Ok(())
        } else {
            Err(BackendError::InvalidHandle(handle))
        }
    }
}

impl Default for DummyBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl BackendAdapter for DummyBackend {
    fn name(&self) -> &'static str {
        "Dummy Backend"
    }

    fn kind(&self) -> BackendKind {
        self.kind
    }

    fn create_buffer(
        &mut self,
        descriptor: &BufferDescriptor,
    ) -> Result<ResourceHandle, BackendError> {
        log::trace!(
            "DummyBackend: creating buffer {:?} (size: {})",
            descriptor.label,
            descriptor.size
        );
        self.mint(CallKind::CreateBuffer, ResourceKind::Buffer)
    }

    fn write_buffer(
        &mut self,
        buffer: ResourceHandle,
        offset: u64,
        data: &[u8],
    ) -> Result<(), BackendError> {
        log::trace!(
            "DummyBackend: write_buffer {buffer} offset={} len={}",
            offset,
            data.len()
        );
        self.record(CallKind::WriteBuffer)?;
        self.require_live(buffer)
    }

    fn create_texture(
        &mut self,
        descriptor: &TextureDescriptor,
    ) -> Result<ResourceHandle, BackendError> {
        log::trace!(
            "DummyBackend: creating texture {:?} ({}x{}x{})",
            descriptor.label,
            descriptor.width,
            descriptor.height,
            descriptor.array_layers
        );
        self.mint(CallKind::CreateTexture, ResourceKind::Texture)
    }

    fn write_texture(
        &mut self,
        texture: ResourceHandle,
        level: u32,
        layer: u32,
        data: &[u8],
    ) -> Result<(), BackendError> {
        log::trace!(
            "DummyBackend: write_texture {texture} level={level} layer={layer} len={}",
            data.len()
        );
        self.record(CallKind::WriteTexture)?;
        self.require_live(texture)
    }

    fn create_renderbuffer(
        &mut self,
        descriptor: &RenderbufferDescriptor,
    ) -> Result<ResourceHandle, BackendError> {
        log::trace!(
            "DummyBackend: creating renderbuffer {:?} ({}x{}, {} samples)",
            descriptor.format,
            descriptor.width,
            descriptor.height,
            descriptor.sample_count
        );
        self.mint(CallKind::CreateRenderbuffer, ResourceKind::Renderbuffer)
    }

    fn create_shader(
        &mut self,
        descriptor: &ShaderDescriptor,
    ) -> Result<ResourceHandle, BackendError> {
        log::trace!(
            "DummyBackend: creating {} shader {:?}",
            descriptor.stage,
            descriptor.label
        );
        self.mint(CallKind::CreateShader, ResourceKind::Shader)
    }

    fn create_program(
        &mut self,
        vertex: ResourceHandle,
        pixel: ResourceHandle,
    ) -> Result<ResourceHandle, BackendError> {
        self.require_live(vertex)?;
        self.require_live(pixel)?;
        self.mint(CallKind::CreateProgram, ResourceKind::Program)
    }

    fn create_query(&mut self, kind: QueryKind) -> Result<ResourceHandle, BackendError> {
        log::trace!("DummyBackend: creating {kind:?} query");
        self.mint(CallKind::CreateQuery, ResourceKind::Query)
    }

    fn create_framebuffer(&mut self) -> Result<ResourceHandle, BackendError> {
        self.mint(CallKind::CreateFramebuffer, ResourceKind::Framebuffer)
    }

    fn destroy(&mut self, handle: ResourceHandle) -> Result<(), BackendError> {
        self.record(CallKind::Destroy)?;
        let mut state = self.recorder.state.lock();
        if !state.live.remove(&handle) {
            return Err(BackendError::InvalidHandle(handle));
        }
        state.destroyed.push(handle);
        state.color_attachments.remove(&handle);
        if state.bound_framebuffer == Some(handle) {
            state.bound_framebuffer = None;
        }
        if state.bound_program == Some(handle) {
            state.bound_program = None;
        }
        log::trace!("DummyBackend: destroyed {handle}");
        Ok(())
    }

    fn is_live(&self, handle: ResourceHandle) -> Option<bool> {
        match self.kind {
            BackendKind::GlobalState => Some(self.recorder.is_live(handle)),
            BackendKind::ContextObject => None,
        }
    }

    fn attach_color(
        &mut self,
        framebuffer: ResourceHandle,
        index: u32,
        attachment: ColorAttachment,
    ) -> Result<(), BackendError> {
        self.record(CallKind::AttachColor)?;
        self.require_live(framebuffer)?;
        self.recorder
            .state
            .lock()
            .color_attachments
            .entry(framebuffer)
            .or_default()
            .push((index, attachment));
        Ok(())
    }

    fn attach_depth_stencil(
        &mut self,
        framebuffer: ResourceHandle,
        renderbuffer: ResourceHandle,
        format: DepthFormat,
    ) -> Result<(), BackendError> {
        log::trace!("DummyBackend: attach {renderbuffer} as {format:?} to {framebuffer}");
        self.record(CallKind::AttachDepthStencil)?;
        self.require_live(framebuffer)?;
        self.require_live(renderbuffer)
    }

    fn framebuffer_status(&mut self, framebuffer: ResourceHandle) -> FramebufferStatus {
        // A failing status query is reported as an unsupported combination.
        if self.record(CallKind::FramebufferStatus).is_err() {
            return FramebufferStatus::Unsupported;
        }
        let state = self.recorder.state.lock();
        if let Some(status) = state.forced_status {
            return status;
        }
        if !state.live.contains(&framebuffer) {
            return FramebufferStatus::IncompleteAttachment;
        }
        match state.color_attachments.get(&framebuffer) {
            Some(attachments) if !attachments.is_empty() => FramebufferStatus::Complete,
            _ => FramebufferStatus::MissingAttachment,
        }
    }

    fn bind_framebuffer(
        &mut self,
        framebuffer: Option<ResourceHandle>,
    ) -> Result<(), BackendError> {
        self.record(CallKind::BindFramebuffer)?;
        if let Some(handle) = framebuffer {
            self.require_live(handle)?;
        }
        self.recorder.state.lock().bound_framebuffer = framebuffer;
        Ok(())
    }

    fn blit_framebuffer(
        &mut self,
        source: ResourceHandle,
        destination: ResourceHandle,
        attachment: u32,
        width: u32,
        height: u32,
    ) -> Result<(), BackendError> {
        log::trace!(
            "DummyBackend: blit {source} -> {destination} attachment={attachment} ({width}x{height})"
        );
        self.record(CallKind::BlitFramebuffer)?;
        self.require_live(source)?;
        self.require_live(destination)?;
        let mut state = self.recorder.state.lock();
        if state.scissor_enabled {
            state.blits_with_scissor += 1;
        }
        Ok(())
    }

    fn generate_mipmaps(&mut self, texture: ResourceHandle) -> Result<(), BackendError> {
        self.record(CallKind::GenerateMipmaps)?;
        self.require_live(texture)
    }

    fn set_viewport(&mut self, viewport: &Viewport) -> Result<(), BackendError> {
        log::trace!(
            "DummyBackend: viewport ({}, {}) {}x{}",
            viewport.x,
            viewport.y,
            viewport.width,
            viewport.height
        );
        self.record(CallKind::SetViewport)
    }

    fn set_rasterizer_state(&mut self, state: &RasterizerState) -> Result<(), BackendError> {
        self.record(CallKind::SetRasterizerState)?;
        self.recorder.state.lock().scissor_enabled = state.scissor_test_enable;
        Ok(())
    }

    fn set_scissor_test_enabled(&mut self, enabled: bool) -> Result<(), BackendError> {
        self.record(CallKind::SetScissorTestEnabled)?;
        self.recorder.state.lock().scissor_enabled = enabled;
        Ok(())
    }

    fn set_scissor_rect(&mut self, _rect: &ScissorRect) -> Result<(), BackendError> {
        self.record(CallKind::SetScissorRect)
    }

    fn set_blend_state(&mut self, _state: &BlendState) -> Result<(), BackendError> {
        self.record(CallKind::SetBlendState)
    }

    fn set_blend_factor(&mut self, _factor: Color) -> Result<(), BackendError> {
        self.record(CallKind::SetBlendFactor)
    }

    fn set_depth_stencil_state(&mut self, _state: &DepthStencilState) -> Result<(), BackendError> {
        self.record(CallKind::SetDepthStencilState)
    }

    fn set_clear_color(&mut self, color: Color) -> Result<(), BackendError> {
        self.record(CallKind::SetClearColor)?;
        self.recorder.state.lock().clear_color = Some(color);
        Ok(())
    }

    fn set_clear_depth(&mut self, _depth: f32) -> Result<(), BackendError> {
        self.record(CallKind::SetClearDepth)
    }

    fn set_clear_stencil(&mut self, _stencil: i32) -> Result<(), BackendError> {
        self.record(CallKind::SetClearStencil)
    }

    fn clear(&mut self, options: ClearOptions) -> Result<(), BackendError> {
        self.record(CallKind::Clear)?;
        let mut state = self.recorder.state.lock();
        let entry = (state.bound_framebuffer, options, state.clear_color);
        state.clears.push(entry);
        Ok(())
    }

    fn bind_index_buffer(&mut self, binding: Option<IndexBinding>) -> Result<(), BackendError> {
        self.record(CallKind::BindIndexBuffer)?;
        match binding {
            Some(binding) => self.require_live(binding.buffer),
            None => Ok(()),
        }
    }

    fn bind_vertex_buffers(
        &mut self,
        streams: &[Option<VertexStream>],
    ) -> Result<(), BackendError> {
        self.record(CallKind::BindVertexBuffers)?;
        for stream in streams.iter().flatten() {
            self.require_live(stream.buffer)?;
        }
        Ok(())
    }

    fn set_vertex_attributes(
        &mut self,
        slot: u32,
        pointers: &[AttributePointer],
    ) -> Result<(), BackendError> {
        self.record(CallKind::SetVertexAttributes)?;
        self.recorder
            .state
            .lock()
            .attribute_pointers
            .insert(slot, pointers.to_vec());
        Ok(())
    }

    fn set_vertex_attribute_enabled(
        &mut self,
        location: u32,
        enabled: bool,
    ) -> Result<(), BackendError> {
        self.record(CallKind::SetVertexAttributeEnabled)?;
        let mut state = self.recorder.state.lock();
        if enabled {
            state.enabled_attributes.insert(location);
        } else {
            state.enabled_attributes.remove(&location);
        }
        Ok(())
    }

    fn use_program(&mut self, program: Option<ResourceHandle>) -> Result<(), BackendError> {
        self.record(CallKind::UseProgram)?;
        if let Some(handle) = program {
            self.require_live(handle)?;
        }
        self.recorder.state.lock().bound_program = program;
        Ok(())
    }

    fn bind_texture(
        &mut self,
        stage: ShaderStage,
        slot: u32,
        texture: Option<ResourceHandle>,
    ) -> Result<(), BackendError> {
        log::trace!("DummyBackend: bind {texture:?} to {stage} slot {slot}");
        self.record(CallKind::BindTexture)
    }

    fn bind_sampler(
        &mut self,
        _stage: ShaderStage,
        _slot: u32,
        _state: &SamplerState,
    ) -> Result<(), BackendError> {
        self.record(CallKind::BindSampler)
    }

    fn draw_arrays(
        &mut self,
        primitive: PrimitiveType,
        first_vertex: u32,
        vertex_count: u32,
    ) -> Result<(), BackendError> {
        log::trace!("DummyBackend: draw_arrays {primitive:?} first={first_vertex} count={vertex_count}");
        self.record(CallKind::DrawArrays)
    }

    fn draw_indexed(
        &mut self,
        primitive: PrimitiveType,
        first_index: u32,
        index_count: u32,
    ) -> Result<(), BackendError> {
        log::trace!("DummyBackend: draw_indexed {primitive:?} first={first_index} count={index_count}");
        self.record(CallKind::DrawIndexed)
    }

    fn draw_indexed_instanced(
        &mut self,
        primitive: PrimitiveType,
        first_index: u32,
        index_count: u32,
        instance_count: u32,
        base_instance: u32,
    ) -> Result<(), BackendError> {
        log::trace!(
            "DummyBackend: draw_indexed_instanced {primitive:?} first={first_index} count={index_count} \
             instances={instance_count} base={base_instance}"
        );
        self.record(CallKind::DrawIndexedInstanced)
    }

    fn begin_query(&mut self, query: ResourceHandle) -> Result<(), BackendError> {
        self.record(CallKind::BeginQuery)?;
        self.require_live(query)
    }

    fn end_query(&mut self, query: ResourceHandle) -> Result<(), BackendError> {
        self.record(CallKind::EndQuery)?;
        self.require_live(query)
    }

    fn query_result(&mut self, query: ResourceHandle) -> Result<Option<u64>, BackendError> {
        self.record(CallKind::QueryResult)?;
        self.require_live(query)?;
        Ok(Some(0))
    }

    fn present(&mut self) -> Result<(), BackendError> {
        log::trace!("DummyBackend: present");
        self.record(CallKind::Present)
    }

    fn take_error(&mut self) -> Option<BackendError> {
        self.recorder.state.lock().errors.pop_front()
    }
}
