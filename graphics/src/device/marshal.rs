//! Cross-thread access to a [`GraphicsDevice`].
//!
//! The device itself lives on the render thread. Other threads hold a
//! [`DeviceHandle`], which sends closures over a channel and blocks until the
//! render thread has run them in [`GraphicsDevice::process_marshaled_work`].
//! Disposal never goes through the channel: it only pushes onto the shared
//! disposal queues.

use std::sync::mpsc;
use std::sync::Arc;
use std::thread::ThreadId;

use crate::backend::ResourceHandle;
use crate::error::GraphicsError;
use crate::resources::{IndexBuffer, Query, RenderTarget, Shader, Texture, VertexBuffer};
use crate::types::{
    BufferUsage, IndexElementSize, QueryKind, RenderTargetDescriptor, ShaderDescriptor,
    TextureDescriptor, VertexDeclaration,
};

use super::{ContextDisposalQueue, DisposalQueue, GraphicsDevice};

/// Type-erased work closure run on the render thread.
pub(crate) type RenderThreadWork = Box<dyn FnOnce(&mut GraphicsDevice) + Send>;

/// Thread-safe handle for creating and retiring resources from any thread.
#[derive(Clone)]
pub struct DeviceHandle {
    sender: mpsc::Sender<RenderThreadWork>,
    render_thread: ThreadId,
    disposal: Arc<DisposalQueue>,
    contexts: Arc<ContextDisposalQueue>,
}

impl DeviceHandle {
    pub(crate) fn new(
        sender: mpsc::Sender<RenderThreadWork>,
        render_thread: ThreadId,
        disposal: Arc<DisposalQueue>,
        contexts: Arc<ContextDisposalQueue>,
    ) -> Self {
        Self {
            sender,
            render_thread,
            disposal,
            contexts,
        }
    }

    /// Whether the calling thread is the device's render thread.
    pub fn is_render_thread(&self) -> bool {
        std::thread::current().id() == self.render_thread
    }

    /// Run `work` on the render thread and wait for its result.
    ///
    /// Blocks until the device next services marshaled work. Fails with
    /// [`GraphicsError::WouldBlockRenderThread`] when called from the render
    /// thread, and with [`GraphicsError::RenderThreadUnavailable`] once the
    /// device is gone.
    pub fn run_on_render_thread<R, F>(&self, work: F) -> Result<R, GraphicsError>
    where
        R: Send + 'static,
        F: FnOnce(&mut GraphicsDevice) -> R + Send + 'static,
    {
        if self.is_render_thread() {
            return Err(GraphicsError::WouldBlockRenderThread);
        }
        let (result_tx, result_rx) = mpsc::sync_channel::<R>(1);
        self.sender
            .send(Box::new(move |device: &mut GraphicsDevice| {
                let _ = result_tx.send(work(device));
            }))
            .map_err(|_| GraphicsError::RenderThreadUnavailable)?;
        result_rx
            .recv()
            .map_err(|_| GraphicsError::RenderThreadUnavailable)
    }

    pub fn create_texture(
        &self,
        descriptor: TextureDescriptor,
    ) -> Result<Arc<Texture>, GraphicsError> {
        self.run_on_render_thread(move |device| device.create_texture(&descriptor))?
    }

    pub fn create_render_target(
        &self,
        descriptor: RenderTargetDescriptor,
    ) -> Result<Arc<RenderTarget>, GraphicsError> {
        self.run_on_render_thread(move |device| device.create_render_target(&descriptor))?
    }

    pub fn create_vertex_buffer(
        &self,
        declaration: Arc<VertexDeclaration>,
        vertex_count: u32,
        usage: BufferUsage,
    ) -> Result<Arc<VertexBuffer>, GraphicsError> {
        self.run_on_render_thread(move |device| {
            device.create_vertex_buffer(declaration, vertex_count, usage)
        })?
    }

    pub fn create_index_buffer(
        &self,
        element_size: IndexElementSize,
        index_count: u32,
        usage: BufferUsage,
    ) -> Result<Arc<IndexBuffer>, GraphicsError> {
        self.run_on_render_thread(move |device| {
            device.create_index_buffer(element_size, index_count, usage)
        })?
    }

    pub fn create_shader(&self, descriptor: ShaderDescriptor) -> Result<Arc<Shader>, GraphicsError> {
        self.run_on_render_thread(move |device| device.create_shader(&descriptor))?
    }

    pub fn create_query(&self, kind: QueryKind) -> Result<Arc<Query>, GraphicsError> {
        self.run_on_render_thread(move |device| device.create_query(kind))?
    }

    /// Queue a raw native handle for deferred destruction. Never blocks.
    pub fn dispose(&self, handle: ResourceHandle) {
        self.disposal.enqueue(None, handle);
    }

    /// Queue a native context handle, destroyed on the next presentation change.
    pub fn retire_context(&self, context: ResourceHandle) {
        self.contexts.enqueue(context);
    }
}

impl std::fmt::Debug for DeviceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceHandle")
            .field("render_thread", &self.render_thread)
            .field("pending_disposals", &self.disposal.pending_count())
            .finish()
    }
}

static_assertions::assert_impl_all!(DeviceHandle: Send, Sync, Clone);
