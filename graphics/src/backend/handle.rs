//! Opaque native resource handles.

/// Kind of native object a [`ResourceHandle`] names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Texture,
    Buffer,
    /// Non-sampleable attachment storage (multisampled color, depth/stencil).
    Renderbuffer,
    Shader,
    Program,
    Query,
    Framebuffer,
    /// A native rendering context tied to a window.
    Context,
}

/// Backend-issued identifier for a GPU object.
///
/// Handles are plain values: copying one does not extend the lifetime of the
/// object it names. Each handle is owned by exactly one high-level resource
/// until that resource is dropped, after which the device's disposal queue
/// owns it until the backend destroys it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceHandle {
    kind: ResourceKind,
    native_id: u64,
}

impl ResourceHandle {
    /// Create a handle. Only backends should mint handles.
    pub const fn new(kind: ResourceKind, native_id: u64) -> Self {
        Self { kind, native_id }
    }

    /// Kind of object this handle names.
    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    /// Backend-specific identifier.
    pub fn native_id(&self) -> u64 {
        self.native_id
    }
}

impl std::fmt::Display for ResourceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}#{}", self.kind, self.native_id)
    }
}
