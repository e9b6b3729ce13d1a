//! Backend error types.

use super::handle::ResourceHandle;

/// Errors reported by a [`BackendAdapter`](super::BackendAdapter).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// A native call reported an error code.
    NativeCall {
        /// Name of the failing call.
        call: &'static str,
        /// Backend-specific error code.
        code: u32,
    },
    /// The handle does not name a live object.
    InvalidHandle(ResourceHandle),
    /// Failed to create a resource.
    ResourceCreationFailed(String),
    /// Out of GPU memory.
    OutOfMemory,
    /// The device was lost.
    DeviceLost,
}

impl std::fmt::Display for BackendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NativeCall { call, code } => {
                write!(f, "native call {call} failed with code {code:#06x}")
            }
            Self::InvalidHandle(handle) => write!(f, "invalid handle {handle}"),
            Self::ResourceCreationFailed(msg) => write!(f, "resource creation failed: {msg}"),
            Self::OutOfMemory => write!(f, "out of GPU memory"),
            Self::DeviceLost => write!(f, "GPU device lost"),
        }
    }
}

impl std::error::Error for BackendError {}
