//! Graphics error types.

use std::fmt;

use crate::backend::{BackendError, FramebufferStatus};
use crate::types::ShaderStage;

/// Errors that can occur in the graphics device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphicsError {
    /// A draw was issued without a shader bound to the given stage.
    MissingShaderStage(ShaderStage),
    /// A requested feature is not supported by the device capabilities.
    UnsupportedFeature(String),
    /// A render target combination produced an incomplete framebuffer.
    IncompleteFramebuffer(FramebufferStatus),
    /// An invalid parameter was provided.
    InvalidParameter(String),
    /// Failed to create a resource.
    ResourceCreationFailed(String),
    /// The call is not valid in the current device state.
    InvalidOperation(String),
    /// The GPU device was lost.
    DeviceLost,
    /// A native backend call failed.
    Backend(BackendError),
    /// The render thread is gone and can no longer service requests.
    RenderThreadUnavailable,
    /// A blocking render-thread request was made from the render thread.
    WouldBlockRenderThread,
}

impl fmt::Display for GraphicsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingShaderStage(stage) => write!(f, "no {stage} shader bound"),
            Self::UnsupportedFeature(msg) => write!(f, "feature not supported: {msg}"),
            Self::IncompleteFramebuffer(status) => {
                write!(f, "framebuffer incomplete: {status}")
            }
            Self::InvalidParameter(msg) => write!(f, "invalid parameter: {msg}"),
            Self::ResourceCreationFailed(msg) => write!(f, "resource creation failed: {msg}"),
            Self::InvalidOperation(msg) => write!(f, "invalid operation: {msg}"),
            Self::DeviceLost => write!(f, "GPU device lost"),
            Self::Backend(err) => write!(f, "backend error: {err}"),
            Self::RenderThreadUnavailable => write!(f, "render thread unavailable"),
            Self::WouldBlockRenderThread => {
                write!(f, "blocking render-thread request issued from the render thread")
            }
        }
    }
}

impl std::error::Error for GraphicsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Backend(err) => Some(err),
            _ => None,
        }
    }
}

impl From<BackendError> for GraphicsError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::DeviceLost => Self::DeviceLost,
            BackendError::ResourceCreationFailed(msg) => Self::ResourceCreationFailed(msg),
            other => Self::Backend(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = GraphicsError::MissingShaderStage(ShaderStage::Pixel);
        assert_eq!(err.to_string(), "no pixel shader bound");

        let err = GraphicsError::IncompleteFramebuffer(FramebufferStatus::MissingAttachment);
        assert_eq!(err.to_string(), "framebuffer incomplete: missing attachment");
    }

    #[test]
    fn test_backend_conversion() {
        assert_eq!(
            GraphicsError::from(BackendError::DeviceLost),
            GraphicsError::DeviceLost
        );
        assert_eq!(
            GraphicsError::from(BackendError::OutOfMemory),
            GraphicsError::Backend(BackendError::OutOfMemory)
        );
    }
}
