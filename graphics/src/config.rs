//! Device configuration and presentation parameters.

use crate::capabilities::Capabilities;
use crate::types::{DepthFormat, TextureFormat};

/// What to do when a render target combination yields an incomplete framebuffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum IncompleteFramebufferPolicy {
    /// Destroy the framebuffer and return an error.
    #[default]
    Fail,
    /// Log a warning and keep rendering into the framebuffer anyway.
    Tolerate,
}

/// Tunables for a [`GraphicsDevice`](crate::GraphicsDevice).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceConfig {
    /// Poll the backend for errors after every state category application.
    pub debug_checks: bool,
    /// Behaviour on incomplete framebuffers.
    pub incomplete_framebuffer_policy: IncompleteFramebufferPolicy,
}

impl DeviceConfig {
    /// Create the default configuration.
    pub fn new() -> Self {
        Self {
            debug_checks: cfg!(debug_assertions),
            incomplete_framebuffer_policy: IncompleteFramebufferPolicy::Fail,
        }
    }

    /// Enable or disable backend error polling.
    pub fn with_debug_checks(mut self, enabled: bool) -> Self {
        self.debug_checks = enabled;
        self
    }

    /// Set the incomplete framebuffer policy.
    pub fn with_incomplete_framebuffer_policy(mut self, policy: IncompleteFramebufferPolicy) -> Self {
        self.incomplete_framebuffer_policy = policy;
        self
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Back buffer description supplied by the window collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PresentationParameters {
    /// Back buffer width in pixels.
    pub back_buffer_width: u32,
    /// Back buffer height in pixels.
    pub back_buffer_height: u32,
    /// Back buffer color format.
    pub back_buffer_format: TextureFormat,
    /// Back buffer depth/stencil format.
    pub depth_format: DepthFormat,
}

impl PresentationParameters {
    /// Create parameters for a back buffer of the given size.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            back_buffer_width: width,
            back_buffer_height: height,
            back_buffer_format: TextureFormat::Bgra8Unorm,
            depth_format: DepthFormat::Depth24Stencil8,
        }
    }

    /// Set the depth/stencil format.
    pub fn with_depth_format(mut self, depth_format: DepthFormat) -> Self {
        self.depth_format = depth_format;
        self
    }
}

impl Default for PresentationParameters {
    fn default() -> Self {
        Self::new(800, 600)
    }
}

/// Everything needed to create a device besides the backend itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DeviceDescriptor {
    /// Capabilities reported by the context collaborator.
    pub capabilities: Capabilities,
    /// Initial back buffer parameters.
    pub presentation: PresentationParameters,
    /// Device tunables.
    pub config: DeviceConfig,
}

impl DeviceDescriptor {
    /// Create a descriptor with default capabilities and configuration.
    pub fn new(presentation: PresentationParameters) -> Self {
        Self {
            presentation,
            ..Self::default()
        }
    }

    /// Set the capabilities.
    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Set the configuration.
    pub fn with_config(mut self, config: DeviceConfig) -> Self {
        self.config = config;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DeviceConfig::default();
        assert_eq!(config.debug_checks, cfg!(debug_assertions));
        assert_eq!(
            config.incomplete_framebuffer_policy,
            IncompleteFramebufferPolicy::Fail
        );
    }

    #[test]
    fn test_descriptor_builder() {
        let desc = DeviceDescriptor::new(PresentationParameters::new(1280, 720))
            .with_capabilities(Capabilities::gl_es2())
            .with_config(DeviceConfig::new().with_debug_checks(true));
        assert_eq!(desc.presentation.back_buffer_width, 1280);
        assert!(!desc.capabilities.supports_instancing);
        assert!(desc.config.debug_checks);
    }
}
