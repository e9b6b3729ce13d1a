//! Device capabilities.
//!
//! Capabilities are supplied by whoever creates the device (usually after
//! probing the native API during context creation). The device core reads them
//! but never queries the backend itself.

/// Maximum number of simultaneously bound render targets the device core supports.
pub const MAX_RENDER_TARGETS: usize = 8;

/// Maximum number of texture slots per shader stage the device core supports.
pub const MAX_TEXTURE_SLOTS: usize = 32;

/// Maximum number of vertex buffer slots.
pub const MAX_VERTEX_BUFFERS: usize = 16;

/// Capabilities of a graphics device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Capabilities {
    /// Whether per-instance vertex data is supported.
    pub supports_instancing: bool,
    /// Whether instanced draws may start at a non-zero instance.
    pub supports_base_instance: bool,
    /// Whether framebuffer blits (MSAA resolve) are supported.
    pub supports_blit_framebuffer: bool,
    /// Whether the backend can answer handle liveness queries.
    pub supports_handle_queries: bool,
    /// Maximum simultaneous render targets.
    pub max_render_targets: u32,
    /// Texture slots per shader stage.
    pub max_texture_slots: u32,
    /// Vertex attribute locations.
    pub max_vertex_attributes: u32,
    /// Maximum texture dimension.
    pub max_texture_size: u32,
    /// Highest supported multisample count.
    pub max_multisample_count: u32,
}

impl Capabilities {
    /// Typical desktop GL 3.3 / D3D11 feature level.
    pub const fn desktop() -> Self {
        Self {
            supports_instancing: true,
            supports_base_instance: true,
            supports_blit_framebuffer: true,
            supports_handle_queries: true,
            max_render_targets: 4,
            max_texture_slots: 16,
            max_vertex_attributes: 16,
            max_texture_size: 16384,
            max_multisample_count: 8,
        }
    }

    /// Minimal OpenGL ES 2.0 class hardware.
    pub const fn gl_es2() -> Self {
        Self {
            supports_instancing: false,
            supports_base_instance: false,
            supports_blit_framebuffer: false,
            supports_handle_queries: true,
            max_render_targets: 1,
            max_texture_slots: 8,
            max_vertex_attributes: 8,
            max_texture_size: 2048,
            max_multisample_count: 1,
        }
    }

    /// Render target cap, clamped to what the device core can track.
    pub fn render_target_limit(&self) -> usize {
        (self.max_render_targets as usize).clamp(1, MAX_RENDER_TARGETS)
    }

    /// Texture slot cap per stage, clamped to what the device core can track.
    pub fn texture_slot_limit(&self) -> usize {
        (self.max_texture_slots as usize).min(MAX_TEXTURE_SLOTS)
    }

    /// Clamp a requested sample count to a supported power of two.
    ///
    /// Counts of 0 and 1 both mean single sampled.
    pub fn clamp_sample_count(&self, requested: u32) -> u32 {
        let max = self.max_multisample_count.max(1);
        let mut count = 1;
        while count * 2 <= requested && count * 2 <= max {
            count *= 2;
        }
        count
    }
}

impl Default for Capabilities {
    fn default() -> Self {
        Self::desktop()
    }
}
