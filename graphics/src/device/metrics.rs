//! Per-frame rendering counters.

use std::ops::AddAssign;

/// Counters accumulated over one frame.
///
/// The device resets them on every `present` and keeps the finished frame's
/// values available through [`GraphicsDevice::last_frame_metrics`].
///
/// [`GraphicsDevice::last_frame_metrics`]: crate::GraphicsDevice::last_frame_metrics
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct GraphicsMetrics {
    /// `clear` calls issued.
    pub clear_count: u64,
    /// Draw calls issued.
    pub draw_count: u64,
    /// Primitives submitted, counting every instance.
    pub primitive_count: u64,
    /// Render target set changes.
    pub target_count: u64,
    /// Texture bindings changed by the client.
    pub texture_count: u64,
    /// Vertex shader changes.
    pub vertex_shader_count: u64,
    /// Pixel shader changes.
    pub pixel_shader_count: u64,
}

impl GraphicsMetrics {
    /// All counters zero.
    pub const ZERO: Self = Self {
        clear_count: 0,
        draw_count: 0,
        primitive_count: 0,
        target_count: 0,
        texture_count: 0,
        vertex_shader_count: 0,
        pixel_shader_count: 0,
    };

    pub(crate) fn record_draw(&mut self, primitive_count: u32, instance_count: u32) {
        self.draw_count += 1;
        self.primitive_count += u64::from(primitive_count) * u64::from(instance_count.max(1));
    }
}

impl AddAssign for GraphicsMetrics {
    fn add_assign(&mut self, rhs: Self) {
        self.clear_count += rhs.clear_count;
        self.draw_count += rhs.draw_count;
        self.primitive_count += rhs.primitive_count;
        self.target_count += rhs.target_count;
        self.texture_count += rhs.texture_count;
        self.vertex_shader_count += rhs.vertex_shader_count;
        self.pixel_shader_count += rhs.pixel_shader_count;
    }
}

impl std::fmt::Display for GraphicsMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} draws, {} primitives, {} clears, {} target changes, {} texture changes, {} vs / {} ps changes",
            self.draw_count,
            self.primitive_count,
            self.clear_count,
            self.target_count,
            self.texture_count,
            self.vertex_shader_count,
            self.pixel_shader_count
        )
    }
}
