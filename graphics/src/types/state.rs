//! Fixed-function pipeline state objects.
//!
//! These are plain values. The device's state cache compares them against
//! the last values pushed to the backend to decide whether a native call is
//! required, so every type here implements exact [`PartialEq`].

use bitflags::bitflags;

// ============================================================================
// Blend
// ============================================================================

/// Blend factor applied to a source or destination color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Blend {
    One,
    Zero,
    SourceColor,
    InverseSourceColor,
    SourceAlpha,
    InverseSourceAlpha,
    DestinationColor,
    InverseDestinationColor,
    DestinationAlpha,
    InverseDestinationAlpha,
    /// The device-wide blend factor color.
    BlendFactor,
    InverseBlendFactor,
    SourceAlphaSaturation,
}

/// How source and destination terms are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BlendFunction {
    #[default]
    Add,
    Subtract,
    ReverseSubtract,
    Min,
    Max,
}

bitflags! {
    /// Color channels written by the blend stage.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ColorWriteChannels: u8 {
        const RED = 1 << 0;
        const GREEN = 1 << 1;
        const BLUE = 1 << 2;
        const ALPHA = 1 << 3;
        const ALL = Self::RED.bits() | Self::GREEN.bits() | Self::BLUE.bits() | Self::ALPHA.bits();
    }
}

/// Blend state for the color attachments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlendState {
    pub color_source_blend: Blend,
    pub color_destination_blend: Blend,
    pub color_blend_function: BlendFunction,
    pub alpha_source_blend: Blend,
    pub alpha_destination_blend: Blend,
    pub alpha_blend_function: BlendFunction,
    pub color_write_channels: ColorWriteChannels,
}

impl BlendState {
    /// Source overwrites destination.
    pub const OPAQUE: Self = Self::uniform(Blend::One, Blend::Zero);
    /// Premultiplied alpha blending.
    pub const ALPHA_BLEND: Self = Self::uniform(Blend::One, Blend::InverseSourceAlpha);
    /// Additive blending weighted by source alpha.
    pub const ADDITIVE: Self = Self::uniform(Blend::SourceAlpha, Blend::One);
    /// Straight (non-premultiplied) alpha blending.
    pub const NON_PREMULTIPLIED: Self =
        Self::uniform(Blend::SourceAlpha, Blend::InverseSourceAlpha);

    const fn uniform(source: Blend, destination: Blend) -> Self {
        Self {
            color_source_blend: source,
            color_destination_blend: destination,
            color_blend_function: BlendFunction::Add,
            alpha_source_blend: source,
            alpha_destination_blend: destination,
            alpha_blend_function: BlendFunction::Add,
            color_write_channels: ColorWriteChannels::ALL,
        }
    }

    /// Returns true if this state leaves the destination untouched by blending.
    pub fn is_opaque(&self) -> bool {
        self.color_source_blend == Blend::One
            && self.color_destination_blend == Blend::Zero
            && self.alpha_source_blend == Blend::One
            && self.alpha_destination_blend == Blend::Zero
    }

    /// Returns true if either term references the device blend factor.
    pub fn uses_blend_factor(&self) -> bool {
        [
            self.color_source_blend,
            self.color_destination_blend,
            self.alpha_source_blend,
            self.alpha_destination_blend,
        ]
        .iter()
        .any(|b| matches!(b, Blend::BlendFactor | Blend::InverseBlendFactor))
    }

    /// Set the written color channels.
    pub fn with_color_write_channels(mut self, channels: ColorWriteChannels) -> Self {
        self.color_write_channels = channels;
        self
    }
}

impl Default for BlendState {
    fn default() -> Self {
        Self::OPAQUE
    }
}

// ============================================================================
// Depth / stencil
// ============================================================================

/// Comparison used for depth and stencil tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareFunction {
    Always,
    Never,
    Less,
    LessEqual,
    Equal,
    GreaterEqual,
    Greater,
    NotEqual,
}

/// Operation applied to the stencil buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StencilOperation {
    #[default]
    Keep,
    Zero,
    Replace,
    Increment,
    Decrement,
    IncrementSaturation,
    DecrementSaturation,
    Invert,
}

/// Depth and stencil test configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DepthStencilState {
    pub depth_buffer_enable: bool,
    pub depth_buffer_write_enable: bool,
    pub depth_buffer_function: CompareFunction,
    pub stencil_enable: bool,
    pub stencil_function: CompareFunction,
    pub stencil_pass: StencilOperation,
    pub stencil_fail: StencilOperation,
    pub stencil_depth_buffer_fail: StencilOperation,
    pub reference_stencil: i32,
    pub stencil_mask: u32,
    pub stencil_write_mask: u32,
}

impl DepthStencilState {
    /// Depth test and write enabled.
    pub const DEFAULT: Self = Self::depth(true, true);
    /// Depth test enabled, writes disabled.
    pub const DEPTH_READ: Self = Self::depth(true, false);
    /// Depth test and write disabled.
    pub const NONE: Self = Self::depth(false, false);

    const fn depth(enable: bool, write: bool) -> Self {
        Self {
            depth_buffer_enable: enable,
            depth_buffer_write_enable: write,
            depth_buffer_function: CompareFunction::LessEqual,
            stencil_enable: false,
            stencil_function: CompareFunction::Always,
            stencil_pass: StencilOperation::Keep,
            stencil_fail: StencilOperation::Keep,
            stencil_depth_buffer_fail: StencilOperation::Keep,
            reference_stencil: 0,
            stencil_mask: u32::MAX,
            stencil_write_mask: u32::MAX,
        }
    }

    /// Set the stencil reference value.
    pub fn with_reference_stencil(mut self, reference: i32) -> Self {
        self.reference_stencil = reference;
        self
    }
}

impl Default for DepthStencilState {
    fn default() -> Self {
        Self::DEFAULT
    }
}

// ============================================================================
// Rasterizer
// ============================================================================

/// Which triangle winding is culled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CullMode {
    None,
    CullClockwiseFace,
    #[default]
    CullCounterClockwiseFace,
}

/// Polygon fill mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FillMode {
    #[default]
    Solid,
    WireFrame,
}

/// Rasterizer configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RasterizerState {
    pub cull_mode: CullMode,
    pub fill_mode: FillMode,
    pub scissor_test_enable: bool,
    pub multisample_anti_alias: bool,
    pub depth_bias: f32,
    pub slope_scale_depth_bias: f32,
}

impl RasterizerState {
    pub const CULL_NONE: Self = Self::culling(CullMode::None);
    pub const CULL_CLOCKWISE: Self = Self::culling(CullMode::CullClockwiseFace);
    pub const CULL_COUNTER_CLOCKWISE: Self = Self::culling(CullMode::CullCounterClockwiseFace);

    const fn culling(cull_mode: CullMode) -> Self {
        Self {
            cull_mode,
            fill_mode: FillMode::Solid,
            scissor_test_enable: false,
            multisample_anti_alias: true,
            depth_bias: 0.0,
            slope_scale_depth_bias: 0.0,
        }
    }

    /// Enable or disable the scissor test.
    pub fn with_scissor_test(mut self, enable: bool) -> Self {
        self.scissor_test_enable = enable;
        self
    }
}

impl Default for RasterizerState {
    fn default() -> Self {
        Self::CULL_COUNTER_CLOCKWISE
    }
}

// ============================================================================
// Sampler
// ============================================================================

/// Texture filtering mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextureFilter {
    #[default]
    Linear,
    Point,
    Anisotropic,
    LinearMipPoint,
    PointMipLinear,
}

/// Behaviour for texture coordinates outside `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextureAddressMode {
    #[default]
    Wrap,
    Clamp,
    Mirror,
}

/// Sampler configuration bound per texture slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SamplerState {
    pub filter: TextureFilter,
    pub address_u: TextureAddressMode,
    pub address_v: TextureAddressMode,
    pub address_w: TextureAddressMode,
    pub max_anisotropy: u32,
    pub max_mip_level: u32,
}

impl SamplerState {
    pub const LINEAR_WRAP: Self = Self::new(TextureFilter::Linear, TextureAddressMode::Wrap);
    pub const LINEAR_CLAMP: Self = Self::new(TextureFilter::Linear, TextureAddressMode::Clamp);
    pub const POINT_WRAP: Self = Self::new(TextureFilter::Point, TextureAddressMode::Wrap);
    pub const POINT_CLAMP: Self = Self::new(TextureFilter::Point, TextureAddressMode::Clamp);

    /// Create a sampler with the same address mode on every axis.
    pub const fn new(filter: TextureFilter, address: TextureAddressMode) -> Self {
        Self {
            filter,
            address_u: address,
            address_v: address,
            address_w: address,
            max_anisotropy: 4,
            max_mip_level: 0,
        }
    }
}

impl Default for SamplerState {
    fn default() -> Self {
        Self::LINEAR_WRAP
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blend_presets() {
        assert!(BlendState::OPAQUE.is_opaque());
        assert!(!BlendState::ALPHA_BLEND.is_opaque());
        assert_eq!(BlendState::default(), BlendState::OPAQUE);
    }

    #[test]
    fn test_blend_factor_usage() {
        let mut state = BlendState::OPAQUE;
        assert!(!state.uses_blend_factor());
        state.color_source_blend = Blend::BlendFactor;
        assert!(state.uses_blend_factor());
    }

    #[test]
    fn test_rasterizer_scissor_toggle() {
        let state = RasterizerState::CULL_NONE.with_scissor_test(true);
        assert!(state.scissor_test_enable);
        assert_ne!(state, RasterizerState::CULL_NONE);
    }

    #[test]
    fn test_depth_stencil_presets_differ() {
        assert_ne!(DepthStencilState::DEFAULT, DepthStencilState::DEPTH_READ);
        assert!(!DepthStencilState::NONE.depth_buffer_enable);
    }
}
