//! Texture and render target types and descriptors.

/// Texture format enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[non_exhaustive]
pub enum TextureFormat {
    // 8-bit formats
    /// 8-bit red channel, unsigned normalized.
    R8Unorm,

    // 16-bit formats
    /// 16-bit red channel, float.
    R16Float,
    /// 8-bit RG channels, unsigned normalized.
    Rg8Unorm,
    /// 5-6-5 packed RGB.
    Bgr565Unorm,

    // 32-bit formats
    /// 32-bit red channel, float.
    R32Float,
    /// 16-bit RG channels, float.
    Rg16Float,
    /// 8-bit RGBA channels, unsigned normalized.
    #[default]
    Rgba8Unorm,
    /// 8-bit RGBA channels, sRGB.
    Rgba8UnormSrgb,
    /// 8-bit BGRA channels, unsigned normalized.
    Bgra8Unorm,
    /// 10-10-10-2 packed RGBA.
    Rgb10a2Unorm,

    // 64-bit formats
    /// 16-bit RGBA channels, float.
    Rgba16Float,
    /// 32-bit RG channels, float.
    Rg32Float,

    // 128-bit formats
    /// 32-bit RGBA channels, float.
    Rgba32Float,
}

impl TextureFormat {
    /// Returns the size in bytes per pixel.
    pub fn block_size(&self) -> u32 {
        match self {
            Self::R8Unorm => 1,
            Self::R16Float | Self::Rg8Unorm | Self::Bgr565Unorm => 2,
            Self::R32Float
            | Self::Rg16Float
            | Self::Rgba8Unorm
            | Self::Rgba8UnormSrgb
            | Self::Bgra8Unorm
            | Self::Rgb10a2Unorm => 4,
            Self::Rgba16Float | Self::Rg32Float => 8,
            Self::Rgba32Float => 16,
        }
    }
}

/// Format of the depth/stencil buffer that accompanies a render target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DepthFormat {
    /// No depth/stencil buffer.
    #[default]
    None,
    /// 16-bit depth.
    Depth16,
    /// 24-bit depth.
    Depth24,
    /// 24-bit depth with 8-bit stencil.
    Depth24Stencil8,
}

impl DepthFormat {
    /// Returns true if this format has a stencil component.
    pub fn has_stencil(&self) -> bool {
        matches!(self, Self::Depth24Stencil8)
    }
}

/// Shape of a texture resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextureDimension {
    /// A single 2D image.
    #[default]
    D2,
    /// Six 2D faces; array slices address the faces.
    Cube,
    /// An array of 2D layers.
    D2Array,
}

/// Descriptor for creating a texture.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TextureDescriptor {
    /// Debug label for the texture.
    pub label: Option<String>,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Number of array layers (6 for cube maps).
    pub array_layers: u32,
    /// Mip level count.
    pub mip_level_count: u32,
    /// Texture format.
    pub format: TextureFormat,
    /// Texture shape.
    pub dimension: TextureDimension,
}

impl TextureDescriptor {
    /// Create a new 2D texture descriptor.
    pub fn new_2d(width: u32, height: u32, format: TextureFormat) -> Self {
        Self {
            label: None,
            width,
            height,
            array_layers: 1,
            mip_level_count: 1,
            format,
            dimension: TextureDimension::D2,
        }
    }

    /// Create a cube map descriptor with square faces of `size` pixels.
    pub fn new_cube(size: u32, format: TextureFormat) -> Self {
        Self {
            array_layers: 6,
            dimension: TextureDimension::Cube,
            ..Self::new_2d(size, size, format)
        }
    }

    /// Set the debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Set the mip level count.
    pub fn with_mip_levels(mut self, count: u32) -> Self {
        self.mip_level_count = count;
        self
    }

    /// Turn this descriptor into a 2D array with `layers` layers.
    pub fn with_array_layers(mut self, layers: u32) -> Self {
        self.array_layers = layers;
        self.dimension = TextureDimension::D2Array;
        self
    }
}

impl Default for TextureDescriptor {
    fn default() -> Self {
        Self::new_2d(1, 1, TextureFormat::default())
    }
}

/// Storage format of a renderbuffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenderbufferFormat {
    /// Multisampled color storage.
    Color(TextureFormat),
    /// Depth/stencil storage.
    DepthStencil(DepthFormat),
}

/// Descriptor for creating a renderbuffer (non-sampleable attachment storage).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RenderbufferDescriptor {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Storage format.
    pub format: RenderbufferFormat,
    /// Sample count (1 = single sampled).
    pub sample_count: u32,
}

/// What happens to a render target's contents when it is bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RenderTargetUsage {
    /// Contents are cleared to [`Color::DISCARD`] on bind.
    ///
    /// [`Color::DISCARD`]: crate::types::Color::DISCARD
    #[default]
    DiscardContents,
    /// Contents survive being unbound and rebound.
    PreserveContents,
}

/// Descriptor for creating a render target.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RenderTargetDescriptor {
    /// Debug label for the render target.
    pub label: Option<String>,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Number of array layers (6 for cube targets).
    pub array_layers: u32,
    /// Mip level count of the sampleable texture.
    pub mip_level_count: u32,
    /// Color format.
    pub format: TextureFormat,
    /// Companion depth/stencil format.
    pub depth_format: DepthFormat,
    /// Requested sample count. Clamped to the device capabilities.
    pub sample_count: u32,
    /// Behaviour on bind.
    pub usage: RenderTargetUsage,
    /// Target shape.
    pub dimension: TextureDimension,
}

impl RenderTargetDescriptor {
    /// Create a new 2D render target descriptor.
    pub fn new_2d(width: u32, height: u32, format: TextureFormat) -> Self {
        Self {
            label: None,
            width,
            height,
            array_layers: 1,
            mip_level_count: 1,
            format,
            depth_format: DepthFormat::None,
            sample_count: 1,
            usage: RenderTargetUsage::DiscardContents,
            dimension: TextureDimension::D2,
        }
    }

    /// Create a cube render target descriptor.
    pub fn new_cube(size: u32, format: TextureFormat) -> Self {
        Self {
            array_layers: 6,
            dimension: TextureDimension::Cube,
            ..Self::new_2d(size, size, format)
        }
    }

    /// Set the debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Set the companion depth/stencil format.
    pub fn with_depth_format(mut self, depth_format: DepthFormat) -> Self {
        self.depth_format = depth_format;
        self
    }

    /// Set the requested sample count.
    pub fn with_sample_count(mut self, count: u32) -> Self {
        self.sample_count = count;
        self
    }

    /// Set the mip level count.
    pub fn with_mip_levels(mut self, count: u32) -> Self {
        self.mip_level_count = count;
        self
    }

    /// Set the bind behaviour.
    pub fn with_usage(mut self, usage: RenderTargetUsage) -> Self {
        self.usage = usage;
        self
    }

    /// Turn this descriptor into a 2D array target with `layers` layers.
    pub fn with_array_layers(mut self, layers: u32) -> Self {
        self.array_layers = layers;
        self.dimension = TextureDimension::D2Array;
        self
    }

    /// Descriptor of the sampleable texture backing this target.
    pub fn texture_descriptor(&self) -> TextureDescriptor {
        TextureDescriptor {
            label: self.label.clone(),
            width: self.width,
            height: self.height,
            array_layers: self.array_layers,
            mip_level_count: self.mip_level_count,
            format: self.format,
            dimension: self.dimension,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cube_descriptor_has_six_layers() {
        let desc = TextureDescriptor::new_cube(128, TextureFormat::Rgba16Float);
        assert_eq!(desc.array_layers, 6);
        assert_eq!(desc.dimension, TextureDimension::Cube);
        assert_eq!(desc.width, desc.height);
    }

    #[test]
    fn test_render_target_texture_descriptor() {
        let desc = RenderTargetDescriptor::new_2d(640, 480, TextureFormat::Rgba8Unorm)
            .with_label("scene")
            .with_mip_levels(4)
            .with_depth_format(DepthFormat::Depth24Stencil8);
        let texture = desc.texture_descriptor();
        assert_eq!(texture.width, 640);
        assert_eq!(texture.mip_level_count, 4);
        assert_eq!(texture.label.as_deref(), Some("scene"));
    }

    #[test]
    fn test_depth_format_stencil() {
        assert!(DepthFormat::Depth24Stencil8.has_stencil());
        assert!(!DepthFormat::Depth24.has_stencil());
    }
}
