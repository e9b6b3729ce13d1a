//! Vertex declarations and primitive topology.
//!
//! A [`VertexDeclaration`] describes the layout of one vertex buffer: its
//! stride and the elements packed into each vertex. Elements are matched to
//! shader inputs by `(usage, usage_index)`, the way shader reflection reports
//! them, so the same buffer can feed shaders with different input locations.
//!
//! Declarations are shared via `Arc` since there are typically only a few of
//! them across many buffers. Each one carries a precomputed hash key used by
//! the attribute binder's layout cache.
//!
//! # Example
//!
//! ```ignore
//! // Interleaved position + texcoord, 20 bytes per vertex.
//! let declaration = Arc::new(VertexDeclaration::new(
//!     20,
//!     vec![
//!         VertexElement::position(0),
//!         VertexElement::texcoord(12, 0),
//!     ],
//! ));
//! ```

use std::hash::{DefaultHasher, Hash, Hasher};

/// Semantic meaning of a vertex element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexElementUsage {
    /// Vertex position.
    Position,
    /// Vertex normal.
    Normal,
    /// Vertex tangent.
    Tangent,
    /// Texture coordinates; `usage_index` selects the set.
    TextureCoordinate,
    /// Vertex color.
    Color,
    /// Bone indices for skinning.
    BlendIndices,
    /// Bone weights for skinning.
    BlendWeight,
    /// Point sprite size.
    PointSize,
}

/// Format of a vertex element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexElementFormat {
    /// Single 32-bit float.
    Float,
    /// Two 32-bit floats.
    Float2,
    /// Three 32-bit floats.
    Float3,
    /// Four 32-bit floats.
    Float4,
    /// Four 8-bit unsigned integers (normalized to 0.0-1.0).
    Unorm8x4,
    /// Four 8-bit unsigned integers.
    Uint8x4,
    /// Two 16-bit signed integers.
    Sint16x2,
    /// Four 16-bit signed integers.
    Sint16x4,
    /// Two 16-bit signed integers (normalized to -1.0-1.0).
    Snorm16x2,
    /// Four 16-bit signed integers (normalized to -1.0-1.0).
    Snorm16x4,
}

impl VertexElementFormat {
    /// Get the size in bytes of this format.
    pub fn size(&self) -> u32 {
        match self {
            Self::Float => 4,
            Self::Float2 => 8,
            Self::Float3 => 12,
            Self::Float4 => 16,
            Self::Unorm8x4 | Self::Uint8x4 => 4,
            Self::Sint16x2 | Self::Snorm16x2 => 4,
            Self::Sint16x4 | Self::Snorm16x4 => 8,
        }
    }

    /// Number of components read by the shader.
    pub fn component_count(&self) -> u32 {
        match self {
            Self::Float => 1,
            Self::Float2 | Self::Sint16x2 | Self::Snorm16x2 => 2,
            Self::Float3 => 3,
            Self::Float4
            | Self::Unorm8x4
            | Self::Uint8x4
            | Self::Sint16x4
            | Self::Snorm16x4 => 4,
        }
    }

    /// Whether integer components are normalized into floating point.
    pub fn is_normalized(&self) -> bool {
        matches!(self, Self::Unorm8x4 | Self::Snorm16x2 | Self::Snorm16x4)
    }
}

/// A single element of a vertex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexElement {
    /// Byte offset within the vertex.
    pub offset: u32,
    /// Data format.
    pub format: VertexElementFormat,
    /// Semantic meaning.
    pub usage: VertexElementUsage,
    /// Disambiguates multiple elements with the same usage.
    pub usage_index: u32,
}

impl VertexElement {
    /// Create a new vertex element.
    pub fn new(
        offset: u32,
        format: VertexElementFormat,
        usage: VertexElementUsage,
        usage_index: u32,
    ) -> Self {
        Self {
            offset,
            format,
            usage,
            usage_index,
        }
    }

    /// Create a position element (float3).
    pub fn position(offset: u32) -> Self {
        Self::new(offset, VertexElementFormat::Float3, VertexElementUsage::Position, 0)
    }

    /// Create a normal element (float3).
    pub fn normal(offset: u32) -> Self {
        Self::new(offset, VertexElementFormat::Float3, VertexElementUsage::Normal, 0)
    }

    /// Create a texture coordinate element (float2) for the given set.
    pub fn texcoord(offset: u32, set: u32) -> Self {
        Self::new(
            offset,
            VertexElementFormat::Float2,
            VertexElementUsage::TextureCoordinate,
            set,
        )
    }

    /// Create a packed color element (unorm8x4).
    pub fn color(offset: u32) -> Self {
        Self::new(offset, VertexElementFormat::Unorm8x4, VertexElementUsage::Color, 0)
    }

    /// Byte offset one past the end of this element.
    pub fn end(&self) -> u32 {
        self.offset + self.format.size()
    }
}

/// Layout of the vertices in one vertex buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexDeclaration {
    stride: u32,
    elements: Vec<VertexElement>,
    hash_key: u64,
}

impl Hash for VertexDeclaration {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash_key);
    }
}

impl VertexDeclaration {
    /// Create a declaration with an explicit stride.
    pub fn new(stride: u32, elements: Vec<VertexElement>) -> Self {
        let mut hasher = DefaultHasher::new();
        stride.hash(&mut hasher);
        elements.hash(&mut hasher);
        Self {
            stride,
            elements,
            hash_key: hasher.finish(),
        }
    }

    /// Create a tightly packed declaration; the stride is the end of the last element.
    pub fn from_elements(elements: Vec<VertexElement>) -> Self {
        let stride = elements.iter().map(VertexElement::end).max().unwrap_or(0);
        Self::new(stride, elements)
    }

    /// Bytes between consecutive vertices.
    pub fn stride(&self) -> u32 {
        self.stride
    }

    /// Elements of a single vertex.
    pub fn elements(&self) -> &[VertexElement] {
        &self.elements
    }

    /// Precomputed hash of stride and elements.
    pub fn hash_key(&self) -> u64 {
        self.hash_key
    }

    #[cfg(test)]
    pub(crate) fn with_hash_key(mut self, hash_key: u64) -> Self {
        self.hash_key = hash_key;
        self
    }

    /// Find the element feeding a shader input.
    pub fn find(&self, usage: VertexElementUsage, usage_index: u32) -> Option<&VertexElement> {
        self.elements
            .iter()
            .find(|e| e.usage == usage && e.usage_index == usage_index)
    }
}

/// Primitive topology of a draw call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PrimitiveType {
    #[default]
    TriangleList,
    TriangleStrip,
    LineList,
    LineStrip,
    PointList,
}

impl PrimitiveType {
    /// Number of vertices (or indices) consumed by `primitive_count` primitives.
    pub fn vertex_count(&self, primitive_count: u32) -> u32 {
        match self {
            Self::TriangleList => primitive_count * 3,
            Self::TriangleStrip => primitive_count + 2,
            Self::LineList => primitive_count * 2,
            Self::LineStrip => primitive_count + 1,
            Self::PointList => primitive_count,
        }
    }
}
