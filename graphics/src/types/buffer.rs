//! Buffer types and descriptors.

use bitflags::bitflags;

bitflags! {
    /// Usage flags for buffers.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BufferUsage: u32 {
        /// Buffer can be used as a vertex buffer.
        const VERTEX = 1 << 0;
        /// Buffer can be used as an index buffer.
        const INDEX = 1 << 1;
        /// Buffer contents are rewritten frequently.
        const DYNAMIC = 1 << 2;
        /// Buffer is never read back by the CPU.
        const WRITE_ONLY = 1 << 3;
    }
}

impl Default for BufferUsage {
    fn default() -> Self {
        Self::empty()
    }
}

/// Descriptor for creating a buffer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct BufferDescriptor {
    /// Debug label for the buffer.
    pub label: Option<String>,
    /// Size in bytes.
    pub size: u64,
    /// Usage flags.
    pub usage: BufferUsage,
}

impl BufferDescriptor {
    /// Create a new buffer descriptor.
    pub fn new(size: u64, usage: BufferUsage) -> Self {
        Self {
            label: None,
            size,
            usage,
        }
    }

    /// Set the debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// Size of a single index in an index buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum IndexElementSize {
    /// 16-bit indices.
    #[default]
    SixteenBits,
    /// 32-bit indices.
    ThirtyTwoBits,
}

impl IndexElementSize {
    /// Size of one index in bytes.
    pub fn bytes(&self) -> u32 {
        match self {
            Self::SixteenBits => 2,
            Self::ThirtyTwoBits => 4,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_descriptor_label() {
        let desc = BufferDescriptor::new(256, BufferUsage::VERTEX).with_label("quad");
        assert_eq!(desc.label.as_deref(), Some("quad"));
        assert_eq!(desc.size, 256);
    }

    #[test]
    fn test_index_element_size() {
        assert_eq!(IndexElementSize::SixteenBits.bytes(), 2);
        assert_eq!(IndexElementSize::ThirtyTwoBits.bytes(), 4);
    }
}
