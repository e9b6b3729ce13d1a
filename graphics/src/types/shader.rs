//! Shader stage and reflection types.
//!
//! Shader compilation happens outside this crate. What arrives here is
//! backend-ready bytecode plus the reflection data the device needs: which
//! vertex inputs the shader reads, at which locations, and which texture
//! slots it samples.

use super::vertex::VertexElementUsage;

/// Programmable pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    /// Vertex shader.
    Vertex,
    /// Pixel (fragment) shader.
    Pixel,
}

impl ShaderStage {
    /// All stages, in binding order.
    pub const ALL: [ShaderStage; 2] = [ShaderStage::Vertex, ShaderStage::Pixel];

    /// Dense index used for per-stage arrays.
    pub fn index(&self) -> usize {
        match self {
            Self::Vertex => 0,
            Self::Pixel => 1,
        }
    }
}

impl std::fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Vertex => write!(f, "vertex"),
            Self::Pixel => write!(f, "pixel"),
        }
    }
}

/// A vertex input reported by shader reflection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShaderAttribute {
    /// Semantic the input is bound to.
    pub usage: VertexElementUsage,
    /// Semantic index.
    pub usage_index: u32,
    /// Attribute location in the linked program.
    pub location: u32,
}

impl ShaderAttribute {
    /// Create a new shader attribute.
    pub fn new(usage: VertexElementUsage, usage_index: u32, location: u32) -> Self {
        Self {
            usage,
            usage_index,
            location,
        }
    }
}

/// Descriptor for creating a shader.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ShaderDescriptor {
    /// Debug label for the shader.
    pub label: Option<String>,
    /// Pipeline stage.
    pub stage: ShaderStage,
    /// Backend-ready bytecode or source.
    pub bytecode: Vec<u8>,
    /// Vertex inputs (vertex stage only).
    pub attributes: Vec<ShaderAttribute>,
    /// Texture slots sampled by the shader.
    pub samplers: Vec<u32>,
}

impl ShaderDescriptor {
    /// Create a vertex shader descriptor.
    pub fn vertex(bytecode: impl Into<Vec<u8>>) -> Self {
        Self::new(ShaderStage::Vertex, bytecode)
    }

    /// Create a pixel shader descriptor.
    pub fn pixel(bytecode: impl Into<Vec<u8>>) -> Self {
        Self::new(ShaderStage::Pixel, bytecode)
    }

    fn new(stage: ShaderStage, bytecode: impl Into<Vec<u8>>) -> Self {
        Self {
            label: None,
            stage,
            bytecode: bytecode.into(),
            attributes: Vec::new(),
            samplers: Vec::new(),
        }
    }

    /// Set the debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Add a reflected vertex input.
    pub fn with_attribute(mut self, attribute: ShaderAttribute) -> Self {
        self.attributes.push(attribute);
        self
    }

    /// Add a reflected sampler slot.
    pub fn with_sampler(mut self, slot: u32) -> Self {
        self.samplers.push(slot);
        self
    }
}

/// Kind of GPU query object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum QueryKind {
    /// Counts samples passing the depth test.
    #[default]
    Occlusion,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_indices_are_dense() {
        for (i, stage) in ShaderStage::ALL.iter().enumerate() {
            assert_eq!(stage.index(), i);
        }
    }

    #[test]
    fn test_descriptor_builder() {
        let desc = ShaderDescriptor::vertex(b"vs".to_vec())
            .with_label("sprite_vs")
            .with_attribute(ShaderAttribute::new(VertexElementUsage::Position, 0, 0))
            .with_sampler(0);
        assert_eq!(desc.stage, ShaderStage::Vertex);
        assert_eq!(desc.attributes.len(), 1);
        assert_eq!(desc.samplers, vec![0]);
    }
}
