//! Shader resource.

use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::Arc;

use crate::backend::ResourceHandle;
use crate::device::DisposalQueue;
use crate::types::{ShaderAttribute, ShaderDescriptor, ShaderStage, VertexElementUsage};

use super::{DisposalGuard, ResourceId};

/// A compiled vertex or pixel shader.
///
/// Programs linking a vertex and pixel shader pair are owned by the device's
/// program cache, not by the shaders.
pub struct Shader {
    id: ResourceId,
    handle: ResourceHandle,
    stage: ShaderStage,
    label: Option<String>,
    attributes: Vec<ShaderAttribute>,
    samplers: Vec<u32>,
    hash_key: u64,
    _guard: DisposalGuard,
}

impl Shader {
    /// Create a new shader (called by GraphicsDevice).
    pub(crate) fn new(
        handle: ResourceHandle,
        descriptor: &ShaderDescriptor,
        queue: Arc<DisposalQueue>,
    ) -> Self {
        let id = ResourceId::next();
        let mut hasher = DefaultHasher::new();
        descriptor.stage.hash(&mut hasher);
        descriptor.bytecode.hash(&mut hasher);
        descriptor.attributes.hash(&mut hasher);
        Self {
            id,
            handle,
            stage: descriptor.stage,
            label: descriptor.label.clone(),
            attributes: descriptor.attributes.clone(),
            samplers: descriptor.samplers.clone(),
            hash_key: hasher.finish(),
            _guard: DisposalGuard::new(id, vec![handle], queue),
        }
    }

    /// Unique identity of this shader.
    pub fn id(&self) -> ResourceId {
        self.id
    }

    /// Native shader handle.
    pub fn handle(&self) -> ResourceHandle {
        self.handle
    }

    /// Pipeline stage.
    pub fn stage(&self) -> ShaderStage {
        self.stage
    }

    /// Reflected vertex inputs.
    pub fn attributes(&self) -> &[ShaderAttribute] {
        &self.attributes
    }

    /// Location of the input bound to a semantic, if the shader reads it.
    pub fn attribute_location(&self, usage: VertexElementUsage, usage_index: u32) -> Option<u32> {
        self.attributes
            .iter()
            .find(|a| a.usage == usage && a.usage_index == usage_index)
            .map(|a| a.location)
    }

    /// Reflected sampler slots.
    pub fn samplers(&self) -> &[u32] {
        &self.samplers
    }

    /// Hash of stage, bytecode and inputs.
    pub fn hash_key(&self) -> u64 {
        self.hash_key
    }

    /// Get the shader label, if set.
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }
}

impl std::fmt::Debug for Shader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Shader")
            .field("id", &self.id)
            .field("stage", &self.stage)
            .field("attributes", &self.attributes.len())
            .field("label", &self.label)
            .finish()
    }
}

static_assertions::assert_impl_all!(Shader: Send, Sync);
