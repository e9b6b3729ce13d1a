//! Linked program cache.
//!
//! Native programs are linked on first use of a (vertex, pixel) shader pair
//! and kept until either shader is retired or the device is reset.

use std::collections::HashMap;

use crate::backend::{BackendAdapter, ResourceHandle};
use crate::error::GraphicsError;
use crate::resources::{ResourceId, Shader};

use super::disposal::destroy_quietly;

/// Shader pair to linked program map.
#[derive(Debug, Default)]
pub struct ProgramCache {
    programs: HashMap<(ResourceId, ResourceId), ResourceHandle>,
}

impl ProgramCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Program for the pair, linking it on a miss.
    pub fn get_or_link(
        &mut self,
        backend: &mut dyn BackendAdapter,
        vertex: &Shader,
        pixel: &Shader,
    ) -> Result<ResourceHandle, GraphicsError> {
        let key = (vertex.id(), pixel.id());
        if let Some(&program) = self.programs.get(&key) {
            return Ok(program);
        }
        let program = backend.create_program(vertex.handle(), pixel.handle())?;
        log::debug!(
            "ProgramCache: linked {program} for shaders {} + {}",
            vertex.id(),
            pixel.id()
        );
        self.programs.insert(key, program);
        Ok(program)
    }

    /// Destroy every program linked with the shader. Returns the destroyed handles.
    pub fn invalidate_for_shader(
        &mut self,
        backend: &mut dyn BackendAdapter,
        shader: ResourceId,
        query_liveness: bool,
    ) -> Vec<ResourceHandle> {
        let mut removed = Vec::new();
        self.programs.retain(|&(vs, ps), &mut program| {
            if vs == shader || ps == shader {
                removed.push(program);
                false
            } else {
                true
            }
        });
        for &program in &removed {
            destroy_quietly(backend, program, query_liveness);
        }
        removed
    }

    /// Destroy every cached program.
    pub fn clear(&mut self, backend: &mut dyn BackendAdapter, query_liveness: bool) {
        for (_, program) in self.programs.drain() {
            destroy_quietly(backend, program, query_liveness);
        }
    }

    /// Number of linked programs.
    pub fn len(&self) -> usize {
        self.programs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.programs.is_empty()
    }
}
