//! Render target bindings and the framebuffer cache.
//!
//! Every distinct ordered combination of bound render targets gets exactly one
//! native framebuffer, created on first bind and reused afterwards. Keys are
//! positional: `[A, B]` and `[B, A]` are different sets and get different
//! framebuffers.
//!
//! A parallel cache holds the single-sampled "resolve" framebuffers that MSAA
//! sets are blitted into when they are unbound.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::sync::Arc;

use crate::backend::{BackendAdapter, ColorAttachment, FramebufferStatus, ResourceHandle};
use crate::capabilities::{Capabilities, MAX_RENDER_TARGETS};
use crate::config::IncompleteFramebufferPolicy;
use crate::error::GraphicsError;
use crate::resources::{RenderTarget, ResourceId};
use crate::types::DepthFormat;

use super::disposal::destroy_quietly;

/// A render target bound at one color attachment index.
#[derive(Debug, Clone)]
pub struct RenderTargetBinding {
    target: Arc<RenderTarget>,
    array_slice: u32,
}

impl RenderTargetBinding {
    /// Bind the first slice of a target.
    pub fn new(target: Arc<RenderTarget>) -> Self {
        Self::with_array_slice(target, 0)
    }

    /// Bind one array layer or cube face of a target.
    pub fn with_array_slice(target: Arc<RenderTarget>, array_slice: u32) -> Self {
        Self {
            target,
            array_slice,
        }
    }

    /// Bound target.
    pub fn target(&self) -> &Arc<RenderTarget> {
        &self.target
    }

    /// Bound array layer or cube face.
    pub fn array_slice(&self) -> u32 {
        self.array_slice
    }

    /// Cache key component for this binding.
    pub fn key(&self) -> TargetSlice {
        TargetSlice {
            target: self.target.id(),
            array_slice: self.array_slice,
        }
    }
}

impl PartialEq for RenderTargetBinding {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for RenderTargetBinding {}

impl From<Arc<RenderTarget>> for RenderTargetBinding {
    fn from(target: Arc<RenderTarget>) -> Self {
        Self::new(target)
    }
}

impl From<&Arc<RenderTarget>> for RenderTargetBinding {
    fn from(target: &Arc<RenderTarget>) -> Self {
        Self::new(Arc::clone(target))
    }
}

/// Identity of one binding inside a [`RenderTargetSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TargetSlice {
    pub target: ResourceId,
    pub array_slice: u32,
}

impl TargetSlice {
    const EMPTY: Self = Self {
        target: ResourceId::INVALID,
        array_slice: 0,
    };
}

/// Owned, immutable snapshot of an ordered set of bindings.
///
/// Lookups borrow it as `[TargetSlice]`, so probing the cache never allocates;
/// only inserting a new set boxes the key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RenderTargetSet(Box<[TargetSlice]>);

impl RenderTargetSet {
    /// Snapshot the given bindings.
    pub fn from_bindings(bindings: &[RenderTargetBinding]) -> Self {
        Self(bindings.iter().map(RenderTargetBinding::key).collect())
    }

    /// Bindings in attachment order.
    pub fn slices(&self) -> &[TargetSlice] {
        &self.0
    }

    /// Whether any binding refers to `target`.
    pub fn references(&self, target: ResourceId) -> bool {
        self.0.iter().any(|slice| slice.target == target)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Borrow<[TargetSlice]> for RenderTargetSet {
    fn borrow(&self) -> &[TargetSlice] {
        &self.0
    }
}

/// Writes the key of `bindings` into `scratch` and returns the used prefix,
/// or `None` when the set has more bindings than a framebuffer can hold.
fn lookup_key<'a>(
    bindings: &[RenderTargetBinding],
    scratch: &'a mut [TargetSlice; MAX_RENDER_TARGETS],
) -> Option<&'a [TargetSlice]> {
    let slots = scratch.get_mut(..bindings.len())?;
    for (slot, binding) in slots.iter_mut().zip(bindings) {
        *slot = binding.key();
    }
    Some(&*slots)
}

fn oversized_set(len: usize) -> GraphicsError {
    GraphicsError::InvalidParameter(format!(
        "{len} render targets in one set, at most {MAX_RENDER_TARGETS} supported"
    ))
}

/// Check a set of bindings against the device limits.
pub fn validate_bindings(
    bindings: &[RenderTargetBinding],
    capabilities: &Capabilities,
) -> Result<(), GraphicsError> {
    let limit = capabilities.render_target_limit();
    if bindings.len() > limit {
        return Err(GraphicsError::InvalidParameter(format!(
            "{} render targets bound, device supports {limit}",
            bindings.len()
        )));
    }
    let Some(primary) = bindings.first() else {
        return Ok(());
    };
    for (index, binding) in bindings.iter().enumerate() {
        let target = binding.target();
        if binding.array_slice() >= target.array_layers() {
            return Err(GraphicsError::InvalidParameter(format!(
                "array slice {} out of range for render target {} with {} layers",
                binding.array_slice(),
                target.id(),
                target.array_layers()
            )));
        }
        if target.width() != primary.target().width()
            || target.height() != primary.target().height()
        {
            return Err(GraphicsError::InvalidParameter(format!(
                "render target {index} is {}x{}, primary target is {}x{}",
                target.width(),
                target.height(),
                primary.target().width(),
                primary.target().height()
            )));
        }
    }
    Ok(())
}

/// Counts from one resolve pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ResolveStats {
    pub blits: usize,
    pub mipmaps: usize,
}

/// RenderTargetSet to framebuffer map, plus the resolve map.
#[derive(Debug)]
pub struct FramebufferCache {
    framebuffers: HashMap<RenderTargetSet, ResourceHandle>,
    resolve_framebuffers: HashMap<RenderTargetSet, ResourceHandle>,
    policy: IncompleteFramebufferPolicy,
}

impl FramebufferCache {
    /// Create an empty cache.
    pub fn new(policy: IncompleteFramebufferPolicy) -> Self {
        Self {
            framebuffers: HashMap::new(),
            resolve_framebuffers: HashMap::new(),
            policy,
        }
    }

    /// Framebuffer for exactly this ordered set of bindings, created on a miss.
    ///
    /// Multisampled targets attach their MSAA renderbuffer; others attach the
    /// requested array slice of their texture. Depth/stencil comes from the
    /// first target.
    pub fn get_or_create_framebuffer(
        &mut self,
        backend: &mut dyn BackendAdapter,
        bindings: &[RenderTargetBinding],
    ) -> Result<ResourceHandle, GraphicsError> {
        let mut scratch = [TargetSlice::EMPTY; MAX_RENDER_TARGETS];
        let key = lookup_key(bindings, &mut scratch).ok_or_else(|| oversized_set(bindings.len()))?;
        if let Some(&framebuffer) = self.framebuffers.get(key) {
            return Ok(framebuffer);
        }

        let framebuffer = self.build(backend, bindings, |binding| {
            let target = binding.target();
            match target.msaa_handle() {
                Some(msaa) => ColorAttachment::Renderbuffer(msaa),
                None => ColorAttachment::Texture {
                    texture: target.texture_handle(),
                    level: 0,
                    layer: binding.array_slice(),
                },
            }
        }, true)?;
        log::debug!(
            "FramebufferCache: created {framebuffer} for {} target(s)",
            bindings.len()
        );
        self.framebuffers
            .insert(RenderTargetSet::from_bindings(bindings), framebuffer);
        Ok(framebuffer)
    }

    /// Single-sampled framebuffer that an MSAA set resolves into.
    pub fn get_or_create_resolve_framebuffer(
        &mut self,
        backend: &mut dyn BackendAdapter,
        bindings: &[RenderTargetBinding],
    ) -> Result<ResourceHandle, GraphicsError> {
        let mut scratch = [TargetSlice::EMPTY; MAX_RENDER_TARGETS];
        let key = lookup_key(bindings, &mut scratch).ok_or_else(|| oversized_set(bindings.len()))?;
        if let Some(&framebuffer) = self.resolve_framebuffers.get(key) {
            return Ok(framebuffer);
        }

        let framebuffer = self.build(backend, bindings, |binding| ColorAttachment::Texture {
            texture: binding.target().texture_handle(),
            level: 0,
            layer: binding.array_slice(),
        }, false)?;
        log::debug!(
            "FramebufferCache: created resolve {framebuffer} for {} target(s)",
            bindings.len()
        );
        self.resolve_framebuffers
            .insert(RenderTargetSet::from_bindings(bindings), framebuffer);
        Ok(framebuffer)
    }

    fn build(
        &self,
        backend: &mut dyn BackendAdapter,
        bindings: &[RenderTargetBinding],
        attachment: impl Fn(&RenderTargetBinding) -> ColorAttachment,
        with_depth: bool,
    ) -> Result<ResourceHandle, GraphicsError> {
        if bindings.is_empty() {
            return Err(GraphicsError::InvalidParameter(
                "framebuffer requires at least one render target".to_string(),
            ));
        }
        let framebuffer = backend.create_framebuffer()?;
        let populated = Self::populate(backend, framebuffer, bindings, attachment, with_depth);
        if let Err(err) = populated {
            destroy_quietly(backend, framebuffer, false);
            return Err(err);
        }

        match backend.framebuffer_status(framebuffer) {
            FramebufferStatus::Complete => Ok(framebuffer),
            status => match self.policy {
                IncompleteFramebufferPolicy::Fail => {
                    destroy_quietly(backend, framebuffer, false);
                    Err(GraphicsError::IncompleteFramebuffer(status))
                }
                IncompleteFramebufferPolicy::Tolerate => {
                    log::warn!("FramebufferCache: {framebuffer} is incomplete ({status}), continuing");
                    Ok(framebuffer)
                }
            },
        }
    }

    fn populate(
        backend: &mut dyn BackendAdapter,
        framebuffer: ResourceHandle,
        bindings: &[RenderTargetBinding],
        attachment: impl Fn(&RenderTargetBinding) -> ColorAttachment,
        with_depth: bool,
    ) -> Result<(), GraphicsError> {
        for (index, binding) in bindings.iter().enumerate() {
            backend.attach_color(framebuffer, index as u32, attachment(binding))?;
        }
        let primary = bindings[0].target();
        if with_depth
            && primary.depth_format() != DepthFormat::None
            && let Some(depth) = primary.depth_stencil_handle()
        {
            backend.attach_depth_stencil(framebuffer, depth, primary.depth_format())?;
        }
        Ok(())
    }

    /// Finish rendering into a set that is being unbound.
    ///
    /// Multisampled sets are blitted into their resolve framebuffer with the
    /// scissor test disabled for the blit. `scissor_test` is the state last
    /// applied on the backend; a known enabled test is restored afterwards,
    /// an unknown one is disabled and left for the state cache to re-apply.
    /// Every target with more than one mip level then gets its mip chain
    /// regenerated.
    pub fn resolve(
        &mut self,
        backend: &mut dyn BackendAdapter,
        bindings: &[RenderTargetBinding],
        capabilities: &Capabilities,
        scissor_test: Option<bool>,
    ) -> Result<ResolveStats, GraphicsError> {
        let mut stats = ResolveStats::default();
        let Some(primary) = bindings.first() else {
            return Ok(stats);
        };

        if primary.target().is_multisampled() && capabilities.supports_blit_framebuffer {
            let source = self.get_or_create_framebuffer(backend, bindings)?;
            let destination = self.get_or_create_resolve_framebuffer(backend, bindings)?;
            if scissor_test != Some(false) {
                backend.set_scissor_test_enabled(false)?;
            }
            let width = primary.target().width();
            let height = primary.target().height();
            let mut blitted = Ok(());
            for index in 0..bindings.len() {
                blitted = backend.blit_framebuffer(source, destination, index as u32, width, height);
                if blitted.is_err() {
                    break;
                }
                stats.blits += 1;
            }
            if scissor_test == Some(true) {
                backend.set_scissor_test_enabled(true)?;
            }
            blitted?;
        }

        for binding in bindings {
            if binding.target().mip_level_count() > 1 {
                backend.generate_mipmaps(binding.target().texture_handle())?;
                stats.mipmaps += 1;
            }
        }
        Ok(stats)
    }

    /// Destroy every framebuffer, regular or resolve, that references `target`.
    ///
    /// Returns the destroyed framebuffer handles.
    pub fn invalidate_for_target(
        &mut self,
        backend: &mut dyn BackendAdapter,
        target: ResourceId,
        query_liveness: bool,
    ) -> Vec<ResourceHandle> {
        let mut removed = Vec::new();
        for map in [&mut self.framebuffers, &mut self.resolve_framebuffers] {
            map.retain(|set, &mut framebuffer| {
                if set.references(target) {
                    removed.push(framebuffer);
                    false
                } else {
                    true
                }
            });
        }
        for &framebuffer in &removed {
            destroy_quietly(backend, framebuffer, query_liveness);
        }
        if !removed.is_empty() {
            log::debug!(
                "FramebufferCache: invalidated {} framebuffer(s) for target {target}",
                removed.len()
            );
        }
        removed
    }

    /// Destroy every cached framebuffer.
    pub fn clear(&mut self, backend: &mut dyn BackendAdapter, query_liveness: bool) {
        let all = self
            .framebuffers
            .drain()
            .chain(self.resolve_framebuffers.drain());
        for (_, framebuffer) in all {
            destroy_quietly(backend, framebuffer, query_liveness);
        }
    }

    /// Cached framebuffer for exactly this set, without creating one.
    pub fn lookup(&self, bindings: &[RenderTargetBinding]) -> Option<ResourceHandle> {
        let mut scratch = [TargetSlice::EMPTY; MAX_RENDER_TARGETS];
        self.framebuffers
            .get(lookup_key(bindings, &mut scratch)?)
            .copied()
    }

    /// Number of cached framebuffers.
    pub fn len(&self) -> usize {
        self.framebuffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.framebuffers.is_empty()
    }

    /// Number of cached resolve framebuffers.
    pub fn resolve_len(&self) -> usize {
        self.resolve_framebuffers.len()
    }
}
