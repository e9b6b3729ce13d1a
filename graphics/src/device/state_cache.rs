//! Dirty-flag driven pipeline state cache.
//!
//! The cache holds two copies of every piece of pipeline state: the value the
//! client asked for ("desired") and the value last sent to the backend
//! ("applied"). Setters only record the desired value and mark its category
//! dirty. [`StateCache::apply_dirty_state`] walks the dirty categories in a
//! fixed order and issues a native call only where desired and applied differ.
//!
//! Applied values are updated only after the native call succeeded, and are
//! forgotten (set to unknown) whenever the backend state may have changed
//! behind the cache's back: device reset, context loss, or destruction of a
//! handle that was bound.

use crate::backend::{BackendAdapter, BackendError, IndexBinding, ResourceHandle, VertexStream};
use crate::capabilities::{MAX_TEXTURE_SLOTS, MAX_VERTEX_BUFFERS};
use crate::error::GraphicsError;
use crate::resources::{ResourceId, TextureRef};
use crate::types::{
    BlendState, Color, DepthStencilState, RasterizerState, SamplerState, ScissorRect,
    ShaderStage, Viewport,
};

bitflags::bitflags! {
    /// Categories of pipeline state tracked by the cache.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct StateCategories: u32 {
        const FRAMEBUFFER = 1 << 0;
        const VIEWPORT = 1 << 1;
        const RASTERIZER = 1 << 2;
        const SCISSOR = 1 << 3;
        /// Blend state and blend factor.
        const BLEND = 1 << 4;
        const DEPTH_STENCIL = 1 << 5;
        const CLEAR_COLOR = 1 << 6;
        const CLEAR_DEPTH = 1 << 7;
        const CLEAR_STENCIL = 1 << 8;
        const INDEX_BUFFER = 1 << 9;
        const VERTEX_BUFFERS = 1 << 10;
        /// Linked program of the bound vertex/pixel shader pair.
        const SHADERS = 1 << 11;
        const TEXTURES = 1 << 12;
        const SAMPLERS = 1 << 13;

        /// Categories applied for clears as well as draws.
        const NON_DRAW = Self::FRAMEBUFFER.bits()
            | Self::VIEWPORT.bits()
            | Self::RASTERIZER.bits()
            | Self::SCISSOR.bits()
            | Self::BLEND.bits()
            | Self::DEPTH_STENCIL.bits()
            | Self::CLEAR_COLOR.bits()
            | Self::CLEAR_DEPTH.bits()
            | Self::CLEAR_STENCIL.bits();
        /// Categories only draws need.
        const DRAW_ONLY = Self::INDEX_BUFFER.bits()
            | Self::VERTEX_BUFFERS.bits()
            | Self::SHADERS.bits()
            | Self::TEXTURES.bits()
            | Self::SAMPLERS.bits();
    }
}

/// Counts from one [`StateCache::apply_dirty_state`] call.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ApplyStats {
    /// Native calls issued.
    pub native_calls: usize,
    /// Categories that were dirty and have been cleaned.
    pub cleaned: StateCategories,
}

/// Equality that decides whether a value has to be sent again.
///
/// Floating-point state compares bit patterns, so a NaN blend factor or clear
/// value matches itself and is not re-sent on every apply.
trait SameValue {
    fn same_value(&self, other: &Self) -> bool;
}

macro_rules! same_value_by_eq {
    ($($ty:ty),* $(,)?) => {
        $(impl SameValue for $ty {
            fn same_value(&self, other: &Self) -> bool {
                self == other
            }
        })*
    };
}

same_value_by_eq!(
    i32,
    Option<ResourceHandle>,
    Option<IndexBinding>,
    [Option<VertexStream>; MAX_VERTEX_BUFFERS],
    Viewport,
    RasterizerState,
    ScissorRect,
    BlendState,
    DepthStencilState,
);

impl SameValue for f32 {
    fn same_value(&self, other: &Self) -> bool {
        self.to_bits() == other.to_bits()
    }
}

impl SameValue for Color {
    fn same_value(&self, other: &Self) -> bool {
        self.r.same_value(&other.r)
            && self.g.same_value(&other.g)
            && self.b.same_value(&other.b)
            && self.a.same_value(&other.a)
    }
}

#[derive(Debug, Clone)]
struct Tracked<T> {
    desired: T,
    applied: Option<T>,
}

impl<T: Clone + SameValue> Tracked<T> {
    fn new(desired: T) -> Self {
        Self {
            desired,
            applied: None,
        }
    }

    fn needs_apply(&self) -> bool {
        !self
            .applied
            .as_ref()
            .is_some_and(|applied| applied.same_value(&self.desired))
    }

    fn commit(&mut self) {
        self.applied = Some(self.desired.clone());
    }

    fn forget(&mut self) {
        self.applied = None;
    }
}

/// Texture and sampler slots of one shader stage.
#[derive(Debug)]
struct StageSlots {
    textures: Vec<Option<TextureRef>>,
    applied_textures: [Option<Option<ResourceHandle>>; MAX_TEXTURE_SLOTS],
    dirty_textures: u32,
    samplers: [SamplerState; MAX_TEXTURE_SLOTS],
    applied_samplers: [Option<SamplerState>; MAX_TEXTURE_SLOTS],
    dirty_samplers: u32,
}

impl StageSlots {
    fn new() -> Self {
        Self {
            textures: vec![None; MAX_TEXTURE_SLOTS],
            applied_textures: [None; MAX_TEXTURE_SLOTS],
            dirty_textures: 0,
            samplers: [SamplerState::default(); MAX_TEXTURE_SLOTS],
            applied_samplers: [None; MAX_TEXTURE_SLOTS],
            dirty_samplers: 0,
        }
    }

    fn forget(&mut self) {
        self.applied_textures = [None; MAX_TEXTURE_SLOTS];
        self.applied_samplers = [None; MAX_TEXTURE_SLOTS];
        self.dirty_textures = u32::MAX;
        self.dirty_samplers = u32::MAX;
    }
}

/// Desired and last-applied pipeline state of one rendering context.
#[derive(Debug)]
pub struct StateCache {
    dirty: StateCategories,
    framebuffer: Tracked<Option<ResourceHandle>>,
    viewport: Tracked<Viewport>,
    rasterizer: Tracked<RasterizerState>,
    scissor: Tracked<ScissorRect>,
    blend: Tracked<BlendState>,
    blend_factor: Tracked<Color>,
    depth_stencil: Tracked<DepthStencilState>,
    clear_color: Tracked<Color>,
    clear_depth: Tracked<f32>,
    clear_stencil: Tracked<i32>,
    index_buffer: Tracked<Option<IndexBinding>>,
    vertex_streams: Tracked<[Option<VertexStream>; MAX_VERTEX_BUFFERS]>,
    shaders: [Option<ResourceId>; 2],
    program: Tracked<Option<ResourceHandle>>,
    stages: [StageSlots; 2],
    texture_slot_limit: usize,
}

impl StateCache {
    /// Create a cache with every category dirty and nothing known to be applied.
    pub fn new(texture_slot_limit: usize) -> Self {
        let mut cache = Self {
            dirty: StateCategories::all(),
            framebuffer: Tracked::new(None),
            viewport: Tracked::new(Viewport::default()),
            rasterizer: Tracked::new(RasterizerState::default()),
            scissor: Tracked::new(ScissorRect::default()),
            blend: Tracked::new(BlendState::default()),
            blend_factor: Tracked::new(Color::WHITE),
            depth_stencil: Tracked::new(DepthStencilState::default()),
            clear_color: Tracked::new(Color::TRANSPARENT_BLACK),
            clear_depth: Tracked::new(1.0),
            clear_stencil: Tracked::new(0),
            index_buffer: Tracked::new(None),
            vertex_streams: Tracked::new([None; MAX_VERTEX_BUFFERS]),
            shaders: [None; 2],
            program: Tracked::new(None),
            stages: [StageSlots::new(), StageSlots::new()],
            texture_slot_limit: texture_slot_limit.min(MAX_TEXTURE_SLOTS),
        };
        cache.invalidate_applied();
        cache
    }

    // ------------------------------------------------------------------
    // Dirty tracking
    // ------------------------------------------------------------------

    /// Mark categories for re-examination on the next apply.
    pub fn mark_dirty(&mut self, categories: StateCategories) {
        self.dirty |= categories;
    }

    /// Whether any of `categories` is dirty.
    pub fn is_dirty(&self, categories: StateCategories) -> bool {
        self.dirty.intersects(categories)
    }

    /// Currently dirty categories.
    pub fn dirty(&self) -> StateCategories {
        self.dirty
    }

    /// Forget everything known about backend state and mark all categories dirty.
    ///
    /// The next apply re-sends every category it covers.
    pub fn invalidate_applied(&mut self) {
        self.framebuffer.forget();
        self.viewport.forget();
        self.rasterizer.forget();
        self.scissor.forget();
        self.blend.forget();
        self.blend_factor.forget();
        self.depth_stencil.forget();
        self.clear_color.forget();
        self.clear_depth.forget();
        self.clear_stencil.forget();
        self.index_buffer.forget();
        self.vertex_streams.forget();
        self.program.forget();
        for stage in &mut self.stages {
            stage.forget();
        }
        self.dirty = StateCategories::all();
    }

    /// Forget any applied binding of a handle that is about to stop existing.
    ///
    /// Backends may recycle native names, so a stale applied value could
    /// otherwise suppress binding a new object that received the same name.
    pub fn forget_handle(&mut self, handle: ResourceHandle) {
        if self.framebuffer.applied == Some(Some(handle)) {
            self.framebuffer.forget();
            self.dirty |= StateCategories::FRAMEBUFFER;
        }
        if self.program.applied == Some(Some(handle)) {
            self.program.forget();
            self.dirty |= StateCategories::SHADERS;
        }
        if matches!(self.index_buffer.applied, Some(Some(binding)) if binding.buffer == handle) {
            self.index_buffer.forget();
            self.dirty |= StateCategories::INDEX_BUFFER;
        }
        if let Some(streams) = &self.vertex_streams.applied
            && streams.iter().flatten().any(|s| s.buffer == handle)
        {
            self.vertex_streams.forget();
            self.dirty |= StateCategories::VERTEX_BUFFERS;
        }
        for stage in &mut self.stages {
            for (slot, applied) in stage.applied_textures.iter_mut().enumerate() {
                if *applied == Some(Some(handle)) {
                    *applied = None;
                    stage.dirty_textures |= 1 << slot;
                    self.dirty |= StateCategories::TEXTURES;
                }
            }
        }
    }

    /// Forget the applied framebuffer binding after a call that changed it.
    pub fn forget_framebuffer(&mut self) {
        self.framebuffer.forget();
        self.dirty |= StateCategories::FRAMEBUFFER;
    }

    // ------------------------------------------------------------------
    // Setters
    // ------------------------------------------------------------------

    /// Framebuffer to render into; `None` is the back buffer.
    pub fn set_framebuffer(&mut self, framebuffer: Option<ResourceHandle>) {
        self.framebuffer.desired = framebuffer;
        self.dirty |= StateCategories::FRAMEBUFFER;
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport.desired = viewport;
        self.dirty |= StateCategories::VIEWPORT;
    }

    pub fn set_rasterizer_state(&mut self, state: RasterizerState) {
        self.rasterizer.desired = state;
        self.dirty |= StateCategories::RASTERIZER;
    }

    pub fn set_scissor_rect(&mut self, rect: ScissorRect) {
        self.scissor.desired = rect;
        self.dirty |= StateCategories::SCISSOR;
    }

    pub fn set_blend_state(&mut self, state: BlendState) {
        self.blend.desired = state;
        self.dirty |= StateCategories::BLEND;
    }

    pub fn set_blend_factor(&mut self, factor: Color) {
        self.blend_factor.desired = factor;
        self.dirty |= StateCategories::BLEND;
    }

    pub fn set_depth_stencil_state(&mut self, state: DepthStencilState) {
        self.depth_stencil.desired = state;
        self.dirty |= StateCategories::DEPTH_STENCIL;
    }

    pub fn set_clear_color(&mut self, color: Color) {
        self.clear_color.desired = color;
        self.dirty |= StateCategories::CLEAR_COLOR;
    }

    pub fn set_clear_depth(&mut self, depth: f32) {
        self.clear_depth.desired = depth;
        self.dirty |= StateCategories::CLEAR_DEPTH;
    }

    pub fn set_clear_stencil(&mut self, stencil: i32) {
        self.clear_stencil.desired = stencil;
        self.dirty |= StateCategories::CLEAR_STENCIL;
    }

    pub fn set_index_buffer(&mut self, binding: Option<IndexBinding>) {
        self.index_buffer.desired = binding;
        self.dirty |= StateCategories::INDEX_BUFFER;
    }

    /// Replace all vertex streams; slots past `streams` are unbound.
    pub fn set_vertex_streams(&mut self, streams: &[Option<VertexStream>]) {
        let desired = &mut self.vertex_streams.desired;
        *desired = [None; MAX_VERTEX_BUFFERS];
        for (slot, stream) in desired.iter_mut().zip(streams) {
            *slot = *stream;
        }
        self.dirty |= StateCategories::VERTEX_BUFFERS;
    }

    /// Record which shader is bound to a stage.
    pub fn set_shader(&mut self, stage: ShaderStage, shader: Option<ResourceId>) {
        self.shaders[stage.index()] = shader;
        self.dirty |= StateCategories::SHADERS;
    }

    /// Linked program for the bound shader pair.
    pub fn set_program(&mut self, program: Option<ResourceHandle>) {
        self.program.desired = program;
        self.dirty |= StateCategories::SHADERS;
    }

    /// Bind a texture to a slot of a stage.
    pub fn set_texture(
        &mut self,
        stage: ShaderStage,
        slot: usize,
        texture: Option<TextureRef>,
    ) -> Result<(), GraphicsError> {
        self.check_slot(slot)?;
        let slots = &mut self.stages[stage.index()];
        slots.textures[slot] = texture;
        slots.dirty_textures |= 1 << slot;
        self.dirty |= StateCategories::TEXTURES;
        Ok(())
    }

    /// Set the sampler state of a slot of a stage.
    pub fn set_sampler(
        &mut self,
        stage: ShaderStage,
        slot: usize,
        state: SamplerState,
    ) -> Result<(), GraphicsError> {
        self.check_slot(slot)?;
        let slots = &mut self.stages[stage.index()];
        slots.samplers[slot] = state;
        slots.dirty_samplers |= 1 << slot;
        self.dirty |= StateCategories::SAMPLERS;
        Ok(())
    }

    fn check_slot(&self, slot: usize) -> Result<(), GraphicsError> {
        if slot >= self.texture_slot_limit {
            return Err(GraphicsError::InvalidParameter(format!(
                "texture slot {slot} out of range (limit {})",
                self.texture_slot_limit
            )));
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Getters
    // ------------------------------------------------------------------

    pub fn framebuffer(&self) -> Option<ResourceHandle> {
        self.framebuffer.desired
    }

    /// Framebuffer last bound on the backend, if known.
    pub fn applied_framebuffer(&self) -> Option<Option<ResourceHandle>> {
        self.framebuffer.applied
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport.desired
    }

    pub fn rasterizer_state(&self) -> RasterizerState {
        self.rasterizer.desired
    }

    /// Scissor test state last applied on the backend, `None` when unknown.
    pub fn applied_scissor_test(&self) -> Option<bool> {
        self.rasterizer
            .applied
            .map(|state| state.scissor_test_enable)
    }

    pub fn scissor_rect(&self) -> ScissorRect {
        self.scissor.desired
    }

    pub fn blend_state(&self) -> BlendState {
        self.blend.desired
    }

    pub fn blend_factor(&self) -> Color {
        self.blend_factor.desired
    }

    pub fn depth_stencil_state(&self) -> DepthStencilState {
        self.depth_stencil.desired
    }

    pub fn clear_color(&self) -> Color {
        self.clear_color.desired
    }

    pub fn shader(&self, stage: ShaderStage) -> Option<ResourceId> {
        self.shaders[stage.index()]
    }

    pub fn texture(&self, stage: ShaderStage, slot: usize) -> Option<&TextureRef> {
        self.stages[stage.index()]
            .textures
            .get(slot)
            .and_then(Option::as_ref)
    }

    pub fn sampler(&self, stage: ShaderStage, slot: usize) -> Option<SamplerState> {
        self.stages[stage.index()].samplers.get(slot).copied()
    }

    // ------------------------------------------------------------------
    // Application
    // ------------------------------------------------------------------

    /// Fail if a draw would run without both shader stages.
    pub fn check_shaders(&self) -> Result<(), GraphicsError> {
        for stage in ShaderStage::ALL {
            if self.shaders[stage.index()].is_none() {
                return Err(GraphicsError::MissingShaderStage(stage));
            }
        }
        Ok(())
    }

    /// Issue the native calls needed to bring the backend up to date.
    ///
    /// With `for_draw` unset only the non-draw categories are applied. Dirty
    /// categories whose desired value equals the applied one cost no native
    /// call. On failure the failing category stays dirty.
    pub fn apply_dirty_state(
        &mut self,
        backend: &mut dyn BackendAdapter,
        for_draw: bool,
        debug_checks: bool,
    ) -> Result<ApplyStats, GraphicsError> {
        if for_draw {
            self.check_shaders()?;
        }
        let scope = if for_draw {
            StateCategories::all()
        } else {
            StateCategories::NON_DRAW
        };
        let mut stats = ApplyStats::default();
        if !self.dirty.intersects(scope) {
            return Ok(stats);
        }
        let mut pass = ApplyPass {
            backend,
            dirty: &mut self.dirty,
            scope,
            debug_checks,
            stats: &mut stats,
        };

        pass.apply(StateCategories::FRAMEBUFFER, &mut self.framebuffer, |b, fb| {
            b.bind_framebuffer(*fb)
        })?;
        pass.apply(StateCategories::VIEWPORT, &mut self.viewport, |b, v| {
            b.set_viewport(v)
        })?;
        pass.apply(StateCategories::RASTERIZER, &mut self.rasterizer, |b, r| {
            b.set_rasterizer_state(r)
        })?;
        pass.apply(StateCategories::SCISSOR, &mut self.scissor, |b, s| {
            b.set_scissor_rect(s)
        })?;
        pass.apply_pair(
            StateCategories::BLEND,
            &mut self.blend,
            |b, s| b.set_blend_state(s),
            &mut self.blend_factor,
            |b, f| b.set_blend_factor(*f),
        )?;
        pass.apply(StateCategories::DEPTH_STENCIL, &mut self.depth_stencil, |b, d| {
            b.set_depth_stencil_state(d)
        })?;
        pass.apply(StateCategories::CLEAR_COLOR, &mut self.clear_color, |b, c| {
            b.set_clear_color(*c)
        })?;
        pass.apply(StateCategories::CLEAR_DEPTH, &mut self.clear_depth, |b, d| {
            b.set_clear_depth(*d)
        })?;
        pass.apply(StateCategories::CLEAR_STENCIL, &mut self.clear_stencil, |b, s| {
            b.set_clear_stencil(*s)
        })?;

        if !for_draw {
            return Ok(stats);
        }

        pass.apply(StateCategories::INDEX_BUFFER, &mut self.index_buffer, |b, i| {
            b.bind_index_buffer(*i)
        })?;
        let applied_streams = self.vertex_streams.applied;
        pass.apply(StateCategories::VERTEX_BUFFERS, &mut self.vertex_streams, |b, streams| {
            // Cover every slot bound before so stale streams get unbound.
            let span = stream_span(streams).max(applied_streams.as_ref().map_or(0, stream_span));
            b.bind_vertex_buffers(&streams[..span])
        })?;
        pass.apply(StateCategories::SHADERS, &mut self.program, |b, p| {
            b.use_program(*p)
        })?;

        if pass.dirty.contains(StateCategories::TEXTURES) {
            for stage in ShaderStage::ALL {
                let slots = &mut self.stages[stage.index()];
                while slots.dirty_textures != 0 {
                    let slot = slots.dirty_textures.trailing_zeros() as usize;
                    let handle = slots.textures.get(slot).and_then(|t| t.as_ref().map(TextureRef::handle));
                    if slot < self.texture_slot_limit && slots.applied_textures[slot] != Some(handle) {
                        pass.call(|b| b.bind_texture(stage, slot as u32, handle))?;
                        slots.applied_textures[slot] = Some(handle);
                    }
                    slots.dirty_textures &= !(1 << slot);
                }
            }
            pass.clean(StateCategories::TEXTURES);
        }

        if pass.dirty.contains(StateCategories::SAMPLERS) {
            for stage in ShaderStage::ALL {
                let slots = &mut self.stages[stage.index()];
                while slots.dirty_samplers != 0 {
                    let slot = slots.dirty_samplers.trailing_zeros() as usize;
                    let state = slots.samplers[slot];
                    if slot < self.texture_slot_limit && slots.applied_samplers[slot] != Some(state) {
                        pass.call(|b| b.bind_sampler(stage, slot as u32, &state))?;
                        slots.applied_samplers[slot] = Some(state);
                    }
                    slots.dirty_samplers &= !(1 << slot);
                }
            }
            pass.clean(StateCategories::SAMPLERS);
        }

        Ok(stats)
    }
}

/// One walk over the dirty categories.
struct ApplyPass<'a> {
    backend: &'a mut dyn BackendAdapter,
    dirty: &'a mut StateCategories,
    scope: StateCategories,
    debug_checks: bool,
    stats: &'a mut ApplyStats,
}

impl ApplyPass<'_> {
    fn call(
        &mut self,
        call: impl FnOnce(&mut dyn BackendAdapter) -> Result<(), BackendError>,
    ) -> Result<(), GraphicsError> {
        call(&mut *self.backend)?;
        self.stats.native_calls += 1;
        if self.debug_checks
            && let Some(err) = self.backend.take_error()
        {
            log::warn!("StateCache: backend reported {err}");
            return Err(err.into());
        }
        Ok(())
    }

    fn clean(&mut self, category: StateCategories) {
        self.dirty.remove(category);
        self.stats.cleaned |= category;
    }

    fn apply<T: Clone + SameValue>(
        &mut self,
        category: StateCategories,
        tracked: &mut Tracked<T>,
        call: impl FnOnce(&mut dyn BackendAdapter, &T) -> Result<(), BackendError>,
    ) -> Result<(), GraphicsError> {
        if !self.scope.contains(category) || !self.dirty.contains(category) {
            return Ok(());
        }
        if tracked.needs_apply() {
            self.call(|b| call(b, &tracked.desired))?;
            tracked.commit();
        }
        self.clean(category);
        Ok(())
    }

    fn apply_pair<A: Clone + SameValue, B: Clone + SameValue>(
        &mut self,
        category: StateCategories,
        first: &mut Tracked<A>,
        first_call: impl FnOnce(&mut dyn BackendAdapter, &A) -> Result<(), BackendError>,
        second: &mut Tracked<B>,
        second_call: impl FnOnce(&mut dyn BackendAdapter, &B) -> Result<(), BackendError>,
    ) -> Result<(), GraphicsError> {
        if !self.scope.contains(category) || !self.dirty.contains(category) {
            return Ok(());
        }
        if first.needs_apply() {
            self.call(|b| first_call(b, &first.desired))?;
            first.commit();
        }
        if second.needs_apply() {
            self.call(|b| second_call(b, &second.desired))?;
            second.commit();
        }
        self.clean(category);
        Ok(())
    }
}

fn stream_span(streams: &[Option<VertexStream>; MAX_VERTEX_BUFFERS]) -> usize {
    streams.iter().rposition(Option::is_some).map_or(0, |last| last + 1)
}

#[cfg(all(test, feature = "dummy"))]
mod tests {
    use super::*;
    use crate::backend::{CallKind, DummyBackend, ResourceKind};

    fn bound_cache() -> StateCache {
        let mut cache = StateCache::new(16);
        cache.set_shader(ShaderStage::Vertex, Some(ResourceId::next()));
        cache.set_shader(ShaderStage::Pixel, Some(ResourceId::next()));
        cache
    }

    #[test]
    fn test_second_apply_issues_nothing() {
        let mut backend = DummyBackend::new();
        let recorder = backend.recorder();
        let mut cache = bound_cache();

        let first = cache.apply_dirty_state(&mut backend, true, true).unwrap();
        assert!(first.native_calls > 0);
        let calls = recorder.total_calls();

        let second = cache.apply_dirty_state(&mut backend, true, true).unwrap();
        assert_eq!(second.native_calls, 0);
        assert_eq!(recorder.total_calls(), calls);
    }

    #[test]
    fn test_equal_value_skips_native_call() {
        let mut backend = DummyBackend::new();
        let recorder = backend.recorder();
        let mut cache = bound_cache();
        cache.apply_dirty_state(&mut backend, true, false).unwrap();
        recorder.reset_calls();

        cache.set_blend_state(BlendState::OPAQUE);
        assert!(cache.is_dirty(StateCategories::BLEND));
        let stats = cache.apply_dirty_state(&mut backend, false, false).unwrap();
        assert_eq!(stats.native_calls, 0);
        assert!(!cache.is_dirty(StateCategories::BLEND));

        cache.set_blend_state(BlendState::ALPHA_BLEND);
        cache.apply_dirty_state(&mut backend, false, false).unwrap();
        assert_eq!(recorder.count(CallKind::SetBlendState), 1);
        assert_eq!(recorder.count(CallKind::SetBlendFactor), 0);
    }

    #[test]
    fn test_nan_values_applied_once() {
        let mut backend = DummyBackend::new();
        let recorder = backend.recorder();
        let mut cache = bound_cache();
        let nan_color = Color::new(f32::NAN, 0.0, 0.0, 1.0);

        cache.set_blend_factor(nan_color);
        cache.set_clear_color(nan_color);
        cache.set_clear_depth(f32::NAN);
        cache.apply_dirty_state(&mut backend, true, false).unwrap();
        recorder.reset_calls();

        cache.set_blend_factor(nan_color);
        cache.set_clear_color(nan_color);
        cache.set_clear_depth(f32::NAN);
        let stats = cache.apply_dirty_state(&mut backend, true, false).unwrap();
        assert_eq!(stats.native_calls, 0);
        assert_eq!(recorder.total_calls(), 0);
    }

    #[test]
    fn test_missing_shader_stage_issues_no_calls() {
        let mut backend = DummyBackend::new();
        let recorder = backend.recorder();
        let mut cache = StateCache::new(16);
        cache.set_shader(ShaderStage::Vertex, Some(ResourceId::next()));

        let err = cache.apply_dirty_state(&mut backend, true, false).unwrap_err();
        assert_eq!(err, GraphicsError::MissingShaderStage(ShaderStage::Pixel));
        assert_eq!(recorder.total_calls(), 0);
    }

    #[test]
    fn test_non_draw_apply_leaves_draw_categories_dirty() {
        let mut backend = DummyBackend::new();
        let recorder = backend.recorder();
        let mut cache = StateCache::new(16);

        cache.apply_dirty_state(&mut backend, false, false).unwrap();
        assert_eq!(recorder.count(CallKind::UseProgram), 0);
        assert!(cache.is_dirty(StateCategories::DRAW_ONLY));
        assert!(!cache.is_dirty(StateCategories::NON_DRAW));
    }

    #[test]
    fn test_fixed_application_order() {
        let mut backend = DummyBackend::new();
        let recorder = backend.recorder();
        let mut cache = bound_cache();
        cache.apply_dirty_state(&mut backend, true, false).unwrap();
        let calls = recorder.calls();
        let position = |kind| calls.iter().position(|&c| c == kind).unwrap();

        assert!(position(CallKind::BindFramebuffer) < position(CallKind::SetViewport));
        assert!(position(CallKind::SetViewport) < position(CallKind::SetRasterizerState));
        assert!(position(CallKind::SetRasterizerState) < position(CallKind::SetScissorRect));
        assert!(position(CallKind::SetScissorRect) < position(CallKind::SetBlendState));
        assert!(position(CallKind::SetBlendState) < position(CallKind::SetDepthStencilState));
        assert!(position(CallKind::SetDepthStencilState) < position(CallKind::SetClearColor));
        assert!(position(CallKind::SetClearStencil) < position(CallKind::BindIndexBuffer));
        assert!(position(CallKind::BindIndexBuffer) < position(CallKind::BindVertexBuffers));
        assert!(position(CallKind::BindVertexBuffers) < position(CallKind::UseProgram));
    }

    #[test]
    fn test_failed_call_keeps_category_dirty() {
        let mut backend = DummyBackend::new();
        let recorder = backend.recorder();
        let mut cache = StateCache::new(16);
        recorder.fail_call(CallKind::SetDepthStencilState);

        let err = cache.apply_dirty_state(&mut backend, false, false).unwrap_err();
        assert!(matches!(err, GraphicsError::Backend(BackendError::NativeCall { .. })));
        assert!(cache.is_dirty(StateCategories::DEPTH_STENCIL));
        assert!(!cache.is_dirty(StateCategories::BLEND));
    }

    #[test]
    fn test_debug_checks_surface_backend_errors() {
        let mut backend = DummyBackend::new();
        let recorder = backend.recorder();
        let mut cache = StateCache::new(16);
        recorder.raise_error(BackendError::NativeCall {
            call: "bind_framebuffer",
            code: 0x0506,
        });

        let err = cache.apply_dirty_state(&mut backend, false, true).unwrap_err();
        assert!(matches!(err, GraphicsError::Backend(_)));
    }

    #[test]
    fn test_only_dirty_texture_slots_rebound() {
        let mut backend = DummyBackend::new();
        let recorder = backend.recorder();
        let mut cache = bound_cache();
        cache.apply_dirty_state(&mut backend, true, false).unwrap();
        recorder.reset_calls();

        cache
            .set_sampler(ShaderStage::Pixel, 2, SamplerState::POINT_CLAMP)
            .unwrap();
        cache.apply_dirty_state(&mut backend, true, false).unwrap();
        assert_eq!(recorder.count(CallKind::BindSampler), 1);
        assert_eq!(recorder.count(CallKind::BindTexture), 0);

        assert!(matches!(
            cache.set_texture(ShaderStage::Pixel, 16, None),
            Err(GraphicsError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_forget_handle_forces_rebind() {
        let mut backend = DummyBackend::new();
        let recorder = backend.recorder();
        let mut cache = StateCache::new(16);
        let fb = backend.create_framebuffer().unwrap();
        cache.set_framebuffer(Some(fb));
        cache.apply_dirty_state(&mut backend, false, false).unwrap();
        recorder.reset_calls();

        cache.forget_handle(ResourceHandle::new(ResourceKind::Framebuffer, 999));
        assert!(!cache.is_dirty(StateCategories::FRAMEBUFFER));

        cache.forget_handle(fb);
        assert!(cache.is_dirty(StateCategories::FRAMEBUFFER));
        assert_eq!(cache.applied_framebuffer(), None);
        cache.apply_dirty_state(&mut backend, false, false).unwrap();
        assert_eq!(recorder.count(CallKind::BindFramebuffer), 1);
    }

    #[test]
    fn test_invalidate_applied_reissues_everything() {
        let mut backend = DummyBackend::new();
        let recorder = backend.recorder();
        let mut cache = bound_cache();
        cache.apply_dirty_state(&mut backend, true, false).unwrap();
        recorder.reset_calls();

        cache.invalidate_applied();
        cache.apply_dirty_state(&mut backend, false, false).unwrap();
        assert_eq!(recorder.count(CallKind::SetViewport), 1);
        assert_eq!(recorder.count(CallKind::SetBlendState), 1);
        assert_eq!(recorder.count(CallKind::SetBlendFactor), 1);
    }
}
