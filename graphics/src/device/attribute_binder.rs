//! Vertex attribute binding.
//!
//! Shaders read vertex inputs at locations chosen by the shader compiler;
//! vertex buffers describe their contents by semantic. The binder joins the
//! two: for each bound vertex buffer it resolves an [`AttributeLayout`] (which
//! input location reads which element at which byte offset), points the
//! backend at it, and enables exactly the locations in use.
//!
//! Layouts are cached per (vertex declaration, shader pair) and shared via
//! `Arc`, so "did the layout change" is a pointer comparison. When neither the
//! layouts nor any slot's buffer, offset or instance frequency changed since
//! the last draw, no native call is issued at all.

use std::collections::HashMap;
use std::sync::Arc;

use crate::backend::{AttributePointer, BackendAdapter, ResourceHandle, VertexStream};
use crate::capabilities::Capabilities;
use crate::error::GraphicsError;
use crate::resources::{ResourceId, Shader, VertexBuffer};
use crate::types::{VertexDeclaration, VertexElementFormat};

/// Highest number of attribute locations the binder tracks.
const MAX_TRACKED_LOCATIONS: u32 = 32;

/// A vertex buffer bound to an input slot by the client.
#[derive(Debug, Clone)]
pub struct VertexBufferBinding {
    buffer: Arc<VertexBuffer>,
    vertex_offset: u32,
    instance_frequency: u32,
}

impl VertexBufferBinding {
    /// Bind a buffer starting at its first vertex, advancing per vertex.
    pub fn new(buffer: Arc<VertexBuffer>) -> Self {
        Self {
            buffer,
            vertex_offset: 0,
            instance_frequency: 0,
        }
    }

    /// Start reading at `vertex_offset` vertices into the buffer.
    pub fn with_vertex_offset(mut self, vertex_offset: u32) -> Self {
        self.vertex_offset = vertex_offset;
        self
    }

    /// Advance once every `frequency` instances instead of per vertex.
    pub fn with_instance_frequency(mut self, frequency: u32) -> Self {
        self.instance_frequency = frequency;
        self
    }

    pub fn buffer(&self) -> &Arc<VertexBuffer> {
        &self.buffer
    }

    pub fn vertex_offset(&self) -> u32 {
        self.vertex_offset
    }

    pub fn instance_frequency(&self) -> u32 {
        self.instance_frequency
    }

    /// Input-assembler view of this binding.
    pub fn stream(&self) -> VertexStream {
        let stride = self.buffer.declaration().stride();
        VertexStream {
            buffer: self.buffer.handle(),
            stride,
            offset: u64::from(self.vertex_offset) * u64::from(stride),
            instance_frequency: self.instance_frequency,
        }
    }
}

impl From<Arc<VertexBuffer>> for VertexBufferBinding {
    fn from(buffer: Arc<VertexBuffer>) -> Self {
        Self::new(buffer)
    }
}

impl From<&Arc<VertexBuffer>> for VertexBufferBinding {
    fn from(buffer: &Arc<VertexBuffer>) -> Self {
        Self::new(Arc::clone(buffer))
    }
}

/// One shader input fed from a vertex buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LayoutEntry {
    pub location: u32,
    pub format: VertexElementFormat,
    /// Byte offset of the element within a vertex.
    pub offset: u32,
}

/// Resolved mapping from a vertex declaration onto a shader's inputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeLayout {
    stride: u32,
    entries: Vec<LayoutEntry>,
}

impl AttributeLayout {
    /// Match every shader input against the declaration's elements.
    ///
    /// Inputs the declaration does not provide are left out.
    pub fn resolve(
        declaration: &VertexDeclaration,
        vertex_shader: &Shader,
        max_vertex_attributes: u32,
    ) -> Result<Self, GraphicsError> {
        let limit = max_vertex_attributes.min(MAX_TRACKED_LOCATIONS);
        let mut entries = Vec::with_capacity(vertex_shader.attributes().len());
        for attribute in vertex_shader.attributes() {
            if attribute.location >= limit {
                return Err(GraphicsError::InvalidParameter(format!(
                    "attribute location {} exceeds the device limit of {limit}",
                    attribute.location
                )));
            }
            if let Some(element) = declaration.find(attribute.usage, attribute.usage_index) {
                entries.push(LayoutEntry {
                    location: attribute.location,
                    format: element.format,
                    offset: element.offset,
                });
            }
        }
        Ok(Self {
            stride: declaration.stride(),
            entries,
        })
    }

    pub fn stride(&self) -> u32 {
        self.stride
    }

    pub fn entries(&self) -> &[LayoutEntry] {
        &self.entries
    }

    /// Bitmask of the locations this layout feeds.
    pub fn location_mask(&self) -> u32 {
        self.entries
            .iter()
            .fold(0, |mask, entry| mask | (1 << entry.location))
    }
}

/// What was last sent to the backend for one vertex buffer slot.
#[derive(Debug, Clone)]
struct SlotState {
    buffer: ResourceHandle,
    offset: u64,
    layout: Arc<AttributeLayout>,
    instance_frequency: u32,
}

impl PartialEq for SlotState {
    fn eq(&self, other: &Self) -> bool {
        self.buffer == other.buffer
            && self.offset == other.offset
            && Arc::ptr_eq(&self.layout, &other.layout)
            && self.instance_frequency == other.instance_frequency
    }
}

/// Counts from one [`AttributeBinder::apply_attributes`] call.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AttributeStats {
    /// Whether attribute pointers were re-issued.
    pub rebound: bool,
    /// Native calls issued.
    pub native_calls: usize,
}

/// Layouts of one shader pair, keyed by declaration contents.
type LayoutsByDeclaration = HashMap<Arc<VertexDeclaration>, Arc<AttributeLayout>>;

/// Layout cache plus the attribute state last applied on the backend.
#[derive(Debug)]
pub struct AttributeBinder {
    layouts: HashMap<(ResourceId, ResourceId), LayoutsByDeclaration>,
    slots: Vec<Option<SlotState>>,
    enabled: u32,
    dirty: bool,
    max_vertex_attributes: u32,
}

impl AttributeBinder {
    /// Create a binder for a fresh context, where every location starts disabled.
    pub fn new(max_vertex_attributes: u32) -> Self {
        Self {
            layouts: HashMap::new(),
            slots: Vec::new(),
            enabled: 0,
            dirty: true,
            max_vertex_attributes: max_vertex_attributes.min(MAX_TRACKED_LOCATIONS),
        }
    }

    /// Fail before any native call if the draw needs unsupported instancing features.
    pub fn check_instancing(
        capabilities: &Capabilities,
        bindings: &[Option<VertexBufferBinding>],
        base_instance: u32,
    ) -> Result<(), GraphicsError> {
        let per_instance = bindings
            .iter()
            .flatten()
            .any(|binding| binding.instance_frequency() > 0);
        if per_instance && !capabilities.supports_instancing {
            return Err(GraphicsError::UnsupportedFeature(
                "per-instance vertex data requires instancing support".to_string(),
            ));
        }
        if base_instance > 0 && !capabilities.supports_base_instance {
            return Err(GraphicsError::UnsupportedFeature(format!(
                "base instance {base_instance} requires base-instance support"
            )));
        }
        Ok(())
    }

    fn layout_for(
        &mut self,
        declaration: &Arc<VertexDeclaration>,
        vertex_shader: &Shader,
        pixel_shader: ResourceId,
    ) -> Result<Arc<AttributeLayout>, GraphicsError> {
        let per_pair = self
            .layouts
            .entry((vertex_shader.id(), pixel_shader))
            .or_default();
        if let Some(layout) = per_pair.get(declaration.as_ref()) {
            return Ok(Arc::clone(layout));
        }
        let layout = Arc::new(AttributeLayout::resolve(
            declaration,
            vertex_shader,
            self.max_vertex_attributes,
        )?);
        log::debug!(
            "AttributeBinder: resolved layout with {} input(s) for shader {}",
            layout.entries().len(),
            vertex_shader.id()
        );
        per_pair.insert(Arc::clone(declaration), Arc::clone(&layout));
        Ok(layout)
    }

    /// Point the backend at the bound vertex buffers for the given shader pair.
    ///
    /// `base_vertex` is folded into every attribute offset. Nothing is issued
    /// when shader, layouts and every slot are unchanged since the last call.
    pub fn apply_attributes(
        &mut self,
        backend: &mut dyn BackendAdapter,
        vertex_shader: &Shader,
        pixel_shader: ResourceId,
        bindings: &[Option<VertexBufferBinding>],
        base_vertex: u32,
    ) -> Result<AttributeStats, GraphicsError> {
        let mut stats = AttributeStats::default();
        let mut next = Vec::with_capacity(bindings.len());
        for binding in bindings {
            let state = match binding {
                Some(binding) => {
                    let declaration = binding.buffer().declaration();
                    let layout = self.layout_for(declaration, vertex_shader, pixel_shader)?;
                    let first_vertex = u64::from(binding.vertex_offset()) + u64::from(base_vertex);
                    Some(SlotState {
                        buffer: binding.buffer().handle(),
                        offset: first_vertex * u64::from(declaration.stride()),
                        layout,
                        instance_frequency: binding.instance_frequency(),
                    })
                }
                None => None,
            };
            next.push(state);
        }

        if !self.dirty && next == self.slots {
            return Ok(stats);
        }

        self.dirty = true;
        let mut enabled = 0u32;
        let mut pointers = Vec::new();
        for (slot, state) in next.iter().enumerate() {
            let Some(state) = state else { continue };
            pointers.clear();
            pointers.extend(state.layout.entries().iter().map(|entry| AttributePointer {
                location: entry.location,
                buffer: state.buffer,
                format: entry.format,
                stride: state.layout.stride(),
                offset: state.offset + u64::from(entry.offset),
                instance_frequency: state.instance_frequency,
            }));
            backend.set_vertex_attributes(slot as u32, &pointers)?;
            stats.native_calls += 1;
            enabled |= state.layout.location_mask();
        }

        let mut changed = enabled ^ self.enabled;
        while changed != 0 {
            let location = changed.trailing_zeros();
            let enable = enabled & (1 << location) != 0;
            backend.set_vertex_attribute_enabled(location, enable)?;
            stats.native_calls += 1;
            self.enabled ^= 1 << location;
            changed &= !(1 << location);
        }

        self.slots = next;
        self.dirty = false;
        stats.rebound = true;
        Ok(stats)
    }

    /// Force the next apply to re-issue everything.
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Mark dirty if any slot was last bound to `buffer`.
    pub fn forget_buffer(&mut self, buffer: ResourceHandle) {
        if self.slots.iter().flatten().any(|slot| slot.buffer == buffer) {
            self.dirty = true;
        }
    }

    /// Drop every cached layout for a retired shader.
    pub fn forget_shader(&mut self, shader: ResourceId) {
        self.layouts
            .retain(|&(vertex, pixel), _| vertex != shader && pixel != shader);
    }

    /// Forget all cached layouts and applied state.
    ///
    /// Every tracked location is assumed enabled so the next apply disables
    /// whatever it does not use.
    pub fn reset(&mut self) {
        self.layouts.clear();
        self.slots.clear();
        self.enabled = if self.max_vertex_attributes >= MAX_TRACKED_LOCATIONS {
            u32::MAX
        } else {
            (1 << self.max_vertex_attributes) - 1
        };
        self.dirty = true;
    }

    /// Locations currently enabled on the backend.
    pub fn enabled_locations(&self) -> u32 {
        self.enabled
    }

    /// Number of cached layouts.
    pub fn layout_count(&self) -> usize {
        self.layouts.values().map(HashMap::len).sum()
    }
}

#[cfg(all(test, feature = "dummy"))]
mod tests {
    use super::*;
    use crate::backend::{CallKind, DummyBackend};
    use crate::device::DisposalQueue;
    use crate::types::{
        BufferUsage, ShaderAttribute, ShaderDescriptor, VertexElement, VertexElementUsage,
    };

    struct Fixture {
        backend: DummyBackend,
        queue: Arc<DisposalQueue>,
        vs: Shader,
        ps: ResourceId,
        binder: AttributeBinder,
    }

    impl Fixture {
        fn new() -> Self {
            let mut backend = DummyBackend::new();
            let queue = Arc::new(DisposalQueue::new());
            let descriptor = ShaderDescriptor::vertex(b"vs".to_vec())
                .with_attribute(ShaderAttribute::new(VertexElementUsage::Position, 0, 0))
                .with_attribute(ShaderAttribute::new(VertexElementUsage::Color, 0, 1));
            let handle = backend.create_shader(&descriptor).unwrap();
            let vs = Shader::new(handle, &descriptor, Arc::clone(&queue));
            Self {
                backend,
                queue,
                vs,
                ps: ResourceId::next(),
                binder: AttributeBinder::new(16),
            }
        }

        fn buffer(&mut self, elements: Vec<VertexElement>) -> Arc<VertexBuffer> {
            self.buffer_with(VertexDeclaration::from_elements(elements))
        }

        fn buffer_with(&mut self, declaration: VertexDeclaration) -> Arc<VertexBuffer> {
            let declaration = Arc::new(declaration);
            let descriptor = VertexBuffer::descriptor(&declaration, 4, BufferUsage::empty());
            let handle = self.backend.create_buffer(&descriptor).unwrap();
            Arc::new(VertexBuffer::new(
                handle,
                declaration,
                4,
                BufferUsage::empty(),
                Arc::clone(&self.queue),
            ))
        }

        fn apply(
            &mut self,
            bindings: &[Option<VertexBufferBinding>],
            base_vertex: u32,
        ) -> AttributeStats {
            self.binder
                .apply_attributes(&mut self.backend, &self.vs, self.ps, bindings, base_vertex)
                .unwrap()
        }
    }

    #[test]
    fn test_unchanged_bindings_issue_nothing() {
        let mut fixture = Fixture::new();
        let recorder = fixture.backend.recorder();
        let buffer = fixture.buffer(vec![VertexElement::position(0), VertexElement::color(12)]);
        let bindings = [Some(VertexBufferBinding::new(Arc::clone(&buffer)))];

        let first = fixture.apply(&bindings, 0);
        assert!(first.rebound);
        assert_eq!(recorder.enabled_attributes(), vec![0, 1]);
        let calls = recorder.total_calls();

        let second = fixture.apply(&bindings, 0);
        assert!(!second.rebound);
        assert_eq!(second.native_calls, 0);
        assert_eq!(recorder.total_calls(), calls);
    }

    #[test]
    fn test_base_vertex_folded_into_offsets() {
        let mut fixture = Fixture::new();
        let recorder = fixture.backend.recorder();
        let buffer = fixture.buffer(vec![VertexElement::position(0), VertexElement::color(12)]);
        let binding = VertexBufferBinding::new(buffer).with_vertex_offset(2);

        fixture.apply(&[Some(binding.clone())], 3);
        let pointers = recorder.attribute_pointers(0);
        let color = pointers.iter().find(|p| p.location == 1).unwrap();
        assert_eq!(color.stride, 16);
        assert_eq!(color.offset, 5 * 16 + 12);

        let stats = fixture.apply(&[Some(binding)], 4);
        assert!(stats.rebound);
    }

    #[test]
    fn test_shrinking_layout_disables_unused_locations() {
        let mut fixture = Fixture::new();
        let recorder = fixture.backend.recorder();
        let full = fixture.buffer(vec![VertexElement::position(0), VertexElement::color(12)]);
        let positions = fixture.buffer(vec![VertexElement::position(0)]);

        fixture.apply(&[Some(VertexBufferBinding::new(full))], 0);
        assert_eq!(recorder.enabled_attributes(), vec![0, 1]);
        recorder.reset_calls();

        fixture.apply(&[Some(VertexBufferBinding::new(positions))], 0);
        assert_eq!(recorder.enabled_attributes(), vec![0]);
        assert_eq!(recorder.count(CallKind::SetVertexAttributeEnabled), 1);
        assert_eq!(fixture.binder.enabled_locations(), 0b1);
    }

    #[test]
    fn test_layouts_shared_per_declaration() {
        let mut fixture = Fixture::new();
        let a = fixture.buffer(vec![VertexElement::position(0)]);
        let b = fixture.buffer(vec![VertexElement::position(0)]);

        fixture.apply(&[Some(VertexBufferBinding::new(a))], 0);
        fixture.apply(&[Some(VertexBufferBinding::new(b))], 0);
        assert_eq!(fixture.binder.layout_count(), 1);

        fixture.binder.forget_shader(fixture.vs.id());
        assert_eq!(fixture.binder.layout_count(), 0);
    }

    #[test]
    fn test_colliding_hash_keys_get_separate_layouts() {
        let mut fixture = Fixture::new();
        let recorder = fixture.backend.recorder();
        let full = fixture.buffer_with(
            VertexDeclaration::from_elements(vec![
                VertexElement::position(0),
                VertexElement::color(12),
            ])
            .with_hash_key(7),
        );
        let positions = fixture.buffer_with(
            VertexDeclaration::from_elements(vec![VertexElement::position(0)]).with_hash_key(7),
        );

        fixture.apply(&[Some(VertexBufferBinding::new(full))], 0);
        assert_eq!(recorder.enabled_attributes(), vec![0, 1]);

        fixture.apply(&[Some(VertexBufferBinding::new(positions))], 0);
        assert_eq!(fixture.binder.layout_count(), 2);
        assert_eq!(recorder.enabled_attributes(), vec![0]);
        let pointers = recorder.attribute_pointers(0);
        assert_eq!(pointers.len(), 1);
        assert_eq!(pointers[0].stride, 12);
    }

    #[test]
    fn test_reset_disables_stale_locations() {
        let mut fixture = Fixture::new();
        let recorder = fixture.backend.recorder();
        let buffer = fixture.buffer(vec![VertexElement::position(0)]);
        let bindings = [Some(VertexBufferBinding::new(buffer))];
        fixture.apply(&bindings, 0);
        recorder.reset_calls();

        fixture.binder.reset();
        let stats = fixture.apply(&bindings, 0);
        assert!(stats.rebound);
        // Locations 1..16 were assumed enabled and get disabled.
        assert_eq!(recorder.count(CallKind::SetVertexAttributeEnabled), 15);
    }

    #[test]
    fn test_instancing_checks() {
        let mut fixture = Fixture::new();
        let buffer = fixture.buffer(vec![VertexElement::position(0)]);
        let instanced = [Some(VertexBufferBinding::new(buffer).with_instance_frequency(1))];

        assert!(AttributeBinder::check_instancing(&Capabilities::desktop(), &instanced, 1).is_ok());
        assert!(matches!(
            AttributeBinder::check_instancing(&Capabilities::gl_es2(), &instanced, 0),
            Err(GraphicsError::UnsupportedFeature(_))
        ));
        let no_base_instance = Capabilities {
            supports_base_instance: false,
            ..Capabilities::desktop()
        };
        assert!(matches!(
            AttributeBinder::check_instancing(&no_base_instance, &instanced, 2),
            Err(GraphicsError::UnsupportedFeature(_))
        ));
    }
}
