use std::sync::Arc;

use criterion::{Criterion, black_box, criterion_group, criterion_main};

use duet_graphics::{
    BlendState, BufferUsage, CallRecorder, DeviceDescriptor, DummyBackend, GraphicsDevice,
    IndexElementSize, PresentationParameters, PrimitiveType, RenderTargetBinding,
    RenderTargetDescriptor, ShaderAttribute, ShaderDescriptor, TextureDescriptor, TextureFormat,
    VertexBufferBinding, VertexDeclaration, VertexElement, VertexElementUsage,
};

fn dummy_device() -> (GraphicsDevice, CallRecorder) {
    let backend = DummyBackend::new();
    let recorder = backend.recorder();
    let device = GraphicsDevice::new(
        Box::new(backend),
        DeviceDescriptor::new(PresentationParameters::new(1280, 720)),
    );
    (device, recorder)
}

/// Device with shaders, vertex and index buffers bound for a quad.
fn quad_device() -> (GraphicsDevice, CallRecorder) {
    let (mut device, recorder) = dummy_device();
    let vertex_shader = device
        .create_shader(
            &ShaderDescriptor::vertex(b"vs".to_vec())
                .with_attribute(ShaderAttribute::new(VertexElementUsage::Position, 0, 0))
                .with_attribute(ShaderAttribute::new(VertexElementUsage::Color, 0, 1)),
        )
        .unwrap();
    let pixel_shader = device
        .create_shader(&ShaderDescriptor::pixel(b"ps".to_vec()))
        .unwrap();
    let declaration = Arc::new(VertexDeclaration::from_elements(vec![
        VertexElement::position(0),
        VertexElement::color(12),
    ]));
    let vertices = device
        .create_vertex_buffer(declaration, 4, BufferUsage::WRITE_ONLY)
        .unwrap();
    let indices = device
        .create_index_buffer(IndexElementSize::SixteenBits, 6, BufferUsage::WRITE_ONLY)
        .unwrap();

    device.set_vertex_shader(Some(vertex_shader)).unwrap();
    device.set_pixel_shader(Some(pixel_shader)).unwrap();
    device
        .set_vertex_buffers(&[VertexBufferBinding::new(vertices)])
        .unwrap();
    device.set_index_buffer(Some(indices));
    (device, recorder)
}

// ---------------------------------------------------------------------------
// State application
// ---------------------------------------------------------------------------

fn bench_draw_unchanged_state(c: &mut Criterion) {
    let (mut device, recorder) = quad_device();
    device
        .draw_indexed_primitives(PrimitiveType::TriangleList, 0, 0, 2)
        .unwrap();

    c.bench_function("draw_indexed_unchanged_state", |b| {
        b.iter(|| {
            device
                .draw_indexed_primitives(PrimitiveType::TriangleList, 0, 0, 2)
                .unwrap();
            recorder.reset_calls();
        });
    });
}

fn bench_draw_blend_churn(c: &mut Criterion) {
    let (mut device, recorder) = quad_device();
    let states = [BlendState::OPAQUE, BlendState::ALPHA_BLEND, BlendState::ADDITIVE];
    let mut frame = 0usize;

    c.bench_function("draw_indexed_blend_churn", |b| {
        b.iter(|| {
            device.set_blend_state(states[frame % states.len()]);
            device
                .draw_indexed_primitives(PrimitiveType::TriangleList, 0, 0, 2)
                .unwrap();
            recorder.reset_calls();
            frame += 1;
        });
    });
}

// ---------------------------------------------------------------------------
// Framebuffer cache
// ---------------------------------------------------------------------------

fn bench_framebuffer_lookup(c: &mut Criterion) {
    let (mut device, _recorder) = dummy_device();
    let bindings: Vec<RenderTargetBinding> = (0..4)
        .map(|_| {
            let target = device
                .create_render_target(&RenderTargetDescriptor::new_2d(
                    256,
                    256,
                    TextureFormat::Rgba8Unorm,
                ))
                .unwrap();
            RenderTargetBinding::new(target)
        })
        .collect();
    device.set_render_targets(&bindings).unwrap();
    device.set_render_targets(&[]).unwrap();

    c.bench_function("framebuffer_lookup_4_targets", |b| {
        b.iter(|| black_box(device.framebuffer_cache().lookup(black_box(&bindings))));
    });
}

// ---------------------------------------------------------------------------
// Deferred disposal
// ---------------------------------------------------------------------------

fn bench_disposal_cycle(c: &mut Criterion) {
    let (mut device, recorder) = dummy_device();

    c.bench_function("create_drop_present_texture", |b| {
        b.iter(|| {
            let texture = device
                .create_texture(&TextureDescriptor::new_2d(64, 64, TextureFormat::Rgba8Unorm))
                .unwrap();
            drop(texture);
            device.present().unwrap();
            recorder.reset_calls();
        });
    });
    black_box(device.disposal_queue().pending_count());
}

criterion_group!(
    benches,
    bench_draw_unchanged_state,
    bench_draw_blend_churn,
    bench_framebuffer_lookup,
    bench_disposal_cycle,
);
criterion_main!(benches);
