//! Deferred disposal and cross-thread access tests.
//!
//! Resources dropped on any thread must outlive the frame in flight, and the
//! device must stay usable from worker threads through its [`DeviceHandle`].

mod common;

use std::sync::Arc;

use common::TestContext;
use duet_graphics::{
    BackendKind, CallKind, GraphicsError, PresentationParameters, PrimitiveType, QueryKind,
    RenderTargetBinding, ResourceKind, ShaderStage, Texture, TextureDescriptor, TextureFormat,
    TextureRef,
};
use rstest::rstest;

fn small_texture(ctx: &mut TestContext) -> Arc<Texture> {
    ctx.device
        .create_texture(&TextureDescriptor::new_2d(4, 4, TextureFormat::Rgba8Unorm))
        .expect("Failed to create texture")
}

// ============================================================================
// Frame timing
// ============================================================================

#[rstest]
#[case::global_state(BackendKind::GlobalState)]
#[case::context_object(BackendKind::ContextObject)]
fn test_dropped_texture_survives_one_present(#[case] kind: BackendKind) {
    let mut ctx = TestContext::new(kind);
    let texture = small_texture(&mut ctx);
    let handle = texture.handle();

    drop(texture);
    assert!(ctx.recorder.is_live(handle));

    ctx.device.present().unwrap();
    assert!(
        ctx.recorder.is_live(handle),
        "handle must survive the present of the frame it was dropped in"
    );

    ctx.device.present().unwrap();
    assert!(!ctx.recorder.is_live(handle));
    assert_eq!(ctx.device.disposal_queue().pending_count(), 0);
}

#[rstest]
#[case::global_state(BackendKind::GlobalState)]
fn test_texture_dropped_on_worker_thread(#[case] kind: BackendKind) {
    let mut ctx = TestContext::new(kind);
    let texture = small_texture(&mut ctx);
    let handle = texture.handle();

    std::thread::spawn(move || drop(texture)).join().unwrap();
    assert_eq!(ctx.recorder.count(CallKind::Destroy), 0);
    assert_eq!(ctx.device.disposal_queue().pending_count(), 1);

    ctx.device.present().unwrap();
    ctx.device.present().unwrap();
    assert!(!ctx.recorder.is_live(handle));
    assert_eq!(ctx.recorder.destroyed(), vec![handle]);
}

#[rstest]
#[case::global_state(BackendKind::GlobalState)]
fn test_bound_texture_outlives_caller_reference(#[case] kind: BackendKind) {
    let mut ctx = TestContext::new(kind);
    let texture = small_texture(&mut ctx);
    let handle = texture.handle();

    ctx.device
        .set_texture(ShaderStage::Pixel, 0, Some(TextureRef::from(texture)))
        .unwrap();
    ctx.device.present().unwrap();
    ctx.device.present().unwrap();
    assert!(ctx.recorder.is_live(handle), "device still holds the texture");

    ctx.device.set_texture(ShaderStage::Pixel, 0, None).unwrap();
    ctx.device.present().unwrap();
    assert!(ctx.recorder.is_live(handle));
    ctx.device.present().unwrap();
    assert!(!ctx.recorder.is_live(handle));
}

#[rstest]
#[case::global_state(BackendKind::GlobalState)]
#[case::context_object(BackendKind::ContextObject)]
fn test_dropped_render_target_releases_framebuffer(#[case] kind: BackendKind) {
    let mut ctx = TestContext::new(kind);
    let target = ctx.create_target(64, 64);
    let texture = target.texture_handle();

    ctx.device.set_render_target(Some(&target)).unwrap();
    ctx.device.set_render_target(None).unwrap();
    let framebuffer = ctx
        .device
        .framebuffer_cache()
        .lookup(&[RenderTargetBinding::from(&target)])
        .expect("framebuffer should be cached");

    drop(target);
    ctx.device.present().unwrap();
    assert!(ctx.recorder.is_live(framebuffer));
    assert_eq!(ctx.device.framebuffer_cache().len(), 1);

    ctx.device.present().unwrap();
    assert!(!ctx.recorder.is_live(texture));
    assert!(!ctx.recorder.is_live(framebuffer));
    assert!(ctx.device.framebuffer_cache().is_empty());
}

#[rstest]
#[case::global_state(BackendKind::GlobalState)]
fn test_dropped_shader_releases_program(#[case] kind: BackendKind) {
    let mut ctx = TestContext::new(kind);
    let quad = ctx.bind_quad();
    ctx.device
        .draw_indexed_primitives(PrimitiveType::TriangleList, 0, 0, 2)
        .unwrap();
    let program = ctx.recorder.bound_program().expect("program in use");
    assert_eq!(ctx.device.program_cache().len(), 1);

    ctx.device.set_pixel_shader(None).unwrap();
    drop(quad);
    ctx.device.present().unwrap();
    ctx.device.present().unwrap();

    assert!(ctx.device.program_cache().is_empty());
    assert!(!ctx.recorder.is_live(program));
}

// ============================================================================
// Invalid handles
// ============================================================================

#[rstest]
#[case::global_state(BackendKind::GlobalState)]
#[case::context_object(BackendKind::ContextObject)]
fn test_already_invalid_handle_is_skipped(#[case] kind: BackendKind) {
    let mut ctx = TestContext::new(kind);
    let texture = small_texture(&mut ctx);
    let handle = texture.handle();
    ctx.recorder.invalidate(handle);

    drop(texture);
    ctx.device.present().unwrap();
    ctx.device.present().unwrap();

    assert!(!ctx.recorder.destroyed().contains(&handle));
    assert_eq!(ctx.device.disposal_queue().pending_count(), 0);
    match kind {
        BackendKind::GlobalState => assert_eq!(ctx.recorder.count(CallKind::Destroy), 0),
        BackendKind::ContextObject => assert_eq!(ctx.recorder.count(CallKind::Destroy), 1),
    }
}

// ============================================================================
// Shutdown
// ============================================================================

#[rstest]
#[case::global_state(BackendKind::GlobalState)]
fn test_dispose_flushes_immediately(#[case] kind: BackendKind) {
    let mut ctx = TestContext::new(kind);
    let _quad = ctx.bind_quad();
    let texture = small_texture(&mut ctx);
    let handle = texture.handle();
    drop(texture);

    ctx.device.dispose();
    assert!(!ctx.recorder.is_live(handle));
    assert_eq!(ctx.device.disposal_queue().pending_count(), 0);

    let destroys = ctx.recorder.count(CallKind::Destroy);
    ctx.device.dispose();
    assert_eq!(ctx.recorder.count(CallKind::Destroy), destroys);
}

#[rstest]
#[case::global_state(BackendKind::GlobalState)]
fn test_drop_releases_everything(#[case] kind: BackendKind) {
    let mut ctx = TestContext::new(kind);
    let target = ctx.create_target(32, 32);
    ctx.device.set_render_target(Some(&target)).unwrap();
    let context = ctx.recorder.create_context();
    ctx.device.retire_context(context);
    drop(target);

    let TestContext { device, recorder } = ctx;
    drop(device);

    assert!(!recorder.is_live(context));
    for kind in [ResourceKind::Texture, ResourceKind::Framebuffer] {
        assert_eq!(recorder.live_count(kind), 0, "{kind:?} leaked");
    }
}

// ============================================================================
// Contexts
// ============================================================================

#[rstest]
#[case::global_state(BackendKind::GlobalState)]
#[case::context_object(BackendKind::ContextObject)]
fn test_contexts_destroyed_on_presentation_change(#[case] kind: BackendKind) {
    let mut ctx = TestContext::new(kind);
    let local = ctx.recorder.create_context();
    let remote = ctx.recorder.create_context();

    ctx.device.retire_context(local);
    let handle = ctx.device.handle();
    std::thread::spawn(move || handle.retire_context(remote))
        .join()
        .unwrap();

    ctx.device.present().unwrap();
    ctx.device.present().unwrap();
    assert!(ctx.recorder.is_live(local), "contexts ignore frame boundaries");

    ctx.device
        .presentation_changed(PresentationParameters::new(1024, 768));
    assert!(!ctx.recorder.is_live(local));
    assert!(!ctx.recorder.is_live(remote));
}

// ============================================================================
// Marshaling
// ============================================================================

#[rstest]
#[case::global_state(BackendKind::GlobalState)]
#[case::context_object(BackendKind::ContextObject)]
fn test_create_from_worker_thread(#[case] kind: BackendKind) {
    let mut ctx = TestContext::new(kind);
    let handle = ctx.device.handle();
    assert!(handle.is_render_thread());

    let worker = std::thread::spawn(move || {
        let texture = handle.create_texture(TextureDescriptor::new_2d(
            8,
            8,
            TextureFormat::Rgba8Unorm,
        ))?;
        let query = handle.create_query(QueryKind::Occlusion)?;
        Ok::<_, GraphicsError>((texture, query))
    });

    let mut processed = 0;
    while !worker.is_finished() {
        processed += ctx.device.process_marshaled_work();
        std::thread::yield_now();
    }
    processed += ctx.device.process_marshaled_work();

    let (texture, query) = worker.join().unwrap().unwrap();
    assert_eq!(processed, 2);
    assert!(ctx.recorder.is_live(texture.handle()));
    assert!(ctx.recorder.is_live(query.handle()));
}

#[rstest]
#[case::global_state(BackendKind::GlobalState)]
fn test_handle_refuses_render_thread(#[case] kind: BackendKind) {
    let ctx = TestContext::new(kind);
    let handle = ctx.device.handle();
    let result = handle.create_texture(TextureDescriptor::new_2d(
        8,
        8,
        TextureFormat::Rgba8Unorm,
    ));
    assert!(matches!(result, Err(GraphicsError::WouldBlockRenderThread)));
}

#[rstest]
#[case::global_state(BackendKind::GlobalState)]
fn test_handle_outliving_device(#[case] kind: BackendKind) {
    let ctx = TestContext::new(kind);
    let handle = ctx.device.handle();
    drop(ctx);

    let result = std::thread::spawn(move || {
        handle.create_texture(TextureDescriptor::new_2d(8, 8, TextureFormat::Rgba8Unorm))
    })
    .join()
    .unwrap();
    assert!(matches!(result, Err(GraphicsError::RenderThreadUnavailable)));
}
