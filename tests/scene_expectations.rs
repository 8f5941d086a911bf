/// Scene tests for the batch renderer.
///
/// The shared scene is drawn through a [`Canvas`] and flushed into the recording
/// backend, whose draws are validated against the scene's expectations. The same
/// scene is then replayed on a headless wgpu device when one is available.
///
/// Run with:   cargo test --test scene_expectations
use futures::executor::block_on;
use tessera::backend::RecordingBackend;
use tessera::{BatchRenderer, Canvas, Color, Mat4, RendererConfig, WgpuBackend};
use tessera_test_scenes::{
    build_main_scene, canvas_projection, check_draws, checkerboard_rgba, font_atlas_rgba,
    SceneResources, CANVAS_HEIGHT, CANVAS_WIDTH,
};

fn assert_no_failures(failures: Vec<String>) {
    if !failures.is_empty() {
        panic!(
            "{} draw expectation(s) failed:\n{}",
            failures.len(),
            failures.join("\n"),
        );
    }
}

/// Main scene test: every tile lands in the expected pass and batch.
#[test]
fn main_scene_draw_expectations() {
    let mut renderer = BatchRenderer::new(RecordingBackend::new(), RendererConfig::default())
        .expect("recording backend initializes");
    let resources = SceneResources::new(tessera::TextureId(100), tessera::TextureId(101));
    let mut canvas = Canvas::new();

    let expectations = build_main_scene(&mut canvas, &resources);
    let stats = renderer.flush(canvas.sink_mut(), &Mat4::identity(), &canvas_projection());

    assert_eq!(stats.skipped_shapes, 0);
    assert_eq!(stats.draw_calls as usize, expectations.len());
    assert_no_failures(check_draws(renderer.backend().draws(), &expectations));
}

/// The scene is stable across frames: the second flush draws the same thing.
#[test]
fn main_scene_is_repeatable() {
    let mut renderer = BatchRenderer::new(RecordingBackend::new(), RendererConfig::default())
        .expect("recording backend initializes");
    let resources = SceneResources::new(tessera::TextureId(1), tessera::TextureId(2));
    let mut canvas = Canvas::new();

    build_main_scene(&mut canvas, &resources);
    let first = renderer.flush(canvas.sink_mut(), &Mat4::identity(), &canvas_projection());
    renderer.backend_mut().clear_commands();

    let expectations = build_main_scene(&mut canvas, &resources);
    let second = renderer.flush(canvas.sink_mut(), &Mat4::identity(), &canvas_projection());

    assert_eq!(first, second);
    assert_no_failures(check_draws(renderer.backend().draws(), &expectations));
}

/// Headless wgpu run of the main scene. Skipped when no adapter is available.
#[test]
fn main_scene_on_wgpu() {
    let backend = match block_on(WgpuBackend::headless(
        tessera::wgpu::TextureFormat::Rgba8UnormSrgb,
        (CANVAS_WIDTH, CANVAS_HEIGHT),
    )) {
        Ok(backend) => backend,
        Err(error) => {
            eprintln!("Skipping wgpu scene test: {error}");
            return;
        }
    };

    let mut renderer =
        BatchRenderer::new(backend, RendererConfig::default()).expect("wgpu backend initializes");
    let checkerboard = renderer
        .backend_mut()
        .register_texture(&checkerboard_rgba(), (4, 4))
        .expect("checkerboard uploads");
    let (atlas_pixels, atlas_size) = font_atlas_rgba();
    let atlas = renderer
        .backend_mut()
        .register_texture(&atlas_pixels, atlas_size)
        .expect("atlas uploads");

    let resources = SceneResources::new(checkerboard, atlas);
    let mut canvas = Canvas::new();
    let expectations = build_main_scene(&mut canvas, &resources);
    let stats = renderer.flush(canvas.sink_mut(), &Mat4::identity(), &canvas_projection());

    assert_eq!(stats.draw_calls as usize, expectations.len());
    assert_eq!(renderer.backend().pending_draws(), expectations.len());

    let (_target, view) = renderer.backend().create_render_target();
    renderer.backend_mut().submit(&view, Some(Color::WHITE));
    assert_eq!(renderer.backend().pending_draws(), 0);
}

/// Custom shaders compile through the backend, and invalid WGSL is rejected.
#[test]
fn custom_shader_loading_on_wgpu() {
    let Ok(mut backend) = block_on(WgpuBackend::headless(
        tessera::wgpu::TextureFormat::Rgba8UnormSrgb,
        (16, 16),
    )) else {
        eprintln!("Skipping wgpu shader test: no adapter");
        return;
    };

    assert!(backend
        .load_shader(tessera_test_scenes::shaders::FLAT_TINT_WGSL)
        .is_ok());
    assert!(backend.load_shader("this is not wgsl").is_err());
}
