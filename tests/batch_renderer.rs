use tessera::backend::{
    BackendCommand, Capabilities, PassState, PrimitiveKind, RecordingBackend, ShaderBinding,
    ShaderSlot,
};
use tessera::math::{look_at, perspective, Point3, Vec3};
use tessera::{
    upload_mesh, BatchRenderer, Color, FlushStrategy, FrameAccumulator, Light, LightingSnapshot,
    Mat4, RendererConfig, ShapeRecord, StreamPolicy, StrokeAttributes, StrokeJoin,
    StrokeRenderMode, TextureId, Topology, Vertex, MAX_TRANSFORMS,
};

fn renderer() -> BatchRenderer<RecordingBackend> {
    renderer_with(RecordingBackend::new(), RendererConfig::default())
}

fn renderer_with(backend: RecordingBackend, config: RendererConfig) -> BatchRenderer<RecordingBackend> {
    BatchRenderer::new(backend, config).expect("recording backend always initializes")
}

fn flush(renderer: &mut BatchRenderer<RecordingBackend>, frame: &mut FrameAccumulator) -> tessera::FlushStats {
    renderer.flush(frame, &Mat4::identity(), &Mat4::identity())
}

fn triangle(color: Color) -> Vec<Vertex> {
    vec![
        Vertex::new([0.0, 0.0, 0.0], color),
        Vertex::new([1.0, 0.0, 0.0], color),
        Vertex::new([0.0, 1.0, 0.0], color),
    ]
}

fn quad(color: Color) -> Vec<Vertex> {
    vec![
        Vertex::new([0.0, 0.0, 0.0], color),
        Vertex::new([1.0, 0.0, 0.0], color),
        Vertex::new([1.0, 1.0, 0.0], color),
        Vertex::new([0.0, 1.0, 0.0], color),
    ]
}

fn fill(topology: Topology, vertices: Vec<Vertex>) -> ShapeRecord {
    ShapeRecord::builder(topology).vertices(vertices).build()
}

#[test]
fn solid_quad_is_a_single_draw() {
    let mut renderer = renderer();
    let mut frame = FrameAccumulator::new();
    let model = Mat4::translation(2.0, 3.0, 0.0);
    frame.submit(
        ShapeRecord::builder(Topology::Quads)
            .vertices(quad(Color::rgb(10, 200, 10)))
            .model_matrix(model)
            .build(),
    );

    let stats = flush(&mut renderer, &mut frame);
    assert_eq!(stats.draw_calls, 1);
    assert_eq!(stats.vertices_streamed, 6);
    assert!(frame.is_empty());

    let draws = renderer.backend().draws();
    assert_eq!(draws.len(), 1);
    let draw = &draws[0];
    assert_eq!(draw.primitive, PrimitiveKind::Triangles);
    assert_eq!(draw.vertex_count, 6);
    assert_eq!(draw.shader, Some(ShaderBinding::Builtin(ShaderSlot::Fill)));
    assert_eq!(draw.pass_state, Some(PassState::OPAQUE));
    assert_eq!(draw.transforms, vec![model]);
    assert!(draw.vertex_transforms().all(|transform| transform == Some(&model)));
}

#[test]
fn opaque_and_transparent_shapes_form_two_batches() {
    let mut renderer = renderer();
    let mut frame = FrameAccumulator::new();
    frame.submit(fill(Topology::Quads, quad(Color::rgba(0, 0, 255, 100))));
    frame.submit(fill(Topology::Quads, quad(Color::rgb(255, 0, 0))));

    let stats = flush(&mut renderer, &mut frame);
    assert_eq!(stats.batches, 2);
    assert_eq!(stats.opaque_draws, 1);
    assert_eq!(stats.transparent_draws, 1);

    let draws = renderer.backend().draws();
    assert_eq!(draws[0].pass_state, Some(PassState::OPAQUE));
    assert_eq!(draws[0].vertices[0].color, Color::rgb(255, 0, 0).normalize());
    assert_eq!(draws[1].pass_state, Some(PassState::TRANSPARENT));
}

#[test]
fn transforms_are_chunked_at_the_upload_limit() {
    let mut renderer = renderer();
    assert_eq!(renderer.max_transforms(), MAX_TRANSFORMS);

    let mut frame = FrameAccumulator::new();
    let models: Vec<Mat4> = (0..2 * MAX_TRANSFORMS)
        .map(|i| Mat4::translation(i as f32, 0.0, 0.0))
        .collect();
    for model in &models {
        frame.submit(
            ShapeRecord::builder(Topology::Triangles)
                .vertices(triangle(Color::WHITE))
                .model_matrix(*model)
                .build(),
        );
    }

    let stats = flush(&mut renderer, &mut frame);
    assert_eq!(stats.draw_calls, 2);
    assert_eq!(stats.chunks, 2);
    assert_eq!(stats.transform_uploads, 2);

    let draws = renderer.backend().draws();
    for (chunk, draw) in draws.iter().enumerate() {
        assert_eq!(draw.transforms.len(), MAX_TRANSFORMS);
        assert_eq!(draw.vertex_count as usize, 3 * MAX_TRANSFORMS);
        for (i, transform) in draw.vertex_transforms().enumerate() {
            assert_eq!(transform, Some(&models[chunk * MAX_TRANSFORMS + i / 3]));
        }
    }
}

#[test]
fn transparent_shapes_are_drawn_back_to_front() {
    let mut renderer = renderer();
    let mut frame = FrameAccumulator::new();
    let translucent = Color::rgba(255, 255, 255, 128);
    for z in [-1.0, -5.0, -3.0] {
        frame.submit(fill(
            Topology::Triangles,
            triangle(translucent)
                .into_iter()
                .map(|vertex| Vertex {
                    position: [vertex.position[0], vertex.position[1], z],
                    ..vertex
                })
                .collect(),
        ));
    }

    let view = look_at(
        Point3::new(0.0, 0.0, 0.0),
        Point3::new(0.0, 0.0, -1.0),
        Vec3::new(0.0, 1.0, 0.0),
    );
    let projection = perspective(std::f32::consts::FRAC_PI_2, 1.0, 0.1, 100.0);
    let stats = renderer.flush(&mut frame, &view, &projection);
    assert_eq!(stats.draw_calls, 1);

    let depths: Vec<f32> = renderer.backend().draws()[0]
        .vertices
        .chunks(3)
        .map(|triangle| -triangle[0].position[2])
        .collect();
    assert_eq!(depths, vec![5.0, 3.0, 1.0]);
}

#[test]
fn transparent_chunks_keep_back_to_front_order_across_the_limit() {
    let mut renderer = renderer();
    let mut frame = FrameAccumulator::new();
    let translucent = Color::rgba(200, 100, 50, 90);
    let count = 2 * MAX_TRANSFORMS;
    // 37 is coprime with the count, so this visits every distance once, shuffled.
    for i in 0..count {
        let distance = 1.0 + ((i * 37) % count) as f32;
        frame.submit(fill(
            Topology::Triangles,
            triangle(translucent)
                .into_iter()
                .map(|vertex| Vertex {
                    position: [vertex.position[0], vertex.position[1], -distance],
                    ..vertex
                })
                .collect(),
        ));
    }

    let view = look_at(
        Point3::new(0.0, 0.0, 0.0),
        Point3::new(0.0, 0.0, -1.0),
        Vec3::new(0.0, 1.0, 0.0),
    );
    let projection = perspective(std::f32::consts::FRAC_PI_2, 1.0, 0.1, 500.0);
    let stats = renderer.flush(&mut frame, &view, &projection);
    assert_eq!(stats.draw_calls, 2);
    assert_eq!(stats.chunks, 2);
    assert_eq!(stats.transparent_draws, 2);

    let draws = renderer.backend().draws();
    assert!(draws.iter().all(|draw| draw.transforms.len() == MAX_TRANSFORMS));
    let distances: Vec<f32> = draws
        .iter()
        .flat_map(|draw| draw.vertices.chunks(3).map(|triangle| -triangle[0].position[2]))
        .collect();
    let expected: Vec<f32> = (1..=count).rev().map(|distance| distance as f32).collect();
    assert_eq!(distances, expected);
}

#[test]
fn opaque_only_frames_skip_the_light_and_transparent_passes() {
    let mut renderer = renderer();
    let mut frame = FrameAccumulator::new();
    frame.submit(fill(Topology::Triangles, triangle(Color::WHITE)));
    frame.submit(fill(Topology::Quads, quad(Color::rgb(0, 128, 0))));
    renderer.backend_mut().clear_commands();

    let stats = flush(&mut renderer, &mut frame);
    assert_eq!(stats.passes, 1);
    assert_eq!(stats.lighting_uploads, 0);
    let backend = renderer.backend();
    assert_eq!(
        backend.count_commands(|command| matches!(command, BackendCommand::UploadLighting { .. })),
        0
    );
    assert_eq!(
        backend.count_commands(|command| matches!(command, BackendCommand::SetPassState(_))),
        1
    );
    assert_eq!(
        backend.count_commands(
            |command| matches!(command, BackendCommand::SetPassState(state) if *state == PassState::TRANSPARENT)
        ),
        0
    );
    assert_eq!(renderer.stage(), tessera::RenderStage::Idle);

    let mut lighting = LightingSnapshot::new();
    lighting.push(Light::ambient([0.4; 3]));
    frame.submit(fill(Topology::Triangles, triangle(Color::WHITE)));
    frame.submit(
        ShapeRecord::builder(Topology::Triangles)
            .vertices(triangle(Color::WHITE))
            .lighting(Some(lighting))
            .build(),
    );
    frame.submit(fill(Topology::Triangles, triangle(Color::rgba(0, 0, 0, 40))));
    let stats = flush(&mut renderer, &mut frame);
    assert_eq!(stats.passes, 3);
    assert_eq!(stats.lighting_uploads, 1);
}

#[test]
fn strokes_along_the_view_axis_are_drawn() {
    let mut renderer = renderer();
    let mut frame = FrameAccumulator::new();
    frame.submit(
        ShapeRecord::builder(Topology::Lines)
            .vertices([
                Vertex::new([0.0, 0.0, 0.0], Color::BLACK),
                Vertex::new([0.0, 0.0, -10.0], Color::BLACK),
            ])
            .stroke(StrokeAttributes::new(2.0))
            .build(),
    );

    let stats = flush(&mut renderer, &mut frame);
    assert_eq!(stats.skipped_shapes, 0);
    assert_eq!(stats.draw_calls, 1);
    assert!(stats.vertices_streamed >= 6);
    assert!(!renderer.warnings().has_reported("stroke-without-geometry"));
}

#[test]
fn degenerate_strokes_are_reported() {
    let mut renderer = renderer();
    let mut frame = FrameAccumulator::new();
    frame.submit(
        ShapeRecord::builder(Topology::Lines)
            .vertices([
                Vertex::new([2.0, 2.0, 0.0], Color::BLACK),
                Vertex::new([2.0, 2.0, 0.0], Color::BLACK),
            ])
            .stroke(StrokeAttributes::new(2.0))
            .build(),
    );

    let stats = flush(&mut renderer, &mut frame);
    assert_eq!(stats.skipped_shapes, 1);
    assert_eq!(stats.draw_calls, 0);
    assert!(renderer.warnings().has_reported("stroke-without-geometry"));
}

#[test]
fn empty_flush_issues_no_commands() {
    let mut renderer = renderer();
    let mut frame = FrameAccumulator::new();
    frame.submit(fill(Topology::Triangles, triangle(Color::WHITE)));
    flush(&mut renderer, &mut frame);
    renderer.backend_mut().clear_commands();

    let stats = flush(&mut renderer, &mut frame);
    assert_eq!(stats.draw_calls, 0);
    assert!(renderer.backend().commands().is_empty());
}

#[test]
fn external_buffers_break_the_batch_and_restore_the_stream() {
    let mut renderer = renderer();
    let mesh = upload_mesh(renderer.backend_mut(), &triangle(Color::rgb(1, 2, 3)))
        .expect("mesh fits the backend");
    let stream_buffer = renderer.stream().buffer().expect("stream allocated");

    let mut frame = FrameAccumulator::new();
    frame.submit(fill(Topology::Triangles, triangle(Color::WHITE)));
    frame.submit(
        ShapeRecord::builder(Topology::Triangles)
            .external_buffer(mesh)
            .model_matrix(Mat4::scale(2.0, 2.0, 2.0))
            .build(),
    );
    frame.submit(fill(Topology::Triangles, triangle(Color::WHITE)));
    renderer.backend_mut().clear_commands();

    let stats = flush(&mut renderer, &mut frame);
    assert_eq!(stats.draw_calls, 3);

    let draws = renderer.backend().draws();
    assert_eq!(draws[1].buffer, Some(mesh.buffer));
    assert_eq!(draws[1].transforms, vec![Mat4::scale(2.0, 2.0, 2.0)]);
    assert_eq!(draws[1].vertices[0].color, Color::rgb(1, 2, 3).normalize());
    assert_eq!(draws[2].buffer, Some(stream_buffer));

    let commands = renderer.backend().commands();
    let mesh_bind = commands
        .iter()
        .position(|command| {
            matches!(command, BackendCommand::BindVertexBuffer(buffer) if *buffer == mesh.buffer)
        })
        .expect("mesh buffer bound");
    assert!(matches!(
        commands[mesh_bind + 1],
        BackendCommand::Draw { first_vertex: 0, vertex_count: 3, .. }
    ));
    assert!(matches!(
        commands[mesh_bind + 2],
        BackendCommand::BindVertexBuffer(buffer) if buffer == stream_buffer
    ));
    assert_eq!(
        renderer
            .backend()
            .count_commands(|command| matches!(command, BackendCommand::BindVertexBuffer(_))),
        3
    );
}

#[test]
fn lit_shapes_fall_back_to_fill_without_light_shader() {
    let backend = RecordingBackend::new().with_failing_shader(ShaderSlot::Light);
    let mut renderer = renderer_with(backend, RendererConfig::default());
    assert!(!renderer.available_shaders().contains(ShaderSlot::Light));

    let mut lighting = LightingSnapshot::new();
    lighting.push(Light::ambient([0.5; 3]));
    let mut frame = FrameAccumulator::new();
    frame.submit(
        ShapeRecord::builder(Topology::Triangles)
            .vertices(triangle(Color::WHITE))
            .lighting(Some(lighting))
            .build(),
    );

    let stats = flush(&mut renderer, &mut frame);
    assert_eq!(stats.draw_calls, 1);
    assert_eq!(stats.lighting_uploads, 0);
    assert_eq!(
        renderer.backend().draws()[0].shader,
        Some(ShaderBinding::Builtin(ShaderSlot::Fill))
    );
}

#[test]
fn lit_shapes_with_different_lights_use_separate_chunks() {
    let mut renderer = renderer();
    let mut frame = FrameAccumulator::new();
    for strength in [0.2, 0.2, 0.8] {
        let mut lighting = LightingSnapshot::new();
        lighting.push(Light::ambient([strength; 3]));
        frame.submit(
            ShapeRecord::builder(Topology::Triangles)
                .vertices(triangle(Color::WHITE))
                .lighting(Some(lighting))
                .build(),
        );
    }

    let stats = flush(&mut renderer, &mut frame);
    assert_eq!(stats.light_draws, 2);
    assert_eq!(stats.lighting_uploads, 2);
    let draws = renderer.backend().draws();
    assert_eq!(draws[0].vertex_count, 6);
    assert_eq!(draws[0].light_count, Some(1));
    assert_eq!(draws[1].vertex_count, 3);
}

#[test]
fn native_lines_fall_back_to_triangles_when_unsupported() {
    let config = RendererConfig::default().with_stroke_render_mode(StrokeRenderMode::Native);
    let line = || {
        ShapeRecord::builder(Topology::Lines)
            .vertices([
                Vertex::new([0.0, 0.0, 0.0], Color::BLACK),
                Vertex::new([4.0, 0.0, 0.0], Color::BLACK),
            ])
            .stroke(StrokeAttributes::new(2.0))
            .build()
    };

    let mut native = renderer_with(RecordingBackend::new(), config.clone());
    let mut frame = FrameAccumulator::new();
    frame.submit(line());
    flush(&mut native, &mut frame);
    let draw = &native.backend().draws()[0];
    assert_eq!(draw.primitive, PrimitiveKind::Lines);
    assert_eq!(draw.vertex_count, 2);
    assert_eq!(draw.shader, Some(ShaderBinding::Builtin(ShaderSlot::Line)));

    let without_lines = RecordingBackend::new().with_capabilities(Capabilities {
        native_lines: false,
        ..Capabilities::default()
    });
    let mut fallback = renderer_with(without_lines, config);
    frame.submit(line());
    flush(&mut fallback, &mut frame);
    let draw = &fallback.backend().draws()[0];
    assert_eq!(draw.primitive, PrimitiveKind::Triangles);
    assert_eq!(draw.shader, Some(ShaderBinding::Builtin(ShaderSlot::Fill)));
}

#[test]
fn closed_stroke_triangle_without_joins_is_six_triangles() {
    let mut renderer = renderer();
    let mut frame = FrameAccumulator::new();
    frame.submit(
        ShapeRecord::builder(Topology::Triangles)
            .vertices(triangle(Color::BLACK))
            .stroke(StrokeAttributes::new(1.0).with_join(StrokeJoin::None))
            .closed(true)
            .build(),
    );

    let stats = flush(&mut renderer, &mut frame);
    assert_eq!(stats.vertices_streamed, 18);
}

#[test]
fn shapes_without_a_shader_are_skipped() {
    let backend = RecordingBackend::new().with_failing_shader(ShaderSlot::Fill);
    let mut renderer = renderer_with(backend, RendererConfig::default());
    let mut frame = FrameAccumulator::new();
    frame.submit(fill(Topology::Triangles, triangle(Color::WHITE)));

    let stats = flush(&mut renderer, &mut frame);
    assert_eq!(stats.skipped_shapes, 1);
    assert_eq!(stats.draw_calls, 0);
    assert!(renderer.backend().draws().is_empty());
}

#[test]
fn redundant_state_changes_are_elided() {
    let mut renderer = renderer();
    let mut frame = FrameAccumulator::new();
    for texture in [1, 2, 1] {
        frame.submit(
            ShapeRecord::builder(Topology::Triangles)
                .vertices(triangle(Color::WHITE))
                .texture(Some(TextureId(texture)))
                .build(),
        );
    }
    renderer.backend_mut().clear_commands();

    let stats = flush(&mut renderer, &mut frame);
    assert_eq!(stats.shader_switches, 1);
    assert_eq!(stats.pass_state_switches, 1);
    let backend = renderer.backend();
    assert_eq!(
        backend.count_commands(|command| matches!(command, BackendCommand::BindShader(_))),
        1
    );
    assert_eq!(
        backend.count_commands(|command| matches!(command, BackendCommand::BindVertexBuffer(_))),
        1
    );
}

#[test]
fn submission_order_draws_each_shape() {
    let config = RendererConfig::default().with_flush_strategy(FlushStrategy::SubmissionOrder);
    let mut renderer = renderer_with(RecordingBackend::new(), config);
    let mut frame = FrameAccumulator::new();
    frame.submit(fill(Topology::Triangles, triangle(Color::WHITE)));
    frame.submit(fill(Topology::Triangles, triangle(Color::rgba(0, 0, 0, 10))));
    frame.submit(fill(Topology::Triangles, triangle(Color::WHITE)));

    let stats = flush(&mut renderer, &mut frame);
    assert_eq!(stats.draw_calls, 3);
    let passes: Vec<_> = renderer
        .backend()
        .draws()
        .iter()
        .map(|draw| draw.pass_state)
        .collect();
    assert_eq!(
        passes,
        vec![
            Some(PassState::OPAQUE),
            Some(PassState::TRANSPARENT),
            Some(PassState::OPAQUE)
        ]
    );
}

#[test]
fn stream_grows_in_steps() {
    let config = RendererConfig::default().with_stream_policy(StreamPolicy {
        initial_capacity: 8,
        growth_step: 8,
        ..StreamPolicy::default()
    });
    let mut renderer = renderer_with(RecordingBackend::new(), config);
    assert_eq!(renderer.stream().capacity(), 8);

    let mut frame = FrameAccumulator::new();
    for _ in 0..4 {
        frame.submit(fill(Topology::Triangles, triangle(Color::WHITE)));
    }
    flush(&mut renderer, &mut frame);

    assert_eq!(renderer.stream().capacity(), 24);
    assert_eq!(renderer.backend().live_buffers(), 1);
    assert_eq!(renderer.last_stats().vertices_streamed, 12);
}

#[test]
fn regrown_stream_buffer_is_bound_on_the_next_frame() {
    let config = RendererConfig::default().with_stream_policy(StreamPolicy {
        initial_capacity: 8,
        growth_step: 8,
        ..StreamPolicy::default()
    });
    let mut renderer = renderer_with(RecordingBackend::new(), config);
    let mut frame = FrameAccumulator::new();
    frame.submit(fill(Topology::Triangles, triangle(Color::WHITE)));
    flush(&mut renderer, &mut frame);
    let first = renderer.stream().buffer().expect("stream allocated");

    for _ in 0..6 {
        frame.submit(fill(Topology::Triangles, triangle(Color::WHITE)));
    }
    renderer.backend_mut().clear_commands();
    flush(&mut renderer, &mut frame);

    let regrown = renderer.stream().buffer().expect("stream allocated");
    assert_ne!(regrown, first);
    let backend = renderer.backend();
    assert!(backend
        .commands()
        .iter()
        .any(|command| matches!(command, BackendCommand::DestroyBuffer(buffer) if *buffer == first)));
    assert!(backend.draws().iter().all(|draw| draw.buffer == Some(regrown)));
}
