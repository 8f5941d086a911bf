/// Custom shape shader that ignores vertex colors and draws everything in a flat
/// tint. Uses the builtin bind group layout.
pub const FLAT_TINT_WGSL: &str = r#"
struct Camera {
    view_projection: mat4x4<f32>,
}

struct Transforms {
    models: array<mat4x4<f32>, 256>,
}

@group(0) @binding(0) var<uniform> camera: Camera;
@group(0) @binding(1) var<uniform> transforms: Transforms;

struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
    @location(2) color: vec4<f32>,
    @location(3) tex_coords: vec2<f32>,
    @location(4) transform_index: u32,
}

@vertex
fn vs_main(input: VertexInput) -> @builtin(position) vec4<f32> {
    let model = transforms.models[input.transform_index];
    return camera.view_projection * model * vec4<f32>(input.position, 1.0);
}

@fragment
fn fs_main() -> @location(0) vec4<f32> {
    return vec4<f32>(0.2, 0.6, 0.9, 1.0);
}
"#;
