use std::f32::consts::{FRAC_PI_2, FRAC_PI_4};

use euclid::approxeq::ApproxEq;
use tessera::math::{
    look_at, perspective, projected_depth, rotation_x, transform_homogeneous, Point3, Vec3,
};
use tessera::Mat4;

/// A matrix as the shader sees it: `Mat4::to_array` uploaded into a WGSL
/// `mat4x4<f32>`, i.e. four consecutive columns.
struct ShaderMatrix {
    columns: [[f32; 4]; 4],
}

impl ShaderMatrix {
    fn from_upload(matrix: &Mat4) -> Self {
        let floats = matrix.to_array();
        let mut columns = [[0.0; 4]; 4];
        for (index, value) in floats.iter().enumerate() {
            columns[index / 4][index % 4] = *value;
        }
        Self { columns }
    }

    /// `M * v` as WGSL evaluates it.
    fn mul_vec4(&self, v: [f32; 4]) -> [f32; 4] {
        let mut out = [0.0; 4];
        for (column, weight) in self.columns.iter().zip(v) {
            for row in 0..4 {
                out[row] += column[row] * weight;
            }
        }
        out
    }
}

fn assert_close(actual: [f32; 4], expected: [f32; 4]) {
    for axis in 0..4 {
        assert!(
            (actual[axis] - expected[axis]).abs() < 1e-4,
            "component {axis}: expected {expected:?}, got {actual:?}"
        );
    }
}

fn camera() -> Mat4 {
    let view = look_at(
        Point3::new(0.0, 2.0, 10.0),
        Point3::new(0.0, 0.0, 0.0),
        Vec3::new(0.0, 1.0, 0.0),
    );
    view.then(&perspective(FRAC_PI_2, 16.0 / 9.0, 0.1, 100.0))
}

#[test]
fn uploaded_matrices_match_cpu_transforms() {
    let model = rotation_x(FRAC_PI_4).then(&Mat4::translation(1.0, -2.0, 3.0));
    let model_view_projection = model.then(&camera());
    let shader = ShaderMatrix::from_upload(&model_view_projection);

    for point in [[0.0, 0.0, 0.0], [50.0, -50.0, 0.0], [-3.0, 4.0, -7.5]] {
        let on_gpu = shader.mul_vec4([point[0], point[1], point[2], 1.0]);
        assert_close(on_gpu, transform_homogeneous(&model_view_projection, point));
    }
}

#[test]
fn model_then_camera_matches_two_uploads() {
    // The vertex shader multiplies camera * model * position; the renderer sorts
    // with model.then(camera). Both must agree.
    let model = Mat4::translation(0.0, 0.0, -4.0).then(&Mat4::scale(2.0, 2.0, 2.0));
    let camera = camera();
    let point = [1.0, 1.0, 1.0];

    let world = ShaderMatrix::from_upload(&model).mul_vec4([point[0], point[1], point[2], 1.0]);
    let clip = ShaderMatrix::from_upload(&camera).mul_vec4(world);
    assert_close(clip, transform_homogeneous(&model.then(&camera), point));
}

#[test]
fn tilted_rectangle_projects_like_euclid() {
    let model_view_projection = rotation_x(FRAC_PI_4)
        .then(&Mat4::translation(0.0, 0.0, -200.0))
        .then(&perspective(FRAC_PI_2, 1.0, 1.0, 1000.0));

    for corner in [[-50.0, -50.0], [50.0, -50.0], [-50.0, 50.0], [50.0, 50.0]] {
        let expected = model_view_projection
            .transform_point3d(Point3::new(corner[0], corner[1], 0.0))
            .expect("corner in front of the camera");
        let [x, y, z, w] = transform_homogeneous(&model_view_projection, [corner[0], corner[1], 0.0]);
        assert!(Point3::new(x / w, y / w, z / w).approx_eq_eps(&expected, &Point3::new(1e-4, 1e-4, 1e-6)));
        assert!((0.0..=1.0).contains(&(z / w)), "depth {} outside [0, 1]", z / w);
    }
}

#[test]
fn farther_points_have_greater_depth() {
    let camera = camera();
    let depths: Vec<f32> = [-1.0, -5.0, -30.0]
        .iter()
        .map(|&z| projected_depth(&camera, [0.0, 0.0, z]))
        .collect();
    assert!(depths.windows(2).all(|pair| pair[0] < pair[1]), "{depths:?}");
}
