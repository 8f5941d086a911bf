//! Matrix helpers on top of `euclid`.
//!
//! `euclid` uses the row-vector convention: a point is transformed as `p * M`, and
//! `a.then(&b)` applies `a` first. [`Mat4::to_array`] therefore produces exactly the
//! column-major layout a WGSL `mat4x4<f32>` expects for `M * v`.

use euclid::{Angle, Point3D, Transform3D, UnknownUnit, Vector3D};

/// 4x4 transform used for model, view and projection matrices.
pub type Mat4 = Transform3D<f32, UnknownUnit, UnknownUnit>;
pub type Vec3 = Vector3D<f32, UnknownUnit>;
pub type Point3 = Point3D<f32, UnknownUnit>;

/// Below this magnitude a homogeneous `w` is treated as zero.
const W_EPSILON: f32 = 1e-6;

/// Right-handed perspective projection with a `[0, 1]` depth range (wgpu clip space).
#[rustfmt::skip]
pub fn perspective(fov_y_radians: f32, aspect: f32, near: f32, far: f32) -> Mat4 {
    let f = 1.0 / (fov_y_radians * 0.5).tan();
    let range = near - far;
    Transform3D::new(
        f / aspect, 0.0, 0.0, 0.0,
        0.0, f, 0.0, 0.0,
        0.0, 0.0, far / range, -1.0,
        0.0, 0.0, far * near / range, 0.0,
    )
}

/// Right-handed orthographic projection with a `[0, 1]` depth range.
#[rustfmt::skip]
pub fn orthographic(left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) -> Mat4 {
    let width = right - left;
    let height = top - bottom;
    let range = near - far;
    Transform3D::new(
        2.0 / width, 0.0, 0.0, 0.0,
        0.0, 2.0 / height, 0.0, 0.0,
        0.0, 0.0, 1.0 / range, 0.0,
        -(right + left) / width, -(top + bottom) / height, near / range, 1.0,
    )
}

/// Right-handed view matrix looking from `eye` towards `center`.
#[rustfmt::skip]
pub fn look_at(eye: Point3, center: Point3, up: Vec3) -> Mat4 {
    let forward = (center - eye).normalize();
    let side = forward.cross(up).normalize();
    let up = side.cross(forward);
    let eye = eye.to_vector();

    Transform3D::new(
        side.x, up.x, -forward.x, 0.0,
        side.y, up.y, -forward.y, 0.0,
        side.z, up.z, -forward.z, 0.0,
        -side.dot(eye), -up.dot(eye), forward.dot(eye), 1.0,
    )
}

pub fn rotation_x(radians: f32) -> Mat4 {
    Transform3D::rotation(1.0, 0.0, 0.0, Angle::radians(radians))
}

pub fn rotation_y(radians: f32) -> Mat4 {
    Transform3D::rotation(0.0, 1.0, 0.0, Angle::radians(radians))
}

pub fn rotation_z(radians: f32) -> Mat4 {
    Transform3D::rotation(0.0, 0.0, 1.0, Angle::radians(radians))
}

/// Transforms `point` by `matrix` and returns the homogeneous result `[x, y, z, w]`.
#[inline]
pub fn transform_homogeneous(matrix: &Mat4, point: [f32; 3]) -> [f32; 4] {
    let [x, y, z] = point;
    [
        x * matrix.m11 + y * matrix.m21 + z * matrix.m31 + matrix.m41,
        x * matrix.m12 + y * matrix.m22 + z * matrix.m32 + matrix.m42,
        x * matrix.m13 + y * matrix.m23 + z * matrix.m33 + matrix.m43,
        x * matrix.m14 + y * matrix.m24 + z * matrix.m34 + matrix.m44,
    ]
}

/// Projected, w-divided depth of `point`. A degenerate `w` leaves z undivided.
#[inline]
pub fn projected_depth(matrix: &Mat4, point: [f32; 3]) -> f32 {
    let [_, _, z, w] = transform_homogeneous(matrix, point);
    if w.abs() < W_EPSILON {
        z
    } else {
        z / w
    }
}
