use std::f32::consts::{PI, TAU};

use smallvec::SmallVec;

use super::{newell_normal, LineStrip};
use crate::stroke::{StrokeAttributes, StrokeCap, StrokeJoin};
use crate::vertex::Vertex;

type Vec2 = [f32; 2];
type Vec3 = [f32; 3];

#[inline]
fn sub(a: Vec2, b: Vec2) -> Vec2 {
    [a[0] - b[0], a[1] - b[1]]
}

#[inline]
fn add_scaled(p: Vec2, v: Vec2, s: f32) -> Vec2 {
    [p[0] + v[0] * s, p[1] + v[1] * s]
}

#[inline]
fn dot(a: Vec2, b: Vec2) -> f32 {
    a[0] * b[0] + a[1] * b[1]
}

#[inline]
fn cross(a: Vec2, b: Vec2) -> f32 {
    a[0] * b[1] - a[1] * b[0]
}

/// Counter-clockwise perpendicular.
#[inline]
fn perp(v: Vec2) -> Vec2 {
    [-v[1], v[0]]
}

#[inline]
fn rotate(v: Vec2, angle: f32) -> Vec2 {
    let (sin, cos) = angle.sin_cos();
    [v[0] * cos - v[1] * sin, v[0] * sin + v[1] * cos]
}

fn normalize(v: Vec2) -> Option<Vec2> {
    let length = dot(v, v).sqrt();
    (length > 1e-6).then(|| [v[0] / length, v[1] / length])
}

#[inline]
fn sub3(a: Vec3, b: Vec3) -> Vec3 {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

#[inline]
fn dot3(a: Vec3, b: Vec3) -> f32 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

#[inline]
fn cross3(a: Vec3, b: Vec3) -> Vec3 {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

/// `a - b * s`
#[inline]
fn reject(a: Vec3, b: Vec3, s: f32) -> Vec3 {
    [a[0] - b[0] * s, a[1] - b[1] * s, a[2] - b[2] * s]
}

fn normalize3(v: Vec3) -> Option<Vec3> {
    let length = dot3(v, v).sqrt();
    (length > 1e-6).then(|| [v[0] / length, v[1] / length, v[2] / length])
}

/// Orthonormal frame of the plane a stroke is built in.
///
/// Points are expressed as in-plane coordinates along `u` and `v` plus a height
/// along `normal`. Generated geometry keeps the height of the outline vertex it is
/// built around, so strokes of planar outlines stay in their plane.
#[derive(Clone, Copy, Debug)]
struct StrokePlane {
    origin: Vec3,
    u: Vec3,
    v: Vec3,
    normal: Vec3,
}

impl StrokePlane {
    /// The XY plane through the origin, used for points.
    const XY: StrokePlane = StrokePlane {
        origin: [0.0; 3],
        u: [1.0, 0.0, 0.0],
        v: [0.0, 1.0, 0.0],
        normal: [0.0, 0.0, 1.0],
    };

    /// Plane of the outline when it encloses an area. Straight outlines get the
    /// plane containing the line that faces +Z, or +Y for lines along Z.
    fn fit(points: &[&Vertex]) -> Self {
        let Some(first) = points.first() else {
            return Self::XY;
        };
        let normal = normalize3(newell_normal(points.iter().map(|vertex| vertex.position)))
            .or_else(|| {
                let direction = points
                    .windows(2)
                    .find_map(|pair| normalize3(sub3(pair[1].position, pair[0].position)))?;
                let up = if direction[2].abs() > 0.9 {
                    [0.0, 1.0, 0.0]
                } else {
                    [0.0, 0.0, 1.0]
                };
                normalize3(reject(up, direction, dot3(up, direction)))
            })
            .unwrap_or([0.0, 0.0, 1.0]);
        Self::with_normal(first.position, normal)
    }

    fn with_normal(origin: Vec3, normal: Vec3) -> Self {
        // Coordinate axis least aligned with the normal.
        let magnitudes = normal.map(f32::abs);
        let helper = if magnitudes[0] <= magnitudes[1] && magnitudes[0] <= magnitudes[2] {
            [1.0, 0.0, 0.0]
        } else if magnitudes[1] <= magnitudes[2] {
            [0.0, 1.0, 0.0]
        } else {
            [0.0, 0.0, 1.0]
        };
        let u = normalize3(reject(helper, normal, dot3(helper, normal))).unwrap_or([1.0, 0.0, 0.0]);
        Self {
            origin,
            u,
            v: cross3(normal, u),
            normal,
        }
    }

    fn anchor<'v>(&self, vertex: &'v Vertex) -> Anchor<'v> {
        let offset = sub3(vertex.position, self.origin);
        Anchor {
            vertex,
            point: [dot3(offset, self.u), dot3(offset, self.v)],
            height: dot3(offset, self.normal),
        }
    }

    fn lift(&self, point: Vec2, height: f32) -> Vec3 {
        let mut position = self.origin;
        for axis in 0..3 {
            position[axis] +=
                self.u[axis] * point[0] + self.v[axis] * point[1] + self.normal[axis] * height;
        }
        position
    }
}

/// An outline vertex expressed in its stroke plane.
#[derive(Clone, Copy, Debug)]
struct Anchor<'v> {
    vertex: &'v Vertex,
    point: Vec2,
    height: f32,
}

struct Emitter<'a> {
    out: &'a mut Vec<Vertex>,
    plane: StrokePlane,
}

impl Emitter<'_> {
    #[inline]
    fn at(&self, anchor: &Anchor<'_>, p: Vec2) -> Vertex {
        anchor.vertex.moved_to(self.plane.lift(p, anchor.height))
    }

    fn triangle(&mut self, anchor: &Anchor<'_>, a: Vec2, b: Vec2, c: Vec2) {
        let triangle = [self.at(anchor, a), self.at(anchor, b), self.at(anchor, c)];
        self.out.extend_from_slice(&triangle);
    }

    /// Fan of triangles around `center`, sweeping `start` by `angle` radians.
    fn fan(&mut self, anchor: &Anchor<'_>, center: Vec2, start: Vec2, angle: f32, radius: f32, resolution: f32) {
        let steps = StrokeAttributes::fan_steps(angle, resolution);
        let step = angle / steps as f32;
        let mut previous = add_scaled(center, start, radius);
        for s in 1..=steps {
            let next = add_scaled(center, rotate(start, step * s as f32), radius);
            self.triangle(anchor, center, previous, next);
            previous = next;
        }
    }
}

/// Appends the triangles of a stroke along one outline strip.
///
/// The stroke is built in the plane of the outline (see [`StrokePlane::fit`]):
/// every segment becomes a quad of width `weight` perpendicular to it within that
/// plane, then corners and open ends are closed per the join and cap styles. New
/// vertices copy the attributes of the outline vertex they are built around.
pub fn stroke_to_triangles(
    vertices: &[Vertex],
    strip: &LineStrip,
    attributes: &StrokeAttributes,
    out: &mut Vec<Vertex>,
) {
    if attributes.is_empty() {
        return;
    }

    let mut outline: SmallVec<[&Vertex; 16]> = strip
        .indices
        .iter()
        .filter_map(|&index| vertices.get(index as usize))
        .collect();
    outline.dedup_by(|next, previous| {
        normalize3(sub3(next.position, previous.position)).is_none()
    });
    if strip.closed && outline.len() > 2 {
        if let (Some(first), Some(last)) = (outline.first(), outline.last()) {
            if normalize3(sub3(last.position, first.position)).is_none() {
                outline.pop();
            }
        }
    }

    let plane = StrokePlane::fit(&outline);
    let mut points: SmallVec<[Anchor<'_>; 16]> =
        outline.iter().map(|&vertex| plane.anchor(vertex)).collect();
    // Segments running along the plane normal of a non-planar outline have no
    // in-plane extent.
    points.dedup_by(|next, previous| normalize(sub(next.point, previous.point)).is_none());

    let count = points.len();
    if count < 2 {
        return;
    }
    let closed = strip.closed && count >= 3;
    let half = attributes.half_weight();
    let mut emitter = Emitter { out, plane };

    let segment_count = if closed { count } else { count - 1 };
    let direction = |i: usize| -> Vec2 {
        let from = points[i % count].point;
        let to = points[(i + 1) % count].point;
        normalize(sub(to, from)).unwrap_or([1.0, 0.0])
    };

    for i in 0..segment_count {
        let (a, b) = (&points[i], &points[(i + 1) % count]);
        let normal = perp(direction(i));
        let quad = [
            emitter.at(a, add_scaled(a.point, normal, half)),
            emitter.at(a, add_scaled(a.point, normal, -half)),
            emitter.at(b, add_scaled(b.point, normal, -half)),
        ];
        let b_left = emitter.at(b, add_scaled(b.point, normal, half));
        emitter
            .out
            .extend_from_slice(&[quad[0], quad[1], quad[2], quad[0], quad[2], b_left]);
    }

    if attributes.join != StrokeJoin::None {
        let corners = if closed { 0..count } else { 1..count - 1 };
        for i in corners {
            let incoming = direction((i + count - 1) % count);
            let outgoing = direction(i);
            join(&mut emitter, &points[i], incoming, outgoing, attributes);
        }
    }

    if !closed {
        let first = direction(0);
        let last = direction(count - 2);
        cap(&mut emitter, &points[0], [-first[0], -first[1]], attributes);
        cap(&mut emitter, &points[count - 1], last, attributes);
    }
}

fn join(
    emitter: &mut Emitter<'_>,
    anchor: &Anchor<'_>,
    incoming: Vec2,
    outgoing: Vec2,
    attributes: &StrokeAttributes,
) {
    let turn = cross(incoming, outgoing);
    let alignment = dot(incoming, outgoing).clamp(-1.0, 1.0);
    if turn.abs() < 1e-6 && alignment > 0.0 {
        return;
    }

    let half = attributes.half_weight();
    let center = anchor.point;
    // The gap opens on the side opposite to the turn.
    let side = if turn > 0.0 { -1.0 } else { 1.0 };
    let n0 = perp(incoming).map(|c| c * side);
    let n1 = perp(outgoing).map(|c| c * side);
    let outer_start = add_scaled(center, n0, half);
    let outer_end = add_scaled(center, n1, half);

    match attributes.join {
        StrokeJoin::None => {}
        StrokeJoin::Bevel => emitter.triangle(anchor, center, outer_start, outer_end),
        StrokeJoin::Miter => {
            let interior = PI - alignment.acos();
            let bisector = normalize([n0[0] + n1[0], n0[1] + n1[1]]);
            match bisector {
                Some(bisector) if interior >= attributes.min_miter_angle => {
                    let length = half / dot(bisector, n0).max(1e-3);
                    let tip = add_scaled(center, bisector, length);
                    emitter.triangle(anchor, center, outer_start, tip);
                    emitter.triangle(anchor, center, tip, outer_end);
                }
                _ => emitter.triangle(anchor, center, outer_start, outer_end),
            }
        }
        StrokeJoin::Round => {
            let sweep = alignment.acos();
            let mut sign = cross(n0, n1).signum();
            if cross(n0, n1).abs() < 1e-6 {
                // Full reversal: go around the front of the incoming segment.
                sign = if dot(perp(n0), incoming) > 0.0 { 1.0 } else { -1.0 };
            }
            emitter.fan(anchor, center, n0, sign * sweep, half, attributes.join_resolution);
        }
    }
}

/// `outward` points away from the stroke body.
fn cap(emitter: &mut Emitter<'_>, anchor: &Anchor<'_>, outward: Vec2, attributes: &StrokeAttributes) {
    let half = attributes.half_weight();
    let center = anchor.point;
    let side = perp(outward);
    match attributes.cap {
        StrokeCap::Butt => {}
        StrokeCap::Square => {
            let left = add_scaled(center, side, half);
            let right = add_scaled(center, side, -half);
            let far_left = add_scaled(left, outward, half);
            let far_right = add_scaled(right, outward, half);
            emitter.triangle(anchor, left, right, far_right);
            emitter.triangle(anchor, left, far_right, far_left);
        }
        StrokeCap::Round => {
            emitter.fan(anchor, center, side, -PI, half, attributes.cap_resolution);
        }
    }
}

/// Appends a disc (round cap) or square per vertex, `weight` across, facing +Z.
pub fn points_to_triangles(vertices: &[Vertex], attributes: &StrokeAttributes, out: &mut Vec<Vertex>) {
    if attributes.is_empty() {
        return;
    }
    let half = attributes.half_weight();
    let mut emitter = Emitter {
        out,
        plane: StrokePlane::XY,
    };
    for vertex in vertices {
        let anchor = StrokePlane::XY.anchor(vertex);
        let center = anchor.point;
        match attributes.cap {
            StrokeCap::Round => {
                emitter.fan(&anchor, center, [1.0, 0.0], TAU, half, attributes.cap_resolution);
            }
            StrokeCap::Butt | StrokeCap::Square => {
                let min = add_scaled(center, [1.0, 1.0], -half);
                let max = add_scaled(center, [1.0, 1.0], half);
                emitter.triangle(&anchor, min, [max[0], min[1]], max);
                emitter.triangle(&anchor, min, max, [min[0], max[1]]);
            }
        }
    }
}

/// Flattens outline strips into a line list of vertex pairs.
pub fn strips_to_segments(vertices: &[Vertex], strips: &[LineStrip], out: &mut Vec<Vertex>) {
    for strip in strips {
        let indices = &strip.indices;
        for pair in indices.windows(2) {
            out.push(vertices[pair[0] as usize]);
            out.push(vertices[pair[1] as usize]);
        }
        if strip.closed && indices.len() > 2 {
            if let (Some(&last), Some(&first)) = (indices.last(), indices.first()) {
                out.push(vertices[last as usize]);
                out.push(vertices[first as usize]);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::Topology;
    use crate::tessellator::Tessellator;
    use crate::Color;

    fn triangle_outline() -> Vec<Vertex> {
        vec![
            Vertex::new([0.0, 0.0, 0.0], Color::rgb(255, 0, 0)),
            Vertex::new([10.0, 0.0, 0.0], Color::rgb(0, 255, 0)),
            Vertex::new([5.0, 8.0, 0.0], Color::rgb(0, 0, 255)),
        ]
    }

    fn closed_strip(n: u32) -> LineStrip {
        LineStrip {
            indices: (0..n).collect(),
            closed: true,
        }
    }

    #[test]
    fn closed_triangle_without_joins_is_three_quads() {
        let vertices = triangle_outline();
        let attributes = StrokeAttributes::new(2.0).with_join(StrokeJoin::None);
        let mut out = Vec::new();
        stroke_to_triangles(&vertices, &closed_strip(3), &attributes, &mut out);
        assert_eq!(out.len(), 18);
    }

    #[test]
    fn bevel_adds_one_triangle_per_corner() {
        let vertices = triangle_outline();
        let attributes = StrokeAttributes::new(2.0).with_join(StrokeJoin::Bevel);
        let mut out = Vec::new();
        stroke_to_triangles(&vertices, &closed_strip(3), &attributes, &mut out);
        assert_eq!(out.len(), 18 + 9);
    }

    #[test]
    fn sharp_miter_falls_back_to_bevel() {
        // Corner of roughly 0.2 rad at (10, 0).
        let vertices = vec![
            Vertex::new([0.0, 0.0, 0.0], Color::WHITE),
            Vertex::new([10.0, 0.0, 0.0], Color::WHITE),
            Vertex::new([0.0, 2.0, 0.0], Color::WHITE),
        ];
        let strip = LineStrip {
            indices: (0..3).collect(),
            closed: false,
        };
        let attributes = StrokeAttributes::new(1.0)
            .with_join(StrokeJoin::Miter)
            .with_cap(StrokeCap::Butt);
        let mut out = Vec::new();
        stroke_to_triangles(&vertices, &strip, &attributes, &mut out);
        // Two segment quads plus a single bevel triangle.
        assert_eq!(out.len(), 12 + 3);

        let mut wide = Vec::new();
        stroke_to_triangles(
            &vertices,
            &strip,
            &attributes.with_min_miter_angle(0.0),
            &mut wide,
        );
        assert_eq!(wide.len(), 12 + 6);
    }

    #[test]
    fn stroke_vertices_stay_within_reach_of_the_outline() {
        let vertices = triangle_outline();
        let attributes = StrokeAttributes::new(2.0)
            .with_join(StrokeJoin::Round)
            .with_cap(StrokeCap::Round);
        let mut out = Vec::new();
        stroke_to_triangles(
            &vertices,
            &LineStrip {
                indices: (0..3).collect(),
                closed: false,
            },
            &attributes,
            &mut out,
        );
        assert!(!out.is_empty());
        for vertex in &out {
            let near = vertices.iter().any(|source| {
                source.color == vertex.color && source.position[2] == vertex.position[2]
            });
            assert!(near, "stroke vertex lost its attributes: {vertex:?}");
        }
    }

    #[test]
    fn caps_extend_open_ends() {
        let vertices = vec![
            Vertex::new([0.0, 0.0, 0.0], Color::WHITE),
            Vertex::new([4.0, 0.0, 0.0], Color::WHITE),
        ];
        let strip = LineStrip {
            indices: (0..2).collect(),
            closed: false,
        };
        let square = StrokeAttributes::new(2.0).with_cap(StrokeCap::Square);
        let mut out = Vec::new();
        stroke_to_triangles(&vertices, &strip, &square, &mut out);
        let min_x = out.iter().map(|v| v.position[0]).fold(f32::INFINITY, f32::min);
        let max_x = out.iter().map(|v| v.position[0]).fold(f32::NEG_INFINITY, f32::max);
        assert!((min_x + 1.0).abs() < 1e-5);
        assert!((max_x - 5.0).abs() < 1e-5);
    }

    #[test]
    fn lines_along_depth_are_stroked() {
        let vertices = vec![
            Vertex::new([0.0, 0.0, 0.0], Color::WHITE),
            Vertex::new([0.0, 0.0, -10.0], Color::WHITE),
        ];
        let strip = LineStrip {
            indices: (0..2).collect(),
            closed: false,
        };
        let attributes = StrokeAttributes::new(2.0).with_cap(StrokeCap::Butt);
        let mut out = Vec::new();
        stroke_to_triangles(&vertices, &strip, &attributes, &mut out);
        assert_eq!(out.len(), 6);

        let range = |axis: usize| {
            out.iter().fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), v| {
                (lo.min(v.position[axis]), hi.max(v.position[axis]))
            })
        };
        let (min_z, max_z) = range(2);
        assert!((min_z + 10.0).abs() < 1e-5 && max_z.abs() < 1e-5);
        // Width is perpendicular to the line, not collapsed onto it.
        let (min_x, max_x) = range(0);
        let (min_y, max_y) = range(1);
        assert!(((max_x - min_x) + (max_y - min_y) - 2.0).abs() < 1e-5);
    }

    #[test]
    fn outlines_in_the_yz_plane_keep_every_edge() {
        let vertices = vec![
            Vertex::new([0.0, 0.0, 0.0], Color::WHITE),
            Vertex::new([0.0, 4.0, 0.0], Color::WHITE),
            Vertex::new([0.0, 4.0, -4.0], Color::WHITE),
            Vertex::new([0.0, 0.0, -4.0], Color::WHITE),
        ];
        let attributes = StrokeAttributes::new(2.0).with_join(StrokeJoin::None);
        let mut out = Vec::new();
        stroke_to_triangles(&vertices, &closed_strip(4), &attributes, &mut out);
        assert_eq!(out.len(), 4 * 6);
        assert!(out.iter().all(|v| v.position[0].abs() < 1e-5));
        assert!(out
            .iter()
            .all(|v| (-1.0 - 1e-5..=5.0 + 1e-5).contains(&v.position[1])
                && (-5.0 - 1e-5..=1.0 + 1e-5).contains(&v.position[2])));
    }

    #[test]
    fn flat_outlines_keep_their_depth() {
        let vertices: Vec<Vertex> = triangle_outline()
            .into_iter()
            .map(|v| v.moved_to([v.position[0], v.position[1], 3.0]))
            .collect();
        let attributes = StrokeAttributes::new(2.0).with_join(StrokeJoin::Round);
        let mut out = Vec::new();
        stroke_to_triangles(&vertices, &closed_strip(3), &attributes, &mut out);
        assert!(!out.is_empty());
        assert!(out.iter().all(|v| (v.position[2] - 3.0).abs() < 1e-4));
    }

    #[test]
    fn points_become_discs() {
        let vertices = vec![Vertex::new([1.0, 1.0, 0.0], Color::WHITE)];
        let mut out = Vec::new();
        points_to_triangles(&vertices, &StrokeAttributes::new(4.0), &mut out);
        assert_eq!(out.len(), 16 * 3);
        assert!(out
            .iter()
            .all(|v| ((v.position[0] - 1.0).powi(2) + (v.position[1] - 1.0).powi(2)).sqrt() <= 2.0 + 1e-4));
    }

    #[test]
    fn segments_close_loops() {
        let vertices = triangle_outline();
        let mut tessellator = Tessellator::default();
        let mut out = Vec::new();
        tessellator.stroke_to_segments(Topology::Polygon, &vertices, true, &mut out);
        assert_eq!(out.len(), 6);
        assert_eq!(out[5], vertices[0]);
    }
}
