//! Conversion of submitted topologies into triangle lists or line strips.
//!
//! Everything here is CPU-only and deterministic: the same topology and vertex list
//! always produce the same output. Output vertices are copies of input vertices, so
//! colors, normals and texture coordinates are carried through untouched. The only
//! exceptions are documented on the functions that introduce geometry.

mod outline;
mod polygon;

pub use outline::{points_to_triangles, strips_to_segments, stroke_to_triangles};

use lyon::tessellation::FillTessellator;
use smallvec::SmallVec;

use crate::shape::Topology;
use crate::stroke::StrokeAttributes;
use crate::vertex::Vertex;
use crate::warn_once::WarnOnce;

/// Strategy used for [`Topology::Polygon`] fills.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum PolygonTriangulation {
    /// Fan around the first vertex. Correct only for convex polygons.
    ConvexFan,
    /// Ear clipping on the projected outline. Fast, always `N - 2` triangles, best
    /// effort on self-intersecting outlines.
    EarClip,
    /// Sweep-line fill (lyon). Handles concave and self-intersecting outlines with
    /// the even-odd rule; falls back to ear clipping if the sweep rejects the input.
    #[default]
    Sweep,
}

/// An outline expressed as indices into the owning shape's vertex list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LineStrip {
    pub indices: SmallVec<[u32; 4]>,
    pub closed: bool,
}

impl LineStrip {
    fn from_indices(indices: &[u32], closed: bool) -> Self {
        Self {
            indices: SmallVec::from_slice(indices),
            closed,
        }
    }
}

/// Closed-form number of triangles `to_triangles` yields for `vertex_count` vertices.
///
/// General polygons are counted as simple polygons (`N - 2`); the sweep strategy may
/// differ on self-intersecting or degenerate outlines.
pub fn expected_triangle_count(topology: Topology, vertex_count: usize) -> usize {
    let n = vertex_count;
    match topology {
        Topology::Points | Topology::Lines | Topology::LineStrip => 0,
        Topology::Triangles => n / 3,
        Topology::TriangleStrip | Topology::TriangleFan | Topology::Polygon => n.saturating_sub(2),
        Topology::Quads => (n / 4) * 2,
        Topology::QuadStrip => {
            if n < 4 {
                0
            } else {
                (n / 2 - 1) * 2
            }
        }
    }
}

/// Appends triangle-list indices for every topology that needs no polygon algorithm.
/// Returns `false` for topologies that cannot be expressed this way.
fn triangle_indices(topology: Topology, n: usize, out: &mut Vec<u32>) -> bool {
    match topology {
        Topology::Points | Topology::Lines | Topology::LineStrip => {}
        Topology::Triangles => {
            out.extend(0..(n - n % 3) as u32);
        }
        Topology::TriangleStrip => {
            for k in 2..n as u32 {
                if k % 2 == 0 {
                    out.extend_from_slice(&[k - 2, k - 1, k]);
                } else {
                    out.extend_from_slice(&[k - 1, k - 2, k]);
                }
            }
        }
        Topology::TriangleFan => fan_indices(n, out),
        Topology::Quads => {
            for base in (0..(n - n % 4) as u32).step_by(4) {
                out.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
            }
        }
        Topology::QuadStrip => {
            if n >= 4 {
                for base in (0..(n / 2 - 1) as u32).map(|step| step * 2) {
                    out.extend_from_slice(&[
                        base,
                        base + 1,
                        base + 3,
                        base,
                        base + 3,
                        base + 2,
                    ]);
                }
            }
        }
        Topology::Polygon => return false,
    }
    true
}

/// Newell normal of a closed outline. Its length is twice the enclosed area, so it
/// is zero for collinear or single-segment outlines.
pub(crate) fn newell_normal(positions: impl Iterator<Item = [f32; 3]> + Clone) -> [f32; 3] {
    let mut normal = [0.0f32; 3];
    let next = positions.clone().cycle().skip(1);
    for (a, b) in positions.zip(next) {
        normal[0] += (a[1] - b[1]) * (a[2] + b[2]);
        normal[1] += (a[2] - b[2]) * (a[0] + b[0]);
        normal[2] += (a[0] - b[0]) * (a[1] + b[1]);
    }
    normal
}

fn fan_indices(n: usize, out: &mut Vec<u32>) {
    for k in 2..n as u32 {
        out.extend_from_slice(&[0, k - 1, k]);
    }
}

/// Converts submitted topologies into triangle lists and outlines.
///
/// Holds reusable scratch state (the lyon fill tessellator and index buffers), so a
/// single instance should live as long as the renderer that owns it.
pub struct Tessellator {
    polygon: PolygonTriangulation,
    fill_tessellator: FillTessellator,
    scratch_indices: Vec<u32>,
    scratch_strips: Vec<LineStrip>,
    warnings: WarnOnce,
}

impl Default for Tessellator {
    fn default() -> Self {
        Self::new(PolygonTriangulation::default())
    }
}

impl Tessellator {
    pub fn new(polygon: PolygonTriangulation) -> Self {
        Self {
            polygon,
            fill_tessellator: FillTessellator::new(),
            scratch_indices: Vec::new(),
            scratch_strips: Vec::new(),
            warnings: WarnOnce::default(),
        }
    }

    pub fn polygon_triangulation(&self) -> PolygonTriangulation {
        self.polygon
    }

    pub fn set_polygon_triangulation(&mut self, polygon: PolygonTriangulation) {
        self.polygon = polygon;
    }

    /// Appends the triangle list for `vertices` interpreted as `topology` to `out`.
    ///
    /// Topologies without an interior and inputs too short for their topology append
    /// nothing.
    pub fn to_triangles(&mut self, topology: Topology, vertices: &[Vertex], out: &mut Vec<Vertex>) {
        let n = vertices.len();
        if expected_triangle_count(topology, n) == 0 {
            return;
        }

        self.scratch_indices.clear();
        if !triangle_indices(topology, n, &mut self.scratch_indices) {
            self.triangulate_polygon(vertices, out);
            return;
        }

        out.reserve(self.scratch_indices.len());
        out.extend(
            self.scratch_indices
                .iter()
                .map(|&index| vertices[index as usize]),
        );
    }

    /// Convenience wrapper returning a fresh triangle list.
    pub fn triangulate(&mut self, topology: Topology, vertices: &[Vertex]) -> Vec<Vertex> {
        let mut out = Vec::with_capacity(expected_triangle_count(topology, vertices.len()) * 3);
        self.to_triangles(topology, vertices, &mut out);
        out
    }

    fn triangulate_polygon(&mut self, vertices: &[Vertex], out: &mut Vec<Vertex>) {
        if vertices.len() == 3 {
            out.extend_from_slice(vertices);
            return;
        }

        match self.polygon {
            PolygonTriangulation::ConvexFan => {
                fan_indices(vertices.len(), &mut self.scratch_indices);
            }
            PolygonTriangulation::EarClip => {
                polygon::ear_clip(vertices, &mut self.scratch_indices);
            }
            PolygonTriangulation::Sweep => {
                match polygon::sweep_fill(&mut self.fill_tessellator, vertices, out) {
                    Ok(()) => return,
                    Err(error) => {
                        self.warnings.warn(
                            "polygon-sweep-failed",
                            format_args!(
                                "sweep triangulation rejected a polygon ({error:?}); using ear clipping"
                            ),
                        );
                        polygon::ear_clip(vertices, &mut self.scratch_indices);
                    }
                }
            }
        }

        out.extend(
            self.scratch_indices
                .iter()
                .map(|&index| vertices[index as usize]),
        );
    }

    /// Appends the outline strips of `vertices` interpreted as `topology` to `out`.
    ///
    /// Lines become independent two-vertex strips, line strips and polygons a single
    /// strip closed per `closed`, and every filled primitive its own closed loop.
    /// Points produce no strips.
    pub fn outline_to_line_strips(
        topology: Topology,
        vertex_count: usize,
        closed: bool,
        out: &mut Vec<LineStrip>,
    ) {
        let n = vertex_count as u32;
        match topology {
            Topology::Points => {}
            Topology::Lines => {
                for base in (0..n - n % 2).step_by(2) {
                    out.push(LineStrip::from_indices(&[base, base + 1], false));
                }
            }
            Topology::LineStrip | Topology::Polygon => {
                if n >= 2 {
                    out.push(LineStrip {
                        indices: (0..n).collect(),
                        closed,
                    });
                }
            }
            Topology::Triangles => {
                for base in (0..n - n % 3).step_by(3) {
                    out.push(LineStrip::from_indices(&[base, base + 1, base + 2], true));
                }
            }
            Topology::TriangleStrip => {
                for k in 2..n {
                    out.push(LineStrip::from_indices(&[k - 2, k - 1, k], true));
                }
            }
            Topology::TriangleFan => {
                for k in 2..n {
                    out.push(LineStrip::from_indices(&[0, k - 1, k], true));
                }
            }
            Topology::Quads => {
                for base in (0..n - n % 4).step_by(4) {
                    out.push(LineStrip::from_indices(
                        &[base, base + 1, base + 2, base + 3],
                        true,
                    ));
                }
            }
            Topology::QuadStrip => {
                if n >= 4 {
                    for base in (0..n / 2 - 1).map(|step| step * 2) {
                        out.push(LineStrip::from_indices(
                            &[base, base + 1, base + 3, base + 2],
                            true,
                        ));
                    }
                }
            }
        }
    }

    /// Appends the triangles covering the stroke of `vertices` interpreted as `topology`.
    pub fn stroke_to_triangles(
        &mut self,
        topology: Topology,
        vertices: &[Vertex],
        closed: bool,
        attributes: &StrokeAttributes,
        out: &mut Vec<Vertex>,
    ) {
        if attributes.is_empty() {
            return;
        }
        if topology == Topology::Points {
            points_to_triangles(vertices, attributes, out);
            return;
        }

        self.scratch_strips.clear();
        Self::outline_to_line_strips(topology, vertices.len(), closed, &mut self.scratch_strips);
        for strip in &self.scratch_strips {
            stroke_to_triangles(vertices, strip, attributes, out);
        }
    }

    /// Appends a line list (vertex pairs) for native line rendering of the outline.
    pub fn stroke_to_segments(
        &mut self,
        topology: Topology,
        vertices: &[Vertex],
        closed: bool,
        out: &mut Vec<Vertex>,
    ) {
        self.scratch_strips.clear();
        Self::outline_to_line_strips(topology, vertices.len(), closed, &mut self.scratch_strips);
        strips_to_segments(vertices, &self.scratch_strips, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Color;

    fn numbered(count: usize) -> Vec<Vertex> {
        (0..count)
            .map(|i| {
                let angle = i as f32 / count as f32 * std::f32::consts::TAU;
                Vertex::new([angle.cos(), angle.sin(), 0.0], Color::rgb(i as u8, 0, 0))
                    .with_tex_coords([i as f32, 0.0])
            })
            .collect()
    }

    const FILLABLE: [Topology; 6] = [
        Topology::Triangles,
        Topology::TriangleStrip,
        Topology::TriangleFan,
        Topology::Quads,
        Topology::QuadStrip,
        Topology::Polygon,
    ];

    #[test]
    fn triangle_counts_match_closed_form() {
        for strategy in [
            PolygonTriangulation::ConvexFan,
            PolygonTriangulation::EarClip,
            PolygonTriangulation::Sweep,
        ] {
            let mut tessellator = Tessellator::new(strategy);
            for topology in FILLABLE {
                for n in 0..14 {
                    let vertices = numbered(n);
                    let triangles = tessellator.triangulate(topology, &vertices);
                    assert_eq!(triangles.len() % 3, 0);
                    assert_eq!(
                        triangles.len() / 3,
                        expected_triangle_count(topology, n),
                        "{topology:?} with {n} vertices using {strategy:?}"
                    );
                }
            }
        }
    }

    #[test]
    fn fan_and_quads_closed_forms() {
        assert_eq!(expected_triangle_count(Topology::TriangleFan, 7), 5);
        assert_eq!(expected_triangle_count(Topology::Quads, 9), 4);
        assert_eq!(expected_triangle_count(Topology::QuadStrip, 6), 4);
        assert_eq!(expected_triangle_count(Topology::Triangles, 2), 0);
    }

    #[test]
    fn malformed_input_yields_nothing() {
        let mut tessellator = Tessellator::default();
        for topology in FILLABLE {
            assert!(tessellator.triangulate(topology, &numbered(2)).is_empty());
        }
        assert!(tessellator
            .triangulate(Topology::LineStrip, &numbered(6))
            .is_empty());
    }

    #[test]
    fn output_vertices_trace_back_to_inputs() {
        let mut tessellator = Tessellator::default();
        let vertices = numbered(8);
        for topology in FILLABLE {
            for vertex in tessellator.triangulate(topology, &vertices) {
                assert!(
                    vertices.contains(&vertex),
                    "{topology:?} invented a vertex: {vertex:?}"
                );
            }
        }
    }

    #[test]
    fn strip_winding_alternates() {
        let vertices = numbered(5);
        let mut tessellator = Tessellator::default();
        let triangles = tessellator.triangulate(Topology::TriangleStrip, &vertices);
        let order: Vec<f32> = triangles.iter().map(|v| v.tex_coords[0]).collect();
        assert_eq!(
            order,
            vec![0.0, 1.0, 2.0, 2.0, 1.0, 3.0, 2.0, 3.0, 4.0]
        );
    }

    #[test]
    fn quads_split_along_first_diagonal() {
        let vertices = numbered(4);
        let mut tessellator = Tessellator::default();
        let triangles = tessellator.triangulate(Topology::Quads, &vertices);
        let order: Vec<f32> = triangles.iter().map(|v| v.tex_coords[0]).collect();
        assert_eq!(order, vec![0.0, 1.0, 2.0, 0.0, 2.0, 3.0]);
    }

    #[test]
    fn outlines_per_topology() {
        let mut strips = Vec::new();
        Tessellator::outline_to_line_strips(Topology::Lines, 5, false, &mut strips);
        assert_eq!(strips.len(), 2);
        assert!(strips.iter().all(|s| s.indices.len() == 2 && !s.closed));

        strips.clear();
        Tessellator::outline_to_line_strips(Topology::QuadStrip, 6, false, &mut strips);
        assert_eq!(strips.len(), 2);
        assert_eq!(strips[1].indices.as_slice(), &[2, 3, 5, 4]);
        assert!(strips.iter().all(|s| s.closed));

        strips.clear();
        Tessellator::outline_to_line_strips(Topology::Polygon, 4, true, &mut strips);
        assert_eq!(strips.len(), 1);
        assert!(strips[0].closed);

        strips.clear();
        Tessellator::outline_to_line_strips(Topology::Points, 4, true, &mut strips);
        assert!(strips.is_empty());
    }
}
