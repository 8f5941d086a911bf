use ahash::HashMap;
use lyon::path::Path;
use lyon::tessellation::{
    BuffersBuilder, FillOptions, FillTessellator, FillVertex, TessellationError, VertexBuffers,
    VertexSource,
};

use super::newell_normal;
use crate::vertex::Vertex;

/// Projects the polygon onto the coordinate plane most aligned with its Newell normal.
fn project(vertices: &[Vertex]) -> impl Iterator<Item = [f32; 2]> + '_ {
    let [nx, ny, nz] = newell_normal(vertices.iter().map(|vertex| vertex.position)).map(f32::abs);
    let axes = if nz >= nx && nz >= ny {
        (0, 1)
    } else if nx >= ny {
        (1, 2)
    } else {
        (2, 0)
    };

    vertices
        .iter()
        .map(move |vertex| [vertex.position[axes.0], vertex.position[axes.1]])
}

/// Sweep-line fill with the even-odd rule.
///
/// Vertices lyon creates at self-intersections are placed on the crossing in 3D and
/// take every other attribute from the nearer endpoint of the first edge involved.
pub(super) fn sweep_fill(
    tessellator: &mut FillTessellator,
    vertices: &[Vertex],
    out: &mut Vec<Vertex>,
) -> Result<(), TessellationError> {
    let mut endpoints: HashMap<u32, usize> = HashMap::default();
    let mut builder = Path::builder();
    for (index, [x, y]) in project(vertices).enumerate() {
        let position = lyon::math::point(x, y);
        let id = if index == 0 {
            builder.begin(position)
        } else {
            builder.line_to(position)
        };
        endpoints.insert(id.0, index);
    }
    builder.end(true);
    let path = builder.build();

    let mut geometry: VertexBuffers<Vertex, u32> = VertexBuffers::new();
    let resolve = |fill_vertex: FillVertex| -> Vertex {
        let source = fill_vertex.sources().next();
        match source {
            Some(VertexSource::Endpoint { id }) => endpoints
                .get(&id.0)
                .map(|&index| vertices[index])
                .unwrap_or_default(),
            Some(VertexSource::Edge { from, to, t }) => {
                let from = endpoints.get(&from.0).map(|&index| vertices[index]);
                let to = endpoints.get(&to.0).map(|&index| vertices[index]);
                match (from, to) {
                    (Some(from), Some(to)) => {
                        let anchor = if t <= 0.5 { from } else { to };
                        anchor.moved_to(lerp(from.position, to.position, t))
                    }
                    (Some(only), None) | (None, Some(only)) => only,
                    (None, None) => Vertex::default(),
                }
            }
            None => Vertex::default(),
        }
    };

    tessellator.tessellate_path(
        &path,
        &FillOptions::default(),
        &mut BuffersBuilder::new(&mut geometry, resolve),
    )?;

    out.reserve(geometry.indices.len());
    out.extend(
        geometry
            .indices
            .iter()
            .map(|&index| geometry.vertices[index as usize]),
    );
    Ok(())
}

fn lerp(a: [f32; 3], b: [f32; 3], t: f32) -> [f32; 3] {
    [
        a[0] + (b[0] - a[0]) * t,
        a[1] + (b[1] - a[1]) * t,
        a[2] + (b[2] - a[2]) * t,
    ]
}

#[inline]
fn cross(o: [f32; 2], a: [f32; 2], b: [f32; 2]) -> f32 {
    (a[0] - o[0]) * (b[1] - o[1]) - (a[1] - o[1]) * (b[0] - o[0])
}

fn contains(a: [f32; 2], b: [f32; 2], c: [f32; 2], p: [f32; 2]) -> bool {
    cross(a, b, p) >= 0.0 && cross(b, c, p) >= 0.0 && cross(c, a, p) >= 0.0
}

/// Ear clipping on the projected outline. Appends exactly `N - 2` triangles as
/// indices; when no valid ear exists (self-intersecting or degenerate input) the
/// first remaining corner is clipped anyway.
pub(super) fn ear_clip(vertices: &[Vertex], out: &mut Vec<u32>) {
    if vertices.len() < 3 {
        return;
    }
    let points: Vec<[f32; 2]> = project(vertices).collect();

    let doubled_area: f32 = (0..points.len())
        .map(|i| {
            let (a, b) = (points[i], points[(i + 1) % points.len()]);
            a[0] * b[1] - b[0] * a[1]
        })
        .sum();

    let mut remaining: Vec<u32> = (0..points.len() as u32).collect();
    if doubled_area < 0.0 {
        remaining.reverse();
    }

    while remaining.len() > 3 {
        let count = remaining.len();
        let ear = (0..count).find(|&i| {
            let prev = points[remaining[(i + count - 1) % count] as usize];
            let current = points[remaining[i] as usize];
            let next = points[remaining[(i + 1) % count] as usize];
            if cross(prev, current, next) <= f32::EPSILON {
                return false;
            }
            !remaining.iter().enumerate().any(|(j, &other)| {
                let distance = (j + count - i) % count;
                distance > 1
                    && distance < count - 1
                    && contains(prev, current, next, points[other as usize])
            })
        });

        let i = ear.unwrap_or(0);
        out.extend_from_slice(&[
            remaining[(i + count - 1) % count],
            remaining[i],
            remaining[(i + 1) % count],
        ]);
        remaining.remove(i);
    }
    out.extend_from_slice(&remaining);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Color;

    fn outline(points: &[[f32; 3]]) -> Vec<Vertex> {
        points
            .iter()
            .enumerate()
            .map(|(i, &p)| Vertex::new(p, Color::rgb(i as u8 * 10, 0, 0)))
            .collect()
    }

    fn area_2d(triangles: &[[f32; 2]]) -> f32 {
        triangles
            .chunks_exact(3)
            .map(|t| cross(t[0], t[1], t[2]).abs() * 0.5)
            .sum()
    }

    fn concave_arrow() -> Vec<Vertex> {
        // 4x4 square with a notch cut to (2, 2) from the top edge; area 12.
        outline(&[
            [0.0, 0.0, 0.0],
            [4.0, 0.0, 0.0],
            [4.0, 4.0, 0.0],
            [2.0, 2.0, 0.0],
            [0.0, 4.0, 0.0],
        ])
    }

    #[test]
    fn ear_clip_covers_concave_area() {
        let vertices = concave_arrow();
        let mut indices = Vec::new();
        ear_clip(&vertices, &mut indices);
        assert_eq!(indices.len(), 9);
        let points: Vec<[f32; 2]> = indices
            .iter()
            .map(|&i| {
                let p = vertices[i as usize].position;
                [p[0], p[1]]
            })
            .collect();
        assert!((area_2d(&points) - 12.0).abs() < 1e-4);
    }

    #[test]
    fn sweep_covers_concave_area() {
        let vertices = concave_arrow();
        let mut tessellator = FillTessellator::new();
        let mut out = Vec::new();
        sweep_fill(&mut tessellator, &vertices, &mut out).unwrap();
        let points: Vec<[f32; 2]> = out.iter().map(|v| [v.position[0], v.position[1]]).collect();
        assert!((area_2d(&points) - 12.0).abs() < 1e-3);
        assert!(out.iter().all(|v| vertices.contains(v)));
    }

    #[test]
    fn sweep_handles_vertical_polygons() {
        // Quad in the YZ plane; projection must drop X.
        let vertices = outline(&[
            [1.0, 0.0, 0.0],
            [1.0, 2.0, 0.0],
            [1.0, 2.0, 2.0],
            [1.0, 0.0, 2.0],
        ]);
        let mut tessellator = FillTessellator::new();
        let mut out = Vec::new();
        sweep_fill(&mut tessellator, &vertices, &mut out).unwrap();
        assert_eq!(out.len(), 6);
    }

    #[test]
    fn self_intersection_inherits_nearest_attributes() {
        // Bow tie: edges 0-1 and 2-3 cross at (1, 1).
        let vertices = outline(&[
            [0.0, 0.0, 0.0],
            [2.0, 2.0, 0.0],
            [2.0, 0.0, 0.0],
            [0.0, 2.0, 0.0],
        ]);
        let mut tessellator = FillTessellator::new();
        let mut out = Vec::new();
        sweep_fill(&mut tessellator, &vertices, &mut out).unwrap();
        assert_eq!(out.len() % 3, 0);
        assert!(!out.is_empty());

        let crossing = out
            .iter()
            .find(|v| (v.position[0] - 1.0).abs() < 1e-4 && (v.position[1] - 1.0).abs() < 1e-4)
            .expect("intersection vertex");
        assert!(vertices.iter().any(|v| v.color == crossing.color));
    }
}
