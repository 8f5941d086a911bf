//! Draw order: which shapes are drawn together and in what sequence.

use std::cmp::Ordering;

use super::types::{primitive_rank, Batch, PreparedFrame, PreparedShape, ShapeClass};
use crate::config::FlushStrategy;

/// Fills `frame.order` and `frame.batches` from `frame.shapes`.
pub(super) fn build_batches(frame: &mut PreparedFrame, strategy: FlushStrategy) {
    frame.order.clear();
    frame.batches.clear();
    frame.order.extend(0..frame.shapes.len());

    let shapes = &frame.shapes;
    match strategy {
        FlushStrategy::SubmissionOrder => {
            frame
                .batches
                .extend(frame.order.iter().enumerate().map(|(position, &shape)| Batch {
                    key: shapes[shape].key,
                    class: shapes[shape].class,
                    shapes: position..position + 1,
                }));
        }
        FlushStrategy::SortedByDepth => {
            // Stable: equal keys keep submission order.
            frame
                .order
                .sort_by(|&a, &b| compare(&shapes[a], &shapes[b]));

            let mut start = 0;
            for position in 1..=frame.order.len() {
                let first = &shapes[frame.order[start]];
                let ends_run = position == frame.order.len() || {
                    let next = &shapes[frame.order[position]];
                    next.class != first.class || next.key != first.key
                };
                if ends_run {
                    frame.batches.push(Batch {
                        key: first.key,
                        class: first.class,
                        shapes: start..position,
                    });
                    start = position;
                }
            }
        }
    }
}

/// Opaque, then lit, then transparent. Within a pass triangles come before native
/// lines and points. Opaque and lit shapes group by first appearance of their
/// batch key; transparent shapes go back to front.
fn compare(a: &PreparedShape, b: &PreparedShape) -> Ordering {
    a.class
        .cmp(&b.class)
        .then_with(|| primitive_rank(a.key.primitive).cmp(&primitive_rank(b.key.primitive)))
        .then_with(|| match a.class {
            ShapeClass::Transparent => b.depth.total_cmp(&a.depth),
            ShapeClass::Opaque | ShapeClass::Light => a.group.cmp(&b.group),
        })
}

#[cfg(test)]
mod tests {
    use super::super::types::{BatchKey, ShapeSource};
    use super::*;
    use crate::backend::{PrimitiveKind, ShaderBinding, ShaderSlot};
    use crate::id::TextureId;

    fn shape(record: usize, class: ShapeClass, texture: Option<u64>, depth: f32) -> PreparedShape {
        PreparedShape {
            record,
            class,
            key: BatchKey {
                texture: texture.map(TextureId),
                shader: ShaderBinding::Builtin(ShaderSlot::Fill),
                primitive: PrimitiveKind::Triangles,
            },
            source: ShapeSource::Stream(0..3),
            group: texture.map_or(0, |t| t as usize),
            depth,
            uses_lighting: false,
        }
    }

    fn records_in_order(frame: &PreparedFrame) -> Vec<usize> {
        frame.order.iter().map(|&i| frame.shapes[i].record).collect()
    }

    #[test]
    fn groups_opaque_by_first_appearance() {
        let mut frame = PreparedFrame::default();
        frame.shapes = vec![
            shape(0, ShapeClass::Opaque, Some(1), 0.0),
            shape(1, ShapeClass::Opaque, Some(2), 0.0),
            shape(2, ShapeClass::Opaque, Some(1), 0.0),
        ];
        build_batches(&mut frame, FlushStrategy::SortedByDepth);
        assert_eq!(records_in_order(&frame), vec![0, 2, 1]);
        assert_eq!(frame.batches.len(), 2);
        assert_eq!(frame.batches[0].shapes, 0..2);
    }

    #[test]
    fn transparent_last_and_back_to_front() {
        let mut frame = PreparedFrame::default();
        frame.shapes = vec![
            shape(0, ShapeClass::Transparent, None, 0.2),
            shape(1, ShapeClass::Opaque, None, 0.0),
            shape(2, ShapeClass::Transparent, None, 0.9),
            shape(3, ShapeClass::Light, None, 0.0),
            shape(4, ShapeClass::Transparent, None, 0.5),
        ];
        build_batches(&mut frame, FlushStrategy::SortedByDepth);
        assert_eq!(records_in_order(&frame), vec![1, 3, 2, 4, 0]);
        let classes: Vec<ShapeClass> = frame.batches.iter().map(|b| b.class).collect();
        assert_eq!(
            classes,
            vec![ShapeClass::Opaque, ShapeClass::Light, ShapeClass::Transparent]
        );
    }

    #[test]
    fn submission_order_draws_each_shape_alone() {
        let mut frame = PreparedFrame::default();
        frame.shapes = vec![
            shape(0, ShapeClass::Transparent, None, 0.2),
            shape(1, ShapeClass::Opaque, None, 0.0),
            shape(2, ShapeClass::Opaque, None, 0.0),
        ];
        build_batches(&mut frame, FlushStrategy::SubmissionOrder);
        assert_eq!(records_in_order(&frame), vec![0, 1, 2]);
        assert_eq!(frame.batches.len(), 3);
    }
}
