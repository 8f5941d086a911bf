use crate::shape::ShapeRecord;

/// Anything shapes can be submitted to.
pub trait ShapeSink {
    fn submit(&mut self, record: ShapeRecord);
}

/// Per-class counts of the shapes submitted this frame.
///
/// A shape that is both lit and transparent counts as transparent only.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ShapeCounts {
    pub opaque: usize,
    pub light: usize,
    pub transparent: usize,
}

impl ShapeCounts {
    pub fn total(&self) -> usize {
        self.opaque + self.light + self.transparent
    }
}

/// Collects the shapes of one frame in submission order.
#[derive(Debug, Default)]
pub struct FrameAccumulator {
    records: Vec<ShapeRecord>,
    counts: ShapeCounts,
}

impl FrameAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            records: Vec::with_capacity(capacity),
            counts: ShapeCounts::default(),
        }
    }

    pub fn submit(&mut self, record: ShapeRecord) {
        if record.is_transparent() {
            self.counts.transparent += 1;
        } else if record.is_light_enabled() {
            self.counts.light += 1;
        } else {
            self.counts.opaque += 1;
        }
        self.records.push(record);
    }

    /// Drops every record and resets the counts, keeping the allocation.
    pub fn prepare_next_frame(&mut self) {
        self.records.clear();
        self.counts = ShapeCounts::default();
    }

    #[inline]
    pub fn records(&self) -> &[ShapeRecord] {
        &self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ShapeRecord> {
        self.records.iter()
    }

    #[inline]
    pub fn counts(&self) -> ShapeCounts {
        self.counts
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.records.capacity()
    }
}

impl ShapeSink for FrameAccumulator {
    fn submit(&mut self, record: ShapeRecord) {
        FrameAccumulator::submit(self, record);
    }
}

impl<'a> IntoIterator for &'a FrameAccumulator {
    type Item = &'a ShapeRecord;
    type IntoIter = std::slice::Iter<'a, ShapeRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lighting::{Light, LightingSnapshot};
    use crate::shape::Topology;
    use crate::{Color, Vertex};

    fn triangle(alpha: u8, lit: bool) -> ShapeRecord {
        let color = Color::rgba(255, 255, 255, alpha);
        let mut lighting = LightingSnapshot::new();
        lighting.push(Light::ambient([0.5; 3]));
        ShapeRecord::builder(Topology::Triangles)
            .vertices([
                Vertex::new([0.0, 0.0, 0.0], color),
                Vertex::new([1.0, 0.0, 0.0], color),
                Vertex::new([0.0, 1.0, 0.0], color),
            ])
            .lighting(lit.then_some(lighting))
            .build()
    }

    #[test]
    fn transparent_wins_over_light() {
        let mut accumulator = FrameAccumulator::new();
        accumulator.submit(triangle(255, false));
        accumulator.submit(triangle(255, true));
        accumulator.submit(triangle(100, true));
        accumulator.submit(triangle(100, false));

        assert_eq!(
            accumulator.counts(),
            ShapeCounts {
                opaque: 1,
                light: 1,
                transparent: 2,
            }
        );
        assert_eq!(accumulator.counts().total(), accumulator.len());
    }

    #[test]
    fn order_is_preserved_and_capacity_kept() {
        let mut accumulator = FrameAccumulator::with_capacity(2);
        for alpha in [10, 255, 20] {
            accumulator.submit(triangle(alpha, false));
        }
        let alphas: Vec<bool> = accumulator.iter().map(|r| r.is_transparent()).collect();
        assert_eq!(alphas, vec![true, false, true]);

        let capacity = accumulator.capacity();
        accumulator.prepare_next_frame();
        assert!(accumulator.is_empty());
        assert_eq!(accumulator.counts(), ShapeCounts::default());
        assert_eq!(accumulator.capacity(), capacity);
    }
}
