//! Renderer configuration.
//!
//! Everything here has a working default; the `with_*` methods exist so callers can
//! override a single knob without spelling out the rest.

use crate::shape::CenterStrategy;
use crate::tessellator::PolygonTriangulation;

/// Default number of model matrices uploaded per chunk.
pub const MAX_TRANSFORMS: usize = 64;

/// Order in which the renderer issues draws at flush time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum FlushStrategy {
    /// One draw per shape in submission order.
    SubmissionOrder,
    /// Opaque, then lit, then transparent batches; transparent shapes back to front.
    #[default]
    SortedByDepth,
}

/// How points and stroked outlines reach the GPU.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum StrokeRenderMode {
    /// Outlines and points are converted to triangles.
    #[default]
    Triangulated,
    /// Outlines and points are drawn with the backend's line and point primitives,
    /// where available. Weight, joins and caps are not honoured.
    Native,
}

/// Sizing policy of the shared vertex stream. All sizes are in vertices.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StreamPolicy {
    pub initial_capacity: usize,
    /// Capacity is always a multiple of this.
    pub growth_step: usize,
    /// Usage below `shrink_ratio * capacity` counts as a slack frame.
    pub shrink_ratio: f32,
    /// Consecutive slack frames before the stream shrinks.
    pub shrink_after_frames: u32,
}

impl Default for StreamPolicy {
    fn default() -> Self {
        Self {
            initial_capacity: 16 * 1024,
            growth_step: 4 * 1024,
            shrink_ratio: 0.25,
            shrink_after_frames: 120,
        }
    }
}

impl StreamPolicy {
    /// Capacity to allocate for `required` vertices: one and a half times the
    /// requirement, at least one step, rounded up to a whole number of steps.
    pub fn grown_capacity(&self, required: usize) -> usize {
        let step = self.growth_step.max(1);
        let wanted = (required + required / 2).max(step);
        wanted.div_ceil(step) * step
    }

    /// Whether `used` vertices out of `capacity` is a slack frame.
    pub fn is_slack(&self, used: usize, capacity: usize) -> bool {
        (used as f64) < (capacity as f64) * f64::from(self.shrink_ratio)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct RendererConfig {
    pub flush_strategy: FlushStrategy,
    pub polygon_triangulation: PolygonTriangulation,
    pub center_strategy: CenterStrategy,
    pub stroke_render_mode: StrokeRenderMode,
    /// Model matrices per upload. Clamped to the backend limit at construction.
    pub max_transforms: usize,
    pub stream: StreamPolicy,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            flush_strategy: FlushStrategy::default(),
            polygon_triangulation: PolygonTriangulation::default(),
            center_strategy: CenterStrategy::default(),
            stroke_render_mode: StrokeRenderMode::default(),
            max_transforms: MAX_TRANSFORMS,
            stream: StreamPolicy::default(),
        }
    }
}

impl RendererConfig {
    pub fn with_flush_strategy(mut self, strategy: FlushStrategy) -> Self {
        self.flush_strategy = strategy;
        self
    }

    pub fn with_polygon_triangulation(mut self, triangulation: PolygonTriangulation) -> Self {
        self.polygon_triangulation = triangulation;
        self
    }

    pub fn with_center_strategy(mut self, strategy: CenterStrategy) -> Self {
        self.center_strategy = strategy;
        self
    }

    pub fn with_stroke_render_mode(mut self, mode: StrokeRenderMode) -> Self {
        self.stroke_render_mode = mode;
        self
    }

    pub fn with_max_transforms(mut self, max_transforms: usize) -> Self {
        self.max_transforms = max_transforms;
        self
    }

    pub fn with_stream_policy(mut self, policy: StreamPolicy) -> Self {
        self.stream = policy;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn growth_is_stepped() {
        let policy = StreamPolicy {
            growth_step: 1000,
            ..Default::default()
        };
        assert_eq!(policy.grown_capacity(10), 1000);
        assert_eq!(policy.grown_capacity(1000), 2000);
        assert_eq!(policy.grown_capacity(1400), 3000);
    }

    #[test]
    fn slack_is_relative_to_capacity() {
        let policy = StreamPolicy::default();
        assert!(policy.is_slack(10, 100));
        assert!(!policy.is_slack(25, 100));
    }
}
