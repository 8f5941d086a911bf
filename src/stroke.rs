use std::f32::consts::PI;

/// How two stroke segments meet.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum StrokeJoin {
    /// Sharp corner, replaced by a bevel when the corner is narrower than
    /// [`StrokeAttributes::min_miter_angle`].
    #[default]
    Miter,
    Bevel,
    Round,
    /// Segments are emitted as independent quads.
    None,
}

/// How the ends of an open stroke are finished.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum StrokeCap {
    Butt,
    /// Extends the stroke by half its weight past each end.
    Square,
    #[default]
    Round,
}

/// Outline parameters of a stroke shape.
#[derive(Clone, Debug, Copy, PartialEq)]
pub struct StrokeAttributes {
    pub weight: f32,
    pub join: StrokeJoin,
    pub cap: StrokeCap,
    /// Angular step, in radians, of round join fans.
    pub join_resolution: f32,
    /// Angular step, in radians, of round cap fans.
    pub cap_resolution: f32,
    /// Interior angle, in radians, below which a miter becomes a bevel.
    pub min_miter_angle: f32,
}

impl Default for StrokeAttributes {
    fn default() -> Self {
        Self {
            weight: 1.0,
            join: StrokeJoin::default(),
            cap: StrokeCap::default(),
            join_resolution: PI / 8.0,
            cap_resolution: PI / 8.0,
            min_miter_angle: 0.5,
        }
    }
}

impl StrokeAttributes {
    #[inline]
    pub fn new(weight: impl Into<f32>) -> Self {
        Self {
            weight: weight.into(),
            ..Default::default()
        }
    }

    pub fn with_join(mut self, join: StrokeJoin) -> Self {
        self.join = join;
        self
    }

    pub fn with_cap(mut self, cap: StrokeCap) -> Self {
        self.cap = cap;
        self
    }

    pub fn with_resolutions(mut self, join_resolution: f32, cap_resolution: f32) -> Self {
        self.join_resolution = join_resolution;
        self.cap_resolution = cap_resolution;
        self
    }

    pub fn with_min_miter_angle(mut self, radians: f32) -> Self {
        self.min_miter_angle = radians;
        self
    }

    /// True if the stroke has no visible width
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.weight <= 0.0
    }

    #[inline]
    pub(crate) fn half_weight(&self) -> f32 {
        self.weight * 0.5
    }

    /// Number of fan steps needed to sweep `angle` at `resolution` radians per step.
    #[inline]
    pub(crate) fn fan_steps(angle: f32, resolution: f32) -> usize {
        let resolution = if resolution > 1e-3 { resolution } else { PI / 8.0 };
        ((angle.abs() / resolution).ceil() as usize).clamp(1, 64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fan_steps_clamps_degenerate_resolution() {
        assert_eq!(StrokeAttributes::fan_steps(PI, 0.0), 8);
        assert_eq!(StrokeAttributes::fan_steps(0.0, 0.1), 1);
        assert_eq!(StrokeAttributes::fan_steps(PI, 0.001), 8);
    }

    #[test]
    fn zero_weight_is_empty() {
        assert!(StrokeAttributes::new(0.0).is_empty());
        assert!(!StrokeAttributes::new(2.0).is_empty());
    }
}
