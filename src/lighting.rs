//! Lighting state copied into lit shapes at submission time.

use smallvec::SmallVec;

/// Maximum number of lights a snapshot can hold; matches the uniform array size.
pub const MAX_LIGHTS: usize = 8;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LightKind {
    Ambient,
    Directional,
    Point,
    Spot,
}

impl LightKind {
    fn code(self) -> f32 {
        match self {
            LightKind::Ambient => 0.0,
            LightKind::Directional => 1.0,
            LightKind::Point => 2.0,
            LightKind::Spot => 3.0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Light {
    pub kind: LightKind,
    /// Eye-independent world position (point and spot lights).
    pub position: [f32; 3],
    /// Normalized direction the light travels (directional and spot lights).
    pub direction: [f32; 3],
    pub ambient: [f32; 3],
    pub diffuse: [f32; 3],
    pub specular: [f32; 3],
    /// Constant, linear and quadratic attenuation factors.
    pub falloff: [f32; 3],
    /// Cosine of the spot cone half-angle.
    pub spot_cos_cutoff: f32,
    pub spot_concentration: f32,
}

impl Light {
    fn base(kind: LightKind) -> Self {
        Self {
            kind,
            position: [0.0; 3],
            direction: [0.0, 0.0, -1.0],
            ambient: [0.0; 3],
            diffuse: [0.0; 3],
            specular: [0.0; 3],
            falloff: [1.0, 0.0, 0.0],
            spot_cos_cutoff: -1.0,
            spot_concentration: 0.0,
        }
    }

    pub fn ambient(color: [f32; 3]) -> Self {
        Self {
            ambient: color,
            ..Self::base(LightKind::Ambient)
        }
    }

    pub fn directional(color: [f32; 3], direction: [f32; 3]) -> Self {
        Self {
            diffuse: color,
            direction: normalize(direction),
            ..Self::base(LightKind::Directional)
        }
    }

    pub fn point(color: [f32; 3], position: [f32; 3]) -> Self {
        Self {
            diffuse: color,
            position,
            ..Self::base(LightKind::Point)
        }
    }

    pub fn spot(
        color: [f32; 3],
        position: [f32; 3],
        direction: [f32; 3],
        angle: f32,
        concentration: f32,
    ) -> Self {
        Self {
            diffuse: color,
            position,
            direction: normalize(direction),
            spot_cos_cutoff: angle.cos(),
            spot_concentration: concentration,
            ..Self::base(LightKind::Spot)
        }
    }

    pub fn with_specular(mut self, specular: [f32; 3]) -> Self {
        self.specular = specular;
        self
    }

    pub fn with_falloff(mut self, constant: f32, linear: f32, quadratic: f32) -> Self {
        self.falloff = [constant, linear, quadratic];
        self
    }
}

/// Copy of the global lighting state taken when a lit shape is submitted.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LightingSnapshot {
    lights: SmallVec<[Light; MAX_LIGHTS]>,
}

impl LightingSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a light. Returns `false` and drops the light once [`MAX_LIGHTS`] is reached.
    pub fn push(&mut self, light: Light) -> bool {
        if self.lights.len() >= MAX_LIGHTS {
            return false;
        }
        self.lights.push(light);
        true
    }

    pub fn lights(&self) -> &[Light] {
        &self.lights
    }

    pub fn len(&self) -> usize {
        self.lights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lights.is_empty()
    }

    pub fn clear(&mut self) {
        self.lights.clear();
    }

    /// Packs the snapshot into the std140-compatible uniform block used by the lit shader.
    pub fn to_uniform(&self) -> LightingUniform {
        let mut uniform = LightingUniform::zeroed();
        uniform.count = [self.lights.len() as u32, 0, 0, 0];
        for (slot, light) in self.lights.iter().enumerate() {
            uniform.position[slot] = extend(light.position, light.kind.code());
            uniform.direction[slot] = extend(light.direction, 0.0);
            uniform.ambient[slot] = extend(light.ambient, 1.0);
            uniform.diffuse[slot] = extend(light.diffuse, 1.0);
            uniform.specular[slot] = extend(light.specular, 1.0);
            uniform.falloff[slot] = extend(light.falloff, 0.0);
            uniform.spot[slot] = [light.spot_cos_cutoff, light.spot_concentration, 0.0, 0.0];
        }
        uniform
    }
}

/// GPU layout of a [`LightingSnapshot`]; `position.w` carries the light kind.
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LightingUniform {
    pub count: [u32; 4],
    pub position: [[f32; 4]; MAX_LIGHTS],
    pub direction: [[f32; 4]; MAX_LIGHTS],
    pub ambient: [[f32; 4]; MAX_LIGHTS],
    pub diffuse: [[f32; 4]; MAX_LIGHTS],
    pub specular: [[f32; 4]; MAX_LIGHTS],
    pub falloff: [[f32; 4]; MAX_LIGHTS],
    pub spot: [[f32; 4]; MAX_LIGHTS],
}

impl LightingUniform {
    fn zeroed() -> Self {
        bytemuck::Zeroable::zeroed()
    }
}

#[inline]
fn extend(v: [f32; 3], w: f32) -> [f32; 4] {
    [v[0], v[1], v[2], w]
}

fn normalize(v: [f32; 3]) -> [f32; 3] {
    let length = (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt();
    if length <= f32::EPSILON {
        return [0.0, 0.0, -1.0];
    }
    [v[0] / length, v[1] / length, v[2] / length]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_caps_light_count() {
        let mut snapshot = LightingSnapshot::new();
        for _ in 0..MAX_LIGHTS {
            assert!(snapshot.push(Light::ambient([0.1; 3])));
        }
        assert!(!snapshot.push(Light::ambient([0.1; 3])));
        assert_eq!(snapshot.len(), MAX_LIGHTS);
    }

    #[test]
    fn uniform_encodes_kind_and_count() {
        let mut snapshot = LightingSnapshot::new();
        snapshot.push(Light::ambient([0.2; 3]));
        snapshot.push(Light::spot([1.0; 3], [0.0; 3], [0.0, 0.0, -2.0], 0.5, 2.0));
        let uniform = snapshot.to_uniform();
        assert_eq!(uniform.count[0], 2);
        assert_eq!(uniform.position[0][3], 0.0);
        assert_eq!(uniform.position[1][3], 3.0);
        assert_eq!(uniform.direction[1][..3], [0.0, 0.0, -1.0]);
        assert!((uniform.spot[1][0] - 0.5f32.cos()).abs() < 1e-6);
    }
}
