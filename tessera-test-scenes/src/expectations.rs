use tessera::backend::{PassState, PrimitiveKind, RecordedDraw, ShaderBinding};
use tessera::TextureId;

/// What a single recorded draw is expected to look like. Fields left as `None`
/// are not checked.
#[derive(Debug, Clone)]
pub struct DrawExpectation {
    pub primitive: PrimitiveKind,
    pub shader: Option<ShaderBinding>,
    pub texture: Option<Option<TextureId>>,
    pub pass_state: Option<PassState>,
    pub vertex_count: Option<u32>,
    pub light_count: Option<u32>,
    /// Human-readable label for failure messages.
    pub label: &'static str,
}

impl DrawExpectation {
    pub fn new(primitive: PrimitiveKind, label: &'static str) -> Self {
        Self {
            primitive,
            shader: None,
            texture: None,
            pass_state: None,
            vertex_count: None,
            light_count: None,
            label,
        }
    }

    /// Convenience: an untextured opaque triangle draw with `shader`.
    pub fn opaque(shader: ShaderBinding, label: &'static str) -> Self {
        Self::new(PrimitiveKind::Triangles, label)
            .with_shader(shader)
            .with_texture(None)
            .with_pass_state(PassState::OPAQUE)
    }

    /// Convenience: a blended triangle draw with `shader`.
    pub fn transparent(shader: ShaderBinding, label: &'static str) -> Self {
        Self::new(PrimitiveKind::Triangles, label)
            .with_shader(shader)
            .with_pass_state(PassState::TRANSPARENT)
    }

    pub fn with_shader(mut self, shader: ShaderBinding) -> Self {
        self.shader = Some(shader);
        self
    }

    pub fn with_texture(mut self, texture: Option<TextureId>) -> Self {
        self.texture = Some(texture);
        self
    }

    pub fn with_pass_state(mut self, pass_state: PassState) -> Self {
        self.pass_state = Some(pass_state);
        self
    }

    pub fn with_vertex_count(mut self, vertex_count: u32) -> Self {
        self.vertex_count = Some(vertex_count);
        self
    }

    pub fn with_light_count(mut self, light_count: u32) -> Self {
        self.light_count = Some(light_count);
        self
    }
}

/// Validates recorded draws, in order, against `expectations`.
///
/// Returns a list of human-readable failure descriptions. An empty list means
/// all expectations passed.
pub fn check_draws(draws: &[RecordedDraw], expectations: &[DrawExpectation]) -> Vec<String> {
    let mut failures = Vec::new();

    if draws.len() != expectations.len() {
        failures.push(format!(
            "expected {} draw(s) but {} were recorded",
            expectations.len(),
            draws.len(),
        ));
    }

    for (index, (draw, expectation)) in draws.iter().zip(expectations).enumerate() {
        let label = expectation.label;
        if draw.primitive != expectation.primitive {
            failures.push(format!(
                "[{label}] draw {index}: primitive {:?}, expected {:?}",
                draw.primitive, expectation.primitive,
            ));
        }
        if let Some(shader) = expectation.shader {
            if draw.shader != Some(shader) {
                failures.push(format!(
                    "[{label}] draw {index}: shader {:?}, expected {:?}",
                    draw.shader, shader,
                ));
            }
        }
        if let Some(texture) = expectation.texture {
            if draw.texture != texture {
                failures.push(format!(
                    "[{label}] draw {index}: texture {:?}, expected {:?}",
                    draw.texture, texture,
                ));
            }
        }
        if let Some(pass_state) = expectation.pass_state {
            if draw.pass_state != Some(pass_state) {
                failures.push(format!(
                    "[{label}] draw {index}: pass state {:?}, expected {:?}",
                    draw.pass_state, pass_state,
                ));
            }
        }
        if let Some(vertex_count) = expectation.vertex_count {
            if draw.vertex_count != vertex_count {
                failures.push(format!(
                    "[{label}] draw {index}: {} vertices, expected {}",
                    draw.vertex_count, vertex_count,
                ));
            }
        }
        if let Some(light_count) = expectation.light_count {
            if draw.light_count != Some(light_count) {
                failures.push(format!(
                    "[{label}] draw {index}: light count {:?}, expected {}",
                    draw.light_count, light_count,
                ));
            }
        }
    }

    failures
}
