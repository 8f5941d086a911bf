use crate::backend::{PassState, RenderBackend, ShaderBinding};
use crate::id::{BufferHandle, TextureId};
use crate::lighting::LightingSnapshot;

/// Last state handed to the backend during a flush.
///
/// Every setter forwards to the backend only when the value differs from what is
/// already bound, and reports whether it did. The cache is reset at the start of
/// each flush since backends do not carry bound state across frames.
#[derive(Debug, Default)]
pub struct StateCache {
    shader: Option<ShaderBinding>,
    texture: Option<Option<TextureId>>,
    pass_state: Option<PassState>,
    vertex_buffer: Option<BufferHandle>,
    lighting: Option<LightingSnapshot>,
}

impl StateCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn invalidate(&mut self) {
        *self = Self::default();
    }

    pub fn bind_shader<B: RenderBackend>(&mut self, backend: &mut B, shader: ShaderBinding) -> bool {
        if self.shader == Some(shader) {
            return false;
        }
        backend.bind_shader(shader);
        self.shader = Some(shader);
        true
    }

    pub fn bind_texture<B: RenderBackend>(
        &mut self,
        backend: &mut B,
        texture: Option<TextureId>,
    ) -> bool {
        if self.texture == Some(texture) {
            return false;
        }
        backend.bind_texture(texture);
        self.texture = Some(texture);
        true
    }

    pub fn set_pass_state<B: RenderBackend>(&mut self, backend: &mut B, state: PassState) -> bool {
        if self.pass_state == Some(state) {
            return false;
        }
        backend.set_pass_state(state);
        self.pass_state = Some(state);
        true
    }

    pub fn bind_vertex_buffer<B: RenderBackend>(
        &mut self,
        backend: &mut B,
        buffer: BufferHandle,
    ) -> bool {
        if self.vertex_buffer == Some(buffer) {
            return false;
        }
        backend.bind_vertex_buffer(buffer);
        self.vertex_buffer = Some(buffer);
        true
    }

    /// Uploads `lighting` unless the identical snapshot is already resident.
    pub fn upload_lighting<B: RenderBackend>(
        &mut self,
        backend: &mut B,
        lighting: &LightingSnapshot,
    ) -> bool {
        if self.lighting.as_ref() == Some(lighting) {
            return false;
        }
        backend.upload_lighting(&lighting.to_uniform());
        self.lighting = Some(lighting.clone());
        true
    }

    pub fn vertex_buffer(&self) -> Option<BufferHandle> {
        self.vertex_buffer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendCommand, RecordingBackend, ShaderSlot};
    use crate::lighting::Light;

    #[test]
    fn redundant_changes_are_elided() {
        let mut backend = RecordingBackend::new();
        let mut cache = StateCache::new();
        let fill = ShaderBinding::Builtin(ShaderSlot::Fill);

        assert!(cache.bind_shader(&mut backend, fill));
        assert!(!cache.bind_shader(&mut backend, fill));
        assert!(cache.bind_texture(&mut backend, None));
        assert!(!cache.bind_texture(&mut backend, None));
        assert!(cache.bind_texture(&mut backend, Some(TextureId(1))));
        assert!(cache.set_pass_state(&mut backend, PassState::OPAQUE));
        assert!(!cache.set_pass_state(&mut backend, PassState::OPAQUE));
        assert_eq!(backend.commands().len(), 4);

        cache.invalidate();
        assert!(cache.bind_shader(&mut backend, fill));
    }

    #[test]
    fn lighting_uploads_only_on_change() {
        let mut backend = RecordingBackend::new();
        let mut cache = StateCache::new();
        let mut snapshot = LightingSnapshot::new();
        snapshot.push(Light::ambient([0.3; 3]));

        assert!(cache.upload_lighting(&mut backend, &snapshot));
        assert!(!cache.upload_lighting(&mut backend, &snapshot.clone()));
        snapshot.push(Light::point([1.0; 3], [0.0, 1.0, 0.0]));
        assert!(cache.upload_lighting(&mut backend, &snapshot));

        let uploads = backend.count_commands(|c| matches!(c, BackendCommand::UploadLighting { .. }));
        assert_eq!(uploads, 2);
    }
}
