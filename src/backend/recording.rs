//! Headless backend that records every call.
//!
//! Besides the raw command list it keeps a mirror of every vertex buffer and the
//! state in effect, so each draw can be inspected with the vertices and transforms
//! it would have consumed.

use ahash::{HashMap, HashSet};

use super::{Capabilities, PassState, PrimitiveKind, RenderBackend, ShaderBinding, ShaderSlot};
use crate::error::BackendError;
use crate::id::{BufferHandle, TextureId};
use crate::lighting::LightingUniform;
use crate::math::Mat4;
use crate::vertex::Vertex;

#[derive(Clone, Debug)]
pub enum BackendCommand {
    CompileBuiltinShader(ShaderSlot),
    CreateVertexBuffer {
        buffer: BufferHandle,
        capacity: usize,
    },
    DestroyBuffer(BufferHandle),
    WriteVertices {
        buffer: BufferHandle,
        first_vertex: usize,
        count: usize,
    },
    SetViewProjection(Mat4),
    BindShader(ShaderBinding),
    BindTexture(Option<TextureId>),
    SetPassState(PassState),
    BindVertexBuffer(BufferHandle),
    UploadTransforms(Vec<Mat4>),
    UploadLighting { light_count: u32 },
    Draw {
        primitive: PrimitiveKind,
        first_vertex: u32,
        vertex_count: u32,
    },
}

/// A draw together with the state it ran under.
#[derive(Clone, Debug)]
pub struct RecordedDraw {
    pub primitive: PrimitiveKind,
    pub shader: Option<ShaderBinding>,
    pub texture: Option<TextureId>,
    pub pass_state: Option<PassState>,
    pub buffer: Option<BufferHandle>,
    pub first_vertex: u32,
    pub vertex_count: u32,
    pub transforms: Vec<Mat4>,
    pub light_count: Option<u32>,
    /// Contents of the bound buffer over the draw range, if the range was written.
    pub vertices: Vec<Vertex>,
}

impl RecordedDraw {
    /// Model matrix each drawn vertex selects, in vertex order.
    pub fn vertex_transforms(&self) -> impl Iterator<Item = Option<&Mat4>> + '_ {
        self.vertices
            .iter()
            .map(|vertex| self.transforms.get(vertex.transform_index as usize))
    }
}

#[derive(Debug, Default)]
struct BoundState {
    shader: Option<ShaderBinding>,
    texture: Option<TextureId>,
    pass_state: Option<PassState>,
    buffer: Option<BufferHandle>,
    transforms: Vec<Mat4>,
    light_count: Option<u32>,
}

#[derive(Debug, Default)]
pub struct RecordingBackend {
    capabilities: Capabilities,
    failing_shaders: HashSet<ShaderSlot>,
    failing_allocations: bool,
    next_buffer: u64,
    buffers: HashMap<BufferHandle, Vec<Vertex>>,
    state: BoundState,
    commands: Vec<BackendCommand>,
    draws: Vec<RecordedDraw>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Makes `compile_builtin_shader(slot)` fail.
    pub fn with_failing_shader(mut self, slot: ShaderSlot) -> Self {
        self.failing_shaders.insert(slot);
        self
    }

    /// Makes every `create_vertex_buffer` fail until reset, like an exhausted device.
    pub fn set_failing_allocations(&mut self, failing: bool) {
        self.failing_allocations = failing;
    }

    pub fn commands(&self) -> &[BackendCommand] {
        &self.commands
    }

    pub fn draws(&self) -> &[RecordedDraw] {
        &self.draws
    }

    /// Clears recorded commands and draws; buffers and bound state are kept.
    pub fn clear_commands(&mut self) {
        self.commands.clear();
        self.draws.clear();
    }

    pub fn buffer_contents(&self, buffer: BufferHandle) -> Option<&[Vertex]> {
        self.buffers.get(&buffer).map(Vec::as_slice)
    }

    pub fn live_buffers(&self) -> usize {
        self.buffers.len()
    }

    fn allocate_handle(&mut self) -> BufferHandle {
        self.next_buffer += 1;
        BufferHandle(self.next_buffer)
    }

    pub fn count_commands(&self, predicate: impl Fn(&BackendCommand) -> bool) -> usize {
        self.commands.iter().filter(|command| predicate(command)).count()
    }
}

impl RenderBackend for RecordingBackend {
    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    fn compile_builtin_shader(&mut self, slot: ShaderSlot) -> Result<(), BackendError> {
        self.commands.push(BackendCommand::CompileBuiltinShader(slot));
        if self.failing_shaders.contains(&slot) {
            return Err(BackendError::BuiltinShader(
                slot,
                "compilation disabled for this backend".to_string(),
            ));
        }
        Ok(())
    }

    fn create_vertex_buffer(&mut self, capacity: usize) -> Result<BufferHandle, BackendError> {
        if self.failing_allocations || capacity > self.capabilities.max_vertices {
            return Err(BackendError::BufferAllocation(
                (capacity * crate::vertex::VERTEX_SIZE) as u64,
            ));
        }
        let buffer = self.allocate_handle();
        self.buffers.insert(buffer, vec![Vertex::default(); capacity]);
        self.commands
            .push(BackendCommand::CreateVertexBuffer { buffer, capacity });
        Ok(buffer)
    }

    fn destroy_buffer(&mut self, buffer: BufferHandle) {
        self.buffers.remove(&buffer);
        if self.state.buffer == Some(buffer) {
            self.state.buffer = None;
        }
        self.commands.push(BackendCommand::DestroyBuffer(buffer));
    }

    fn write_vertices(&mut self, buffer: BufferHandle, first_vertex: usize, vertices: &[Vertex]) {
        if let Some(contents) = self.buffers.get_mut(&buffer) {
            let end = (first_vertex + vertices.len()).min(contents.len());
            if first_vertex < end {
                contents[first_vertex..end].copy_from_slice(&vertices[..end - first_vertex]);
            }
        }
        self.commands.push(BackendCommand::WriteVertices {
            buffer,
            first_vertex,
            count: vertices.len(),
        });
    }

    fn set_view_projection(&mut self, view_projection: &Mat4) {
        self.commands
            .push(BackendCommand::SetViewProjection(*view_projection));
    }

    fn bind_shader(&mut self, shader: ShaderBinding) {
        self.state.shader = Some(shader);
        self.commands.push(BackendCommand::BindShader(shader));
    }

    fn bind_texture(&mut self, texture: Option<TextureId>) {
        self.state.texture = texture;
        self.commands.push(BackendCommand::BindTexture(texture));
    }

    fn set_pass_state(&mut self, state: PassState) {
        self.state.pass_state = Some(state);
        self.commands.push(BackendCommand::SetPassState(state));
    }

    fn bind_vertex_buffer(&mut self, buffer: BufferHandle) {
        self.state.buffer = Some(buffer);
        self.commands.push(BackendCommand::BindVertexBuffer(buffer));
    }

    fn upload_transforms(&mut self, transforms: &[Mat4]) {
        self.state.transforms = transforms.to_vec();
        self.commands
            .push(BackendCommand::UploadTransforms(transforms.to_vec()));
    }

    fn upload_lighting(&mut self, lighting: &LightingUniform) {
        let light_count = lighting.count[0];
        self.state.light_count = Some(light_count);
        self.commands
            .push(BackendCommand::UploadLighting { light_count });
    }

    fn draw(&mut self, primitive: PrimitiveKind, first_vertex: u32, vertex_count: u32) {
        let vertices = self
            .state
            .buffer
            .and_then(|buffer| self.buffers.get(&buffer))
            .and_then(|contents| {
                let start = first_vertex as usize;
                contents.get(start..start + vertex_count as usize)
            })
            .map(<[Vertex]>::to_vec)
            .unwrap_or_default();

        self.draws.push(RecordedDraw {
            primitive,
            shader: self.state.shader,
            texture: self.state.texture,
            pass_state: self.state.pass_state,
            buffer: self.state.buffer,
            first_vertex,
            vertex_count,
            transforms: self.state.transforms.clone(),
            light_count: self.state.light_count,
            vertices,
        });
        self.commands.push(BackendCommand::Draw {
            primitive,
            first_vertex,
            vertex_count,
        });
    }
}
