//! wgpu implementation of [`RenderBackend`].
//!
//! The backend records the frame while the renderer flushes: vertex data goes to
//! the GPU immediately (the renderer never overwrites a range it has drawn from in
//! the same frame), while transform and lighting uploads are staged into blocks at
//! aligned offsets. [`WgpuBackend::submit`] writes the staged blocks and replays
//! every recorded draw in a single render pass.

mod pipeline;
mod textures;

use std::sync::Arc;

use ahash::HashMap;
use tracing::{debug, warn};

use self::pipeline::{
    align_uniform, create_buffer_init, create_depth_texture, create_frame_bind_group_layout,
    create_shape_pipeline, create_texture_bind_group_layout, ShapePipelineDescriptor,
    GPU_TRANSFORM_SLOTS, TRANSFORM_BLOCK_SIZE,
};
use self::textures::TextureStore;
use super::{Capabilities, PassState, PrimitiveKind, RenderBackend, ShaderBinding, ShaderSlot};
use crate::color::Color;
use crate::error::{BackendError, RenderError};
use crate::id::{BufferHandle, ShaderId, TextureId};
use crate::lighting::{LightingSnapshot, LightingUniform};
use crate::math::Mat4;
use crate::vertex::{Vertex, VERTEX_SIZE};
use crate::warn_once::WarnOnce;

const SHAPE_SHADER: &str = include_str!("shape.wgsl");

const LIGHTING_SIZE: u64 = std::mem::size_of::<LightingUniform>() as u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct PipelineKey {
    shader: ShaderBinding,
    pass_state: PassState,
    primitive: PrimitiveKind,
}

#[derive(Debug, Clone, Copy)]
struct GpuDraw {
    pipeline: PipelineKey,
    texture: Option<TextureId>,
    buffer: BufferHandle,
    transform_block: u32,
    lighting_block: u32,
    first_vertex: u32,
    vertex_count: u32,
}

fn needs_reallocation(existing_size: Option<u64>, required_size: u64) -> bool {
    existing_size
        .map(|size| size < required_size)
        .unwrap_or(true)
}

/// Uniform blocks staged during a frame and written in one go at submit.
struct UniformBlocks {
    label: &'static str,
    stride: u64,
    staged: Vec<u8>,
    buffer: Option<wgpu::Buffer>,
}

impl UniformBlocks {
    fn new(label: &'static str, stride: u64) -> Self {
        Self {
            label,
            stride,
            staged: Vec::new(),
            buffer: None,
        }
    }

    fn len(&self) -> u32 {
        (self.staged.len() as u64 / self.stride) as u32
    }

    fn push(&mut self, bytes: &[u8]) -> u32 {
        let index = self.len();
        let start = self.staged.len();
        self.staged.extend_from_slice(bytes);
        self.staged.resize(start + self.stride as usize, 0);
        index
    }

    fn offset(&self, block: u32) -> u32 {
        (u64::from(block) * self.stride) as u32
    }

    /// Writes the staged blocks. Returns `true` if the buffer was reallocated.
    fn upload(&mut self, device: &wgpu::Device, queue: &wgpu::Queue) -> bool {
        let reallocate = needs_reallocation(
            self.buffer.as_ref().map(wgpu::Buffer::size),
            self.staged.len() as u64,
        );
        if reallocate {
            self.buffer = Some(create_buffer_init(
                device,
                Some(self.label),
                &self.staged,
                wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            ));
        } else if let Some(buffer) = self.buffer.as_ref() {
            queue.write_buffer(buffer, 0, &self.staged);
        }
        reallocate
    }
}

#[derive(Debug, Default)]
struct RecordState {
    shader: Option<ShaderBinding>,
    texture: Option<TextureId>,
    pass_state: Option<PassState>,
    buffer: Option<BufferHandle>,
    transform_block: Option<u32>,
    lighting_block: Option<u32>,
}

pub struct WgpuBackend {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    format: wgpu::TextureFormat,
    size: (u32, u32),
    depth: (wgpu::Texture, wgpu::TextureView),

    frame_layout: wgpu::BindGroupLayout,
    texture_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    camera_buffer: wgpu::Buffer,
    transforms: UniformBlocks,
    lighting: UniformBlocks,
    frame_bind_group: Option<wgpu::BindGroup>,

    builtin_module: Option<wgpu::ShaderModule>,
    builtin_slots: Vec<ShaderSlot>,
    custom_modules: HashMap<ShaderId, wgpu::ShaderModule>,
    next_shader: u64,
    pipelines: HashMap<PipelineKey, wgpu::RenderPipeline>,

    buffers: HashMap<BufferHandle, wgpu::Buffer>,
    next_buffer: u64,
    textures: TextureStore,

    view_projection: Mat4,
    state: RecordState,
    draws: Vec<GpuDraw>,
    warnings: WarnOnce,
}

impl WgpuBackend {
    /// Creates a backend drawing into `format` targets of `size` physical pixels.
    pub fn new(
        device: Arc<wgpu::Device>,
        queue: Arc<wgpu::Queue>,
        format: wgpu::TextureFormat,
        size: (u32, u32),
    ) -> Self {
        let alignment = u64::from(device.limits().min_uniform_buffer_offset_alignment);
        let frame_layout = create_frame_bind_group_layout(&device, LIGHTING_SIZE);
        let texture_layout = create_texture_bind_group_layout(&device);
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Shape Pipeline Layout"),
            bind_group_layouts: &[&frame_layout, &texture_layout],
            push_constant_ranges: &[],
        });
        let camera_buffer = create_buffer_init(
            &device,
            Some("camera_uniform"),
            bytemuck::cast_slice(&Mat4::identity().to_array()),
            wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        );
        let textures = TextureStore::new(&device, &queue, &texture_layout);
        let depth = create_depth_texture(&device, size);

        Self {
            format,
            size,
            depth,
            transforms: UniformBlocks::new(
                "transform_blocks",
                align_uniform(TRANSFORM_BLOCK_SIZE, alignment),
            ),
            lighting: UniformBlocks::new("lighting_blocks", align_uniform(LIGHTING_SIZE, alignment)),
            frame_layout,
            texture_layout,
            pipeline_layout,
            camera_buffer,
            frame_bind_group: None,
            builtin_module: None,
            builtin_slots: Vec::new(),
            custom_modules: HashMap::default(),
            next_shader: 0,
            pipelines: HashMap::default(),
            buffers: HashMap::default(),
            next_buffer: 0,
            textures,
            view_projection: Mat4::identity(),
            state: RecordState::default(),
            draws: Vec::new(),
            warnings: WarnOnce::default(),
            device,
            queue,
        }
    }

    /// Creates a backend on the first available adapter, without a surface.
    pub async fn headless(
        format: wgpu::TextureFormat,
        size: (u32, u32),
    ) -> Result<Self, RenderError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .map_err(|error| RenderError::Adapter(error.to_string()))?;

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: None,
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: Default::default(),
                trace: Default::default(),
            })
            .await
            .map_err(|error| RenderError::Device(error.to_string()))?;

        Ok(Self::new(Arc::new(device), Arc::new(queue), format, size))
    }

    pub fn device(&self) -> &Arc<wgpu::Device> {
        &self.device
    }

    pub fn queue(&self) -> &Arc<wgpu::Queue> {
        &self.queue
    }

    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    pub fn resize(&mut self, size: (u32, u32)) {
        if size != self.size {
            self.size = size;
            self.depth = create_depth_texture(&self.device, size);
        }
    }

    /// Offscreen color target matching the backend's format and size.
    pub fn create_render_target(&self) -> (wgpu::Texture, wgpu::TextureView) {
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Output Texture"),
            size: wgpu::Extent3d {
                width: self.size.0.max(1),
                height: self.size.1.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: self.format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        (texture, view)
    }

    /// Uploads an RGBA8 (sRGB) image.
    pub fn register_texture(&mut self, rgba: &[u8], size: (u32, u32)) -> Result<TextureId, BackendError> {
        self.textures
            .register(&self.device, &self.queue, &self.texture_layout, rgba, size)
    }

    pub fn update_texture(&mut self, texture: TextureId, rgba: &[u8]) -> Result<(), BackendError> {
        self.textures.update(&self.queue, texture, rgba)
    }

    pub fn unregister_texture(&mut self, texture: TextureId) -> bool {
        self.textures.remove(texture)
    }

    pub fn texture_size(&self, texture: TextureId) -> Option<(u32, u32)> {
        self.textures.size(texture)
    }

    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }

    /// Compiles a custom WGSL shader. It must use the builtin bind group layout and
    /// define `vs_main` and `fs_main`.
    pub fn load_shader(&mut self, wgsl: &str) -> Result<ShaderId, BackendError> {
        let module =
            create_checked_module(&self.device, "custom_shape_shader", wgsl).map_err(BackendError::ShaderCompilation)?;
        self.next_shader += 1;
        let id = ShaderId(self.next_shader);
        self.custom_modules.insert(id, module);
        Ok(id)
    }

    pub fn unload_shader(&mut self, shader: ShaderId) -> bool {
        self.pipelines
            .retain(|key, _| key.shader != ShaderBinding::Custom(shader));
        self.custom_modules.remove(&shader).is_some()
    }

    /// Draws recorded since the last submit.
    pub fn pending_draws(&self) -> usize {
        self.draws.len()
    }

    fn pipeline_for(&mut self, key: PipelineKey) -> bool {
        if self.pipelines.contains_key(&key) {
            return true;
        }

        let (module, fragment_entry) = match key.shader {
            ShaderBinding::Builtin(slot) => {
                let entry = match slot {
                    ShaderSlot::Light => "fs_light",
                    ShaderSlot::Fill | ShaderSlot::Line | ShaderSlot::Point => "fs_fill",
                };
                match self.builtin_module.as_ref() {
                    Some(module) if self.builtin_slots.contains(&slot) => (module, entry),
                    _ => return false,
                }
            }
            ShaderBinding::Custom(id) => match self.custom_modules.get(&id) {
                Some(module) => (module, "fs_main"),
                None => return false,
            },
        };

        let pipeline = create_shape_pipeline(
            &self.device,
            &ShapePipelineDescriptor {
                layout: &self.pipeline_layout,
                module,
                fragment_entry,
                format: self.format,
                pass_state: key.pass_state,
                primitive: key.primitive,
            },
        );
        debug!("Created pipeline for {:?}", key);
        self.pipelines.insert(key, pipeline);
        true
    }

    fn ensure_blocks(&mut self) {
        if self.transforms.len() == 0 {
            self.transforms
                .push(bytemuck::cast_slice(&Mat4::identity().to_array()));
        }
        if self.lighting.len() == 0 {
            self.lighting
                .push(bytemuck::bytes_of(&LightingSnapshot::new().to_uniform()));
        }
    }

    fn rebuild_frame_bind_group(&mut self) {
        let (Some(transforms), Some(lighting)) =
            (self.transforms.buffer.as_ref(), self.lighting.buffer.as_ref())
        else {
            return;
        };
        self.frame_bind_group = Some(self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("frame_bind_group"),
            layout: &self.frame_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: self.camera_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                        buffer: transforms,
                        offset: 0,
                        size: wgpu::BufferSize::new(TRANSFORM_BLOCK_SIZE),
                    }),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                        buffer: lighting,
                        offset: 0,
                        size: wgpu::BufferSize::new(LIGHTING_SIZE),
                    }),
                },
            ],
        }));
    }

    /// Encodes every draw recorded since the last submit into one render pass on
    /// `target` and submits it. `clear` clears the target first; otherwise its
    /// contents are kept. The depth buffer is always cleared.
    pub fn submit(&mut self, target: &wgpu::TextureView, clear: Option<Color>) {
        self.ensure_blocks();
        self.queue.write_buffer(
            &self.camera_buffer,
            0,
            bytemuck::cast_slice(&self.view_projection.to_array()),
        );
        let transforms_reallocated = self.transforms.upload(&self.device, &self.queue);
        let lighting_reallocated = self.lighting.upload(&self.device, &self.queue);
        if transforms_reallocated || lighting_reallocated || self.frame_bind_group.is_none() {
            self.rebuild_frame_bind_group();
        }

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Shape Encoder"),
            });

        {
            let load = match clear {
                Some(color) => {
                    let [r, g, b, a] = color.normalize();
                    wgpu::LoadOp::Clear(wgpu::Color {
                        r: f64::from(r),
                        g: f64::from(g),
                        b: f64::from(b),
                        a: f64::from(a),
                    })
                }
                None => wgpu::LoadOp::Load,
            };
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Shape Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: target,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth.1,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            if let Some(frame_bind_group) = self.frame_bind_group.as_ref() {
                for draw in &self.draws {
                    let (Some(pipeline), Some(buffer)) = (
                        self.pipelines.get(&draw.pipeline),
                        self.buffers.get(&draw.buffer),
                    ) else {
                        continue;
                    };
                    pass.set_pipeline(pipeline);
                    pass.set_bind_group(
                        0,
                        frame_bind_group,
                        &[
                            self.transforms.offset(draw.transform_block),
                            self.lighting.offset(draw.lighting_block),
                        ],
                    );
                    pass.set_bind_group(1, self.textures.bind_group(draw.texture), &[]);
                    pass.set_vertex_buffer(0, buffer.slice(..));
                    pass.draw(
                        draw.first_vertex..draw.first_vertex + draw.vertex_count,
                        0..1,
                    );
                }
            }
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        self.draws.clear();
        self.transforms.staged.clear();
        self.lighting.staged.clear();
        self.state = RecordState::default();
    }
}

fn create_checked_module(
    device: &wgpu::Device,
    label: &str,
    source: &str,
) -> Result<wgpu::ShaderModule, String> {
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Wgsl(source.into()),
    });
    match futures::executor::block_on(device.pop_error_scope()) {
        Some(error) => Err(error.to_string()),
        None => Ok(module),
    }
}

impl RenderBackend for WgpuBackend {
    fn capabilities(&self) -> Capabilities {
        Capabilities {
            max_transforms: GPU_TRANSFORM_SLOTS,
            native_lines: true,
            native_points: true,
            max_vertices: (self.device.limits().max_buffer_size / VERTEX_SIZE as u64) as usize,
        }
    }

    fn compile_builtin_shader(&mut self, slot: ShaderSlot) -> Result<(), BackendError> {
        if self.builtin_module.is_none() {
            let module = create_checked_module(&self.device, "shape_shader", SHAPE_SHADER)
                .map_err(|message| BackendError::BuiltinShader(slot, message))?;
            self.builtin_module = Some(module);
        }
        if !self.builtin_slots.contains(&slot) {
            self.builtin_slots.push(slot);
        }
        Ok(())
    }

    fn create_vertex_buffer(&mut self, capacity: usize) -> Result<BufferHandle, BackendError> {
        let size = (capacity * VERTEX_SIZE) as u64;
        if size == 0 || size > self.device.limits().max_buffer_size {
            return Err(BackendError::BufferAllocation(size));
        }
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("vertex_stream"),
            size,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        self.next_buffer += 1;
        let handle = BufferHandle(self.next_buffer);
        self.buffers.insert(handle, buffer);
        Ok(handle)
    }

    fn destroy_buffer(&mut self, buffer: BufferHandle) {
        if let Some(buffer) = self.buffers.remove(&buffer) {
            buffer.destroy();
        }
    }

    fn write_vertices(&mut self, buffer: BufferHandle, first_vertex: usize, vertices: &[Vertex]) {
        match self.buffers.get(&buffer) {
            Some(gpu_buffer) => self.queue.write_buffer(
                gpu_buffer,
                (first_vertex * VERTEX_SIZE) as u64,
                bytemuck::cast_slice(vertices),
            ),
            None => {
                self.warnings.warn(
                    "write-unknown-buffer",
                    format_args!("Vertex write to unknown buffer {buffer}"),
                );
            }
        }
    }

    fn set_view_projection(&mut self, view_projection: &Mat4) {
        self.view_projection = *view_projection;
    }

    fn bind_shader(&mut self, shader: ShaderBinding) {
        if let ShaderBinding::Custom(id) = shader {
            if !self.custom_modules.contains_key(&id) {
                self.warnings.warn(
                    "unknown-shader",
                    format_args!("{}; draws using it are dropped", BackendError::UnknownShader(id)),
                );
            }
        }
        self.state.shader = Some(shader);
    }

    fn bind_texture(&mut self, texture: Option<TextureId>) {
        if let Some(id) = texture {
            if !self.textures.contains(id) {
                self.warnings.warn(
                    "unknown-texture",
                    format_args!("{}; drawing untextured", BackendError::UnknownTexture(id)),
                );
            }
        }
        self.state.texture = texture;
    }

    fn set_pass_state(&mut self, state: PassState) {
        self.state.pass_state = Some(state);
    }

    fn bind_vertex_buffer(&mut self, buffer: BufferHandle) {
        self.state.buffer = Some(buffer);
    }

    fn upload_transforms(&mut self, transforms: &[Mat4]) {
        let mut block = Vec::with_capacity(TRANSFORM_BLOCK_SIZE as usize);
        for matrix in transforms.iter().take(GPU_TRANSFORM_SLOTS) {
            block.extend_from_slice(bytemuck::cast_slice(&matrix.to_array()));
        }
        if transforms.len() > GPU_TRANSFORM_SLOTS {
            warn!(
                "{} transforms uploaded, only {} fit in a block",
                transforms.len(),
                GPU_TRANSFORM_SLOTS
            );
        }
        self.state.transform_block = Some(self.transforms.push(&block));
    }

    fn upload_lighting(&mut self, lighting: &LightingUniform) {
        self.state.lighting_block = Some(self.lighting.push(bytemuck::bytes_of(lighting)));
    }

    fn draw(&mut self, primitive: PrimitiveKind, first_vertex: u32, vertex_count: u32) {
        let (Some(shader), Some(buffer)) = (self.state.shader, self.state.buffer) else {
            self.warnings.warn(
                "draw-without-state",
                format_args!("Draw issued without a bound shader or vertex buffer"),
            );
            return;
        };
        let key = PipelineKey {
            shader,
            pass_state: self.state.pass_state.unwrap_or(PassState::OPAQUE),
            primitive,
        };
        if !self.pipeline_for(key) {
            self.warnings.warn(
                "pipeline-unavailable",
                format_args!("No pipeline for {key:?}; dropping draw"),
            );
            return;
        }

        // Block 0 of each kind is created at submit if nothing was uploaded yet.
        self.draws.push(GpuDraw {
            pipeline: key,
            texture: self.state.texture,
            buffer,
            transform_block: self.state.transform_block.unwrap_or(0),
            lighting_block: self.state.lighting_block.unwrap_or(0),
            first_vertex,
            vertex_count,
        });
    }
}
