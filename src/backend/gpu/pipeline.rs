use wgpu::util::DeviceExt;
use wgpu::{BindGroupLayout, Device, RenderPipeline, Texture, TextureView};

use crate::backend::{PassState, PrimitiveKind};
use crate::vertex::Vertex;

pub(super) const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// Model matrices per transform block; matches `MAX_TRANSFORMS` in `shape.wgsl`.
pub(super) const GPU_TRANSFORM_SLOTS: usize = 256;

pub(super) const TRANSFORM_BLOCK_SIZE: u64 = (GPU_TRANSFORM_SLOTS * 64) as u64;

pub(super) fn create_buffer_init(
    device: &Device,
    label: Option<&str>,
    contents: &[u8],
    usage: wgpu::BufferUsages,
) -> wgpu::Buffer {
    device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label,
        contents,
        usage,
    })
}

/// Rounds `size` up to the device's dynamic uniform offset alignment.
pub(super) fn align_uniform(size: u64, alignment: u64) -> u64 {
    let alignment = alignment.max(1);
    size.div_ceil(alignment) * alignment
}

fn uniform_entry(binding: u32, dynamic: bool, size: u64) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: dynamic,
            min_binding_size: wgpu::BufferSize::new(size),
        },
        count: None,
    }
}

/// Group 0: camera, transform block and lighting block. The last two are bound with
/// dynamic offsets so each draw selects the block staged for it.
pub(super) fn create_frame_bind_group_layout(device: &Device, lighting_size: u64) -> BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("frame_bind_group_layout"),
        entries: &[
            uniform_entry(0, false, 64),
            uniform_entry(1, true, TRANSFORM_BLOCK_SIZE),
            uniform_entry(2, true, lighting_size),
        ],
    })
}

/// Group 1: shape texture and its sampler.
pub(super) fn create_texture_bind_group_layout(device: &Device) -> BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("shape_texture_bind_group_layout"),
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    multisampled: false,
                    view_dimension: wgpu::TextureViewDimension::D2,
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            },
        ],
    })
}

pub(super) fn create_depth_texture(device: &Device, size: (u32, u32)) -> (Texture, TextureView) {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Depth Texture"),
        size: wgpu::Extent3d {
            width: size.0.max(1),
            height: size.1.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    (texture, view)
}

fn depth_state(pass_state: PassState) -> wgpu::DepthStencilState {
    wgpu::DepthStencilState {
        format: DEPTH_FORMAT,
        depth_write_enabled: pass_state.depth_write,
        depth_compare: wgpu::CompareFunction::LessEqual,
        stencil: wgpu::StencilState::default(),
        bias: wgpu::DepthBiasState::default(),
    }
}

fn alpha_blending() -> wgpu::BlendState {
    wgpu::BlendState {
        color: wgpu::BlendComponent {
            src_factor: wgpu::BlendFactor::SrcAlpha,
            dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
            operation: wgpu::BlendOperation::Add,
        },
        alpha: wgpu::BlendComponent {
            src_factor: wgpu::BlendFactor::One,
            dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
            operation: wgpu::BlendOperation::Add,
        },
    }
}

fn topology(primitive: PrimitiveKind) -> wgpu::PrimitiveTopology {
    match primitive {
        PrimitiveKind::Triangles => wgpu::PrimitiveTopology::TriangleList,
        PrimitiveKind::Lines => wgpu::PrimitiveTopology::LineList,
        PrimitiveKind::Points => wgpu::PrimitiveTopology::PointList,
    }
}

pub(super) struct ShapePipelineDescriptor<'a> {
    pub(super) layout: &'a wgpu::PipelineLayout,
    pub(super) module: &'a wgpu::ShaderModule,
    pub(super) fragment_entry: &'a str,
    pub(super) format: wgpu::TextureFormat,
    pub(super) pass_state: PassState,
    pub(super) primitive: PrimitiveKind,
}

pub(super) fn create_shape_pipeline(
    device: &Device,
    descriptor: &ShapePipelineDescriptor<'_>,
) -> RenderPipeline {
    let targets = [Some(wgpu::ColorTargetState {
        format: descriptor.format,
        blend: descriptor.pass_state.blend.then(alpha_blending),
        write_mask: wgpu::ColorWrites::ALL,
    })];

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("Shape Pipeline"),
        layout: Some(descriptor.layout),
        vertex: wgpu::VertexState {
            module: descriptor.module,
            entry_point: Some("vs_main"),
            compilation_options: Default::default(),
            buffers: &[Vertex::desc()],
        },
        fragment: Some(wgpu::FragmentState {
            module: descriptor.module,
            entry_point: Some(descriptor.fragment_entry),
            compilation_options: Default::default(),
            targets: &targets,
        }),
        primitive: wgpu::PrimitiveState {
            topology: topology(descriptor.primitive),
            cull_mode: None,
            ..Default::default()
        },
        depth_stencil: Some(depth_state(descriptor.pass_state)),
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    })
}
