use crate::Color;

/// GPU vertex shared by every shape. The layout is fixed for the lifetime of the
/// process: all attribute bindings are described once from [`Vertex::desc`].
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub color: [f32; 4],
    pub tex_coords: [f32; 2],
    /// Slot of the model matrix in the current transform upload. Assigned by the
    /// renderer while streaming; drawing code leaves it at zero.
    pub transform_index: u32,
}

pub const VERTEX_SIZE: usize = 52;

const _: () = assert!(std::mem::size_of::<Vertex>() == VERTEX_SIZE);

impl Default for Vertex {
    fn default() -> Self {
        Self {
            position: [0.0; 3],
            normal: [0.0, 0.0, 1.0],
            color: [1.0; 4],
            tex_coords: [0.0; 2],
            transform_index: 0,
        }
    }
}

impl Vertex {
    pub fn new(position: [f32; 3], color: Color) -> Self {
        Self {
            position,
            color: color.normalize(),
            ..Default::default()
        }
    }

    pub fn with_normal(mut self, normal: [f32; 3]) -> Self {
        self.normal = normal;
        self
    }

    pub fn with_tex_coords(mut self, tex_coords: [f32; 2]) -> Self {
        self.tex_coords = tex_coords;
        self
    }

    pub fn with_color(mut self, color: [f32; 4]) -> Self {
        self.color = color;
        self
    }

    /// Same attributes, different position. Used for geometry introduced by the
    /// tessellator, which inherits everything from its anchor vertex.
    #[inline]
    pub(crate) fn moved_to(&self, position: [f32; 3]) -> Self {
        Self { position, ..*self }
    }

    #[inline]
    pub fn alpha(&self) -> f32 {
        self.color[3]
    }

    const ATTRIBUTES: [wgpu::VertexAttribute; 5] = wgpu::vertex_attr_array![
        0 => Float32x3,
        1 => Float32x3,
        2 => Float32x4,
        3 => Float32x2,
        4 => Uint32,
    ];

    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attribute_offsets_match_struct_layout() {
        let desc = Vertex::desc();
        let offsets: Vec<u64> = desc.attributes.iter().map(|a| a.offset).collect();
        assert_eq!(offsets, vec![0, 12, 24, 40, 48]);
        assert_eq!(desc.array_stride, VERTEX_SIZE as u64);
    }

    #[test]
    fn moved_vertex_keeps_attributes() {
        let vertex = Vertex::new([1.0, 2.0, 3.0], Color::rgba(10, 20, 30, 40))
            .with_tex_coords([0.25, 0.75]);
        let moved = vertex.moved_to([5.0, 5.0, 5.0]);
        assert_eq!(moved.color, vertex.color);
        assert_eq!(moved.tex_coords, vertex.tex_coords);
        assert_eq!(moved.position, [5.0, 5.0, 5.0]);
    }
}
