//! RGBA8 texture storage for the wgpu backend.

use ahash::HashMap;

use crate::error::BackendError;
use crate::id::TextureId;

struct StoredTexture {
    texture: wgpu::Texture,
    size: (u32, u32),
    bind_group: wgpu::BindGroup,
}

/// Owns uploaded textures and their bind groups. Texture id 0 is never handed out.
pub(super) struct TextureStore {
    sampler: wgpu::Sampler,
    textures: HashMap<TextureId, StoredTexture>,
    /// Bound for shapes without a texture; a single opaque white texel.
    white: wgpu::BindGroup,
    next_id: u64,
}

impl TextureStore {
    pub(super) fn new(device: &wgpu::Device, queue: &wgpu::Queue, layout: &wgpu::BindGroupLayout) -> Self {
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let white_texture = create_rgba_texture(device, (1, 1), "default_white_texture");
        write_rgba(queue, &white_texture, (1, 1), &[255, 255, 255, 255]);
        let white = create_bind_group(device, layout, &white_texture, &sampler);

        Self {
            sampler,
            textures: HashMap::default(),
            white,
            next_id: 0,
        }
    }

    /// Uploads an RGBA8 image and returns its id.
    pub(super) fn register(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        layout: &wgpu::BindGroupLayout,
        rgba: &[u8],
        size: (u32, u32),
    ) -> Result<TextureId, BackendError> {
        check_size(rgba, size)?;
        let texture = create_rgba_texture(device, size, "shape_texture");
        write_rgba(queue, &texture, size, rgba);
        let bind_group = create_bind_group(device, layout, &texture, &self.sampler);

        self.next_id += 1;
        let id = TextureId(self.next_id);
        self.textures.insert(
            id,
            StoredTexture {
                texture,
                size,
                bind_group,
            },
        );
        Ok(id)
    }

    /// Replaces the pixels of a registered texture of the same size.
    pub(super) fn update(
        &self,
        queue: &wgpu::Queue,
        id: TextureId,
        rgba: &[u8],
    ) -> Result<(), BackendError> {
        let stored = self
            .textures
            .get(&id)
            .ok_or(BackendError::UnknownTexture(id))?;
        check_size(rgba, stored.size)?;
        write_rgba(queue, &stored.texture, stored.size, rgba);
        Ok(())
    }

    pub(super) fn remove(&mut self, id: TextureId) -> bool {
        self.textures.remove(&id).is_some()
    }

    pub(super) fn contains(&self, id: TextureId) -> bool {
        self.textures.contains_key(&id)
    }

    pub(super) fn size(&self, id: TextureId) -> Option<(u32, u32)> {
        self.textures.get(&id).map(|stored| stored.size)
    }

    /// Bind group for `id`, or the white texture for `None` and unknown ids.
    pub(super) fn bind_group(&self, id: Option<TextureId>) -> &wgpu::BindGroup {
        id.and_then(|id| self.textures.get(&id))
            .map(|stored| &stored.bind_group)
            .unwrap_or(&self.white)
    }

    pub(super) fn len(&self) -> usize {
        self.textures.len()
    }
}

fn check_size(rgba: &[u8], size: (u32, u32)) -> Result<(), BackendError> {
    let expected = size.0 as usize * size.1 as usize * 4;
    if rgba.len() != expected || expected == 0 {
        return Err(BackendError::TextureSize {
            expected,
            actual: rgba.len(),
        });
    }
    Ok(())
}

fn create_rgba_texture(device: &wgpu::Device, size: (u32, u32), label: &str) -> wgpu::Texture {
    device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d {
            width: size.0,
            height: size.1,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8UnormSrgb,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    })
}

fn write_rgba(queue: &wgpu::Queue, texture: &wgpu::Texture, size: (u32, u32), rgba: &[u8]) {
    queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        rgba,
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(4 * size.0),
            rows_per_image: Some(size.1),
        },
        wgpu::Extent3d {
            width: size.0,
            height: size.1,
            depth_or_array_layers: 1,
        },
    );
}

fn create_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    texture: &wgpu::Texture,
    sampler: &wgpu::Sampler,
) -> wgpu::BindGroup {
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(&view),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(sampler),
            },
        ],
        label: Some("shape_texture_bind_group"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_check_rejects_mismatched_data() {
        assert!(check_size(&[0; 16], (2, 2)).is_ok());
        assert_eq!(
            check_size(&[0; 12], (2, 2)),
            Err(BackendError::TextureSize {
                expected: 16,
                actual: 12
            })
        );
        assert!(check_size(&[], (0, 0)).is_err());
    }
}
