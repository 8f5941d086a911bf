//! Draw emission: state changes, transform chunks and external buffers.

use tracing::trace;

use super::types::{Batch, ChunkScratch, PreparedFrame, ShapeClass, ShapeSource};
use super::FlushStats;
use crate::backend::RenderBackend;
use crate::shape::{ExternalBuffer, ShapeRecord};
use crate::state_cache::StateCache;
use crate::vertex::Vertex;
use crate::vertex_stream::VertexStream;
use crate::warn_once::WarnOnce;

/// Everything a pass writes to, borrowed from the renderer for one flush.
pub(super) struct PassContext<'a, B: RenderBackend> {
    pub(super) backend: &'a mut B,
    pub(super) stream: &'a mut VertexStream,
    pub(super) cache: &'a mut StateCache,
    pub(super) warnings: &'a mut WarnOnce,
    pub(super) chunk: &'a mut ChunkScratch,
    pub(super) stats: &'a mut FlushStats,
    pub(super) records: &'a [ShapeRecord],
    pub(super) frame: &'a PreparedFrame,
    pub(super) max_transforms: usize,
}

impl<B: RenderBackend> PassContext<'_, B> {
    pub(super) fn draw_batch(&mut self, batch: &Batch) {
        self.stats.batches += 1;
        self.stats.shader_switches += u32::from(self.cache.bind_shader(self.backend, batch.key.shader));
        self.stats.texture_switches +=
            u32::from(self.cache.bind_texture(self.backend, batch.key.texture));
        self.stats.pass_state_switches +=
            u32::from(self.cache.set_pass_state(self.backend, batch.class.pass_state()));

        let frame = self.frame;
        self.chunk.clear();
        for &shape_index in &frame.order[batch.shapes.clone()] {
            let shape = &frame.shapes[shape_index];
            match &shape.source {
                ShapeSource::External(external) => {
                    self.flush_chunk(batch);
                    self.draw_external(batch, shape_index, *external);
                }
                ShapeSource::Stream(_) => {
                    if self.chunk.members.len() >= self.max_transforms
                        || self.lighting_changes(shape_index)
                    {
                        self.flush_chunk(batch);
                    }
                    self.chunk.members.push(shape_index);
                }
            }
        }
        self.flush_chunk(batch);
    }

    /// Lit shapes can only share a chunk if their lighting snapshots are equal.
    fn lighting_changes(&self, shape_index: usize) -> bool {
        let shape = &self.frame.shapes[shape_index];
        let Some(&first) = self.chunk.members.first() else {
            return false;
        };
        let first = &self.frame.shapes[first];
        (shape.uses_lighting || first.uses_lighting)
            && self.records[shape.record].lighting() != self.records[first.record].lighting()
    }

    fn flush_chunk(&mut self, batch: &Batch) {
        if self.chunk.members.is_empty() {
            return;
        }

        let (frame, records) = (self.frame, self.records);
        self.chunk.vertices.clear();
        self.chunk.transforms.clear();
        for (slot, &shape_index) in self.chunk.members.iter().enumerate() {
            let shape = &frame.shapes[shape_index];
            let ShapeSource::Stream(range) = &shape.source else {
                continue;
            };
            self.chunk
                .transforms
                .push(*records[shape.record].model_matrix());
            self.chunk.vertices.extend(
                frame.vertices[range.clone()]
                    .iter()
                    .map(|vertex| Vertex {
                        transform_index: slot as u32,
                        ..*vertex
                    }),
            );
        }

        let member_count = self.chunk.members.len() as u32;
        let first = &frame.shapes[self.chunk.members[0]];
        let lighting = first
            .uses_lighting
            .then(|| records[first.record].lighting())
            .flatten();

        let Some(range) = self.stream.append(self.backend, &self.chunk.vertices) else {
            self.warnings.warn(
                "vertex-stream-overflow",
                format_args!(
                    "Vertex stream has no room for {} vertices; skipping",
                    self.chunk.vertices.len()
                ),
            );
            self.stats.skipped_shapes += member_count;
            self.chunk.members.clear();
            return;
        };

        self.backend.upload_transforms(&self.chunk.transforms);
        self.stats.transform_uploads += 1;
        if let Some(lighting) = lighting {
            self.stats.lighting_uploads += u32::from(self.cache.upload_lighting(self.backend, lighting));
        }
        if let Some(buffer) = self.stream.buffer() {
            self.stats.buffer_binds += u32::from(self.cache.bind_vertex_buffer(self.backend, buffer));
        }

        trace!(
            "Drawing chunk of {} shapes ({} vertices)",
            member_count,
            range.end - range.start
        );
        self.stats.vertices_streamed += range.end - range.start;
        self.stream.draw(self.backend, batch.key.primitive, range);
        self.count_draw(batch.class);
        self.stats.chunks += 1;
        self.chunk.members.clear();
    }

    /// Draws a caller-owned buffer with its model matrix in slot 0, then restores the
    /// stream buffer.
    fn draw_external(&mut self, batch: &Batch, shape_index: usize, external: ExternalBuffer) {
        let shape = &self.frame.shapes[shape_index];
        let record = &self.records[shape.record];
        let uses_lighting = shape.uses_lighting;

        self.backend
            .upload_transforms(std::slice::from_ref(record.model_matrix()));
        self.stats.transform_uploads += 1;
        if uses_lighting {
            if let Some(lighting) = record.lighting() {
                self.stats.lighting_uploads +=
                    u32::from(self.cache.upload_lighting(self.backend, lighting));
            }
        }

        self.stats.buffer_binds += u32::from(self.cache.bind_vertex_buffer(self.backend, external.buffer));
        self.backend.draw(
            batch.key.primitive,
            external.first_vertex,
            external.vertex_count,
        );
        self.count_draw(batch.class);
        self.stats.chunks += 1;

        if let Some(buffer) = self.stream.buffer() {
            self.stats.buffer_binds += u32::from(self.cache.bind_vertex_buffer(self.backend, buffer));
        }
    }

    fn count_draw(&mut self, class: ShapeClass) {
        self.stats.draw_calls += 1;
        match class {
            ShapeClass::Opaque => self.stats.opaque_draws += 1,
            ShapeClass::Light => self.stats.light_draws += 1,
            ShapeClass::Transparent => self.stats.transparent_draws += 1,
        }
    }
}
