//! Append-only GPU vertex stream shared by every shape drawn in a flush.
//!
//! Capacity is reserved once per flush, before the first draw, so a buffer is
//! never reallocated while earlier draws of the same frame still reference it.

use std::ops::Range;

use tracing::{debug, warn};

use crate::backend::{PrimitiveKind, RenderBackend};
use crate::config::StreamPolicy;
use crate::error::BackendError;
use crate::id::BufferHandle;
use crate::vertex::Vertex;

#[derive(Debug)]
pub struct VertexStream {
    policy: StreamPolicy,
    buffer: Option<BufferHandle>,
    capacity: usize,
    len: usize,
    slack_frames: u32,
    slack_peak: usize,
}

impl VertexStream {
    pub fn new(policy: StreamPolicy) -> Self {
        Self {
            policy,
            buffer: None,
            capacity: 0,
            len: 0,
            slack_frames: 0,
            slack_peak: 0,
        }
    }

    /// Allocates the initial buffer.
    pub fn allocate<B: RenderBackend>(&mut self, backend: &mut B) -> Result<(), BackendError> {
        let step = self.policy.growth_step.max(1);
        let capacity = self.policy.initial_capacity.max(1).div_ceil(step) * step;
        self.replace_buffer(backend, capacity)
    }

    #[inline]
    pub fn buffer(&self) -> Option<BufferHandle> {
        self.buffer
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Vertices appended since the last [`reserve`](Self::reserve).
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn remaining(&self) -> usize {
        self.capacity - self.len
    }

    /// Starts a frame that will append `required` vertices in total.
    ///
    /// Grows to the stepped size when the buffer is too small. Shrinks only after
    /// `shrink_after_frames` consecutive frames used less than `shrink_ratio` of the
    /// capacity, to the stepped size of the largest of those frames. Only a failed
    /// grow is an error; a failed shrink keeps the current buffer.
    pub fn reserve<B: RenderBackend>(
        &mut self,
        backend: &mut B,
        required: usize,
    ) -> Result<(), BackendError> {
        self.len = 0;

        if self.buffer.is_none() || required > self.capacity {
            self.slack_frames = 0;
            self.slack_peak = 0;
            let capacity = self.policy.grown_capacity(required);
            debug!(
                "Growing vertex stream from {} to {} vertices",
                self.capacity, capacity
            );
            return self.replace_buffer(backend, capacity);
        }

        if !self.policy.is_slack(required, self.capacity) {
            self.slack_frames = 0;
            self.slack_peak = 0;
            return Ok(());
        }

        self.slack_frames += 1;
        self.slack_peak = self.slack_peak.max(required);
        if self.slack_frames < self.policy.shrink_after_frames {
            return Ok(());
        }

        let capacity = self.policy.grown_capacity(self.slack_peak);
        self.slack_frames = 0;
        self.slack_peak = 0;
        if capacity < self.capacity {
            debug!(
                "Shrinking vertex stream from {} to {} vertices",
                self.capacity, capacity
            );
            if let Err(error) = self.replace_buffer(backend, capacity) {
                // The current buffer still holds this frame.
                warn!("Keeping the {}-vertex stream: {}", self.capacity, error);
            }
        }
        Ok(())
    }

    fn replace_buffer<B: RenderBackend>(
        &mut self,
        backend: &mut B,
        capacity: usize,
    ) -> Result<(), BackendError> {
        let buffer = backend.create_vertex_buffer(capacity)?;
        if let Some(previous) = self.buffer.replace(buffer) {
            backend.destroy_buffer(previous);
        }
        self.capacity = capacity;
        Ok(())
    }

    /// Writes `vertices` after everything appended so far and returns their range.
    /// Returns `None`, writing nothing, if they do not fit in the reserved capacity.
    pub fn append<B: RenderBackend>(
        &mut self,
        backend: &mut B,
        vertices: &[Vertex],
    ) -> Option<Range<u32>> {
        let buffer = self.buffer?;
        if vertices.len() > self.remaining() {
            return None;
        }
        let start = self.len;
        backend.write_vertices(buffer, start, vertices);
        self.len += vertices.len();
        Some(start as u32..self.len as u32)
    }

    /// Draws a range previously returned by [`append`](Self::append). The stream
    /// buffer must be bound.
    pub fn draw<B: RenderBackend>(&self, backend: &mut B, primitive: PrimitiveKind, range: Range<u32>) {
        if range.is_empty() {
            return;
        }
        backend.draw(primitive, range.start, range.end - range.start);
    }

    pub fn release<B: RenderBackend>(&mut self, backend: &mut B) {
        if let Some(buffer) = self.buffer.take() {
            backend.destroy_buffer(buffer);
        }
        self.capacity = 0;
        self.len = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendCommand, RecordingBackend};
    use crate::Color;

    fn policy() -> StreamPolicy {
        StreamPolicy {
            initial_capacity: 100,
            growth_step: 100,
            shrink_ratio: 0.25,
            shrink_after_frames: 3,
        }
    }

    #[test]
    fn grows_in_steps_before_drawing() {
        let mut backend = RecordingBackend::new();
        let mut stream = VertexStream::new(policy());
        stream.allocate(&mut backend).unwrap();
        assert_eq!(stream.capacity(), 100);

        stream.reserve(&mut backend, 250).unwrap();
        assert_eq!(stream.capacity(), 400);
        assert_eq!(backend.live_buffers(), 1);

        let vertices = vec![Vertex::new([0.0; 3], Color::WHITE); 250];
        assert_eq!(stream.append(&mut backend, &vertices), Some(0..250));
        assert_eq!(stream.append(&mut backend, &vertices), None);
    }

    #[test]
    fn shrinks_only_after_sustained_slack() {
        let mut backend = RecordingBackend::new();
        let mut stream = VertexStream::new(policy());
        stream.reserve(&mut backend, 1000).unwrap();
        assert_eq!(stream.capacity(), 1500);

        stream.reserve(&mut backend, 10).unwrap();
        stream.reserve(&mut backend, 400).unwrap();
        assert_eq!(stream.capacity(), 1500);
        stream.reserve(&mut backend, 20).unwrap();
        assert_eq!(stream.capacity(), 1500, "a busy frame resets the slack count");

        stream.reserve(&mut backend, 200).unwrap();
        stream.reserve(&mut backend, 10).unwrap();
        assert_eq!(stream.capacity(), 300);

        let destroyed = backend.count_commands(|c| matches!(c, BackendCommand::DestroyBuffer(_)));
        assert_eq!(destroyed, 1);
    }

    #[test]
    fn failed_shrink_keeps_the_current_buffer() {
        let mut backend = RecordingBackend::new();
        let mut stream = VertexStream::new(policy());
        stream.reserve(&mut backend, 1000).unwrap();
        let buffer = stream.buffer();

        backend.set_failing_allocations(true);
        for _ in 0..3 {
            assert!(stream.reserve(&mut backend, 10).is_ok());
        }
        assert_eq!(stream.capacity(), 1500);
        assert_eq!(stream.buffer(), buffer);
        let vertices = vec![Vertex::new([0.0; 3], Color::WHITE); 10];
        assert_eq!(stream.append(&mut backend, &vertices), Some(0..10));

        assert!(stream.reserve(&mut backend, 2000).is_err());

        backend.set_failing_allocations(false);
        for _ in 0..3 {
            stream.reserve(&mut backend, 10).unwrap();
        }
        assert!(stream.capacity() < 1500);
    }
}
