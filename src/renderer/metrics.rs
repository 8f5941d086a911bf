/// Counters describing what a single [`flush`](super::BatchRenderer::flush) did.
///
/// Switch counts only include transitions actually sent to the backend; redundant
/// ones elided by the state cache are not counted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushStats {
    /// Shapes consumed from the accumulator.
    pub shapes: u32,
    /// Render passes entered. Classes with no shapes get no pass.
    pub passes: u32,
    /// Backend draw calls issued.
    pub draw_calls: u32,
    /// Draw calls issued in each pass.
    pub opaque_draws: u32,
    pub light_draws: u32,
    pub transparent_draws: u32,
    /// Runs of shapes sharing texture, shader and primitive kind.
    pub batches: u32,
    /// Groups of at most `max_transforms` shapes drawn with one transform upload.
    pub chunks: u32,
    pub transform_uploads: u32,
    pub lighting_uploads: u32,
    pub shader_switches: u32,
    pub texture_switches: u32,
    pub pass_state_switches: u32,
    pub buffer_binds: u32,
    /// Vertices written to the vertex stream.
    pub vertices_streamed: u32,
    /// Shapes dropped because they produced no geometry or could not be drawn.
    pub skipped_shapes: u32,
}

impl FlushStats {
    /// Merge another flush's counts into this accumulator.
    pub fn accumulate(&mut self, other: &Self) {
        self.shapes += other.shapes;
        self.passes += other.passes;
        self.draw_calls += other.draw_calls;
        self.opaque_draws += other.opaque_draws;
        self.light_draws += other.light_draws;
        self.transparent_draws += other.transparent_draws;
        self.batches += other.batches;
        self.chunks += other.chunks;
        self.transform_uploads += other.transform_uploads;
        self.lighting_uploads += other.lighting_uploads;
        self.shader_switches += other.shader_switches;
        self.texture_switches += other.texture_switches;
        self.pass_state_switches += other.pass_state_switches;
        self.buffer_binds += other.buffer_binds;
        self.vertices_streamed += other.vertices_streamed;
        self.skipped_shapes += other.skipped_shapes;
    }

    /// Total state transitions sent to the backend.
    pub fn state_switches(&self) -> u32 {
        self.shader_switches + self.texture_switches + self.pass_state_switches + self.buffer_binds
    }
}
