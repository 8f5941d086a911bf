//! The batch renderer turns a frame's worth of [`ShapeRecord`]s into backend draws.
//!
//! A flush runs through fixed stages:
//!
//! 1. **Preprocess**: every record is routed (triangles, native lines or points, or
//!    an external buffer), tessellated into the frame scratch and, when
//!    transparent, given a projected depth.
//! 2. **Opaque, light and transparent passes**: shapes are grouped into batches of
//!    identical texture, shader and primitive, and streamed in chunks of at most
//!    `max_transforms` shapes, each chunk one transform upload and one draw.
//!
//! ```rust
//! use tessera::backend::RecordingBackend;
//! use tessera::{BatchRenderer, Color, FrameAccumulator, Mat4, RendererConfig, ShapeRecord, Topology, Vertex};
//!
//! let mut renderer = BatchRenderer::new(RecordingBackend::new(), RendererConfig::default())?;
//! let mut frame = FrameAccumulator::new();
//! frame.submit(
//!     ShapeRecord::builder(Topology::Triangles)
//!         .vertices([
//!             Vertex::new([0.0, 0.0, 0.0], Color::WHITE),
//!             Vertex::new([1.0, 0.0, 0.0], Color::WHITE),
//!             Vertex::new([0.0, 1.0, 0.0], Color::WHITE),
//!         ])
//!         .build(),
//! );
//!
//! let stats = renderer.flush(&mut frame, &Mat4::identity(), &Mat4::identity());
//! assert_eq!(stats.draw_calls, 1);
//! assert!(frame.is_empty());
//! # Ok::<(), tessera::RenderError>(())
//! ```

mod batching;
mod metrics;
mod passes;
mod preprocess;
mod types;

pub use metrics::FlushStats;
pub use types::ShapeClass;

use tracing::{debug, trace, warn};

use crate::accumulator::{FrameAccumulator, ShapeCounts};
use crate::backend::{RenderBackend, ShaderSlot};
use crate::config::{FlushStrategy, RendererConfig};
use crate::error::RenderError;
use crate::math::Mat4;
use crate::state_cache::StateCache;
use crate::tessellator::Tessellator;
use crate::vertex_stream::VertexStream;
use crate::warn_once::WarnOnce;

use self::passes::PassContext;
use self::preprocess::Routing;
use self::types::{ChunkScratch, PreparedFrame};

/// Where a flush currently is. Stages only move forward and end back at `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum RenderStage {
    #[default]
    Idle,
    Preprocess,
    OpaquePass,
    LightPass,
    TransparentPass,
}

impl RenderStage {
    fn for_class(class: ShapeClass) -> Self {
        match class {
            ShapeClass::Opaque => RenderStage::OpaquePass,
            ShapeClass::Light => RenderStage::LightPass,
            ShapeClass::Transparent => RenderStage::TransparentPass,
        }
    }
}

/// Builtin shader slots that compiled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AvailableShaders {
    fill: bool,
    light: bool,
    line: bool,
    point: bool,
}

impl AvailableShaders {
    pub fn all() -> Self {
        Self {
            fill: true,
            light: true,
            line: true,
            point: true,
        }
    }

    fn slot_mut(&mut self, slot: ShaderSlot) -> &mut bool {
        match slot {
            ShaderSlot::Fill => &mut self.fill,
            ShaderSlot::Light => &mut self.light,
            ShaderSlot::Line => &mut self.line,
            ShaderSlot::Point => &mut self.point,
        }
    }

    pub fn insert(&mut self, slot: ShaderSlot) {
        *self.slot_mut(slot) = true;
    }

    pub fn remove(&mut self, slot: ShaderSlot) {
        *self.slot_mut(slot) = false;
    }

    pub fn contains(&self, slot: ShaderSlot) -> bool {
        match slot {
            ShaderSlot::Fill => self.fill,
            ShaderSlot::Light => self.light,
            ShaderSlot::Line => self.line,
            ShaderSlot::Point => self.point,
        }
    }
}

/// Batched shape renderer over a [`RenderBackend`].
pub struct BatchRenderer<B: RenderBackend> {
    backend: B,
    config: RendererConfig,
    routing: Routing,
    max_transforms: usize,
    tessellator: Tessellator,
    stream: VertexStream,
    cache: StateCache,
    warnings: WarnOnce,
    frame: PreparedFrame,
    chunk: ChunkScratch,
    stage: RenderStage,
    last_stats: FlushStats,
}

impl<B: RenderBackend> BatchRenderer<B> {
    /// Compiles the builtin shaders and allocates the vertex stream.
    ///
    /// A builtin shader that fails to compile is disabled with a warning and the
    /// shapes needing it degrade at flush time. Failing to allocate the vertex stream
    /// is fatal.
    pub fn new(mut backend: B, config: RendererConfig) -> Result<Self, RenderError> {
        let capabilities = backend.capabilities();

        let mut shaders = AvailableShaders::default();
        for slot in ShaderSlot::ALL {
            match backend.compile_builtin_shader(slot) {
                Ok(()) => shaders.insert(slot),
                Err(error) => warn!("{}; disabling the {:?} shader", error, slot),
            }
        }

        let max_transforms = config.max_transforms.clamp(1, capabilities.max_transforms.max(1));
        if max_transforms != config.max_transforms {
            warn!(
                "Requested {} transforms per upload, backend supports {}; using {}",
                config.max_transforms, capabilities.max_transforms, max_transforms
            );
        }

        let mut stream = VertexStream::new(config.stream);
        stream.allocate(&mut backend)?;

        debug!(
            "Batch renderer ready: {:?}, {} transforms per chunk, {} vertex capacity",
            shaders,
            max_transforms,
            stream.capacity()
        );

        Ok(Self {
            routing: Routing {
                shaders,
                capabilities,
                stroke_render_mode: config.stroke_render_mode,
                center_strategy: config.center_strategy,
            },
            tessellator: Tessellator::new(config.polygon_triangulation),
            backend,
            config,
            max_transforms,
            stream,
            cache: StateCache::new(),
            warnings: WarnOnce::default(),
            frame: PreparedFrame::default(),
            chunk: ChunkScratch::default(),
            stage: RenderStage::Idle,
            last_stats: FlushStats::default(),
        })
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    pub fn set_flush_strategy(&mut self, strategy: FlushStrategy) {
        self.config.flush_strategy = strategy;
    }

    /// Transforms per chunk after clamping to the backend limit.
    pub fn max_transforms(&self) -> usize {
        self.max_transforms
    }

    pub fn available_shaders(&self) -> AvailableShaders {
        self.routing.shaders
    }

    pub fn stage(&self) -> RenderStage {
        self.stage
    }

    pub fn stream(&self) -> &VertexStream {
        &self.stream
    }

    pub fn last_stats(&self) -> FlushStats {
        self.last_stats
    }

    /// Degraded paths and dropped shapes reported so far.
    pub fn warnings(&self) -> &WarnOnce {
        &self.warnings
    }

    /// Releases the vertex stream and hands the backend back.
    pub fn into_backend(mut self) -> B {
        self.stream.release(&mut self.backend);
        self.backend
    }

    fn enter(stage: &mut RenderStage, next: RenderStage) {
        debug_assert!(next == RenderStage::Idle || next >= *stage);
        if *stage != next {
            debug!("Render stage {:?} -> {:?}", *stage, next);
            *stage = next;
        }
    }

    /// Draws every shape in `accumulator`, then clears it for the next frame.
    ///
    /// Never fails: shapes that cannot be drawn are skipped, counted in
    /// [`FlushStats::skipped_shapes`] and reported once through the log. An empty
    /// accumulator issues no backend calls at all.
    pub fn flush(
        &mut self,
        accumulator: &mut FrameAccumulator,
        view: &Mat4,
        projection: &Mat4,
    ) -> FlushStats {
        let mut stats = FlushStats {
            shapes: accumulator.len() as u32,
            ..Default::default()
        };
        if accumulator.is_empty() {
            self.last_stats = stats;
            return stats;
        }

        let view_projection = view.then(projection);
        let counts = accumulator.counts();
        let records = accumulator.records();

        Self::enter(&mut self.stage, RenderStage::Preprocess);
        self.frame.clear();
        preprocess::preprocess(
            records,
            &self.routing,
            &view_projection,
            &mut self.tessellator,
            &mut self.warnings,
            &mut self.frame,
            &mut stats,
        );
        batching::build_batches(&mut self.frame, self.config.flush_strategy);

        if !self.frame.batches.is_empty() {
            match self.stream.reserve(&mut self.backend, self.frame.vertices.len()) {
                Ok(()) => self.draw_passes(records, counts, &view_projection, &mut stats),
                Err(error) => {
                    self.warnings.warn(
                        "vertex-stream-allocation",
                        format_args!("{error}; skipping the frame"),
                    );
                    stats.skipped_shapes = stats.shapes;
                }
            }
        }

        Self::enter(&mut self.stage, RenderStage::Idle);
        accumulator.prepare_next_frame();
        debug!("Flushed frame: {:?}", stats);
        self.last_stats = stats;
        stats
    }

    fn draw_passes(
        &mut self,
        records: &[crate::shape::ShapeRecord],
        counts: ShapeCounts,
        view_projection: &Mat4,
        stats: &mut FlushStats,
    ) {
        self.cache.invalidate();
        self.backend.set_view_projection(view_projection);

        let strategy = self.config.flush_strategy;
        let Self {
            backend,
            stream,
            cache,
            warnings,
            frame,
            chunk,
            stage,
            max_transforms,
            ..
        } = self;

        let mut context = PassContext {
            backend,
            stream,
            cache,
            warnings,
            chunk,
            stats,
            records,
            frame,
            max_transforms: *max_transforms,
        };

        if strategy == FlushStrategy::SubmissionOrder {
            // Classes interleave; everything is drawn under the first pass.
            Self::enter(stage, RenderStage::OpaquePass);
            context.stats.passes += 1;
            for batch in &frame.batches {
                context.draw_batch(batch);
            }
            return;
        }

        for (class, submitted) in [
            (ShapeClass::Opaque, counts.opaque),
            (ShapeClass::Light, counts.light),
            (ShapeClass::Transparent, counts.transparent),
        ] {
            if submitted == 0 {
                trace!("No {:?} shapes this frame; skipping the pass", class);
                continue;
            }
            let mut batches = frame.batches.iter().filter(|batch| batch.class == class).peekable();
            if batches.peek().is_none() {
                continue;
            }
            Self::enter(stage, RenderStage::for_class(class));
            context.stats.passes += 1;
            for batch in batches {
                context.draw_batch(batch);
            }
        }
    }
}

impl<B: RenderBackend> std::fmt::Debug for BatchRenderer<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchRenderer")
            .field("config", &self.config)
            .field("max_transforms", &self.max_transforms)
            .field("stage", &self.stage)
            .field("stream_capacity", &self.stream.capacity())
            .finish_non_exhaustive()
    }
}
