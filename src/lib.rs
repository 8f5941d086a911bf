pub use wgpu;

mod accumulator;
pub mod backend;
mod canvas;
mod color;
mod config;
mod error;
mod id;
mod lighting;
pub mod math;
mod renderer;
mod shape;
mod state_cache;
mod stroke;
pub mod tessellator;
mod text;
mod vertex;
mod vertex_stream;
mod warn_once;

pub use accumulator::{FrameAccumulator, ShapeCounts, ShapeSink};
pub use backend::{upload_mesh, RenderBackend, WgpuBackend};
pub use canvas::Canvas;
pub use color::Color;
pub use config::{FlushStrategy, RendererConfig, StreamPolicy, StrokeRenderMode, MAX_TRANSFORMS};
pub use error::{BackendError, RenderError, Result};
pub use id::{BufferHandle, ShaderId, TextureId};
pub use lighting::{Light, LightKind, LightingSnapshot, LightingUniform, MAX_LIGHTS};
pub use math::Mat4;
pub use renderer::{AvailableShaders, BatchRenderer, FlushStats, RenderStage, ShapeClass};
pub use shape::{CenterStrategy, ExternalBuffer, ShapeRecord, ShapeRecordBuilder, ShapeStyle, Topology};
pub use state_cache::StateCache;
pub use stroke::{StrokeAttributes, StrokeCap, StrokeJoin};
pub use tessellator::{PolygonTriangulation, Tessellator};
pub use text::{GlyphProvider, GlyphQuad, GridFont, TextAlignment};
pub use vertex::{Vertex, VERTEX_SIZE};
pub use vertex_stream::VertexStream;
pub use warn_once::WarnOnce;
