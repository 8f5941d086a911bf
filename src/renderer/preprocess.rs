//! First flush stage: routing, tessellation and depth of every submitted shape.

use tracing::trace;

use super::types::{BatchKey, PreparedFrame, PreparedShape, ShapeClass, ShapeSource};
use super::{AvailableShaders, FlushStats};
use crate::backend::{Capabilities, PrimitiveKind, ShaderBinding, ShaderSlot};
use crate::config::StrokeRenderMode;
use crate::math::{projected_depth, Mat4};
use crate::shape::{CenterStrategy, ShapeRecord, ShapeStyle, Topology};
use crate::tessellator::Tessellator;
use crate::warn_once::WarnOnce;

/// Inputs of the preprocess stage that stay fixed for a renderer.
pub(super) struct Routing {
    pub(super) shaders: AvailableShaders,
    pub(super) capabilities: Capabilities,
    pub(super) stroke_render_mode: StrokeRenderMode,
    pub(super) center_strategy: CenterStrategy,
}

pub(super) fn preprocess(
    records: &[ShapeRecord],
    routing: &Routing,
    view_projection: &Mat4,
    tessellator: &mut Tessellator,
    warnings: &mut WarnOnce,
    frame: &mut PreparedFrame,
    stats: &mut FlushStats,
) {
    for (index, record) in records.iter().enumerate() {
        let start = frame.vertices.len();

        let (primitive, source) = if let Some(external) = record.external_buffer() {
            (
                external_primitive(record.topology()),
                ShapeSource::External(*external),
            )
        } else {
            let primitive = match record.style() {
                ShapeStyle::Fill => {
                    tessellator.to_triangles(record.topology(), record.vertices(), &mut frame.vertices);
                    PrimitiveKind::Triangles
                }
                ShapeStyle::Stroke(attributes) => match native_route(record, routing, warnings) {
                    Some(PrimitiveKind::Points) => {
                        frame.vertices.extend_from_slice(record.vertices());
                        PrimitiveKind::Points
                    }
                    Some(PrimitiveKind::Lines) => {
                        tessellator.stroke_to_segments(
                            record.topology(),
                            record.vertices(),
                            record.is_closed(),
                            &mut frame.vertices,
                        );
                        PrimitiveKind::Lines
                    }
                    _ => {
                        tessellator.stroke_to_triangles(
                            record.topology(),
                            record.vertices(),
                            record.is_closed(),
                            attributes,
                            &mut frame.vertices,
                        );
                        PrimitiveKind::Triangles
                    }
                },
            };
            (primitive, ShapeSource::Stream(start..frame.vertices.len()))
        };

        let empty = match &source {
            ShapeSource::Stream(range) => range.is_empty(),
            ShapeSource::External(external) => external.vertex_count == 0,
        };
        if empty {
            match record.style() {
                ShapeStyle::Stroke(attributes) if !attributes.is_empty() && !record.vertices().is_empty() => {
                    warnings.warn(
                        "stroke-without-geometry",
                        format_args!(
                            "Stroke of shape {} with weight {} produced no geometry",
                            index, attributes.weight
                        ),
                    );
                }
                _ => trace!("Shape {} produced no geometry", index),
            }
            stats.skipped_shapes += 1;
            continue;
        }

        let Some(shader) = choose_shader(record, primitive, &routing.shaders, warnings) else {
            frame.vertices.truncate(start);
            stats.skipped_shapes += 1;
            continue;
        };

        let class = ShapeClass::of(record);
        let depth = if class == ShapeClass::Transparent {
            let center = record.center_object_space(routing.center_strategy);
            let model_view_projection = record.model_matrix().then(view_projection);
            projected_depth(&model_view_projection, center)
        } else {
            0.0
        };

        let key = BatchKey {
            texture: record.texture(),
            shader,
            primitive,
        };
        let next_group = frame.groups.len();
        let group = *frame.groups.entry(key).or_insert(next_group);

        frame.shapes.push(PreparedShape {
            record: index,
            class,
            key,
            source,
            group,
            depth,
            uses_lighting: record.is_light_enabled()
                && matches!(
                    shader,
                    ShaderBinding::Builtin(ShaderSlot::Light) | ShaderBinding::Custom(_)
                ),
        });
    }
}

fn external_primitive(topology: Topology) -> PrimitiveKind {
    match topology {
        Topology::Points => PrimitiveKind::Points,
        Topology::Lines | Topology::LineStrip => PrimitiveKind::Lines,
        _ => PrimitiveKind::Triangles,
    }
}

/// Native primitive a stroke shape is drawn with, or `None` to triangulate it.
fn native_route(
    record: &ShapeRecord,
    routing: &Routing,
    warnings: &mut WarnOnce,
) -> Option<PrimitiveKind> {
    if routing.stroke_render_mode != StrokeRenderMode::Native {
        return None;
    }

    let (primitive, supported) = if record.topology() == Topology::Points {
        (
            PrimitiveKind::Points,
            routing.capabilities.native_points && routing.shaders.contains(ShaderSlot::Point),
        )
    } else {
        (
            PrimitiveKind::Lines,
            routing.capabilities.native_lines && routing.shaders.contains(ShaderSlot::Line),
        )
    };

    if !supported {
        warnings.warn(
            if primitive == PrimitiveKind::Points {
                "native-points-unavailable"
            } else {
                "native-lines-unavailable"
            },
            format_args!("Native {primitive:?} rendering is unavailable; triangulating instead"),
        );
        return None;
    }

    warnings.warn(
        "native-strokes-partial",
        format_args!("Native stroke rendering ignores stroke weight, joins and caps"),
    );
    Some(primitive)
}

fn choose_shader(
    record: &ShapeRecord,
    primitive: PrimitiveKind,
    shaders: &AvailableShaders,
    warnings: &mut WarnOnce,
) -> Option<ShaderBinding> {
    if let Some(custom) = record.custom_shader() {
        return Some(ShaderBinding::Custom(custom));
    }

    let slot = match primitive {
        PrimitiveKind::Lines => ShaderSlot::Line,
        PrimitiveKind::Points => ShaderSlot::Point,
        PrimitiveKind::Triangles if record.is_light_enabled() => {
            if shaders.contains(ShaderSlot::Light) {
                ShaderSlot::Light
            } else {
                warnings.warn(
                    "light-shader-unavailable",
                    format_args!("Light shader is unavailable; lit shapes are drawn unlit"),
                );
                ShaderSlot::Fill
            }
        }
        PrimitiveKind::Triangles => ShaderSlot::Fill,
    };

    if !shaders.contains(slot) {
        warnings.warn(
            match slot {
                ShaderSlot::Line => "line-shader-unavailable",
                ShaderSlot::Point => "point-shader-unavailable",
                _ => "fill-shader-unavailable",
            },
            format_args!("{slot:?} shader is unavailable; skipping shapes that need it"),
        );
        return None;
    }
    Some(ShaderBinding::Builtin(slot))
}
