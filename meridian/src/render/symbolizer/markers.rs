use lyon::math::{point, Transform};
use lyon::path::Path;
use meridian_types::{BoundingBox, Point2d};

use crate::decoded_image::DecodedImage;
use crate::feature::Feature;
use crate::render::canvas::{FillPaint, ImagePaint, StrokePaint};
use crate::render::placement::PlacementRules;
use crate::render::symbolizer::{
    centered_box, line_length, line_parts, placement_transform, point_along, repeat_positions,
    transformed_box, SymbolizerContext,
};
use crate::style::{MarkerPlacement, MarkerType, MarkersSymbolizer};

const ELLIPSE_SEGMENTS: usize = 32;

/// Outline of a built-in marker of the given size, centered on the origin. Arrows point along `x`.
pub(crate) fn marker_path(marker_type: MarkerType, width: f64, height: f64) -> Path {
    let (w, h) = (width as f32, height as f32);
    let mut builder = Path::builder();
    match marker_type {
        MarkerType::Ellipse => {
            for i in 0..ELLIPSE_SEGMENTS {
                let angle = i as f32 / ELLIPSE_SEGMENTS as f32 * std::f32::consts::TAU;
                let p = point(angle.cos() * w / 2.0, angle.sin() * h / 2.0);
                if i == 0 {
                    builder.begin(p);
                } else {
                    builder.line_to(p);
                }
            }
        }
        MarkerType::Arrow => {
            let outline = [
                (-w / 2.0, -h / 4.0),
                (0.0, -h / 4.0),
                (0.0, -h / 2.0),
                (w / 2.0, 0.0),
                (0.0, h / 2.0),
                (0.0, h / 4.0),
                (-w / 2.0, h / 4.0),
            ];
            builder.begin(point(outline[0].0, outline[0].1));
            for (x, y) in &outline[1..] {
                builder.line_to(point(*x, *y));
            }
        }
    }
    builder.end(true);
    builder.build()
}

enum Marker {
    Image(DecodedImage),
    Shape(Path),
}

impl Marker {
    fn size(&self, symbolizer: &MarkersSymbolizer, scale_factor: f64) -> (f64, f64) {
        match self {
            Marker::Image(image) => (
                image.width() as f64 * scale_factor,
                image.height() as f64 * scale_factor,
            ),
            Marker::Shape(_) => (symbolizer.width * scale_factor, symbolizer.height * scale_factor),
        }
    }
}

fn draw(
    marker: &Marker,
    symbolizer: &MarkersSymbolizer,
    ctx: &mut SymbolizerContext<'_>,
    transform: &Transform,
) {
    let scale_factor = ctx.scale_factor();
    match marker {
        Marker::Image(image) => {
            let to_center = Transform::translation(
                -(image.width() as f32) / 2.0,
                -(image.height() as f32) / 2.0,
            )
            .then_scale(scale_factor as f32, scale_factor as f32);
            ctx.canvas.draw_image(
                image,
                &to_center.then(transform),
                &ImagePaint::with_opacity(symbolizer.opacity),
            );
        }
        Marker::Shape(path) => {
            let path = path.clone().transformed(transform);
            ctx.canvas.fill_path(
                &path,
                &FillPaint::new(symbolizer.fill.with_opacity(symbolizer.opacity)),
            );
            if let Some(stroke) = &symbolizer.stroke {
                let mut paint = StrokePaint::from_stroke(stroke, scale_factor);
                paint.color = paint.color.with_opacity(symbolizer.opacity);
                ctx.canvas.stroke_path(&path, &paint);
            }
        }
    }
}

/// Candidate positions of markers along the lines of the feature, each with its alternatives.
///
/// Every `spacing` pixels a marker is tried at its position first, then moved back and forth by
/// `max_error * spacing` if there is no room.
fn line_candidates(
    symbolizer: &MarkersSymbolizer,
    feature: &Feature,
    ctx: &SymbolizerContext<'_>,
) -> Vec<Vec<(Point2d, f64)>> {
    let spacing = symbolizer.spacing * ctx.scale_factor();
    let error = symbolizer.max_error.max(0.0) * spacing;
    let mut candidates = Vec::new();
    for geometry in ctx.pixel_geometries(feature) {
        for part in line_parts(&geometry) {
            let length = line_length(&part);
            if length <= 0.0 {
                continue;
            }

            for distance in repeat_positions(length, spacing) {
                let alternatives = [distance, distance - error, distance + error]
                    .into_iter()
                    .filter(|d| (0.0..=length).contains(d))
                    .filter_map(|d| point_along(&part, d))
                    .collect();
                candidates.push(alternatives);
            }
        }
    }

    candidates
}

pub(super) fn render(symbolizer: &MarkersSymbolizer, feature: &Feature, ctx: &mut SymbolizerContext<'_>) {
    let marker = match &symbolizer.file {
        Some(file) => match ctx.image(file, feature) {
            Some(image) => Marker::Image(image),
            None => return,
        },
        None => {
            let marker_type = symbolizer.effective_marker_type();
            Marker::Shape(marker_path(
                marker_type,
                symbolizer.width * ctx.scale_factor(),
                symbolizer.height * ctx.scale_factor(),
            ))
        }
    };

    let (width, height) = marker.size(symbolizer, ctx.scale_factor());
    let rules = PlacementRules {
        allow_overlap: symbolizer.allow_overlap,
        avoid_edges: symbolizer.avoid_edges,
        ..Default::default()
    };

    let candidates: Vec<Vec<(Point2d, f64)>> = match symbolizer.placement {
        MarkerPlacement::Point => ctx
            .pixel_positions(feature)
            .into_iter()
            .map(|position| vec![(position, 0.0)])
            .collect(),
        MarkerPlacement::Line => line_candidates(symbolizer, feature, ctx),
    };

    for alternatives in candidates {
        for (position, angle) in alternatives {
            let transform = placement_transform(position, angle);
            let bbox: BoundingBox = transformed_box(&centered_box(width, height), &transform);
            if !ctx.placement.try_place(bbox, &rules) {
                continue;
            }

            draw(&marker, symbolizer, ctx, &transform);
            ctx.record(&symbolizer.base, feature, bbox);
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use meridian_types::Geometry;

    use super::*;
    use crate::context::Context;
    use crate::map::Map;
    use crate::render::canvas::{DrawCommand, RecordingCanvas};
    use crate::render::metawriter::MetaRecorder;
    use crate::render::placement::PlacementArbiter;
    use crate::render::symbolizer::testing::draw as draw_feature;
    use crate::style::Symbolizer;
    use crate::transform::{PixelTransform, ProjTransform, ViewTransform};
    use meridian_types::projection::WGS84_GEOGRAPHIC;
    use meridian_types::Projection;

    #[test]
    fn ellipse_outline() {
        let path = marker_path(MarkerType::Ellipse, 10.0, 4.0);
        let points: Vec<_> = path
            .iter()
            .filter_map(|event| match event {
                lyon::path::PathEvent::Line { to, .. } => Some(to),
                _ => None,
            })
            .collect();
        assert_eq!(points.len(), ELLIPSE_SEGMENTS - 1);
        let max_y = points.iter().map(|p| p.y).fold(f32::MIN, f32::max);
        assert_abs_diff_eq!(max_y, 2.0, epsilon = 1e-4);
    }

    #[test]
    fn markers_along_line() {
        let projection = Projection::new(WGS84_GEOGRAPHIC).unwrap();
        let proj = ProjTransform::new(&projection, &projection);
        let view = ViewTransform::new(
            200,
            100,
            meridian_types::BoundingBox::new(0.0, 0.0, 200.0, 100.0),
            0.0,
        );
        let map = Map::new(200, 100);
        let resources = Context::new();
        let mut canvas = RecordingCanvas::new(200, 100);
        let mut placement = PlacementArbiter::new(200, 100);
        let mut meta = MetaRecorder::new();
        let mut ctx = SymbolizerContext {
            canvas: &mut canvas,
            transform: PixelTransform::new(&proj, &view),
            map: &map,
            resources: &resources,
            placement: &mut placement,
            meta: &mut meta,
        };

        let symbolizer = MarkersSymbolizer {
            placement: MarkerPlacement::Line,
            spacing: 50.0,
            ..Default::default()
        };
        let feature = Feature::new().with_geometry(Geometry::line_string(&[(0.0, 50.0), (200.0, 50.0)]));
        render(&symbolizer, &feature, &mut ctx);

        let fills = canvas
            .commands
            .iter()
            .filter(|c| matches!(c, DrawCommand::Fill { .. }))
            .count();
        assert_eq!(fills, 4);
        assert_eq!(placement.len(), 4);
    }

    #[test]
    fn markers_crossing_the_edge_can_be_avoided() {
        let feature = Feature::new().with_geometry(Geometry::point(2.0, 50.0));
        let symbolizer = MarkersSymbolizer::default();
        let drawing = draw_feature(&Symbolizer::from(symbolizer.clone()), &feature, &Context::new());
        assert_eq!(drawing.commands.len(), 1);

        let avoiding = MarkersSymbolizer {
            avoid_edges: true,
            ..symbolizer
        };
        let drawing = draw_feature(&Symbolizer::from(avoiding), &feature, &Context::new());
        assert!(drawing.commands.is_empty());
        assert_eq!(drawing.placed, 0);
    }
}
