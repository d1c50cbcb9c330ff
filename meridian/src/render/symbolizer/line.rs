use lyon::math::{vector, Angle, Transform};
use meridian_types::{BoundingBox, Geometry, GeometryKind};

use crate::feature::Feature;
use crate::render::canvas::{geometry_path, ImagePaint, StrokePaint};
use crate::render::symbolizer::{line_parts, SymbolizerContext};
use crate::style::{LinePatternSymbolizer, LineSymbolizer};

fn pixel_envelope(geometries: &[Geometry]) -> Option<BoundingBox> {
    geometries
        .iter()
        .filter_map(Geometry::envelope)
        .reduce(|a, b| a.merge(&b))
}

/// Strokes lines and polygon outlines.
pub(super) fn render_line(symbolizer: &LineSymbolizer, feature: &Feature, ctx: &mut SymbolizerContext<'_>) {
    let geometries: Vec<Geometry> = ctx
        .pixel_geometries(feature)
        .into_iter()
        .filter(|g| g.kind() != GeometryKind::Point)
        .collect();
    if geometries.is_empty() {
        return;
    }

    let paint = StrokePaint::from_stroke(&symbolizer.stroke, ctx.scale_factor());
    for geometry in &geometries {
        ctx.canvas.stroke_path(&geometry_path(geometry), &paint);
    }

    if let Some(bbox) = pixel_envelope(&geometries) {
        ctx.record(&symbolizer.base, feature, bbox);
    }
}

/// Repeats the image along every segment of the lines, rotated to the segment direction and
/// centered on it.
pub(super) fn render_pattern(
    symbolizer: &LinePatternSymbolizer,
    feature: &Feature,
    ctx: &mut SymbolizerContext<'_>,
) {
    let Some(image) = ctx.image(&symbolizer.file, feature) else {
        return;
    };
    if image.width() == 0 {
        return;
    }

    let geometries = ctx.pixel_geometries(feature);
    let step = image.width() as f64;
    let half_height = image.height() as f32 / 2.0;
    let paint = ImagePaint::with_opacity(symbolizer.opacity);

    for geometry in &geometries {
        for part in line_parts(geometry) {
            for segment in part.windows(2) {
                let direction = segment[1] - segment[0];
                let length = direction.norm();
                if length <= 0.0 {
                    continue;
                }

                let angle = Angle::radians(direction.y.atan2(direction.x) as f32);
                let mut travelled = 0.0;
                while travelled < length {
                    let at = segment[0] + direction * (travelled / length);
                    let transform = Transform::translation(0.0, -half_height)
                        .then_rotate(angle)
                        .then_translate(vector(at.x as f32, at.y as f32));
                    ctx.canvas.draw_image(&image, &transform, &paint);
                    travelled += step;
                }
            }
        }
    }

    if let Some(bbox) = pixel_envelope(&geometries) {
        ctx.record(&symbolizer.base, feature, bbox);
    }
}

#[cfg(test)]
mod tests {
    use meridian_types::Geometry;

    use super::*;
    use crate::color::Color;
    use crate::context::Context;
    use crate::render::canvas::DrawCommand;
    use crate::render::symbolizer::testing::{draw, points, write_png};
    use crate::style::{Stroke, Symbolizer};

    #[test]
    fn lines_and_outlines_are_stroked() {
        let symbolizer = Symbolizer::from(LineSymbolizer {
            stroke: Stroke::new(Color::RED, 2.0),
            ..Default::default()
        });
        let feature = Feature::new()
            .with_geometry(Geometry::line_string(&[(10.0, 50.0), (90.0, 50.0)]))
            .with_geometry(Geometry::polygon(&[&[(20.0, 20.0), (40.0, 20.0), (40.0, 40.0)]]))
            .with_geometry(Geometry::point(70.0, 70.0));

        let drawing = draw(&symbolizer, &feature, &Context::new());
        assert_eq!(drawing.commands.len(), 2);
        for command in &drawing.commands {
            assert!(matches!(command, DrawCommand::Stroke { color, width, .. } if *color == Color::RED && *width == 2.0));
        }
        assert_eq!(points(&drawing.commands[0]), [(10.0, 50.0), (90.0, 50.0)]);
        assert_eq!(drawing.placed, 0);
    }

    #[test]
    fn pattern_is_repeated_along_segments() {
        let file = write_png("line-pattern", 10, 4);
        let symbolizer = Symbolizer::from(LinePatternSymbolizer {
            file: file.display().to_string().into(),
            opacity: 0.5,
            base: Default::default(),
        });
        let feature = Feature::new().with_geometry(Geometry::line_string(&[(10.0, 50.0), (40.0, 50.0)]));

        let drawing = draw(&symbolizer, &feature, &Context::new());
        let offsets: Vec<(f32, f32)> = drawing
            .commands
            .iter()
            .map(|command| match command {
                DrawCommand::Image { size, transform, opacity } => {
                    assert_eq!(*size, (10, 4));
                    assert_eq!(*opacity, 0.5);
                    (transform.m31, transform.m32)
                }
                other => panic!("unexpected command {other:?}"),
            })
            .collect();
        assert_eq!(offsets, [(10.0, 48.0), (20.0, 48.0), (30.0, 48.0)]);

        std::fs::remove_file(file).unwrap();
    }

    #[test]
    fn missing_pattern_draws_nothing() {
        let symbolizer = Symbolizer::from(LinePatternSymbolizer {
            file: "/no/such/pattern.png".into(),
            opacity: 1.0,
            base: Default::default(),
        });
        let feature = Feature::new().with_geometry(Geometry::line_string(&[(10.0, 50.0), (40.0, 50.0)]));
        assert!(draw(&symbolizer, &feature, &Context::new()).commands.is_empty());
    }
}
