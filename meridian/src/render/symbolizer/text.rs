use lyon::math::{vector, Transform};
use lyon::path::Path;
use meridian_types::{BoundingBox, Point2d};

use crate::color::Color;
use crate::feature::Feature;
use crate::render::canvas::{Canvas, FillPaint, StrokePaint};
use crate::render::placement::PlacementRules;
use crate::render::symbolizer::{
    line_length, line_parts, max_bend, placement_transform, point_along, repeat_positions,
    transformed_box, SymbolizerContext,
};
use crate::render::text::{transform_text, ShapedText, TextLayout, TextShaper};
use crate::style::{LabelPlacement, TextProperties, TextSymbolizer};

/// Fills a label path over its halo.
pub(super) fn draw_label(
    canvas: &mut dyn Canvas,
    path: &Path,
    fill: Color,
    halo_fill: Color,
    halo_radius: f64,
    opacity: f64,
) {
    if halo_radius > 0.0 {
        let mut halo = StrokePaint::solid(halo_fill.with_opacity(opacity), halo_radius * 2.0);
        halo.line_join = crate::style::LineJoin::Round;
        canvas.stroke_path(path, &halo);
    }
    canvas.fill_path(path, &FillPaint::new(fill.with_opacity(opacity)));
}

/// Text of the label for the feature, or `None` if it is empty.
pub(super) fn label_text(properties: &TextProperties, feature: &Feature) -> Option<String> {
    let text = transform_text(
        &properties.name.evaluate(feature).to_string(),
        properties.text_transform,
    );
    (!text.trim().is_empty()).then_some(text)
}

pub(super) fn placement_rules(properties: &TextProperties, scale_factor: f64) -> PlacementRules {
    PlacementRules {
        allow_overlap: properties.allow_overlap,
        avoid_edges: properties.avoid_edges,
        min_distance: properties.min_distance * scale_factor,
        reserve: true,
    }
}

/// Positions and angles (radians) of labels along the lines of the feature.
///
/// Labels are placed straight, centered on the position. Positions where the line bends more than
/// `max_char_angle_delta` under the label are skipped. Angles are kept within `-90..=90` degrees
/// so the text is never upside down.
pub(super) fn line_positions(
    ctx: &SymbolizerContext<'_>,
    properties: &TextProperties,
    feature: &Feature,
    label_width: f64,
) -> Vec<(Point2d, f64)> {
    let spacing = properties.spacing * ctx.scale_factor();
    let mut positions = Vec::new();
    for geometry in ctx.pixel_geometries(feature) {
        for part in line_parts(&geometry) {
            let length = line_length(&part);
            if length < label_width {
                continue;
            }

            for distance in repeat_positions(length, spacing) {
                let from = distance - label_width / 2.0;
                let to = distance + label_width / 2.0;
                if from < 0.0 || to > length {
                    continue;
                }
                if max_bend(&part, from, to) > properties.max_char_angle_delta {
                    continue;
                }

                let Some((position, mut angle)) = point_along(&part, distance) else {
                    continue;
                };
                if angle > std::f64::consts::FRAC_PI_2 {
                    angle -= std::f64::consts::PI;
                } else if angle <= -std::f64::consts::FRAC_PI_2 {
                    angle += std::f64::consts::PI;
                }
                positions.push((position, angle));
            }
        }
    }

    positions
}

fn place_and_draw(
    symbolizer: &TextSymbolizer,
    feature: &Feature,
    ctx: &mut SymbolizerContext<'_>,
    shaped: &ShapedText,
    transform: &Transform,
) {
    let properties = &symbolizer.text;
    let bbox: BoundingBox = transformed_box(&shaped.bbox, transform);
    let rules = placement_rules(properties, ctx.scale_factor());
    if !ctx.placement.try_place(bbox, &rules) {
        log::trace!("No room for label of feature {}", feature.id());
        return;
    }

    let path = shaped.path.clone().transformed(transform);
    let halo_radius = properties.halo_radius * ctx.scale_factor();
    draw_label(
        ctx.canvas,
        &path,
        properties.fill,
        properties.halo_fill,
        halo_radius,
        properties.opacity,
    );
    ctx.record(&symbolizer.base, feature, bbox);
}

pub(super) fn render(symbolizer: &TextSymbolizer, feature: &Feature, ctx: &mut SymbolizerContext<'_>) {
    let properties = &symbolizer.text;
    let Some(text) = label_text(properties, feature) else {
        return;
    };

    let faces = ctx.faces(&properties.font);
    let Some(shaper) = TextShaper::new(&faces) else {
        return;
    };

    let scale_factor = ctx.scale_factor();
    let layout = TextLayout::from_properties(properties, scale_factor);
    let Some(shaped) = shaper.layout(&text, &layout) else {
        return;
    };
    let offset = vector((properties.dx * scale_factor) as f32, (properties.dy * scale_factor) as f32);

    match properties.placement {
        LabelPlacement::Point => {
            for position in ctx.pixel_positions(feature) {
                let transform = placement_transform(position, 0.0).then_translate(offset);
                place_and_draw(symbolizer, feature, ctx, &shaped, &transform);
            }
        }
        LabelPlacement::Line => {
            for (position, angle) in line_positions(ctx, properties, feature, shaped.bbox.width()) {
                let transform = Transform::translation(offset.x, offset.y)
                    .then(&placement_transform(position, angle));
                place_and_draw(symbolizer, feature, ctx, &shaped, &transform);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use meridian_types::Geometry;

    use super::*;
    use crate::context::Context;
    use crate::expression::{Expression, Value};
    use crate::render::canvas::DrawCommand;
    use crate::render::symbolizer::testing::{draw, system_font};
    use crate::style::{FontRef, Symbolizer};

    fn label(face_name: &str) -> TextSymbolizer {
        let mut text = TextProperties::new(
            Expression::literal(Value::from("Main")),
            FontRef::Face(face_name.to_string()),
        );
        text.size = 20.0;
        TextSymbolizer {
            text,
            base: Default::default(),
        }
    }

    #[test]
    fn label_is_drawn_over_its_halo() {
        let Some((resources, face_name)) = system_font() else {
            return;
        };
        let mut symbolizer = label(&face_name);
        symbolizer.text.fill = Color::RED;
        symbolizer.text.halo_radius = 2.0;
        symbolizer.text.opacity = 0.5;
        let feature = Feature::new().with_geometry(Geometry::point(50.0, 50.0));

        let drawing = draw(&Symbolizer::from(symbolizer), &feature, &resources);
        assert_eq!(drawing.commands.len(), 2);
        assert!(matches!(
            &drawing.commands[0],
            DrawCommand::Stroke { color, width, .. } if *color == Color::WHITE.with_opacity(0.5) && *width == 4.0
        ));
        assert!(
            matches!(&drawing.commands[1], DrawCommand::Fill { color, .. } if *color == Color::RED.with_opacity(0.5))
        );
        assert_eq!(drawing.placed, 1);
    }

    #[test]
    fn labels_crossing_the_edge_can_be_avoided() {
        let Some((resources, face_name)) = system_font() else {
            return;
        };
        let feature = Feature::new().with_geometry(Geometry::point(2.0, 50.0));

        let symbolizer = label(&face_name);
        assert_eq!(draw(&Symbolizer::from(symbolizer.clone()), &feature, &resources).placed, 1);

        let mut avoiding = symbolizer;
        avoiding.text.avoid_edges = true;
        let drawing = draw(&Symbolizer::from(avoiding), &feature, &resources);
        assert!(drawing.commands.is_empty());
        assert_eq!(drawing.placed, 0);
    }

    #[test]
    fn labels_follow_lines() {
        let Some((resources, face_name)) = system_font() else {
            return;
        };
        let mut symbolizer = label(&face_name);
        symbolizer.text.placement = LabelPlacement::Line;
        let feature = Feature::new().with_geometry(Geometry::line_string(&[(5.0, 50.0), (95.0, 50.0)]));

        let drawing = draw(&Symbolizer::from(symbolizer), &feature, &resources);
        assert_eq!(drawing.commands.len(), 1);
        assert!(matches!(&drawing.commands[0], DrawCommand::Fill { color, .. } if *color == Color::BLACK));
    }

    #[test]
    fn labels_without_font_are_skipped() {
        let feature = Feature::new().with_geometry(Geometry::point(50.0, 50.0));
        let drawing = draw(&Symbolizer::from(label("No Such Font")), &feature, &Context::new());
        assert!(drawing.commands.is_empty());
        assert_eq!(drawing.placed, 0);
    }
}
