use lyon::math::vector;
use meridian_types::Point2d;

use crate::color::Color;
use crate::expression::Value;
use crate::feature::Feature;
use crate::render::placement::PlacementRules;
use crate::render::symbolizer::text::draw_label;
use crate::render::symbolizer::{placement_transform, transformed_box, SymbolizerContext};
use crate::render::text::{TextLayout, TextShaper};
use crate::style::{AngleMode, GlyphSymbolizer};

/// Character of the `char` expression value: the first character of a text, or the code point of
/// a number.
pub(crate) fn glyph_char(value: &Value) -> Option<char> {
    match value {
        Value::String(text) => text.chars().next(),
        Value::Integer(code) => u32::try_from(*code).ok().and_then(char::from_u32),
        Value::Float(code) if code.fract() == 0.0 && *code >= 0.0 => char::from_u32(*code as u32),
        Value::Null | Value::Bool(_) | Value::Float(_) => None,
    }
}

/// Rotation on screen in radians, clockwise because `y` points down.
///
/// Glyphs point east when not rotated. Trigonometric angles are counter-clockwise from east;
/// azimuths are clockwise from north.
pub(crate) fn screen_rotation(angle: f64, mode: AngleMode) -> f64 {
    let trigonometric = match mode {
        AngleMode::Trigonometric => angle,
        AngleMode::Azimuth => 90.0 - angle,
    };
    -trigonometric.to_radians()
}

/// Color of the glyph: from the colorizer and `value`, from the `color` expression, or black.
fn glyph_color(symbolizer: &GlyphSymbolizer, feature: &Feature) -> Color {
    if let (Some(colorizer), Some(value)) = (&symbolizer.colorizer, &symbolizer.value) {
        if let Some(value) = value.evaluate_f64(feature) {
            return colorizer.get_color(value as f32);
        }
    }

    if let Some(color) = &symbolizer.color {
        let text = color.evaluate(feature).to_string();
        match text.parse::<Color>() {
            Ok(color) => return color,
            Err(err) => log::debug!("Invalid glyph color '{text}': {err}"),
        }
    }

    Color::BLACK
}

pub(super) fn render(symbolizer: &GlyphSymbolizer, feature: &Feature, ctx: &mut SymbolizerContext<'_>) {
    let Some(character) = glyph_char(&symbolizer.char.evaluate(feature)) else {
        log::debug!("Glyph symbolizer has no character for feature {}", feature.id());
        return;
    };
    let Some(size) = symbolizer.size.evaluate_f64(feature).filter(|s| *s > 0.0) else {
        log::debug!("Glyph symbolizer has no size for feature {}", feature.id());
        return;
    };

    let Some(face) = ctx.resources.fonts.face(&symbolizer.face_name) else {
        log::warn!("Font face '{}' not found, skipping glyph", symbolizer.face_name);
        return;
    };
    let faces = [face];
    let Some(shaper) = TextShaper::new(&faces) else {
        return;
    };

    let scale_factor = ctx.scale_factor();
    let Some(shaped) = shaper.layout(&character.to_string(), &TextLayout::centered(size * scale_factor))
    else {
        return;
    };

    let angle = symbolizer
        .angle
        .as_ref()
        .and_then(|angle| angle.evaluate_f64(feature))
        .unwrap_or(0.0);
    let rotation = screen_rotation(angle, symbolizer.angle_mode);
    let color = glyph_color(symbolizer, feature);
    let rules = PlacementRules {
        allow_overlap: symbolizer.allow_overlap,
        avoid_edges: symbolizer.avoid_edges,
        ..Default::default()
    };
    let offset = vector((symbolizer.dx * scale_factor) as f32, (symbolizer.dy * scale_factor) as f32);

    for position in ctx.pixel_positions(feature) {
        let transform = placement_transform(Point2d::new(position.x, position.y), rotation)
            .then_translate(offset);
        let bbox = transformed_box(&shaped.bbox, &transform);
        if !ctx.placement.try_place(bbox, &rules) {
            continue;
        }

        let path = shaped.path.clone().transformed(&transform);
        draw_label(
            ctx.canvas,
            &path,
            color,
            symbolizer.halo_fill,
            symbolizer.halo_radius * scale_factor,
            symbolizer.opacity,
        );
        ctx.record(&symbolizer.base, feature, bbox);
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use meridian_types::Geometry;

    use super::*;
    use crate::expression::Expression;
    use crate::render::canvas::DrawCommand;
    use crate::render::symbolizer::testing::{draw, system_font};
    use crate::style::{ColorBand, RasterColorizer, Symbolizer};

    #[test]
    fn characters_from_values() {
        assert_eq!(glyph_char(&Value::from("→x")), Some('→'));
        assert_eq!(glyph_char(&Value::from(65)), Some('A'));
        assert_eq!(glyph_char(&Value::from(66.0)), Some('B'));
        assert_eq!(glyph_char(&Value::from(-1)), None);
        assert_eq!(glyph_char(&Value::Null), None);
    }

    #[test]
    fn angle_modes() {
        assert_abs_diff_eq!(screen_rotation(90.0, AngleMode::Trigonometric), -std::f64::consts::FRAC_PI_2);
        assert_abs_diff_eq!(screen_rotation(90.0, AngleMode::Azimuth), 0.0);
        assert_abs_diff_eq!(screen_rotation(180.0, AngleMode::Azimuth), std::f64::consts::FRAC_PI_2);
    }

    #[test]
    fn colors() {
        let mut symbolizer = GlyphSymbolizer::new(
            "DejaVu Sans Book",
            Expression::literal(Value::from("A")),
            Expression::literal(Value::from(10)),
        );
        let feature = Feature::new().with_attribute("speed", 15).with_attribute("tint", "red");
        assert_eq!(glyph_color(&symbolizer, &feature), Color::BLACK);

        symbolizer.color = Some(Expression::attribute("tint"));
        assert_eq!(glyph_color(&symbolizer, &feature), Color::RED);

        symbolizer.value = Some(Expression::attribute("speed"));
        symbolizer.colorizer = Some(
            RasterColorizer::new()
                .with_band(ColorBand::new(0.0, Color::WHITE))
                .with_band(ColorBand::new(10.0, Color::BLUE).with_max_value(100.0)),
        );
        assert_eq!(glyph_color(&symbolizer, &feature), Color::BLUE);
    }

    #[test]
    fn glyph_and_halo_use_the_opacity() {
        let Some((resources, face_name)) = system_font() else {
            return;
        };
        let mut symbolizer = GlyphSymbolizer::new(
            face_name,
            Expression::literal(Value::from("A")),
            Expression::literal(Value::from(16)),
        );
        symbolizer.halo_radius = 1.0;
        symbolizer.opacity = 0.5;
        let feature = Feature::new().with_geometry(Geometry::point(50.0, 50.0));

        let drawing = draw(&Symbolizer::from(symbolizer), &feature, &resources);
        assert_eq!(drawing.commands.len(), 2);
        assert!(matches!(
            &drawing.commands[0],
            DrawCommand::Stroke { color, width, .. } if *color == Color::WHITE.with_opacity(0.5) && *width == 2.0
        ));
        assert!(
            matches!(&drawing.commands[1], DrawCommand::Fill { color, .. } if *color == Color::BLACK.with_opacity(0.5))
        );
    }
}
