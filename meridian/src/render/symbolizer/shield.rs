use lyon::math::Transform;
use meridian_types::{BoundingBox, Point2d};

use crate::feature::Feature;
use crate::render::symbolizer::text::{draw_label, label_text, line_positions, placement_rules};
use crate::render::symbolizer::{centered_box, SymbolizerContext};
use crate::render::text::{ShapedText, TextLayout, TextShaper};
use crate::style::{LabelPlacement, ShieldSymbolizer};

/// Draws the shield image at its anchor with the label centered at the text anchor. Both are
/// placed as one box, or not at all.
fn place_and_draw(
    symbolizer: &ShieldSymbolizer,
    feature: &Feature,
    ctx: &mut SymbolizerContext<'_>,
    image_center: Point2d,
    text: Option<(&ShapedText, Point2d)>,
    image: &crate::decoded_image::DecodedImage,
) {
    let properties = &symbolizer.text;
    let image_box = centered_box(image.width() as f64, image.height() as f64);
    let image_box = BoundingBox::new(
        image_box.x_min() + image_center.x,
        image_box.y_min() + image_center.y,
        image_box.x_max() + image_center.x,
        image_box.y_max() + image_center.y,
    );

    let mut bbox = image_box;
    if let Some((shaped, anchor)) = text {
        bbox = bbox.merge(&BoundingBox::new(
            shaped.bbox.x_min() + anchor.x,
            shaped.bbox.y_min() + anchor.y,
            shaped.bbox.x_max() + anchor.x,
            shaped.bbox.y_max() + anchor.y,
        ));
    }

    if !ctx
        .placement
        .try_place(bbox, &placement_rules(properties, ctx.scale_factor()))
    {
        return;
    }

    ctx.canvas.draw_image_at(
        image,
        image_box.x_min().round(),
        image_box.y_min().round(),
        properties.opacity,
    );

    if let Some((shaped, anchor)) = text {
        let path = shaped
            .path
            .clone()
            .transformed(&Transform::translation(anchor.x as f32, anchor.y as f32));
        let halo_radius = properties.halo_radius * ctx.scale_factor();
        draw_label(
            ctx.canvas,
            &path,
            properties.fill,
            properties.halo_fill,
            halo_radius,
            symbolizer.text_opacity,
        );
    }

    ctx.record(&symbolizer.base, feature, bbox);
}

pub(super) fn render(symbolizer: &ShieldSymbolizer, feature: &Feature, ctx: &mut SymbolizerContext<'_>) {
    let properties = &symbolizer.text;
    let Some(image) = ctx.image(&symbolizer.file, feature) else {
        return;
    };

    let text = if symbolizer.no_text {
        None
    } else {
        let Some(text) = label_text(properties, feature) else {
            return;
        };
        Some(text)
    };

    let faces = match text {
        Some(_) => ctx.faces(&properties.font),
        None => Vec::new(),
    };
    let shaper = TextShaper::new(&faces);
    let layout = TextLayout::from_properties(properties, ctx.scale_factor());
    let shaped = match (&text, &shaper) {
        (Some(text), Some(shaper)) => match shaper.layout(text, &layout) {
            Some(shaped) => Some(shaped),
            None => return,
        },
        (Some(_), None) => return,
        (None, _) => None,
    };

    let scale_factor = ctx.scale_factor();
    let text_offset = Point2d::new(properties.dx * scale_factor, properties.dy * scale_factor);
    let shield_offset = Point2d::new(
        symbolizer.shield_dx * scale_factor,
        symbolizer.shield_dy * scale_factor,
    );

    let anchors: Vec<Point2d> = match properties.placement {
        LabelPlacement::Point => ctx.pixel_positions(feature),
        LabelPlacement::Line => {
            let width = shaped
                .as_ref()
                .map_or(image.width() as f64, |s| s.bbox.width().max(image.width() as f64));
            line_positions(ctx, properties, feature, width)
                .into_iter()
                .map(|(position, _)| position)
                .collect()
        }
    };

    for anchor in anchors {
        let text_anchor = Point2d::new(anchor.x + text_offset.x, anchor.y + text_offset.y);
        // A locked image moves with the text.
        let image_base = if symbolizer.unlock_image { anchor } else { text_anchor };
        let image_center = Point2d::new(image_base.x + shield_offset.x, image_base.y + shield_offset.y);
        let text = shaped.as_ref().map(|shaped| (shaped, text_anchor));
        place_and_draw(symbolizer, feature, ctx, image_center, text, &image);
    }
}

#[cfg(test)]
mod tests {
    use meridian_types::Geometry;

    use super::*;
    use crate::color::Color;
    use crate::context::Context;
    use crate::expression::{Expression, Value};
    use crate::render::canvas::DrawCommand;
    use crate::render::symbolizer::testing::{draw, system_font, write_png};
    use crate::style::{FontRef, Symbolizer, TextProperties};

    fn shield(name: &str, face_name: &str) -> ShieldSymbolizer {
        let mut text = TextProperties::new(
            Expression::literal(Value::from("A1")),
            FontRef::Face(face_name.to_string()),
        );
        text.size = 12.0;
        ShieldSymbolizer {
            text,
            file: write_png(name, 8, 8).display().to_string().into(),
            shield_dx: 0.0,
            shield_dy: 0.0,
            text_opacity: 1.0,
            unlock_image: false,
            no_text: false,
            base: Default::default(),
        }
    }

    fn remove_image(symbolizer: &ShieldSymbolizer) {
        std::fs::remove_file(symbolizer.file.template()).unwrap();
    }

    #[test]
    fn image_is_drawn_under_the_label() {
        let Some((resources, face_name)) = system_font() else {
            return;
        };
        let mut symbolizer = shield("shield-label", &face_name);
        symbolizer.text.halo_radius = 1.0;
        symbolizer.text_opacity = 0.5;
        let feature = Feature::new().with_geometry(Geometry::point(50.0, 50.0));

        let drawing = draw(&Symbolizer::from(symbolizer.clone()), &feature, &resources);
        assert_eq!(drawing.commands.len(), 3);
        assert!(matches!(&drawing.commands[0], DrawCommand::Image { size: (8, 8), opacity, .. } if *opacity == 1.0));
        assert!(matches!(
            &drawing.commands[1],
            DrawCommand::Stroke { color, width, .. } if *color == Color::WHITE.with_opacity(0.5) && *width == 2.0
        ));
        assert!(
            matches!(&drawing.commands[2], DrawCommand::Fill { color, .. } if *color == Color::BLACK.with_opacity(0.5))
        );
        assert_eq!(drawing.placed, 1);

        remove_image(&symbolizer);
    }

    #[test]
    fn image_only_shields() {
        let mut symbolizer = shield("shield-image", "No Such Font");
        symbolizer.no_text = true;
        let feature = Feature::new().with_geometry(Geometry::point(50.0, 50.0));

        let drawing = draw(&Symbolizer::from(symbolizer.clone()), &feature, &Context::new());
        assert_eq!(drawing.commands.len(), 1);
        let DrawCommand::Image { transform, .. } = &drawing.commands[0] else {
            panic!("expected the shield image");
        };
        assert_eq!((transform.m31, transform.m32), (46.0, 46.0));

        remove_image(&symbolizer);
    }

    #[test]
    fn shields_without_font_are_skipped() {
        let symbolizer = shield("shield-no-font", "No Such Font");
        let feature = Feature::new().with_geometry(Geometry::point(50.0, 50.0));

        let drawing = draw(&Symbolizer::from(symbolizer.clone()), &feature, &Context::new());
        assert!(drawing.commands.is_empty());

        remove_image(&symbolizer);
    }
}
