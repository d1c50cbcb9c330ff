use lyon::math::{vector, Angle, Transform};

use crate::color::Color;
use crate::feature::Feature;
use crate::render::canvas::{rect_path, FillPaint, ImagePaint};
use crate::render::placement::PlacementRules;
use crate::render::symbolizer::{centered_box, transformed_box, SymbolizerContext};
use crate::style::PointSymbolizer;

/// Size of the square drawn when a point symbolizer has no image.
const DEFAULT_POINT_SIZE: f64 = 4.0;

/// Parses an SVG style transform list: `matrix(a b c d e f)`, `translate(x [y])`, `scale(x [y])`,
/// `rotate(deg)`, `skewX(deg)` and `skewY(deg)`, separated by spaces or commas. Transforms are
/// applied right to left, as in SVG.
pub(crate) fn parse_transform(text: &str) -> Option<Transform> {
    let mut result = Transform::identity();
    let mut rest = text.trim();
    while !rest.is_empty() {
        let open = rest.find('(')?;
        let close = rest.find(')')?;
        if close < open {
            return None;
        }

        let name = rest[..open].trim().trim_start_matches(',').trim();
        let args: Vec<f32> = rest[open + 1..close]
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|s| !s.is_empty())
            .map(|s| s.parse::<f32>().ok())
            .collect::<Option<_>>()?;

        let transform = match (name, args.as_slice()) {
            ("matrix", [a, b, c, d, e, f]) => Transform::new(*a, *b, *c, *d, *e, *f),
            ("translate", [x]) => Transform::translation(*x, 0.0),
            ("translate", [x, y]) => Transform::translation(*x, *y),
            ("scale", [s]) => Transform::scale(*s, *s),
            ("scale", [x, y]) => Transform::scale(*x, *y),
            ("rotate", [deg]) => Transform::rotation(Angle::degrees(*deg)),
            ("skewX", [deg]) => Transform::new(1.0, 0.0, deg.to_radians().tan(), 1.0, 0.0, 0.0),
            ("skewY", [deg]) => Transform::new(1.0, deg.to_radians().tan(), 0.0, 1.0, 0.0, 0.0),
            _ => return None,
        };

        result = transform.then(&result);
        rest = rest[close + 1..].trim();
    }

    Some(result)
}

pub(super) fn render(symbolizer: &PointSymbolizer, feature: &Feature, ctx: &mut SymbolizerContext<'_>) {
    let image = match &symbolizer.file {
        Some(file) => match ctx.image(file, feature) {
            Some(image) => Some(image),
            None => return,
        },
        None => None,
    };

    let user_transform = match symbolizer.transform.as_deref() {
        Some(text) => parse_transform(text).unwrap_or_else(|| {
            log::warn!("Ignoring invalid point symbolizer transform '{text}'");
            Transform::identity()
        }),
        None => Transform::identity(),
    };

    let scale_factor = ctx.scale_factor();
    let (width, height) = match &image {
        Some(image) => (image.width() as f64, image.height() as f64),
        None => (DEFAULT_POINT_SIZE, DEFAULT_POINT_SIZE),
    };
    let rules = PlacementRules {
        allow_overlap: symbolizer.allow_overlap,
        avoid_edges: symbolizer.avoid_edges,
        reserve: !symbolizer.ignore_placement,
        ..Default::default()
    };

    for position in ctx.pixel_positions(feature) {
        // Symbol centered on the origin, transformed, scaled and moved to the position.
        let transform = user_transform
            .then_scale(scale_factor as f32, scale_factor as f32)
            .then_translate(vector(position.x as f32, position.y as f32));
        let bbox = transformed_box(&centered_box(width, height), &transform);
        if !ctx.placement.try_place(bbox, &rules) {
            continue;
        }

        match &image {
            Some(image) => {
                let to_center = Transform::translation(-(width / 2.0) as f32, -(height / 2.0) as f32);
                ctx.canvas.draw_image(
                    image,
                    &to_center.then(&transform),
                    &ImagePaint::with_opacity(symbolizer.opacity),
                );
            }
            None => {
                let square = rect_path(&centered_box(width, height)).transformed(&transform);
                ctx.canvas
                    .fill_path(&square, &FillPaint::new(Color::BLACK.with_opacity(symbolizer.opacity)));
            }
        }

        ctx.record(&symbolizer.base, feature, bbox);
    }
}
