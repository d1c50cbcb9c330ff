use meridian_types::{Geometry, GeometryKind, Point2d};

use crate::feature::Feature;
use crate::render::canvas::{geometry_path, FillPaint};
use crate::render::symbolizer::SymbolizerContext;
use crate::style::{PatternAlignment, PolygonPatternSymbolizer, PolygonSymbolizer};

fn pixel_polygons(feature: &Feature, ctx: &SymbolizerContext<'_>) -> Vec<Geometry> {
    ctx.pixel_geometries(feature)
        .into_iter()
        .filter(|g| g.kind() == GeometryKind::Polygon && g.num_points() > 2)
        .collect()
}

/// Fills polygons. Inner rings are holes.
pub(super) fn render_polygon(
    symbolizer: &PolygonSymbolizer,
    feature: &Feature,
    ctx: &mut SymbolizerContext<'_>,
) {
    let paint = FillPaint {
        gamma: symbolizer.gamma,
        ..FillPaint::even_odd(symbolizer.fill.with_opacity(symbolizer.opacity))
    };

    for polygon in pixel_polygons(feature, ctx) {
        ctx.canvas.fill_path(&geometry_path(&polygon), &paint);
        if let Some(bbox) = polygon.envelope() {
            ctx.record(&symbolizer.base, feature, bbox);
        }
    }
}

/// Fills polygons with the image tiled from the polygon's corner (local alignment) or from the
/// image corner (global alignment).
pub(super) fn render_pattern(
    symbolizer: &PolygonPatternSymbolizer,
    feature: &Feature,
    ctx: &mut SymbolizerContext<'_>,
) {
    let Some(pattern) = ctx.image(&symbolizer.file, feature) else {
        return;
    };

    for polygon in pixel_polygons(feature, ctx) {
        let Some(bbox) = polygon.envelope() else {
            continue;
        };
        let origin = match symbolizer.alignment {
            PatternAlignment::Local => Point2d::new(bbox.x_min(), bbox.y_min()),
            PatternAlignment::Global => Point2d::new(0.0, 0.0),
        };

        ctx.canvas
            .fill_pattern(&geometry_path(&polygon), &pattern, origin, symbolizer.opacity);
        ctx.record(&symbolizer.base, feature, bbox);
    }
}
