use lyon::path::Path;
use meridian_types::{Geometry, GeometryKind, Point2d};

use crate::feature::Feature;
use crate::render::canvas::{polygon_path, FillPaint, StrokePaint};
use crate::render::symbolizer::SymbolizerContext;
use crate::style::BuildingSymbolizer;

/// Darkening of walls and edges relative to the roof.
const WALL_SHADE: f64 = 0.8;

/// Pseudo-3d shape of a polygon footprint.
///
/// Walls are ordered back to front: by descending lower `y` of their base segment, since `y` grows
/// away from the viewer in map coordinates.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Extrusion {
    /// One quad per boundary segment: base start, base end, top end, top start.
    pub walls: Vec<[Point2d; 4]>,
    /// Outline of the block: base rings, vertical edges and top rings.
    pub frame: Vec<Vec<Point2d>>,
    /// Rings of the roof.
    pub roof: Vec<Vec<Point2d>>,
}

/// Extrudes the polygon by `height` along `y`. Returns `None` for non-polygons and polygons with
/// fewer than 3 points.
///
/// Painter's ordering of the walls is exact for convex footprints only. Walls of concave or self
/// intersecting footprints can be drawn over walls in front of them.
pub(crate) fn extrude(geometry: &Geometry, height: f64) -> Option<Extrusion> {
    if geometry.kind() != GeometryKind::Polygon || geometry.num_points() <= 2 {
        return None;
    }

    let mut segments: Vec<(Point2d, Point2d)> = Vec::new();
    let mut frame = Vec::new();
    let mut roof = Vec::new();
    for ring in geometry.rings() {
        let mut points: Vec<Point2d> = ring.iter().map(|v| v.point()).collect();
        if points.len() > 1 && points.first() == points.last() {
            points.pop();
        }
        if points.len() < 2 {
            continue;
        }

        for i in 0..points.len() {
            segments.push((points[i], points[(i + 1) % points.len()]));
        }

        let raise = |p: &Point2d| Point2d::new(p.x, p.y + height);
        let top: Vec<Point2d> = points.iter().map(raise).collect();

        let mut base_ring = points.clone();
        base_ring.push(points[0]);
        frame.push(base_ring);
        for p in &points {
            frame.push(vec![*p, raise(p)]);
        }
        let mut top_ring = top.clone();
        top_ring.push(top[0]);
        frame.push(top_ring);

        roof.push(top);
    }

    segments.sort_by(|a, b| {
        let ya = a.0.y.min(a.1.y);
        let yb = b.0.y.min(b.1.y);
        yb.total_cmp(&ya)
    });

    let walls = segments
        .into_iter()
        .map(|(a, b)| {
            [
                a,
                b,
                Point2d::new(b.x, b.y + height),
                Point2d::new(a.x, a.y + height),
            ]
        })
        .collect();

    Some(Extrusion { walls, frame, roof })
}

/// Draws walls, then the frame, then the roof of every polygon of the feature.
pub(super) fn render(symbolizer: &BuildingSymbolizer, feature: &Feature, ctx: &mut SymbolizerContext<'_>) {
    let view = ctx.transform.view();
    let height = symbolizer.height * ctx.scale_factor() / view.scale_y();
    let to_pixels = |points: &[Point2d]| -> Vec<Point2d> {
        points
            .iter()
            .map(|p| {
                let (x, y) = view.forward(p.x, p.y);
                Point2d::new(x, y)
            })
            .collect()
    };

    let wall_color = symbolizer.fill.shade(WALL_SHADE);
    let opacity = symbolizer.opacity;

    for geometry in feature.geometries() {
        let Some(map_geometry) = ctx.transform.to_map(geometry) else {
            log::debug!("Building of feature {} can't be projected, skipping", feature.id());
            continue;
        };
        let Some(extrusion) = extrude(&map_geometry, height) else {
            continue;
        };

        let wall_paint = FillPaint::new(wall_color.with_opacity(opacity));
        for wall in &extrusion.walls {
            let pixels = to_pixels(wall);
            ctx.canvas.fill_path(&polygon_path([pixels.as_slice()]), &wall_paint);
        }

        let frame_color = wall_color.with_alpha((255.0 * opacity.clamp(0.0, 1.0)).round() as u8);
        ctx.canvas
            .stroke_path(&frame_path(&extrusion.frame, to_pixels), &StrokePaint::solid(frame_color, 1.0));

        let roof: Vec<Vec<Point2d>> = extrusion.roof.iter().map(|ring| to_pixels(ring)).collect();
        ctx.canvas.fill_path(
            &polygon_path(roof.iter().map(Vec::as_slice)),
            &FillPaint::even_odd(symbolizer.fill.with_opacity(opacity)),
        );

        let bbox = extrusion
            .walls
            .iter()
            .flat_map(|wall| to_pixels(wall))
            .fold(None, |bbox: Option<meridian_types::BoundingBox>, p| {
                Some(match bbox {
                    Some(mut bbox) => {
                        bbox.expand_to_include(&p);
                        bbox
                    }
                    None => meridian_types::BoundingBox::from_point(&p),
                })
            });
        if let Some(bbox) = bbox {
            ctx.record(&symbolizer.base, feature, bbox);
        }
    }
}

fn frame_path(lines: &[Vec<Point2d>], to_pixels: impl Fn(&[Point2d]) -> Vec<Point2d>) -> Path {
    let mut builder = Path::builder();
    for line in lines {
        let pixels = to_pixels(line);
        let Some((first, rest)) = pixels.split_first() else {
            continue;
        };
        builder.begin(lyon::math::point(first.x as f32, first.y as f32));
        for p in rest {
            builder.line_to(lyon::math::point(p.x as f32, p.y as f32));
        }
        builder.end(false);
    }
    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> Geometry {
        Geometry::polygon(&[&[(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0)]])
    }

    #[test]
    fn one_wall_per_boundary_segment() {
        let extrusion = extrude(&square(), 5.0).unwrap();
        assert_eq!(extrusion.walls.len(), 4);
        assert_eq!(extrusion.roof.len(), 1);
        assert_eq!(
            extrusion.roof[0],
            vec![
                Point2d::new(0.0, 5.0),
                Point2d::new(10.0, 5.0),
                Point2d::new(10.0, 15.0),
                Point2d::new(0.0, 15.0),
            ]
        );
    }

    #[test]
    fn walls_are_sorted_back_to_front() {
        let extrusion = extrude(&square(), 5.0).unwrap();
        let keys: Vec<f64> = extrusion
            .walls
            .iter()
            .map(|wall| wall[0].y.min(wall[1].y))
            .collect();
        assert!(keys.windows(2).all(|w| w[0] >= w[1]));
        assert_eq!(keys[0], 10.0);
        assert_eq!(*keys.last().unwrap(), 0.0);

        let wall = extrusion.walls[0];
        assert_eq!(wall[2].y, wall[1].y + 5.0);
        assert_eq!(wall[3].y, wall[0].y + 5.0);
    }

    #[test]
    fn frame_has_vertical_edges() {
        let extrusion = extrude(&square(), 5.0).unwrap();
        // Base ring, four edges, top ring.
        assert_eq!(extrusion.frame.len(), 6);
        assert_eq!(
            extrusion.frame[1],
            vec![Point2d::new(0.0, 0.0), Point2d::new(0.0, 5.0)]
        );
    }

    #[test]
    fn only_polygons_are_extruded() {
        assert!(extrude(&Geometry::line_string(&[(0.0, 0.0), (1.0, 1.0), (2.0, 0.0)]), 5.0).is_none());
        assert!(extrude(&Geometry::polygon(&[&[(0.0, 0.0), (1.0, 1.0)]]), 5.0).is_none());
    }
}
