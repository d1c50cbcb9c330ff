//! Rendering algorithms of the symbolizers.
//!
//! [`render_symbolizer`] matches over every [`Symbolizer`] variant and hands the feature to the
//! variant's algorithm. Algorithms read the feature, convert its geometries into pixels with the
//! [`PixelTransform`] and paint into the [`Canvas`]. Problems with a single feature, like a missing
//! image or font, are logged and the feature is skipped.

mod building;
mod glyph;
mod line;
mod markers;
mod point;
mod polygon;
mod raster;
mod shield;
mod text;

use lyon::math::{point, vector, Angle, Box2D, Transform};
use meridian_types::{BoundingBox, Geometry, GeometryKind, Point2d};

pub(crate) use point::parse_transform;

use crate::context::Context;
use crate::decoded_image::DecodedImage;
use crate::expression::PathExpression;
use crate::feature::Feature;
use crate::font::FaceData;
use crate::map::Map;
use crate::render::canvas::Canvas;
use crate::render::metawriter::MetaRecorder;
use crate::render::placement::PlacementArbiter;
use crate::style::{FontRef, Symbolizer, SymbolizerBase};
use crate::transform::PixelTransform;

/// Everything a symbolizer algorithm needs to draw one feature.
pub(crate) struct SymbolizerContext<'a> {
    pub canvas: &'a mut dyn Canvas,
    pub transform: PixelTransform<'a>,
    pub map: &'a Map,
    pub resources: &'a Context,
    pub placement: &'a mut PlacementArbiter,
    pub meta: &'a mut MetaRecorder,
}

impl SymbolizerContext<'_> {
    pub fn scale_factor(&self) -> f64 {
        self.map.scale_factor()
    }

    /// Image of the file expression for the feature, or `None` with a warning if it can't be loaded.
    pub fn image(&self, file: &PathExpression, feature: &Feature) -> Option<DecodedImage> {
        let path = file.evaluate(feature);
        match self.resources.images.get(&path) {
            Ok(image) => Some(image),
            Err(err) => {
                log::warn!("Skipping symbolizer image: {err}");
                None
            }
        }
    }

    /// Faces of the font reference in fallback order. Empty, with a warning, if none is available.
    pub fn faces(&self, font: &FontRef) -> Vec<FaceData> {
        let faces: Vec<FaceData> = match font {
            FontRef::Face(name) => self.resources.fonts.face(name).into_iter().collect(),
            FontRef::FontSet(name) => match self.map.find_fontset(name) {
                Some(fontset) => self.resources.fonts.fontset_faces(fontset),
                None => {
                    log::warn!("Font set '{name}' is not defined in the map");
                    Vec::new()
                }
            },
        };

        if faces.is_empty() {
            log::warn!("No font face available for {font:?}, skipping label");
        }
        faces
    }

    /// Geometries of the feature in pixels. Geometries that can't be projected are dropped.
    pub fn pixel_geometries(&self, feature: &Feature) -> Vec<Geometry> {
        feature
            .geometries()
            .iter()
            .filter_map(|geometry| {
                let converted = self.transform.to_pixels(geometry);
                if converted.is_none() {
                    log::debug!("Geometry of feature {} can't be projected, skipping", feature.id());
                }
                converted
            })
            .collect()
    }

    /// Label positions of the feature's geometries in pixels.
    pub fn pixel_positions(&self, feature: &Feature) -> Vec<Point2d> {
        feature
            .geometries()
            .iter()
            .filter_map(Geometry::label_position)
            .filter_map(|p| self.transform.point(p.x, p.y))
            .map(|(x, y)| Point2d::new(x, y))
            .collect()
    }

    pub fn record(&mut self, base: &SymbolizerBase, feature: &Feature, bbox: BoundingBox) {
        self.meta.record(self.map, base, feature, bbox);
    }
}

/// Draws the feature with the symbolizer.
pub(crate) fn render_symbolizer(
    symbolizer: &Symbolizer,
    feature: &Feature,
    ctx: &mut SymbolizerContext<'_>,
) {
    match symbolizer {
        Symbolizer::Point(s) => point::render(s, feature, ctx),
        Symbolizer::Line(s) => line::render_line(s, feature, ctx),
        Symbolizer::LinePattern(s) => line::render_pattern(s, feature, ctx),
        Symbolizer::Polygon(s) => polygon::render_polygon(s, feature, ctx),
        Symbolizer::PolygonPattern(s) => polygon::render_pattern(s, feature, ctx),
        Symbolizer::Raster(s) => raster::render(s, feature, ctx),
        Symbolizer::Building(s) => building::render(s, feature, ctx),
        Symbolizer::Text(s) => text::render(s, feature, ctx),
        Symbolizer::Shield(s) => shield::render(s, feature, ctx),
        Symbolizer::Markers(s) => markers::render(s, feature, ctx),
        Symbolizer::Glyph(s) => glyph::render(s, feature, ctx),
    }
}

/// Lines of a pixel geometry as point lists. Polygon rings are closed by repeating the first point.
pub(crate) fn line_parts(geometry: &Geometry) -> Vec<Vec<Point2d>> {
    if geometry.kind() == GeometryKind::Point {
        return Vec::new();
    }

    geometry
        .rings()
        .filter(|ring| ring.len() > 1)
        .map(|ring| {
            let mut points: Vec<Point2d> = ring.iter().map(|v| v.point()).collect();
            if geometry.kind() == GeometryKind::Polygon && points.first() != points.last() {
                points.push(points[0]);
            }
            points
        })
        .collect()
}

/// Length of the line.
pub(crate) fn line_length(points: &[Point2d]) -> f64 {
    points.windows(2).map(|w| (w[1] - w[0]).norm()).sum()
}

/// Point at the distance along the line and the direction of the line there, in radians.
pub(crate) fn point_along(points: &[Point2d], distance: f64) -> Option<(Point2d, f64)> {
    let mut remaining = distance.max(0.0);
    for w in points.windows(2) {
        let segment = w[1] - w[0];
        let length = segment.norm();
        if length <= 0.0 {
            continue;
        }
        if remaining <= length {
            return Some((w[0] + segment * (remaining / length), segment.y.atan2(segment.x)));
        }
        remaining -= length;
    }

    let last = points.windows(2).rev().find(|w| w[1] != w[0])?;
    let segment = last[1] - last[0];
    Some((last[1], segment.y.atan2(segment.x)))
}

/// Largest change of direction between consecutive segments within the stretch of the line, in
/// degrees.
pub(crate) fn max_bend(points: &[Point2d], from: f64, to: f64) -> f64 {
    let mut travelled = 0.0;
    let mut previous: Option<f64> = None;
    let mut bend: f64 = 0.0;
    for w in points.windows(2) {
        let segment = w[1] - w[0];
        let length = segment.norm();
        let start = travelled;
        travelled += length;
        if length <= 0.0 || travelled < from || start > to {
            continue;
        }

        let angle = segment.y.atan2(segment.x).to_degrees();
        if let Some(previous) = previous {
            let mut delta = (angle - previous).abs() % 360.0;
            if delta > 180.0 {
                delta = 360.0 - delta;
            }
            bend = bend.max(delta);
        }
        previous = Some(angle);
    }

    bend
}

/// Distances along a line of the given length at which repeated symbols are placed: every
/// `spacing` pixels starting half a spacing in, or the middle if the spacing is not positive.
pub(crate) fn repeat_positions(length: f64, spacing: f64) -> Vec<f64> {
    if spacing <= 0.0 || spacing > length {
        return vec![length / 2.0];
    }

    let count = (length / spacing).floor() as usize;
    let start = (length - (count - 1) as f64 * spacing) / 2.0;
    (0..count).map(|i| start + i as f64 * spacing).collect()
}

/// Transform that rotates by the angle (radians) around the origin and then moves to the position.
pub(crate) fn placement_transform(position: Point2d, angle: f64) -> Transform {
    Transform::rotation(Angle::radians(angle as f32))
        .then_translate(vector(position.x as f32, position.y as f32))
}

/// Axis aligned pixel box of the transformed box.
pub(crate) fn transformed_box(bbox: &BoundingBox, transform: &Transform) -> BoundingBox {
    let source = Box2D::new(
        point(bbox.x_min() as f32, bbox.y_min() as f32),
        point(bbox.x_max() as f32, bbox.y_max() as f32),
    );
    let result = transform.outer_transformed_box(&source);
    BoundingBox::new(
        result.min.x as f64,
        result.min.y as f64,
        result.max.x as f64,
        result.max.y as f64,
    )
}

/// Box of the given size centered at the origin.
pub(crate) fn centered_box(width: f64, height: f64) -> BoundingBox {
    BoundingBox::new(-width / 2.0, -height / 2.0, width / 2.0, height / 2.0)
}

/// Draws single features on a 100x100 pixel map showing `0..100` in both directions.
#[cfg(test)]
pub(crate) mod testing {
    use std::path::PathBuf;

    use meridian_types::projection::WGS84_GEOGRAPHIC;
    use meridian_types::Projection;

    use super::*;
    use crate::render::canvas::{DrawCommand, RecordingCanvas};
    use crate::transform::{ProjTransform, ViewTransform};

    pub(crate) const SIZE: u32 = 100;

    /// What drawing a feature produced.
    pub(crate) struct Drawing {
        pub commands: Vec<DrawCommand>,
        pub placed: usize,
    }

    pub(crate) fn draw(symbolizer: &Symbolizer, feature: &Feature, resources: &Context) -> Drawing {
        let projection = Projection::new(WGS84_GEOGRAPHIC).unwrap();
        let proj = ProjTransform::new(&projection, &projection);
        let view = ViewTransform::new(SIZE, SIZE, BoundingBox::new(0.0, 0.0, 100.0, 100.0), 0.0);
        let map = Map::new(SIZE, SIZE);
        let mut canvas = RecordingCanvas::new(SIZE, SIZE);
        let mut placement = PlacementArbiter::new(SIZE, SIZE);
        let mut meta = MetaRecorder::new();
        let mut ctx = SymbolizerContext {
            canvas: &mut canvas,
            transform: PixelTransform::new(&proj, &view),
            map: &map,
            resources,
            placement: &mut placement,
            meta: &mut meta,
        };
        render_symbolizer(symbolizer, feature, &mut ctx);

        Drawing {
            commands: canvas.commands,
            placed: placement.len(),
        }
    }

    /// Writes a red PNG of the given size and returns its path.
    pub(crate) fn write_png(name: &str, width: u32, height: u32) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "meridian-symbol-{name}-{}.png",
            std::process::id()
        ));
        image::RgbaImage::from_pixel(width, height, image::Rgba([255, 0, 0, 255]))
            .save(&path)
            .unwrap();
        path
    }

    /// Context with the system fonts and the name of one of them, or `None` if no font is
    /// installed.
    pub(crate) fn system_font() -> Option<(Context, String)> {
        let resources = Context::with_system_fonts();
        let names = resources.fonts.face_names();
        let name = names
            .iter()
            .find(|name| name.as_str() == "DejaVu Sans Book")
            .or_else(|| names.first())?
            .clone();
        Some((resources, name))
    }

    /// Every point of every contour of the command.
    pub(crate) fn points(command: &DrawCommand) -> Vec<(f32, f32)> {
        match command {
            DrawCommand::Fill { contours, .. }
            | DrawCommand::Stroke { contours, .. }
            | DrawCommand::Pattern { contours, .. } => contours.iter().flatten().copied().collect(),
            DrawCommand::Image { .. } => Vec::new(),
        }
    }
}
