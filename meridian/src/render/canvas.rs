use lyon::math::{point, Point, Transform};
use lyon::path::iterator::PathIterator;
use lyon::path::{FillRule, Path, PathEvent};
use meridian_types::{BoundingBox, Geometry, GeometryKind, Point2d, Size};

use crate::color::Color;
use crate::decoded_image::DecodedImage;
use crate::style::{CompositeMode, LineCap, LineJoin, RasterScaling, Stroke};

/// Curves are flattened into segments no further than this from the curve, in pixels.
pub(crate) const FLATTENING_TOLERANCE: f32 = 0.1;

/// Drawing surface of the renderer. Coordinates are in pixels with the origin in the top left
/// corner.
pub trait Canvas {
    /// Size of the surface in pixels.
    fn size(&self) -> Size<u32>;

    /// Fills the path.
    fn fill_path(&mut self, path: &Path, paint: &FillPaint);

    /// Strokes the path.
    fn stroke_path(&mut self, path: &Path, paint: &StrokePaint);

    /// Fills the path with the image repeated from the origin.
    fn fill_pattern(&mut self, path: &Path, pattern: &DecodedImage, origin: Point2d, opacity: f64);

    /// Draws the image. `transform` maps image pixels onto the canvas.
    fn draw_image(&mut self, image: &DecodedImage, transform: &Transform, paint: &ImagePaint);

    /// Draws the image unscaled with its top left corner at the position.
    fn draw_image_at(&mut self, image: &DecodedImage, x: f64, y: f64, opacity: f64) {
        self.draw_image(
            image,
            &Transform::translation(x as f32, y as f32),
            &ImagePaint::with_opacity(opacity),
        );
    }

    /// Draws the image stretched over the pixel box.
    fn draw_image_scaled(&mut self, image: &DecodedImage, dest: &BoundingBox, paint: &ImagePaint) {
        if image.width() == 0 || image.height() == 0 {
            return;
        }

        let transform = Transform::scale(
            (dest.width() / image.width() as f64) as f32,
            (dest.height() / image.height() as f64) as f32,
        )
        .then_translate(lyon::math::vector(dest.x_min() as f32, dest.y_min() as f32));
        self.draw_image(image, &transform, paint);
    }
}

/// Paint of a filled path.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FillPaint {
    /// Fill color.
    pub color: Color,
    /// Which parts of self intersecting or nested contours are inside.
    pub fill_rule: FillRule,
    /// Exponent applied to the coverage of edge pixels.
    pub gamma: f64,
}

impl FillPaint {
    /// Non-zero fill with the color.
    pub fn new(color: Color) -> Self {
        Self {
            color,
            fill_rule: FillRule::NonZero,
            gamma: 1.0,
        }
    }

    /// Even-odd fill with the color, so inner rings of polygons become holes.
    pub fn even_odd(color: Color) -> Self {
        Self {
            fill_rule: FillRule::EvenOdd,
            ..Self::new(color)
        }
    }
}

/// Paint of a stroked path.
#[derive(Debug, Clone, PartialEq)]
pub struct StrokePaint {
    /// Stroke color, with the opacity applied.
    pub color: Color,
    /// Width in pixels.
    pub width: f64,
    /// Join of segments.
    pub line_join: LineJoin,
    /// Caps of open ends.
    pub line_cap: LineCap,
    /// Dash and gap lengths in pixels. Empty for a solid line.
    pub dashes: Vec<(f64, f64)>,
    /// Distance into the dash pattern at which the line starts.
    pub dash_offset: f64,
}

impl StrokePaint {
    /// Solid stroke.
    pub fn solid(color: Color, width: f64) -> Self {
        Self {
            color,
            width,
            line_join: LineJoin::Miter,
            line_cap: LineCap::Butt,
            dashes: Vec::new(),
            dash_offset: 0.0,
        }
    }

    /// Paint of a style stroke, with every length multiplied by the scale factor.
    pub fn from_stroke(stroke: &Stroke, scale_factor: f64) -> Self {
        Self {
            color: stroke.effective_color(),
            width: stroke.width * scale_factor,
            line_join: stroke.line_join,
            line_cap: stroke.line_cap,
            dashes: stroke
                .dashes
                .iter()
                .map(|(dash, gap)| (dash * scale_factor, gap * scale_factor))
                .collect(),
            dash_offset: stroke.dash_offset * scale_factor,
        }
    }
}

/// How an image is drawn.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImagePaint {
    /// Opacity in `0..=1`.
    pub opacity: f64,
    /// Resampling.
    pub scaling: RasterScaling,
    /// Compositing with the pixels below.
    pub mode: CompositeMode,
}

impl ImagePaint {
    /// Nearest neighbour, source over drawing with the opacity.
    pub fn with_opacity(opacity: f64) -> Self {
        Self {
            opacity,
            scaling: RasterScaling::Fast,
            mode: CompositeMode::Normal,
        }
    }
}

impl From<LineJoin> for lyon::tessellation::LineJoin {
    fn from(value: LineJoin) -> Self {
        match value {
            LineJoin::Miter => lyon::tessellation::LineJoin::Miter,
            LineJoin::Round => lyon::tessellation::LineJoin::Round,
            LineJoin::Bevel => lyon::tessellation::LineJoin::Bevel,
        }
    }
}

impl From<LineCap> for lyon::tessellation::LineCap {
    fn from(value: LineCap) -> Self {
        match value {
            LineCap::Butt => lyon::tessellation::LineCap::Butt,
            LineCap::Square => lyon::tessellation::LineCap::Square,
            LineCap::Round => lyon::tessellation::LineCap::Round,
        }
    }
}

/// Path of a geometry in pixel coordinates. Polygon rings are closed, lines are left open. Point
/// geometries have no path.
pub fn geometry_path(geometry: &Geometry) -> Path {
    let close = geometry.kind() == GeometryKind::Polygon;
    let mut builder = Path::builder();
    if geometry.kind() == GeometryKind::Point {
        return builder.build();
    }

    for ring in geometry.rings() {
        let mut vertices = ring.iter();
        let Some(first) = vertices.next() else {
            continue;
        };
        builder.begin(point(first.x as f32, first.y as f32));
        for vertex in vertices {
            builder.line_to(point(vertex.x as f32, vertex.y as f32));
        }
        builder.end(close);
    }

    builder.build()
}

/// Closed path through the points.
pub fn polygon_path<'a>(rings: impl IntoIterator<Item = &'a [Point2d]>) -> Path {
    let mut builder = Path::builder();
    for ring in rings {
        let Some((first, rest)) = ring.split_first() else {
            continue;
        };
        builder.begin(point(first.x as f32, first.y as f32));
        for p in rest {
            builder.line_to(point(p.x as f32, p.y as f32));
        }
        builder.end(true);
    }
    builder.build()
}

/// Path of the pixel box.
pub fn rect_path(bbox: &BoundingBox) -> Path {
    let [a, b, c, d] = bbox.into_quadrangle();
    polygon_path([&[a, b, c, d][..]])
}

/// Flattened contours of the path, each with its closing flag.
pub(crate) fn flatten(path: &Path) -> Vec<(Vec<Point>, bool)> {
    let mut contours = Vec::new();
    let mut current: Vec<Point> = Vec::new();
    for event in path.iter().flattened(FLATTENING_TOLERANCE) {
        match event {
            PathEvent::Begin { at } => {
                current = vec![at];
            }
            PathEvent::Line { to, .. } => current.push(to),
            PathEvent::End { close, .. } => {
                contours.push((std::mem::take(&mut current), close));
            }
            PathEvent::Quadratic { to, .. } | PathEvent::Cubic { to, .. } => current.push(to),
        }
    }
    contours
}

/// Splits the path into the dashes of the pattern. Closed contours are dashed around their whole
/// length, including the closing segment.
pub(crate) fn dash_path(path: &Path, dashes: &[(f64, f64)], offset: f64) -> Path {
    let pattern: Vec<f32> = dashes
        .iter()
        .flat_map(|(dash, gap)| [*dash as f32, *gap as f32])
        .collect();
    let period: f32 = pattern.iter().sum();
    let mut builder = Path::builder();
    if period <= 0.0 {
        return path.clone();
    }

    for (mut points, closed) in flatten(path) {
        if closed {
            if let Some(first) = points.first().copied() {
                points.push(first);
            }
        }

        // Position in the pattern: index of the current entry and distance left in it.
        let mut index = 0;
        let mut left = pattern[0];
        let mut skip = (offset as f32).rem_euclid(period);
        while skip > 0.0 {
            if skip >= left {
                skip -= left;
                index = (index + 1) % pattern.len();
                left = pattern[index];
            } else {
                left -= skip;
                skip = 0.0;
            }
        }

        let mut drawing = false;
        for segment in points.windows(2) {
            let (from, to) = (segment[0], segment[1]);
            let length = (to - from).length();
            let mut position = 0.0;
            while position < length {
                let step = left.min(length - position);
                let start = from.lerp(to, position / length);
                let end = from.lerp(to, (position + step) / length);
                let on = index % 2 == 0;
                if on {
                    if !drawing {
                        builder.begin(start);
                        drawing = true;
                    }
                    builder.line_to(end);
                } else if drawing {
                    builder.end(false);
                    drawing = false;
                }

                position += step;
                left -= step;
                if left <= f32::EPSILON {
                    index = (index + 1) % pattern.len();
                    left = pattern[index];
                    if index % 2 == 1 && drawing {
                        builder.end(false);
                        drawing = false;
                    }
                }
            }
        }

        if drawing {
            builder.end(false);
        }
    }

    builder.build()
}

/// Draw call recorded by [`RecordingCanvas`].
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    /// A path was filled.
    Fill {
        /// Flattened contours of the path.
        contours: Vec<Vec<(f32, f32)>>,
        /// Fill color.
        color: Color,
    },
    /// A path was stroked.
    Stroke {
        /// Flattened contours of the path.
        contours: Vec<Vec<(f32, f32)>>,
        /// Stroke color.
        color: Color,
        /// Stroke width.
        width: f64,
    },
    /// A path was filled with a pattern.
    Pattern {
        /// Flattened contours of the path.
        contours: Vec<Vec<(f32, f32)>>,
        /// Opacity of the pattern.
        opacity: f64,
    },
    /// An image was drawn.
    Image {
        /// Size of the image.
        size: (u32, u32),
        /// Image to canvas transform.
        transform: Transform,
        /// Opacity.
        opacity: f64,
    },
}

/// Canvas that only records what is drawn on it.
#[derive(Debug, Clone, Default)]
pub struct RecordingCanvas {
    size: Size<u32>,
    /// Draw calls in the order they were made.
    pub commands: Vec<DrawCommand>,
}

impl RecordingCanvas {
    /// Creates an empty recording of the given size.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            size: Size::new(width, height),
            commands: Vec::new(),
        }
    }
}

fn contours(path: &Path) -> Vec<Vec<(f32, f32)>> {
    flatten(path)
        .into_iter()
        .map(|(points, _)| points.into_iter().map(|p| (p.x, p.y)).collect())
        .collect()
}

impl Canvas for RecordingCanvas {
    fn size(&self) -> Size<u32> {
        self.size
    }

    fn fill_path(&mut self, path: &Path, paint: &FillPaint) {
        self.commands.push(DrawCommand::Fill {
            contours: contours(path),
            color: paint.color,
        });
    }

    fn stroke_path(&mut self, path: &Path, paint: &StrokePaint) {
        self.commands.push(DrawCommand::Stroke {
            contours: contours(path),
            color: paint.color,
            width: paint.width,
        });
    }

    fn fill_pattern(&mut self, path: &Path, _pattern: &DecodedImage, _origin: Point2d, opacity: f64) {
        self.commands.push(DrawCommand::Pattern {
            contours: contours(path),
            opacity,
        });
    }

    fn draw_image(&mut self, image: &DecodedImage, transform: &Transform, paint: &ImagePaint) {
        self.commands.push(DrawCommand::Image {
            size: (image.width(), image.height()),
            transform: *transform,
            opacity: paint.opacity,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lengths(path: &Path) -> Vec<f32> {
        flatten(path)
            .iter()
            .map(|(points, _)| points.windows(2).map(|w| (w[1] - w[0]).length()).sum())
            .collect()
    }

    #[test]
    fn geometry_paths() {
        let polygon = Geometry::polygon(&[
            &[(0.0, 0.0), (10.0, 0.0), (10.0, 10.0)],
            &[(2.0, 2.0), (3.0, 2.0), (3.0, 3.0)],
        ]);
        let contours = flatten(&geometry_path(&polygon));
        assert_eq!(contours.len(), 2);
        assert!(contours.iter().all(|(_, closed)| *closed));

        let line = Geometry::line_string(&[(0.0, 0.0), (5.0, 0.0)]);
        let contours = flatten(&geometry_path(&line));
        assert_eq!(contours, vec![(vec![point(0.0, 0.0), point(5.0, 0.0)], false)]);

        assert!(flatten(&geometry_path(&Geometry::point(1.0, 1.0))).is_empty());
    }

    #[test]
    fn dashes_split_lines() {
        let line = geometry_path(&Geometry::line_string(&[(0.0, 0.0), (10.0, 0.0), (10.0, 10.0)]));
        let dashed = dash_path(&line, &[(4.0, 2.0)], 0.0);
        // 0-4, 6-10, 12-16, 18-20.
        let lengths = lengths(&dashed);
        assert_eq!(lengths.len(), 4);
        for (actual, expected) in lengths.iter().zip([4.0, 4.0, 4.0, 2.0]) {
            assert!((actual - expected).abs() < 1e-4, "{lengths:?}");
        }

        let shifted = dash_path(&line, &[(4.0, 2.0)], 3.0);
        let first = lengths_first(&shifted);
        assert!((first - 1.0).abs() < 1e-4);
    }

    fn lengths_first(path: &Path) -> f32 {
        lengths(path)[0]
    }

    #[test]
    fn recording_canvas() {
        let mut canvas = RecordingCanvas::new(10, 10);
        canvas.fill_path(
            &rect_path(&BoundingBox::new(0.0, 0.0, 2.0, 2.0)),
            &FillPaint::new(Color::RED),
        );
        assert_eq!(canvas.size(), Size::new(10, 10));
        match &canvas.commands[0] {
            DrawCommand::Fill { contours, color } => {
                assert_eq!(*color, Color::RED);
                assert_eq!(contours[0].len(), 4);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
