use std::io::Cursor;
use std::path::Path as FsPath;

use image::{ImageOutputFormat, Rgba, RgbaImage};
use lyon::math::{point, Point, Transform};
use lyon::path::{FillRule, Path};
use lyon::tessellation::{
    BuffersBuilder, FillOptions, FillTessellator, FillVertex, StrokeOptions, StrokeTessellator,
    StrokeVertex, VertexBuffers,
};
use meridian_types::{Point2d, Size};

use crate::color::Color;
use crate::decoded_image::DecodedImage;
use crate::error::Error;
use crate::render::canvas::{dash_path, Canvas, FillPaint, ImagePaint, StrokePaint, FLATTENING_TOLERANCE};
use crate::style::{CompositeMode, RasterScaling};

/// Samples per pixel along each axis.
const SUBSAMPLES: usize = 2;

/// Canvas drawing into an RGBA image.
///
/// Paths are tessellated into triangles with lyon and the triangles are sampled at four points
/// per pixel, so edges get four levels of coverage.
#[derive(Debug, Clone)]
pub struct ImageCanvas {
    image: RgbaImage,
}

impl ImageCanvas {
    /// Creates a transparent canvas.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            image: RgbaImage::new(width, height),
        }
    }

    /// Creates a canvas drawing over an existing image.
    pub fn from_image(image: RgbaImage) -> Self {
        Self { image }
    }

    /// Color of the pixel.
    pub fn pixel(&self, x: u32, y: u32) -> Option<Color> {
        (x < self.image.width() && y < self.image.height()).then(|| {
            let [r, g, b, a] = self.image.get_pixel(x, y).0;
            Color::rgba(r, g, b, a)
        })
    }

    /// Rendered image.
    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    /// Consumes the canvas, returning the rendered image.
    pub fn into_image(self) -> RgbaImage {
        self.image
    }

    /// Encodes the image as PNG.
    pub fn encode_png(&self) -> Result<Vec<u8>, Error> {
        let mut bytes = Cursor::new(Vec::new());
        self.image.write_to(&mut bytes, ImageOutputFormat::Png)?;
        Ok(bytes.into_inner())
    }

    /// Writes the image into a PNG file.
    pub fn save_png(&self, path: impl AsRef<FsPath>) -> Result<(), Error> {
        let path = path.as_ref();
        std::fs::write(path, self.encode_png()?)?;
        log::debug!("Saved rendered image to '{}'", path.display());
        Ok(())
    }

    fn fill_coverage(&self, path: &Path, fill_rule: FillRule) -> Option<Coverage> {
        let mut buffers: VertexBuffers<Point, u32> = VertexBuffers::new();
        let options = FillOptions::tolerance(FLATTENING_TOLERANCE).with_fill_rule(fill_rule);
        if let Err(err) = FillTessellator::new().tessellate_path(
            path,
            &options,
            &mut BuffersBuilder::new(&mut buffers, |vertex: FillVertex| vertex.position()),
        ) {
            log::debug!("Failed to tessellate path: {err:?}");
            return None;
        }

        Coverage::rasterize(&buffers, self.image.width(), self.image.height())
    }

    fn stroke_coverage(&self, path: &Path, paint: &StrokePaint) -> Option<Coverage> {
        if paint.width <= 0.0 {
            return None;
        }

        let dashed;
        let path = if paint.dashes.is_empty() {
            path
        } else {
            dashed = dash_path(path, &paint.dashes, paint.dash_offset);
            &dashed
        };

        let mut buffers: VertexBuffers<Point, u32> = VertexBuffers::new();
        let options = StrokeOptions::tolerance(FLATTENING_TOLERANCE)
            .with_line_width(paint.width as f32)
            .with_line_join(paint.line_join.into())
            .with_line_cap(paint.line_cap.into());
        if let Err(err) = StrokeTessellator::new().tessellate_path(
            path,
            &options,
            &mut BuffersBuilder::new(&mut buffers, |vertex: StrokeVertex| vertex.position()),
        ) {
            log::debug!("Failed to tessellate stroke: {err:?}");
            return None;
        }

        Coverage::rasterize(&buffers, self.image.width(), self.image.height())
    }

    fn paint(&mut self, coverage: &Coverage, gamma: f64, mut color_at: impl FnMut(u32, u32) -> Color) {
        for (x, y, amount) in coverage.pixels() {
            let amount = if gamma == 1.0 {
                amount
            } else {
                amount.powf(gamma as f32)
            };
            let color = color_at(x, y);
            let alpha = (color.a() as f32 * amount).round() as u8;
            self.blend_pixel(x, y, color.with_alpha(alpha), CompositeMode::Normal);
        }
    }

    fn blend_pixel(&mut self, x: u32, y: u32, color: Color, mode: CompositeMode) {
        if color.is_transparent() {
            return;
        }

        let pixel = self.image.get_pixel_mut(x, y);
        let [r, g, b, a] = pixel.0;
        let result = composite(Color::rgba(r, g, b, a), color, mode);
        *pixel = Rgba(result.to_u8_array());
    }
}

impl Canvas for ImageCanvas {
    fn size(&self) -> Size<u32> {
        Size::new(self.image.width(), self.image.height())
    }

    fn fill_path(&mut self, path: &Path, paint: &FillPaint) {
        if paint.color.is_transparent() {
            return;
        }

        if let Some(coverage) = self.fill_coverage(path, paint.fill_rule) {
            self.paint(&coverage, paint.gamma, |_, _| paint.color);
        }
    }

    fn stroke_path(&mut self, path: &Path, paint: &StrokePaint) {
        if paint.color.is_transparent() {
            return;
        }

        if let Some(coverage) = self.stroke_coverage(path, paint) {
            self.paint(&coverage, 1.0, |_, _| paint.color);
        }
    }

    fn fill_pattern(&mut self, path: &Path, pattern: &DecodedImage, origin: Point2d, opacity: f64) {
        let (width, height) = (pattern.width() as i64, pattern.height() as i64);
        if width == 0 || height == 0 {
            return;
        }

        if let Some(coverage) = self.fill_coverage(path, FillRule::EvenOdd) {
            let (ox, oy) = (origin.x.floor() as i64, origin.y.floor() as i64);
            self.paint(&coverage, 1.0, |x, y| {
                let [r, g, b, a] = pattern
                    .pixel(
                        (x as i64 - ox).rem_euclid(width),
                        (y as i64 - oy).rem_euclid(height),
                    )
                    .0;
                Color::rgba(r, g, b, a).with_opacity(opacity)
            });
        }
    }

    fn draw_image(&mut self, image: &DecodedImage, transform: &Transform, paint: &ImagePaint) {
        let Some(inverse) = transform.inverse() else {
            return;
        };
        let (w, h) = (image.width() as f32, image.height() as f32);
        if w == 0.0 || h == 0.0 {
            return;
        }

        let corners = [point(0.0, 0.0), point(w, 0.0), point(w, h), point(0.0, h)]
            .map(|corner| transform.transform_point(corner));
        let min_x = corners.iter().map(|p| p.x).fold(f32::INFINITY, f32::min);
        let min_y = corners.iter().map(|p| p.y).fold(f32::INFINITY, f32::min);
        let max_x = corners.iter().map(|p| p.x).fold(f32::NEG_INFINITY, f32::max);
        let max_y = corners.iter().map(|p| p.y).fold(f32::NEG_INFINITY, f32::max);

        let x_range = pixel_range(min_x, max_x, self.image.width());
        let y_range = pixel_range(min_y, max_y, self.image.height());

        for y in y_range {
            for x in x_range.clone() {
                let source = inverse.transform_point(point(x as f32 + 0.5, y as f32 + 0.5));
                if source.x < 0.0 || source.y < 0.0 || source.x >= w || source.y >= h {
                    continue;
                }

                let color = match paint.scaling {
                    RasterScaling::Fast => {
                        let [r, g, b, a] = image
                            .pixel(source.x.floor() as i64, source.y.floor() as i64)
                            .0;
                        Color::rgba(r, g, b, a)
                    }
                    RasterScaling::Bilinear => sample_bilinear(image, source),
                };

                self.blend_pixel(x, y, color.with_opacity(paint.opacity), paint.mode);
            }
        }
    }
}

fn pixel_range(min: f32, max: f32, limit: u32) -> std::ops::Range<u32> {
    let start = min.floor().max(0.0) as u32;
    let end = (max.ceil().max(0.0) as u32).min(limit);
    start.min(end)..end
}

fn sample_bilinear(image: &DecodedImage, source: Point) -> Color {
    let fx = source.x - 0.5;
    let fy = source.y - 0.5;
    let x0 = fx.floor();
    let y0 = fy.floor();
    let tx = fx - x0;
    let ty = fy - y0;

    let max_x = image.width() as i64 - 1;
    let max_y = image.height() as i64 - 1;
    let at = |x: f32, y: f32| {
        let [r, g, b, a] = image
            .pixel((x as i64).clamp(0, max_x), (y as i64).clamp(0, max_y))
            .0;
        [r as f32, g as f32, b as f32, a as f32]
    };

    let p00 = at(x0, y0);
    let p10 = at(x0 + 1.0, y0);
    let p01 = at(x0, y0 + 1.0);
    let p11 = at(x0 + 1.0, y0 + 1.0);

    let mut out = [0u8; 4];
    for i in 0..4 {
        let top = p00[i] + (p10[i] - p00[i]) * tx;
        let bottom = p01[i] + (p11[i] - p01[i]) * tx;
        out[i] = (top + (bottom - top) * ty).round().clamp(0.0, 255.0) as u8;
    }

    Color::rgba(out[0], out[1], out[2], out[3])
}

/// Composites `source` over `back` with the blend mode applied to the overlapping part.
fn composite(back: Color, source: Color, mode: CompositeMode) -> Color {
    let blend = |cb: u8, cs: u8| -> f32 {
        let (cb, cs) = (cb as f32 / 255.0, cs as f32 / 255.0);
        match mode {
            CompositeMode::Normal => cs,
            CompositeMode::Multiply => cb * cs,
            CompositeMode::Screen => cb + cs - cb * cs,
            CompositeMode::Darken => cb.min(cs),
            CompositeMode::Lighten => cb.max(cs),
        }
    };

    let source = if mode == CompositeMode::Normal || back.is_transparent() {
        source
    } else {
        let ab = back.a() as f32 / 255.0;
        let mix = |cb: u8, cs: u8| {
            let mixed = (1.0 - ab) * (cs as f32 / 255.0) + ab * blend(cb, cs);
            (mixed * 255.0).round().clamp(0.0, 255.0) as u8
        };
        Color::rgba(
            mix(back.r(), source.r()),
            mix(back.g(), source.g()),
            mix(back.b(), source.b()),
            source.a(),
        )
    };

    back.blend(source)
}

/// Sub-pixel samples covered by a set of triangles.
struct Coverage {
    x0: u32,
    y0: u32,
    width: usize,
    height: usize,
    samples: Vec<bool>,
}

impl Coverage {
    fn rasterize(buffers: &VertexBuffers<Point, u32>, canvas_width: u32, canvas_height: u32) -> Option<Self> {
        if buffers.indices.is_empty() {
            return None;
        }

        let vertices = &buffers.vertices;
        let min_x = vertices.iter().map(|p| p.x).fold(f32::INFINITY, f32::min);
        let min_y = vertices.iter().map(|p| p.y).fold(f32::INFINITY, f32::min);
        let max_x = vertices.iter().map(|p| p.x).fold(f32::NEG_INFINITY, f32::max);
        let max_y = vertices.iter().map(|p| p.y).fold(f32::NEG_INFINITY, f32::max);

        let x_range = pixel_range(min_x, max_x, canvas_width);
        let y_range = pixel_range(min_y, max_y, canvas_height);
        if x_range.is_empty() || y_range.is_empty() {
            return None;
        }

        let mut coverage = Self {
            x0: x_range.start,
            y0: y_range.start,
            width: x_range.len() * SUBSAMPLES,
            height: y_range.len() * SUBSAMPLES,
            samples: vec![false; x_range.len() * y_range.len() * SUBSAMPLES * SUBSAMPLES],
        };

        for triangle in buffers.indices.chunks_exact(3) {
            let [a, b, c] = [0, 1, 2].map(|i| vertices[triangle[i] as usize]);
            coverage.add_triangle(a, b, c);
        }

        Some(coverage)
    }

    fn sample_position(&self, sx: usize, sy: usize) -> Point {
        let step = 1.0 / SUBSAMPLES as f32;
        point(
            self.x0 as f32 + (sx as f32 + 0.5) * step,
            self.y0 as f32 + (sy as f32 + 0.5) * step,
        )
    }

    fn add_triangle(&mut self, a: Point, b: Point, c: Point) {
        let area = (b - a).cross(c - a);
        if area == 0.0 || !area.is_finite() {
            return;
        }

        let scale = SUBSAMPLES as f32;
        let to_sample = |v: f32, origin: u32, limit: usize| -> usize {
            (((v - origin as f32) * scale).max(0.0) as usize).min(limit)
        };
        let sx0 = to_sample(a.x.min(b.x).min(c.x).floor(), self.x0, self.width);
        let sx1 = to_sample(a.x.max(b.x).max(c.x).ceil(), self.x0, self.width);
        let sy0 = to_sample(a.y.min(b.y).min(c.y).floor(), self.y0, self.height);
        let sy1 = to_sample(a.y.max(b.y).max(c.y).ceil(), self.y0, self.height);

        for sy in sy0..sy1 {
            for sx in sx0..sx1 {
                let p = self.sample_position(sx, sy);
                let e0 = (b - a).cross(p - a);
                let e1 = (c - b).cross(p - b);
                let e2 = (a - c).cross(p - c);
                let inside = if area > 0.0 {
                    e0 >= 0.0 && e1 >= 0.0 && e2 >= 0.0
                } else {
                    e0 <= 0.0 && e1 <= 0.0 && e2 <= 0.0
                };
                if inside {
                    self.samples[sy * self.width + sx] = true;
                }
            }
        }
    }

    /// Covered pixels with the covered fraction of their samples.
    fn pixels(&self) -> impl Iterator<Item = (u32, u32, f32)> + '_ {
        let columns = self.width / SUBSAMPLES;
        let rows = self.height / SUBSAMPLES;
        (0..rows).flat_map(move |row| {
            (0..columns).filter_map(move |column| {
                let mut count = 0;
                for dy in 0..SUBSAMPLES {
                    for dx in 0..SUBSAMPLES {
                        let index = (row * SUBSAMPLES + dy) * self.width + column * SUBSAMPLES + dx;
                        if self.samples[index] {
                            count += 1;
                        }
                    }
                }

                (count > 0).then(|| {
                    (
                        self.x0 + column as u32,
                        self.y0 + row as u32,
                        count as f32 / (SUBSAMPLES * SUBSAMPLES) as f32,
                    )
                })
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use meridian_types::BoundingBox;

    use super::*;
    use crate::render::canvas::rect_path;

    #[test]
    fn fills_rectangles() {
        let mut canvas = ImageCanvas::new(10, 10);
        canvas.fill_path(
            &rect_path(&BoundingBox::new(2.0, 2.0, 6.0, 6.0)),
            &FillPaint::new(Color::RED),
        );

        assert_eq!(canvas.pixel(3, 3), Some(Color::RED));
        assert_eq!(canvas.pixel(5, 5), Some(Color::RED));
        assert_eq!(canvas.pixel(6, 6), Some(Color::TRANSPARENT));
        assert_eq!(canvas.pixel(1, 3), Some(Color::TRANSPARENT));
        assert_eq!(canvas.pixel(10, 0), None);
    }

    #[test]
    fn blends_translucent_fills() {
        let mut canvas = ImageCanvas::new(4, 4);
        let full = rect_path(&BoundingBox::new(0.0, 0.0, 4.0, 4.0));
        canvas.fill_path(&full, &FillPaint::new(Color::WHITE));
        canvas.fill_path(&full, &FillPaint::new(Color::BLACK.with_alpha(128)));

        let pixel = canvas.pixel(1, 1).unwrap();
        assert_eq!(pixel.a(), 255);
        assert!((pixel.r() as i32 - 127).abs() <= 1, "{pixel:?}");
    }

    #[test]
    fn holes_are_not_filled() {
        let mut canvas = ImageCanvas::new(10, 10);
        let geometry = meridian_types::Geometry::polygon(&[
            &[(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0)],
            &[(3.0, 3.0), (7.0, 3.0), (7.0, 7.0), (3.0, 7.0)],
        ]);
        canvas.fill_path(
            &crate::render::canvas::geometry_path(&geometry),
            &FillPaint::even_odd(Color::BLUE),
        );

        assert_eq!(canvas.pixel(1, 1), Some(Color::BLUE));
        assert_eq!(canvas.pixel(5, 5), Some(Color::TRANSPARENT));
    }

    #[test]
    fn strokes_lines() {
        let mut canvas = ImageCanvas::new(10, 10);
        let line = meridian_types::Geometry::line_string(&[(0.0, 5.0), (10.0, 5.0)]);
        canvas.stroke_path(
            &crate::render::canvas::geometry_path(&line),
            &StrokePaint::solid(Color::BLACK, 2.0),
        );

        assert_eq!(canvas.pixel(5, 4), Some(Color::BLACK));
        assert_eq!(canvas.pixel(5, 5), Some(Color::BLACK));
        assert_eq!(canvas.pixel(5, 2), Some(Color::TRANSPARENT));
    }

    #[test]
    fn draws_images() {
        let image = DecodedImage::from_rgba(RgbaImage::from_pixel(2, 2, Rgba([0, 255, 0, 255])));
        let mut canvas = ImageCanvas::new(8, 8);
        canvas.draw_image_at(&image, 3.0, 3.0, 1.0);
        assert_eq!(canvas.pixel(3, 3), Some(Color::rgb(0, 255, 0)));
        assert_eq!(canvas.pixel(4, 4), Some(Color::rgb(0, 255, 0)));
        assert_eq!(canvas.pixel(5, 5), Some(Color::TRANSPARENT));

        canvas.draw_image_scaled(
            &image,
            &BoundingBox::new(0.0, 0.0, 8.0, 2.0),
            &ImagePaint::with_opacity(1.0),
        );
        assert_eq!(canvas.pixel(7, 1), Some(Color::rgb(0, 255, 0)));
    }

    #[test]
    fn composite_modes() {
        let back = Color::rgb(200, 100, 50);
        assert_eq!(composite(back, Color::WHITE, CompositeMode::Multiply), back);
        assert_eq!(composite(back, Color::BLACK, CompositeMode::Screen), back);
        assert_eq!(
            composite(back, Color::rgb(100, 150, 50), CompositeMode::Darken),
            Color::rgb(100, 100, 50)
        );
        assert_eq!(
            composite(back, Color::rgb(100, 150, 50), CompositeMode::Lighten),
            Color::rgb(200, 150, 50)
        );
    }

    #[test]
    fn encodes_png() {
        let canvas = ImageCanvas::new(2, 2);
        let bytes = canvas.encode_png().unwrap();
        assert_eq!(&bytes[1..4], b"PNG");
    }
}
