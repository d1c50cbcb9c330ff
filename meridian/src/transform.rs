//! Coordinate transforms from datasource coordinates to device pixels.
//!
//! Rendering a feature runs two stages: [`ProjTransform`] converts from the layer's projection into
//! the map's, and [`ViewTransform`] maps the map's visible extent onto the pixel grid. The
//! [`PixelTransform`] composes both for symbolizer renderers.

use meridian_types::{BoundingBox, Geometry, Point2d, Projection, TypesError};
use nalgebra::{Matrix3, Point2};

/// Number of points sampled along each edge of a box when it is reprojected.
const BOX_EDGE_SAMPLES: usize = 16;

/// Transform between two projections.
#[derive(Debug, Clone)]
pub struct ProjTransform {
    source: Projection,
    dest: Projection,
    identity: bool,
}

impl ProjTransform {
    /// Creates a transform from `source` coordinates into `dest` coordinates.
    pub fn new(source: &Projection, dest: &Projection) -> Self {
        Self {
            identity: source == dest || (source.is_geographic() && dest.is_geographic()),
            source: source.clone(),
            dest: dest.clone(),
        }
    }

    /// Returns true if both projections are the same and coordinates are passed through.
    pub fn is_identity(&self) -> bool {
        self.identity
    }

    /// Source projection.
    pub fn source(&self) -> &Projection {
        &self.source
    }

    /// Destination projection.
    pub fn dest(&self) -> &Projection {
        &self.dest
    }

    /// Converts source coordinates into destination coordinates in place.
    pub fn forward(&self, x: &mut f64, y: &mut f64) -> Result<(), TypesError> {
        if self.identity {
            return Ok(());
        }

        self.source.inverse(x, y)?;
        self.dest.forward(x, y)
    }

    /// Converts destination coordinates back into source coordinates in place.
    pub fn backward(&self, x: &mut f64, y: &mut f64) -> Result<(), TypesError> {
        if self.identity {
            return Ok(());
        }

        self.dest.inverse(x, y)?;
        self.source.forward(x, y)
    }

    /// Bounding box of the source box in destination coordinates.
    ///
    /// Projections bend straight lines, so points along every edge are converted, not only the
    /// corners. Points outside of the domain of a projection are skipped.
    pub fn forward_box(&self, bbox: &BoundingBox) -> Result<BoundingBox, TypesError> {
        self.convert_box(bbox, |x, y| self.forward(x, y))
    }

    /// Bounding box of the destination box in source coordinates.
    pub fn backward_box(&self, bbox: &BoundingBox) -> Result<BoundingBox, TypesError> {
        self.convert_box(bbox, |x, y| self.backward(x, y))
    }

    /// Converts every vertex of the geometry into destination coordinates.
    pub fn forward_geometry(&self, geometry: &Geometry) -> Option<Geometry> {
        if self.identity {
            return Some(geometry.clone());
        }

        geometry.transform(|mut x, mut y| self.forward(&mut x, &mut y).ok().map(|_| (x, y)))
    }

    fn convert_box(
        &self,
        bbox: &BoundingBox,
        convert: impl Fn(&mut f64, &mut f64) -> Result<(), TypesError>,
    ) -> Result<BoundingBox, TypesError> {
        if self.identity {
            return Ok(*bbox);
        }

        let mut points = Vec::with_capacity(BOX_EDGE_SAMPLES * 4);
        let mut last_error = None;
        for i in 0..BOX_EDGE_SAMPLES {
            let t = i as f64 / BOX_EDGE_SAMPLES as f64;
            let dx = bbox.width() * t;
            let dy = bbox.height() * t;
            let samples = [
                (bbox.x_min() + dx, bbox.y_min()),
                (bbox.x_max(), bbox.y_min() + dy),
                (bbox.x_max() - dx, bbox.y_max()),
                (bbox.x_min(), bbox.y_max() - dy),
            ];

            for (mut x, mut y) in samples {
                match convert(&mut x, &mut y) {
                    Ok(()) => points.push(Point2d::new(x, y)),
                    Err(err) => last_error = Some(err),
                }
            }
        }

        match BoundingBox::from_points(points.iter()) {
            Some(converted) => Ok(converted),
            None => Err(last_error.unwrap_or_else(|| TypesError::Transform {
                params: self.source.params().to_string(),
                x: bbox.x_min(),
                y: bbox.y_min(),
            })),
        }
    }
}

/// Transform from map coordinates into pixels of the rendered image.
///
/// The pixel origin is at the top left corner with `y` pointing down.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewTransform {
    width: u32,
    height: u32,
    extent: BoundingBox,
    offset: f64,
    map_to_screen: Matrix3<f64>,
    screen_to_map: Matrix3<f64>,
}

impl ViewTransform {
    /// Creates a transform mapping `extent` onto `width` x `height` pixels, shifted by `offset`
    /// pixels towards the top left corner.
    pub fn new(width: u32, height: u32, extent: BoundingBox, offset: f64) -> Self {
        let sx = if extent.width() > 0.0 {
            width as f64 / extent.width()
        } else {
            1.0
        };
        let sy = if extent.height() > 0.0 {
            height as f64 / extent.height()
        } else {
            1.0
        };

        #[rustfmt::skip]
        let map_to_screen = Matrix3::new(
            sx,  0.0, -extent.x_min() * sx - offset,
            0.0, -sy, extent.y_max() * sy - offset,
            0.0, 0.0, 1.0,
        );
        let screen_to_map = map_to_screen.try_inverse().unwrap_or_else(Matrix3::identity);

        Self {
            width,
            height,
            extent,
            offset,
            map_to_screen,
            screen_to_map,
        }
    }

    /// Width of the image in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height of the image in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Visible extent in map coordinates.
    pub fn extent(&self) -> BoundingBox {
        self.extent
    }

    /// Offset in pixels.
    pub fn offset(&self) -> f64 {
        self.offset
    }

    /// Pixels per map unit horizontally.
    pub fn scale_x(&self) -> f64 {
        self.map_to_screen[(0, 0)]
    }

    /// Pixels per map unit vertically.
    pub fn scale_y(&self) -> f64 {
        -self.map_to_screen[(1, 1)]
    }

    /// Converts a map point into pixels.
    pub fn forward(&self, x: f64, y: f64) -> (f64, f64) {
        let p = self
            .map_to_screen
            .transform_point(&Point2::new(x, y));
        (p.x, p.y)
    }

    /// Converts a pixel position into a map point.
    pub fn backward(&self, px: f64, py: f64) -> (f64, f64) {
        let p = self
            .screen_to_map
            .transform_point(&Point2::new(px, py));
        (p.x, p.y)
    }

    /// Converts a map box into pixels.
    pub fn forward_box(&self, bbox: &BoundingBox) -> BoundingBox {
        let (x0, y0) = self.forward(bbox.x_min(), bbox.y_min());
        let (x1, y1) = self.forward(bbox.x_max(), bbox.y_max());
        BoundingBox::new(x0, y0, x1, y1)
    }

    /// Converts a pixel box into map coordinates.
    pub fn backward_box(&self, bbox: &BoundingBox) -> BoundingBox {
        let (x0, y0) = self.backward(bbox.x_min(), bbox.y_min());
        let (x1, y1) = self.backward(bbox.x_max(), bbox.y_max());
        BoundingBox::new(x0, y0, x1, y1)
    }
}

/// Full pipeline from layer coordinates into pixels.
#[derive(Debug, Clone, Copy)]
pub struct PixelTransform<'a> {
    proj: &'a ProjTransform,
    view: &'a ViewTransform,
}

impl<'a> PixelTransform<'a> {
    /// Composes the projection transform with the view transform.
    pub fn new(proj: &'a ProjTransform, view: &'a ViewTransform) -> Self {
        Self { proj, view }
    }

    /// Projection stage.
    pub fn proj(&self) -> &'a ProjTransform {
        self.proj
    }

    /// View stage.
    pub fn view(&self) -> &'a ViewTransform {
        self.view
    }

    /// Converts a layer point into pixels.
    pub fn point(&self, x: f64, y: f64) -> Option<(f64, f64)> {
        let (mut x, mut y) = (x, y);
        self.proj.forward(&mut x, &mut y).ok()?;
        Some(self.view.forward(x, y))
    }

    /// Converts the geometry into map coordinates.
    pub fn to_map(&self, geometry: &Geometry) -> Option<Geometry> {
        self.proj.forward_geometry(geometry)
    }

    /// Converts the geometry into pixels. Returns `None` if some vertex can't be projected.
    pub fn to_pixels(&self, geometry: &Geometry) -> Option<Geometry> {
        geometry.transform(|x, y| self.point(x, y))
    }

    /// Converts a layer box into pixels.
    pub fn box_to_pixels(&self, bbox: &BoundingBox) -> Option<BoundingBox> {
        let map_box = self.proj.forward_box(bbox).ok()?;
        Some(self.view.forward_box(&map_box))
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use meridian_types::projection::{WEB_MERCATOR, WGS84_GEOGRAPHIC};

    use super::*;

    #[test]
    fn view_transform_flips_y() {
        let view = ViewTransform::new(100, 50, BoundingBox::new(0.0, 0.0, 200.0, 100.0), 0.0);
        assert_eq!(view.forward(0.0, 100.0), (0.0, 0.0));
        assert_eq!(view.forward(200.0, 0.0), (100.0, 50.0));
        assert_abs_diff_eq!(view.scale_x(), 0.5);
        assert_abs_diff_eq!(view.scale_y(), 0.5);

        let (x, y) = view.backward(25.0, 10.0);
        assert_abs_diff_eq!(x, 50.0, epsilon = 1e-9);
        assert_abs_diff_eq!(y, 80.0, epsilon = 1e-9);
    }

    #[test]
    fn view_transform_offset() {
        let view = ViewTransform::new(100, 100, BoundingBox::new(0.0, 0.0, 100.0, 100.0), 10.0);
        assert_eq!(view.forward(10.0, 90.0), (0.0, 0.0));
        assert_eq!(
            view.forward_box(&BoundingBox::new(10.0, 10.0, 20.0, 20.0)),
            BoundingBox::new(0.0, 70.0, 10.0, 80.0)
        );
    }

    #[test]
    fn identity_projection_transform() {
        let geographic = Projection::new(WGS84_GEOGRAPHIC).unwrap();
        let transform = ProjTransform::new(&geographic, &geographic);
        assert!(transform.is_identity());

        let (mut x, mut y) = (10.0, 20.0);
        transform.forward(&mut x, &mut y).unwrap();
        assert_eq!((x, y), (10.0, 20.0));
    }

    #[test]
    fn geographic_to_mercator() {
        let geographic = Projection::new(WGS84_GEOGRAPHIC).unwrap();
        let mercator = Projection::new(WEB_MERCATOR).unwrap();
        let transform = ProjTransform::new(&geographic, &mercator);
        assert!(!transform.is_identity());

        let (mut x, mut y) = (37.6, 55.7);
        transform.forward(&mut x, &mut y).unwrap();
        assert_abs_diff_eq!(x, 4185612.85, epsilon = 0.01);
        transform.backward(&mut x, &mut y).unwrap();
        assert_abs_diff_eq!(x, 37.6, epsilon = 1e-9);
        assert_abs_diff_eq!(y, 55.7, epsilon = 1e-9);

        let bbox = transform
            .forward_box(&BoundingBox::new(-10.0, -10.0, 10.0, 10.0))
            .unwrap();
        assert_abs_diff_eq!(bbox.x_max(), -bbox.x_min(), epsilon = 1e-6);
        assert!(bbox.y_max() > 1_000_000.0);
    }

    #[test]
    fn pixel_transform_composes_stages() {
        let geographic = Projection::new(WGS84_GEOGRAPHIC).unwrap();
        let proj = ProjTransform::new(&geographic, &geographic);
        let view = ViewTransform::new(360, 180, BoundingBox::new(-180.0, -90.0, 180.0, 90.0), 0.0);
        let transform = PixelTransform::new(&proj, &view);

        let line = Geometry::line_string(&[(-180.0, 90.0), (0.0, 0.0)]);
        let pixels = transform.to_pixels(&line).unwrap();
        let points: Vec<_> = pixels.iter().map(|v| (v.x, v.y)).collect();
        assert_eq!(points, vec![(0.0, 0.0), (180.0, 90.0)]);
    }
}
