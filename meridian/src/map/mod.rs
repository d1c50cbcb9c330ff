//! The map: layers, styles and the render configuration.

use std::collections::BTreeMap;
use std::path::PathBuf;

use meridian_types::projection::WGS84_GEOGRAPHIC;
use meridian_types::{BoundingBox, Point2d, Projection};

use crate::color::Color;
use crate::datasource::Featureset;
use crate::error::{Error, ResultExt};
use crate::style::{FontSet, MetaWriter, Style};
use crate::transform::{ProjTransform, ViewTransform};

mod layer;

pub use layer::Layer;

/// Size of a rendered pixel in metres, as defined by OGC.
pub const PIXEL_SIZE_METRES: f64 = 0.00028;

/// Length of a degree of longitude at the equator, in metres.
pub const METRES_PER_DEGREE: f64 = 6378137.0 * 2.0 * std::f64::consts::PI / 360.0;

/// Query tolerance of [`Map::query_point`] in pixels.
const QUERY_TOLERANCE_PIXELS: f64 = 3.0;

/// A map: the styles and layers to render, and where and how large to render them.
#[derive(Debug, PartialEq)]
pub struct Map {
    width: u32,
    height: u32,
    srs: String,
    background: Option<Color>,
    background_image: Option<PathBuf>,
    buffer_size: u32,
    styles: BTreeMap<String, Style>,
    layers: Vec<Layer>,
    fontsets: BTreeMap<String, FontSet>,
    metawriters: BTreeMap<String, MetaWriter>,
    current_extent: BoundingBox,
    scale_factor: f64,
}

impl Map {
    /// Creates an empty map of the given size in pixels, in WGS84 geographic coordinates.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            srs: WGS84_GEOGRAPHIC.to_string(),
            background: None,
            background_image: None,
            buffer_size: 0,
            styles: BTreeMap::new(),
            layers: Vec::new(),
            fontsets: BTreeMap::new(),
            metawriters: BTreeMap::new(),
            current_extent: BoundingBox::new(-180.0, -90.0, 180.0, 90.0),
            scale_factor: 1.0,
        }
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Changes the size of the rendered image. The extent is adjusted to the new aspect ratio.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        self.zoom_to_box(self.current_extent);
    }

    /// Spatial reference of the map.
    pub fn srs(&self) -> &str {
        &self.srs
    }

    /// Sets the spatial reference. The extent is not converted.
    pub fn set_srs(&mut self, srs: impl Into<String>) {
        self.srs = srs.into();
    }

    /// Background color.
    pub fn background(&self) -> Option<Color> {
        self.background
    }

    /// Sets the background color.
    pub fn set_background(&mut self, color: Option<Color>) {
        self.background = color;
    }

    /// Background image, drawn over the background color.
    pub fn background_image(&self) -> Option<&PathBuf> {
        self.background_image.as_ref()
    }

    /// Sets the background image.
    pub fn set_background_image(&mut self, path: Option<PathBuf>) {
        self.background_image = path;
    }

    /// Width in pixels of the margin around the image in which features are queried and rendered, so
    /// that labels and symbols crossing the image edge are not cut off.
    pub fn buffer_size(&self) -> u32 {
        self.buffer_size
    }

    /// Sets the buffer size.
    pub fn set_buffer_size(&mut self, buffer_size: u32) {
        self.buffer_size = buffer_size;
    }

    /// Multiplier of every pixel size in styles, e.g. `2` for high density displays.
    pub fn scale_factor(&self) -> f64 {
        self.scale_factor
    }

    /// Sets the scale factor.
    pub fn set_scale_factor(&mut self, scale_factor: f64) {
        self.scale_factor = scale_factor;
    }

    /// Adds a style, returning false if a style with this name exists. The existing style is kept.
    pub fn insert_style(&mut self, name: impl Into<String>, style: Style) -> bool {
        let name = name.into();
        if self.styles.contains_key(&name) {
            return false;
        }
        self.styles.insert(name, style);
        true
    }

    /// Removes a style.
    pub fn remove_style(&mut self, name: &str) -> Option<Style> {
        self.styles.remove(name)
    }

    /// Style with the name.
    pub fn find_style(&self, name: &str) -> Option<&Style> {
        self.styles.get(name)
    }

    /// Styles sorted by name.
    pub fn styles(&self) -> &BTreeMap<String, Style> {
        &self.styles
    }

    /// Adds a font set, returning false if a font set with its name exists.
    pub fn insert_fontset(&mut self, fontset: FontSet) -> bool {
        if self.fontsets.contains_key(fontset.name()) {
            return false;
        }
        self.fontsets.insert(fontset.name().to_string(), fontset);
        true
    }

    /// Font set with the name.
    pub fn find_fontset(&self, name: &str) -> Option<&FontSet> {
        self.fontsets.get(name)
    }

    /// Font sets sorted by name.
    pub fn fontsets(&self) -> &BTreeMap<String, FontSet> {
        &self.fontsets
    }

    /// Adds a meta writer, returning false if a meta writer with this name exists.
    pub fn insert_metawriter(&mut self, name: impl Into<String>, writer: MetaWriter) -> bool {
        let name = name.into();
        if self.metawriters.contains_key(&name) {
            return false;
        }
        self.metawriters.insert(name, writer);
        true
    }

    /// Meta writer with the name.
    pub fn find_metawriter(&self, name: &str) -> Option<&MetaWriter> {
        self.metawriters.get(name)
    }

    /// Meta writers sorted by name.
    pub fn metawriters(&self) -> &BTreeMap<String, MetaWriter> {
        &self.metawriters
    }

    /// Appends a layer. Layers are rendered in the order they are added.
    pub fn add_layer(&mut self, layer: Layer) {
        self.layers.push(layer);
    }

    /// Removes the layer at the index.
    pub fn remove_layer(&mut self, index: usize) -> Option<Layer> {
        (index < self.layers.len()).then(|| self.layers.remove(index))
    }

    /// Layers in render order.
    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    /// Mutable access to the layers.
    pub fn layers_mut(&mut self) -> &mut [Layer] {
        &mut self.layers
    }

    /// Visible area in map coordinates.
    pub fn current_extent(&self) -> BoundingBox {
        self.current_extent
    }

    /// Makes the box visible. The box grows in one direction to match the aspect ratio of the map.
    pub fn zoom_to_box(&mut self, bbox: BoundingBox) {
        self.current_extent = fit_aspect_ratio(bbox, self.width, self.height);
    }

    /// Zooms to the union of the envelopes of all active layers.
    ///
    /// Layer envelopes are converted into the map coordinates. Layers whose envelope can't be
    /// converted are skipped with a warning.
    pub fn zoom_all(&mut self) -> Result<(), Error> {
        let map_projection = Projection::new(&self.srs).context("in map srs")?;

        let mut extent: Option<BoundingBox> = None;
        for layer in self.layers.iter().filter(|layer| layer.active) {
            let Some(datasource) = layer.datasource() else {
                continue;
            };

            let layer_projection = Projection::new(&layer.srs)
                .with_context(|| format!("in layer '{}'", layer.name))?;
            let transform = ProjTransform::new(&layer_projection, &map_projection);
            match transform.forward_box(&datasource.envelope()) {
                Ok(envelope) => {
                    extent = Some(match extent {
                        Some(current) => current.merge(&envelope),
                        None => envelope,
                    })
                }
                Err(err) => log::warn!(
                    "Envelope of layer '{}' can't be converted into map coordinates: {err}",
                    layer.name
                ),
            }
        }

        if let Some(extent) = extent {
            self.zoom_to_box(extent);
        }

        Ok(())
    }

    /// Map units per pixel.
    pub fn scale(&self) -> f64 {
        if self.width == 0 {
            return 0.0;
        }
        self.current_extent.width() / self.width as f64
    }

    /// Scale denominator of the current view, assuming OGC standard pixels of 0.28mm. For
    /// geographic maps the degrees are converted into metres at the equator.
    pub fn scale_denominator(&self) -> f64 {
        let geographic = Projection::new(&self.srs)
            .map(|p| p.is_geographic())
            .unwrap_or(false);
        scale_denominator(self.scale(), geographic)
    }

    /// Current extent grown by the buffer size on each side.
    pub fn buffered_extent(&self) -> BoundingBox {
        self.current_extent
            .buffered(self.buffer_size as f64 * self.scale())
    }

    /// Transform from map coordinates into pixels of the rendered image.
    pub fn view_transform(&self) -> ViewTransform {
        ViewTransform::new(self.width, self.height, self.current_extent, 0.0)
    }

    /// Features of the layer at the map point.
    pub fn query_point(&self, layer_index: usize, x: f64, y: f64) -> Result<Featureset<'_>, Error> {
        let layer = self
            .layers
            .get(layer_index)
            .ok_or_else(|| Error::config(format!("no layer with index {layer_index}")))?;
        let datasource = layer
            .datasource()
            .ok_or_else(|| Error::config(format!("layer '{}' has no datasource", layer.name)))?;

        let map_projection = Projection::new(&self.srs)?;
        let layer_projection = Projection::new(&layer.srs)?;
        let transform = ProjTransform::new(&layer_projection, &map_projection);

        let (mut lx, mut ly) = (x, y);
        transform.backward(&mut lx, &mut ly)?;

        let tolerance = self.scale() * QUERY_TOLERANCE_PIXELS;
        log::trace!(
            "Querying layer '{}' at ({lx}, {ly}) with tolerance {tolerance}",
            layer.name
        );
        datasource
            .features_at_point(&Point2d::new(lx, ly), tolerance)
            .with_context(|| format!("in layer '{}'", layer.name))
    }

    /// Features of the layer at the pixel of the rendered image.
    pub fn query_map_point(
        &self,
        layer_index: usize,
        px: f64,
        py: f64,
    ) -> Result<Featureset<'_>, Error> {
        let (x, y) = self.view_transform().backward(px, py);
        self.query_point(layer_index, x, y)
    }
}

/// Scale denominator for the given map units per pixel.
pub fn scale_denominator(map_units_per_pixel: f64, geographic: bool) -> f64 {
    let metres_per_pixel = if geographic {
        map_units_per_pixel * METRES_PER_DEGREE
    } else {
        map_units_per_pixel
    };
    metres_per_pixel / PIXEL_SIZE_METRES
}

fn fit_aspect_ratio(bbox: BoundingBox, width: u32, height: u32) -> BoundingBox {
    if width == 0 || height == 0 || bbox.width() <= 0.0 || bbox.height() <= 0.0 {
        return bbox;
    }

    let map_ratio = width as f64 / height as f64;
    let box_ratio = bbox.width() / bbox.height();
    let center = bbox.center();

    let (half_width, half_height) = if box_ratio > map_ratio {
        (bbox.width() / 2.0, bbox.width() / map_ratio / 2.0)
    } else {
        (bbox.height() * map_ratio / 2.0, bbox.height() / 2.0)
    };

    BoundingBox::new(
        center.x - half_width,
        center.y - half_height,
        center.x + half_width,
        center.y + half_height,
    )
}
