//! Features produced by datasources.

use std::collections::BTreeMap;
use std::sync::Arc;

use image::RgbaImage;
use meridian_types::{BoundingBox, Geometry};

use crate::expression::Value;

/// Attribute map of a feature.
pub type Attributes = BTreeMap<String, Value>;

/// Pixel data of a raster feature.
#[derive(Debug, Clone)]
pub enum RasterData {
    /// Color image, drawn as is.
    Rgba(Arc<RgbaImage>),
    /// Single band of sample values in row-major order, colored by a raster colorizer.
    Band(Arc<Vec<f32>>),
}

/// Raster attached to a feature.
#[derive(Debug, Clone)]
pub struct Raster {
    /// Area covered by the raster, in the datasource coordinates.
    pub extent: BoundingBox,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Pixel data.
    pub data: RasterData,
}

impl Raster {
    /// Sample value of a single band raster at the pixel, `None` for color rasters or out of bounds.
    pub fn sample(&self, x: u32, y: u32) -> Option<f32> {
        if x >= self.width || y >= self.height {
            return None;
        }

        match &self.data {
            RasterData::Band(values) => values
                .get(y as usize * self.width as usize + x as usize)
                .copied(),
            RasterData::Rgba(_) => None,
        }
    }
}

/// A single feature: attributes plus zero or more geometries, and optionally a raster.
///
/// The feature owns its geometries. Renderers borrow it read-only for the duration of a call.
#[derive(Debug, Clone, Default)]
pub struct Feature {
    id: i64,
    attributes: Attributes,
    geometries: Vec<Geometry>,
    raster: Option<Raster>,
}

impl Feature {
    /// Creates an empty feature.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the id of the feature.
    pub fn with_id(mut self, id: i64) -> Self {
        self.id = id;
        self
    }

    /// Id of the feature.
    pub fn id(&self) -> i64 {
        self.id
    }

    /// Sets an attribute.
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set_attribute(name, value);
        self
    }

    /// Sets an attribute.
    pub fn set_attribute(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.attributes.insert(name.into(), value.into());
    }

    /// Value of an attribute.
    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    /// All attributes.
    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    /// Keeps only the attributes whose names satisfy the predicate.
    pub fn retain_attributes(&mut self, mut keep: impl FnMut(&str) -> bool) {
        self.attributes.retain(|name, _| keep(name));
    }

    /// Adds a geometry.
    pub fn with_geometry(mut self, geometry: Geometry) -> Self {
        self.geometries.push(geometry);
        self
    }

    /// Adds a geometry.
    pub fn add_geometry(&mut self, geometry: Geometry) {
        self.geometries.push(geometry);
    }

    /// Geometries of the feature.
    pub fn geometries(&self) -> &[Geometry] {
        &self.geometries
    }

    /// Attaches a raster.
    pub fn with_raster(mut self, raster: Raster) -> Self {
        self.raster = Some(raster);
        self
    }

    /// Raster of the feature, if any.
    pub fn raster(&self) -> Option<&Raster> {
        self.raster.as_ref()
    }

    /// Envelope of all geometries and the raster.
    pub fn envelope(&self) -> Option<BoundingBox> {
        let raster = self.raster.as_ref().map(|r| r.extent);
        self.geometries
            .iter()
            .filter_map(Geometry::envelope)
            .chain(raster)
            .reduce(|a, b| a.merge(&b))
    }
}
