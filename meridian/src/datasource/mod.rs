//! Datasources supply features to the renderer.
//!
//! A [`Datasource`] is created by a [`DatasourcePlugin`] from a string parameter map, usually by the
//! [`DatasourceRegistry`] while a map document is loaded, and is owned by its layer afterwards.
//! Features are streamed lazily: [`Datasource::features`] returns a forward-only [`Featureset`] that
//! is consumed once and then dropped.

mod memory;
mod query;
mod raster;
mod registry;

#[cfg(feature = "geojson")]
mod geojson;

use std::collections::BTreeMap;
use std::fmt::Debug;

#[cfg(feature = "geojson")]
pub use self::geojson::{GeoJsonDatasource, GeoJsonPlugin};
pub use memory::MemoryDatasource;
use meridian_types::{BoundingBox, Point2d};
pub use query::Query;
pub use raster::{RasterDatasource, RasterPlugin};
pub use registry::DatasourceRegistry;

use crate::error::Error;
use crate::feature::Feature;

/// Datasource parameters, e.g. `type`, `file`.
pub type Parameters = BTreeMap<String, String>;

/// Lazily produced, finite, forward-only sequence of features.
///
/// A featureset can't be restarted. To read the features again, run a new query.
pub type Featureset<'a> = Box<dyn Iterator<Item = Feature> + 'a>;

/// Kind of data a datasource provides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DatasourceType {
    /// Features with geometries.
    Vector,
    /// Features with rasters.
    Raster,
}

/// Type of an attribute field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    /// Boolean values.
    Boolean,
    /// Integer values.
    Integer,
    /// Floating point values.
    Float,
    /// Text.
    String,
}

/// Schema of the features a datasource provides.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LayerDescriptor {
    /// Name of the data, e.g. the file name.
    pub name: String,
    /// Character encoding of the source data.
    pub encoding: String,
    /// Attribute fields in source order.
    pub fields: Vec<(String, FieldType)>,
}

/// Provider of features.
pub trait Datasource: Debug + Send + Sync {
    /// Kind of data the datasource provides.
    fn datasource_type(&self) -> DatasourceType;

    /// Parameters the datasource was created with.
    fn params(&self) -> &Parameters;

    /// Bounding box of all the data, in the datasource coordinates.
    fn envelope(&self) -> BoundingBox;

    /// Schema of the features.
    fn descriptor(&self) -> LayerDescriptor;

    /// Features intersecting the bounding box of the query.
    ///
    /// Datasources restrict feature attributes to the query's property names when the set is not
    /// empty, and may generalize geometries according to the query's scale denominator and filter
    /// factor.
    fn features(&self, query: &Query) -> Result<Featureset<'_>, Error>;

    /// Features whose geometry contains the point or lies within `tolerance` of it.
    fn features_at_point(&self, point: &Point2d, tolerance: f64) -> Result<Featureset<'_>, Error>;
}

/// Factory of datasources of one type.
pub trait DatasourcePlugin: Send + Sync {
    /// Name of the plugin, matched against the `type` parameter.
    fn name(&self) -> &str;

    /// Kind of data the created datasources provide.
    fn datasource_type(&self) -> DatasourceType;

    /// Creates a datasource from the full parameter map.
    fn create(&self, params: &Parameters) -> Result<Box<dyn Datasource>, Error>;
}

/// Returns the value of a required parameter.
pub(crate) fn required_param<'a>(params: &'a Parameters, name: &str) -> Result<&'a str, Error> {
    params
        .get(name)
        .map(String::as_str)
        .ok_or_else(|| Error::datasource(format!("missing parameter '{name}'")))
}

/// Parses an optional numeric parameter.
pub(crate) fn numeric_param(params: &Parameters, name: &str) -> Result<Option<f64>, Error> {
    params
        .get(name)
        .map(|value| {
            value.trim().parse::<f64>().map_err(|_| {
                Error::datasource(format!("failed to parse parameter '{name}' value '{value}' as a number"))
            })
        })
        .transpose()
}

/// Resolves the `file` parameter against the `base` parameter, if set.
pub(crate) fn file_param(params: &Parameters) -> Result<std::path::PathBuf, Error> {
    let file = required_param(params, "file")?;
    Ok(match params.get("base") {
        Some(base) => std::path::Path::new(base).join(file),
        None => std::path::PathBuf::from(file),
    })
}

/// Keeps only the attributes listed in the query, if it lists any.
pub(crate) fn restrict_properties(mut feature: Feature, query: &Query) -> Feature {
    if !query.property_names().is_empty() {
        feature.retain_attributes(|name| query.property_names().contains(name));
    }

    feature
}
