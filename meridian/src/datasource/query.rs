use std::collections::BTreeSet;

use meridian_types::BoundingBox;

/// Request for features of a datasource.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    bbox: BoundingBox,
    resolution: (f64, f64),
    scale_denominator: f64,
    filter_factor: f64,
    property_names: BTreeSet<String>,
}

impl Query {
    /// Creates a query for the bounding box at the given resolution (pixels per datasource unit)
    /// and scale denominator.
    pub fn new(bbox: BoundingBox, resolution: (f64, f64), scale_denominator: f64) -> Self {
        Self {
            bbox,
            resolution,
            scale_denominator,
            filter_factor: 1.0,
            property_names: BTreeSet::new(),
        }
    }

    /// Sets the filter factor, a hint of how aggressively geometries may be generalized.
    pub fn with_filter_factor(mut self, filter_factor: f64) -> Self {
        self.filter_factor = filter_factor;
        self
    }

    /// Adds an attribute name to request.
    pub fn add_property_name(&mut self, name: impl Into<String>) {
        self.property_names.insert(name.into());
    }

    /// Builder version of [`Query::add_property_name`].
    pub fn with_property_name(mut self, name: impl Into<String>) -> Self {
        self.add_property_name(name);
        self
    }

    /// Bounding box of the query.
    pub fn bbox(&self) -> BoundingBox {
        self.bbox
    }

    /// Resolution as pixels per datasource unit in x and y.
    pub fn resolution(&self) -> (f64, f64) {
        self.resolution
    }

    /// Scale denominator the features are rendered at.
    pub fn scale_denominator(&self) -> f64 {
        self.scale_denominator
    }

    /// Generalization hint, `1` by default.
    pub fn filter_factor(&self) -> f64 {
        self.filter_factor
    }

    /// Requested attribute names. Empty means all attributes.
    pub fn property_names(&self) -> &BTreeSet<String> {
        &self.property_names
    }
}
