use meridian_types::projection::WGS84_GEOGRAPHIC;

use crate::datasource::Datasource;

/// Zoom limits are compared with this tolerance, so that a scale computed from an extent equal to
/// the limit is still inside of it.
const ZOOM_TOLERANCE: f64 = 1e-6;

/// Layer of a map: a datasource plus the names of the styles drawing its features.
///
/// The layer exclusively owns its datasource, which is created once when the map is configured.
#[derive(Debug)]
pub struct Layer {
    /// Name of the layer.
    pub name: String,
    /// Spatial reference of the datasource coordinates.
    pub srs: String,
    /// Whether the layer is rendered at all.
    pub active: bool,
    /// Human readable title.
    pub title: String,
    /// Human readable description.
    pub abstract_: String,
    /// Smallest scale denominator at which the layer is rendered.
    pub min_zoom: f64,
    /// Largest scale denominator at which the layer is rendered.
    pub max_zoom: f64,
    /// Whether the layer can be queried for features at a point.
    pub queryable: bool,
    /// Whether the placement arbiter is reset before the layer is rendered, so its labels don't
    /// collide with labels of layers below.
    pub clear_label_cache: bool,
    styles: Vec<String>,
    datasource: Option<Box<dyn Datasource>>,
}

impl Layer {
    /// Creates an active layer in the WGS84 geographic coordinates without a datasource.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            srs: WGS84_GEOGRAPHIC.to_string(),
            active: true,
            title: String::new(),
            abstract_: String::new(),
            min_zoom: 0.0,
            max_zoom: f64::INFINITY,
            queryable: false,
            clear_label_cache: false,
            styles: Vec::new(),
            datasource: None,
        }
    }

    /// Sets the spatial reference.
    pub fn with_srs(mut self, srs: impl Into<String>) -> Self {
        self.srs = srs.into();
        self
    }

    /// Adds a style name.
    pub fn add_style(&mut self, name: impl Into<String>) {
        self.styles.push(name.into());
    }

    /// Builder version of [`Layer::add_style`].
    pub fn with_style(mut self, name: impl Into<String>) -> Self {
        self.add_style(name);
        self
    }

    /// Names of the styles applied to the layer, in the order they are rendered.
    pub fn styles(&self) -> &[String] {
        &self.styles
    }

    /// Sets the datasource, replacing the previous one.
    pub fn set_datasource(&mut self, datasource: Box<dyn Datasource>) {
        self.datasource = Some(datasource);
    }

    /// Builder version of [`Layer::set_datasource`].
    pub fn with_datasource(mut self, datasource: impl Datasource + 'static) -> Self {
        self.set_datasource(Box::new(datasource));
        self
    }

    /// Datasource of the layer.
    pub fn datasource(&self) -> Option<&dyn Datasource> {
        self.datasource.as_deref()
    }

    /// Returns true if the layer is active and the scale denominator is within its zoom limits.
    pub fn visible(&self, scale_denominator: f64) -> bool {
        self.active
            && scale_denominator >= self.min_zoom - ZOOM_TOLERANCE
            && scale_denominator < self.max_zoom + ZOOM_TOLERANCE
    }
}

impl PartialEq for Layer {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.srs == other.srs
            && self.active == other.active
            && self.title == other.title
            && self.abstract_ == other.abstract_
            && self.min_zoom == other.min_zoom
            && self.max_zoom == other.max_zoom
            && self.queryable == other.queryable
            && self.clear_label_cache == other.clear_label_cache
            && self.styles == other.styles
            && self.datasource().map(|ds| ds.params()) == other.datasource().map(|ds| ds.params())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasource::MemoryDatasource;

    #[test]
    fn visibility() {
        let mut layer = Layer::new("roads");
        layer.min_zoom = 1000.0;
        layer.max_zoom = 50000.0;

        assert!(!layer.visible(999.0));
        assert!(layer.visible(1000.0));
        assert!(layer.visible(49999.0));
        assert!(!layer.visible(50001.0));

        layer.active = false;
        assert!(!layer.visible(2000.0));
    }

    #[test]
    fn equality_compares_datasource_parameters() {
        let a = Layer::new("a").with_datasource(MemoryDatasource::new());
        let b = Layer::new("a").with_datasource(MemoryDatasource::new());
        let c = Layer::new("a").with_datasource(MemoryDatasource::new().with_param("file", "x"));

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, Layer::new("a"));
    }
}
