use meridian_types::{BoundingBox, Point2d};

use crate::datasource::{
    restrict_properties, Datasource, DatasourceType, Featureset, FieldType, LayerDescriptor,
    Parameters, Query,
};
use crate::error::Error;
use crate::expression::Value;
use crate::feature::Feature;

/// Datasource over features held in memory.
///
/// Applications use it to render features they produce themselves. Its type is `memory`.
#[derive(Debug, Clone)]
pub struct MemoryDatasource {
    params: Parameters,
    features: Vec<Feature>,
    envelope: Option<BoundingBox>,
}

impl Default for MemoryDatasource {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDatasource {
    /// Creates an empty datasource.
    pub fn new() -> Self {
        Self {
            params: Parameters::from([("type".to_string(), "memory".to_string())]),
            features: Vec::new(),
            envelope: None,
        }
    }

    /// Creates a datasource holding the features.
    pub fn from_features(features: impl IntoIterator<Item = Feature>) -> Self {
        let mut datasource = Self::new();
        for feature in features {
            datasource.push(feature);
        }
        datasource
    }

    /// Adds a feature.
    pub fn push(&mut self, feature: Feature) {
        if let Some(envelope) = feature.envelope() {
            self.envelope = Some(match self.envelope {
                Some(current) => current.merge(&envelope),
                None => envelope,
            });
        }
        self.features.push(feature);
    }

    /// Sets an additional parameter reported by [`Datasource::params`].
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    /// Number of features.
    pub fn len(&self) -> usize {
        self.features.len()
    }

    /// Returns true if there are no features.
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

impl Datasource for MemoryDatasource {
    fn datasource_type(&self) -> DatasourceType {
        if !self.features.is_empty() && self.features.iter().all(|f| f.raster().is_some()) {
            DatasourceType::Raster
        } else {
            DatasourceType::Vector
        }
    }

    fn params(&self) -> &Parameters {
        &self.params
    }

    fn envelope(&self) -> BoundingBox {
        self.envelope
            .unwrap_or_else(|| BoundingBox::new(0.0, 0.0, 0.0, 0.0))
    }

    fn descriptor(&self) -> LayerDescriptor {
        let mut fields: Vec<(String, FieldType)> = Vec::new();
        for feature in &self.features {
            for (name, value) in feature.attributes() {
                if fields.iter().any(|(existing, _)| existing == name) {
                    continue;
                }
                let field_type = match value {
                    Value::Bool(_) => FieldType::Boolean,
                    Value::Integer(_) => FieldType::Integer,
                    Value::Float(_) => FieldType::Float,
                    Value::String(_) | Value::Null => FieldType::String,
                };
                fields.push((name.clone(), field_type));
            }
        }

        LayerDescriptor {
            name: "memory".into(),
            encoding: "utf-8".into(),
            fields,
        }
    }

    fn features(&self, query: &Query) -> Result<Featureset<'_>, Error> {
        let bbox = query.bbox();
        let query = query.clone();
        Ok(Box::new(
            self.features
                .iter()
                .filter(move |feature| {
                    feature
                        .envelope()
                        .is_some_and(|envelope| envelope.intersects(&bbox))
                })
                .map(move |feature| restrict_properties(feature.clone(), &query)),
        ))
    }

    fn features_at_point(&self, point: &Point2d, tolerance: f64) -> Result<Featureset<'_>, Error> {
        let point = *point;
        Ok(Box::new(
            self.features
                .iter()
                .filter(move |feature| {
                    feature
                        .geometries()
                        .iter()
                        .any(|geometry| geometry.contains_point(&point, tolerance))
                        || feature
                            .raster()
                            .is_some_and(|raster| raster.extent.contains(&point))
                })
                .cloned(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use meridian_types::Geometry;

    use super::*;

    fn datasource() -> MemoryDatasource {
        MemoryDatasource::from_features([
            Feature::new()
                .with_id(1)
                .with_attribute("name", "a")
                .with_attribute("size", 3)
                .with_geometry(Geometry::point(1.0, 1.0)),
            Feature::new()
                .with_id(2)
                .with_attribute("name", "b")
                .with_geometry(Geometry::polygon(&[&[
                    (10.0, 10.0),
                    (20.0, 10.0),
                    (20.0, 20.0),
                    (10.0, 20.0),
                ]])),
        ])
    }

    #[test]
    fn query_filters_by_bbox_and_properties() {
        let ds = datasource();
        assert_eq!(ds.envelope(), BoundingBox::new(1.0, 1.0, 20.0, 20.0));

        let query = Query::new(BoundingBox::new(0.0, 0.0, 5.0, 5.0), (1.0, 1.0), 1.0)
            .with_property_name("name");
        let features: Vec<Feature> = ds.features(&query).unwrap().collect();
        assert_eq!(features.len(), 1);
        assert_eq!(features[0].id(), 1);
        assert!(features[0].attribute("size").is_none());
        assert_eq!(features[0].attribute("name"), Some(&Value::from("a")));
    }

    #[test]
    fn features_at_point() {
        let ds = datasource();
        let ids: Vec<i64> = ds
            .features_at_point(&Point2d::new(15.0, 15.0), 0.0)
            .unwrap()
            .map(|f| f.id())
            .collect();
        assert_eq!(ids, vec![2]);
    }

    #[test]
    fn descriptor_lists_fields() {
        let descriptor = datasource().descriptor();
        assert_eq!(
            descriptor.fields,
            vec![
                ("name".to_string(), FieldType::String),
                ("size".to_string(), FieldType::Integer)
            ]
        );
    }
}
