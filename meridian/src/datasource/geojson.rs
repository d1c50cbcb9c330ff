use ::geojson::{GeoJson, JsonValue};
use meridian_types::{BoundingBox, Geometry, GeometryKind, Point2d};

use crate::datasource::{
    file_param, Datasource, DatasourcePlugin, DatasourceType, Featureset, LayerDescriptor,
    MemoryDatasource, Parameters, Query,
};
use crate::error::Error;
use crate::expression::Value;
use crate::feature::Feature;

/// Plugin creating [`GeoJsonDatasource`]s. Its name is `geojson`.
#[derive(Debug, Default)]
pub struct GeoJsonPlugin;

impl DatasourcePlugin for GeoJsonPlugin {
    fn name(&self) -> &str {
        "geojson"
    }

    fn datasource_type(&self) -> DatasourceType {
        DatasourceType::Vector
    }

    fn create(&self, params: &Parameters) -> Result<Box<dyn Datasource>, Error> {
        Ok(Box::new(GeoJsonDatasource::new(params.clone())?))
    }
}

/// Datasource reading a GeoJSON document.
///
/// Parameters:
/// * `file`: path of the document, resolved against `base` if that is set, or
/// * `inline`: the document itself.
#[derive(Debug)]
pub struct GeoJsonDatasource {
    params: Parameters,
    name: String,
    inner: MemoryDatasource,
}

impl GeoJsonDatasource {
    /// Reads the document named by the parameters.
    pub fn new(params: Parameters) -> Result<Self, Error> {
        let (name, text) = match params.get("inline") {
            Some(inline) => ("inline".to_string(), inline.clone()),
            None => {
                let path = file_param(&params)?;
                let text = std::fs::read_to_string(&path).map_err(|err| {
                    Error::datasource(format!("failed to read '{}': {err}", path.display()))
                })?;
                (path.display().to_string(), text)
            }
        };

        let document: GeoJson = text
            .parse()
            .map_err(|err| Error::datasource(format!("failed to parse GeoJSON '{name}': {err}")))?;

        let features = convert_document(document)?;
        log::debug!("Loaded {} features from GeoJSON '{name}'", features.len());

        Ok(Self {
            params,
            name,
            inner: MemoryDatasource::from_features(features),
        })
    }
}

impl Datasource for GeoJsonDatasource {
    fn datasource_type(&self) -> DatasourceType {
        DatasourceType::Vector
    }

    fn params(&self) -> &Parameters {
        &self.params
    }

    fn envelope(&self) -> BoundingBox {
        self.inner.envelope()
    }

    fn descriptor(&self) -> LayerDescriptor {
        LayerDescriptor {
            name: self.name.clone(),
            ..self.inner.descriptor()
        }
    }

    fn features(&self, query: &Query) -> Result<Featureset<'_>, Error> {
        self.inner.features(query)
    }

    fn features_at_point(&self, point: &Point2d, tolerance: f64) -> Result<Featureset<'_>, Error> {
        self.inner.features_at_point(point, tolerance)
    }
}

fn convert_document(document: GeoJson) -> Result<Vec<Feature>, Error> {
    let features = match document {
        GeoJson::FeatureCollection(collection) => collection.features,
        GeoJson::Feature(feature) => vec![feature],
        GeoJson::Geometry(geometry) => vec![::geojson::Feature {
            bbox: None,
            geometry: Some(geometry),
            id: None,
            properties: None,
            foreign_members: None,
        }],
    };

    features
        .into_iter()
        .enumerate()
        .map(|(index, feature)| convert_feature(index, feature))
        .collect()
}

fn convert_feature(index: usize, source: ::geojson::Feature) -> Result<Feature, Error> {
    let id = match &source.id {
        Some(::geojson::feature::Id::Number(number)) => number.as_i64(),
        _ => None,
    }
    .unwrap_or(index as i64 + 1);

    let mut feature = Feature::new().with_id(id);
    for (name, value) in source.properties.into_iter().flatten() {
        feature.set_attribute(name, convert_value(value));
    }

    if let Some(geometry) = source.geometry {
        convert_geometry(&geometry.value, &mut feature)
            .map_err(|err| err.with_context(format!("in feature {id}")))?;
    }

    Ok(feature)
}

fn convert_value(value: JsonValue) -> Value {
    match value {
        JsonValue::Null => Value::Null,
        JsonValue::Bool(v) => Value::Bool(v),
        JsonValue::Number(n) => match n.as_i64() {
            Some(v) => Value::Integer(v),
            None => n.as_f64().map(Value::Float).unwrap_or_default(),
        },
        JsonValue::String(v) => Value::String(v),
        other => Value::String(other.to_string()),
    }
}

fn position(position: &[f64]) -> Result<(f64, f64), Error> {
    match position {
        [x, y, ..] => Ok((*x, *y)),
        _ => Err(Error::datasource("position must have at least two coordinates")),
    }
}

fn positions(list: &[Vec<f64>]) -> Result<Vec<(f64, f64)>, Error> {
    list.iter().map(|p| position(p)).collect()
}

fn polygon(rings: &[Vec<Vec<f64>>]) -> Result<Geometry, Error> {
    let rings = rings
        .iter()
        .map(|ring| positions(ring))
        .collect::<Result<Vec<_>, _>>()?;
    let rings: Vec<&[(f64, f64)]> = rings.iter().map(Vec::as_slice).collect();
    Ok(Geometry::polygon(&rings))
}

fn convert_geometry(value: &::geojson::Value, feature: &mut Feature) -> Result<(), Error> {
    use ::geojson::Value as G;

    match value {
        G::Point(p) => {
            let (x, y) = position(p)?;
            feature.add_geometry(Geometry::point(x, y));
        }
        G::MultiPoint(points) => {
            let mut geometry = Geometry::new(GeometryKind::Point);
            for (x, y) in positions(points)? {
                geometry.move_to(x, y);
            }
            feature.add_geometry(geometry);
        }
        G::LineString(line) => feature.add_geometry(Geometry::line_string(&positions(line)?)),
        G::MultiLineString(lines) => {
            for line in lines {
                feature.add_geometry(Geometry::line_string(&positions(line)?));
            }
        }
        G::Polygon(rings) => feature.add_geometry(polygon(rings)?),
        G::MultiPolygon(polygons) => {
            for rings in polygons {
                feature.add_geometry(polygon(rings)?);
            }
        }
        G::GeometryCollection(geometries) => {
            for geometry in geometries {
                convert_geometry(&geometry.value, feature)?;
            }
        }
    }

    Ok(())
}
