use std::collections::BTreeMap;
use std::path::Path;

use meridian_types::BoundingBox;
use serde_json::{json, Map as JsonMap, Value as JsonValue};

use crate::error::{Error, ResultExt};
use crate::expression::Value;
use crate::feature::Feature;
use crate::map::Map;
use crate::style::{MetaWriter, SymbolizerBase};

#[derive(Debug, Clone)]
struct MetaEntry {
    bbox: BoundingBox,
    properties: JsonMap<String, JsonValue>,
}

/// Collects what symbolizers with a meta writer draw during a render pass.
#[derive(Debug, Default)]
pub struct MetaRecorder {
    entries: BTreeMap<String, Vec<MetaEntry>>,
}

impl MetaRecorder {
    /// Creates an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the pixel box of a drawn feature if the symbolizer names a meta writer of the map.
    pub fn record(&mut self, map: &Map, base: &SymbolizerBase, feature: &Feature, bbox: BoundingBox) {
        let Some(name) = &base.meta_writer else {
            return;
        };
        let Some(writer) = map.find_metawriter(name) else {
            log::warn!("Meta writer '{name}' is not defined in the map");
            return;
        };

        let mut properties = JsonMap::new();
        for property in writer.output_properties(base.meta_output.as_deref()) {
            let value = feature
                .attribute(&property)
                .map(json_value)
                .unwrap_or(JsonValue::Null);
            properties.insert(property, value);
        }

        self.entries
            .entry(name.clone())
            .or_default()
            .push(MetaEntry { bbox, properties });
    }

    /// Number of entries recorded for the writer.
    pub fn count(&self, writer: &str) -> usize {
        self.entries.get(writer).map_or(0, Vec::len)
    }

    /// Output document of the writer, or `None` if nothing should be written.
    pub fn document(&self, name: &str, writer: &MetaWriter) -> Option<JsonValue> {
        let entries = self.entries.get(name).map(Vec::as_slice).unwrap_or_default();
        match writer {
            MetaWriter::Json { output_empty, .. } => {
                if entries.is_empty() && !output_empty {
                    return None;
                }

                let features: Vec<JsonValue> = entries
                    .iter()
                    .map(|entry| {
                        let b = entry.bbox;
                        json!({
                            "type": "Feature",
                            "geometry": {
                                "type": "Polygon",
                                "coordinates": [[
                                    [b.x_min(), b.y_min()],
                                    [b.x_max(), b.y_min()],
                                    [b.x_max(), b.y_max()],
                                    [b.x_min(), b.y_max()],
                                    [b.x_min(), b.y_min()],
                                ]],
                            },
                            "properties": entry.properties,
                        })
                    })
                    .collect();

                Some(json!({
                    "type": "FeatureCollection",
                    "features": features,
                }))
            }
        }
    }

    /// Writes the output of every meta writer of the map.
    pub fn write_all(&self, map: &Map) -> Result<(), Error> {
        for (name, writer) in map.metawriters() {
            let Some(document) = self.document(name, writer) else {
                log::debug!("Nothing recorded for meta writer '{name}'");
                continue;
            };

            let MetaWriter::Json { file, .. } = writer;
            let text = serde_json::to_string_pretty(&document)
                .map_err(|err| Error::config(err.to_string()))
                .with_context(|| format!("in meta writer '{name}'"))?;
            std::fs::write(Path::new(file), text)
                .with_context(|| format!("while writing meta writer '{name}' output to '{file}'"))?;
            log::debug!("Meta writer '{name}' wrote {} entries to '{file}'", self.count(name));
        }

        Ok(())
    }
}

fn json_value(value: &Value) -> JsonValue {
    match value {
        Value::Null => JsonValue::Null,
        Value::Bool(v) => JsonValue::Bool(*v),
        Value::Integer(v) => JsonValue::from(*v),
        Value::Float(v) => serde_json::Number::from_f64(*v)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null),
        Value::String(v) => JsonValue::String(v.clone()),
    }
}
