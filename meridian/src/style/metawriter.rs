#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Writer of auxiliary per-feature output, referenced by name from symbolizers.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum MetaWriter {
    /// Writes the pixel boxes and properties of rendered features as a GeoJSON feature collection.
    Json {
        /// Output file.
        file: String,
        /// Comma separated attribute names written when a symbolizer doesn't set `meta-output`.
        default_output: Option<String>,
        /// Whether a file is written even if nothing was recorded.
        output_empty: bool,
    },
}

impl MetaWriter {
    /// Type name as written in documents.
    pub fn type_name(&self) -> &'static str {
        match self {
            MetaWriter::Json { .. } => "json",
        }
    }

    /// Attribute names recorded for a symbolizer with the given `meta-output` override.
    pub fn output_properties(&self, meta_output: Option<&str>) -> Vec<String> {
        let list = match self {
            MetaWriter::Json { default_output, .. } => meta_output.or(default_output.as_deref()),
        };

        list.map(|list| {
            list.split(',')
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_properties_fall_back_to_default() {
        let writer = MetaWriter::Json {
            file: "meta.json".into(),
            default_output: Some("name, kind".into()),
            output_empty: true,
        };

        assert_eq!(writer.output_properties(None), vec!["name", "kind"]);
        assert_eq!(writer.output_properties(Some("id")), vec!["id"]);
    }
}
