use std::fmt::{Display, Formatter};
use std::path::PathBuf;

use lazy_static::lazy_static;
use regex::{Captures, Regex};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::feature::Feature;

lazy_static! {
    static ref PLACEHOLDER: Regex = Regex::new(r"\[([^\]]+)\]").expect("placeholder pattern is valid");
}

/// File path that may contain `[attribute]` placeholders, e.g. `icons/[kind].png`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(from = "String", into = "String"))]
pub struct PathExpression {
    template: String,
}

impl PathExpression {
    /// Creates a new path expression.
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    /// The path template as written.
    pub fn template(&self) -> &str {
        &self.template
    }

    /// Returns true if the path contains attribute placeholders.
    pub fn has_placeholders(&self) -> bool {
        PLACEHOLDER.is_match(&self.template)
    }

    /// Returns the path with every placeholder replaced by the attribute value of the feature.
    /// Missing attributes are replaced with an empty string.
    pub fn evaluate(&self, feature: &Feature) -> PathBuf {
        let path = PLACEHOLDER.replace_all(&self.template, |captures: &Captures| {
            feature
                .attribute(&captures[1])
                .map(|value| value.to_string())
                .unwrap_or_default()
        });

        PathBuf::from(path.into_owned())
    }

    /// Names of the attributes referenced by placeholders.
    pub fn attribute_names(&self) -> impl Iterator<Item = String> + '_ {
        PLACEHOLDER
            .captures_iter(&self.template)
            .map(|captures| captures[1].to_string())
    }
}

impl Display for PathExpression {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.template)
    }
}

impl From<String> for PathExpression {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for PathExpression {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<PathExpression> for String {
    fn from(value: PathExpression) -> Self {
        value.template
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_attributes() {
        let path = PathExpression::new("icons/[kind]-[size].png");
        let feature = Feature::new()
            .with_attribute("kind", "school")
            .with_attribute("size", 16);

        assert!(path.has_placeholders());
        assert_eq!(path.evaluate(&feature), PathBuf::from("icons/school-16.png"));
        assert_eq!(path.attribute_names().collect::<Vec<_>>(), vec!["kind", "size"]);
        assert_eq!(
            path.evaluate(&Feature::new()),
            PathBuf::from("icons/-.png")
        );
    }

    #[test]
    fn plain_paths() {
        let path = PathExpression::new("icons/school.png");
        assert!(!path.has_placeholders());
        assert_eq!(path.evaluate(&Feature::new()), PathBuf::from("icons/school.png"));
    }
}
