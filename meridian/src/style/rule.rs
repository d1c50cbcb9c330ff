use std::collections::BTreeSet;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::expression::Expression;
use crate::feature::Feature;
use crate::style::symbolizer::Symbolizer;

/// Scale range and optional filter gating a list of symbolizers.
///
/// A rule applies at scale denominators in `[min_scale, max_scale)`. Among the rules of a style, an
/// else-rule applies only to features that no regular rule of the style matched.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Rule {
    /// Name of the rule.
    pub name: String,
    /// Human readable title.
    pub title: String,
    /// Feature filter. A rule without a filter matches every feature.
    pub filter: Option<Expression>,
    /// Whether this is an else-rule.
    pub is_else: bool,
    min_scale: f64,
    max_scale: f64,
    /// Symbolizers applied to matching features, in order.
    pub symbolizers: Vec<Symbolizer>,
}

impl Default for Rule {
    fn default() -> Self {
        Self {
            name: String::new(),
            title: String::new(),
            filter: None,
            is_else: false,
            min_scale: 0.0,
            max_scale: f64::INFINITY,
            symbolizers: Vec::new(),
        }
    }
}

impl Rule {
    /// Creates a rule without a filter that applies at all scales.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Sets the filter.
    pub fn with_filter(mut self, filter: Expression) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Turns the rule into an else-rule.
    pub fn with_else(mut self) -> Self {
        self.is_else = true;
        self
    }

    /// Sets the scale range.
    ///
    /// Fails if `min_scale > max_scale`.
    pub fn with_scale_range(mut self, min_scale: f64, max_scale: f64) -> Result<Self, Error> {
        self.set_scale_range(min_scale, max_scale)?;
        Ok(self)
    }

    /// Sets the scale range.
    ///
    /// Fails if `min_scale > max_scale`.
    pub fn set_scale_range(&mut self, min_scale: f64, max_scale: f64) -> Result<(), Error> {
        if min_scale.is_nan() || max_scale.is_nan() || min_scale > max_scale {
            return Err(Error::config(format!(
                "invalid scale range: minimum scale denominator {min_scale} is greater than maximum {max_scale}"
            )));
        }

        self.min_scale = min_scale;
        self.max_scale = max_scale;
        Ok(())
    }

    /// Appends a symbolizer.
    pub fn with_symbolizer(mut self, symbolizer: impl Into<Symbolizer>) -> Self {
        self.symbolizers.push(symbolizer.into());
        self
    }

    /// Minimum scale denominator (inclusive).
    pub fn min_scale(&self) -> f64 {
        self.min_scale
    }

    /// Maximum scale denominator (exclusive).
    pub fn max_scale(&self) -> f64 {
        self.max_scale
    }

    /// Returns true if the rule applies at the scale denominator.
    pub fn active(&self, scale_denominator: f64) -> bool {
        scale_denominator >= self.min_scale && scale_denominator < self.max_scale
    }

    /// Returns true if the filter accepts the feature. Else-rules are not special-cased here.
    pub fn matches(&self, feature: &Feature) -> bool {
        self.filter
            .as_ref()
            .map_or(true, |filter| filter.evaluate_bool(feature))
    }

    /// Names of the attributes read by the filter and the symbolizers.
    pub fn attribute_names(&self) -> BTreeSet<String> {
        let mut names = self
            .filter
            .as_ref()
            .map(Expression::attribute_names)
            .unwrap_or_default();
        for symbolizer in &self.symbolizers {
            names.extend(symbolizer.attribute_names());
        }

        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scale_range_is_half_open() {
        let rule = Rule::new("a").with_scale_range(1000.0, 5000.0).unwrap();
        assert!(!rule.active(999.0));
        assert!(rule.active(1000.0));
        assert!(rule.active(4999.0));
        assert!(!rule.active(5000.0));

        assert!(Rule::new("b").active(f64::MAX));
    }

    #[test]
    fn invalid_scale_range() {
        assert!(Rule::new("a").with_scale_range(10.0, 1.0).is_err());
        assert!(Rule::new("a").with_scale_range(10.0, 10.0).is_ok());
    }

    #[test]
    fn filters() {
        let rule = Rule::new("roads").with_filter(Expression::parse("[kind] = 'road'").unwrap());
        assert!(rule.matches(&Feature::new().with_attribute("kind", "road")));
        assert!(!rule.matches(&Feature::new().with_attribute("kind", "river")));
        assert!(Rule::new("all").matches(&Feature::new()));
    }
}
