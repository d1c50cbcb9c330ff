//! Style model: styles, rules, symbolizers and their building blocks.

use std::collections::BTreeSet;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Declares a fieldless enum written in documents as one of a fixed set of keywords.
macro_rules! keyword_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $(
                $(#[$variant_meta:meta])*
                $variant:ident => $text:literal
            ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        pub enum $name {
            $(
                $(#[$variant_meta])*
                #[cfg_attr(feature = "serde", serde(rename = $text))]
                $variant,
            )+
        }

        impl $name {
            /// Keyword of the value.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = crate::error::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim() {
                    $($text => Ok($name::$variant),)+
                    other => Err(crate::error::Error::config(format!(
                        "invalid value '{}', expected one of: {}",
                        other,
                        [$($text),+].join(", ")
                    ))),
                }
            }
        }
    };
}

mod colorizer;
mod font_set;
mod metawriter;
mod rule;
mod stroke;
mod symbolizer;

pub use colorizer::{ColorBand, RasterColorizer};
pub use font_set::FontSet;
pub use metawriter::MetaWriter;
pub use rule::Rule;
pub(crate) use stroke::dash_pairs;
pub use stroke::{LineCap, LineJoin, Stroke};
pub use symbolizer::{
    AngleMode, BuildingSymbolizer, CompositeMode, FontRef, GlyphSymbolizer, HorizontalAlignment,
    JustifyAlignment, LabelPlacement, LinePatternSymbolizer, LineSymbolizer, MarkerPlacement,
    MarkerType, MarkersSymbolizer, PatternAlignment, PointSymbolizer, PolygonPatternSymbolizer,
    PolygonSymbolizer, RasterScaling, RasterSymbolizer, ShieldSymbolizer, Symbolizer,
    SymbolizerBase, TextProperties, TextSymbolizer, TextTransform, VerticalAlignment,
};

use crate::color::Color;
use crate::feature::Feature;

/// Ordered sequence of rules.
///
/// The order of rules is kept for saving, but rule matching considers every rule independently: all
/// matching rules apply, not only the first one.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Style {
    rules: Vec<Rule>,
}

impl Style {
    /// Creates an empty style.
    pub fn new() -> Self {
        Self::default()
    }

    /// The style used when a named style can't be found: a single red line.
    pub fn fallback() -> Self {
        Self::new().with_rule(Rule::new("").with_symbolizer(LineSymbolizer {
            stroke: Stroke::new(Color::RED, 1.0),
            base: SymbolizerBase::default(),
        }))
    }

    /// Appends a rule.
    pub fn add_rule(&mut self, rule: Rule) {
        self.rules.push(rule);
    }

    /// Builder version of [`Style::add_rule`].
    pub fn with_rule(mut self, rule: Rule) -> Self {
        self.add_rule(rule);
        self
    }

    /// All rules in document order.
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Rules whose scale range contains the scale denominator, in document order.
    pub fn applicable_rules(&self, scale_denominator: f64) -> Vec<&Rule> {
        self.rules
            .iter()
            .filter(|rule| rule.active(scale_denominator))
            .collect()
    }

    /// Rules that apply to the feature at the scale denominator, in document order.
    ///
    /// Every scale-eligible regular rule whose filter accepts the feature applies. Scale-eligible
    /// else-rules apply only if no regular rule did.
    pub fn matching_rules<'a>(&'a self, feature: &Feature, scale_denominator: f64) -> Vec<&'a Rule> {
        let active = self.applicable_rules(scale_denominator);
        let matched: Vec<&Rule> = active
            .iter()
            .copied()
            .filter(|rule| !rule.is_else && rule.matches(feature))
            .collect();

        if !matched.is_empty() {
            return matched;
        }

        active.into_iter().filter(|rule| rule.is_else).collect()
    }

    /// Number of else-rules.
    pub fn else_rule_count(&self) -> usize {
        self.rules.iter().filter(|rule| rule.is_else).count()
    }

    /// Names of the attributes read by any rule of the style.
    pub fn attribute_names(&self) -> BTreeSet<String> {
        self.rules
            .iter()
            .flat_map(|rule| rule.attribute_names())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::Expression;

    fn names(rules: Vec<&Rule>) -> Vec<&str> {
        rules.into_iter().map(|rule| rule.name.as_str()).collect()
    }

    #[test]
    fn scale_ranges_select_rules() {
        let style = Style::new()
            .with_rule(Rule::new("A").with_scale_range(0.0, 1000.0).unwrap())
            .with_rule(
                Rule::new("B")
                    .with_scale_range(1000.0, f64::INFINITY)
                    .unwrap(),
            );

        let feature = Feature::new();
        assert_eq!(names(style.matching_rules(&feature, 500.0)), vec!["A"]);
        assert_eq!(names(style.matching_rules(&feature, 1000.0)), vec!["B"]);
    }

    #[test]
    fn else_rule_only_without_matches() {
        let style = Style::new()
            .with_rule(
                Rule::new("A").with_filter(Expression::parse("[category] = 'road'").unwrap()),
            )
            .with_rule(Rule::new("B").with_else());

        let river = Feature::new().with_attribute("category", "river");
        let road = Feature::new().with_attribute("category", "road");
        assert_eq!(names(style.matching_rules(&river, 100.0)), vec!["B"]);
        assert_eq!(names(style.matching_rules(&road, 100.0)), vec!["A"]);
    }

    #[test]
    fn all_matching_rules_apply() {
        let style = Style::new()
            .with_rule(Rule::new("fill"))
            .with_rule(Rule::new("big").with_filter(Expression::parse("[area] > 10").unwrap()))
            .with_rule(Rule::new("outline"))
            .with_rule(Rule::new("else-1").with_else())
            .with_rule(Rule::new("else-2").with_else());

        let big = Feature::new().with_attribute("area", 20);
        assert_eq!(
            names(style.matching_rules(&big, 1.0)),
            vec!["fill", "big", "outline"]
        );

        let only_else = Style::new()
            .with_rule(Rule::new("never").with_filter(Expression::parse("false").unwrap()))
            .with_rule(Rule::new("else-1").with_else())
            .with_rule(Rule::new("else-2").with_else());
        assert_eq!(
            names(only_else.matching_rules(&big, 1.0)),
            vec!["else-1", "else-2"]
        );
        assert_eq!(only_else.else_rule_count(), 2);
    }

    #[test]
    fn else_rule_respects_scale() {
        let style = Style::new()
            .with_rule(Rule::new("never").with_filter(Expression::parse("false").unwrap()))
            .with_rule(Rule::new("else").with_else().with_scale_range(0.0, 10.0).unwrap());

        assert_eq!(names(style.matching_rules(&Feature::new(), 5.0)), vec!["else"]);
        assert!(style.matching_rules(&Feature::new(), 50.0).is_empty());
    }

    #[test]
    fn fallback_style_is_red_line() {
        let style = Style::fallback();
        assert_eq!(style.rules().len(), 1);
        match &style.rules()[0].symbolizers[..] {
            [Symbolizer::Line(line)] => assert_eq!(line.stroke.color, Color::RED),
            other => panic!("unexpected symbolizers: {other:?}"),
        }
    }
}
