#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::color::Color;

keyword_enum! {
    /// Shape of the joint between two line segments.
    LineJoin {
        /// Sharp corner.
        Miter => "miter",
        /// Rounded corner.
        Round => "round",
        /// Cut-off corner.
        Bevel => "bevel",
    }
}

keyword_enum! {
    /// Shape of line ends.
    LineCap {
        /// The line ends exactly at the end point.
        Butt => "butt",
        /// The line is extended by half its width with a square end.
        Square => "square",
        /// The line is extended by half its width with a round end.
        Round => "round",
    }
}

/// Line stroke parameters.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Stroke {
    /// Line color.
    pub color: Color,
    /// Width of the line in pixels.
    pub width: f64,
    /// Opacity in `0..=1`, multiplied with the alpha of the color.
    pub opacity: f64,
    /// Joint shape.
    pub line_join: LineJoin,
    /// End shape.
    pub line_cap: LineCap,
    /// Pairs of dash and gap lengths in pixels. Empty for a solid line.
    pub dashes: Vec<(f64, f64)>,
    /// Offset into the dash pattern at the start of the line.
    pub dash_offset: f64,
}

impl Default for Stroke {
    fn default() -> Self {
        Self {
            color: Color::BLACK,
            width: 1.0,
            opacity: 1.0,
            line_join: LineJoin::Miter,
            line_cap: LineCap::Butt,
            dashes: Vec::new(),
            dash_offset: 0.0,
        }
    }
}

impl Stroke {
    /// Solid stroke of the given color and width.
    pub fn new(color: Color, width: f64) -> Self {
        Self {
            color,
            width,
            ..Default::default()
        }
    }

    /// Sets the dash pattern from a flat list of dash and gap lengths.
    ///
    /// A list with an odd number of values is repeated once to make it even, so `5` becomes a
    /// `5,5` pattern. Returns `None` if any length is negative or all of them are zero.
    pub fn with_dash_array(mut self, values: &[f64]) -> Option<Self> {
        self.dashes = dash_pairs(values)?;
        Some(self)
    }

    /// Color with the stroke opacity applied.
    pub fn effective_color(&self) -> Color {
        self.color.with_opacity(self.opacity)
    }

    /// Dash pattern as a flat list, as written in documents.
    pub fn dash_array(&self) -> Vec<f64> {
        self.dashes.iter().flat_map(|(a, b)| [*a, *b]).collect()
    }
}

/// Converts a flat list of lengths into dash/gap pairs.
pub(crate) fn dash_pairs(values: &[f64]) -> Option<Vec<(f64, f64)>> {
    if values.is_empty() {
        return Some(Vec::new());
    }

    if values.iter().any(|v| *v < 0.0 || !v.is_finite()) || values.iter().all(|v| *v == 0.0) {
        return None;
    }

    let mut values = values.to_vec();
    if values.len() % 2 == 1 {
        values.extend_from_within(..);
    }

    Some(values.chunks(2).map(|pair| (pair[0], pair[1])).collect())
}
