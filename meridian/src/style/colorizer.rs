#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::color::Color;

/// Single band of a [`RasterColorizer`].
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ColorBand {
    /// Lowest sample value the band applies to.
    pub value: f32,
    /// Exclusive upper limit of the band, if any.
    pub max_value: Option<f32>,
    /// Color of the band.
    pub color: Color,
    /// Number of interpolated colors inserted between this band and the next one.
    pub midpoints: u32,
    /// Free-form label.
    pub label: Option<String>,
}

impl ColorBand {
    /// Creates a band without an upper limit or midpoints.
    pub fn new(value: f32, color: Color) -> Self {
        Self {
            value,
            max_value: None,
            color,
            midpoints: 0,
            label: None,
        }
    }

    /// Sets the exclusive upper limit.
    pub fn with_max_value(mut self, max_value: f32) -> Self {
        self.max_value = Some(max_value);
        self
    }

    /// Sets the number of midpoints.
    pub fn with_midpoints(mut self, midpoints: u32) -> Self {
        self.midpoints = midpoints;
        self
    }
}

/// Piecewise classification of raster samples into colors.
///
/// Bands are kept sorted by `value`. A sample takes the color of the band with the greatest value not
/// exceeding the sample. For the last band, the sample must either equal its value or be below its
/// `max_value`. Samples outside of all bands are transparent.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RasterColorizer {
    bands: Vec<ColorBand>,
}

impl RasterColorizer {
    /// Creates a colorizer without bands.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a band keeping the ascending order. Bands with equal values keep insertion order.
    pub fn add_band(&mut self, band: ColorBand) {
        let index = self.bands.partition_point(|b| b.value <= band.value);
        self.bands.insert(index, band);
    }

    /// Builder version of [`RasterColorizer::add_band`].
    pub fn with_band(mut self, band: ColorBand) -> Self {
        self.add_band(band);
        self
    }

    /// Bands in ascending order.
    pub fn bands(&self) -> &[ColorBand] {
        &self.bands
    }

    /// Color of the sample.
    pub fn get_color(&self, value: f32) -> Color {
        let index = self.bands.partition_point(|b| b.value <= value);
        if index == 0 || value.is_nan() {
            return Color::TRANSPARENT;
        }

        let band = &self.bands[index - 1];
        if let Some(max_value) = band.max_value {
            if value >= max_value && value != band.value {
                return Color::TRANSPARENT;
            }
        }

        let Some(next) = self.bands.get(index) else {
            return if value == band.value || band.max_value.is_some() {
                band.color
            } else {
                Color::TRANSPARENT
            };
        };

        if band.midpoints == 0 || next.value <= band.value {
            return band.color;
        }

        let steps = band.midpoints + 1;
        let position = (value - band.value) / (next.value - band.value);
        let step = ((position * steps as f32).floor() as u32).min(band.midpoints);

        band.color.lerp(&next.color, step as f64 / steps as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn colorizer() -> RasterColorizer {
        RasterColorizer::new()
            .with_band(ColorBand::new(10.0, Color::RED))
            .with_band(ColorBand::new(0.0, Color::BLUE))
            .with_band(ColorBand::new(20.0, Color::WHITE).with_max_value(30.0))
    }

    #[test]
    fn bands_are_sorted() {
        let values: Vec<f32> = colorizer().bands().iter().map(|b| b.value).collect();
        assert_eq!(values, vec![0.0, 10.0, 20.0]);
    }

    #[test]
    fn classification() {
        let colorizer = colorizer();
        assert_eq!(colorizer.get_color(-1.0), Color::TRANSPARENT);
        assert_eq!(colorizer.get_color(0.0), Color::BLUE);
        assert_eq!(colorizer.get_color(9.9), Color::BLUE);
        assert_eq!(colorizer.get_color(10.0), Color::RED);
        assert_eq!(colorizer.get_color(25.0), Color::WHITE);
        assert_eq!(colorizer.get_color(30.0), Color::TRANSPARENT);
    }

    #[test]
    fn last_band_without_max_value_matches_exactly() {
        let colorizer = RasterColorizer::new()
            .with_band(ColorBand::new(0.0, Color::BLUE))
            .with_band(ColorBand::new(10.0, Color::RED));
        assert_eq!(colorizer.get_color(10.0), Color::RED);
        assert_eq!(colorizer.get_color(10.5), Color::TRANSPARENT);
    }

    #[test]
    fn midpoints_interpolate_to_next_band() {
        let colorizer = RasterColorizer::new()
            .with_band(ColorBand::new(0.0, Color::rgb(0, 0, 0)).with_midpoints(1))
            .with_band(ColorBand::new(10.0, Color::rgb(200, 200, 200)));

        assert_eq!(colorizer.get_color(2.0), Color::rgb(0, 0, 0));
        assert_eq!(colorizer.get_color(6.0), Color::rgb(100, 100, 100));
        assert_eq!(colorizer.get_color(10.0), Color::rgb(200, 200, 200));
    }
}
