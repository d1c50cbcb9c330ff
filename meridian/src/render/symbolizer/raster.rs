use image::{Rgba, RgbaImage};

use crate::decoded_image::DecodedImage;
use crate::feature::{Feature, Raster, RasterData};
use crate::render::canvas::ImagePaint;
use crate::render::symbolizer::SymbolizerContext;
use crate::style::{RasterColorizer, RasterSymbolizer};

/// Pixels of the raster. Sample bands are colored by the colorizer, or stretched to gray levels
/// between the smallest and the largest sample if there is none.
pub(crate) fn raster_image(raster: &Raster, colorizer: Option<&RasterColorizer>) -> DecodedImage {
    let values = match &raster.data {
        RasterData::Rgba(image) => return DecodedImage::from_shared(image.clone()),
        RasterData::Band(values) => values,
    };

    let image = match colorizer {
        Some(colorizer) => RgbaImage::from_fn(raster.width, raster.height, |x, y| {
            let color = raster
                .sample(x, y)
                .map(|value| colorizer.get_color(value))
                .unwrap_or(crate::Color::TRANSPARENT);
            Rgba(color.to_u8_array())
        }),
        None => {
            let (min, max) = values
                .iter()
                .filter(|v| v.is_finite())
                .fold((f32::INFINITY, f32::NEG_INFINITY), |(min, max), v| (min.min(*v), max.max(*v)));
            let range = if max > min { max - min } else { 1.0 };
            RgbaImage::from_fn(raster.width, raster.height, |x, y| match raster.sample(x, y) {
                Some(value) if value.is_finite() => {
                    let level = (((value - min) / range) * 255.0).clamp(0.0, 255.0) as u8;
                    Rgba([level, level, level, 255])
                }
                _ => Rgba([0, 0, 0, 0]),
            })
        }
    };

    DecodedImage::from_rgba(image)
}

/// Stretches the raster of the feature over the pixel box of its extent.
pub(super) fn render(symbolizer: &RasterSymbolizer, feature: &Feature, ctx: &mut SymbolizerContext<'_>) {
    let Some(raster) = feature.raster() else {
        return;
    };
    let Some(dest) = ctx.transform.box_to_pixels(&raster.extent) else {
        log::debug!("Extent of raster feature {} can't be projected, skipping", feature.id());
        return;
    };

    let image = raster_image(raster, symbolizer.colorizer.as_ref());
    let paint = ImagePaint {
        opacity: symbolizer.opacity,
        scaling: symbolizer.scaling,
        mode: symbolizer.mode,
    };
    ctx.canvas.draw_image_scaled(&image, &dest, &paint);
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use meridian_types::BoundingBox;

    use super::*;
    use crate::style::ColorBand;
    use crate::Color;

    fn band(values: Vec<f32>) -> Raster {
        Raster {
            extent: BoundingBox::new(0.0, 0.0, 2.0, 1.0),
            width: 2,
            height: 1,
            data: RasterData::Band(Arc::new(values)),
        }
    }

    #[test]
    fn colorized_bands() {
        let colorizer = RasterColorizer::new()
            .with_band(ColorBand::new(0.0, Color::BLUE))
            .with_band(ColorBand::new(10.0, Color::RED).with_max_value(20.0));
        let image = raster_image(&band(vec![5.0, 15.0]), Some(&colorizer));
        assert_eq!(image.pixel(0, 0).0, Color::BLUE.to_u8_array());
        assert_eq!(image.pixel(1, 0).0, Color::RED.to_u8_array());
    }

    #[test]
    fn grayscale_without_colorizer() {
        let image = raster_image(&band(vec![0.0, 4.0]), None);
        assert_eq!(image.pixel(0, 0).0, [0, 0, 0, 255]);
        assert_eq!(image.pixel(1, 0).0, [255, 255, 255, 255]);
    }
}
