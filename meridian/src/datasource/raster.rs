use std::sync::Arc;

use image::DynamicImage;
use meridian_types::{BoundingBox, Point2d};

use crate::datasource::{
    file_param, numeric_param, Datasource, DatasourcePlugin, DatasourceType, Featureset,
    LayerDescriptor, Parameters, Query,
};
use crate::error::Error;
use crate::feature::{Feature, Raster, RasterData};

/// Plugin creating [`RasterDatasource`]s. Its name is `raster`.
#[derive(Debug, Default)]
pub struct RasterPlugin;

impl DatasourcePlugin for RasterPlugin {
    fn name(&self) -> &str {
        "raster"
    }

    fn datasource_type(&self) -> DatasourceType {
        DatasourceType::Raster
    }

    fn create(&self, params: &Parameters) -> Result<Box<dyn Datasource>, Error> {
        Ok(Box::new(RasterDatasource::new(params.clone())?))
    }
}

/// Datasource providing a single georeferenced image.
///
/// Parameters:
/// * `file`: image path, resolved against `base` if that is set;
/// * `lox`, `loy`, `hix`, `hiy`: extent of the image in the layer coordinates;
/// * `band`: when set to `1`, the image is read as a single band of gray values to be classified
///   by a raster colorizer instead of being drawn as is.
#[derive(Debug)]
pub struct RasterDatasource {
    params: Parameters,
    raster: Raster,
}

impl RasterDatasource {
    /// Loads the image named by the parameters.
    pub fn new(params: Parameters) -> Result<Self, Error> {
        let path = file_param(&params)?;

        let mut corners = [0.0; 4];
        for (value, name) in corners.iter_mut().zip(["lox", "loy", "hix", "hiy"]) {
            *value = numeric_param(&params, name)?
                .ok_or_else(|| Error::datasource(format!("missing parameter '{name}'")))?;
        }
        let extent = BoundingBox::new(corners[0], corners[1], corners[2], corners[3]);

        let image = image::open(&path).map_err(|err| {
            Error::datasource(format!("failed to open raster '{}': {err}", path.display()))
        })?;
        let (width, height) = (image.width(), image.height());

        let data = match params.get("band").map(String::as_str) {
            None | Some("0") => RasterData::Rgba(Arc::new(image.to_rgba8())),
            Some("1") => RasterData::Band(Arc::new(band_values(&image))),
            Some(other) => {
                return Err(Error::datasource(format!(
                    "unsupported band '{other}', only band 1 can be read"
                )))
            }
        };

        log::debug!(
            "Loaded raster '{}' of {width}x{height} pixels",
            path.display()
        );

        Ok(Self {
            params,
            raster: Raster {
                extent,
                width,
                height,
                data,
            },
        })
    }
}

fn band_values(image: &DynamicImage) -> Vec<f32> {
    match image {
        DynamicImage::ImageLuma16(buffer) => buffer.pixels().map(|p| p.0[0] as f32).collect(),
        other => other.to_luma8().pixels().map(|p| p.0[0] as f32).collect(),
    }
}

impl Datasource for RasterDatasource {
    fn datasource_type(&self) -> DatasourceType {
        DatasourceType::Raster
    }

    fn params(&self) -> &Parameters {
        &self.params
    }

    fn envelope(&self) -> BoundingBox {
        self.raster.extent
    }

    fn descriptor(&self) -> LayerDescriptor {
        LayerDescriptor {
            name: self.params.get("file").cloned().unwrap_or_default(),
            encoding: "utf-8".into(),
            fields: Vec::new(),
        }
    }

    fn features(&self, query: &Query) -> Result<Featureset<'_>, Error> {
        let feature = query
            .bbox()
            .intersects(&self.raster.extent)
            .then(|| Feature::new().with_id(1).with_raster(self.raster.clone()));
        Ok(Box::new(feature.into_iter()))
    }

    fn features_at_point(&self, point: &Point2d, _tolerance: f64) -> Result<Featureset<'_>, Error> {
        let feature = self
            .raster
            .extent
            .contains(point)
            .then(|| Feature::new().with_id(1).with_raster(self.raster.clone()));
        Ok(Box::new(feature.into_iter()))
    }
}

#[cfg(test)]
mod tests {
    use image::{Rgba, RgbaImage};

    use super::*;

    fn write_image(name: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("meridian-raster-{name}-{}.png", std::process::id()));
        let mut image = RgbaImage::new(4, 2);
        for (x, _, pixel) in image.enumerate_pixels_mut() {
            *pixel = Rgba([x as u8 * 60, 0, 0, 255]);
        }
        image.save(&path).unwrap();
        path
    }

    fn params(path: &std::path::Path) -> Parameters {
        Parameters::from([
            ("type".to_string(), "raster".to_string()),
            ("file".to_string(), path.display().to_string()),
            ("lox".to_string(), "0".to_string()),
            ("loy".to_string(), "0".to_string()),
            ("hix".to_string(), "40".to_string()),
            ("hiy".to_string(), "20".to_string()),
        ])
    }

    #[test]
    fn loads_color_raster() {
        let path = write_image("color");
        let ds = RasterDatasource::new(params(&path)).unwrap();
        assert_eq!(ds.envelope(), BoundingBox::new(0.0, 0.0, 40.0, 20.0));

        let query = Query::new(BoundingBox::new(30.0, 10.0, 50.0, 50.0), (1.0, 1.0), 1.0);
        let features: Vec<Feature> = ds.features(&query).unwrap().collect();
        assert_eq!(features.len(), 1);
        let raster = features[0].raster().unwrap();
        assert_eq!((raster.width, raster.height), (4, 2));

        let outside = Query::new(BoundingBox::new(50.0, 50.0, 60.0, 60.0), (1.0, 1.0), 1.0);
        assert_eq!(ds.features(&outside).unwrap().count(), 0);
    }

    #[test]
    fn loads_single_band() {
        let path = write_image("band");
        let mut params = params(&path);
        params.insert("band".into(), "1".into());
        let ds = RasterDatasource::new(params).unwrap();

        let feature = ds
            .features_at_point(&Point2d::new(5.0, 5.0), 0.0)
            .unwrap()
            .next()
            .unwrap();
        let raster = feature.raster().unwrap();
        assert_eq!(raster.sample(0, 0), Some(0.0));
        assert!(raster.sample(3, 0).unwrap() > 0.0);
    }

    #[test]
    fn missing_extent() {
        let path = write_image("extent");
        let mut params = params(&path);
        params.remove("hiy");
        assert!(RasterDatasource::new(params).is_err());
    }
}
