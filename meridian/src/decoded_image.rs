//! Images loaded for symbolizers: icons, patterns, shields and map backgrounds.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use ahash::HashMap;
use image::{Rgba, RgbaImage};
use parking_lot::Mutex;

use crate::error::Error;

/// An image that has been loaded into memory, in RGBA.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    image: Arc<RgbaImage>,
}

impl DecodedImage {
    /// Decode an image from a byte slice.
    ///
    /// Attempts to guess the format of the image from the data. Non-RGBA images
    /// will be converted to RGBA.
    pub fn new(bytes: &[u8]) -> Result<Self, Error> {
        let decoded = image::load_from_memory(bytes)?;
        Ok(Self::from_rgba(decoded.to_rgba8()))
    }

    /// Loads the image file.
    pub fn load(path: &Path) -> Result<Self, Error> {
        let decoded = image::open(path)
            .map_err(|err| Error::resource(path.display().to_string(), err.to_string()))?;
        Ok(Self::from_rgba(decoded.to_rgba8()))
    }

    /// Wraps an RGBA buffer.
    pub fn from_rgba(image: RgbaImage) -> Self {
        Self {
            image: Arc::new(image),
        }
    }

    /// Wraps a shared RGBA buffer without copying it.
    pub fn from_shared(image: Arc<RgbaImage>) -> Self {
        Self { image }
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Pixel at the position, transparent outside of the image.
    pub fn pixel(&self, x: i64, y: i64) -> Rgba<u8> {
        if x < 0 || y < 0 || x >= self.width() as i64 || y >= self.height() as i64 {
            return Rgba([0, 0, 0, 0]);
        }
        *self.image.get_pixel(x as u32, y as u32)
    }

    /// Pixel data.
    pub fn as_rgba(&self) -> &RgbaImage {
        &self.image
    }
}

/// Cache of decoded images by path.
///
/// Only successfully loaded images are kept, so a file that appears later is picked up by the next
/// request.
#[derive(Debug, Default)]
pub struct ImageCache {
    images: Mutex<HashMap<PathBuf, DecodedImage>>,
}

impl ImageCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the image at the path, loading it on the first request.
    pub fn get(&self, path: &Path) -> Result<DecodedImage, Error> {
        if let Some(image) = self.images.lock().get(path) {
            return Ok(image.clone());
        }

        let image = DecodedImage::load(path)?;
        log::debug!(
            "Loaded image '{}' of {}x{} pixels",
            path.display(),
            image.width(),
            image.height()
        );

        self.images
            .lock()
            .insert(path.to_path_buf(), image.clone());
        Ok(image)
    }

    /// Number of cached images.
    pub fn len(&self) -> usize {
        self.images.lock().len()
    }

    /// Returns true if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.images.lock().is_empty()
    }

    /// Drops every cached image.
    pub fn clear(&self) {
        self.images.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn caches_loaded_images() {
        let path = std::env::temp_dir().join(format!("meridian-image-{}.png", std::process::id()));
        RgbaImage::from_pixel(3, 2, Rgba([10, 20, 30, 255]))
            .save(&path)
            .unwrap();

        let cache = ImageCache::new();
        let image = cache.get(&path).unwrap();
        assert_eq!((image.width(), image.height()), (3, 2));
        assert_eq!(image.pixel(2, 1), Rgba([10, 20, 30, 255]));
        assert_eq!(image.pixel(3, 0), Rgba([0, 0, 0, 0]));
        assert_eq!(cache.len(), 1);

        cache.get(&path).unwrap();
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn missing_file_is_a_resource_error() {
        let cache = ImageCache::new();
        let err = cache.get(Path::new("/no/such/image.png")).unwrap_err();
        assert_matches!(err.kind(), ErrorKind::ResourceLoad { .. });
        assert!(cache.is_empty());
    }
}
