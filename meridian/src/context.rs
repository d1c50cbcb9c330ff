//! Shared resources used while loading and rendering maps.

use crate::cache::StyleCache;
use crate::datasource::DatasourceRegistry;
use crate::decoded_image::ImageCache;
use crate::font::FontCatalog;

/// Resources shared between maps: datasource plugins, named styles, fonts and images.
///
/// Create one context at startup and pass it by reference to the loader and the renderer. Every
/// member guards itself with its own lock, so the context can be shared between threads rendering
/// different maps.
#[derive(Debug, Default)]
pub struct Context {
    /// Datasource plugins.
    pub registry: DatasourceRegistry,
    /// Styles shared by name.
    pub styles: StyleCache,
    /// Font faces.
    pub fonts: FontCatalog,
    /// Decoded images.
    pub images: ImageCache,
}

impl Context {
    /// Creates a context with the built-in datasource plugins active and no fonts loaded.
    pub fn new() -> Self {
        Self {
            registry: DatasourceRegistry::with_builtin_plugins(),
            ..Default::default()
        }
    }

    /// Creates a context with the built-in plugins and the fonts installed in the system.
    pub fn with_system_fonts() -> Self {
        let context = Self::new();
        context.fonts.load_system_fonts();
        context
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_plugins_are_active() {
        let context = Context::new();
        let names = context.registry.plugin_names();
        assert!(names.iter().any(|name| name == "raster"));
        assert!(context.styles.names().is_empty());
        assert!(context.images.is_empty());
    }
}
