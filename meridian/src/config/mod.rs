//! Map documents.
//!
//! A map document is an XML file with a `Map` root element describing styles, layers, font sets
//! and meta writers:
//!
//! ```xml
//! <Map srs="+proj=longlat +datum=WGS84" background-color="#b5d0d0">
//!   <Style name="water">
//!     <Rule>
//!       <Filter>[natural] = 'water'</Filter>
//!       <PolygonSymbolizer fill="steelblue"/>
//!     </Rule>
//!   </Style>
//!   <Layer name="lakes">
//!     <StyleName>water</StyleName>
//!     <Datasource>
//!       <Parameter name="type">geojson</Parameter>
//!       <Parameter name="file">lakes.geojson</Parameter>
//!     </Datasource>
//!   </Layer>
//! </Map>
//! ```
//!
//! The document is first read into a [`ConfigNode`] tree, which is then mapped into a
//! [`Map`](crate::map::Map) by [`load_map`]. [`save_map`] does the reverse.

mod load;
mod node;
mod save;

use std::path::PathBuf;

pub use load::{load_map, load_map_string, map_from_node};
pub use node::ConfigNode;
pub use save::{map_to_node, save_map, save_map_to_string};

/// Options of [`load_map`].
#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// Fail on problems that are only logged otherwise: missing fonts and images, unknown file
    /// sources, invalid transforms, references to missing meta writers and more than one
    /// else-rule in a style.
    pub strict: bool,
    /// Resolve relative file paths against [`LoadOptions::base_path`]. A `paths_from_xml`
    /// attribute of the document overrides this.
    pub paths_from_xml: bool,
    /// Log layers whose datasource can't be created and load them without a datasource, instead of
    /// failing.
    pub skip_failed_datasources: bool,
    /// Directory relative file paths are resolved against. [`load_map`] uses the directory of the
    /// document if this is not set.
    pub base_path: Option<PathBuf>,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            strict: false,
            paths_from_xml: true,
            skip_failed_datasources: false,
            base_path: None,
        }
    }
}

impl LoadOptions {
    /// Sets [`LoadOptions::strict`].
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Sets [`LoadOptions::paths_from_xml`].
    pub fn with_paths_from_xml(mut self, paths_from_xml: bool) -> Self {
        self.paths_from_xml = paths_from_xml;
        self
    }

    /// Sets [`LoadOptions::skip_failed_datasources`].
    pub fn with_skip_failed_datasources(mut self, skip: bool) -> Self {
        self.skip_failed_datasources = skip;
        self
    }

    /// Sets [`LoadOptions::base_path`].
    pub fn with_base_path(mut self, base_path: impl Into<PathBuf>) -> Self {
        self.base_path = Some(base_path.into());
        self
    }
}

/// Options of [`save_map`].
#[derive(Debug, Clone, Default)]
pub struct SaveOptions {
    /// Write every attribute, including those equal to their default value.
    pub explicit_defaults: bool,
}

impl SaveOptions {
    /// Sets [`SaveOptions::explicit_defaults`].
    pub fn with_explicit_defaults(mut self, explicit_defaults: bool) -> Self {
        self.explicit_defaults = explicit_defaults;
        self
    }
}
