//! Meridian is a rule based cartographic renderer. A map is described by styles made of rules and
//! symbolizers, and by layers that pull features from pluggable datasources. The renderer reprojects
//! the features into the map's coordinate system and draws them into a pixel canvas.
//!
//! # Quick start
//!
//! ```no_run
//! use meridian::config::{load_map, LoadOptions};
//! use meridian::{render_to_image, Context, Map};
//!
//! let context = Context::with_system_fonts();
//! let mut map = Map::new(800, 600);
//! load_map(&mut map, "style.xml", &context, &LoadOptions::default()).unwrap();
//! map.zoom_all().unwrap();
//!
//! let image = render_to_image(&map, &context).unwrap();
//! image.save_png("map.png").unwrap();
//! ```
//!
//! # Main components
//!
//! * [`Map`] holds the render configuration (size, extent, background), the named [`Style`]s and
//!   an ordered list of [`Layer`]s.
//! * A [`Style`] is an ordered list of [`Rule`]s. Every rule has an optional filter
//!   [`expression`], a scale range and a list of [`symbolizers`](style::Symbolizer). All rules
//!   that match a feature apply to it; else-rules apply only when no ordinary rule does.
//! * Layers get their features from a [`Datasource`](datasource::Datasource), created by the
//!   plugins of a [`DatasourceRegistry`](datasource::DatasourceRegistry) from a string parameter
//!   map.
//! * [`Context`] bundles the resources shared between maps: the plugin registry, the named style
//!   cache, fonts and decoded images. Create one at startup and pass it to the loader and the
//!   renderer.
//! * The [`config`] module reads and writes maps as XML documents.
//! * The [`render`] module draws maps into a [`Canvas`](render::Canvas).

#![warn(clippy::unwrap_used)]
#![warn(missing_docs)]

pub mod cache;
mod color;
pub mod config;
mod context;
pub mod datasource;
pub mod decoded_image;
pub mod error;
pub mod expression;
pub mod feature;
pub mod font;
pub mod map;
pub mod render;
pub mod style;
pub mod transform;

pub use color::Color;
pub use context::Context;
pub use error::{Error, ErrorKind};
pub use feature::Feature;
pub use map::{Layer, Map};
pub use render::{render_to_image, Renderer};
pub use style::{Rule, Style, Symbolizer};

// Reexport meridian_types
pub use meridian_types;
