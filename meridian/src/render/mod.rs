//! Rendering of maps.
//!
//! [`Renderer`] walks the layers of a [`Map`](crate::map::Map) and draws their features into a
//! [`Canvas`]. [`ImageCanvas`] rasterizes into an RGBA image, [`RecordingCanvas`] only records the
//! draw calls.

mod canvas;
mod image_canvas;
mod metawriter;
mod placement;
mod renderer;
pub(crate) mod symbolizer;
pub(crate) mod text;

pub use canvas::{
    geometry_path, polygon_path, rect_path, Canvas, DrawCommand, FillPaint, ImagePaint,
    RecordingCanvas, StrokePaint,
};
pub use image_canvas::ImageCanvas;
pub use metawriter::MetaRecorder;
pub use placement::{PlacementArbiter, PlacementRules};
pub use renderer::{render_to_image, Renderer};
