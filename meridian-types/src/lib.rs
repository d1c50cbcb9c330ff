//! Geometric primitives used by the `meridian` renderer.
//!
//! * [`Geometry`] is a typed stream of move-to/line-to vertices, the shape every datasource hands to the
//!   rendering pipeline.
//! * [`BoundingBox`] is an axis-aligned envelope in whatever coordinate space its owner uses.
//! * [`Projection`] converts between geographic and projected coordinates.

#![warn(clippy::unwrap_used)]
#![warn(missing_docs)]

mod bounding_box;
pub mod error;
mod geometry;
pub mod projection;
mod size;

pub use bounding_box::BoundingBox;
pub use error::TypesError;
pub use geometry::{Geometry, GeometryKind, Vertex, VertexCommand};
pub use projection::Projection;
pub use size::Size;

/// Point in a 2d cartesian space.
pub type Point2d = nalgebra::Point2<f64>;
