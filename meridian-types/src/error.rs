//! Error type used by the crate.

use thiserror::Error;

/// Error enum.
#[derive(Debug, Error)]
pub enum TypesError {
    /// Geometry conversion error.
    #[error("invalid input geometry: {0}")]
    Conversion(String),
    /// The projection engine refused the parameter string.
    #[error("failed to initialize projection with definition '{params}': {reason}")]
    ProjectionInit {
        /// Parameter string the projection was created from.
        params: String,
        /// Reason reported by the engine.
        reason: String,
    },
    /// A coordinate could not be transformed.
    #[error("failed to transform coordinate ({x}, {y}) with '{params}'")]
    Transform {
        /// Parameter string of the projection.
        params: String,
        /// X coordinate (or longitude) of the input.
        x: f64,
        /// Y coordinate (or latitude) of the input.
        y: f64,
    },
}
