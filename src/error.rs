//! Error types for trimorph.
//!
//! Every variant is a contract violation: the caller handed the shape input
//! it cannot work with, or called it in the wrong lifecycle state. None of
//! them are retried or absorbed internally.

use thiserror::Error;

/// Result type alias using [`ShapeError`].
pub type Result<T> = std::result::Result<T, ShapeError>;

/// Errors that can occur during shape operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ShapeError {
    /// The reference mesh was already set.
    #[error("shape is already initialized")]
    AlreadyInitialized,

    /// The operation needs a reference mesh but none was set.
    #[error("shape is not initialized")]
    NotInitialized,

    /// The shape was disposed and can no longer be used.
    #[error("shape has been disposed")]
    Disposed,

    /// The index buffer length is not a multiple of three.
    #[error("index count {count} is not a multiple of 3")]
    InvalidIndexCount {
        /// The offending index count.
        count: usize,
    },

    /// A triangle references a vertex that does not exist.
    #[error("triangle {triangle} references invalid vertex index {vertex} (vertex count {vertex_count})")]
    InvalidVertexIndex {
        /// The triangle index.
        triangle: usize,
        /// The invalid vertex index.
        vertex: usize,
        /// Number of vertices in the buffer.
        vertex_count: usize,
    },

    /// A point buffer does not have the expected length.
    #[error("expected {expected} points, got {actual}")]
    PointCountMismatch {
        /// The required number of points.
        expected: usize,
        /// The number of points supplied.
        actual: usize,
    },

    /// No deform is registered under the given id.
    #[error("unknown deform '{id}'")]
    UnknownDeform {
        /// The requested deform id.
        id: String,
    },

    /// A reference triangle has a non-invertible local frame.
    #[error("triangle {triangle} is degenerate (its local frame is not invertible)")]
    DegenerateTriangle {
        /// The triangle index.
        triangle: usize,
    },

    /// Weights were requested against a reference mesh with no triangles.
    #[error("reference mesh has no triangles")]
    EmptyReference,

    /// Persisted deform data does not match the reference mesh.
    #[error("deform '{id}' holds {actual} values, expected {expected}")]
    InvalidDeformData {
        /// The deform id.
        id: String,
        /// Expected number of scalar values.
        expected: usize,
        /// Actual number of scalar values.
        actual: usize,
    },

    /// Invalid parameter value.
    #[error("invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// The invalid value (as string).
        value: String,
        /// Reason the value is invalid.
        reason: &'static str,
    },

    /// The dedicated worker pool could not be created.
    #[error("failed to build worker pool: {0}")]
    ThreadPool(String),
}

impl ShapeError {
    /// Create an invalid parameter error.
    pub fn invalid_param<T: std::fmt::Display>(
        name: &'static str,
        value: T,
        reason: &'static str,
    ) -> Self {
        ShapeError::InvalidParameter {
            name,
            value: value.to_string(),
            reason,
        }
    }

    /// Create a point count mismatch error.
    pub(crate) fn point_count(expected: usize, actual: usize) -> Self {
        ShapeError::PointCountMismatch { expected, actual }
    }
}

impl From<rayon::ThreadPoolBuildError> for ShapeError {
    fn from(err: rayon::ThreadPoolBuildError) -> Self {
        ShapeError::ThreadPool(err.to_string())
    }
}
