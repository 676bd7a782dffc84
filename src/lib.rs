//! # Trimorph
//!
//! Topology-independent transfer of triangle-mesh deformations.
//!
//! A [`TriangulatedShape`](shape::TriangulatedShape) holds a reference
//! triangle mesh and any number of named deforms, each given as a deformed
//! copy of the reference vertices. A deform is stored as one affine delta per
//! reference triangle, so it can be applied to point sets that share none of
//! the reference's tessellation: clothing, hair cards, props or a second
//! character mesh.
//!
//! ## Features
//!
//! - **Per-triangle deltas**: each triangle is solved independently from its
//!   rest and deformed local frames
//! - **Pluggable weights**: nearest-triangle binding or inverse-distance
//!   blending over several triangles
//! - **Weight caching**: tables are cached per target id and invalidated when
//!   the target's point count or the solver changes
//! - **Data parallelism**: per-triangle and per-point work runs on rayon
//! - **Persistence**: `serde` snapshots of a shape (feature `serde`, on by
//!   default)
//!
//! ## Quick Start
//!
//! ```
//! use trimorph::prelude::*;
//! use nalgebra::{Point3, Vector3};
//!
//! let vertices = vec![
//!     Point3::new(0.0, 0.0, 0.0),
//!     Point3::new(1.0, 0.0, 0.0),
//!     Point3::new(1.0, 1.0, 0.0),
//!     Point3::new(0.0, 1.0, 0.0),
//! ];
//! let indices = vec![0, 1, 2, 0, 2, 3];
//!
//! let mut shape = TriangulatedShape::new();
//! shape.initialize(&vertices, &indices).unwrap();
//! shape
//!     .set_weights_solver(DistanceBlendSolver::default().into())
//!     .unwrap();
//!
//! // Shear the square along x as it rises
//! let sheared: Vec<_> = vertices
//!     .iter()
//!     .map(|v| v + Vector3::new(0.2 * v.y, 0.0, 0.5))
//!     .collect();
//! shape.add_deform("shear", &sheared).unwrap();
//!
//! let target = vec![Point3::new(0.5, 0.5, 0.05), Point3::new(0.1, 0.9, 0.0)];
//! let moved = shape.transfer_deform("shear", &target, Some("patch")).unwrap();
//! assert_eq!(moved.len(), target.len());
//!
//! // The second transfer onto "patch" reuses its weights.
//! shape.transfer_deform("shear", &target, Some("patch")).unwrap();
//! assert_eq!(shape.stats().weight_solves, 1);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod buffer;
pub mod deform;
pub mod error;
pub mod mesh;
pub mod parallel;
pub mod shape;
pub mod weights;

/// Prelude module for convenient imports.
///
/// ```
/// use trimorph::prelude::*;
/// ```
pub mod prelude {
    pub use crate::error::{Result, ShapeError};
    pub use crate::mesh::TriangleAccessor;
    pub use crate::shape::{ShapeData, ShapeOptions, TriangulatedShape};
    pub use crate::weights::{
        DistanceBlendSolver, NearestTriangleSolver, SolveWeights, WeightTable, WeightsSolver,
    };
}

// Re-export nalgebra types for convenience
pub use nalgebra;
