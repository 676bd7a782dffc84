//! Point-to-triangle weights.
//!
//! A target point is never evaluated against the reference mesh directly.
//! Instead a solver binds it to one or more reference triangles
//! ([`Joint`]s), stored in a [`WeightTable`]. Evaluating a deform then only
//! needs the joints and the per-triangle deltas, so targets with any
//! tessellation can follow the reference surface.
//!
//! - [`table`]: the joint storage and the per-point transfer formula
//! - [`solver`]: the pluggable strategies that build tables

pub mod solver;
pub mod table;

pub use solver::{DistanceBlendSolver, NearestTriangleSolver, SolveWeights, WeightsSolver};
pub use table::{Joint, JointSlots, WeightTable};
