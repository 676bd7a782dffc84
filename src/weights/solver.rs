//! Strategies that bind target points to reference triangles.
//!
//! A solver is a pure function from (reference triangles, target points) to a
//! [`WeightTable`]. [`SolveWeights`] is the seam; [`WeightsSolver`] is the
//! tagged, serializable set of built-in strategies a shape stores and
//! persists.
//!
//! # Strategies
//!
//! - [`NearestTriangleSolver`]: one joint per point, on the closest triangle.
//! - [`DistanceBlendSolver`]: up to `max_joints` closest triangles, weighted
//!   by inverse distance and pruned relative to the strongest joint.
//!
//! # Example
//!
//! ```
//! use trimorph::mesh::TriangleAccessor;
//! use trimorph::parallel::Executor;
//! use trimorph::weights::{DistanceBlendSolver, SolveWeights, WeightsSolver};
//! use nalgebra::Point3;
//!
//! let vertices = vec![
//!     Point3::new(0.0, 0.0, 0.0),
//!     Point3::new(1.0, 0.0, 0.0),
//!     Point3::new(1.0, 1.0, 0.0),
//!     Point3::new(0.0, 1.0, 0.0),
//! ];
//! let indices = vec![0, 1, 2, 0, 2, 3];
//! let accessor = TriangleAccessor::new(&vertices, &indices).unwrap();
//!
//! let solver = WeightsSolver::from(DistanceBlendSolver::default().with_max_joints(2));
//! let targets = [Point3::new(0.5, 0.2, 0.1)];
//! let table = solver.solve(&accessor, &targets, &Executor::default()).unwrap();
//! assert!(table.joint_count(0) >= 1);
//! ```

use nalgebra::Point3;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Result, ShapeError};
use crate::mesh::TriangleAccessor;
use crate::parallel::Executor;

use super::table::{Joint, WeightTable};

/// Computes a [`WeightTable`] for a set of target points.
///
/// Implementations must be pure: the same triangles and points always give the
/// same table.
pub trait SolveWeights {
    /// Associate every point in `points` with one or more reference triangles.
    fn solve(
        &self,
        accessor: &TriangleAccessor<'_>,
        points: &[Point3<f64>],
        exec: &Executor,
    ) -> Result<WeightTable>;
}

/// The built-in weight solvers.
///
/// Serialized with a `type` tag so a persisted shape can reselect its solver.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "type"))]
pub enum WeightsSolver {
    /// See [`NearestTriangleSolver`].
    #[default]
    NearestTriangle,
    /// See [`DistanceBlendSolver`].
    DistanceBlend(DistanceBlendSolver),
}

impl WeightsSolver {
    /// Short name of the strategy, used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            WeightsSolver::NearestTriangle => "nearest-triangle",
            WeightsSolver::DistanceBlend(_) => "distance-blend",
        }
    }

    /// Check the solver's parameters.
    pub fn validate(&self) -> Result<()> {
        match self {
            WeightsSolver::NearestTriangle => Ok(()),
            WeightsSolver::DistanceBlend(solver) => solver.validate(),
        }
    }
}

impl SolveWeights for WeightsSolver {
    fn solve(
        &self,
        accessor: &TriangleAccessor<'_>,
        points: &[Point3<f64>],
        exec: &Executor,
    ) -> Result<WeightTable> {
        log::debug!(
            "solving {} weights: {} points against {} triangles",
            self.name(),
            points.len(),
            accessor.triangle_count()
        );
        match self {
            WeightsSolver::NearestTriangle => NearestTriangleSolver.solve(accessor, points, exec),
            WeightsSolver::DistanceBlend(solver) => solver.solve(accessor, points, exec),
        }
    }
}

impl From<NearestTriangleSolver> for WeightsSolver {
    fn from(_: NearestTriangleSolver) -> Self {
        WeightsSolver::NearestTriangle
    }
}

impl From<DistanceBlendSolver> for WeightsSolver {
    fn from(solver: DistanceBlendSolver) -> Self {
        WeightsSolver::DistanceBlend(solver)
    }
}

/// Binds each point to its closest reference triangle with weight 1.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NearestTriangleSolver;

impl SolveWeights for NearestTriangleSolver {
    fn solve(
        &self,
        accessor: &TriangleAccessor<'_>,
        points: &[Point3<f64>],
        exec: &Executor,
    ) -> Result<WeightTable> {
        let search = TriangleSearch::build(accessor, points.len(), exec)?;
        let mut table = WeightTable::new(points.len(), 1);
        table.populate(exec, |slots| {
            let (triangle, _) = search.nearest(&points[slots.point()]);
            slots.set_joint(0, Joint::new(triangle, 1.0));
            slots.set_count(1);
        });
        Ok(table)
    }
}

/// Blends the closest triangles by inverse distance.
///
/// For each point, the `max_joints` closest triangles get weight
/// `1 / (distance + epsilon)^power`, stored relative to the nearest triangle
/// so the nearest joint always weighs 1. Joints weaker than `threshold` are
/// then dropped.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DistanceBlendSolver {
    /// Maximum number of triangles per point.
    pub max_joints: usize,
    /// Inverse-distance falloff exponent.
    pub power: f64,
    /// Relative weight (0.0 to 1.0) below which joints are pruned.
    pub threshold: f64,
    /// Distance bias keeping weights finite for points on the surface.
    pub epsilon: f64,
}

impl Default for DistanceBlendSolver {
    fn default() -> Self {
        Self {
            max_joints: 4,
            power: 2.0,
            threshold: 0.1,
            epsilon: 1e-4,
        }
    }
}

impl DistanceBlendSolver {
    /// Set the maximum number of joints per point.
    pub fn with_max_joints(mut self, max_joints: usize) -> Self {
        self.max_joints = max_joints;
        self
    }

    /// Set the falloff exponent.
    pub fn with_power(mut self, power: f64) -> Self {
        self.power = power;
        self
    }

    /// Set the pruning threshold.
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    /// Set the distance bias.
    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }

    /// Check the parameters.
    pub fn validate(&self) -> Result<()> {
        if self.max_joints == 0 {
            return Err(ShapeError::invalid_param(
                "max_joints",
                self.max_joints,
                "must be at least 1",
            ));
        }
        if !self.power.is_finite() || self.power < 0.0 {
            return Err(ShapeError::invalid_param(
                "power",
                self.power,
                "must be finite and non-negative",
            ));
        }
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(ShapeError::invalid_param(
                "threshold",
                self.threshold,
                "must be in [0, 1]",
            ));
        }
        if !self.epsilon.is_finite() || self.epsilon <= 0.0 {
            return Err(ShapeError::invalid_param(
                "epsilon",
                self.epsilon,
                "must be finite and positive",
            ));
        }
        Ok(())
    }

    /// Weight of a triangle at `distance`, relative to the nearest one at
    /// `nearest`. Lies in `[0, 1]` for any valid parameters.
    #[inline]
    fn relative_weight(&self, nearest: f64, distance: f64) -> f64 {
        ((nearest + self.epsilon) / (distance + self.epsilon)).powf(self.power)
    }
}

impl SolveWeights for DistanceBlendSolver {
    fn solve(
        &self,
        accessor: &TriangleAccessor<'_>,
        points: &[Point3<f64>],
        exec: &Executor,
    ) -> Result<WeightTable> {
        self.validate()?;
        let search = TriangleSearch::build(accessor, points.len(), exec)?;
        let k = self.max_joints.min(accessor.triangle_count());

        let mut table = WeightTable::new(points.len(), k);
        table.populate(exec, |slots| {
            let nearest = search.k_nearest(&points[slots.point()], k);
            let Some(&(_, closest)) = nearest.first() else {
                return;
            };
            for (slot, &(triangle, distance)) in nearest.iter().enumerate() {
                let weight = self.relative_weight(closest, distance);
                slots.set_joint(slot, Joint::new(triangle, weight));
            }
            slots.set_count(nearest.len());
            slots.filter(nearest.len(), 1.0, self.threshold);
        });
        Ok(table)
    }
}

/// Brute-force closest-triangle search with bounding-sphere rejection.
struct TriangleSearch<'a> {
    accessor: TriangleAccessor<'a>,
    /// Centroid and circumscribing radius per triangle.
    spheres: Vec<(Point3<f64>, f64)>,
}

impl<'a> TriangleSearch<'a> {
    fn build(accessor: &TriangleAccessor<'a>, point_count: usize, exec: &Executor) -> Result<Self> {
        if accessor.triangle_count() == 0 && point_count > 0 {
            return Err(ShapeError::EmptyReference);
        }
        let spheres = exec.map(accessor.triangle_count(), |t| {
            let center = accessor.centroid(t);
            let radius = accessor
                .triangle(t)
                .iter()
                .map(|v| (v - center).norm())
                .fold(0.0, f64::max);
            (center, radius)
        });
        Ok(Self {
            accessor: *accessor,
            spheres,
        })
    }

    /// Lower bound on the distance from `p` to triangle `t`.
    #[inline]
    fn lower_bound(&self, t: usize, p: &Point3<f64>) -> f64 {
        let (center, radius) = self.spheres[t];
        ((p - center).norm() - radius).max(0.0)
    }

    fn nearest(&self, p: &Point3<f64>) -> (usize, f64) {
        let mut best = (0, f64::INFINITY);
        for t in 0..self.spheres.len() {
            if self.lower_bound(t, p) >= best.1 {
                continue;
            }
            let distance = self.accessor.closest_point(t, p).distance();
            if distance < best.1 {
                best = (t, distance);
            }
        }
        best
    }

    /// The `k` closest triangles, nearest first.
    fn k_nearest(&self, p: &Point3<f64>, k: usize) -> Vec<(usize, f64)> {
        let mut found: Vec<(usize, f64)> = Vec::with_capacity(k + 1);
        for t in 0..self.spheres.len() {
            if found.len() == k && self.lower_bound(t, p) >= found[k - 1].1 {
                continue;
            }
            let distance = self.accessor.closest_point(t, p).distance();
            if found.len() == k && distance >= found[k - 1].1 {
                continue;
            }
            let at = found.partition_point(|&(_, d)| d <= distance);
            found.insert(at, (t, distance));
            found.truncate(k);
        }
        found
    }
}
