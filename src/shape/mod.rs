//! The deform-transfer aggregate.
//!
//! [`TriangulatedShape`] owns a reference mesh, any number of named deforms
//! authored against it, the active [`WeightsSolver`] and a cache of weight
//! tables keyed by caller-chosen target ids. Transferring a deform onto a
//! target point set resolves the target's weights (cached or freshly solved)
//! and evaluates every point against the deform's triangle deltas.
//!
//! Every operation blocks until its internal parallel batch completes.
//! Mutating operations take `&mut self`, so one shape is never driven from
//! two threads at once.
//!
//! # Example
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
//!
//! let lifted: Vec<_> = vertices.iter().map(|v| v + Vector3::z()).collect();
//! shape.add_deform("lift", &lifted).unwrap();
//!
//! // A target with its own tessellation
//! let target = vec![Point3::new(0.25, 0.5, 0.0), Point3::new(0.9, 0.1, 0.0)];
//! let deltas = shape
//!     .transfer_deform_as_deltas("lift", &target, Some("shirt"))
//!     .unwrap();
//! assert!(deltas.iter().all(|d| (d - Vector3::z()).norm() < 1e-9));
//! ```

mod cache;
mod data;
mod options;

use std::collections::HashMap;

use nalgebra::{Matrix4, Point3, Vector3};

use crate::buffer::{Buffer, Buffers};
use crate::deform::{self, Deform};
use crate::error::{Result, ShapeError};
use crate::mesh::TriangleAccessor;
use crate::parallel::Executor;
use crate::weights::{WeightTable, WeightsSolver};

use cache::WeightsCache;

pub use cache::ShapeStats;
pub use data::ShapeData;
pub use options::ShapeOptions;

/// The reference vertex and index buffers of a shape.
#[derive(Debug)]
pub struct ReferenceMesh {
    vertices: Buffer<Vec<Point3<f64>>>,
    indices: Buffer<Vec<u32>>,
}

impl ReferenceMesh {
    /// The reference vertex positions.
    #[inline]
    pub fn vertices(&self) -> &[Point3<f64>] {
        &self.vertices
    }

    /// The flat triangle-index buffer.
    #[inline]
    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    /// Number of reference vertices.
    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Number of reference triangles.
    #[inline]
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Per-triangle view over the reference buffers.
    #[inline]
    pub fn accessor(&self) -> TriangleAccessor<'_> {
        TriangleAccessor::new_unchecked(&self.vertices, &self.indices)
    }
}

/// Where the triangle deltas of a transfer come from.
enum DeltaSource<'a> {
    /// A deform registered on the shape.
    Named(&'a str),
    /// Deltas solved for this call only.
    Points(&'a [Point3<f64>]),
}

/// A reference mesh with named deforms that can be transferred onto
/// arbitrary point sets.
#[derive(Debug)]
pub struct TriangulatedShape {
    executor: Executor,
    buffers: Buffers,
    reference: Option<ReferenceMesh>,
    deforms: HashMap<String, Deform>,
    cache: WeightsCache,
    solver: WeightsSolver,
    disposed: bool,
}

impl Default for TriangulatedShape {
    fn default() -> Self {
        Self::new()
    }
}

impl TriangulatedShape {
    /// Create an uninitialized shape with default options and the
    /// nearest-triangle solver.
    pub fn new() -> Self {
        let options = ShapeOptions::default();
        Self::with_executor(
            Executor::new(options.parallel, options.min_parallel_len),
            options.weights_cache,
        )
    }

    /// Create an uninitialized shape with the given options.
    pub fn with_options(options: &ShapeOptions) -> Result<Self> {
        let executor = options.build_executor()?;
        Ok(Self::with_executor(executor, options.weights_cache))
    }

    fn with_executor(executor: Executor, weights_cache: bool) -> Self {
        Self {
            executor,
            buffers: Buffers::new(),
            reference: None,
            deforms: HashMap::new(),
            cache: WeightsCache::new(weights_cache),
            solver: WeightsSolver::default(),
            disposed: false,
        }
    }

    #[inline]
    fn check_live(&self) -> Result<()> {
        if self.disposed {
            Err(ShapeError::Disposed)
        } else {
            Ok(())
        }
    }

    fn reference_mesh(&self) -> Result<&ReferenceMesh> {
        self.check_live()?;
        self.reference.as_ref().ok_or(ShapeError::NotInitialized)
    }

    /// Set the reference mesh. Can only be done once.
    ///
    /// `indices` holds three vertex indices per triangle.
    pub fn initialize(&mut self, vertices: &[Point3<f64>], indices: &[u32]) -> Result<()> {
        self.check_live()?;
        if self.reference.is_some() {
            return Err(ShapeError::AlreadyInitialized);
        }
        TriangleAccessor::new(vertices, indices)?;

        self.reference = Some(ReferenceMesh {
            vertices: self.buffers.persistent(vertices.to_vec()),
            indices: self.buffers.persistent(indices.to_vec()),
        });
        log::debug!(
            "initialized shape: {} vertices, {} triangles",
            vertices.len(),
            indices.len() / 3
        );
        Ok(())
    }

    /// Whether the reference mesh has been set.
    #[inline]
    pub fn is_initialized(&self) -> bool {
        self.reference.is_some()
    }

    /// Whether [`dispose`](Self::dispose) has been called.
    #[inline]
    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// The reference mesh, if set.
    #[inline]
    pub fn reference(&self) -> Option<&ReferenceMesh> {
        self.reference.as_ref()
    }

    /// Number of reference vertices (0 before initialization).
    pub fn vertex_count(&self) -> usize {
        self.reference.as_ref().map_or(0, ReferenceMesh::vertex_count)
    }

    /// Number of reference triangles (0 before initialization).
    pub fn triangle_count(&self) -> usize {
        self.reference.as_ref().map_or(0, ReferenceMesh::triangle_count)
    }

    /// Register a deform from a fully deformed copy of the reference vertices.
    ///
    /// Any deform previously stored under `id` is replaced and released.
    pub fn add_deform(
        &mut self,
        id: impl Into<String>,
        deformed_points: &[Point3<f64>],
    ) -> Result<()> {
        let id = id.into();
        let reference = self.reference_mesh()?;
        let deltas =
            deform::solve_triangle_deltas(&reference.accessor(), deformed_points, &self.executor)?;

        let deform = Deform::new(self.buffers.persistent(deltas));
        if self.deforms.insert(id.clone(), deform).is_some() {
            log::debug!("replaced deform '{}'", id);
        } else {
            log::debug!("added deform '{}'", id);
        }
        Ok(())
    }

    /// Remove a deform. Returns whether it existed.
    pub fn remove_deform(&mut self, id: &str) -> Result<bool> {
        self.check_live()?;
        let removed = self.deforms.remove(id).is_some();
        if removed {
            log::debug!("removed deform '{}'", id);
        }
        Ok(removed)
    }

    /// Whether a deform is registered under `id`.
    #[inline]
    pub fn contains_deform(&self, id: &str) -> bool {
        self.deforms.contains_key(id)
    }

    /// The deform registered under `id`.
    #[inline]
    pub fn deform(&self, id: &str) -> Option<&Deform> {
        self.deforms.get(id)
    }

    /// Ids of all registered deforms, in no particular order.
    pub fn deform_ids(&self) -> impl Iterator<Item = &str> {
        self.deforms.keys().map(String::as_str)
    }

    /// Number of registered deforms.
    #[inline]
    pub fn deform_count(&self) -> usize {
        self.deforms.len()
    }

    /// Remove every deform.
    pub fn clear_deforms(&mut self) -> Result<()> {
        self.check_live()?;
        log::debug!("clearing {} deforms", self.deforms.len());
        self.deforms.clear();
        Ok(())
    }

    /// Transfer a registered deform onto `target_points`, returning their
    /// deformed positions.
    ///
    /// With a `target_id` (and caching enabled) the target's weights are
    /// cached and reused while its point count stays the same.
    pub fn transfer_deform(
        &mut self,
        id: &str,
        target_points: &[Point3<f64>],
        target_id: Option<&str>,
    ) -> Result<Vec<Point3<f64>>> {
        self.transfer_with(DeltaSource::Named(id), target_points, target_id, |_, q| q)
    }

    /// Transfer a registered deform onto `target_points`, returning per-point
    /// displacement vectors.
    pub fn transfer_deform_as_deltas(
        &mut self,
        id: &str,
        target_points: &[Point3<f64>],
        target_id: Option<&str>,
    ) -> Result<Vec<Vector3<f64>>> {
        self.transfer_with(DeltaSource::Named(id), target_points, target_id, |p, q| q - p)
    }

    /// Transfer an unregistered deform, given as a deformed copy of the
    /// reference vertices, onto `target_points`.
    ///
    /// The triangle deltas are solved for this call only.
    pub fn transfer_points(
        &mut self,
        deformed_points: &[Point3<f64>],
        target_points: &[Point3<f64>],
        target_id: Option<&str>,
    ) -> Result<Vec<Point3<f64>>> {
        self.transfer_with(
            DeltaSource::Points(deformed_points),
            target_points,
            target_id,
            |_, q| q,
        )
    }

    /// Like [`transfer_points`](Self::transfer_points), returning displacement
    /// vectors.
    pub fn transfer_points_as_deltas(
        &mut self,
        deformed_points: &[Point3<f64>],
        target_points: &[Point3<f64>],
        target_id: Option<&str>,
    ) -> Result<Vec<Vector3<f64>>> {
        self.transfer_with(
            DeltaSource::Points(deformed_points),
            target_points,
            target_id,
            |p, q| q - p,
        )
    }

    fn transfer_with<T, F>(
        &mut self,
        source: DeltaSource<'_>,
        target_points: &[Point3<f64>],
        target_id: Option<&str>,
        output: F,
    ) -> Result<Vec<T>>
    where
        T: Send,
        F: Fn(&Point3<f64>, Point3<f64>) -> T + Sync + Send,
    {
        self.check_live()?;
        let reference = self.reference.as_ref().ok_or(ShapeError::NotInitialized)?;
        let accessor = reference.accessor();

        let transient;
        let deltas: &[Matrix4<f64>] = match source {
            DeltaSource::Named(id) => self
                .deforms
                .get(id)
                .ok_or_else(|| ShapeError::UnknownDeform { id: id.to_owned() })?
                .deltas(),
            DeltaSource::Points(points) => {
                let solved = deform::solve_triangle_deltas(&accessor, points, &self.executor)?;
                transient = self.buffers.transient(solved);
                &transient
            }
        };

        let weights = self.cache.resolve(
            target_id,
            target_points,
            &self.solver,
            &accessor,
            &self.executor,
            &self.buffers,
        )?;
        let table: &WeightTable = &weights;

        Ok(self.executor.map(target_points.len(), |i| {
            let p = &target_points[i];
            output(p, table.compute_deformed_point(p, i, deltas))
        }))
    }

    /// The active weight solver.
    #[inline]
    pub fn weights_solver(&self) -> &WeightsSolver {
        &self.solver
    }

    /// Replace the weight solver. Clears the weights cache.
    pub fn set_weights_solver(&mut self, solver: WeightsSolver) -> Result<()> {
        self.check_live()?;
        solver.validate()?;
        log::debug!(
            "weights solver changed from {} to {}",
            self.solver.name(),
            solver.name()
        );
        self.solver = solver;
        self.cache.clear();
        Ok(())
    }

    /// Whether weight tables are cached per target id.
    #[inline]
    pub fn is_weights_cache_enabled(&self) -> bool {
        self.cache.is_enabled()
    }

    /// Enable or disable the weights cache. Disabling clears it.
    pub fn set_weights_cache_enabled(&mut self, enabled: bool) {
        self.cache.set_enabled(enabled);
    }

    /// Drop every cached weight table.
    pub fn clear_weights_cache(&mut self) {
        self.cache.clear();
    }

    /// The cached weight table of a target, if any.
    pub fn cached_weights(&self, target_id: &str) -> Option<&WeightTable> {
        self.cache.get(target_id)
    }

    /// Number of cached weight tables.
    #[inline]
    pub fn cached_target_count(&self) -> usize {
        self.cache.len()
    }

    /// Replace a target's cached table by a packed copy holding only live
    /// joints. Returns whether the target was cached.
    pub fn pack_cached_weights(&mut self, target_id: &str) -> bool {
        self.cache.pack(target_id, &self.buffers)
    }

    /// Pack every cached weight table.
    pub fn pack_all_cached_weights(&mut self) {
        self.cache.pack_all(&self.buffers);
    }

    /// Solve and cache counters.
    #[inline]
    pub fn stats(&self) -> ShapeStats {
        self.cache.stats()
    }

    /// Live buffer accounting for this shape.
    #[inline]
    pub fn buffers(&self) -> &Buffers {
        &self.buffers
    }

    /// Release the reference mesh, every deform and every cached table.
    ///
    /// The shape is inert afterwards: operations fail with
    /// [`ShapeError::Disposed`].
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.cache.clear();
        self.deforms.clear();
        self.reference = None;
        self.disposed = true;
        log::debug!("disposed shape");
    }
}
