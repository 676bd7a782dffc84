//! Plain-data snapshot of a shape.

use std::collections::BTreeMap;

use nalgebra::Point3;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::deform::{unflatten_deltas, Deform, DELTA_LEN};
use crate::error::{Result, ShapeError};
use crate::weights::WeightsSolver;

use super::{ShapeOptions, TriangulatedShape};

/// Everything needed to rebuild a [`TriangulatedShape`] without re-solving
/// its deforms.
///
/// Deforms are stored as [`DELTA_LEN`] column-major scalars per reference
/// triangle. Cached weight tables are not part of the snapshot.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ShapeData {
    /// Reference vertex positions.
    pub vertices: Vec<Point3<f64>>,
    /// Flat triangle-index buffer.
    pub indices: Vec<u32>,
    /// The weight solver in use.
    #[cfg_attr(feature = "serde", serde(default))]
    pub solver: WeightsSolver,
    /// Flattened triangle deltas by deform id.
    #[cfg_attr(feature = "serde", serde(default))]
    pub deforms: BTreeMap<String, Vec<f64>>,
}

impl TriangulatedShape {
    /// Snapshot the reference mesh, the solver and every deform.
    pub fn to_data(&self) -> Result<ShapeData> {
        let reference = self.reference_mesh()?;
        Ok(ShapeData {
            vertices: reference.vertices().to_vec(),
            indices: reference.indices().to_vec(),
            solver: self.solver.clone(),
            deforms: self
                .deforms
                .iter()
                .map(|(id, deform)| (id.clone(), deform.to_flat()))
                .collect(),
        })
    }

    /// Rebuild a shape from a snapshot.
    ///
    /// The reference mesh goes through the same checks as
    /// [`initialize`](Self::initialize); every deform must hold exactly
    /// [`DELTA_LEN`] values per triangle.
    pub fn from_data(data: &ShapeData, options: &ShapeOptions) -> Result<Self> {
        let mut shape = Self::with_options(options)?;
        shape.set_weights_solver(data.solver.clone())?;
        shape.initialize(&data.vertices, &data.indices)?;

        let triangle_count = shape.triangle_count();
        for (id, values) in &data.deforms {
            let deltas = unflatten_deltas(values, triangle_count).ok_or_else(|| {
                ShapeError::InvalidDeformData {
                    id: id.clone(),
                    expected: triangle_count * DELTA_LEN,
                    actual: values.len(),
                }
            })?;
            let deform = Deform::new(shape.buffers.persistent(deltas));
            shape.deforms.insert(id.clone(), deform);
        }

        log::debug!("restored shape with {} deforms", shape.deforms.len());
        Ok(shape)
    }
}
