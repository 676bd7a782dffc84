//! Per-triangle deformation deltas.
//!
//! A deform is captured as one affine transform per reference triangle. For
//! triangle `t` with rest frame `F_rest` and deformed frame `F_def` (see
//! [`TriangleAccessor::local_to_world`]), the delta is
//!
//! ```text
//! delta_t = F_def · F_rest⁻¹
//! ```
//!
//! so applying `delta_t` to any point expressed relative to the rest triangle
//! moves it the way the triangle moved. Every triangle is solved
//! independently.

use nalgebra::{Matrix4, Point3};

use crate::buffer::{Buffer, Lifetime};
use crate::error::{Result, ShapeError};
use crate::mesh::TriangleAccessor;
use crate::parallel::Executor;

/// Number of scalars in one flattened triangle delta.
pub const DELTA_LEN: usize = 16;

/// Compute the delta of a single triangle.
///
/// Fails if the rest frame of the triangle is not invertible.
pub fn triangle_delta(
    accessor: &TriangleAccessor<'_>,
    triangle: usize,
    deformed_points: &[Point3<f64>],
) -> Result<Matrix4<f64>> {
    let before = accessor.local_to_world(triangle);
    let after = accessor.local_to_world_in(triangle, deformed_points);
    let inverse = before
        .try_inverse()
        .ok_or(ShapeError::DegenerateTriangle { triangle })?;
    Ok(after * inverse)
}

/// Compute the deltas of every reference triangle, one work item per triangle.
///
/// `deformed_points` must have one entry per reference vertex.
pub fn solve_triangle_deltas(
    accessor: &TriangleAccessor<'_>,
    deformed_points: &[Point3<f64>],
    exec: &Executor,
) -> Result<Vec<Matrix4<f64>>> {
    if deformed_points.len() != accessor.vertex_count() {
        return Err(ShapeError::point_count(
            accessor.vertex_count(),
            deformed_points.len(),
        ));
    }
    exec.try_map(accessor.triangle_count(), |t| {
        triangle_delta(accessor, t, deformed_points)
    })
}

/// Flatten deltas into column-major scalars, [`DELTA_LEN`] per triangle.
pub fn flatten_deltas(deltas: &[Matrix4<f64>]) -> Vec<f64> {
    let mut flat = Vec::with_capacity(deltas.len() * DELTA_LEN);
    for delta in deltas {
        flat.extend_from_slice(delta.as_slice());
    }
    flat
}

/// Rebuild deltas from column-major scalars.
///
/// Returns `None` unless `values` holds exactly `triangle_count` matrices.
pub fn unflatten_deltas(values: &[f64], triangle_count: usize) -> Option<Vec<Matrix4<f64>>> {
    if values.len() != triangle_count * DELTA_LEN {
        return None;
    }
    Some(
        values
            .chunks_exact(DELTA_LEN)
            .map(Matrix4::from_column_slice)
            .collect(),
    )
}

/// A named deform's triangle deltas.
#[derive(Debug)]
pub struct Deform {
    deltas: Buffer<Vec<Matrix4<f64>>>,
}

impl Deform {
    pub(crate) fn new(deltas: Buffer<Vec<Matrix4<f64>>>) -> Self {
        Self { deltas }
    }

    /// Number of triangle deltas.
    #[inline]
    pub fn triangle_count(&self) -> usize {
        self.deltas.len()
    }

    /// The per-triangle deltas, in reference triangle order.
    #[inline]
    pub fn deltas(&self) -> &[Matrix4<f64>] {
        &self.deltas
    }

    /// Allocation lifetime of the delta buffer.
    #[inline]
    pub fn lifetime(&self) -> Lifetime {
        self.deltas.lifetime()
    }

    /// Flattened copy of the deltas.
    pub fn to_flat(&self) -> Vec<f64> {
        flatten_deltas(&self.deltas)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Vector3;

    fn quad() -> (Vec<Point3<f64>>, Vec<u32>) {
        let vertices = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ];
        (vertices, vec![0, 1, 2, 0, 2, 3])
    }

    #[test]
    fn test_identity_deltas() {
        let (vertices, indices) = quad();
        let accessor = TriangleAccessor::new(&vertices, &indices).unwrap();
        let deltas = solve_triangle_deltas(&accessor, &vertices, &Executor::sequential()).unwrap();

        assert_eq!(deltas.len(), 2);
        for delta in &deltas {
            assert!((delta - Matrix4::identity()).norm() < 1e-12);
        }
    }

    #[test]
    fn test_translation_delta() {
        let (vertices, indices) = quad();
        let accessor = TriangleAccessor::new(&vertices, &indices).unwrap();
        let shift = Vector3::new(0.5, -2.0, 1.0);
        let moved: Vec<_> = vertices.iter().map(|v| v + shift).collect();

        let deltas = solve_triangle_deltas(&accessor, &moved, &Executor::sequential()).unwrap();
        for delta in &deltas {
            assert!((delta - Matrix4::new_translation(&shift)).norm() < 1e-12);
        }
    }

    #[test]
    fn test_delta_maps_rest_triangle_onto_deformed() {
        let (vertices, indices) = quad();
        let accessor = TriangleAccessor::new(&vertices, &indices).unwrap();
        let moved = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(2.0, 0.0, 0.5),
            Point3::new(2.0, 1.5, 1.0),
            Point3::new(-0.2, 1.0, 0.0),
        ];

        for t in 0..accessor.triangle_count() {
            let delta = triangle_delta(&accessor, t, &moved).unwrap();
            let [a, b, c] = accessor.triangle_indices(t);
            for v in [a, b, c] {
                let mapped = delta.transform_point(&vertices[v]);
                assert!((mapped - moved[v]).norm() < 1e-12);
            }
        }
    }

    #[test]
    fn test_point_count_mismatch() {
        let (vertices, indices) = quad();
        let accessor = TriangleAccessor::new(&vertices, &indices).unwrap();
        let result = solve_triangle_deltas(&accessor, &vertices[..3], &Executor::sequential());
        assert_eq!(
            result,
            Err(ShapeError::PointCountMismatch {
                expected: 4,
                actual: 3,
            })
        );
    }

    #[test]
    fn test_degenerate_rest_triangle() {
        let vertices = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(2.0, 0.0, 0.0),
        ];
        let indices = vec![0, 1, 2];
        let accessor = TriangleAccessor::new(&vertices, &indices).unwrap();
        let result = solve_triangle_deltas(&accessor, &vertices, &Executor::sequential());
        assert_eq!(result, Err(ShapeError::DegenerateTriangle { triangle: 0 }));
    }

    #[test]
    fn test_first_degenerate_triangle_reported() {
        let mut vertices = Vec::new();
        let mut indices = Vec::new();
        for t in 0..200u32 {
            let x = t as f64;
            // Every fifth triangle from index 3 on collapses onto a line.
            let apex = if t % 5 == 3 { 2.0 } else { 0.5 };
            let y = if t % 5 == 3 { 0.0 } else { 1.0 };
            vertices.extend_from_slice(&[
                Point3::new(x, 0.0, 0.0),
                Point3::new(x + 1.0, 0.0, 0.0),
                Point3::new(x + apex, y, 0.0),
            ]);
            indices.extend_from_slice(&[3 * t, 3 * t + 1, 3 * t + 2]);
        }
        let accessor = TriangleAccessor::new(&vertices, &indices).unwrap();

        let result = solve_triangle_deltas(&accessor, &vertices, &Executor::new(true, 1));
        assert_eq!(result, Err(ShapeError::DegenerateTriangle { triangle: 3 }));
    }

    #[test]
    fn test_flatten_round_trip() {
        let deltas = vec![
            Matrix4::new_translation(&Vector3::new(1.0, 2.0, 3.0)),
            Matrix4::new_scaling(2.0),
        ];
        let flat = flatten_deltas(&deltas);
        assert_eq!(flat.len(), 2 * DELTA_LEN);
        // Column-major: the translation sits in the last column.
        assert_eq!(&flat[12..15], &[1.0, 2.0, 3.0]);

        assert_eq!(unflatten_deltas(&flat, 2), Some(deltas));
        assert_eq!(unflatten_deltas(&flat, 3), None);
    }
}
