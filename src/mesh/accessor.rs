//! Read-only per-triangle queries over flat vertex/index buffers.
//!
//! [`TriangleAccessor`] borrows a vertex buffer and a flat triangle-index
//! buffer (three indices per triangle) and answers geometric questions about
//! individual triangles. It never owns or mutates the buffers, so a single
//! accessor can be shared by every worker of a parallel batch.
//!
//! # Local frames
//!
//! [`TriangleAccessor::local_to_world`] builds an affine frame anchored at the
//! first vertex `A` of a triangle `(A, B, C)`:
//!
//! ```text
//! x = C - A
//! y = B - A
//! z = (x × y) / sqrt(|x × y|)
//! ```
//!
//! The third axis has length `sqrt(|x × y|)` rather than unit length or the
//! raw area. On small or thin triangles a unit normal would make the frame
//! wildly non-uniform, and the raw cross product would collapse it.
//!
//! # Example
//!
//! ```
//! use trimorph::mesh::TriangleAccessor;
//! use nalgebra::Point3;
//!
//! let vertices = vec![
//!     Point3::new(0.0, 0.0, 0.0),
//!     Point3::new(1.0, 0.0, 0.0),
//!     Point3::new(0.0, 1.0, 0.0),
//! ];
//! let indices = vec![0, 1, 2];
//! let accessor = TriangleAccessor::new(&vertices, &indices).unwrap();
//!
//! let hit = accessor.closest_point(0, &Point3::new(0.25, 0.25, 3.0));
//! assert!((hit.point - Point3::new(0.25, 0.25, 0.0)).norm() < 1e-12);
//! ```

use nalgebra::{Matrix4, Point3, Vector3};

use crate::error::{Result, ShapeError};

/// Squared cross-product length below which a triangle is treated as a sliver.
const DEGENERATE_EPSILON: f64 = 1e-24;

/// Result of a closest-point query against a triangle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClosestPoint {
    /// The closest point on the triangle.
    pub point: Point3<f64>,
    /// Barycentric coordinates of `point` with respect to `(A, B, C)`.
    pub barycentric: [f64; 3],
    /// Squared distance from the query point to `point`.
    pub distance_squared: f64,
}

impl ClosestPoint {
    /// Distance from the query point to the triangle.
    #[inline]
    pub fn distance(&self) -> f64 {
        self.distance_squared.sqrt()
    }
}

/// Borrowed view over a triangulated point set.
#[derive(Debug, Clone, Copy)]
pub struct TriangleAccessor<'a> {
    vertices: &'a [Point3<f64>],
    indices: &'a [u32],
}

impl<'a> TriangleAccessor<'a> {
    /// Create an accessor, checking that the index buffer holds whole triangles
    /// and that every index refers to an existing vertex.
    pub fn new(vertices: &'a [Point3<f64>], indices: &'a [u32]) -> Result<Self> {
        let accessor = Self { vertices, indices };
        accessor.validate()?;
        Ok(accessor)
    }

    /// Create an accessor over buffers already known to be valid.
    #[inline]
    pub(crate) fn new_unchecked(vertices: &'a [Point3<f64>], indices: &'a [u32]) -> Self {
        debug_assert!(indices.len() % 3 == 0);
        Self { vertices, indices }
    }

    /// Check the index buffer against the vertex buffer.
    pub fn validate(&self) -> Result<()> {
        if self.indices.len() % 3 != 0 {
            return Err(ShapeError::InvalidIndexCount {
                count: self.indices.len(),
            });
        }

        let vertex_count = self.vertices.len();
        if let Some(pos) = self
            .indices
            .iter()
            .position(|&i| i as usize >= vertex_count)
        {
            return Err(ShapeError::InvalidVertexIndex {
                triangle: pos / 3,
                vertex: self.indices[pos] as usize,
                vertex_count,
            });
        }
        Ok(())
    }

    /// Get the vertex buffer.
    #[inline]
    pub fn vertices(&self) -> &'a [Point3<f64>] {
        self.vertices
    }

    /// Get the flat index buffer.
    #[inline]
    pub fn indices(&self) -> &'a [u32] {
        self.indices
    }

    /// Get the number of vertices.
    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Get the number of triangles.
    #[inline]
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Get the vertex indices of triangle `i`.
    #[inline]
    pub fn triangle_indices(&self, i: usize) -> [usize; 3] {
        let base = i * 3;
        [
            self.indices[base] as usize,
            self.indices[base + 1] as usize,
            self.indices[base + 2] as usize,
        ]
    }

    /// Get the three vertices of triangle `i`.
    #[inline]
    pub fn triangle(&self, i: usize) -> [Point3<f64>; 3] {
        self.triangle_in(i, self.vertices)
    }

    /// Get the three vertices of triangle `i`, read from another buffer that
    /// shares this accessor's vertex layout (e.g. a deformed copy).
    #[inline]
    pub fn triangle_in(&self, i: usize, points: &[Point3<f64>]) -> [Point3<f64>; 3] {
        let [a, b, c] = self.triangle_indices(i);
        [points[a], points[b], points[c]]
    }

    /// Build the local-to-world frame of triangle `i`.
    #[inline]
    pub fn local_to_world(&self, i: usize) -> Matrix4<f64> {
        let [a, b, c] = self.triangle(i);
        triangle_frame(&a, &b, &c)
    }

    /// Build the local-to-world frame of triangle `i` over another buffer with
    /// the same vertex layout.
    #[inline]
    pub fn local_to_world_in(&self, i: usize, points: &[Point3<f64>]) -> Matrix4<f64> {
        let [a, b, c] = self.triangle_in(i, points);
        triangle_frame(&a, &b, &c)
    }

    /// Unit normal of triangle `i` (zero for degenerate triangles).
    pub fn normal(&self, i: usize) -> Vector3<f64> {
        let [a, b, c] = self.triangle(i);
        (b - a)
            .cross(&(c - a))
            .try_normalize(0.0)
            .unwrap_or_else(Vector3::zeros)
    }

    /// Area of triangle `i`.
    pub fn area(&self, i: usize) -> f64 {
        let [a, b, c] = self.triangle(i);
        0.5 * (b - a).cross(&(c - a)).norm()
    }

    /// Centroid of triangle `i`.
    pub fn centroid(&self, i: usize) -> Point3<f64> {
        let [a, b, c] = self.triangle(i);
        Point3::from((a.coords + b.coords + c.coords) / 3.0)
    }

    /// Closest point on triangle `i` to `p`.
    #[inline]
    pub fn closest_point(&self, i: usize, p: &Point3<f64>) -> ClosestPoint {
        let [a, b, c] = self.triangle(i);
        closest_point_on_triangle(p, &a, &b, &c)
    }
}

/// Build the affine local-to-world frame of triangle `(a, b, c)`.
///
/// Columns are `C - A`, `B - A`, the rescaled cross product, and the origin
/// `A`. See the module docs for the rescaling.
pub fn triangle_frame(a: &Point3<f64>, b: &Point3<f64>, c: &Point3<f64>) -> Matrix4<f64> {
    let ac = c - a;
    let ab = b - a;
    let cross = ac.cross(&ab);
    let len = cross.norm();
    let n = if len > 0.0 { cross / len.sqrt() } else { cross };

    #[rustfmt::skip]
    let frame = Matrix4::new(
        ac.x, ab.x, n.x, a.x,
        ac.y, ab.y, n.y, a.y,
        ac.z, ab.z, n.z, a.z,
        0.0,  0.0,  0.0, 1.0,
    );
    frame
}

/// Closest point on triangle `(a, b, c)` to `p`.
///
/// Walks the Voronoi regions of the triangle (vertex A, vertex B, edge AB,
/// vertex C, edge AC, edge BC) and falls back to the interior barycentric
/// projection. Slivers with no usable area are handled edge by edge.
pub fn closest_point_on_triangle(
    p: &Point3<f64>,
    a: &Point3<f64>,
    b: &Point3<f64>,
    c: &Point3<f64>,
) -> ClosestPoint {
    let ab = b - a;
    let ac = c - a;

    if ab.cross(&ac).norm_squared() <= DEGENERATE_EPSILON {
        return closest_point_on_sliver(p, a, b, c);
    }

    let ap = p - a;
    let d1 = ab.dot(&ap);
    let d2 = ac.dot(&ap);
    if d1 <= 0.0 && d2 <= 0.0 {
        return make_hit(p, *a, [1.0, 0.0, 0.0]);
    }

    let bp = p - b;
    let d3 = ab.dot(&bp);
    let d4 = ac.dot(&bp);
    if d3 >= 0.0 && d4 <= d3 {
        return make_hit(p, *b, [0.0, 1.0, 0.0]);
    }

    let vc = d1 * d4 - d3 * d2;
    if vc <= 0.0 && d1 >= 0.0 && d3 <= 0.0 {
        let v = d1 / (d1 - d3);
        return make_hit(p, a + ab * v, [1.0 - v, v, 0.0]);
    }

    let cp = p - c;
    let d5 = ab.dot(&cp);
    let d6 = ac.dot(&cp);
    if d6 >= 0.0 && d5 <= d6 {
        return make_hit(p, *c, [0.0, 0.0, 1.0]);
    }

    let vb = d5 * d2 - d1 * d6;
    if vb <= 0.0 && d2 >= 0.0 && d6 <= 0.0 {
        let w = d2 / (d2 - d6);
        return make_hit(p, a + ac * w, [1.0 - w, 0.0, w]);
    }

    let va = d3 * d6 - d5 * d4;
    if va <= 0.0 && (d4 - d3) >= 0.0 && (d5 - d6) >= 0.0 {
        let w = (d4 - d3) / ((d4 - d3) + (d5 - d6));
        return make_hit(p, b + (c - b) * w, [0.0, 1.0 - w, w]);
    }

    let denom = 1.0 / (va + vb + vc);
    let v = vb * denom;
    let w = vc * denom;
    make_hit(p, a + ab * v + ac * w, [1.0 - v - w, v, w])
}

#[inline]
fn make_hit(p: &Point3<f64>, point: Point3<f64>, barycentric: [f64; 3]) -> ClosestPoint {
    ClosestPoint {
        point,
        barycentric,
        distance_squared: (p - point).norm_squared(),
    }
}

/// Closest point on a zero-area triangle: best of its three edges.
fn closest_point_on_sliver(
    p: &Point3<f64>,
    a: &Point3<f64>,
    b: &Point3<f64>,
    c: &Point3<f64>,
) -> ClosestPoint {
    let (t_ab, d_ab) = closest_on_segment(p, a, b);
    let (t_ac, d_ac) = closest_on_segment(p, a, c);
    let (t_bc, d_bc) = closest_on_segment(p, b, c);

    if d_ab <= d_ac && d_ab <= d_bc {
        make_hit(p, a + (b - a) * t_ab, [1.0 - t_ab, t_ab, 0.0])
    } else if d_ac <= d_bc {
        make_hit(p, a + (c - a) * t_ac, [1.0 - t_ac, 0.0, t_ac])
    } else {
        make_hit(p, b + (c - b) * t_bc, [0.0, 1.0 - t_bc, t_bc])
    }
}

/// Parameter along `a -> b` of the closest point to `p`, and its squared distance.
fn closest_on_segment(p: &Point3<f64>, a: &Point3<f64>, b: &Point3<f64>) -> (f64, f64) {
    let ab = b - a;
    let len_sq = ab.norm_squared();
    let t = if len_sq > 0.0 {
        ((p - a).dot(&ab) / len_sq).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let q = a + ab * t;
    (t, (p - q).norm_squared())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn right_triangle() -> (Vec<Point3<f64>>, Vec<u32>) {
        let vertices = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ];
        (vertices, vec![0, 1, 2])
    }

    fn assert_point_eq(a: &Point3<f64>, b: &Point3<f64>) {
        assert!((a - b).norm() < 1e-10, "expected {:?}, got {:?}", b, a);
    }

    #[test]
    fn test_index_count_must_be_multiple_of_three() {
        let (vertices, _) = right_triangle();
        let indices = vec![0, 1, 2, 0];
        let err = TriangleAccessor::new(&vertices, &indices).unwrap_err();
        assert_eq!(err, ShapeError::InvalidIndexCount { count: 4 });
    }

    #[test]
    fn test_index_out_of_range() {
        let (vertices, _) = right_triangle();
        let indices = vec![0, 1, 2, 2, 1, 5];
        let err = TriangleAccessor::new(&vertices, &indices).unwrap_err();
        assert_eq!(
            err,
            ShapeError::InvalidVertexIndex {
                triangle: 1,
                vertex: 5,
                vertex_count: 3,
            }
        );
    }

    #[test]
    fn test_counts_and_queries() {
        let (vertices, indices) = right_triangle();
        let accessor = TriangleAccessor::new(&vertices, &indices).unwrap();

        assert_eq!(accessor.vertex_count(), 3);
        assert_eq!(accessor.triangle_count(), 1);
        assert_eq!(accessor.triangle_indices(0), [0, 1, 2]);
        assert!((accessor.area(0) - 0.5).abs() < 1e-12);
        assert!((accessor.normal(0) - Vector3::z()).norm() < 1e-12);
        assert_point_eq(&accessor.centroid(0), &Point3::new(1.0 / 3.0, 1.0 / 3.0, 0.0));
    }

    #[test]
    fn test_local_frame_axes() {
        let (vertices, indices) = right_triangle();
        let accessor = TriangleAccessor::new(&vertices, &indices).unwrap();
        let frame = accessor.local_to_world(0);

        // x -> C - A, y -> B - A, origin -> A
        assert_point_eq(&frame.transform_point(&Point3::new(1.0, 0.0, 0.0)), &vertices[2]);
        assert_point_eq(&frame.transform_point(&Point3::new(0.0, 1.0, 0.0)), &vertices[1]);
        assert_point_eq(&frame.transform_point(&Point3::origin()), &vertices[0]);

        // |AC x AB| = 1, so the third axis has length sqrt(1) = 1 along -z
        let z = frame.fixed_view::<3, 1>(0, 2).into_owned();
        assert!((z - Vector3::new(0.0, 0.0, -1.0)).norm() < 1e-12);
    }

    #[test]
    fn test_local_frame_third_axis_scaling() {
        let a = Point3::new(0.0, 0.0, 0.0);
        let b = Point3::new(4.0, 0.0, 0.0);
        let c = Point3::new(0.0, 4.0, 0.0);
        let frame = triangle_frame(&a, &b, &c);

        // |AC x AB| = 16, so the third axis has length 4
        let z = frame.fixed_view::<3, 1>(0, 2).into_owned();
        assert!((z.norm() - 4.0).abs() < 1e-12);
        assert!(frame.try_inverse().is_some());
    }

    #[test]
    fn test_closest_point_regions() {
        let a = Point3::new(0.0, 0.0, 0.0);
        let b = Point3::new(1.0, 0.0, 0.0);
        let c = Point3::new(0.0, 1.0, 0.0);

        // Vertex regions
        let hit = closest_point_on_triangle(&Point3::new(-1.0, -1.0, 0.0), &a, &b, &c);
        assert_point_eq(&hit.point, &a);
        assert_eq!(hit.barycentric, [1.0, 0.0, 0.0]);

        let hit = closest_point_on_triangle(&Point3::new(2.0, -0.5, 0.0), &a, &b, &c);
        assert_point_eq(&hit.point, &b);

        let hit = closest_point_on_triangle(&Point3::new(-0.5, 2.0, 0.0), &a, &b, &c);
        assert_point_eq(&hit.point, &c);

        // Edge regions
        let hit = closest_point_on_triangle(&Point3::new(0.5, -1.0, 0.0), &a, &b, &c);
        assert_point_eq(&hit.point, &Point3::new(0.5, 0.0, 0.0));
        assert!((hit.distance() - 1.0).abs() < 1e-12);

        let hit = closest_point_on_triangle(&Point3::new(-1.0, 0.5, 0.0), &a, &b, &c);
        assert_point_eq(&hit.point, &Point3::new(0.0, 0.5, 0.0));

        let hit = closest_point_on_triangle(&Point3::new(1.0, 1.0, 0.0), &a, &b, &c);
        assert_point_eq(&hit.point, &Point3::new(0.5, 0.5, 0.0));
        assert!((hit.barycentric[1] - 0.5).abs() < 1e-12);
        assert!((hit.barycentric[2] - 0.5).abs() < 1e-12);

        // Interior
        let hit = closest_point_on_triangle(&Point3::new(0.2, 0.3, 5.0), &a, &b, &c);
        assert_point_eq(&hit.point, &Point3::new(0.2, 0.3, 0.0));
        assert!((hit.distance_squared - 25.0).abs() < 1e-9);
        let sum: f64 = hit.barycentric.iter().sum();
        assert!((sum - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_closest_point_on_sliver() {
        let a = Point3::new(0.0, 0.0, 0.0);
        let b = Point3::new(1.0, 0.0, 0.0);
        let c = Point3::new(2.0, 0.0, 0.0);

        let hit = closest_point_on_triangle(&Point3::new(1.5, 1.0, 0.0), &a, &b, &c);
        assert_point_eq(&hit.point, &Point3::new(1.5, 0.0, 0.0));
        assert!((hit.distance() - 1.0).abs() < 1e-12);
    }
}
