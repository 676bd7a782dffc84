//! Triangle mesh access.
//!
//! Meshes are plain vertex and index buffers owned by the caller. The
//! [`TriangleAccessor`] borrows them and answers per-triangle queries: the
//! triangle's vertices, its local frame, and the closest point on it.
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
//!
//! let accessor = TriangleAccessor::new(&vertices, &indices).unwrap();
//! assert_eq!(accessor.triangle_count(), 1);
//! assert!((accessor.area(0) - 0.5).abs() < 1e-12);
//! ```

mod accessor;

pub use accessor::{closest_point_on_triangle, triangle_frame, ClosestPoint, TriangleAccessor};
