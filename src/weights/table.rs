//! Sparse per-point joint storage.
//!
//! A [`WeightTable`] associates every target point with a short list of
//! [`Joint`]s, each a reference triangle plus a relative weight. All joints
//! live in one shared array; each point owns a contiguous slot region
//! described by an offset, and the number of live joints at the front of that
//! region is stored separately. Weights are not normalized when stored;
//! [`WeightTable::compute_deformed_point`] divides by their sum.
//!
//! Out-of-range point, slot or triangle indices are programmer errors and
//! panic.

use nalgebra::{Matrix4, Point3, Vector3};

use crate::parallel::Executor;

/// A weighted association between a point and a reference triangle.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Joint {
    /// Index of the reference triangle.
    pub triangle: u32,
    /// Relative influence of the triangle.
    pub weight: f64,
}

impl Joint {
    /// Create a new joint.
    #[inline]
    pub fn new(triangle: usize, weight: f64) -> Self {
        Self {
            triangle: triangle as u32,
            weight,
        }
    }
}

/// Per-point joint lists backed by a single joint array.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightTable {
    /// Start of each point's slot region in `joints`.
    offsets: Vec<usize>,
    /// Live joints per point, stored at the front of its region.
    counts: Vec<usize>,
    joints: Vec<Joint>,
}

impl WeightTable {
    /// Create a table with `joints_per_point` empty slots for each point.
    pub fn new(point_count: usize, joints_per_point: usize) -> Self {
        Self {
            offsets: (0..point_count).map(|i| i * joints_per_point).collect(),
            counts: vec![0; point_count],
            joints: vec![Joint::default(); point_count * joints_per_point],
        }
    }

    /// Number of points in the table.
    #[inline]
    pub fn point_count(&self) -> usize {
        self.counts.len()
    }

    /// Total number of joint slots, live or not.
    #[inline]
    pub fn slot_count(&self) -> usize {
        self.joints.len()
    }

    /// Total number of live joints across all points.
    pub fn total_joint_count(&self) -> usize {
        self.counts.iter().sum()
    }

    /// Whether every slot holds a live joint.
    pub fn is_packed(&self) -> bool {
        self.total_joint_count() == self.slot_count()
    }

    /// Number of slots reserved for a point.
    #[inline]
    pub fn capacity(&self, point: usize) -> usize {
        let end = self
            .offsets
            .get(point + 1)
            .copied()
            .unwrap_or(self.joints.len());
        end - self.offsets[point]
    }

    /// Number of live joints for a point.
    #[inline]
    pub fn joint_count(&self, point: usize) -> usize {
        self.counts[point]
    }

    /// Set the number of live joints for a point.
    ///
    /// # Panics
    ///
    /// Panics if `count` exceeds the point's capacity.
    #[inline]
    pub fn set_joint_count(&mut self, point: usize, count: usize) {
        assert!(
            count <= self.capacity(point),
            "joint count {} exceeds capacity {} of point {}",
            count,
            self.capacity(point),
            point
        );
        self.counts[point] = count;
    }

    /// Get a joint slot of a point.
    #[inline]
    pub fn joint(&self, point: usize, slot: usize) -> Joint {
        debug_assert!(slot < self.capacity(point));
        self.joints[self.offsets[point] + slot]
    }

    /// Overwrite a joint slot of a point.
    #[inline]
    pub fn set_joint(&mut self, point: usize, slot: usize, joint: Joint) {
        debug_assert!(slot < self.capacity(point));
        let offset = self.offsets[point];
        self.joints[offset + slot] = joint;
    }

    /// The live joints of a point.
    #[inline]
    pub fn joints(&self, point: usize) -> &[Joint] {
        let offset = self.offsets[point];
        &self.joints[offset..offset + self.counts[point]]
    }

    /// Drop joints whose `weight / max_weight` falls below `threshold`.
    ///
    /// Only the first `current_count` slots of the point are considered.
    /// Survivors keep their relative order and move to the front; the stored
    /// count is updated and returned.
    pub fn filter_joints(
        &mut self,
        point: usize,
        current_count: usize,
        max_weight: f64,
        threshold: f64,
    ) -> usize {
        let offset = self.offsets[point];
        let capacity = self.capacity(point);
        let slots = &mut self.joints[offset..offset + capacity];
        let kept = filter_slots(slots, current_count, max_weight, threshold);
        self.counts[point] = kept;
        kept
    }

    /// Evaluate the deformed position of `point`, the target point stored at
    /// `point_index`.
    ///
    /// Computes `Σ w·(delta[t] · point) / Σ w` over the point's joints.
    #[inline]
    pub fn compute_deformed_point(
        &self,
        point: &Point3<f64>,
        point_index: usize,
        triangle_deltas: &[Matrix4<f64>],
    ) -> Point3<f64> {
        let mut sum = Vector3::zeros();
        let mut total = 0.0;
        for joint in self.joints(point_index) {
            let moved = triangle_deltas[joint.triangle as usize].transform_point(point);
            sum += moved.coords * joint.weight;
            total += joint.weight;
        }
        debug_assert!(total != 0.0, "point {} has no weight", point_index);
        Point3::from(sum / total)
    }

    /// Copy the table keeping only live joint slots.
    pub fn packed_copy(&self) -> WeightTable {
        let mut offsets = Vec::with_capacity(self.point_count());
        let mut joints = Vec::with_capacity(self.total_joint_count());
        for point in 0..self.point_count() {
            offsets.push(joints.len());
            joints.extend_from_slice(self.joints(point));
        }
        WeightTable {
            offsets,
            counts: self.counts.clone(),
            joints,
        }
    }

    /// Fill the table, one work item per point.
    ///
    /// Each call of `f` receives the [`JointSlots`] of a single point, so
    /// items never touch each other's data.
    pub fn populate<F>(&mut self, exec: &Executor, f: F)
    where
        F: Fn(&mut JointSlots<'_>) + Sync + Send,
    {
        let capacities: Vec<usize> = (0..self.point_count()).map(|p| self.capacity(p)).collect();

        let mut rest: &mut [Joint] = &mut self.joints;
        let mut views = Vec::with_capacity(capacities.len());
        for (point, (count, &capacity)) in self.counts.iter_mut().zip(&capacities).enumerate() {
            let (slots, tail) = std::mem::take(&mut rest).split_at_mut(capacity);
            rest = tail;
            views.push(JointSlots {
                point,
                slots,
                count,
            });
        }

        exec.for_each(views, |mut view| f(&mut view));
    }
}

/// Mutable view of one point's slot region, handed out by
/// [`WeightTable::populate`].
#[derive(Debug)]
pub struct JointSlots<'a> {
    point: usize,
    slots: &'a mut [Joint],
    count: &'a mut usize,
}

impl JointSlots<'_> {
    /// Index of the point these slots belong to.
    #[inline]
    pub fn point(&self) -> usize {
        self.point
    }

    /// Number of slots reserved for the point.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of live joints.
    #[inline]
    pub fn count(&self) -> usize {
        *self.count
    }

    /// Set the number of live joints.
    #[inline]
    pub fn set_count(&mut self, count: usize) {
        assert!(count <= self.slots.len());
        *self.count = count;
    }

    /// Get a slot.
    #[inline]
    pub fn joint(&self, slot: usize) -> Joint {
        self.slots[slot]
    }

    /// Overwrite a slot.
    #[inline]
    pub fn set_joint(&mut self, slot: usize, joint: Joint) {
        self.slots[slot] = joint;
    }

    /// Same as [`WeightTable::filter_joints`] for this point.
    pub fn filter(&mut self, current_count: usize, max_weight: f64, threshold: f64) -> usize {
        let kept = filter_slots(self.slots, current_count, max_weight, threshold);
        *self.count = kept;
        kept
    }
}

fn filter_slots(slots: &mut [Joint], count: usize, max_weight: f64, threshold: f64) -> usize {
    let mut kept = 0;
    for i in 0..count {
        let joint = slots[i];
        if joint.weight / max_weight >= threshold {
            slots[kept] = joint;
            kept += 1;
        }
    }
    kept
}
