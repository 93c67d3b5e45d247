//! Shared point storage with a sorted/deduplicated watermark.

use crate::geometry::{BoundingCube, Point3};
use crate::storage::PartitionedArray;

/// The ordered sequence of 3D points belonging to a model.
///
/// Indices below `num_sorted` are kept sorted and deduplicated whenever the
/// owning model is in a post-sort state; indices are never stable across
/// sorting or deduplication, so every index held elsewhere must be remapped
/// whenever points move.
#[derive(Debug, Clone, Default)]
pub struct PointStore {
    points: PartitionedArray<Point3>,
    num_sorted: usize,
}

impl PointStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Appends a point and returns its index.
    pub fn push(&mut self, p: Point3) -> usize {
        self.points.push(p)
    }

    pub fn get(&self, index: usize) -> Option<Point3> {
        self.points.get(index).copied()
    }

    pub fn set(&mut self, index: usize, p: Point3) {
        self.points[index] = p;
    }

    pub fn iter(&self) -> impl Iterator<Item = &Point3> {
        self.points.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Point3> {
        self.points.iter_mut()
    }

    /// Count of leading points known to be sorted and deduplicated.
    pub fn num_sorted(&self) -> usize {
        self.num_sorted
    }

    pub fn set_num_sorted(&mut self, n: usize) {
        debug_assert!(n <= self.points.len());
        self.num_sorted = n;
    }

    pub fn truncate(&mut self, len: usize) {
        self.points.truncate(len);
        self.num_sorted = self.num_sorted.min(len);
    }

    /// Returns trailing partition memory after a shrink.
    pub fn resize_to_fit(&mut self) {
        self.points.resize_to_fit();
    }

    pub fn bounding_cube(&self) -> BoundingCube {
        let mut cube = BoundingCube::empty();
        for &p in self.points.iter() {
            cube.expand(p);
        }
        cube
    }
}
