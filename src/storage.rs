//! Chunked growable storage used for the point, feature and graph tables.
//!
//! Memory is allocated in fixed-size partitions rather than one contiguous
//! block, so growing the table never moves elements already stored and a
//! shrink can return whole trailing partitions to the allocator.

/// Default number of slots per partition.
pub const PARTITION_SIZE: usize = 1024;

/// A dynamically growable array made of fixed-size partitions.
#[derive(Debug, Clone)]
pub struct PartitionedArray<T> {
    partitions: Vec<Vec<T>>,
    len: usize,
    partition_size: usize,
}

impl<T> Default for PartitionedArray<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> PartitionedArray<T> {
    pub fn new() -> Self {
        Self::with_partition_size(PARTITION_SIZE)
    }

    /// Creates an array with a custom partition capacity. Small capacities are
    /// useful in tests to exercise partition boundaries.
    pub fn with_partition_size(partition_size: usize) -> Self {
        assert!(partition_size > 0, "partition size must be non-zero");
        Self {
            partitions: Vec::new(),
            len: 0,
            partition_size,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Appends an item, growing a new partition when the tail one is full,
    /// and returns its absolute index. Absolute indices are the only contract
    /// callers may hold across appends.
    pub fn push(&mut self, item: T) -> usize {
        if self.len == self.partitions.len() * self.partition_size {
            self.partitions.push(Vec::with_capacity(self.partition_size));
        }
        let last = self
            .partitions
            .last_mut()
            .unwrap_or_else(|| unreachable!("partition allocated above"));
        last.push(item);
        self.len += 1;
        self.len - 1
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        if index >= self.len {
            return None;
        }
        self.partitions
            .get(index / self.partition_size)
            .and_then(|p| p.get(index % self.partition_size))
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        if index >= self.len {
            return None;
        }
        self.partitions
            .get_mut(index / self.partition_size)
            .and_then(|p| p.get_mut(index % self.partition_size))
    }

    /// Shortens the logical content to `logical_len` elements. Elements beyond
    /// are dropped; partition memory is kept until [`Self::resize_to_fit`].
    pub fn truncate(&mut self, logical_len: usize) {
        if logical_len >= self.len {
            return;
        }
        let keep_partitions = logical_len.div_ceil(self.partition_size);
        for p in self.partitions.iter_mut().skip(keep_partitions) {
            p.clear();
        }
        if keep_partitions > 0 {
            let tail = logical_len - (keep_partitions - 1) * self.partition_size;
            self.partitions[keep_partitions - 1].truncate(tail);
        }
        self.len = logical_len;
    }

    /// Frees trailing partitions made unused by a shrink. Side effect only;
    /// logical content is unchanged.
    pub fn resize_to_fit(&mut self) {
        let needed = self.len.div_ceil(self.partition_size);
        self.partitions.truncate(needed);
        self.partitions.shrink_to_fit();
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.partitions.iter().flatten()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.partitions.iter_mut().flatten()
    }

    /// Number of partitions currently allocated.
    pub fn partition_count(&self) -> usize {
        self.partitions.len()
    }
}

impl<T> std::ops::Index<usize> for PartitionedArray<T> {
    type Output = T;
    fn index(&self, index: usize) -> &T {
        self.get(index).expect("index out of bounds")
    }
}

impl<T> std::ops::IndexMut<usize> for PartitionedArray<T> {
    fn index_mut(&mut self, index: usize) -> &mut T {
        self.get_mut(index).expect("index out of bounds")
    }
}

impl<T> FromIterator<T> for PartitionedArray<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut arr = Self::new();
        for item in iter {
            arr.push(item);
        }
        arr
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_across_partition_boundary() {
        let mut arr = PartitionedArray::with_partition_size(4);
        for i in 0..10 {
            assert_eq!(arr.push(i), i);
        }
        assert_eq!(arr.len(), 10);
        assert_eq!(arr.partition_count(), 3);
        assert_eq!(arr[0], 0);
        assert_eq!(arr[4], 4);
        assert_eq!(arr[9], 9);
        assert!(arr.get(10).is_none());
    }

    #[test]
    fn truncate_and_resize_to_fit_free_partitions() {
        let mut arr = PartitionedArray::with_partition_size(4);
        for i in 0..12 {
            arr.push(i);
        }
        arr.truncate(5);
        assert_eq!(arr.len(), 5);
        assert_eq!(arr.iter().copied().collect::<Vec<_>>(), vec![0, 1, 2, 3, 4]);
        arr.resize_to_fit();
        assert_eq!(arr.partition_count(), 2);
        // Growing again after a shrink still works.
        assert_eq!(arr.push(99), 5);
        assert_eq!(arr[5], 99);
    }

    #[test]
    fn from_iterator_collects_in_order() {
        let arr: PartitionedArray<u32> = (0..2050).collect();
        assert_eq!(arr.len(), 2050);
        assert_eq!(arr.partition_count(), 3);
        assert_eq!(arr[2049], 2049);
    }
}
