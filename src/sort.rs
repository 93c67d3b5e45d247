//! Point sorting: concurrent merge sort over index permutations.
//!
//! Points themselves are never moved during the sort; a permutation of
//! indices is sorted instead, then applied to the store and to every feature
//! reference in one shot. Everything before that commit point is scratch
//! work, so a failed or cancelled sort leaves the model untouched.

use std::cmp::Ordering;

use log::debug;
use rayon::prelude::*;

use crate::dtm::{CancelCheck, DtmObject, DtmState, TerminationFlag};
use crate::error::{DtmError, Result};
use crate::feature::PointRef;
use crate::geometry::{cmp_xy, Point3};

/// Below this point count the parallel path costs more than it saves.
pub(crate) const MULTITHREAD_THRESHOLD: usize = 100;

/// Sorts the model's points into ascending `(x, y)` order and remaps every
/// feature offset through the inverse permutation. `Data -> PointsSorted`.
pub(crate) fn sort_points(dtm: &mut DtmObject) -> Result<()> {
    if dtm.state != DtmState::Data {
        return Err(dtm.invalid_state("Data"));
    }
    let n = dtm.points.len();
    if n <= 1 {
        dtm.convert_data_features_to_offsets();
        dtm.points.set_num_sorted(n);
        dtm.state = DtmState::PointsSorted;
        return Ok(());
    }
    dtm.check_cancelled()?;

    let mut keys: Vec<Point3> = Vec::new();
    keys.try_reserve_exact(n)
        .map_err(|_| DtmError::OutOfMemory("allocating sort keys"))?;
    keys.extend(dtm.points.iter().copied());

    let mut order: Vec<usize> = Vec::new();
    order
        .try_reserve_exact(n)
        .map_err(|_| DtmError::OutOfMemory("allocating sort permutation"))?;
    order.extend(0..n);

    let mut temp: Vec<usize> = Vec::new();
    temp.try_reserve_exact(n)
        .map_err(|_| DtmError::OutOfMemory("allocating sort scratch"))?;
    temp.resize(n, 0);

    let workers = dtm.effective_workers();
    if n >= MULTITHREAD_THRESHOLD && workers > 1 {
        parallel_merge_sort(&mut order, &mut temp, &keys, workers, &dtm.termination_flag())?;
        debug!("sorted {n} points on {workers} workers");
    } else {
        let mut cancel = CancelCheck::new(dtm.termination_flag());
        merge_sort(&mut order, &mut temp, &keys, &mut Some(&mut cancel))?;
        debug!("sorted {n} points sequentially");
    }
    dtm.check_cancelled()?;

    // Inverse permutation: where each old index ended up.
    let mut new_of_old: Vec<usize> = Vec::new();
    new_of_old
        .try_reserve_exact(n)
        .map_err(|_| DtmError::OutOfMemory("allocating sort remap table"))?;
    new_of_old.resize(n, 0);
    for (k, &old) in order.iter().enumerate() {
        new_of_old[old] = k;
    }

    // Commit point: restructure features, apply the permutation to the
    // store, then remap offsets.
    dtm.convert_data_features_to_offsets();
    for (k, &old) in order.iter().enumerate() {
        dtm.points.set(k, keys[old]);
    }
    for f in dtm.features.live_mut() {
        if let PointRef::Offsets(offsets) = &mut f.points {
            for o in offsets.iter_mut() {
                *o = *new_of_old
                    .get(*o)
                    .ok_or(DtmError::IndexRange { index: *o, len: n })?;
            }
        }
    }
    dtm.points.set_num_sorted(n);
    dtm.state = DtmState::PointsSorted;
    dtm.debug_validate_features();
    Ok(())
}

/// Two-level scheme: the permutation is cut into one contiguous slice per
/// worker, slices are sorted in parallel, then merged pairwise into a growing
/// sorted prefix. All of it is scratch work, so cancellation can land
/// anywhere inside.
fn parallel_merge_sort(
    order: &mut [usize],
    temp: &mut [usize],
    keys: &[Point3],
    workers: usize,
    flag: &TerminationFlag,
) -> Result<()> {
    let n = order.len();
    let slice_len = n / workers + 1;
    order
        .par_chunks_mut(slice_len)
        .zip(temp.par_chunks_mut(slice_len))
        .try_for_each(|(o, t)| {
            // Each worker checks the shared flag on its own interval.
            let mut cancel = CancelCheck::new(flag.clone());
            merge_sort(o, t, keys, &mut Some(&mut cancel))
        })?;
    let mut cancel = CancelCheck::new(flag.clone());
    let mut merged = slice_len.min(n);
    while merged < n {
        let next = (merged + slice_len).min(n);
        merge_halves(&mut order[..next], merged, &mut temp[..next], keys, &mut Some(&mut cancel))?;
        merged = next;
    }
    Ok(())
}

fn merge_sort(
    order: &mut [usize],
    temp: &mut [usize],
    keys: &[Point3],
    cancel: &mut Option<&mut CancelCheck>,
) -> Result<()> {
    let n = order.len();
    if n <= 1 {
        return Ok(());
    }
    let mid = n / 2;
    merge_sort(&mut order[..mid], &mut temp[..mid], keys, cancel)?;
    merge_sort(&mut order[mid..], &mut temp[mid..], keys, cancel)?;
    merge_halves(order, mid, temp, keys, cancel)
}

/// Merges `order[..mid]` and `order[mid..]`, both sorted, into `order`.
/// Stable: ties keep the left half first.
fn merge_halves(
    order: &mut [usize],
    mid: usize,
    temp: &mut [usize],
    keys: &[Point3],
    cancel: &mut Option<&mut CancelCheck>,
) -> Result<()> {
    let n = order.len();
    temp[..n].copy_from_slice(order);
    let (mut i, mut j, mut k) = (0, mid, 0);
    while i < mid && j < n {
        if let Some(c) = cancel {
            c.tick()?;
        }
        if cmp_xy(keys[temp[i]], keys[temp[j]]) != Ordering::Greater {
            order[k] = temp[i];
            i += 1;
        } else {
            order[k] = temp[j];
            j += 1;
        }
        k += 1;
    }
    order[k..k + (mid - i)].copy_from_slice(&temp[i..mid]);
    order[k + (mid - i)..].copy_from_slice(&temp[j..n]);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature::{FeatureState, FeatureType};

    fn key(x: f64, y: f64) -> Point3 {
        Point3::new(x, y, 0.0)
    }

    #[test]
    fn merge_sort_orders_indices() {
        let keys = vec![key(3.0, 0.0), key(1.0, 2.0), key(1.0, 1.0), key(0.0, 9.0)];
        let mut order: Vec<usize> = (0..keys.len()).collect();
        let mut temp = vec![0; keys.len()];
        merge_sort(&mut order, &mut temp, &keys, &mut None).unwrap();
        assert_eq!(order, vec![3, 2, 1, 0]);
    }

    #[test]
    fn parallel_matches_sequential() {
        let mut keys = Vec::new();
        // Deterministic LCG input, long enough to span several slices.
        let mut s: u64 = 0x2545_f491_4f6c_dd1d;
        for _ in 0..257 {
            s = s.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            let x = (s >> 33) as f64 / 1.0e6;
            s = s.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            let y = (s >> 33) as f64 / 1.0e6;
            keys.push(key(x, y));
        }
        let mut seq: Vec<usize> = (0..keys.len()).collect();
        let mut temp = vec![0; keys.len()];
        merge_sort(&mut seq, &mut temp, &keys, &mut None).unwrap();
        let flag = TerminationFlag::new();
        for workers in [2, 3, 7] {
            let mut par: Vec<usize> = (0..keys.len()).collect();
            let mut t = vec![0; keys.len()];
            parallel_merge_sort(&mut par, &mut t, &keys, workers, &flag).unwrap();
            assert_eq!(par, seq, "worker count {workers}");
        }
    }

    #[test]
    fn cancellation_is_observed_inside_a_long_merge() {
        let keys: Vec<Point3> = (0..3000).map(|i| key((i % 97) as f64, i as f64)).collect();
        let flag = TerminationFlag::new();
        flag.request_stop();

        let mut order: Vec<usize> = (0..keys.len()).collect();
        let mut temp = vec![0; keys.len()];
        let mut cancel = CancelCheck::new(flag.clone());
        let err = merge_sort(&mut order, &mut temp, &keys, &mut Some(&mut cancel)).unwrap_err();
        assert_eq!(err, DtmError::Cancelled);

        let mut order: Vec<usize> = (0..keys.len()).collect();
        let err = parallel_merge_sort(&mut order, &mut temp, &keys, 3, &flag).unwrap_err();
        assert_eq!(err, DtmError::Cancelled);
    }

    #[test]
    fn cancelled_sort_leaves_features_in_data_state() {
        let mut dtm = DtmObject::new();
        let id = dtm
            .store_feature(
                FeatureType::Breakline,
                0,
                &[key(2.0, 0.0), key(1.0, 0.0), key(3.0, 0.0)],
            )
            .unwrap();
        dtm.termination_flag().request_stop();
        assert_eq!(dtm.sort().unwrap_err(), DtmError::Cancelled);
        let f = dtm.feature(id).unwrap();
        assert_eq!(f.state, FeatureState::Data);
        assert!(matches!(f.points, PointRef::Range { .. }));
        assert_eq!(dtm.state(), DtmState::Data);
        assert_eq!(dtm.point(0).unwrap().x, 2.0);
    }

    #[test]
    fn sorting_remaps_feature_offsets() {
        let mut dtm = DtmObject::new();
        let pts = vec![key(5.0, 0.0), key(1.0, 0.0), key(3.0, 0.0)];
        let id = dtm.store_feature(FeatureType::Breakline, 0, &pts).unwrap();
        dtm.sort().unwrap();
        assert_eq!(dtm.state(), DtmState::PointsSorted);
        // Store is ordered, and the feature still names the same coordinates.
        assert_eq!(dtm.point(0).unwrap().x, 1.0);
        assert_eq!(dtm.point(2).unwrap().x, 5.0);
        let walked = dtm.feature_points(id).unwrap();
        assert_eq!(walked, pts);
    }

    #[test]
    fn sorting_twice_is_rejected() {
        let mut dtm = DtmObject::new();
        dtm.add_spots(&[key(1.0, 0.0), key(0.0, 0.0)]).unwrap();
        dtm.sort().unwrap();
        assert!(matches!(dtm.sort(), Err(DtmError::InvalidState { .. })));
    }
}
