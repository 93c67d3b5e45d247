//! Duplicate point removal over the sorted point store.
//!
//! Works in two phases: a scratch-only scan that tags every point as either a
//! representative or mapped onto one, then a commit that compacts the store
//! and rewrites feature offsets through the tag table. Cancellation can only
//! land inside the scan, so an interrupted run leaves the model unchanged.

use log::debug;

use crate::dtm::{CancelCheck, DtmObject, DtmState};
use crate::error::{DtmError, Result};
use crate::feature::{FeatureId, PointRef};
use crate::geometry::{distance_2d, Point3};
use crate::rollback;

/// Which points count as duplicates of one another.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicatePolicy {
    /// Only bitwise-identical `(x, y)` pairs merge. Elevation never enters
    /// the predicate.
    ExactOnly,
    /// Points within the configured point-to-point tolerance in the plane
    /// merge onto the first of them.
    Tolerance,
}

/// Verdict for one point after the duplicate scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DupTag {
    Representative,
    /// Merged onto the point at this pre-compaction index.
    MappedTo(usize),
}

fn resolve(tags: &[DupTag], mut i: usize) -> usize {
    while let DupTag::MappedTo(j) = tags[i] {
        i = j;
    }
    i
}

/// Merges duplicate points and remaps every feature offset.
/// `PointsSorted -> DuplicatesRemoved`. Returns the number of removed points.
pub(crate) fn remove_duplicates(dtm: &mut DtmObject, policy: DuplicatePolicy) -> Result<usize> {
    if dtm.state != DtmState::PointsSorted {
        return Err(dtm.invalid_state("PointsSorted"));
    }
    let n = dtm.points.len();
    let tol = match policy {
        DuplicatePolicy::ExactOnly => 0.0,
        DuplicatePolicy::Tolerance => dtm.tolerances.pp_tol,
    };

    let mut keys: Vec<Point3> = Vec::new();
    keys.try_reserve_exact(n)
        .map_err(|_| DtmError::OutOfMemory("allocating duplicate-scan keys"))?;
    keys.extend(dtm.points.iter().copied());

    let mut tags: Vec<DupTag> = Vec::new();
    tags.try_reserve_exact(n)
        .map_err(|_| DtmError::OutOfMemory("allocating duplicate tags"))?;
    tags.resize(n, DupTag::Representative);

    let mut removed = 0usize;
    let mut cancel = CancelCheck::new(dtm.termination_flag());
    for i in 0..n {
        cancel.tick()?;
        if tags[i] != DupTag::Representative {
            continue;
        }
        let pi = keys[i];
        let mut j = i + 1;
        while j < n {
            let pj = keys[j];
            let dx = pj.x - pi.x;
            if dx > tol {
                break;
            }
            if tags[j] == DupTag::Representative {
                let dy = pj.y - pi.y;
                let dup = match policy {
                    DuplicatePolicy::ExactOnly => dx == 0.0 && dy == 0.0,
                    DuplicatePolicy::Tolerance => distance_2d(pi, pj) <= tol,
                };
                if dup {
                    tags[j] = DupTag::MappedTo(i);
                    removed += 1;
                } else if dx == 0.0 && dy > tol {
                    // Same x, already too far in y: every later point of this
                    // x column is farther still, so jump past the column.
                    while j + 1 < n && keys[j + 1].x == pi.x {
                        j += 1;
                    }
                }
            }
            j += 1;
            cancel.tick()?;
        }
    }

    if removed > 0 {
        capture_altered_features(dtm, &keys, &tags)?;
    }

    // Commit: compact representatives forward and build the shift table.
    let mut new_index: Vec<usize> = Vec::new();
    new_index
        .try_reserve_exact(n)
        .map_err(|_| DtmError::OutOfMemory("allocating duplicate shift table"))?;
    new_index.resize(n, usize::MAX);
    let mut w = 0usize;
    for i in 0..n {
        if tags[i] == DupTag::Representative {
            if w != i {
                dtm.points.set(w, keys[i]);
            }
            new_index[i] = w;
            w += 1;
        }
    }
    dtm.points.truncate(w);
    dtm.points.resize_to_fit();
    dtm.points.set_num_sorted(w);

    for f in dtm.features.live_mut() {
        if let PointRef::Offsets(offsets) = &mut f.points {
            for o in offsets.iter_mut() {
                if *o >= n {
                    return Err(DtmError::IndexRange { index: *o, len: n });
                }
                *o = new_index[resolve(&tags, *o)];
            }
        }
    }
    dtm.state = DtmState::DuplicatesRemoved;
    dtm.debug_validate_features();
    debug!("removed {removed} duplicate points, {w} remain");
    Ok(removed)
}

/// Snapshots every non-structural feature whose geometry the merge is about
/// to change, before any offset is rewritten. Bitwise-identical merges do not
/// alter geometry and need no snapshot.
fn capture_altered_features(dtm: &mut DtmObject, keys: &[Point3], tags: &[DupTag]) -> Result<()> {
    if dtm.rollback.is_none() {
        return Ok(());
    }
    let mut altered: Vec<FeatureId> = Vec::new();
    for f in dtm.features.live() {
        if f.feature_type.is_structural() {
            continue;
        }
        if let PointRef::Offsets(offsets) = &f.points {
            let moved = offsets.iter().any(|&o| {
                o < keys.len() && tags[o] != DupTag::Representative && keys[resolve(tags, o)] != keys[o]
            });
            if moved {
                altered.push(f.id);
            }
        }
    }
    for id in altered {
        rollback::capture_feature(dtm, id)?;
    }
    Ok(())
}

/// Collapses consecutive repeated offsets inside each feature, then deletes
/// non-spot features left with at most one point.
/// Returns the number of deleted features.
pub(crate) fn remove_duplicate_offsets(dtm: &mut DtmObject) -> Result<usize> {
    if dtm.state != DtmState::DuplicatesRemoved {
        return Err(dtm.invalid_state("DuplicatesRemoved"));
    }
    // Snapshot before mutating: a collapsing feature loses its repeated
    // vertices for good.
    if dtm.rollback.is_some() {
        let collapsing: Vec<FeatureId> = dtm
            .features
            .live()
            .filter(|f| !f.feature_type.is_structural())
            .filter(|f| match &f.points {
                PointRef::Offsets(offsets) => offsets.windows(2).any(|w| w[0] == w[1]),
                _ => false,
            })
            .map(|f| f.id)
            .collect();
        for id in collapsing {
            rollback::capture_feature(dtm, id)?;
        }
    }
    let mut to_delete: Vec<FeatureId> = Vec::new();
    for f in dtm.features.live_mut() {
        if let PointRef::Offsets(offsets) = &mut f.points {
            offsets.dedup();
            f.point_count = offsets.len();
            if offsets.len() <= 1 && !f.feature_type.is_spots() {
                to_delete.push(f.id);
            }
        }
    }
    let deleted = to_delete.len();
    for id in to_delete {
        dtm.features.delete(id)?;
    }
    if deleted > 0 {
        debug!("deleted {deleted} features collapsed by duplicate removal");
    }
    dtm.debug_validate_features();
    Ok(deleted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature::FeatureType;

    fn p(x: f64, y: f64, z: f64) -> Point3 {
        Point3::new(x, y, z)
    }

    #[test]
    fn exact_duplicates_merge_and_remap() {
        let mut dtm = DtmObject::new();
        let id = dtm
            .store_feature(
                FeatureType::Breakline,
                0,
                &[p(0.0, 0.0, 1.0), p(5.0, 0.0, 2.0), p(0.0, 0.0, 9.0)],
            )
            .unwrap();
        dtm.sort().unwrap();
        let removed = dtm.remove_duplicates(DuplicatePolicy::ExactOnly).unwrap();
        assert_eq!(removed, 1);
        assert_eq!(dtm.num_points(), 2);
        assert_eq!(dtm.state(), DtmState::DuplicatesRemoved);
        // First occurrence wins, so the merged point keeps z = 1.0.
        let pts = dtm.feature_points(id).unwrap();
        assert_eq!(pts[0], p(0.0, 0.0, 1.0));
        assert_eq!(pts[2], p(0.0, 0.0, 1.0));
    }

    #[test]
    fn exact_policy_keeps_near_points() {
        let mut dtm = DtmObject::new();
        dtm.add_spots(&[p(0.0, 0.0, 0.0), p(1e-9, 0.0, 0.0)]).unwrap();
        dtm.sort().unwrap();
        assert_eq!(dtm.remove_duplicates(DuplicatePolicy::ExactOnly).unwrap(), 0);
        assert_eq!(dtm.num_points(), 2);
    }

    #[test]
    fn tolerance_policy_merges_near_points() {
        let mut dtm = DtmObject::new();
        dtm.set_triangulation_parameters(0.5, 0.5, 2, 1000.0).unwrap();
        dtm.add_spots(&[p(0.0, 0.0, 0.0), p(0.3, 0.0, 5.0), p(2.0, 0.0, 0.0)])
            .unwrap();
        dtm.sort().unwrap();
        assert_eq!(dtm.remove_duplicates(DuplicatePolicy::Tolerance).unwrap(), 1);
        assert_eq!(dtm.num_points(), 2);
    }

    #[test]
    fn equal_x_column_is_skipped_not_mismerged() {
        let mut dtm = DtmObject::new();
        dtm.set_triangulation_parameters(0.1, 0.1, 2, 1000.0).unwrap();
        // A tall column of same-x points far apart in y, plus one true dup.
        dtm.add_spots(&[
            p(1.0, 0.0, 0.0),
            p(1.0, 5.0, 0.0),
            p(1.0, 10.0, 0.0),
            p(1.0, 15.0, 0.0),
            p(1.0, 0.05, 0.0),
        ])
        .unwrap();
        dtm.sort().unwrap();
        assert_eq!(dtm.remove_duplicates(DuplicatePolicy::Tolerance).unwrap(), 1);
        assert_eq!(dtm.num_points(), 4);
    }

    #[test]
    fn collapsed_feature_is_deleted() {
        let mut dtm = DtmObject::new();
        let line = dtm
            .store_feature(FeatureType::Breakline, 7, &[p(0.0, 0.0, 0.0), p(0.0, 0.0, 0.0)])
            .unwrap();
        let keep = dtm
            .store_feature(FeatureType::Breakline, 8, &[p(3.0, 0.0, 0.0), p(4.0, 0.0, 0.0)])
            .unwrap();
        dtm.sort().unwrap();
        dtm.remove_duplicates(DuplicatePolicy::ExactOnly).unwrap();
        assert_eq!(dtm.remove_duplicate_offsets().unwrap(), 1);
        assert!(dtm.feature(line).is_none());
        assert!(dtm.feature(keep).is_some());
    }

    #[test]
    fn second_pass_removes_nothing() {
        let mut dtm = DtmObject::new();
        dtm.set_triangulation_parameters(0.5, 0.5, 2, 1000.0).unwrap();
        dtm.add_spots(&[
            p(0.0, 0.0, 0.0),
            p(0.3, 0.0, 5.0),
            p(2.0, 0.0, 0.0),
            p(2.0, 0.2, 1.0),
            p(7.0, 3.0, 0.0),
        ])
        .unwrap();
        dtm.sort().unwrap();
        assert_eq!(dtm.remove_duplicates(DuplicatePolicy::Tolerance).unwrap(), 2);
        // Survivors are unique under the tolerance, so rerunning the whole
        // scan over them must be a no-op.
        dtm.change_state_to_data().unwrap();
        dtm.sort().unwrap();
        assert_eq!(dtm.remove_duplicates(DuplicatePolicy::Tolerance).unwrap(), 0);
        assert_eq!(dtm.num_points(), 3);
    }

    #[test]
    fn dedup_requires_sorted_state() {
        let mut dtm = DtmObject::new();
        dtm.add_spots(&[p(0.0, 0.0, 0.0)]).unwrap();
        assert!(matches!(
            dtm.remove_duplicates(DuplicatePolicy::ExactOnly),
            Err(DtmError::InvalidState { .. })
        ));
    }
}
