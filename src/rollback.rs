//! Rollback store, state reconstruction and model merging.
//!
//! While a triangulation runs, features the pipeline is about to alter are
//! snapshotted into a side model. After a successful run the snapshots are
//! re-attached to the primary feature table as `Rollback`-state features, so
//! a later [`rollback`] can reproduce the pre-triangulation content exactly
//! instead of approximating it from the graph.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use log::debug;
use once_cell::sync::Lazy;

use crate::dtm::{CleanupPolicy, DtmObject, DtmState};
use crate::error::{DtmError, Result};
use crate::feature::{
    FeatureId, FeatureState, FeatureTable, FeatureType, PointRef, UserTag, NULL_USER_TAG,
};
use crate::geometry::Point3;
use crate::point_store::PointStore;

/// Replacement rollback procedure, installable by embedding applications.
pub type RollbackHook = fn(&mut DtmObject) -> Result<()>;

static ROLLBACK_OVERRIDE: Lazy<Mutex<Option<RollbackHook>>> = Lazy::new(|| Mutex::new(None));

/// Largest `RandomSpots` batch synthesized for unclaimed points.
const MAX_SPOT_BATCH: usize = 1000;

/// Installs (or clears) a process-wide replacement for [`rollback`].
pub fn set_rollback_override(hook: Option<RollbackHook>) {
    if let Ok(mut guard) = ROLLBACK_OVERRIDE.lock() {
        *guard = hook;
    }
}

fn rollback_override() -> Option<RollbackHook> {
    ROLLBACK_OVERRIDE.lock().ok().and_then(|g| *g)
}

/// Side model holding pre-triangulation snapshots while a pipeline runs.
#[derive(Debug, Clone, Default)]
pub(crate) struct RollbackData {
    pub(crate) store: Box<DtmObject>,
    captured: HashSet<FeatureId>,
}

/// Creates the rollback store if the model does not carry one yet.
pub(crate) fn ensure_store(dtm: &mut DtmObject) {
    if dtm.rollback.is_none() {
        dtm.rollback = Some(RollbackData::default());
    }
}

/// Snapshots a feature's current geometry into the rollback store. Idempotent
/// per feature: only the first capture (the oldest geometry) is kept. A no-op
/// when no store exists.
pub(crate) fn capture_feature(dtm: &mut DtmObject, id: FeatureId) -> Result<()> {
    let Some(mut rb) = dtm.rollback.take() else {
        return Ok(());
    };
    let result = capture_into(dtm, &mut rb, id);
    dtm.rollback = Some(rb);
    result
}

fn capture_into(dtm: &DtmObject, rb: &mut RollbackData, id: FeatureId) -> Result<()> {
    if rb.captured.contains(&id) {
        return Ok(());
    }
    let feature = dtm.features.get(id).ok_or(DtmError::FeatureNotFound(id))?;
    let points = dtm.resolve_feature_points(feature)?;
    let mut buf: Vec<Point3> = Vec::new();
    buf.try_reserve_exact(points.len())
        .map_err(|_| DtmError::OutOfMemory("capturing feature geometry"))?;
    buf.extend(points);
    let copy = rb.store.features.store(
        feature.feature_type,
        feature.user_tag,
        FeatureState::Rollback,
        PointRef::Owned(buf),
    );
    if let Some(f) = rb.store.features.get_mut(copy) {
        f.origin = Some(id);
    }
    rb.captured.insert(id);
    debug!("captured feature {id:?} for rollback");
    Ok(())
}

/// Moves every snapshot out of the rollback store into the primary feature
/// table, as `Rollback`-state features remembering their origin. Called once
/// triangulation has succeeded; the store itself is dropped.
pub(crate) fn reattach_rollback_features(dtm: &mut DtmObject) {
    let Some(rb) = dtm.rollback.take() else {
        return;
    };
    let mut count = 0usize;
    for f in rb.store.features.iter() {
        if f.state != FeatureState::Rollback {
            continue;
        }
        let id = dtm.features.store(
            f.feature_type,
            f.user_tag,
            FeatureState::Rollback,
            f.points.clone(),
        );
        if let Some(nf) = dtm.features.get_mut(id) {
            nf.origin = f.origin;
        }
        count += 1;
    }
    if count > 0 {
        debug!("re-attached {count} rollback snapshots");
    }
}

/// Undoes a triangulation, reproducing the pre-triangulation feature
/// partition from the attached snapshots. Requires the `Tin` state and
/// `CleanupPolicy::All`.
pub(crate) fn rollback(dtm: &mut DtmObject) -> Result<()> {
    if let Some(hook) = rollback_override() {
        return hook(dtm);
    }
    if dtm.state != DtmState::Tin || dtm.cleanup != CleanupPolicy::All {
        return Err(dtm.invalid_state("Tin with CleanupPolicy::All"));
    }
    reconstruct_data_state(dtm, true)
}

struct Restored {
    id: FeatureId,
    feature_type: FeatureType,
    user_tag: UserTag,
    points: Vec<Point3>,
}

/// Rebuilds the model in the `Data` state from whatever state it is in.
///
/// With `use_snapshots` the attached `Rollback` snapshots override the graph
/// for the features they cover (an exact undo); without it features are
/// re-expressed structurally from their current representation and snapshots
/// are discarded. Points not claimed by any surviving feature come back as
/// `RandomSpots` batches.
pub(crate) fn reconstruct_data_state(dtm: &mut DtmObject, use_snapshots: bool) -> Result<()> {
    let snapshot: Vec<_> = dtm.features.iter().cloned().collect();

    // Snapshot geometry keyed by the feature it belongs to. Entries whose
    // origin no longer exists (deleted mid-pipeline) are restored on their
    // own afterwards, in capture order.
    let mut captured: HashMap<FeatureId, usize> = HashMap::new();
    let mut capture_order: Vec<Restored> = Vec::new();
    if use_snapshots {
        for f in &snapshot {
            if f.state != FeatureState::Rollback {
                continue;
            }
            if let PointRef::Owned(points) = &f.points {
                let key = f.origin.unwrap_or(f.id);
                captured.insert(key, capture_order.len());
                capture_order.push(Restored {
                    id: key,
                    feature_type: f.feature_type,
                    user_tag: f.user_tag,
                    points: points.clone(),
                });
            }
        }
    }

    let mut restored: Vec<Restored> = Vec::new();
    let mut used_captures: HashSet<FeatureId> = HashSet::new();
    let mut claimed = vec![false; dtm.points.len()];
    for f in &snapshot {
        if matches!(f.state, FeatureState::Deleted | FeatureState::Rollback) {
            continue;
        }
        // The hull synthesized by triangulation never existed as user
        // content; it neither claims points nor survives reconstruction.
        let synthesized_hull = f.feature_type == FeatureType::Hull
            && f.user_tag == NULL_USER_TAG
            && f.state == FeatureState::Tin;
        if synthesized_hull {
            continue;
        }
        let indices: Option<Vec<usize>> = match &f.points {
            PointRef::Range { first, count } => Some((*first..*first + *count).collect()),
            PointRef::Offsets(offsets) => Some(offsets.clone()),
            PointRef::Graph { start_point } => {
                let graph = dtm
                    .graph
                    .as_ref()
                    .ok_or(DtmError::Consistency("graph reference without adjacency graph"))?;
                Some(graph.walk_feature(f.id, *start_point)?)
            }
            PointRef::Owned(_) | PointRef::None => None,
        };
        if let Some(indices) = &indices {
            for &i in indices {
                if i < claimed.len() {
                    claimed[i] = true;
                }
            }
        }
        let mut points = if let Some(i) = captured.get(&f.id) {
            used_captures.insert(f.id);
            capture_order[*i].points.clone()
        } else {
            match indices {
                Some(indices) => dtm.gather_offset_points(&indices)?,
                None => match &f.points {
                    PointRef::Owned(points) => points.clone(),
                    _ => Vec::new(),
                },
            }
        };
        // A ring walk repeats its start point; the stored form does not.
        if matches!(f.points, PointRef::Graph { .. })
            && f.feature_type.is_polygonal()
            && points.len() > 1
            && points.first() == points.last()
        {
            points.pop();
        }
        if points.is_empty() {
            continue;
        }
        restored.push(Restored {
            id: f.id,
            feature_type: f.feature_type,
            user_tag: f.user_tag,
            points,
        });
    }
    for r in capture_order {
        if !used_captures.contains(&r.id) && !r.points.is_empty() {
            restored.push(r);
        }
    }

    let unclaimed: Vec<Point3> = dtm
        .points
        .iter()
        .enumerate()
        .filter(|(i, _)| !claimed[*i])
        .map(|(_, &p)| p)
        .collect();

    let mut points = PointStore::new();
    let mut features = FeatureTable::new();
    features.reserve_ids(dtm.features.next_id());
    for r in &restored {
        let first = points.len();
        for &p in &r.points {
            points.push(p);
        }
        features.store_with_id(
            r.id,
            r.feature_type,
            r.user_tag,
            FeatureState::Data,
            PointRef::Range { first, count: r.points.len() },
        );
    }
    for batch in unclaimed.chunks(MAX_SPOT_BATCH) {
        let first = points.len();
        for &p in batch {
            points.push(p);
        }
        features.store(
            FeatureType::RandomSpots,
            NULL_USER_TAG,
            FeatureState::Data,
            PointRef::Range { first, count: batch.len() },
        );
    }

    debug!(
        "reconstructed Data state: {} features, {} points ({} unclaimed)",
        features.live_len(),
        points.len(),
        unclaimed.len()
    );
    dtm.points = points;
    dtm.features = features;
    dtm.graph = None;
    dtm.rollback = None;
    dtm.normalization = None;
    dtm.state = DtmState::Data;
    dtm.debug_validate_features();
    Ok(())
}

/// Merges every live feature of `src` into `dst`, which must be in the `Data`
/// state. `src` may be in any state; its geometry is resolved through
/// whatever representation it currently has. A second hull is not merged
/// when `dst` already carries one, and source points claimed by no feature
/// arrive as `RandomSpots`.
pub(crate) fn append(dst: &mut DtmObject, src: &DtmObject) -> Result<()> {
    if dst.state != DtmState::Data {
        return Err(dst.invalid_state("Data"));
    }
    let mut claimed = vec![false; src.points.len()];
    for f in src.features.live() {
        if f.state == FeatureState::Rollback {
            continue;
        }
        // The synthesized hull is derived content: it is not copied, and it
        // must not claim points either, or ring points covered by no real
        // feature would vanish instead of arriving as spots.
        let synthesized_hull = f.feature_type == FeatureType::Hull
            && f.user_tag == NULL_USER_TAG
            && f.state == FeatureState::Tin;
        if synthesized_hull {
            continue;
        }
        let indices: Option<Vec<usize>> = match &f.points {
            PointRef::Range { first, count } => Some((*first..*first + *count).collect()),
            PointRef::Offsets(offsets) => Some(offsets.clone()),
            PointRef::Graph { start_point } => {
                let graph = src
                    .graph
                    .as_ref()
                    .ok_or(DtmError::Consistency("graph reference without adjacency graph"))?;
                Some(graph.walk_feature(f.id, *start_point)?)
            }
            PointRef::Owned(_) | PointRef::None => None,
        };
        if let Some(indices) = &indices {
            for &i in indices {
                if i < claimed.len() {
                    claimed[i] = true;
                }
            }
        }
        if f.feature_type.is_hull() && dst.features.hull_count() > 0 {
            debug!("append: skipping second hull feature {:?}", f.id);
            continue;
        }
        let mut points = match indices {
            Some(indices) => src.gather_offset_points(&indices)?,
            None => match &f.points {
                PointRef::Owned(points) => points.clone(),
                _ => Vec::new(),
            },
        };
        if matches!(f.points, PointRef::Graph { .. })
            && f.feature_type.is_polygonal()
            && points.len() > 1
            && points.first() == points.last()
        {
            points.pop();
        }
        if points.is_empty() {
            continue;
        }
        dst.store_feature(f.feature_type, f.user_tag, &points)?;
    }
    let unclaimed: Vec<Point3> = src
        .points
        .iter()
        .enumerate()
        .filter(|(i, _)| !claimed[*i])
        .map(|(_, &p)| p)
        .collect();
    for batch in unclaimed.chunks(MAX_SPOT_BATCH) {
        dst.add_spots(batch)?;
    }
    Ok(())
}
