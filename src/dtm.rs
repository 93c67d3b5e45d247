//! The DTM aggregate object and its triangulation state machine.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, warn};

use crate::dedup::DuplicatePolicy;
use crate::error::{DtmError, Result};
use crate::feature::{
    Feature, FeatureId, FeatureState, FeatureTable, FeatureType, PointRef, UserTag,
};
use crate::geometry::{machine_precision, BoundingCube, Point3};
use crate::graph::AdjacencyGraph;
use crate::point_store::PointStore;
use crate::rollback::{self, RollbackData};
use crate::tin;

/// Lifecycle state of a [`DtmObject`].
///
/// `Data` is the initial state and the only one in which point and feature
/// content may be freely edited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum DtmState {
    Data,
    PointsSorted,
    DuplicatesRemoved,
    Tin,
    TinError,
}

/// How much pre-triangulation state is preserved for rollback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum CleanupPolicy {
    /// No rollback support; triangulation is one-way.
    None,
    /// Only features structurally altered by preprocessing are snapshotted.
    Changes,
    /// Everything needed to undo the whole triangulation is preserved.
    All,
}

/// Triangulation tolerances and parameters.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Tolerances {
    /// Point-to-point merge tolerance.
    pub pp_tol: f64,
    /// Point-to-line tolerance.
    pub pl_tol: f64,
    /// Machine-precision-derived floor, recomputed during preprocessing.
    pub mpp_tol: f64,
    /// Edge removal option forwarded to the triangulator.
    pub edge_option: u32,
    /// Maximum external edge length before a triangle is discarded.
    pub max_side: f64,
}

pub const DEFAULT_PP_TOL: f64 = 1.0e-4;
pub const DEFAULT_PL_TOL: f64 = 1.0e-4;
pub const DEFAULT_EDGE_OPTION: u32 = 2;
pub const DEFAULT_MAX_SIDE: f64 = 1000.0;

impl Default for Tolerances {
    fn default() -> Self {
        Self {
            pp_tol: DEFAULT_PP_TOL,
            pl_tol: DEFAULT_PL_TOL,
            mpp_tol: 0.0,
            edge_option: DEFAULT_EDGE_OPTION,
            max_side: DEFAULT_MAX_SIDE,
        }
    }
}

/// Cooperative, externally settable termination request. Cloning shares the
/// underlying flag.
#[derive(Debug, Clone, Default)]
pub struct TerminationFlag(Arc<AtomicBool>);

impl TerminationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_stop(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn clear(&self) {
        self.0.store(false, Ordering::Relaxed);
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

const CANCEL_CHECK_ELEMENTS: u32 = 1024;
const CANCEL_CHECK_PERIOD: Duration = Duration::from_millis(25);

/// Bounded-interval cancellation checker for long point scans: consults the
/// flag roughly every 1024 elements or 25 ms, whichever comes first.
pub(crate) struct CancelCheck {
    flag: TerminationFlag,
    since_check: u32,
    last: Instant,
}

impl CancelCheck {
    pub(crate) fn new(flag: TerminationFlag) -> Self {
        Self {
            flag,
            since_check: 0,
            last: Instant::now(),
        }
    }

    /// Call once per scanned element.
    pub(crate) fn tick(&mut self) -> Result<()> {
        self.since_check += 1;
        if self.since_check >= CANCEL_CHECK_ELEMENTS
            || (self.since_check & 127 == 0 && self.last.elapsed() >= CANCEL_CHECK_PERIOD)
        {
            self.since_check = 0;
            self.last = Instant::now();
            if self.flag.is_set() {
                return Err(DtmError::Cancelled);
            }
        }
        Ok(())
    }
}

/// Point/feature/triangle counts for reporting.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct DtmStatistics {
    pub state: DtmState,
    pub num_points: usize,
    pub num_sorted_points: usize,
    pub num_features: usize,
    pub num_triangles: usize,
}

/// A Digital Terrain Model: points, typed features and, once triangulated,
/// the TIN adjacency graph.
#[derive(Debug, Clone, Default)]
pub struct DtmObject {
    pub(crate) points: PointStore,
    pub(crate) features: FeatureTable,
    pub(crate) graph: Option<AdjacencyGraph>,
    pub(crate) state: DtmState,
    pub(crate) tolerances: Tolerances,
    pub(crate) cleanup: CleanupPolicy,
    pub(crate) rollback: Option<RollbackData>,
    pub(crate) termination: TerminationFlag,
    /// Worker count for the parallel sort; 0 means "decide from hardware".
    pub(crate) num_workers: usize,
    /// Translation applied by coordinate normalization, pending reversal.
    pub(crate) normalization: Option<Point3>,
}

impl Default for DtmState {
    fn default() -> Self {
        DtmState::Data
    }
}

impl Default for CleanupPolicy {
    fn default() -> Self {
        CleanupPolicy::None
    }
}

impl DtmObject {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> DtmState {
        self.state
    }

    pub fn num_points(&self) -> usize {
        self.points.len()
    }

    pub fn num_sorted_points(&self) -> usize {
        self.points.num_sorted()
    }

    pub fn num_features(&self) -> usize {
        self.features.live_len()
    }

    pub fn num_triangles(&self) -> usize {
        self.graph.as_ref().map_or(0, |g| g.num_triangles())
    }

    pub fn tolerances(&self) -> Tolerances {
        self.tolerances
    }

    pub fn cleanup_policy(&self) -> CleanupPolicy {
        self.cleanup
    }

    pub fn point(&self, index: usize) -> Option<Point3> {
        self.points.get(index)
    }

    pub fn points(&self) -> impl Iterator<Item = &Point3> {
        self.points.iter()
    }

    pub fn feature(&self, id: FeatureId) -> Option<&Feature> {
        self.features.get(id)
    }

    /// The adjacency graph, present in the `Tin` and `TinError` states.
    pub fn graph(&self) -> Option<&AdjacencyGraph> {
        self.graph.as_ref()
    }

    /// Axis-aligned bounds of the current point set.
    pub fn bounding_cube(&self) -> BoundingCube {
        self.points.bounding_cube()
    }

    /// Live features, in table order.
    pub fn features(&self) -> impl Iterator<Item = &Feature> {
        self.features.live()
    }

    pub fn statistics(&self) -> DtmStatistics {
        DtmStatistics {
            state: self.state,
            num_points: self.points.len(),
            num_sorted_points: self.points.num_sorted(),
            num_features: self.features.live_len(),
            num_triangles: self.num_triangles(),
        }
    }

    /// Sets triangulation tolerances and parameters. Rejected outside the
    /// `Data` state; invalid numeric inputs are silently clamped to the
    /// documented defaults, mirroring legacy tolerance behavior.
    pub fn set_triangulation_parameters(
        &mut self,
        pp_tol: f64,
        pl_tol: f64,
        edge_option: u32,
        max_side: f64,
    ) -> Result<()> {
        if self.state != DtmState::Data {
            return Err(self.invalid_state("Data"));
        }
        self.tolerances.pp_tol = if pp_tol.is_finite() && pp_tol >= 0.0 {
            pp_tol
        } else {
            DEFAULT_PP_TOL
        };
        self.tolerances.pl_tol = if pl_tol.is_finite() && pl_tol >= 0.0 {
            pl_tol
        } else {
            DEFAULT_PL_TOL
        };
        self.tolerances.edge_option = if edge_option <= 2 { edge_option } else { DEFAULT_EDGE_OPTION };
        self.tolerances.max_side = if max_side.is_finite() && max_side > 0.0 {
            max_side
        } else {
            DEFAULT_MAX_SIDE
        };
        Ok(())
    }

    /// Sets the cleanup policy. Lowering to `None` discards any pending
    /// rollback store.
    pub fn set_cleanup_policy(&mut self, policy: CleanupPolicy) {
        if policy == CleanupPolicy::None {
            self.rollback = None;
        }
        self.cleanup = policy;
    }

    /// Worker count for the parallel sort; 0 restores the hardware default.
    pub fn set_num_workers(&mut self, workers: usize) {
        self.num_workers = workers;
    }

    pub(crate) fn effective_workers(&self) -> usize {
        if self.num_workers > 0 {
            self.num_workers
        } else {
            std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
        }
    }

    /// Shared handle to this model's cooperative termination flag.
    pub fn termination_flag(&self) -> TerminationFlag {
        self.termination.clone()
    }

    pub(crate) fn check_cancelled(&self) -> Result<()> {
        if self.termination.is_set() {
            Err(DtmError::Cancelled)
        } else {
            Ok(())
        }
    }

    pub(crate) fn invalid_state(&self, required: &'static str) -> DtmError {
        DtmError::InvalidState { state: self.state, required }
    }

    /// Stores a feature. In the `Data` state the points are appended to the
    /// shared store as a contiguous range; in the `Tin`/`TinError` states the
    /// feature keeps a private buffer and flags the model for
    /// re-triangulation.
    pub fn store_feature(
        &mut self,
        feature_type: FeatureType,
        user_tag: UserTag,
        points: &[Point3],
    ) -> Result<FeatureId> {
        if points.is_empty() {
            return Err(DtmError::Geometry("feature must reference at least one point".into()));
        }
        match self.state {
            DtmState::Data => {
                let first = self.points.len();
                for &p in points {
                    self.points.push(p);
                }
                Ok(self.features.store(
                    feature_type,
                    user_tag,
                    FeatureState::Data,
                    PointRef::Range { first, count: points.len() },
                ))
            }
            DtmState::Tin | DtmState::TinError => Ok(self.features.store(
                feature_type,
                user_tag,
                FeatureState::PointsArray,
                PointRef::Owned(points.to_vec()),
            )),
            _ => Err(self.invalid_state("Data or Tin")),
        }
    }

    /// Stores loose spot elevations as a `RandomSpots` feature.
    pub fn add_spots(&mut self, points: &[Point3]) -> Result<FeatureId> {
        self.store_feature(FeatureType::RandomSpots, crate::feature::NULL_USER_TAG, points)
    }

    /// Tombstones a feature; the table is compacted during the next
    /// triangulation preprocessing.
    pub fn delete_feature(&mut self, id: FeatureId) -> Result<()> {
        self.features.delete(id)
    }

    /// Deletes every feature carrying `user_tag`; returns the count.
    pub fn delete_features_by_user_tag(&mut self, user_tag: UserTag) -> usize {
        self.features.delete_by_user_tag(user_tag)
    }

    /// Deletes every feature the triangulator rejected; returns the count.
    pub fn delete_tin_error_features(&mut self) -> usize {
        self.features.delete_by_state(FeatureState::TinError)
    }

    /// The feature's ordered point sequence, resolved through whatever
    /// representation its state prescribes.
    pub fn feature_points(&self, id: FeatureId) -> Result<Vec<Point3>> {
        let feature = self.features.get(id).ok_or(DtmError::FeatureNotFound(id))?;
        self.resolve_feature_points(feature)
    }

    pub(crate) fn resolve_feature_points(&self, feature: &Feature) -> Result<Vec<Point3>> {
        match &feature.points {
            PointRef::Range { first, count } => {
                self.gather_range_points(*first, *count)
            }
            PointRef::Offsets(offsets) => self.gather_offset_points(offsets),
            PointRef::Owned(points) => Ok(points.clone()),
            PointRef::Graph { start_point } => {
                let graph = self
                    .graph
                    .as_ref()
                    .ok_or(DtmError::Consistency("graph reference without adjacency graph"))?;
                let walk = graph.walk_feature(feature.id, *start_point)?;
                self.gather_offset_points(&walk)
            }
            PointRef::None => Ok(Vec::new()),
        }
    }

    pub(crate) fn gather_range_points(&self, first: usize, count: usize) -> Result<Vec<Point3>> {
        let mut out = Vec::with_capacity(count);
        for i in first..first + count {
            out.push(self.points.get(i).ok_or(DtmError::IndexRange {
                index: i,
                len: self.points.len(),
            })?);
        }
        Ok(out)
    }

    pub(crate) fn gather_offset_points(&self, offsets: &[usize]) -> Result<Vec<Point3>> {
        let mut out = Vec::with_capacity(offsets.len());
        for &i in offsets {
            out.push(self.points.get(i).ok_or(DtmError::IndexRange {
                index: i,
                len: self.points.len(),
            })?);
        }
        Ok(out)
    }

    /// Nearest point to `(x, y)` in the plane, if the model has any points.
    pub fn closest_point(&self, x: f64, y: f64) -> Option<usize> {
        tin::closest_point(self, x, y)
    }

    /// Sorts the point store into ascending `(x, y)` order and remaps every
    /// feature's point references. Internal pipeline step, exposed for
    /// testability.
    pub fn sort(&mut self) -> Result<()> {
        crate::sort::sort_points(self)
    }

    /// Merges points closer than the configured tolerance (or exactly
    /// coincident, per `policy`) and remaps every feature reference. Returns
    /// the number of removed points. Internal pipeline step, exposed for
    /// testability.
    pub fn remove_duplicates(&mut self, policy: DuplicatePolicy) -> Result<usize> {
        crate::dedup::remove_duplicates(self, policy)
    }

    /// Collapses consecutive repeated offsets inside each feature and deletes
    /// features reduced to a single point. Returns the number of deleted
    /// features.
    pub fn remove_duplicate_offsets(&mut self) -> Result<usize> {
        crate::dedup::remove_duplicate_offsets(self)
    }

    /// Runs the full triangulation pipeline: preprocess, sort, deduplicate,
    /// then delegate to the external triangulator.
    ///
    /// On success the model is in the `Tin` state. A preprocessing failure
    /// reverts the model to `Data`; only a failure of the triangulator itself
    /// leaves the terminal `TinError` state, recoverable via
    /// [`Self::change_state_to_data`].
    pub fn triangulate(
        &mut self,
        normalize: bool,
        remove_exact_duplicates_only: bool,
    ) -> Result<()> {
        match self.state {
            DtmState::Tin if !self.needs_retriangulation() => return Ok(()),
            DtmState::Tin | DtmState::TinError => self.change_state_to_data()?,
            DtmState::Data => {}
            DtmState::PointsSorted | DtmState::DuplicatesRemoved => {
                return Err(self.invalid_state("Data"));
            }
        }
        if self.points.len() < 3 {
            return Err(DtmError::Geometry("triangulation requires at least 3 points".into()));
        }
        if self.features.hull_count() > 1 {
            return Err(DtmError::Geometry("more than one hull feature".into()));
        }
        let policy = if remove_exact_duplicates_only {
            DuplicatePolicy::ExactOnly
        } else {
            DuplicatePolicy::Tolerance
        };
        debug!(
            "triangulate: {} points, {} features, policy {:?}",
            self.points.len(),
            self.features.live_len(),
            policy
        );
        let saved_tolerances = self.tolerances;
        match self.triangulate_inner(normalize, policy) {
            Ok(()) => Ok(()),
            Err(err) => {
                self.denormalize();
                if matches!(err, DtmError::Triangulation(_)) {
                    self.state = DtmState::TinError;
                } else {
                    // Undo what preprocessing changed: the tolerance floors
                    // and, while still in Data, the pending rollback store.
                    // Feature layout is untouched until the sort commits, so
                    // a failure before then needs no reconstruction.
                    self.tolerances = saved_tolerances;
                    if self.state == DtmState::Data {
                        self.rollback = None;
                    } else if let Err(second) = rollback::reconstruct_data_state(self, false) {
                        warn!("recovery to Data state failed: {second}");
                    }
                }
                Err(err)
            }
        }
    }

    fn triangulate_inner(&mut self, normalize: bool, policy: DuplicatePolicy) -> Result<()> {
        self.process_for_triangulation(normalize)?;
        self.sort()?;
        let removed = self.remove_duplicates(policy)?;
        let deleted = self.remove_duplicate_offsets()?;
        debug!("triangulate: {removed} duplicate points, {deleted} collapsed features");
        tin::create_tin(self)?;
        self.state = DtmState::Tin;
        rollback::reattach_rollback_features(self);
        self.denormalize();
        debug!("triangulate: done, {} triangles", self.num_triangles());
        Ok(())
    }

    /// Snapshot, compact, normalize and recompute tolerances ahead of the
    /// sort/dedup stages. Feature layout is left alone; the sort restructures
    /// `Data` features when it commits.
    fn process_for_triangulation(&mut self, normalize: bool) -> Result<()> {
        if self.state != DtmState::Data {
            return Err(DtmError::Consistency("preprocessing outside the Data state"));
        }
        if self.cleanup != CleanupPolicy::None {
            rollback::ensure_store(self);
        }
        self.features.compact();
        if normalize {
            let cube = self.points.bounding_cube();
            if !cube.is_empty() {
                let offset = cube.min;
                for p in self.points.iter_mut() {
                    *p = p.translated(-offset.x, -offset.y, -offset.z);
                }
                self.normalization = Some(offset);
            }
        }
        let range = self.points.bounding_cube().range();
        let mpp = machine_precision(range);
        self.tolerances.mpp_tol = mpp;
        let floor = 10_000.0 * mpp;
        if self.tolerances.pp_tol < floor {
            self.tolerances.pp_tol = floor;
        }
        if self.tolerances.pl_tol < floor {
            self.tolerances.pl_tol = floor;
        }
        if self.rollback.is_some() {
            let sensitive: Vec<FeatureId> = self
                .features
                .live()
                .filter(|f| f.feature_type.is_cleanup_sensitive())
                .map(|f| f.id)
                .collect();
            for id in sensitive {
                rollback::capture_feature(self, id)?;
            }
        }
        Ok(())
    }

    /// Materializes explicit index lists for `Data` features; their
    /// contiguous-range assumption is about to be broken by sorting.
    pub(crate) fn convert_data_features_to_offsets(&mut self) {
        for f in self.features.live_mut() {
            if f.state == FeatureState::Data {
                if let PointRef::Range { first, count } = f.points {
                    f.points = PointRef::Offsets((first..first + count).collect());
                    f.state = FeatureState::OffsetsArray;
                }
            }
        }
    }

    /// Debug-build check that every live feature's point reference agrees
    /// with its state. Pipeline stages call this after committing.
    pub(crate) fn debug_validate_features(&self) {
        if cfg!(debug_assertions) {
            for f in self.features.live() {
                debug_assert!(
                    f.check_ref().is_ok(),
                    "feature {:?} reference disagrees with state {:?}",
                    f.id,
                    f.state
                );
            }
        }
    }

    /// True when content added or deleted since the last triangulation means
    /// the TIN no longer matches the feature set.
    fn needs_retriangulation(&self) -> bool {
        self.features
            .iter()
            .any(|f| f.state == FeatureState::PointsArray || f.state == FeatureState::Deleted)
    }

    /// Reverses coordinate normalization on the points, every privately owned
    /// feature buffer and any pending rollback store.
    pub(crate) fn denormalize(&mut self) {
        let Some(offset) = self.normalization.take() else {
            return;
        };
        for p in self.points.iter_mut() {
            *p = p.translated(offset.x, offset.y, offset.z);
        }
        for f in self.features.live_mut() {
            if let PointRef::Owned(points) = &mut f.points {
                for p in points.iter_mut() {
                    *p = p.translated(offset.x, offset.y, offset.z);
                }
            }
        }
        if let Some(rb) = &mut self.rollback {
            for p in rb.store.points.iter_mut() {
                *p = p.translated(offset.x, offset.y, offset.z);
            }
            for f in rb.store.features.live_mut() {
                if let PointRef::Owned(points) = &mut f.points {
                    for p in points.iter_mut() {
                        *p = p.translated(offset.x, offset.y, offset.z);
                    }
                }
            }
        }
    }

    /// Returns the model to the `Data` state from any later state.
    ///
    /// From `Tin` with `CleanupPolicy::All` this performs a full rollback;
    /// otherwise features are re-expressed structurally as contiguous `Data`
    /// ranges and node memory is dropped.
    pub fn change_state_to_data(&mut self) -> Result<()> {
        match self.state {
            DtmState::Data => Ok(()),
            DtmState::Tin if self.cleanup == CleanupPolicy::All => self.rollback(),
            _ => rollback::reconstruct_data_state(self, false),
        }
    }

    /// Undoes a triangulation, reproducing the pre-triangulation feature
    /// partition. Requires the `Tin` state and `CleanupPolicy::All`.
    pub fn rollback(&mut self) -> Result<()> {
        rollback::rollback(self)
    }

    /// Merges every live feature of `src` into this model, which must be in
    /// the `Data` state. A duplicate hull collapses onto the existing one;
    /// unclaimed source points arrive as `RandomSpots`.
    pub fn append(&mut self, src: &DtmObject) -> Result<()> {
        rollback::append(self, src)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> Vec<Point3> {
        vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ]
    }

    #[test]
    fn parameters_rejected_outside_data_state() {
        let mut dtm = DtmObject::new();
        dtm.add_spots(&square()).unwrap();
        dtm.sort().unwrap();
        let err = dtm.set_triangulation_parameters(0.1, 0.1, 2, 10.0).unwrap_err();
        assert!(matches!(err, DtmError::InvalidState { .. }));
    }

    #[test]
    fn invalid_parameters_clamp_to_defaults() {
        let mut dtm = DtmObject::new();
        dtm.set_triangulation_parameters(f64::NAN, -1.0, 9, 0.0).unwrap();
        let t = dtm.tolerances();
        assert_eq!(t.pp_tol, DEFAULT_PP_TOL);
        assert_eq!(t.pl_tol, DEFAULT_PL_TOL);
        assert_eq!(t.edge_option, DEFAULT_EDGE_OPTION);
        assert_eq!(t.max_side, DEFAULT_MAX_SIDE);
    }

    #[test]
    fn clearing_cleanup_policy_drops_rollback_store() {
        let mut dtm = DtmObject::new();
        dtm.set_cleanup_policy(CleanupPolicy::All);
        dtm.add_spots(&square()).unwrap();
        dtm.triangulate(false, false).unwrap();
        dtm.set_cleanup_policy(CleanupPolicy::None);
        assert!(dtm.rollback.is_none());
    }

    #[test]
    fn store_feature_appends_contiguous_range() {
        let mut dtm = DtmObject::new();
        let id = dtm
            .store_feature(FeatureType::Breakline, 42, &square()[..3])
            .unwrap();
        let f = dtm.feature(id).unwrap();
        assert_eq!(f.state, FeatureState::Data);
        assert_eq!(f.points, PointRef::Range { first: 0, count: 3 });
        assert_eq!(dtm.num_points(), 3);
        assert_eq!(dtm.feature_points(id).unwrap().len(), 3);
    }

    #[test]
    fn empty_feature_is_a_geometry_error() {
        let mut dtm = DtmObject::new();
        assert!(matches!(
            dtm.store_feature(FeatureType::Breakline, 0, &[]),
            Err(DtmError::Geometry(_))
        ));
    }

    #[test]
    fn cancellation_flag_is_shared() {
        let dtm = DtmObject::new();
        let flag = dtm.termination_flag();
        flag.request_stop();
        assert!(dtm.check_cancelled().is_err());
        flag.clear();
        assert!(dtm.check_cancelled().is_ok());
    }

    #[test]
    fn bulk_delete_by_user_tag() {
        let mut dtm = DtmObject::new();
        dtm.store_feature(FeatureType::Breakline, 5, &square()[..2]).unwrap();
        dtm.store_feature(FeatureType::Breakline, 5, &square()[2..]).unwrap();
        dtm.store_feature(FeatureType::Breakline, 6, &square()[..2]).unwrap();
        assert_eq!(dtm.delete_features_by_user_tag(5), 2);
        assert_eq!(dtm.num_features(), 1);
    }

    #[test]
    fn statistics_reflect_model() {
        let mut dtm = DtmObject::new();
        dtm.add_spots(&square()).unwrap();
        let s = dtm.statistics();
        assert_eq!(s.state, DtmState::Data);
        assert_eq!(s.num_points, 4);
        assert_eq!(s.num_features, 1);
        assert_eq!(s.num_triangles, 0);
    }
}
