//! Typed DTM features and the feature table.

use crate::error::{DtmError, Result};
use crate::geometry::Point3;
use crate::storage::PartitionedArray;

/// Identifier assigned to a stored feature. Stable across sorting and
/// deduplication; never reused after deletion.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct FeatureId(pub u64);

/// Caller-supplied tag carried by a feature, opaque to the engine.
pub type UserTag = i64;

/// Tag value meaning "no user tag". Synthesized features carry it.
pub const NULL_USER_TAG: UserTag = i64::MIN;

/// Kinds of linear and areal constraints a DTM understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum FeatureType {
    /// Individually stored spot elevations.
    RandomSpots,
    /// A named group of spot elevations.
    GroupSpots,
    /// Hard breakline; triangle edges follow it exactly.
    Breakline,
    /// Soft breakline; constrained but without surface hardening.
    SoftBreakline,
    /// Breakline carried for graphics only.
    GraphicBreak,
    /// Constraint derived from a contour line.
    ContourLine,
    /// Excluded region inside the hull.
    Void,
    /// Void draped onto the surface rather than inserted.
    DrapeVoid,
    /// Void whose boundary also acts as a breakline.
    BreakVoid,
    /// Open line bounding a void region.
    VoidLine,
    /// Non-excluded region inside a void.
    Island,
    /// Hole punched through the surface.
    Hole,
    /// Named areal region without triangulation effect.
    Region,
    /// The outer boundary polygon of the triangulation.
    Hull,
    /// Hull draped onto the surface.
    DrapeHull,
    /// Open line contributing to the hull boundary.
    HullLine,
}

impl FeatureType {
    /// Hull-class features; at most one may take part in a triangulation.
    pub fn is_hull(self) -> bool {
        matches!(self, FeatureType::Hull | FeatureType::DrapeHull)
    }

    /// Features whose geometry is reconstructed structurally after
    /// triangulation rather than replayed from the rollback store.
    pub fn is_structural(self) -> bool {
        matches!(
            self,
            FeatureType::Hull
                | FeatureType::HullLine
                | FeatureType::DrapeHull
                | FeatureType::DrapeVoid
                | FeatureType::GraphicBreak
        )
    }

    /// Features snapshotted before triangulation preprocessing because the
    /// pipeline may structurally alter or remove them.
    pub fn is_cleanup_sensitive(self) -> bool {
        matches!(
            self,
            FeatureType::Hull
                | FeatureType::DrapeHull
                | FeatureType::HullLine
                | FeatureType::DrapeVoid
                | FeatureType::BreakVoid
                | FeatureType::VoidLine
        )
    }

    /// Closed areal types; their point sequence is treated as a ring.
    pub fn is_polygonal(self) -> bool {
        matches!(
            self,
            FeatureType::Void
                | FeatureType::DrapeVoid
                | FeatureType::BreakVoid
                | FeatureType::Island
                | FeatureType::Hole
                | FeatureType::Region
                | FeatureType::Hull
                | FeatureType::DrapeHull
        )
    }

    /// Point-cloud features without edges of their own.
    pub fn is_spots(self) -> bool {
        matches!(self, FeatureType::RandomSpots | FeatureType::GroupSpots)
    }
}

/// Storage micro-state of a feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum FeatureState {
    /// Points stored as a contiguous index range into the shared point store.
    Data,
    /// Points stored as an explicit index list; assigned just before sorting.
    OffsetsArray,
    /// Points walked via the adjacency graph's feature links.
    Tin,
    /// Points stored in a private coordinate buffer, detached from the store.
    PointsArray,
    /// Feature could not be incorporated into the triangulation.
    TinError,
    /// Synthesized purely to support undo; not part of the logical model.
    Rollback,
    /// Tombstoned; removed by table compaction.
    Deleted,
}

/// How a feature's points are referenced. The variant must agree with the
/// feature's [`FeatureState`]; a mismatch is a programming error.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum PointRef {
    /// Contiguous index range `first .. first + count`.
    Range { first: usize, count: usize },
    /// Explicit index list into the shared point store.
    Offsets(Vec<usize>),
    /// Walk of the adjacency graph starting at this point.
    Graph { start_point: usize },
    /// Privately owned coordinate buffer.
    Owned(Vec<Point3>),
    /// No points (tombstones).
    None,
}

impl PointRef {
    /// Point count when it is knowable without the adjacency graph.
    pub fn count_hint(&self) -> Option<usize> {
        match self {
            PointRef::Range { count, .. } => Some(*count),
            PointRef::Offsets(offsets) => Some(offsets.len()),
            PointRef::Owned(points) => Some(points.len()),
            PointRef::Graph { .. } => None,
            PointRef::None => Some(0),
        }
    }
}

/// A typed, ordered sequence of points representing a constraint or region.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Feature {
    pub id: FeatureId,
    pub user_tag: UserTag,
    pub feature_type: FeatureType,
    pub state: FeatureState,
    pub points: PointRef,
    /// Number of points the feature denotes; maintained across transitions
    /// because a graph reference cannot report it by itself.
    pub point_count: usize,
    /// For `Rollback`-state features: the id of the primary feature this
    /// captured geometry belongs to.
    pub(crate) origin: Option<FeatureId>,
}

impl Feature {
    /// Verifies that the point reference variant matches the feature state.
    pub fn check_ref(&self) -> Result<()> {
        let ok = match self.state {
            FeatureState::Data => matches!(self.points, PointRef::Range { .. }),
            FeatureState::OffsetsArray => matches!(self.points, PointRef::Offsets(_)),
            FeatureState::Tin => matches!(self.points, PointRef::Graph { .. }),
            FeatureState::PointsArray | FeatureState::Rollback => {
                matches!(self.points, PointRef::Owned(_))
            }
            // A feature the triangulator rejected may have no graph links, in
            // which case it keeps its offsets.
            FeatureState::TinError => {
                matches!(self.points, PointRef::Graph { .. } | PointRef::Offsets(_))
            }
            FeatureState::Deleted => true,
        };
        if ok {
            Ok(())
        } else {
            Err(DtmError::Consistency("feature point-ref does not match its state"))
        }
    }

    /// A live feature takes part in the logical model.
    pub fn is_live(&self) -> bool {
        !matches!(self.state, FeatureState::Deleted)
    }
}

/// The set of features belonging to a model, with tombstoned deletion and
/// explicit compaction.
#[derive(Debug, Clone, Default)]
pub struct FeatureTable {
    features: PartitionedArray<Feature>,
    next_id: u64,
}

impl FeatureTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total entries including tombstones.
    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Count of non-deleted features.
    pub fn live_len(&self) -> usize {
        self.features.iter().filter(|f| f.is_live()).count()
    }

    /// Stores a feature and returns its freshly assigned id.
    pub fn store(
        &mut self,
        feature_type: FeatureType,
        user_tag: UserTag,
        state: FeatureState,
        points: PointRef,
    ) -> FeatureId {
        let id = FeatureId(self.next_id);
        self.next_id += 1;
        self.store_with_id(id, feature_type, user_tag, state, points);
        id
    }

    /// Stores a feature under a caller-chosen id. Used when rebuilding a
    /// model so ids survive a rollback.
    pub(crate) fn store_with_id(
        &mut self,
        id: FeatureId,
        feature_type: FeatureType,
        user_tag: UserTag,
        state: FeatureState,
        points: PointRef,
    ) {
        let point_count = points.count_hint().unwrap_or(0);
        self.next_id = self.next_id.max(id.0 + 1);
        self.features.push(Feature {
            id,
            user_tag,
            feature_type,
            state,
            points,
            point_count,
            origin: None,
        });
    }

    /// Next id the table would assign.
    pub(crate) fn next_id(&self) -> u64 {
        self.next_id
    }

    /// Ensures no future id falls below `next`. Used when a table is rebuilt
    /// so ids from the replaced table are never reissued.
    pub(crate) fn reserve_ids(&mut self, next: u64) {
        self.next_id = self.next_id.max(next);
    }

    pub fn get(&self, id: FeatureId) -> Option<&Feature> {
        self.features.iter().find(|f| f.id == id && f.is_live())
    }

    pub fn get_mut(&mut self, id: FeatureId) -> Option<&mut Feature> {
        self.features.iter_mut().find(|f| f.id == id && f.is_live())
    }

    /// Tombstones a feature. The entry remains until [`Self::compact`].
    pub fn delete(&mut self, id: FeatureId) -> Result<()> {
        match self.get_mut(id) {
            Some(f) => {
                f.state = FeatureState::Deleted;
                f.points = PointRef::None;
                f.point_count = 0;
                Ok(())
            }
            None => Err(DtmError::FeatureNotFound(id)),
        }
    }

    /// Deletes every feature carrying the given user tag; returns the count.
    pub fn delete_by_user_tag(&mut self, user_tag: UserTag) -> usize {
        let mut n = 0;
        for f in self.features.iter_mut() {
            if f.is_live() && f.user_tag == user_tag {
                f.state = FeatureState::Deleted;
                f.points = PointRef::None;
                f.point_count = 0;
                n += 1;
            }
        }
        n
    }

    /// Deletes every feature in the given state; returns the count. Used for
    /// bulk removal of rollback markers and triangulation casualties.
    pub fn delete_by_state(&mut self, state: FeatureState) -> usize {
        let mut n = 0;
        for f in self.features.iter_mut() {
            if f.state == state {
                f.state = FeatureState::Deleted;
                f.points = PointRef::None;
                f.point_count = 0;
                n += 1;
            }
        }
        n
    }

    /// Removes tombstoned entries. Feature ids are unaffected.
    pub fn compact(&mut self) {
        if self.features.iter().all(|f| f.is_live()) {
            return;
        }
        let kept: PartitionedArray<Feature> = self
            .features
            .iter()
            .filter(|f| f.is_live())
            .cloned()
            .collect();
        self.features = kept;
    }

    /// Iterates every entry, tombstones included.
    pub fn iter(&self) -> impl Iterator<Item = &Feature> {
        self.features.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Feature> {
        self.features.iter_mut()
    }

    /// Iterates live features only.
    pub fn live(&self) -> impl Iterator<Item = &Feature> {
        self.features.iter().filter(|f| f.is_live())
    }

    pub fn live_mut(&mut self) -> impl Iterator<Item = &mut Feature> {
        self.features.iter_mut().filter(|f| f.is_live())
    }

    /// Number of live occurrences of the given feature type.
    pub fn count_of_type(&self, feature_type: FeatureType) -> usize {
        self.live().filter(|f| f.feature_type == feature_type).count()
    }

    /// Number of live hull-class features.
    pub fn hull_count(&self) -> usize {
        self.live().filter(|f| f.feature_type.is_hull()).count()
    }
}
