//! Digital terrain model engine.
//!
//! A [`DtmObject`] collects 3D survey points grouped into typed features
//! (spot elevations, breaklines, voids, a hull) and turns them into a
//! triangulated irregular network through an explicit state machine:
//! points are sorted, duplicates merged, then the set is handed to a
//! Delaunay triangulator (constrained when breaklines or boundaries are
//! present) and the result is stored as an index-based adjacency graph.
//!
//! Triangulation is transactional: with a suitable [`CleanupPolicy`] the
//! engine snapshots everything preprocessing alters, and [`DtmObject::rollback`]
//! reproduces the pre-triangulation content exactly.

pub mod dedup;
pub mod dtm;
pub mod error;
pub mod feature;
pub mod geometry;
pub mod graph;
pub mod io;
pub mod point_store;
pub mod rollback;
pub mod sort;
pub mod storage;
pub mod tin;

pub use dedup::DuplicatePolicy;
pub use dtm::{
    CleanupPolicy, DtmObject, DtmState, DtmStatistics, TerminationFlag, Tolerances,
};
pub use error::{DtmError, Result};
pub use feature::{
    Feature, FeatureId, FeatureState, FeatureType, PointRef, UserTag, NULL_USER_TAG,
};
pub use geometry::{BoundingCube, Point3};
pub use io::{load_project, save_project, DtmSnapshot, FeatureSnapshot};
pub use rollback::{set_rollback_override, RollbackHook};
