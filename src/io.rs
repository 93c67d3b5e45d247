//! JSON persistence of model content.
//!
//! Persisted form is state-free: every feature is written as its resolved
//! coordinate sequence, and loading yields a fresh `Data`-state model ready
//! to triangulate.

use std::fs;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::dtm::{CleanupPolicy, DtmObject, Tolerances};
use crate::feature::{FeatureState, FeatureType, UserTag, NULL_USER_TAG};
use crate::geometry::Point3;

/// One feature, flattened to its coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSnapshot {
    pub feature_type: FeatureType,
    pub user_tag: UserTag,
    pub points: Vec<Point3>,
}

/// Serialized form of a model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DtmSnapshot {
    pub tolerances: Tolerances,
    pub cleanup: CleanupPolicy,
    pub features: Vec<FeatureSnapshot>,
}

/// Flattens a model into its serializable form. Works from any state;
/// rollback snapshots and the synthesized hull are not part of the logical
/// content and are skipped.
pub fn to_snapshot(dtm: &DtmObject) -> crate::Result<DtmSnapshot> {
    let mut features = Vec::new();
    for f in dtm.features() {
        if f.state == FeatureState::Rollback {
            continue;
        }
        if f.feature_type == FeatureType::Hull
            && f.user_tag == NULL_USER_TAG
            && f.state == FeatureState::Tin
        {
            continue;
        }
        let points = dtm.feature_points(f.id)?;
        if points.is_empty() {
            continue;
        }
        features.push(FeatureSnapshot {
            feature_type: f.feature_type,
            user_tag: f.user_tag,
            points,
        });
    }
    Ok(DtmSnapshot {
        tolerances: dtm.tolerances(),
        cleanup: dtm.cleanup_policy(),
        features,
    })
}

/// Rebuilds a `Data`-state model from its serialized form.
pub fn from_snapshot(snapshot: &DtmSnapshot) -> crate::Result<DtmObject> {
    let mut dtm = DtmObject::new();
    dtm.set_cleanup_policy(snapshot.cleanup);
    dtm.set_triangulation_parameters(
        snapshot.tolerances.pp_tol,
        snapshot.tolerances.pl_tol,
        snapshot.tolerances.edge_option,
        snapshot.tolerances.max_side,
    )?;
    for f in &snapshot.features {
        dtm.store_feature(f.feature_type, f.user_tag, &f.points)?;
    }
    Ok(dtm)
}

pub fn save_project(dtm: &DtmObject, path: &Path) -> io::Result<()> {
    let snapshot =
        to_snapshot(dtm).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?;
    let json = serde_json::to_string_pretty(&snapshot)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    fs::write(path, json)
}

pub fn load_project(path: &Path) -> io::Result<DtmObject> {
    let data = fs::read_to_string(path)?;
    let snapshot: DtmSnapshot =
        serde_json::from_str(&data).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    from_snapshot(&snapshot).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))
}
