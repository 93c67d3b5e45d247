//! Triangulation: drives the external triangulator and builds the adjacency
//! graph, hull chain and feature links from the returned triangle soup.
//!
//! Unconstrained models go through `delaunator`, which also yields the convex
//! hull directly. Models with linear or areal constraints go through `cdt`,
//! and the hull is recovered from the single-incidence boundary edges.

use std::collections::{HashMap, HashSet};

use log::{debug, warn};

use crate::dtm::{DtmObject, DtmState};
use crate::error::{DtmError, Result};
use crate::feature::{FeatureId, FeatureState, FeatureType, PointRef, NULL_USER_TAG};
use crate::geometry::distance_2d;
use crate::graph::AdjacencyGraph;

/// Whether a feature type constrains triangle edges, and whether its point
/// sequence closes back on itself.
fn constraint_role(t: FeatureType) -> Option<bool> {
    match t {
        FeatureType::Breakline
        | FeatureType::SoftBreakline
        | FeatureType::GraphicBreak
        | FeatureType::ContourLine
        | FeatureType::VoidLine
        | FeatureType::HullLine => Some(false),
        FeatureType::Void
        | FeatureType::BreakVoid
        | FeatureType::Island
        | FeatureType::Hole
        | FeatureType::Hull => Some(true),
        // Draped features follow the surface instead of shaping it; regions
        // and spots carry no edges.
        FeatureType::DrapeVoid
        | FeatureType::DrapeHull
        | FeatureType::Region
        | FeatureType::RandomSpots
        | FeatureType::GroupSpots => None,
    }
}

/// Consecutive vertex pairs of a feature, including the closing pair for
/// rings.
fn feature_segments(offsets: &[usize], closed: bool) -> Vec<(usize, usize)> {
    let mut segs: Vec<(usize, usize)> = offsets.windows(2).map(|w| (w[0], w[1])).collect();
    if closed && offsets.len() > 2 && offsets[0] != offsets[offsets.len() - 1] {
        segs.push((offsets[offsets.len() - 1], offsets[0]));
    }
    segs
}

/// Triangulates the deduplicated point set and installs the adjacency graph.
/// Leaves `dtm.state` untouched; the caller owns the state transition.
pub(crate) fn create_tin(dtm: &mut DtmObject) -> Result<()> {
    if dtm.state != DtmState::DuplicatesRemoved {
        return Err(dtm.invalid_state("DuplicatesRemoved"));
    }
    let n = dtm.points.len();
    if n < 3 {
        return Err(DtmError::Triangulation(format!(
            "{n} points remain after duplicate removal, need at least 3"
        )));
    }
    dtm.check_cancelled()?;

    // Gather constraint segments per feature before touching the graph.
    let mut constrained: Vec<(FeatureId, Vec<usize>, bool)> = Vec::new();
    let mut edge_set: HashSet<(usize, usize)> = HashSet::new();
    let mut edges: Vec<(usize, usize)> = Vec::new();
    for f in dtm.features.live() {
        let Some(closed) = constraint_role(f.feature_type) else {
            continue;
        };
        let PointRef::Offsets(offsets) = &f.points else {
            continue;
        };
        if offsets.len() < 2 {
            continue;
        }
        for (a, b) in feature_segments(offsets, closed) {
            if a == b {
                continue;
            }
            let key = (a.min(b), a.max(b));
            if edge_set.insert(key) {
                edges.push(key);
            }
        }
        constrained.push((f.id, offsets.clone(), closed));
    }

    let (mut graph, hull) = if edges.is_empty() {
        triangulate_unconstrained(dtm, n)?
    } else {
        triangulate_constrained(dtm, n, &edges)?
    };
    graph.set_hull(&hull);
    dtm.check_cancelled()?;

    // Attach feature links; a feature whose segment the triangulator dropped
    // becomes a TinError feature and keeps its offsets.
    for (id, offsets, closed) in constrained {
        let segments = feature_segments(&offsets, closed);
        let intact = segments.iter().all(|&(a, b)| graph.is_connected(a, b));
        if intact {
            for (a, b) in segments {
                graph.add_feature_link(a, b, id)?;
            }
        } else {
            warn!("feature {id:?} lost a constrained edge in triangulation");
        }
        if let Some(f) = dtm.features.get_mut(id) {
            if intact {
                f.state = FeatureState::Tin;
                f.points = PointRef::Graph { start_point: offsets[0] };
                f.point_count = offsets.len();
            } else {
                f.state = FeatureState::TinError;
            }
        }
    }

    // Every triangulation carries a hull feature; synthesize one when the
    // caller did not supply it.
    if dtm.features.hull_count() == 0 && !hull.is_empty() {
        let id = dtm.features.store(
            FeatureType::Hull,
            NULL_USER_TAG,
            FeatureState::Tin,
            PointRef::Graph { start_point: hull[0] },
        );
        if let Some(f) = dtm.features.get_mut(id) {
            f.point_count = hull.len();
        }
        for i in 0..hull.len() {
            graph.add_feature_link(hull[i], hull[(i + 1) % hull.len()], id)?;
        }
        debug!("synthesized hull feature {id:?} with {} points", hull.len());
    }

    debug!(
        "built TIN: {} triangles, hull of {} points",
        graph.num_triangles(),
        hull.len()
    );
    dtm.graph = Some(graph);
    dtm.debug_validate_features();
    Ok(())
}

fn triangulate_unconstrained(
    dtm: &DtmObject,
    n: usize,
) -> Result<(AdjacencyGraph, Vec<usize>)> {
    let coords: Vec<delaunator::Point> = dtm
        .points
        .iter()
        .map(|p| delaunator::Point { x: p.x, y: p.y })
        .collect();
    let result = delaunator::triangulate(&coords);
    if result.triangles.is_empty() {
        return Err(DtmError::Triangulation(
            "degenerate point set, no triangles produced".into(),
        ));
    }
    let mut graph = AdjacencyGraph::new(n);
    for tri in result.triangles.chunks(3) {
        connect_triangle(&mut graph, tri[0], tri[1], tri[2]);
    }
    graph.set_num_triangles(result.triangles.len() / 3);
    Ok((graph, result.hull))
}

fn triangulate_constrained(
    dtm: &DtmObject,
    n: usize,
    edges: &[(usize, usize)],
) -> Result<(AdjacencyGraph, Vec<usize>)> {
    let coords: Vec<(f64, f64)> = dtm.points.iter().map(|p| (p.x, p.y)).collect();
    let triangles = cdt::triangulate_with_edges(&coords, edges)
        .map_err(|e| DtmError::Triangulation(e.to_string()))?;
    if triangles.is_empty() {
        return Err(DtmError::Triangulation(
            "constrained triangulation produced no triangles".into(),
        ));
    }
    let mut graph = AdjacencyGraph::new(n);
    let mut directed: HashMap<(usize, usize), u32> = HashMap::new();
    for &(a, b, c) in &triangles {
        connect_triangle(&mut graph, a, b, c);
        for (u, v) in [(a, b), (b, c), (c, a)] {
            *directed.entry((u, v)).or_insert(0) += 1;
        }
    }
    graph.set_num_triangles(triangles.len());
    Ok((graph, hull_from_boundary(&directed)?))
}

fn connect_triangle(graph: &mut AdjacencyGraph, a: usize, b: usize, c: usize) {
    for (u, v) in [(a, b), (b, c), (c, a)] {
        graph.connect(u, v);
        graph.connect(v, u);
    }
}

/// Chains the directed edges that appear in exactly one triangle into the
/// hull ring.
fn hull_from_boundary(directed: &HashMap<(usize, usize), u32>) -> Result<Vec<usize>> {
    let mut next: HashMap<usize, usize> = HashMap::new();
    for &(a, b) in directed.keys() {
        if !directed.contains_key(&(b, a)) {
            next.insert(a, b);
        }
    }
    let Some(&start) = next.keys().min() else {
        return Err(DtmError::Triangulation("triangulation has no boundary".into()));
    };
    let mut hull = vec![start];
    let mut cur = start;
    for _ in 0..next.len() {
        let Some(&nxt) = next.get(&cur) else {
            return Err(DtmError::Triangulation("triangulation boundary is broken".into()));
        };
        if nxt == start {
            return Ok(hull);
        }
        hull.push(nxt);
        cur = nxt;
    }
    Err(DtmError::Triangulation("triangulation boundary does not close".into()))
}

/// Nearest point to `(x, y)` in the plane by linear scan.
pub(crate) fn closest_point(dtm: &DtmObject, x: f64, y: f64) -> Option<usize> {
    let target = crate::geometry::Point3::new(x, y, 0.0);
    let mut best: Option<(usize, f64)> = None;
    for (i, &p) in dtm.points.iter().enumerate() {
        let d = distance_2d(p, target);
        if best.map_or(true, |(_, bd)| d < bd) {
            best = Some((i, d));
        }
    }
    best.map(|(i, _)| i)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dtm::DtmObject;
    use crate::geometry::Point3;

    fn p(x: f64, y: f64) -> Point3 {
        Point3::new(x, y, 0.0)
    }

    #[test]
    fn unconstrained_square_gives_two_triangles() {
        let mut dtm = DtmObject::new();
        dtm.add_spots(&[p(0.0, 0.0), p(1.0, 0.0), p(1.0, 1.0), p(0.0, 1.0)])
            .unwrap();
        dtm.triangulate(false, true).unwrap();
        assert_eq!(dtm.state(), DtmState::Tin);
        assert_eq!(dtm.num_triangles(), 2);
        // A hull feature was synthesized around the four corners.
        assert_eq!(dtm.features.hull_count(), 1);
        let hull: Vec<&crate::feature::Feature> = dtm
            .features()
            .filter(|f| f.feature_type == FeatureType::Hull)
            .collect();
        assert_eq!(hull[0].point_count, 4);
        assert_eq!(hull[0].user_tag, NULL_USER_TAG);
    }

    #[test]
    fn collinear_points_leave_tin_error_state() {
        let mut dtm = DtmObject::new();
        dtm.add_spots(&[p(0.0, 0.0), p(1.0, 0.0), p(2.0, 0.0)]).unwrap();
        let err = dtm.triangulate(false, true).unwrap_err();
        assert!(matches!(err, DtmError::Triangulation(_)));
        assert_eq!(dtm.state(), DtmState::TinError);
    }

    #[test]
    fn breakline_becomes_graph_feature() {
        let mut dtm = DtmObject::new();
        dtm.add_spots(&[p(0.0, 0.0), p(2.0, 0.0), p(2.0, 2.0), p(0.0, 2.0)])
            .unwrap();
        let id = dtm
            .store_feature(FeatureType::Breakline, 1, &[p(0.0, 0.0), p(2.0, 2.0)])
            .unwrap();
        dtm.triangulate(false, true).unwrap();
        let f = dtm.feature(id).unwrap();
        assert_eq!(f.state, FeatureState::Tin);
        assert!(matches!(f.points, PointRef::Graph { .. }));
        // The walked geometry matches what was stored.
        let pts = dtm.feature_points(id).unwrap();
        assert_eq!(pts, vec![p(0.0, 0.0), p(2.0, 2.0)]);
    }

    #[test]
    fn closest_point_scan() {
        let mut dtm = DtmObject::new();
        dtm.add_spots(&[p(0.0, 0.0), p(10.0, 0.0), p(5.0, 5.0)]).unwrap();
        assert_eq!(dtm.closest_point(9.0, 1.0), Some(1));
        assert_eq!(dtm.closest_point(0.1, -0.1), Some(0));
        assert_eq!(DtmObject::new().closest_point(0.0, 0.0), None);
    }

    #[test]
    fn segments_of_a_ring_close() {
        assert_eq!(
            feature_segments(&[0, 1, 2], true),
            vec![(0, 1), (1, 2), (2, 0)]
        );
        assert_eq!(feature_segments(&[0, 1, 2], false), vec![(0, 1), (1, 2)]);
    }
}
