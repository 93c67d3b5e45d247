use terrain_dtm::{
    DtmError, DtmObject, DtmState, DuplicatePolicy, FeatureState, FeatureType, Point3,
};

fn p(x: f64, y: f64, z: f64) -> Point3 {
    Point3::new(x, y, z)
}

fn unit_square() -> Vec<Point3> {
    vec![
        p(0.0, 0.0, 1.0),
        p(1.0, 0.0, 2.0),
        p(1.0, 1.0, 3.0),
        p(0.0, 1.0, 4.0),
    ]
}

#[test]
fn unit_square_with_hull_gives_two_triangles() {
    let mut dtm = DtmObject::new();
    dtm.add_spots(&unit_square()).unwrap();
    dtm.store_feature(FeatureType::Hull, 5, &unit_square()).unwrap();
    dtm.triangulate(true, false).unwrap();
    assert_eq!(dtm.state(), DtmState::Tin);
    assert_eq!(dtm.num_triangles(), 2);
    assert_eq!(dtm.num_points(), 4);
    // The caller's hull is kept; no second one is synthesized.
    let hulls: Vec<_> = dtm
        .features()
        .filter(|f| f.feature_type == FeatureType::Hull)
        .collect();
    assert_eq!(hulls.len(), 1);
    assert_eq!(hulls[0].user_tag, 5);
    assert_eq!(hulls[0].state, FeatureState::Tin);
}

#[test]
fn normalization_restores_world_coordinates() {
    let mut dtm = DtmObject::new();
    let offset = 1.0e6;
    let pts: Vec<Point3> = unit_square()
        .iter()
        .map(|q| p(q.x + offset, q.y + offset, q.z))
        .collect();
    dtm.add_spots(&pts).unwrap();
    dtm.triangulate(true, true).unwrap();
    for (i, &q) in pts.iter().enumerate() {
        let got = dtm
            .closest_point(q.x, q.y)
            .and_then(|k| dtm.point(k))
            .unwrap();
        assert_eq!(got, q, "point {i}");
    }
}

#[test]
fn two_hulls_are_rejected() {
    let mut dtm = DtmObject::new();
    dtm.add_spots(&unit_square()).unwrap();
    dtm.store_feature(FeatureType::Hull, 1, &unit_square()).unwrap();
    dtm.store_feature(FeatureType::DrapeHull, 2, &unit_square()).unwrap();
    let err = dtm.triangulate(false, true).unwrap_err();
    assert!(matches!(err, DtmError::Geometry(_)));
    assert_eq!(dtm.state(), DtmState::Data);
}

#[test]
fn state_machine_rejects_out_of_order_operations() {
    let mut dtm = DtmObject::new();
    dtm.add_spots(&unit_square()).unwrap();
    assert!(matches!(
        dtm.remove_duplicates(DuplicatePolicy::ExactOnly),
        Err(DtmError::InvalidState { .. })
    ));
    dtm.sort().unwrap();
    assert!(matches!(dtm.sort(), Err(DtmError::InvalidState { .. })));
    // Triangulation only starts from Data, Tin or TinError.
    assert!(matches!(
        dtm.triangulate(false, true),
        Err(DtmError::InvalidState { .. })
    ));
}

#[test]
fn triangulating_a_clean_tin_is_a_no_op() {
    let mut dtm = DtmObject::new();
    dtm.add_spots(&unit_square()).unwrap();
    dtm.triangulate(false, true).unwrap();
    let triangles = dtm.num_triangles();
    dtm.triangulate(false, true).unwrap();
    assert_eq!(dtm.num_triangles(), triangles);
}

#[test]
fn feature_added_after_triangulation_is_integrated_on_retriangulate() {
    let mut dtm = DtmObject::new();
    dtm.add_spots(&unit_square()).unwrap();
    dtm.triangulate(false, true).unwrap();
    let id = dtm
        .store_feature(FeatureType::RandomSpots, 9, &[p(0.5, 0.5, 10.0)])
        .unwrap();
    assert_eq!(dtm.feature(id).unwrap().state, FeatureState::PointsArray);
    dtm.triangulate(false, true).unwrap();
    assert_eq!(dtm.state(), DtmState::Tin);
    assert_eq!(dtm.num_points(), 5);
    assert_eq!(dtm.num_triangles(), 4);
    assert_ne!(dtm.feature(id).unwrap().state, FeatureState::PointsArray);
}

#[test]
fn cancellation_leaves_the_model_untouched() {
    let mut dtm = DtmObject::new();
    dtm.add_spots(&unit_square()).unwrap();
    let line = dtm
        .store_feature(
            FeatureType::Breakline,
            3,
            &[p(0.0, 0.0, 1.0), p(1.0, 1.0, 3.0)],
        )
        .unwrap();
    let before = dtm.tolerances();
    dtm.termination_flag().request_stop();
    let err = dtm.triangulate(false, true).unwrap_err();
    assert_eq!(err, DtmError::Cancelled);
    // Nothing of the failed run sticks: state, feature layout and tolerances
    // all read as they did before the call.
    assert_eq!(dtm.state(), DtmState::Data);
    assert_eq!(dtm.num_points(), 6);
    let f = dtm.feature(line).unwrap();
    assert_eq!(f.state, FeatureState::Data);
    assert!(matches!(f.points, terrain_dtm::PointRef::Range { .. }));
    assert_eq!(dtm.tolerances(), before);
    dtm.termination_flag().clear();
    dtm.triangulate(false, true).unwrap();
    assert_eq!(dtm.state(), DtmState::Tin);
}

#[test]
fn graph_exposes_hull_and_neighbors() {
    let mut dtm = DtmObject::new();
    dtm.add_spots(&unit_square()).unwrap();
    dtm.add_spots(&[p(0.5, 0.5, 9.0)]).unwrap();
    dtm.triangulate(false, true).unwrap();
    let graph = dtm.graph().unwrap();
    let hull = graph.hull();
    assert_eq!(hull.len(), 4);
    // The interior point touches every corner; each hull point neighbors it.
    let center = dtm.closest_point(0.5, 0.5).unwrap();
    assert_eq!(graph.neighbors(center).len(), 4);
    for &h in &hull {
        assert!(graph.neighbors(h).contains(&center));
    }
}

#[test]
fn too_few_points_is_a_geometry_error() {
    let mut dtm = DtmObject::new();
    dtm.add_spots(&[p(0.0, 0.0, 0.0), p(1.0, 0.0, 0.0)]).unwrap();
    assert!(matches!(
        dtm.triangulate(false, true),
        Err(DtmError::Geometry(_))
    ));
    assert_eq!(dtm.state(), DtmState::Data);
}
