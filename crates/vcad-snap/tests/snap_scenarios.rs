//! End-to-end snap requests against an in-memory object store.

use std::any::Any;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use std::f64::consts::{FRAC_PI_2, PI};

use approx::assert_abs_diff_eq;
use vcad_snap::{
    BRepData, BRepEntity, BRepSnapFeatures, CancelToken, CurveId, ElementGeometryCache, ElementId,
    GeometricObject, GeometricPrimitive, GeometryPart, GeometryProvider, GeometryStream,
    HitGeomType, HitParentGeomType, KernelCurve, ObjectStore, SnapEngine, SnapHeat, SnapMode,
    SnapRequest, SnapResponse, SnapSettings, SnapStatus, SnapTarget, SolidKernel, StreamEntry,
};
use vcad_snap_geom::{
    BSplineSurface, CurveCollection, CurvePrimitive, Ellipse3, ExtrusionDetail, ImageGraphic,
    Polyface, SolidPrimitive, SphereDetail, TextString,
};
use vcad_snap_math::{Point3, Range3, Transform, Vec3, ViewMap};

fn line(x0: f64, y0: f64, x1: f64, y1: f64) -> GeometricPrimitive {
    GeometricPrimitive::Curve(CurvePrimitive::line(
        Point3::new(x0, y0, 0.0),
        Point3::new(x1, y1, 0.0),
    ))
}

fn object(id: u64, primitives: impl IntoIterator<Item = GeometricPrimitive>) -> GeometricObject {
    GeometricObject {
        id: ElementId(id),
        placement: Transform::identity(),
        placement_origin: None,
        stream: GeometryStream::from_primitives(primitives),
    }
}

fn engine_with(objects: impl IntoIterator<Item = GeometricObject>) -> SnapEngine {
    let store = ObjectStore::new();
    for object in objects {
        store.insert(object);
    }
    SnapEngine::new(Arc::new(store))
}

fn request(id: u64, modes: impl IntoIterator<Item = SnapMode>, pick: Point3) -> SnapRequest {
    SnapRequest::new(SnapTarget::Object(ElementId(id)), modes, pick, ViewMap::identity())
}

fn snap(engine: &SnapEngine, request: &SnapRequest) -> SnapResponse {
    engine.snap(request, &CancelToken::new())
}

fn snap_point(response: &SnapResponse) -> Point3 {
    assert_eq!(response.status, SnapStatus::Success, "{response:?}");
    response.snap_point.unwrap()
}

#[test]
fn test_midpoint_of_line() {
    let engine = engine_with([object(1, [line(0.0, 0.0, 10.0, 0.0)])]);
    let response = snap(&engine, &request(1, [SnapMode::MidPoint], Point3::new(3.0, 0.5, 0.0)));
    assert_abs_diff_eq!(snap_point(&response), Point3::new(5.0, 0.0, 0.0), epsilon = 1e-12);
    assert_eq!(response.snap_mode, Some(SnapMode::MidPoint));
    assert_eq!(response.heat, Some(SnapHeat::InRange));
    assert_eq!(response.parent_geom_type, Some(HitParentGeomType::Wire));
    assert!(response.curve.is_some());
}

#[test]
fn test_keypoints_follow_divisor() {
    let engine = engine_with([object(1, [line(0.0, 0.0, 10.0, 0.0)])]);

    let halves = request(1, [SnapMode::NearestKeypoint], Point3::new(4.0, 0.0, 0.0));
    assert_abs_diff_eq!(snap_point(&snap(&engine, &halves)), Point3::new(5.0, 0.0, 0.0), epsilon = 1e-12);

    let mut quarters = request(1, [SnapMode::NearestKeypoint], Point3::new(0.0, 0.0, 0.0));
    quarters.snap_divisor = Some(4);
    for (pick, expected) in [(0.9, 0.0), (2.4, 2.5), (5.2, 5.0), (7.0, 7.5), (9.9, 10.0)] {
        quarters.close_point = Point3::new(pick, 0.2, 0.0);
        quarters.test_point = quarters.close_point;
        assert_abs_diff_eq!(
            snap_point(&snap(&engine, &quarters)),
            Point3::new(expected, 0.0, 0.0),
            epsilon = 1e-12
        );
    }
}

#[test]
fn test_circle_center_from_any_pick() {
    let circle = GeometricPrimitive::Curve(CurvePrimitive::Arc(Ellipse3::circle_xy(Point3::origin(), 5.0)));
    let engine = engine_with([object(1, [circle])]);
    for angle in [0.0_f64, 1.0, 2.5, 4.0] {
        let pick = Point3::new(5.0 * angle.cos(), 5.0 * angle.sin(), 0.0);
        let response = snap(&engine, &request(1, [SnapMode::Center], pick));
        assert_abs_diff_eq!(snap_point(&response), Point3::origin(), epsilon = 1e-9);
        assert_eq!(response.heat, Some(SnapHeat::InRange));
    }
}

#[test]
fn test_planar_wire_reports_normal() {
    let engine = engine_with([object(1, [line(0.0, 0.0, 10.0, 0.0)])]);
    let response = snap(&engine, &request(1, [SnapMode::MidPoint], Point3::new(3.0, 0.5, 0.0)));
    let normal = response.normal.unwrap();
    assert_abs_diff_eq!(normal.dot(&Vec3::z()).abs(), 1.0, epsilon = 1e-9);
}

#[test]
fn test_intersection_with_neighbor() {
    let engine = engine_with([
        object(1, [line(0.0, 0.0, 10.0, 0.0)]),
        object(2, [line(5.0, -5.0, 5.0, 5.0)]),
    ]);
    let mut request = request(1, [SnapMode::Intersection], Point3::new(5.5, 0.3, 0.0));
    request.intersect_candidates = vec![SnapTarget::Object(ElementId(2))];
    let response = snap(&engine, &request);
    assert_abs_diff_eq!(snap_point(&response), Point3::new(5.0, 0.0, 0.0), epsilon = 1e-9);
    assert_eq!(response.snap_mode, Some(SnapMode::Intersection));
    assert_eq!(response.intersect_id, Some(ElementId(2)));
    assert!(response.curve.is_some());
    assert!(response.intersect_curve.is_some());
}

#[test]
fn test_intersection_with_parallel_neighbor() {
    let engine = engine_with([
        object(1, [line(0.0, 0.0, 10.0, 0.0)]),
        object(2, [line(0.0, 1.0, 10.0, 1.0)]),
    ]);
    let mut request = request(1, [SnapMode::Intersection], Point3::new(5.0, 0.3, 0.0));
    request.intersect_candidates = vec![SnapTarget::Object(ElementId(2))];
    assert_eq!(snap(&engine, &request).status, SnapStatus::NoSnapPossible);
}

#[test]
fn test_intersection_with_inline_neighbor() {
    let engine = engine_with([object(1, [line(0.0, 0.0, 10.0, 0.0)])]);
    let mut request = request(1, [SnapMode::Intersection], Point3::new(2.2, 0.1, 0.0));
    request.intersect_candidates = vec![
        SnapTarget::Object(ElementId(77)),
        SnapTarget::Geometry {
            id: ElementId(900),
            stream: GeometryStream::from_primitives([line(2.0, -3.0, 2.0, 3.0)]),
        },
    ];
    let response = snap(&engine, &request);
    assert_abs_diff_eq!(snap_point(&response), Point3::new(2.0, 0.0, 0.0), epsilon = 1e-9);
    assert_eq!(response.intersect_id, Some(ElementId(900)));
}

#[test]
fn test_repeated_requests_are_identical() {
    let engine = engine_with([object(1, [line(0.0, 0.0, 10.0, 0.0), line(0.0, 4.0, 10.0, 4.0)])]);
    let request = request(
        1,
        [SnapMode::Nearest, SnapMode::NearestKeypoint, SnapMode::MidPoint, SnapMode::Center],
        Point3::new(6.2, 3.1, 0.0),
    );
    let first = snap(&engine, &request);
    for _ in 0..3 {
        assert_eq!(snap(&engine, &request), first);
    }
}

#[test]
fn test_hot_snap_beats_closer_nearest() {
    let engine = engine_with([object(1, [line(0.0, 0.0, 10.0, 0.0)])]);
    let response = snap(
        &engine,
        &request(1, [SnapMode::Nearest, SnapMode::MidPoint], Point3::new(1.0, 0.2, 0.0)),
    );
    assert_eq!(response.snap_mode, Some(SnapMode::MidPoint));
    assert_eq!(response.heat, Some(SnapHeat::InRange));
}

#[test]
fn test_closest_wins_when_nothing_is_hot() {
    let engine = engine_with([object(1, [line(0.0, 0.0, 10.0, 0.0)])]);
    let mut request = request(1, [SnapMode::Nearest, SnapMode::MidPoint], Point3::new(1.0, 0.2, 0.0));
    request.snap_aperture = Some(1.0);
    let response = snap(&engine, &request);
    assert_eq!(response.snap_mode, Some(SnapMode::Nearest));
    assert_abs_diff_eq!(snap_point(&response), Point3::new(1.0, 0.0, 0.0), epsilon = 1e-12);

    request.snap_modes = [SnapMode::MidPoint].into_iter().collect();
    let response = snap(&engine, &request);
    assert_eq!(response.status, SnapStatus::Success);
    assert_eq!(response.heat, Some(SnapHeat::None));
    assert!(response.hit_point.is_some());
}

#[test]
fn test_wire_center_preferred_when_cursor_near_center() {
    let circle = GeometricPrimitive::Curve(CurvePrimitive::Arc(Ellipse3::circle_xy(Point3::origin(), 20.0)));
    let engine = engine_with([object(1, [circle])]);
    let mut request = request(1, [SnapMode::Nearest, SnapMode::Center], Point3::new(20.0, 0.0, 0.0));
    request.test_point = Point3::new(3.0, 0.0, 0.0);
    let response = snap(&engine, &request);
    assert_eq!(response.snap_mode, Some(SnapMode::Center));
    assert_eq!(response.heat, Some(SnapHeat::NotInRange));
    assert_abs_diff_eq!(snap_point(&response), Point3::origin(), epsilon = 1e-9);

    // With the cursor on the edge the nearer edge snap stays.
    request.test_point = request.close_point;
    assert_eq!(snap(&engine, &request).snap_mode, Some(SnapMode::Nearest));
}

#[test]
fn test_placement_origin() {
    let mut placed = object(1, [line(0.0, 0.0, 10.0, 0.0)]);
    placed.placement = Transform::translation(100.0, 0.0, 0.0);
    placed.placement_origin = Some(Point3::new(100.0, 0.0, 0.0));
    let engine = engine_with([placed]);

    let response = snap(&engine, &request(1, [SnapMode::Origin], Point3::new(101.0, 0.5, 0.0)));
    assert_eq!(response.snap_mode, Some(SnapMode::Origin));
    assert_eq!(response.geom_type, Some(HitGeomType::Point));
    assert_abs_diff_eq!(snap_point(&response), Point3::new(100.0, 0.0, 0.0), epsilon = 1e-12);

    // The placement carries geometry snaps into world coordinates.
    let response = snap(&engine, &request(1, [SnapMode::MidPoint], Point3::new(104.0, 0.5, 0.0)));
    assert_abs_diff_eq!(snap_point(&response), Point3::new(105.0, 0.0, 0.0), epsilon = 1e-12);
}

#[test]
fn test_bad_requests() {
    let engine = engine_with([object(1, [line(0.0, 0.0, 10.0, 0.0)])]);
    let empty = request(1, [], Point3::origin());
    assert_eq!(snap(&engine, &empty).status, SnapStatus::BadArg);
    let unknown = request(2, [SnapMode::Nearest], Point3::origin());
    assert_eq!(snap(&engine, &unknown).status, SnapStatus::BadArg);
}

#[test]
fn test_view_independent_geometry_not_snappable() {
    let mut marker = object(1, [line(0.0, 0.0, 1.0, 0.0)]);
    marker.stream.view_independent = true;
    let engine = engine_with([marker]);
    let response = snap(&engine, &request(1, [SnapMode::Nearest], Point3::origin()));
    assert_eq!(response.status, SnapStatus::NotSnappable);
}

#[test]
fn test_inline_geometry_target() {
    let engine = engine_with([]);
    let request = SnapRequest::new(
        SnapTarget::Geometry {
            id: ElementId(5),
            stream: GeometryStream::from_primitives([line(0.0, 0.0, 0.0, 8.0)]),
        },
        [SnapMode::MidPoint],
        Point3::new(0.3, 3.0, 0.0),
        ViewMap::identity(),
    );
    assert_abs_diff_eq!(snap_point(&snap(&engine, &request)), Point3::new(0.0, 4.0, 0.0), epsilon = 1e-12);
}

#[test]
fn test_request_json_round_trip_through_engine() {
    let engine = engine_with([object(1, [line(0.0, 0.0, 10.0, 0.0)])]);
    let json = serde_json::to_string(&request(1, [SnapMode::MidPoint], Point3::new(3.0, 0.5, 0.0))).unwrap();
    let parsed = SnapRequest::from_json(&json).unwrap();
    let response = snap(&engine, &parsed);
    let out = serde_json::to_value(&response).unwrap();
    assert_eq!(out["status"], "success");
    assert_eq!(out["snapMode"], "midPoint");
    assert!(out.get("intersectId").is_none());
}

/// Kernel whose bodies are a single straight edge; counts decodes.
#[derive(Debug, Default)]
struct EdgeKernel {
    decodes: AtomicUsize,
}

#[derive(Debug)]
struct EdgeBody {
    start: Point3,
    end: Point3,
}

impl BRepEntity for EdgeBody {
    fn range(&self) -> Range3 {
        Range3::new(self.start, self.end)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl SolidKernel for EdgeKernel {
    fn decode(&self, data: &BRepData) -> vcad_snap::Result<Arc<dyn BRepEntity>> {
        self.decodes.fetch_add(1, Ordering::SeqCst);
        let length = f64::from(data.data.first().copied().unwrap_or(1));
        Ok(Arc::new(EdgeBody {
            start: Point3::origin(),
            end: Point3::new(length, 0.0, 0.0),
        }))
    }

    fn snap_features(&self, entity: &dyn BRepEntity, _: &Point3, _: u32) -> Option<BRepSnapFeatures> {
        let body = entity.as_any().downcast_ref::<EdgeBody>()?;
        Some(BRepSnapFeatures {
            curves: vec![KernelCurve {
                curve: CurvePrimitive::line(body.start, body.end),
                curve_id: Some(CurveId(1)),
                geom_type: HitGeomType::None,
            }],
            surface_point: None,
            parent: HitParentGeomType::Solid,
        })
    }

    fn evaluate_interior(
        &self,
        _: &dyn BRepEntity,
        _: &Point3,
        _: &Point3,
        _: &Vec3,
    ) -> Option<(Point3, Vec3)> {
        None
    }
}

fn brep(length: u8) -> GeometricPrimitive {
    GeometricPrimitive::BRep(BRepData {
        format: "edge".into(),
        data: vec![length],
    })
}

#[test]
fn test_brep_decoded_once_and_recomputed_after_update() {
    let store = Arc::new(ObjectStore::new());
    store.insert(object(1, [brep(10)]));
    let kernel = Arc::new(EdgeKernel::default());
    let engine = SnapEngine::new(store.clone()).with_kernel(kernel.clone());
    let first_request = request(1, [SnapMode::MidPoint], Point3::new(4.0, 0.5, 0.0));

    assert_abs_diff_eq!(snap_point(&snap(&engine, &first_request)), Point3::new(5.0, 0.0, 0.0), epsilon = 1e-12);
    assert_abs_diff_eq!(snap_point(&snap(&engine, &first_request)), Point3::new(5.0, 0.0, 0.0), epsilon = 1e-12);
    assert_eq!(kernel.decodes.load(Ordering::SeqCst), 1);
    let stats = store.caches().get(ElementId(1)).unwrap().stats();
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.misses, 1);

    store.update(object(1, [brep(20)])).unwrap();
    let response = snap(&engine, &request(1, [SnapMode::MidPoint], Point3::new(9.0, 0.5, 0.0)));
    assert_abs_diff_eq!(snap_point(&response), Point3::new(10.0, 0.0, 0.0), epsilon = 1e-12);
    assert_eq!(response.parent_geom_type, Some(HitParentGeomType::Solid));
    assert_eq!(kernel.decodes.load(Ordering::SeqCst), 2);
    assert!(store.caches().get(ElementId(1)).unwrap().stats().invalidations >= 2);
}

#[test]
fn test_cancelled_before_start() {
    let store = Arc::new(ObjectStore::new());
    store.insert(object(1, [brep(10), line(0.0, 0.0, 10.0, 0.0)]));
    let kernel = Arc::new(EdgeKernel::default());
    let engine = SnapEngine::new(store).with_kernel(kernel.clone());
    let cancel = CancelToken::new();
    cancel.cancel();
    let response = engine.snap(&request(1, [SnapMode::Nearest], Point3::origin()), &cancel);
    assert_eq!(response.status, SnapStatus::Aborted);
    assert!(response.snap_point.is_none());
    assert_eq!(kernel.decodes.load(Ordering::SeqCst), 0);
}

#[test]
fn test_settings_supply_defaults() {
    let engine = engine_with([object(1, [line(0.0, 0.0, 10.0, 0.0)])]).with_settings(
        SnapSettings::from_toml_str("divisor = 4\naperture = 2.0\n").unwrap(),
    );
    let response = snap(&engine, &request(1, [SnapMode::NearestKeypoint], Point3::new(2.4, 0.1, 0.0)));
    assert_abs_diff_eq!(snap_point(&response), Point3::new(2.5, 0.0, 0.0), epsilon = 1e-12);
    assert_eq!(engine.settings().divisor, 4);

    let far = snap(&engine, &request(1, [SnapMode::MidPoint], Point3::new(1.0, 0.0, 0.0)));
    assert_eq!(far.heat, Some(SnapHeat::None));
}

#[test]
fn test_closed_curve_keypoints_are_doubled() {
    let circle = GeometricPrimitive::Curve(CurvePrimitive::Arc(Ellipse3::circle_xy(Point3::origin(), 100.0)));
    let engine = engine_with([object(1, [circle])]);
    // Divisor 2 on a closed curve gives quarter points.
    for (degrees, expected) in [
        (10.0_f64, Point3::new(100.0, 0.0, 0.0)),
        (50.0, Point3::new(0.0, 100.0, 0.0)),
        (170.0, Point3::new(-100.0, 0.0, 0.0)),
        (260.0, Point3::new(0.0, -100.0, 0.0)),
        (350.0, Point3::new(100.0, 0.0, 0.0)),
    ] {
        let angle = degrees.to_radians();
        let pick = Point3::new(100.0 * angle.cos(), 100.0 * angle.sin(), 0.0);
        let response = snap(&engine, &request(1, [SnapMode::NearestKeypoint], pick));
        assert_abs_diff_eq!(snap_point(&response), expected, epsilon = 1e-9);
    }
}

fn square(size: f64, z: f64) -> CurveCollection {
    CurveCollection::outer(vec![CurvePrimitive::line_string(vec![
        Point3::new(0.0, 0.0, z),
        Point3::new(size, 0.0, z),
        Point3::new(size, size, z),
        Point3::new(0.0, size, z),
        Point3::new(0.0, 0.0, z),
    ])])
}

#[test]
fn test_pick_inside_box_face() {
    let cube = GeometricPrimitive::Solid(SolidPrimitive::Extrusion(ExtrusionDetail {
        base: square(1000.0, 0.0),
        vector: Vec3::new(0.0, 0.0, 1000.0),
        capped: true,
    }));
    let engine = engine_with([object(1, [cube])]);
    let response = snap(&engine, &request(1, [SnapMode::Nearest], Point3::new(400.0, 450.0, 1000.0)));

    assert_abs_diff_eq!(snap_point(&response), Point3::new(400.0, 450.0, 1000.0), epsilon = 1e-9);
    assert_eq!(response.geom_type, Some(HitGeomType::Surface));
    assert_eq!(response.parent_geom_type, Some(HitParentGeomType::Solid));
    assert!(response.curve.is_none());
    let normal = response.normal.unwrap();
    assert_abs_diff_eq!(normal.x, 0.0, epsilon = 1e-9);
    assert_abs_diff_eq!(normal.y, 0.0, epsilon = 1e-9);
    assert_abs_diff_eq!(normal.z.abs(), 1.0, epsilon = 1e-9);
}

#[test]
fn test_pick_on_sphere() {
    let sphere = GeometricPrimitive::Solid(SolidPrimitive::Sphere(SphereDetail {
        center: Point3::origin(),
        vector_x: Vec3::x(),
        vector_y: Vec3::y(),
        radius: 1000.0,
        latitude_start: -FRAC_PI_2,
        latitude_sweep: PI,
        capped: false,
    }));
    let engine = engine_with([object(1, [sphere])]);
    let z = (1000.0_f64.powi(2) - 300.0_f64.powi(2) - 400.0_f64.powi(2)).sqrt();
    let pick = Point3::new(300.0, 400.0, z);
    let response = snap(&engine, &request(1, [SnapMode::Nearest], pick));

    assert_abs_diff_eq!(snap_point(&response), pick, epsilon = 1e-6);
    assert_eq!(response.geom_type, Some(HitGeomType::Surface));
    assert_abs_diff_eq!(response.normal.unwrap(), Vec3::new(0.3, 0.4, z / 1000.0), epsilon = 1e-9);
}

fn square_mesh(size: f64, copies: usize) -> Polyface {
    Polyface {
        points: vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(size, 0.0, 0.0),
            Point3::new(size, size, 0.0),
            Point3::new(0.0, size, 0.0),
        ],
        // Two triangles sharing a hidden diagonal.
        point_index: [1, 2, -3, 0, -1, 3, 4, 0].repeat(copies),
        num_per_face: 0,
        normals: Vec::new(),
        normal_index: Vec::new(),
    }
}

#[test]
fn test_pick_inside_mesh() {
    let engine = engine_with([object(1, [GeometricPrimitive::Mesh(square_mesh(1000.0, 1))])]);
    let response = snap(&engine, &request(1, [SnapMode::Nearest], Point3::new(400.0, 450.0, 0.0)));
    assert_abs_diff_eq!(snap_point(&response), Point3::new(400.0, 450.0, 0.0), epsilon = 1e-9);
    assert_eq!(response.geom_type, Some(HitGeomType::Surface));
    assert_eq!(response.parent_geom_type, Some(HitParentGeomType::Mesh));
    assert_abs_diff_eq!(response.normal.unwrap(), Vec3::z(), epsilon = 1e-9);
}

#[test]
fn test_mesh_midpoint_ignores_hidden_edge() {
    let engine = engine_with([object(1, [GeometricPrimitive::Mesh(square_mesh(10.0, 1))])]);
    // Closest to the diagonal, which is hidden.
    let response = snap(&engine, &request(1, [SnapMode::MidPoint], Point3::new(5.0, 5.1, 0.0)));
    assert_abs_diff_eq!(snap_point(&response), Point3::new(5.0, 10.0, 0.0), epsilon = 1e-9);
    assert_eq!(response.heat, Some(SnapHeat::InRange));
}

#[test]
fn test_pick_on_flat_bspline_surface() {
    let surface = BSplineSurface::clamped_uniform(
        vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1000.0, 0.0, 0.0),
            Point3::new(0.0, 1000.0, 0.0),
            Point3::new(1000.0, 1000.0, 0.0),
        ],
        2,
        2,
        1,
        1,
    )
    .unwrap();
    let engine = engine_with([object(1, [GeometricPrimitive::Surface(surface)])]);
    let response = snap(&engine, &request(1, [SnapMode::Nearest], Point3::new(400.0, 450.0, 0.0)));

    assert_abs_diff_eq!(snap_point(&response), Point3::new(400.0, 450.0, 0.0), epsilon = 1e-6);
    assert_eq!(response.geom_type, Some(HitGeomType::Surface));
    assert_eq!(response.parent_geom_type, Some(HitParentGeomType::Sheet));
    assert_abs_diff_eq!(response.normal.unwrap().z.abs(), 1.0, epsilon = 1e-9);
}

#[test]
fn test_text_midpoint_is_box_center() {
    let text = GeometricPrimitive::Text(TextString {
        text: "DATUM A".into(),
        origin: Point3::origin(),
        x_dir: Vec3::x(),
        y_dir: Vec3::y(),
        width: 10.0,
        height: 4.0,
        descent: 0.0,
    });
    let engine = engine_with([object(1, [text])]);
    let response = snap(&engine, &request(1, [SnapMode::MidPoint], Point3::new(3.0, 4.5, 0.0)));
    assert_abs_diff_eq!(snap_point(&response), Point3::new(5.0, 2.0, 0.0), epsilon = 1e-9);
    assert_eq!(response.parent_geom_type, Some(HitParentGeomType::Text));
}

#[test]
fn test_image_outline() {
    let image = GeometricPrimitive::Image(ImageGraphic {
        corners: [
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(20.0, 0.0, 0.0),
            Point3::new(20.0, 10.0, 0.0),
            Point3::new(0.0, 10.0, 0.0),
        ],
    });
    let engine = engine_with([object(1, [image])]);

    let response = snap(&engine, &request(1, [SnapMode::Nearest], Point3::new(7.0, 0.5, 0.0)));
    assert_abs_diff_eq!(snap_point(&response), Point3::new(7.0, 0.0, 0.0), epsilon = 1e-12);
    assert_eq!(response.geom_type, Some(HitGeomType::Surface));
    assert_eq!(response.parent_geom_type, Some(HitParentGeomType::None));

    let response = snap(&engine, &request(1, [SnapMode::MidPoint], Point3::new(7.0, 0.5, 0.0)));
    assert_abs_diff_eq!(snap_point(&response), Point3::new(10.0, 0.0, 0.0), epsilon = 1e-12);
}

/// Store that fires the cancel token as soon as a part is looked up.
struct InterruptingStore {
    store: ObjectStore,
    cancel: CancelToken,
}

impl GeometryProvider for InterruptingStore {
    fn object(&self, id: ElementId) -> Option<Arc<GeometricObject>> {
        self.store.object(id)
    }

    fn part(&self, id: ElementId) -> Option<Arc<GeometryPart>> {
        self.cancel.cancel();
        self.store.part(id)
    }

    fn geometry_cache(&self, id: ElementId) -> Arc<ElementGeometryCache> {
        self.store.geometry_cache(id)
    }
}

fn mesh_part_store() -> ObjectStore {
    let store = ObjectStore::new();
    store.insert_part(GeometryPart {
        id: ElementId(40),
        // Enough index reads to cross the cancel interval.
        stream: GeometryStream::from_primitives([GeometricPrimitive::Mesh(square_mesh(10.0, 40))]),
        range: None,
    });
    store.insert(GeometricObject {
        id: ElementId(1),
        placement: Transform::identity(),
        placement_origin: None,
        stream: GeometryStream {
            view_independent: false,
            entries: vec![StreamEntry::part(ElementId(40), Transform::identity())],
        },
    });
    store
}

#[test]
fn test_mesh_cancelled_mid_walk() {
    let request = request(1, [SnapMode::Nearest], Point3::new(4.0, 4.5, 0.0));

    let engine = SnapEngine::new(Arc::new(mesh_part_store()));
    assert_eq!(snap(&engine, &request).status, SnapStatus::Success);

    let cancel = CancelToken::new();
    let interrupting = InterruptingStore {
        store: mesh_part_store(),
        cancel: cancel.clone(),
    };
    let engine = SnapEngine::new(Arc::new(interrupting));
    let response = engine.snap(&request, &cancel);
    assert_eq!(response.status, SnapStatus::Aborted);
    assert!(response.snap_point.is_none());
}
