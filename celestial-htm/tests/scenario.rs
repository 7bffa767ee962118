mod common;

use celestial_htm::{
    cone_search, CatalogObject, ConeSearchParams, Database, DepthMap, DepthRange, HtmError,
    KeyKind, MeshConfig, ObjectKey, QueryState, TableSpec,
};

const BOUNDS: [f32; 8] = [0.0, 2.0, 4.0, 6.0, 8.0, 10.0, 11.0, 16.0];

/// Depth 6 mesh holding a bright star A at the origin and a faint star B
/// a few arcminutes away.
fn two_star_db() -> (Database, celestial_htm::TableHandle) {
    common::init_tracing();
    let mut db = Database::new(&MeshConfig::new(6, 1)).unwrap();
    let h = db.open_table(TableSpec::new("stars")).unwrap();
    let tiers = BOUNDS
        .windows(2)
        .map(|w| DepthRange {
            min: w[0],
            max: w[1],
        })
        .collect();
    db.set_depth_map(h, DepthMap::from_tiers(tiers).unwrap()).unwrap();

    let a = db
        .insert(h, CatalogObject::new(ObjectKey::Id(1), 0.0, 0.0, 5.0))
        .unwrap();
    let b = db
        .insert(h, CatalogObject::new(ObjectKey::Id(2), 0.001, 0.001, 12.0))
        .unwrap();
    assert_eq!(db.mesh().trixel(a).depth(), 2);
    assert_eq!(db.mesh().trixel(b).depth(), 6);
    (db, h)
}

fn keys(db: &Database, h: celestial_htm::TableHandle, attr_min: f32, attr_max: f32) -> Vec<u64> {
    let mut set = db.object_set(h).unwrap();
    set.clip(0.0, 0.0, 1.0_f64.to_radians(), attr_min, attr_max)
        .unwrap();
    set.get_objects().unwrap();
    let mut keys: Vec<u64> = set
        .objects()
        .map(|o| match o.key {
            ObjectKey::Id(id) => id,
            ObjectKey::Designation(_) => unreachable!(),
        })
        .collect();
    keys.sort_unstable();
    keys
}

#[test]
fn test_wide_window_returns_both_stars() {
    let (db, h) = two_star_db();
    assert_eq!(keys(&db, h, 0.0, 16.0), vec![1, 2]);
}

#[test]
fn test_bright_window_returns_only_bright_star() {
    let (db, h) = two_star_db();
    assert_eq!(keys(&db, h, 0.0, 6.0), vec![1]);
}

#[test]
fn test_depth_bounds() {
    let (db, h) = two_star_db();
    // 6.0 ends depth 2 and starts depth 3
    assert_eq!(db.depth_bounds(h, 6.0).unwrap(), (2, 3));
    assert_eq!(db.depth_bounds(h, 12.0).unwrap(), (6, 6));
    assert!(db.depth_bounds(h, 17.0).is_err());
}

#[test]
fn test_whole_sky_seeds_are_the_roots() {
    let (db, h) = two_star_db();
    let mut set = db.object_set(h).unwrap();
    set.clip(0.0, 0.0, std::f64::consts::PI, 0.0, 16.0).unwrap();
    set.get_trixels().unwrap();
    assert_eq!(set.neighbours().len(), 8);
    for &root in set.neighbours() {
        assert_eq!(db.mesh().trixel(root).depth(), 0);
    }
    // every trixel of the mesh, each once
    assert_eq!(set.trixels().len(), db.mesh().trixel_count());
    set.get_objects().unwrap();
    assert_eq!(set.object_count(), 2);
}

#[test]
fn test_repeated_calls_are_cached() {
    let (db, h) = two_star_db();
    let mut set = db.object_set(h).unwrap();
    set.clip(0.0, 0.0, 0.02, 0.0, 16.0).unwrap();

    let first = set.get_trixels().unwrap().to_vec();
    assert_eq!(set.state(), QueryState::TrixelsSelected);
    assert_eq!(set.get_trixels().unwrap(), first.as_slice());

    let cells = set.get_objects().unwrap();
    assert_eq!(set.state(), QueryState::ObjectsAggregated);
    assert_eq!(set.get_objects().unwrap(), cells);
    assert_eq!(set.get_trixels().unwrap(), first.as_slice());
}

#[test]
fn test_reclip_replaces_previous_result() {
    let (db, h) = two_star_db();
    let mut set = db.object_set(h).unwrap();
    set.clip(0.0, 0.0, 0.02, 0.0, 16.0).unwrap();
    set.get_objects().unwrap();
    assert_eq!(set.object_count(), 2);

    // far side of the sky, faint window only
    set.clip(3.0, -0.5, 0.02, 11.0, 16.0).unwrap();
    assert_eq!(set.state(), QueryState::Clipped);
    set.get_objects().unwrap();
    assert_eq!(set.object_count(), 0);
}

#[test]
fn test_failed_clip_leaves_set_unusable() {
    let (db, h) = two_star_db();
    let mut set = db.object_set(h).unwrap();
    set.clip(0.0, 0.0, 0.02, 0.0, 16.0).unwrap();

    assert!(set.clip(0.0, 2.0, 0.02, 0.0, 16.0).is_err());
    assert_eq!(set.state(), QueryState::Uninitialized);
    assert!(matches!(set.get_trixels(), Err(HtmError::NotClipped)));

    assert!(set.clip(0.0, 0.0, 0.02, 20.0, 30.0).is_err());
    assert!(set.clip(0.0, 0.0, -1.0, 0.0, 16.0).is_err());
}

fn named(name: &str, ra_deg: f64, dec_deg: f64, mag: f32) -> CatalogObject {
    CatalogObject::new(
        ObjectKey::Designation(name.to_string()),
        ra_deg.to_radians(),
        dec_deg.to_radians(),
        mag,
    )
}

fn belt_stars() -> Vec<CatalogObject> {
    vec![
        named("Mintaka", 83.002, -0.299, 2.23),
        named("Alnilam", 84.053, -1.202, 1.69),
        named("Alnitak", 85.190, -1.943, 1.77),
        named("Rigel", 78.634, -8.202, 0.13),
        named("Sirius", 101.287, -16.716, -1.46),
    ]
}

#[test]
fn test_named_catalog_needs_designation_keys() {
    common::init_tracing();
    let mut db = Database::new(&MeshConfig::new(6, 2)).unwrap();

    let numeric = db.open_table(TableSpec::new("numeric")).unwrap();
    let err = db.import(numeric, belt_stars()).unwrap_err();
    assert!(matches!(err, HtmError::InvalidParameter { .. }));

    let spec = TableSpec::new("bright").with_key_kind(KeyKind::Designation);
    let bright = db.open_table(spec).unwrap();
    let report = db.import(bright, belt_stars()).unwrap();
    assert_eq!(report.imported, 5);
    assert_eq!(report.skipped, 0);

    let mut set = db.object_set(bright).unwrap();
    let params = ConeSearchParams::new(83.8_f64.to_radians(), (-1.2_f64).to_radians(), 0.05);
    let names: Vec<String> = cone_search(&mut set, &params)
        .unwrap()
        .iter()
        .map(|m| m.object.key.to_string())
        .collect();
    assert_eq!(names.len(), 3);
    assert!(names.iter().all(|n| n.starts_with("Al") || n == "Mintaka"));

    let target = (100.0_f64.to_radians(), (-15.0_f64).to_radians());
    let nearest = set.nearest_to_position(target.0, target.1).unwrap().unwrap();
    assert_eq!(nearest.object.key, ObjectKey::Designation("Sirius".into()));
}
