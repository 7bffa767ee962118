mod common;

use celestial_htm::{
    angular_separation, CatalogObject, Database, MeshConfig, ObjectKey, TableHandle, TableSpec,
};
use std::f64::consts::{FRAC_PI_2, TAU};

/// Deterministic scatter of `n` positions over the sphere.
fn scatter(n: u64, seed: u64) -> Vec<(f64, f64)> {
    let mut state = seed;
    let mut next = move || {
        state = state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        (state >> 11) as f64 / (1u64 << 53) as f64
    };
    (0..n)
        .map(|_| {
            let ra = next() * TAU;
            let dec = (2.0 * next() - 1.0).asin();
            (ra.min(TAU - 1e-9), dec.clamp(-FRAC_PI_2, FRAC_PI_2))
        })
        .collect()
}

fn catalog(depth: u8, positions: &[(f64, f64)]) -> (Database, TableHandle) {
    common::init_tracing();
    let mut db = Database::new(&MeshConfig::new(depth, 1)).unwrap();
    let h = db.open_table(TableSpec::new("stars")).unwrap();
    let rows = positions.iter().enumerate().map(|(i, &(ra, dec))| {
        CatalogObject::new(ObjectKey::Id(i as u64), ra, dec, (i % 13) as f32 + 0.5)
    });
    db.import(h, rows).unwrap();
    (db, h)
}

fn brute_force(positions: &[(f64, f64)], ra: f64, dec: f64) -> f64 {
    positions
        .iter()
        .map(|&(r, d)| angular_separation(ra, dec, r, d))
        .fold(f64::INFINITY, f64::min)
}

#[test]
fn test_nearest_matches_brute_force() {
    let positions = scatter(400, 7);
    let (db, h) = catalog(6, &positions);
    let mut set = db.object_set(h).unwrap();

    for (ra, dec) in scatter(60, 99) {
        let found = set.nearest_to_position(ra, dec).unwrap().unwrap();
        let expected = brute_force(&positions, ra, dec);
        assert!(
            (found.separation - expected).abs() < 1e-12,
            "query ({ra}, {dec}): found {} expected {}",
            found.separation,
            expected
        );
        let actual = angular_separation(ra, dec, found.object.ra, found.object.dec);
        assert!((actual - found.separation).abs() < 1e-12);
    }
}

#[test]
fn test_sparse_catalog_widens_search() {
    // a single star on the far side of the sky from every query
    let positions = [(3.0, -0.4)];
    let (db, h) = catalog(7, &positions);
    let mut set = db.object_set(h).unwrap();

    for &(ra, dec) in &[(0.0, 0.0), (6.0, 1.2), (0.2, -1.5)] {
        let found = set.nearest_to_position(ra, dec).unwrap().unwrap();
        assert_eq!(found.object.key, ObjectKey::Id(0));
        let expected = angular_separation(ra, dec, 3.0, -0.4);
        assert!((found.separation - expected).abs() < 1e-12);
    }
}

#[test]
fn test_nearest_to_object_skips_itself() {
    let positions = scatter(200, 3);
    let (db, h) = catalog(5, &positions);
    let table = db.table(h).unwrap();
    let mut set = db.object_set(h).unwrap();

    for object in table.objects().take(25) {
        let found = set.nearest_to_object(object).unwrap().unwrap();
        assert!(!std::ptr::eq(found.object, object));

        let expected = positions
            .iter()
            .map(|&(r, d)| angular_separation(object.ra, object.dec, r, d))
            .filter(|&sep| sep > 0.0)
            .fold(f64::INFINITY, f64::min);
        assert!((found.separation - expected).abs() < 1e-12);
    }
}

#[test]
fn test_lone_object_has_no_neighbour() {
    let (db, h) = catalog(4, &[(1.0, 0.5)]);
    let table = db.table(h).unwrap();
    let only = table.objects().next().unwrap();
    let mut set = db.object_set(h).unwrap();
    assert!(set.nearest_to_object(only).unwrap().is_none());
}
