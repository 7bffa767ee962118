use celestial_htm::{
    cone_search, CatalogObject, ConeSearchParams, Database, KeyKind, MeshConfig, ObjectKey,
    TableSpec,
};

// A handful of bright stars around Orion: (name, RA°, Dec°, V mag)
const STARS: &[(&str, f64, f64, f32)] = &[
    ("Betelgeuse", 88.793, 7.407, 0.42),
    ("Rigel", 78.634, -8.202, 0.13),
    ("Bellatrix", 81.283, 6.350, 1.64),
    ("Mintaka", 83.002, -0.299, 2.23),
    ("Alnilam", 84.053, -1.202, 1.69),
    ("Alnitak", 85.190, -1.943, 1.77),
    ("Saiph", 86.939, -9.670, 2.09),
    ("Meissa", 83.784, 9.934, 3.33),
    ("Hatysa", 83.858, -5.910, 2.77),
    ("Sirius", 101.287, -16.716, -1.46),
    ("Procyon", 114.825, 5.225, 0.34),
    ("Aldebaran", 68.980, 16.509, 0.86),
];

fn main() -> anyhow::Result<()> {
    let mut db = Database::new(&MeshConfig::new(8, 1))?;
    let table = db.open_table(TableSpec::new("bright").with_key_kind(KeyKind::Designation))?;

    let rows = STARS.iter().map(|&(name, ra, dec, mag)| {
        CatalogObject::new(
            ObjectKey::Designation(name.to_string()),
            ra.to_radians(),
            dec.to_radians(),
            mag,
        )
    });
    let report = db.import(table, rows)?;
    println!("Imported {} stars", report.imported);

    let mut set = db.object_set(table)?;
    let belt = (83.8_f64.to_radians(), (-1.2_f64).to_radians());
    let params = ConeSearchParams::new(belt.0, belt.1, 10.0_f64.to_radians())
        .with_attribute_range(-2.0, 2.5);
    let matches = cone_search(&mut set, &params)?;
    println!("\n{} stars brighter than 2.5 within 10° of the belt:\n", matches.len());
    for m in &matches {
        println!(
            "  {:>12}  RA {:8.3}°  Dec {:+7.3}°  mag {:5.2}  dist {:.3}°",
            m.object.key,
            m.object.ra.to_degrees(),
            m.object.dec.to_degrees(),
            m.object.attribute,
            m.separation.to_degrees(),
        );
    }

    let target = (100.0_f64.to_radians(), (-15.0_f64).to_radians());
    if let Some(nearest) = set.nearest_to_position(target.0, target.1)? {
        println!(
            "\nNearest to (100°, -15°): {} at {:.3}°",
            nearest.object.key,
            nearest.separation.to_degrees()
        );
    }

    Ok(())
}
