use anyhow::Result;
use celestial_htm::mesh::vertex_count_for_depth;
use celestial_htm::{resolution, Mesh};
use std::time::Instant;

use crate::cli::{Cli, InfoArgs};

pub fn run(args: &InfoArgs, cli: &Cli) -> Result<()> {
    let config = crate::mesh_config(cli, args.depth)?;

    let start = Instant::now();
    let mesh = Mesh::new(&config)?;
    let elapsed = start.elapsed();

    println!("Depth: {}", mesh.depth());
    println!("Table slots: {}", mesh.table_slots());
    println!("Trixels: {}", mesh.trixel_count());
    println!("Vertices: {}", mesh.vertex_count());
    println!("Built in {:.2} ms", elapsed.as_secs_f64() * 1000.0);
    println!();
    println!("{:>5} {:>12} {:>12} {:>14}", "depth", "trixels", "vertices", "resolution");
    for depth in 0..=mesh.depth() {
        println!(
            "{:>5} {:>12} {:>12} {:>13.6}°",
            depth,
            mesh.level(depth).count(),
            vertex_count_for_depth(depth),
            resolution(depth).to_degrees()
        );
    }
    Ok(())
}
