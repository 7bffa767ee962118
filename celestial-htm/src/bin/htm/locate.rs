use anyhow::Result;
use celestial_htm::Mesh;

use crate::cli::{Cli, LocateArgs};

pub fn run(args: &LocateArgs, cli: &Cli) -> Result<()> {
    let config = crate::mesh_config(cli, args.depth)?;
    let mesh = Mesh::new(&config)?;
    let (ra, dec) = crate::position(args.ra, args.dec)?;

    println!("{:>5} {:>12} {:>14}", "depth", "id", "path");
    for depth in 0..=mesh.depth() {
        let trixel = mesh.home_trixel(ra, dec, depth)?;
        let id = mesh.trixel(trixel).id();
        println!("{:>5} {:>#12x} {:>14}", depth, id.raw(), id.to_string());
    }
    Ok(())
}
