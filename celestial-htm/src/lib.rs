//! Hierarchical Triangular Mesh spatial index for astronomical catalogs.
//!
//! The sky is split into the 8 faces of an octahedron and each face is
//! recursively cut into 4 triangles ("trixels") down to a configured depth.
//! Catalog objects are bucketed into trixels by position, and into depths by
//! a scalar attribute such as magnitude: rare bright objects sit in the few
//! large cells near the roots, the faint bulk of the catalog in the many
//! small cells at depth. A range query then only has to scan the trixels
//! around its centre at each depth its attribute window reaches.
//!
//! # Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`mesh`] | [`Mesh`] arena of trixels and vertices, [`TrixelId`] packing |
//! | [`classify`] | Point-in-trixel test and [`Mesh::home_trixel`] |
//! | [`depth`] | Attribute [`Histogram`](depth::Histogram) and per-depth [`DepthMap`](depth::DepthMap) |
//! | [`table`] | [`Table`] of [`CatalogObject`]s bucketed into trixels |
//! | [`query`] | [`ObjectSet`] covering-set planner, nearest neighbour, [`cone_search`](query::cone_search) |
//! | [`store`] | Schema header and preorder object blocks on disk |
//! | [`database`] | [`Database`] owning the mesh and its open tables |
//! | [`geometry`] | Signed-square coordinates, separations, resolution per depth |
//!
//! # Quick Start
//!
//! ```ignore
//! use celestial_htm::{CatalogObject, Database, MeshConfig, ObjectKey, TableSpec};
//!
//! let mut db = Database::new(&MeshConfig::new(7, 4))?;
//! let stars = db.open_table(TableSpec::new("stars"))?;
//! db.import(stars, vec![
//!     CatalogObject::new(ObjectKey::Id(1), 1.4596, 0.1293, 0.45),
//!     CatalogObject::new(ObjectKey::Id(2), 1.5497, 0.1273, 1.64),
//! ])?;
//!
//! let mut set = db.object_set(stars)?;
//! set.clip(1.5, 0.13, 0.1_f64.to_radians(), 0.0, 2.0)?;
//! set.get_objects()?;
//! for star in set.objects() {
//!     println!("{} {:.4} {:.4}", star.key, star.ra, star.dec);
//! }
//!
//! let nearest = set.nearest_to_position(1.5, 0.13)?;
//! ```
//!
//! # Binary Format
//!
//! A saved table is a 1232-byte schema header plus 44-byte field
//! descriptors, and an object file of `{u32 trixel id, u32 count}` blocks in
//! mesh preorder, each followed by `count` fixed-size records. Everything is
//! native endian. See [`store`].
//!
//! # Features
//!
//! - **`serde`**: `Serialize`/`Deserialize` on configuration and record types.
//! - **`cli`**: the `htm` binary for importing, saving and querying tables
//!   from the command line.

pub mod classify;
pub mod config;
pub mod constants;
pub mod database;
pub mod depth;
pub mod error;
pub mod geometry;
pub mod mesh;
pub mod query;
pub mod store;
pub mod table;

pub use config::{FieldDescriptor, FieldKind, KeyKind, MeshConfig, SortOrder, TableSpec};
pub use database::{Database, TableHandle};
pub use depth::{DepthMap, DepthRange, Histogram};
pub use error::{HtmError, HtmResult};
pub use geometry::{angular_separation, depth_from_resolution, resolution, MeshPoint};
pub use mesh::{Mesh, TrixelId, TrixelIndex, VertexIndex};
pub use query::{
    cone_search, ConeMatch, ConeSearchParams, Neighbour, ObjectHead, ObjectSet,
    QueryConstraints, QueryState,
};
pub use table::{CatalogObject, ImportReport, ObjectKey, Table};
