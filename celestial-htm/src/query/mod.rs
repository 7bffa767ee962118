//! Range queries over a table.
//!
//! - [`set`]: the clip / get_trixels / get_objects state machine
//! - [`nearest`]: ring-expanding nearest-neighbour search
//! - [`cone`]: exact cone search on top of a covering set

pub mod cone;
pub mod nearest;
pub mod set;

pub use cone::{cone_search, ConeMatch, ConeSearchParams};
pub use nearest::Neighbour;
pub use set::{ObjectHead, ObjectSet, QueryConstraints, QueryState};
