pub mod bounds;
pub mod ids;
pub mod math;
pub mod tile;
pub mod time;

// Foundation crate: small, well-tested primitives only.
pub use bounds::*;
pub use ids::*;
pub use tile::*;
pub use time::*;
