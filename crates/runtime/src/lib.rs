pub mod buffering;
pub mod cadence;
pub mod capacity;

pub use buffering::*;
pub use cadence::*;
pub use capacity::*;
