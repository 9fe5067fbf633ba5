pub mod cpu;
pub mod projection;
pub mod stage;
pub mod transforms;
pub mod uniforms;

#[cfg(feature = "wgpu")]
pub mod wgpu_backend;

pub use cpu::*;
pub use projection::*;
pub use stage::*;
pub use transforms::*;
pub use uniforms::*;
