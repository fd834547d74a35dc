pub mod gate;
pub mod ports;
pub mod usecases;

pub use gate::RenderGate;
pub use ports::*;
