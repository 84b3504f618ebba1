// src/load_balancer/mod.rs
mod registry;
mod round_robin;

pub use registry::{BackendRegistry, RegistryError};
pub use round_robin::RotationCursor;
