pub mod boids;
pub mod buoyancy;
pub mod constants;
pub mod error;
pub mod physics;
pub mod sets;
pub mod water;

pub use constants::*;
pub use error::ConfigError;
