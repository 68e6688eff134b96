use thiserror::Error;

/// Setup-time configuration problems. Every one of them has a documented
/// fallback, so callers usually log the error and continue.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("wave direction must be non-zero, got ({0}, {1})")]
    ZeroDirection(f32, f32),
    #[error("{wave} wave frequency must be positive and finite, got {value}")]
    InvalidFrequency { wave: &'static str, value: f32 },
    #[error("reference size must be positive, got {0}")]
    InvalidReferenceSize(f32),
    #[error("neighbor group bounds are empty: min {min}, max {max}")]
    EmptyNeighborBounds { min: u32, max: u32 },
    #[error("view ray settings produce no rays: turn fraction {turn_fraction}, accuracy {accuracy}")]
    DegenerateViewRays { turn_fraction: f32, accuracy: u32 },
    #[error("body has no water reference")]
    MissingWater,
    #[error("unknown water id {0}")]
    UnknownWater(usize),
}
