//! Procedural water surfaces and the two ways of querying them.
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │              WaveParams (config)              │
//! │  direction, 2 wave components, noise, size    │
//! └──────────────────────┬───────────────────────┘
//!                        │ WaveTerms::new
//!          ┌─────────────┴─────────────┐
//!          ▼                           ▼
//!  ┌───────────────┐           ┌───────────────┐
//!  │  Approximate  │           │    Accurate   │
//!  │ (height_field)│           │    (batch)    │
//!  │ - one point   │           │ - many points │
//!  │ - shift step  │           │ - rayon + x4  │
//!  │ - no noise    │           │ - with noise  │
//!  └───────────────┘           └───────────────┘
//! ```
//!
//! The two paths are not required to agree exactly.

pub mod batch;
pub mod body;
pub mod config;
pub mod height_field;

use bevy::math::Vec3;

pub use batch::{query_batch, WaterSampler};
pub use body::WaterBody;
pub use config::{DisplacementNoise, WaveComponent, WaveParams, WavePreset};
pub use height_field::{approximate_water_point, height, surface_point, WaveTerms};

/// Height queries the buoyancy system needs from a surface.
pub trait WaterSurface: Send + Sync {
    /// Cheap single-point estimate.
    fn approximate_point(&self, point: Vec3, time: f32) -> Vec3;

    /// Resolve the Y of every point in place, keeping order and count.
    fn query_batch(&self, points: &mut [Vec3], time: f32);

    /// Accurate single-point query. Expensive relative to the batch per point.
    fn accurate_point(&self, point: Vec3, time: f32) -> Vec3 {
        let mut single = [point];
        self.query_batch(&mut single, time);
        single[0]
    }
}
