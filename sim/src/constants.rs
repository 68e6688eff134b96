use bevy::prelude::*;

pub const TICKS_PER_SECOND: u64 = 50;
pub const GRAVITY: Vec3 = Vec3 {
    x: 0.0,
    y: -9.81,
    z: 0.0,
};
/// Vertical speed scale applied to wave `speed` values.
pub const WAVE_SPEED_SCALE: f32 = 0.1;
/// Divisor applied to `amplitude * reference_size` when scaling wave height.
pub const WAVE_AMPLITUDE_DIVISOR: f32 = 100.0;
/// Divisor applied to the scaled amplitude to get the horizontal shift of the approximate query.
pub const WAVE_SHIFT_DIVISOR: f32 = 5.0;
pub const NOISE_SEED: u32 = 0x5eed;
/// Default distance from the viewpoint beyond which flocking agents are suspended.
pub const DEFAULT_DISABLE_DISTANCE: f32 = 150.0;
/// Default distance from the viewpoint within which buoyant bodies use batched queries.
pub const DEFAULT_ACCURATE_RANGE: f32 = 100.0;
pub const MAX_VIEW_RAYS: usize = 1024;
