//! Closed-form height field of a two-wave surface.
//!
//! Two query flavours exist and they intentionally disagree slightly:
//! - [`approximate_water_point`] shifts the query backwards along the
//!   primary wave before evaluating, and skips the noise term.
//! - [`surface_point`] evaluates the surface directly at the query X/Z,
//!   noise included. This is what the batched path computes per point.

use bevy::math::{Vec2, Vec3};
use lazy_static::lazy_static;
use noise::{NoiseFn, Perlin};

use super::config::WaveParams;
use crate::constants::{
    NOISE_SEED, WAVE_AMPLITUDE_DIVISOR, WAVE_SHIFT_DIVISOR, WAVE_SPEED_SCALE,
};

/// Perlin output lies in roughly [-1, 1]; the configured amplitude is in tenths.
const NOISE_AMPLITUDE_SCALE: f32 = 0.1;

lazy_static! {
    static ref PERLIN: Perlin = Perlin::new(NOISE_SEED);
}

/// Per-surface constants derived from [`WaveParams`].
///
/// Building this is cheap but not free, so long-lived surfaces keep one
/// around instead of recomputing it per query.
#[derive(Debug, Clone, Copy)]
pub struct WaveTerms {
    pub(crate) dir: Vec2,
    /// 1 / (2 · reference_size)
    pub(crate) inv_span: f32,
    pub(crate) k1: f32,
    pub(crate) k2: f32,
    pub(crate) a1: f32,
    pub(crate) a2: f32,
    /// Horizontal shift magnitude of the approximate refinement step
    pub(crate) shift1: f32,
    pub(crate) speed1: f32,
    pub(crate) speed2: f32,
    pub(crate) noise_amplitude: f32,
    pub(crate) noise_speed: f32,
    pub(crate) noise_frequency: f32,
    pub(crate) base_level: f32,
}

impl WaveTerms {
    /// Frequencies must be positive and the reference size non-zero;
    /// see [`WaveParams::validate`].
    pub fn new(params: &WaveParams) -> Self {
        let size = params.reference_size;
        let k1 = params.primary.wave_number();
        let k2 = params.secondary.wave_number();

        Self {
            dir: params.unit_direction(),
            inv_span: 1.0 / (size * 2.0),
            k1,
            k2,
            a1: params.primary.scaled_amplitude(size),
            a2: params.secondary.scaled_amplitude(size),
            // a1 / (amplitude1 · 5) with the amplitude cancelled out,
            // so a flat primary wave still yields a finite shift.
            shift1: size * params.primary.frequency
                / (k1 * WAVE_AMPLITUDE_DIVISOR * WAVE_SHIFT_DIVISOR),
            speed1: params.primary.speed * WAVE_SPEED_SCALE,
            speed2: params.secondary.speed * WAVE_SPEED_SCALE,
            noise_amplitude: params.noise.amplitude * NOISE_AMPLITUDE_SCALE,
            noise_speed: params.noise.speed * WAVE_SPEED_SCALE,
            noise_frequency: params.noise.scale / size,
            base_level: params.base_level,
        }
    }

    #[inline(always)]
    fn primary_phase(&self, x: f32, z: f32, time: f32) -> f32 {
        self.k1 * ((x * self.dir.x + z * self.dir.y) * self.inv_span - self.speed1 * time)
    }

    #[inline(always)]
    fn secondary_phase(&self, x: f32, z: f32, time: f32) -> f32 {
        self.k2 * ((-x * self.dir.x + z * self.dir.y) * self.inv_span - self.speed2 * time)
    }

    /// Height of both waves at (x, z), without noise.
    #[inline(always)]
    pub fn wave_height(&self, x: f32, z: f32, time: f32) -> f32 {
        self.base_level
            + self.a1 * self.primary_phase(x, z, time).sin()
            + self.a2 * self.secondary_phase(x, z, time).sin()
    }

    #[inline(always)]
    pub fn noise_height(&self, x: f32, z: f32, time: f32) -> f32 {
        if self.noise_amplitude == 0.0 {
            return 0.0;
        }
        let sample = PERLIN.get([
            (x * self.noise_frequency) as f64,
            (z * self.noise_frequency) as f64,
            (time * self.noise_speed) as f64,
        ]);
        self.noise_amplitude * sample as f32
    }

    /// Exact surface height at (x, z), noise included.
    #[inline(always)]
    pub fn surface_height(&self, x: f32, z: f32, time: f32) -> f32 {
        self.wave_height(x, z, time) + self.noise_height(x, z, time)
    }

    /// Single-point estimate with one shift-then-evaluate refinement.
    ///
    /// The returned X/Z is the query X/Z shifted back and then forward
    /// along the primary direction, so it drifts slightly from the input
    /// on steep slopes.
    pub fn approximate_point(&self, point: Vec3, time: f32) -> Vec3 {
        let estimate = self.primary_phase(point.x, point.z, time).cos() * self.shift1;
        let x = point.x - estimate * self.dir.x;
        let z = point.z - estimate * self.dir.y;

        let f1 = self.primary_phase(x, z, time);
        let f2 = self.secondary_phase(x, z, time);
        let y = self.base_level + self.a1 * f1.sin() + self.a2 * f2.sin();

        let correction = f1.cos() * self.shift1;
        Vec3::new(
            x + correction * self.dir.x,
            y,
            z + correction * self.dir.y,
        )
    }

    /// Exact point on the surface with the same X/Z as the query.
    #[inline(always)]
    pub fn accurate_point(&self, point: Vec3, time: f32) -> Vec3 {
        point.with_y(self.surface_height(point.x, point.z, time))
    }
}

/// Exact surface height at the query's X/Z.
pub fn height(position: Vec3, time: f32, params: &WaveParams) -> f32 {
    WaveTerms::new(params).surface_height(position.x, position.z, time)
}

/// Exact surface point with the query's X/Z.
pub fn surface_point(position: Vec3, time: f32, params: &WaveParams) -> Vec3 {
    WaveTerms::new(params).accurate_point(position, time)
}

/// Cheap single-point query. See [`WaveTerms::approximate_point`].
pub fn approximate_water_point(position: Vec3, time: f32, params: &WaveParams) -> Vec3 {
    WaveTerms::new(params).approximate_point(position, time)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::water::config::{DisplacementNoise, WaveComponent, WavePreset};

    fn single_wave(amplitude: f32, frequency: f32, speed: f32) -> WaveParams {
        WaveParams {
            direction: Vec2::X,
            primary: WaveComponent::new(amplitude, frequency, speed),
            secondary: WaveComponent::new(0.0, 1.0, 0.0),
            noise: DisplacementNoise::NONE,
            reference_size: 10.0,
            base_level: 0.0,
        }
    }

    #[test]
    fn test_origin_scenario() {
        let params = single_wave(1.0, 1.0, 0.0);

        let exact = height(Vec3::ZERO, 0.0, &params);
        assert_eq!(exact, 0.0, "sin(0) at the origin is exactly zero");

        // Shift = 10 / (2π · 500), phase = 2π · shift / 20, height = a1 · sin(phase)
        let approx = approximate_water_point(Vec3::ZERO, 0.0, &params);
        let a1 = 10.0 / (2.0 * std::f32::consts::PI * 100.0);
        let expected = a1 * (-0.001f32).sin();
        assert!(
            (approx.y - expected).abs() < 1e-6,
            "approximate height {} should match {}",
            approx.y,
            expected
        );
        assert!(approx.y.abs() < 1e-3);
    }

    #[test]
    fn test_still_water_is_flat() {
        let params = WavePreset::Still.to_params(4.0);

        for (x, z, t) in [(0.0, 0.0, 0.0), (13.0, -7.5, 2.0), (-100.0, 40.0, 99.0)] {
            let p = Vec3::new(x, 0.0, z);
            assert_eq!(height(p, t, &params), 4.0);
            let approx = approximate_water_point(p, t, &params);
            assert_eq!(approx.y, 4.0);
        }
    }

    #[test]
    fn test_continuous_in_position() {
        let params = WavePreset::Storm.to_params(0.0);
        let terms = WaveTerms::new(&params);

        for i in 0..50 {
            let x = i as f32 * 3.7 - 90.0;
            let z = i as f32 * -1.3 + 20.0;
            let h = terms.surface_height(x, z, 1.25);
            let h_near = terms.surface_height(x + 1e-3, z + 1e-3, 1.25);
            assert!(
                (h - h_near).abs() < 1e-2,
                "surface jumped by {} at ({}, {})",
                (h - h_near).abs(),
                x,
                z
            );
        }
    }

    #[test]
    fn test_periodic_in_time() {
        let params = single_wave(2.0, 3.0, 0.8);
        let period = params.primary.period();

        for i in 0..10 {
            let p = Vec3::new(i as f32 * 1.7, 0.0, i as f32 * -0.6);
            let h0 = height(p, 0.3, &params);
            let h1 = height(p, 0.3 + period, &params);
            assert!((h0 - h1).abs() < 1e-3, "height should repeat after one period");
        }
    }

    #[test]
    fn test_flat_primary_wave_stays_finite() {
        let mut params = WavePreset::Open.to_params(0.0);
        params.primary.amplitude = 0.0;

        let p = approximate_water_point(Vec3::new(3.0, 0.0, 8.0), 1.0, &params);
        assert!(p.is_finite());
    }

    #[test]
    fn test_approximate_keeps_xz_close() {
        let params = WavePreset::Open.to_params(0.0);
        let terms = WaveTerms::new(&params);
        let query = Vec3::new(12.0, -3.0, -4.0);

        let p = terms.approximate_point(query, 2.0);
        let drift = Vec2::new(p.x - query.x, p.z - query.z).length();
        assert!(drift <= 2.0 * terms.shift1 + 1e-5);
    }
}
