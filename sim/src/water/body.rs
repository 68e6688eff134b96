//! A water surface instance owned by the simulation.

use bevy::math::Vec3;

use super::batch::WaterSampler;
use super::config::WaveParams;
use super::height_field::WaveTerms;
use super::WaterSurface;

/// One procedurally animated water surface.
///
/// Holds the sanitized parameters plus precomputed per-wave constants,
/// so both query paths skip the setup work.
#[derive(Debug, Clone)]
pub struct WaterBody {
    params: WaveParams,
    terms: WaveTerms,
    sampler: WaterSampler,
}

impl WaterBody {
    /// Invalid parameters are replaced by defaults with a warning.
    pub fn new(params: WaveParams) -> Self {
        let params = params.sanitized();
        let terms = WaveTerms::new(&params);

        Self {
            params,
            terms,
            sampler: WaterSampler::from_terms(terms),
        }
    }

    /// Update the wave configuration (e.g. when the weather changes).
    pub fn set_params(&mut self, params: WaveParams) {
        *self = Self::new(params);
    }

    pub fn params(&self) -> &WaveParams {
        &self.params
    }

    pub fn sampler(&self) -> &WaterSampler {
        &self.sampler
    }

    /// Exact surface height, noise included.
    #[inline]
    pub fn height(&self, x: f32, z: f32, time: f32) -> f32 {
        self.terms.surface_height(x, z, time)
    }

    #[inline]
    pub fn is_underwater(&self, position: Vec3, time: f32) -> bool {
        position.y < self.height(position.x, position.z, time)
    }

    /// Positive when underwater, negative above the surface.
    #[inline]
    pub fn depth_at(&self, position: Vec3, time: f32) -> f32 {
        self.height(position.x, position.z, time) - position.y
    }
}

impl WaterSurface for WaterBody {
    fn approximate_point(&self, point: Vec3, time: f32) -> Vec3 {
        self.terms.approximate_point(point, time)
    }

    fn query_batch(&self, points: &mut [Vec3], time: f32) {
        self.sampler.resolve_in_place(points, time);
    }

    fn accurate_point(&self, point: Vec3, time: f32) -> Vec3 {
        self.sampler.query_point(point, time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::water::config::WavePreset;

    #[test]
    fn test_still_water_height() {
        let water = WaterBody::new(WavePreset::Still.to_params(10.0));

        assert_eq!(water.height(0.0, 0.0, 0.0), 10.0);
        assert_eq!(water.height(100.0, 100.0, 5.0), 10.0);
    }

    #[test]
    fn test_wave_variation() {
        let water = WaterBody::new(WavePreset::Open.to_params(10.0));

        let h1 = water.height(3.0, 1.0, 0.0);
        let h2 = water.height(3.0, 1.0, 1.0);
        let h3 = water.height(8.0, 5.0, 0.0);

        assert_ne!(h1, h2);
        assert_ne!(h1, h3);
    }

    #[test]
    fn test_underwater_detection() {
        let water = WaterBody::new(WavePreset::Still.to_params(10.0));

        assert!(water.is_underwater(Vec3::new(0.0, 5.0, 0.0), 0.0));
        assert!(!water.is_underwater(Vec3::new(0.0, 15.0, 0.0), 0.0));
        assert_eq!(water.depth_at(Vec3::new(0.0, 7.0, 0.0), 0.0), 3.0);
    }

    #[test]
    fn test_invalid_params_are_sanitized() {
        let mut params = WavePreset::Open.to_params(0.0);
        params.primary.frequency = 0.0;

        let water = WaterBody::new(params);
        assert!(water.params().validate().is_ok());
        assert!(water.approximate_point(Vec3::new(1.0, 0.0, 2.0), 0.5).is_finite());
    }

    #[test]
    fn test_paths_disagree_only_slightly() {
        let mut params = WavePreset::Open.to_params(0.0);
        params.noise.amplitude = 0.0;
        let water = WaterBody::new(params);

        for i in 0..20 {
            let p = Vec3::new(i as f32 * 4.1, 0.0, i as f32 * -2.3);
            let approx = water.approximate_point(p, 1.0);
            let accurate = water.accurate_point(p, 1.0);
            assert!(
                (approx.y - accurate.y).abs() < 0.05,
                "approximate and accurate heights should stay close"
            );
        }
    }
}
