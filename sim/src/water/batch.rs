//! Batched accurate height queries.
//!
//! Every point is evaluated independently against a read-only
//! [`WaveTerms`], so the batch is split across the rayon pool and each
//! worker walks its slice four lanes at a time. Output order always
//! matches input order.

use bevy::math::Vec3;
use rayon::prelude::*;

use super::config::WaveParams;
use super::height_field::WaveTerms;

/// Number of points evaluated together in the inner loop.
pub const LANE_WIDTH: usize = 4;

/// Points handed to one rayon task. Below this a batch runs on one thread.
pub const MIN_PARALLEL_CHUNK: usize = 256;

/// Accurate surface sampler for many points per call.
#[derive(Debug, Clone, Copy)]
pub struct WaterSampler {
    terms: WaveTerms,
}

impl WaterSampler {
    pub fn new(params: &WaveParams) -> Self {
        Self {
            terms: WaveTerms::new(params),
        }
    }

    pub fn from_terms(terms: WaveTerms) -> Self {
        Self { terms }
    }

    /// Sample heights at 4 positions at once.
    #[inline]
    pub fn sample_heights_x4(
        &self,
        x: [f32; LANE_WIDTH],
        z: [f32; LANE_WIDTH],
        time: f32,
    ) -> [f32; LANE_WIDTH] {
        let t = &self.terms;
        let mut heights = [t.base_level; LANE_WIDTH];

        let mut f1 = [0.0; LANE_WIDTH];
        let mut f2 = [0.0; LANE_WIDTH];
        for i in 0..LANE_WIDTH {
            f1[i] = t.k1 * ((x[i] * t.dir.x + z[i] * t.dir.y) * t.inv_span - t.speed1 * time);
            f2[i] = t.k2 * ((-x[i] * t.dir.x + z[i] * t.dir.y) * t.inv_span - t.speed2 * time);
        }

        for i in 0..LANE_WIDTH {
            heights[i] += t.a1 * f1[i].sin() + t.a2 * f2[i].sin();
        }

        if t.noise_amplitude != 0.0 {
            for i in 0..LANE_WIDTH {
                heights[i] += t.noise_height(x[i], z[i], time);
            }
        }

        heights
    }

    /// Resolve every point's Y to the surface in place. X/Z are untouched.
    pub fn resolve_in_place(&self, points: &mut [Vec3], time: f32) {
        if points.len() < MIN_PARALLEL_CHUNK {
            self.resolve_slice(points, time);
            return;
        }

        points
            .par_chunks_mut(MIN_PARALLEL_CHUNK)
            .for_each(|chunk| self.resolve_slice(chunk, time));
    }

    /// Resolve a copy of `points`, preserving order and count.
    pub fn query_batch(&self, points: &[Vec3], time: f32) -> Vec<Vec3> {
        let mut out = points.to_vec();
        self.resolve_in_place(&mut out, time);
        out
    }

    /// Accurate query for a single point.
    ///
    /// Pays the full batch setup for one point. Prefer [`Self::query_batch`]
    /// when more than one point is needed per tick.
    pub fn query_point(&self, point: Vec3, time: f32) -> Vec3 {
        let mut single = [point];
        self.resolve_in_place(&mut single, time);
        single[0]
    }

    fn resolve_slice(&self, points: &mut [Vec3], time: f32) {
        let mut lanes = points.chunks_exact_mut(LANE_WIDTH);

        for lane in &mut lanes {
            let x = [lane[0].x, lane[1].x, lane[2].x, lane[3].x];
            let z = [lane[0].z, lane[1].z, lane[2].z, lane[3].z];
            let heights = self.sample_heights_x4(x, z, time);
            for (point, height) in lane.iter_mut().zip(heights) {
                point.y = height;
            }
        }

        // Scalar fallback for the tail
        for point in lanes.into_remainder() {
            *point = self.terms.accurate_point(*point, time);
        }
    }
}

/// Accurate batched query against `params`. Result order matches `points`.
pub fn query_batch(points: &[Vec3], time: f32, params: &WaveParams) -> Vec<Vec3> {
    WaterSampler::new(params).query_batch(points, time)
}
