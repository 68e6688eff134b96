//! Buoyancy for rigid bodies floating on procedural water.
//!
//! Each [`BuoyantBody`] samples the surface at a fixed set of local points
//! and turns submersion into lift plus linear and angular drag. The
//! [`BuoyancyCoordinator`] optionally batches accurate queries for bodies
//! near the viewpoint; without it every body uses the approximate query.

pub mod coordinator;

use bevy::math::Vec3;
use nonempty::NonEmpty;
use serde::{Deserialize, Serialize};

use crate::physics::{ForceMode, RigidBody};
use crate::water::WaterSurface;

pub use coordinator::{BodyId, BuoyancyCoordinator, BuoyancySettings, BuoyancyStats, WaterId};

/// How strongly a body floats and how much the water slows it down.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuoyancyProfile {
    /// Depth below the surface at which a sample counts as fully submerged
    pub depth_before_submerged: f32,
    /// Lift at full submersion, in multiples of gravity
    pub buoyancy_amount: f32,
    /// Extra linear drag while submerged
    pub water_drag: f32,
    /// Extra angular drag while submerged
    pub water_angular_drag: f32,
}

impl Default for BuoyancyProfile {
    fn default() -> Self {
        Self {
            depth_before_submerged: 1.0,
            buoyancy_amount: 3.0,
            water_drag: 1.0,
            water_angular_drag: 0.5,
        }
    }
}

impl BuoyancyProfile {
    /// Clamped [0, 1] submersion of a sample `depth` below the surface.
    #[inline]
    pub fn submersion_ratio(&self, depth: f32) -> f32 {
        if depth <= 0.0 {
            return 0.0;
        }
        // A zero threshold means any submersion is full submersion
        (depth / self.depth_before_submerged).clamp(0.0, 1.0)
    }
}

/// A rigid body with buoyancy sample points.
#[derive(Debug, Clone)]
pub struct BuoyantBody<B: RigidBody> {
    pub body: B,
    pub profile: BuoyancyProfile,
    sample_points: NonEmpty<Vec3>,
    water: Option<WaterId>,
    /// Accurate surface points, one per sample point, written by the coordinator
    water_points: Vec<Vec3>,
    cache_time: Option<f32>,
    in_accurate_range: bool,
}

impl<B: RigidBody> BuoyantBody<B> {
    /// An empty `sample_points` list becomes a single sample at the origin.
    pub fn new(body: B, sample_points: Vec<Vec3>, profile: BuoyancyProfile) -> Self {
        let sample_points =
            NonEmpty::from_vec(sample_points).unwrap_or_else(|| NonEmpty::new(Vec3::ZERO));
        let profile = BuoyancyProfile {
            depth_before_submerged: profile.depth_before_submerged.max(0.0),
            ..profile
        };

        Self {
            body,
            profile,
            water_points: vec![Vec3::ZERO; sample_points.len()],
            sample_points,
            water: None,
            cache_time: None,
            in_accurate_range: false,
        }
    }

    pub fn with_water(mut self, water: WaterId) -> Self {
        self.water = Some(water);
        self
    }

    pub fn water(&self) -> Option<WaterId> {
        self.water
    }

    pub(crate) fn clear_water(&mut self) {
        self.water = None;
    }

    pub fn sample_points(&self) -> &NonEmpty<Vec3> {
        &self.sample_points
    }

    /// Whether the last coordinator update picked this body for batched queries.
    pub fn in_accurate_range(&self) -> bool {
        self.in_accurate_range
    }

    pub fn cached_water_points(&self) -> &[Vec3] {
        &self.water_points
    }

    /// World-space sample positions in sample order.
    pub fn world_sample_points(&self) -> impl Iterator<Item = Vec3> + '_ {
        self.sample_points
            .iter()
            .map(|local| self.body.transform_point(*local))
    }

    pub(crate) fn set_in_accurate_range(&mut self, in_range: bool) {
        self.in_accurate_range = in_range;
        if !in_range {
            self.cache_time = None;
        }
    }

    pub(crate) fn store_water_points(&mut self, points: &[Vec3], time: f32) {
        self.water_points.copy_from_slice(points);
        self.cache_time = Some(time);
    }

    fn cache_is_fresh(&self, time: f32, max_age: f32) -> bool {
        self.in_accurate_range
            && self
                .cache_time
                .is_some_and(|cached| (time - cached).abs() <= max_age)
    }

    /// Apply one step of lift and drag.
    ///
    /// Cached accurate points are used when `max_cache_age` is given and the
    /// cache is at most that old; every other sample falls back to the
    /// approximate query on `water`.
    pub fn apply_buoyancy(
        &mut self,
        water: &dyn WaterSurface,
        gravity: f32,
        delta: f32,
        time: f32,
        max_cache_age: Option<f32>,
    ) {
        let use_cache = max_cache_age.is_some_and(|age| self.cache_is_fresh(time, age));
        let gravity = gravity.abs();

        for (i, local) in self.sample_points.iter().enumerate() {
            let position = self.body.transform_point(*local);

            let water_point = if use_cache {
                self.water_points[i]
            } else {
                water.approximate_point(position, time)
            };

            if position.y >= water_point.y {
                continue;
            }

            let displacement = self.profile.submersion_ratio(water_point.y - position.y)
                * self.profile.buoyancy_amount;

            let velocity = self.body.linear_velocity();
            let angular_velocity = self.body.angular_velocity();

            self.body.add_force_at_position(
                Vec3::Y * gravity * displacement,
                position,
                ForceMode::Acceleration,
            );
            self.body.add_force(
                displacement * -velocity * self.profile.water_drag * delta,
                ForceMode::VelocityChange,
            );
            self.body.add_torque(
                displacement * -angular_velocity * self.profile.water_angular_drag * delta,
                ForceMode::VelocityChange,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::GRAVITY;
    use crate::physics::PhysicsBody;
    use crate::water::{WaterBody, WavePreset};

    fn still_water() -> WaterBody {
        WaterBody::new(WavePreset::Still.to_params(0.0))
    }

    #[test]
    fn test_empty_points_default_to_origin() {
        let body = BuoyantBody::new(
            PhysicsBody::new(Vec3::ZERO, 1.0),
            vec![],
            BuoyancyProfile::default(),
        );

        assert_eq!(body.sample_points().len(), 1);
        assert_eq!(*body.sample_points().first(), Vec3::ZERO);
    }

    #[test]
    fn test_above_water_applies_nothing() {
        let mut physics = PhysicsBody::new(Vec3::new(0.0, 2.0, 0.0), 1.0);
        physics.velocity = Vec3::new(1.0, -3.0, 0.5);
        physics.angular_velocity = Vec3::X;
        let mut body = BuoyantBody::new(
            physics,
            vec![Vec3::new(1.0, 0.0, 1.0), Vec3::new(-1.0, 0.0, -1.0)],
            BuoyancyProfile::default(),
        );

        body.apply_buoyancy(&still_water(), GRAVITY.y, 0.02, 0.0, None);

        assert_eq!(body.body.pending_acceleration(), Vec3::ZERO);
        assert_eq!(body.body.pending_velocity_change(), Vec3::ZERO);
        assert_eq!(body.body.pending_angular_velocity_change(), Vec3::ZERO);
    }

    #[test]
    fn test_force_at_submersion_threshold() {
        let profile = BuoyancyProfile::default();
        let physics = PhysicsBody::new(Vec3::new(0.0, -profile.depth_before_submerged, 0.0), 1.0);
        let mut body = BuoyantBody::new(physics, vec![Vec3::ZERO], profile);

        body.apply_buoyancy(&still_water(), GRAVITY.y, 0.02, 0.0, None);

        let lift = body.body.pending_acceleration();
        let expected = profile.buoyancy_amount * GRAVITY.y.abs();
        assert!((lift.y - expected).abs() < 1e-5, "lift {} should be {}", lift.y, expected);
        assert_eq!(lift.x, 0.0);
        assert_eq!(lift.z, 0.0);
    }

    #[test]
    fn test_deep_body_is_clamped() {
        let profile = BuoyancyProfile::default();
        let physics = PhysicsBody::new(Vec3::new(0.0, -50.0, 0.0), 1.0);
        let mut body = BuoyantBody::new(physics, vec![Vec3::ZERO], profile);

        body.apply_buoyancy(&still_water(), GRAVITY.y, 0.02, 0.0, None);

        let expected = profile.buoyancy_amount * GRAVITY.y.abs();
        assert!((body.body.pending_acceleration().y - expected).abs() < 1e-5);
    }

    #[test]
    fn test_drag_opposes_motion() {
        let mut physics = PhysicsBody::new(Vec3::new(0.0, -0.5, 0.0), 1.0);
        physics.velocity = Vec3::new(4.0, 0.0, -2.0);
        physics.angular_velocity = Vec3::new(0.0, 1.0, 0.0);
        let profile = BuoyancyProfile::default();
        let mut body = BuoyantBody::new(physics, vec![Vec3::ZERO], profile);

        body.apply_buoyancy(&still_water(), GRAVITY.y, 0.1, 0.0, None);

        // ratio 0.5, amount 3 => displacement 1.5
        let drag = body.body.pending_velocity_change();
        assert!((drag - Vec3::new(4.0, 0.0, -2.0) * -1.5 * 0.1).length() < 1e-5);
        let angular = body.body.pending_angular_velocity_change();
        assert!((angular - Vec3::new(0.0, -1.5 * 0.5 * 0.1, 0.0)).length() < 1e-5);
    }

    #[test]
    fn test_floating_body_settles() {
        let water = still_water();
        let mut body = BuoyantBody::new(
            PhysicsBody::new(Vec3::new(0.0, 3.0, 0.0), 1.0),
            vec![Vec3::ZERO],
            BuoyancyProfile::default(),
        );

        let delta = 0.02;
        for step in 0..2000 {
            body.apply_buoyancy(&water, GRAVITY.y, delta, step as f32 * delta, None);
            body.body.integrate(GRAVITY, delta);
        }

        // Equilibrium where ratio * 3 == 1
        let y = body.body.position.y;
        assert!((y + 1.0 / 3.0).abs() < 0.1, "body should float near -1/3, got {}", y);
    }
}
