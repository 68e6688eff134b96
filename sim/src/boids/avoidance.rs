//! Obstacle avoidance: view ray fans, escape direction selection and
//! direction smoothing.

use bevy::math::{EulerRot, Quat, Vec3};
use bevy_log::warn;
use serde::{Deserialize, Serialize};

use super::obstacles::{BoundsVolume, CollisionWorld, RayHit};
use crate::constants::MAX_VIEW_RAYS;

/// Time for the avoidance direction to catch up with its target, in seconds.
pub const AVOIDANCE_DIR_SMOOTHING: f32 = 0.5;

/// Which cast an agent uses for which check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DetectionQuality {
    /// Rays everywhere
    Low,
    /// Sphere cast for the forward check, rays for the view fan
    #[default]
    Medium,
    /// Sphere casts everywhere
    High,
}

impl DetectionQuality {
    pub fn forward_uses_sphere(self) -> bool {
        self != DetectionQuality::Low
    }

    pub fn fan_uses_sphere(self) -> bool {
        self == DetectionQuality::High
    }
}

/// Cast along `direction` with a ray or a sphere of `radius`.
#[inline]
pub fn cast(
    world: &dyn CollisionWorld,
    sphere: bool,
    origin: Vec3,
    direction: Vec3,
    radius: f32,
    max_distance: f32,
) -> Option<RayHit> {
    if sphere {
        world.cast_sphere(origin, radius, direction, max_distance)
    } else {
        world.cast_ray(origin, direction, max_distance)
    }
}

/// Local-space fan of unit view directions around +Z.
///
/// Rays spiral outwards in rings of `accuracy` rays, each ring tilted a
/// further `turn_fraction` degrees from forward, until the fan spans
/// `view_angle` degrees.
pub fn generate_view_rays(view_angle: f32, turn_fraction: f32, accuracy: u32) -> Vec<Vec3> {
    let accuracy = accuracy.max(2);
    let turn_fraction = turn_fraction.max(0.001);

    let mut rays = Vec::new();
    let mut step = 0u32;
    let mut i = 0u32;

    loop {
        if i % accuracy == 0 {
            step += 1;
        }

        let angle = std::f32::consts::TAU * i as f32 / accuracy as f32;
        let tilt = turn_fraction * step as f32;
        let rotation = Quat::from_euler(
            EulerRot::YXZ,
            (angle.cos() * tilt).to_radians(),
            (angle.sin() * tilt).to_radians(),
            0.0,
        );
        rays.push((rotation * Vec3::Z).normalize());

        i += 1;
        if (i as f32 * turn_fraction * 2.0) / accuracy as f32 > view_angle {
            break;
        }
        if rays.len() >= MAX_VIEW_RAYS {
            warn!(
                "View ray fan truncated to {} rays (view angle {}, turn fraction {})",
                MAX_VIEW_RAYS, view_angle, turn_fraction
            );
            break;
        }
    }

    rays
}

/// Inputs shared by the escape direction searches.
#[derive(Debug, Clone, Copy)]
pub struct AvoidanceProbe<'a> {
    pub position: Vec3,
    pub rotation: Quat,
    pub detection_radius: f32,
    pub bounds_radius: f32,
    pub quality: DetectionQuality,
    pub view_rays: &'a [Vec3],
}

impl AvoidanceProbe<'_> {
    fn world_ray(&self, local: Vec3) -> Vec3 {
        (self.rotation * local).normalize_or(self.rotation * Vec3::Z)
    }

    fn cast_fan(&self, world: &dyn CollisionWorld, direction: Vec3) -> Option<RayHit> {
        cast(
            world,
            self.quality.fan_uses_sphere(),
            self.position,
            direction,
            self.bounds_radius,
            self.detection_radius,
        )
    }

    /// First unobstructed view direction, or the one whose obstruction is
    /// farthest away. Falls back to forward when every ray is blocked at
    /// point blank.
    pub fn obstacle_ray(&self, world: &dyn CollisionWorld) -> Vec3 {
        self.search(|direction| self.cast_fan(world, direction))
    }

    /// Like [`Self::obstacle_ray`], but a direction also counts as blocked
    /// when travelling `detection_radius` along it would leave `bounds`.
    pub fn obstacle_ray_within(&self, world: &dyn CollisionWorld, bounds: &BoundsVolume) -> Vec3 {
        self.search(|direction| {
            self.cast_fan(world, direction).or_else(|| {
                let probe = self.position + direction * self.detection_radius;
                bounds.raycast(probe, -direction, self.detection_radius)
            })
        })
    }

    fn search(&self, mut blocked_by: impl FnMut(Vec3) -> Option<RayHit>) -> Vec3 {
        let mut best = self.rotation * Vec3::Z;
        let mut farthest = 0.0;

        for local in self.view_rays {
            let direction = self.world_ray(*local);
            match blocked_by(direction) {
                None => return direction,
                Some(hit) => {
                    let distance = self.position.distance(hit.point);
                    if distance > farthest {
                        best = direction;
                        farthest = distance;
                    }
                }
            }
        }

        best
    }
}

/// Whether the point `detection_radius` ahead lies outside `bounds`.
///
/// Casts from that point back towards the agent, so the hit is where the
/// agent would cross the boundary.
pub fn heading_for_bounds(
    bounds: &BoundsVolume,
    position: Vec3,
    forward: Vec3,
    detection_radius: f32,
) -> Option<RayHit> {
    bounds.raycast(position + forward * detection_radius, -forward, detection_radius)
}

/// Critically damped approach of `current` towards `target`.
///
/// `velocity` carries the rate of change between calls.
pub fn smooth_damp(
    current: Vec3,
    target: Vec3,
    velocity: &mut Vec3,
    smooth_time: f32,
    delta: f32,
) -> Vec3 {
    if delta <= 0.0 {
        return current;
    }

    let smooth_time = smooth_time.max(0.0001);
    let omega = 2.0 / smooth_time;
    let x = omega * delta;
    let decay = 1.0 / (1.0 + x + 0.48 * x * x + 0.235 * x * x * x);

    let change = current - target;
    let temp = (*velocity + change * omega) * delta;
    *velocity = (*velocity - temp * omega) * decay;
    let mut output = target + (change + temp) * decay;

    // Never overshoot
    if (target - current).dot(output - target) > 0.0 {
        output = target;
        *velocity = Vec3::ZERO;
    }

    output
}
