//! Neighbor aggregation and the cohesion / alignment / repulsion rule.
//!
//! The rule only reads [`FlockMember`] values, so both execution modes feed
//! it the same way: the batched mode from a per-tick snapshot, the scalar
//! mode from live agent state.

use bevy::math::Vec3;
use bevy_log::warn;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Stable identity of a fish species. Only agents with equal ids flock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SpeciesId(pub u64);

impl SpeciesId {
    const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

    /// Hash of the alphabetic characters of `name`, so "Tuna (3)" and
    /// "Tuna" are the same species.
    pub fn from_name(name: &str) -> Self {
        let mut hash = Self::FNV_OFFSET;
        let mut buf = [0u8; 4];
        for c in name.chars().filter(|c| c.is_alphabetic()) {
            for byte in c.encode_utf8(&mut buf).bytes() {
                hash ^= byte as u64;
                hash = hash.wrapping_mul(Self::FNV_PRIME);
            }
        }
        SpeciesId(hash)
    }
}

/// `name` with everything but letters removed.
pub fn species_key(name: &str) -> String {
    name.chars().filter(|c| c.is_alphabetic()).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlockingSettings {
    pub cohesion_force: f32,
    pub alignment_force: f32,
    pub repulsion_force: f32,
    /// Fewer neighbors than this and the agent swims alone
    pub min_group: u32,
    /// Neighbor search stops once this many are found
    pub max_group: u32,
}

impl Default for FlockingSettings {
    fn default() -> Self {
        Self {
            cohesion_force: 5.0,
            alignment_force: 2.0,
            repulsion_force: 10.0,
            min_group: 1,
            max_group: 10,
        }
    }
}

impl FlockingSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_group < 1 || self.min_group < 1 || self.min_group > self.max_group {
            return Err(ConfigError::EmptyNeighborBounds {
                min: self.min_group,
                max: self.max_group,
            });
        }
        Ok(())
    }

    /// Clamp the group bounds to `1 <= min <= max`.
    pub fn sanitized(mut self) -> Self {
        if let Err(err) = self.validate() {
            self.max_group = self.max_group.max(1);
            self.min_group = self.min_group.clamp(1, self.max_group);
            warn!(
                "{}; using min {} max {}",
                err, self.min_group, self.max_group
            );
        }
        self
    }
}

/// A candidate neighbor as seen from another agent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlockMember {
    pub position: Vec3,
    pub velocity: Vec3,
    pub species: SpeciesId,
}

/// The steering agent's own state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlockQuery {
    pub position: Vec3,
    pub velocity: Vec3,
    pub forward: Vec3,
    pub species: SpeciesId,
    pub detection_radius: f32,
    pub bounds_radius: f32,
    pub settings: FlockingSettings,
}

/// Running sums over the accepted neighbors.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct NeighborSums {
    pub offset: Vec3,
    pub velocity: Vec3,
    pub position: Vec3,
    pub repulsion: Vec3,
    pub count: u32,
    pub repulsion_count: u32,
}

impl NeighborSums {
    /// Accumulate same-species candidates inside the detection radius until
    /// `max_group` are found. `candidates` must not contain the querying
    /// agent itself.
    pub fn gather(query: &FlockQuery, candidates: impl IntoIterator<Item = FlockMember>) -> Self {
        let detection_sq = query.detection_radius * query.detection_radius;
        let bounds_sq = query.bounds_radius * query.bounds_radius;

        let mut sums = NeighborSums::default();
        for member in candidates {
            if sums.count >= query.settings.max_group {
                break;
            }
            if member.species != query.species {
                continue;
            }

            let offset = member.position - query.position;
            let dist_sq = offset.length_squared();
            if dist_sq >= detection_sq {
                continue;
            }

            sums.offset += offset;
            sums.velocity += member.velocity;
            sums.position += member.position;
            sums.count += 1;

            if dist_sq < bounds_sq {
                sums.repulsion += offset;
                sums.repulsion_count += 1;
            }
        }
        sums
    }
}

/// Result of the flocking rule for one agent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Steering {
    /// Too few neighbors; keep swimming forward
    Solitary,
    /// New raw velocity, before avoidance and renormalization
    Flock(Vec3),
}

/// `Vec3::ZERO.lerp(target, t)` with `t` clamped to [0, 1] and NaN as 0.
#[inline]
fn lerp_from_zero(target: Vec3, t: f32) -> Vec3 {
    if t.is_nan() {
        return Vec3::ZERO;
    }
    target * t.clamp(0.0, 1.0)
}

pub fn steer(query: &FlockQuery, sums: &NeighborSums) -> Steering {
    if sums.count == 0 || sums.count < query.settings.min_group {
        return Steering::Solitary;
    }

    let count = sums.count as f32;
    let offset_avg = sums.offset / count;
    let velocity_avg = sums.velocity / count;
    let position_avg = sums.position / count;

    let cohesion = lerp_from_zero(
        offset_avg.normalize_or_zero(),
        query.position.distance(position_avg) / query.detection_radius,
    ) * query.settings.cohesion_force;

    let heading = velocity_avg.normalize_or_zero();
    let alignment = lerp_from_zero(
        heading,
        (1.0 - query.velocity.normalize_or_zero().dot(heading)).abs() / 2.0,
    ) * query.settings.alignment_force;

    let repulsion = if sums.repulsion_count == 0 {
        Vec3::ZERO
    } else {
        let repulsion_avg = sums.repulsion / sums.repulsion_count as f32;
        let bounds_sq = query.bounds_radius * query.bounds_radius;
        let repulsion = lerp_from_zero(
            repulsion_avg.normalize_or_zero(),
            1.0 - repulsion_avg.length_squared() / bounds_sq,
        ) * query.settings.repulsion_force;
        if repulsion.is_finite() {
            repulsion
        } else {
            Vec3::ZERO
        }
    };

    let v = cohesion + alignment - repulsion;
    if v == Vec3::ZERO || !v.is_finite() {
        Steering::Flock(query.forward)
    } else {
        Steering::Flock(v)
    }
}

/// Gather then steer.
pub fn flock_steering(
    query: &FlockQuery,
    candidates: impl IntoIterator<Item = FlockMember>,
) -> Steering {
    steer(query, &NeighborSums::gather(query, candidates))
}
