use bevy::math::{Mat3, Quat, Vec3};
use bevy_log::warn;
use serde::{Deserialize, Serialize};

use super::avoidance::{
    cast, generate_view_rays, heading_for_bounds, smooth_damp, AvoidanceProbe, DetectionQuality,
    AVOIDANCE_DIR_SMOOTHING,
};
use super::flocking::{FlockMember, FlockQuery, FlockingSettings, SpeciesId, Steering};
use super::obstacles::{BoundsVolume, CollisionWorld, RayHit};
use crate::error::ConfigError;

/// Weight of the new velocity when a flocking agent blends with last tick's.
pub const FLOCK_VELOCITY_BLEND: f32 = 0.25;

/// Read access shared by everything that steers.
pub trait Steerable {
    fn position(&self) -> Vec3;
    fn forward(&self) -> Vec3;
    fn velocity(&self) -> Vec3;
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum SwimStyle {
    #[default]
    Straight,
    /// Vertical sine offset on top of the swim velocity
    Bobbing {
        speed: f32,
        height: f32,
        /// Pitch the body along the bob
        face_direction: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SwimSettings {
    pub max_velocity: f32,
    /// Sensing range for neighbors and obstacles
    pub detection_radius: f32,
    /// Radius of the fish itself, used for sphere casts and repulsion
    pub bounds_radius: f32,
    pub avoidance_force: f32,
    pub quality: DetectionQuality,
    /// Field of view in degrees, 0 to 360
    pub view_angle: f32,
    /// Degrees between view ray rings
    pub turn_fraction: f32,
    /// View rays per ring
    pub accuracy: u32,
    pub style: SwimStyle,
}

impl Default for SwimSettings {
    fn default() -> Self {
        Self {
            max_velocity: 5.0,
            detection_radius: 15.0,
            bounds_radius: 2.0,
            avoidance_force: 1.0,
            quality: DetectionQuality::Medium,
            view_angle: 200.0,
            turn_fraction: 12.0,
            accuracy: 8,
            style: SwimStyle::Straight,
        }
    }
}

impl SwimSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.turn_fraction.is_finite() || self.turn_fraction < 0.001 || self.accuracy < 2 {
            return Err(ConfigError::DegenerateViewRays {
                turn_fraction: self.turn_fraction,
                accuracy: self.accuracy,
            });
        }
        Ok(())
    }

    pub fn sanitized(mut self) -> Self {
        if let Err(err) = self.validate() {
            let defaults = Self::default();
            if !self.turn_fraction.is_finite() {
                self.turn_fraction = defaults.turn_fraction;
            }
            self.turn_fraction = self.turn_fraction.max(0.001);
            self.accuracy = self.accuracy.max(2);
            warn!(
                "{}; using turn fraction {} accuracy {}",
                err, self.turn_fraction, self.accuracy
            );
        }
        self.view_angle = self.view_angle.clamp(0.0, 360.0);
        self.max_velocity = self.max_velocity.max(0.0);
        self
    }
}

/// Tagged behavior: flocking agents aggregate neighbors, solitary ones never do.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum AgentKind {
    Solitary,
    Flocking(FlockingSettings),
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct AvoidanceState {
    /// Smoothed direction blended into velocity
    direction: Vec3,
    /// Where `direction` is heading
    target: Vec3,
    smoothing_velocity: Vec3,
    point: Vec3,
}

/// Rotation whose +Z axis points along `forward` with +Y kept as up.
pub fn look_rotation(forward: Vec3) -> Quat {
    let Some(forward) = forward.try_normalize() else {
        return Quat::IDENTITY;
    };
    let right = Vec3::Y
        .cross(forward)
        .try_normalize()
        .unwrap_or(Vec3::X);
    let up = forward.cross(right);
    Quat::from_mat3(&Mat3::from_cols(right, up, forward)).normalize()
}

/// One fish.
#[derive(Debug, Clone)]
pub struct BoidAgent {
    pub position: Vec3,
    pub rotation: Quat,
    pub velocity: Vec3,
    previous_velocity: Vec3,
    settings: SwimSettings,
    kind: AgentKind,
    species_name: String,
    species: SpeciesId,
    bounds: Option<BoundsVolume>,
    view_rays: Vec<Vec3>,
    avoidance: AvoidanceState,
    heading_for_collision: bool,
    active: bool,
}

impl BoidAgent {
    pub fn new(
        species_name: impl Into<String>,
        position: Vec3,
        rotation: Quat,
        settings: SwimSettings,
        kind: AgentKind,
    ) -> Self {
        let settings = settings.sanitized();
        let kind = match kind {
            AgentKind::Flocking(flocking) => AgentKind::Flocking(flocking.sanitized()),
            AgentKind::Solitary => AgentKind::Solitary,
        };
        let species_name = species_name.into();
        let rotation = rotation.normalize();
        let forward = rotation * Vec3::Z;
        let velocity = forward * settings.max_velocity;

        Self {
            position,
            rotation,
            velocity,
            previous_velocity: velocity,
            view_rays: generate_view_rays(
                settings.view_angle,
                settings.turn_fraction,
                settings.accuracy,
            ),
            settings,
            kind,
            species: SpeciesId::from_name(&species_name),
            species_name,
            bounds: None,
            avoidance: AvoidanceState {
                direction: forward,
                target: forward,
                smoothing_velocity: Vec3::ZERO,
                point: position,
            },
            heading_for_collision: false,
            active: true,
        }
    }

    /// Confine the agent to a box.
    pub fn with_bounds(mut self, bounds: Option<BoundsVolume>) -> Self {
        self.bounds = bounds;
        self
    }

    pub fn settings(&self) -> &SwimSettings {
        &self.settings
    }

    pub fn kind(&self) -> &AgentKind {
        &self.kind
    }

    pub fn is_flocking(&self) -> bool {
        matches!(self.kind, AgentKind::Flocking(_))
    }

    pub fn species(&self) -> SpeciesId {
        self.species
    }

    pub fn species_name(&self) -> &str {
        &self.species_name
    }

    pub fn bounds(&self) -> Option<&BoundsVolume> {
        self.bounds.as_ref()
    }

    pub fn view_rays(&self) -> &[Vec3] {
        &self.view_rays
    }

    pub fn heading_for_collision(&self) -> bool {
        self.heading_for_collision
    }

    pub fn avoidance_direction(&self) -> Vec3 {
        self.avoidance.direction
    }

    pub fn avoidance_point(&self) -> Vec3 {
        self.avoidance.point
    }

    /// Velocity after the last steering update, kept while culled.
    pub fn previous_velocity(&self) -> Vec3 {
        self.previous_velocity
    }

    /// False while culled.
    pub fn is_active(&self) -> bool {
        self.active
    }

    pub(crate) fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    /// Stop in place until reactivated.
    pub(crate) fn suspend(&mut self) {
        self.velocity = Vec3::ZERO;
        self.heading_for_collision = false;
        self.active = false;
    }

    pub fn member(&self) -> FlockMember {
        FlockMember {
            position: self.position,
            velocity: self.velocity,
            species: self.species,
        }
    }

    /// Query for the flocking rule, or None for solitary agents.
    pub fn flock_query(&self) -> Option<FlockQuery> {
        match self.kind {
            AgentKind::Flocking(settings) => Some(FlockQuery {
                position: self.position,
                velocity: self.velocity,
                forward: self.forward(),
                species: self.species,
                detection_radius: self.settings.detection_radius,
                bounds_radius: self.settings.bounds_radius,
                settings,
            }),
            AgentKind::Solitary => None,
        }
    }

    /// Obstacle straight ahead, cast with the width set by the detection quality.
    pub fn forward_hit(&self, world: &dyn CollisionWorld) -> Option<RayHit> {
        cast(
            world,
            self.settings.quality.forward_uses_sphere(),
            self.position,
            self.forward(),
            self.settings.bounds_radius,
            self.settings.detection_radius,
        )
    }

    pub fn apply_steering(&mut self, steering: Steering) {
        match steering {
            Steering::Solitary => self.velocity += self.forward(),
            Steering::Flock(velocity) => self.velocity = velocity,
        }
    }

    /// Blend in obstacle avoidance, then renormalize to max velocity.
    ///
    /// `hit` is this tick's collision cast; its point becomes the avoidance point.
    pub fn resolve_velocity(
        &mut self,
        world: &dyn CollisionWorld,
        hit: Option<RayHit>,
        delta: f32,
    ) {
        self.heading_for_collision = hit.is_some();
        if let Some(hit) = hit {
            self.avoidance.point = hit.point;
        }

        self.detect_collision(world, delta);

        let forward = self.forward();
        if self.is_flocking() {
            self.velocity = self
                .previous_velocity
                .lerp(self.velocity, FLOCK_VELOCITY_BLEND);
        }
        self.velocity = self.velocity.normalize_or(forward) * self.settings.max_velocity;
        self.previous_velocity = self.velocity;
    }

    fn probe(&self) -> AvoidanceProbe<'_> {
        AvoidanceProbe {
            position: self.position,
            rotation: self.rotation,
            detection_radius: self.settings.detection_radius,
            bounds_radius: self.settings.bounds_radius,
            quality: self.settings.quality,
            view_rays: &self.view_rays,
        }
    }

    fn detect_collision(&mut self, world: &dyn CollisionWorld, delta: f32) {
        let forward = self.forward();
        let detection_radius = self.settings.detection_radius;

        let bounds_hit = self
            .bounds
            .as_ref()
            .and_then(|bounds| heading_for_bounds(bounds, self.position, forward, detection_radius));
        if let Some(hit) = bounds_hit {
            self.avoidance.point = hit.point;
        }
        let leaving_bounds = bounds_hit.is_some();
        let avoiding = self.heading_for_collision || leaving_bounds;

        if avoiding {
            // Keep the current escape route while it stays clear
            let route_blocked = cast(
                world,
                self.settings.quality.forward_uses_sphere(),
                self.position,
                self.avoidance.target,
                self.settings.bounds_radius,
                detection_radius,
            )
            .is_some();

            if route_blocked || leaving_bounds {
                self.avoidance.target = match &self.bounds {
                    Some(bounds) if leaving_bounds => self.probe().obstacle_ray_within(world, bounds),
                    _ => self.probe().obstacle_ray(world),
                };
            }

            let closeness =
                1.0 - (self.position.distance(self.avoidance.point) / detection_radius).clamp(0.0, 1.0);
            self.velocity += self.avoidance.direction.normalize_or_zero()
                * self.settings.max_velocity
                * closeness
                * self.settings.avoidance_force;
        }

        let target = if avoiding { self.avoidance.target } else { forward };
        if self.avoidance.direction != target {
            self.avoidance.direction = smooth_damp(
                self.avoidance.direction,
                target,
                &mut self.avoidance.smoothing_velocity,
                AVOIDANCE_DIR_SMOOTHING,
                delta,
            );
        }
    }

    /// Face the velocity, apply the swim style and move.
    pub fn advance(&mut self, delta: f32, time: f32) {
        if self.velocity != Vec3::ZERO {
            self.rotation = look_rotation(self.velocity);
        }

        if let SwimStyle::Bobbing {
            speed,
            height,
            face_direction,
        } = self.settings.style
        {
            let wave = height * (speed * std::f32::consts::PI * time).cos();
            self.position.y -= wave / 100.0;
            if face_direction {
                self.rotation *= Quat::from_rotation_x((wave / 10.0).to_radians());
            }
        }

        self.position += self.velocity * delta;
    }

    /// Full scalar tick for an agent that does not flock.
    pub fn update_solitary(&mut self, world: &dyn CollisionWorld, delta: f32, time: f32) {
        self.apply_steering(Steering::Solitary);
        let hit = self.forward_hit(world);
        self.resolve_velocity(world, hit, delta);
        self.advance(delta, time);
    }
}

impl Steerable for BoidAgent {
    fn position(&self) -> Vec3 {
        self.position
    }

    fn forward(&self) -> Vec3 {
        self.rotation * Vec3::Z
    }

    fn velocity(&self) -> Vec3 {
        self.velocity
    }
}
