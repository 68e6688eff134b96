use bevy::math::{Quat, Vec3};
use serde::{Deserialize, Serialize};

/// How a force-like quantity is applied to a body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ForceMode {
    /// Continuous force, scaled by mass and time step
    Force,
    /// Continuous acceleration, scaled by time step only
    Acceleration,
    /// Instant impulse, scaled by mass
    Impulse,
    /// Instant change in velocity
    VelocityChange,
}

/// Force application primitive provided by whatever integrates bodies.
pub trait RigidBody {
    fn position(&self) -> Vec3;
    fn rotation(&self) -> Quat;

    fn transform_point(&self, local: Vec3) -> Vec3 {
        self.position() + self.rotation() * local
    }

    fn linear_velocity(&self) -> Vec3;
    fn angular_velocity(&self) -> Vec3;

    fn add_force(&mut self, force: Vec3, mode: ForceMode);
    fn add_torque(&mut self, torque: Vec3, mode: ForceMode);

    /// Force through a world point, producing torque about the body's origin.
    fn add_force_at_position(&mut self, force: Vec3, position: Vec3, mode: ForceMode) {
        self.add_force(force, mode);
        self.add_torque((position - self.position()).cross(force), mode);
    }
}

/// Minimal rigid body integrated with semi-implicit Euler.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PhysicsBody {
    pub position: Vec3,
    pub rotation: Quat,
    pub velocity: Vec3,
    pub angular_velocity: Vec3,
    pub mass: f32,
    /// Scalar moment of inertia
    pub inertia: f32,
    pub use_gravity: bool,
    #[serde(skip)]
    acceleration: Vec3,
    #[serde(skip)]
    angular_acceleration: Vec3,
    #[serde(skip)]
    velocity_change: Vec3,
    #[serde(skip)]
    angular_velocity_change: Vec3,
}

impl PhysicsBody {
    pub fn new(position: Vec3, mass: f32) -> Self {
        let mass = mass.max(f32::EPSILON);
        Self {
            position,
            rotation: Quat::IDENTITY,
            velocity: Vec3::ZERO,
            angular_velocity: Vec3::ZERO,
            mass,
            inertia: mass,
            use_gravity: true,
            acceleration: Vec3::ZERO,
            angular_acceleration: Vec3::ZERO,
            velocity_change: Vec3::ZERO,
            angular_velocity_change: Vec3::ZERO,
        }
    }

    pub fn with_rotation(mut self, rotation: Quat) -> Self {
        self.rotation = rotation;
        self
    }

    /// Apply everything accumulated since the last step, then move.
    pub fn integrate(&mut self, gravity: Vec3, delta: f32) {
        let gravity = if self.use_gravity { gravity } else { Vec3::ZERO };

        self.velocity += self.velocity_change + (self.acceleration + gravity) * delta;
        self.angular_velocity += self.angular_velocity_change + self.angular_acceleration * delta;

        self.position += self.velocity * delta;

        let spin = self.angular_velocity * delta;
        if spin != Vec3::ZERO {
            self.rotation = (Quat::from_scaled_axis(spin) * self.rotation).normalize();
        }

        self.clear_accumulators();
    }

    fn clear_accumulators(&mut self) {
        self.acceleration = Vec3::ZERO;
        self.angular_acceleration = Vec3::ZERO;
        self.velocity_change = Vec3::ZERO;
        self.angular_velocity_change = Vec3::ZERO;
    }

    /// Total continuous acceleration applied since the last step.
    pub fn pending_acceleration(&self) -> Vec3 {
        self.acceleration
    }

    pub fn pending_velocity_change(&self) -> Vec3 {
        self.velocity_change
    }

    pub fn pending_angular_velocity_change(&self) -> Vec3 {
        self.angular_velocity_change
    }
}

impl RigidBody for PhysicsBody {
    fn position(&self) -> Vec3 {
        self.position
    }

    fn rotation(&self) -> Quat {
        self.rotation
    }

    fn linear_velocity(&self) -> Vec3 {
        self.velocity
    }

    fn angular_velocity(&self) -> Vec3 {
        self.angular_velocity
    }

    fn add_force(&mut self, force: Vec3, mode: ForceMode) {
        match mode {
            ForceMode::Force => self.acceleration += force / self.mass,
            ForceMode::Acceleration => self.acceleration += force,
            ForceMode::Impulse => self.velocity_change += force / self.mass,
            ForceMode::VelocityChange => self.velocity_change += force,
        }
    }

    fn add_torque(&mut self, torque: Vec3, mode: ForceMode) {
        match mode {
            ForceMode::Force => self.angular_acceleration += torque / self.inertia,
            ForceMode::Acceleration => self.angular_acceleration += torque,
            ForceMode::Impulse => self.angular_velocity_change += torque / self.inertia,
            ForceMode::VelocityChange => self.angular_velocity_change += torque,
        }
    }
}
