//! Fish agents: neighbor flocking, obstacle avoidance and the master that
//! steps them.
//!
//! A tick of [`BoidMaster::update`]:
//!
//! 1. suspend flocking agents beyond the disable distance,
//! 2. compute a [`Steering`] per active flocking agent, either from a
//!    snapshot in parallel or one agent at a time,
//! 3. cast one collision ray per agent,
//! 4. blend in obstacle avoidance, renormalize to max speed and move.
//!
//! Solitary agents skip step 2 and always steer straight ahead.

pub mod agent;
pub mod avoidance;
pub mod flocking;
pub mod master;
pub mod obstacles;
pub mod spawner;

pub use agent::{look_rotation, AgentKind, BoidAgent, Steerable, SwimSettings, SwimStyle};
pub use avoidance::{generate_view_rays, DetectionQuality};
pub use flocking::{FlockingSettings, SpeciesId, Steering};
pub use master::{AgentId, BoidMaster, BoidMasterSettings, ExecutionMode, FlockStats};
pub use obstacles::{BoundsVolume, CollisionWorld, Obstacle, ObstacleField, RayHit};
pub use spawner::{FishTemplate, SchoolSpawner};
