use std::fs;
use std::path::Path;

use bevy::math::Vec3;
use bevy_ecs::resource::Resource;
use bevy_log::info;
use ron::de::from_str;
use serde::{Deserialize, Serialize};
use sim::boids::{BoidMasterSettings, Obstacle, SchoolSpawner};
use sim::buoyancy::{BuoyancyProfile, BuoyancySettings};
use sim::water::{WaveParams, WavePreset};

/// Where the surface of a scenario comes from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum WaterSource {
    Preset { preset: WavePreset, base_level: f32 },
    Custom(WaveParams),
}

impl Default for WaterSource {
    fn default() -> Self {
        WaterSource::Preset {
            preset: WavePreset::default(),
            base_level: 0.0,
        }
    }
}

impl WaterSource {
    pub fn params(&self) -> WaveParams {
        match *self {
            WaterSource::Preset { preset, base_level } => preset.to_params(base_level),
            WaterSource::Custom(params) => params,
        }
    }
}

/// A rigid body floating on the scenario water.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FloaterConfig {
    pub position: Vec3,
    pub mass: f32,
    /// Local-space buoyancy sample points
    pub sample_points: Vec<Vec3>,
    pub profile: BuoyancyProfile,
    /// Floaters not attached to the water just sink
    pub attached: bool,
}

impl Default for FloaterConfig {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 2.0, 0.0),
            mass: 4.0,
            sample_points: vec![
                Vec3::new(1.0, 0.0, 1.0),
                Vec3::new(-1.0, 0.0, 1.0),
                Vec3::new(1.0, 0.0, -1.0),
                Vec3::new(-1.0, 0.0, -1.0),
            ],
            profile: BuoyancyProfile::default(),
            attached: true,
        }
    }
}

/// Circular path the viewpoint follows on the XZ plane.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrbitConfig {
    pub center: Vec3,
    pub radius: f32,
    /// Radians per second
    pub angular_speed: f32,
}

impl Default for OrbitConfig {
    fn default() -> Self {
        Self {
            center: Vec3::ZERO,
            radius: 120.0,
            angular_speed: 0.1,
        }
    }
}

impl OrbitConfig {
    pub fn position_at(&self, time: f32) -> Vec3 {
        let angle = self.angular_speed * time;
        self.center + Vec3::new(angle.cos(), 0.0, angle.sin()) * self.radius
    }
}

#[derive(Resource, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioConfig {
    pub name: String,
    pub water: WaterSource,
    pub buoyancy: BuoyancySettings,
    pub floaters: Vec<FloaterConfig>,
    pub master: BoidMasterSettings,
    pub schools: Vec<SchoolSpawner>,
    pub obstacles: Vec<Obstacle>,
    pub viewpoint: OrbitConfig,
    /// Ticks between two stats lines, 0 disables them
    pub report_interval: u64,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            water: WaterSource::default(),
            buoyancy: BuoyancySettings::default(),
            floaters: vec![
                FloaterConfig::default(),
                FloaterConfig {
                    position: Vec3::new(250.0, 2.0, 0.0),
                    ..Default::default()
                },
            ],
            master: BoidMasterSettings::default(),
            schools: vec![SchoolSpawner {
                center: Vec3::new(0.0, -20.0, 0.0),
                bounds_size: Some(SchoolSpawner::DEFAULT_BOUNDS_SIZE),
                ..Default::default()
            }],
            obstacles: vec![Obstacle::Sphere {
                center: Vec3::new(0.0, -20.0, 15.0),
                radius: 4.0,
            }],
            viewpoint: OrbitConfig::default(),
            report_interval: 50,
        }
    }
}

pub fn parse_scenario(contents: &str) -> Result<ScenarioConfig, ron::Error> {
    from_str(contents)
}

pub fn load_scenario(path: &Path) -> Result<ScenarioConfig, Box<dyn std::error::Error>> {
    if !path.exists() {
        info!(
            "Scenario file not found: {}. Using the default scenario.",
            path.display()
        );
        return Ok(ScenarioConfig::default());
    }

    let contents: String = fs::read_to_string(path)?;
    let scenario = parse_scenario(&contents)?;

    info!("Loaded scenario {} from {}", scenario.name, path.display());

    Ok(scenario)
}
