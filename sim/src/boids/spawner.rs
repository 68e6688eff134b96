use bevy::math::{Quat, Vec3};
use bevy_log::warn;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::agent::{AgentKind, BoidAgent, SwimSettings};
use super::flocking::FlockingSettings;
use super::obstacles::BoundsVolume;

/// One kind of fish a spawner can produce.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FishTemplate {
    pub species: String,
    pub swim: SwimSettings,
    pub kind: AgentKind,
}

impl Default for FishTemplate {
    fn default() -> Self {
        Self {
            species: "Fish".to_string(),
            swim: SwimSettings::default(),
            kind: AgentKind::Flocking(FlockingSettings::default()),
        }
    }
}

/// Scatters a school of fish around a point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchoolSpawner {
    pub center: Vec3,
    pub radius: f32,
    pub count: usize,
    /// Size of the box, centered on `center`, that spawned fish stay in
    pub bounds_size: Option<Vec3>,
    /// Each fish picks one uniformly
    pub templates: Vec<FishTemplate>,
}

impl Default for SchoolSpawner {
    fn default() -> Self {
        Self {
            center: Vec3::ZERO,
            radius: 20.0,
            count: 40,
            bounds_size: None,
            templates: vec![FishTemplate::default()],
        }
    }
}

impl SchoolSpawner {
    pub const DEFAULT_BOUNDS_SIZE: Vec3 = Vec3::splat(50.0);

    pub fn bounds(&self) -> Option<BoundsVolume> {
        self.bounds_size
            .map(|size| BoundsVolume::new(self.center, size))
    }

    pub fn spawn(&self, rng: &mut impl Rng) -> Vec<BoidAgent> {
        if self.templates.is_empty() {
            warn!(
                "School spawner at {:?} has no fish templates, nothing spawned",
                self.center
            );
            return Vec::new();
        }

        let bounds = self.bounds();
        (0..self.count)
            .map(|_| {
                let template = &self.templates[rng.gen_range(0..self.templates.len())];
                let position = self.center + random_in_unit_sphere(rng) * self.radius;
                BoidAgent::new(
                    template.species.clone(),
                    position,
                    random_rotation(rng),
                    template.swim,
                    template.kind,
                )
                .with_bounds(bounds)
            })
            .collect()
    }
}

pub fn random_in_unit_sphere(rng: &mut impl Rng) -> Vec3 {
    loop {
        let point = Vec3::new(
            rng.gen_range(-1.0..=1.0),
            rng.gen_range(-1.0..=1.0),
            rng.gen_range(-1.0..=1.0),
        );
        if point.length_squared() <= 1.0 {
            return point;
        }
    }
}

/// Uniformly distributed orientation.
pub fn random_rotation(rng: &mut impl Rng) -> Quat {
    use std::f32::consts::TAU;

    let (u1, u2, u3): (f32, f32, f32) = (rng.gen(), rng.gen(), rng.gen());
    let (a, b) = ((1.0 - u1).sqrt(), u1.sqrt());
    Quat::from_xyzw(
        a * (TAU * u2).sin(),
        a * (TAU * u2).cos(),
        b * (TAU * u3).sin(),
        b * (TAU * u3).cos(),
    )
    .normalize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boids::agent::Steerable;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_spawn_inside_radius() {
        let spawner = SchoolSpawner {
            center: Vec3::new(10.0, -5.0, 3.0),
            radius: 8.0,
            count: 200,
            ..Default::default()
        };
        let mut rng = StdRng::seed_from_u64(7);

        let agents = spawner.spawn(&mut rng);

        assert_eq!(agents.len(), 200);
        for agent in &agents {
            assert!(agent.position.distance(spawner.center) <= 8.0 + 1e-4);
            assert!((agent.forward().length() - 1.0).abs() < 1e-4);
            assert!(agent.bounds().is_none());
        }
    }

    #[test]
    fn test_templates_are_mixed() {
        let spawner = SchoolSpawner {
            count: 100,
            templates: vec![
                FishTemplate {
                    species: "Tuna".into(),
                    ..Default::default()
                },
                FishTemplate {
                    species: "Grouper".into(),
                    kind: AgentKind::Solitary,
                    ..Default::default()
                },
            ],
            ..Default::default()
        };
        let mut rng = StdRng::seed_from_u64(11);

        let agents = spawner.spawn(&mut rng);
        let tuna = agents.iter().filter(|a| a.species_name() == "Tuna").count();

        assert!(tuna > 20 && tuna < 80, "got {} tuna out of 100", tuna);
        assert!(agents
            .iter()
            .filter(|a| a.species_name() == "Grouper")
            .all(|a| !a.is_flocking()));
    }

    #[test]
    fn test_bounds_are_shared() {
        let spawner = SchoolSpawner {
            count: 5,
            bounds_size: Some(SchoolSpawner::DEFAULT_BOUNDS_SIZE),
            ..Default::default()
        };
        let mut rng = StdRng::seed_from_u64(3);

        for agent in spawner.spawn(&mut rng) {
            let bounds = agent.bounds().expect("spawned with bounds");
            assert_eq!(bounds.half_size, Vec3::splat(25.0));
            assert!(bounds.contains(agent.position));
        }
    }

    #[test]
    fn test_no_templates_spawns_nothing() {
        let spawner = SchoolSpawner {
            templates: vec![],
            ..Default::default()
        };
        assert!(spawner.spawn(&mut StdRng::seed_from_u64(0)).is_empty());
    }

    #[test]
    fn test_random_rotation_is_unit() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..100 {
            assert!(random_rotation(&mut rng).is_normalized());
        }
    }
}
