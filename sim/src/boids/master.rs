use bevy::math::Vec3;
use bevy_ecs::resource::Resource;
use bevy_log::debug;
use bevy_platform::collections::HashMap;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::agent::{BoidAgent, Steerable};
use super::flocking::{flock_steering, FlockMember, FlockQuery, FlockingSettings, SpeciesId, Steering};
use super::obstacles::{CollisionWorld, RayHit};
use crate::constants::DEFAULT_DISABLE_DISTANCE;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AgentId(pub usize);

/// How flocking agents are stepped each tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ExecutionMode {
    /// Snapshot every active agent, then steer and raycast in parallel
    #[default]
    Batched,
    /// One agent at a time against live neighbor state
    Scalar,
}

#[derive(Resource, Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoidMasterSettings {
    pub execution_mode: ExecutionMode,
    /// Flocking agents farther than this from the viewpoint are suspended
    pub disable_distance: f32,
}

impl Default for BoidMasterSettings {
    fn default() -> Self {
        Self {
            execution_mode: ExecutionMode::Batched,
            disable_distance: DEFAULT_DISABLE_DISTANCE,
        }
    }
}

/// Counters from the last [`BoidMaster::update`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlockStats {
    pub simulated: usize,
    pub culled: usize,
    /// Agents that went through the parallel batch
    pub batched: usize,
}

/// Flat per-agent inputs of one batched tick.
#[derive(Debug, Default)]
struct FlockArrays {
    positions: Vec<Vec3>,
    velocities: Vec<Vec3>,
    forwards: Vec<Vec3>,
    species: Vec<SpeciesId>,
    detection_radii: Vec<f32>,
    bounds_radii: Vec<f32>,
    settings: Vec<FlockingSettings>,
}

impl FlockArrays {
    fn clear(&mut self) {
        self.positions.clear();
        self.velocities.clear();
        self.forwards.clear();
        self.species.clear();
        self.detection_radii.clear();
        self.bounds_radii.clear();
        self.settings.clear();
    }

    fn push(&mut self, query: FlockQuery) {
        self.positions.push(query.position);
        self.velocities.push(query.velocity);
        self.forwards.push(query.forward);
        self.species.push(query.species);
        self.detection_radii.push(query.detection_radius);
        self.bounds_radii.push(query.bounds_radius);
        self.settings.push(query.settings);
    }

    fn len(&self) -> usize {
        self.positions.len()
    }

    fn query(&self, i: usize) -> FlockQuery {
        FlockQuery {
            position: self.positions[i],
            velocity: self.velocities[i],
            forward: self.forwards[i],
            species: self.species[i],
            detection_radius: self.detection_radii[i],
            bounds_radius: self.bounds_radii[i],
            settings: self.settings[i],
        }
    }

    fn members_except(&self, skip: usize) -> impl Iterator<Item = FlockMember> + '_ {
        (0..self.len()).filter(move |&j| j != skip).map(|j| FlockMember {
            position: self.positions[j],
            velocity: self.velocities[j],
            species: self.species[j],
        })
    }

    fn steer(&self, i: usize) -> Steering {
        flock_steering(&self.query(i), self.members_except(i))
    }

    /// Collision ray along the current velocity.
    fn collision_ray(&self, i: usize, world: &dyn CollisionWorld) -> Option<RayHit> {
        let direction = self.velocities[i].normalize_or(self.forwards[i]);
        world.cast_ray(self.positions[i], direction, self.detection_radii[i])
    }
}

/// Arena for the batched path. Buffers keep their capacity between ticks.
#[derive(Debug, Default)]
struct FlockSnapshot {
    /// Slot of each gathered agent in the master
    agents: Vec<usize>,
    inputs: FlockArrays,
    steering: Vec<Steering>,
    hits: Vec<Option<RayHit>>,
}

impl FlockSnapshot {
    fn clear(&mut self) {
        self.agents.clear();
        self.inputs.clear();
        self.steering.clear();
        self.hits.clear();
    }

    fn push(&mut self, slot: usize, query: FlockQuery) {
        self.agents.push(slot);
        self.inputs.push(query);
    }

    /// Steering and collision rays for every gathered agent. Both batches
    /// only read `inputs` and finish before this returns.
    fn compute(&mut self, world: &dyn CollisionWorld) {
        let count = self.inputs.len();
        self.steering.resize(count, Steering::Solitary);
        self.hits.resize(count, None);

        let inputs = &self.inputs;
        let (steering, hits) = (&mut self.steering, &mut self.hits);
        rayon::join(
            || {
                steering
                    .par_iter_mut()
                    .enumerate()
                    .for_each(|(i, out)| *out = inputs.steer(i))
            },
            || {
                hits.par_iter_mut()
                    .enumerate()
                    .for_each(|(i, out)| *out = inputs.collision_ray(i, world))
            },
        );
    }
}

/// Owns every fish and steps them once per tick.
#[derive(Debug, Default)]
pub struct BoidMaster {
    pub settings: BoidMasterSettings,
    agents: Vec<Option<BoidAgent>>,
    snapshot: FlockSnapshot,
    stats: FlockStats,
}

impl BoidMaster {
    pub fn new(settings: BoidMasterSettings) -> Self {
        Self {
            settings,
            ..Default::default()
        }
    }

    pub fn add_agent(&mut self, agent: BoidAgent) -> AgentId {
        self.agents.push(Some(agent));
        AgentId(self.agents.len() - 1)
    }

    pub fn remove_agent(&mut self, id: AgentId) -> Option<BoidAgent> {
        self.agents.get_mut(id.0).and_then(Option::take)
    }

    pub fn agent(&self, id: AgentId) -> Option<&BoidAgent> {
        self.agents.get(id.0).and_then(Option::as_ref)
    }

    pub fn agent_mut(&mut self, id: AgentId) -> Option<&mut BoidAgent> {
        self.agents.get_mut(id.0).and_then(Option::as_mut)
    }

    pub fn agents(&self) -> impl Iterator<Item = (AgentId, &BoidAgent)> {
        self.agents
            .iter()
            .enumerate()
            .filter_map(|(i, agent)| agent.as_ref().map(|agent| (AgentId(i), agent)))
    }

    pub fn agent_count(&self) -> usize {
        self.agents.iter().flatten().count()
    }

    /// Live agents per species.
    pub fn species_population(&self) -> HashMap<SpeciesId, usize> {
        let mut population = HashMap::default();
        for agent in self.agents.iter().flatten() {
            *population.entry(agent.species()).or_insert(0) += 1;
        }
        population
    }

    pub fn stats(&self) -> FlockStats {
        self.stats
    }

    /// Cull, steer and move every agent by `delta` seconds.
    pub fn update(&mut self, world: &dyn CollisionWorld, viewpoint: Vec3, delta: f32, time: f32) {
        self.stats = FlockStats::default();
        self.cull(viewpoint);

        match self.settings.execution_mode {
            ExecutionMode::Batched => self.step_batched(world, delta, time),
            ExecutionMode::Scalar => self.step_scalar(world, delta, time),
        }
    }

    fn cull(&mut self, viewpoint: Vec3) {
        let disable_sq = self.settings.disable_distance * self.settings.disable_distance;

        for agent in self.agents.iter_mut().flatten() {
            // Solitary fish are never culled
            let out_of_range =
                agent.is_flocking() && agent.position.distance_squared(viewpoint) > disable_sq;

            if out_of_range {
                if agent.is_active() {
                    debug!("Suspending {} at {:?}", agent.species_name(), agent.position);
                }
                agent.suspend();
                self.stats.culled += 1;
            } else {
                agent.set_active(true);
                self.stats.simulated += 1;
            }
        }
    }

    fn step_batched(&mut self, world: &dyn CollisionWorld, delta: f32, time: f32) {
        self.snapshot.clear();
        for (slot, agent) in self.agents.iter().enumerate() {
            let Some(agent) = agent else { continue };
            if !agent.is_active() {
                continue;
            }
            if let Some(query) = agent.flock_query() {
                self.snapshot.push(slot, query);
            }
        }

        self.snapshot.compute(world);
        self.stats.batched = self.snapshot.agents.len();

        for (i, &slot) in self.snapshot.agents.iter().enumerate() {
            if let Some(agent) = self.agents[slot].as_mut() {
                agent.apply_steering(self.snapshot.steering[i]);
                agent.resolve_velocity(world, self.snapshot.hits[i], delta);
                agent.advance(delta, time);
            }
        }

        for agent in self.agents.iter_mut().flatten() {
            if !agent.is_flocking() {
                agent.update_solitary(world, delta, time);
            }
        }
    }

    fn step_scalar(&mut self, world: &dyn CollisionWorld, delta: f32, time: f32) {
        for slot in 0..self.agents.len() {
            let steering = match self.agents[slot].as_ref() {
                Some(agent) if agent.is_active() => match agent.flock_query() {
                    Some(query) => flock_steering(&query, self.live_members_except(slot)),
                    None => Steering::Solitary,
                },
                _ => continue,
            };

            if let Some(agent) = self.agents[slot].as_mut() {
                agent.apply_steering(steering);
                let hit = agent.forward_hit(world);
                agent.resolve_velocity(world, hit, delta);
                agent.advance(delta, time);
            }
        }
    }

    fn live_members_except(&self, skip: usize) -> impl Iterator<Item = FlockMember> + '_ {
        self.agents
            .iter()
            .enumerate()
            .filter(move |(slot, _)| *slot != skip)
            .filter_map(|(_, agent)| agent.as_ref())
            .filter(|agent| agent.is_active() && agent.is_flocking())
            .map(BoidAgent::member)
    }

    /// Position and heading of every agent, for whatever draws them.
    pub fn poses(&self) -> impl Iterator<Item = (AgentId, Vec3, Vec3)> + '_ {
        self.agents()
            .map(|(id, agent)| (id, agent.position(), agent.forward()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boids::agent::{look_rotation, AgentKind, SwimSettings};
    use crate::boids::obstacles::ObstacleField;
    use bevy::math::Quat;

    const DELTA: f32 = 1.0 / 50.0;

    fn fish(name: &str, position: Vec3, heading: Vec3) -> BoidAgent {
        BoidAgent::new(
            name,
            position,
            look_rotation(heading),
            SwimSettings::default(),
            AgentKind::Flocking(FlockingSettings::default()),
        )
    }

    fn school() -> Vec<BoidAgent> {
        vec![
            fish("Tuna", Vec3::ZERO, Vec3::Z),
            fish("Tuna (1)", Vec3::new(3.0, 0.0, 1.0), Vec3::new(0.2, 0.0, 1.0)),
            fish("Tuna (2)", Vec3::new(-2.0, 1.0, 0.0), Vec3::new(-0.3, 0.1, 1.0)),
            fish("Tuna (3)", Vec3::new(0.5, -1.0, 4.0), Vec3::X),
            fish("Cod", Vec3::new(1.0, 0.0, 0.0), -Vec3::Z),
        ]
    }

    #[test]
    fn test_lone_fish_swims_forward() {
        let mut master = BoidMaster::default();
        let id = master.add_agent(fish("Tuna", Vec3::ZERO, Vec3::Z));

        master.update(&ObstacleField::default(), Vec3::ZERO, DELTA, 0.0);

        let agent = master.agent(id).unwrap();
        assert!((agent.velocity - Vec3::new(0.0, 0.0, 5.0)).length() < 1e-5);
        assert!((agent.position - Vec3::new(0.0, 0.0, 5.0 * DELTA)).length() < 1e-5);
    }

    #[test]
    fn test_speed_is_max_after_update() {
        for mode in [ExecutionMode::Batched, ExecutionMode::Scalar] {
            let mut master = BoidMaster::new(BoidMasterSettings {
                execution_mode: mode,
                ..Default::default()
            });
            for agent in school() {
                master.add_agent(agent);
            }

            for step in 0..20 {
                master.update(&ObstacleField::default(), Vec3::ZERO, DELTA, step as f32 * DELTA);
                for (_, agent) in master.agents() {
                    assert!(
                        (agent.velocity.length() - 5.0).abs() < 1e-3,
                        "{:?}: speed {}",
                        mode,
                        agent.velocity.length()
                    );
                }
            }
        }
    }

    #[test]
    fn test_first_agent_matches_across_modes() {
        let world = ObstacleField::default();
        let mut batched = BoidMaster::default();
        let mut scalar = BoidMaster::new(BoidMasterSettings {
            execution_mode: ExecutionMode::Scalar,
            ..Default::default()
        });
        for agent in school() {
            batched.add_agent(agent.clone());
            scalar.add_agent(agent);
        }

        batched.update(&world, Vec3::ZERO, DELTA, 0.0);
        scalar.update(&world, Vec3::ZERO, DELTA, 0.0);

        // The first agent sees only untouched neighbor state in both modes
        let a = batched.agent(AgentId(0)).unwrap();
        let b = scalar.agent(AgentId(0)).unwrap();
        assert!((a.velocity - b.velocity).length() < 1e-5);
        assert!((a.position - b.position).length() < 1e-5);
        assert_eq!(batched.stats().batched, 5);
        assert_eq!(scalar.stats().batched, 0);
    }

    #[test]
    fn test_batched_tick_steers_every_agent_from_pre_tick_state() {
        let world = ObstacleField::default();
        let mut master = BoidMaster::default();
        for agent in school() {
            master.add_agent(agent);
        }
        let before: Vec<BoidAgent> = master.agents().map(|(_, agent)| agent.clone()).collect();

        master.update(&world, Vec3::ZERO, DELTA, 0.0);

        assert_eq!(master.stats().batched, before.len());
        for (i, original) in before.iter().enumerate() {
            let neighbors = before
                .iter()
                .enumerate()
                .filter(|(j, _)| *j != i)
                .map(|(_, other)| other.member());
            let query = original.flock_query().unwrap();
            let mut expected = original.clone();
            expected.apply_steering(flock_steering(&query, neighbors));
            expected.resolve_velocity(&world, None, DELTA);
            expected.advance(DELTA, 0.0);

            let actual = master.agent(AgentId(i)).unwrap();
            assert!(
                (actual.velocity - expected.velocity).length() < 1e-5,
                "agent {}: velocity {:?}, expected {:?}",
                i,
                actual.velocity,
                expected.velocity
            );
            assert!(
                (actual.position - expected.position).length() < 1e-5,
                "agent {}: position {:?}, expected {:?}",
                i,
                actual.position,
                expected.position
            );
        }
    }

    #[test]
    fn test_other_species_ignored() {
        let world = ObstacleField::default();
        let mut master = BoidMaster::default();
        let tuna = master.add_agent(fish("Tuna", Vec3::ZERO, Vec3::Z));
        // Right on top of the tuna, swimming the other way
        master.add_agent(fish("Cod", Vec3::new(0.5, 0.0, 0.0), -Vec3::Z));

        master.update(&world, Vec3::ZERO, DELTA, 0.0);

        let agent = master.agent(tuna).unwrap();
        assert!((agent.velocity - Vec3::new(0.0, 0.0, 5.0)).length() < 1e-5);
    }

    #[test]
    fn test_far_agents_are_suspended_and_resume() {
        let world = ObstacleField::default();
        let mut master = BoidMaster::default();
        let near = master.add_agent(fish("Tuna", Vec3::ZERO, Vec3::Z));
        let far = master.add_agent(fish("Tuna", Vec3::new(0.0, 0.0, 200.0), Vec3::X));
        let lone = master.add_agent(BoidAgent::new(
            "Swordfish",
            Vec3::new(300.0, 0.0, 0.0),
            Quat::IDENTITY,
            SwimSettings::default(),
            AgentKind::Solitary,
        ));

        master.update(&world, Vec3::ZERO, DELTA, 0.0);

        let suspended = master.agent(far).unwrap();
        assert!(!suspended.is_active());
        assert_eq!(suspended.velocity, Vec3::ZERO);
        assert!(!suspended.heading_for_collision());
        assert_eq!(suspended.position, Vec3::new(0.0, 0.0, 200.0));
        assert!((suspended.previous_velocity() - Vec3::X * 5.0).length() < 1e-5);
        assert!(master.agent(lone).unwrap().is_active(), "solitary fish are never culled");
        assert!(master.agent(near).unwrap().is_active());
        assert_eq!(master.stats().culled, 1);
        assert_eq!(master.stats().batched, 1);

        // Viewpoint moves next to the far agent
        master.update(&world, Vec3::new(0.0, 0.0, 190.0), DELTA, DELTA);

        let resumed = master.agent(far).unwrap();
        assert!(resumed.is_active());
        assert!((resumed.velocity.length() - 5.0).abs() < 1e-4);
        assert!(resumed.velocity.x > 0.0, "resumes along its previous heading");
    }

    #[test]
    fn test_remove_agent_and_population() {
        let mut master = BoidMaster::default();
        for agent in school() {
            master.add_agent(agent);
        }

        let population = master.species_population();
        assert_eq!(population.get(&SpeciesId::from_name("Tuna")), Some(&4));
        assert_eq!(population.get(&SpeciesId::from_name("Cod")), Some(&1));

        let removed = master.remove_agent(AgentId(4)).unwrap();
        assert_eq!(removed.species_name(), "Cod");
        assert!(master.remove_agent(AgentId(4)).is_none());
        assert_eq!(master.agent_count(), 4);

        master.update(&ObstacleField::default(), Vec3::ZERO, DELTA, 0.0);
        assert_eq!(master.stats().simulated, 4);
    }
}
