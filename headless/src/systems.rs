use bevy::math::Vec3;
use bevy::prelude::*;
use bevy_log::{debug, info};
use serde::{Deserialize, Serialize};
use sim::boids::{BoidMaster, ObstacleField};
use sim::buoyancy::BuoyancyCoordinator;
use sim::physics::PhysicsBody;
use sim::sets::SimUpdateSet;
use sim::GRAVITY;

use crate::scenario::{OrbitConfig, ScenarioConfig};

/// Fixed-step simulation clock, independent of wall time.
#[derive(Resource, Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct SimClock {
    pub tick: u64,
    pub delta: f32,
    pub time: f32,
}

impl SimClock {
    pub fn new(ticks_per_second: u64) -> Self {
        Self {
            tick: 0,
            delta: 1.0 / ticks_per_second.max(1) as f32,
            time: 0.0,
        }
    }
}

/// Reference point for accuracy switching and agent culling.
#[derive(Resource, Debug, Clone, Copy)]
pub struct Viewpoint {
    pub orbit: OrbitConfig,
    pub position: Vec3,
}

impl Viewpoint {
    pub fn new(orbit: OrbitConfig) -> Self {
        Self {
            orbit,
            position: orbit.position_at(0.0),
        }
    }
}

#[derive(Resource, Default)]
pub struct Floaters(pub BuoyancyCoordinator<PhysicsBody>);

#[derive(Resource, Debug, Default)]
pub struct Flock {
    pub master: BoidMaster,
    pub world: ObstacleField,
}

/// Stop the app after this many ticks. `None` runs forever.
#[derive(Resource, Debug, Clone, Copy, Default)]
pub struct TickLimit(pub Option<u64>);

pub fn register_systems(app: &mut App) {
    app.configure_sets(
        Update,
        (
            SimUpdateSet::Clock,
            SimUpdateSet::Sampling,
            SimUpdateSet::Forces,
            SimUpdateSet::Integrate,
            SimUpdateSet::Agents,
            SimUpdateSet::Report,
        )
            .chain(),
    );

    app.add_systems(
        Update,
        (advance_clock_system, follow_orbit_system)
            .chain()
            .in_set(SimUpdateSet::Clock),
    );
    app.add_systems(Update, sample_water_system.in_set(SimUpdateSet::Sampling));
    app.add_systems(Update, apply_buoyancy_system.in_set(SimUpdateSet::Forces));
    app.add_systems(
        Update,
        integrate_floaters_system.in_set(SimUpdateSet::Integrate),
    );
    app.add_systems(Update, update_flock_system.in_set(SimUpdateSet::Agents));
    app.add_systems(
        Update,
        (report_stats_system, tick_limit_system).in_set(SimUpdateSet::Report),
    );
}

pub fn advance_clock_system(mut clock: ResMut<SimClock>) {
    clock.tick += 1;
    clock.time = clock.tick as f32 * clock.delta;
}

pub fn follow_orbit_system(clock: Res<SimClock>, mut viewpoint: ResMut<Viewpoint>) {
    viewpoint.position = viewpoint.orbit.position_at(clock.time);
}

pub fn sample_water_system(
    clock: Res<SimClock>,
    viewpoint: Res<Viewpoint>,
    mut floaters: ResMut<Floaters>,
) {
    floaters.0.update(viewpoint.position, clock.time);
}

pub fn apply_buoyancy_system(clock: Res<SimClock>, mut floaters: ResMut<Floaters>) {
    floaters.0.apply_buoyancy(GRAVITY.y, clock.delta, clock.time);
}

pub fn integrate_floaters_system(clock: Res<SimClock>, mut floaters: ResMut<Floaters>) {
    let delta = clock.delta;
    floaters
        .0
        .for_each_body_mut(|body| body.integrate(GRAVITY, delta));
}

pub fn update_flock_system(
    clock: Res<SimClock>,
    viewpoint: Res<Viewpoint>,
    mut flock: ResMut<Flock>,
) {
    let flock = flock.as_mut();
    flock
        .master
        .update(&flock.world, viewpoint.position, clock.delta, clock.time);
}

pub fn report_stats_system(
    clock: Res<SimClock>,
    scenario: Res<ScenarioConfig>,
    viewpoint: Res<Viewpoint>,
    floaters: Res<Floaters>,
    flock: Res<Flock>,
) {
    if scenario.report_interval == 0 || clock.tick % scenario.report_interval != 0 {
        return;
    }

    let buoyancy = floaters.0.stats();
    let agents = flock.master.stats();
    info!(
        "Tick {} ({:.1}s), viewpoint at {:.1?}: {} floaters ({} accurate, {} points in {} batches), {} fish ({} simulated, {} culled, {} batched)",
        clock.tick,
        clock.time,
        viewpoint.position,
        floaters.0.body_count(),
        buoyancy.accurate_bodies,
        buoyancy.batched_points,
        buoyancy.batch_calls,
        flock.master.agent_count(),
        agents.simulated,
        agents.culled,
        agents.batched,
    );

    for (id, body) in floaters.0.bodies() {
        debug!("Floater {:?} at {:.2?}", id, body.body.position);
    }
}

pub fn tick_limit_system(
    clock: Res<SimClock>,
    limit: Res<TickLimit>,
    mut ev_app_exit: EventWriter<AppExit>,
) {
    if let Some(limit) = limit.0 {
        if clock.tick >= limit {
            info!("Reached tick limit {}, stopping", limit);
            ev_app_exit.write(AppExit::Success);
        }
    }
}
