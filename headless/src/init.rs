use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use bevy::prelude::*;
use bevy_app::ScheduleRunnerPlugin;
use bevy_log::{error, info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use sim::boids::{BoidMaster, ExecutionMode, ObstacleField};
use sim::buoyancy::{BuoyancyCoordinator, BuoyantBody};
use sim::physics::PhysicsBody;
use sim::water::WaterBody;

use crate::scenario::{load_scenario, ScenarioConfig};
use crate::systems::{self, Flock, Floaters, SimClock, TickLimit, Viewpoint};

/// Command line overrides applied on top of a scenario.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunOptions {
    pub ticks: Option<u64>,
    pub ticks_per_second: u64,
    pub seed: u64,
    pub execution_mode: Option<ExecutionMode>,
    pub accurate_detection: Option<bool>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            ticks: None,
            ticks_per_second: sim::TICKS_PER_SECOND,
            seed: 0,
            execution_mode: None,
            accurate_detection: None,
        }
    }
}

pub fn build_floaters(scenario: &ScenarioConfig, options: &RunOptions) -> Floaters {
    let mut settings = scenario.buoyancy;
    if let Some(accurate_detection) = options.accurate_detection {
        settings.accurate_detection = accurate_detection;
    }

    let mut coordinator = BuoyancyCoordinator::new(settings);
    let water = coordinator.add_water(Arc::new(WaterBody::new(scenario.water.params())));

    for floater in &scenario.floaters {
        let body = BuoyantBody::new(
            PhysicsBody::new(floater.position, floater.mass),
            floater.sample_points.clone(),
            floater.profile,
        );
        if floater.attached {
            coordinator.add_body(body.with_water(water));
        } else {
            coordinator.add_body(body);
        }
    }

    Floaters(coordinator)
}

pub fn build_flock(scenario: &ScenarioConfig, options: &RunOptions) -> Flock {
    let mut settings = scenario.master;
    if let Some(execution_mode) = options.execution_mode {
        settings.execution_mode = execution_mode;
    }

    let mut master = BoidMaster::new(settings);
    let mut rng = StdRng::seed_from_u64(options.seed);
    for school in &scenario.schools {
        for agent in school.spawn(&mut rng) {
            master.add_agent(agent);
        }
    }

    if master.agent_count() == 0 {
        warn!("Scenario {} has no fish", scenario.name);
    }

    Flock {
        master,
        world: ObstacleField::new(scenario.obstacles.iter().copied()),
    }
}

/// Inserts every simulation resource and system, without any plugin.
pub fn setup_simulation(app: &mut App, scenario: ScenarioConfig, options: RunOptions) {
    let floaters = build_floaters(&scenario, &options);
    let flock = build_flock(&scenario, &options);

    info!(
        "Scenario {}: {} floaters, {} fish in {} schools, {} obstacles",
        scenario.name,
        floaters.0.body_count(),
        flock.master.agent_count(),
        scenario.schools.len(),
        flock.world.len()
    );

    app.insert_resource(SimClock::new(options.ticks_per_second));
    app.insert_resource(Viewpoint::new(scenario.viewpoint));
    app.insert_resource(TickLimit(options.ticks));
    app.insert_resource(floaters);
    app.insert_resource(flock);
    app.insert_resource(scenario);

    systems::register_systems(app);
}

pub fn init(scenario_path: &Path, options: RunOptions) {
    let mut app = App::new();
    app.add_plugins(
        MinimalPlugins.set(ScheduleRunnerPlugin::run_loop(Duration::from_secs_f64(
            1.0 / options.ticks_per_second.max(1) as f64,
        ))),
    );
    app.add_plugins(bevy_log::LogPlugin::default());

    info!(
        "Starting simulation at {} ticks per second",
        options.ticks_per_second
    );

    let scenario = match load_scenario(scenario_path) {
        Ok(scenario) => scenario,
        Err(err) => {
            error!(
                "Failed to load scenario {} : {}",
                scenario_path.display(),
                err
            );
            return;
        }
    };

    setup_simulation(&mut app, scenario, options);

    app.run();
}
