//! Multi-tick runs of the whole core without any app framework.

use std::sync::Arc;

use bevy::math::{Quat, Vec3};
use rand::rngs::StdRng;
use rand::SeedableRng;
use sim::boids::{
    AgentKind, BoidAgent, BoidMaster, BoidMasterSettings, ExecutionMode, FishTemplate,
    FlockingSettings, Obstacle, ObstacleField, SchoolSpawner, SwimSettings,
};
use sim::buoyancy::{BuoyancyCoordinator, BuoyancyProfile, BuoyancySettings, BuoyantBody};
use sim::physics::PhysicsBody;
use sim::water::{WaterBody, WaterSurface, WavePreset};
use sim::{GRAVITY, TICKS_PER_SECOND};

const DELTA: f32 = 1.0 / TICKS_PER_SECOND as f32;

fn raft(position: Vec3) -> BuoyantBody<PhysicsBody> {
    BuoyantBody::new(
        PhysicsBody::new(position, 4.0),
        vec![
            Vec3::new(1.0, 0.0, 1.0),
            Vec3::new(-1.0, 0.0, 1.0),
            Vec3::new(1.0, 0.0, -1.0),
            Vec3::new(-1.0, 0.0, -1.0),
        ],
        BuoyancyProfile::default(),
    )
}

fn step_floaters(coordinator: &mut BuoyancyCoordinator<PhysicsBody>, viewpoint: Vec3, tick: u32) {
    let time = tick as f32 * DELTA;
    coordinator.update(viewpoint, time);
    coordinator.apply_buoyancy(GRAVITY.y, DELTA, time);
    coordinator.for_each_body_mut(|body| body.integrate(GRAVITY, DELTA));
}

#[test]
fn test_near_and_far_rafts_both_float() {
    let mut coordinator = BuoyancyCoordinator::new(BuoyancySettings::default());
    let water = coordinator.add_water(Arc::new(WaterBody::new(WavePreset::Still.to_params(0.0))));
    let near = coordinator.add_body(raft(Vec3::new(0.0, 2.0, 0.0)).with_water(water));
    let far = coordinator.add_body(raft(Vec3::new(500.0, 2.0, 0.0)).with_water(water));

    for tick in 0..1500 {
        step_floaters(&mut coordinator, Vec3::ZERO, tick);
    }

    let stats = coordinator.stats();
    assert_eq!(stats.accurate_bodies, 1);
    assert_eq!(stats.batch_calls, 1);
    assert_eq!(stats.batched_points, 4);

    assert!(coordinator.body(near).unwrap().in_accurate_range());
    assert!(!coordinator.body(far).unwrap().in_accurate_range());

    // Four submerged samples each lifting 3g at full submersion: 4 * 3 * ratio == 1
    for id in [near, far] {
        let y = coordinator.body(id).unwrap().body.position.y;
        assert!((y + 1.0 / 12.0).abs() < 0.05, "raft should float near -1/12, got {}", y);
    }
}

#[test]
fn test_body_without_water_sinks() {
    let mut coordinator = BuoyancyCoordinator::new(BuoyancySettings::default());
    coordinator.add_water(Arc::new(WaterBody::new(WavePreset::Still.to_params(0.0))));
    let stone = coordinator.add_body(raft(Vec3::ZERO));

    for tick in 0..50 {
        step_floaters(&mut coordinator, Vec3::ZERO, tick);
    }

    assert!(coordinator.body(stone).unwrap().body.position.y < -4.0);
}

#[test]
fn test_raft_tracks_waves() {
    let water = Arc::new(WaterBody::new(WavePreset::Calm.to_params(0.0)));
    let mut coordinator = BuoyancyCoordinator::new(BuoyancySettings::default());
    let id = coordinator.add_water(water.clone());
    let body = coordinator.add_body(raft(Vec3::new(3.0, 0.0, -2.0)).with_water(id));

    for tick in 0..1000 {
        step_floaters(&mut coordinator, Vec3::ZERO, tick);
    }

    let position = coordinator.body(body).unwrap().body.position;
    let surface = water.accurate_point(position, 1000.0 * DELTA).y;
    assert!(position.is_finite());
    assert!(
        (position.y - surface).abs() < 1.5,
        "raft at {} drifted from surface at {}",
        position.y,
        surface
    );
}

fn reef() -> ObstacleField {
    ObstacleField::new([
        Obstacle::Sphere {
            center: Vec3::new(0.0, 0.0, 25.0),
            radius: 5.0,
        },
        Obstacle::Box {
            center: Vec3::new(15.0, -5.0, 0.0),
            half_size: Vec3::new(3.0, 6.0, 3.0),
        },
    ])
}

fn school(mode: ExecutionMode) -> BoidMaster {
    let mut master = BoidMaster::new(BoidMasterSettings {
        execution_mode: mode,
        ..Default::default()
    });
    let spawner = SchoolSpawner {
        radius: 10.0,
        count: 60,
        bounds_size: Some(SchoolSpawner::DEFAULT_BOUNDS_SIZE * 2.0),
        templates: vec![
            FishTemplate {
                species: "Sardine".into(),
                ..Default::default()
            },
            FishTemplate {
                species: "Snapper".into(),
                kind: AgentKind::Flocking(FlockingSettings {
                    min_group: 2,
                    ..Default::default()
                }),
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
    for agent in spawner.spawn(&mut StdRng::seed_from_u64(2024)) {
        master.add_agent(agent);
    }
    master
}

#[test]
fn test_school_stays_well_formed() {
    let world = reef();
    for mode in [ExecutionMode::Batched, ExecutionMode::Scalar] {
        let mut master = school(mode);

        for tick in 0..300 {
            master.update(&world, Vec3::ZERO, DELTA, tick as f32 * DELTA);
        }

        assert_eq!(master.agent_count(), 60);
        for (_, agent) in master.agents() {
            assert!(agent.position.is_finite(), "{:?}: non-finite position", mode);
            assert!(
                (agent.velocity.length() - agent.settings().max_velocity).abs() < 1e-3,
                "{:?}: speed {}",
                mode,
                agent.velocity.length()
            );
        }
    }
}

#[test]
fn test_culled_school_freezes_until_viewpoint_returns() {
    let world = ObstacleField::default();
    let mut master = BoidMaster::default();
    let settings = SwimSettings::default();
    for i in 0..10 {
        master.add_agent(BoidAgent::new(
            "Herring",
            Vec3::new(i as f32 * 1.5, 0.0, 0.0),
            Quat::IDENTITY,
            settings,
            AgentKind::Flocking(FlockingSettings::default()),
        ));
    }

    let far_away = Vec3::new(1000.0, 0.0, 0.0);
    let before: Vec<Vec3> = master.agents().map(|(_, a)| a.position).collect();
    for tick in 0..20 {
        master.update(&world, far_away, DELTA, tick as f32 * DELTA);
    }
    let after: Vec<Vec3> = master.agents().map(|(_, a)| a.position).collect();

    assert_eq!(before, after);
    assert_eq!(master.stats().culled, 10);

    master.update(&world, Vec3::ZERO, DELTA, 20.0 * DELTA);
    assert_eq!(master.stats().culled, 0);
    assert_eq!(master.stats().batched, 10);
    for (_, agent) in master.agents() {
        assert!((agent.velocity.length() - settings.max_velocity).abs() < 1e-3);
    }
}

#[test]
fn test_settings_parse_from_partial_ron() {
    let buoyancy: BuoyancySettings = ron::de::from_str("(accurate_range: 40.0)").unwrap();
    assert_eq!(buoyancy.accurate_range, 40.0);
    assert!(buoyancy.accurate_detection);

    let master: BoidMasterSettings = ron::de::from_str("(execution_mode: Scalar)").unwrap();
    assert_eq!(master.execution_mode, ExecutionMode::Scalar);
    assert_eq!(master.disable_distance, 150.0);

    let swim: SwimSettings =
        ron::de::from_str("(max_velocity: 8.0, quality: High, style: Bobbing(speed: 1.0, height: 2.0, face_direction: true))")
            .unwrap();
    assert_eq!(swim.max_velocity, 8.0);
    assert_eq!(swim.detection_radius, 15.0);
}
