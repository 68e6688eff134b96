use std::sync::Arc;

use bevy::math::Vec3;
use bevy_ecs::resource::Resource;
use bevy_log::{debug, warn};
use serde::{Deserialize, Serialize};

use super::BuoyantBody;
use crate::constants::DEFAULT_ACCURATE_RANGE;
use crate::error::ConfigError;
use crate::physics::RigidBody;
use crate::water::WaterSurface;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WaterId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BodyId(pub usize);

#[derive(Resource, Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuoyancySettings {
    /// Batch accurate queries for bodies near the viewpoint
    pub accurate_detection: bool,
    /// Distance from the viewpoint under which a body is batched
    pub accurate_range: f32,
    /// Oldest cached batch result, in seconds, a body still trusts
    pub max_cache_age: f32,
}

impl Default for BuoyancySettings {
    fn default() -> Self {
        Self {
            accurate_detection: true,
            accurate_range: DEFAULT_ACCURATE_RANGE,
            max_cache_age: 0.1,
        }
    }
}

/// Counters from the last [`BuoyancyCoordinator::update`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuoyancyStats {
    pub accurate_bodies: usize,
    pub batched_points: usize,
    pub batch_calls: usize,
}

/// Owns every buoyant body and the water surfaces they float on.
///
/// Each update gathers the sample points of in-range bodies into one group
/// per water surface, resolves each group with a single batched query and
/// scatters the results back in body-then-point order.
pub struct BuoyancyCoordinator<B: RigidBody> {
    pub settings: BuoyancySettings,
    enabled: bool,
    waters: Vec<Arc<dyn WaterSurface>>,
    bodies: Vec<Option<BuoyantBody<B>>>,
    /// Per-water gather buffers, reused across ticks
    groups: Vec<Vec<Vec3>>,
    /// Per-water read offsets during scatter
    cursors: Vec<usize>,
    stats: BuoyancyStats,
}

impl<B: RigidBody> BuoyancyCoordinator<B> {
    pub fn new(settings: BuoyancySettings) -> Self {
        Self {
            settings,
            enabled: true,
            waters: Vec::new(),
            bodies: Vec::new(),
            groups: Vec::new(),
            cursors: Vec::new(),
            stats: BuoyancyStats::default(),
        }
    }

    pub fn add_water(&mut self, water: Arc<dyn WaterSurface>) -> WaterId {
        self.waters.push(water);
        self.groups.push(Vec::new());
        self.cursors.push(0);
        WaterId(self.waters.len() - 1)
    }

    pub fn water(&self, id: WaterId) -> Option<&Arc<dyn WaterSurface>> {
        self.waters.get(id.0)
    }

    /// Register a body. One without a valid water reference is kept but
    /// never floats.
    pub fn add_body(&mut self, mut body: BuoyantBody<B>) -> BodyId {
        if let Err(err) = self.check_water(body.water()) {
            warn!("Buoyant body will not float: {}", err);
            body.clear_water();
        }
        self.bodies.push(Some(body));
        BodyId(self.bodies.len() - 1)
    }

    pub fn remove_body(&mut self, id: BodyId) -> Option<BuoyantBody<B>> {
        self.bodies.get_mut(id.0).and_then(Option::take)
    }

    pub fn body(&self, id: BodyId) -> Option<&BuoyantBody<B>> {
        self.bodies.get(id.0).and_then(Option::as_ref)
    }

    pub fn body_mut(&mut self, id: BodyId) -> Option<&mut BuoyantBody<B>> {
        self.bodies.get_mut(id.0).and_then(Option::as_mut)
    }

    pub fn bodies(&self) -> impl Iterator<Item = (BodyId, &BuoyantBody<B>)> {
        self.bodies
            .iter()
            .enumerate()
            .filter_map(|(i, body)| body.as_ref().map(|b| (BodyId(i), b)))
    }

    pub fn bodies_mut(&mut self) -> impl Iterator<Item = (BodyId, &mut BuoyantBody<B>)> {
        self.bodies
            .iter_mut()
            .enumerate()
            .filter_map(|(i, body)| body.as_mut().map(|b| (BodyId(i), b)))
    }

    pub fn body_count(&self) -> usize {
        self.bodies.iter().flatten().count()
    }

    /// A disabled coordinator sends every body through the approximate query.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn stats(&self) -> BuoyancyStats {
        self.stats
    }

    fn accurate_active(&self) -> bool {
        self.enabled && self.settings.accurate_detection
    }

    fn check_water(&self, water: Option<WaterId>) -> Result<WaterId, ConfigError> {
        let id = water.ok_or(ConfigError::MissingWater)?;
        if id.0 >= self.waters.len() {
            return Err(ConfigError::UnknownWater(id.0));
        }
        Ok(id)
    }

    /// Refresh accurate water points for bodies near `viewpoint`.
    /// Call once per tick before [`Self::apply_buoyancy`].
    pub fn update(&mut self, viewpoint: Vec3, time: f32) {
        self.stats = BuoyancyStats::default();

        if !self.accurate_active() {
            for body in self.bodies.iter_mut().flatten() {
                body.set_in_accurate_range(false);
            }
            return;
        }

        for group in &mut self.groups {
            group.clear();
        }

        // Gather
        let range = self.settings.accurate_range;
        for body in self.bodies.iter_mut().flatten() {
            let in_range = body.water().is_some()
                && body.body.position().distance(viewpoint) < range;
            body.set_in_accurate_range(in_range);

            if let (true, Some(water)) = (in_range, body.water()) {
                self.groups[water.0].extend(body.world_sample_points());
                self.stats.accurate_bodies += 1;
            }
        }

        // Batch
        for (water, group) in self.waters.iter().zip(&mut self.groups) {
            if group.is_empty() {
                continue;
            }
            water.query_batch(group, time);
            self.stats.batch_calls += 1;
            self.stats.batched_points += group.len();
        }

        // Scatter, in gather order
        self.cursors.iter_mut().for_each(|cursor| *cursor = 0);
        for body in self.bodies.iter_mut().flatten() {
            let Some(water) = body.water().filter(|_| body.in_accurate_range()) else {
                continue;
            };
            let start = self.cursors[water.0];
            let end = start + body.sample_points().len();
            body.store_water_points(&self.groups[water.0][start..end], time);
            self.cursors[water.0] = end;
        }

        debug!(
            "Buoyancy update: {} bodies, {} points in {} batches",
            self.stats.accurate_bodies, self.stats.batched_points, self.stats.batch_calls
        );
    }

    /// Apply lift and drag to every body with a water reference.
    pub fn apply_buoyancy(&mut self, gravity: f32, delta: f32, time: f32) {
        let max_cache_age = self
            .accurate_active()
            .then_some(self.settings.max_cache_age);

        for body in self.bodies.iter_mut().flatten() {
            let Some(water) = body.water().and_then(|id| self.waters.get(id.0)) else {
                continue;
            };
            body.apply_buoyancy(water.as_ref(), gravity, delta, time, max_cache_age);
        }
    }

    /// Step every body's physics through `step`.
    pub fn for_each_body_mut(&mut self, mut step: impl FnMut(&mut B)) {
        for body in self.bodies.iter_mut().flatten() {
            step(&mut body.body);
        }
    }
}

impl<B: RigidBody> Default for BuoyancyCoordinator<B> {
    fn default() -> Self {
        Self::new(BuoyancySettings::default())
    }
}
