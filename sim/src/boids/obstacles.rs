//! Spatial queries agents run against their surroundings.

use bevy::math::{bounding::Aabb3d, Vec3};
use serde::{Deserialize, Serialize};

/// Nearest obstruction along a cast.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    /// Contact point on the obstacle surface
    pub point: Vec3,
    /// Distance travelled along the cast direction
    pub distance: f32,
}

/// Ray and sphere casts against static geometry.
///
/// Casts starting inside a shape do not report that shape. `direction`
/// must be normalized.
pub trait CollisionWorld: Sync {
    fn cast_ray(&self, origin: Vec3, direction: Vec3, max_distance: f32) -> Option<RayHit>;

    fn cast_sphere(
        &self,
        origin: Vec3,
        radius: f32,
        direction: Vec3,
        max_distance: f32,
    ) -> Option<RayHit>;
}

/// Static obstacle description.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Obstacle {
    Sphere { center: Vec3, radius: f32 },
    Box { center: Vec3, half_size: Vec3 },
}

#[derive(Debug, Clone, Copy)]
enum Shape {
    Sphere { center: Vec3, radius: f32 },
    Box(Aabb3d),
}

/// A flat list of static spheres and boxes.
#[derive(Debug, Clone, Default)]
pub struct ObstacleField {
    shapes: Vec<Shape>,
}

impl ObstacleField {
    pub fn new(obstacles: impl IntoIterator<Item = Obstacle>) -> Self {
        let mut field = Self::default();
        for obstacle in obstacles {
            field.add(obstacle);
        }
        field
    }

    pub fn add(&mut self, obstacle: Obstacle) {
        let shape = match obstacle {
            Obstacle::Sphere { center, radius } => Shape::Sphere {
                center,
                radius: radius.abs(),
            },
            Obstacle::Box { center, half_size } => {
                Shape::Box(Aabb3d::new(center, half_size.abs()))
            }
        };
        self.shapes.push(shape);
    }

    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    fn nearest(&self, mut hit_of: impl FnMut(&Shape) -> Option<RayHit>) -> Option<RayHit> {
        self.shapes
            .iter()
            .filter_map(|shape| hit_of(shape))
            .min_by(|a, b| a.distance.total_cmp(&b.distance))
    }
}

impl CollisionWorld for ObstacleField {
    fn cast_ray(&self, origin: Vec3, direction: Vec3, max_distance: f32) -> Option<RayHit> {
        self.nearest(|shape| match *shape {
            Shape::Sphere { center, radius } => {
                let t = ray_sphere(origin, direction, center, radius, max_distance)?;
                Some(RayHit {
                    point: origin + direction * t,
                    distance: t,
                })
            }
            Shape::Box(aabb) => {
                let (min, max) = (Vec3::from(aabb.min), Vec3::from(aabb.max));
                let t = ray_box(origin, direction, min, max, max_distance)?;
                Some(RayHit {
                    point: origin + direction * t,
                    distance: t,
                })
            }
        })
    }

    fn cast_sphere(
        &self,
        origin: Vec3,
        radius: f32,
        direction: Vec3,
        max_distance: f32,
    ) -> Option<RayHit> {
        // Sweep a point against each shape grown by the cast radius, with
        // rounded edges and corners, then report the contact on the original
        // shape.
        self.nearest(|shape| match *shape {
            Shape::Sphere {
                center,
                radius: shape_radius,
            } => {
                let grown = shape_radius + radius;
                let t = ray_sphere(origin, direction, center, grown, max_distance)?;
                let swept = origin + direction * t;
                Some(RayHit {
                    point: center + (swept - center).normalize_or_zero() * shape_radius,
                    distance: t,
                })
            }
            Shape::Box(aabb) => {
                let (min, max) = (Vec3::from(aabb.min), Vec3::from(aabb.max));
                let t = sweep_sphere_box(origin, direction, radius, min, max, max_distance)?;
                let swept = origin + direction * t;
                Some(RayHit {
                    point: swept.clamp(min, max),
                    distance: t,
                })
            }
        })
    }
}

/// Axis-aligned box an agent is confined to.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundsVolume {
    pub center: Vec3,
    pub half_size: Vec3,
}

impl BoundsVolume {
    pub fn new(center: Vec3, size: Vec3) -> Self {
        Self {
            center,
            half_size: size.abs() / 2.0,
        }
    }

    pub fn contains(&self, point: Vec3) -> bool {
        let offset = (point - self.center).abs();
        offset.cmple(self.half_size).all()
    }

    /// Hit on the box surface for a ray starting outside it.
    pub fn raycast(&self, origin: Vec3, direction: Vec3, max_distance: f32) -> Option<RayHit> {
        let t = ray_box(
            origin,
            direction,
            self.center - self.half_size,
            self.center + self.half_size,
            max_distance,
        )?;
        Some(RayHit {
            point: origin + direction * t,
            distance: t,
        })
    }
}

/// Entry distance of a ray into a sphere. None when the ray starts inside.
fn ray_sphere(
    origin: Vec3,
    direction: Vec3,
    center: Vec3,
    radius: f32,
    max_distance: f32,
) -> Option<f32> {
    let to_origin = origin - center;
    let c = to_origin.length_squared() - radius * radius;
    if c <= 0.0 {
        return None;
    }
    let b = to_origin.dot(direction);
    if b > 0.0 {
        return None;
    }
    let discriminant = b * b - c;
    if discriminant < 0.0 {
        return None;
    }
    let t = -b - discriminant.sqrt();
    (t <= max_distance).then_some(t)
}

/// Entry distance of a ray into a box using the slab method. None when the
/// ray starts inside.
fn ray_box(
    origin: Vec3,
    direction: Vec3,
    min: Vec3,
    max: Vec3,
    max_distance: f32,
) -> Option<f32> {
    let (t_enter, _) = slab_interval(origin, direction, min, max)?;
    (t_enter >= 0.0 && t_enter <= max_distance).then_some(t_enter)
}

/// Iterations of each line search in [`sweep_sphere_box`].
const SWEEP_ITERATIONS: usize = 48;
/// Gap under which a swept sphere counts as touching a box face.
const SWEEP_CONTACT_EPSILON: f32 = 1e-4;

/// First distance along the ray at which a sphere of `radius` touches the
/// box. None when the sphere already overlaps the box at `origin`.
fn sweep_sphere_box(
    origin: Vec3,
    direction: Vec3,
    radius: f32,
    min: Vec3,
    max: Vec3,
    max_distance: f32,
) -> Option<f32> {
    let gap = |t: f32| {
        let center = origin + direction * t;
        center.distance(center.clamp(min, max)) - radius
    };
    if gap(0.0) <= 0.0 {
        return None;
    }

    let grow = Vec3::splat(radius);
    let (t_enter, t_exit) = slab_interval(origin, direction, min - grow, max + grow)?;
    let (start, end) = (t_enter.max(0.0), t_exit.min(max_distance));
    if start > end {
        return None;
    }

    // Entered through a face of the grown box
    if gap(start) <= SWEEP_CONTACT_EPSILON {
        return Some(start);
    }

    // Otherwise the ray crosses an edge or corner region. The gap is convex
    // along the ray, so find its minimum, then the first root before it.
    let (mut lo, mut hi) = (start, end);
    for _ in 0..SWEEP_ITERATIONS {
        let third = (hi - lo) / 3.0;
        if gap(lo + third) < gap(hi - third) {
            hi -= third;
        } else {
            lo += third;
        }
    }
    let closest = (lo + hi) / 2.0;
    if gap(closest) > 0.0 {
        return None;
    }

    let (mut outside, mut touching) = (start, closest);
    for _ in 0..SWEEP_ITERATIONS {
        let mid = (outside + touching) / 2.0;
        if gap(mid) > 0.0 {
            outside = mid;
        } else {
            touching = mid;
        }
    }
    Some(touching)
}

/// Parameter range over which a line lies inside a box.
fn slab_interval(origin: Vec3, direction: Vec3, min: Vec3, max: Vec3) -> Option<(f32, f32)> {
    let mut t_enter = f32::NEG_INFINITY;
    let mut t_exit = f32::INFINITY;

    for axis in 0..3 {
        let (o, d) = (origin[axis], direction[axis]);
        let (lo, hi) = (min[axis], max[axis]);

        if d.abs() < f32::EPSILON {
            if o < lo || o > hi {
                return None;
            }
            continue;
        }

        let (mut t0, mut t1) = ((lo - o) / d, (hi - o) / d);
        if t0 > t1 {
            std::mem::swap(&mut t0, &mut t1);
        }
        t_enter = t_enter.max(t0);
        t_exit = t_exit.min(t1);
        if t_enter > t_exit {
            return None;
        }
    }

    Some((t_enter, t_exit))
}
