//! Collision data exchanged with the physics backend.
//!
//! Contacts come out of a capsule move, ray hits come out of scene queries.
//! Both are plain values so the locomotion core never touches engine types.

use bevy::prelude::*;

/// A contact produced while moving the character capsule.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContactPoint {
    /// World position of the contact.
    pub point: Vec3,
    /// Surface normal at the contact (points away from the surface).
    pub normal: Vec3,
    /// Entity that was touched, if the backend knows it.
    pub entity: Option<Entity>,
}

impl ContactPoint {
    pub fn new(point: Vec3, normal: Vec3) -> Self {
        Self {
            point,
            normal,
            entity: None,
        }
    }

    /// Attach the touched entity.
    pub fn with_entity(mut self, entity: Entity) -> Self {
        self.entity = Some(entity);
        self
    }
}

/// Information about a ray hit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    /// Distance along the ray.
    pub distance: f32,
    /// World position of the hit point.
    pub point: Vec3,
    /// Surface normal at the hit point.
    pub normal: Vec3,
    /// Entity that was hit.
    pub entity: Entity,
}

impl RayHit {
    pub fn new(distance: f32, point: Vec3, normal: Vec3, entity: Entity) -> Self {
        Self {
            distance,
            point,
            normal,
            entity,
        }
    }
}

/// Layer mask used to filter scene queries.
///
/// Backends map the bits onto their own collision groups.
#[derive(Reflect, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QueryLayers(pub u32);

impl QueryLayers {
    pub const ALL: Self = Self(u32::MAX);
    pub const NONE: Self = Self(0);

    /// Whether any bit of `other` is part of this mask.
    pub fn intersects(self, other: QueryLayers) -> bool {
        self.0 & other.0 != 0
    }
}

impl Default for QueryLayers {
    fn default() -> Self {
        Self::ALL
    }
}

/// Sort hits front to back.
pub fn sort_by_distance(hits: &mut [RayHit]) {
    hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
}
