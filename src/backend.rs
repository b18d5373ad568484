//! Physics backend abstraction.
//!
//! The locomotion core only needs three things from a physics engine: scene
//! raycasts, a capsule that can be moved with contact reporting, and a plugin
//! that schedules the engine-specific systems. This allows swapping physics
//! engines (Rapier3D, a scripted test world, etc.).

use bevy::prelude::*;

use crate::collision::{sort_by_distance, ContactPoint, QueryLayers, RayHit};

/// Read-only scene queries.
pub trait SceneQuery {
    /// Every hit along the ray, in any order.
    fn raycast_all(&self, request: &RaycastRequest) -> Vec<RayHit>;

    /// The nearest hit along the ray.
    fn raycast(&self, request: &RaycastRequest) -> Option<RayHit> {
        self.raycast_all(request)
            .into_iter()
            .min_by(|a, b| a.distance.total_cmp(&b.distance))
    }

    /// Every hit along the ray, front to back.
    fn raycast_sorted(&self, request: &RaycastRequest) -> Vec<RayHit> {
        let mut hits = self.raycast_all(request);
        sort_by_distance(&mut hits);
        hits
    }
}

/// A capsule character body owned by the physics engine.
///
/// Implementations are short-lived views built by a backend system for one
/// character and one tick.
pub trait CharacterPhysics: SceneQuery {
    /// Current world position of the capsule center.
    fn position(&self) -> Vec3;

    /// Distance from the capsule center down to the bottom of the capsule.
    fn foot_offset(&self) -> f32;

    /// Current world position of the bottom of the capsule.
    fn feet(&self) -> Vec3 {
        self.position() - Vec3::Y * self.foot_offset()
    }

    /// Current world rotation.
    fn rotation(&self) -> Quat;

    fn set_rotation(&mut self, rotation: Quat);

    /// Move the capsule by `displacement`, resolving collisions.
    ///
    /// Every contact touched during the move is pushed to `contacts`, and the
    /// grounded state reported by [`CharacterPhysics::is_grounded`] is
    /// refreshed before returning.
    fn move_character(&mut self, displacement: Vec3, contacts: &mut Vec<ContactPoint>);

    /// Whether the last move ended on walkable ground.
    fn is_grounded(&self) -> bool;

    /// Collision skin around the capsule.
    fn skin_width(&self) -> f32 {
        0.08
    }
}

/// Trait for physics backend implementations.
///
/// The backend plugin schedules systems in
/// [`LocomotionSet::Targeting`](crate::LocomotionSet::Targeting) (lock-on
/// raycasts) and [`LocomotionSet::Movement`](crate::LocomotionSet::Movement)
/// (driving [`CharacterLocomotion`](crate::locomotion::CharacterLocomotion)
/// through a [`CharacterPhysics`] view).
///
/// For an example implementation, see the `rapier` module's `Rapier3dBackend`.
pub trait CharacterPhysicsBackend: 'static + Send + Sync {
    /// Returns the plugin that sets up this backend.
    fn plugin() -> impl Plugin;
}

/// Empty plugin for backends that don't need additional setup.
pub struct NoOpBackendPlugin;

impl Plugin for NoOpBackendPlugin {
    fn build(&self, _app: &mut App) {}
}

/// Backend with no physics at all; characters and lock-on are never driven.
///
/// Cameras, input and nav agents still work, which is enough for tools and
/// headless tests.
pub struct NoPhysicsBackend;

impl CharacterPhysicsBackend for NoPhysicsBackend {
    fn plugin() -> impl Plugin {
        NoOpBackendPlugin
    }
}

/// Helper struct for building raycasts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RaycastRequest {
    /// Origin point of the ray.
    pub origin: Vec3,
    /// Direction of the ray (normalized).
    pub direction: Vec3,
    /// Maximum distance to cast.
    pub max_distance: f32,
    /// Layers the ray may hit.
    pub layers: QueryLayers,
    /// Entity to exclude from results.
    pub exclude: Option<Entity>,
}

impl RaycastRequest {
    /// Create a new raycast request.
    pub fn new(origin: Vec3, direction: Vec3, max_distance: f32) -> Self {
        Self {
            origin,
            direction: direction.normalize_or_zero(),
            max_distance,
            layers: QueryLayers::ALL,
            exclude: None,
        }
    }

    /// Straight down from `origin`.
    pub fn down(origin: Vec3, max_distance: f32) -> Self {
        Self::new(origin, Vec3::NEG_Y, max_distance)
    }

    /// Exclude an entity from the raycast.
    pub fn excluding(mut self, entity: Entity) -> Self {
        self.exclude = Some(entity);
        self
    }

    /// Restrict the raycast to the given layers.
    pub fn with_layers(mut self, layers: QueryLayers) -> Self {
        self.layers = layers;
        self
    }

    /// A zero direction or distance can never hit.
    pub fn is_degenerate(&self) -> bool {
        self.direction == Vec3::ZERO || self.max_distance.is_nan() || self.max_distance <= 0.0
    }

    /// Point at `distance` along the ray.
    pub fn point_at(&self, distance: f32) -> Vec3 {
        self.origin + self.direction * distance
    }
}
