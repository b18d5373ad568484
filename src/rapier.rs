//! Rapier3D physics backend implementation.
//!
//! This module provides the physics backend for Bevy Rapier3D.
//! Enable with the `rapier3d` feature.

use bevy::prelude::*;
use bevy_rapier3d::geometry::Group;
use bevy_rapier3d::prelude::*;

use crate::backend::{CharacterPhysics, CharacterPhysicsBackend, RaycastRequest, SceneQuery};
use crate::collision::{ContactPoint, RayHit};
use crate::locomotion::CharacterLocomotion;
use crate::systems::LockOnParams;
use crate::LocomotionSet;

/// Collision skin kept between the capsule and the scene.
pub const SKIN_WIDTH: f32 = 0.08;

/// Rapier3D physics backend for locomotion.
///
/// Characters are kinematic capsules moved with Rapier's shape mover. Scene
/// raycasts (lock-on sight lines, edge probes) use the query pipeline of the
/// default Rapier context.
pub struct Rapier3dBackend;

impl CharacterPhysicsBackend for Rapier3dBackend {
    fn plugin() -> impl Plugin {
        Rapier3dBackendPlugin
    }
}

/// Plugin that sets up Rapier3D-specific systems for locomotion.
pub struct Rapier3dBackendPlugin;

impl Plugin for Rapier3dBackendPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(
            Update,
            rapier_acquire_lock_on.in_set(LocomotionSet::Targeting),
        );
        app.add_systems(
            Update,
            rapier_drive_locomotion.in_set(LocomotionSet::Movement),
        );
    }
}

/// Scene queries against a Rapier context.
pub struct RapierScene<'c, 'w> {
    context: &'c RapierContext<'w>,
}

impl<'c, 'w> RapierScene<'c, 'w> {
    pub fn new(context: &'c RapierContext<'w>) -> Self {
        Self { context }
    }
}

impl SceneQuery for RapierScene<'_, '_> {
    fn raycast_all(&self, request: &RaycastRequest) -> Vec<RayHit> {
        rapier_raycast_all(self.context, request, None)
    }
}

/// Collect every hit along a ray.
///
/// `request.layers` selects which collision groups the ray may hit; an
/// explicit `groups` filter (the character's own) takes precedence.
fn rapier_raycast_all(
    context: &RapierContext,
    request: &RaycastRequest,
    groups: Option<CollisionGroups>,
) -> Vec<RayHit> {
    if request.is_degenerate() {
        return Vec::new();
    }

    let mut filter = QueryFilter::default().exclude_sensors().groups(groups.unwrap_or(
        CollisionGroups::new(Group::ALL, Group::from_bits_truncate(request.layers.0)),
    ));
    if let Some(entity) = request.exclude {
        filter = filter.exclude_rigid_body(entity).exclude_collider(entity);
    }

    let mut hits = Vec::new();
    context.intersections_with_ray(
        request.origin,
        request.direction,
        request.max_distance,
        true,
        filter,
        |entity, intersection| {
            hits.push(RayHit::new(
                intersection.time_of_impact,
                intersection.point,
                intersection.normal,
                entity,
            ));
            true
        },
    );
    hits
}

/// Point of `collider` touching a surface with the given normal.
///
/// Capsules touch with the hemisphere facing the surface, or with their
/// side when the normal is horizontal.
pub fn contact_point(collider: &Collider, center: Vec3, normal: Vec3) -> Vec3 {
    if let Some(capsule) = collider.as_capsule() {
        let segment = capsule.segment();
        let half_height = (segment.a().y - segment.b().y).abs() / 2.0;
        let end = if normal.y.abs() < 1e-3 {
            0.0
        } else {
            -normal.y.signum()
        };
        center + Vec3::Y * (end * half_height) - normal * capsule.radius()
    } else if let Some(ball) = collider.as_ball() {
        center - normal * ball.radius()
    } else if let Some(cuboid) = collider.as_cuboid() {
        let reach = cuboid.half_extents().dot(normal.abs());
        center - normal * reach
    } else {
        center
    }
}

/// Height of the collider's center above its lowest point.
pub fn foot_offset(collider: &Collider) -> f32 {
    -contact_point(collider, Vec3::ZERO, Vec3::Y).y
}

/// A character capsule for one tick, backed by Rapier.
///
/// Position and rotation are read from the entity's transform and written
/// back by [`rapier_drive_locomotion`] after the tick.
pub struct RapierCharacterBody<'c, 'w> {
    context: &'c RapierContext<'w>,
    entity: Entity,
    collider: &'c Collider,
    groups: Option<CollisionGroups>,
    position: Vec3,
    rotation: Quat,
    max_slope_climb_angle: f32,
    grounded: bool,
}

impl<'c, 'w> RapierCharacterBody<'c, 'w> {
    /// `grounded` seeds [`CharacterPhysics::is_grounded`] until the first
    /// move of the tick.
    pub fn new(
        context: &'c RapierContext<'w>,
        entity: Entity,
        collider: &'c Collider,
        transform: &Transform,
        grounded: bool,
    ) -> Self {
        Self {
            context,
            entity,
            collider,
            groups: None,
            position: transform.translation,
            rotation: transform.rotation,
            max_slope_climb_angle: 45f32.to_radians(),
            grounded,
        }
    }

    /// Inherit the character's collision groups for moves and rays.
    pub fn with_groups(mut self, groups: Option<CollisionGroups>) -> Self {
        self.groups = groups;
        self
    }

    /// Steepest slope the mover may climb, in degrees.
    pub fn with_slope_limit(mut self, degrees: f32) -> Self {
        self.max_slope_climb_angle = degrees.to_radians();
        self
    }

    fn filter(&self) -> QueryFilter<'static> {
        let filter = QueryFilter::default()
            .exclude_rigid_body(self.entity)
            .exclude_collider(self.entity)
            .exclude_sensors();
        match self.groups {
            Some(groups) => filter.groups(groups),
            None => filter,
        }
    }
}

impl SceneQuery for RapierCharacterBody<'_, '_> {
    fn raycast_all(&self, request: &RaycastRequest) -> Vec<RayHit> {
        let request = match request.exclude {
            Some(_) => *request,
            None => request.excluding(self.entity),
        };
        rapier_raycast_all(self.context, &request, self.groups)
    }
}

impl CharacterPhysics for RapierCharacterBody<'_, '_> {
    fn position(&self) -> Vec3 {
        self.position
    }

    fn foot_offset(&self) -> f32 {
        foot_offset(self.collider)
    }

    fn rotation(&self) -> Quat {
        self.rotation
    }

    fn set_rotation(&mut self, rotation: Quat) {
        self.rotation = rotation;
    }

    fn move_character(&mut self, displacement: Vec3, contacts: &mut Vec<ContactPoint>) {
        let options = MoveShapeOptions {
            up: Vec3::Y,
            offset: CharacterLength::Absolute(SKIN_WIDTH),
            slide: true,
            autostep: None,
            max_slope_climb_angle: self.max_slope_climb_angle,
            min_slope_slide_angle: self.max_slope_climb_angle,
            apply_impulse_to_dynamic_bodies: false,
            snap_to_ground: None,
            ..default()
        };

        let collider = self.collider;
        let output = self.context.move_shape(
            displacement,
            collider,
            self.position,
            self.rotation,
            1.0,
            &options,
            self.filter(),
            |collision: CharacterCollision| {
                let normal = collision
                    .hit
                    .details
                    .map(|details| details.normal2)
                    .unwrap_or(-displacement.normalize_or_zero());
                let at = contact_point(collider, collision.character_translation, normal);
                contacts.push(ContactPoint::new(at, normal).with_entity(collision.entity));
            },
        );

        self.position += output.effective_translation;
        self.grounded = output.grounded;
    }

    fn is_grounded(&self) -> bool {
        self.grounded
    }

    fn skin_width(&self) -> f32 {
        SKIN_WIDTH
    }
}

/// Run lock-on acquisition against the Rapier scene.
fn rapier_acquire_lock_on(rapier_context: ReadRapierContext, mut lock_on: LockOnParams) {
    let Ok(context) = rapier_context.single() else {
        return;
    };
    lock_on.run(&RapierScene::new(&context));
}

/// Tick every character through its Rapier capsule.
fn rapier_drive_locomotion(
    time: Res<Time>,
    rapier_context: ReadRapierContext,
    mut q_characters: Query<(
        Entity,
        &mut CharacterLocomotion,
        &mut Transform,
        &Collider,
        Option<&CollisionGroups>,
    )>,
    q_targets: Query<&GlobalTransform>,
) {
    let Ok(context) = rapier_context.single() else {
        return;
    };
    let dt = time.delta_secs();

    for (entity, mut character, mut transform, collider, groups) in &mut q_characters {
        let lock_target = character
            .lock_target
            .and_then(|target| q_targets.get(target).ok())
            .map(GlobalTransform::translation);

        let mut body = RapierCharacterBody::new(
            &context,
            entity,
            collider,
            &transform,
            character.engine.is_grounded(),
        )
        .with_groups(groups.copied())
        .with_slope_limit(character.engine.config().slide.slope_limit);

        character.drive(&mut body, lock_target, dt);

        if transform.translation != body.position {
            transform.translation = body.position;
        }
        if transform.rotation != body.rotation {
            transform.rotation = body.rotation;
        }
    }
}

/// Physics components for a locomotion character using Rapier3D.
///
/// Characters are kinematic: the shape mover decides where they go and
/// Rapier only syncs the body to the transform.
///
/// # Example
///
/// ```ignore
/// commands.spawn((
///     Transform::from_xyz(0.0, 1.0, 0.0),
///     LocomotionConfig::player(),
///     RapierCharacterBundle::capsule(0.5, 0.5),
/// ));
/// ```
#[derive(Bundle)]
pub struct RapierCharacterBundle {
    pub rigid_body: RigidBody,
    pub collider: Collider,
    pub locked_axes: LockedAxes,
}

impl RapierCharacterBundle {
    /// Upright capsule with `half_height` between the hemisphere centers.
    pub fn capsule(half_height: f32, radius: f32) -> Self {
        Self {
            rigid_body: RigidBody::KinematicPositionBased,
            collider: Collider::capsule_y(half_height, radius),
            locked_axes: LockedAxes::ROTATION_LOCKED_X | LockedAxes::ROTATION_LOCKED_Z,
        }
    }
}

impl Default for RapierCharacterBundle {
    /// A two unit tall capsule.
    fn default() -> Self {
        Self::capsule(0.5, 0.5)
    }
}
