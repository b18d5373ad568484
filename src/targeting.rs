//! Lock-on target acquisition.
//!
//! A camera looks for the candidate closest to the center of its view that it
//! can actually see, within range. Once a candidate is locked it stays locked
//! for as long as it keeps passing the filters, even when another candidate
//! drifts closer to the center.
//!
//! # Filters
//!
//! For every candidate, in order:
//!
//! 1. It projects inside the viewport and deeper than the reference depth.
//! 2. The first valid hit of a ray from the camera toward it is the candidate
//!    itself. A hit is valid when it lies deeper than the reference depth and
//!    does not belong to an ignored entity.
//! 3. That hit lies within `max_distance`.
//!
//! Candidates passing every filter are scored by
//! `|(x - 0.5, y - 0.5, depth)|` in viewport space; the lowest score wins.

use bevy::prelude::*;

use crate::backend::{RaycastRequest, SceneQuery};
use crate::collision::{QueryLayers, RayHit};

/// Below this the camera is considered to be in the candidate's plane.
const MIN_VIEW_DEPTH: f32 = 1e-4;

/// Length of the sight ray cast toward each candidate.
const SIGHT_RANGE: f32 = 1_000.0;

/// Marker for entities a camera may lock on to.
#[derive(Component, Reflect, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[reflect(Component)]
pub struct LockOnCandidate;

/// A lockable entity and where it is this frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    pub entity: Entity,
    pub position: Vec3,
}

impl Candidate {
    pub fn new(entity: Entity, position: Vec3) -> Self {
        Self { entity, position }
    }
}

/// Perspective parameters of a camera entity.
///
/// Only what viewport projection needs; rendering is somebody else's job.
#[derive(Component, Reflect, Debug, Clone, Copy, PartialEq)]
#[reflect(Component)]
pub struct ViewFrustum {
    /// Vertical field of view in radians.
    pub fov_y: f32,
    /// Width over height.
    pub aspect: f32,
}

impl Default for ViewFrustum {
    fn default() -> Self {
        Self {
            fov_y: 60f32.to_radians(),
            aspect: 16.0 / 9.0,
        }
    }
}

/// A camera pose plus its frustum, used to project world points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraView {
    pub position: Vec3,
    pub rotation: Quat,
    pub frustum: ViewFrustum,
}

impl CameraView {
    pub fn new(position: Vec3, rotation: Quat, frustum: ViewFrustum) -> Self {
        Self {
            position,
            rotation,
            frustum,
        }
    }

    /// View of a camera entity.
    pub fn from_transform(transform: &GlobalTransform, frustum: ViewFrustum) -> Self {
        let (_, rotation, position) = transform.to_scale_rotation_translation();
        Self::new(position, rotation, frustum)
    }

    /// Distance of `point` in front of the camera, along its forward axis.
    pub fn depth(&self, point: Vec3) -> f32 {
        let forward = self.rotation * Vec3::NEG_Z;
        (point - self.position).dot(forward)
    }

    /// Viewport coordinates of `point`.
    ///
    /// `x` and `y` are `0` at the bottom-left and `1` at the top-right of the
    /// view; `z` is the depth. Points at or behind the camera plane have no
    /// viewport position.
    pub fn world_to_viewport(&self, point: Vec3) -> Option<Vec3> {
        let local = self.rotation.inverse() * (point - self.position);
        let depth = -local.z;
        if depth <= MIN_VIEW_DEPTH {
            return None;
        }
        let half_height = (self.frustum.fov_y * 0.5).tan() * depth;
        let half_width = half_height * self.frustum.aspect;
        if half_height <= 0.0 || half_width <= 0.0 {
            return None;
        }
        Some(Vec3::new(
            0.5 + local.x / (2.0 * half_width),
            0.5 + local.y / (2.0 * half_height),
            depth,
        ))
    }
}

/// Outcome of an acquisition pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockOnChange {
    Unchanged,
    Changed {
        previous: Option<Entity>,
        current: Option<Entity>,
    },
}

impl LockOnChange {
    pub fn is_changed(&self) -> bool {
        matches!(self, LockOnChange::Changed { .. })
    }
}

/// Lock-on state and filters of one camera.
#[derive(Reflect, Debug, Clone, PartialEq)]
pub struct TargetAcquisition {
    /// Farthest distance, measured along the sight ray, a new lock may start.
    pub max_distance: f32,
    /// Layers the sight ray may hit.
    pub layers: QueryLayers,
    /// Entities the sight ray passes through, such as the followed character.
    pub ignored: Vec<Entity>,
    locked: Option<Entity>,
}

impl Default for TargetAcquisition {
    fn default() -> Self {
        Self::orbit()
    }
}

impl TargetAcquisition {
    /// Range used by third person cameras.
    pub fn orbit() -> Self {
        Self::with_max_distance(5.0)
    }

    /// Range used by first person cameras.
    pub fn fps() -> Self {
        Self::with_max_distance(1.0)
    }

    pub fn with_max_distance(max_distance: f32) -> Self {
        Self {
            max_distance,
            layers: QueryLayers::ALL,
            ignored: Vec::new(),
            locked: None,
        }
    }

    /// Builder: restrict the sight ray to `layers`.
    pub fn with_layers(mut self, layers: QueryLayers) -> Self {
        self.layers = layers;
        self
    }

    /// Builder: let the sight ray pass through `entity`.
    pub fn ignoring(mut self, entity: Entity) -> Self {
        self.ignored.push(entity);
        self
    }

    pub fn locked(&self) -> Option<Entity> {
        self.locked
    }

    /// Pick the best candidate and lock on to it.
    ///
    /// With no qualifying candidate the lock is released.
    pub fn acquire<S: SceneQuery + ?Sized>(
        &mut self,
        candidates: &[Candidate],
        view: &CameraView,
        reference_depth: f32,
        scene: &S,
    ) -> LockOnChange {
        let mut best: Option<(Entity, f32)> = None;

        for candidate in candidates {
            let Some(viewport) = view.world_to_viewport(candidate.position) else {
                continue;
            };
            if !in_unit_rect(viewport) || viewport.z <= reference_depth {
                continue;
            }

            let Some(hit) = self.first_valid_hit(view, candidate.position, reference_depth, scene)
            else {
                continue;
            };
            if hit.entity != candidate.entity || hit.distance > self.max_distance {
                continue;
            }

            if Some(candidate.entity) == self.locked {
                return LockOnChange::Unchanged;
            }

            let score = Vec3::new(viewport.x - 0.5, viewport.y - 0.5, viewport.z).length();
            if best.is_none_or(|(_, best_score)| score < best_score) {
                best = Some((candidate.entity, score));
            }
        }

        self.set_locked(best.map(|(entity, _)| entity))
    }

    /// Drop the current lock.
    pub fn release(&mut self) -> LockOnChange {
        self.set_locked(None)
    }

    fn set_locked(&mut self, target: Option<Entity>) -> LockOnChange {
        if target == self.locked {
            return LockOnChange::Unchanged;
        }
        let previous = self.locked;
        self.locked = target;
        LockOnChange::Changed {
            previous,
            current: target,
        }
    }

    /// Nearest hit toward `target` that is past the reference depth and not
    /// ignored.
    fn first_valid_hit<S: SceneQuery + ?Sized>(
        &self,
        view: &CameraView,
        target: Vec3,
        reference_depth: f32,
        scene: &S,
    ) -> Option<RayHit> {
        let request = RaycastRequest::new(view.position, target - view.position, SIGHT_RANGE)
            .with_layers(self.layers);
        if request.is_degenerate() {
            return None;
        }
        scene
            .raycast_sorted(&request)
            .into_iter()
            .find(|hit| view.depth(hit.point) > reference_depth && !self.ignored.contains(&hit.entity))
    }
}

fn in_unit_rect(viewport: Vec3) -> bool {
    (0.0..=1.0).contains(&viewport.x) && (0.0..=1.0).contains(&viewport.y)
}
