//! Camera rigs driven by [`InputSnapshot`] camera axes.
//!
//! [`OrbitCamera`] circles a followed character, [`FpsCamera`] only pitches
//! while its parent character provides the yaw. Both own a
//! [`TargetAcquisition`] and bias their view toward the locked target.
//!
//! Each rig has two halves: `acquire` (scene raycasts, scheduled by the
//! physics backend) and `advance` (pure math, scheduled by the plugin).
//! `rotate` runs both for callers outside the ECS.

use bevy::prelude::*;

use crate::backend::SceneQuery;
use crate::error::{ensure_non_negative, ensure_positive, ConfigError};
use crate::intent::InputSnapshot;
use crate::targeting::{CameraView, Candidate, LockOnChange, TargetAcquisition};

const LOOK_AT_COS_EPSILON: f32 = 1e-4;

/// How the orbit camera reacts to the horizontal camera axis.
#[derive(Reflect, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RotationType {
    /// Stays behind the followed character; only pitch is free. Allows
    /// lock-on.
    #[default]
    RotateOnYAxis,
    /// Free orbit on both axes. Never locks on.
    RotateOnXYAxis,
}

impl TryFrom<u8> for RotationType {
    type Error = ConfigError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(RotationType::RotateOnYAxis),
            1 => Ok(RotationType::RotateOnXYAxis),
            other => Err(ConfigError::UnknownRotationType(other)),
        }
    }
}

/// Fade the followed character out when the camera gets close to it.
#[derive(Reflect, Debug, Clone, Copy, PartialEq)]
pub struct FadeConfig {
    /// At or below this camera distance the character is invisible.
    pub transparent_distance: f32,
    /// At or beyond this camera distance the character is opaque.
    pub opaque_distance: f32,
}

impl Default for FadeConfig {
    fn default() -> Self {
        Self {
            transparent_distance: 2.0,
            opaque_distance: 4.6,
        }
    }
}

impl FadeConfig {
    /// Alpha for a camera `distance` away from the look-at point.
    pub fn alpha(&self, distance: f32) -> f32 {
        let span = self.opaque_distance - self.transparent_distance;
        if span.abs() <= f32::EPSILON {
            return if distance >= self.opaque_distance { 1.0 } else { 0.0 };
        }
        ((distance - self.transparent_distance) / span).clamp(0.0, 1.0)
    }
}

/// Where the followed character is this frame.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct OrbitFrame {
    pub follow_position: Vec3,
    /// Heading of the followed character in degrees, positive to the right.
    pub follow_heading: f32,
}

impl OrbitFrame {
    pub fn new(follow_position: Vec3, follow_heading: f32) -> Self {
        Self {
            follow_position,
            follow_heading,
        }
    }
}

/// Free-look orbit camera.
///
/// `x_axis` is the orbit angle in degrees, counter-clockwise seen from above.
/// `y_axis` in `[0, 1]` blends the pitch between `bottom_pitch` and
/// `top_pitch`.
#[derive(Component, Reflect, Debug, Clone, PartialEq)]
#[reflect(Component)]
pub struct OrbitCamera {
    /// Character the camera circles.
    pub follow: Entity,
    pub rotation_type: RotationType,
    pub x_axis: f32,
    pub y_axis: f32,
    /// Degrees per second per unit of camera x input.
    pub x_speed: f32,
    /// Y axis units per second per unit of camera y input.
    pub y_speed: f32,
    /// Fraction of the remaining look-at distance covered per second.
    pub look_at_speed: f32,
    /// Default look-at point relative to the followed character.
    pub look_at_offset: Vec3,
    pub distance: f32,
    /// Pitch in degrees at `y_axis = 0`.
    pub bottom_pitch: f32,
    /// Pitch in degrees at `y_axis = 1`.
    pub top_pitch: f32,
    pub fade: Option<FadeConfig>,
    pub frozen: bool,
    pub acquisition: TargetAcquisition,
    look_at: Option<Vec3>,
    position: Option<Vec3>,
    fade_alpha: f32,
}

impl OrbitCamera {
    pub fn new(follow: Entity) -> Self {
        Self {
            follow,
            rotation_type: RotationType::RotateOnYAxis,
            x_axis: 0.0,
            y_axis: 0.5,
            x_speed: 180.0,
            y_speed: 1.0,
            look_at_speed: 0.3,
            look_at_offset: Vec3::new(0.0, 1.5, 0.0),
            distance: 5.0,
            bottom_pitch: -10.0,
            top_pitch: 60.0,
            fade: None,
            frozen: false,
            acquisition: TargetAcquisition::orbit().ignoring(follow),
            look_at: None,
            position: None,
            fade_alpha: 1.0,
        }
    }

    /// Builder: select the rotation type.
    pub fn with_rotation_type(mut self, rotation_type: RotationType) -> Self {
        self.rotation_type = rotation_type;
        self
    }

    /// Builder: initial axis values.
    pub fn with_axes(mut self, x_axis: f32, y_axis: f32) -> Self {
        self.x_axis = x_axis;
        self.y_axis = y_axis.clamp(0.0, 1.0);
        self
    }

    /// Builder: enable distance fading.
    pub fn with_fade(mut self, fade: FadeConfig) -> Self {
        self.fade = Some(fade);
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        ensure_positive("distance", self.distance)?;
        ensure_non_negative("x_speed", self.x_speed)?;
        ensure_non_negative("y_speed", self.y_speed)?;
        ensure_non_negative("look_at_speed", self.look_at_speed)?;
        ensure_non_negative("max_lock_on_distance", self.acquisition.max_distance)
    }

    /// Lock-on is only possible around the Y axis and while not frozen.
    pub fn permits_lock_on(&self) -> bool {
        !self.frozen && self.rotation_type == RotationType::RotateOnYAxis
    }

    pub fn locked(&self) -> Option<Entity> {
        self.acquisition.locked()
    }

    pub fn freeze(&mut self, frozen: bool) {
        self.frozen = frozen;
    }

    pub fn release_lock(&mut self) -> LockOnChange {
        self.acquisition.release()
    }

    /// Current look-at point, if the camera has been advanced once.
    pub fn look_at(&self) -> Option<Vec3> {
        self.look_at
    }

    /// Alpha of the followed character, 1 when fading is off.
    pub fn fade_alpha(&self) -> f32 {
        self.fade_alpha
    }

    /// Look-at point when nothing is locked.
    pub fn default_look_at(&self, frame: &OrbitFrame) -> Vec3 {
        frame.follow_position + self.look_at_offset
    }

    /// Candidates must lie deeper than the default look-at point.
    pub fn reference_depth(&self, view: &CameraView, frame: &OrbitFrame) -> f32 {
        (self.default_look_at(frame) - view.position).length()
    }

    /// Heading the camera is placed along, in degrees.
    pub fn orbit_heading(&self, frame: &OrbitFrame) -> f32 {
        match self.rotation_type {
            RotationType::RotateOnYAxis => frame.follow_heading - self.x_axis,
            RotationType::RotateOnXYAxis => -self.x_axis,
        }
    }

    pub fn pitch(&self) -> f32 {
        self.bottom_pitch + (self.top_pitch - self.bottom_pitch) * self.y_axis
    }

    /// Orbit position for the current axes.
    pub fn camera_position(&self, frame: &OrbitFrame) -> Vec3 {
        let heading = self.orbit_heading(frame).to_radians();
        let pitch = self.pitch().to_radians();
        let offset = Vec3::new(
            -heading.sin() * pitch.cos(),
            pitch.sin(),
            heading.cos() * pitch.cos(),
        ) * self.distance;
        self.default_look_at(frame) + offset
    }

    /// Camera transform looking at the current look-at point.
    pub fn camera_transform(&self, frame: &OrbitFrame) -> Transform {
        let position = self.camera_position(frame);
        let target = self.look_at.unwrap_or_else(|| self.default_look_at(frame));
        let transform = Transform::from_translation(position);
        if (target - position).length_squared() <= f32::EPSILON {
            return transform;
        }
        transform.looking_at(target, Vec3::Y)
    }

    /// Update the lock from `candidates`.
    ///
    /// `None` means lock-on is not requested. Frozen cameras keep their lock.
    pub fn acquire<S: SceneQuery + ?Sized>(
        &mut self,
        candidates: Option<&[Candidate]>,
        view: &CameraView,
        frame: &OrbitFrame,
        scene: &S,
    ) -> LockOnChange {
        if self.frozen {
            return LockOnChange::Unchanged;
        }
        match candidates {
            Some(candidates) if self.permits_lock_on() => {
                let depth = self.reference_depth(view, frame);
                self.acquisition.acquire(candidates, view, depth, scene)
            }
            _ => self.acquisition.release(),
        }
    }

    /// Ease the look-at point, apply the camera axes and refresh the fade.
    ///
    /// `lock_target` is the position of the locked entity, if any.
    pub fn advance(
        &mut self,
        input: &InputSnapshot,
        lock_target: Option<Vec3>,
        frame: &OrbitFrame,
        dt: f32,
    ) {
        if self.frozen || !dt.is_finite() || dt <= 0.0 {
            return;
        }

        let camera = self
            .position
            .unwrap_or_else(|| self.camera_position(frame));
        let default = self.default_look_at(frame);
        let goal = match lock_target {
            Some(target) if self.rotation_type == RotationType::RotateOnYAxis => {
                locked_look_at(camera, target, default)
            }
            _ => default,
        };
        let current = self.look_at.unwrap_or(default);
        let t = (self.look_at_speed * dt).clamp(0.0, 1.0);
        self.look_at = Some(if current == goal {
            goal
        } else {
            current.lerp(goal, t)
        });

        if self.rotation_type == RotationType::RotateOnXYAxis {
            self.x_axis += -input.camera_x * self.x_speed * dt;
        }
        self.y_axis = (self.y_axis - input.camera_y * self.y_speed * dt).clamp(0.0, 1.0);

        let placed = self.camera_position(frame);
        self.position = Some(placed);
        if let (Some(fade), Some(look_at)) = (self.fade, self.look_at) {
            self.fade_alpha = fade.alpha((look_at - placed).length());
        }
    }

    /// Acquire and advance in one call.
    pub fn rotate<S: SceneQuery + ?Sized>(
        &mut self,
        input: &InputSnapshot,
        candidates: Option<&[Candidate]>,
        view: &CameraView,
        frame: &OrbitFrame,
        scene: &S,
        dt: f32,
    ) -> LockOnChange {
        let change = self.acquire(candidates, view, frame, scene);
        let target = lock_position(self.locked(), candidates);
        self.advance(input, target, frame, dt);
        change
    }
}

/// Point on the camera-to-target ray at the default look-at depth.
fn locked_look_at(camera: Vec3, target: Vec3, default: Vec3) -> Vec3 {
    let to_target = target - camera;
    let to_default = default - camera;
    let Some(direction) = to_target.try_normalize() else {
        return default;
    };
    if to_default == Vec3::ZERO {
        return default;
    }
    let cos = to_target.angle_between(to_default).cos();
    if cos <= LOOK_AT_COS_EPSILON {
        return default;
    }
    camera + direction * (to_default.length() / cos)
}

fn lock_position(locked: Option<Entity>, candidates: Option<&[Candidate]>) -> Option<Vec3> {
    let locked = locked?;
    candidates?
        .iter()
        .find(|c| c.entity == locked)
        .map(|c| c.position)
}

/// First person pitch camera. Mount it as a child of the character.
#[derive(Component, Reflect, Debug, Clone, PartialEq)]
#[reflect(Component)]
pub struct FpsCamera {
    /// Degrees per second per unit of camera y input.
    pub rotation_speed: f32,
    /// Degrees per second while tracking a locked target.
    pub lock_on_speed: f32,
    pub min_pitch: Option<f32>,
    pub max_pitch: Option<f32>,
    pub frozen: bool,
    pub acquisition: TargetAcquisition,
    /// Degrees, positive up.
    pitch: f32,
    last_delta: f32,
}

impl Default for FpsCamera {
    fn default() -> Self {
        Self {
            rotation_speed: 115.0,
            lock_on_speed: 400.0,
            min_pitch: None,
            max_pitch: None,
            frozen: false,
            acquisition: TargetAcquisition::fps(),
            pitch: 0.0,
            last_delta: 0.0,
        }
    }
}

impl FpsCamera {
    /// Builder: clamp pitch to `[min, max]` degrees.
    pub fn with_pitch_limits(mut self, min: f32, max: f32) -> Self {
        self.min_pitch = Some(min.min(max));
        self.max_pitch = Some(min.max(max));
        self.pitch = self.limit(self.pitch);
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        ensure_non_negative("rotation_speed", self.rotation_speed)?;
        ensure_non_negative("lock_on_speed", self.lock_on_speed)?;
        ensure_non_negative("max_lock_on_distance", self.acquisition.max_distance)
    }

    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    /// Pitch change of the last advance, in degrees.
    pub fn last_delta(&self) -> f32 {
        self.last_delta
    }

    pub fn locked(&self) -> Option<Entity> {
        self.acquisition.locked()
    }

    pub fn permits_lock_on(&self) -> bool {
        !self.frozen
    }

    pub fn freeze(&mut self, frozen: bool) {
        self.frozen = frozen;
    }

    /// Rotation relative to the parent character.
    pub fn local_rotation(&self) -> Quat {
        Quat::from_rotation_x(self.pitch.to_radians())
    }

    /// Update the lock. Any target in front of the camera qualifies.
    pub fn acquire<S: SceneQuery + ?Sized>(
        &mut self,
        candidates: Option<&[Candidate]>,
        view: &CameraView,
        scene: &S,
    ) -> LockOnChange {
        if self.frozen {
            return LockOnChange::Unchanged;
        }
        match candidates {
            Some(candidates) => self.acquisition.acquire(candidates, view, 0.0, scene),
            None => self.acquisition.release(),
        }
    }

    /// Pitch toward the lock target or by input. Returns the signed change.
    pub fn advance(
        &mut self,
        input: &InputSnapshot,
        lock_target: Option<Vec3>,
        eye: Vec3,
        dt: f32,
    ) -> f32 {
        if self.frozen || !dt.is_finite() || dt <= 0.0 {
            self.last_delta = 0.0;
            return 0.0;
        }

        let previous = self.pitch;
        let next = match lock_target.map(|target| target - eye) {
            Some(direction) if direction != Vec3::ZERO => {
                let flat = Vec2::new(direction.x, direction.z).length();
                let wanted = direction.y.atan2(flat).to_degrees();
                move_towards(previous, wanted, self.lock_on_speed * dt)
            }
            Some(_) => previous,
            None => previous + input.camera_y * self.rotation_speed * dt,
        };
        self.pitch = self.limit(next);
        self.last_delta = self.pitch - previous;
        self.last_delta
    }

    /// Acquire and advance in one call.
    pub fn rotate<S: SceneQuery + ?Sized>(
        &mut self,
        input: &InputSnapshot,
        candidates: Option<&[Candidate]>,
        view: &CameraView,
        scene: &S,
        dt: f32,
    ) -> f32 {
        self.acquire(candidates, view, scene);
        let target = lock_position(self.locked(), candidates);
        self.advance(input, target, view.position, dt)
    }

    fn limit(&self, pitch: f32) -> f32 {
        let pitch = self.min_pitch.map_or(pitch, |min| pitch.max(min));
        self.max_pitch.map_or(pitch, |max| pitch.min(max))
    }
}

fn move_towards(current: f32, target: f32, max_delta: f32) -> f32 {
    let delta = target - current;
    if delta.abs() <= max_delta {
        target
    } else {
        current + delta.signum() * max_delta
    }
}
