//! Input snapshot and player control components.
//!
//! [`InputSnapshot`] is the per-tick intent a character or camera consumes.
//! Players get it from devices through [`PlayerControls`]; AI writes it
//! directly.

use bevy::prelude::*;

use crate::config::MovementMode;

/// One tick of directional and button intent.
///
/// # Example
///
/// ```rust
/// use action_locomotion::prelude::*;
///
/// let mut input = InputSnapshot::default();
/// input.set_move(1.0, 1.0);
/// assert!(input.is_moving());
/// // Diagonal input is capped to unit length.
/// assert!((input.movement().length() - 1.0).abs() < 1e-6);
///
/// input.clear();
/// assert_eq!(input, InputSnapshot::NEUTRAL);
/// ```
#[derive(Component, Reflect, Debug, Clone, Copy, Default, PartialEq)]
#[reflect(Component)]
pub struct InputSnapshot {
    /// Sideways movement (-1.0 = left, 1.0 = right).
    pub horizontal: f32,
    /// Forward movement (-1.0 = backward, 1.0 = forward).
    pub vertical: f32,
    /// Run button held.
    pub running: bool,
    /// Jump button went down this tick.
    pub jump: bool,
    /// Camera yaw axis.
    pub camera_x: f32,
    /// Camera pitch axis.
    pub camera_y: f32,
    /// Lock-on button held.
    pub lock_on: bool,
}

impl InputSnapshot {
    /// No input at all. Delivered when controls are disabled.
    pub const NEUTRAL: Self = Self {
        horizontal: 0.0,
        vertical: 0.0,
        running: false,
        jump: false,
        camera_x: 0.0,
        camera_y: 0.0,
        lock_on: false,
    };

    /// Set both movement axes, each clamped to [-1, 1].
    pub fn set_move(&mut self, horizontal: f32, vertical: f32) {
        self.horizontal = horizontal.clamp(-1.0, 1.0);
        self.vertical = vertical.clamp(-1.0, 1.0);
    }

    /// Set both camera axes.
    pub fn set_camera(&mut self, x: f32, y: f32) {
        self.camera_x = x;
        self.camera_y = y;
    }

    /// Movement input with its length capped to 1.
    pub fn movement(&self) -> Vec2 {
        Vec2::new(self.horizontal, self.vertical).clamp_length_max(1.0)
    }

    pub fn is_moving(&self) -> bool {
        self.horizontal != 0.0 || self.vertical != 0.0
    }

    pub fn clear(&mut self) {
        *self = Self::NEUTRAL;
    }

    /// This snapshot with the movement axes rotated into the camera's view.
    ///
    /// "Forward" becomes the camera's facing projected on the ground, and the
    /// input magnitude is kept. Movement is dropped when the camera looks
    /// straight up or down.
    pub fn view_relative(mut self, camera_rotation: Quat) -> Self {
        let raw = Vec3::new(self.horizontal, 0.0, -self.vertical);
        let magnitude = Vec2::new(self.horizontal, self.vertical).length();
        if magnitude == 0.0 {
            return self;
        }
        let turned = camera_rotation * raw;
        let flat = Vec3::new(turned.x, 0.0, turned.z).normalize_or_zero() * magnitude;
        self.horizontal = flat.x;
        self.vertical = -flat.z;
        self
    }
}

/// Device family read by [`gather_player_input`](crate::systems::gather_player_input).
#[derive(Reflect, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum InputProfile {
    /// WASD, shift to run, space to jump, mouse to look, right mouse to lock on.
    #[default]
    Keyboard,
    /// Left stick, left shoulder to run, south button to jump, right stick to
    /// look, right thumb to lock on.
    Gamepad,
}

/// Player control settings for a character.
///
/// `camera` must point at an entity carrying an
/// [`OrbitCamera`](crate::camera::OrbitCamera) or
/// [`FpsCamera`](crate::camera::FpsCamera). When it does not, the problem is
/// logged once and the character only receives neutral input.
#[derive(Component, Reflect, Debug, Clone, PartialEq)]
#[reflect(Component)]
pub struct PlayerControls {
    pub enabled: bool,
    pub profile: InputProfile,
    pub movement_mode: MovementMode,
    pub camera: Entity,
    /// Scale applied to mouse motion before it becomes a camera axis.
    pub mouse_sensitivity: f32,
    /// Set when the camera entity is unusable.
    #[reflect(ignore)]
    pub(crate) degraded: bool,
}

impl PlayerControls {
    /// Keyboard controls moving toward the input, relative to `camera`.
    pub fn new(camera: Entity) -> Self {
        Self {
            enabled: true,
            profile: InputProfile::Keyboard,
            movement_mode: MovementMode::MoveToward,
            camera,
            mouse_sensitivity: 0.1,
            degraded: false,
        }
    }

    /// Builder: select the input profile.
    pub fn with_profile(mut self, profile: InputProfile) -> Self {
        self.profile = profile;
        self
    }

    /// Builder: select the movement mode.
    pub fn with_movement_mode(mut self, mode: MovementMode) -> Self {
        self.movement_mode = mode;
        self
    }

    /// Whether device input reaches the character.
    pub fn is_active(&self) -> bool {
        self.enabled && !self.degraded
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded
    }
}
