//! Velocity bookkeeping for the locomotion pipeline.
//!
//! A character carries three velocities:
//! - `local`: character relative (x right, y up, z forward), used while grounded
//! - `global`: world space, carried through the air
//! - `slide`: world space, accumulated on over-limit slopes
//!
//! Horizontal motion lives in exactly one of `local`/`global` depending on the
//! grounded state; both are only non-zero on the tick that crosses between
//! ground and air, and [`VelocityState::reconcile`] folds them back together.

use bevy::prelude::*;

use crate::config::{LocomotionConfig, ModifierConfig};

/// Below this difference a velocity is considered to have reached its target.
pub const VELOCITY_EPSILON: f32 = 1e-5;

/// Sign where zero counts as positive.
#[inline]
pub(crate) fn sign(value: f32) -> f32 {
    if value >= 0.0 {
        1.0
    } else {
        -1.0
    }
}

/// Heading of a rotation in degrees, clockwise from world forward (-Z) when
/// seen from above.
pub fn heading_degrees(rotation: Quat) -> f32 {
    let forward = rotation * Vec3::NEG_Z;
    forward.x.atan2(-forward.z).to_degrees()
}

/// Shortest signed difference between two angles in degrees, in (-180, 180].
pub fn delta_angle(from: f32, to: f32) -> f32 {
    let delta = (to - from).rem_euclid(360.0);
    if delta > 180.0 {
        delta - 360.0
    } else {
        delta
    }
}

/// Signed yaw change between two rotations in degrees, positive turning right.
pub fn signed_yaw_delta(from: Quat, to: Quat) -> f32 {
    delta_angle(heading_degrees(from), heading_degrees(to))
}

/// Upright rotation with the given heading.
pub fn yaw_rotation(heading: f32) -> Quat {
    Quat::from_rotation_y(-heading.to_radians())
}

/// Upright rotation facing `direction` projected on the ground plane.
///
/// Returns `None` for directions without a horizontal component.
pub fn flat_look_rotation(direction: Vec3) -> Option<Quat> {
    let flat = Vec3::new(direction.x, 0.0, direction.z);
    if flat.length_squared() <= VELOCITY_EPSILON * VELOCITY_EPSILON {
        return None;
    }
    Some(yaw_rotation(flat.x.atan2(-flat.z).to_degrees()))
}

/// World direction of planar input, x right and y forward in world space.
pub fn planar_to_world(input: Vec2) -> Vec3 {
    Vec3::new(input.x, 0.0, -input.y)
}

/// Character-relative frame derived from a world rotation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalFrame {
    rotation: Quat,
}

impl LocalFrame {
    pub fn new(rotation: Quat) -> Self {
        Self { rotation }
    }

    #[inline]
    pub fn rotation(&self) -> Quat {
        self.rotation
    }

    /// Local (x right, y up, z forward) to world space.
    #[inline]
    pub fn to_world(&self, local: Vec3) -> Vec3 {
        self.rotation * Vec3::new(local.x, local.y, -local.z)
    }

    /// World space to local (x right, y up, z forward).
    #[inline]
    pub fn to_local(&self, world: Vec3) -> Vec3 {
        let v = self.rotation.inverse() * world;
        Vec3::new(v.x, v.y, -v.z)
    }
}

/// Modifiers in effect for one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MovementModifiers {
    pub backward: f32,
    pub side_step: f32,
    pub airborne: f32,
    pub running: f32,
}

impl MovementModifiers {
    pub const NEUTRAL: Self = Self {
        backward: 1.0,
        side_step: 1.0,
        airborne: 1.0,
        running: 1.0,
    };

    /// Select the modifiers that apply to this tick's input and state.
    pub fn compute(input: Vec2, grounded: bool, running: bool, config: &ModifierConfig) -> Self {
        Self {
            backward: if sign(input.y) < 0.0 { config.backward } else { 1.0 },
            side_step: if input.x != 0.0 { config.side_step } else { 1.0 },
            airborne: if grounded { 1.0 } else { config.airborne },
            running: if running { config.running } else { 1.0 },
        }
    }
}

/// Inputs to one horizontal axis integration step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisStep {
    /// Input on this axis, in [-1, 1].
    pub input: f32,
    /// Speed the axis tends toward.
    pub target: f32,
    /// Acceleration with modifiers applied, before the input magnitude.
    pub acceleration: f32,
    /// Deceleration with modifiers applied.
    pub deceleration: f32,
    /// Whether input may accelerate the axis this tick.
    pub control: bool,
    pub grounded: bool,
}

/// Whether stepping from `previous` to `next` jumped over `target`.
#[inline]
pub fn crosses_target(previous: f32, next: f32, target: f32) -> bool {
    (previous < target && next > target) || (previous > target && next < target)
}

/// Integrate one horizontal axis toward its target speed.
///
/// Accelerating steps that cross the target, or land within
/// [`VELOCITY_EPSILON`] of it, snap exactly onto it. Decelerating steps that
/// change sign snap to zero.
pub fn integrate_axis(velocity: f32, step: &AxisStep, dt: f32) -> f32 {
    if step.input != 0.0 && velocity != step.target && step.control {
        let next = velocity
            + step.input.abs() * step.acceleration * sign(step.target - velocity) * dt;
        if crosses_target(velocity, next, step.target)
            || (next - step.target).abs() <= VELOCITY_EPSILON
        {
            step.target
        } else {
            next
        }
    } else if step.input == 0.0 && step.grounded && velocity != 0.0 {
        let next = velocity - step.deceleration * sign(velocity) * dt;
        if sign(velocity) * next < 0.0 {
            0.0
        } else {
            next
        }
    } else {
        velocity
    }
}

/// Airborne speed caps in the character frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AirborneLimits {
    pub max_side: f32,
    pub max_forward: f32,
    pub backward_modifier: f32,
    pub max_falling: f32,
}

impl AirborneLimits {
    pub fn from_config(config: &LocomotionConfig, global_modifier: f32) -> Self {
        Self {
            max_side: config.max_airborne_side_speed() * global_modifier,
            max_forward: config.max_airborne_forward_speed() * global_modifier,
            backward_modifier: config.modifiers.backward,
            max_falling: config.max_falling_speed,
        }
    }

    /// Clamp a character-relative velocity component-wise.
    pub fn clamp_local(&self, mut local: Vec3) -> Vec3 {
        let max_forward = if sign(local.z) < 0.0 {
            self.max_forward * self.backward_modifier
        } else {
            self.max_forward
        };
        if local.x.abs() > self.max_side {
            local.x = sign(local.x) * self.max_side;
        }
        if local.y < -self.max_falling {
            local.y = -self.max_falling;
        }
        if local.z.abs() > max_forward {
            local.z = sign(local.z) * max_forward;
        }
        local
    }
}

/// The three velocities owned by a locomotion engine.
#[derive(Reflect, Debug, Clone, Copy, Default, PartialEq)]
pub struct VelocityState {
    pub local: Vec3,
    pub global: Vec3,
    pub slide: Vec3,
}

impl VelocityState {
    /// Velocity for this tick's move, in world space.
    ///
    /// While airborne the local velocity is folded into the global one, which
    /// is then clamped. While sliding, the horizontal components of the
    /// voluntary velocity that oppose the slide are dropped.
    pub fn compose(&mut self, frame: LocalFrame, grounded: bool, limits: &AirborneLimits) -> Vec3 {
        let mut converted = frame.to_world(self.local);

        if !grounded {
            self.global += converted;
            self.local = Vec3::ZERO;
            converted = Vec3::ZERO;

            let clamped = limits.clamp_local(frame.to_local(self.global));
            self.global = frame.to_world(clamped);
        }

        if self.slide != Vec3::ZERO {
            if self.slide.x != 0.0 && sign(converted.x) != sign(self.slide.x) {
                converted.x = 0.0;
            }
            if self.slide.z != 0.0 && sign(converted.z) != sign(self.slide.z) {
                converted.z = 0.0;
            }
            self.local = frame.to_local(converted);
        }

        self.global + converted + self.slide
    }

    /// Merge the slide gathered from this tick's contacts.
    ///
    /// A zero contribution ends the slide; if the character is in the air at
    /// that point the slide carries over into the global velocity.
    pub fn absorb_slide(&mut self, contribution: Vec3, grounded: bool, max_speed: f32) {
        if contribution != Vec3::ZERO {
            self.slide += contribution;
            if self.slide.length() > max_speed {
                self.slide = self.slide.normalize_or_zero() * max_speed;
            }
        } else {
            if self.slide != Vec3::ZERO && !grounded {
                self.global += self.slide;
            }
            self.slide = Vec3::ZERO;
        }
    }

    /// Move horizontal motion into the vector that matches the grounded state.
    ///
    /// Calling this again without a state change leaves both vectors as they
    /// are.
    pub fn reconcile(&mut self, grounded: bool, frame: LocalFrame) {
        if grounded && self.global != Vec3::ZERO {
            self.local += frame.to_local(self.global);
            self.global = Vec3::ZERO;
        } else if !grounded && self.local != Vec3::ZERO {
            self.global += frame.to_world(self.local);
            self.local = Vec3::ZERO;
        }
    }

    /// All three velocities expressed in the character frame.
    pub fn total_local(&self, frame: LocalFrame) -> Vec3 {
        self.local + frame.to_local(self.global) + frame.to_local(self.slide)
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
