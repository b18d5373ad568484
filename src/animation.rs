//! Animation parameter export.
//!
//! Characters and nav agents publish named float and bool parameters for an
//! external blend system. [`AnimatorParameters`] is the in-process sink the
//! plugin writes to; anything else implementing [`AnimationSink`] can be fed
//! directly from the engines.

use std::collections::HashMap;

use bevy::prelude::*;

/// Parameter names shared by characters and nav agents.
pub mod params {
    pub const X_VELOCITY: &str = "XVelocity";
    pub const Y_VELOCITY: &str = "YVelocity";
    pub const Z_VELOCITY: &str = "ZVelocity";
    pub const LAST_AIRBORNE_Y_VELOCITY: &str = "LastAirborneYVelocity";
    pub const ROTATION: &str = "Rotation";
    pub const IS_ROTATING: &str = "IsRotating";
    pub const SLOPE_ANGLE: &str = "SlopeAngle";
    pub const IS_RUNNING: &str = "IsRunning";
    pub const IS_SLIPING: &str = "IsSliping";
    pub const IS_AIRBORNE: &str = "IsAirborne";
    pub const IS_MOVING: &str = "IsMoving";
    pub const IS_STAGGERED_ON_LANDING: &str = "IsStaggeredOnLanding";
}

/// Receiver of named animation parameters.
pub trait AnimationSink {
    fn set_float(&mut self, name: &str, value: f32);
    fn set_bool(&mut self, name: &str, value: bool);
}

/// Last exported animation parameters of an entity.
#[derive(Component, Reflect, Debug, Clone, Default, PartialEq)]
#[reflect(Component)]
pub struct AnimatorParameters {
    floats: HashMap<String, f32>,
    bools: HashMap<String, bool>,
}

impl AnimatorParameters {
    pub fn float(&self, name: &str) -> Option<f32> {
        self.floats.get(name).copied()
    }

    pub fn bool(&self, name: &str) -> Option<bool> {
        self.bools.get(name).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.floats.is_empty() && self.bools.is_empty()
    }
}

impl AnimationSink for AnimatorParameters {
    fn set_float(&mut self, name: &str, value: f32) {
        if let Some(slot) = self.floats.get_mut(name) {
            *slot = value;
        } else {
            self.floats.insert(name.to_owned(), value);
        }
    }

    fn set_bool(&mut self, name: &str, value: bool) {
        if let Some(slot) = self.bools.get_mut(name) {
            *slot = value;
        } else {
            self.bools.insert(name.to_owned(), value);
        }
    }
}

/// Map a speed onto the walk band `[0, 1]` plus a run band above 1.
///
/// `1.0` is full walk speed and `2.0` full run speed, where run speed is
/// `walk_max * run_modifier`. The sign of `speed` is kept. A run modifier of
/// 1 has no run band; speeds above walk are reported as 1.
pub fn speed_band(speed: f32, walk_max: f32, run_modifier: f32) -> f32 {
    if walk_max <= 0.0 {
        return 0.0;
    }
    let magnitude = speed.abs();
    let mut band = magnitude / walk_max;
    if band > 1.0 {
        let run_span = walk_max * run_modifier - walk_max;
        band = if run_span > f32::EPSILON {
            1.0 + (magnitude - walk_max) / run_span
        } else {
            1.0
        };
    }
    band * crate::velocity::sign(speed)
}
