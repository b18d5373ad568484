//! Locomotion configuration components.
//!
//! Speeds are in world units per second, angles in degrees, rates per second.
//! Every group has a `Default` matching a grounded third-person character and
//! `with_*` builders for the values that usually get tuned.

use bevy::prelude::*;

use crate::error::{ensure_non_negative, ensure_positive, ConfigError};

/// How the character's facing relates to its movement.
#[derive(Reflect, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MovementMode {
    /// Independent sideways and forward speed, facing driven by the camera
    /// axis or the lock-on target.
    #[default]
    Strafing,
    /// The body turns toward the input direction and only forward speed is
    /// modelled.
    MoveToward,
}

impl TryFrom<u8> for MovementMode {
    type Error = ConfigError;

    fn try_from(raw: u8) -> Result<Self, Self::Error> {
        match raw {
            0 => Ok(Self::Strafing),
            1 => Ok(Self::MoveToward),
            other => Err(ConfigError::UnknownMovementMode(other)),
        }
    }
}

/// Multipliers applied to speed targets and accelerations.
///
/// Each one applies only while its condition holds: `backward` while the
/// forward input is negative, `side_step` while there is sideways input,
/// `airborne` while not grounded and `running` while running.
#[derive(Reflect, Debug, Clone, Copy, PartialEq)]
pub struct ModifierConfig {
    pub side_step: f32,
    pub backward: f32,
    pub airborne: f32,
    pub running: f32,
}

impl Default for ModifierConfig {
    fn default() -> Self {
        Self {
            side_step: 1.0,
            backward: 1.0,
            airborne: 0.2,
            running: 2.4,
        }
    }
}

/// Stamina pool drained by running.
#[derive(Reflect, Debug, Clone, Copy, PartialEq)]
pub struct StaminaConfig {
    pub max: f32,
    /// Drain per second while running.
    pub consumption: f32,
    /// Regeneration per second while not running.
    pub regeneration: f32,
    /// Exhaustion only ends once stamina climbs back to this level.
    pub min_to_end_exhaustion: f32,
}

impl Default for StaminaConfig {
    fn default() -> Self {
        Self {
            max: 100.0,
            consumption: 20.0,
            regeneration: 5.0,
            min_to_end_exhaustion: 25.0,
        }
    }
}

/// Hard landing reactions.
#[derive(Reflect, Debug, Clone, PartialEq)]
pub struct LandingConfig {
    /// Downward speed at or above which a landing counts as hard.
    pub hard_landing_speed: f32,
    /// Name forwarded with the hard landing event, if any.
    pub callback: Option<String>,
    /// Stagger the character on hard landings.
    pub stagger: bool,
    /// Stagger duration in seconds.
    pub stagger_duration: f32,
}

impl Default for LandingConfig {
    fn default() -> Self {
        Self {
            hard_landing_speed: 25.0,
            callback: None,
            stagger: false,
            stagger_duration: 1.0,
        }
    }
}

/// Slope sliding parameters.
#[derive(Reflect, Debug, Clone, Copy, PartialEq)]
pub struct SlideConfig {
    /// Steepest walkable slope (degrees).
    pub slope_limit: f32,
    /// Slopes at or above this angle are treated as walls, not slides.
    pub max_slide_angle: f32,
    /// Slide acceleration along the slope.
    pub acceleration: f32,
    /// Probe below contacts so stair edges do not count as slopes.
    pub edge_guard: bool,
    /// Horizontal offset of the edge probe away from the contact.
    pub edge_probe_offset: f32,
    /// Edge probe length, scaled by `tan(slope angle)`.
    pub edge_probe_distance: f32,
}

impl Default for SlideConfig {
    fn default() -> Self {
        Self {
            slope_limit: 45.0,
            max_slide_angle: 89.0,
            acceleration: 10.0,
            edge_guard: true,
            edge_probe_offset: 0.01,
            edge_probe_distance: 0.05,
        }
    }
}

/// Configuration of a character driven by the locomotion engine.
#[derive(Component, Reflect, Debug, Clone, PartialEq)]
#[reflect(Component)]
pub struct LocomotionConfig {
    // === Rotation ===
    /// Yaw speed from the camera axis or toward the input direction (deg/s).
    pub yaw_speed: f32,
    /// Interpolation rate toward a lock-on target.
    pub lock_on_turn_rate: f32,

    // === Movement ===
    /// Top sideways walk speed.
    pub max_side_speed: f32,
    /// Top forward walk speed.
    pub max_forward_speed: f32,
    pub acceleration: f32,
    pub deceleration: f32,
    /// Keep accelerating from input while airborne.
    pub air_control: bool,
    pub modifiers: ModifierConfig,

    // === Vertical ===
    pub gravity: Vec3,
    pub weight_multiplier: f32,
    pub max_falling_speed: f32,
    pub jump_allowed: bool,
    pub jump_strength: f32,

    // === Running ===
    pub running_allowed: bool,
    /// Minimum input magnitude to start running.
    pub min_input_for_run: f32,
    pub stamina: StaminaConfig,

    // === Contacts ===
    pub slide: SlideConfig,
    /// Cancel velocity into walls and ceilings.
    pub adjust_on_walls: bool,
    pub landing: LandingConfig,

    /// Push animation parameters after every tick.
    pub export_animation: bool,
}

impl Default for LocomotionConfig {
    fn default() -> Self {
        Self {
            yaw_speed: 115.0,
            lock_on_turn_rate: 10.0,

            max_side_speed: 5.0,
            max_forward_speed: 5.0,
            acceleration: 20.0,
            deceleration: 32.0,
            air_control: true,
            modifiers: ModifierConfig::default(),

            gravity: Vec3::new(0.0, -9.81, 0.0),
            weight_multiplier: 2.8,
            max_falling_speed: 100.0,
            jump_allowed: false,
            jump_strength: 10.6,

            running_allowed: true,
            min_input_for_run: 0.5,
            stamina: StaminaConfig::default(),

            slide: SlideConfig::default(),
            adjust_on_walls: true,
            landing: LandingConfig::default(),

            export_animation: true,
        }
    }
}

impl LocomotionConfig {
    /// Player preset: jumping and landing stagger enabled.
    pub fn player() -> Self {
        Self {
            jump_allowed: true,
            landing: LandingConfig {
                stagger: true,
                ..default()
            },
            ..default()
        }
    }

    /// Preset for AI driven characters: no running, no steering in the air.
    pub fn npc() -> Self {
        Self {
            running_allowed: false,
            air_control: false,
            ..default()
        }
    }

    /// Builder: set top walk speeds.
    pub fn with_speeds(mut self, side: f32, forward: f32) -> Self {
        self.max_side_speed = side;
        self.max_forward_speed = forward;
        self
    }

    /// Builder: set acceleration and deceleration.
    pub fn with_acceleration(mut self, acceleration: f32, deceleration: f32) -> Self {
        self.acceleration = acceleration;
        self.deceleration = deceleration;
        self
    }

    /// Builder: set gravity and weight multiplier.
    pub fn with_gravity(mut self, gravity: Vec3, weight_multiplier: f32) -> Self {
        self.gravity = gravity;
        self.weight_multiplier = weight_multiplier;
        self
    }

    /// Builder: enable jumping with the given strength.
    pub fn with_jump(mut self, strength: f32) -> Self {
        self.jump_allowed = true;
        self.jump_strength = strength;
        self
    }

    /// Builder: set the movement modifiers.
    pub fn with_modifiers(mut self, modifiers: ModifierConfig) -> Self {
        self.modifiers = modifiers;
        self
    }

    /// Builder: set the stamina pool.
    pub fn with_stamina(mut self, stamina: StaminaConfig) -> Self {
        self.stamina = stamina;
        self
    }

    /// Builder: enable landing stagger.
    pub fn with_landing_stagger(mut self, hard_landing_speed: f32, duration: f32) -> Self {
        self.landing.stagger = true;
        self.landing.hard_landing_speed = hard_landing_speed;
        self.landing.stagger_duration = duration;
        self
    }

    /// Builder: forward a named callback with hard landing events.
    pub fn with_landing_callback(mut self, name: impl Into<String>) -> Self {
        self.landing.callback = Some(name.into());
        self
    }

    /// Builder: set the walkable slope limit (degrees).
    pub fn with_slope_limit(mut self, degrees: f32) -> Self {
        self.slide.slope_limit = degrees;
        self
    }

    /// Builder: toggle running.
    pub fn with_running_allowed(mut self, allowed: bool) -> Self {
        self.running_allowed = allowed;
        self
    }

    /// Top airborne sideways speed, before the global modifier.
    #[inline]
    pub fn max_airborne_side_speed(&self) -> f32 {
        self.max_side_speed * self.modifiers.side_step * self.modifiers.running
    }

    /// Top airborne forward speed, before the global modifier.
    #[inline]
    pub fn max_airborne_forward_speed(&self) -> f32 {
        self.max_forward_speed * self.modifiers.running
    }

    /// Check every value the engine divides by or clamps against.
    pub fn validate(&self) -> Result<(), ConfigError> {
        ensure_non_negative("yaw_speed", self.yaw_speed)?;
        ensure_non_negative("lock_on_turn_rate", self.lock_on_turn_rate)?;
        ensure_positive("max_side_speed", self.max_side_speed)?;
        ensure_positive("max_forward_speed", self.max_forward_speed)?;
        ensure_non_negative("acceleration", self.acceleration)?;
        ensure_non_negative("deceleration", self.deceleration)?;
        ensure_non_negative("weight_multiplier", self.weight_multiplier)?;
        ensure_positive("max_falling_speed", self.max_falling_speed)?;
        ensure_non_negative("jump_strength", self.jump_strength)?;
        ensure_non_negative("min_input_for_run", self.min_input_for_run)?;

        ensure_positive("modifiers.side_step", self.modifiers.side_step)?;
        ensure_positive("modifiers.backward", self.modifiers.backward)?;
        ensure_non_negative("modifiers.airborne", self.modifiers.airborne)?;
        ensure_positive("modifiers.running", self.modifiers.running)?;

        ensure_positive("stamina.max", self.stamina.max)?;
        ensure_non_negative("stamina.consumption", self.stamina.consumption)?;
        ensure_non_negative("stamina.regeneration", self.stamina.regeneration)?;
        if !(0.0..=self.stamina.max).contains(&self.stamina.min_to_end_exhaustion) {
            return Err(ConfigError::StaminaRecoveryOutOfRange {
                min_to_end: self.stamina.min_to_end_exhaustion,
                max: self.stamina.max,
            });
        }

        ensure_non_negative("slide.slope_limit", self.slide.slope_limit)?;
        ensure_non_negative("slide.acceleration", self.slide.acceleration)?;
        ensure_non_negative("slide.edge_probe_offset", self.slide.edge_probe_offset)?;
        ensure_non_negative("slide.edge_probe_distance", self.slide.edge_probe_distance)?;
        if self.slide.slope_limit >= self.slide.max_slide_angle || self.slide.max_slide_angle > 90.0
        {
            return Err(ConfigError::SlopeRange {
                slope_limit: self.slide.slope_limit,
                max_slide_angle: self.slide.max_slide_angle,
            });
        }

        ensure_non_negative("landing.hard_landing_speed", self.landing.hard_landing_speed)?;
        ensure_non_negative("landing.stagger_duration", self.landing.stagger_duration)?;
        if matches!(self.landing.callback.as_deref(), Some(name) if name.trim().is_empty()) {
            return Err(ConfigError::EmptyLandingCallback);
        }

        Ok(())
    }
}
