//! Configuration errors.
//!
//! Engines validate their configuration up front so a bad value fails when a
//! character is spawned, not several frames later as a NaN velocity.

use thiserror::Error;

/// Errors raised while validating locomotion, camera or agent configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// A value that is used as a divisor or speed cap must be strictly positive.
    #[error("`{field}` must be positive and finite, got {value}")]
    NotPositive { field: &'static str, value: f32 },

    /// A rate or duration that cannot run backwards.
    #[error("`{field}` must be zero or positive, got {value}")]
    Negative { field: &'static str, value: f32 },

    /// Exhaustion could never end if the recovery level is above the maximum.
    #[error("stamina recovery level {min_to_end} must lie within [0, {max}]")]
    StaminaRecoveryOutOfRange { min_to_end: f32, max: f32 },

    /// The walkable slope limit must stay below the steepest slope that slides.
    #[error("slope limit {slope_limit} must be lower than the max slide angle {max_slide_angle}")]
    SlopeRange {
        slope_limit: f32,
        max_slide_angle: f32,
    },

    /// A landing callback was configured without a name.
    #[error("landing callback name is empty")]
    EmptyLandingCallback,

    /// The walk band must be slower than the run band.
    #[error("run speed {run} must be greater than walk speed {walk}")]
    SpeedBands { walk: f32, run: f32 },

    /// Raw movement mode value that maps to no mode.
    #[error("unknown movement mode {0}")]
    UnknownMovementMode(u8),

    /// Raw orbit rotation type value that maps to no rotation type.
    #[error("unknown orbit rotation type {0}")]
    UnknownRotationType(u8),

    /// A collaborator entity required at initialization is missing.
    #[error("missing {what} on entity {entity}")]
    MissingCollaborator {
        what: &'static str,
        entity: bevy::prelude::Entity,
    },
}

/// Check that a value is finite and strictly positive.
pub(crate) fn ensure_positive(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::NotPositive { field, value })
    }
}

/// Check that a value is finite and not negative.
pub(crate) fn ensure_non_negative(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::Negative { field, value })
    }
}
