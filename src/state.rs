//! Stagger timing and state marker components.
//!
//! The marker components mirror the engine's derived flags so other systems
//! can filter on them (`With<Grounded>`, `Added<Staggered>`...). They are
//! added/removed by [`sync_state_markers`](crate::systems::sync_state_markers).

use bevy::prelude::*;

/// Timed stagger state.
///
/// The stagger ends on its own once the engine clock reaches the scheduled
/// deadline. Stopping it early clears the deadline, so it can never fire
/// afterwards. Starting a new stagger replaces the previous deadline.
#[derive(Reflect, Debug, Clone, Copy, Default, PartialEq)]
pub struct StaggerState {
    staggered: bool,
    deadline: Option<f64>,
}

impl StaggerState {
    /// Clock values within this distance of the deadline count as reached.
    pub const DEADLINE_TOLERANCE: f64 = 1e-9;

    pub fn is_staggered(&self) -> bool {
        self.staggered
    }

    /// Scheduled end of the current stagger, on the engine clock.
    pub fn deadline(&self) -> Option<f64> {
        self.deadline
    }

    pub fn start(&mut self, now: f64, duration: f32) {
        self.staggered = true;
        self.deadline = Some(now + f64::from(duration.max(0.0)));
    }

    /// Cancel the stagger. Returns whether one was running.
    pub fn stop(&mut self) -> bool {
        let was_staggered = self.staggered;
        self.staggered = false;
        self.deadline = None;
        was_staggered
    }

    /// End the stagger if its deadline has been reached. Returns whether it
    /// ended.
    pub fn expire(&mut self, now: f64) -> bool {
        match self.deadline {
            Some(deadline) if now + Self::DEADLINE_TOLERANCE >= deadline => self.stop(),
            _ => false,
        }
    }
}

/// Marker component indicating the character is grounded.
///
/// This is a marker component - it has no data, just indicates state.
///
/// # Example
///
/// ```rust
/// use bevy::prelude::*;
/// use action_locomotion::prelude::*;
///
/// // Grounded is a marker component - just use it in queries
/// fn check_grounded(grounded: Option<&Grounded>) -> bool {
///     grounded.is_some()
/// }
/// ```
#[derive(Component, Reflect, Debug, Clone, Copy, Default)]
#[reflect(Component)]
pub struct Grounded;

/// Marker component indicating the character is airborne.
///
/// Sliding characters are neither grounded nor airborne.
#[derive(Component, Reflect, Debug, Clone, Copy, Default)]
#[reflect(Component)]
pub struct Airborne;

/// Marker component indicating the character slides down a slope.
#[derive(Component, Reflect, Debug, Clone, Copy, Default)]
#[reflect(Component)]
pub struct Sliding;

/// Marker component indicating the character runs.
#[derive(Component, Reflect, Debug, Clone, Copy, Default)]
#[reflect(Component)]
pub struct Running;

/// Marker component indicating the character ran out of stamina.
#[derive(Component, Reflect, Debug, Clone, Copy, Default)]
#[reflect(Component)]
pub struct Exhausted;

/// Marker component indicating the character is staggered.
#[derive(Component, Reflect, Debug, Clone, Copy, Default)]
#[reflect(Component)]
pub struct Staggered;
