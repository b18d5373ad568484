//! Notifications.
//!
//! The engines queue [`LocomotionEvent`]s while they tick; the plugin drains
//! them into the Bevy events below, tagged with the character entity. Readers
//! must not rely on the order in which different readers see an event.

use bevy::prelude::*;

/// Notification queued by a locomotion engine during a tick.
#[derive(Debug, Clone, PartialEq)]
pub enum LocomotionEvent {
    /// Stamina after this tick's drain or regeneration.
    StaminaChanged(f32),
    /// Exhaustion started (`true`) or ended (`false`).
    ExhaustionChanged(bool),
    /// Running started (`true`) or stopped (`false`).
    ConsumptionChanged(bool),
    /// Landed with a downward speed at or above the hard landing threshold.
    HardLanding {
        callback: Option<String>,
        vertical_speed: f32,
    },
    /// A stagger started or ended.
    StaggerChanged(bool),
}

/// Stamina value changed.
#[derive(Event, Debug, Clone, Copy, PartialEq)]
pub struct StaminaChanged {
    pub entity: Entity,
    pub stamina: f32,
}

/// Exhaustion started or ended.
#[derive(Event, Debug, Clone, Copy, PartialEq)]
pub struct StaminaExhaustionChanged {
    pub entity: Entity,
    pub exhausted: bool,
}

/// Stamina consumption started (running) or stopped.
#[derive(Event, Debug, Clone, Copy, PartialEq)]
pub struct StaminaConsumptionChanged {
    pub entity: Entity,
    pub consuming: bool,
}

/// Hard landing; `callback` carries the configured landing callback name.
#[derive(Event, Debug, Clone, PartialEq)]
pub struct HardLanding {
    pub entity: Entity,
    pub callback: Option<String>,
    pub vertical_speed: f32,
}

/// Stagger started or ended.
#[derive(Event, Debug, Clone, Copy, PartialEq)]
pub struct StaggerChanged {
    pub entity: Entity,
    pub staggered: bool,
}

/// A camera's lock-on target changed.
#[derive(Event, Debug, Clone, Copy, PartialEq)]
pub struct LockOnTargetChanged {
    pub camera: Entity,
    pub target: Option<Entity>,
}

/// What a [`Subscription`] listens to.
#[derive(Reflect, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubscriptionTopic {
    Stamina,
    LockOn,
}

/// Declares that an entity listens to notifications from `source`.
///
/// Adding the component answers with a [`JustSubscribed`] event so the
/// subscriber can read the source's current state right away.
#[derive(Component, Reflect, Debug, Clone, Copy, PartialEq)]
#[reflect(Component)]
pub struct Subscription {
    pub source: Entity,
    pub topic: SubscriptionTopic,
}

impl Subscription {
    pub fn stamina(source: Entity) -> Self {
        Self {
            source,
            topic: SubscriptionTopic::Stamina,
        }
    }

    pub fn lock_on(source: Entity) -> Self {
        Self {
            source,
            topic: SubscriptionTopic::LockOn,
        }
    }
}

/// Sent once when a [`Subscription`] is added.
#[derive(Event, Debug, Clone, Copy, PartialEq)]
pub struct JustSubscribed {
    pub subscriber: Entity,
    pub source: Entity,
    pub topic: SubscriptionTopic,
}
