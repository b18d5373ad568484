//! Stamina pool with exhaustion hysteresis.

use bevy::prelude::*;

use crate::config::StaminaConfig;
use crate::events::LocomotionEvent;

/// Stamina of one character.
///
/// `current` stays within `[0, max]`. Exhaustion starts when a running drain
/// hits zero and only ends once `current` climbs back to
/// `min_to_end_exhaustion`, so the flag cannot flicker around zero.
#[derive(Reflect, Debug, Clone, Copy, PartialEq)]
pub struct StaminaState {
    current: f32,
    exhausted: bool,
    frozen: bool,
    running: bool,
}

impl StaminaState {
    /// A full pool.
    pub fn full(config: &StaminaConfig) -> Self {
        Self {
            current: config.max,
            exhausted: false,
            frozen: false,
            running: false,
        }
    }

    pub fn current(&self) -> f32 {
        self.current
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Freeze or unfreeze the pool. A frozen pool neither drains nor
    /// regenerates, and the character stops running.
    pub fn set_frozen(&mut self, frozen: bool) {
        self.frozen = frozen;
    }

    /// Keep `current` within a new maximum.
    pub(crate) fn fit_to(&mut self, config: &StaminaConfig) {
        self.current = self.current.min(config.max);
    }

    /// Update the running flag, notifying only on edges.
    pub fn set_running(&mut self, wants_to_run: bool, events: &mut Vec<LocomotionEvent>) {
        if !self.running && wants_to_run && !self.frozen {
            self.running = true;
            events.push(LocomotionEvent::ConsumptionChanged(true));
        } else if self.running && (!wants_to_run || self.frozen) {
            self.running = false;
            events.push(LocomotionEvent::ConsumptionChanged(false));
        }
    }

    /// Drain while running, regenerate otherwise.
    pub fn update(&mut self, dt: f32, config: &StaminaConfig, events: &mut Vec<LocomotionEvent>) {
        if !self.frozen {
            if self.running {
                self.current -= config.consumption * dt;
                if self.current <= 0.0 {
                    self.current = 0.0;
                    if !self.exhausted {
                        self.exhausted = true;
                        debug!("stamina exhausted");
                        events.push(LocomotionEvent::ExhaustionChanged(true));
                    }
                }
            } else {
                self.current = (self.current + config.regeneration * dt).min(config.max);
            }
            events.push(LocomotionEvent::StaminaChanged(self.current));
        }

        if self.exhausted && self.current >= config.min_to_end_exhaustion {
            self.exhausted = false;
            debug!("stamina recovered from exhaustion");
            events.push(LocomotionEvent::ExhaustionChanged(false));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> StaminaConfig {
        StaminaConfig {
            max: 10.0,
            consumption: 10.0,
            regeneration: 5.0,
            min_to_end_exhaustion: 4.0,
        }
    }

    #[test]
    fn running_edges_notify_once() {
        let mut stamina = StaminaState::full(&config());
        let mut events = Vec::new();

        stamina.set_running(true, &mut events);
        stamina.set_running(true, &mut events);
        stamina.set_running(false, &mut events);
        stamina.set_running(false, &mut events);

        assert_eq!(
            events,
            vec![
                LocomotionEvent::ConsumptionChanged(true),
                LocomotionEvent::ConsumptionChanged(false)
            ]
        );
    }

    #[test]
    fn frozen_pool_cannot_start_running() {
        let mut stamina = StaminaState::full(&config());
        let mut events = Vec::new();
        stamina.set_running(true, &mut events);
        stamina.set_frozen(true);
        stamina.set_running(true, &mut events);

        assert!(!stamina.is_running());
        assert_eq!(events.last(), Some(&LocomotionEvent::ConsumptionChanged(false)));
    }

    #[test]
    fn exhaustion_has_hysteresis() {
        let config = config();
        let mut stamina = StaminaState::full(&config);
        let mut events = Vec::new();

        stamina.set_running(true, &mut events);
        for _ in 0..10 {
            stamina.update(0.1, &config, &mut events);
        }
        assert_eq!(stamina.current(), 0.0);
        assert!(stamina.is_exhausted());
        let exhausted_events = events
            .iter()
            .filter(|e| **e == LocomotionEvent::ExhaustionChanged(true))
            .count();
        assert_eq!(exhausted_events, 1);

        stamina.set_running(false, &mut events);
        // Regenerate to 3.5, still below the recovery level of 4.
        for _ in 0..7 {
            stamina.update(0.1, &config, &mut events);
        }
        assert!(stamina.current() < 4.0);
        assert!(stamina.current() > 0.0);
        assert!(stamina.is_exhausted());

        for _ in 0..2 {
            stamina.update(0.1, &config, &mut events);
        }
        assert!(stamina.current() >= 4.0);
        assert!(!stamina.is_exhausted());
        assert_eq!(
            events.last(),
            Some(&LocomotionEvent::ExhaustionChanged(false))
        );
    }

    #[test]
    fn regeneration_is_clamped_and_always_reported() {
        let config = config();
        let mut stamina = StaminaState::full(&config);
        let mut events = Vec::new();

        stamina.update(1.0, &config, &mut events);

        assert_eq!(stamina.current(), 10.0);
        assert_eq!(events, vec![LocomotionEvent::StaminaChanged(10.0)]);
    }

    #[test]
    fn frozen_pool_is_silent() {
        let config = config();
        let mut stamina = StaminaState::full(&config);
        let mut events = Vec::new();
        stamina.set_frozen(true);

        stamina.update(1.0, &config, &mut events);

        assert!(events.is_empty());
        assert_eq!(stamina.current(), 10.0);
    }
}
