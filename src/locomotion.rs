//! The character locomotion engine.
//!
//! [`LocomotionEngine`] owns the velocity, stamina and stagger state of one
//! capsule character and advances them one tick at a time against a
//! [`CharacterPhysics`] view. It knows nothing about Bevy scheduling; the
//! [`CharacterLocomotion`] component wraps it for the ECS.

use bevy::prelude::*;

use crate::animation::{params, speed_band, AnimationSink};
use crate::backend::{CharacterPhysics, RaycastRequest};
use crate::collision::ContactPoint;
use crate::config::{LocomotionConfig, MovementMode};
use crate::detection::{
    correct_for_surface, evaluate_slide, horizontal_distance, SlideAccumulator,
};
use crate::error::ConfigError;
use crate::events::LocomotionEvent;
use crate::intent::InputSnapshot;
use crate::stamina::StaminaState;
use crate::state::StaggerState;
use crate::velocity::{
    flat_look_rotation, integrate_axis, planar_to_world, sign, signed_yaw_delta, yaw_rotation,
    AirborneLimits, AxisStep, LocalFrame, MovementModifiers, VelocityState,
};

/// What one tick did.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TickReport {
    /// World displacement submitted to the physics body, slope correction
    /// included.
    pub displacement: Vec3,
    /// Grounded state after the move.
    pub grounded: bool,
    /// Signed yaw turned this tick in degrees, positive to the right.
    pub rotation_delta: f32,
}

/// Locomotion state machine for one character.
#[derive(Debug, Clone)]
pub struct LocomotionEngine {
    config: LocomotionConfig,
    velocity: VelocityState,
    stamina: StaminaState,
    stagger: StaggerState,
    modifiers: MovementModifiers,
    global_modifier: f32,
    /// Seconds of simulated time seen by this engine.
    clock: f64,
    /// One-shot external velocity skips the next vertical integration.
    added_velocity: bool,
    grounded: bool,
    sliding: bool,
    airborne: bool,
    rotation_delta: f32,
    last_hit_distance: f32,
    rotation: Quat,
    events: Vec<LocomotionEvent>,
}

impl LocomotionEngine {
    /// Build an engine, rejecting configurations it cannot run.
    pub fn new(config: LocomotionConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            stamina: StaminaState::full(&config.stamina),
            config,
            velocity: VelocityState::default(),
            stagger: StaggerState::default(),
            modifiers: MovementModifiers::NEUTRAL,
            global_modifier: 1.0,
            clock: 0.0,
            added_velocity: false,
            grounded: false,
            sliding: false,
            airborne: false,
            rotation_delta: 0.0,
            last_hit_distance: 0.0,
            rotation: Quat::IDENTITY,
            events: Vec::new(),
        })
    }

    /// Swap the configuration, keeping the current motion.
    pub fn reconfigure(&mut self, config: LocomotionConfig) -> Result<(), ConfigError> {
        config.validate()?;
        self.stamina.fit_to(&config.stamina);
        self.config = config;
        Ok(())
    }

    /// Advance the character by `dt` seconds.
    ///
    /// A non-positive or non-finite `dt` changes nothing. Contacts reported by
    /// the move are resolved before this returns.
    pub fn tick<P: CharacterPhysics + ?Sized>(
        &mut self,
        physics: &mut P,
        input: &InputSnapshot,
        mode: MovementMode,
        lock_target: Option<Vec3>,
        dt: f32,
    ) -> TickReport {
        if !dt.is_finite() || dt <= 0.0 {
            return TickReport {
                displacement: Vec3::ZERO,
                grounded: self.grounded,
                rotation_delta: 0.0,
            };
        }

        self.clock += f64::from(dt);
        if self.stagger.expire(self.clock) {
            debug!("stagger ended");
            self.events.push(LocomotionEvent::StaggerChanged(false));
        }

        let movement = input.movement();
        let grounded_before = physics.is_grounded();

        self.rotate(physics, movement, input.camera_x, mode, lock_target, dt);
        let frame = LocalFrame::new(physics.rotation());

        // Running and stamina
        let wants_to_run = self.config.running_allowed
            && input.running
            && grounded_before
            && !self.stagger.is_staggered()
            && self.stamina.current() > 0.0
            && !self.stamina.is_exhausted()
            && movement.length() >= self.config.min_input_for_run;
        self.stamina.set_running(wants_to_run, &mut self.events);
        self.stamina
            .update(dt, &self.config.stamina, &mut self.events);

        // Velocity integration
        if self.stagger.is_staggered() {
            self.integrate_vertical(grounded_before, false, dt);
        } else {
            self.modifiers = MovementModifiers::compute(
                movement,
                grounded_before,
                self.stamina.is_running(),
                &self.config.modifiers,
            );
            let (x_input, z_input) = match mode {
                MovementMode::Strafing => (movement.x, movement.y),
                MovementMode::MoveToward => (0.0, movement.length()),
            };
            let jump = self.config.jump_allowed
                && grounded_before
                && self.velocity.slide == Vec3::ZERO
                && input.jump;

            self.integrate_horizontal(x_input, z_input, grounded_before, dt);
            self.integrate_vertical(grounded_before, jump, dt);
        }

        // Move and resolve contacts
        let limits = AirborneLimits::from_config(&self.config, self.global_modifier);
        let world_velocity = self.velocity.compose(frame, grounded_before, &limits);
        let mut displacement = world_velocity * dt;

        let mut contacts = Vec::new();
        physics.move_character(displacement, &mut contacts);
        let slide = self.resolve_contacts(&*physics, &contacts, frame, dt);
        self.velocity
            .absorb_slide(slide, physics.is_grounded(), self.config.max_falling_speed);

        if !self.airborne && !physics.is_grounded() && world_velocity.y < 0.0 {
            displacement += self.stick_to_slope(physics, displacement);
        }

        // Landing, reconciliation and derived flags
        let grounded = physics.is_grounded();
        self.land(grounded);
        self.velocity.reconcile(grounded, frame);

        self.sliding = self.velocity.slide != Vec3::ZERO;
        self.airborne = !grounded && !self.sliding;
        self.grounded = grounded;
        self.rotation = frame.rotation();

        TickReport {
            displacement,
            grounded,
            rotation_delta: self.rotation_delta,
        }
    }

    fn rotate<P: CharacterPhysics + ?Sized>(
        &mut self,
        physics: &mut P,
        movement: Vec2,
        camera_x: f32,
        mode: MovementMode,
        lock_target: Option<Vec3>,
        dt: f32,
    ) {
        if self.stagger.is_staggered() {
            self.rotation_delta = 0.0;
            return;
        }

        let before = physics.rotation();
        let after = match (mode, lock_target) {
            (MovementMode::Strafing, Some(target)) => {
                match flat_look_rotation(target - physics.position()) {
                    Some(look) => {
                        let t = (dt * self.config.lock_on_turn_rate * self.global_modifier)
                            .clamp(0.0, 1.0);
                        before.slerp(look, t)
                    }
                    None => before,
                }
            }
            (MovementMode::Strafing, None) => {
                let degrees = camera_x * self.config.yaw_speed * self.global_modifier * dt;
                before * yaw_rotation(degrees)
            }
            (MovementMode::MoveToward, _) => match flat_look_rotation(planar_to_world(movement)) {
                Some(look) => before.lerp(look, (self.config.yaw_speed * dt).clamp(0.0, 1.0)),
                None => before,
            },
        };

        if after != before {
            physics.set_rotation(after);
        }
        self.rotation_delta = signed_yaw_delta(before, after);
    }

    fn integrate_horizontal(&mut self, x_input: f32, z_input: f32, grounded: bool, dt: f32) {
        let m = self.modifiers;
        let control = !self.airborne || self.config.air_control;

        let x = AxisStep {
            input: x_input,
            target: self.config.max_side_speed
                * x_input
                * m.side_step
                * m.running
                * self.global_modifier,
            acceleration: self.config.acceleration * m.side_step * m.airborne * m.running,
            deceleration: self.config.deceleration * m.side_step * m.airborne * m.running,
            control,
            grounded,
        };
        let z = AxisStep {
            input: z_input,
            target: self.config.max_forward_speed
                * z_input
                * m.backward
                * m.running
                * self.global_modifier,
            acceleration: self.config.acceleration * m.backward * m.airborne * m.running,
            deceleration: self.config.deceleration * m.backward * m.airborne * m.running,
            control,
            grounded,
        };

        self.velocity.local.x = integrate_axis(self.velocity.local.x, &x, dt);
        self.velocity.local.z = integrate_axis(self.velocity.local.z, &z, dt);
    }

    fn integrate_vertical(&mut self, grounded: bool, jump: bool, dt: f32) {
        if self.added_velocity {
            self.added_velocity = false;
            return;
        }
        if grounded {
            self.velocity.local.y = 0.0;
        }
        if jump {
            self.velocity.local.y = self.config.jump_strength;
        }
        self.velocity.local.y += self.config.gravity.y * self.config.weight_multiplier * dt;
    }

    /// React to every contact of the move and return this tick's slide.
    fn resolve_contacts<P: CharacterPhysics + ?Sized>(
        &mut self,
        physics: &P,
        contacts: &[ContactPoint],
        frame: LocalFrame,
        dt: f32,
    ) -> Vec3 {
        let position = physics.position();
        let mut slide = SlideAccumulator::default();
        for contact in contacts {
            if !slide.is_disqualified() {
                slide.add(evaluate_slide(physics, contact, &self.config.slide, dt));
            }
            self.last_hit_distance = horizontal_distance(position, contact.point);
            if self.config.adjust_on_walls {
                correct_for_surface(&mut self.velocity, frame, contact.normal);
            }
        }
        slide.velocity()
    }

    /// Pull the character back onto a walkable slope it just ran off.
    ///
    /// Returns the extra displacement applied.
    fn stick_to_slope<P: CharacterPhysics + ?Sized>(
        &mut self,
        physics: &mut P,
        last_move: Vec3,
    ) -> Vec3 {
        let flat = Vec2::new(last_move.x, last_move.z).length();
        let distance = self.config.slide.slope_limit.to_radians().tan() * flat
            + physics.skin_width()
            - last_move.y
            + self.last_hit_distance
            - last_move.y;

        let request = RaycastRequest::down(physics.feet(), distance);
        if !distance.is_finite() || request.is_degenerate() || physics.raycast(&request).is_none()
        {
            return Vec3::ZERO;
        }

        let correction = Vec3::new(0.0, -distance, 0.0);
        let mut ignored = Vec::new();
        physics.move_character(correction, &mut ignored);
        correction
    }

    fn land(&mut self, grounded: bool) {
        let global = self.velocity.global;
        let hard = grounded
            && global != Vec3::ZERO
            && global.y <= -self.config.landing.hard_landing_speed;

        if hard {
            debug!("hard landing at {:.2} m/s", global.y);
            self.events.push(LocomotionEvent::HardLanding {
                callback: self.config.landing.callback.clone(),
                vertical_speed: global.y,
            });
        }

        if self.config.landing.stagger {
            if hard {
                if self.velocity.slide == Vec3::ZERO {
                    self.start_stagger(self.config.landing.stagger_duration);
                }
            } else if !grounded && self.stagger.is_staggered() {
                self.stop_stagger();
            }
        }
    }

    /// Stagger for `duration` seconds of engine time, dropping all voluntary
    /// velocity. A running stagger is replaced.
    pub fn start_stagger(&mut self, duration: f32) {
        self.velocity.local = Vec3::ZERO;
        self.velocity.global = Vec3::ZERO;
        let was_staggered = self.stagger.is_staggered();
        self.stagger.start(self.clock, duration);
        if !was_staggered {
            debug!("stagger started for {duration:.2}s");
            self.events.push(LocomotionEvent::StaggerChanged(true));
        }
    }

    /// End the stagger early. Its scheduled end will not fire.
    pub fn stop_stagger(&mut self) {
        if self.stagger.stop() {
            debug!("stagger stopped");
            self.events.push(LocomotionEvent::StaggerChanged(false));
        }
    }

    /// Add a character-relative velocity. The next tick skips ground
    /// snapping and gravity once.
    pub fn add_local_velocity(&mut self, velocity: Vec3) {
        self.velocity.local += velocity;
        self.added_velocity = true;
    }

    /// Add a world-space velocity. The next tick skips ground snapping and
    /// gravity once.
    pub fn add_global_velocity(&mut self, velocity: Vec3) {
        self.velocity.local += LocalFrame::new(self.rotation).to_local(velocity);
        self.added_velocity = true;
    }

    /// Stop all motion, slide included.
    pub fn nullify_velocity(&mut self) {
        self.velocity.clear();
    }

    /// Scale walk speeds, turn rates and airborne caps.
    ///
    /// Negative or non-finite values are ignored.
    pub fn set_global_modifier(&mut self, modifier: f32) {
        if !modifier.is_finite() || modifier < 0.0 {
            warn!("ignoring invalid global speed modifier {modifier}");
            return;
        }
        self.global_modifier = modifier;
    }

    pub fn freeze_stamina(&mut self, frozen: bool) {
        self.stamina.set_frozen(frozen);
    }

    pub fn set_jump_allowed(&mut self, allowed: bool) {
        self.config.jump_allowed = allowed;
    }

    /// Notifications queued since the last drain, oldest first.
    pub fn drain_events(&mut self) -> impl Iterator<Item = LocomotionEvent> + '_ {
        self.events.drain(..)
    }

    /// Push the animation parameters for the current state.
    pub fn export_animation(&self, sink: &mut impl AnimationSink) {
        let total = self.velocity.total_local(LocalFrame::new(self.rotation));
        let run = self.config.modifiers.running;
        let max_x = self.config.max_side_speed * self.config.modifiers.side_step;
        let max_z = if sign(total.z) > 0.0 {
            self.config.max_forward_speed
        } else {
            self.config.max_forward_speed * self.config.modifiers.backward
        };

        sink.set_float(params::X_VELOCITY, speed_band(total.x, max_x, run));
        sink.set_float(params::Z_VELOCITY, speed_band(total.z, max_z, run));
        sink.set_float(params::Y_VELOCITY, total.y);
        if !self.grounded {
            sink.set_float(params::LAST_AIRBORNE_Y_VELOCITY, total.y);
        }
        sink.set_float(params::ROTATION, self.rotation_delta);
        sink.set_bool(params::IS_ROTATING, self.rotation_delta != 0.0);
        sink.set_float(params::SLOPE_ANGLE, self.slide_angle());
        sink.set_bool(params::IS_RUNNING, self.stamina.is_running());
        sink.set_bool(params::IS_SLIPING, self.sliding);
        sink.set_bool(params::IS_AIRBORNE, !self.grounded);
        sink.set_bool(
            params::IS_MOVING,
            total.x != 0.0 || (total.y != 0.0 && !self.grounded) || total.z != 0.0,
        );
        sink.set_bool(
            params::IS_STAGGERED_ON_LANDING,
            self.stagger.is_staggered(),
        );
    }

    /// Angle of the slide below the horizon in degrees, 0 when not sliding.
    fn slide_angle(&self) -> f32 {
        let slide = self.velocity.slide;
        if slide == Vec3::ZERO {
            return 0.0;
        }
        let flat = Vec3::new(slide.x, 0.0, slide.z);
        if flat == Vec3::ZERO {
            return 90.0;
        }
        slide.angle_between(flat).to_degrees()
    }

    pub fn config(&self) -> &LocomotionConfig {
        &self.config
    }

    pub fn velocity(&self) -> &VelocityState {
        &self.velocity
    }

    pub fn stamina(&self) -> &StaminaState {
        &self.stamina
    }

    pub fn modifiers(&self) -> MovementModifiers {
        self.modifiers
    }

    pub fn global_modifier(&self) -> f32 {
        self.global_modifier
    }

    /// Engine time in seconds.
    pub fn clock(&self) -> f64 {
        self.clock
    }

    /// Scheduled end of the current stagger on the engine clock.
    pub fn stagger_deadline(&self) -> Option<f64> {
        self.stagger.deadline()
    }

    pub fn rotation_delta(&self) -> f32 {
        self.rotation_delta
    }

    pub fn is_grounded(&self) -> bool {
        self.grounded
    }

    pub fn is_running(&self) -> bool {
        self.stamina.is_running()
    }

    pub fn is_exhausted(&self) -> bool {
        self.stamina.is_exhausted()
    }

    pub fn is_sliding(&self) -> bool {
        self.sliding
    }

    pub fn is_airborne(&self) -> bool {
        self.airborne
    }

    pub fn is_staggered(&self) -> bool {
        self.stagger.is_staggered()
    }
}

/// ECS wrapper around a [`LocomotionEngine`].
///
/// Created from the entity's [`LocomotionConfig`] when it is added. The
/// backend drives it every frame with `intent`, `mode` and the lock target.
#[derive(Component, Debug, Clone)]
pub struct CharacterLocomotion {
    pub engine: LocomotionEngine,
    /// `None` after an unknown raw mode; the character then only falls.
    pub mode: Option<MovementMode>,
    /// Input for the next tick.
    pub intent: InputSnapshot,
    /// Entity to face while strafing.
    pub lock_target: Option<Entity>,
}

impl CharacterLocomotion {
    pub fn new(engine: LocomotionEngine) -> Self {
        Self {
            engine,
            mode: Some(MovementMode::default()),
            intent: InputSnapshot::NEUTRAL,
            lock_target: None,
        }
    }

    /// Builder: select the movement mode.
    pub fn with_mode(mut self, mode: MovementMode) -> Self {
        self.mode = Some(mode);
        self
    }

    /// Select the movement mode from its raw value.
    ///
    /// Unknown values are logged and leave the character without a mode.
    pub fn set_raw_mode(&mut self, raw: u8) {
        match MovementMode::try_from(raw) {
            Ok(mode) => self.mode = Some(mode),
            Err(err) => {
                warn!("{err}; character input is ignored");
                self.mode = None;
            }
        }
    }

    /// Tick the engine with the stored intent and mode.
    pub fn drive<P: CharacterPhysics + ?Sized>(
        &mut self,
        physics: &mut P,
        lock_target: Option<Vec3>,
        dt: f32,
    ) -> TickReport {
        match self.mode {
            Some(mode) => self.engine.tick(physics, &self.intent, mode, lock_target, dt),
            None => self.engine.tick(
                physics,
                &InputSnapshot::NEUTRAL,
                MovementMode::Strafing,
                None,
                dt,
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::AnimatorParameters;
    use crate::backend::SceneQuery;
    use crate::collision::RayHit;

    /// Flat ground at y = 0 with the capsule center resting at y = 1.
    struct FlatGround {
        position: Vec3,
        rotation: Quat,
        grounded: bool,
    }

    impl FlatGround {
        fn standing() -> Self {
            Self {
                position: Vec3::new(0.0, 1.0, 0.0),
                rotation: Quat::IDENTITY,
                grounded: true,
            }
        }

        fn floating(height: f32) -> Self {
            Self {
                position: Vec3::new(0.0, height, 0.0),
                rotation: Quat::IDENTITY,
                grounded: false,
            }
        }
    }

    impl SceneQuery for FlatGround {
        fn raycast_all(&self, request: &RaycastRequest) -> Vec<RayHit> {
            if request.direction.y >= 0.0 {
                return Vec::new();
            }
            let distance = request.origin.y / -request.direction.y;
            if distance < 0.0 || distance > request.max_distance {
                return Vec::new();
            }
            vec![RayHit::new(
                distance,
                request.point_at(distance),
                Vec3::Y,
                Entity::from_raw(1),
            )]
        }
    }

    impl CharacterPhysics for FlatGround {
        fn position(&self) -> Vec3 {
            self.position
        }

        fn foot_offset(&self) -> f32 {
            1.0
        }

        fn rotation(&self) -> Quat {
            self.rotation
        }

        fn set_rotation(&mut self, rotation: Quat) {
            self.rotation = rotation;
        }

        fn move_character(&mut self, displacement: Vec3, contacts: &mut Vec<ContactPoint>) {
            self.position += displacement;
            self.grounded = self.position.y <= 1.0;
            if self.grounded {
                self.position.y = 1.0;
                contacts.push(ContactPoint::new(
                    Vec3::new(self.position.x, 0.0, self.position.z),
                    Vec3::Y,
                ));
            }
        }

        fn is_grounded(&self) -> bool {
            self.grounded
        }
    }

    fn forward() -> InputSnapshot {
        let mut input = InputSnapshot::default();
        input.set_move(0.0, 1.0);
        input
    }

    fn engine(config: LocomotionConfig) -> LocomotionEngine {
        LocomotionEngine::new(config).unwrap()
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = LocomotionConfig::default().with_speeds(-1.0, 5.0);
        assert!(LocomotionEngine::new(config).is_err());
    }

    #[test]
    fn zero_dt_is_a_no_op() {
        let mut engine = engine(LocomotionConfig::default());
        let mut body = FlatGround::standing();
        engine.tick(&mut body, &forward(), MovementMode::Strafing, None, 0.1);
        let _ = engine.drain_events().count();
        let before = (*engine.velocity(), *engine.stamina(), engine.clock());

        let report = engine.tick(&mut body, &forward(), MovementMode::Strafing, None, 0.0);
        engine.tick(&mut body, &forward(), MovementMode::Strafing, None, -1.0);
        engine.tick(&mut body, &forward(), MovementMode::Strafing, None, f32::NAN);

        assert_eq!(report.displacement, Vec3::ZERO);
        assert_eq!((*engine.velocity(), *engine.stamina(), engine.clock()), before);
        assert_eq!(engine.drain_events().count(), 0);
    }

    #[test]
    fn walks_forward_along_negative_z() {
        let mut engine = engine(LocomotionConfig::default());
        let mut body = FlatGround::standing();
        for _ in 0..10 {
            engine.tick(&mut body, &forward(), MovementMode::Strafing, None, 0.1);
        }
        assert_eq!(engine.velocity().local.z, 5.0);
        assert!(body.position.z < -1.0);
        assert!(body.position.x.abs() < 1e-5);
        assert!(engine.is_grounded());
        assert!(!engine.is_airborne());
    }

    #[test]
    fn camera_axis_turns_while_strafing() {
        let config = LocomotionConfig {
            yaw_speed: 100.0,
            ..default()
        };
        let mut engine = engine(config);
        let mut body = FlatGround::standing();
        let input = InputSnapshot {
            camera_x: 1.0,
            ..default()
        };

        let report = engine.tick(&mut body, &input, MovementMode::Strafing, None, 0.1);

        assert!((report.rotation_delta - 10.0).abs() < 1e-3);
        assert!((crate::velocity::heading_degrees(body.rotation) - 10.0).abs() < 1e-3);
    }

    #[test]
    fn lock_target_pulls_facing() {
        let mut engine = engine(LocomotionConfig::default());
        let mut body = FlatGround::standing();
        let target = Some(Vec3::new(10.0, 1.0, 0.0));

        let first = engine.tick(&mut body, &InputSnapshot::NEUTRAL, MovementMode::Strafing, target, 0.05);
        assert!(first.rotation_delta > 0.0);
        for _ in 0..60 {
            engine.tick(&mut body, &InputSnapshot::NEUTRAL, MovementMode::Strafing, target, 0.05);
        }
        assert!((crate::velocity::heading_degrees(body.rotation) - 90.0).abs() < 0.5);
    }

    #[test]
    fn move_toward_faces_input_and_drops_side_speed() {
        let mut engine = engine(LocomotionConfig::default());
        let mut body = FlatGround::standing();
        let mut input = InputSnapshot::default();
        input.set_move(1.0, 0.0);

        let report = engine.tick(&mut body, &input, MovementMode::MoveToward, None, 0.1);

        // yaw_speed * dt saturates the lerp, so the turn completes at once.
        assert!((report.rotation_delta - 90.0).abs() < 1e-2);
        assert_eq!(engine.velocity().local.x, 0.0);
        assert!(engine.velocity().local.z > 0.0);
    }

    #[test]
    fn airborne_character_falls_in_global_velocity() {
        let mut engine = engine(LocomotionConfig::default());
        let mut body = FlatGround::floating(50.0);

        engine.tick(&mut body, &InputSnapshot::NEUTRAL, MovementMode::Strafing, None, 0.1);

        assert_eq!(engine.velocity().local, Vec3::ZERO);
        assert!(engine.velocity().global.y < 0.0);
        assert!(engine.is_airborne());
        assert!(body.position.y < 50.0);
    }

    #[test]
    fn falling_speed_is_capped() {
        let config = LocomotionConfig {
            max_falling_speed: 20.0,
            ..default()
        };
        let mut engine = engine(config);
        let mut body = FlatGround::floating(10_000.0);
        for _ in 0..100 {
            engine.tick(&mut body, &InputSnapshot::NEUTRAL, MovementMode::Strafing, None, 0.1);
        }
        assert!(engine.velocity().global.y >= -20.0 - 1e-3);
    }

    #[test]
    fn added_velocity_skips_gravity_once() {
        let mut engine = engine(LocomotionConfig::default());
        let mut body = FlatGround::standing();
        engine.tick(&mut body, &InputSnapshot::NEUTRAL, MovementMode::Strafing, None, 0.1);

        let resting = engine.velocity().local.y;
        engine.add_global_velocity(Vec3::new(0.0, 8.0, 0.0));
        assert!((engine.velocity().local.y - (resting + 8.0)).abs() < 1e-5);
        engine.tick(&mut body, &InputSnapshot::NEUTRAL, MovementMode::Strafing, None, 0.1);

        // The launch survives the grounded tick and lifts the body.
        assert!(body.position.y > 1.0);
        assert!(!engine.is_grounded());
        assert!(engine.velocity().global.y > 5.0);
    }

    #[test]
    fn running_drains_stamina_and_notifies_edges() {
        let config = LocomotionConfig::default().with_stamina(crate::config::StaminaConfig {
            max: 10.0,
            consumption: 10.0,
            regeneration: 1.0,
            min_to_end_exhaustion: 5.0,
        });
        let mut engine = engine(config);
        let mut body = FlatGround::standing();
        let input = InputSnapshot {
            running: true,
            ..forward()
        };

        engine.tick(&mut body, &input, MovementMode::Strafing, None, 0.1);
        assert!(engine.is_running());
        assert!((engine.stamina().current() - 9.0).abs() < 1e-4);

        for _ in 0..12 {
            engine.tick(&mut body, &input, MovementMode::Strafing, None, 0.1);
        }
        assert!(engine.is_exhausted());
        assert!(!engine.is_running());

        let events: Vec<_> = engine.drain_events().collect();
        let starts = events
            .iter()
            .filter(|e| **e == LocomotionEvent::ConsumptionChanged(true))
            .count();
        let stops = events
            .iter()
            .filter(|e| **e == LocomotionEvent::ConsumptionChanged(false))
            .count();
        assert_eq!((starts, stops), (1, 1));
        assert!(events.contains(&LocomotionEvent::ExhaustionChanged(true)));
    }

    #[test]
    fn frozen_stamina_blocks_running() {
        let mut engine = engine(LocomotionConfig::default());
        let mut body = FlatGround::standing();
        engine.freeze_stamina(true);
        let input = InputSnapshot {
            running: true,
            ..forward()
        };
        engine.tick(&mut body, &input, MovementMode::Strafing, None, 0.1);
        assert!(!engine.is_running());
        assert_eq!(engine.stamina().current(), 100.0);
    }

    #[test]
    fn stagger_ignores_input_and_can_be_stopped() {
        let mut engine = engine(LocomotionConfig::default());
        let mut body = FlatGround::standing();
        engine.start_stagger(5.0);

        let mut input = forward();
        input.camera_x = 1.0;
        let report = engine.tick(&mut body, &input, MovementMode::Strafing, None, 0.1);

        assert_eq!(report.rotation_delta, 0.0);
        assert_eq!(engine.velocity().local.z, 0.0);
        assert!(engine.is_staggered());

        engine.stop_stagger();
        assert!(!engine.is_staggered());
        assert_eq!(engine.stagger_deadline(), None);
        let events: Vec<_> = engine.drain_events().collect();
        assert!(events.contains(&LocomotionEvent::StaggerChanged(true)));
        assert!(events.contains(&LocomotionEvent::StaggerChanged(false)));
    }

    #[test]
    fn global_modifier_scales_target_speed() {
        let mut engine = engine(LocomotionConfig::default());
        engine.set_global_modifier(0.5);
        engine.set_global_modifier(-1.0);
        assert_eq!(engine.global_modifier(), 0.5);

        let mut body = FlatGround::standing();
        for _ in 0..10 {
            engine.tick(&mut body, &forward(), MovementMode::Strafing, None, 0.1);
        }
        assert_eq!(engine.velocity().local.z, 2.5);
    }

    #[test]
    fn nullify_clears_everything() {
        let mut engine = engine(LocomotionConfig::default());
        let mut body = FlatGround::standing();
        for _ in 0..3 {
            engine.tick(&mut body, &forward(), MovementMode::Strafing, None, 0.1);
        }
        engine.nullify_velocity();
        assert_eq!(*engine.velocity(), VelocityState::default());
    }

    #[test]
    fn export_reports_walk_band_and_flags() {
        let mut engine = engine(LocomotionConfig::default());
        let mut body = FlatGround::standing();
        for _ in 0..10 {
            engine.tick(&mut body, &forward(), MovementMode::Strafing, None, 0.1);
        }

        let mut sink = AnimatorParameters::default();
        engine.export_animation(&mut sink);

        assert_eq!(sink.float(params::Z_VELOCITY), Some(1.0));
        assert_eq!(sink.float(params::X_VELOCITY), Some(0.0));
        assert_eq!(sink.bool(params::IS_MOVING), Some(true));
        assert_eq!(sink.bool(params::IS_AIRBORNE), Some(false));
        assert_eq!(sink.bool(params::IS_SLIPING), Some(false));
        assert_eq!(sink.float(params::SLOPE_ANGLE), Some(0.0));
        assert_eq!(sink.float(params::LAST_AIRBORNE_Y_VELOCITY), None);
    }

    #[test]
    fn raw_mode_falls_back_to_neutral() {
        let mut character = CharacterLocomotion::new(engine(LocomotionConfig::default()));
        character.intent = forward();
        character.set_raw_mode(9);
        assert_eq!(character.mode, None);

        let mut body = FlatGround::standing();
        character.drive(&mut body, None, 0.1);
        assert_eq!(character.engine.velocity().local.z, 0.0);

        character.set_raw_mode(1);
        assert_eq!(character.mode, Some(MovementMode::MoveToward));
    }
}
