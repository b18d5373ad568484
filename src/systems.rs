//! Core plugin systems.
//!
//! These systems are independent of the physics engine. Everything that needs
//! scene queries or a capsule body lives in the backend and is handed the
//! helpers defined here ([`LockOnParams`]).

use bevy::ecs::system::SystemParam;
use bevy::input::mouse::AccumulatedMouseMotion;
use bevy::prelude::*;

use crate::animation::AnimatorParameters;
use crate::backend::SceneQuery;
use crate::camera::{FpsCamera, OrbitCamera, OrbitFrame};
use crate::config::{LocomotionConfig, MovementMode};
use crate::error::ConfigError;
use crate::events::{
    HardLanding, JustSubscribed, LocomotionEvent, LockOnTargetChanged, StaggerChanged,
    StaminaChanged, StaminaConsumptionChanged, StaminaExhaustionChanged, Subscription,
};
use crate::intent::{InputProfile, InputSnapshot, PlayerControls};
use crate::locomotion::{CharacterLocomotion, LocomotionEngine};
use crate::nav_agent::{NavAgentLocomotion, SteeringAgent};
use crate::state::{Airborne, Exhausted, Grounded, Running, Sliding, Staggered};
use crate::targeting::{CameraView, Candidate, LockOnCandidate, LockOnChange, ViewFrustum};
use crate::velocity::heading_degrees;

/// Build the engine of every character whose config was just added.
///
/// A config that does not validate is logged and the character gets no
/// engine, so nothing moves it.
pub fn initialize_locomotion(
    mut commands: Commands,
    q_new: Query<(Entity, &LocomotionConfig, Has<AnimatorParameters>), Added<LocomotionConfig>>,
) {
    for (entity, config, has_params) in &q_new {
        match LocomotionEngine::new(config.clone()) {
            Ok(engine) => {
                let mut entity_commands = commands.entity(entity);
                entity_commands.insert(CharacterLocomotion::new(engine));
                if !has_params {
                    entity_commands.insert(AnimatorParameters::default());
                }
            }
            Err(err) => error!("character {entity} disabled: {err}"),
        }
    }
}

/// Push edited configs into running engines.
pub fn apply_config_changes(
    mut q_changed: Query<(Entity, &LocomotionConfig, &mut CharacterLocomotion), Changed<LocomotionConfig>>,
) {
    for (entity, config, mut character) in &mut q_changed {
        if character.engine.config() == config {
            continue;
        }
        if let Err(err) = character.engine.reconfigure(config.clone()) {
            error!("character {entity} keeps its previous config: {err}");
        }
    }
}

/// Flag player controls whose camera entity is missing or carries no camera.
///
/// Controls recover once their camera shows up.
pub fn validate_player_controls(
    mut q_controls: Query<(Entity, &mut PlayerControls)>,
    q_cameras: Query<(), Or<(With<OrbitCamera>, With<FpsCamera>)>>,
) {
    for (entity, mut controls) in &mut q_controls {
        let degraded = !q_cameras.contains(controls.camera);
        if degraded == controls.degraded {
            continue;
        }
        if degraded {
            let err = ConfigError::MissingCollaborator {
                what: "camera rig",
                entity: controls.camera,
            };
            error!("player {entity} receives no input: {err}");
        } else {
            info!("player {entity} found its camera");
        }
        controls.bypass_change_detection().degraded = degraded;
    }
}

/// Read devices into each player's [`InputSnapshot`].
///
/// Missing input resources read as no input, so headless apps run without the
/// input plugin.
pub fn gather_player_input(
    keys: Option<Res<ButtonInput<KeyCode>>>,
    mouse_buttons: Option<Res<ButtonInput<MouseButton>>>,
    mouse_motion: Option<Res<AccumulatedMouseMotion>>,
    gamepads: Query<&Gamepad>,
    mut q_players: Query<(&PlayerControls, &mut InputSnapshot)>,
) {
    for (controls, mut snapshot) in &mut q_players {
        if !controls.is_active() {
            if *snapshot != InputSnapshot::NEUTRAL {
                *snapshot = InputSnapshot::NEUTRAL;
            }
            continue;
        }

        let mut next = InputSnapshot::NEUTRAL;
        match controls.profile {
            InputProfile::Keyboard => {
                if let Some(keys) = keys.as_deref() {
                    let axis = |negative: KeyCode, positive: KeyCode| {
                        f32::from(u8::from(keys.pressed(positive)))
                            - f32::from(u8::from(keys.pressed(negative)))
                    };
                    next.set_move(axis(KeyCode::KeyA, KeyCode::KeyD), axis(KeyCode::KeyS, KeyCode::KeyW));
                    next.running = keys.pressed(KeyCode::ShiftLeft);
                    next.jump = keys.just_pressed(KeyCode::Space);
                }
                if let Some(motion) = mouse_motion.as_deref() {
                    let delta = motion.delta * controls.mouse_sensitivity;
                    next.set_camera(delta.x, -delta.y);
                }
                if let Some(buttons) = mouse_buttons.as_deref() {
                    next.lock_on = buttons.pressed(MouseButton::Right);
                }
            }
            InputProfile::Gamepad => {
                if let Some(gamepad) = gamepads.iter().next() {
                    let stick = gamepad.left_stick();
                    next.set_move(stick.x, stick.y);
                    let look = gamepad.right_stick();
                    next.set_camera(look.x, look.y);
                    next.running = gamepad.pressed(GamepadButton::LeftTrigger);
                    next.jump = gamepad.just_pressed(GamepadButton::South);
                    next.lock_on = gamepad.pressed(GamepadButton::RightThumb);
                }
            }
        }

        if *snapshot != next {
            *snapshot = next;
        }
    }
}

/// Find the input driving `camera`, neutral when no active player owns it.
fn camera_input<'a>(
    camera: Entity,
    players: impl IntoIterator<Item = (Entity, &'a PlayerControls, &'a InputSnapshot)>,
) -> Option<(Entity, InputSnapshot)> {
    players
        .into_iter()
        .find(|(_, controls, _)| controls.camera == camera && controls.is_active())
        .map(|(player, _, input)| (player, *input))
}

/// Everything a backend needs to run lock-on acquisition for every camera.
///
/// Backends call [`LockOnParams::run`] from a system in
/// [`LocomotionSet::Targeting`](crate::LocomotionSet::Targeting) with their
/// own [`SceneQuery`].
#[derive(SystemParam)]
pub struct LockOnParams<'w, 's> {
    players: Query<'w, 's, (Entity, &'static PlayerControls, &'static InputSnapshot)>,
    orbit_cameras: Query<
        'w,
        's,
        (
            Entity,
            &'static mut OrbitCamera,
            &'static Transform,
            Option<&'static ViewFrustum>,
        ),
    >,
    fps_cameras: Query<
        'w,
        's,
        (
            Entity,
            &'static mut FpsCamera,
            &'static GlobalTransform,
            Option<&'static ViewFrustum>,
        ),
    >,
    follows: Query<'w, 's, &'static GlobalTransform>,
    candidates: Query<'w, 's, (Entity, &'static GlobalTransform), With<LockOnCandidate>>,
    changes: EventWriter<'w, LockOnTargetChanged>,
}

impl LockOnParams<'_, '_> {
    /// Acquire or release the lock of every camera.
    ///
    /// A camera looks for targets while its player holds the lock-on button;
    /// otherwise its lock is released.
    pub fn run<S: SceneQuery + ?Sized>(&mut self, scene: &S) {
        let candidates: Vec<Candidate> = self
            .candidates
            .iter()
            .map(|(entity, transform)| Candidate::new(entity, transform.translation()))
            .collect();

        for (entity, mut camera, transform, frustum) in &mut self.orbit_cameras {
            let requested = camera_input(entity, &self.players)
                .filter(|(_, input)| input.lock_on)
                .map(|(player, _)| player);
            let Ok(follow) = self.follows.get(camera.follow) else {
                continue;
            };
            let frame = OrbitFrame::new(follow.translation(), heading_degrees(follow.rotation()));
            let view = CameraView::new(
                transform.translation,
                transform.rotation,
                frustum.copied().unwrap_or_default(),
            );
            let offered: Vec<Candidate> = match requested {
                Some(player) => candidates.iter().copied().filter(|c| c.entity != player).collect(),
                None => Vec::new(),
            };
            let change = camera.acquire(requested.map(|_| offered.as_slice()), &view, &frame, scene);
            notify_lock_change(&mut self.changes, entity, change);
        }

        for (entity, mut camera, transform, frustum) in &mut self.fps_cameras {
            let requested = camera_input(entity, &self.players)
                .filter(|(_, input)| input.lock_on)
                .map(|(player, _)| player);
            let view = CameraView::from_transform(transform, frustum.copied().unwrap_or_default());
            let change = match requested {
                Some(player) => {
                    if !camera.acquisition.ignored.contains(&player) {
                        camera.acquisition.ignored.push(player);
                    }
                    let offered: Vec<Candidate> =
                        candidates.iter().copied().filter(|c| c.entity != player).collect();
                    camera.acquire(Some(&offered), &view, scene)
                }
                None => camera.acquire(None, &view, scene),
            };
            notify_lock_change(&mut self.changes, entity, change);
        }
    }
}

fn notify_lock_change(
    writer: &mut EventWriter<LockOnTargetChanged>,
    camera: Entity,
    change: LockOnChange,
) {
    if let LockOnChange::Changed { current, .. } = change {
        debug!("camera {camera} lock-on target is now {current:?}");
        writer.write(LockOnTargetChanged {
            camera,
            target: current,
        });
    }
}

/// Advance orbit cameras and place them around their followed character.
pub fn update_orbit_cameras(
    time: Res<Time>,
    mut q_cameras: Query<(Entity, &mut OrbitCamera, &mut Transform)>,
    q_players: Query<(Entity, &PlayerControls, &InputSnapshot)>,
    q_follows: Query<&GlobalTransform>,
) {
    let dt = time.delta_secs();
    for (entity, mut camera, mut transform) in &mut q_cameras {
        let Ok(follow) = q_follows.get(camera.follow) else {
            continue;
        };
        let input = camera_input(entity, &q_players)
            .map(|(_, input)| input)
            .unwrap_or(InputSnapshot::NEUTRAL);
        let lock_target = camera
            .locked()
            .and_then(|target| q_follows.get(target).ok())
            .map(|target| target.translation());
        let frame = OrbitFrame::new(follow.translation(), heading_degrees(follow.rotation()));

        camera.advance(&input, lock_target, &frame, dt);
        *transform = camera.camera_transform(&frame);
    }
}

/// Pitch first person cameras.
pub fn update_fps_cameras(
    time: Res<Time>,
    mut q_cameras: Query<(Entity, &mut FpsCamera, &mut Transform, &GlobalTransform)>,
    q_players: Query<(Entity, &PlayerControls, &InputSnapshot)>,
    q_targets: Query<&GlobalTransform, Without<FpsCamera>>,
) {
    let dt = time.delta_secs();
    for (entity, mut camera, mut transform, global) in &mut q_cameras {
        let input = camera_input(entity, &q_players)
            .map(|(_, input)| input)
            .unwrap_or(InputSnapshot::NEUTRAL);
        let lock_target = camera
            .locked()
            .and_then(|target| q_targets.get(target).ok())
            .map(|target| target.translation());

        camera.advance(&input, lock_target, global.translation(), dt);
        transform.rotation = camera.local_rotation();
    }
}

/// Hand each player's input, movement mode and lock target to its character.
///
/// Move-toward characters receive input relative to their camera's yaw.
pub fn route_player_intent(
    mut q_players: Query<(&PlayerControls, &InputSnapshot, &Transform, &mut CharacterLocomotion)>,
    q_cameras: Query<(&Transform, Option<&OrbitCamera>, Option<&FpsCamera>), Without<CharacterLocomotion>>,
) {
    for (controls, input, body, mut character) in &mut q_players {
        if !controls.is_active() {
            character.intent = InputSnapshot::NEUTRAL;
            character.lock_target = None;
            continue;
        }

        let Ok((camera_transform, orbit, fps)) = q_cameras.get(controls.camera) else {
            character.intent = InputSnapshot::NEUTRAL;
            character.lock_target = None;
            continue;
        };

        // A first person camera turns with its character.
        let view_rotation = if fps.is_some() {
            body.rotation
        } else {
            camera_transform.rotation
        };
        character.intent = match controls.movement_mode {
            MovementMode::MoveToward => input.view_relative(view_rotation),
            MovementMode::Strafing => *input,
        };
        character.mode = Some(controls.movement_mode);
        character.lock_target = orbit
            .and_then(OrbitCamera::locked)
            .or_else(|| fps.and_then(FpsCamera::locked));
    }
}

/// Event writers for everything a [`LocomotionEngine`] reports.
#[derive(SystemParam)]
pub struct LocomotionEventWriters<'w> {
    stamina: EventWriter<'w, StaminaChanged>,
    exhaustion: EventWriter<'w, StaminaExhaustionChanged>,
    consumption: EventWriter<'w, StaminaConsumptionChanged>,
    hard_landing: EventWriter<'w, HardLanding>,
    stagger: EventWriter<'w, StaggerChanged>,
}

/// Drain engine notifications into Bevy events.
pub fn forward_locomotion_events(
    mut q_characters: Query<(Entity, &mut CharacterLocomotion)>,
    mut writers: LocomotionEventWriters,
) {
    for (entity, mut character) in &mut q_characters {
        for event in character.engine.drain_events() {
            match event {
                LocomotionEvent::StaminaChanged(stamina) => {
                    writers.stamina.write(StaminaChanged { entity, stamina });
                }
                LocomotionEvent::ExhaustionChanged(exhausted) => {
                    writers
                        .exhaustion
                        .write(StaminaExhaustionChanged { entity, exhausted });
                }
                LocomotionEvent::ConsumptionChanged(consuming) => {
                    writers
                        .consumption
                        .write(StaminaConsumptionChanged { entity, consuming });
                }
                LocomotionEvent::HardLanding {
                    callback,
                    vertical_speed,
                } => {
                    writers.hard_landing.write(HardLanding {
                        entity,
                        callback,
                        vertical_speed,
                    });
                }
                LocomotionEvent::StaggerChanged(staggered) => {
                    writers.stagger.write(StaggerChanged { entity, staggered });
                }
            }
        }
    }
}

/// Copy each engine's animation state into its [`AnimatorParameters`].
pub fn export_animation(mut q_characters: Query<(&CharacterLocomotion, &mut AnimatorParameters)>) {
    for (character, mut params) in &mut q_characters {
        if character.engine.config().export_animation {
            character.engine.export_animation(&mut *params);
        }
    }
}

fn set_marker<T: Component + Default>(commands: &mut Commands, entity: Entity, wanted: bool, present: bool) {
    if wanted && !present {
        commands.entity(entity).insert(T::default());
    } else if !wanted && present {
        commands.entity(entity).remove::<T>();
    }
}

/// Sync state marker components with the engine flags.
pub fn sync_state_markers(
    mut commands: Commands,
    q_characters: Query<(
        Entity,
        &CharacterLocomotion,
        Has<Grounded>,
        Has<Airborne>,
        Has<Sliding>,
        Has<Running>,
        Has<Exhausted>,
        Has<Staggered>,
    )>,
) {
    for (entity, character, grounded, airborne, sliding, running, exhausted, staggered) in
        &q_characters
    {
        let engine = &character.engine;
        set_marker::<Grounded>(&mut commands, entity, engine.is_grounded(), grounded);
        set_marker::<Airborne>(&mut commands, entity, engine.is_airborne(), airborne);
        set_marker::<Sliding>(&mut commands, entity, engine.is_sliding(), sliding);
        set_marker::<Running>(&mut commands, entity, engine.is_running(), running);
        set_marker::<Exhausted>(&mut commands, entity, engine.is_exhausted(), exhausted);
        set_marker::<Staggered>(&mut commands, entity, engine.is_staggered(), staggered);
    }
}

/// Greet every new or retargeted [`Subscription`].
pub fn announce_subscriptions(
    q_subscriptions: Query<(Entity, &Subscription), Changed<Subscription>>,
    mut writer: EventWriter<JustSubscribed>,
) {
    for (subscriber, subscription) in &q_subscriptions {
        writer.write(JustSubscribed {
            subscriber,
            source: subscription.source,
            topic: subscription.topic,
        });
    }
}

/// Entity a nav agent turns to face once it reaches its destination.
#[derive(Component, Reflect, Debug, Clone, Copy, PartialEq, Eq)]
#[reflect(Component)]
pub struct NavLookAt(pub Entity);

/// Step steering agents and export their animation parameters.
pub fn update_nav_agents(
    time: Res<Time>,
    mut q_agents: Query<(
        &mut SteeringAgent,
        &mut NavAgentLocomotion,
        &Transform,
        &mut AnimatorParameters,
    )>,
) {
    let dt = time.delta_secs();
    for (mut agent, mut locomotion, transform, mut params) in &mut q_agents {
        if locomotion.is_enabled() {
            agent.step(dt);
        }
        locomotion.update(
            &*agent,
            transform.translation,
            transform.rotation,
            dt,
            &mut *params,
        );
    }
}

/// Snap nav agent transforms onto their agents.
pub fn apply_nav_agent_positions(
    time: Res<Time>,
    mut q_agents: Query<(
        &SteeringAgent,
        &mut NavAgentLocomotion,
        &mut Transform,
        Option<&NavLookAt>,
    )>,
    q_targets: Query<&GlobalTransform>,
) {
    let dt = time.delta_secs();
    for (agent, mut locomotion, mut transform, look_at) in &mut q_agents {
        if !locomotion.is_enabled() {
            continue;
        }
        if let Some(NavLookAt(target)) = look_at {
            let position = q_targets.get(*target).ok().map(GlobalTransform::translation);
            locomotion.set_look_at_target(position);
        }
        let (position, rotation) = locomotion.apply_position(agent, transform.rotation, dt);
        transform.translation = position;
        transform.rotation = rotation;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn camera_input_needs_an_active_owner() {
        let camera = Entity::from_raw(10);
        let player = Entity::from_raw(1);
        let mut controls = PlayerControls::new(camera);
        let input = InputSnapshot {
            lock_on: true,
            ..default()
        };

        let found = camera_input(camera, [(player, &controls, &input)]);
        assert_eq!(found, Some((player, input)));

        assert_eq!(camera_input(Entity::from_raw(11), [(player, &controls, &input)]), None);

        controls.enabled = false;
        assert_eq!(camera_input(camera, [(player, &controls, &input)]), None);
    }
}
