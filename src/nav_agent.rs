//! Navigation agent locomotion.
//!
//! A path-following agent owns the authoritative position of an NPC; this
//! module turns the agent's motion into the same animation parameters a
//! [`LocomotionEngine`](crate::locomotion::LocomotionEngine) exports, and
//! snaps the visual transform onto the agent.
//!
//! The pathfinder itself sits behind [`NavPath`]. [`SteeringAgent`] is a
//! straight-line implementation for open ground and tests.

use bevy::prelude::*;

use crate::animation::{params, speed_band, AnimationSink};
use crate::error::{ensure_non_negative, ensure_positive, ConfigError};
use crate::velocity::{flat_look_rotation, signed_yaw_delta};

/// Below this frame time the measured velocity is kept from the last frame.
const MIN_DELTA_TIME: f32 = 1e-5;

/// Path-following agent that owns an NPC's position.
pub trait NavPath {
    fn set_destination(&mut self, destination: Vec3);

    /// Distance left along the current path.
    fn remaining_distance(&self) -> f32;

    fn radius(&self) -> f32;

    /// Position the agent simulated for this frame.
    fn next_position(&self) -> Vec3;

    /// Velocity the agent wants to travel at, zero when idle.
    fn desired_velocity(&self) -> Vec3;

    fn speed(&self) -> f32;

    fn set_speed(&mut self, speed: f32);

    /// Turn rate in degrees per second.
    fn angular_speed(&self) -> f32;

    fn set_angular_speed(&mut self, degrees_per_second: f32);

    /// Teleport the agent. Returns `false` when the point is unreachable.
    fn warp(&mut self, position: Vec3) -> bool;

    fn set_stopped(&mut self, stopped: bool);
}

/// Straight-line agent with no obstacle avoidance.
#[derive(Component, Reflect, Debug, Clone, PartialEq)]
#[reflect(Component)]
pub struct SteeringAgent {
    pub radius: f32,
    /// The agent stops once it is this close to the destination.
    pub stopping_distance: f32,
    speed: f32,
    angular_speed: f32,
    position: Vec3,
    destination: Option<Vec3>,
    velocity: Vec3,
    stopped: bool,
}

impl SteeringAgent {
    pub fn new(position: Vec3) -> Self {
        Self {
            radius: 0.5,
            stopping_distance: 0.05,
            speed: 3.5,
            angular_speed: 120.0,
            position,
            destination: None,
            velocity: Vec3::ZERO,
            stopped: false,
        }
    }

    pub fn destination(&self) -> Option<Vec3> {
        self.destination
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Advance along the path by `dt` seconds.
    pub fn step(&mut self, dt: f32) {
        self.velocity = Vec3::ZERO;
        if self.stopped || !dt.is_finite() || dt <= 0.0 {
            return;
        }
        let Some(destination) = self.destination else {
            return;
        };
        let to_destination = destination - self.position;
        let distance = to_destination.length();
        if distance <= self.stopping_distance {
            return;
        }
        let direction = to_destination / distance;
        let travel = (self.speed * dt).min(distance);
        self.position += direction * travel;
        self.velocity = direction * self.speed;
    }
}

impl Default for SteeringAgent {
    fn default() -> Self {
        Self::new(Vec3::ZERO)
    }
}

impl NavPath for SteeringAgent {
    fn set_destination(&mut self, destination: Vec3) {
        self.destination = Some(destination);
    }

    fn remaining_distance(&self) -> f32 {
        self.destination
            .map_or(0.0, |destination| destination.distance(self.position))
    }

    fn radius(&self) -> f32 {
        self.radius
    }

    fn next_position(&self) -> Vec3 {
        self.position
    }

    fn desired_velocity(&self) -> Vec3 {
        self.velocity
    }

    fn speed(&self) -> f32 {
        self.speed
    }

    fn set_speed(&mut self, speed: f32) {
        self.speed = speed.max(0.0);
    }

    fn angular_speed(&self) -> f32 {
        self.angular_speed
    }

    fn set_angular_speed(&mut self, degrees_per_second: f32) {
        self.angular_speed = degrees_per_second.max(0.0);
    }

    fn warp(&mut self, position: Vec3) -> bool {
        if !position.is_finite() {
            return false;
        }
        self.position = position;
        self.velocity = Vec3::ZERO;
        true
    }

    fn set_stopped(&mut self, stopped: bool) {
        self.stopped = stopped;
    }
}

/// Tuning of a [`NavAgentLocomotion`].
#[derive(Reflect, Debug, Clone, Copy, PartialEq)]
pub struct NavAgentConfig {
    pub walk_speed: f32,
    pub run_speed: f32,
    /// Degrees per second while walking.
    pub angular_walk_speed: f32,
    /// Degrees per second while running.
    pub angular_run_speed: f32,
    /// Slowest normalized velocity still animated as moving.
    pub min_velocity_to_move: f32,
    /// Movement stops animating once the remaining distance is below this
    /// fraction of the agent radius.
    pub min_radius_fraction_to_move: f32,
    /// Smallest yaw change in degrees animated as rotating.
    pub min_rotation: f32,
    /// Within this remaining distance the agent turns to its look-at target.
    pub look_at_distance: f32,
    pub look_at_speed: f32,
}

impl Default for NavAgentConfig {
    fn default() -> Self {
        Self {
            walk_speed: 12.0,
            run_speed: 16.0,
            angular_walk_speed: 160.0,
            angular_run_speed: 210.0,
            min_velocity_to_move: 0.01,
            min_radius_fraction_to_move: 0.45,
            min_rotation: 0.05,
            look_at_distance: 0.5,
            look_at_speed: 5.0,
        }
    }
}

impl NavAgentConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        ensure_positive("walk_speed", self.walk_speed)?;
        ensure_positive("run_speed", self.run_speed)?;
        if self.run_speed <= self.walk_speed {
            return Err(ConfigError::SpeedBands {
                walk: self.walk_speed,
                run: self.run_speed,
            });
        }
        ensure_non_negative("angular_walk_speed", self.angular_walk_speed)?;
        ensure_non_negative("angular_run_speed", self.angular_run_speed)?;
        ensure_non_negative("min_velocity_to_move", self.min_velocity_to_move)?;
        ensure_non_negative("min_radius_fraction_to_move", self.min_radius_fraction_to_move)?;
        ensure_non_negative("min_rotation", self.min_rotation)?;
        ensure_non_negative("look_at_distance", self.look_at_distance)?;
        ensure_non_negative("look_at_speed", self.look_at_speed)
    }
}

/// Animation values computed by one [`NavAgentLocomotion::update`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct NavAnimationFrame {
    /// Normalized local velocity, x right and y forward.
    pub velocity: Vec2,
    /// Yaw turned since the previous update in degrees, positive right.
    pub rotation: f32,
    pub moving: bool,
    pub rotating: bool,
    pub running: bool,
}

/// Couples a [`NavPath`] agent to animation and the visual transform.
#[derive(Component, Reflect, Debug, Clone, PartialEq)]
#[reflect(Component)]
pub struct NavAgentLocomotion {
    pub config: NavAgentConfig,
    enabled: bool,
    running: bool,
    /// Agent speed without any speed modifier.
    base_speed: f32,
    base_angular_speed: f32,
    velocity: Vec2,
    previous_rotation: Option<Quat>,
    destination: Option<Vec3>,
    look_at_target: Option<Vec3>,
}

impl NavAgentLocomotion {
    /// Validate `config` and put `agent` at walking speed.
    pub fn new(config: NavAgentConfig, agent: &mut impl NavPath) -> Result<Self, ConfigError> {
        config.validate()?;
        agent.set_speed(config.walk_speed);
        agent.set_angular_speed(config.angular_walk_speed);
        Ok(Self {
            config,
            enabled: true,
            running: false,
            base_speed: config.walk_speed,
            base_angular_speed: config.angular_walk_speed,
            velocity: Vec2::ZERO,
            previous_rotation: None,
            destination: None,
            look_at_target: None,
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn destination(&self) -> Option<Vec3> {
        self.destination
    }

    pub fn look_at_target(&self) -> Option<Vec3> {
        self.look_at_target
    }

    /// Measure the agent's motion relative to the character and export it.
    ///
    /// `position` and `rotation` are the visual transform before this
    /// frame's [`apply_position`](Self::apply_position).
    pub fn update(
        &mut self,
        agent: &impl NavPath,
        position: Vec3,
        rotation: Quat,
        dt: f32,
        sink: &mut impl AnimationSink,
    ) -> NavAnimationFrame {
        if !self.enabled {
            return NavAnimationFrame::default();
        }

        let delta = agent.next_position() - position;
        let local = Vec2::new(
            (rotation * Vec3::X).dot(delta),
            (rotation * Vec3::NEG_Z).dot(delta),
        );

        if dt.is_finite() && dt > MIN_DELTA_TIME {
            self.velocity = self.normalize(local / dt, agent.speed());
        }

        let turned = self
            .previous_rotation
            .map_or(0.0, |previous| signed_yaw_delta(previous, rotation));
        self.previous_rotation = Some(rotation);

        let frame = NavAnimationFrame {
            velocity: self.velocity,
            rotation: turned,
            moving: self.velocity.length() >= self.config.min_velocity_to_move
                && agent.remaining_distance()
                    > agent.radius() * self.config.min_radius_fraction_to_move,
            rotating: turned.abs() > self.config.min_rotation,
            running: self.running,
        };

        sink.set_bool(params::IS_MOVING, frame.moving);
        sink.set_float(params::X_VELOCITY, frame.velocity.x);
        sink.set_float(params::Z_VELOCITY, frame.velocity.y);
        sink.set_bool(params::IS_RUNNING, frame.running);
        sink.set_bool(params::IS_ROTATING, frame.rotating);
        sink.set_float(params::ROTATION, frame.rotation);
        frame
    }

    /// Walking: fraction of the agent speed in `[-1, 1]`. Running: walk band
    /// in `[0, 1]` plus run band up to 2.
    fn normalize(&self, velocity: Vec2, agent_speed: f32) -> Vec2 {
        if self.running {
            let walk = self.config.walk_speed;
            let run_modifier = self.config.run_speed / walk;
            return Vec2::new(
                speed_band(velocity.x, walk, run_modifier).clamp(-2.0, 2.0),
                speed_band(velocity.y, walk, run_modifier).clamp(-2.0, 2.0),
            );
        }
        if agent_speed <= f32::EPSILON {
            return Vec2::ZERO;
        }
        (velocity / agent_speed).clamp(Vec2::NEG_ONE, Vec2::ONE)
    }

    /// Visual transform for this frame: the agent's position, turned toward
    /// travel and, close to the destination, toward the look-at target.
    pub fn apply_position(&self, agent: &impl NavPath, rotation: Quat, dt: f32) -> (Vec3, Quat) {
        let position = agent.next_position();
        if !self.enabled || !dt.is_finite() || dt <= 0.0 {
            return (position, rotation);
        }

        let mut rotation = rotation;
        if let Some(travel) = flat_look_rotation(agent.desired_velocity()) {
            rotation = turn_towards(rotation, travel, (agent.angular_speed() * dt).to_radians());
        }

        if let Some(target) = self.look_at_target {
            if agent.remaining_distance() <= self.config.look_at_distance {
                if let Some(look) = flat_look_rotation(target - position) {
                    let t = (dt * self.config.look_at_speed).clamp(0.0, 1.0);
                    rotation = rotation.slerp(look, t);
                }
            }
        }
        (position, rotation)
    }

    pub fn set_look_at_target(&mut self, target: Option<Vec3>) {
        self.look_at_target = target;
    }

    pub fn set_destination(&mut self, agent: &mut impl NavPath, destination: Vec3) {
        self.destination = Some(destination);
        agent.set_destination(destination);
    }

    /// Make the agent's current visual position its destination.
    pub fn clear_destination(&mut self, agent: &mut impl NavPath, position: Vec3) {
        self.destination = None;
        agent.set_destination(position);
    }

    /// Switch between walk and run speeds, keeping any speed modifier.
    pub fn set_running(&mut self, agent: &mut impl NavPath, running: bool) {
        let modifier = self.current_modifier(agent);
        self.running = running;
        if running {
            self.base_speed = self.config.run_speed;
            self.base_angular_speed = self.config.angular_run_speed;
        } else {
            self.base_speed = self.config.walk_speed;
            self.base_angular_speed = self.config.angular_walk_speed;
        }
        agent.set_speed(self.base_speed * modifier);
        agent.set_angular_speed(self.base_angular_speed * modifier);
    }

    /// Scale the current walk or run speed.
    pub fn apply_speed_modifier(&mut self, agent: &mut impl NavPath, modifier: f32) {
        if !modifier.is_finite() || modifier < 0.0 {
            warn!("ignoring invalid agent speed modifier {modifier}");
            return;
        }
        agent.set_speed(self.base_speed * modifier);
        agent.set_angular_speed(self.base_angular_speed * modifier);
    }

    fn current_modifier(&self, agent: &impl NavPath) -> f32 {
        if self.base_speed <= f32::EPSILON {
            1.0
        } else {
            agent.speed() / self.base_speed
        }
    }

    /// Hand control to or take it back from the agent.
    ///
    /// The agent is warped onto the visual `position` either way; disabling
    /// also clears the destination and stops the agent.
    pub fn set_enabled(&mut self, agent: &mut impl NavPath, position: Vec3, enabled: bool) {
        if !enabled {
            self.clear_destination(agent, position);
        }
        if !agent.warp(position) {
            warn!("could not warp nav agent to {position}");
        }
        agent.set_stopped(!enabled);
        self.enabled = enabled;
    }

    pub fn warp(&mut self, agent: &mut impl NavPath, position: Vec3) -> bool {
        agent.warp(position)
    }
}

/// Rotate `from` toward `to` by at most `max_angle` radians.
fn turn_towards(from: Quat, to: Quat, max_angle: f32) -> Quat {
    let angle = from.angle_between(to);
    if angle <= max_angle || angle <= f32::EPSILON {
        to
    } else {
        from.slerp(to, max_angle / angle)
    }
}
