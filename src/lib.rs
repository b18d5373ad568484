//! # `action_locomotion`
//!
//! Third-person action locomotion for Bevy with a physics backend abstraction.
//!
//! This crate provides:
//! - A capsule character engine with strafing and move-toward modes, air
//!   control, jumping, running with stamina, slope sliding and staggers
//! - An orbit camera and a first person camera, both with lock-on targeting
//! - A bridge that turns a navigation agent's motion into animation
//!   parameters and applies its position back to the character
//! - Animation parameter export through [`animation::AnimationSink`]
//! - Physics backend abstraction (Rapier3D included)
//!
//! ## Architecture
//!
//! Every frame runs in five ordered phases ([`LocomotionSet`]):
//! 1. **Input**: engines are created from configs and devices are read
//! 2. **Targeting**: the backend raycasts lock-on candidates
//! 3. **Camera**: cameras move, then players' intent is routed to characters
//! 4. **Movement**: the backend ticks each engine against its capsule
//! 5. **Export**: events, animation parameters and state markers
//!
//! ## Usage
//!
//! ```rust
//! use bevy::prelude::*;
//! use action_locomotion::prelude::*;
//!
//! let config = LocomotionConfig::player().with_jump(10.6);
//! assert!(config.validate().is_ok());
//!
//! // Spawn the config next to a backend capsule; the plugin builds the engine.
//! ```

use bevy::prelude::*;

pub mod animation;
pub mod backend;
pub mod camera;
pub mod collision;
pub mod config;
pub mod detection;
pub mod error;
pub mod events;
pub mod intent;
pub mod locomotion;
pub mod nav_agent;
pub mod stamina;
pub mod state;
pub mod systems;
pub mod targeting;
pub mod velocity;

#[cfg(feature = "rapier3d")]
pub mod rapier;

pub mod prelude {
    //! Convenient re-exports for common usage.

    pub use crate::animation::{AnimationSink, AnimatorParameters};
    pub use crate::backend::{CharacterPhysics, CharacterPhysicsBackend, NoPhysicsBackend, SceneQuery};
    pub use crate::camera::{FadeConfig, FpsCamera, OrbitCamera, RotationType};
    pub use crate::config::{
        LandingConfig, LocomotionConfig, ModifierConfig, MovementMode, SlideConfig, StaminaConfig,
    };
    pub use crate::error::ConfigError;
    pub use crate::events::{
        HardLanding, JustSubscribed, LockOnTargetChanged, StaggerChanged, StaminaChanged,
        StaminaConsumptionChanged, StaminaExhaustionChanged, Subscription, SubscriptionTopic,
    };
    pub use crate::intent::{InputProfile, InputSnapshot, PlayerControls};
    pub use crate::locomotion::{CharacterLocomotion, LocomotionEngine};
    pub use crate::nav_agent::{NavAgentConfig, NavAgentLocomotion, NavPath, SteeringAgent};
    pub use crate::state::{Airborne, Exhausted, Grounded, Running, Sliding, Staggered};
    pub use crate::systems::NavLookAt;
    pub use crate::targeting::{LockOnCandidate, ViewFrustum};
    pub use crate::{LocomotionPlugin, LocomotionSet};

    #[cfg(feature = "rapier3d")]
    pub use crate::rapier::{Rapier3dBackend, RapierCharacterBundle};
}

/// Frame phases of the locomotion plugin, run in order in `Update`.
#[derive(SystemSet, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LocomotionSet {
    Input,
    Targeting,
    Camera,
    Movement,
    Export,
}

/// Main plugin for locomotion, cameras and nav agents.
///
/// This plugin is generic over a physics backend `B` which provides the
/// actual physics operations (capsule moves, raycasts).
///
/// # Type Parameters
/// - `B`: The physics backend implementation (e.g., `Rapier3dBackend`)
///
/// # Examples
///
/// With Rapier3D backend:
/// ```rust,no_run
/// use bevy::prelude::*;
/// use bevy_rapier3d::prelude::*;
/// use action_locomotion::prelude::*;
///
/// App::new()
///     .add_plugins(DefaultPlugins)
///     .add_plugins(RapierPhysicsPlugin::<NoUserData>::default())
///     .add_plugins(LocomotionPlugin::<Rapier3dBackend>::default())
///     .run();
/// ```
pub struct LocomotionPlugin<B: backend::CharacterPhysicsBackend> {
    _marker: std::marker::PhantomData<B>,
}

impl<B: backend::CharacterPhysicsBackend> Default for LocomotionPlugin<B> {
    fn default() -> Self {
        Self {
            _marker: std::marker::PhantomData,
        }
    }
}

impl<B: backend::CharacterPhysicsBackend> Plugin for LocomotionPlugin<B> {
    fn build(&self, app: &mut App) {
        // Register core types
        app.register_type::<config::LocomotionConfig>();
        app.register_type::<config::MovementMode>();
        app.register_type::<intent::InputSnapshot>();
        app.register_type::<intent::PlayerControls>();
        app.register_type::<camera::OrbitCamera>();
        app.register_type::<camera::FpsCamera>();
        app.register_type::<targeting::LockOnCandidate>();
        app.register_type::<targeting::ViewFrustum>();
        app.register_type::<animation::AnimatorParameters>();
        app.register_type::<events::Subscription>();
        app.register_type::<nav_agent::SteeringAgent>();
        app.register_type::<nav_agent::NavAgentLocomotion>();
        app.register_type::<systems::NavLookAt>();
        app.register_type::<state::Grounded>();
        app.register_type::<state::Airborne>();
        app.register_type::<state::Sliding>();
        app.register_type::<state::Running>();
        app.register_type::<state::Exhausted>();
        app.register_type::<state::Staggered>();

        app.add_event::<events::StaminaChanged>();
        app.add_event::<events::StaminaExhaustionChanged>();
        app.add_event::<events::StaminaConsumptionChanged>();
        app.add_event::<events::HardLanding>();
        app.add_event::<events::StaggerChanged>();
        app.add_event::<events::LockOnTargetChanged>();
        app.add_event::<events::JustSubscribed>();

        app.configure_sets(
            Update,
            (
                LocomotionSet::Input,
                LocomotionSet::Targeting,
                LocomotionSet::Camera,
                LocomotionSet::Movement,
                LocomotionSet::Export,
            )
                .chain(),
        );

        // Add the physics backend plugin
        app.add_plugins(B::plugin());

        app.add_systems(
            Update,
            (
                systems::initialize_locomotion,
                systems::apply_config_changes,
                systems::validate_player_controls,
                systems::gather_player_input,
            )
                .chain()
                .in_set(LocomotionSet::Input),
        );

        // Cameras move first so move-toward input follows this frame's view
        app.add_systems(
            Update,
            (
                (systems::update_orbit_cameras, systems::update_fps_cameras),
                systems::route_player_intent,
            )
                .chain()
                .in_set(LocomotionSet::Camera),
        );

        app.add_systems(
            Update,
            (systems::update_nav_agents, systems::apply_nav_agent_positions)
                .chain()
                .in_set(LocomotionSet::Movement),
        );

        app.add_systems(
            Update,
            (
                systems::forward_locomotion_events,
                systems::export_animation,
                systems::sync_state_markers,
                systems::announce_subscriptions,
            )
                .in_set(LocomotionSet::Export),
        );
    }
}
