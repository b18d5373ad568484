//! End-to-end engine scenarios against a scripted capsule.
//!
//! The body lives on a scripted floor (flat, a ramp or a ledge) with an
//! optional ceiling. Every check is made on exact engine state after whole
//! ticks.

use action_locomotion::backend::{CharacterPhysics, RaycastRequest, SceneQuery};
use action_locomotion::collision::{ContactPoint, RayHit};
use action_locomotion::prelude::*;
use bevy::prelude::*;

/// Distance from the capsule center to its feet.
const FOOT: f32 = 1.0;

/// Ground under the scripted body.
#[derive(Clone, Copy)]
enum Floor {
    /// The plane y = 0.
    Flat,
    /// A plane through the origin that descends toward -Z at `degrees`.
    Ramp { degrees: f32 },
    /// The plane y = 0 for z >= `edge`, nothing beyond.
    Ledge { edge: f32 },
}

impl Floor {
    fn normal(self) -> Vec3 {
        match self {
            Floor::Flat | Floor::Ledge { .. } => Vec3::Y,
            Floor::Ramp { degrees } => {
                let radians = degrees.to_radians();
                Vec3::new(0.0, radians.cos(), -radians.sin())
            }
        }
    }

    /// Height of the floor under `point`, if there is floor there.
    fn height_at(self, point: Vec3) -> Option<f32> {
        match self {
            Floor::Flat => Some(0.0),
            Floor::Ramp { degrees } => Some(degrees.to_radians().tan() * point.z),
            Floor::Ledge { edge } => (point.z >= edge).then_some(0.0),
        }
    }
}

/// Capsule of height 2 centered at `position`.
struct ScriptedBody {
    position: Vec3,
    rotation: Quat,
    grounded: bool,
    floor: Floor,
    /// Height of a flat ceiling, if any.
    ceiling: Option<f32>,
    /// Extra contacts reported by every move.
    extra_contacts: Vec<Vec3>,
}

impl ScriptedBody {
    fn standing() -> Self {
        Self::at(FOOT)
    }

    fn at(height: f32) -> Self {
        Self {
            position: Vec3::new(0.0, height, 0.0),
            rotation: Quat::IDENTITY,
            grounded: height <= FOOT,
            floor: Floor::Flat,
            ceiling: None,
            extra_contacts: Vec::new(),
        }
    }

    fn on(mut self, floor: Floor) -> Self {
        self.floor = floor;
        self
    }

    fn with_ceiling(mut self, height: f32) -> Self {
        self.ceiling = Some(height);
        self
    }

    /// Gap between the feet and the floor below them.
    fn clearance(&self) -> Option<f32> {
        self.floor
            .height_at(self.position)
            .map(|height| self.position.y - FOOT - height)
    }
}

impl SceneQuery for ScriptedBody {
    fn raycast_all(&self, request: &RaycastRequest) -> Vec<RayHit> {
        let normal = self.floor.normal();
        let approach = normal.dot(request.direction);
        if approach >= 0.0 {
            return Vec::new();
        }
        let distance = -normal.dot(request.origin) / approach;
        if distance < 0.0 || distance > request.max_distance {
            return Vec::new();
        }
        let point = request.point_at(distance);
        if self.floor.height_at(point).is_none() {
            return Vec::new();
        }
        vec![RayHit::new(distance, point, normal, Entity::from_raw(1))]
    }
}

impl CharacterPhysics for ScriptedBody {
    fn position(&self) -> Vec3 {
        self.position
    }

    fn foot_offset(&self) -> f32 {
        FOOT
    }

    fn rotation(&self) -> Quat {
        self.rotation
    }

    fn set_rotation(&mut self, rotation: Quat) {
        self.rotation = rotation;
    }

    fn move_character(&mut self, displacement: Vec3, contacts: &mut Vec<ContactPoint>) {
        self.position += displacement;

        if let Some(ceiling) = self.ceiling {
            if self.position.y + FOOT > ceiling {
                self.position.y = ceiling - FOOT;
                contacts.push(ContactPoint::new(
                    Vec3::new(self.position.x, ceiling, self.position.z),
                    Vec3::NEG_Y,
                ));
            }
        }

        for normal in &self.extra_contacts {
            contacts.push(ContactPoint::new(self.position - *normal, *normal));
        }

        self.grounded = false;
        if let Some(height) = self.floor.height_at(self.position) {
            if self.position.y - FOOT <= height {
                self.grounded = true;
                self.position.y = height + FOOT;
                contacts.push(ContactPoint::new(
                    Vec3::new(self.position.x, height, self.position.z),
                    self.floor.normal(),
                ));
            }
        }
    }

    fn is_grounded(&self) -> bool {
        self.grounded
    }
}

fn forward() -> InputSnapshot {
    let mut input = InputSnapshot::NEUTRAL;
    input.set_move(0.0, 1.0);
    input
}

fn engine(config: LocomotionConfig) -> LocomotionEngine {
    LocomotionEngine::new(config).expect("valid config")
}

/// Normal of a slope `degrees` steep, facing +X.
fn slope_normal(degrees: f32) -> Vec3 {
    let radians = degrees.to_radians();
    Vec3::new(radians.sin(), radians.cos(), 0.0)
}

// ==================== Velocity Scenarios ====================

#[test]
fn walk_accelerates_in_steps_and_snaps_to_target() {
    let config = LocomotionConfig::default()
        .with_speeds(5.0, 5.0)
        .with_acceleration(20.0, 32.0);
    let mut engine = engine(config);
    let mut body = ScriptedBody::standing();

    let mut speeds = Vec::new();
    for _ in 0..4 {
        engine.tick(&mut body, &forward(), MovementMode::Strafing, None, 0.1);
        speeds.push(engine.velocity().local.z);
    }

    assert_eq!(speeds, vec![2.0, 4.0, 5.0, 5.0]);
}

#[test]
fn release_decelerates_to_exact_stop() {
    let mut engine = engine(LocomotionConfig::default());
    let mut body = ScriptedBody::standing();
    for _ in 0..5 {
        engine.tick(&mut body, &forward(), MovementMode::Strafing, None, 0.1);
    }

    let mut speeds = Vec::new();
    for _ in 0..3 {
        engine.tick(&mut body, &InputSnapshot::NEUTRAL, MovementMode::Strafing, None, 0.1);
        speeds.push(engine.velocity().local.z);
    }

    // 5.0 - 3.2 = 1.8, then the next step would cross zero.
    assert!((speeds[0] - 1.8).abs() < 1e-5);
    assert_eq!(speeds[1], 0.0);
    assert_eq!(speeds[2], 0.0);
}

#[test]
fn jump_applies_strength_then_one_tick_of_gravity() {
    let config = LocomotionConfig::default()
        .with_gravity(Vec3::new(0.0, -9.8, 0.0), 1.0)
        .with_jump(10.0);
    let mut engine = engine(config);
    let mut body = ScriptedBody::standing();
    let input = InputSnapshot {
        jump: true,
        ..InputSnapshot::NEUTRAL
    };

    engine.tick(&mut body, &input, MovementMode::Strafing, None, 0.1);

    let velocity = engine.velocity();
    let vertical = velocity.local.y + velocity.global.y;
    assert!((vertical - 9.02).abs() < 1e-4, "vertical speed {vertical}");
    assert!(!engine.is_grounded());
}

#[test]
fn jump_is_ignored_when_not_allowed() {
    let mut engine = engine(LocomotionConfig::default());
    let mut body = ScriptedBody::standing();
    let input = InputSnapshot {
        jump: true,
        ..InputSnapshot::NEUTRAL
    };

    engine.tick(&mut body, &input, MovementMode::Strafing, None, 0.1);

    assert!(engine.is_grounded());
    assert_eq!(body.position.y, 1.0);
}

#[test]
fn ceiling_stops_upward_velocity() {
    let config = LocomotionConfig::default().with_jump(10.0);
    let mut engine = engine(config);
    let mut body = ScriptedBody::standing().with_ceiling(2.5);
    let input = InputSnapshot {
        jump: true,
        ..InputSnapshot::NEUTRAL
    };

    engine.tick(&mut body, &input, MovementMode::Strafing, None, 0.1);

    assert_eq!(engine.velocity().local.y, 0.0);
    assert_eq!(engine.velocity().global.y, 0.0);
    assert_eq!(body.position.y, 1.5);
}

#[test]
fn zero_dt_changes_nothing() {
    let mut engine = engine(LocomotionConfig::player());
    let mut body = ScriptedBody::at(4.0);
    engine.tick(&mut body, &forward(), MovementMode::Strafing, None, 0.1);
    let before = (
        *engine.velocity(),
        *engine.stamina(),
        engine.stagger_deadline(),
        engine.clock(),
    );
    let position = body.position;

    let report = engine.tick(&mut body, &forward(), MovementMode::Strafing, None, 0.0);

    assert_eq!(report.displacement, Vec3::ZERO);
    assert_eq!(body.position, position);
    assert_eq!(
        (
            *engine.velocity(),
            *engine.stamina(),
            engine.stagger_deadline(),
            engine.clock()
        ),
        before
    );
}

// ==================== Landing Scenarios ====================

#[test]
fn hard_landing_staggers_for_exactly_the_duration() {
    let config = LocomotionConfig::default().with_landing_stagger(25.0, 1.0);
    let mut engine = engine(config);
    let mut body = ScriptedBody::at(6.0);
    engine.add_global_velocity(Vec3::new(0.0, -30.0, 0.0));

    // dt is a power of two so the clock is exact.
    let dt = 0.25;
    engine.tick(&mut body, &InputSnapshot::NEUTRAL, MovementMode::Strafing, None, dt);
    assert!(engine.is_grounded());
    assert!(engine.is_staggered());

    for _ in 0..3 {
        engine.tick(&mut body, &forward(), MovementMode::Strafing, None, dt);
        assert!(engine.is_staggered());
        assert_eq!(engine.velocity().local.z, 0.0);
    }

    engine.tick(&mut body, &forward(), MovementMode::Strafing, None, dt);
    assert!(!engine.is_staggered());
}

#[test]
fn soft_landing_does_not_stagger() {
    let config = LocomotionConfig::default().with_landing_stagger(25.0, 1.0);
    let mut engine = engine(config);
    let mut body = ScriptedBody::at(3.0);
    engine.add_global_velocity(Vec3::new(0.0, -20.0, 0.0));

    engine.tick(&mut body, &InputSnapshot::NEUTRAL, MovementMode::Strafing, None, 0.25);

    assert!(engine.is_grounded());
    assert!(!engine.is_staggered());
}

// ==================== Stamina Scenarios ====================

#[test]
fn exhaustion_ends_only_at_threshold() {
    let config = LocomotionConfig::default().with_stamina(StaminaConfig {
        max: 10.0,
        consumption: 10.0,
        regeneration: 10.0,
        min_to_end_exhaustion: 5.0,
    });
    let mut engine = engine(config);
    let mut body = ScriptedBody::standing();
    let run = InputSnapshot {
        running: true,
        ..forward()
    };

    for _ in 0..20 {
        engine.tick(&mut body, &run, MovementMode::Strafing, None, 0.1);
        if engine.is_exhausted() {
            break;
        }
    }
    assert!(engine.is_exhausted());
    assert_eq!(engine.stamina().current(), 0.0);

    let mut recovered = false;
    for _ in 0..20 {
        engine.tick(&mut body, &InputSnapshot::NEUTRAL, MovementMode::Strafing, None, 0.1);
        let stamina = engine.stamina().current();
        assert!((0.0..=10.0).contains(&stamina));
        if stamina < 5.0 - 1e-4 {
            assert!(engine.is_exhausted(), "recovered early at {stamina}");
        } else {
            assert!(!engine.is_exhausted(), "still exhausted at {stamina}");
            recovered = true;
            break;
        }
    }
    assert!(recovered);
}

#[test]
fn exhausted_character_cannot_run() {
    let config = LocomotionConfig::default().with_stamina(StaminaConfig {
        max: 1.0,
        consumption: 10.0,
        regeneration: 1.0,
        min_to_end_exhaustion: 1.0,
    });
    let mut engine = engine(config);
    let mut body = ScriptedBody::standing();
    let run = InputSnapshot {
        running: true,
        ..forward()
    };

    for _ in 0..3 {
        engine.tick(&mut body, &run, MovementMode::Strafing, None, 0.1);
    }

    assert!(engine.is_exhausted());
    assert!(!engine.is_running());
}

// ==================== Slide Scenarios ====================

#[test]
fn walkable_slopes_never_slide_in_any_order() {
    for normals in [
        vec![slope_normal(30.0), slope_normal(20.0)],
        vec![slope_normal(20.0), slope_normal(30.0)],
    ] {
        let mut engine = engine(LocomotionConfig::default());
        let mut body = ScriptedBody::standing();
        body.extra_contacts = normals;

        for _ in 0..3 {
            engine.tick(&mut body, &InputSnapshot::NEUTRAL, MovementMode::Strafing, None, 0.1);
        }

        assert_eq!(engine.velocity().slide, Vec3::ZERO);
        assert!(!engine.is_sliding());
    }
}

#[test]
fn steep_slope_slides_downhill() {
    let mut config = LocomotionConfig::default();
    config.slide.edge_guard = false;
    let mut engine = engine(config);
    let mut body = ScriptedBody::at(3.0);
    body.extra_contacts = vec![slope_normal(60.0)];

    engine.tick(&mut body, &InputSnapshot::NEUTRAL, MovementMode::Strafing, None, 0.1);

    let slide = engine.velocity().slide;
    assert!(slide.x > 0.0, "slide {slide}");
    assert!(slide.y < 0.0, "slide {slide}");
    assert!(engine.is_sliding());
    assert!(!engine.is_airborne());
}

#[test]
fn a_single_walkable_contact_cancels_the_slide() {
    let mut config = LocomotionConfig::default();
    config.slide.edge_guard = false;
    let mut engine = engine(config);
    let mut body = ScriptedBody::at(3.0);
    body.extra_contacts = vec![slope_normal(10.0), slope_normal(60.0)];

    engine.tick(&mut body, &InputSnapshot::NEUTRAL, MovementMode::Strafing, None, 0.1);

    assert_eq!(engine.velocity().slide, Vec3::ZERO);
}

// ==================== Slope Following Scenarios ====================

#[test]
fn walking_down_a_walkable_ramp_stays_grounded() {
    let mut engine = engine(LocomotionConfig::npc());
    let mut body = ScriptedBody::standing().on(Floor::Ramp { degrees: 20.0 });

    for tick in 0..60 {
        let report = engine.tick(&mut body, &forward(), MovementMode::Strafing, None, 1.0 / 60.0);
        assert!(report.grounded, "left the ramp on tick {tick}");
        assert!(!engine.is_airborne(), "airborne on tick {tick}");
    }

    assert!(body.position.z < -3.0, "z {}", body.position.z);
    assert!(body.clearance().is_some_and(|gap| gap.abs() < 1e-4));
    assert!(!engine.is_sliding());
}

#[test]
fn walking_off_a_ledge_falls_without_snapping_down() {
    let mut engine = engine(LocomotionConfig::npc());
    let mut body = ScriptedBody::standing().on(Floor::Ledge { edge: -0.5 });

    let mut left_ground = false;
    for _ in 0..60 {
        let report = engine.tick(&mut body, &forward(), MovementMode::Strafing, None, 1.0 / 60.0);
        if !report.grounded {
            left_ground = true;
            // Only this tick's gravity, no extra pull toward the ground.
            assert!(report.displacement.y > -0.01, "displacement {}", report.displacement);
            break;
        }
    }

    assert!(left_ground);
    assert!(body.position.z < -0.5);
    assert!(body.position.y > FOOT - 0.01, "y {}", body.position.y);
    assert!(engine.is_airborne());
}
