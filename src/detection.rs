//! Contact analysis.
//!
//! Every contact reported by a capsule move goes through two independent
//! checks: whether it makes the character slide down a slope, and whether it
//! is a wall or ceiling that cancels part of the velocity.

use bevy::prelude::*;

use crate::backend::{RaycastRequest, SceneQuery};
use crate::collision::ContactPoint;
use crate::config::SlideConfig;
use crate::velocity::{LocalFrame, VelocityState, VELOCITY_EPSILON};

/// Round to two decimals.
///
/// Slope angles and normal heights are compared after rounding so that
/// numerically noisy contacts on flat ground or vertical walls classify the
/// same way every tick.
#[inline]
pub fn round2(value: f32) -> f32 {
    (value * 100.0).round() / 100.0
}

/// Angle between world up and `normal` in degrees, rounded to two decimals.
pub fn slope_angle_degrees(normal: Vec3) -> f32 {
    let normal = normal.normalize_or_zero();
    if normal == Vec3::ZERO {
        return 0.0;
    }
    round2(Vec3::Y.angle_between(normal).to_degrees())
}

/// Horizontal distance between the character and a contact.
pub fn horizontal_distance(position: Vec3, point: Vec3) -> f32 {
    Vec2::new(position.x - point.x, position.z - point.z).length()
}

/// Outcome of one contact for this tick's slide.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SlideVerdict {
    /// The contact is an over-limit slope pushing with this velocity.
    Slide(Vec3),
    /// The contact is walkable (or an edge); the whole tick stops sliding.
    NoSlip,
}

/// Whether the edge probe under a contact finds nothing.
///
/// The probe starts just outside the contact, away from the surface, and looks
/// down over a distance proportional to `tan(slope angle)`. A real slope keeps
/// going under the probe; the lip of a step does not.
pub fn is_step_edge<S: SceneQuery + ?Sized>(
    scene: &S,
    contact: &ContactPoint,
    slope_angle: f32,
    config: &SlideConfig,
) -> bool {
    let flat_normal = Vec3::new(contact.normal.x, 0.0, contact.normal.z);
    let origin = contact.point + flat_normal * config.edge_probe_offset;
    let distance = slope_angle.to_radians().tan() * config.edge_probe_distance;
    let request = RaycastRequest::down(origin, distance);
    if request.is_degenerate() {
        return true;
    }
    scene.raycast(&request).is_none()
}

/// Slide velocity produced by one tick on a slope.
///
/// The direction runs straight down the surface; the magnitude is the
/// horizontal share of the normal (`sin(angle)`) times the slide acceleration.
pub fn slide_velocity(normal: Vec3, acceleration: f32, dt: f32) -> Vec3 {
    let normal = normal.normalize_or_zero();
    let flat = Vec3::new(normal.x, 0.0, normal.z).length();
    let downhill = (Vec3::NEG_Y - normal * normal.dot(Vec3::NEG_Y)).normalize_or_zero();
    downhill * flat * acceleration * dt
}

/// Judge a single contact.
pub fn evaluate_slide<S: SceneQuery + ?Sized>(
    scene: &S,
    contact: &ContactPoint,
    config: &SlideConfig,
    dt: f32,
) -> SlideVerdict {
    let angle = slope_angle_degrees(contact.normal);
    let limit = round2(config.slope_limit);

    let edge = config.edge_guard && is_step_edge(scene, contact, angle, config);

    if !edge && limit < angle && angle < config.max_slide_angle {
        SlideVerdict::Slide(slide_velocity(contact.normal, config.acceleration, dt))
    } else {
        SlideVerdict::NoSlip
    }
}

/// Slide gathered across the contacts of one tick.
///
/// Contributions are averaged pairwise; a single `NoSlip` verdict clears the
/// accumulator and makes it ignore later contacts.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SlideAccumulator {
    velocity: Vec3,
    disqualified: bool,
}

impl SlideAccumulator {
    pub fn is_disqualified(&self) -> bool {
        self.disqualified
    }

    pub fn add(&mut self, verdict: SlideVerdict) {
        if self.disqualified {
            return;
        }
        match verdict {
            SlideVerdict::Slide(velocity) => {
                self.velocity = if self.velocity == Vec3::ZERO {
                    velocity
                } else {
                    (self.velocity + velocity) / 2.0
                };
            }
            SlideVerdict::NoSlip => {
                self.disqualified = true;
                self.velocity = Vec3::ZERO;
            }
        }
    }

    pub fn velocity(&self) -> Vec3 {
        self.velocity
    }
}

/// Cancel the part of the velocity that runs into a wall or ceiling.
///
/// Ceilings (normal pointing down) zero upward speed. Walls and ceilings
/// project the horizontal velocity onto the surface tangent, keeping motion
/// along the wall. The global velocity is corrected when it is in use,
/// otherwise the local one.
///
/// A ceiling with a purely vertical normal has no horizontal tangent and
/// leaves the horizontal velocity untouched.
pub fn correct_for_surface(velocity: &mut VelocityState, frame: LocalFrame, normal: Vec3) {
    let normal_y = round2(normal.y);

    if normal_y < 0.0 && (velocity.local.y > 0.0 || velocity.global.y > 0.0) {
        velocity.local.y = 0.0;
        velocity.global.y = 0.0;
    }

    if normal_y > 0.0 {
        return;
    }

    let flat = Vec3::new(normal.x, 0.0, normal.z);
    if flat.length_squared() <= VELOCITY_EPSILON * VELOCITY_EPSILON {
        return;
    }
    let tangent = Vec3::new(-flat.z, 0.0, flat.x);

    let use_global = velocity.global != Vec3::ZERO;
    let current = if use_global {
        velocity.global
    } else {
        frame.to_world(velocity.local)
    };
    let corrected = current.project_onto(tangent);

    if use_global {
        velocity.global.x = corrected.x;
        velocity.global.z = corrected.z;
    } else {
        let local = frame.to_local(corrected);
        velocity.local.x = local.x;
        velocity.local.z = local.z;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::RayHit;

    /// Infinite floor at `height`.
    struct Floor {
        height: f32,
    }

    impl SceneQuery for Floor {
        fn raycast_all(&self, request: &RaycastRequest) -> Vec<RayHit> {
            if request.direction.y >= 0.0 {
                return Vec::new();
            }
            let distance = (request.origin.y - self.height) / -request.direction.y;
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

    struct Void;

    impl SceneQuery for Void {
        fn raycast_all(&self, _request: &RaycastRequest) -> Vec<RayHit> {
            Vec::new()
        }
    }

    fn slope_normal(degrees: f32) -> Vec3 {
        let r = degrees.to_radians();
        // Tilted toward +X: the slope descends toward +X.
        Vec3::new(r.sin(), r.cos(), 0.0)
    }

    fn no_edge_guard() -> SlideConfig {
        SlideConfig {
            edge_guard: false,
            ..default()
        }
    }

    #[test]
    fn slope_angle_is_rounded() {
        assert_eq!(slope_angle_degrees(Vec3::Y), 0.0);
        assert_eq!(slope_angle_degrees(Vec3::X), 90.0);
        assert_eq!(slope_angle_degrees(slope_normal(60.0)), 60.0);
    }

    #[test]
    fn slide_runs_down_the_surface() {
        let normal = slope_normal(60.0);
        let v = slide_velocity(normal, 10.0, 0.1);

        assert!(v.x > 0.0, "slides toward the low side");
        assert!(v.y < 0.0, "slides downward");
        assert!(v.dot(normal).abs() < 1e-5, "stays on the surface");
        assert!((v.length() - 60f32.to_radians().sin()).abs() < 1e-4);
    }

    #[test]
    fn walkable_slope_does_not_slide() {
        let contact = ContactPoint::new(Vec3::ZERO, slope_normal(30.0));
        assert_eq!(
            evaluate_slide(&Void, &contact, &no_edge_guard(), 0.1),
            SlideVerdict::NoSlip
        );
    }

    #[test]
    fn near_vertical_surface_does_not_slide() {
        let contact = ContactPoint::new(Vec3::ZERO, slope_normal(89.5));
        assert_eq!(
            evaluate_slide(&Void, &contact, &no_edge_guard(), 0.1),
            SlideVerdict::NoSlip
        );
    }

    #[test]
    fn steep_slope_slides() {
        let contact = ContactPoint::new(Vec3::ZERO, slope_normal(60.0));
        assert!(matches!(
            evaluate_slide(&Void, &contact, &no_edge_guard(), 0.1),
            SlideVerdict::Slide(_)
        ));
    }

    #[test]
    fn edge_guard_blocks_slide_on_step_lip() {
        let contact = ContactPoint::new(Vec3::new(0.0, 1.0, 0.0), slope_normal(60.0));
        let config = SlideConfig::default();

        // Nothing below the probe: it's the edge of a step.
        assert_eq!(
            evaluate_slide(&Void, &contact, &config, 0.1),
            SlideVerdict::NoSlip
        );

        // The surface continues just under the probe: a real slope.
        let floor = Floor { height: 0.99 };
        assert!(matches!(
            evaluate_slide(&floor, &contact, &config, 0.1),
            SlideVerdict::Slide(_)
        ));
    }

    #[test]
    fn no_slip_wins_regardless_of_order() {
        let slide = SlideVerdict::Slide(Vec3::new(1.0, -1.0, 0.0));

        let mut first = SlideAccumulator::default();
        first.add(SlideVerdict::NoSlip);
        first.add(slide);
        assert_eq!(first.velocity(), Vec3::ZERO);

        let mut last = SlideAccumulator::default();
        last.add(slide);
        last.add(SlideVerdict::NoSlip);
        assert_eq!(last.velocity(), Vec3::ZERO);
        assert!(last.is_disqualified());
    }

    #[test]
    fn slide_contributions_are_averaged() {
        let mut acc = SlideAccumulator::default();
        acc.add(SlideVerdict::Slide(Vec3::new(2.0, 0.0, 0.0)));
        acc.add(SlideVerdict::Slide(Vec3::new(0.0, 0.0, 2.0)));
        assert_eq!(acc.velocity(), Vec3::new(1.0, 0.0, 1.0));
    }

    #[test]
    fn ceiling_cancels_upward_speed() {
        let mut velocity = VelocityState {
            local: Vec3::new(1.0, 4.0, 2.0),
            ..default()
        };
        correct_for_surface(&mut velocity, LocalFrame::new(Quat::IDENTITY), Vec3::NEG_Y);

        assert_eq!(velocity.local.y, 0.0);
        assert_eq!(velocity.local.x, 1.0);
        assert_eq!(velocity.local.z, 2.0);
    }

    #[test]
    fn wall_keeps_only_tangent_motion() {
        // Wall facing -X, character running into it diagonally.
        let mut velocity = VelocityState {
            global: Vec3::new(3.0, -1.0, -4.0),
            ..default()
        };
        correct_for_surface(&mut velocity, LocalFrame::new(Quat::IDENTITY), Vec3::NEG_X);

        assert!(velocity.global.x.abs() < 1e-6);
        assert!((velocity.global.z + 4.0).abs() < 1e-6);
        assert_eq!(velocity.global.y, -1.0);
    }

    #[test]
    fn wall_correction_uses_local_when_grounded() {
        let frame = LocalFrame::new(Quat::IDENTITY);
        // Forward (world -Z) into a wall whose normal faces +Z.
        let mut velocity = VelocityState {
            local: Vec3::new(1.0, 0.0, 5.0),
            ..default()
        };
        correct_for_surface(&mut velocity, frame, Vec3::Z);

        assert!((velocity.local.x - 1.0).abs() < 1e-6);
        assert!(velocity.local.z.abs() < 1e-6);
    }

    #[test]
    fn floor_contact_is_not_a_wall() {
        let mut velocity = VelocityState {
            local: Vec3::new(1.0, 0.0, 5.0),
            ..default()
        };
        correct_for_surface(&mut velocity, LocalFrame::new(Quat::IDENTITY), Vec3::Y);
        assert_eq!(velocity.local, Vec3::new(1.0, 0.0, 5.0));
    }

    #[test]
    fn horizontal_distance_ignores_height() {
        assert_eq!(
            horizontal_distance(Vec3::new(0.0, 5.0, 0.0), Vec3::new(3.0, 0.0, 4.0)),
            5.0
        );
    }
}
