use glam::Vec2;
use log::warn;

use crate::forces::{ForceModel, ForceTerms};
use crate::geometry::{segments_crossing, Envelope};
use crate::pedestrian::Pedestrian;
use crate::quadtree::SceneIndex;

/// Selectable integration scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegratorKind {
    #[default]
    SimpleEuler,
    RungeKutta4,
}

impl IntegratorKind {
    pub fn build(self) -> Box<dyn Integrator> {
        match self {
            IntegratorKind::SimpleEuler => Box::new(SimpleEuler),
            IntegratorKind::RungeKutta4 => Box::new(RungeKutta4),
        }
    }
}

/// Bundles everything force evaluation needs against the frozen tick
/// snapshot: the force model, the spatial index, and the pedestrian's group
/// centroid.
pub struct ForceEvaluator<'a> {
    pub model: &'a dyn ForceModel,
    pub index: &'a SceneIndex,
    pub group_centroid: Option<(Vec2, usize)>,
}

impl ForceEvaluator<'_> {
    /// Total force on `ped` as if it were at `position` with `velocity`,
    /// summed over the quadtree-filtered neighborhood. Non-finite components
    /// are zeroed so one diverging term cannot poison the pedestrian.
    pub fn evaluate(&self, ped: &Pedestrian, position: Vec2, velocity: Vec2) -> ForceTerms {
        let probe = Envelope::point(position);

        let direction = ped.wayfinding.normalized_direction(position);
        let intrinsic = self.model.intrinsic_force(
            position,
            velocity,
            direction,
            ped.wayfinding.pace_factor(position),
            ped.wayfinding.average_velocity(),
            ped.desired_speed,
            ped.maximum_speed,
        );

        // Item envelopes carry the interaction reach, so a point probe
        // returns every candidate within range.
        let mut pedestrian = Vec2::ZERO;
        for other in self.index.pedestrians_within(&probe) {
            if other.id != ped.id {
                pedestrian += self.model.pedestrian_interaction(position, velocity, other);
            }
        }

        let mut boundary = Vec2::ZERO;
        for segment in self.index.boundary_segments_within(&probe) {
            boundary += self.model.boundary_interaction(position, segment);
        }

        let group = match self.group_centroid {
            Some((centroid, members)) => {
                self.model.group_interaction(position, velocity, centroid, members)
            }
            None => Vec2::ZERO,
        };

        let mut terms = ForceTerms {
            intrinsic,
            pedestrian,
            boundary,
            group,
        };
        if terms.sanitize() {
            warn!("pedestrian {}: dropped non-finite force component", ped.id);
        }
        terms
    }
}

/// True when the straight move `(from, to)` does not cross any boundary
/// geometry. Envelope query first, exact segment-crossing predicate second.
pub fn move_is_valid(index: &SceneIndex, from: Vec2, to: Vec2) -> bool {
    if from == to {
        return true;
    }
    let envelope = Envelope::of_segment(from, to);
    index
        .boundary_segments_within(&envelope)
        .iter()
        .all(|segment| !segments_crossing(from, to, segment.start(), segment.end()))
}

/// Advances one pedestrian by one tick of simulated time against the frozen
/// snapshot. Implementations must uphold the no-cross-wall invariant and the
/// velocity ceiling.
pub trait Integrator: Send + Sync {
    fn move_pedestrian(&self, t: f64, delta: f32, ped: &mut Pedestrian, eval: &ForceEvaluator<'_>);
}

/// Explicit Euler, position updated before velocity (the order is part of
/// the scheme's observable behavior).
#[derive(Debug, Clone, Copy, Default)]
pub struct SimpleEuler;

impl Integrator for SimpleEuler {
    fn move_pedestrian(&self, t: f64, delta: f32, ped: &mut Pedestrian, eval: &ForceEvaluator<'_>) {
        let p_old = ped.position;
        let mut p_new = p_old + ped.velocity * delta;

        if !p_new.is_finite() {
            warn!("pedestrian {}: recovered non-finite position", ped.id);
            ped.stuck = true;
            ped.velocity = Vec2::ZERO;
            p_new = p_old;
        } else if !move_is_valid(eval.index, p_old, p_new) {
            p_new = p_old;
            ped.wayfinding.set_needs_orientation();
        }

        ped.previous_position = p_old;
        ped.position = p_new;
        ped.wayfinding.update_model(t, p_old, p_new);
        ped.wayfinding.check_course(p_new, t);

        let terms = eval.evaluate(ped, p_new, ped.velocity);
        ped.forces = terms;

        let velocity = ped.velocity + terms.total() * delta;
        ped.velocity = if velocity.is_finite() {
            velocity.clamp_length_max(ped.maximum_speed)
        } else {
            warn!("pedestrian {}: recovered non-finite velocity", ped.id);
            ped.stuck = true;
            Vec2::ZERO
        };
    }
}

/// Classical 4th-order Runge–Kutta over the force function, stages at
/// `{0, Δt/2, Δt/2, Δt}`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RungeKutta4;

impl Integrator for RungeKutta4 {
    fn move_pedestrian(&self, t: f64, delta: f32, ped: &mut Pedestrian, eval: &ForceEvaluator<'_>) {
        let p0 = ped.position;
        let v0 = ped.velocity;
        let half = delta * 0.5;

        // A stage with no drive left contributes no displacement; otherwise
        // a goalless pedestrian would drift on its residual velocity.
        fn stage_velocity(terms: &ForceTerms, v: Vec2) -> Vec2 {
            if terms.intrinsic == Vec2::ZERO {
                Vec2::ZERO
            } else {
                v
            }
        }

        let f1 = eval.evaluate(ped, p0, v0);
        let k1v = stage_velocity(&f1, v0);
        let k1a = f1.total();

        let f2 = eval.evaluate(ped, p0 + k1v * half, v0 + k1a * half);
        let k2v = stage_velocity(&f2, v0 + k1a * half);
        let k2a = f2.total();

        let f3 = eval.evaluate(ped, p0 + k2v * half, v0 + k2a * half);
        let k3v = stage_velocity(&f3, v0 + k2a * half);
        let k3a = f3.total();

        let f4 = eval.evaluate(ped, p0 + k3v * delta, v0 + k3a * delta);
        let k4v = stage_velocity(&f4, v0 + k3a * delta);
        let k4a = f4.total();

        let mut p_new = p0 + (k1v + 2.0 * (k2v + k3v) + k4v) * (delta / 6.0);
        let velocity = v0 + (k1a + 2.0 * (k2a + k3a) + k4a) * (delta / 6.0);

        let mut recovered = false;
        if !p_new.is_finite() {
            warn!("pedestrian {}: recovered non-finite position", ped.id);
            ped.stuck = true;
            recovered = true;
            p_new = p0;
        } else if !move_is_valid(eval.index, p0, p_new) {
            p_new = p0;
            ped.wayfinding.set_needs_orientation();
        }

        ped.previous_position = p0;
        ped.position = p_new;
        ped.wayfinding.update_model(t, p0, p_new);
        ped.wayfinding.check_course(p_new, t);
        ped.forces = f1;

        ped.velocity = if recovered {
            Vec2::ZERO
        } else if velocity.is_finite() {
            velocity.clamp_length_max(ped.maximum_speed)
        } else {
            warn!("pedestrian {}: recovered non-finite velocity", ped.id);
            ped.stuck = true;
            Vec2::ZERO
        };
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use geo::{line_string, Geometry};
    use glam::vec2;

    use crate::boundary::Boundary;
    use crate::forces::{ForceModel, ForceModelKind};
    use crate::route::Route;

    use super::*;

    fn wall_index(model: &dyn ForceModel) -> SceneIndex {
        let mut index = SceneIndex::new();
        let wall = line_string![(x: 5.0, y: -10.0), (x: 5.0, y: 10.0)];
        index.add_boundary(Arc::new(
            Boundary::new(
                Geometry::LineString(wall),
                model.max_boundary_interaction_distance(),
                None,
            )
            .unwrap(),
        ));
        index
    }

    fn walker(route_coords: &[glam::Vec2], position: glam::Vec2) -> Pedestrian {
        let route =
            Arc::new(Route::build(route_coords, 2.0, &SceneIndex::new(), 0.3).unwrap());
        Pedestrian::new(0, position, route, 1.2, 0.2, 0)
    }

    #[test]
    fn test_euler_velocity_stays_clamped() {
        let model = ForceModelKind::HelbingBuzna.build();
        let index = SceneIndex::new();
        let eval = ForceEvaluator {
            model: model.as_ref(),
            index: &index,
            group_centroid: None,
        };

        let mut ped = walker(&[vec2(100.0, 0.0)], vec2(0.0, 0.0));
        let mut t = 0.0;
        for _ in 0..100 {
            SimpleEuler.move_pedestrian(t, 0.1, &mut ped, &eval);
            t += 0.1;
            assert!(ped.velocity.length() <= ped.maximum_speed + 1e-5);
            assert!(ped.position.is_finite());
            assert!(ped.forces.total().is_finite());
        }
        // It actually walks.
        assert!(ped.position.x > 5.0);
    }

    #[test]
    fn test_vetoed_move_flags_reorientation() {
        let model = ForceModelKind::HelbingBuzna.build();
        let index = wall_index(model.as_ref());
        let eval = ForceEvaluator {
            model: model.as_ref(),
            index: &index,
            group_centroid: None,
        };

        let mut ped = walker(&[vec2(10.0, 0.0)], vec2(4.9, 0.0));
        ped.velocity = vec2(3.0, 0.0);

        SimpleEuler.move_pedestrian(0.0, 0.1, &mut ped, &eval);
        assert_eq!(ped.position, vec2(4.9, 0.0));
        assert!(ped.wayfinding.needs_orientation());
    }

    #[test]
    fn test_wall_is_never_crossed() {
        for kind in [IntegratorKind::SimpleEuler, IntegratorKind::RungeKutta4] {
            let model = ForceModelKind::HelbingBuzna.build();
            let index = wall_index(model.as_ref());
            let eval = ForceEvaluator {
                model: model.as_ref(),
                index: &index,
                group_centroid: None,
            };
            let integrator = kind.build();

            // Aimed straight at the wall with no drive beyond it.
            let mut ped = walker(&[vec2(4.0, 0.0)], vec2(3.0, 0.0));
            ped.velocity = vec2(1.5, 0.0);

            let mut t = 0.0;
            for _ in 0..300 {
                integrator.move_pedestrian(t, 0.1, &mut ped, &eval);
                t += 0.1;
                assert!(ped.position.x < 5.0, "{kind:?} crossed the wall");
            }
        }
    }

    #[test]
    fn test_rk4_holds_still_without_goal() {
        let model = ForceModelKind::HelbingBuzna.build();
        let index = SceneIndex::new();
        let eval = ForceEvaluator {
            model: model.as_ref(),
            index: &index,
            group_centroid: None,
        };

        let mut ped = walker(&[vec2(2.0, 0.0)], vec2(0.0, 0.0));
        // Walk the route to completion.
        let mut t = 0.0;
        for _ in 0..200 {
            RungeKutta4.move_pedestrian(t, 0.05, &mut ped, &eval);
            t += 0.05;
        }
        assert!(ped.wayfinding.is_route_finished());

        // Once finished and settled, the state is a fixed point.
        let settled = ped.position;
        for _ in 0..50 {
            RungeKutta4.move_pedestrian(t, 0.05, &mut ped, &eval);
            t += 0.05;
        }
        assert!((ped.position - settled).length() < 1e-3);
        assert!(ped.velocity.length() < 1e-3);
    }

    #[test]
    fn test_integration_is_deterministic() {
        let run = || {
            let model = ForceModelKind::HelbingBuzna.build();
            let index = wall_index(model.as_ref());
            let eval = ForceEvaluator {
                model: model.as_ref(),
                index: &index,
                group_centroid: None,
            };
            let mut ped = walker(&[vec2(10.0, 0.5)], vec2(0.0, 0.0));
            let mut t = 0.0;
            for _ in 0..100 {
                SimpleEuler.move_pedestrian(t, 0.1, &mut ped, &eval);
                t += 0.1;
            }
            (ped.position, ped.velocity)
        };
        assert_eq!(run(), run());
    }
}
