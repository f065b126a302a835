use glam::Vec2;

use crate::boundary::BoundarySegment;
use crate::pedestrian::PedestrianSnapshot;

use super::{ForceModel, ForceParameters};

/// Circular-specification Social Force Model after Helbing, Buzna, Johansson
/// and Werner (2005). The production default.
#[derive(Debug, Clone, Default)]
pub struct HelbingBuznaModel {
    params: ForceParameters,
}

impl HelbingBuznaModel {
    pub fn new(params: ForceParameters) -> Self {
        HelbingBuznaModel { params }
    }
}

impl ForceModel for HelbingBuznaModel {
    fn parameters(&self) -> &ForceParameters {
        &self.params
    }

    fn intrinsic_force(
        &self,
        _position: Vec2,
        velocity: Vec2,
        direction: Option<Vec2>,
        pace_factor: f32,
        average_velocity: f32,
        desired_speed: f32,
        maximum_speed: f32,
    ) -> Vec2 {
        self.params.drive(
            velocity,
            direction,
            pace_factor,
            average_velocity,
            desired_speed,
            maximum_speed,
        )
    }

    fn pedestrian_interaction(
        &self,
        position: Vec2,
        velocity: Vec2,
        other: &PedestrianSnapshot,
    ) -> Vec2 {
        let p = &self.params;
        let diff = position - other.position;
        let distance = diff.length();
        if distance > p.max_pedestrian_interaction_distance() {
            return Vec2::ZERO;
        }

        // Coincident positions still yield a finite, bounded push.
        let normal = diff.try_normalize().unwrap_or(Vec2::X);
        let r = self.pedestrian_radius() + other.radius;

        // Only the second term carries the anisotropic field; the first one
        // acts regardless of where the other is relative to the heading.
        let magnitude = p.pedestrian_a1 * ((r - distance) / p.pedestrian_b1).exp()
            + p.pedestrian_a2 * ((r - distance) / p.pedestrian_b2).exp()
                * p.anisotropy(velocity, -normal);

        normal * magnitude
    }

    fn boundary_interaction(&self, position: Vec2, segment: &BoundarySegment) -> Vec2 {
        self.params.boundary_repulsion(position, segment)
    }
}

#[cfg(test)]
mod tests {
    use assert_float_eq::*;
    use glam::vec2;

    use super::*;

    fn other_at(position: Vec2) -> PedestrianSnapshot {
        PedestrianSnapshot {
            id: 1,
            position,
            velocity: Vec2::ZERO,
            radius: 0.2,
        }
    }

    #[test]
    fn test_repulsion_points_away_and_decays() {
        let model = HelbingBuznaModel::default();

        let near = model.pedestrian_interaction(vec2(0.5, 0.0), Vec2::ZERO, &other_at(Vec2::ZERO));
        let far = model.pedestrian_interaction(vec2(2.0, 0.0), Vec2::ZERO, &other_at(Vec2::ZERO));

        assert!(near.x > 0.0);
        assert_float_absolute_eq!(near.y, 0.0);
        assert!(far.length() < near.length());
    }

    #[test]
    fn test_repulsion_is_zero_beyond_cutoff() {
        let model = HelbingBuznaModel::default();
        let cutoff = model.max_pedestrian_interaction_distance();
        let f = model.pedestrian_interaction(
            vec2(cutoff + 0.1, 0.0),
            Vec2::ZERO,
            &other_at(Vec2::ZERO),
        );
        assert_eq!(f, Vec2::ZERO);
    }

    #[test]
    fn test_repulsion_is_bounded_at_contact() {
        let model = HelbingBuznaModel::default();
        let p = model.parameters();
        let r = 2.0 * p.radius;
        let bound = p.pedestrian_a1 * (r / p.pedestrian_b1).exp()
            + p.pedestrian_a2 * (r / p.pedestrian_b2).exp();

        // d → 0⁺: finite and no larger than the analytic bound.
        let f = model.pedestrian_interaction(
            vec2(1e-7, 0.0),
            Vec2::ZERO,
            &other_at(Vec2::ZERO),
        );
        assert!(f.is_finite());
        assert!(f.length() <= bound * (1.0 + 1e-4));

        let coincident =
            model.pedestrian_interaction(Vec2::ZERO, Vec2::ZERO, &other_at(Vec2::ZERO));
        assert!(coincident.is_finite());
    }

    #[test]
    fn test_anisotropy_softens_rear_contact() {
        let model = HelbingBuznaModel::default();
        let p = model.parameters();
        let heading = vec2(1.0, 0.0);

        // Other ahead: full weight. Other behind: the second term drops to
        // λ while the first acts in full.
        let from_front =
            model.pedestrian_interaction(vec2(0.0, 0.0), heading, &other_at(vec2(1.0, 0.0)));
        let from_back =
            model.pedestrian_interaction(vec2(0.0, 0.0), heading, &other_at(vec2(-1.0, 0.0)));

        assert!(from_back.length() < from_front.length());

        let r = 2.0 * p.radius;
        let term_1 = p.pedestrian_a1 * ((r - 1.0) / p.pedestrian_b1).exp();
        let term_2 = p.pedestrian_a2 * ((r - 1.0) / p.pedestrian_b2).exp();
        assert_float_absolute_eq!(from_front.length(), term_1 + term_2, 1e-4);
        assert_float_absolute_eq!(
            from_back.length(),
            term_1 + term_2 * p.lambda,
            1e-4
        );
    }
}
