mod helbing_buzna;
mod helbing_johansson;
mod moussaid;

pub use helbing_buzna::HelbingBuznaModel;
pub use helbing_johansson::HelbingJohanssonModel;
pub use moussaid::MoussaidModel;

use glam::Vec2;

use crate::boundary::BoundarySegment;
use crate::math;
use crate::pedestrian::PedestrianSnapshot;

/// Selectable force model variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForceModelKind {
    #[default]
    HelbingBuzna,
    /// Elliptical interaction term; still needs more numerical testing.
    HelbingJohansson,
    Moussaid,
}

impl ForceModelKind {
    pub fn build(self) -> Box<dyn ForceModel> {
        match self {
            ForceModelKind::HelbingBuzna => Box::new(HelbingBuznaModel::default()),
            ForceModelKind::HelbingJohansson => Box::new(HelbingJohanssonModel::default()),
            ForceModelKind::Moussaid => Box::new(MoussaidModel::default()),
        }
    }
}

/// Per-tick force components of one pedestrian.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ForceTerms {
    pub intrinsic: Vec2,
    pub pedestrian: Vec2,
    pub boundary: Vec2,
    pub group: Vec2,
}

impl ForceTerms {
    pub fn total(&self) -> Vec2 {
        self.intrinsic + self.pedestrian + self.boundary + self.group
    }

    /// Non-finite components are zeroed; a diverging term must not take the
    /// whole pedestrian down. Returns whether anything was dropped.
    pub fn sanitize(&mut self) -> bool {
        let mut dropped = false;
        for term in [
            &mut self.intrinsic,
            &mut self.pedestrian,
            &mut self.boundary,
            &mut self.group,
        ] {
            if !term.is_finite() {
                *term = Vec2::ZERO;
                dropped = true;
            }
        }
        dropped
    }
}

/// Shared Social Force Model parameters (metres, seconds, m/s²).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForceParameters {
    /// Relaxation time τ of the drive term.
    pub relaxation_time: f32,
    /// Anisotropy factor λ ∈ [0, 1]; 1 is fully isotropic.
    pub lambda: f32,
    pub pedestrian_a1: f32,
    pub pedestrian_b1: f32,
    pub pedestrian_a2: f32,
    pub pedestrian_b2: f32,
    pub boundary_a: f32,
    pub boundary_b: f32,
    pub group_strength: f32,
    pub radius: f32,
    /// Force magnitude below which an interaction is treated as zero; the
    /// interaction cutoff distances derive from it.
    pub force_cutoff: f32,
}

impl Default for ForceParameters {
    fn default() -> Self {
        ForceParameters {
            relaxation_time: 0.5,
            lambda: 0.5,
            pedestrian_a1: 0.04,
            pedestrian_b1: 3.22,
            pedestrian_a2: 3.0,
            pedestrian_b2: 0.2,
            boundary_a: 5.0,
            boundary_b: 0.1,
            group_strength: 1.0,
            radius: 0.2,
            force_cutoff: 0.01,
        }
    }
}

// Distance at which A·e^{(r−d)/B} falls below the cutoff.
fn cutoff_distance(r: f32, a: f32, b: f32, limit: f32) -> f32 {
    if a <= limit {
        return r;
    }
    r + b * (a / limit).ln()
}

impl ForceParameters {
    pub fn max_pedestrian_interaction_distance(&self) -> f32 {
        let r = 2.0 * self.radius;
        cutoff_distance(r, self.pedestrian_a1, self.pedestrian_b1, self.force_cutoff).max(
            cutoff_distance(r, self.pedestrian_a2, self.pedestrian_b2, self.force_cutoff),
        )
    }

    pub fn max_boundary_interaction_distance(&self) -> f32 {
        cutoff_distance(self.radius, self.boundary_a, self.boundary_b, self.force_cutoff)
    }

    /// Anisotropic weighting φ(θ) = λ + (1−λ)(1+cos θ)/2 with θ the angle
    /// between the own heading and the direction toward the other.
    pub fn anisotropy(&self, heading: Vec2, toward_other: Vec2) -> f32 {
        let Some(heading) = heading.try_normalize() else {
            return 1.0;
        };
        let theta = math::atan2_lut(heading.perp_dot(toward_other), heading.dot(toward_other));
        self.lambda + (1.0 - self.lambda) * (1.0 + math::cos_lut(theta)) * 0.5
    }

    /// Drive toward the preferred velocity, with the route-average feedback
    /// keeping the long-run pace on target. `pace_factor` scales the target
    /// speed down on final-waypoint arrival; a `None` direction brakes.
    pub fn drive(
        &self,
        velocity: Vec2,
        direction: Option<Vec2>,
        pace_factor: f32,
        average_velocity: f32,
        desired_speed: f32,
        maximum_speed: f32,
    ) -> Vec2 {
        let target = match direction {
            Some(dir) => {
                let pace = (desired_speed + (desired_speed - average_velocity))
                    .clamp(0.0, maximum_speed);
                dir * pace * pace_factor
            }
            None => Vec2::ZERO,
        };
        (target - velocity) / self.relaxation_time
    }

    /// Exponential repulsion from the nearest point of a boundary segment.
    pub fn boundary_repulsion(&self, position: Vec2, segment: &BoundarySegment) -> Vec2 {
        let nearest = segment.nearest_point(position);
        let diff = position - nearest;
        let distance = diff.length();
        if distance > self.max_boundary_interaction_distance() {
            return Vec2::ZERO;
        }

        let normal = diff.try_normalize().unwrap_or_else(|| {
            // Standing on the segment: push along its left normal.
            (segment.end() - segment.start())
                .try_normalize()
                .map(|d| d.perp())
                .unwrap_or(Vec2::X)
        });
        normal * self.boundary_a * ((self.radius - distance) / self.boundary_b).exp()
    }

    /// Cohesion toward the group centroid once the pedestrian strays beyond
    /// the group's comfort radius.
    pub fn group_cohesion(&self, position: Vec2, centroid: Vec2, members: usize) -> Vec2 {
        if members < 2 {
            return Vec2::ZERO;
        }
        let diff = centroid - position;
        let comfort = members as f32 * 0.5;
        if diff.length() <= comfort {
            return Vec2::ZERO;
        }
        diff.normalize_or_zero() * self.group_strength
    }
}

/// A Social Force Model variant: pure functions of geometric and kinematic
/// inputs returning finite force vectors.
pub trait ForceModel: Send + Sync {
    fn parameters(&self) -> &ForceParameters;

    /// Self-driven acceleration toward the preferred velocity along the
    /// route.
    fn intrinsic_force(
        &self,
        position: Vec2,
        velocity: Vec2,
        direction: Option<Vec2>,
        pace_factor: f32,
        average_velocity: f32,
        desired_speed: f32,
        maximum_speed: f32,
    ) -> Vec2;

    /// Repulsion from another pedestrian; zero beyond the interaction
    /// cutoff.
    fn pedestrian_interaction(
        &self,
        position: Vec2,
        velocity: Vec2,
        other: &PedestrianSnapshot,
    ) -> Vec2;

    /// Repulsion from a boundary segment; zero beyond the cutoff.
    fn boundary_interaction(&self, position: Vec2, segment: &BoundarySegment) -> Vec2 {
        self.parameters().boundary_repulsion(position, segment)
    }

    /// Group cohesion toward the centroid (experimental).
    fn group_interaction(&self, position: Vec2, _velocity: Vec2, centroid: Vec2, members: usize) -> Vec2 {
        self.parameters().group_cohesion(position, centroid, members)
    }

    fn max_pedestrian_interaction_distance(&self) -> f32 {
        self.parameters().max_pedestrian_interaction_distance()
    }

    fn max_boundary_interaction_distance(&self) -> f32 {
        self.parameters().max_boundary_interaction_distance()
    }

    fn pedestrian_radius(&self) -> f32 {
        self.parameters().radius
    }
}

#[cfg(test)]
mod tests {
    use assert_float_eq::*;
    use glam::vec2;

    use crate::boundary::BoundarySegment;

    use super::*;

    #[test]
    fn test_cutoff_distances_derive_from_force_limit() {
        let params = ForceParameters::default();

        // d_max = r + B·ln(A / 0.01), the greater of the two terms.
        let r = 2.0 * params.radius;
        let expected = (r + params.pedestrian_b1 * (params.pedestrian_a1 / 0.01).ln())
            .max(r + params.pedestrian_b2 * (params.pedestrian_a2 / 0.01).ln());
        assert_float_absolute_eq!(params.max_pedestrian_interaction_distance(), expected, 1e-4);

        let expected =
            params.radius + params.boundary_b * (params.boundary_a / 0.01).ln();
        assert_float_absolute_eq!(params.max_boundary_interaction_distance(), expected, 1e-4);
    }

    #[test]
    fn test_anisotropy_weights_front_over_back() {
        let params = ForceParameters::default();
        let heading = vec2(1.0, 0.0);

        let ahead = params.anisotropy(heading, vec2(1.0, 0.0));
        let behind = params.anisotropy(heading, vec2(-1.0, 0.0));
        let side = params.anisotropy(heading, vec2(0.0, 1.0));

        assert_float_absolute_eq!(ahead, 1.0, 1e-3);
        assert_float_absolute_eq!(behind, params.lambda, 1e-3);
        assert!(side > behind && side < ahead);

        // Standing still: isotropic.
        assert_float_absolute_eq!(params.anisotropy(Vec2::ZERO, vec2(1.0, 0.0)), 1.0);
    }

    #[test]
    fn test_drive_relaxes_toward_preferred_velocity() {
        let params = ForceParameters::default();
        let f = params.drive(Vec2::ZERO, Some(vec2(1.0, 0.0)), 1.0, 1.2, 1.2, 1.56);
        assert_float_absolute_eq!(f.x, 1.2 / params.relaxation_time, 1e-4);

        // At the preferred velocity the drive vanishes.
        let f = params.drive(vec2(1.2, 0.0), Some(vec2(1.0, 0.0)), 1.0, 1.2, 1.2, 1.56);
        assert_float_absolute_eq!(f.length(), 0.0, 1e-4);

        // No goal: pure braking.
        let f = params.drive(vec2(1.0, 0.0), None, 0.0, 1.2, 1.2, 1.56);
        assert!(f.x < 0.0);
    }

    #[test]
    fn test_drive_feedback_raises_lagging_pace() {
        let params = ForceParameters::default();
        // The route average lags the preferred speed; the target speed rises.
        let lagging = params.drive(Vec2::ZERO, Some(vec2(1.0, 0.0)), 1.0, 0.8, 1.2, 2.0);
        let on_pace = params.drive(Vec2::ZERO, Some(vec2(1.0, 0.0)), 1.0, 1.2, 1.2, 2.0);
        assert!(lagging.x > on_pace.x);
    }

    #[test]
    fn test_boundary_repulsion_points_away_and_cuts_off() {
        let params = ForceParameters::default();
        let segment = BoundarySegment::new(vec2(0.0, -5.0), vec2(0.0, 5.0), 1.0);

        let f = params.boundary_repulsion(vec2(0.3, 0.0), &segment);
        assert!(f.x > 0.0);
        assert_float_absolute_eq!(f.y, 0.0);

        let far = params.boundary_repulsion(vec2(2.0, 0.0), &segment);
        assert_eq!(far, Vec2::ZERO);
    }

    #[test]
    fn test_group_cohesion_only_beyond_comfort_radius() {
        let params = ForceParameters::default();
        let centroid = vec2(0.0, 0.0);

        assert_eq!(params.group_cohesion(vec2(0.5, 0.0), centroid, 3), Vec2::ZERO);
        let f = params.group_cohesion(vec2(4.0, 0.0), centroid, 3);
        assert!(f.x < 0.0);
        assert_eq!(params.group_cohesion(vec2(4.0, 0.0), centroid, 1), Vec2::ZERO);
    }

    #[test]
    fn test_sanitize_zeroes_non_finite_terms() {
        let mut terms = ForceTerms {
            intrinsic: vec2(1.0, 0.0),
            pedestrian: vec2(f32::NAN, 0.0),
            boundary: vec2(0.0, f32::INFINITY),
            group: Vec2::ZERO,
        };
        assert!(terms.sanitize());
        assert_eq!(terms.pedestrian, Vec2::ZERO);
        assert_eq!(terms.boundary, Vec2::ZERO);
        assert!(terms.total().is_finite());
    }
}
