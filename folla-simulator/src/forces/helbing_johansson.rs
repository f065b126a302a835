use glam::Vec2;

use crate::pedestrian::PedestrianSnapshot;

use super::{ForceModel, ForceParameters};

/// Elliptical-specification variant after Johansson, Helbing and Shukla
/// (2007): the interaction distance is the semi-minor axis of an ellipse
/// whose far focus is offset by the step the other pedestrian takes.
/// Experimental; prefer [`HelbingBuznaModel`](super::HelbingBuznaModel) in
/// production.
#[derive(Debug, Clone)]
pub struct HelbingJohanssonModel {
    params: ForceParameters,
    /// Duration ΔT of the other pedestrian's anticipated step.
    step_duration: f32,
}

impl Default for HelbingJohanssonModel {
    fn default() -> Self {
        HelbingJohanssonModel {
            params: ForceParameters::default(),
            step_duration: 0.5,
        }
    }
}

impl HelbingJohanssonModel {
    pub fn new(params: ForceParameters, step_duration: f32) -> Self {
        HelbingJohanssonModel {
            params,
            step_duration,
        }
    }
}

impl ForceModel for HelbingJohanssonModel {
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
        let step = other.velocity * self.step_duration;
        if distance > p.max_pedestrian_interaction_distance() + step.length() {
            return Vec2::ZERO;
        }

        let normal = diff.try_normalize().unwrap_or(Vec2::X);

        // Semi-minor axis of the ellipse with foci at the two positions, the
        // far one advanced by the other's step.
        let to_far_focus = diff - step;
        let focal_sum = distance + to_far_focus.length();
        let b = 0.5 * (focal_sum * focal_sum - step.length_squared()).max(0.0).sqrt();

        // Repulsion acts along the gradient of b.
        let direction = if distance > f32::EPSILON && to_far_focus.length() > f32::EPSILON {
            let gradient = focal_sum * (diff / distance + to_far_focus / to_far_focus.length());
            gradient.try_normalize().unwrap_or(normal)
        } else {
            normal
        };

        let r = self.pedestrian_radius() + other.radius;
        // As in the circular form, only the second term is anisotropic.
        let magnitude = p.pedestrian_a1 * ((r - b) / p.pedestrian_b1).exp()
            + p.pedestrian_a2 * ((r - b) / p.pedestrian_b2).exp()
                * p.anisotropy(velocity, -normal);
        // The exponent is bounded by construction (b ≥ 0), but a slow-moving
        // far focus can leave b slightly above the circular distance; cap at
        // the contact magnitude to keep the output within the contact bound.
        let contact = p.pedestrian_a1 * (r / p.pedestrian_b1).exp()
            + p.pedestrian_a2 * (r / p.pedestrian_b2).exp();

        direction * magnitude.min(contact)
    }
}
