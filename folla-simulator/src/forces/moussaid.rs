use glam::Vec2;

use crate::pedestrian::PedestrianSnapshot;

use super::{ForceModel, ForceParameters};

/// Heuristic model after Moussaïd, Helbing and Theraulaz (2011).
///
/// Only the drive term is in place; the vision-based interaction terms are
/// pending.
// TODO: interaction terms (desired-direction heuristic over obstructed
// sight lines) once the published parameter set is wired in.
#[derive(Debug, Clone, Default)]
pub struct MoussaidModel {
    params: ForceParameters,
}

impl MoussaidModel {
    pub fn new(params: ForceParameters) -> Self {
        MoussaidModel { params }
    }
}

impl ForceModel for MoussaidModel {
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
        _position: Vec2,
        _velocity: Vec2,
        _other: &PedestrianSnapshot,
    ) -> Vec2 {
        Vec2::ZERO
    }
}
