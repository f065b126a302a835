use geo::{Geometry, LineString, Point, Polygon};
use glam::Vec2;
use serde::Deserialize;

use crate::SimulatorOptions;

const fn f_two() -> f32 {
    2.0
}

/// Scenario data, typically loaded from a TOML file by the driver.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub options: SimulatorOptions,
    #[serde(default)]
    pub boundaries: Vec<BoundaryConfig>,
    pub crowds: Vec<CrowdConfig>,
}

/// A static obstacle: an open polyline, a closed polygon, or a single
/// point.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct BoundaryConfig {
    pub vertices: Vec<Vec2>,
    /// Close the polyline into a polygon.
    #[serde(default)]
    pub closed: bool,
}

impl BoundaryConfig {
    pub fn to_geometry(&self) -> Geometry<f32> {
        let coords: Vec<(f32, f32)> = self.vertices.iter().map(|v| (v.x, v.y)).collect();
        match (coords.len(), self.closed) {
            (1, _) => Geometry::Point(Point::new(coords[0].0, coords[0].1)),
            (_, true) => Geometry::Polygon(Polygon::new(LineString::from(coords), vec![])),
            (_, false) => Geometry::LineString(LineString::from(coords)),
        }
    }
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct CrowdConfig {
    /// Initial pedestrian positions.
    pub spawn_points: Vec<Vec2>,
    /// Ordered way point coordinates.
    pub route: Vec<Vec2>,
    #[serde(default = "f_two")]
    pub waypoint_width: f32,
    /// Pinned preferred speed; sampled per pedestrian when absent.
    #[serde(default)]
    pub desired_speed: Option<f32>,
    /// Drop invalid spawn points instead of failing.
    #[serde(default)]
    pub ignore_invalid: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boundary_geometry_kinds() {
        let point = BoundaryConfig {
            vertices: vec![Vec2::new(1.0, 2.0)],
            closed: false,
        };
        assert!(matches!(point.to_geometry(), Geometry::Point(_)));

        let wall = BoundaryConfig {
            vertices: vec![Vec2::new(0.0, 0.0), Vec2::new(5.0, 0.0)],
            closed: false,
        };
        assert!(matches!(wall.to_geometry(), Geometry::LineString(_)));

        let block = BoundaryConfig {
            vertices: vec![
                Vec2::new(0.0, 0.0),
                Vec2::new(1.0, 0.0),
                Vec2::new(1.0, 1.0),
            ],
            closed: true,
        };
        assert!(matches!(block.to_geometry(), Geometry::Polygon(_)));
    }
}
