use geo::{Contains, Geometry, Point};
use glam::Vec2;

use crate::error::SimulatorError;
use crate::geometry::{
    distance_to_segment, nearest_point_on_segment, sanitize, segmentize, Envelope,
};

/// One piece of a decomposed boundary: a line segment, or a point obstacle
/// stored as a zero-length segment. Immutable.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundarySegment {
    line: [Vec2; 2],
    envelope: Envelope,
}

impl BoundarySegment {
    pub fn new(a: Vec2, b: Vec2, interaction_distance: f32) -> Self {
        BoundarySegment {
            line: [a, b],
            envelope: Envelope::of_segment(a, b).expand_by(interaction_distance),
        }
    }

    pub fn start(&self) -> Vec2 {
        self.line[0]
    }

    pub fn end(&self) -> Vec2 {
        self.line[1]
    }

    /// Bounding box expanded by the boundary interaction distance.
    pub fn envelope(&self) -> Envelope {
        self.envelope
    }

    pub fn nearest_point(&self, p: Vec2) -> Vec2 {
        nearest_point_on_segment(p, self.line[0], self.line[1])
    }

    pub fn distance(&self, p: Vec2) -> f32 {
        distance_to_segment(p, self.line[0], self.line[1])
    }
}

/// A static obstacle: sanitized planar geometry decomposed into segments at
/// construction. Immutable once built.
#[derive(Debug, Clone)]
pub struct Boundary {
    geometry: Geometry<f32>,
    bounding_box: Envelope,
    segments: Vec<BoundarySegment>,
}

impl Boundary {
    /// Builds a boundary from any supported planar geometry. Invalid input
    /// is healed where possible; geometry with nothing left fails with
    /// [`SimulatorError::GeometryInvalid`]. `split` caps the segment length
    /// (`None` keeps segments whole).
    pub fn new(
        geometry: Geometry<f32>,
        interaction_distance: f32,
        split: Option<f32>,
    ) -> Result<Self, SimulatorError> {
        let geometry = sanitize(geometry)?;
        let raw = Envelope::from_geometry(&geometry)
            .ok_or_else(|| SimulatorError::geometry("boundary geometry is empty"))?;

        let segments: Vec<BoundarySegment> = segmentize(&geometry, split)
            .into_iter()
            .map(|[a, b]| BoundarySegment::new(a, b, interaction_distance))
            .collect();
        if segments.is_empty() {
            return Err(SimulatorError::geometry(
                "boundary geometry has no segments",
            ));
        }

        Ok(Boundary {
            geometry,
            bounding_box: raw.expand_by(interaction_distance),
            segments,
        })
    }

    pub fn geometry(&self) -> &Geometry<f32> {
        &self.geometry
    }

    /// Bounding box expanded by the boundary interaction distance.
    pub fn envelope(&self) -> Envelope {
        self.bounding_box
    }

    pub fn segments(&self) -> &[BoundarySegment] {
        &self.segments
    }

    pub fn distance_to(&self, p: Vec2) -> f32 {
        self.segments
            .iter()
            .map(|s| s.distance(p))
            .fold(f32::INFINITY, f32::min)
    }

    /// True when `p` lies in the interior of an areal boundary.
    pub fn contains(&self, p: Vec2) -> bool {
        let point = Point::new(p.x, p.y);
        match &self.geometry {
            Geometry::Polygon(polygon) => polygon.contains(&point),
            Geometry::MultiPolygon(polygons) => polygons.contains(&point),
            _ => false,
        }
    }

    /// True when `p` is inside the boundary or closer to it than `clearance`.
    pub fn within_clearance(&self, p: Vec2, clearance: f32) -> bool {
        self.contains(p) || self.distance_to(p) < clearance
    }
}

#[cfg(test)]
mod tests {
    use assert_float_eq::*;
    use geo::{line_string, polygon, Geometry};
    use glam::vec2;

    use super::*;

    #[test]
    fn test_polygon_boundary_segments() {
        let square = polygon![
            (x: 0.0, y: 0.0),
            (x: 2.0, y: 0.0),
            (x: 2.0, y: 2.0),
            (x: 0.0, y: 2.0),
        ];
        let boundary = Boundary::new(Geometry::Polygon(square), 0.8, None).unwrap();

        assert_eq!(boundary.segments().len(), 4);
        assert!(boundary.contains(vec2(1.0, 1.0)));
        assert!(!boundary.contains(vec2(3.0, 1.0)));
        assert_float_absolute_eq!(boundary.distance_to(vec2(3.0, 1.0)), 1.0);
        assert!(boundary.envelope().contains_point(vec2(2.5, 1.0)));
    }

    #[test]
    fn test_point_boundary_degenerates_to_zero_length_segment() {
        let boundary =
            Boundary::new(Geometry::Point(geo::Point::new(5.0_f32, 5.0)), 0.5, None).unwrap();
        assert_eq!(boundary.segments().len(), 1);
        assert_eq!(boundary.segments()[0].start(), boundary.segments()[0].end());
        assert_float_absolute_eq!(boundary.distance_to(vec2(5.0, 7.0)), 2.0);
    }

    #[test]
    fn test_invalid_geometry_is_rejected() {
        let nan_only = line_string![(x: f32::NAN, y: 0.0), (x: f32::NAN, y: 1.0)];
        assert!(Boundary::new(Geometry::LineString(nan_only), 0.5, None).is_err());
    }

    #[test]
    fn test_split_tunable() {
        let wall = line_string![(x: 0.0, y: 0.0), (x: 30.0, y: 0.0)];
        let whole = Boundary::new(Geometry::LineString(wall.clone()), 0.5, None).unwrap();
        assert_eq!(whole.segments().len(), 1);

        let split = Boundary::new(Geometry::LineString(wall), 0.5, Some(10.0)).unwrap();
        assert_eq!(split.segments().len(), 3);
    }

    #[test]
    fn test_clearance() {
        let wall = line_string![(x: 0.0, y: -5.0), (x: 0.0, y: 5.0)];
        let boundary = Boundary::new(Geometry::LineString(wall), 0.5, None).unwrap();
        assert!(boundary.within_clearance(vec2(0.2, 0.0), 0.3));
        assert!(!boundary.within_clearance(vec2(0.5, 0.0), 0.3));
    }
}
