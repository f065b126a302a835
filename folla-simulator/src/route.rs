use geo::{Contains, LineString, Point, Polygon};
use glam::{vec2, Vec2};

use crate::error::SimulatorError;
use crate::geometry::{distance_to_segment, segments_crossing, to_coord, Envelope};
use crate::quadtree::SceneIndex;

// Target lines never shrink below this half-width; a narrower line could no
// longer register crossings.
const MIN_HALF_WIDTH: f32 = 0.05;

/// An ordered entry of a route. Built once by [`Route::build`], immutable
/// afterwards.
#[derive(Debug, Clone)]
pub struct WayPoint {
    index: usize,
    coordinate: Vec2,
    direction: Vec2,
    width: f32,
    target_line: [Vec2; 2],
    passing_area: Option<Polygon<f32>>,
    connection: Option<[Vec2; 2]>,
}

impl WayPoint {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn coordinate(&self) -> Vec2 {
        self.coordinate
    }

    /// Normalized route direction at this waypoint.
    pub fn direction(&self) -> Vec2 {
        self.direction
    }

    pub fn width(&self) -> f32 {
        self.width
    }

    /// Perpendicular segment across the route the pedestrian must cross to
    /// advance past this waypoint.
    pub fn target_line(&self) -> [Vec2; 2] {
        self.target_line
    }

    /// Straight segment from the predecessor waypoint, if any.
    pub fn connection(&self) -> Option<[Vec2; 2]> {
        self.connection
    }

    /// True when the move `(from, to)` crosses this waypoint's target line.
    pub fn crossed_by(&self, from: Vec2, to: Vec2) -> bool {
        segments_crossing(from, to, self.target_line[0], self.target_line[1])
    }

    /// True when `p` lies between the predecessor's target line and this one.
    pub fn passing_area_contains(&self, p: Vec2) -> bool {
        self.passing_area
            .as_ref()
            .map(|area| area.contains(&Point::new(p.x, p.y)))
            .unwrap_or(false)
    }
}

/// An ordered sequence of waypoints, shared by reference between the
/// pedestrians of a crowd. Traversal state is per-pedestrian.
#[derive(Debug, Clone)]
pub struct Route {
    waypoints: Vec<WayPoint>,
}

impl Route {
    /// Builds a route from ordered coordinates. Target lines are clipped
    /// against nearby boundaries: the width shrinks until the line neither
    /// crosses a boundary segment nor comes within `clearance` of one.
    /// A waypoint inside a boundary (or closer than `clearance`) is a
    /// configuration error.
    pub fn build(
        coords: &[Vec2],
        width: f32,
        index: &SceneIndex,
        clearance: f32,
    ) -> Result<Self, SimulatorError> {
        if coords.is_empty() {
            return Err(SimulatorError::configuration(
                "route must contain at least one way point",
            ));
        }
        if !(width > 0.0) {
            return Err(SimulatorError::configuration(
                "way point width must be positive",
            ));
        }
        for (i, c) in coords.iter().enumerate() {
            if !c.is_finite() {
                return Err(SimulatorError::configuration(format!(
                    "way point {i} has non-finite coordinates"
                )));
            }
        }

        let directions = route_directions(coords);
        let mut waypoints = Vec::with_capacity(coords.len());

        for (i, (&coordinate, &direction)) in coords.iter().zip(&directions).enumerate() {
            for boundary in
                index.boundaries_within(&Envelope::point(coordinate).expand_by(clearance))
            {
                if boundary.within_clearance(coordinate, clearance) {
                    return Err(SimulatorError::configuration(format!(
                        "way point {i} lies inside or too close to a boundary"
                    )));
                }
            }

            let target_line = clip_target_line(coordinate, direction, width, index, clearance);

            let connection = (i > 0).then(|| [coords[i - 1], coordinate]);
            let passing_area = waypoints
                .last()
                .map(|previous: &WayPoint| passing_area(previous.target_line, target_line));

            waypoints.push(WayPoint {
                index: i,
                coordinate,
                direction,
                width,
                target_line,
                passing_area,
                connection,
            });
        }

        Ok(Route { waypoints })
    }

    pub fn waypoints(&self) -> &[WayPoint] {
        &self.waypoints
    }

    pub fn get(&self, index: usize) -> Option<&WayPoint> {
        self.waypoints.get(index)
    }

    pub fn len(&self) -> usize {
        self.waypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty()
    }

    pub fn last_index(&self) -> usize {
        self.waypoints.len() - 1
    }
}

// Direction of approach: from the previous waypoint, or toward the next for
// the first one. The target line is laid perpendicular to it, across the
// route.
fn route_directions(coords: &[Vec2]) -> Vec<Vec2> {
    let mut directions = Vec::with_capacity(coords.len());
    for i in 0..coords.len() {
        let dir = if i > 0 {
            (coords[i] - coords[i - 1]).try_normalize()
        } else if coords.len() > 1 {
            (coords[1] - coords[0]).try_normalize()
        } else {
            None
        };
        // Duplicate consecutive coordinates inherit the previous direction.
        let fallback = directions.last().copied().unwrap_or(Vec2::X);
        directions.push(dir.unwrap_or(fallback));
    }
    directions
}

fn clip_target_line(
    coordinate: Vec2,
    direction: Vec2,
    width: f32,
    index: &SceneIndex,
    clearance: f32,
) -> [Vec2; 2] {
    let perpendicular = vec2(-direction.y, direction.x);
    let mut half = width * 0.5;

    while half > MIN_HALF_WIDTH {
        let a = coordinate + perpendicular * half;
        let b = coordinate - perpendicular * half;
        let probe = Envelope::of_segment(a, b).expand_by(clearance);

        let blocked = index.boundary_segments_within(&probe).iter().any(|seg| {
            segments_crossing(a, b, seg.start(), seg.end())
                || segment_distance(a, b, seg.start(), seg.end()) < clearance
        });
        if !blocked {
            return [a, b];
        }
        half *= 0.5;
    }

    [
        coordinate + perpendicular * MIN_HALF_WIDTH,
        coordinate - perpendicular * MIN_HALF_WIDTH,
    ]
}

// Minimum distance between two non-crossing segments.
fn segment_distance(a1: Vec2, a2: Vec2, b1: Vec2, b2: Vec2) -> f32 {
    distance_to_segment(a1, b1, b2)
        .min(distance_to_segment(a2, b1, b2))
        .min(distance_to_segment(b1, a1, a2))
        .min(distance_to_segment(b2, a1, a2))
}

fn passing_area(previous: [Vec2; 2], current: [Vec2; 2]) -> Polygon<f32> {
    let ring = LineString::from(vec![
        to_coord(previous[0]),
        to_coord(previous[1]),
        to_coord(current[1]),
        to_coord(current[0]),
        to_coord(previous[0]),
    ]);
    Polygon::new(ring, vec![])
}
