use geo::algorithm::line_intersection::{line_intersection, LineIntersection};
use geo::{BoundingRect, Coord, Geometry, Line, LineString, MultiLineString, MultiPoint,
          MultiPolygon, Point, Polygon, Rect};
use glam::{vec2, Vec2};

use crate::error::SimulatorError;

pub fn to_coord(v: Vec2) -> Coord<f32> {
    Coord { x: v.x, y: v.y }
}

pub fn from_coord(c: Coord<f32>) -> Vec2 {
    vec2(c.x, c.y)
}

/// Axis-aligned bounding rectangle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Envelope {
    pub min_x: f32,
    pub min_y: f32,
    pub max_x: f32,
    pub max_y: f32,
}

impl Envelope {
    pub fn point(p: Vec2) -> Self {
        Envelope {
            min_x: p.x,
            min_y: p.y,
            max_x: p.x,
            max_y: p.y,
        }
    }

    pub fn of_segment(a: Vec2, b: Vec2) -> Self {
        Envelope {
            min_x: a.x.min(b.x),
            min_y: a.y.min(b.y),
            max_x: a.x.max(b.x),
            max_y: a.y.max(b.y),
        }
    }

    pub fn from_rect(rect: Rect<f32>) -> Self {
        Envelope {
            min_x: rect.min().x,
            min_y: rect.min().y,
            max_x: rect.max().x,
            max_y: rect.max().y,
        }
    }

    pub fn from_geometry(geometry: &Geometry<f32>) -> Option<Self> {
        geometry.bounding_rect().map(Envelope::from_rect)
    }

    pub fn expand_by(self, distance: f32) -> Self {
        Envelope {
            min_x: self.min_x - distance,
            min_y: self.min_y - distance,
            max_x: self.max_x + distance,
            max_y: self.max_y + distance,
        }
    }

    pub fn expand_to_include(self, other: &Envelope) -> Self {
        Envelope {
            min_x: self.min_x.min(other.min_x),
            min_y: self.min_y.min(other.min_y),
            max_x: self.max_x.max(other.max_x),
            max_y: self.max_y.max(other.max_y),
        }
    }

    pub fn contains_point(&self, p: Vec2) -> bool {
        p.x >= self.min_x && p.x <= self.max_x && p.y >= self.min_y && p.y <= self.max_y
    }

    pub fn contains_envelope(&self, other: &Envelope) -> bool {
        other.min_x >= self.min_x
            && other.max_x <= self.max_x
            && other.min_y >= self.min_y
            && other.max_y <= self.max_y
    }

    pub fn intersects(&self, other: &Envelope) -> bool {
        self.min_x <= other.max_x
            && self.max_x >= other.min_x
            && self.min_y <= other.max_y
            && self.max_y >= other.min_y
    }

    pub fn center(&self) -> Vec2 {
        vec2(
            (self.min_x + self.max_x) * 0.5,
            (self.min_y + self.max_y) * 0.5,
        )
    }

    pub fn is_finite(&self) -> bool {
        self.min_x.is_finite()
            && self.min_y.is_finite()
            && self.max_x.is_finite()
            && self.max_y.is_finite()
    }
}

/// True when the open interiors of the two segments intersect in a single
/// point (the DE-9IM `crosses` relation for a pair of line segments).
/// Touching at an endpoint or collinear overlap does not count.
pub fn segments_crossing(a1: Vec2, a2: Vec2, b1: Vec2, b2: Vec2) -> bool {
    let a = Line::new(to_coord(a1), to_coord(a2));
    let b = Line::new(to_coord(b1), to_coord(b2));

    matches!(
        line_intersection(a, b),
        Some(LineIntersection::SinglePoint { is_proper: true, .. })
    )
}

/// Closest point of the segment `[a, b]` to `p`; handles the degenerate
/// zero-length segment used for point obstacles.
pub fn nearest_point_on_segment(p: Vec2, a: Vec2, b: Vec2) -> Vec2 {
    let ab = b - a;
    let len2 = ab.length_squared();
    if len2 == 0.0 {
        return a;
    }
    let t = ((p - a).dot(ab) / len2).clamp(0.0, 1.0);
    a + ab * t
}

pub fn distance_to_segment(p: Vec2, a: Vec2, b: Vec2) -> f32 {
    let nearest = nearest_point_on_segment(p, a, b);
    crate::math::hypot(p.x - nearest.x, p.y - nearest.y)
}

fn clean_coords(coords: &[Coord<f32>]) -> Vec<Coord<f32>> {
    let mut cleaned: Vec<Coord<f32>> = Vec::with_capacity(coords.len());
    for c in coords {
        if !c.x.is_finite() || !c.y.is_finite() {
            continue;
        }
        if cleaned.last() == Some(c) {
            continue;
        }
        cleaned.push(*c);
    }
    cleaned
}

fn ring_from(coords: Vec<Coord<f32>>) -> Option<LineString<f32>> {
    let mut coords = coords;
    if coords.first() != coords.last() {
        if let Some(&first) = coords.first() {
            coords.push(first);
        }
    }
    // A closed ring needs three distinct vertices.
    (coords.len() >= 4).then(|| LineString::from(coords))
}

/// Repair a geometry the way the source repairs invalid inputs with a
/// zero-width buffer: non-finite coordinates are dropped, consecutive
/// duplicates collapsed, degenerate shapes demoted (a two-point polygon ring
/// becomes a line, a one-point line becomes a point). An input with nothing
/// left is an error.
pub fn sanitize(geometry: Geometry<f32>) -> Result<Geometry<f32>, SimulatorError> {
    match geometry {
        Geometry::Point(p) => {
            if p.x().is_finite() && p.y().is_finite() {
                Ok(Geometry::Point(p))
            } else {
                Err(SimulatorError::geometry("point has non-finite coordinates"))
            }
        }
        Geometry::Line(line) => sanitize_line_string(LineString::from(vec![line.start, line.end])),
        Geometry::LineString(ls) => sanitize_line_string(ls),
        Geometry::Polygon(polygon) => sanitize_polygon(polygon),
        Geometry::Rect(rect) => sanitize_polygon(rect.to_polygon()),
        Geometry::Triangle(tri) => sanitize_polygon(tri.to_polygon()),
        Geometry::MultiPoint(MultiPoint(points)) => {
            let kept: Vec<Point<f32>> = points
                .into_iter()
                .filter(|p| p.x().is_finite() && p.y().is_finite())
                .collect();
            if kept.is_empty() {
                Err(SimulatorError::geometry("multi-point is empty"))
            } else {
                Ok(Geometry::MultiPoint(MultiPoint(kept)))
            }
        }
        Geometry::MultiLineString(MultiLineString(lines)) => {
            let kept: Vec<LineString<f32>> = lines
                .into_iter()
                .filter_map(|ls| match sanitize_line_string(ls) {
                    Ok(Geometry::LineString(ls)) => Some(ls),
                    Ok(Geometry::Point(p)) => Some(LineString::from(vec![p.0, p.0])),
                    _ => None,
                })
                .collect();
            if kept.is_empty() {
                Err(SimulatorError::geometry("multi-line-string is empty"))
            } else {
                Ok(Geometry::MultiLineString(MultiLineString(kept)))
            }
        }
        Geometry::MultiPolygon(MultiPolygon(polygons)) => {
            let mut kept = Vec::new();
            for polygon in polygons {
                if let Ok(Geometry::Polygon(p)) = sanitize_polygon(polygon) {
                    kept.push(p);
                }
            }
            if kept.is_empty() {
                Err(SimulatorError::geometry("multi-polygon is empty"))
            } else {
                Ok(Geometry::MultiPolygon(MultiPolygon(kept)))
            }
        }
        Geometry::GeometryCollection(_) => Err(SimulatorError::geometry(
            "geometry collections are not supported as boundaries",
        )),
    }
}

fn sanitize_line_string(ls: LineString<f32>) -> Result<Geometry<f32>, SimulatorError> {
    let cleaned = clean_coords(&ls.0);
    match cleaned.len() {
        0 => Err(SimulatorError::geometry("line string is empty")),
        1 => Ok(Geometry::Point(Point(cleaned[0]))),
        _ => Ok(Geometry::LineString(LineString::from(cleaned))),
    }
}

fn sanitize_polygon(polygon: Polygon<f32>) -> Result<Geometry<f32>, SimulatorError> {
    let (exterior, interiors) = polygon.into_inner();
    let mut cleaned = clean_coords(&exterior.0);
    if cleaned.len() > 1 && cleaned.first() == cleaned.last() {
        cleaned.pop();
    }

    match cleaned.len() {
        0 => Err(SimulatorError::geometry("polygon exterior is empty")),
        1 => Ok(Geometry::Point(Point(cleaned[0]))),
        2 => Ok(Geometry::LineString(LineString::from(cleaned))),
        _ => {
            let exterior = ring_from(cleaned)
                .ok_or_else(|| SimulatorError::geometry("polygon exterior degenerated"))?;
            let interiors: Vec<LineString<f32>> = interiors
                .into_iter()
                .filter_map(|ring| {
                    let mut coords = clean_coords(&ring.0);
                    if coords.len() > 1 && coords.first() == coords.last() {
                        coords.pop();
                    }
                    ring_from(coords)
                })
                .collect();
            Ok(Geometry::Polygon(Polygon::new(exterior, interiors)))
        }
    }
}

fn push_split(segments: &mut Vec<[Vec2; 2]>, a: Vec2, b: Vec2, split: Option<f32>) {
    match split {
        Some(max_len) if max_len > 0.0 => {
            let length = (b - a).length();
            let chunks = (length / max_len).ceil().max(1.0) as usize;
            for i in 0..chunks {
                let t0 = i as f32 / chunks as f32;
                let t1 = (i + 1) as f32 / chunks as f32;
                segments.push([a.lerp(b, t0), a.lerp(b, t1)]);
            }
        }
        _ => segments.push([a, b]),
    }
}

fn segmentize_ring(segments: &mut Vec<[Vec2; 2]>, ring: &LineString<f32>, split: Option<f32>) {
    for line in ring.lines() {
        push_split(segments, from_coord(line.start), from_coord(line.end), split);
    }
}

/// Decompose a geometry into the ordered list of its points and line
/// segments. Point geometries become zero-length segments. `split` bounds
/// the segment length; `None` keeps segments whole.
pub fn segmentize(geometry: &Geometry<f32>, split: Option<f32>) -> Vec<[Vec2; 2]> {
    let mut segments = Vec::new();
    match geometry {
        Geometry::Point(p) => {
            let v = vec2(p.x(), p.y());
            segments.push([v, v]);
        }
        Geometry::Line(line) => push_split(
            &mut segments,
            from_coord(line.start),
            from_coord(line.end),
            split,
        ),
        Geometry::LineString(ls) => {
            if ls.0.len() == 1 {
                let v = from_coord(ls.0[0]);
                segments.push([v, v]);
            }
            for line in ls.lines() {
                push_split(&mut segments, from_coord(line.start), from_coord(line.end), split);
            }
        }
        Geometry::Polygon(polygon) => {
            segmentize_ring(&mut segments, polygon.exterior(), split);
            for interior in polygon.interiors() {
                segmentize_ring(&mut segments, interior, split);
            }
        }
        Geometry::MultiPoint(points) => {
            for p in &points.0 {
                let v = vec2(p.x(), p.y());
                segments.push([v, v]);
            }
        }
        Geometry::MultiLineString(lines) => {
            for ls in &lines.0 {
                segments.extend(segmentize(&Geometry::LineString(ls.clone()), split));
            }
        }
        Geometry::MultiPolygon(polygons) => {
            for polygon in &polygons.0 {
                segments.extend(segmentize(&Geometry::Polygon(polygon.clone()), split));
            }
        }
        Geometry::Rect(rect) => {
            segments.extend(segmentize(&Geometry::Polygon(rect.to_polygon()), split));
        }
        Geometry::Triangle(tri) => {
            segments.extend(segmentize(&Geometry::Polygon(tri.to_polygon()), split));
        }
        Geometry::GeometryCollection(_) => {}
    }
    segments
}
