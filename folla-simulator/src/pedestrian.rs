use std::sync::Arc;

use geo::{Area, ConvexHull, MultiPoint, Point, Polygon};
use glam::Vec2;

use crate::forces::ForceTerms;
use crate::geometry::Envelope;
use crate::route::Route;
use crate::wayfinding::WayFinding;

/// One simulated agent. Owned by its crowd; never shared across crowds.
#[derive(Debug, Clone)]
pub struct Pedestrian {
    pub id: u64,
    pub position: Vec2,
    pub previous_position: Vec2,
    pub velocity: Vec2,
    /// Preferred walking speed on open ground.
    pub desired_speed: f32,
    /// Hard ceiling on the committed speed.
    pub maximum_speed: f32,
    pub radius: f32,
    pub group: u32,
    /// Force components of the last tick.
    pub forces: ForceTerms,
    pub wayfinding: WayFinding,
    /// Set when the loop had to recover this pedestrian from a non-finite
    /// state.
    pub stuck: bool,
}

impl Pedestrian {
    pub fn new(
        id: u64,
        position: Vec2,
        route: Arc<Route>,
        desired_speed: f32,
        radius: f32,
        group: u32,
    ) -> Self {
        Pedestrian {
            id,
            position,
            previous_position: position,
            velocity: Vec2::ZERO,
            desired_speed,
            maximum_speed: desired_speed * 1.3,
            radius,
            group,
            forces: ForceTerms::default(),
            wayfinding: WayFinding::new(route, position, desired_speed),
            stuck: false,
        }
    }

    pub fn snapshot(&self) -> PedestrianSnapshot {
        PedestrianSnapshot {
            id: self.id,
            position: self.position,
            velocity: self.velocity,
            radius: self.radius,
        }
    }

    /// Envelope of the positions this pedestrian interacts across.
    pub fn envelope(&self, reach: f32) -> Envelope {
        Envelope::point(self.position).expand_by(reach)
    }
}

/// Immutable per-tick copy indexed by the pedestrian quadtree. Mutating the
/// live pedestrian never changes a snapshot already handed to readers.
#[derive(Debug, Clone, PartialEq)]
pub struct PedestrianSnapshot {
    pub id: u64,
    pub position: Vec2,
    pub velocity: Vec2,
    pub radius: f32,
}

/// Pedestrians whose centroid drives the optional cohesion force. Every
/// pedestrian belongs to one (a singleton unless configured otherwise).
#[derive(Debug, Clone)]
pub struct Group {
    pub id: u32,
    pub members: Vec<u64>,
}

/// A set of pedestrians sharing one route.
#[derive(Debug, Clone)]
pub struct Crowd {
    id: u32,
    route: Arc<Route>,
    pedestrians: Vec<Pedestrian>,
    groups: Vec<Group>,
}

impl Crowd {
    pub(crate) fn new(id: u32, route: Arc<Route>, pedestrians: Vec<Pedestrian>) -> Self {
        let groups = pedestrians
            .iter()
            .map(|p| Group {
                id: p.group,
                members: vec![p.id],
            })
            .collect();

        Crowd {
            id,
            route,
            pedestrians,
            groups,
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn route(&self) -> &Arc<Route> {
        &self.route
    }

    pub fn pedestrians(&self) -> &[Pedestrian] {
        &self.pedestrians
    }

    pub(crate) fn pedestrians_mut(&mut self) -> &mut [Pedestrian] {
        &mut self.pedestrians
    }

    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    /// Merge all members into shared groups of at most `size` pedestrians.
    pub fn assign_groups(&mut self, size: usize) {
        if size == 0 {
            return;
        }
        self.groups.clear();
        for (chunk_index, chunk) in self.pedestrians.chunks_mut(size).enumerate() {
            let id = chunk_index as u32;
            let mut members = Vec::with_capacity(chunk.len());
            for p in chunk.iter_mut() {
                p.group = id;
                members.push(p.id);
            }
            self.groups.push(Group { id, members });
        }
    }

    pub fn size(&self) -> usize {
        self.pedestrians.len()
    }

    /// Mean position of the members.
    pub fn centroid(&self) -> Option<Vec2> {
        if self.pedestrians.is_empty() {
            return None;
        }
        let sum: Vec2 = self.pedestrians.iter().map(|p| p.position).sum();
        Some(sum / self.pedestrians.len() as f32)
    }

    /// Convex hull around the members.
    pub fn outline(&self) -> Option<Polygon<f32>> {
        if self.pedestrians.len() < 3 {
            return None;
        }
        let points: MultiPoint<f32> = self
            .pedestrians
            .iter()
            .map(|p| Point::new(p.position.x, p.position.y))
            .collect();
        Some(points.convex_hull())
    }

    /// Pedestrians per square metre over the outline polygon.
    pub fn density(&self) -> Option<f32> {
        let area = self.outline()?.unsigned_area();
        (area > f32::EPSILON).then(|| self.size() as f32 / area)
    }
}
