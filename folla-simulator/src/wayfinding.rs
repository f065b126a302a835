use std::sync::Arc;

use glam::Vec2;
use ordered_float::NotNan;

use crate::route::{Route, WayPoint};

const COURSE_CHECK_INTERVAL: f64 = 2.0;
const COURSE_HYSTERESIS: f32 = 0.5;
const AVERAGE_BLEND: f32 = 0.1;
const ARRIVAL_RADIUS: f32 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WayFindingState {
    /// Moving toward the current target waypoint.
    Seeking,
    /// Inside the passing area of the current waypoint, about to cross its
    /// target line.
    Passing,
    /// A move was vetoed or the course degraded; the target is re-selected
    /// at the next model update.
    Reorienting,
    Finished,
}

/// Per-pedestrian route-following state. The route itself is shared and
/// immutable; everything here belongs to one pedestrian.
#[derive(Debug, Clone)]
pub struct WayFinding {
    route: Arc<Route>,
    state: WayFindingState,
    target: usize,
    needs_orientation: bool,
    average_velocity: f32,
    start_distance: f32,
    last_update: f64,
    last_course_check: f64,
}

impl WayFinding {
    pub fn new(route: Arc<Route>, position: Vec2, desired_speed: f32) -> Self {
        let start_distance = route
            .get(0)
            .map(|wp| (wp.coordinate() - position).length())
            .unwrap_or(0.0);

        WayFinding {
            route,
            state: WayFindingState::Seeking,
            target: 0,
            needs_orientation: false,
            average_velocity: desired_speed,
            start_distance,
            last_update: 0.0,
            last_course_check: 0.0,
        }
    }

    pub fn route(&self) -> &Arc<Route> {
        &self.route
    }

    pub fn state(&self) -> WayFindingState {
        self.state
    }

    pub fn target_index(&self) -> usize {
        self.target
    }

    pub fn target_waypoint(&self) -> Option<&WayPoint> {
        if self.is_route_finished() {
            None
        } else {
            self.route.get(self.target)
        }
    }

    pub fn is_route_finished(&self) -> bool {
        self.state == WayFindingState::Finished
    }

    pub fn needs_orientation(&self) -> bool {
        self.needs_orientation
    }

    /// Raised by the integrator when a move was vetoed by a boundary; the
    /// next [`update_model`](Self::update_model) call re-targets.
    pub fn set_needs_orientation(&mut self) {
        if self.state != WayFindingState::Finished {
            self.needs_orientation = true;
            self.state = WayFindingState::Reorienting;
        }
    }

    /// Exponentially averaged progress speed along the route.
    pub fn average_velocity(&self) -> f32 {
        self.average_velocity
    }

    /// Unit vector from `p` to the current target; `None` once the route is
    /// finished.
    pub fn normalized_direction(&self, p: Vec2) -> Option<Vec2> {
        let wp = self.target_waypoint()?;
        Some(
            (wp.coordinate() - p)
                .try_normalize()
                .unwrap_or_else(|| wp.direction()),
        )
    }

    /// Pace multiplier in `[0, 1]`: ramps down inside the arrival radius of
    /// the final waypoint so the pedestrian settles instead of orbiting, and
    /// drops to zero when the route is finished.
    pub fn pace_factor(&self, p: Vec2) -> f32 {
        match self.target_waypoint() {
            None => 0.0,
            Some(wp) if wp.index() == self.route.last_index() => {
                ((wp.coordinate() - p).length() / ARRIVAL_RADIUS).min(1.0)
            }
            Some(_) => 1.0,
        }
    }

    /// Consumes one committed move: re-targets after a vetoed move, blends
    /// the average route velocity, detects target-line crossings and
    /// advances the target.
    pub fn update_model(&mut self, t: f64, p_old: Vec2, p_new: Vec2) {
        if self.state == WayFindingState::Finished {
            return;
        }
        if self.needs_orientation {
            self.reorient(p_new);
        }
        let Some(wp) = self.route.get(self.target) else {
            return;
        };

        let elapsed = (t - self.last_update) as f32;
        if elapsed > 0.0 {
            let along = wp
                .connection()
                .and_then(|[a, b]| (b - a).try_normalize())
                .unwrap_or_else(|| wp.direction());
            let progress = (p_new - p_old).dot(along) / elapsed;
            self.average_velocity += AVERAGE_BLEND * (progress - self.average_velocity);
        }
        self.last_update = t;

        if wp.crossed_by(p_old, p_new) {
            if self.target == self.route.last_index() {
                self.state = WayFindingState::Finished;
            } else {
                self.target += 1;
                self.state = WayFindingState::Seeking;
                self.start_distance = self.distance_to_target(p_new);
            }
        } else {
            self.state = if wp.passing_area_contains(p_new) {
                WayFindingState::Passing
            } else {
                WayFindingState::Seeking
            };
        }
    }

    /// Periodic sanity check: flags re-orientation when the pedestrian has
    /// drifted further from its target than when it started toward it.
    pub fn check_course(&mut self, p: Vec2, t: f64) {
        if self.state == WayFindingState::Finished {
            return;
        }
        if t - self.last_course_check < COURSE_CHECK_INTERVAL {
            return;
        }
        self.last_course_check = t;

        if self.distance_to_target(p) > self.start_distance + COURSE_HYSTERESIS {
            self.set_needs_orientation();
        }
    }

    fn distance_to_target(&self, p: Vec2) -> f32 {
        self.route
            .get(self.target)
            .map(|wp| (wp.coordinate() - p).length())
            .unwrap_or(0.0)
    }

    // Pick the nearest not-yet-reached waypoint as the new target.
    fn reorient(&mut self, p: Vec2) {
        let nearest = (self.target..self.route.len())
            .filter_map(|i| {
                let wp = self.route.get(i)?;
                let d = (wp.coordinate() - p).length();
                NotNan::new(d).ok().map(|d| (d, i))
            })
            .min_by_key(|(d, _)| *d);

        if let Some((_, index)) = nearest {
            self.target = index;
            self.start_distance = self.distance_to_target(p);
        }
        self.needs_orientation = false;
        self.state = WayFindingState::Seeking;
    }
}
