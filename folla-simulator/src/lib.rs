//! Microscopic pedestrian crowd simulation after the Social Force Model of
//! Helbing and Molnár: self-driven agents accelerated by an intrinsic drive
//! along a route plus repulsion from other pedestrians and from static
//! boundaries, advanced in discrete ticks against a shared quadtree
//! snapshot.

pub mod boundary;
pub mod clock;
pub mod diagnostic;
pub mod error;
pub mod forces;
pub mod geometry;
pub mod integrator;
pub mod math;
pub mod pedestrian;
pub mod quadtree;
pub mod route;
pub mod scenario;
pub mod wayfinding;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use geo::Geometry;
use glam::Vec2;
use log::{info, warn};
use rayon::prelude::*;
use rustc_hash::FxHashMap;
use serde::Deserialize;

use boundary::Boundary;
use clock::FastForwardClock;
use diagnostic::{DiagnosticLog, IntervalWindow, StepMetrics};
pub use error::SimulatorError;
use forces::ForceModel;
pub use forces::ForceModelKind;
use integrator::{ForceEvaluator, Integrator};
pub use integrator::IntegratorKind;
use math::clipped_normal;
use pedestrian::{Crowd, Pedestrian};
use quadtree::SceneIndex;
use route::Route;

pub const MAX_FAST_FORWARD_FACTOR: u32 = 5;

// Preferred walking speed distribution (m/s), clipped.
const SPEED_MEAN: f32 = 1.34;
const SPEED_SD: f32 = 0.26;
const SPEED_MIN: f32 = 0.5;
const SPEED_MAX: f32 = 2.2;

/// Simulator options.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SimulatorOptions {
    /// Simulated seconds per tick.
    pub tick_delta: f32,
    /// Wall-to-simulated time multiplier, 0..=5; 0 is paused.
    pub fast_forward_factor: u32,
    pub force_model: ForceModelKind,
    pub integrator: IntegratorKind,
    /// Seed for per-pedestrian speed sampling.
    pub seed: u64,
    /// Maximum boundary segment length; `None` keeps segments whole.
    pub boundary_segment_split: Option<f32>,
    /// Clearance way points and spawn points must keep from boundaries.
    pub boundary_clearance: f32,
    /// Enable the experimental group cohesion force.
    pub group_cohesion: bool,
}

impl Default for SimulatorOptions {
    fn default() -> Self {
        SimulatorOptions {
            tick_delta: 0.1,
            fast_forward_factor: 1,
            force_model: ForceModelKind::default(),
            integrator: IntegratorKind::default(),
            seed: 0,
            boundary_segment_split: None,
            boundary_clearance: 0.3,
            group_cohesion: false,
        }
    }
}

/// Per-crowd construction settings.
#[derive(Debug, Clone)]
pub struct CrowdSettings {
    pub waypoint_width: f32,
    /// Pinned preferred speed; sampled per pedestrian when `None`.
    pub desired_speed: Option<f32>,
}

impl Default for CrowdSettings {
    fn default() -> Self {
        CrowdSettings {
            waypoint_width: 2.0,
            desired_speed: None,
        }
    }
}

// Everything the tick loop reads and writes, behind one lock.
struct Scene {
    crowds: Vec<Crowd>,
    boundaries: Vec<Arc<Boundary>>,
    index: SceneIndex,
    force_model: Box<dyn ForceModel>,
    integrator: Box<dyn Integrator>,
    options: SimulatorOptions,
    simulated_time: f64,
    diagnostic_log: DiagnosticLog,
    next_pedestrian_id: u64,
    next_crowd_id: u32,
}

impl Scene {
    fn new(options: SimulatorOptions) -> Self {
        Scene {
            crowds: Vec::new(),
            boundaries: Vec::new(),
            index: SceneIndex::new(),
            force_model: options.force_model.build(),
            integrator: options.integrator.build(),
            options,
            simulated_time: 0.0,
            diagnostic_log: DiagnosticLog::default(),
            next_pedestrian_id: 0,
            next_crowd_id: 0,
        }
    }

    fn pedestrian_count(&self) -> usize {
        self.crowds.iter().map(Crowd::size).sum()
    }

    // Group centroids over the start-of-tick state, keyed by (crowd, group).
    fn group_centroids(&self) -> FxHashMap<(u32, u32), (Vec2, usize)> {
        let mut centroids: FxHashMap<(u32, u32), (Vec2, usize)> = FxHashMap::default();
        for crowd in &self.crowds {
            for ped in crowd.pedestrians() {
                let entry = centroids
                    .entry((crowd.id(), ped.group))
                    .or_insert((Vec2::ZERO, 0));
                entry.0 += ped.position;
                entry.1 += 1;
            }
        }
        for (sum, count) in centroids.values_mut() {
            *sum /= *count as f32;
        }
        centroids
    }

    /// One tick of `delta` simulated seconds. Every pedestrian reads the
    /// frozen start-of-tick snapshot and writes only its own state, so the
    /// result does not depend on scheduling.
    fn step(&mut self, delta: f32) {
        let reach = self.force_model.max_pedestrian_interaction_distance();
        self.index.update_crowds(&self.crowds, reach);

        let centroids = if self.options.group_cohesion {
            self.group_centroids()
        } else {
            FxHashMap::default()
        };

        let t = self.simulated_time;
        let index = &self.index;
        let model = self.force_model.as_ref();
        let integrator = self.integrator.as_ref();

        for crowd in &mut self.crowds {
            let crowd_id = crowd.id();
            crowd.pedestrians_mut().par_iter_mut().for_each(|ped| {
                let eval = ForceEvaluator {
                    model,
                    index,
                    group_centroid: centroids.get(&(crowd_id, ped.group)).copied(),
                };
                integrator.move_pedestrian(t, delta, ped, &eval);
            });
        }

        self.simulated_time += f64::from(delta);
    }

    fn validate(&self) -> Result<(), SimulatorError> {
        if self.crowds.is_empty() {
            return Err(SimulatorError::configuration(
                "at least one crowd is required",
            ));
        }
        for crowd in &self.crowds {
            if crowd.size() == 0 {
                return Err(SimulatorError::configuration(format!(
                    "crowd {} has no pedestrians",
                    crowd.id()
                )));
            }
            if crowd.route().is_empty() {
                return Err(SimulatorError::configuration(format!(
                    "crowd {} has no route",
                    crowd.id()
                )));
            }
        }
        Ok(())
    }
}

struct Control {
    stop: AtomicBool,
    paused: AtomicBool,
    clock: Mutex<FastForwardClock>,
    window: Mutex<IntervalWindow>,
}

/// Top-level driver: owns crowds, boundaries, the spatial index, the force
/// model and the integrator, and runs the tick loop on a worker thread.
pub struct Simulator {
    scene: Arc<RwLock<Scene>>,
    control: Arc<Control>,
    worker: Option<JoinHandle<()>>,
}

impl Default for Simulator {
    fn default() -> Self {
        Simulator::new()
    }
}

impl Simulator {
    pub fn new() -> Self {
        Simulator::with_options(SimulatorOptions::default())
    }

    pub fn with_options(options: SimulatorOptions) -> Self {
        let control = Control {
            stop: AtomicBool::new(false),
            paused: AtomicBool::new(false),
            clock: Mutex::new(FastForwardClock::new(options.fast_forward_factor)),
            window: Mutex::new(IntervalWindow::default()),
        };
        Simulator {
            scene: Arc::new(RwLock::new(Scene::new(options))),
            control: Arc::new(control),
            worker: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_some()
    }

    /// Registers static obstacles. Geometry is healed where possible and
    /// decomposed into segments; both boundary indexes are append-only.
    pub fn add_boundaries(
        &mut self,
        geometries: Vec<Geometry<f32>>,
    ) -> Result<(), SimulatorError> {
        let mut scene = self.scene.write().unwrap();
        let interaction_distance = scene.force_model.max_boundary_interaction_distance();
        let split = scene.options.boundary_segment_split;

        for geometry in geometries {
            let boundary = Arc::new(Boundary::new(geometry, interaction_distance, split)?);
            scene.index.add_boundary(boundary.clone());
            scene.boundaries.push(boundary);
        }
        Ok(())
    }

    /// Builds a crowd: one route shared by all pedestrians, one pedestrian
    /// per valid spawn point. With `ignore_invalid`, spawn points inside or
    /// too close to a boundary are dropped with a warning instead of
    /// failing.
    pub fn create_crowd(
        &mut self,
        spawn_points: &[Vec2],
        route_coords: &[Vec2],
        settings: CrowdSettings,
        ignore_invalid: bool,
    ) -> Result<Crowd, SimulatorError> {
        let mut scene = self.scene.write().unwrap();
        let clearance = scene.options.boundary_clearance;
        let radius = scene.force_model.pedestrian_radius();

        let route = Arc::new(Route::build(
            route_coords,
            settings.waypoint_width,
            &scene.index,
            clearance,
        )?);

        let crowd_id = scene.next_crowd_id;
        let mut rng = fastrand::Rng::with_seed(
            scene
                .options
                .seed
                .wrapping_add(u64::from(crowd_id).wrapping_mul(0x9E37_79B9_7F4A_7C15)),
        );

        let mut pedestrians = Vec::with_capacity(spawn_points.len());
        for (i, &start) in spawn_points.iter().enumerate() {
            let valid = start.is_finite()
                && !scene
                    .index
                    .boundaries_within(&geometry::Envelope::point(start).expand_by(clearance))
                    .iter()
                    .any(|b| b.within_clearance(start, clearance));
            if !valid {
                if ignore_invalid {
                    warn!("dropping invalid spawn point {i} at {start}");
                    continue;
                }
                return Err(SimulatorError::configuration(format!(
                    "spawn point {i} at {start} lies inside or too close to a boundary"
                )));
            }

            let speed = settings
                .desired_speed
                .unwrap_or_else(|| clipped_normal(&mut rng, SPEED_MEAN, SPEED_SD, SPEED_MIN, SPEED_MAX));
            let id = scene.next_pedestrian_id;
            scene.next_pedestrian_id += 1;
            let group = i as u32;
            pedestrians.push(Pedestrian::new(id, start, route.clone(), speed, radius, group));
        }

        scene.next_crowd_id += 1;
        Ok(Crowd::new(crowd_id, route, pedestrians))
    }

    pub fn add_crowd(&mut self, crowd: Crowd) {
        self.scene.write().unwrap().crowds.push(crowd);
    }

    /// Swaps the force model. Boundaries are rebuilt because their cached
    /// envelopes depend on the model's interaction distance.
    pub fn set_force_model(&mut self, kind: ForceModelKind) -> Result<(), SimulatorError> {
        if self.is_running() {
            return Err(SimulatorError::AlreadyRunning);
        }
        let mut scene = self.scene.write().unwrap();
        scene.force_model = kind.build();
        scene.options.force_model = kind;

        let interaction_distance = scene.force_model.max_boundary_interaction_distance();
        let split = scene.options.boundary_segment_split;
        let rebuilt: Result<Vec<_>, _> = scene
            .boundaries
            .iter()
            .map(|b| Boundary::new(b.geometry().clone(), interaction_distance, split).map(Arc::new))
            .collect();
        scene.boundaries = rebuilt?;
        scene.index = SceneIndex::new();
        let boundaries = scene.boundaries.clone();
        for boundary in boundaries {
            scene.index.add_boundary(boundary);
        }
        Ok(())
    }

    pub fn set_integrator(&mut self, kind: IntegratorKind) -> Result<(), SimulatorError> {
        if self.is_running() {
            return Err(SimulatorError::AlreadyRunning);
        }
        let mut scene = self.scene.write().unwrap();
        scene.integrator = kind.build();
        scene.options.integrator = kind;
        Ok(())
    }

    /// Wall-to-simulated time multiplier; 0 freezes simulated time.
    pub fn set_fast_forward_factor(&mut self, factor: u32) -> Result<(), SimulatorError> {
        if factor > MAX_FAST_FORWARD_FACTOR {
            return Err(SimulatorError::configuration(format!(
                "fast-forward factor {factor} is out of range 0..={MAX_FAST_FORWARD_FACTOR}"
            )));
        }
        self.control.clock.lock().unwrap().set_factor(factor);
        Ok(())
    }

    /// Validates the configuration and starts the tick loop on a worker
    /// thread.
    pub fn start(&mut self) -> Result<(), SimulatorError> {
        if self.is_running() {
            return Err(SimulatorError::AlreadyRunning);
        }
        self.scene.read().unwrap().validate()?;

        self.control.stop.store(false, Ordering::SeqCst);
        self.control.paused.store(false, Ordering::SeqCst);
        self.control.clock.lock().unwrap().rebase();

        let scene = self.scene.clone();
        let control = self.control.clone();
        let worker = thread::Builder::new()
            .name("folla-simulation".into())
            .spawn(move || run_loop(scene, control))
            .map_err(|e| SimulatorError::configuration(format!("worker thread failed: {e}")))?;
        self.worker = Some(worker);

        info!("simulation started");
        Ok(())
    }

    /// Freezes the loop at the next tick boundary.
    pub fn pause(&self) -> Result<(), SimulatorError> {
        if !self.is_running() {
            return Err(SimulatorError::NotRunning);
        }
        self.control.paused.store(true, Ordering::SeqCst);
        info!("simulation paused");
        Ok(())
    }

    /// Resumes a paused loop; the schedule restarts from now, so no Δt jump
    /// reaches the next tick.
    pub fn resume(&self) -> Result<(), SimulatorError> {
        if !self.is_running() {
            return Err(SimulatorError::NotRunning);
        }
        self.control.clock.lock().unwrap().rebase();
        self.control.paused.store(false, Ordering::SeqCst);
        info!("simulation resumed");
        Ok(())
    }

    /// Stops the loop, draining the current tick.
    pub fn stop(&mut self) -> Result<(), SimulatorError> {
        let worker = self.worker.take().ok_or(SimulatorError::NotRunning)?;
        self.control.stop.store(true, Ordering::SeqCst);
        let _ = worker.join();
        info!("simulation stopped");
        Ok(())
    }

    /// Stops if running, then clears crowds, boundaries and the index, and
    /// zeroes the clock. Re-adding the same inputs reproduces a fresh
    /// simulator exactly.
    pub fn reset(&mut self) {
        let _ = self.stop();
        let mut scene = self.scene.write().unwrap();
        let options = scene.options.clone();
        *scene = Scene::new(options);
        self.control.clock.lock().unwrap().rebase();
        self.control.window.lock().unwrap().clear();
        info!("simulation reset");
    }

    /// Advances the simulation synchronously by `delta` simulated seconds.
    /// Used by tests and headless drivers; invalid while the worker runs.
    pub fn step(&mut self, delta: f32) -> Result<(), SimulatorError> {
        if self.is_running() {
            return Err(SimulatorError::AlreadyRunning);
        }
        let started = Instant::now();
        let mut scene = self.scene.write().unwrap();
        scene.step(delta);
        let metrics = StepMetrics {
            active_ped_count: scene.pedestrian_count(),
            time_step: started.elapsed().as_secs_f64(),
        };
        scene.diagnostic_log.push(metrics);
        Ok(())
    }

    /// Simulated time in milliseconds.
    pub fn simulated_time(&self) -> u64 {
        (self.scene.read().unwrap().simulated_time * 1000.0).round() as u64
    }

    /// Copy of the latest committed crowd state.
    pub fn crowds(&self) -> Vec<Crowd> {
        self.scene.read().unwrap().crowds.clone()
    }

    pub fn boundaries(&self) -> Vec<Arc<Boundary>> {
        self.scene.read().unwrap().boundaries.clone()
    }

    /// Sliding-window mean wall time between simulation updates, seconds.
    pub fn average_simulation_update_interval(&self) -> f64 {
        self.control.window.lock().unwrap().mean()
    }

    pub fn diagnostic_log(&self) -> DiagnosticLog {
        self.scene.read().unwrap().diagnostic_log.clone()
    }

    pub fn options(&self) -> SimulatorOptions {
        self.scene.read().unwrap().options.clone()
    }
}

impl Drop for Simulator {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.take() {
            self.control.stop.store(true, Ordering::SeqCst);
            let _ = worker.join();
        }
    }
}

fn run_loop(scene: Arc<RwLock<Scene>>, control: Arc<Control>) {
    let tick_delta = scene.read().unwrap().options.tick_delta;
    let mut last_tick: Option<Instant> = None;

    loop {
        if control.stop.load(Ordering::SeqCst) {
            break;
        }
        let factor = control.clock.lock().unwrap().factor();
        if factor == 0 || control.paused.load(Ordering::SeqCst) {
            last_tick = None;
            thread::sleep(Duration::from_millis(10));
            continue;
        }

        let started = Instant::now();
        if let Some(previous) = last_tick {
            control
                .window
                .lock()
                .unwrap()
                .push((started - previous).as_secs_f64());
        }
        last_tick = Some(started);

        {
            let mut scene = scene.write().unwrap();
            scene.step(tick_delta);
            let metrics = StepMetrics {
                active_ped_count: scene.pedestrian_count(),
                time_step: started.elapsed().as_secs_f64(),
            };
            scene.diagnostic_log.push(metrics);
        }

        // Sleep until the next scheduled tick, or go straight back around
        // when behind schedule.
        let wait = control.clock.lock().unwrap().next_wait(tick_delta);
        if let Some(wait) = wait {
            if !wait.is_zero() {
                thread::sleep(wait);
            }
        }
    }
}
