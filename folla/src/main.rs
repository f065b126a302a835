mod args;

use std::{
    fs::{self, File},
    path::PathBuf,
    sync::atomic::{AtomicBool, Ordering},
    thread,
    time::Duration,
};

use anyhow::Context;
use args::Args;
use clap::Parser;
use folla_simulator::{scenario::Scenario, CrowdSettings, Simulator};
use log::{info, warn};

static SIG_INT: AtomicBool = AtomicBool::new(false);

fn main() -> anyhow::Result<()> {
    env_logger::builder()
        .filter_module("folla", log::LevelFilter::Info)
        .filter_module("folla_simulator", log::LevelFilter::Info)
        .init();

    if cfg!(debug_assertions) {
        warn!("Debug build");
    }

    let args = Args::parse();

    let scenario: Scenario = toml::from_str(
        &fs::read_to_string(&args.scenario)
            .with_context(|| format!("reading scenario {}", args.scenario.display()))?,
    )?;
    info!("Loaded scenario file: {}", args.scenario.display());

    let mut options = scenario.options.clone();
    if let Some(model) = args.model {
        options.force_model = model.into();
    }
    if let Some(integrator) = args.integrator {
        options.integrator = integrator.into();
    }
    if let Some(factor) = args.fast_forward {
        options.fast_forward_factor = factor;
    }
    if let Some(tick) = args.tick {
        options.tick_delta = tick;
    }
    info!(
        "Model: {:?}, Integrator: {:?}, tick: {} s, fast-forward: {}",
        options.force_model, options.integrator, options.tick_delta, options.fast_forward_factor,
    );

    let mut simulator = Simulator::with_options(options);
    simulator.add_boundaries(scenario.boundaries.iter().map(|b| b.to_geometry()).collect())?;

    for config in &scenario.crowds {
        let crowd = simulator.create_crowd(
            &config.spawn_points,
            &config.route,
            CrowdSettings {
                waypoint_width: config.waypoint_width,
                desired_speed: config.desired_speed,
            },
            config.ignore_invalid,
        )?;
        info!("Crowd {}: {} pedestrians", crowd.id(), crowd.size());
        simulator.add_crowd(crowd);
    }

    ctrlc::set_handler(|| SIG_INT.store(true, Ordering::SeqCst))?;
    simulator.start()?;

    let mut last_logged = 0;
    loop {
        if SIG_INT.load(Ordering::SeqCst) {
            info!("Interrupted");
            break;
        }

        let simulated = simulator.simulated_time();
        if let Some(duration) = args.duration {
            if simulated as f64 / 1000.0 >= duration {
                break;
            }
        }

        // Progress line every 10 simulated seconds.
        if simulated / 10_000 > last_logged {
            last_logged = simulated / 10_000;
            info!(
                "Simulated {:7.1} s, mean update interval {:5.2} ms",
                simulated as f64 / 1000.0,
                simulator.average_simulation_update_interval() * 1000.0,
            );
        }

        thread::sleep(Duration::from_millis(50));
    }

    simulator.stop()?;

    let current_time = chrono::Local::now();
    fs::create_dir_all("logs").ok();
    let log_path: PathBuf = [
        "logs",
        &current_time.format("%Y-%m-%d_%H%M%S_log.json").to_string(),
    ]
    .iter()
    .collect();
    let mut log_file = File::create(&log_path)?;
    serde_json::to_writer(&mut log_file, &simulator.diagnostic_log())?;
    info!("Exported log file: {}", log_path.display());

    Ok(())
}
