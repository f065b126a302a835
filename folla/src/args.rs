use std::path::PathBuf;

use folla_simulator::{ForceModelKind, IntegratorKind};

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum ModelArg {
    HelbingBuzna,
    HelbingJohansson,
    Moussaid,
}

impl From<ModelArg> for ForceModelKind {
    fn from(arg: ModelArg) -> Self {
        match arg {
            ModelArg::HelbingBuzna => ForceModelKind::HelbingBuzna,
            ModelArg::HelbingJohansson => ForceModelKind::HelbingJohansson,
            ModelArg::Moussaid => ForceModelKind::Moussaid,
        }
    }
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum IntegratorArg {
    Euler,
    Rk4,
}

impl From<IntegratorArg> for IntegratorKind {
    fn from(arg: IntegratorArg) -> Self {
        match arg {
            IntegratorArg::Euler => IntegratorKind::SimpleEuler,
            IntegratorArg::Rk4 => IntegratorKind::RungeKutta4,
        }
    }
}

#[derive(Debug, clap::Parser)]
pub struct Args {
    /// Path to scenario file
    #[arg(default_value = "scenarios/default.toml")]
    pub scenario: PathBuf,
    /// Stop after this many simulated seconds
    #[arg(short, long)]
    pub duration: Option<f64>,
    /// Force model
    #[arg(value_enum, short, long)]
    pub model: Option<ModelArg>,
    /// Integrator
    #[arg(value_enum, short, long)]
    pub integrator: Option<IntegratorArg>,
    /// Fast-forward factor, 0..=5 (0 starts paused)
    #[arg(short, long)]
    pub fast_forward: Option<u32>,
    /// Simulated seconds per tick
    #[arg(long)]
    pub tick: Option<f32>,
}
