/// Errors surfaced by constructors, validation and lifecycle calls.
///
/// The tick loop itself never returns one of these; per-pedestrian anomalies
/// are recovered locally and reported through the pedestrian's status flags.
#[derive(Debug, thiserror::Error)]
pub enum SimulatorError {
    #[error("invalid configuration: {0}")]
    ConfigurationInvalid(String),
    #[error("invalid geometry: {0}")]
    GeometryInvalid(String),
    #[error("simulation is not running")]
    NotRunning,
    #[error("simulation is already running")]
    AlreadyRunning,
}

impl SimulatorError {
    pub fn configuration(message: impl Into<String>) -> Self {
        SimulatorError::ConfigurationInvalid(message.into())
    }

    pub fn geometry(message: impl Into<String>) -> Self {
        SimulatorError::GeometryInvalid(message.into())
    }
}
