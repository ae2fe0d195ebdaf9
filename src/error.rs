use crate::sim::{ActuatorAddress, SensorAddress};

/// Errors surfaced by the simulator core.
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Missing required configuration field: {0}")]
    MissingField(&'static str),

    #[error("No actuator registered at {0}")]
    UnknownActuator(ActuatorAddress),

    #[error("No sensor registered at {0}")]
    UnknownSensor(SensorAddress),

    #[error("Invalid command for {address}: {reason}")]
    InvalidCommand {
        address: ActuatorAddress,
        reason: String,
    },

    #[error("Actuator at {address} is a {actual}, expected a {expected}")]
    WrongActuatorKind {
        address: ActuatorAddress,
        expected: &'static str,
        actual: &'static str,
    },
}

pub type Result<T> = std::result::Result<T, SimError>;
