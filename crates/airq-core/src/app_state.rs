//! Application-wide state and error types for airq

use thiserror_no_std::Error;

use crate::identity::IdentityError;
use crate::provisioning::NetworkError;
use crate::sensors::SensorError;

/// Boot progress of the device, as shown in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppRunState {
    Uninitialized,
    Provisioning,
    Connected,
    SensorStarting,
    Running,
    Halted,
}

impl AppRunState {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Provisioning => "provisioning",
            Self::Connected => "connected",
            Self::SensorStarting => "starting sensor",
            Self::Running => "running",
            Self::Halted => "halted",
        }
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Device identity error: {0}")]
    Identity(#[from] IdentityError),
    #[error("Network error: {0}")]
    Network(#[from] NetworkError),
    #[error("Sensor error: {0}")]
    Sensor(#[from] SensorError),
}
