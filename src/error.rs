//! Error types shared by configuration, components, and the environment loop.

use std::fmt;

use thiserror::Error;

use crate::sim::power_flow::FlowError;

/// Configuration error with field path and constraint description.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigError {
    /// Dotted field path (e.g., `"battery.chemistry"`).
    pub field: String,
    /// Human-readable constraint description.
    pub message: String,
}

impl ConfigError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "config error: {}: {}", self.field, self.message)
    }
}

impl std::error::Error for ConfigError {}

/// Failures surfaced by the environment and its components.
///
/// Physical infeasibility of a battery request is deliberately absent: the
/// battery resolves it internally by reducing the applied power.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EnvError {
    #[error(transparent)]
    Configuration(#[from] ConfigError),

    #[error("action {action} is outside [-1, 1]")]
    InvalidAction { action: f64 },

    #[error("grid cannot accept back-feed of {power} kW")]
    GridInput { power: f64 },

    #[error("power flow bookkeeping failed: {0}")]
    PowerFlow(#[from] FlowError),

    #[error("environment is not running, call reset() first")]
    NotRunning,

    #[error("{source_name} trace exhausted at time step {time_step}")]
    TraceExhausted {
        source_name: &'static str,
        time_step: usize,
    },
}

pub type Result<T, E = EnvError> = std::result::Result<T, E>;
