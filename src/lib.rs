//! Battery control environment for a PV-backed household on a peak-priced grid.

pub mod cli;
pub mod config;
pub mod devices;
pub mod error;
/// Trajectory export.
pub mod io;
/// Environment loop, power-flow bookkeeping, policies and KPIs.
pub mod sim;
pub mod telemetry;

pub use error::{ConfigError, EnvError};
