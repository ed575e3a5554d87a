//! Capability traits shared by the component roles of the environment.

use serde::Serialize;

use crate::error::Result;

/// Hours per day; exogenous traces are sampled in windows aligned to it.
pub const STEPS_PER_DAY: usize = 24;

/// Energy storage that can be charged and discharged.
///
/// # Power Convention
/// - Positive power: charging
/// - Negative power: discharging
pub trait Storage {
    /// Applies a signed power request and returns the power actually applied.
    ///
    /// Infeasible requests are reduced silently; this never fails.
    fn charge(&mut self, power: f64) -> f64;

    /// Returns the stored energy in kWh.
    fn energy_content(&self) -> f64;

    /// Restores the initial energy content.
    fn reset(&mut self);

    /// Returns `(min_power, max_power)` used to scale a normalized action.
    fn charging_limits(&self) -> (f64, f64);

    /// Nominal capacity in kWh.
    fn capacity(&self) -> f64;
}

/// Diagnostics reported by a grid model about its last draw.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct GridInfo {
    /// Whether the last draw exceeded the peak threshold.
    pub peak_exceeded: bool,
    /// Power drawn above the peak threshold (kW, >= 0).
    pub peak_excess: f64,
}

/// Electrical grid that prices power drawn from it.
pub trait GridModel {
    /// Draws `power` kW for one time step and returns the cost.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::EnvError::GridInput`] if the grid cannot accept the power.
    fn draw_power(&mut self, power: f64) -> Result<f64>;

    /// Returns diagnostics about the last draw.
    fn info(&self) -> GridInfo;
}

/// Source of exogenous per-step values (residential load or PV generation).
pub trait ExogenousSource {
    /// Selects the episode window starting at sample index `start`.
    fn reset(&mut self, start: usize);

    /// Returns the next value of the episode window, or `None` when exhausted.
    fn next_value(&mut self) -> Option<f64>;

    /// Returns the values of the current episode window in `[start, end)`.
    ///
    /// Indices are clamped to the window.
    fn prediction(&self, start: usize, end: usize) -> &[f64];

    /// Number of steps an episode window covers; the window itself holds one
    /// more value for the initial observation.
    fn num_steps(&self) -> usize;

    /// Fixed day index to start every episode at, if configured.
    fn fixed_start_day(&self) -> Option<usize>;

    /// Largest day index whose window still fits inside the trace.
    fn max_start_day(&self) -> usize;
}
