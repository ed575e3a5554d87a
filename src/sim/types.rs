//! Core environment types: options, observations, step outcomes.

use std::fmt;

use serde::Serialize;

use crate::devices::types::GridInfo;

use super::power_flow::PowerFlowGraph;

/// Environment-level options shared by every component.
///
/// # Examples
///
/// ```
/// use solara_env::sim::types::EnvOptions;
///
/// let opts = EnvOptions::default();
/// assert_eq!(opts.episode_len, 24);
/// assert_eq!(opts.time_step_len, 1.0);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct EnvOptions {
    /// Number of steps in one episode.
    pub episode_len: usize,
    /// Duration of one step in hours.
    pub time_step_len: f64,
    /// Allow the battery to charge from the grid, not only from PV.
    pub grid_charging: bool,
    /// Subtract `|applied - requested|` from the reward.
    pub infeasible_control_penalty: bool,
    /// Add `time_step_cont`, `load_change` and `pv_change` to observations.
    pub extended_observation: bool,
}

impl Default for EnvOptions {
    fn default() -> Self {
        Self {
            episode_len: 24,
            time_step_len: 1.0,
            grid_charging: false,
            infeasible_control_penalty: false,
            extended_observation: false,
        }
    }
}

/// Lifecycle of an environment instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EnvPhase {
    /// Constructed, `reset()` not yet called.
    Uninitialized,
    /// Inside an episode; `step()` is valid.
    Running,
    /// The episode has ended; call `reset()` to start the next one.
    Terminal,
}

/// Extra observation entries for the extended variant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ObservationExtension {
    /// `time_step / episode_len`, in `[0, 1]`.
    pub time_step_cont: f64,
    /// Load minus the previous load sample (kW).
    pub load_change: f64,
    /// PV generation minus the previous sample (kW).
    pub pv_change: f64,
}

/// What a policy sees after `reset()` and every `step()`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Observation {
    /// Residential load for the upcoming step (kW).
    pub load: f64,
    /// PV generation for the upcoming step (kW).
    pub pv_gen: f64,
    /// Battery energy content (kWh).
    pub battery_cont: f64,
    pub time_step: usize,
    /// Sum of load samples read since reset (kW).
    pub cum_load: f64,
    /// Sum of PV samples read since reset (kW).
    pub cum_pv_gen: f64,
    #[serde(flatten)]
    pub extension: Option<ObservationExtension>,
}

impl Observation {
    /// Keys of the basic observation, in `to_vec` order.
    pub const KEYS: &[&str] = &[
        "load",
        "pv_gen",
        "battery_cont",
        "time_step",
        "cum_load",
        "cum_pv_gen",
    ];

    /// Keys appended by the extended variant.
    pub const EXTENDED_KEYS: &[&str] = &["time_step_cont", "load_change", "pv_change"];

    /// Flattens the observation into a vector ordered like [`Observation::KEYS`],
    /// followed by [`Observation::EXTENDED_KEYS`] when extended.
    pub fn to_vec(&self) -> Vec<f64> {
        let mut v = vec![
            self.load,
            self.pv_gen,
            self.battery_cont,
            self.time_step as f64,
            self.cum_load,
            self.cum_pv_gen,
        ];
        if let Some(ext) = self.extension {
            v.extend([ext.time_step_cont, ext.load_change, ext.pv_change]);
        }
        v
    }
}

/// Diagnostics of one step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepInfo {
    /// Power drawn from the grid (kW, >= 0).
    pub net_load: f64,
    /// Power actually applied to the battery (kW; positive=charge).
    pub charging_power: f64,
    /// Power requested from the battery after grid-charging clipping (kW).
    pub requested_power: f64,
    pub cost: f64,
    /// `|charging_power - requested_power|`, present when the penalty is enabled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub power_diff: Option<f64>,
    #[serde(flatten)]
    pub grid: GridInfo,
    /// Battery energy content before the step (kWh).
    pub energy_before: f64,
    /// Battery energy content after the step (kWh).
    pub energy_after: f64,
    /// How power was routed between solar, grid, battery and load.
    #[serde(skip)]
    pub power_flow: PowerFlowGraph,
}

/// Result of one `step()`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepOutcome {
    pub observation: Observation,
    pub reward: f64,
    pub done: bool,
    pub info: StepInfo,
}

impl fmt::Display for StepOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let o = &self.observation;
        let i = &self.info;
        write!(
            f,
            "t={:>3} | reward={:>8.4} cost={:>7.4} | net={:>6.2} kW  bat={:>6.2} kW \
             (req={:>6.2}, cont={:.2} kWh) | next load={:.2}  pv={:.2} | peak={} done={}",
            o.time_step,
            self.reward,
            i.cost,
            i.net_load,
            i.charging_power,
            i.requested_power,
            o.battery_cont,
            o.load,
            o.pv_gen,
            i.grid.peak_exceeded,
            self.done,
        )
    }
}
