//! Battery control environment: one instance serves one sequential caller.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};

use crate::devices::{
    DataTrace, ExogenousSource, GridModel, LithiumIonBattery, PeakGrid, STEPS_PER_DAY, Storage,
};
use crate::error::{ConfigError, EnvError, Result};

use super::power_flow::{FlowOptions, PowerFlowGraph};
use super::types::{
    EnvOptions, EnvPhase, Observation, ObservationExtension, StepInfo, StepOutcome,
};

pub const SOLAR: &str = "solar";
pub const GRID: &str = "grid";
pub const BATTERY: &str = "battery";
pub const LOAD: &str = "load";

/// Per-episode state, replaced on every `reset()`.
#[derive(Debug, Clone, Default)]
struct EpisodeState {
    time_step: usize,
    load: f64,
    pv_gen: f64,
    cum_load: f64,
    cum_pv_gen: f64,
    /// Sample index both traces started at.
    start: usize,
}

/// Environment controlling a battery next to a PV system, a load, and a grid.
///
/// Generic over the component roles for static dispatch; the defaults are
/// the concrete models used by scenario configs.
///
/// The random source drives only the choice of the episode start day.
/// Seeding it (at construction or with [`BatteryControlEnv::seed`])
/// reproduces every subsequent episode exactly.
pub struct BatteryControlEnv<
    B: Storage = LithiumIonBattery,
    G: GridModel = PeakGrid,
    S: ExogenousSource = DataTrace,
> {
    options: EnvOptions,
    battery: B,
    grid: G,
    load: S,
    pv: S,
    rng: StdRng,
    min_charge_power: f64,
    max_charge_power: f64,
    phase: EnvPhase,
    state: EpisodeState,
    flow_template: PowerFlowGraph,
}

impl<B: Storage, G: GridModel, S: ExogenousSource> BatteryControlEnv<B, G, S> {
    /// Creates an environment in the `Uninitialized` phase.
    ///
    /// # Errors
    ///
    /// Returns [`EnvError::Configuration`] if `episode_len` is zero,
    /// `time_step_len` is not positive, a trace window is shorter than the
    /// episode, or the load and PV traces are fixed to different start days
    /// or to a day outside either trace.
    pub fn new(options: EnvOptions, battery: B, grid: G, load: S, pv: S, rng: StdRng) -> Result<Self> {
        if options.episode_len == 0 {
            return Err(ConfigError::new("environment.episode_len", "must be > 0").into());
        }
        if !(options.time_step_len.is_finite() && options.time_step_len > 0.0) {
            return Err(ConfigError::new("environment.time_step_len", "must be > 0").into());
        }
        if let (Some(l), Some(p)) = (load.fixed_start_day(), pv.fixed_start_day()) {
            if l != p {
                return Err(ConfigError::new(
                    "solar.fixed_start_day",
                    format!("must match load.fixed_start_day ({l}), got {p}"),
                )
                .into());
            }
        }
        for (name, source) in [(LOAD, &load), (SOLAR, &pv)] {
            if source.num_steps() < options.episode_len {
                return Err(ConfigError::new(
                    format!("{name}.num_steps"),
                    format!(
                        "must be >= environment.episode_len ({}), got {}",
                        options.episode_len,
                        source.num_steps()
                    ),
                )
                .into());
            }
        }
        let fixed = [(LOAD, &load), (SOLAR, &pv)]
            .into_iter()
            .find_map(|(name, source)| source.fixed_start_day().map(|day| (name, day)));
        if let Some((name, day)) = fixed {
            let last = load.max_start_day().min(pv.max_start_day());
            if day > last {
                return Err(ConfigError::new(
                    format!("{name}.fixed_start_day"),
                    format!("day {day} is beyond the data range (last valid day is {last})"),
                )
                .into());
            }
        }

        let (min_charge_power, max_charge_power) = battery.charging_limits();
        let flow_template = routing_graph()?;

        info!(
            episode_len = options.episode_len,
            grid_charging = options.grid_charging,
            penalty = options.infeasible_control_penalty,
            "environment initialised"
        );

        Ok(Self {
            options,
            battery,
            grid,
            load,
            pv,
            rng,
            min_charge_power,
            max_charge_power,
            phase: EnvPhase::Uninitialized,
            state: EpisodeState::default(),
            flow_template,
        })
    }

    /// Reseeds the random source used for episode start offsets.
    pub fn seed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }

    /// Starts a new episode and returns its initial observation.
    ///
    /// # Errors
    ///
    /// Returns [`EnvError::TraceExhausted`] if a trace window is empty.
    pub fn reset(&mut self) -> Result<Observation> {
        let start = self.start_offset();

        self.battery.reset();
        self.load.reset(start);
        self.pv.reset(start);

        let load = next_sample(&mut self.load, LOAD, 0)?;
        let pv_gen = next_sample(&mut self.pv, SOLAR, 0)?;

        self.state = EpisodeState {
            time_step: 0,
            load,
            pv_gen,
            cum_load: 0.0,
            cum_pv_gen: 0.0,
            start,
        };
        self.phase = EnvPhase::Running;
        debug!(start, load, pv_gen, "environment reset");

        Ok(self.observation(None))
    }

    /// Runs one time step with a normalized action in `[-1, 1]`.
    ///
    /// Positive actions charge the battery, negative ones discharge it.
    ///
    /// # Errors
    ///
    /// - [`EnvError::NotRunning`] before `reset()` or after the episode ended
    /// - [`EnvError::InvalidAction`] for actions outside `[-1, 1]`
    /// - [`EnvError::TraceExhausted`] if a trace runs out before the episode ends
    pub fn step(&mut self, action: f64) -> Result<StepOutcome> {
        if self.phase != EnvPhase::Running {
            return Err(EnvError::NotRunning);
        }
        if !(-1.0..=1.0).contains(&action) {
            return Err(EnvError::InvalidAction { action });
        }
        debug!(action, time_step = self.state.time_step, "step");

        let EpisodeState {
            load,
            pv_gen,
            time_step,
            ..
        } = self.state;

        // Exhausted traces fail before the battery or grid change
        let next_load = next_sample(&mut self.load, LOAD, time_step)?;
        let next_pv = next_sample(&mut self.pv, SOLAR, time_step)?;

        // Actions are fractions of the charging limits
        let mut requested = if action > 0.0 {
            action * self.max_charge_power
        } else {
            action * -self.min_charge_power
        };
        if !self.options.grid_charging {
            requested = requested.min(pv_gen);
        }

        let energy_before = self.battery.energy_content();
        let charging_power = self.battery.charge(requested);

        let net_load = (load + charging_power - pv_gen).max(0.0);
        let cost = self.grid.draw_power(net_load)?;

        let mut reward = -cost;
        let power_diff = self
            .options
            .infeasible_control_penalty
            .then(|| (charging_power - requested).abs());
        if let Some(diff) = power_diff {
            reward -= diff;
        }

        let power_flow = self.route_power(load, pv_gen, charging_power)?;

        let time_step = time_step + 1;
        self.state.load = next_load;
        self.state.pv_gen = next_pv;
        self.state.cum_load += next_load;
        self.state.cum_pv_gen += next_pv;
        self.state.time_step = time_step;

        let done = time_step >= self.options.episode_len;
        if done {
            self.phase = EnvPhase::Terminal;
        }

        let info = StepInfo {
            net_load,
            charging_power,
            requested_power: requested,
            cost,
            power_diff,
            grid: self.grid.info(),
            energy_before,
            energy_after: self.battery.energy_content(),
            power_flow,
        };
        debug!(reward, done, net_load, cost, "step finished");

        Ok(StepOutcome {
            observation: self.observation(Some((load, pv_gen))),
            reward,
            done,
            info,
        })
    }

    /// Upcoming load and PV samples after the current ones, at most `horizon` each.
    pub fn lookahead(&self, horizon: usize) -> (&[f64], &[f64]) {
        let from = self.state.time_step + 1;
        (
            self.load.prediction(from, from + horizon),
            self.pv.prediction(from, from + horizon),
        )
    }

    pub fn phase(&self) -> EnvPhase {
        self.phase
    }

    pub fn options(&self) -> &EnvOptions {
        &self.options
    }

    pub fn time_step(&self) -> usize {
        self.state.time_step
    }

    /// Trace sample index the current episode started at.
    pub fn episode_start(&self) -> usize {
        self.state.start
    }

    /// Returns `(min_power, max_power)` an action of -1 / +1 maps to.
    pub fn charge_power_range(&self) -> (f64, f64) {
        (self.min_charge_power, self.max_charge_power)
    }

    pub fn battery(&self) -> &B {
        &self.battery
    }

    pub fn grid(&self) -> &G {
        &self.grid
    }

    fn start_offset(&mut self) -> usize {
        let day = match self.load.fixed_start_day().or(self.pv.fixed_start_day()) {
            Some(day) => day,
            None => {
                let last = self.load.max_start_day().min(self.pv.max_start_day());
                self.rng.random_range(0..=last)
            }
        };
        day * STEPS_PER_DAY
    }

    fn observation(&self, previous: Option<(f64, f64)>) -> Observation {
        let s = &self.state;
        let extension = self.options.extended_observation.then(|| {
            let (prev_load, prev_pv) = previous.unwrap_or((s.load, s.pv_gen));
            ObservationExtension {
                time_step_cont: s.time_step as f64 / self.options.episode_len as f64,
                load_change: s.load - prev_load,
                pv_change: s.pv_gen - prev_pv,
            }
        });

        Observation {
            load: s.load,
            pv_gen: s.pv_gen,
            battery_cont: self.battery.energy_content(),
            time_step: s.time_step,
            cum_load: s.cum_load,
            cum_pv_gen: s.cum_pv_gen,
            extension,
        }
    }

    /// Records how power moved during the step.
    ///
    /// PV serves the load first and the battery second, unless grid
    /// charging is off, in which case charging power comes from PV before
    /// the load is served. The battery, when discharging, covers what PV
    /// left of the load and the grid supplies the rest. Surplus PV and
    /// surplus discharge are curtailed.
    fn route_power(&self, load: f64, pv_gen: f64, charging_power: f64) -> Result<PowerFlowGraph> {
        let load = load.max(0.0);
        let pv_gen = pv_gen.max(0.0);
        let charging = charging_power.max(0.0);

        let (pv_to_load, pv_to_battery) = if self.options.grid_charging {
            let pv_to_load = pv_gen.min(load);
            (pv_to_load, (pv_gen - pv_to_load).min(charging))
        } else {
            let pv_to_battery = pv_gen.min(charging);
            ((pv_gen - pv_to_battery).min(load), pv_to_battery)
        };
        let residual_load = load - pv_to_load;

        let mut flow = self.flow_template.clone();
        flow.set(SOLAR, LOAD, pv_to_load)?;
        if charging_power >= 0.0 {
            flow.set(SOLAR, BATTERY, pv_to_battery)?;
            flow.set(GRID, BATTERY, charging_power - pv_to_battery)?;
            flow.set(GRID, LOAD, residual_load)?;
        } else {
            let battery_to_load = (-charging_power).min(residual_load);
            flow.set(BATTERY, LOAD, battery_to_load)?;
            flow.set(GRID, LOAD, residual_load - battery_to_load)?;
        }
        Ok(flow)
    }
}

/// Builds the empty routing graph shared by every step.
fn routing_graph() -> Result<PowerFlowGraph> {
    let mut graph = PowerFlowGraph::new([SOLAR, GRID, BATTERY, LOAD], FlowOptions::default())?;
    for (source, target) in [
        (SOLAR, LOAD),
        (SOLAR, BATTERY),
        (GRID, LOAD),
        (GRID, BATTERY),
        (BATTERY, LOAD),
    ] {
        graph.add_connection(source, target)?;
    }
    Ok(graph)
}

fn next_sample<S: ExogenousSource>(
    source: &mut S,
    source_name: &'static str,
    time_step: usize,
) -> Result<f64> {
    source.next_value().ok_or(EnvError::TraceExhausted {
        source_name,
        time_step,
    })
}
