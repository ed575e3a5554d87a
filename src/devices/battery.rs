use std::fmt;
use std::str::FromStr;

use tracing::debug;

use crate::devices::constraints::{EpisodeConstraints, LimitCurve};
use crate::devices::types::Storage;
use crate::error::ConfigError;

/// Number of intervals between the requested power and zero in the feasibility scan.
const FEASIBILITY_STEPS: usize = 29;

/// Lithium-ion cell chemistry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Chemistry {
    /// Lithium nickel manganese cobalt oxide.
    Nmc,
    /// Lithium titanate.
    Lto,
}

impl Chemistry {
    /// Supported chemistry identifiers.
    pub const NAMES: &[&str] = &["NMC", "LTO"];
}

impl FromStr for Chemistry {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NMC" => Ok(Self::Nmc),
            "LTO" => Ok(Self::Lto),
            _ => Err(ConfigError::new(
                "battery.chemistry",
                format!(
                    "unsupported chemistry \"{s}\", available: {}",
                    Self::NAMES.join(", ")
                ),
            )),
        }
    }
}

impl fmt::Display for Chemistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nmc => f.write_str("NMC"),
            Self::Lto => f.write_str("LTO"),
        }
    }
}

/// Chemistry-derived coefficients of the charge/limit/charge cell model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChemistryParameters {
    pub kwh_per_cell: f64,
    pub nominal_voltage_c: f64,
    pub nominal_voltage_d: f64,
    /// Lower limit curve slope (u1).
    pub lower_slope: f64,
    /// Upper limit curve slope (u2).
    pub upper_slope: f64,
    pub eta_c: f64,
    /// Reciprocal of the discharge efficiency, so discharging multiplies.
    pub eta_d: f64,
    /// Maximum C-rate for both charging and discharging.
    pub c_rate: f64,
}

impl ChemistryParameters {
    pub fn for_chemistry(chemistry: Chemistry) -> Self {
        match chemistry {
            // LNMC cell with an operating range of 1 C
            Chemistry::Nmc => Self {
                kwh_per_cell: 0.011284,
                nominal_voltage_c: 3.8793,
                nominal_voltage_d: 3.5967,
                lower_slope: 0.1920,
                upper_slope: -0.4865,
                eta_c: 0.9942,
                eta_d: 1.0 / 0.9,
                c_rate: 1.0,
            },
            Chemistry::Lto => Self {
                kwh_per_cell: 0.0739108,
                nominal_voltage_c: 2.3624,
                nominal_voltage_d: 2.0759,
                lower_slope: 0.1559,
                upper_slope: -0.0351,
                eta_c: 0.9741,
                eta_d: 1.0 / 0.9716,
                c_rate: 2.0,
            },
        }
    }
}

/// A lithium-ion battery following the C/L/C model.
///
/// Energy content is bounded by two affine limit curves of the applied power
/// (scaled by the nominal voltage). Requests that would leave the feasible
/// region are reduced by a bounded linear scan towards zero.
///
/// # Power Convention
/// - Positive power: charging
/// - Negative power: discharging
#[derive(Debug, Clone)]
pub struct LithiumIonBattery {
    /// Energy capacity in kWh.
    pub size: f64,
    pub chemistry: Chemistry,
    pub num_cells: f64,
    params: ChemistryParameters,
    lower: LimitCurve,
    upper: LimitCurve,
    /// Maximum charging power (α_c).
    alpha_c: f64,
    /// Maximum discharging power (α_d).
    alpha_d: f64,
    time_step_len: f64,
    /// Current energy content in kWh.
    energy_content: f64,
}

impl LithiumIonBattery {
    /// Creates a battery of `size` kWh with the given chemistry.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if `size` or `time_step_len` is not a positive finite number.
    pub fn new(size: f64, chemistry: Chemistry, time_step_len: f64) -> Result<Self, ConfigError> {
        if !(size.is_finite() && size > 0.0) {
            return Err(ConfigError::new("battery.size", "must be > 0"));
        }
        if !(time_step_len.is_finite() && time_step_len > 0.0) {
            return Err(ConfigError::new("environment.time_step_len", "must be > 0"));
        }

        let params = ChemistryParameters::for_chemistry(chemistry);
        let num_cells = size / params.kwh_per_cell;
        let max_content = params.kwh_per_cell * num_cells;

        let lower = LimitCurve::new(params.lower_slope, 0.0, params.nominal_voltage_d);
        let upper = LimitCurve::new(params.upper_slope, max_content, params.nominal_voltage_c);

        debug!(size, %chemistry, "battery initialised");
        Ok(Self {
            size,
            chemistry,
            num_cells,
            params,
            lower,
            upper,
            alpha_c: max_content * params.c_rate,
            alpha_d: max_content * params.c_rate,
            time_step_len,
            energy_content: lower.intercept,
        })
    }

    /// Creates a battery from a chemistry identifier such as `"NMC"`.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` for an unsupported chemistry or invalid size.
    pub fn from_chemistry_name(
        size: f64,
        chemistry: &str,
        time_step_len: f64,
    ) -> Result<Self, ConfigError> {
        Self::new(size, chemistry.parse()?, time_step_len)
    }

    pub fn parameters(&self) -> &ChemistryParameters {
        &self.params
    }

    pub fn lower_limit(&self) -> LimitCurve {
        self.lower
    }

    pub fn upper_limit(&self) -> LimitCurve {
        self.upper
    }

    /// Maximum charging power in kW.
    pub fn max_charge_rate(&self) -> f64 {
        self.alpha_c
    }

    /// Maximum discharging power in kW.
    pub fn max_discharge_rate(&self) -> f64 {
        self.alpha_d
    }

    /// Overrides the energy content, e.g. to start an experiment mid-charge.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` unless `energy_content` lies between the
    /// idle lower and upper limits.
    pub fn set_energy_content(&mut self, energy_content: f64) -> Result<(), ConfigError> {
        if !(self.lower.intercept..=self.upper.intercept).contains(&energy_content) {
            return Err(ConfigError::new(
                "battery.energy_content",
                format!(
                    "{energy_content} kWh is outside [{}, {}]",
                    self.lower.intercept, self.upper.intercept
                ),
            ));
        }
        self.energy_content = energy_content;
        Ok(())
    }

    /// Returns the largest charging power not above `power` that keeps the
    /// energy content under the upper limit curve.
    ///
    /// Scans 30 candidates from `power` down to zero and returns the first
    /// feasible one, or `0.0` when none is.
    pub fn calc_max_charging(&self, power: f64) -> f64 {
        scan_towards_zero(power, |c| {
            self.energy_content + c * self.params.eta_c * self.time_step_len <= self.upper.at(c)
        })
    }

    /// Returns the largest discharging power not above `power` that keeps the
    /// energy content over the lower limit curve.
    pub fn calc_max_discharging(&self, power: f64) -> f64 {
        scan_towards_zero(power, |d| {
            self.energy_content - d * self.params.eta_d * self.time_step_len >= self.lower.at(d)
        })
    }

    /// Exports the physical constraints of this battery over `horizon` steps
    /// in affine form, for an episode starting from the reset content.
    pub fn episode_constraints(&self, horizon: usize) -> EpisodeConstraints {
        EpisodeConstraints {
            horizon,
            time_step_len: self.time_step_len,
            eta_c: self.params.eta_c,
            eta_d: self.params.eta_d,
            max_charge: self.alpha_c,
            max_discharge: self.alpha_d,
            lower: self.lower,
            upper: self.upper,
            initial_content: self.lower.intercept,
        }
    }
}

/// Linear scan over `power, ..., 0` in `FEASIBILITY_STEPS` equal intervals.
fn scan_towards_zero(power: f64, mut feasible: impl FnMut(f64) -> bool) -> f64 {
    (0..=FEASIBILITY_STEPS)
        .map(|i| power * (FEASIBILITY_STEPS - i) as f64 / FEASIBILITY_STEPS as f64)
        .find(|&candidate| feasible(candidate))
        .unwrap_or(0.0)
}

impl Storage for LithiumIonBattery {
    fn charge(&mut self, power: f64) -> f64 {
        let (c, d) = if power > 0.0 {
            (self.calc_max_charging(power.min(self.alpha_c)), 0.0)
        } else if power < 0.0 {
            (0.0, self.calc_max_discharging((-power).min(self.alpha_d)))
        } else {
            (0.0, 0.0)
        };

        self.energy_content += c * self.params.eta_c * self.time_step_len
            - d * self.params.eta_d * self.time_step_len;

        let applied = c - d;
        debug!(
            applied,
            attempted = power,
            energy_content = self.energy_content,
            "battery charged"
        );
        applied
    }

    fn energy_content(&self) -> f64 {
        self.energy_content
    }

    fn reset(&mut self) {
        self.energy_content = self.lower.intercept;
    }

    fn charging_limits(&self) -> (f64, f64) {
        (-self.size, self.size)
    }

    fn capacity(&self) -> f64 {
        self.size
    }
}
