//! TOML-based scenario configuration and preset definitions.
//!
//! Component sections carry a `type` tag selecting the implementation, so
//! an unknown kind is rejected while parsing:
//!
//! ```toml
//! [environment]
//! episode_len = 24
//! grid_charging = true
//!
//! [battery]
//! type = "lithium_ion"
//! size = 10.0
//! chemistry = "NMC"
//!
//! [grid]
//! type = "peak"
//! peak_threshold = 1.0
//!
//! [load]
//! type = "data"
//! data_path = "../data/load.txt"
//!
//! [solar]
//! type = "data"
//! data_path = "../data/pv.txt"
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Deserialize;
use tracing::info;

use crate::devices::{Chemistry, DataTrace, LithiumIonBattery, PeakGrid};
use crate::error::{ConfigError, EnvError};
use crate::sim::env::BatteryControlEnv;
use crate::sim::types::EnvOptions;

/// Top-level scenario configuration parsed from TOML.
///
/// Load from TOML with [`ScenarioConfig::from_toml_file`] or use
/// [`ScenarioConfig::exp001`] for the built-in default.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScenarioConfig {
    /// Episode and time-step parameters shared by every component.
    #[serde(default)]
    pub environment: EnvironmentConfig,
    pub battery: BatteryConfig,
    pub grid: GridConfig,
    /// Residential load trace.
    pub load: TraceConfig,
    /// PV generation trace.
    pub solar: TraceConfig,
}

/// Episode and time-step parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EnvironmentConfig {
    /// Number of steps per episode (must be > 0).
    pub episode_len: usize,
    /// Step duration in hours (must be > 0).
    pub time_step_len: f64,
    pub grid_charging: bool,
    pub infeasible_control_penalty: bool,
    pub extended_observation: bool,
    /// Seed of the episode start-day sampler.
    pub seed: u64,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        let options = EnvOptions::default();
        Self {
            episode_len: options.episode_len,
            time_step_len: options.time_step_len,
            grid_charging: options.grid_charging,
            infeasible_control_penalty: options.infeasible_control_penalty,
            extended_observation: options.extended_observation,
            seed: 42,
        }
    }
}

/// Battery section.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", deny_unknown_fields)]
pub enum BatteryConfig {
    LithiumIon {
        /// Capacity in kWh.
        size: f64,
        /// `"NMC"` or `"LTO"`.
        #[serde(default = "default_chemistry")]
        chemistry: String,
    },
}

fn default_chemistry() -> String {
    Chemistry::Nmc.to_string()
}

/// Grid section.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", deny_unknown_fields)]
pub enum GridConfig {
    Peak {
        /// Power (kW) above which the peak price applies.
        peak_threshold: f64,
        #[serde(default = "default_base_price")]
        base_price: f64,
        #[serde(default = "default_peak_price")]
        peak_price: f64,
    },
}

fn default_base_price() -> f64 {
    PeakGrid::DEFAULT_BASE_PRICE
}

fn default_peak_price() -> f64 {
    PeakGrid::DEFAULT_PEAK_PRICE
}

/// Load or solar section.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", deny_unknown_fields)]
pub enum TraceConfig {
    Data {
        /// Trace file; relative paths resolve against the scenario file.
        data_path: PathBuf,
        /// Steps per episode window, defaults to `environment.episode_len`.
        #[serde(default)]
        num_steps: Option<usize>,
        /// Start every episode at this day instead of a random one.
        #[serde(default)]
        fixed_start_day: Option<usize>,
    },
}

impl TraceConfig {
    pub fn data_path(&self) -> &Path {
        match self {
            Self::Data { data_path, .. } => data_path,
        }
    }

    pub fn fixed_start_day(&self) -> Option<usize> {
        match self {
            Self::Data {
                fixed_start_day, ..
            } => *fixed_start_day,
        }
    }

    fn num_steps(&self, episode_len: usize) -> usize {
        match self {
            Self::Data { num_steps, .. } => num_steps.unwrap_or(episode_len),
        }
    }

    fn resolve_against(&mut self, base: &Path) {
        match self {
            Self::Data { data_path, .. } => {
                if data_path.is_relative() {
                    *data_path = base.join(&*data_path);
                }
            }
        }
    }

    fn build(&self, name: &'static str, episode_len: usize) -> Result<DataTrace, ConfigError> {
        DataTrace::from_path(
            name,
            self.data_path(),
            self.num_steps(episode_len),
            self.fixed_start_day(),
        )
    }
}

/// Directory holding the bundled load and PV traces.
fn bundled_data_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("data")
}

impl ScenarioConfig {
    /// Returns the default experiment: a 10 kWh NMC battery, a peak grid with
    /// a 1 kW threshold and the bundled traces, with grid charging and the
    /// infeasibility penalty enabled.
    pub fn exp001() -> Self {
        let data = bundled_data_dir();
        Self {
            environment: EnvironmentConfig {
                grid_charging: true,
                infeasible_control_penalty: true,
                ..EnvironmentConfig::default()
            },
            battery: BatteryConfig::LithiumIon {
                size: 10.0,
                chemistry: "NMC".to_string(),
            },
            grid: GridConfig::Peak {
                peak_threshold: 1.0,
                base_price: PeakGrid::DEFAULT_BASE_PRICE,
                peak_price: PeakGrid::DEFAULT_PEAK_PRICE,
            },
            load: TraceConfig::Data {
                data_path: data.join("load.txt"),
                num_steps: None,
                fixed_start_day: None,
            },
            solar: TraceConfig::Data {
                data_path: data.join("pv.txt"),
                num_steps: None,
                fixed_start_day: None,
            },
        }
    }

    /// Returns the solar-only preset: LTO battery charged from PV only, no
    /// penalty, extended observations.
    pub fn solar_only() -> Self {
        let base = Self::exp001();
        Self {
            environment: EnvironmentConfig {
                grid_charging: false,
                infeasible_control_penalty: false,
                extended_observation: true,
                ..base.environment
            },
            battery: BatteryConfig::LithiumIon {
                size: 6.0,
                chemistry: "LTO".to_string(),
            },
            ..base
        }
    }

    /// Available preset names.
    pub const PRESETS: &[&str] = &["exp001", "solar_only"];

    /// Loads a scenario from a named preset.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the preset name is unknown.
    pub fn from_preset(name: &str) -> Result<Self, ConfigError> {
        match name {
            "exp001" => Ok(Self::exp001()),
            "solar_only" => Ok(Self::solar_only()),
            _ => Err(ConfigError::new(
                "preset",
                format!(
                    "unknown preset \"{name}\", available: {}",
                    Self::PRESETS.join(", ")
                ),
            )),
        }
    }

    /// Parses a scenario from a TOML file.
    ///
    /// Relative trace paths are resolved against the file's directory.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the file cannot be read or the TOML is invalid.
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| {
            ConfigError::new("scenario", format!("cannot read \"{}\": {e}", path.display()))
        })?;
        let mut cfg = Self::from_toml_str(&content)?;

        let base = path.parent().unwrap_or(Path::new("."));
        cfg.load.resolve_against(base);
        cfg.solar.resolve_against(base);
        Ok(cfg)
    }

    /// Parses a scenario from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the TOML is invalid, names an unknown
    /// component type or contains unknown fields.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError::new("toml", e.to_string()))
    }

    /// Validates all fields and returns a list of errors.
    ///
    /// Returns an empty vector if configuration is valid. Trace files are
    /// not opened here.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();
        let env = &self.environment;

        if env.episode_len == 0 {
            errors.push(ConfigError::new("environment.episode_len", "must be > 0"));
        }
        if !(env.time_step_len.is_finite() && env.time_step_len > 0.0) {
            errors.push(ConfigError::new("environment.time_step_len", "must be > 0"));
        }

        match &self.battery {
            BatteryConfig::LithiumIon { size, chemistry } => {
                if !(size.is_finite() && *size > 0.0) {
                    errors.push(ConfigError::new("battery.size", "must be > 0"));
                }
                if let Err(e) = chemistry.parse::<Chemistry>() {
                    errors.push(e);
                }
            }
        }

        match &self.grid {
            GridConfig::Peak {
                peak_threshold,
                base_price,
                peak_price,
            } => {
                for (field, value) in [
                    ("grid.peak_threshold", peak_threshold),
                    ("grid.base_price", base_price),
                    ("grid.peak_price", peak_price),
                ] {
                    if !(value.is_finite() && *value >= 0.0) {
                        errors.push(ConfigError::new(field, "must be a finite number >= 0"));
                    }
                }
            }
        }

        for (name, trace) in [("load", &self.load), ("solar", &self.solar)] {
            if trace.num_steps(env.episode_len) < env.episode_len {
                errors.push(ConfigError::new(
                    format!("{name}.num_steps"),
                    "must be >= environment.episode_len",
                ));
            }
        }

        if let (Some(load_day), Some(pv_day)) =
            (self.load.fixed_start_day(), self.solar.fixed_start_day())
        {
            if load_day != pv_day {
                errors.push(ConfigError::new(
                    "solar.fixed_start_day",
                    format!("must match load.fixed_start_day ({load_day}), got {pv_day}"),
                ));
            }
        }

        errors
    }

    /// Environment options of this scenario.
    pub fn env_options(&self) -> EnvOptions {
        let env = &self.environment;
        EnvOptions {
            episode_len: env.episode_len,
            time_step_len: env.time_step_len,
            grid_charging: env.grid_charging,
            infeasible_control_penalty: env.infeasible_control_penalty,
            extended_observation: env.extended_observation,
        }
    }

    /// Builds the battery described by the `[battery]` section.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` for an unsupported chemistry or invalid size.
    pub fn build_battery(&self) -> Result<LithiumIonBattery, ConfigError> {
        match &self.battery {
            BatteryConfig::LithiumIon { size, chemistry } => LithiumIonBattery::from_chemistry_name(
                *size,
                chemistry,
                self.environment.time_step_len,
            ),
        }
    }

    /// Builds the grid described by the `[grid]` section.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` for negative or non-finite prices.
    pub fn build_grid(&self) -> Result<PeakGrid, ConfigError> {
        match &self.grid {
            GridConfig::Peak {
                peak_threshold,
                base_price,
                peak_price,
            } => PeakGrid::new(
                *peak_threshold,
                *base_price,
                *peak_price,
                self.environment.time_step_len,
            ),
        }
    }

    /// Validates the scenario, loads both traces and assembles the environment.
    ///
    /// # Errors
    ///
    /// Returns [`EnvError::Configuration`] with the first validation problem,
    /// or if a trace file cannot be loaded.
    pub fn build_env(&self) -> Result<BatteryControlEnv, EnvError> {
        if let Some(first) = self.validate().into_iter().next() {
            return Err(first.into());
        }

        let episode_len = self.environment.episode_len;
        let battery = self.build_battery()?;
        let grid = self.build_grid()?;
        let load = self.load.build("load", episode_len)?;
        let pv = self.solar.build("solar", episode_len)?;

        info!(
            seed = self.environment.seed,
            load = %self.load.data_path().display(),
            solar = %self.solar.data_path().display(),
            "building environment"
        );
        BatteryControlEnv::new(
            self.env_options(),
            battery,
            grid,
            load,
            pv,
            StdRng::seed_from_u64(self.environment.seed),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
[battery]
type = "lithium_ion"
size = 10.0

[grid]
type = "peak"
peak_threshold = 1.0

[load]
type = "data"
data_path = "load.txt"

[solar]
type = "data"
data_path = "pv.txt"
"#;

    #[test]
    fn exp001_preset_valid() {
        let cfg = ScenarioConfig::exp001();
        let errors = cfg.validate();
        assert!(errors.is_empty(), "exp001 should be valid: {errors:?}");
    }

    #[test]
    fn all_presets_are_valid() {
        for name in ScenarioConfig::PRESETS {
            let cfg = ScenarioConfig::from_preset(name);
            assert!(cfg.is_ok(), "preset \"{name}\" should load");
            let errors = cfg.as_ref().map(|c| c.validate()).unwrap_or_default();
            assert!(
                errors.is_empty(),
                "preset \"{name}\" should be valid: {errors:?}"
            );
        }
    }

    #[test]
    fn from_preset_unknown() {
        let e = ScenarioConfig::from_preset("nonexistent").unwrap_err();
        assert_eq!(e.field, "preset");
        assert!(e.message.contains("unknown preset"));
    }

    #[test]
    fn minimal_toml_uses_defaults() {
        let cfg = ScenarioConfig::from_toml_str(MINIMAL).unwrap();
        assert_eq!(cfg.environment.episode_len, 24);
        assert_eq!(cfg.environment.seed, 42);
        assert!(!cfg.environment.grid_charging);
        match &cfg.battery {
            BatteryConfig::LithiumIon { chemistry, .. } => assert_eq!(chemistry, "NMC"),
        }
        match &cfg.grid {
            GridConfig::Peak {
                base_price,
                peak_price,
                ..
            } => {
                assert_eq!(*base_price, 0.14);
                assert_eq!(*peak_price, 1.0);
            }
        }
        assert_eq!(cfg.load.num_steps(24), 24);
    }

    #[test]
    fn unknown_component_type_is_rejected() {
        let toml = MINIMAL.replace("type = \"peak\"", "type = \"flat\"");
        let err = ScenarioConfig::from_toml_str(&toml).unwrap_err();
        assert_eq!(err.field, "toml");
    }

    #[test]
    fn unknown_field_is_rejected() {
        let toml = format!("{MINIMAL}\n[environment]\nbogus_field = true\n");
        assert!(ScenarioConfig::from_toml_str(&toml).is_err());
    }

    #[test]
    fn validation_catches_bad_chemistry() {
        let toml = MINIMAL.replace("size = 10.0", "size = 10.0\nchemistry = \"NiCd\"");
        let cfg = ScenarioConfig::from_toml_str(&toml).unwrap();
        let errors = cfg.validate();
        assert!(errors.iter().any(|e| e.field == "battery.chemistry"));
    }

    #[test]
    fn validation_collects_every_problem() {
        let mut cfg = ScenarioConfig::exp001();
        cfg.environment.episode_len = 0;
        cfg.environment.time_step_len = -1.0;
        cfg.battery = BatteryConfig::LithiumIon {
            size: 0.0,
            chemistry: "NMC".into(),
        };
        let fields: Vec<String> = cfg.validate().into_iter().map(|e| e.field).collect();
        assert!(fields.contains(&"environment.episode_len".to_string()));
        assert!(fields.contains(&"environment.time_step_len".to_string()));
        assert!(fields.contains(&"battery.size".to_string()));
    }

    #[test]
    fn validation_catches_short_windows() {
        let mut cfg = ScenarioConfig::exp001();
        cfg.load = TraceConfig::Data {
            data_path: "load.txt".into(),
            num_steps: Some(12),
            fixed_start_day: None,
        };
        let errors = cfg.validate();
        assert!(errors.iter().any(|e| e.field == "load.num_steps"));
    }

    #[test]
    fn validation_catches_mismatched_start_days() {
        let mut cfg = ScenarioConfig::exp001();
        cfg.load = TraceConfig::Data {
            data_path: "load.txt".into(),
            num_steps: None,
            fixed_start_day: Some(1),
        };
        cfg.solar = TraceConfig::Data {
            data_path: "pv.txt".into(),
            num_steps: None,
            fixed_start_day: Some(2),
        };
        let errors = cfg.validate();
        assert!(errors.iter().any(|e| e.field == "solar.fixed_start_day"));
    }

    #[test]
    fn relative_paths_resolve_against_scenario_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scenario.toml");
        fs::write(&path, MINIMAL).unwrap();

        let cfg = ScenarioConfig::from_toml_file(&path).unwrap();
        assert_eq!(cfg.load.data_path(), dir.path().join("load.txt"));
        assert_eq!(cfg.solar.data_path(), dir.path().join("pv.txt"));
    }

    #[test]
    fn missing_file_is_reported() {
        let err = ScenarioConfig::from_toml_file(Path::new("/nonexistent/scenario.toml"))
            .unwrap_err();
        assert_eq!(err.field, "scenario");
    }

    #[test]
    fn build_env_reports_missing_trace() {
        let mut cfg = ScenarioConfig::exp001();
        cfg.load = TraceConfig::Data {
            data_path: "/nonexistent/load.txt".into(),
            num_steps: None,
            fixed_start_day: None,
        };
        let err = cfg.build_env().err();
        assert!(matches!(
            err,
            Some(EnvError::Configuration(ConfigError { ref field, .. })) if field == "load.data_path"
        ));
    }

    #[test]
    fn exp001_builds() {
        let env = ScenarioConfig::exp001().build_env().unwrap();
        assert_eq!(env.charge_power_range(), (-10.0, 10.0));
        assert!(env.options().grid_charging);
    }
}
