//! Shared test fixtures for integration tests.
#![allow(dead_code)]

use std::path::{Path, PathBuf};

use rand::SeedableRng;
use rand::rngs::StdRng;
use solara_env::config::ScenarioConfig;
use solara_env::devices::{Chemistry, DataTrace, LithiumIonBattery, PeakGrid, STEPS_PER_DAY};
use solara_env::sim::{BatteryControlEnv, EnvOptions};

/// Directory holding the bundled traces.
pub fn data_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("data")
}

/// Path of a bundled scenario file.
pub fn scenario_path(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("scenarios")
        .join(name)
}

/// NMC battery of `size` kWh with one-hour steps.
pub fn nmc_battery(size: f64) -> LithiumIonBattery {
    LithiumIonBattery::new(size, Chemistry::Nmc, 1.0).expect("valid battery")
}

/// Peak grid with threshold 1 kW and default prices.
pub fn peak_grid() -> PeakGrid {
    PeakGrid::new(1.0, 0.14, 1.0, 1.0).expect("valid grid")
}

/// Trace over `days` days where sample `i` holds `f(i % 24)`.
pub fn daily_trace(name: &'static str, days: usize, f: impl Fn(usize) -> f64) -> DataTrace {
    let values = (0..days * STEPS_PER_DAY).map(|i| f(i % STEPS_PER_DAY)).collect();
    DataTrace::from_values(name, values, STEPS_PER_DAY, None).expect("valid trace")
}

/// Evening-peaked household load (kW).
pub fn household_load(hour: usize) -> f64 {
    if (17..22).contains(&hour) { 2.5 } else { 0.6 }
}

/// Clear-sky PV profile (kW) between 06:00 and 18:00.
pub fn clear_sky_pv(hour: usize) -> f64 {
    if (6..=18).contains(&hour) {
        3.0 * (std::f64::consts::PI * (hour - 6) as f64 / 12.0).sin()
    } else {
        0.0
    }
}

/// Environment over synthetic traces with an NMC 10 kWh battery and the peak grid.
pub fn synthetic_env(options: EnvOptions, seed: u64) -> BatteryControlEnv {
    BatteryControlEnv::new(
        options,
        nmc_battery(10.0),
        peak_grid(),
        daily_trace("load", 7, household_load),
        daily_trace("solar", 7, clear_sky_pv),
        StdRng::seed_from_u64(seed),
    )
    .expect("valid environment")
}

/// The default experiment built from the bundled traces.
pub fn exp001_env() -> BatteryControlEnv {
    ScenarioConfig::exp001()
        .build_env()
        .expect("exp001 should build")
}
