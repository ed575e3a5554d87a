//! Command-line arguments of the `solara-env` binary.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::sim::policy::{ConstantPolicy, IdlePolicy, Policy, SolarFollowPolicy};

#[derive(Debug, Parser)]
#[command(name = "solara-env")]
#[command(version, about = "Battery control environment: run baseline policies on a scenario")]
pub struct Cli {
    /// Scenario TOML file
    #[arg(long, value_name = "PATH", conflicts_with = "preset")]
    pub scenario: Option<PathBuf>,

    /// Built-in scenario (exp001, solar_only); used when --scenario is absent
    #[arg(long, default_value = "exp001")]
    pub preset: String,

    /// Override the scenario seed
    #[arg(long, env = "SOLARA_SEED")]
    pub seed: Option<u64>,

    /// Policy that picks the action each step
    #[arg(long, value_enum, default_value_t = PolicyKind::SolarFollow)]
    pub policy: PolicyKind,

    /// Action for the constant policy, in [-1, 1]
    #[arg(
        long,
        default_value_t = 0.0,
        allow_negative_numbers = true,
        value_parser = parse_action
    )]
    pub action: f64,

    /// Number of episodes to run
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    pub episodes: u32,

    /// Write the last episode's trajectory to this CSV file
    #[arg(long, value_name = "PATH")]
    pub telemetry_out: Option<PathBuf>,

    /// Print one JSON object per step instead of a table
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

/// Baseline policies selectable from the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PolicyKind {
    Idle,
    Constant,
    SolarFollow,
}

impl Cli {
    /// Instantiates the selected policy; `max_power` is the battery power an
    /// action of 1 maps to.
    pub fn build_policy(&self, max_power: f64) -> Box<dyn Policy> {
        match self.policy {
            PolicyKind::Idle => Box::new(IdlePolicy),
            PolicyKind::Constant => Box::new(ConstantPolicy::new(self.action)),
            PolicyKind::SolarFollow => Box::new(SolarFollowPolicy::new(max_power)),
        }
    }
}

fn parse_action(s: &str) -> Result<f64, String> {
    let action: f64 = s.parse().map_err(|_| format!("\"{s}\" is not a number"))?;
    if !(-1.0..=1.0).contains(&action) {
        return Err(format!("{action} is outside [-1, 1]"));
    }
    Ok(action)
}
