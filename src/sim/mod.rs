/// The step/reset environment.
pub mod env;
pub mod episode;
pub mod kpi;
/// Baseline policies.
pub mod policy;
/// Directed power-flow bookkeeping between named components.
pub mod power_flow;
pub mod types;

pub use env::BatteryControlEnv;
pub use episode::{Episode, run_episode};
pub use types::{EnvOptions, EnvPhase, Observation, StepInfo, StepOutcome};
