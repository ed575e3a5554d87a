//! Episode rollouts.

use tracing::info;

use crate::devices::{ExogenousSource, GridModel, Storage, TrajectoryPoint};
use crate::error::Result;

use super::env::BatteryControlEnv;
use super::policy::Policy;
use super::types::{Observation, StepInfo};

/// Everything recorded while running one episode.
///
/// `observations[0]` is the observation returned by `reset()`; entry `k + 1`
/// is the one returned by step `k`, so it holds one more element than the
/// per-step vectors.
#[derive(Debug, Clone, Default)]
pub struct Episode {
    pub observations: Vec<Observation>,
    pub actions: Vec<f64>,
    pub rewards: Vec<f64>,
    pub infos: Vec<StepInfo>,
}

impl Episode {
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn total_reward(&self) -> f64 {
        self.rewards.iter().sum()
    }

    pub fn total_cost(&self) -> f64 {
        self.infos.iter().map(|i| i.cost).sum()
    }

    /// Applied battery power and energy content per step, in the form the
    /// episode constraints are checked against.
    pub fn trajectory(&self) -> Vec<TrajectoryPoint> {
        self.infos
            .iter()
            .map(|i| TrajectoryPoint {
                power: i.charging_power,
                content_before: i.energy_before,
                content_after: i.energy_after,
            })
            .collect()
    }
}

/// Resets `env` and steps it with `policy` until the episode ends.
///
/// # Errors
///
/// Propagates any error from `reset()` or `step()`.
pub fn run_episode<B, G, S, P>(env: &mut BatteryControlEnv<B, G, S>, policy: &mut P) -> Result<Episode>
where
    B: Storage,
    G: GridModel,
    S: ExogenousSource,
    P: Policy + ?Sized,
{
    let capacity = env.options().episode_len;
    let mut episode = Episode {
        observations: Vec::with_capacity(capacity + 1),
        actions: Vec::with_capacity(capacity),
        rewards: Vec::with_capacity(capacity),
        infos: Vec::with_capacity(capacity),
    };

    let mut observation = env.reset()?;
    episode.observations.push(observation);

    loop {
        let action = policy.act(&observation);
        let outcome = env.step(action)?;
        observation = outcome.observation;

        episode.observations.push(outcome.observation);
        episode.actions.push(action);
        episode.rewards.push(outcome.reward);
        episode.infos.push(outcome.info);

        if outcome.done {
            break;
        }
    }

    info!(
        start = env.episode_start(),
        steps = episode.len(),
        total_reward = episode.total_reward(),
        "episode finished"
    );
    Ok(episode)
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;
    use crate::devices::{Chemistry, DataTrace, LithiumIonBattery, PeakGrid};
    use crate::sim::policy::{ConstantPolicy, IdlePolicy};
    use crate::sim::types::EnvOptions;

    fn env(episode_len: usize) -> BatteryControlEnv {
        let options = EnvOptions {
            episode_len,
            grid_charging: true,
            ..EnvOptions::default()
        };
        let load = DataTrace::from_values("load", vec![0.5; 48], 24, None).unwrap();
        let pv = DataTrace::from_values("solar", vec![0.0; 48], 24, None).unwrap();
        let battery = LithiumIonBattery::new(10.0, Chemistry::Nmc, 1.0).unwrap();
        let grid = PeakGrid::with_threshold(1.0, 1.0).unwrap();
        BatteryControlEnv::new(options, battery, grid, load, pv, StdRng::seed_from_u64(1)).unwrap()
    }

    #[test]
    fn records_one_entry_per_step() {
        let mut env = env(24);
        let episode = run_episode(&mut env, &mut IdlePolicy).unwrap();
        assert_eq!(episode.len(), 24);
        assert_eq!(episode.observations.len(), 25);
        assert_eq!(episode.observations[0].time_step, 0);
        assert_eq!(episode.observations[24].time_step, 24);
    }

    #[test]
    fn idle_episode_pays_base_price() {
        let mut env = env(24);
        let episode = run_episode(&mut env, &mut IdlePolicy).unwrap();
        assert!((episode.total_cost() - 24.0 * 0.07).abs() < 1e-9);
        assert!((episode.total_reward() + episode.total_cost()).abs() < 1e-9);
    }

    #[test]
    fn shorter_episodes_stop_early() {
        let mut env = env(6);
        let episode = run_episode(&mut env, &mut ConstantPolicy::new(0.1)).unwrap();
        assert_eq!(episode.len(), 6);
        assert_eq!(episode.trajectory().len(), 6);
    }

    #[test]
    fn trajectory_chains_energy_content() {
        let mut env = env(24);
        let episode = run_episode(&mut env, &mut ConstantPolicy::new(0.3)).unwrap();
        let trajectory = episode.trajectory();
        for pair in trajectory.windows(2) {
            assert_eq!(pair[0].content_after, pair[1].content_before);
        }
    }
}
