//! solara-env entry point: CLI wiring and config-driven environment construction.

use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing::{info, warn};

use solara_env::cli::Cli;
use solara_env::config::ScenarioConfig;
use solara_env::io::export::export_csv;
use solara_env::sim::episode::{Episode, run_episode};
use solara_env::sim::kpi::EpisodeKpi;
use solara_env::telemetry::{DEFAULT_FILTER, init_tracing};

/// Tolerance for checking trajectories against the battery constraints.
const CONSTRAINT_TOLERANCE: f64 = 1e-6;

fn load_scenario(cli: &Cli) -> Result<ScenarioConfig> {
    let mut scenario = match &cli.scenario {
        Some(path) => ScenarioConfig::from_toml_file(path)?,
        None => ScenarioConfig::from_preset(&cli.preset)?,
    };

    if let Some(seed) = cli.seed {
        scenario.environment.seed = seed;
    }

    let errors = scenario.validate();
    if !errors.is_empty() {
        for e in &errors {
            eprintln!("{e}");
        }
        bail!("scenario has {} invalid field(s)", errors.len());
    }
    Ok(scenario)
}

fn print_episode(index: u32, episode: &Episode, json: bool) {
    for (((obs, reward), info), action) in episode
        .observations
        .iter()
        .skip(1)
        .zip(&episode.rewards)
        .zip(&episode.infos)
        .zip(&episode.actions)
    {
        if json {
            let line = serde_json::json!({
                "episode": index,
                "action": action,
                "observation": obs,
                "reward": reward,
                "info": info,
            });
            println!("{line}");
        } else {
            println!(
                "t={:>3} | action={:>6.3} reward={:>8.4} cost={:>7.4} | net={:>6.2} kW  bat={:>6.2} kW (cont={:.2} kWh)",
                obs.time_step,
                action,
                reward,
                info.cost,
                info.net_load,
                info.charging_power,
                obs.battery_cont,
            );
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(DEFAULT_FILTER).context("failed to install tracing subscriber")?;

    let scenario = load_scenario(&cli)?;
    let mut env = scenario.build_env()?;
    let (_, max_power) = env.charge_power_range();
    let mut policy = cli.build_policy(max_power);

    let dt = scenario.environment.time_step_len;
    let mut last = None;
    for index in 0..cli.episodes {
        let constraints = env.battery().episode_constraints(scenario.environment.episode_len);
        let episode = run_episode(&mut env, &mut policy)?;

        let violations = constraints.violations(&episode.trajectory(), CONSTRAINT_TOLERANCE);
        if !violations.is_empty() {
            warn!(episode = index, count = violations.len(), "battery constraints violated");
        }

        print_episode(index, &episode, cli.json);
        let kpi = EpisodeKpi::from_episode(&episode, dt, env.battery().size);
        if cli.json {
            println!("{}", serde_json::json!({ "episode": index, "kpi": kpi }));
        } else {
            println!("\n{kpi}\n");
        }
        last = Some(episode);
    }

    if let (Some(path), Some(episode)) = (&cli.telemetry_out, &last) {
        export_csv(episode, path)
            .with_context(|| format!("failed to write CSV to {}", path.display()))?;
        info!(path = %path.display(), "telemetry written");
    }
    Ok(())
}
