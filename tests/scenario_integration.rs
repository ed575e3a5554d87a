//! Integration tests for scenario files, presets, KPIs and trajectory export.

mod common;

use std::fs;

use solara_env::config::ScenarioConfig;
use solara_env::devices::{STEPS_PER_DAY, Storage};
use solara_env::error::EnvError;
use solara_env::io::export::{HEADER, export_csv};
use solara_env::sim::kpi::EpisodeKpi;
use solara_env::sim::policy::{ConstantPolicy, IdlePolicy, SolarFollowPolicy};
use solara_env::sim::run_episode;

#[test]
fn bundled_scenario_file_matches_preset() {
    let from_file = ScenarioConfig::from_toml_file(&common::scenario_path("exp001.toml")).unwrap();
    assert!(from_file.validate().is_empty());

    let mut env_file = from_file.build_env().unwrap();
    let mut env_preset = common::exp001_env();
    let ep_file = run_episode(&mut env_file, &mut SolarFollowPolicy::new(10.0)).unwrap();
    let ep_preset = run_episode(&mut env_preset, &mut SolarFollowPolicy::new(10.0)).unwrap();
    assert_eq!(ep_file.rewards, ep_preset.rewards);
}

#[test]
fn scenario_paths_resolve_relative_to_file() {
    let cfg = ScenarioConfig::from_toml_file(&common::scenario_path("exp001.toml")).unwrap();
    let load = fs::canonicalize(cfg.load.data_path()).unwrap();
    assert_eq!(load, fs::canonicalize(common::data_dir().join("load.txt")).unwrap());
}

#[test]
fn fixed_start_day_scenario() {
    let cfg =
        ScenarioConfig::from_toml_file(&common::scenario_path("lto_fixed_day.toml")).unwrap();
    let mut env = cfg.build_env().unwrap();

    for _ in 0..3 {
        let episode = run_episode(&mut env, &mut ConstantPolicy::new(1.0)).unwrap();
        assert_eq!(env.episode_start(), 3 * STEPS_PER_DAY);
        assert_eq!(episode.len(), 48);
        assert!(episode.observations.iter().all(|o| o.extension.is_some()));
        // PV-only charging
        for (obs, info) in episode.observations.iter().zip(&episode.infos) {
            assert!(info.requested_power <= obs.pv_gen);
        }
    }
}

#[test]
fn scenario_with_unknown_chemistry_fails_validation() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.toml");
    let text = fs::read_to_string(common::scenario_path("exp001.toml"))
        .unwrap()
        .replace("chemistry = \"NMC\"", "chemistry = \"NiCd\"");
    fs::write(&path, text).unwrap();

    let cfg = ScenarioConfig::from_toml_file(&path).unwrap();
    let errors = cfg.validate();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].field, "battery.chemistry");
    assert!(matches!(cfg.build_env(), Err(EnvError::Configuration(_))));
}

#[test]
fn scenario_with_unknown_grid_kind_fails_to_parse() {
    let text = fs::read_to_string(common::scenario_path("exp001.toml"))
        .unwrap()
        .replace("type = \"peak\"", "type = \"time_of_use\"");
    let err = ScenarioConfig::from_toml_str(&text).unwrap_err();
    assert_eq!(err.field, "toml");
}

#[test]
fn trace_too_short_for_episode_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("short.txt"), "0.5,0.5,0.5\n").unwrap();
    let text = fs::read_to_string(common::scenario_path("exp001.toml"))
        .unwrap()
        .replace("../data/load.txt", "short.txt")
        .replace("../data/pv.txt", &common::data_dir().join("pv.txt").display().to_string());
    let path = dir.path().join("scenario.toml");
    fs::write(&path, text).unwrap();

    let cfg = ScenarioConfig::from_toml_file(&path).unwrap();
    match cfg.build_env() {
        Err(EnvError::Configuration(e)) => assert_eq!(e.field, "load.data_path"),
        other => panic!("expected a configuration error, got {:?}", other.err()),
    }
}

#[test]
fn all_presets_run_an_episode() {
    for name in ScenarioConfig::PRESETS {
        let cfg = ScenarioConfig::from_preset(name).unwrap();
        let mut env = cfg.build_env().unwrap();
        let episode = run_episode(&mut env, &mut IdlePolicy).unwrap();
        assert_eq!(episode.len(), cfg.environment.episode_len, "preset {name}");
        assert!(episode.rewards.iter().all(|r| r.is_finite()));
    }
}

#[test]
fn kpis_agree_with_episode() {
    let mut env = common::exp001_env();
    let episode = run_episode(&mut env, &mut SolarFollowPolicy::new(10.0)).unwrap();
    let kpi = EpisodeKpi::from_episode(&episode, 1.0, env.battery().capacity());

    assert_eq!(kpi.steps, 24);
    assert!((kpi.total_cost - episode.total_cost()).abs() < 1e-12);
    assert!((kpi.total_reward - episode.total_reward()).abs() < 1e-12);
    // penalty on: reward = -(cost + gap)
    assert!((kpi.total_reward + kpi.total_cost + kpi.infeasibility_gap_kw).abs() < 1e-9);
    assert!(kpi.peak_grid_kw >= 0.0);
    assert!(kpi.battery_equivalent_full_cycles >= 0.0);
}

#[test]
fn solar_following_beats_idle_on_cost() {
    let mut idle_env = common::exp001_env();
    let mut solar_env = common::exp001_env();
    let mut idle_cost = 0.0;
    let mut solar_cost = 0.0;
    for _ in 0..5 {
        idle_cost += run_episode(&mut idle_env, &mut IdlePolicy)
            .unwrap()
            .total_cost();
        solar_cost += run_episode(&mut solar_env, &mut SolarFollowPolicy::new(10.0))
            .unwrap()
            .total_cost();
    }
    assert!(solar_cost <= idle_cost, "{solar_cost} > {idle_cost}");
}

#[test]
fn exported_trajectory_has_one_row_per_step() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("trajectory.csv");
    let mut env = common::exp001_env();
    let episode = run_episode(&mut env, &mut ConstantPolicy::new(0.4)).unwrap();
    export_csv(&episode, &path).unwrap();

    let text = fs::read_to_string(&path).unwrap();
    let mut lines = text.lines();
    assert_eq!(lines.next(), Some(HEADER));
    assert_eq!(lines.count(), episode.len());
}
