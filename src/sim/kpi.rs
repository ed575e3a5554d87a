//! Post-hoc KPI computation from recorded episodes.

use std::fmt;

use serde::Serialize;

use super::episode::Episode;

/// Aggregate key performance indicators of one episode.
///
/// Computed post-hoc from the step infos so reported metrics always agree
/// with the recorded trajectory.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EpisodeKpi {
    pub steps: usize,
    /// Sum of grid costs.
    pub total_cost: f64,
    pub total_reward: f64,
    /// Largest grid draw (kW).
    pub peak_grid_kw: f64,
    /// Number of steps whose grid draw exceeded the peak threshold.
    pub peak_steps: usize,
    /// Total battery energy throughput (kWh, sum of |power| * dt).
    pub battery_throughput_kwh: f64,
    /// Battery equivalent full cycles (throughput / 2*capacity).
    pub battery_equivalent_full_cycles: f64,
    /// Sum of `|applied - requested|` over the episode (kW).
    pub infeasibility_gap_kw: f64,
}

impl EpisodeKpi {
    /// Computes all KPIs from a complete episode.
    ///
    /// # Arguments
    ///
    /// * `episode` - Recorded episode
    /// * `dt_hours` - Timestep duration in hours
    /// * `battery_capacity_kwh` - Battery capacity for cycle calculation
    pub fn from_episode(episode: &Episode, dt_hours: f64, battery_capacity_kwh: f64) -> Self {
        let mut kpi = Self {
            steps: episode.len(),
            total_reward: episode.total_reward(),
            ..Self::default()
        };

        for info in &episode.infos {
            kpi.total_cost += info.cost;
            kpi.peak_grid_kw = kpi.peak_grid_kw.max(info.net_load);
            if info.grid.peak_exceeded {
                kpi.peak_steps += 1;
            }
            kpi.battery_throughput_kwh += info.charging_power.abs() * dt_hours;
            kpi.infeasibility_gap_kw += (info.charging_power - info.requested_power).abs();
        }

        if battery_capacity_kwh > 0.0 {
            kpi.battery_equivalent_full_cycles =
                kpi.battery_throughput_kwh / (2.0 * battery_capacity_kwh);
        }
        kpi
    }
}

impl fmt::Display for EpisodeKpi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- KPI Report ({} steps) ---", self.steps)?;
        writeln!(f, "Total cost:            {:.4}", self.total_cost)?;
        writeln!(f, "Total reward:          {:.4}", self.total_reward)?;
        writeln!(
            f,
            "Peak grid draw:        {:.2} kW ({} steps above threshold)",
            self.peak_grid_kw, self.peak_steps
        )?;
        writeln!(
            f,
            "Battery throughput:    {:.2} kWh ({:.2} equiv. cycles)",
            self.battery_throughput_kwh, self.battery_equivalent_full_cycles
        )?;
        write!(f, "Infeasibility gap:     {:.3} kW", self.infeasibility_gap_kw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devices::GridInfo;
    use crate::sim::power_flow::{FlowOptions, PowerFlowGraph};
    use crate::sim::types::StepInfo;

    fn make_info(net_load: f64, charging_power: f64, requested_power: f64) -> StepInfo {
        let peak_excess = (net_load - 1.0).max(0.0);
        StepInfo {
            net_load,
            charging_power,
            requested_power,
            cost: net_load * 0.14,
            power_diff: None,
            grid: GridInfo {
                peak_exceeded: peak_excess > 0.0,
                peak_excess,
            },
            energy_before: 0.0,
            energy_after: 0.0,
            power_flow: PowerFlowGraph::new(["grid"], FlowOptions::default()).unwrap(),
        }
    }

    fn episode(infos: Vec<StepInfo>) -> Episode {
        Episode {
            observations: Vec::new(),
            actions: vec![0.0; infos.len()],
            rewards: infos.iter().map(|i| -i.cost).collect(),
            infos,
        }
    }

    #[test]
    fn empty_episode_is_all_zero() {
        let kpi = EpisodeKpi::from_episode(&Episode::default(), 1.0, 10.0);
        assert_eq!(kpi, EpisodeKpi::default());
    }

    #[test]
    fn aggregates_costs_and_peaks() {
        let ep = episode(vec![
            make_info(0.5, 0.0, 0.0),
            make_info(3.0, 2.0, 2.0),
            make_info(1.5, -1.0, -1.0),
        ]);
        let kpi = EpisodeKpi::from_episode(&ep, 1.0, 10.0);
        assert_eq!(kpi.steps, 3);
        assert!((kpi.total_cost - 5.0 * 0.14).abs() < 1e-12);
        assert!((kpi.total_reward + kpi.total_cost).abs() < 1e-12);
        assert_eq!(kpi.peak_grid_kw, 3.0);
        assert_eq!(kpi.peak_steps, 2);
    }

    #[test]
    fn throughput_and_cycles() {
        let ep = episode(vec![make_info(0.0, 4.0, 4.0), make_info(0.0, -4.0, -4.0)]);
        let kpi = EpisodeKpi::from_episode(&ep, 0.5, 2.0);
        assert_eq!(kpi.battery_throughput_kwh, 4.0);
        assert_eq!(kpi.battery_equivalent_full_cycles, 1.0);
    }

    #[test]
    fn infeasibility_gap_sums_clipped_power() {
        let ep = episode(vec![make_info(0.0, 0.0, -3.0), make_info(0.0, 1.5, 2.0)]);
        let kpi = EpisodeKpi::from_episode(&ep, 1.0, 10.0);
        assert_eq!(kpi.infeasibility_gap_kw, 3.5);
    }

    #[test]
    fn display_contains_all_sections() {
        let text = EpisodeKpi::default().to_string();
        assert!(text.contains("Total cost"));
        assert!(text.contains("Battery throughput"));
        assert!(text.contains("Infeasibility gap"));
    }
}
