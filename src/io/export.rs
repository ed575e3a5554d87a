//! CSV export for episode trajectories.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use crate::sim::episode::Episode;

/// Column header of the trajectory export.
pub const HEADER: &str = "time_step,load,pv_gen,action,requested_power,charging_power,\
                          net_load,cost,reward,battery_cont,peak_exceeded";

/// Exports an episode to a CSV file at the given path.
///
/// # Errors
///
/// Returns an `io::Error` if file creation or writing fails.
pub fn export_csv(episode: &Episode, path: &Path) -> io::Result<()> {
    let file = File::create(path)?;
    let buf = io::BufWriter::new(file);
    write_csv(episode, buf)
}

/// Writes one row per step: the load and PV the step acted on, the action,
/// the resulting powers and cost, and the energy content after the step.
///
/// # Errors
///
/// Returns an `io::Error` if writing fails.
pub fn write_csv(episode: &Episode, writer: impl Write) -> io::Result<()> {
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);

    wtr.write_record(HEADER.split(',').map(str::trim))?;

    let steps = episode
        .observations
        .iter()
        .zip(&episode.actions)
        .zip(&episode.rewards)
        .zip(&episode.infos);
    for (((obs, action), reward), info) in steps {
        wtr.write_record(&[
            obs.time_step.to_string(),
            format!("{:.4}", obs.load),
            format!("{:.4}", obs.pv_gen),
            format!("{action:.4}"),
            format!("{:.4}", info.requested_power),
            format!("{:.4}", info.charging_power),
            format!("{:.4}", info.net_load),
            format!("{:.4}", info.cost),
            format!("{reward:.4}"),
            format!("{:.4}", info.energy_after),
            info.grid.peak_exceeded.to_string(),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}
