use std::io::Read;
use std::ops::Range;
use std::path::Path;

use tracing::info;

use crate::devices::types::{ExogenousSource, STEPS_PER_DAY};
use crate::error::ConfigError;

/// Exogenous values sampled from a pre-recorded hourly trace.
///
/// Each episode reads a window of `num_steps + 1` consecutive values: the
/// first one seeds the initial observation, the rest are consumed one per
/// step. Windows always start at a day boundary.
#[derive(Debug, Clone)]
pub struct DataTrace {
    /// Config section this trace belongs to (`"load"` or `"solar"`).
    name: &'static str,
    values: Vec<f64>,
    num_steps: usize,
    fixed_start_day: Option<usize>,
    window: Range<usize>,
    cursor: usize,
}

impl DataTrace {
    /// Loads a trace from a comma- and/or newline-delimited text file.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the file cannot be read, contains a
    /// non-numeric entry, or is too short for the requested window.
    pub fn from_path(
        name: &'static str,
        path: &Path,
        num_steps: usize,
        fixed_start_day: Option<usize>,
    ) -> Result<Self, ConfigError> {
        let file = std::fs::File::open(path).map_err(|e| {
            ConfigError::new(
                format!("{name}.data_path"),
                format!("cannot read \"{}\": {e}", path.display()),
            )
        })?;
        let values = parse_trace(name, file)?;
        info!(name, path = %path.display(), samples = values.len(), "loaded trace");
        Self::from_values(name, values, num_steps, fixed_start_day)
    }

    /// Builds a trace from in-memory values.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if `num_steps` is zero, a value is not finite,
    /// the data is shorter than one window, or `fixed_start_day` leaves the
    /// data range.
    pub fn from_values(
        name: &'static str,
        values: Vec<f64>,
        num_steps: usize,
        fixed_start_day: Option<usize>,
    ) -> Result<Self, ConfigError> {
        if num_steps == 0 {
            return Err(ConfigError::new(format!("{name}.num_steps"), "must be > 0"));
        }
        if let Some((index, value)) = values.iter().enumerate().find(|(_, v)| !v.is_finite()) {
            return Err(ConfigError::new(
                format!("{name}.data_path"),
                format!("sample {index} is not finite ({value})"),
            ));
        }
        let window_len = num_steps + 1;
        if values.len() < window_len {
            return Err(ConfigError::new(
                format!("{name}.data_path"),
                format!(
                    "trace has {} samples, an episode needs {window_len}",
                    values.len()
                ),
            ));
        }
        let max_start_day = (values.len() - window_len) / STEPS_PER_DAY;
        if let Some(day) = fixed_start_day.filter(|&day| day > max_start_day) {
            return Err(ConfigError::new(
                format!("{name}.fixed_start_day"),
                format!("day {day} is beyond the data range (last valid day is {max_start_day})"),
            ));
        }

        Ok(Self {
            name,
            values,
            num_steps,
            fixed_start_day,
            window: 0..window_len,
            cursor: 0,
        })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Sample index the current episode window starts at.
    pub fn start(&self) -> usize {
        self.window.start
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn episode_values(&self) -> &[f64] {
        &self.values[self.window.clone()]
    }
}

impl ExogenousSource for DataTrace {
    fn reset(&mut self, start: usize) {
        let start = start.min(self.values.len());
        let end = (start + self.num_steps + 1).min(self.values.len());
        self.window = start..end;
        self.cursor = 0;
    }

    fn next_value(&mut self) -> Option<f64> {
        let value = self.episode_values().get(self.cursor).copied()?;
        self.cursor += 1;
        Some(value)
    }

    fn prediction(&self, start: usize, end: usize) -> &[f64] {
        let episode = self.episode_values();
        let end = end.min(episode.len());
        &episode[start.min(end)..end]
    }

    fn num_steps(&self) -> usize {
        self.num_steps
    }

    fn fixed_start_day(&self) -> Option<usize> {
        self.fixed_start_day
    }

    fn max_start_day(&self) -> usize {
        (self.values.len() - (self.num_steps + 1)) / STEPS_PER_DAY
    }
}

/// Parses comma- and/or newline-separated finite numbers; blank entries are skipped.
fn parse_trace(name: &str, reader: impl Read) -> Result<Vec<f64>, ConfigError> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut values = Vec::new();
    for (line, record) in rdr.records().enumerate() {
        let record = record.map_err(|e| {
            ConfigError::new(format!("{name}.data_path"), format!("line {}: {e}", line + 1))
        })?;
        for field in record.iter().filter(|f| !f.is_empty()) {
            let value = field
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| {
                    ConfigError::new(
                        format!("{name}.data_path"),
                        format!("line {}: \"{field}\" is not a finite number", line + 1),
                    )
                })?;
            values.push(value);
        }
    }
    Ok(values)
}
