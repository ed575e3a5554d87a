use tracing::debug;

use crate::devices::types::{GridInfo, GridModel};
use crate::error::{ConfigError, EnvError, Result};

/// A grid with peak-demand pricing that cannot accept back-feed.
///
/// Power up to `peak_threshold` is billed at `base_price`; anything above it
/// is billed at `peak_price`.
///
/// # Examples
///
/// ```
/// use solara_env::devices::{GridModel, PeakGrid};
///
/// let mut grid = PeakGrid::new(1.0, 0.14, 1.0, 1.0).unwrap();
/// assert!((grid.draw_power(2.0).unwrap() - 1.14).abs() < 1e-12);
/// assert!(grid.info().peak_exceeded);
/// ```
#[derive(Debug, Clone)]
pub struct PeakGrid {
    /// Power (kW) above which the peak price applies.
    pub peak_threshold: f64,
    /// Price per kWh below the threshold.
    pub base_price: f64,
    /// Price per kWh above the threshold.
    pub peak_price: f64,
    time_step_len: f64,
    last_info: GridInfo,
}

impl PeakGrid {
    pub const DEFAULT_BASE_PRICE: f64 = 0.14;
    pub const DEFAULT_PEAK_PRICE: f64 = 1.0;

    /// Creates a peak grid.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if any parameter is negative or not finite, or
    /// if `time_step_len` is not positive.
    pub fn new(
        peak_threshold: f64,
        base_price: f64,
        peak_price: f64,
        time_step_len: f64,
    ) -> Result<Self, ConfigError> {
        for (field, value) in [
            ("grid.peak_threshold", peak_threshold),
            ("grid.base_price", base_price),
            ("grid.peak_price", peak_price),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(ConfigError::new(field, "must be a finite number >= 0"));
            }
        }
        if !(time_step_len.is_finite() && time_step_len > 0.0) {
            return Err(ConfigError::new("environment.time_step_len", "must be > 0"));
        }

        Ok(Self {
            peak_threshold,
            base_price,
            peak_price,
            time_step_len,
            last_info: GridInfo::default(),
        })
    }

    /// Creates a peak grid with the default base and peak prices.
    ///
    /// # Errors
    ///
    /// See [`PeakGrid::new`].
    pub fn with_threshold(peak_threshold: f64, time_step_len: f64) -> Result<Self, ConfigError> {
        Self::new(
            peak_threshold,
            Self::DEFAULT_BASE_PRICE,
            Self::DEFAULT_PEAK_PRICE,
            time_step_len,
        )
    }

    /// Cost of drawing `power` kW for one step, without touching diagnostics.
    ///
    /// # Errors
    ///
    /// Returns [`EnvError::GridInput`] when `power` is negative.
    pub fn price(&self, power: f64) -> Result<f64> {
        if power < 0.0 {
            return Err(EnvError::GridInput { power });
        }

        let cost = if power <= self.peak_threshold {
            power * self.base_price * self.time_step_len
        } else {
            (self.peak_threshold * self.base_price
                + (power - self.peak_threshold) * self.peak_price)
                * self.time_step_len
        };
        Ok(cost)
    }
}

impl GridModel for PeakGrid {
    fn draw_power(&mut self, power: f64) -> Result<f64> {
        let cost = self.price(power)?;
        let peak_excess = (power - self.peak_threshold).max(0.0);
        self.last_info = GridInfo {
            peak_exceeded: peak_excess > 0.0,
            peak_excess,
        };
        debug!(power, cost, peak_excess, "drew power from grid");
        Ok(cost)
    }

    fn info(&self) -> GridInfo {
        self.last_info
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    fn grid() -> PeakGrid {
        PeakGrid::new(1.0, 0.14, 1.0, 1.0).unwrap()
    }

    #[test]
    fn below_threshold_uses_base_price() {
        let mut g = grid();
        assert_relative_eq!(g.draw_power(0.5).unwrap(), 0.07);
        assert!(!g.info().peak_exceeded);
        assert_eq!(g.info().peak_excess, 0.0);
    }

    #[test]
    fn above_threshold_adds_peak_price() {
        let mut g = grid();
        assert_relative_eq!(g.draw_power(2.0).unwrap(), 1.14);
        assert!(g.info().peak_exceeded);
        assert_relative_eq!(g.info().peak_excess, 1.0);
    }

    #[test]
    fn threshold_itself_is_base_priced() {
        let mut g = grid();
        assert_eq!(g.draw_power(1.0).unwrap(), 0.14);
        assert!(!g.info().peak_exceeded);
    }

    #[test]
    fn time_step_scales_cost() {
        let mut g = PeakGrid::new(2.0, 0.2, 0.5, 0.25).unwrap();
        assert_relative_eq!(g.draw_power(1.0).unwrap(), 0.05);
        assert_relative_eq!(g.draw_power(4.0).unwrap(), (0.4 + 1.0) * 0.25);
    }

    #[test]
    fn negative_power_is_rejected() {
        let mut g = grid();
        assert_eq!(
            g.draw_power(-0.1),
            Err(EnvError::GridInput { power: -0.1 })
        );
    }

    #[test]
    fn invalid_parameters_are_rejected() {
        assert!(PeakGrid::new(-1.0, 0.14, 1.0, 1.0).is_err());
        assert!(PeakGrid::new(1.0, f64::NAN, 1.0, 1.0).is_err());
        assert!(PeakGrid::new(1.0, 0.14, 1.0, 0.0).is_err());
    }

    #[test]
    fn default_prices() {
        let g = PeakGrid::with_threshold(1.0, 1.0).unwrap();
        assert_eq!(g.base_price, 0.14);
        assert_eq!(g.peak_price, 1.0);
    }
}
