//! Components of the simulated micro-system: battery, grid, and exogenous traces.

/// Lithium-ion battery with a feasibility-constrained charge solver.
pub mod battery;
/// Episode-wide affine battery constraints.
pub mod constraints;
/// Peak-demand priced grid.
pub mod grid;
/// Load and PV traces sampled from recorded data.
pub mod trace;
pub mod types;

// Re-export the main types for convenience
pub use battery::{Chemistry, LithiumIonBattery};
pub use constraints::{EpisodeConstraints, LimitCurve, TrajectoryPoint};
pub use grid::PeakGrid;
pub use trace::DataTrace;
pub use types::{ExogenousSource, GridInfo, GridModel, STEPS_PER_DAY, Storage};
