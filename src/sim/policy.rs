//! Baseline control policies.
//!
//! None of them learn; they drive the environment in tests and from the
//! command line.

use super::types::Observation;

/// Maps an observation to a normalized action in `[-1, 1]`.
pub trait Policy {
    fn act(&mut self, observation: &Observation) -> f64;
}

impl<P: Policy + ?Sized> Policy for Box<P> {
    fn act(&mut self, observation: &Observation) -> f64 {
        (**self).act(observation)
    }
}

/// Never touches the battery.
#[derive(Debug, Default, Clone, Copy)]
pub struct IdlePolicy;

impl Policy for IdlePolicy {
    fn act(&mut self, _observation: &Observation) -> f64 {
        0.0
    }
}

/// Requests the same action every step.
#[derive(Debug, Clone, Copy)]
pub struct ConstantPolicy {
    action: f64,
}

impl ConstantPolicy {
    /// Creates a constant policy; `action` is clamped to `[-1, 1]`.
    pub fn new(action: f64) -> Self {
        Self {
            action: if action.is_nan() { 0.0 } else { action.clamp(-1.0, 1.0) },
        }
    }

    pub fn action(&self) -> f64 {
        self.action
    }
}

impl Policy for ConstantPolicy {
    fn act(&mut self, _observation: &Observation) -> f64 {
        self.action
    }
}

/// Stores surplus PV and discharges to cover load the PV cannot.
///
/// Action: `(pv_gen - load) / max_power`, clamped to `[-1, 1]`.
#[derive(Debug, Clone, Copy)]
pub struct SolarFollowPolicy {
    max_power: f64,
}

impl SolarFollowPolicy {
    /// `max_power` is the battery power (kW) an action of 1 maps to.
    pub fn new(max_power: f64) -> Self {
        Self { max_power }
    }
}

impl Policy for SolarFollowPolicy {
    fn act(&mut self, observation: &Observation) -> f64 {
        if self.max_power <= 0.0 {
            return 0.0;
        }
        ((observation.pv_gen - observation.load) / self.max_power).clamp(-1.0, 1.0)
    }
}
