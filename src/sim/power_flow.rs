//! Signed, directed power-flow bookkeeping between named components.
//!
//! `values[i][j]` is the power component `i` gives to component `j`; the
//! graph keeps `values[j][i] == -values[i][j]` for every write. The net flow
//! of a component is its row sum without the diagonal: positive for a net
//! giver, negative for a net receiver.
//!
//! Connections are strictly directed: registering `a -> b` authorises writes
//! addressed as `(a, b)`. The written value may have either sign and is
//! always mirrored, so it can be read back in both orientations.

use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FlowError {
    #[error("component names must be unique, \"{0}\" appears twice")]
    DuplicateComponent(String),

    #[error("unknown component \"{0}\"")]
    UnknownComponent(String),

    #[error("no connection from \"{source_name}\" to \"{target}\"")]
    NoConnection { source_name: String, target: String },

    #[error("cannot set a flow from \"{0}\" to itself")]
    SelfFlow(String),

    #[error("\"{0}\" would be both receiving and giving power")]
    BothDirections(String),
}

/// Behaviour switches of a [`PowerFlowGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlowOptions {
    /// Connect every pair of components up front.
    pub fully_connected: bool,
    /// Keep each component's net flow on the diagonal after every write.
    pub auto_update_values: bool,
    /// Reject writes that would make a component both a giver and a receiver.
    pub single_direction: bool,
}

impl Default for FlowOptions {
    fn default() -> Self {
        Self {
            fully_connected: false,
            auto_update_values: false,
            single_direction: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PowerFlowGraph {
    components: Vec<String>,
    #[serde(skip)]
    connections: Vec<bool>,
    /// Row-major `n x n` matrix.
    values: Vec<f64>,
    #[serde(skip)]
    options: FlowOptions,
}

impl PowerFlowGraph {
    /// Creates a graph over `components` with no flows.
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::DuplicateComponent`] if a name repeats.
    pub fn new<I, S>(components: I, options: FlowOptions) -> Result<Self, FlowError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut names: Vec<String> = Vec::new();
        for name in components {
            let name = name.into();
            if names.contains(&name) {
                return Err(FlowError::DuplicateComponent(name));
            }
            names.push(name);
        }

        let n = names.len();
        let connections = (0..n * n)
            .map(|k| options.fully_connected || k / n == k % n)
            .collect();

        Ok(Self {
            components: names,
            connections,
            values: vec![0.0; n * n],
            options,
        })
    }

    pub fn components(&self) -> &[String] {
        &self.components
    }

    /// Returns the internal index of `component`.
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::UnknownComponent`] for names not in the graph.
    pub fn index(&self, component: &str) -> Result<usize, FlowError> {
        self.components
            .iter()
            .position(|c| c == component)
            .ok_or_else(|| FlowError::UnknownComponent(component.to_string()))
    }

    /// Registers the directed connection `source -> target`.
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::UnknownComponent`] for names not in the graph.
    pub fn add_connection(&mut self, source: &str, target: &str) -> Result<(), FlowError> {
        let cell = self.cell(self.index(source)?, self.index(target)?);
        self.connections[cell] = true;
        Ok(())
    }

    /// Net flow of `component` (positive = net giver).
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::UnknownComponent`] for names not in the graph.
    pub fn get(&self, component: &str) -> Result<f64, FlowError> {
        Ok(self.net_power(self.index(component)?))
    }

    /// Power `source` gives to `target`; the net flow when both are the same.
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::UnknownComponent`] for names not in the graph.
    pub fn get_between(&self, source: &str, target: &str) -> Result<f64, FlowError> {
        let (s, t) = (self.index(source)?, self.index(target)?);
        if s == t {
            return Ok(self.net_power(s));
        }
        Ok(self.values[self.cell(s, t)])
    }

    /// Records that `source` gives `value` kW to `target`.
    ///
    /// # Errors
    ///
    /// Fails without modifying the graph if either name is unknown, the
    /// connection was never registered, or (in single-direction mode) either
    /// end would end up both receiving and giving power.
    pub fn set(&mut self, source: &str, target: &str, value: f64) -> Result<(), FlowError> {
        let (s, t) = (self.index(source)?, self.index(target)?);
        if s == t {
            return Err(FlowError::SelfFlow(source.to_string()));
        }
        if !self.connections[self.cell(s, t)] {
            return Err(FlowError::NoConnection {
                source_name: source.to_string(),
                target: target.to_string(),
            });
        }

        if self.options.single_direction {
            // Net flows of both ends, ignoring the edge being overwritten.
            let source_other = self.net_power(s) - self.values[self.cell(s, t)];
            let target_other = self.net_power(t) - self.values[self.cell(t, s)];
            let (giver, receiver) = if value >= 0.0 {
                ((source, source_other), (target, target_other))
            } else {
                ((target, target_other), (source, source_other))
            };
            if value != 0.0 && receiver.1 > 0.0 {
                return Err(FlowError::BothDirections(receiver.0.to_string()));
            }
            if value != 0.0 && giver.1 < 0.0 {
                return Err(FlowError::BothDirections(giver.0.to_string()));
            }
        }

        let st = self.cell(s, t);
        let ts = self.cell(t, s);
        self.values[st] = value;
        self.values[ts] = -value;

        if self.options.auto_update_values {
            let (ss, tt) = (self.cell(s, s), self.cell(t, t));
            self.values[ss] = self.net_power(s);
            self.values[tt] = self.net_power(t);
        }
        Ok(())
    }

    /// All registered non-self connections in row-major order.
    pub fn connections(&self) -> Vec<(&str, &str)> {
        let n = self.components.len();
        (0..n * n)
            .filter(|&k| self.connections[k] && k / n != k % n)
            .map(|k| (self.components[k / n].as_str(), self.components[k % n].as_str()))
            .collect()
    }

    /// Every strictly positive flow as `(giver, receiver, power)`.
    pub fn flows(&self) -> Vec<(&str, &str, f64)> {
        let n = self.components.len();
        (0..n * n)
            .filter(|&k| k / n != k % n && self.values[k] > 0.0)
            .map(|k| {
                (
                    self.components[k / n].as_str(),
                    self.components[k % n].as_str(),
                    self.values[k],
                )
            })
            .collect()
    }

    fn cell(&self, row: usize, col: usize) -> usize {
        row * self.components.len() + col
    }

    fn net_power(&self, idx: usize) -> f64 {
        let n = self.components.len();
        (0..n)
            .filter(|&j| j != idx)
            .map(|j| self.values[idx * n + j])
            .sum()
    }
}
