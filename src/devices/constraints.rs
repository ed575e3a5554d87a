//! Affine battery constraints over a whole episode.
//!
//! The runtime battery enforces its limits one step at a time. External
//! optimizers need the same limits stated over a trajectory instead, on the
//! decision variables `c[k] >= 0` (charging), `d[k] >= 0` (discharging) and
//! `b[k]` (energy content at the start of step `k`, so `b` has `horizon + 1`
//! entries).

use serde::Serialize;

/// Affine limit of the energy content as a function of applied power.
///
/// `limit(p) = slope * (p / nominal_voltage) + intercept`
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LimitCurve {
    pub slope: f64,
    pub intercept: f64,
    pub nominal_voltage: f64,
}

impl LimitCurve {
    pub fn new(slope: f64, intercept: f64, nominal_voltage: f64) -> Self {
        Self {
            slope,
            intercept,
            nominal_voltage,
        }
    }

    /// Evaluates the curve at a non-negative power magnitude.
    pub fn at(&self, power: f64) -> f64 {
        self.slope * (power / self.nominal_voltage) + self.intercept
    }

    /// Coefficient of the power term once the voltage is folded in.
    pub fn power_coefficient(&self) -> f64 {
        self.slope / self.nominal_voltage
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConstraintKind {
    /// `b[0] = initial_content`
    InitialContent,
    /// `b[k+1] = b[k] + eta_c*dt*c[k] - eta_d*dt*d[k]`
    Dynamics,
    /// `c[k] <= alpha_c`
    ChargeRate,
    /// `d[k] <= alpha_d`
    DischargeRate,
    /// `b[k+1] <= upper(c[k])`
    UpperLimit,
    /// `b[k+1] >= lower(d[k])`
    LowerLimit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Relation {
    Equal,
    LessOrEqual,
}

/// One row `charge*c[k] + discharge*d[k] + content*b[k] + next_content*b[k+1] (= | <=) rhs`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AffineRow {
    pub step: usize,
    pub kind: ConstraintKind,
    pub charge: f64,
    pub discharge: f64,
    pub content: f64,
    pub next_content: f64,
    pub relation: Relation,
    pub rhs: f64,
}

impl AffineRow {
    fn lhs(&self, c: f64, d: f64, b: f64, b_next: f64) -> f64 {
        self.charge * c + self.discharge * d + self.content * b + self.next_content * b_next
    }
}

/// One recorded battery step: powers applied and the content around them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrajectoryPoint {
    /// Signed applied power (positive = charging).
    pub power: f64,
    /// Energy content before the step.
    pub content_before: f64,
    /// Energy content after the step.
    pub content_after: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ConstraintViolation {
    pub step: usize,
    pub kind: ConstraintKind,
    /// How far the row is from being satisfied.
    pub amount: f64,
}

/// Battery constraints over `horizon` steps in vectorized affine form.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EpisodeConstraints {
    pub horizon: usize,
    pub time_step_len: f64,
    pub eta_c: f64,
    pub eta_d: f64,
    pub max_charge: f64,
    pub max_discharge: f64,
    pub lower: LimitCurve,
    pub upper: LimitCurve,
    /// `b[0]`.
    pub initial_content: f64,
}

impl EpisodeConstraints {
    /// Returns every constraint row, grouped by step. Step 0 starts with the
    /// initial condition on `b[0]`.
    pub fn rows(&self) -> Vec<AffineRow> {
        let dt = self.time_step_len;
        let mut rows = Vec::with_capacity(self.horizon * 5 + 1);
        if self.horizon > 0 {
            rows.push(AffineRow {
                step: 0,
                kind: ConstraintKind::InitialContent,
                charge: 0.0,
                discharge: 0.0,
                content: 1.0,
                next_content: 0.0,
                relation: Relation::Equal,
                rhs: self.initial_content,
            });
        }
        for step in 0..self.horizon {
            let row = |kind, charge, discharge, content, next_content, relation, rhs| AffineRow {
                step,
                kind,
                charge,
                discharge,
                content,
                next_content,
                relation,
                rhs,
            };
            rows.push(row(
                ConstraintKind::Dynamics,
                -self.eta_c * dt,
                self.eta_d * dt,
                -1.0,
                1.0,
                Relation::Equal,
                0.0,
            ));
            rows.push(row(
                ConstraintKind::ChargeRate,
                1.0,
                0.0,
                0.0,
                0.0,
                Relation::LessOrEqual,
                self.max_charge,
            ));
            rows.push(row(
                ConstraintKind::DischargeRate,
                0.0,
                1.0,
                0.0,
                0.0,
                Relation::LessOrEqual,
                self.max_discharge,
            ));
            rows.push(row(
                ConstraintKind::UpperLimit,
                -self.upper.power_coefficient(),
                0.0,
                0.0,
                1.0,
                Relation::LessOrEqual,
                self.upper.intercept,
            ));
            rows.push(row(
                ConstraintKind::LowerLimit,
                0.0,
                self.lower.power_coefficient(),
                0.0,
                -1.0,
                Relation::LessOrEqual,
                -self.lower.intercept,
            ));
        }
        rows
    }

    /// Evaluates the rows against a recorded trajectory.
    ///
    /// Steps beyond the horizon are ignored. A row counts as violated when it
    /// misses by more than `tolerance`.
    pub fn violations(
        &self,
        trajectory: &[TrajectoryPoint],
        tolerance: f64,
    ) -> Vec<ConstraintViolation> {
        let rows = self.rows();
        let mut violations = Vec::new();

        for (step, point) in trajectory.iter().enumerate().take(self.horizon) {
            let c = point.power.max(0.0);
            let d = (-point.power).max(0.0);
            for row in rows.iter().filter(|r| r.step == step) {
                let residual = row.lhs(c, d, point.content_before, point.content_after) - row.rhs;
                let amount = match row.relation {
                    Relation::Equal => residual.abs(),
                    Relation::LessOrEqual => residual.max(0.0),
                };
                if amount > tolerance {
                    violations.push(ConstraintViolation {
                        step,
                        kind: row.kind,
                        amount,
                    });
                }
            }
        }

        violations
    }
}
