// ─────────────────────────────────────────────────────────────────────
// netmimo — Optimization Run Reports
// ─────────────────────────────────────────────────────────────────────

use std::fmt;

use serde::{Deserialize, Serialize};

/// Replace NaN/Inf with `fallback`, logging where it happened.
#[inline]
pub fn finite_or(value: f64, fallback: f64, what: &str) -> f64 {
    if value.is_finite() {
        return value;
    }
    log::warn!("{what}: non-finite value {value}, using {fallback:.4}");
    fallback
}

/// One stage of an outer iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    Refresh,
    ReceiversAndRates,
    CouplingMatrices,
    BlockCoordinateDescent,
    PowerProjection,
    Objective,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Refresh => "refresh",
            Phase::ReceiversAndRates => "receivers_and_rates",
            Phase::CouplingMatrices => "coupling_matrices",
            Phase::BlockCoordinateDescent => "block_coordinate_descent",
            Phase::PowerProjection => "power_projection",
            Phase::Objective => "objective",
        };
        f.write_str(name)
    }
}

/// How an optimization run ended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Termination {
    /// Objective delta fell below the tolerance.
    Converged,
    /// Iteration budget ran out; the best objective is still reported.
    IterationBudgetExhausted,
    /// A phase failed numerically; the last stable objective is reported.
    Failed { phase: Phase, reason: String },
}

/// Snapshot of one outer iteration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IterationLog {
    pub iteration: usize,
    /// Sum rate minus the sparsity penalty.
    pub objective: f64,
    pub sum_rate: f64,
    pub penalty: f64,
    /// Links with a non-zero transmit vector.
    pub active_links: usize,
    /// Links whose bisection hit the iteration cap.
    pub capped_bisections: usize,
    /// Total transmitted power Σ‖v‖² over all links.
    pub transmit_power: f64,
}

/// Outcome of `Network::optimize`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationReport {
    pub termination: Termination,
    pub iterations: usize,
    pub initial_objective: f64,
    pub final_objective: f64,
    pub best_objective: f64,
    pub final_sum_rate: f64,
    pub history: Vec<IterationLog>,
}

impl OptimizationReport {
    pub fn converged(&self) -> bool {
        self.termination == Termination::Converged
    }

    pub fn failed(&self) -> bool {
        matches!(self.termination, Termination::Failed { .. })
    }

    /// Largest drop of the objective between two consecutive iterations.
    pub fn max_objective_drop(&self) -> f64 {
        let mut prev = self.initial_objective;
        let mut worst = 0.0f64;
        for log in &self.history {
            worst = worst.max(prev - log.objective);
            prev = log.objective;
        }
        worst
    }

    pub fn sum_rate_history(&self) -> Vec<f64> {
        self.history.iter().map(|l| l.sum_rate).collect()
    }
}
