// ─────────────────────────────────────────────────────────────────────
// netmimo — Base-Station Updates: Link Solve and Power Allocation
// ─────────────────────────────────────────────────────────────────────
//! Per-BS half of the outer iteration.
//!
//! `block_coordinate_descent` solves one link against its coupling
//! vector. `optimize_power_allocation` then moves the per-link power
//! allocation along the dual subgradients (g = −μ*) scaled by a secant
//! Hessian estimate, projects onto {x ≥ ε, Σx ≤ budget} and blends the
//! projection into the current allocation.

use netmimo_linalg::{ComplexVector, HermitianEigen};
use netmimo_types::{finite_or, NetError, NetResult, OptimizerConfig};

use crate::bisection::{solve_link, BisectionSettings};
use crate::state::{BaseStationState, LinkState};

/// New variables for one link.
#[derive(Debug, Clone)]
pub struct LinkUpdate {
    pub v: ComplexVector,
    pub mu: f64,
    pub converged: bool,
}

impl LinkUpdate {
    /// Write the update into the link and record its dual subgradient.
    pub fn apply(self, link: &mut LinkState) {
        link.v = self.v;
        link.mu = self.mu;
        link.subgradient = -self.mu;
        link.capped = !self.converged;
    }
}

/// Solve the link subproblem for coupling vector `c`.
///
/// A link whose coupling vector is no longer than λ/2 is switched off.
pub fn block_coordinate_descent(
    eigen: &HermitianEigen,
    c: &ComplexVector,
    power: f64,
    lambda: f64,
    settings: &BisectionSettings,
) -> NetResult<LinkUpdate> {
    if c.norm2() <= lambda / 2.0 {
        return Ok(LinkUpdate {
            v: ComplexVector::zeros(c.len()),
            mu: 0.0,
            converged: true,
        });
    }
    let out = solve_link(eigen, c, power, lambda, settings)?;
    Ok(LinkUpdate {
        v: out.v,
        mu: out.mu,
        converged: out.converged,
    })
}

/// Euclidean projection of `directions` onto {x ≥ floor, Σx ≤ budget}.
///
/// x_i(r) = max(floor, d_i − r) with r found by bisection so that
/// budget − tolerance·budget ≤ Σx ≤ budget.
pub fn project_power(
    directions: &[f64],
    budget: f64,
    floor: f64,
    tolerance: f64,
    max_iterations: usize,
    bs: usize,
) -> NetResult<Vec<f64>> {
    if directions.is_empty() {
        return Ok(Vec::new());
    }
    if directions.iter().any(|d| !d.is_finite()) {
        return Err(NetError::NonFinite(format!("power direction of bs {bs}")));
    }
    let n = directions.len() as f64;
    if floor * n > budget {
        return Err(NetError::BisectionDiverged { bs, iterations: 0 });
    }

    let at = |r: f64| -> Vec<f64> { directions.iter().map(|d| (d - r).max(floor)).collect() };
    let total = |r: f64| -> f64 { directions.iter().map(|d| (d - r).max(floor)).sum() };

    if total(0.0) <= budget {
        return Ok(at(0.0));
    }

    let mut lo = 0.0;
    let mut hi = directions.iter().copied().fold(f64::MIN, f64::max) - floor;
    for _ in 0..max_iterations {
        let mid = 0.5 * (lo + hi);
        let sum = total(mid);
        if sum <= budget && budget - sum <= tolerance * budget {
            return Ok(at(mid));
        }
        if sum > budget {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    Err(NetError::BisectionDiverged {
        bs,
        iterations: max_iterations,
    })
}

/// Subgradient step on the power allocation of one base station.
pub fn optimize_power_allocation(
    state: &mut BaseStationState,
    iteration: usize,
    cfg: &OptimizerConfig,
) -> NetResult<()> {
    if state.links.is_empty() {
        return Ok(());
    }

    for link in state.links.values_mut() {
        if let Some((p_prev, g_prev)) = link.previous {
            let dp = link.power - p_prev;
            if dp.abs() > f64::EPSILON * link.power.max(1.0) {
                let secant = finite_or(
                    ((link.subgradient - g_prev) / dp).abs(),
                    link.hessian,
                    "hessian secant",
                );
                link.hessian = secant.clamp(cfg.hessian_floor, cfg.hessian_ceiling);
            }
        }
    }

    let directions: Vec<f64> = state
        .links
        .values()
        .map(|l| l.power - l.subgradient / l.hessian)
        .collect();
    let projected = project_power(
        &directions,
        state.power_budget,
        cfg.power_floor,
        cfg.projection_tolerance,
        cfg.max_projection_iterations,
        state.id.0,
    )?;

    let alpha = cfg.damping.factor(iteration);
    for (link, x) in state.links.values_mut().zip(projected) {
        link.previous = Some((link.power, link.subgradient));
        link.power = (1.0 - alpha) * link.power + alpha * x;
    }
    Ok(())
}
