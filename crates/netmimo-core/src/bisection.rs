// ─────────────────────────────────────────────────────────────────────
// netmimo — Nested Bisection for the Per-Link Subproblem
// ─────────────────────────────────────────────────────────────────────
//! Closed-form solution of the group-sparse, power-limited link problem
//!
//!   min_v  v^H M v − 2 Re(c^H v) + λ‖v‖₂   s.t.  ‖v‖₂² ≤ P
//!
//! With θ = 1/‖v‖ and power multiplier μ the optimum is
//! v = ((λθ/2 + μ)I + M)⁻¹ c, where (μ, θ) solve target(μ, θ) = 1 for
//!
//!   target(μ, θ) = θ · ‖((λθ/2 + μ)I + M)⁻¹ c‖₂.
//!
//! Starting from θ₀ = 1/√P: if target(0, θ₀) ≥ 1 the power limit binds
//! and μ is bisected with θ = θ₀; otherwise μ = 0 and θ is bisected
//! upward. In the eigenbasis of M (M = U·diag(d)·U^H, b = U^H c)
//!
//!   ‖((sI + M)⁻¹ c‖² = Σ_k |b_k|² / (s + d_k)²
//!
//! so each evaluation is O(n) once b is known.

use netmimo_linalg::{Complex64, ComplexVector, HermitianEigen};
use netmimo_types::{NetError, NetResult, OptimizerConfig};

/// Stopping rules of one nested bisection.
#[derive(Debug, Clone, Copy)]
pub struct BisectionSettings {
    /// Stop when |target − 1| falls below this.
    pub tolerance: f64,
    /// Stop when the bracket is relatively narrower than this.
    pub relative_tolerance: f64,
    /// Cap on doublings and on halvings.
    pub max_iterations: usize,
}

impl From<&OptimizerConfig> for BisectionSettings {
    fn from(cfg: &OptimizerConfig) -> Self {
        Self {
            tolerance: cfg.bisection_tolerance,
            relative_tolerance: cfg.bisection_relative_tolerance,
            max_iterations: cfg.max_bisection_iterations,
        }
    }
}

impl Default for BisectionSettings {
    fn default() -> Self {
        Self::from(&OptimizerConfig::default())
    }
}

/// Result of the nested bisection for one link.
#[derive(Debug, Clone)]
pub struct BisectionOutcome {
    pub v: ComplexVector,
    pub mu: f64,
    pub theta: f64,
    /// False when a bisection stopped on its iteration cap.
    pub converged: bool,
    pub iterations: usize,
}

/// μ_H = max(θ₀‖c‖ − λθ₀/2, 0): target(μ_H, θ₀) ≤ 1 for PSD M.
pub fn lagrangian_multiplier_upper_bound(c_norm: f64, theta0: f64, lambda: f64) -> f64 {
    (theta0 * c_norm - lambda * theta0 / 2.0).max(0.0)
}

/// θ_H = max(θ₀, ρ / (‖c‖ − λ/2)): target(0, θ_H) ≥ 1 when ρ bounds M.
///
/// Infinite when ‖c‖ ≤ λ/2, where no finite θ reaches the target.
pub fn inverse_norm_upper_bound(c_norm: f64, lambda: f64, rho: f64, theta0: f64) -> f64 {
    let excess = c_norm - lambda / 2.0;
    if excess <= 0.0 {
        return f64::INFINITY;
    }
    theta0.max(rho / excess)
}

/// target(μ, θ) evaluated in the eigenbasis of M.
struct Target<'a> {
    eigenvalues: &'a [f64],
    weights: Vec<f64>,
    lambda: f64,
}

impl Target<'_> {
    fn shift(&self, mu: f64, theta: f64) -> f64 {
        self.lambda * theta / 2.0 + mu
    }

    fn eval(&self, mu: f64, theta: f64) -> f64 {
        let s = self.shift(mu, theta);
        let norm2: f64 = self
            .eigenvalues
            .iter()
            .zip(&self.weights)
            .map(|(d, w)| {
                let denom = s + d.max(0.0);
                w / (denom * denom)
            })
            .sum();
        theta * norm2.sqrt()
    }
}

fn zero_outcome(n: usize, iterations: usize) -> BisectionOutcome {
    BisectionOutcome {
        v: ComplexVector::zeros(n),
        mu: 0.0,
        theta: f64::INFINITY,
        converged: true,
        iterations,
    }
}

/// Solve the link subproblem for coupling vector `c`, given the
/// eigendecomposition of M, the link power `power` and weight `lambda`.
pub fn solve_link(
    eigen: &HermitianEigen,
    c: &ComplexVector,
    power: f64,
    lambda: f64,
    settings: &BisectionSettings,
) -> NetResult<BisectionOutcome> {
    if !(power > 0.0 && power.is_finite()) {
        return Err(NetError::NonFinite(format!("link power {power}")));
    }
    if !c.is_finite() {
        return Err(NetError::NonFinite("coupling vector".into()));
    }
    let n = eigen.dim();
    let b = eigen.project(c)?;
    let target = Target {
        eigenvalues: eigen.values(),
        weights: b.iter().map(|z| z.norm_sqr()).collect(),
        lambda,
    };
    let c_norm = c.norm2();
    let theta0 = 1.0 / power.sqrt();
    let cap = settings.max_iterations;
    let narrow = |lo: f64, hi: f64| {
        hi - lo <= settings.relative_tolerance * hi.abs().max(f64::MIN_POSITIVE)
    };

    let mut iterations = 0;
    let mut converged = false;
    let (mu, theta) = if target.eval(0.0, theta0) >= 1.0 {
        // Power limit binds: θ = θ₀, target decreasing in μ.
        let mut hi = lagrangian_multiplier_upper_bound(c_norm, theta0, lambda).max(f64::EPSILON);
        while target.eval(hi, theta0) >= 1.0 {
            hi *= 2.0;
            iterations += 1;
            if iterations > cap || !hi.is_finite() {
                return Err(NetError::NonFinite(format!(
                    "power multiplier unbounded after {iterations} doublings"
                )));
            }
        }
        let (mut lo, mut mid) = (0.0, hi);
        for _ in 0..cap {
            iterations += 1;
            mid = 0.5 * (lo + hi);
            let t = target.eval(mid, theta0);
            if (t - 1.0).abs() < settings.tolerance || narrow(lo, hi) {
                converged = true;
                break;
            }
            if t > 1.0 {
                lo = mid;
            } else {
                hi = mid;
            }
        }
        (mid, theta0)
    } else {
        // Power slack: μ = 0, target increasing in θ.
        let rho = eigen.spectral_radius();
        let mut hi = inverse_norm_upper_bound(c_norm, lambda, rho, theta0);
        if !hi.is_finite() {
            return Ok(zero_outcome(n, iterations));
        }
        let mut doublings = 0;
        while target.eval(0.0, hi) < 1.0 {
            hi *= 2.0;
            doublings += 1;
            if doublings > cap || !hi.is_finite() {
                log::warn!("θ diverged after {doublings} doublings, link switched off");
                return Ok(zero_outcome(n, iterations + doublings));
            }
        }
        iterations += doublings;
        let (mut lo, mut mid) = (theta0, hi);
        for _ in 0..cap {
            iterations += 1;
            mid = 0.5 * (lo + hi);
            let t = target.eval(0.0, mid);
            if (t - 1.0).abs() < settings.tolerance || narrow(lo, hi) {
                converged = true;
                break;
            }
            if t < 1.0 {
                lo = mid;
            } else {
                hi = mid;
            }
        }
        (0.0, mid)
    };

    if !(theta.is_finite() && (1.0 / theta).is_finite()) {
        return Ok(zero_outcome(n, iterations));
    }

    let s = target.shift(mu, theta);
    let scaled: Vec<Complex64> = b
        .iter()
        .zip(eigen.values())
        .map(|(bk, d)| bk / (s + d.max(0.0)))
        .collect();
    let v = eigen.reconstruct(&ComplexVector::from_vec(scaled))?;
    if !v.is_finite() {
        return Err(NetError::NonFinite("closed-form transmit vector".into()));
    }
    Ok(BisectionOutcome {
        v,
        mu,
        theta,
        converged,
        iterations,
    })
}
