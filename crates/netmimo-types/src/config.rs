// ─────────────────────────────────────────────────────────────────────
// netmimo — Optimizer Configuration
// ─────────────────────────────────────────────────────────────────────

use serde::{Deserialize, Serialize};

use crate::error::{NetError, NetResult};

/// Blending schedule for the per-BS power allocation update.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Damping {
    /// P ← (1 − α)·P + α·projection, α constant in (0, 1].
    Fixed(f64),
    /// α = 1 / iteration.
    Harmonic,
}

impl Damping {
    /// Blending factor for the given (1-based) outer iteration.
    pub fn factor(&self, iteration: usize) -> f64 {
        match *self {
            Damping::Fixed(alpha) => alpha,
            Damping::Harmonic => 1.0 / iteration.max(1) as f64,
        }
    }
}

/// Order in which links are updated inside one outer iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SweepMode {
    /// UEs are swept in parallel; the serving BSs of one UE are still
    /// visited in order, each seeing the vectors already solved for it.
    Jacobi,
    /// Links are visited in order; each c-vector sees the vectors
    /// already written in this sweep.
    GaussSeidel,
}

/// Runtime configuration for the network optimizer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizerConfig {
    /// Group-sparsity weight λ applied to every link.
    /// Default: 0.3.
    pub sparsity_weight: f64,

    /// Receiver noise power N0.
    /// Default: 1.0.
    pub noise_power: f64,

    /// Outer loop stops once |Δobjective| drops below this.
    /// Default: 1e-2.
    pub tolerance: f64,

    /// Outer iteration budget.
    /// Default: 200.
    pub max_iterations: usize,

    /// Per-link bisection stops when |target − 1| is below this.
    /// Default: 1e-6.
    pub bisection_tolerance: f64,

    /// Per-link bisection stops when the bracket is relatively this narrow.
    /// Default: 1e-8.
    pub bisection_relative_tolerance: f64,

    /// Hard cap on halvings (and doublings) inside one per-link bisection.
    /// Default: 200.
    pub max_bisection_iterations: usize,

    /// Relative budget mismatch accepted by the power projection.
    /// Default: 1e-6.
    pub projection_tolerance: f64,

    /// Hard cap on halvings inside the power projection.
    /// Default: 200.
    pub max_projection_iterations: usize,

    /// Minimum power kept on every served link (ε).
    /// Default: 1e-9.
    pub power_floor: f64,

    /// Power allocation blending schedule.
    /// Default: `Damping::Harmonic`.
    pub damping: Damping,

    /// Lower clamp for the Hessian-diagonal estimate.
    /// Default: 1e-3.
    pub hessian_floor: f64,

    /// Upper clamp for the Hessian-diagonal estimate.
    /// Default: 1e3.
    pub hessian_ceiling: f64,

    /// Link update order.
    /// Default: `SweepMode::GaussSeidel`.
    pub sweep: SweepMode,

    /// Seed for channel draws and the random starting point.
    /// Default: 42.
    pub seed: u64,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            sparsity_weight: 0.3,
            noise_power: 1.0,
            tolerance: 1e-2,
            max_iterations: 200,
            bisection_tolerance: 1e-6,
            bisection_relative_tolerance: 1e-8,
            max_bisection_iterations: 200,
            projection_tolerance: 1e-6,
            max_projection_iterations: 200,
            power_floor: 1e-9,
            damping: Damping::Harmonic,
            hessian_floor: 1e-3,
            hessian_ceiling: 1e3,
            sweep: SweepMode::GaussSeidel,
            seed: 42,
        }
    }
}

impl OptimizerConfig {
    /// Validate configuration parameters.
    pub fn validate(&self) -> NetResult<()> {
        if !(self.sparsity_weight >= 0.0 && self.sparsity_weight.is_finite()) {
            return Err(NetError::Config(format!(
                "sparsity_weight must be finite and >= 0, got {}",
                self.sparsity_weight
            )));
        }
        if !(self.noise_power > 0.0 && self.noise_power.is_finite()) {
            return Err(NetError::Config(format!(
                "noise_power must be finite and > 0, got {}",
                self.noise_power
            )));
        }
        if self.tolerance <= 0.0 {
            return Err(NetError::Config(format!(
                "tolerance must be > 0, got {}",
                self.tolerance
            )));
        }
        if self.max_iterations == 0 {
            return Err(NetError::Config(
                "max_iterations must be >= 1".to_string(),
            ));
        }
        if self.bisection_tolerance <= 0.0 || self.bisection_relative_tolerance <= 0.0 {
            return Err(NetError::Config(format!(
                "bisection tolerances must be > 0, got {} / {}",
                self.bisection_tolerance, self.bisection_relative_tolerance
            )));
        }
        if self.max_bisection_iterations < 8 {
            return Err(NetError::Config(format!(
                "max_bisection_iterations must be >= 8, got {}",
                self.max_bisection_iterations
            )));
        }
        if self.projection_tolerance <= 0.0 || self.max_projection_iterations == 0 {
            return Err(NetError::Config(format!(
                "projection tolerance/iterations must be positive, got {} / {}",
                self.projection_tolerance, self.max_projection_iterations
            )));
        }
        if self.power_floor < 0.0 {
            return Err(NetError::Config(format!(
                "power_floor must be >= 0, got {}",
                self.power_floor
            )));
        }
        if let Damping::Fixed(alpha) = self.damping {
            if !(alpha > 0.0 && alpha <= 1.0) {
                return Err(NetError::Config(format!(
                    "fixed damping must be in (0, 1], got {alpha}"
                )));
            }
        }
        if !(self.hessian_floor > 0.0 && self.hessian_floor <= self.hessian_ceiling) {
            return Err(NetError::Config(format!(
                "hessian clamp must satisfy 0 < floor <= ceiling, got [{}, {}]",
                self.hessian_floor, self.hessian_ceiling
            )));
        }
        Ok(())
    }

    /// Load from JSON string.
    pub fn from_json(json: &str) -> NetResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| NetError::Config(format!("JSON parse error: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        OptimizerConfig::default().validate().expect("default config");
    }

    #[test]
    fn test_rejects_negative_lambda() {
        let cfg = OptimizerConfig {
            sparsity_weight: -0.1,
            ..OptimizerConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(NetError::Config(_))));
    }

    #[test]
    fn test_rejects_bad_damping() {
        let cfg = OptimizerConfig {
            damping: Damping::Fixed(1.5),
            ..OptimizerConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_rejects_inverted_hessian_clamp() {
        let cfg = OptimizerConfig {
            hessian_floor: 10.0,
            hessian_ceiling: 1.0,
            ..OptimizerConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_json_round_trip() {
        let cfg = OptimizerConfig {
            sparsity_weight: 0.7,
            damping: Damping::Fixed(0.5),
            sweep: SweepMode::Jacobi,
            ..OptimizerConfig::default()
        };
        let json = serde_json::to_string(&cfg).unwrap();
        let back = OptimizerConfig::from_json(&json).unwrap();
        assert!((back.sparsity_weight - 0.7).abs() < 1e-12);
        assert_eq!(back.damping, Damping::Fixed(0.5));
        assert_eq!(back.sweep, SweepMode::Jacobi);
    }

    #[test]
    fn test_from_json_reports_parse_error() {
        let err = OptimizerConfig::from_json("{not json").unwrap_err();
        assert!(err.to_string().contains("JSON parse error"));
    }

    #[test]
    fn test_damping_factor() {
        assert!((Damping::Harmonic.factor(4) - 0.25).abs() < 1e-12);
        assert!((Damping::Harmonic.factor(0) - 1.0).abs() < 1e-12);
        assert!((Damping::Fixed(0.3).factor(17) - 0.3).abs() < 1e-12);
    }
}
