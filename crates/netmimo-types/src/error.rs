// ─────────────────────────────────────────────────────────────────────
// netmimo — Error Hierarchy
// ─────────────────────────────────────────────────────────────────────

use thiserror::Error;

/// Root error type for all netmimo failures.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NetError {
    /// Cluster handle does not belong to the topology it was used with.
    #[error("cluster {0} is not attached to a network")]
    ClusterNotAttached(usize),

    /// BS or UE handle out of range.
    #[error("unknown {kind} {index}")]
    UnknownEntity { kind: &'static str, index: usize },

    /// Optimization state was queried before `refresh()` populated it.
    #[error("network not ready: {0}")]
    NotRefreshed(String),

    /// A channel was requested between two entities of the same kind.
    #[error("channel requested between two entities of kind {0}")]
    SameKindChannel(&'static str),

    /// A cluster has no member that the operation needs.
    #[error("cluster {cluster} has no {what}")]
    EmptyCluster { cluster: usize, what: &'static str },

    /// Matrix inversion hit a vanishing pivot.
    #[error("matrix is not invertible (pivot {pivot:.3e} at column {column})")]
    Singular { column: usize, pivot: f64 },

    /// Eigendecomposition or power iteration ran out of sweeps.
    #[error("eigendecomposition did not converge after {sweeps} sweeps")]
    EigenNotConverged { sweeps: usize },

    /// Operand shapes disagree.
    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: String, got: String },

    /// NaN or Inf surfaced in a quantity that must be finite.
    #[error("non-finite value in {0}")]
    NonFinite(String),

    /// The per-link subproblem for (bs, ue) could not be solved.
    #[error("ill-conditioned subproblem for bs {bs} / ue {ue}: {reason}")]
    IllConditioned { bs: usize, ue: usize, reason: String },

    /// Power projection could not bracket the budget.
    #[error("power projection for bs {bs} did not bracket the budget after {iterations} halvings")]
    BisectionDiverged { bs: usize, iterations: usize },

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),
}

impl NetError {
    /// True for failures caused by the numbers rather than by misuse of the API.
    pub fn is_numerical(&self) -> bool {
        matches!(
            self,
            NetError::Singular { .. }
                | NetError::EigenNotConverged { .. }
                | NetError::NonFinite(_)
                | NetError::IllConditioned { .. }
                | NetError::BisectionDiverged { .. }
        )
    }

    /// Wrap a numerical failure with the link it occurred on.
    pub fn on_link(self, bs: usize, ue: usize) -> NetError {
        match self {
            NetError::IllConditioned { .. } => self,
            other => NetError::IllConditioned {
                bs,
                ue,
                reason: other.to_string(),
            },
        }
    }
}

pub type NetResult<T> = Result<T, NetError>;
