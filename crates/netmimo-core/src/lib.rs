// ─────────────────────────────────────────────────────────────────────
// netmimo — Sparse Coordinated Beamforming Engine
// (C) 1998-2026 Miroslav Sotek. All rights reserved.
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
#![deny(unsafe_code)]
//! Group-sparse, power-constrained WMMSE beamforming for cooperative
//! MIMO networks.
//!
//! Every base station may serve every UE of the clusters in its
//! closure. The optimizer maximises Σ rate − λ Σ ‖v_{q,i}‖₂, so the
//! group penalty switches whole BS→UE links off and the network
//! settles on a sparse cooperation pattern.
//!
//! # Invariants
//!
//! 1. **Per-BS power budget**: after every power projection
//!    Σ_i P_{q,i} ≤ budget_q, and every transmit vector satisfies
//!    ‖v_{q,i}‖² ≤ P_{q,i} up to the bisection tolerance.
//!
//! 2. **Sparsity rule**: a link is switched off exactly when its
//!    coupling vector satisfies ‖c_{q,i}‖ ≤ λ/2.
//!
//! 3. **No silent garbage**: a non-finite value in any phase ends the
//!    run with `Termination::Failed` and the last stable state restored.

pub mod base_station;
pub mod bisection;
pub mod coupling;
pub mod network;
pub mod receiver;
pub mod state;

pub use base_station::{
    block_coordinate_descent, optimize_power_allocation, project_power, LinkUpdate,
};
pub use bisection::{solve_link, BisectionOutcome, BisectionSettings};
pub use coupling::{coupling_vector, update_c_vector, CouplingStore};
pub use network::{LinkSummary, Network};
pub use receiver::{evaluate_rate, update_variables, Snapshot};
pub use state::{BaseStationState, LinkState, UeState, ACTIVE_THRESHOLD};
