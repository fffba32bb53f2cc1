// ─────────────────────────────────────────────────────────────────────
// netmimo — Core Types
// (C) 1998-2026 Miroslav Sotek. All rights reserved.
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
#![deny(unsafe_code)]
//! Type definitions, configuration, and error hierarchy for the
//! sparse coordinated beamforming engine.

pub mod config;
pub mod error;
pub mod report;

pub use config::{Damping, OptimizerConfig, SweepMode};
pub use error::{NetError, NetResult};
pub use report::{finite_or, IterationLog, OptimizationReport, Phase, Termination};
