// ─────────────────────────────────────────────────────────────────────
// netmimo — Complex Linear Algebra
// (C) 1998-2026 Miroslav Sotek. All rights reserved.
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
#![deny(unsafe_code)]
//! Dense complex linear algebra for the beamforming engine.
//!
//! Only dense storage is exercised by the optimizer, so a single
//! representation covers the whole interface:
//!   - ComplexVector: precoders, receivers, coupling vectors
//!   - ComplexMatrix: channels, covariances, coupling matrices
//!   - HermitianEigen: cyclic complex Jacobi (ascending eigenpairs)
//!   - spectral_radius: Jacobi for Hermitian input, power iteration otherwise

pub mod eigen;
pub mod matrix;
pub mod vector;

pub use eigen::{spectral_norm, spectral_radius, HermitianEigen};
pub use matrix::{ComplexMatrix, MatrixNorm};
pub use num_complex::Complex64;
pub use vector::{ComplexVector, VectorNorm};

/// Entry-wise tolerance used by `approx_eq` and the Hermitian checks.
pub const EQUAL_THRESHOLD: f64 = 1e-8;

/// Circularly-symmetric complex Gaussian sample CN(0, 1).
pub fn complex_gaussian<R: rand::Rng + ?Sized>(rng: &mut R) -> Complex64 {
    use rand_distr::{Distribution, StandardNormal};
    let re: f64 = StandardNormal.sample(rng);
    let im: f64 = StandardNormal.sample(rng);
    Complex64::new(re, im) * std::f64::consts::FRAC_1_SQRT_2
}
