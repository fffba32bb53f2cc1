// ─────────────────────────────────────────────────────────────────────
// netmimo — Hermitian Eigensolver
// ─────────────────────────────────────────────────────────────────────
//! Cyclic complex Jacobi eigendecomposition for Hermitian matrices.
//!
//! Each rotation first removes the phase of a_pq with a diagonal unitary,
//! then applies the real symmetric Jacobi rotation. For the antenna
//! counts the optimizer sees (n ≤ 16) convergence takes a handful of
//! sweeps.

use num_complex::Complex64;

use netmimo_types::{NetError, NetResult};

use crate::matrix::ComplexMatrix;
use crate::vector::ComplexVector;
use crate::EQUAL_THRESHOLD;

const MAX_SWEEPS: usize = 50;
const TOL: f64 = 1e-14;
const POWER_ITERATIONS: usize = 10_000;

/// Eigenpairs of a Hermitian matrix.
///
/// Eigenvalues are real and ascending; eigenvectors are the columns of
/// a unitary matrix, in the same order.
#[derive(Debug, Clone)]
pub struct HermitianEigen {
    n: usize,
    values: Vec<f64>,
    /// n×n row-major, columns = eigenvectors.
    vectors: Vec<Complex64>,
}

impl HermitianEigen {
    /// Decompose a Hermitian matrix. Only the upper triangle is read.
    pub fn decompose(m: &ComplexMatrix) -> NetResult<Self> {
        if !m.is_square() {
            return Err(NetError::DimensionMismatch {
                expected: "square Hermitian matrix".into(),
                got: format!("{}x{}", m.rows(), m.cols()),
            });
        }
        if !m.is_finite() {
            return Err(NetError::NonFinite("eigendecomposition input".into()));
        }
        if !m.is_hermitian(EQUAL_THRESHOLD) {
            return Err(NetError::DimensionMismatch {
                expected: "Hermitian matrix".into(),
                got: "non-Hermitian matrix".into(),
            });
        }
        let n = m.rows();
        let mut a = vec![Complex64::new(0.0, 0.0); n * n];
        for i in 0..n {
            a[i * n + i] = Complex64::new(m.get(i, i).re, 0.0);
            for j in (i + 1)..n {
                a[i * n + j] = m.get(i, j);
                a[j * n + i] = m.get(i, j).conj();
            }
        }
        let mut vectors = vec![Complex64::new(0.0, 0.0); n * n];
        let mut values = vec![0.0; n];
        jacobi_eigen_hermitian(&mut a, n, &mut values, &mut vectors)?;
        sort_eigenpairs(&mut values, &mut vectors, n);
        Ok(Self { n, values, vectors })
    }

    pub fn dim(&self) -> usize {
        self.n
    }

    /// Ascending eigenvalues.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// k-th eigenvector (column k).
    pub fn vector(&self, k: usize) -> ComplexVector {
        ComplexVector::from_vec((0..self.n).map(|r| self.vectors[r * self.n + k]).collect())
    }

    pub fn min_value(&self) -> f64 {
        self.values.first().copied().unwrap_or(0.0)
    }

    pub fn max_value(&self) -> f64 {
        self.values.last().copied().unwrap_or(0.0)
    }

    /// Largest eigenvalue magnitude.
    pub fn spectral_radius(&self) -> f64 {
        self.values.iter().map(|v| v.abs()).fold(0.0, f64::max)
    }

    /// Coordinates of `c` in the eigenbasis, U^H·c.
    pub fn project(&self, c: &ComplexVector) -> NetResult<ComplexVector> {
        if c.len() != self.n {
            return Err(NetError::DimensionMismatch {
                expected: format!("vector of length {}", self.n),
                got: format!("length {}", c.len()),
            });
        }
        let x = c.as_slice();
        let out = (0..self.n)
            .map(|k| {
                (0..self.n)
                    .map(|r| self.vectors[r * self.n + k].conj() * x[r])
                    .sum::<Complex64>()
            })
            .collect();
        Ok(ComplexVector::from_vec(out))
    }

    /// Map eigen-coordinates back, U·b.
    pub fn reconstruct(&self, b: &ComplexVector) -> NetResult<ComplexVector> {
        if b.len() != self.n {
            return Err(NetError::DimensionMismatch {
                expected: format!("vector of length {}", self.n),
                got: format!("length {}", b.len()),
            });
        }
        let x = b.as_slice();
        let out = (0..self.n)
            .map(|r| {
                (0..self.n)
                    .map(|k| self.vectors[r * self.n + k] * x[k])
                    .sum::<Complex64>()
            })
            .collect();
        Ok(ComplexVector::from_vec(out))
    }

    /// Rebuild U·diag(λ)·U^H (used to check the decomposition).
    pub fn to_matrix(&self) -> ComplexMatrix {
        let n = self.n;
        let mut m = ComplexMatrix::zeros(n, n);
        for i in 0..n {
            for j in 0..n {
                let mut s = Complex64::new(0.0, 0.0);
                for k in 0..n {
                    s += self.vectors[i * n + k] * self.values[k] * self.vectors[j * n + k].conj();
                }
                m.set(i, j, s);
            }
        }
        m
    }
}

/// Spectral radius of a square matrix.
///
/// Hermitian input goes through the Jacobi decomposition; anything else
/// uses power iteration with a Rayleigh-quotient estimate, which fails
/// with `EigenNotConverged` when two eigenvalues share the top modulus.
pub fn spectral_radius(m: &ComplexMatrix) -> NetResult<f64> {
    if !m.is_square() {
        return Err(NetError::DimensionMismatch {
            expected: "square matrix".into(),
            got: format!("{}x{}", m.rows(), m.cols()),
        });
    }
    if m.is_hermitian(EQUAL_THRESHOLD) {
        return Ok(HermitianEigen::decompose(m)?.spectral_radius());
    }

    let n = m.rows();
    // Deterministic start with no special alignment.
    let mut x = ComplexVector::from_vec(
        (0..n)
            .map(|k| Complex64::new(1.0, 0.1 * (k as f64 + 1.0)))
            .collect(),
    );
    x.set_power(1.0);
    let mut prev = f64::NAN;
    for _ in 0..POWER_ITERATIONS {
        let y = m.mul_vec(&x)?;
        let lambda = x.dot(&y)?.norm();
        let y_norm = y.norm2();
        if y_norm == 0.0 {
            return Ok(0.0);
        }
        if (lambda - prev).abs() <= TOL * lambda.max(1.0) {
            return Ok(lambda);
        }
        prev = lambda;
        x = y.scale(Complex64::new(1.0 / y_norm, 0.0));
    }
    Err(NetError::EigenNotConverged {
        sweeps: POWER_ITERATIONS,
    })
}

/// Spectral (2-) norm of any matrix, sqrt(ρ(A^H A)).
pub fn spectral_norm(m: &ComplexMatrix) -> NetResult<f64> {
    let gram = m.hermitian_mul(m)?;
    Ok(HermitianEigen::decompose(&gram)?.max_value().max(0.0).sqrt())
}

/// Reorder eigenpairs by ascending eigenvalue, moving each eigenvector
/// column with its value.
fn sort_eigenpairs(eigvals: &mut [f64], eigvecs: &mut [Complex64], n: usize) {
    let mut pairs: Vec<(f64, Vec<Complex64>)> = (0..n)
        .map(|k| (eigvals[k], (0..n).map(|row| eigvecs[row * n + k]).collect()))
        .collect();
    pairs.sort_by(|a, b| a.0.total_cmp(&b.0));
    for (k, (value, column)) in pairs.into_iter().enumerate() {
        eigvals[k] = value;
        for (row, z) in column.into_iter().enumerate() {
            eigvecs[row * n + k] = z;
        }
    }
}

/// Cyclic Jacobi eigendecomposition for a Hermitian n×n matrix.
///
/// `a` is n×n row-major, full Hermitian storage (destroyed; the diagonal
/// becomes the eigenvalues). `v_out` receives the unitary eigenvector
/// matrix (columns). Eigenvalues are left unsorted.
fn jacobi_eigen_hermitian(
    a: &mut [Complex64],
    n: usize,
    eigvals_out: &mut [f64],
    v_out: &mut [Complex64],
) -> NetResult<()> {
    for i in 0..n {
        for j in 0..n {
            v_out[i * n + j] = if i == j {
                Complex64::new(1.0, 0.0)
            } else {
                Complex64::new(0.0, 0.0)
            };
        }
    }

    let scale = a.iter().map(|z| z.norm_sqr()).sum::<f64>().sqrt();
    let mut converged = scale == 0.0;

    let mut sweep = 0;
    while !converged && sweep < MAX_SWEEPS {
        sweep += 1;

        let mut max_off = 0.0f64;
        for p in 0..n {
            for q in (p + 1)..n {
                max_off = max_off.max(a[p * n + q].norm());
            }
        }
        if max_off <= TOL * scale {
            converged = true;
            break;
        }

        for p in 0..n {
            for q in (p + 1)..n {
                let apq = a[p * n + q];
                let b = apq.norm();
                if b <= TOL * scale * 1e-3 {
                    continue;
                }
                // a_pq = b·e^{iφ}; the diagonal unitary e^{-iφ} on q makes it real.
                let phase = apq / b;
                let phase_conj = phase.conj();

                let app = a[p * n + p].re;
                let aqq = a[q * n + q].re;
                let diff = aqq - app;

                let t = if diff.abs() < 1e-300 {
                    1.0
                } else {
                    let tau = diff / (2.0 * b);
                    if tau >= 0.0 {
                        1.0 / (tau + (1.0 + tau * tau).sqrt())
                    } else {
                        -1.0 / (-tau + (1.0 + tau * tau).sqrt())
                    }
                };
                let c = 1.0 / (1.0 + t * t).sqrt();
                let s = t * c;

                // Columns: A ← A·R with R = E·G.
                for r in 0..n {
                    let arp = a[r * n + p];
                    let arq = a[r * n + q] * phase_conj;
                    a[r * n + p] = arp * c - arq * s;
                    a[r * n + q] = arp * s + arq * c;
                }
                // Rows: A ← R^H·A.
                for r in 0..n {
                    let apr = a[p * n + r];
                    let aqr = a[q * n + r] * phase;
                    a[p * n + r] = apr * c - aqr * s;
                    a[q * n + r] = apr * s + aqr * c;
                }
                a[p * n + q] = Complex64::new(0.0, 0.0);
                a[q * n + p] = Complex64::new(0.0, 0.0);
                a[p * n + p] = Complex64::new(a[p * n + p].re, 0.0);
                a[q * n + q] = Complex64::new(a[q * n + q].re, 0.0);

                for r in 0..n {
                    let vrp = v_out[r * n + p];
                    let vrq = v_out[r * n + q] * phase_conj;
                    v_out[r * n + p] = vrp * c - vrq * s;
                    v_out[r * n + q] = vrp * s + vrq * c;
                }
            }
        }
    }

    if !converged {
        // One last check: the final sweep may have finished the job.
        let mut max_off = 0.0f64;
        for p in 0..n {
            for q in (p + 1)..n {
                max_off = max_off.max(a[p * n + q].norm());
            }
        }
        if max_off > TOL * scale * 1e3 {
            log::warn!("Jacobi stopped with off-diagonal {max_off:.3e} after {MAX_SWEEPS} sweeps");
            return Err(NetError::EigenNotConverged { sweeps: MAX_SWEEPS });
        }
    }

    for i in 0..n {
        eigvals_out[i] = a[i * n + i].re;
    }
    Ok(())
}
