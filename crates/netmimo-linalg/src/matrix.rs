// ─────────────────────────────────────────────────────────────────────
// netmimo — Dense Complex Matrix
// ─────────────────────────────────────────────────────────────────────
//! Row-major dense complex matrix.
//!
//! Inversion and determinants use partial-pivot elimination. A pivot
//! smaller than `SINGULAR_EPS` times the largest entry is reported as
//! `NetError::Singular` instead of producing garbage.

use num_complex::Complex64;
use rand::Rng;

use netmimo_types::{NetError, NetResult};

use crate::vector::ComplexVector;
use crate::complex_gaussian;

const ZERO: Complex64 = Complex64 { re: 0.0, im: 0.0 };
const ONE: Complex64 = Complex64 { re: 1.0, im: 0.0 };

/// Relative pivot threshold for singularity detection.
const SINGULAR_EPS: f64 = 1e-13;

/// Matrix norms supported without an eigendecomposition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatrixNorm {
    /// Maximum absolute column sum.
    One,
    Frobenius,
    /// Maximum absolute row sum.
    Infinity,
}

/// Dense complex matrix, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct ComplexMatrix {
    rows: usize,
    cols: usize,
    data: Vec<Complex64>,
}

impl ComplexMatrix {
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: vec![ZERO; rows * cols],
        }
    }

    pub fn identity(n: usize) -> Self {
        let mut m = Self::zeros(n, n);
        for i in 0..n {
            m.data[i * n + i] = ONE;
        }
        m
    }

    /// Scaled identity α·I.
    pub fn scaled_identity(n: usize, alpha: Complex64) -> Self {
        let mut m = Self::zeros(n, n);
        for i in 0..n {
            m.data[i * n + i] = alpha;
        }
        m
    }

    /// Build from row-major (re, im) pairs.
    pub fn from_rows(rows: &[Vec<(f64, f64)>]) -> NetResult<Self> {
        let n_rows = rows.len();
        let n_cols = rows.first().map_or(0, |r| r.len());
        let mut data = Vec::with_capacity(n_rows * n_cols);
        for (i, row) in rows.iter().enumerate() {
            if row.len() != n_cols {
                return Err(NetError::DimensionMismatch {
                    expected: format!("{n_cols} columns"),
                    got: format!("{} columns in row {i}", row.len()),
                });
            }
            data.extend(row.iter().map(|&(re, im)| Complex64::new(re, im)));
        }
        Ok(Self {
            rows: n_rows,
            cols: n_cols,
            data,
        })
    }

    /// i.i.d. CN(0, 1) entries.
    pub fn random<R: Rng + ?Sized>(rows: usize, cols: usize, rng: &mut R) -> Self {
        Self {
            rows,
            cols,
            data: (0..rows * cols).map(|_| complex_gaussian(rng)).collect(),
        }
    }

    /// Outer product a · b^H.
    pub fn outer(a: &ComplexVector, b: &ComplexVector) -> Self {
        let mut m = Self::zeros(a.len(), b.len());
        for (i, ai) in a.iter().enumerate() {
            for (j, bj) in b.iter().enumerate() {
                m.data[i * b.len() + j] = ai * bj.conj();
            }
        }
        m
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn is_square(&self) -> bool {
        self.rows == self.cols
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> Complex64 {
        self.data[row * self.cols + col]
    }

    #[inline]
    pub fn set(&mut self, row: usize, col: usize, value: Complex64) {
        self.data[row * self.cols + col] = value;
    }

    pub fn as_slice(&self) -> &[Complex64] {
        &self.data
    }

    /// Column `col` as a vector.
    pub fn column(&self, col: usize) -> ComplexVector {
        ComplexVector::from_vec((0..self.rows).map(|r| self.get(r, col)).collect())
    }

    fn check_same_shape(&self, other: &ComplexMatrix) -> NetResult<()> {
        if self.rows != other.rows || self.cols != other.cols {
            return Err(NetError::DimensionMismatch {
                expected: format!("{}x{}", self.rows, self.cols),
                got: format!("{}x{}", other.rows, other.cols),
            });
        }
        Ok(())
    }

    fn check_square(&self, what: &str) -> NetResult<()> {
        if !self.is_square() {
            return Err(NetError::DimensionMismatch {
                expected: format!("square matrix for {what}"),
                got: format!("{}x{}", self.rows, self.cols),
            });
        }
        Ok(())
    }

    pub fn add(&self, other: &ComplexMatrix) -> NetResult<ComplexMatrix> {
        let mut out = self.clone();
        out.add_scaled(ONE, other)?;
        Ok(out)
    }

    pub fn sub(&self, other: &ComplexMatrix) -> NetResult<ComplexMatrix> {
        let mut out = self.clone();
        out.add_scaled(-ONE, other)?;
        Ok(out)
    }

    /// self += alpha · other.
    pub fn add_scaled(&mut self, alpha: Complex64, other: &ComplexMatrix) -> NetResult<()> {
        self.check_same_shape(other)?;
        for (a, b) in self.data.iter_mut().zip(&other.data) {
            *a += alpha * b;
        }
        Ok(())
    }

    /// self += alpha · a · b^H, without materialising the outer product.
    pub fn add_outer(
        &mut self,
        alpha: Complex64,
        a: &ComplexVector,
        b: &ComplexVector,
    ) -> NetResult<()> {
        if a.len() != self.rows || b.len() != self.cols {
            return Err(NetError::DimensionMismatch {
                expected: format!("{}x{} outer product", self.rows, self.cols),
                got: format!("{}x{}", a.len(), b.len()),
            });
        }
        for (i, ai) in a.iter().enumerate() {
            let s = alpha * ai;
            for (j, bj) in b.iter().enumerate() {
                self.data[i * self.cols + j] += s * bj.conj();
            }
        }
        Ok(())
    }

    /// self += alpha · I.
    pub fn add_identity(&mut self, alpha: Complex64) -> NetResult<()> {
        self.check_square("add_identity")?;
        for i in 0..self.rows {
            self.data[i * self.cols + i] += alpha;
        }
        Ok(())
    }

    pub fn scale(&self, alpha: Complex64) -> ComplexMatrix {
        Self {
            rows: self.rows,
            cols: self.cols,
            data: self.data.iter().map(|a| a * alpha).collect(),
        }
    }

    /// Matrix product self · other.
    pub fn mul(&self, other: &ComplexMatrix) -> NetResult<ComplexMatrix> {
        if self.cols != other.rows {
            return Err(NetError::DimensionMismatch {
                expected: format!("{} rows on the right operand", self.cols),
                got: format!("{}x{}", other.rows, other.cols),
            });
        }
        let mut out = Self::zeros(self.rows, other.cols);
        for i in 0..self.rows {
            for k in 0..self.cols {
                let a = self.data[i * self.cols + k];
                if a == ZERO {
                    continue;
                }
                for j in 0..other.cols {
                    out.data[i * other.cols + j] += a * other.data[k * other.cols + j];
                }
            }
        }
        Ok(out)
    }

    /// self^H · other without forming the Hermitian transpose.
    pub fn hermitian_mul(&self, other: &ComplexMatrix) -> NetResult<ComplexMatrix> {
        if self.rows != other.rows {
            return Err(NetError::DimensionMismatch {
                expected: format!("{} rows on the right operand", self.rows),
                got: format!("{}x{}", other.rows, other.cols),
            });
        }
        let mut out = Self::zeros(self.cols, other.cols);
        for k in 0..self.rows {
            for i in 0..self.cols {
                let a = self.data[k * self.cols + i].conj();
                for j in 0..other.cols {
                    out.data[i * other.cols + j] += a * other.data[k * other.cols + j];
                }
            }
        }
        Ok(out)
    }

    /// Matrix-vector product self · v.
    pub fn mul_vec(&self, v: &ComplexVector) -> NetResult<ComplexVector> {
        if self.cols != v.len() {
            return Err(NetError::DimensionMismatch {
                expected: format!("vector of length {}", self.cols),
                got: format!("length {}", v.len()),
            });
        }
        let x = v.as_slice();
        let out: Vec<Complex64> = (0..self.rows)
            .map(|i| {
                self.data[i * self.cols..(i + 1) * self.cols]
                    .iter()
                    .zip(x)
                    .map(|(a, b)| a * b)
                    .sum::<Complex64>()
            })
            .collect();
        Ok(ComplexVector::from_vec(out))
    }

    /// self^H · v.
    pub fn hermitian_mul_vec(&self, v: &ComplexVector) -> NetResult<ComplexVector> {
        if self.rows != v.len() {
            return Err(NetError::DimensionMismatch {
                expected: format!("vector of length {}", self.rows),
                got: format!("length {}", v.len()),
            });
        }
        let mut out = vec![ZERO; self.cols];
        for (k, vk) in v.iter().enumerate() {
            let row = &self.data[k * self.cols..(k + 1) * self.cols];
            for (o, a) in out.iter_mut().zip(row) {
                *o += a.conj() * vk;
            }
        }
        Ok(ComplexVector::from_vec(out))
    }

    pub fn hermitian_transpose(&self) -> ComplexMatrix {
        let mut out = Self::zeros(self.cols, self.rows);
        for i in 0..self.rows {
            for j in 0..self.cols {
                out.data[j * self.rows + i] = self.data[i * self.cols + j].conj();
            }
        }
        out
    }

    pub fn trace(&self) -> NetResult<Complex64> {
        self.check_square("trace")?;
        Ok((0..self.rows).map(|i| self.data[i * self.cols + i]).sum())
    }

    /// Squared Frobenius norm, i.e. trace(A^H A).
    pub fn power(&self) -> f64 {
        self.data.iter().map(|a| a.norm_sqr()).sum()
    }

    pub fn norm(&self, kind: MatrixNorm) -> f64 {
        match kind {
            MatrixNorm::Frobenius => self.power().sqrt(),
            MatrixNorm::One => (0..self.cols)
                .map(|j| (0..self.rows).map(|i| self.get(i, j).norm()).sum::<f64>())
                .fold(0.0, f64::max),
            MatrixNorm::Infinity => (0..self.rows)
                .map(|i| (0..self.cols).map(|j| self.get(i, j).norm()).sum::<f64>())
                .fold(0.0, f64::max),
        }
    }

    fn max_abs(&self) -> f64 {
        self.data.iter().map(|a| a.norm()).fold(0.0, f64::max)
    }

    pub fn is_finite(&self) -> bool {
        self.data.iter().all(|a| a.re.is_finite() && a.im.is_finite())
    }

    pub fn is_hermitian(&self, tol: f64) -> bool {
        if !self.is_square() {
            return false;
        }
        let scale = self.max_abs().max(1.0);
        for i in 0..self.rows {
            for j in i..self.cols {
                if (self.get(i, j) - self.get(j, i).conj()).norm() > tol * scale {
                    return false;
                }
            }
        }
        true
    }

    pub fn approx_eq(&self, other: &ComplexMatrix, tol: f64) -> bool {
        self.rows == other.rows
            && self.cols == other.cols
            && self
                .data
                .iter()
                .zip(&other.data)
                .all(|(a, b)| (a - b).norm() <= tol)
    }

    /// Inverse via Gauss-Jordan elimination with partial pivoting.
    pub fn inverse(&self) -> NetResult<ComplexMatrix> {
        self.check_square("inverse")?;
        let n = self.rows;
        let scale = self.max_abs();
        if !scale.is_finite() {
            return Err(NetError::NonFinite("matrix inverse input".into()));
        }
        if scale == 0.0 {
            return Err(NetError::Singular {
                column: 0,
                pivot: 0.0,
            });
        }
        let mut a = self.data.clone();
        let mut inv = Self::identity(n).data;

        for col in 0..n {
            let (pivot_row, pivot_abs) = (col..n)
                .map(|r| (r, a[r * n + col].norm()))
                .fold((col, -1.0), |best, cur| if cur.1 > best.1 { cur } else { best });
            if pivot_abs <= SINGULAR_EPS * scale {
                return Err(NetError::Singular {
                    column: col,
                    pivot: pivot_abs,
                });
            }
            if pivot_row != col {
                for j in 0..n {
                    a.swap(col * n + j, pivot_row * n + j);
                    inv.swap(col * n + j, pivot_row * n + j);
                }
            }

            let p = a[col * n + col].inv();
            for j in 0..n {
                a[col * n + j] *= p;
                inv[col * n + j] *= p;
            }

            for r in 0..n {
                if r == col {
                    continue;
                }
                let f = a[r * n + col];
                if f == ZERO {
                    continue;
                }
                for j in 0..n {
                    let a_cj = a[col * n + j];
                    let i_cj = inv[col * n + j];
                    a[r * n + j] -= f * a_cj;
                    inv[r * n + j] -= f * i_cj;
                }
            }
        }

        Ok(Self {
            rows: n,
            cols: n,
            data: inv,
        })
    }

    /// Solve self · x = b.
    pub fn solve(&self, b: &ComplexVector) -> NetResult<ComplexVector> {
        self.inverse()?.mul_vec(b)
    }

    /// Determinant via LU elimination with partial pivoting.
    pub fn determinant(&self) -> NetResult<Complex64> {
        self.check_square("determinant")?;
        let n = self.rows;
        let mut a = self.data.clone();
        let mut det = ONE;
        for col in 0..n {
            let (pivot_row, pivot_abs) = (col..n)
                .map(|r| (r, a[r * n + col].norm()))
                .fold((col, -1.0), |best, cur| if cur.1 > best.1 { cur } else { best });
            if pivot_abs == 0.0 {
                return Ok(ZERO);
            }
            if pivot_row != col {
                for j in 0..n {
                    a.swap(col * n + j, pivot_row * n + j);
                }
                det = -det;
            }
            let pivot = a[col * n + col];
            det *= pivot;
            for r in (col + 1)..n {
                let f = a[r * n + col] / pivot;
                if f == ZERO {
                    continue;
                }
                for j in col..n {
                    let a_cj = a[col * n + j];
                    a[r * n + j] -= f * a_cj;
                }
            }
        }
        Ok(det)
    }

    /// Squared magnitude of the determinant, |det(A)|².
    pub fn det2(&self) -> NetResult<f64> {
        Ok(self.determinant()?.norm_sqr())
    }
}
