// ─────────────────────────────────────────────────────────────────────
// netmimo — Dense Complex Vector
// ─────────────────────────────────────────────────────────────────────

use num_complex::Complex64;
use rand::Rng;

use netmimo_types::{NetError, NetResult};

use crate::complex_gaussian;

const ZERO: Complex64 = Complex64 { re: 0.0, im: 0.0 };

/// Vector norms supported by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VectorNorm {
    One,
    Two,
    Infinity,
}

/// Dense complex column vector.
#[derive(Debug, Clone, PartialEq)]
pub struct ComplexVector {
    data: Vec<Complex64>,
}

impl ComplexVector {
    pub fn zeros(len: usize) -> Self {
        Self {
            data: vec![ZERO; len],
        }
    }

    pub fn from_vec(data: Vec<Complex64>) -> Self {
        Self { data }
    }

    /// Build from (re, im) pairs.
    pub fn from_pairs(pairs: &[(f64, f64)]) -> Self {
        Self {
            data: pairs.iter().map(|&(re, im)| Complex64::new(re, im)).collect(),
        }
    }

    /// i.i.d. CN(0, 1) entries.
    pub fn random<R: Rng + ?Sized>(len: usize, rng: &mut R) -> Self {
        Self {
            data: (0..len).map(|_| complex_gaussian(rng)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn get(&self, i: usize) -> Complex64 {
        self.data[i]
    }

    pub fn set(&mut self, i: usize, value: Complex64) {
        self.data[i] = value;
    }

    pub fn as_slice(&self) -> &[Complex64] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [Complex64] {
        &mut self.data
    }

    pub fn iter(&self) -> impl Iterator<Item = &Complex64> {
        self.data.iter()
    }

    fn check_len(&self, other: &ComplexVector) -> NetResult<()> {
        if self.len() != other.len() {
            return Err(NetError::DimensionMismatch {
                expected: format!("vector of length {}", self.len()),
                got: format!("length {}", other.len()),
            });
        }
        Ok(())
    }

    pub fn add(&self, other: &ComplexVector) -> NetResult<ComplexVector> {
        self.check_len(other)?;
        Ok(Self {
            data: self
                .data
                .iter()
                .zip(&other.data)
                .map(|(a, b)| a + b)
                .collect(),
        })
    }

    pub fn sub(&self, other: &ComplexVector) -> NetResult<ComplexVector> {
        self.check_len(other)?;
        Ok(Self {
            data: self
                .data
                .iter()
                .zip(&other.data)
                .map(|(a, b)| a - b)
                .collect(),
        })
    }

    /// self += alpha · other.
    pub fn add_scaled(&mut self, alpha: Complex64, other: &ComplexVector) -> NetResult<()> {
        self.check_len(other)?;
        for (a, b) in self.data.iter_mut().zip(&other.data) {
            *a += alpha * b;
        }
        Ok(())
    }

    pub fn scale(&self, alpha: Complex64) -> ComplexVector {
        Self {
            data: self.data.iter().map(|a| a * alpha).collect(),
        }
    }

    pub fn scale_mut(&mut self, alpha: Complex64) {
        for a in self.data.iter_mut() {
            *a *= alpha;
        }
    }

    /// Inner product self^H · other (conjugate-linear in `self`).
    pub fn dot(&self, other: &ComplexVector) -> NetResult<Complex64> {
        self.check_len(other)?;
        Ok(self
            .data
            .iter()
            .zip(&other.data)
            .map(|(a, b)| a.conj() * b)
            .sum())
    }

    pub fn norm(&self, kind: VectorNorm) -> f64 {
        match kind {
            VectorNorm::One => self.data.iter().map(|a| a.norm()).sum(),
            VectorNorm::Two => self.power().sqrt(),
            VectorNorm::Infinity => self.data.iter().map(|a| a.norm()).fold(0.0, f64::max),
        }
    }

    /// Euclidean norm ‖v‖₂.
    pub fn norm2(&self) -> f64 {
        self.norm(VectorNorm::Two)
    }

    /// Squared Euclidean norm ‖v‖₂², the transmit power of a precoder.
    pub fn power(&self) -> f64 {
        self.data.iter().map(|a| a.norm_sqr()).sum()
    }

    /// Rescale so that ‖v‖₂² = `power`. A zero vector stays zero.
    pub fn set_power(&mut self, power: f64) {
        let current = self.power();
        if current <= 0.0 {
            return;
        }
        let factor = (power.max(0.0) / current).sqrt();
        for a in self.data.iter_mut() {
            *a *= factor;
        }
    }

    pub fn is_zero(&self) -> bool {
        self.data.iter().all(|a| *a == ZERO)
    }

    pub fn is_finite(&self) -> bool {
        self.data.iter().all(|a| a.re.is_finite() && a.im.is_finite())
    }

    pub fn approx_eq(&self, other: &ComplexVector, tol: f64) -> bool {
        self.len() == other.len()
            && self
                .data
                .iter()
                .zip(&other.data)
                .all(|(a, b)| (a - b).norm() <= tol)
    }
}
