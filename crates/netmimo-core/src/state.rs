// ─────────────────────────────────────────────────────────────────────
// netmimo — Per-Link and Per-UE Optimization State
// ─────────────────────────────────────────────────────────────────────

use std::collections::BTreeMap;

use netmimo_linalg::ComplexVector;
use netmimo_topology::{BsId, UeId};
use netmimo_types::{NetError, NetResult};

/// Norm below which a transmit vector counts as switched off.
pub const ACTIVE_THRESHOLD: f64 = 1e-6;

/// Optimization variables of one BS → UE link.
#[derive(Debug, Clone)]
pub struct LinkState {
    /// Transmit precoding vector v (BS antennas).
    pub v: ComplexVector,
    /// Power allocated to the link, P ≥ ε.
    pub power: f64,
    /// Power multiplier μ* from the last bisection.
    pub mu: f64,
    /// Dual subgradient of the link value with respect to P (g = −μ*).
    pub subgradient: f64,
    /// Diagonal Hessian estimate h used to scale the subgradient step.
    pub hessian: f64,
    /// (P, g) of the previous power update, for the secant estimate.
    pub previous: Option<(f64, f64)>,
    /// The last bisection stopped on its iteration cap.
    pub capped: bool,
}

impl LinkState {
    pub fn new(v: ComplexVector, power: f64) -> Self {
        Self {
            v,
            power,
            mu: 0.0,
            subgradient: 0.0,
            hessian: 1.0,
            previous: None,
            capped: false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.v.norm2() > ACTIVE_THRESHOLD
    }
}

/// Receiver-side state of one UE.
#[derive(Debug, Clone)]
pub struct UeState {
    /// MMSE receive filter u.
    pub u: ComplexVector,
    /// MSE weight w = 1 / (1 − Re(u^H s)).
    pub w: f64,
    /// Achievable rate in bits per channel use.
    pub rate: f64,
}

impl UeState {
    pub fn new(antennas: usize) -> Self {
        Self {
            u: ComplexVector::zeros(antennas),
            w: 1.0,
            rate: 0.0,
        }
    }
}

/// All links of one base station, keyed by UE.
#[derive(Debug, Clone)]
pub struct BaseStationState {
    pub id: BsId,
    pub antennas: usize,
    pub power_budget: f64,
    pub links: BTreeMap<UeId, LinkState>,
}

impl BaseStationState {
    pub fn new(id: BsId, antennas: usize, power_budget: f64) -> Self {
        Self {
            id,
            antennas,
            power_budget,
            links: BTreeMap::new(),
        }
    }

    pub fn link(&self, ue: UeId) -> NetResult<&LinkState> {
        self.links.get(&ue).ok_or_else(|| {
            NetError::NotRefreshed(format!("no link state for {} -> {ue}", self.id))
        })
    }

    pub fn link_mut(&mut self, ue: UeId) -> NetResult<&mut LinkState> {
        let id = self.id;
        self.links
            .get_mut(&ue)
            .ok_or_else(|| NetError::NotRefreshed(format!("no link state for {id} -> {ue}")))
    }

    /// Transmit vector towards `ue`, or the zero vector when `ue` is not served.
    pub fn tx_precoding_vector(&self, ue: UeId) -> ComplexVector {
        self.links
            .get(&ue)
            .map(|l| l.v.clone())
            .unwrap_or_else(|| ComplexVector::zeros(self.antennas))
    }

    /// Σ P over the links.
    pub fn allocated_power(&self) -> f64 {
        self.links.values().map(|l| l.power).sum()
    }

    /// Σ ‖v‖² over the links.
    pub fn transmit_power(&self) -> f64 {
        self.links.values().map(|l| l.v.power()).sum()
    }

    /// Σ ‖v‖₂ over the links.
    pub fn group_norm(&self) -> f64 {
        self.links.values().map(|l| l.v.norm2()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use netmimo_linalg::Complex64;

    #[test]
    fn test_unserved_link_is_zero() {
        let mut bs = BaseStationState::new(BsId(0), 3, 10.0);
        let v = ComplexVector::from_pairs(&[(1.0, 0.0), (0.0, 1.0), (0.0, 0.0)]);
        bs.links.insert(UeId(2), LinkState::new(v.clone(), 4.0));
        assert!(bs.tx_precoding_vector(UeId(2)).approx_eq(&v, 0.0));
        let z = bs.tx_precoding_vector(UeId(9));
        assert_eq!(z.len(), 3);
        assert!(z.is_zero());
        assert!(matches!(bs.link(UeId(9)), Err(NetError::NotRefreshed(_))));
    }

    #[test]
    fn test_power_sums() {
        let mut bs = BaseStationState::new(BsId(1), 1, 10.0);
        let mut a = ComplexVector::zeros(1);
        a.set(0, Complex64::new(3.0, 4.0));
        bs.links.insert(UeId(0), LinkState::new(a, 6.0));
        bs.links.insert(UeId(1), LinkState::new(ComplexVector::zeros(1), 4.0));
        assert!((bs.allocated_power() - 10.0).abs() < 1e-12);
        assert!((bs.transmit_power() - 25.0).abs() < 1e-12);
        assert!((bs.group_norm() - 5.0).abs() < 1e-12);
        assert!(bs.link(UeId(0)).unwrap().is_active());
        assert!(!bs.link(UeId(1)).unwrap().is_active());
    }
}
