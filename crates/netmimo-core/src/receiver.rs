// ─────────────────────────────────────────────────────────────────────
// netmimo — MMSE Receivers, MSE Weights and Rates
// ─────────────────────────────────────────────────────────────────────
//! Receiver-side update of the WMMSE iteration.
//!
//! The signal UE i receives for stream j is
//!
//!   s_{ij} = Σ_{q ∈ S_i ∩ S_j} H_{iq} v_{q,j}
//!
//! and its covariance C_i = Σ_j s_{ij}s_{ij}^H + N0·I over every UE j
//! whose serving set meets S_i. From it: u_i = C_i⁻¹ s_{ii},
//! w_i = 1 / (1 − Re(u_i^H s_{ii})), and the rate
//! r_i = log2(det2(I + s_{ii}s_{ii}^H L_i⁻¹)) / 2 with L_i = C_i − s_{ii}s_{ii}^H.

use netmimo_linalg::{Complex64, ComplexMatrix, ComplexVector};
use netmimo_topology::{BsId, Topology, UeId};
use netmimo_types::{NetError, NetResult};

use crate::state::{BaseStationState, UeState};

const ONE: Complex64 = Complex64 { re: 1.0, im: 0.0 };

/// Read-only view of the network used by the receiver update.
#[derive(Clone, Copy)]
pub struct Snapshot<'a> {
    pub topology: &'a Topology,
    /// Serving set S_i per UE.
    pub serving: &'a [Vec<BsId>],
    /// UEs whose serving sets meet S_i (i included), per UE.
    pub interferers: &'a [Vec<UeId>],
    pub bs_states: &'a [BaseStationState],
    pub noise_power: f64,
}

impl<'a> Snapshot<'a> {
    fn serving_of(&self, i: UeId) -> NetResult<&'a [BsId]> {
        self.serving
            .get(i.0)
            .map(Vec::as_slice)
            .ok_or(NetError::UnknownEntity {
                kind: "ue",
                index: i.0,
            })
    }

    /// s_{ij}: stream j as heard by UE i.
    pub fn received_signal(&self, i: UeId, j: UeId) -> NetResult<ComplexVector> {
        let mut s = ComplexVector::zeros(self.topology.ue(i)?.antennas);
        for &q in self.serving_of(i)? {
            // Only BSs that also serve j carry a v_{q,j}.
            let Some(link) = self.bs_states.get(q.0).and_then(|b| b.links.get(&j)) else {
                continue;
            };
            if link.v.is_zero() {
                continue;
            }
            let hv = self.topology.channel(q, i)?.mul_vec(&link.v)?;
            s.add_scaled(ONE, &hv)?;
        }
        Ok(s)
    }

    /// (C_i, s_{ii}).
    pub fn covariance(&self, i: UeId) -> NetResult<(ComplexMatrix, ComplexVector)> {
        let n = self.topology.ue(i)?.antennas;
        let mut c = ComplexMatrix::scaled_identity(n, Complex64::new(self.noise_power, 0.0));
        let mut own = ComplexVector::zeros(n);
        let interferers = self.interferers.get(i.0).ok_or(NetError::UnknownEntity {
            kind: "ue",
            index: i.0,
        })?;
        for &j in interferers {
            let s = self.received_signal(i, j)?;
            c.add_outer(ONE, &s, &s)?;
            if j == i {
                own = s;
            }
        }
        Ok((c, own))
    }
}

fn rate_from(c: &ComplexMatrix, s: &ComplexVector) -> NetResult<f64> {
    let n = s.len();
    let mut interference = c.clone();
    interference.add_outer(Complex64::new(-1.0, 0.0), s, s)?;
    let signal = ComplexMatrix::outer(s, s).mul(&interference.inverse()?)?;
    let mut x = ComplexMatrix::identity(n);
    x.add_scaled(ONE, &signal)?;
    let rate = x.det2()?.log2() / 2.0;
    if !rate.is_finite() {
        return Err(NetError::NonFinite("rate".into()));
    }
    Ok(rate.max(0.0))
}

/// MMSE receiver, MSE weight and rate of UE i.
pub fn update_variables(snapshot: &Snapshot<'_>, i: UeId) -> NetResult<UeState> {
    let (c, s) = snapshot.covariance(i)?;
    let u = c.solve(&s)?;
    let mse = 1.0 - u.dot(&s)?.re;
    if !(mse > 0.0 && mse.is_finite()) {
        return Err(NetError::NonFinite(format!("mse weight of {i} (mse = {mse:e})")));
    }
    let rate = rate_from(&c, &s)?;
    Ok(UeState {
        u,
        w: 1.0 / mse,
        rate,
    })
}

/// Rate of UE i under the current transmit vectors.
pub fn evaluate_rate(snapshot: &Snapshot<'_>, i: UeId) -> NetResult<f64> {
    let (c, s) = snapshot.covariance(i)?;
    rate_from(&c, &s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::LinkState;
    use netmimo_topology::{ChannelConfig, Position};

    /// One BS, one single-antenna UE, scalar channel h = 2.
    fn scalar_network(v: f64) -> (Topology, Vec<BaseStationState>) {
        let mut topology = Topology::new(10.0, ChannelConfig::default()).unwrap();
        let cl = topology.add_cluster(Position::new(0.0, 0.0));
        let bs = topology.add_base_station(cl, Position::new(0.0, 0.0), 1, 10.0).unwrap();
        let ue = topology.add_ue(cl, Position::new(1.0, 0.0), 1).unwrap();
        topology
            .set_channel(bs, ue, ComplexMatrix::from_rows(&[vec![(2.0, 0.0)]]).unwrap())
            .unwrap();
        let mut state = BaseStationState::new(bs, 1, 10.0);
        state.links.insert(
            ue,
            LinkState::new(ComplexVector::from_pairs(&[(v, 0.0)]), v * v),
        );
        (topology, vec![state])
    }

    #[test]
    fn test_scalar_link_closed_form() {
        let (topology, bs_states) = scalar_network(1.5);
        let serving = vec![vec![BsId(0)]];
        let interferers = vec![vec![UeId(0)]];
        let snap = Snapshot {
            topology: &topology,
            serving: &serving,
            interferers: &interferers,
            bs_states: &bs_states,
            noise_power: 1.0,
        };
        let state = update_variables(&snap, UeId(0)).unwrap();
        // s = 3, C = 10, u = 0.3, mse = 1 − 0.9, SNR = 9.
        assert!((state.u.get(0).re - 0.3).abs() < 1e-12, "u = {}", state.u.get(0));
        assert!((state.w - 10.0).abs() < 1e-9, "w = {}", state.w);
        assert!((state.rate - 10f64.log2()).abs() < 1e-12, "rate = {}", state.rate);
        assert!((evaluate_rate(&snap, UeId(0)).unwrap() - state.rate).abs() < 1e-12);
    }

    #[test]
    fn test_silent_link_has_zero_rate() {
        let (topology, bs_states) = scalar_network(0.0);
        let serving = vec![vec![BsId(0)]];
        let interferers = vec![vec![UeId(0)]];
        let snap = Snapshot {
            topology: &topology,
            serving: &serving,
            interferers: &interferers,
            bs_states: &bs_states,
            noise_power: 1.0,
        };
        let state = update_variables(&snap, UeId(0)).unwrap();
        assert!(state.u.is_zero());
        assert!((state.w - 1.0).abs() < 1e-12);
        assert_eq!(state.rate, 0.0);
    }

    #[test]
    fn test_interference_lowers_rate() {
        let mut topology = Topology::new(10.0, ChannelConfig::default()).unwrap();
        let cl = topology.add_cluster(Position::new(0.0, 0.0));
        let bs = topology.add_base_station(cl, Position::new(0.0, 0.0), 1, 10.0).unwrap();
        let u0 = topology.add_ue(cl, Position::new(1.0, 0.0), 1).unwrap();
        let u1 = topology.add_ue(cl, Position::new(-1.0, 0.0), 1).unwrap();
        for ue in [u0, u1] {
            topology
                .set_channel(bs, ue, ComplexMatrix::from_rows(&[vec![(1.0, 0.0)]]).unwrap())
                .unwrap();
        }
        let mut state = BaseStationState::new(bs, 1, 10.0);
        state
            .links
            .insert(u0, LinkState::new(ComplexVector::from_pairs(&[(2.0, 0.0)]), 4.0));
        state
            .links
            .insert(u1, LinkState::new(ComplexVector::from_pairs(&[(0.0, 1.0)]), 1.0));
        let bs_states = vec![state];
        let serving = vec![vec![bs], vec![bs]];
        let interferers = vec![vec![u0, u1], vec![u0, u1]];
        let snap = Snapshot {
            topology: &topology,
            serving: &serving,
            interferers: &interferers,
            bs_states: &bs_states,
            noise_power: 1.0,
        };
        // SINR = 4 / (1 + 1).
        let r = evaluate_rate(&snap, u0).unwrap();
        assert!((r - 3f64.log2()).abs() < 1e-12, "rate = {r}");
    }
}
