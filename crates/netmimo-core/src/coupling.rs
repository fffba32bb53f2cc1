// ─────────────────────────────────────────────────────────────────────
// netmimo — BS-Pair Coupling Matrices and Coupling Vectors
// ─────────────────────────────────────────────────────────────────────
//! Second-order coupling between base stations.
//!
//! For every UE i and every pair of its serving BSs q, p:
//!
//!   M_{q,p} = Σ_i w_i (H_{iq}^H u_i)(H_{ip}^H u_i)^H
//!
//! Only q ≤ p is stored; M_{p,q} = M_{q,p}^H is applied on the fly.
//! The coupling vector of link (q, i) removes the contribution of the
//! other serving BSs from the matched-filter term:
//!
//!   c_{q,i} = w_i H_{iq}^H u_i − Σ_{p ∈ S_i, p ≠ q} M_{q,p} v_{p,i}

use std::collections::{BTreeMap, HashMap};

use rayon::prelude::*;

use netmimo_linalg::{Complex64, ComplexMatrix, ComplexVector};
use netmimo_topology::{BsId, Topology, UeId};
use netmimo_types::{NetError, NetResult};

use crate::state::{BaseStationState, UeState};

/// Coupling matrices of one outer iteration, keyed by ordered BS pair (q ≤ p).
#[derive(Debug, Clone, Default)]
pub struct CouplingStore {
    matrices: HashMap<(BsId, BsId), ComplexMatrix>,
}

impl CouplingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recompute every M_{q,p} from the current receivers and weights.
    ///
    /// `serving[i]` is the serving set of UE i and `ues[i]` its receiver
    /// state; channels must already be cached in `topology`.
    pub fn compute(
        topology: &Topology,
        serving: &[Vec<BsId>],
        ues: &[UeState],
    ) -> NetResult<Self> {
        if serving.len() != ues.len() {
            return Err(NetError::DimensionMismatch {
                expected: format!("{} ue states", serving.len()),
                got: format!("{}", ues.len()),
            });
        }

        // a_{iq} = H_{iq}^H u_i for every serving BS of every UE.
        let projected: Vec<Vec<ComplexVector>> = serving
            .par_iter()
            .zip(ues.par_iter())
            .enumerate()
            .map(|(i, (bss, state))| {
                bss.iter()
                    .map(|&q| topology.channel(q, UeId(i))?.hermitian_mul_vec(&state.u))
                    .collect::<NetResult<Vec<_>>>()
            })
            .collect::<NetResult<Vec<_>>>()?;

        // Contributing (ue, position of q, position of p) per pair.
        let mut contributions: BTreeMap<(BsId, BsId), Vec<(usize, usize, usize)>> =
            BTreeMap::new();
        for (i, bss) in serving.iter().enumerate() {
            for (a, &q) in bss.iter().enumerate() {
                for (b, &p) in bss.iter().enumerate().skip(a) {
                    let key = if q <= p { (q, p) } else { (p, q) };
                    let entry = if q <= p { (i, a, b) } else { (i, b, a) };
                    contributions.entry(key).or_default().push(entry);
                }
            }
        }

        let pairs: Vec<((BsId, BsId), Vec<(usize, usize, usize)>)> =
            contributions.into_iter().collect();
        let matrices = pairs
            .into_par_iter()
            .map(|((q, p), terms)| {
                let mut m = ComplexMatrix::zeros(topology.bs(q)?.antennas, topology.bs(p)?.antennas);
                for (i, a, b) in terms {
                    let w = Complex64::new(ues[i].w, 0.0);
                    m.add_outer(w, &projected[i][a], &projected[i][b])?;
                }
                if !m.is_finite() {
                    return Err(NetError::NonFinite(format!("coupling matrix M({q}, {p})")));
                }
                Ok(((q, p), m))
            })
            .collect::<NetResult<HashMap<_, _>>>()?;

        Ok(Self { matrices })
    }

    pub fn len(&self) -> usize {
        self.matrices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matrices.is_empty()
    }

    pub fn clear(&mut self) {
        self.matrices.clear();
    }

    pub fn insert(&mut self, q: BsId, p: BsId, m: ComplexMatrix) {
        if q <= p {
            self.matrices.insert((q, p), m);
        } else {
            self.matrices.insert((p, q), m.hermitian_transpose());
        }
    }

    fn missing(q: BsId, p: BsId) -> NetError {
        NetError::NotRefreshed(format!("coupling matrix M({q}, {p}) not computed"))
    }

    /// Diagonal block M_{q,q}.
    pub fn diagonal(&self, q: BsId) -> NetResult<&ComplexMatrix> {
        self.matrices.get(&(q, q)).ok_or_else(|| Self::missing(q, q))
    }

    /// M_{q,p} in either orientation.
    pub fn get(&self, q: BsId, p: BsId) -> NetResult<ComplexMatrix> {
        if q <= p {
            self.matrices
                .get(&(q, p))
                .cloned()
                .ok_or_else(|| Self::missing(q, p))
        } else {
            self.matrices
                .get(&(p, q))
                .map(ComplexMatrix::hermitian_transpose)
                .ok_or_else(|| Self::missing(q, p))
        }
    }

    /// M_{q,p} · v without materialising the transposed block.
    pub fn apply(&self, q: BsId, p: BsId, v: &ComplexVector) -> NetResult<ComplexVector> {
        if q <= p {
            self.matrices
                .get(&(q, p))
                .ok_or_else(|| Self::missing(q, p))?
                .mul_vec(v)
        } else {
            self.matrices
                .get(&(p, q))
                .ok_or_else(|| Self::missing(q, p))?
                .hermitian_mul_vec(v)
        }
    }
}

/// Coupling vector c_{q,i} for link (q, i), reading v_{p,i} from `bs_states`.
pub fn update_c_vector(
    topology: &Topology,
    coupling: &CouplingStore,
    serving: &[BsId],
    ue: &UeState,
    bs_states: &[BaseStationState],
    q: BsId,
    i: UeId,
) -> NetResult<ComplexVector> {
    coupling_vector(topology, coupling, serving, ue, q, i, |p| {
        let state = bs_states.get(p.0).ok_or(NetError::UnknownEntity {
            kind: "base station",
            index: p.0,
        })?;
        Ok(&state.link(i)?.v)
    })
}

/// Coupling vector c_{q,i} with v_{p,i} supplied by `transmit_vector`.
pub fn coupling_vector<'a, F>(
    topology: &Topology,
    coupling: &CouplingStore,
    serving: &[BsId],
    ue: &UeState,
    q: BsId,
    i: UeId,
    transmit_vector: F,
) -> NetResult<ComplexVector>
where
    F: Fn(BsId) -> NetResult<&'a ComplexVector>,
{
    let mut c = topology.channel(q, i)?.hermitian_mul_vec(&ue.u)?;
    c.scale_mut(Complex64::new(ue.w, 0.0));
    for &p in serving.iter().filter(|&&p| p != q) {
        let v = transmit_vector(p)?;
        if v.is_zero() {
            continue;
        }
        let mv = coupling.apply(q, p, v)?;
        c.add_scaled(Complex64::new(-1.0, 0.0), &mv)?;
    }
    Ok(c)
}
