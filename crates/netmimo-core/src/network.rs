// ─────────────────────────────────────────────────────────────────────
// netmimo — Network Optimizer (Outer-Loop Orchestrator)
// ─────────────────────────────────────────────────────────────────────
//! Five-phase outer iteration:
//!   1. Receivers and rates: MMSE filter u, MSE weight w, rate per UE
//!   2. Coupling matrices M_{q,p} and the eigenpairs of every M_{q,q}
//!   3. Block coordinate descent: c-vector + nested bisection per link
//!   4. Power projection per BS (subgradient step, projection, blend)
//!   5. Objective: Σ rate − λ Σ ‖v‖₂ under the new transmit vectors
//!
//! The loop stops when the objective moves less than the tolerance, or
//! when the iteration budget runs out. A phase that fails numerically
//! ends the run with the last stable state restored.

use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use serde::Serialize;

use netmimo_linalg::{ComplexVector, HermitianEigen};
use netmimo_topology::{BsId, Topology, UeId};
use netmimo_types::{
    IterationLog, NetError, NetResult, OptimizationReport, OptimizerConfig, Phase, SweepMode,
    Termination,
};

use crate::base_station::{self, LinkUpdate};
use crate::bisection::BisectionSettings;
use crate::coupling::{self, CouplingStore};
use crate::receiver::{self, Snapshot};
use crate::state::{BaseStationState, LinkState, UeState};

/// Per-link view of the current solution.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinkSummary {
    pub bs: BsId,
    pub ue: UeId,
    pub power: f64,
    pub norm: f64,
    pub mu: f64,
    pub active: bool,
}

/// Cooperative MIMO network together with its optimization state.
pub struct Network {
    topology: Topology,
    config: OptimizerConfig,
    settings: BisectionSettings,
    /// S_i per UE.
    serving: Vec<Vec<BsId>>,
    /// UEs whose serving sets meet S_i, per UE.
    interferers: Vec<Vec<UeId>>,
    bs_states: Vec<BaseStationState>,
    ue_states: Vec<UeState>,
    coupling: CouplingStore,
    /// Eigenpairs of M_{q,q}, per BS (None for a BS with no links).
    eigens: Vec<Option<HermitianEigen>>,
    c_vectors: HashMap<(UeId, BsId), ComplexVector>,
    objective: f64,
    iteration: usize,
    refreshed: bool,
}

impl Network {
    pub fn new(topology: Topology, config: OptimizerConfig) -> NetResult<Self> {
        config.validate()?;
        let settings = BisectionSettings::from(&config);
        Ok(Self {
            topology,
            config,
            settings,
            serving: Vec::new(),
            interferers: Vec::new(),
            bs_states: Vec::new(),
            ue_states: Vec::new(),
            coupling: CouplingStore::new(),
            eigens: Vec::new(),
            c_vectors: HashMap::new(),
            objective: 0.0,
            iteration: 0,
            refreshed: false,
        })
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    /// Mutable topology access. The optimization state must be rebuilt
    /// with `refresh()` afterwards.
    pub fn topology_mut(&mut self) -> &mut Topology {
        self.refreshed = false;
        &mut self.topology
    }

    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    fn ensure_refreshed(&self) -> NetResult<()> {
        if self.refreshed {
            Ok(())
        } else {
            Err(NetError::NotRefreshed(
                "call refresh() before optimizing".into(),
            ))
        }
    }

    // ------------------------------------------------------------------
    // Initialisation
    // ------------------------------------------------------------------

    /// Draw channels for every serving pair, spread each BS budget
    /// evenly over its links, start from random transmit vectors and
    /// evaluate the initial objective.
    pub fn refresh(&mut self) -> NetResult<()> {
        self.refreshed = false;
        let ues: Vec<UeId> = self.topology.ue_ids().collect();
        let bss: Vec<BsId> = self.topology.bs_ids().collect();

        self.serving = ues
            .iter()
            .map(|&i| self.topology.serving_bss(i))
            .collect::<NetResult<_>>()?;
        if let Some(k) = self.serving.iter().position(Vec::is_empty) {
            return Err(NetError::EmptyCluster {
                cluster: self.topology.ue(UeId(k))?.cluster.0,
                what: "base stations in its closure",
            });
        }
        let served: Vec<Vec<UeId>> = bss
            .iter()
            .map(|&q| self.topology.served_ues(q))
            .collect::<NetResult<_>>()?;

        self.interferers = self
            .serving
            .iter()
            .map(|bs_set| {
                let mut js: Vec<UeId> = bs_set
                    .iter()
                    .flat_map(|q| served[q.0].iter().copied())
                    .collect();
                js.sort_unstable();
                js.dedup();
                js
            })
            .collect();

        let mut channel_rng = StdRng::seed_from_u64(self.config.seed);
        for (i, bs_set) in ues.iter().zip(&self.serving) {
            for &q in bs_set {
                self.topology.ensure_channel(q, *i, &mut channel_rng)?;
            }
        }

        let mut rng = StdRng::seed_from_u64(self.config.seed.wrapping_add(1));
        self.bs_states = Vec::with_capacity(bss.len());
        for &q in &bss {
            let bs = self.topology.bs(q)?;
            let mut state = BaseStationState::new(q, bs.antennas, bs.power_budget);
            if !served[q.0].is_empty() {
                let power = bs.power_budget / served[q.0].len() as f64;
                for &i in &served[q.0] {
                    let mut v = ComplexVector::random(bs.antennas, &mut rng);
                    v.set_power(power);
                    state.links.insert(i, LinkState::new(v, power));
                }
            }
            self.bs_states.push(state);
        }

        self.ue_states = ues
            .iter()
            .map(|&i| self.topology.ue(i).map(|ue| UeState::new(ue.antennas)))
            .collect::<NetResult<_>>()?;
        self.coupling.clear();
        self.eigens = vec![None; bss.len()];
        self.c_vectors.clear();
        self.iteration = 0;
        self.refreshed = true;

        self.objective = self.recompute_objective()?;
        log::debug!(
            "refresh: {} bss, {} ues, {} links, initial objective {:.4}",
            bss.len(),
            ues.len(),
            self.num_links(),
            self.objective
        );
        Ok(())
    }

    // ------------------------------------------------------------------
    // Per-link and per-UE operations
    // ------------------------------------------------------------------

    fn snapshot(&self) -> Snapshot<'_> {
        Snapshot {
            topology: &self.topology,
            serving: &self.serving,
            interferers: &self.interferers,
            bs_states: &self.bs_states,
            noise_power: self.config.noise_power,
        }
    }

    fn bs_state(&self, q: BsId) -> NetResult<&BaseStationState> {
        self.ensure_refreshed()?;
        self.bs_states.get(q.0).ok_or(NetError::UnknownEntity {
            kind: "base station",
            index: q.0,
        })
    }

    fn serving_set(&self, i: UeId) -> NetResult<&[BsId]> {
        self.ensure_refreshed()?;
        self.serving
            .get(i.0)
            .map(Vec::as_slice)
            .ok_or(NetError::UnknownEntity {
                kind: "ue",
                index: i.0,
            })
    }

    fn eigen(&self, q: BsId) -> NetResult<&HermitianEigen> {
        self.eigens
            .get(q.0)
            .and_then(Option::as_ref)
            .ok_or_else(|| NetError::NotRefreshed(format!("no coupling eigenpairs for {q}")))
    }

    /// Links in (BS, UE) order.
    fn links(&self) -> Vec<(BsId, UeId)> {
        self.bs_states
            .iter()
            .flat_map(|s| s.links.keys().map(move |&i| (s.id, i)))
            .collect()
    }

    pub fn num_links(&self) -> usize {
        self.bs_states.iter().map(|s| s.links.len()).sum()
    }

    /// Transmit vector of BS q towards UE i (zero when q does not serve i).
    pub fn tx_precoding_vector(&self, q: BsId, i: UeId) -> NetResult<ComplexVector> {
        self.topology.ue(i)?;
        Ok(self.bs_state(q)?.tx_precoding_vector(i))
    }

    /// State of link (q, i).
    pub fn link(&self, q: BsId, i: UeId) -> NetResult<&LinkState> {
        self.bs_state(q)?.link(i)
    }

    /// Receiver state of UE i.
    pub fn ue_state(&self, i: UeId) -> NetResult<&UeState> {
        self.ensure_refreshed()?;
        self.ue_states.get(i.0).ok_or(NetError::UnknownEntity {
            kind: "ue",
            index: i.0,
        })
    }

    pub fn coupling(&self) -> &CouplingStore {
        &self.coupling
    }

    /// Coupling vector c_{q,i} from the current state (not cached).
    pub fn update_c_vector(&self, q: BsId, i: UeId) -> NetResult<ComplexVector> {
        let serving = self.serving_set(i)?;
        self.bs_state(q)?.link(i)?;
        coupling::update_c_vector(
            &self.topology,
            &self.coupling,
            serving,
            &self.ue_states[i.0],
            &self.bs_states,
            q,
            i,
        )
    }

    /// Cached coupling vector c_{q,i}, computed on first request.
    pub fn c_vector(&mut self, q: BsId, i: UeId) -> NetResult<&ComplexVector> {
        if !self.c_vectors.contains_key(&(i, q)) {
            let c = self.update_c_vector(q, i)?;
            self.c_vectors.insert((i, q), c);
        }
        self.c_vectors
            .get(&(i, q))
            .ok_or_else(|| NetError::NotRefreshed(format!("no c-vector for {q} -> {i}")))
    }

    fn solve_link(&self, q: BsId, i: UeId, c: &ComplexVector) -> NetResult<LinkUpdate> {
        let power = self.bs_state(q)?.link(i)?.power;
        base_station::block_coordinate_descent(
            self.eigen(q)?,
            c,
            power,
            self.config.sparsity_weight,
            &self.settings,
        )
        .map_err(|e| e.on_link(q.0, i.0))
    }

    /// Solve every link of UE i in serving order without touching the
    /// network; each c-vector sees the vectors already solved for i.
    fn sweep_ue(&self, i: UeId) -> NetResult<Vec<(BsId, ComplexVector, LinkUpdate)>> {
        let serving = self.serving_set(i)?;
        let ue = self.ue_state(i)?;
        let mut vs = serving
            .iter()
            .map(|&q| self.link(q, i).map(|l| l.v.clone()))
            .collect::<NetResult<Vec<_>>>()?;
        let mut out = Vec::with_capacity(serving.len());
        for (k, &q) in serving.iter().enumerate() {
            let c = coupling::coupling_vector(&self.topology, &self.coupling, serving, ue, q, i, |p| {
                serving
                    .iter()
                    .position(|&s| s == p)
                    .map(|j| &vs[j])
                    .ok_or(NetError::UnknownEntity {
                        kind: "base station",
                        index: p.0,
                    })
            })
            .map_err(|e| e.on_link(q.0, i.0))?;
            let update = self.solve_link(q, i, &c)?;
            vs[k] = update.v.clone();
            out.push((q, c, update));
        }
        Ok(out)
    }

    /// Solve link (q, i) against its cached coupling vector and store
    /// the new transmit vector and multiplier.
    pub fn block_coordinate_descent(&mut self, q: BsId, i: UeId) -> NetResult<()> {
        let c = self.c_vector(q, i)?.clone();
        let update = self.solve_link(q, i, &c)?;
        update.apply(self.bs_states[q.0].link_mut(i)?);
        Ok(())
    }

    /// MMSE receiver, weight and rate of UE i under the current vectors.
    pub fn update_variables(&mut self, i: UeId) -> NetResult<()> {
        self.ue_state(i)?;
        let state = receiver::update_variables(&self.snapshot(), i)?;
        self.ue_states[i.0] = state;
        Ok(())
    }

    /// Rate of UE i under the current vectors.
    pub fn evaluate_rate(&self, i: UeId) -> NetResult<f64> {
        self.ue_state(i)?;
        receiver::evaluate_rate(&self.snapshot(), i)
    }

    /// Subgradient power step and projection for BS q.
    pub fn optimize_power_allocation(&mut self, q: BsId) -> NetResult<()> {
        self.bs_state(q)?;
        let iteration = self.iteration.max(1);
        base_station::optimize_power_allocation(&mut self.bs_states[q.0], iteration, &self.config)
    }

    // ------------------------------------------------------------------
    // Phases
    // ------------------------------------------------------------------

    fn update_receivers_and_rates(&mut self) -> NetResult<()> {
        let snapshot = self.snapshot();
        let states = (0..self.ue_states.len())
            .into_par_iter()
            .map(|k| receiver::update_variables(&snapshot, UeId(k)))
            .collect::<NetResult<Vec<_>>>()?;
        self.ue_states = states;
        Ok(())
    }

    fn update_coupling_matrices(&mut self) -> NetResult<()> {
        self.coupling = CouplingStore::compute(&self.topology, &self.serving, &self.ue_states)?;
        let coupling = &self.coupling;
        self.eigens = self
            .bs_states
            .par_iter()
            .map(|s| {
                if s.links.is_empty() {
                    return Ok(None);
                }
                HermitianEigen::decompose(coupling.diagonal(s.id)?).map(Some)
            })
            .collect::<NetResult<Vec<_>>>()?;
        self.c_vectors.clear();
        Ok(())
    }

    /// Drop coupling matrices, eigenpairs and cached c-vectors; they are
    /// rebuilt by the next coupling phase.
    fn clear_coupling(&mut self) {
        self.coupling.clear();
        self.eigens.iter_mut().for_each(|e| *e = None);
        self.c_vectors.clear();
    }

    /// Returns the number of links whose bisection hit its cap.
    fn per_pair_block_coordinate_descent(&mut self) -> NetResult<usize> {
        let links = self.links();
        match self.config.sweep {
            SweepMode::GaussSeidel => {
                for &(q, i) in &links {
                    let c = self.update_c_vector(q, i).map_err(|e| e.on_link(q.0, i.0))?;
                    self.c_vectors.insert((i, q), c);
                    self.block_coordinate_descent(q, i)?;
                }
            }
            SweepMode::Jacobi => {
                // Links of different UEs only meet through u and w, which
                // are frozen for the phase.
                let this = &*self;
                let sweeps = (0..self.ue_states.len())
                    .into_par_iter()
                    .map(|k| this.sweep_ue(UeId(k)))
                    .collect::<NetResult<Vec<_>>>()?;
                for (k, sweep) in sweeps.into_iter().enumerate() {
                    let i = UeId(k);
                    for (q, c, update) in sweep {
                        update.apply(self.bs_states[q.0].link_mut(i)?);
                        self.c_vectors.insert((i, q), c);
                    }
                }
            }
        }
        Ok(self
            .bs_states
            .iter()
            .flat_map(|s| s.links.values())
            .filter(|l| l.capped)
            .count())
    }

    fn per_bs_power_projection(&mut self) -> NetResult<()> {
        let iteration = self.iteration.max(1);
        let config = &self.config;
        self.bs_states
            .par_iter_mut()
            .try_for_each(|s| base_station::optimize_power_allocation(s, iteration, config))
    }

    /// Re-evaluate every rate and return Σ rate − λ Σ ‖v‖₂.
    fn recompute_objective(&mut self) -> NetResult<f64> {
        let snapshot = self.snapshot();
        let rates = (0..self.ue_states.len())
            .into_par_iter()
            .map(|k| receiver::evaluate_rate(&snapshot, UeId(k)))
            .collect::<NetResult<Vec<_>>>()?;
        for (state, rate) in self.ue_states.iter_mut().zip(rates) {
            state.rate = rate;
        }
        let objective = self.sum_rate() - self.penalty();
        if !objective.is_finite() {
            return Err(NetError::NonFinite("objective".into()));
        }
        Ok(objective)
    }

    // ------------------------------------------------------------------
    // Outer loop
    // ------------------------------------------------------------------

    fn step(&mut self) -> Result<IterationLog, (Phase, NetError)> {
        self.update_receivers_and_rates()
            .map_err(|e| (Phase::ReceiversAndRates, e))?;
        self.update_coupling_matrices()
            .map_err(|e| (Phase::CouplingMatrices, e))?;
        let capped = self
            .per_pair_block_coordinate_descent()
            .map_err(|e| (Phase::BlockCoordinateDescent, e))?;
        self.per_bs_power_projection()
            .map_err(|e| (Phase::PowerProjection, e))?;
        let objective = self
            .recompute_objective()
            .map_err(|e| (Phase::Objective, e))?;

        if capped > 0 {
            log::warn!(
                "iteration {}: {capped} link bisections hit the iteration cap",
                self.iteration
            );
        }
        Ok(IterationLog {
            iteration: self.iteration,
            objective,
            sum_rate: self.sum_rate(),
            penalty: self.penalty(),
            active_links: self
                .bs_states
                .iter()
                .flat_map(|s| s.links.values())
                .filter(|l| l.is_active())
                .count(),
            capped_bisections: capped,
            transmit_power: self.bs_states.iter().map(|s| s.transmit_power()).sum(),
        })
    }

    /// Run the outer loop until the objective settles or the iteration
    /// budget is spent.
    pub fn optimize(&mut self) -> NetResult<OptimizationReport> {
        self.ensure_refreshed()?;
        let initial_objective = self.objective;
        let mut best_objective = initial_objective;
        let mut history: Vec<IterationLog> = Vec::new();
        let mut termination = Termination::IterationBudgetExhausted;

        for _ in 0..self.config.max_iterations {
            let checkpoint = (self.bs_states.clone(), self.ue_states.clone());
            let previous = self.objective;
            self.iteration += 1;

            let entry = match self.step() {
                Ok(entry) => entry,
                Err((phase, e)) => {
                    log::error!("iteration {} failed in {phase}: {e}", self.iteration);
                    (self.bs_states, self.ue_states) = checkpoint;
                    self.clear_coupling();
                    self.iteration -= 1;
                    termination = Termination::Failed {
                        phase,
                        reason: e.to_string(),
                    };
                    break;
                }
            };

            self.objective = entry.objective;
            best_objective = best_objective.max(entry.objective);
            log::debug!(
                "iteration {}: objective {:.6} sum rate {:.6} active links {}",
                entry.iteration,
                entry.objective,
                entry.sum_rate,
                entry.active_links
            );
            history.push(entry);

            if (self.objective - previous).abs() < self.config.tolerance {
                termination = Termination::Converged;
                break;
            }
        }

        match &termination {
            Termination::Converged => log::info!(
                "converged after {} iterations, objective {:.6}",
                history.len(),
                self.objective
            ),
            Termination::IterationBudgetExhausted => log::info!(
                "iteration budget of {} exhausted, objective {:.6}",
                self.config.max_iterations,
                self.objective
            ),
            Termination::Failed { .. } => {}
        }

        Ok(OptimizationReport {
            termination,
            iterations: history.len(),
            initial_objective,
            final_objective: self.objective,
            best_objective,
            final_sum_rate: self.sum_rate(),
            history,
        })
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Σ rate over UEs as last evaluated.
    pub fn sum_rate(&self) -> f64 {
        self.ue_states.iter().map(|s| s.rate).sum()
    }

    /// λ Σ ‖v‖₂ over all links.
    pub fn penalty(&self) -> f64 {
        self.config.sparsity_weight * self.bs_states.iter().map(|s| s.group_norm()).sum::<f64>()
    }

    /// Sum rate minus the group-sparsity penalty.
    pub fn objective(&self) -> f64 {
        self.objective
    }

    pub fn iteration(&self) -> usize {
        self.iteration
    }

    /// BSs actively transmitting to UE i.
    pub fn serving_bss(&self, i: UeId) -> NetResult<Vec<BsId>> {
        let serving = self.serving_set(i)?;
        Ok(serving
            .iter()
            .copied()
            .filter(|q| {
                self.bs_states[q.0]
                    .links
                    .get(&i)
                    .is_some_and(LinkState::is_active)
            })
            .collect())
    }

    /// Every link of the current solution in (BS, UE) order.
    pub fn link_summaries(&self) -> Vec<LinkSummary> {
        self.bs_states
            .iter()
            .flat_map(|s| {
                s.links.iter().map(move |(&ue, l)| LinkSummary {
                    bs: s.id,
                    ue,
                    power: l.power,
                    norm: l.v.norm2(),
                    mu: l.mu,
                    active: l.is_active(),
                })
            })
            .collect()
    }

    /// Mean number of actively serving BSs per UE.
    pub fn average_serving_bss(&self) -> NetResult<f64> {
        self.ensure_refreshed()?;
        if self.ue_states.is_empty() {
            return Ok(0.0);
        }
        let total: usize = (0..self.ue_states.len())
            .map(|k| self.serving_bss(UeId(k)).map(|s| s.len()))
            .sum::<NetResult<usize>>()?;
        Ok(total as f64 / self.ue_states.len() as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use netmimo_topology::{
        brownian_motion, hexagonal_centres, place_random_bss, place_random_ues, ChannelConfig,
        Position,
    };
    use netmimo_types::Damping;

    const BS_POSITIONS: [(f64, f64); 5] = [
        (-2600.0, -1400.0),
        (-1700.0, -1350.0),
        (-1740.0, -1050.0),
        (-1500.0, -1200.0),
        (-1350.0, -1000.0),
    ];
    const UE_POSITIONS: [(f64, f64); 3] = [(-2250.0, -500.0), (-1500.0, -650.0), (-1250.0, -1250.0)];

    /// Five 4-antenna BSs (budget 20) and three 2-antenna UEs in one cluster.
    fn single_cluster() -> Topology {
        let mut topology = Topology::new(1000.0, ChannelConfig::default()).unwrap();
        let cl = topology.add_cluster(Position::new(-1750.0, -1000.0));
        for (x, y) in BS_POSITIONS {
            topology
                .add_base_station(cl, Position::new(x, y), 4, 20.0)
                .unwrap();
        }
        for (x, y) in UE_POSITIONS {
            topology.add_ue(cl, Position::new(x, y), 2).unwrap();
        }
        topology
    }

    fn refreshed(config: OptimizerConfig) -> Network {
        let mut network = Network::new(single_cluster(), config).unwrap();
        network.refresh().unwrap();
        network
    }

    fn assert_budget_invariant(network: &Network) {
        for s in &network.bs_states {
            let allocated = s.allocated_power();
            assert!(
                allocated <= s.power_budget + 1e-6,
                "{}: Σ P = {allocated} > {}",
                s.id,
                s.power_budget
            );
            let transmitted = s.transmit_power();
            assert!(
                transmitted <= s.power_budget * (1.0 + 1e-5),
                "{}: Σ ‖v‖² = {transmitted} > {}",
                s.id,
                s.power_budget
            );
        }
    }

    /// Sum rate and objective never fall by more than `tol` between
    /// consecutive iterations.
    fn assert_monotone(report: &OptimizationReport, tol: f64) {
        for (k, pair) in report.sum_rate_history().windows(2).enumerate() {
            assert!(
                pair[1] >= pair[0] - tol,
                "sum rate fell from {} to {} at iteration {}",
                pair[0],
                pair[1],
                k + 2
            );
        }
        for (k, pair) in report.history.windows(2).enumerate() {
            assert!(
                pair[1].objective >= pair[0].objective - tol,
                "objective fell from {} to {} at iteration {}",
                pair[0].objective,
                pair[1].objective,
                k + 2
            );
        }
    }

    #[test]
    fn test_refresh_spreads_budget() {
        let network = refreshed(OptimizerConfig::default());
        assert_eq!(network.num_links(), 15);
        for q in 0..5 {
            for i in 0..3 {
                let link = network.link(BsId(q), UeId(i)).unwrap();
                assert!((link.power - 20.0 / 3.0).abs() < 1e-12);
                assert!((link.v.power() - 20.0 / 3.0).abs() < 1e-9);
                assert_eq!(link.mu, 0.0);
                assert_eq!(link.hessian, 1.0);
            }
        }
        assert!(network.objective().is_finite());
        assert_eq!(network.iteration(), 0);
    }

    #[test]
    fn test_single_cluster_end_to_end() {
        let config = OptimizerConfig {
            sparsity_weight: 0.3,
            ..OptimizerConfig::default()
        };
        let mut network = refreshed(config);
        let report = network.optimize().unwrap();

        assert!(
            report.converged(),
            "terminated with {:?} after {} iterations",
            report.termination,
            report.iterations
        );
        assert!(report.iterations <= 200);
        assert!(
            report.final_objective >= report.initial_objective,
            "objective fell from {} to {}",
            report.initial_objective,
            report.final_objective
        );
        assert!(report.best_objective >= report.final_objective);
        assert_monotone(&report, network.config().tolerance);
        assert!((network.objective() - report.final_objective).abs() < 1e-12);
        assert!(report.final_sum_rate > 0.0);
        assert_budget_invariant(&network);

        // Sparsity: a link is off exactly when its coupling vector is short.
        let lambda = network.config().sparsity_weight;
        for (q, i) in network.links() {
            let c_norm = network.c_vectors[&(i, q)].norm2();
            let v = &network.link(q, i).unwrap().v;
            assert_eq!(
                v.is_zero(),
                c_norm <= lambda / 2.0,
                "{q} -> {i}: ‖c‖ = {c_norm}, ‖v‖ = {}",
                v.norm2()
            );
        }

        let avg = network.average_serving_bss().unwrap();
        assert!((0.0..=5.0).contains(&avg), "average serving BSs {avg}");
        for i in 0..3 {
            let active = network.serving_bss(UeId(i)).unwrap();
            assert!(active.iter().all(|q| q.0 < 5));
        }
    }

    #[test]
    fn test_jacobi_sweep_is_monotone() {
        let config = OptimizerConfig {
            sweep: SweepMode::Jacobi,
            ..OptimizerConfig::default()
        };
        let mut network = refreshed(config);
        let report = network.optimize().unwrap();
        assert!(
            report.converged(),
            "terminated with {:?} after {} iterations",
            report.termination,
            report.iterations
        );
        assert_monotone(&report, network.config().tolerance);
        assert_budget_invariant(&network);

        // UEs are independent inside the phase, so the parallel sweep
        // lands on the same iterates as the sequential one.
        let mut sequential = refreshed(OptimizerConfig::default());
        let expected = sequential.optimize().unwrap();
        assert_eq!(report.iterations, expected.iterations);
        for (a, b) in report.history.iter().zip(&expected.history) {
            assert!(
                (a.objective - b.objective).abs() < 1e-9,
                "iteration {}: {} vs {}",
                a.iteration,
                a.objective,
                b.objective
            );
        }
    }

    #[test]
    fn test_jacobi_sweep_with_fixed_damping() {
        let config = OptimizerConfig {
            sweep: SweepMode::Jacobi,
            damping: Damping::Fixed(0.5),
            max_iterations: 30,
            ..OptimizerConfig::default()
        };
        let mut network = refreshed(config);
        let report = network.optimize().unwrap();
        assert!(!report.failed(), "{:?}", report.termination);
        assert!(report.iterations <= 30);
        assert_budget_invariant(&network);
    }

    #[test]
    fn test_large_lambda_switches_everything_off() {
        let config = OptimizerConfig {
            sparsity_weight: 1e9,
            ..OptimizerConfig::default()
        };
        let mut network = refreshed(config);
        network.optimize().unwrap();
        for (q, i) in network.links() {
            assert!(network.tx_precoding_vector(q, i).unwrap().is_zero());
        }
        assert_eq!(network.average_serving_bss().unwrap(), 0.0);
        assert_eq!(network.sum_rate(), 0.0);
    }

    #[test]
    fn test_runs_are_reproducible() {
        let run = || {
            let mut network = refreshed(OptimizerConfig {
                max_iterations: 10,
                ..OptimizerConfig::default()
            });
            network.optimize().unwrap().sum_rate_history()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_optimize_requires_refresh() {
        let mut network = Network::new(single_cluster(), OptimizerConfig::default()).unwrap();
        assert!(matches!(network.optimize(), Err(NetError::NotRefreshed(_))));

        network.refresh().unwrap();
        network.topology_mut().invalidate_channels();
        assert!(matches!(network.optimize(), Err(NetError::NotRefreshed(_))));
    }

    #[test]
    fn test_failed_phase_keeps_last_stable_state() {
        // Three links at 15 each cannot fit a budget of 20.
        let config = OptimizerConfig {
            power_floor: 15.0,
            ..OptimizerConfig::default()
        };
        let mut network = refreshed(config);
        let initial = network.objective();
        let report = network.optimize().unwrap();

        match &report.termination {
            Termination::Failed { phase, .. } => assert_eq!(*phase, Phase::PowerProjection),
            other => panic!("expected a failed run, got {other:?}"),
        }
        assert_eq!(report.iterations, 0);
        assert_eq!(report.final_objective, initial);
        assert_eq!(network.iteration(), 0);
        assert!((network.link(BsId(0), UeId(0)).unwrap().power - 20.0 / 3.0).abs() < 1e-12);

        // Nothing computed from the discarded iteration survives.
        assert!(network.coupling().is_empty());
        assert!(network.c_vectors.is_empty());
        assert!(network.eigens.iter().all(Option::is_none));
        assert!(matches!(
            network.c_vector(BsId(0), UeId(0)),
            Err(NetError::NotRefreshed(_))
        ));
        assert!(matches!(
            network.block_coordinate_descent(BsId(1), UeId(2)),
            Err(NetError::NotRefreshed(_))
        ));
    }

    #[test]
    fn test_link_summaries_serialize() {
        let mut network = refreshed(OptimizerConfig {
            max_iterations: 5,
            ..OptimizerConfig::default()
        });
        network.optimize().unwrap();
        let summaries = network.link_summaries();
        assert_eq!(summaries.len(), 15);
        let active = summaries.iter().filter(|s| s.active).count();
        let counted: usize = (0..3)
            .map(|i| network.serving_bss(UeId(i)).unwrap().len())
            .sum();
        assert_eq!(active, counted);

        let json = serde_json::to_string(&summaries[0]).unwrap();
        assert!(json.contains("\"bs\":0"), "{json}");
        assert!(json.contains("\"active\""));
    }

    #[test]
    fn test_unserved_pair_has_zero_vector() {
        let mut topology = Topology::new(100.0, ChannelConfig::default()).unwrap();
        let a = topology.add_cluster(Position::new(0.0, 0.0));
        let b = topology.add_cluster(Position::new(5000.0, 0.0));
        let bs_a = topology.add_base_station(a, Position::new(10.0, 0.0), 3, 10.0).unwrap();
        topology.add_base_station(b, Position::new(5010.0, 0.0), 2, 10.0).unwrap();
        topology.add_ue(a, Position::new(-200.0, 50.0), 1).unwrap();
        let ue_b = topology.add_ue(b, Position::new(4800.0, 50.0), 1).unwrap();

        let mut network = Network::new(topology, OptimizerConfig::default()).unwrap();
        network.refresh().unwrap();
        let v = network.tx_precoding_vector(bs_a, ue_b).unwrap();
        assert_eq!(v.len(), 3);
        assert!(v.is_zero());
        assert!(network.link(bs_a, ue_b).is_err());
        assert_eq!(network.num_links(), 2);
        assert!(!network.optimize().unwrap().failed());
    }

    #[test]
    fn test_ue_without_serving_bs_is_rejected() {
        let mut topology = Topology::new(100.0, ChannelConfig::default()).unwrap();
        let a = topology.add_cluster(Position::new(0.0, 0.0));
        let b = topology.add_cluster(Position::new(5000.0, 0.0));
        topology.add_base_station(a, Position::new(10.0, 0.0), 2, 10.0).unwrap();
        topology.add_ue(b, Position::new(5050.0, 0.0), 1).unwrap();

        let mut network = Network::new(topology, OptimizerConfig::default()).unwrap();
        assert!(matches!(
            network.refresh(),
            Err(NetError::EmptyCluster { cluster: 1, .. })
        ));
        assert!(matches!(network.optimize(), Err(NetError::NotRefreshed(_))));
    }

    #[test]
    fn test_neighbouring_clusters_cooperate() {
        let mut topology = Topology::new(1500.0, ChannelConfig::default()).unwrap();
        let a = topology.add_cluster(Position::new(0.0, 0.0));
        let b = topology.add_cluster(Position::new(1000.0, 0.0));
        topology.add_base_station(a, Position::new(100.0, 0.0), 2, 10.0).unwrap();
        topology.add_base_station(b, Position::new(900.0, 0.0), 2, 10.0).unwrap();
        let ue = topology.add_ue(a, Position::new(500.0, 100.0), 2).unwrap();

        let mut network = Network::new(topology, OptimizerConfig::default()).unwrap();
        network.refresh().unwrap();
        assert_eq!(network.num_links(), 2);
        network.optimize().unwrap();
        // Both clusters' BSs are candidates for the UE.
        assert_eq!(network.serving_set(ue).unwrap(), &[BsId(0), BsId(1)]);
    }

    #[test]
    fn test_mobility_then_refresh() {
        let mut rng = StdRng::seed_from_u64(9);
        let mut topology = Topology::new(1200.0, ChannelConfig::default()).unwrap();
        for centre in hexagonal_centres(1, 1000.0) {
            let cl = topology.add_cluster(centre);
            place_random_bss(&mut topology, cl, 2, 2, 10.0, 400.0, &mut rng).unwrap();
            place_random_ues(&mut topology, cl, 2, 1, 400.0, &mut rng).unwrap();
        }
        let config = OptimizerConfig {
            max_iterations: 20,
            ..OptimizerConfig::default()
        };
        let mut network = Network::new(topology, config).unwrap();
        network.refresh().unwrap();
        // The centre cluster cooperates with all six neighbours.
        assert_eq!(network.serving_set(UeId(0)).unwrap().len(), 14);
        let first = network.optimize().unwrap();
        assert!(!first.failed(), "{:?}", first.termination);
        assert_budget_invariant(&network);

        brownian_motion(network.topology_mut(), 400.0, 30.0, &mut rng).unwrap();
        assert!(network.topology().channels().is_empty());
        assert!(matches!(network.optimize(), Err(NetError::NotRefreshed(_))));

        network.refresh().unwrap();
        assert_eq!(network.iteration(), 0);
        let second = network.optimize().unwrap();
        assert!(!second.failed(), "{:?}", second.termination);
        assert_budget_invariant(&network);
    }

    #[test]
    fn test_single_link_operations() {
        let mut network = refreshed(OptimizerConfig::default());
        let (q, i) = (BsId(2), UeId(1));
        // Coupling matrices are not available before the first phase 2.
        assert!(matches!(
            network.block_coordinate_descent(q, i),
            Err(NetError::NotRefreshed(_))
        ));

        network.update_receivers_and_rates().unwrap();
        network.update_coupling_matrices().unwrap();
        let c = network.c_vector(q, i).unwrap().clone();
        assert!(c.approx_eq(&network.update_c_vector(q, i).unwrap(), 1e-12));
        network.block_coordinate_descent(q, i).unwrap();
        let link = network.link(q, i).unwrap();
        assert!(link.v.power() <= link.power * (1.0 + 1e-5));

        network.update_variables(i).unwrap();
        let rate = network.evaluate_rate(i).unwrap();
        assert!((network.ue_state(i).unwrap().rate - rate).abs() < 1e-9);

        network.optimize_power_allocation(q).unwrap();
        assert!(network.bs_state(q).unwrap().allocated_power() <= 20.0 + 1e-6);
    }
}
