// ─────────────────────────────────────────────────────────────────────
// netmimo — Topology Arena
// ─────────────────────────────────────────────────────────────────────
//! Arena of clusters, base stations and UEs addressed by typed handles.
//!
//! The topology owns two caches: each cluster's closure and the BS → UE
//! channel matrices. Both are filled lazily and cleared through
//! `invalidate_closures` / `invalidate_channels` when positions change.

use rand::Rng;

use netmimo_linalg::ComplexMatrix;
use netmimo_types::{NetError, NetResult};

use crate::channel::{ChannelConfig, ChannelModel, ChannelStore};
use crate::cluster::Cluster;
use crate::entity::{BaseStation, BsId, ClusterId, Position, UeId, UserEquipment};

#[derive(Debug, Clone)]
pub struct Topology {
    closure_distance: f64,
    model: ChannelModel,
    pub(crate) clusters: Vec<Cluster>,
    pub(crate) bss: Vec<BaseStation>,
    pub(crate) ues: Vec<UserEquipment>,
    channels: ChannelStore,
}

impl Topology {
    /// Empty topology. Clusters whose centres are strictly closer than
    /// `closure_distance` cooperate.
    pub fn new(closure_distance: f64, channel: ChannelConfig) -> NetResult<Self> {
        if !(closure_distance > 0.0 && closure_distance.is_finite()) {
            return Err(NetError::Config(format!(
                "closure_distance must be finite and > 0, got {closure_distance}"
            )));
        }
        Ok(Self {
            closure_distance,
            model: ChannelModel::new(channel)?,
            clusters: Vec::new(),
            bss: Vec::new(),
            ues: Vec::new(),
            channels: ChannelStore::new(),
        })
    }

    pub fn closure_distance(&self) -> f64 {
        self.closure_distance
    }

    pub fn channel_model(&self) -> &ChannelModel {
        &self.model
    }

    // ── construction ────────────────────────────────────────────────

    pub fn add_cluster(&mut self, position: Position) -> ClusterId {
        // A new cluster may fall inside existing closures.
        self.invalidate_closures();
        self.clusters.push(Cluster::new(position));
        ClusterId(self.clusters.len() - 1)
    }

    pub fn add_base_station(
        &mut self,
        cluster: ClusterId,
        position: Position,
        antennas: usize,
        power_budget: f64,
    ) -> NetResult<BsId> {
        self.cluster(cluster)?;
        if antennas == 0 {
            return Err(NetError::Config("base station needs at least one antenna".into()));
        }
        if !(power_budget > 0.0 && power_budget.is_finite()) {
            return Err(NetError::Config(format!(
                "power budget must be finite and > 0, got {power_budget}"
            )));
        }
        let id = BsId(self.bss.len());
        self.bss.push(BaseStation {
            position,
            antennas,
            power_budget,
            cluster,
        });
        self.clusters[cluster.0].bss.push(id);
        Ok(id)
    }

    pub fn add_ue(
        &mut self,
        cluster: ClusterId,
        position: Position,
        antennas: usize,
    ) -> NetResult<UeId> {
        self.cluster(cluster)?;
        if antennas == 0 {
            return Err(NetError::Config("ue needs at least one antenna".into()));
        }
        let id = UeId(self.ues.len());
        self.ues.push(UserEquipment {
            position,
            antennas,
            cluster,
        });
        self.clusters[cluster.0].ues.push(id);
        Ok(id)
    }

    // ── lookup ──────────────────────────────────────────────────────

    pub fn cluster(&self, id: ClusterId) -> NetResult<&Cluster> {
        self.clusters
            .get(id.0)
            .ok_or(NetError::ClusterNotAttached(id.0))
    }

    pub fn bs(&self, id: BsId) -> NetResult<&BaseStation> {
        self.bss.get(id.0).ok_or(NetError::UnknownEntity {
            kind: "base station",
            index: id.0,
        })
    }

    pub fn ue(&self, id: UeId) -> NetResult<&UserEquipment> {
        self.ues.get(id.0).ok_or(NetError::UnknownEntity {
            kind: "ue",
            index: id.0,
        })
    }

    pub fn num_clusters(&self) -> usize {
        self.clusters.len()
    }

    pub fn num_bss(&self) -> usize {
        self.bss.len()
    }

    pub fn num_ues(&self) -> usize {
        self.ues.len()
    }

    pub fn cluster_ids(&self) -> impl Iterator<Item = ClusterId> {
        (0..self.clusters.len()).map(ClusterId)
    }

    pub fn bs_ids(&self) -> impl Iterator<Item = BsId> {
        (0..self.bss.len()).map(BsId)
    }

    pub fn ue_ids(&self) -> impl Iterator<Item = UeId> {
        (0..self.ues.len()).map(UeId)
    }

    // ── closure ─────────────────────────────────────────────────────

    /// Clusters within the closure distance of `id`, itself included,
    /// in handle order.
    pub fn closure(&self, id: ClusterId) -> NetResult<Vec<ClusterId>> {
        let cluster = self.cluster(id)?;
        if let Some(cached) = cluster.cached_closure() {
            if !cached.is_empty() {
                return Ok(cached);
            }
        }
        let closure: Vec<ClusterId> = self
            .clusters
            .iter()
            .enumerate()
            .filter(|(k, other)| {
                *k == id.0 || other.position.distance(&cluster.position) < self.closure_distance
            })
            .map(|(k, _)| ClusterId(k))
            .collect();
        cluster.store_closure(closure.clone());
        Ok(closure)
    }

    /// Base stations that may transmit to `ue`, in handle order.
    pub fn serving_bss(&self, ue: UeId) -> NetResult<Vec<BsId>> {
        let cluster = self.ue(ue)?.cluster;
        let mut out: Vec<BsId> = Vec::new();
        for c in self.closure(cluster)? {
            out.extend_from_slice(&self.clusters[c.0].bss);
        }
        out.sort_unstable();
        Ok(out)
    }

    /// UEs that `bs` may transmit to, in handle order.
    pub fn served_ues(&self, bs: BsId) -> NetResult<Vec<UeId>> {
        let cluster = self.bs(bs)?.cluster;
        let mut out: Vec<UeId> = Vec::new();
        for c in self.closure(cluster)? {
            out.extend_from_slice(&self.clusters[c.0].ues);
        }
        out.sort_unstable();
        Ok(out)
    }

    pub fn invalidate_closures(&self) {
        for c in &self.clusters {
            c.invalidate_closure();
        }
    }

    // ── channels ────────────────────────────────────────────────────

    /// Cached channel from `bs` to `ue`.
    pub fn channel(&self, bs: BsId, ue: UeId) -> NetResult<&ComplexMatrix> {
        self.bs(bs)?;
        self.ue(ue)?;
        self.channels
            .get(bs, ue)
            .ok_or_else(|| NetError::NotRefreshed(format!("no channel for {bs} -> {ue}")))
    }

    /// Cached channel, drawn first if missing.
    pub fn ensure_channel<R: Rng + ?Sized>(
        &mut self,
        bs: BsId,
        ue: UeId,
        rng: &mut R,
    ) -> NetResult<&ComplexMatrix> {
        if !self.channels.contains(bs, ue) {
            self.regenerate(bs, ue, rng)?;
        }
        self.channel(bs, ue)
    }

    /// Draw a fresh channel for the pair, replacing any cached one.
    pub fn regenerate<R: Rng + ?Sized>(&mut self, bs: BsId, ue: UeId, rng: &mut R) -> NetResult<()> {
        let h = self
            .model
            .generate_channel(self.bs(bs)?, self.ue(ue)?, rng)?;
        self.channels.insert(bs, ue, h);
        Ok(())
    }

    /// Install a known channel (ue.antennas × bs.antennas).
    pub fn set_channel(&mut self, bs: BsId, ue: UeId, h: ComplexMatrix) -> NetResult<()> {
        let (rows, cols) = (self.ue(ue)?.antennas, self.bs(bs)?.antennas);
        if h.rows() != rows || h.cols() != cols {
            return Err(NetError::DimensionMismatch {
                expected: format!("{rows}x{cols} channel for {bs} -> {ue}"),
                got: format!("{}x{}", h.rows(), h.cols()),
            });
        }
        if !h.is_finite() {
            return Err(NetError::NonFinite(format!("channel {bs} -> {ue}")));
        }
        self.channels.insert(bs, ue, h);
        Ok(())
    }

    pub fn channels(&self) -> &ChannelStore {
        &self.channels
    }

    pub fn invalidate_channels(&mut self) {
        self.channels.clear();
    }
}
