// ─────────────────────────────────────────────────────────────────────
// netmimo — Clusters
// ─────────────────────────────────────────────────────────────────────

use parking_lot::RwLock;

use crate::entity::{BsId, ClusterId, Entity, EntityKind, Position, UeId};

/// Group of base stations and UEs around a common centre.
///
/// The closure (the set of clusters close enough to cooperate) is
/// computed on first use and cached behind a `parking_lot::RwLock`, so
/// lookups only need `&Cluster`.
#[derive(Debug)]
pub struct Cluster {
    pub position: Position,
    pub(crate) bss: Vec<BsId>,
    pub(crate) ues: Vec<UeId>,
    closure: RwLock<Option<Vec<ClusterId>>>,
}

impl Cluster {
    pub fn new(position: Position) -> Self {
        Self {
            position,
            bss: Vec::new(),
            ues: Vec::new(),
            closure: RwLock::new(None),
        }
    }

    pub fn base_stations(&self) -> &[BsId] {
        &self.bss
    }

    pub fn ues(&self) -> &[UeId] {
        &self.ues
    }

    pub(crate) fn cached_closure(&self) -> Option<Vec<ClusterId>> {
        self.closure.read().clone()
    }

    pub(crate) fn store_closure(&self, closure: Vec<ClusterId>) {
        *self.closure.write() = Some(closure);
    }

    pub(crate) fn invalidate_closure(&self) {
        *self.closure.write() = None;
    }

    pub fn has_cached_closure(&self) -> bool {
        self.closure.read().is_some()
    }
}

impl Clone for Cluster {
    fn clone(&self) -> Self {
        Self {
            position: self.position,
            bss: self.bss.clone(),
            ues: self.ues.clone(),
            closure: RwLock::new(self.cached_closure()),
        }
    }
}

impl Entity for Cluster {
    fn position(&self) -> Position {
        self.position
    }

    fn antennas(&self) -> usize {
        0
    }

    fn kind(&self) -> EntityKind {
        EntityKind::Cluster
    }
}
