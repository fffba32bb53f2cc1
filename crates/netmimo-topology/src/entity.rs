// ─────────────────────────────────────────────────────────────────────
// netmimo — Network Entities
// ─────────────────────────────────────────────────────────────────────

use std::fmt;

use serde::{Deserialize, Serialize};

/// Handle of a base station inside its `Topology`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BsId(pub usize);

/// Handle of a user equipment inside its `Topology`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UeId(pub usize);

/// Handle of a cluster inside its `Topology`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClusterId(pub usize);

impl fmt::Display for BsId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bs{}", self.0)
    }
}

impl fmt::Display for UeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ue{}", self.0)
    }
}

impl fmt::Display for ClusterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cluster{}", self.0)
    }
}

/// Point in the plane (metres).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Position) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    pub fn offset(&self, dx: f64, dy: f64) -> Position {
        Position::new(self.x + dx, self.y + dy)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    BaseStation,
    Cluster,
    Ue,
}

impl EntityKind {
    pub fn name(&self) -> &'static str {
        match self {
            EntityKind::BaseStation => "base station",
            EntityKind::Cluster => "cluster",
            EntityKind::Ue => "ue",
        }
    }
}

/// Anything placed in the network.
pub trait Entity {
    fn position(&self) -> Position;
    fn antennas(&self) -> usize;
    fn kind(&self) -> EntityKind;

    fn distance_to(&self, other: &dyn Entity) -> f64 {
        self.position().distance(&other.position())
    }
}

/// Multi-antenna transmitter with a total power budget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaseStation {
    pub position: Position,
    pub antennas: usize,
    pub power_budget: f64,
    pub cluster: ClusterId,
}

/// Multi-antenna receiver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserEquipment {
    pub position: Position,
    pub antennas: usize,
    pub cluster: ClusterId,
}

impl Entity for BaseStation {
    fn position(&self) -> Position {
        self.position
    }

    fn antennas(&self) -> usize {
        self.antennas
    }

    fn kind(&self) -> EntityKind {
        EntityKind::BaseStation
    }
}

impl Entity for UserEquipment {
    fn position(&self) -> Position {
        self.position
    }

    fn antennas(&self) -> usize {
        self.antennas
    }

    fn kind(&self) -> EntityKind {
        EntityKind::Ue
    }
}
