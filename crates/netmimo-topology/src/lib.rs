// ─────────────────────────────────────────────────────────────────────
// netmimo — Network Topology
// (C) 1998-2026 Miroslav Sotek. All rights reserved.
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
#![deny(unsafe_code)]
//! Where things are and how they hear each other.
//!
//! Base stations and user equipments live in clusters. Two clusters
//! cooperate when their centres are closer than the closure distance;
//! a UE is served by every BS whose cluster lies in the closure of its
//! own. Channels between BSs and UEs are drawn from a path-loss model
//! and cached until mobility invalidates them.

pub mod channel;
pub mod cluster;
pub mod entity;
pub mod layout;
pub mod topology;

pub use channel::{ChannelConfig, ChannelModel, ChannelStore};
pub use cluster::Cluster;
pub use entity::{BaseStation, BsId, ClusterId, Entity, EntityKind, Position, UeId, UserEquipment};
pub use layout::{brownian_motion, hexagonal_centres, place_random_bss, place_random_ues};
pub use topology::Topology;
