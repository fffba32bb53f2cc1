// ─────────────────────────────────────────────────────────────────────
// netmimo — Path-Loss Channel Model and Channel Cache
// ─────────────────────────────────────────────────────────────────────
//! Rayleigh-faded MIMO channels with distance-dependent path loss.
//!
//! Entry (r, t) of the channel from a transmitter with T antennas to a
//! receiver with R antennas is CN(0, 1)·sqrt(gain(d)), where
//!
//!   gain(d) = (max(d, floor) / reference)^(−exponent) · 10^(X/10)
//!
//! and X is optional log-normal shadowing in dB.

use std::collections::HashMap;

use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

use netmimo_linalg::{complex_gaussian, ComplexMatrix};
use netmimo_types::{NetError, NetResult};

use crate::entity::{BsId, Entity, UeId};

/// Large-scale fading parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Path-loss exponent.
    /// Default: 3.5.
    pub path_loss_exponent: f64,

    /// Distance at which the gain is 1.
    /// Default: 1000.0.
    pub reference_distance: f64,

    /// Distances below this are clamped to it.
    /// Default: 35.0.
    pub floor_distance: f64,

    /// Standard deviation of log-normal shadowing in dB (0 disables it).
    /// Default: 0.0.
    pub shadowing_std_db: f64,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            path_loss_exponent: 3.5,
            reference_distance: 1000.0,
            floor_distance: 35.0,
            shadowing_std_db: 0.0,
        }
    }
}

impl ChannelConfig {
    pub fn validate(&self) -> NetResult<()> {
        if !(self.path_loss_exponent >= 0.0 && self.path_loss_exponent.is_finite()) {
            return Err(NetError::Config(format!(
                "path_loss_exponent must be finite and >= 0, got {}",
                self.path_loss_exponent
            )));
        }
        if !(self.reference_distance > 0.0 && self.reference_distance.is_finite()) {
            return Err(NetError::Config(format!(
                "reference_distance must be finite and > 0, got {}",
                self.reference_distance
            )));
        }
        if !(self.floor_distance > 0.0 && self.floor_distance.is_finite()) {
            return Err(NetError::Config(format!(
                "floor_distance must be finite and > 0, got {}",
                self.floor_distance
            )));
        }
        if !(self.shadowing_std_db >= 0.0 && self.shadowing_std_db.is_finite()) {
            return Err(NetError::Config(format!(
                "shadowing_std_db must be finite and >= 0, got {}",
                self.shadowing_std_db
            )));
        }
        Ok(())
    }
}

/// Draws channel matrices according to a `ChannelConfig`.
#[derive(Debug, Clone)]
pub struct ChannelModel {
    config: ChannelConfig,
    shadowing: Option<Normal<f64>>,
}

impl ChannelModel {
    pub fn new(config: ChannelConfig) -> NetResult<Self> {
        config.validate()?;
        let shadowing = if config.shadowing_std_db > 0.0 {
            Some(
                Normal::new(0.0, config.shadowing_std_db)
                    .map_err(|e| NetError::Config(format!("shadowing: {e}")))?,
            )
        } else {
            None
        };
        Ok(Self { config, shadowing })
    }

    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    /// Deterministic path-loss part of the gain.
    pub fn path_loss(&self, distance: f64) -> f64 {
        let d = distance.max(self.config.floor_distance);
        (d / self.config.reference_distance).powf(-self.config.path_loss_exponent)
    }

    /// Path loss times one shadowing draw.
    pub fn gain<R: Rng + ?Sized>(&self, distance: f64, rng: &mut R) -> f64 {
        let pl = self.path_loss(distance);
        match &self.shadowing {
            Some(normal) => pl * 10f64.powf(normal.sample(rng) / 10.0),
            None => pl,
        }
    }

    /// Channel from `tx` to `rx`: an rx.antennas × tx.antennas matrix.
    pub fn generate_channel<R: Rng + ?Sized>(
        &self,
        tx: &dyn Entity,
        rx: &dyn Entity,
        rng: &mut R,
    ) -> NetResult<ComplexMatrix> {
        if tx.kind() == rx.kind() {
            return Err(NetError::SameKindChannel(tx.kind().name()));
        }
        let amplitude = self.gain(tx.distance_to(rx), rng).sqrt();
        let mut h = ComplexMatrix::zeros(rx.antennas(), tx.antennas());
        for r in 0..rx.antennas() {
            for t in 0..tx.antennas() {
                h.set(r, t, complex_gaussian(rng) * amplitude);
            }
        }
        Ok(h)
    }
}

/// Cached BS → UE channel matrices.
#[derive(Debug, Clone, Default)]
pub struct ChannelStore {
    channels: HashMap<(BsId, UeId), ComplexMatrix>,
}

impl ChannelStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, bs: BsId, ue: UeId) -> Option<&ComplexMatrix> {
        self.channels.get(&(bs, ue))
    }

    pub fn contains(&self, bs: BsId, ue: UeId) -> bool {
        self.channels.contains_key(&(bs, ue))
    }

    pub fn insert(&mut self, bs: BsId, ue: UeId, h: ComplexMatrix) {
        self.channels.insert((bs, ue), h);
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn clear(&mut self) {
        self.channels.clear();
    }
}
