// ─────────────────────────────────────────────────────────────────────
// netmimo — Layouts and Mobility
// ─────────────────────────────────────────────────────────────────────
//! Seeded random placement around cluster centres, hexagonal cluster
//! grids and Brownian mobility.

use std::f64::consts::{PI, TAU};

use rand::Rng;
use rand_distr::{Distribution, Normal};

use netmimo_types::{NetError, NetResult};

use crate::entity::{BsId, ClusterId, Position, UeId};
use crate::topology::Topology;

/// Uniform point in the disc of `radius` around `centre`.
fn uniform_in_disc<R: Rng + ?Sized>(centre: Position, radius: f64, rng: &mut R) -> Position {
    let r = radius * rng.gen::<f64>().sqrt();
    let angle = TAU * rng.gen::<f64>();
    centre.offset(r * angle.cos(), r * angle.sin())
}

fn check_radius(radius: f64) -> NetResult<()> {
    if !(radius >= 0.0 && radius.is_finite()) {
        return Err(NetError::Config(format!(
            "placement radius must be finite and >= 0, got {radius}"
        )));
    }
    Ok(())
}

/// Drop `count` base stations uniformly in a disc around the cluster centre.
pub fn place_random_bss<R: Rng + ?Sized>(
    topology: &mut Topology,
    cluster: ClusterId,
    count: usize,
    antennas: usize,
    power_budget: f64,
    radius: f64,
    rng: &mut R,
) -> NetResult<Vec<BsId>> {
    check_radius(radius)?;
    let centre = topology.cluster(cluster)?.position;
    (0..count)
        .map(|_| {
            let p = uniform_in_disc(centre, radius, rng);
            topology.add_base_station(cluster, p, antennas, power_budget)
        })
        .collect()
}

/// Drop `count` UEs uniformly in a disc around the cluster centre.
pub fn place_random_ues<R: Rng + ?Sized>(
    topology: &mut Topology,
    cluster: ClusterId,
    count: usize,
    antennas: usize,
    radius: f64,
    rng: &mut R,
) -> NetResult<Vec<UeId>> {
    check_radius(radius)?;
    let centre = topology.cluster(cluster)?.position;
    (0..count)
        .map(|_| {
            let p = uniform_in_disc(centre, radius, rng);
            topology.add_ue(cluster, p, antennas)
        })
        .collect()
}

/// Centres of a hexagonal grid: the origin, then `rings` rings of
/// 6·k cells each, neighbours `spacing` apart.
pub fn hexagonal_centres(rings: usize, spacing: f64) -> Vec<Position> {
    // Axial directions, walked in order around a ring.
    const DIRECTIONS: [(i64, i64); 6] = [(1, 0), (1, -1), (0, -1), (-1, 0), (-1, 1), (0, 1)];
    let to_xy = |q: i64, r: i64| {
        let (q, r) = (q as f64, r as f64);
        Position::new(spacing * (q + r / 2.0), spacing * r * (PI / 3.0).sin())
    };

    let mut out = vec![Position::new(0.0, 0.0)];
    for k in 1..=rings as i64 {
        let (mut q, mut r) = (-k, k);
        for (dq, dr) in DIRECTIONS {
            for _ in 0..k {
                out.push(to_xy(q, r));
                q += dq;
                r += dr;
            }
        }
    }
    out
}

/// Move every BS and UE by a Gaussian step, keeping each within
/// `radius` of its cluster centre, then drop the channel and closure
/// caches.
pub fn brownian_motion<R: Rng + ?Sized>(
    topology: &mut Topology,
    radius: f64,
    step_std: f64,
    rng: &mut R,
) -> NetResult<()> {
    check_radius(radius)?;
    let step = Normal::new(0.0, step_std)
        .map_err(|e| NetError::Config(format!("brownian step: {e}")))?;

    let centres: Vec<Position> = topology.clusters.iter().map(|c| c.position).collect();
    let mut walk = |position: &mut Position, centre: Position| {
        let moved = position.offset(step.sample(rng), step.sample(rng));
        let d = moved.distance(&centre);
        *position = if d > radius && d > 0.0 {
            let k = radius / d;
            Position::new(
                centre.x + (moved.x - centre.x) * k,
                centre.y + (moved.y - centre.y) * k,
            )
        } else {
            moved
        };
    };
    for bs in topology.bss.iter_mut() {
        walk(&mut bs.position, centres[bs.cluster.0]);
    }
    for ue in topology.ues.iter_mut() {
        walk(&mut ue.position, centres[ue.cluster.0]);
    }

    log::debug!(
        "brownian step σ={step_std}: moved {} bss / {} ues, caches dropped",
        topology.num_bss(),
        topology.num_ues()
    );
    topology.invalidate_channels();
    topology.invalidate_closures();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::ChannelConfig;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_hexagon_spacing() {
        let centres = hexagonal_centres(1, 1.0);
        assert_eq!(centres.len(), 7);
        for c in &centres[1..] {
            let d = c.distance(&centres[0]);
            assert!((d - 1.0).abs() < 1e-12, "ring cell at distance {d}");
        }
        // Consecutive ring cells are neighbours too.
        for k in 1..6 {
            let d = centres[k].distance(&centres[k + 1]);
            assert!((d - 1.0).abs() < 1e-12, "cells {k}/{} at {d}", k + 1);
        }
        assert_eq!(hexagonal_centres(2, 500.0).len(), 19);
        assert_eq!(hexagonal_centres(0, 1.0).len(), 1);
    }

    #[test]
    fn test_random_placement_stays_in_disc() {
        let mut topo = Topology::new(1000.0, ChannelConfig::default()).unwrap();
        let cl = topo.add_cluster(Position::new(-1750.0, -1000.0));
        let mut rng = StdRng::seed_from_u64(9);
        let bss = place_random_bss(&mut topo, cl, 5, 4, 20.0, 900.0, &mut rng).unwrap();
        let ues = place_random_ues(&mut topo, cl, 3, 2, 900.0, &mut rng).unwrap();
        assert_eq!(bss.len(), 5);
        assert_eq!(ues.len(), 3);
        let centre = topo.cluster(cl).unwrap().position;
        for id in bss {
            assert!(topo.bs(id).unwrap().position.distance(&centre) <= 900.0);
        }
        for id in ues {
            assert!(topo.ue(id).unwrap().position.distance(&centre) <= 900.0);
        }
        assert_eq!(topo.cluster(cl).unwrap().ues().len(), 3);
    }

    #[test]
    fn test_placement_is_seeded() {
        let build = || {
            let mut topo = Topology::new(1000.0, ChannelConfig::default()).unwrap();
            let cl = topo.add_cluster(Position::new(0.0, 0.0));
            let mut rng = StdRng::seed_from_u64(77);
            place_random_ues(&mut topo, cl, 4, 1, 100.0, &mut rng).unwrap();
            topo.ue(UeId(3)).unwrap().position
        };
        assert_eq!(build(), build());
    }

    #[test]
    fn test_brownian_motion_invalidates_caches() {
        let mut topo = Topology::new(1000.0, ChannelConfig::default()).unwrap();
        let cl = topo.add_cluster(Position::new(0.0, 0.0));
        let mut rng = StdRng::seed_from_u64(4);
        let bss = place_random_bss(&mut topo, cl, 2, 2, 10.0, 200.0, &mut rng).unwrap();
        let ues = place_random_ues(&mut topo, cl, 2, 1, 200.0, &mut rng).unwrap();
        topo.ensure_channel(bss[0], ues[0], &mut rng).unwrap();
        topo.closure(cl).unwrap();
        let before = topo.ue(ues[1]).unwrap().position;

        brownian_motion(&mut topo, 200.0, 50.0, &mut rng).unwrap();

        assert!(topo.channels().is_empty());
        assert!(!topo.cluster(cl).unwrap().has_cached_closure());
        assert_ne!(topo.ue(ues[1]).unwrap().position, before);
        for id in topo.ue_ids().collect::<Vec<_>>() {
            let d = topo.ue(id).unwrap().position.distance(&Position::new(0.0, 0.0));
            assert!(d <= 200.0 + 1e-9, "ue {id} escaped to {d}");
        }
    }

    #[test]
    fn test_negative_radius_rejected() {
        let mut topo = Topology::new(1000.0, ChannelConfig::default()).unwrap();
        let cl = topo.add_cluster(Position::new(0.0, 0.0));
        let mut rng = StdRng::seed_from_u64(4);
        assert!(place_random_ues(&mut topo, cl, 1, 1, -1.0, &mut rng).is_err());
    }
}
