// ─────────────────────────────────────────────────────────────────────
// netmimo — Optimizer Benchmarks
// ─────────────────────────────────────────────────────────────────────
//! Criterion benchmarks for the beamforming engine.
//!
//! Covers the per-iteration hot path:
//!   - Hermitian eigendecomposition of a coupling block
//!   - Coupling matrices for a seven-cluster network
//!   - Nested bisection for one link
//!   - Power projection for one BS
//!   - Single outer iteration and a full run

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use rand::rngs::StdRng;
use rand::SeedableRng;

use netmimo_core::{project_power, solve_link, BisectionSettings, CouplingStore, Network, UeState};
use netmimo_linalg::{ComplexMatrix, ComplexVector, HermitianEigen};
use netmimo_topology::{
    hexagonal_centres, place_random_bss, place_random_ues, ChannelConfig, Topology,
};
use netmimo_types::OptimizerConfig;

const ANTENNAS: usize = 4;

// ── Helpers ───────────────────────────────────────────────────────────

/// Seven hexagonal clusters, three 4-antenna BSs and four 2-antenna UEs each.
fn make_topology() -> Topology {
    let mut rng = StdRng::seed_from_u64(7);
    let mut topology = Topology::new(1200.0, ChannelConfig::default()).unwrap();
    for centre in hexagonal_centres(1, 1000.0) {
        let cl = topology.add_cluster(centre);
        place_random_bss(&mut topology, cl, 3, ANTENNAS, 20.0, 400.0, &mut rng).unwrap();
        place_random_ues(&mut topology, cl, 4, 2, 400.0, &mut rng).unwrap();
    }
    topology
}

fn make_network(max_iterations: usize) -> Network {
    let config = OptimizerConfig {
        max_iterations,
        ..OptimizerConfig::default()
    };
    let mut network = Network::new(make_topology(), config).unwrap();
    network.refresh().unwrap();
    network
}

/// PSD coupling block G^H G.
fn make_coupling_block() -> ComplexMatrix {
    let mut rng = StdRng::seed_from_u64(3);
    let g = ComplexMatrix::random(ANTENNAS, ANTENNAS, &mut rng);
    g.hermitian_mul(&g).unwrap()
}

// ── Linear algebra ───────────────────────────────────────────────────

fn bench_eigen_decompose(c: &mut Criterion) {
    let m = make_coupling_block();
    c.bench_function("hermitian_eigen_4x4", |b| {
        b.iter(|| HermitianEigen::decompose(black_box(&m)).unwrap())
    });
}

fn bench_coupling_compute(c: &mut Criterion) {
    let mut network = make_network(1);
    network.optimize().unwrap();
    let topology = network.topology();
    let serving: Vec<_> = topology
        .ue_ids()
        .map(|i| topology.serving_bss(i).unwrap())
        .collect();
    let ues: Vec<UeState> = topology
        .ue_ids()
        .map(|i| network.ue_state(i).unwrap().clone())
        .collect();
    c.bench_function("coupling_compute_7_clusters", |b| {
        b.iter(|| CouplingStore::compute(black_box(topology), &serving, &ues).unwrap())
    });
}

// ── Link and BS updates ──────────────────────────────────────────────

fn bench_solve_link(c: &mut Criterion) {
    let eigen = HermitianEigen::decompose(&make_coupling_block()).unwrap();
    let mut rng = StdRng::seed_from_u64(11);
    let cv = ComplexVector::random(ANTENNAS, &mut rng);
    let settings = BisectionSettings::default();
    c.bench_function("solve_link_binding_power", |b| {
        b.iter(|| solve_link(&eigen, black_box(&cv), 1e-2, 0.3, &settings).unwrap())
    });
}

fn bench_project_power(c: &mut Criterion) {
    let directions: Vec<f64> = (0..12).map(|k| (k as f64 * 0.7).sin() * 6.0 + 3.0).collect();
    c.bench_function("project_power_12_links", |b| {
        b.iter(|| project_power(black_box(&directions), 20.0, 1e-9, 1e-6, 200, 0).unwrap())
    });
}

// ── Outer loop ───────────────────────────────────────────────────────

fn bench_refresh(c: &mut Criterion) {
    c.bench_function("network_refresh_7_clusters", |b| {
        b.iter_batched(
            || Network::new(make_topology(), OptimizerConfig::default()).unwrap(),
            |mut network| network.refresh().unwrap(),
            BatchSize::SmallInput,
        )
    });
}

fn bench_single_outer_iteration(c: &mut Criterion) {
    c.bench_function("outer_iteration_7_clusters", |b| {
        b.iter_batched(
            || make_network(1),
            |mut network| network.optimize().unwrap(),
            BatchSize::SmallInput,
        )
    });
}

fn bench_full_run(c: &mut Criterion) {
    let mut group = c.benchmark_group("full_run");
    group.sample_size(10);
    group.bench_function("optimize_7_clusters", |b| {
        b.iter_batched(
            || make_network(200),
            |mut network| network.optimize().unwrap(),
            BatchSize::LargeInput,
        )
    });
    group.finish();
}

criterion_group!(linalg, bench_eigen_decompose, bench_coupling_compute,);

criterion_group!(updates, bench_solve_link, bench_project_power,);

criterion_group!(
    outer,
    bench_refresh,
    bench_single_outer_iteration,
    bench_full_run,
);

criterion_main!(linalg, updates, outer);
