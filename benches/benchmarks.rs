//! Entitle Performance Benchmarks
//!
//! - Processor and named user computations on the fixture estate
//! - Processor aggregation as the estate grows
//! - Hybrid track evaluation

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use entitle::common::{Equipment, Product};
use entitle::engine::formula::hybrid::{combine, HostCapacity, SQL_SERVER_ENTERPRISE};
use entitle::{ComputeRequest, GraphSnapshot};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tokio::runtime::Runtime;

#[path = "../tests/common/mod.rs"]
mod common;

fn runtime() -> Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

// ============ FIXTURE ============

fn bench_fixture(c: &mut Criterion) {
    let rt = runtime();
    let fx = common::fixture();
    let mut group = c.benchmark_group("fixture");
    group.measurement_time(Duration::from_secs(5));

    for metric in ["ops_dc", "ops_dc_vcenter", "ops_cluster", "nup_dc", "sps"] {
        group.bench_with_input(BenchmarkId::new("metric", metric), &metric, |b, metric| {
            b.iter(|| {
                let request =
                    ComputeRequest::new(common::SCOPE, *metric, vec![common::P1.to_string()]);
                rt.block_on(fx.dispatcher.compute_licenses(black_box(request)))
                    .unwrap()
            });
        });
    }

    group.bench_function("aggregation", |b| {
        b.iter(|| {
            rt.block_on(fx.dispatcher.compute_licenses_for_aggregation(
                common::SCOPE,
                black_box("ops_dc"),
                "oracle-suite",
            ))
            .unwrap()
        });
    });

    group.finish();
}

// ============ SCALING ============

/// `clusters` clusters of 8 servers under 10-cluster vcenters, every other
/// server linked to the product
fn estate(clusters: usize) -> GraphSnapshot {
    let mut equipment = vec![Equipment::new("dc", "datacenter")];
    let mut linked = Vec::new();
    for v in 0..clusters.div_ceil(10) {
        equipment.push(Equipment::new(format!("v{v}"), "vcenter").with_parent("dc"));
    }
    for c in 0..clusters {
        let cluster = format!("c{c}");
        equipment.push(Equipment::new(&cluster, "cluster").with_parent(format!("v{}", c / 10)));
        for s in 0..8 {
            let server = format!("{cluster}-s{s}");
            equipment.push(
                Equipment::new(&server, "server")
                    .with_parent(&cluster)
                    .with_int("cpu", 2)
                    .with_int("cores_per_processor", 1 + s as i64)
                    .with_float("oracle_core_factor", dec!(0.25)),
            );
            if s % 2 == 0 {
                linked.push(server);
            }
        }
    }

    GraphSnapshot {
        scope: common::SCOPE.into(),
        equipment_types: common::equipment_types(),
        metrics: common::metrics(),
        equipment,
        products: vec![Product::new(common::P1).with_equipment(linked)],
        ..Default::default()
    }
}

fn bench_scaling(c: &mut Criterion) {
    let rt = runtime();
    let mut group = c.benchmark_group("scaling");
    group.measurement_time(Duration::from_secs(10));
    group.sample_size(50);

    for clusters in [10usize, 100, 1000] {
        let fx = common::from_snapshot(&estate(clusters));
        group.throughput(Throughput::Elements((clusters * 8) as u64));

        for metric in ["ops_dc", "nup_dc"] {
            group.bench_with_input(
                BenchmarkId::new(metric, clusters),
                &clusters,
                |b, _| {
                    b.iter(|| {
                        let request = ComputeRequest::new(
                            common::SCOPE,
                            metric,
                            vec![common::P1.to_string()],
                        );
                        rt.block_on(fx.dispatcher.compute_licenses(request)).unwrap()
                    });
                },
            );
        }
    }

    group.finish();
}

// ============ HYBRID ============

fn bench_hybrid(c: &mut Criterion) {
    let mut group = c.benchmark_group("hybrid");

    for hosts in [10usize, 100, 1000] {
        let mut servers = BTreeMap::new();
        let mut vms = BTreeMap::new();
        let mut placement = HashMap::new();
        let mut capacity = HashMap::new();
        for h in 0..hosts {
            let host = format!("h{h}");
            capacity.insert(host.clone(), HostCapacity::new(dec!(2), dec!(16)));
            servers.insert(format!("s{h}"), HostCapacity::new(dec!(1), dec!(8)));
            for v in 0..4 {
                let vm = format!("{host}-vm{v}");
                vms.insert(vm.clone(), Decimal::from(2 + v));
                placement.insert(vm, host.clone());
            }
        }

        group.throughput(Throughput::Elements((hosts * 5) as u64));
        group.bench_with_input(BenchmarkId::new("sql_enterprise", hosts), &hosts, |b, _| {
            b.iter(|| {
                combine(
                    black_box(&SQL_SERVER_ENTERPRISE),
                    &servers,
                    &vms,
                    &placement,
                    &capacity,
                    false,
                )
            });
        });
    }

    group.finish();
}

criterion_group!(fixture_benches, bench_fixture);

criterion_group!(scaling_benches, bench_scaling);

criterion_group!(hybrid_benches, bench_hybrid);

criterion_main!(fixture_benches, scaling_benches, hybrid_benches);
