#![allow(clippy::all)]
//! Benchmarks for the map-matching scan.
//!
//! Tests: full-table scans at a few table sizes, with wildcard and exact
//! filters, and the worst case where nothing matches.

use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;
use std::net::Ipv4Addr;
use udp_repeater::repeater::{Map, RoutingTable};

fn build_table(maps: usize) -> RoutingTable {
    let mut table = RoutingTable::new();
    for i in 0..maps {
        // Spread rules across eight listeners with a mix of exact and
        // wildcard filters.
        let listener_id = (i % 8) as u32 + 1;
        let (src_address, src_port) = if i % 3 == 0 {
            (Ipv4Addr::UNSPECIFIED, 0)
        } else {
            (
                Ipv4Addr::new(10, 0, (i % 256) as u8, 1),
                5000 + (i % 1000) as u16,
            )
        };
        table.push(Map {
            listener_id,
            src_address,
            src_port,
            target_id: i as u32 + 1,
        });
    }
    table
}

fn bench_match_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("repeater/match_scan");

    for &size in &[8usize, 64, 512] {
        let table = build_table(size);
        let source = Ipv4Addr::new(10, 0, 3, 1);

        group.bench_function(format!("scan_{size}_maps"), |b| {
            b.iter(|| {
                let hits: usize = table
                    .matching(black_box(1), black_box(source), black_box(5003))
                    .count();
                black_box(hits);
            });
        });

        group.bench_function(format!("scan_{size}_maps_no_match"), |b| {
            b.iter(|| {
                // Listener id 9 never appears in the table.
                let hits: usize = table
                    .matching(black_box(9), black_box(source), black_box(5003))
                    .count();
                black_box(hits);
            });
        });
    }

    group.finish();
}

fn bench_single_map(c: &mut Criterion) {
    let mut group = c.benchmark_group("repeater/map");
    let wildcard = Map {
        listener_id: 1,
        src_address: Ipv4Addr::UNSPECIFIED,
        src_port: 0,
        target_id: 1,
    };
    let exact = Map {
        listener_id: 1,
        src_address: Ipv4Addr::new(192, 168, 1, 50),
        src_port: 6000,
        target_id: 1,
    };
    let source = Ipv4Addr::new(192, 168, 1, 50);

    group.bench_function("matches_wildcard", |b| {
        b.iter(|| black_box(wildcard.matches(black_box(1), black_box(source), black_box(6000))));
    });

    group.bench_function("matches_exact", |b| {
        b.iter(|| black_box(exact.matches(black_box(1), black_box(source), black_box(6000))));
    });

    group.finish();
}

criterion_group!(benches, bench_match_scan, bench_single_map);
criterion_main!(benches);
