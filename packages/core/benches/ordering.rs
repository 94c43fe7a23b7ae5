//! Performance benchmarks for the dense order engine
//!
//! Run with: `cargo bench -p pagetree-core`
//!
//! These benchmarks measure critical path performance:
//! - Order computations over large page snapshots (pure, no I/O)
//! - A full façade move against the in-process store (read + batch write)

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use pagetree_core::config::EditorConfig;
use pagetree_core::db::{DenseOrderCalculator, Direction, MemoryStore};
use pagetree_core::models::{AccessPolicy, OrderEntry, RecordRef, TemplateRegistry};
use pagetree_core::services::BlockService;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tokio::runtime::Runtime;

/// `groups` page groups of `per_group` children each
fn generate_keys(groups: u32, per_group: u32) -> Vec<(String, u32, u32)> {
    (0..groups)
        .flat_map(|page| (0..per_group).map(move |nested| (format!("k{}-{}", page, nested), page, nested)))
        .collect()
}

fn entries(keys: &[(String, u32, u32)]) -> Vec<OrderEntry<'_>> {
    keys.iter()
        .map(|(key, page, nested)| OrderEntry::new(key, *page, *nested))
        .collect()
}

fn bench_engine(c: &mut Criterion) {
    let mut group = c.benchmark_group("dense_order_engine");

    for size in [10u32, 100, 1000] {
        let keys = generate_keys(size, 5);
        let snapshot = entries(&keys);
        let middle = OrderEntry::new(&keys[2].0, 0, 2);

        group.bench_with_input(BenchmarkId::new("shift_page_orders", size), &snapshot, |b, s| {
            b.iter(|| DenseOrderCalculator::shift_page_orders(black_box(s), size / 2, Direction::Down))
        });
        group.bench_with_input(BenchmarkId::new("swap_nested_order", size), &snapshot, |b, s| {
            b.iter(|| DenseOrderCalculator::swap_nested_order(black_box(s), &middle, Direction::Up))
        });
        group.bench_with_input(BenchmarkId::new("close_page_gap", size), &snapshot, |b, s| {
            b.iter(|| DenseOrderCalculator::close_page_gap(black_box(s), 0))
        });
        group.bench_with_input(BenchmarkId::new("density_violations", size), &snapshot, |b, s| {
            b.iter(|| DenseOrderCalculator::density_violations(black_box(s)))
        });
    }

    group.finish();
}

/// Measures one `move_child` round trip (fresh read, engine, guarded batch write)
fn bench_facade_move(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    const ROOT: &str = "pages/homepage/components";

    let mut components = Map::new();
    for (key, page, nested) in generate_keys(50, 10) {
        components.insert(
            key,
            json!({ "pageOrder": page, "nestedOrder": nested, "data": { "type": "event" } }),
        );
    }
    let store = MemoryStore::from_value(json!({
        "pages": { "homepage": { "components": Value::Object(components) } }
    }))
    .unwrap();
    let service = BlockService::new(
        Arc::new(store),
        Arc::new(TemplateRegistry::with_defaults()),
        EditorConfig::default(),
    )
    .with_policy(AccessPolicy::editor("bench"));

    // Alternating down/up keeps the tree unchanged between iterations
    let mut direction = Direction::Down;
    c.bench_function("move_child_round_trip", |b| {
        b.iter(|| {
            rt.block_on(async {
                let record = RecordRef::new(ROOT, "k25-4", 25, 0);
                let moved = service.move_child(&record, direction).await.unwrap();
                black_box(moved);
            });
            direction = direction.opposite();
        })
    });
}

criterion_group!(benches, bench_engine, bench_facade_move);
criterion_main!(benches);
