//! Benchmarks for Canopy tree placement
//!
//! Measures performance of:
//! - Unrestricted level-order slot search
//! - Brand-owner search over customer-heavy trees
//! - Full-walk leg sums

use canopy_topology::{
    find_slot, BrandOwnerSlot, IdAllocator, Node, OpenSlot, Role, Scope, Side, Tree,
};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

/// Complete tree of `count` customers under `founders` roots.
fn filled_tree(founders: usize, count: usize) -> Tree {
    let mut tree = Tree::new();
    let mut ids = IdAllocator::new();
    for _ in 0..founders {
        let id = ids.allocate(Role::Founder).unwrap();
        tree.insert_root(Node::new(id, "founder", "founder")).unwrap();
    }
    for _ in 0..count {
        let slot = find_slot(&tree, Scope::Everywhere, &OpenSlot).unwrap();
        let id = ids.allocate(Role::Customer).unwrap();
        tree.attach(&slot.parent, slot.side, Node::new(id, "c", "c")).unwrap();
    }
    tree
}

fn bench_open_slot(c: &mut Criterion) {
    let mut group = c.benchmark_group("find_open_slot");

    for &size in &[10usize, 100, 1_000, 10_000] {
        let tree = filled_tree(1, size);
        group.throughput(Throughput::Elements(1));
        group.bench_with_input(BenchmarkId::from_parameter(size), &tree, |b, tree| {
            b.iter(|| find_slot(black_box(tree), Scope::Everywhere, &OpenSlot))
        });
    }
    group.finish();
}

fn bench_brand_owner_slot(c: &mut Criterion) {
    let mut group = c.benchmark_group("find_brand_owner_slot");

    for &size in &[10usize, 100, 1_000, 10_000] {
        let tree = filled_tree(3, size);
        group.throughput(Throughput::Elements(1));
        group.bench_with_input(BenchmarkId::from_parameter(size), &tree, |b, tree| {
            b.iter(|| find_slot(black_box(tree), Scope::Everywhere, &BrandOwnerSlot))
        });
    }
    group.finish();
}

fn bench_leg_sum(c: &mut Criterion) {
    let mut group = c.benchmark_group("leg_sum_full_walk");

    for &size in &[100usize, 1_000, 10_000] {
        let tree = filled_tree(1, size);
        let root = tree.roots()[0].clone();
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &tree, |b, tree| {
            b.iter(|| tree.leg_sum(black_box(&root), Side::Left, |n| n.depth as u64))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_open_slot, bench_brand_owner_slot, bench_leg_sum);
criterion_main!(benches);
