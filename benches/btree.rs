use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use pagedb::{BPlusTree, BTreeOptions, BufferPoolManager, DiskManager};
use tempfile::{tempdir, TempDir};

const KEYS: u64 = 10_000;

fn open_tree(pool_size: usize) -> (TempDir, BPlusTree<u64, u64>) {
    let dir = tempdir().unwrap();
    let dm = DiskManager::create(dir.path().join("bench.db")).unwrap();
    let bpm = Arc::new(BufferPoolManager::new(pool_size, 2, dm).unwrap());
    let tree = BPlusTree::new("bench", bpm, BTreeOptions::max_for::<u64, u64>()).unwrap();
    (dir, tree)
}

fn filled_tree(pool_size: usize) -> (TempDir, BPlusTree<u64, u64>) {
    let (dir, tree) = open_tree(pool_size);
    for k in 0..KEYS {
        tree.insert(&k, &k).unwrap();
    }
    (dir, tree)
}

fn bench_insert(c: &mut Criterion) {
    c.bench_function("insert_10k_sequential", |b| {
        b.iter_batched(
            || open_tree(256),
            |(_dir, tree)| {
                for k in 0..KEYS {
                    tree.insert(black_box(&k), &k).unwrap();
                }
            },
            BatchSize::PerIteration,
        )
    });
}

fn bench_get(c: &mut Criterion) {
    let (_dir, tree) = filled_tree(256);
    let mut k = 0u64;
    c.bench_function("get_hit", |b| {
        b.iter(|| {
            k = (k + 7_919) % KEYS;
            black_box(tree.get(black_box(&k)).unwrap())
        })
    });

    // Pool far smaller than the tree, so lookups go to disk.
    let (_dir, cold) = filled_tree(8);
    c.bench_function("get_small_pool", |b| {
        b.iter(|| {
            k = (k + 7_919) % KEYS;
            black_box(cold.get(black_box(&k)).unwrap())
        })
    });
}

fn bench_scan(c: &mut Criterion) {
    let (_dir, tree) = filled_tree(256);
    c.bench_function("scan_10k", |b| {
        b.iter(|| {
            let sum: u64 = tree.iter().unwrap().map(|r| r.unwrap().1).sum();
            black_box(sum)
        })
    });
}

criterion_group!(benches, bench_insert, bench_get, bench_scan);
criterion_main!(benches);
