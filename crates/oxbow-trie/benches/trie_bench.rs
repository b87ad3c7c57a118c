//! Trie benchmarks.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use oxbow_trie::Trie;

fn trie_put_benchmark(c: &mut Criterion) {
    c.bench_function("trie_put_1000", |b| {
        b.iter(|| {
            let mut trie = Trie::new();
            for i in 0u32..1000 {
                trie = trie.put(format!("key{i}").as_bytes(), i);
            }
            black_box(trie)
        })
    });
}

fn trie_get_benchmark(c: &mut Criterion) {
    let mut trie = Trie::new();
    for i in 0u32..1000 {
        trie = trie.put(format!("key{i}").as_bytes(), i);
    }

    c.bench_function("trie_get_1000", |b| {
        b.iter(|| {
            for i in 0u32..1000 {
                black_box(trie.get::<u32>(format!("key{i}").as_bytes()));
            }
        })
    });
}

fn trie_snapshot_benchmark(c: &mut Criterion) {
    let mut trie = Trie::new();
    for i in 0u32..1000 {
        trie = trie.put(format!("key{i}").as_bytes(), i);
    }

    // One put on a large trie: cost should track key length, not trie size.
    c.bench_function("trie_put_on_1000", |b| {
        b.iter(|| black_box(trie.put(b"key500", 0u32)))
    });
}

criterion_group!(
    benches,
    trie_put_benchmark,
    trie_get_benchmark,
    trie_snapshot_benchmark
);
criterion_main!(benches);
