use criterion::{Criterion, black_box, criterion_group, criterion_main};
use ketchsql::{FrequentItemsSketch, HllSketch, QuantilesSketch, TDigest, ThetaSketch, ThetaUnion};

fn bench_quantiles_update(c: &mut Criterion) {
    c.bench_function("quantiles_update_10k", |b| {
        b.iter(|| {
            let mut sketch = QuantilesSketch::<i64>::new(200);
            for i in 0..10_000 {
                sketch.update(black_box(i));
            }
            sketch.num_retained()
        })
    });
}

fn bench_tdigest_update(c: &mut Criterion) {
    c.bench_function("tdigest_update_10k", |b| {
        b.iter(|| {
            let mut digest = TDigest::new(100);
            for i in 0..10_000 {
                digest.add(black_box(i as f64));
            }
            digest.total_weight()
        })
    });
}

fn bench_hll_update(c: &mut Criterion) {
    c.bench_function("hll_update_10k", |b| {
        b.iter(|| {
            let mut sketch = HllSketch::new(12);
            for i in 0..10_000u64 {
                sketch.update(&black_box(i));
            }
            sketch.estimate()
        })
    });
}

fn bench_theta_union(c: &mut Criterion) {
    let mut sketches = Vec::new();
    for partition in 0..16u64 {
        let mut sketch = ThetaSketch::new(12);
        for i in 0..5_000 {
            sketch.update(&(partition * 5_000 + i));
        }
        sketches.push(sketch);
    }
    c.bench_function("theta_union_16x5k", |b| {
        b.iter(|| {
            let mut union = ThetaUnion::new(12);
            for sketch in &sketches {
                union.update(black_box(sketch));
            }
            union.result().estimate()
        })
    });
}

fn bench_serialize_round_trip(c: &mut Criterion) {
    let mut sketch = FrequentItemsSketch::new(10);
    for i in 0..50_000 {
        sketch.update(&format!("item-{}", i % 2_000));
    }
    c.bench_function("freq_serialize_deserialize", |b| {
        b.iter(|| {
            let blob = sketch.serialize();
            FrequentItemsSketch::deserialize(black_box(&blob)).unwrap().total_weight()
        })
    });
}

criterion_group!(
    benches,
    bench_quantiles_update,
    bench_tdigest_update,
    bench_hll_update,
    bench_theta_union,
    bench_serialize_round_trip
);
criterion_main!(benches);
