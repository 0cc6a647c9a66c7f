//! Criterion benchmark untuk SharedHandle dan MappedRegion
//!
//! Run dengan: cargo bench

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use memshare::{MappedRegion, SharedHandle};

fn bench_handle(c: &mut Criterion) {
    let mut group = c.benchmark_group("shared_handle");
    group.throughput(Throughput::Elements(1));

    // Benchmark duplicate + close (tidak pernah sampai release)
    group.bench_function("duplicate_close", |b| {
        let origin = SharedHandle::new(0u64);
        b.iter(|| {
            let dup = origin.duplicate();
            black_box(dup.close()).ok();
        });
    });

    // Benchmark create + release cycle
    group.bench_function("create_release", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let handle = SharedHandle::with_release(black_box(i), |_| Ok(()));
            black_box(handle.close()).ok();
            i = i.wrapping_add(1);
        });
    });

    // Benchmark close pada alias yang sudah closed (fast path CAS gagal)
    group.bench_function("close_idempotent", |b| {
        let origin = SharedHandle::new(0u64);
        let _keep = origin.duplicate();
        origin.close().ok();
        b.iter(|| {
            black_box(origin.close()).ok();
        });
    });

    group.finish();
}

fn bench_region(c: &mut Criterion) {
    let mut group = c.benchmark_group("mapped_region");

    for size in [64usize, 4096, 1 << 20].iter() {
        let data = vec![0xABu8; *size];
        group.throughput(Throughput::Bytes(*size as u64));
        group.bench_function(format!("from_bytes_{}", size), |b| {
            b.iter(|| {
                let region = MappedRegion::from_bytes(black_box(&data), None).unwrap();
                region.close().unwrap();
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_handle, bench_region);
criterion_main!(benches);
