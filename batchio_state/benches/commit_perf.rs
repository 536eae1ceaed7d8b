//! Data block commit and read performance benchmarks

use batchio_state::{DataArray, DataBlock, PendingEventList, SlotHandle};
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use std::time::SystemTime;

#[derive(Clone, Default)]
struct PointRecord {
    value: f64,
    stamp: Option<SystemTime>,
    label: String,
}

fn block_with(slots: usize) -> (DataBlock, Vec<SlotHandle<PointRecord>>) {
    let mut array = DataArray::new();
    let handles = (0..slots)
        .map(|_| {
            array.add(PointRecord {
                label: String::from("sensor"),
                ..PointRecord::default()
            })
        })
        .collect();
    let block = DataBlock::new("bench");
    block.create(array);
    (block, handles)
}

/// Benchmark a full open/update/commit cycle for different layout sizes
fn bench_commit(c: &mut Criterion) {
    let mut group = c.benchmark_group("commit");
    for slots in [8usize, 64, 512] {
        let (block, handles) = block_with(slots);
        let mut events = PendingEventList::with_capacity(slots);
        let mut tick = 0.0f64;

        group.bench_with_input(BenchmarkId::from_parameter(slots), &slots, |b, _| {
            b.iter(|| {
                tick += 1.0;
                let now = SystemTime::now();
                let mut sentinel = block.open();
                for handle in &handles {
                    let record = sentinel.get_mut(*handle);
                    record.value = tick;
                    record.stamp = Some(now);
                }
                sentinel.commit(now, &mut events);
            });
        });
    }
    group.finish();
}

/// Benchmark reading one record from the committed snapshot
fn bench_read(c: &mut Criterion) {
    let (block, handles) = block_with(64);
    let handle = handles[32];

    c.bench_function("read_single_slot", |b| {
        b.iter(|| black_box(block.read(handle, |record| record.value)));
    });

    c.bench_function("snapshot_all_slots", |b| {
        b.iter(|| {
            let snapshot = block.snapshot();
            let total: usize = handles
                .iter()
                .filter_map(|handle| snapshot.get(*handle))
                .map(|record| record.label.len())
                .sum();
            black_box(total)
        });
    });
}

criterion_group!(benches, bench_commit, bench_read);
criterion_main!(benches);
