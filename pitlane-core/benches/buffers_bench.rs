#[macro_use]
extern crate criterion;

use criterion::Criterion;

use pitlane_core::buffers::RingBuffer;
use pitlane_core::queue::CategoryQueue;

fn bench_ring_insert_snapshot(c: &mut Criterion) {
    let mut group = c.benchmark_group("ring_buffer");

    for capacity in [50, 150, 1800] {
        group.throughput(criterion::Throughput::Elements(capacity as u64));
        group.bench_function(format!("insert_snapshot_{}", capacity), |b| {
            let mut ring = RingBuffer::with_capacity(capacity).unwrap();
            let row = [0.0f64; 10];
            b.iter(|| {
                for _ in 0..capacity {
                    ring.insert(row);
                }
                ring.snapshot()
            });
        });
    }
    group.finish();
}

fn bench_queue_drop_oldest(c: &mut Criterion) {
    let mut group = c.benchmark_group("category_queue");

    for capacity in [128, 1000, 16384] {
        group.bench_function(format!("enqueue_full_{}", capacity), |b| {
            let queue = CategoryQueue::with_capacity("carTelemetry", capacity).unwrap();
            for i in 0..capacity {
                queue.enqueue(i).unwrap();
            }
            b.iter(|| queue.enqueue(0).unwrap());
        });
    }
    group.finish();
}

criterion_group!(benches, bench_ring_insert_snapshot, bench_queue_drop_oldest);
criterion_main!(benches);
