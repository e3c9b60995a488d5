//! Benchmarks for the broadcast path
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use serde_json::{json, Value};
use std::sync::Arc;
use wsevent::websocket::{ClientHandle, Dispatcher, Envelope, Registry};
use wsevent::AcceptAll;

fn create_test_event(size: usize) -> Value {
    json!({
        "event": "test",
        "from": 1,
        "tags": (0..size).map(|i| format!("tag-{}", i)).collect::<Vec<_>>(),
    })
}

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("envelope");

    for size in [1, 16, 256] {
        let event = create_test_event(size);

        group.bench_function(format!("encode_event_{}", size), |b| {
            b.iter(|| Envelope::event(black_box(&event)).encode().unwrap())
        });
    }

    group.finish();
}

fn bench_dispatch(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let mut group = c.benchmark_group("dispatch");

    for clients in [10, 100, 1000] {
        let registry = Arc::new(Registry::new());
        let mut receivers = Vec::with_capacity(clients);

        runtime.block_on(async {
            for _ in 0..clients {
                let (client, rx) = ClientHandle::new(1024);
                registry.add(Arc::clone(&client)).await;
                registry.mark_registered(client.id(), Value::Null).await;
                receivers.push(rx);
            }
        });

        let dispatcher: Dispatcher<Value> =
            Dispatcher::new(Arc::clone(&registry), Arc::new(AcceptAll), false);
        let event = create_test_event(4);

        group.throughput(Throughput::Elements(clients as u64));
        group.bench_function(format!("fan_out_{}", clients), |b| {
            b.iter(|| {
                runtime.block_on(dispatcher.dispatch(black_box(&event)));
                // Keep queues from filling up and evicting clients
                for rx in receivers.iter_mut() {
                    while rx.try_recv().is_ok() {}
                }
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_encode, bench_dispatch);
criterion_main!(benches);
