//! Latency benchmarks for Ephemera.
//!
//! These benchmarks focus on the per-message and per-connection paths.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use ephemera_core::{ConnectParams, Relay};
use ephemera_transport::{drive, pair, DriverConfig};
use std::sync::Arc;
use std::time::Instant;

/// Benchmark a full session lifecycle: connect, join, leave.
fn bench_session_lifecycle(c: &mut Criterion) {
    let mut group = c.benchmark_group("session_lifecycle");

    group.bench_function("empty_room", |b| {
        let relay = Relay::new();
        b.iter(|| {
            let (session, _outbound) = relay.connect(ConnectParams::new("lobby", "alice"));
            session.on_open();
            session.on_close()
        });
    });

    group.bench_function("ten_listeners", |b| {
        let relay = Relay::new();
        let mut listeners: Vec<_> = (0..10)
            .map(|i| {
                let (session, outbound) =
                    relay.connect(ConnectParams::new("lobby", format!("listener-{i}")));
                session.on_open();
                (session, outbound)
            })
            .collect();

        b.iter(|| {
            let (session, _outbound) = relay.connect(ConnectParams::new("lobby", "alice"));
            session.on_open();
            session.on_close();
            for (_, outbound) in &mut listeners {
                while outbound.try_recv().is_some() {}
            }
        });
    });

    group.finish();
}

/// Benchmark publish from one session to receipt by another.
fn bench_publish_latency(c: &mut Criterion) {
    let mut group = c.benchmark_group("publish_latency");

    group.bench_function("one_peer", |b| {
        b.iter_custom(|iters| {
            let relay = Relay::new();
            let (alice, _alice_out) = relay.connect(ConnectParams::new("lobby", "alice"));
            let (bob, mut bob_out) = relay.connect(ConnectParams::new("lobby", "bob"));
            alice.on_open();
            bob.on_open();
            while bob_out.try_recv().is_some() {}

            let start = Instant::now();
            for _ in 0..iters {
                alice.on_message(black_box("hello"));
                black_box(bob_out.try_recv());
            }
            start.elapsed()
        });
    });

    group.finish();
}

/// Benchmark a message through the driver over an in-memory link.
fn bench_driver_round_trip(c: &mut Criterion) {
    let mut group = c.benchmark_group("driver_round_trip");
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();

    group.bench_function("echo", |b| {
        b.iter_custom(|iters| {
            runtime.block_on(async {
                let relay = Arc::new(Relay::new());
                let (conn, mut client) = pair(64);
                let (session, outbound) = relay.connect(ConnectParams::new("lobby", "alice"));
                let task = tokio::spawn(async move {
                    drive(conn, session, outbound, &DriverConfig::default()).await
                });
                client.recv().await;

                let start = Instant::now();
                for _ in 0..iters {
                    client.send("ping").await.unwrap();
                    black_box(client.recv().await);
                }
                let elapsed = start.elapsed();

                client.disconnect();
                let _ = task.await;
                elapsed
            })
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_session_lifecycle,
    bench_publish_latency,
    bench_driver_round_trip,
);
criterion_main!(benches);
