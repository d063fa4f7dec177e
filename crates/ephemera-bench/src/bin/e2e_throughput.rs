//! End-to-end throughput benchmark for Ephemera.
//!
//! Connects N WebSocket clients to one room of a running server and counts
//! how many relayed messages they receive.

use futures_util::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Barrier;
use tokio_tungstenite::{connect_async, tungstenite::Message};

const DEFAULT_SERVER: &str = "ws://127.0.0.1:8080/ws";
const ROOM: &str = "benchmark";
const WARMUP_SECS: u64 = 2;
const BENCH_SECS: u64 = 10;

#[tokio::main]
async fn main() {
    let args: Vec<String> = std::env::args().collect();
    let num_clients = args.get(1).and_then(|s| s.parse().ok()).unwrap_or(16);
    let server = args
        .get(2)
        .cloned()
        .unwrap_or_else(|| DEFAULT_SERVER.to_string());

    println!("Ephemera end-to-end throughput benchmark");
    println!("Make sure the server is running: cargo run --release --bin ephemera");
    println!();

    run_room_benchmark(&server, num_clients).await;
}

async fn run_room_benchmark(server: &str, num_clients: usize) {
    println!("Room benchmark: {num_clients} clients in '{ROOM}'");
    println!("Warmup: {WARMUP_SECS}s, measurement: {BENCH_SECS}s");
    println!();

    let received = Arc::new(AtomicU64::new(0));
    let malformed = Arc::new(AtomicU64::new(0));
    let barrier = Arc::new(Barrier::new(num_clients + 1));

    let mut handles = Vec::new();
    for client_id in 0..num_clients {
        let url = format!("{server}?room={ROOM}&user=client-{client_id}");
        let received = Arc::clone(&received);
        let malformed = Arc::clone(&malformed);
        let barrier = Arc::clone(&barrier);

        handles.push(tokio::spawn(async move {
            if let Err(e) = run_client(&url, received, malformed, barrier).await {
                eprintln!("Client {client_id} error: {e}");
            }
        }));
    }

    barrier.wait().await;
    println!("All {num_clients} clients connected");

    println!("Warming up for {WARMUP_SECS}s...");
    tokio::time::sleep(Duration::from_secs(WARMUP_SECS)).await;

    received.store(0, Ordering::SeqCst);
    let start = Instant::now();

    println!("Measuring for {BENCH_SECS}s...");
    tokio::time::sleep(Duration::from_secs(BENCH_SECS)).await;

    let elapsed = start.elapsed();
    let total = received.load(Ordering::SeqCst);
    let per_sec = total as f64 / elapsed.as_secs_f64();

    println!();
    println!("Clients:          {num_clients:>12}");
    println!("Duration:         {:>11.2}s", elapsed.as_secs_f64());
    println!("Received:         {total:>12}");
    println!("Throughput:       {per_sec:>8.0} msg/s");
    println!(
        "Per client:       {:>8.0} msg/s",
        per_sec / num_clients as f64
    );
    println!(
        "Malformed:        {:>12}",
        malformed.load(Ordering::SeqCst)
    );

    for handle in handles {
        handle.abort();
    }
}

async fn run_client(
    url: &str,
    received: Arc<AtomicU64>,
    malformed: Arc<AtomicU64>,
    barrier: Arc<Barrier>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let (ws, _) = connect_async(url).await?;
    let (mut sender, mut receiver) = ws.split();

    // Any notice means we are subscribed.
    receiver.next().await;
    barrier.wait().await;

    let recv_task = tokio::spawn(async move {
        while let Some(result) = receiver.next().await {
            if let Ok(Message::Text(text)) = result {
                match serde_json::from_str::<serde_json::Value>(&text) {
                    Ok(value) if value.is_object() => {
                        received.fetch_add(1, Ordering::Relaxed);
                    }
                    _ => {
                        malformed.fetch_add(1, Ordering::Relaxed);
                    }
                }
            }
        }
    });

    let body = Message::Text("x".repeat(64));
    loop {
        if sender.send(body.clone()).await.is_err() {
            break;
        }
        tokio::task::yield_now().await;
    }

    recv_task.abort();
    Ok(())
}
