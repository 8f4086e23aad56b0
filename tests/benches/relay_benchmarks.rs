//! # Relay Benchmarks
//!
//! | Area | Operation |
//! |------|-----------|
//! | Correlation | mint, normalize, match |
//! | Pending table | register + complete |
//! | Round trip | requestor → broker → replier → requestor |

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::sync::Arc;
use std::time::Duration;

use relay_core::adapters::{EchoProcessor, InMemoryBroker, DEFAULT_ENDPOINT};
use relay_core::domain::{
    CorrelationToken, Destination, Message, OutboundMessage, RequestorConfig,
};
use relay_core::ports::{Connector, Credentials, TransportSession};
use relay_core::service::{ConcurrentRequestor, PendingReplyTable, Replier, Requestor};

// ============================================================================
// Correlation
// ============================================================================

fn bench_correlation(c: &mut Criterion) {
    let mut group = c.benchmark_group("correlation");

    group.bench_function("mint", |b| b.iter(|| black_box(CorrelationToken::mint())));

    let token = CorrelationToken::mint();
    for depth in [0usize, 1, 3] {
        let raw = format!("{}{}", "ID:".repeat(depth), token.as_str());
        group.bench_with_input(BenchmarkId::new("normalize", depth), &raw, |b, raw| {
            b.iter(|| black_box(CorrelationToken::normalize(raw)))
        });
        group.bench_with_input(BenchmarkId::new("matches", depth), &raw, |b, raw| {
            b.iter(|| black_box(token.matches(raw)))
        });
    }

    group.finish();
}

// ============================================================================
// Pending Reply Table
// ============================================================================

fn bench_pending_table(c: &mut Criterion) {
    let mut group = c.benchmark_group("pending-table");
    let reply_to = Destination::temporary("bench");

    for size in [1usize, 100, 1000] {
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("register_complete", size), &size, |b, &n| {
            b.iter(|| {
                let table = PendingReplyTable::new(Duration::from_secs(10));
                let mut waiters = Vec::with_capacity(n);
                for _ in 0..n {
                    let (token, rx) = table.register(None);
                    waiters.push((token, rx));
                }
                for (token, _rx) in &waiters {
                    let reply = Message::new(
                        "ID:bench",
                        reply_to.clone(),
                        OutboundMessage::text("ok").with_correlation_token(token.as_str()),
                    );
                    black_box(table.complete(token.as_str(), reply));
                }
            })
        });
    }

    group.finish();
}

// ============================================================================
// Round Trip
// ============================================================================

async fn session(broker: &InMemoryBroker) -> Arc<dyn TransportSession> {
    Arc::new(
        broker
            .connect(DEFAULT_ENDPOINT, &Credentials::anonymous())
            .await
            .unwrap(),
    )
}

fn bench_round_trip(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let broker = InMemoryBroker::new();
    broker.declare_topic("requests");
    let requests = Destination::durable("requests");
    let config = RequestorConfig::with_timeout(Duration::from_secs(5));

    let (_replier, requestor, concurrent) = rt.block_on(async {
        let replier = Replier::start(
            session(&broker).await,
            requests.clone(),
            Arc::new(EchoProcessor),
        )
        .await
        .unwrap();
        let requestor = Requestor::start(session(&broker).await, requests.clone(), config.clone())
            .await
            .unwrap();
        let concurrent =
            ConcurrentRequestor::start(session(&broker).await, requests.clone(), config.clone())
                .await
                .unwrap();
        (replier, requestor, Arc::new(concurrent))
    });

    let mut group = c.benchmark_group("round-trip");
    group.measurement_time(Duration::from_secs(10));

    group.bench_function("sequential", |b| {
        b.iter(|| rt.block_on(async { black_box(requestor.request("hello").await.unwrap()) }))
    });

    for in_flight in [8usize, 64] {
        group.throughput(Throughput::Elements(in_flight as u64));
        group.bench_with_input(
            BenchmarkId::new("concurrent", in_flight),
            &in_flight,
            |b, &n| {
                b.iter(|| {
                    rt.block_on(async {
                        let handles: Vec<_> = (0..n)
                            .map(|i| {
                                let concurrent = Arc::clone(&concurrent);
                                tokio::spawn(async move {
                                    concurrent.request(&format!("line {i}")).await.unwrap()
                                })
                            })
                            .collect();
                        for handle in handles {
                            black_box(handle.await.unwrap());
                        }
                    })
                })
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_correlation,
    bench_pending_table,
    bench_round_trip
);
criterion_main!(benches);
