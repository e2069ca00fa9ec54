use std::sync::Arc;

use criterion::{criterion_group, criterion_main, BatchSize, Criterion, Throughput};

use snapgate::{
    BrokerEvent, CheckPhase, EnrichmentRecord, EntityKey, EventGate, GatewayConfig, GateOutcome,
    InMemoryEnrichment, SyntheticEvents,
};

const HOSTS: usize = 64;
const SERVICES_PER_HOST: usize = 8;

fn make_gate(dir: &std::path::Path) -> EventGate {
    let cfg = GatewayConfig::new(dir)
        .with_subprefix("bench")
        .with_publisher_host("bench-host");

    // Every host has enrichment so the lookup path is measured too.
    let lookup: InMemoryEnrichment = (0..HOSTS)
        .map(|h| {
            (
                EntityKey::host(SyntheticEvents::host_name(h)),
                EnrichmentRecord {
                    notes: Some(format!("rack {h}")),
                    icon_image: Some("server.png".to_string()),
                },
            )
        })
        .collect();

    EventGate::new(Arc::new(cfg), Arc::new(lookup))
}

fn events(filter: impl Fn(&BrokerEvent) -> bool) -> Vec<BrokerEvent> {
    SyntheticEvents::new(HOSTS, SERVICES_PER_HOST)
        .take(HOSTS * (1 + SERVICES_PER_HOST) * 4)
        .filter(|e| filter(e))
        .collect()
}

fn bench_processed(c: &mut Criterion, name: &str, service: bool) {
    let dir = tempfile::tempdir().unwrap();
    let gate = make_gate(dir.path());
    let evs = events(|e| e.data.as_ref().is_some_and(|d| d.service_description.is_some() == service));
    let mut i = 0usize;

    let mut group = c.benchmark_group("gate");
    group.throughput(Throughput::Elements(1));
    group.bench_function(name, |b| {
        b.iter(|| {
            let ev = &evs[i % evs.len()];
            i += 1;
            let outcome = gate.handle(ev);
            assert_eq!(outcome, GateOutcome::Published);
        });
    });
    group.finish();
}

fn bench_host_check_processed(c: &mut Criterion) {
    bench_processed(c, "host_check_processed", false);
}

fn bench_service_check_processed(c: &mut Criterion) {
    bench_processed(c, "service_check_processed", true);
}

fn bench_ignored_phase(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    let gate = make_gate(dir.path());
    let initiate = events(|_| true)[0].clone().in_phase(CheckPhase::Initiate);

    let mut group = c.benchmark_group("gate");
    group.bench_function("ignored_phase", |b| {
        b.iter_batched(
            || initiate.clone(),
            |ev| gate.handle(&ev),
            BatchSize::SmallInput,
        );
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_host_check_processed,
    bench_service_check_processed,
    bench_ignored_phase
);
criterion_main!(benches);
