//! Deterministic synthetic check events for tests and benchmarks.

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};

use crate::event::{BrokerEvent, CallbackKind, CheckEvent, CheckPhase};

use super::{EventBus, EventHandler, EventSource, SubscriptionId};

/// Endless, repeatable stream of check events over a fixed set of entities.
///
/// Entities are visited round-robin: each host, followed by its services.
/// States rotate with each round so consecutive snapshots of an entity differ.
#[derive(Debug, Clone)]
pub struct SyntheticEvents {
    hosts: usize,
    services_per_host: usize,
    seq: u64,
    base: DateTime<Utc>,
    with_initiate: bool,
    pending: Option<BrokerEvent>,
}

impl SyntheticEvents {
    /// Events for `hosts` hosts with `services_per_host` services each.
    #[must_use]
    pub fn new(hosts: usize, services_per_host: usize) -> Self {
        Self {
            hosts: hosts.max(1),
            services_per_host,
            seq: 0,
            base: Utc.timestamp_opt(1_700_000_000, 0).single().unwrap_or_else(Utc::now),
            with_initiate: false,
            pending: None,
        }
    }

    /// Precede every processed event with an `Initiate` event for the same check.
    #[must_use]
    pub fn with_initiate_phase(mut self, enabled: bool) -> Self {
        self.with_initiate = enabled;
        self
    }

    /// Number of distinct entities in one round.
    #[must_use]
    pub fn entities_per_round(&self) -> usize {
        self.hosts * (1 + self.services_per_host)
    }

    /// Host name of host `index`.
    #[must_use]
    pub fn host_name(index: usize) -> String {
        format!("host-{index:04}")
    }

    /// Service description of service `index` on every host.
    #[must_use]
    pub fn service_name(index: usize) -> String {
        format!("svc-{index:02}")
    }

    fn processed(&mut self) -> BrokerEvent {
        let per_round = self.entities_per_round() as u64;
        let round = self.seq / per_round;
        let slot = (self.seq % per_round) as usize;
        let host = slot / (1 + self.services_per_host);
        let service = slot % (1 + self.services_per_host);
        let ts = self.base + Duration::seconds(self.seq as i64);
        self.seq += 1;

        let rot = round as i32 + host as i32 + service as i32;
        let (event, states) = if service == 0 {
            (CheckEvent::host(Self::host_name(host), ts), 3)
        } else {
            (CheckEvent::service(Self::host_name(host), Self::service_name(service), ts), 4)
        };
        let state = rot % states;
        BrokerEvent::processed(
            event
                .with_state(state, (round % 2) as i32)
                .with_attempts(1 + (round % 3) as i32, 3)
                .with_output(format!("synthetic check round {round} state {state}"))
                .with_perf_data(format!("rta={}ms;100;500", rot % 250)),
        )
    }
}

impl Iterator for SyntheticEvents {
    type Item = BrokerEvent;

    fn next(&mut self) -> Option<BrokerEvent> {
        if let Some(ev) = self.pending.take() {
            return Some(ev);
        }
        let ev = self.processed();
        if self.with_initiate {
            let initiate = ev.clone().in_phase(CheckPhase::Initiate);
            self.pending = Some(ev);
            return Some(initiate);
        }
        Some(ev)
    }
}

/// Event source driven by the caller.
#[derive(Debug, Default)]
pub struct SyntheticSource {
    bus: EventBus,
}

impl SyntheticSource {
    /// Source with no subscribers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise one event; returns the number of handlers that received it.
    pub fn emit(&self, event: &BrokerEvent) -> usize {
        self.bus.publish(event)
    }

    /// Raise every event from `events` and return how many were raised.
    pub fn emit_all<I: IntoIterator<Item = BrokerEvent>>(&self, events: I) -> usize {
        events.into_iter().map(|e| self.emit(&e)).count()
    }
}

impl EventSource for SyntheticSource {
    fn subscribe(&self, callback: CallbackKind, handler: Arc<dyn EventHandler>) -> SubscriptionId {
        self.bus.subscribe(callback, handler)
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.bus.unsubscribe(id)
    }
}
