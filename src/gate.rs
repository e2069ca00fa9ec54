//! Event gate.
//!
//! The gate is the only thing the event source calls. For every event it
//! decides whether the event is a final check result, and if so hashes the
//! entity, builds the snapshot and publishes it. Nothing it does can fail the
//! caller: every problem is logged and counted, and the next event is handled
//! normally.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::GatewayConfig;
use crate::diag::bounded_line;
use crate::enrichment::{EnrichmentLookup, NoEnrichment};
use crate::entity::EntityKey;
use crate::error::PublishError;
use crate::event::{BrokerEvent, CallbackKind, CheckPhase};
use crate::identity::EntityDigest;
use crate::publisher::AtomicPublisher;
use crate::snapshot::SnapshotBuilder;
use crate::source::{EventHandler, EventSource, SubscriptionId};

/// What the gate did with one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateOutcome {
    /// Not a final result, or no usable payload.
    Ignored,
    /// Snapshot committed.
    Published,
    /// Snapshot could not be committed; already logged.
    Dropped,
}

#[derive(Debug, Default)]
struct GateCounters {
    ignored: AtomicU64,
    published: AtomicU64,
    dropped: AtomicU64,
    staging_collisions: AtomicU64,
}

/// Point-in-time copy of the gate counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct GateStats {
    /// Events that were not final results or had no usable payload.
    pub ignored: u64,
    /// Snapshots committed.
    pub published: u64,
    /// All drops, staging collisions included.
    pub dropped: u64,
    /// Drops caused by an unconsumed staging file.
    pub staging_collisions: u64,
}

/// Filters check events and publishes snapshots of final results.
pub struct EventGate {
    config: Arc<GatewayConfig>,
    lookup: Arc<dyn EnrichmentLookup>,
    publisher: AtomicPublisher,
    counters: GateCounters,
}

impl EventGate {
    /// Gate writing under `config.basedir()` and enriching through `lookup`.
    #[must_use]
    pub fn new(config: Arc<GatewayConfig>, lookup: Arc<dyn EnrichmentLookup>) -> Self {
        let publisher = AtomicPublisher::new(&config);
        Self {
            config,
            lookup,
            publisher,
            counters: GateCounters::default(),
        }
    }

    /// Gate whose snapshots never carry enrichment fields.
    #[must_use]
    pub fn without_enrichment(config: Arc<GatewayConfig>) -> Self {
        Self::new(config, Arc::new(NoEnrichment))
    }

    /// Configuration the gate was built with.
    #[must_use]
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Publisher writing this gate's snapshots.
    #[must_use]
    pub fn publisher(&self) -> &AtomicPublisher {
        &self.publisher
    }

    /// Handle one event from the source.
    pub fn handle(&self, event: &BrokerEvent) -> GateOutcome {
        if event.phase != CheckPhase::Processed {
            return self.ignore(event, "check not processed yet");
        }
        let Some(data) = event.data.as_ref() else {
            return self.ignore(event, "no payload");
        };
        let Some(key) = event.entity_key() else {
            return self.ignore(event, "malformed payload");
        };

        let digest = EntityDigest::of(&key);
        let snapshot = SnapshotBuilder::new(&self.config, self.lookup.as_ref()).build(&key, data);

        match self.publisher.publish_snapshot(&digest, &snapshot) {
            Ok(path) => {
                self.counters.published.fetch_add(1, Ordering::Relaxed);
                debug!("{}", bounded_line(&format!("published snapshot for {key} at {}", path.display())));
                GateOutcome::Published
            }
            Err(err) => {
                self.record_drop(&key, &err);
                GateOutcome::Dropped
            }
        }
    }

    /// Current counter values.
    #[must_use]
    pub fn stats(&self) -> GateStats {
        GateStats {
            ignored: self.counters.ignored.load(Ordering::Relaxed),
            published: self.counters.published.load(Ordering::Relaxed),
            dropped: self.counters.dropped.load(Ordering::Relaxed),
            staging_collisions: self.counters.staging_collisions.load(Ordering::Relaxed),
        }
    }

    /// Subscribe the gate to host and service checks of `source`.
    pub fn attach<'s>(self: &Arc<Self>, source: &'s dyn EventSource) -> Attachment<'s> {
        let ids = CallbackKind::ALL
            .iter()
            .map(|&cb| source.subscribe(cb, Arc::clone(self) as Arc<dyn EventHandler>))
            .collect();
        Attachment { source, ids }
    }

    fn ignore(&self, event: &BrokerEvent, reason: &str) -> GateOutcome {
        self.counters.ignored.fetch_add(1, Ordering::Relaxed);
        debug!(callback = ?event.callback, phase = ?event.phase, reason, "ignoring event");
        GateOutcome::Ignored
    }

    fn record_drop(&self, key: &EntityKey, err: &PublishError) {
        self.counters.dropped.fetch_add(1, Ordering::Relaxed);
        if err.is_staging_collision() {
            self.counters.staging_collisions.fetch_add(1, Ordering::Relaxed);
        }
        let msg = match err.raw_os_error() {
            Some(code) => format!("dropping snapshot for {key}: {err} (errno {code})"),
            None => format!("dropping snapshot for {key}: {err}"),
        };
        warn!("{}", bounded_line(&msg));
    }
}

impl EventHandler for EventGate {
    fn on_event(&self, event: &BrokerEvent) {
        self.handle(event);
    }
}

impl std::fmt::Debug for EventGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventGate")
            .field("basedir", &self.publisher.basedir())
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

/// Subscriptions made by [`EventGate::attach`].
#[must_use = "dropping an attachment leaves the gate subscribed; call detach to remove it"]
pub struct Attachment<'s> {
    source: &'s dyn EventSource,
    ids: Vec<SubscriptionId>,
}

impl Attachment<'_> {
    /// Subscription ids, one per callback.
    #[must_use]
    pub fn subscription_ids(&self) -> &[SubscriptionId] {
        &self.ids
    }

    /// Remove every subscription made at attach time.
    ///
    /// Returns the number actually removed.
    pub fn detach(self) -> usize {
        self.ids
            .iter()
            .filter(|&&id| self.source.unsubscribe(id))
            .count()
    }
}

impl std::fmt::Debug for Attachment<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Attachment").field("ids", &self.ids).finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::event::CheckEvent;
    use crate::snapshot::Snapshot;
    use crate::source::EventBus;

    fn gate(dir: &std::path::Path) -> Arc<EventGate> {
        let cfg = GatewayConfig::new(dir).with_publisher_host("mon1");
        Arc::new(EventGate::without_enrichment(Arc::new(cfg)))
    }

    fn host_down() -> BrokerEvent {
        BrokerEvent::processed(
            CheckEvent::host("web01", Utc.timestamp_opt(1_700_000_000, 0).unwrap())
                .with_state(1, 1)
                .with_attempts(3, 3),
        )
    }

    #[test]
    fn test_processed_event_is_published() {
        let dir = tempfile::tempdir().unwrap();
        let g = gate(dir.path());

        assert_eq!(g.handle(&host_down()), GateOutcome::Published);

        let digest = EntityDigest::of(&EntityKey::host("web01"));
        let text = fs::read_to_string(g.publisher().final_path(&digest)).unwrap();
        let snap = Snapshot::from_line(&text).unwrap();
        assert_eq!(snap.state_s, "DOWN");
        assert_eq!(g.stats().published, 1);
    }

    #[test]
    fn test_other_phases_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let g = gate(dir.path());

        for phase in [CheckPhase::Initiate, CheckPhase::AsyncPrecheck, CheckPhase::RawEnd, CheckPhase::Other] {
            assert_eq!(g.handle(&host_down().in_phase(phase)), GateOutcome::Ignored);
        }
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
        assert_eq!(g.stats().ignored, 4);
    }

    #[test]
    fn test_staging_collision_is_counted() {
        let dir = tempfile::tempdir().unwrap();
        let g = gate(dir.path());
        let digest = EntityDigest::of(&EntityKey::host("web01"));
        fs::write(g.publisher().staging_path(&digest), b"").unwrap();

        assert_eq!(g.handle(&host_down()), GateOutcome::Dropped);
        let stats = g.stats();
        assert_eq!(stats.dropped, 1);
        assert_eq!(stats.staging_collisions, 1);
        assert!(!g.publisher().final_path(&digest).exists());
    }

    #[test]
    fn test_io_failure_is_dropped_not_propagated() {
        let dir = tempfile::tempdir().unwrap();
        let g = gate(&dir.path().join("missing"));

        assert_eq!(g.handle(&host_down()), GateOutcome::Dropped);
        assert_eq!(g.stats().staging_collisions, 0);
        // The next event is handled normally once the directory exists.
        g.publisher().prepare().unwrap();
        assert_eq!(g.handle(&host_down()), GateOutcome::Published);
    }

    #[test]
    fn test_attach_and_detach() {
        let dir = tempfile::tempdir().unwrap();
        let g = gate(dir.path());
        let bus = EventBus::new();

        let attachment = g.attach(&bus);
        assert_eq!(attachment.subscription_ids().len(), 2);
        assert_eq!(bus.publish(&host_down()), 1);
        assert_eq!(g.stats().published, 1);

        assert_eq!(attachment.detach(), 2);
        assert!(bus.is_empty());
        assert_eq!(bus.publish(&host_down()), 0);
    }
}
