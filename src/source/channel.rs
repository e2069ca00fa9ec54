//! Channel-backed event source.
//!
//! Producers on any thread push events into a bounded queue without blocking.
//! A single consumer thread drains the queue and delivers to subscribers, so
//! handlers see events one at a time in queue order.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam_channel::{bounded, Receiver, SendError, Sender, TryRecvError, TrySendError};
use tracing::debug;

use crate::event::{BrokerEvent, CallbackKind};

use super::{EventBus, EventHandler, EventSource, SubscriptionId};

/// Default queue capacity.
pub const DEFAULT_CAPACITY: usize = 4096;

/// Producer half of a [`ChannelSource`].
#[derive(Debug, Clone)]
pub struct ChannelSender {
    tx: Sender<BrokerEvent>,
    dropped: Arc<AtomicU64>,
}

impl ChannelSender {
    /// Non-blocking enqueue.
    ///
    /// Returns false and counts a drop when the queue is full or the consumer
    /// is gone.
    pub fn try_push(&self, event: BrokerEvent) -> bool {
        match self.tx.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    /// Blocking enqueue for producers that may wait, such as file readers.
    pub fn push(&self, event: BrokerEvent) -> Result<(), SendError<BrokerEvent>> {
        self.tx.send(event)
    }

    /// Events rejected by [`ChannelSender::try_push`] so far, across all clones.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Consumer half: owns the subscriptions and delivers queued events.
#[derive(Debug)]
pub struct ChannelSource {
    bus: EventBus,
    rx: Receiver<BrokerEvent>,
    dropped: Arc<AtomicU64>,
}

impl ChannelSource {
    /// Create a source with a queue of `capacity` events (at least one).
    #[must_use]
    pub fn bounded(capacity: usize) -> (Self, ChannelSender) {
        let (tx, rx) = bounded(capacity.max(1));
        let dropped = Arc::new(AtomicU64::new(0));
        let source = Self {
            bus: EventBus::new(),
            rx,
            dropped: Arc::clone(&dropped),
        };
        (source, ChannelSender { tx, dropped })
    }

    /// Deliver events until every sender is dropped.
    ///
    /// Returns the number of events taken off the queue.
    pub fn run(&self) -> u64 {
        let mut delivered = 0u64;
        while let Ok(event) = self.rx.recv() {
            self.bus.publish(&event);
            delivered += 1;
        }
        debug!(delivered, dropped = self.dropped(), "event channel closed");
        delivered
    }

    /// Deliver what is queued right now and return without waiting.
    pub fn drain(&self) -> usize {
        let mut delivered = 0;
        loop {
            match self.rx.try_recv() {
                Ok(event) => {
                    self.bus.publish(&event);
                    delivered += 1;
                }
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => return delivered,
            }
        }
    }

    /// Events waiting in the queue.
    #[must_use]
    pub fn queued(&self) -> usize {
        self.rx.len()
    }

    /// Events dropped by producers because the queue was full.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl EventSource for ChannelSource {
    fn subscribe(&self, callback: CallbackKind, handler: Arc<dyn EventHandler>) -> SubscriptionId {
        self.bus.subscribe(callback, handler)
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.bus.unsubscribe(id)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::thread;

    use chrono::Utc;

    use super::*;
    use crate::event::CheckEvent;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<String>>);

    impl EventHandler for Recorder {
        fn on_event(&self, event: &BrokerEvent) {
            if let Some(data) = &event.data {
                self.0.lock().unwrap().push(data.host_name.clone());
            }
        }
    }

    fn event(host: &str) -> BrokerEvent {
        BrokerEvent::processed(CheckEvent::host(host, Utc::now()))
    }

    #[test]
    fn test_full_queue_counts_drops() {
        let (source, tx) = ChannelSource::bounded(2);
        assert!(tx.try_push(event("a")));
        assert!(tx.try_push(event("b")));
        assert!(!tx.try_push(event("c")));

        assert_eq!(source.queued(), 2);
        assert_eq!(source.dropped(), 1);
        assert_eq!(tx.clone().dropped(), 1);
    }

    #[test]
    fn test_drain_delivers_in_order() {
        let (source, tx) = ChannelSource::bounded(8);
        let rec = Arc::new(Recorder::default());
        source.subscribe(CallbackKind::HostCheck, rec.clone());

        for h in ["a", "b", "c"] {
            tx.try_push(event(h));
        }
        assert_eq!(source.drain(), 3);
        assert_eq!(*rec.0.lock().unwrap(), vec!["a", "b", "c"]);
        assert_eq!(source.drain(), 0);
    }

    #[test]
    fn test_run_returns_when_senders_are_gone() {
        let (source, tx) = ChannelSource::bounded(4);
        let rec = Arc::new(Recorder::default());
        source.subscribe(CallbackKind::HostCheck, rec.clone());

        let producer = thread::spawn(move || {
            for i in 0..100 {
                tx.push(event(&format!("h{i}"))).unwrap();
            }
        });
        assert_eq!(source.run(), 100);
        producer.join().unwrap();

        let seen = rec.0.lock().unwrap();
        assert_eq!(seen.len(), 100);
        assert_eq!(seen[0], "h0");
        assert_eq!(seen[99], "h99");
    }
}
