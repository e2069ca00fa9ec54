//! # snapgate - check-result snapshot gateway
//!
//! snapgate sits inside (or next to) a monitoring core and turns every final
//! host or service check result into a snapshot file: one JSON line per
//! entity, atomically replaced on each new result, named by a stable digest of
//! the entity's identity. A separate forwarder picks the files up and ships
//! them on; snapgate never talks to the network.
//!
//! ## Components
//!
//! - **Identity**: canonical entity keys and their fixed-width digests
//! - **Snapshot**: the published record, with optional enrichment metadata
//! - **Publisher**: staging file plus rename, never a partially written file
//! - **Gate**: filters events, ties the pieces together, never fails the caller
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use snapgate::{ChannelSource, EventGate, GatewayConfig};
//!
//! let config = Arc::new(GatewayConfig::from_module_args("-basedir /run/snapgate/publish")?);
//! let gate = Arc::new(EventGate::without_enrichment(config));
//! let (source, sender) = ChannelSource::bounded(4096);
//! let attachment = gate.attach(&source);
//! // hand `sender` to producers, then:
//! source.run();
//! attachment.detach();
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Identity and records
pub mod entity;
pub mod error;
pub mod event;
pub mod identity;
pub mod labels;
pub mod snapshot;

// Configuration and enrichment
pub mod config;
pub mod diag;
pub mod enrichment;
pub mod objects_cache;

// Publication and event flow
pub mod gate;
pub mod publisher;
pub mod source;

pub use config::GatewayConfig;
pub use enrichment::{EnrichmentLookup, EnrichmentRecord, InMemoryEnrichment, NoEnrichment};
pub use entity::{EntityKey, EntityKind};
pub use error::{ConfigError, GatewayError, GatewayResult, PublishError};
pub use event::{BrokerEvent, CallbackKind, CheckEvent, CheckPhase};
pub use gate::{Attachment, EventGate, GateOutcome, GateStats};
pub use identity::EntityDigest;
pub use publisher::{AtomicPublisher, SweepReport};
pub use snapshot::{Snapshot, SnapshotBuilder};
pub use source::{
    ChannelSender, ChannelSource, EventBus, EventHandler, EventSource, SubscriptionId, SyntheticEvents,
    SyntheticSource,
};
