//! Snapshot records.
//!
//! A snapshot is the complete, self-describing view of one entity's latest
//! check result. It is written as a single JSON line so a downstream publisher
//! can forward a file's content without consulting anything else.
//!
//! Field order on the wire:
//!
//! ```text
//! _timestamp _hostname _subprefix _type hostname [service_description]
//! current_attempt max_attempts state_type state_type_s state state_s
//! output long_output perf_data [notes] [icon_image]
//! ```

use serde::{Deserialize, Serialize};

use crate::config::GatewayConfig;
use crate::enrichment::EnrichmentLookup;
use crate::entity::{EntityKey, EntityKind};
use crate::event::CheckEvent;
use crate::labels::{state_labels, state_type_label};

/// One entity's published state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Check timestamp, seconds since the epoch.
    #[serde(rename = "_timestamp")]
    pub timestamp: i64,
    /// Name of the host running the gateway.
    #[serde(rename = "_hostname")]
    pub publisher_host: String,
    /// Configured namespace prefix, empty when unset.
    #[serde(rename = "_subprefix")]
    pub subprefix: String,
    /// Entity kind tag.
    #[serde(rename = "_type")]
    pub kind: EntityKind,
    /// Checked host, or owner of the checked service.
    #[serde(rename = "hostname")]
    pub host_name: String,
    /// Present for services only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_description: Option<String>,
    /// Attempt number of this check.
    pub current_attempt: i32,
    /// Attempts before a soft state turns hard.
    pub max_attempts: i32,
    /// 0 soft, nonzero hard.
    pub state_type: i32,
    /// `HARD` or `SOFT`.
    pub state_type_s: String,
    /// Numeric state code.
    pub state: i32,
    /// State label for the entity kind.
    pub state_s: String,
    /// First line of plugin output.
    pub output: String,
    /// Remaining plugin output lines.
    pub long_output: String,
    /// Performance data.
    pub perf_data: String,
    /// Configured notes, when non-empty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Configured icon image, when non-empty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon_image: Option<String>,
}

impl Snapshot {
    /// Serialize as one JSON line including the trailing newline.
    pub fn to_line(&self) -> serde_json::Result<String> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }

    /// Parse a line produced by [`Snapshot::to_line`].
    pub fn from_line(line: &str) -> serde_json::Result<Self> {
        serde_json::from_str(line.trim_end_matches(['\n', '\r']))
    }

    /// The entity this snapshot describes.
    #[must_use]
    pub fn entity_key(&self) -> EntityKey {
        match (self.kind, &self.service_description) {
            (EntityKind::Service, Some(svc)) => EntityKey::service(&self.host_name, svc),
            _ => EntityKey::host(&self.host_name),
        }
    }
}

/// Builds snapshots from check events.
///
/// Holds the gateway-wide metadata and the enrichment lookup; one builder
/// serves both entity kinds.
pub struct SnapshotBuilder<'a> {
    config: &'a GatewayConfig,
    lookup: &'a dyn EnrichmentLookup,
}

impl<'a> SnapshotBuilder<'a> {
    /// Builder stamping snapshots with `config` and enriching through `lookup`.
    #[must_use]
    pub fn new(config: &'a GatewayConfig, lookup: &'a dyn EnrichmentLookup) -> Self {
        Self { config, lookup }
    }

    /// Snapshot of `event` for entity `key`.
    ///
    /// Absent text fields become empty strings. Enrichment fields appear only
    /// when the lookup finds a record and the field is non-empty.
    #[must_use]
    pub fn build(&self, key: &EntityKey, event: &CheckEvent) -> Snapshot {
        let kind = key.kind();
        let enrichment = self.lookup.lookup(key);
        let (notes, icon_image) = match &enrichment {
            Some(r) => (r.notes().map(str::to_string), r.icon_image().map(str::to_string)),
            None => (None, None),
        };

        Snapshot {
            timestamp: event.timestamp.timestamp(),
            publisher_host: self.config.publisher_host().to_string(),
            subprefix: self.config.subprefix().unwrap_or_default().to_string(),
            kind,
            host_name: key.host_name().to_string(),
            service_description: key.service_description().map(str::to_string),
            current_attempt: event.current_attempt,
            max_attempts: event.max_attempts,
            state_type: event.state_type,
            state_type_s: state_type_label(event.state_type).to_string(),
            state: event.state,
            state_s: state_labels(kind).label(event.state).to_string(),
            output: event.output.clone().unwrap_or_default(),
            long_output: event.long_output.clone().unwrap_or_default(),
            perf_data: event.perf_data.clone().unwrap_or_default(),
            notes,
            icon_image,
        }
    }
}
