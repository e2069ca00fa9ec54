//! Enrichment metadata joined into snapshots.
//!
//! The monitoring core owns entity configuration. The gateway only asks for
//! a read-only copy of two free-text fields at snapshot-build time, and a
//! missing record narrows the snapshot instead of failing it.

use std::collections::HashMap;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use crate::entity::EntityKey;

/// Optional metadata configured for an entity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichmentRecord {
    /// Free-text notes.
    #[serde(default)]
    pub notes: Option<String>,
    /// Icon image reference.
    #[serde(default)]
    pub icon_image: Option<String>,
}

impl EnrichmentRecord {
    /// Notes, unless unset or empty.
    #[must_use]
    pub fn notes(&self) -> Option<&str> {
        non_empty(self.notes.as_deref())
    }

    /// Icon image, unless unset or empty.
    #[must_use]
    pub fn icon_image(&self) -> Option<&str> {
        non_empty(self.icon_image.as_deref())
    }

    /// True when neither field would appear in a snapshot.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.notes().is_none() && self.icon_image().is_none()
    }
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.filter(|v| !v.is_empty())
}

/// Read-only view of the monitoring core's entity configuration.
pub trait EnrichmentLookup: Send + Sync {
    /// Metadata for `key`, if the entity is configured.
    fn lookup(&self, key: &EntityKey) -> Option<EnrichmentRecord>;
}

/// Lookup that never finds anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoEnrichment;

impl EnrichmentLookup for NoEnrichment {
    fn lookup(&self, _key: &EntityKey) -> Option<EnrichmentRecord> {
        None
    }
}

/// Thread-safe in-memory enrichment table.
#[derive(Debug, Default)]
pub struct InMemoryEnrichment {
    records: RwLock<HashMap<EntityKey, EnrichmentRecord>>,
}

impl InMemoryEnrichment {
    /// Empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the record for `key`.
    pub fn insert(&self, key: EntityKey, record: EnrichmentRecord) {
        if let Ok(mut records) = self.records.write() {
            records.insert(key, record);
        }
    }

    /// Swap in a complete new table, e.g. after re-reading configuration.
    pub fn replace_all(&self, table: HashMap<EntityKey, EnrichmentRecord>) {
        if let Ok(mut records) = self.records.write() {
            *records = table;
        }
    }

    /// Number of configured entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }

    /// True when no entity is configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FromIterator<(EntityKey, EnrichmentRecord)> for InMemoryEnrichment {
    fn from_iter<I: IntoIterator<Item = (EntityKey, EnrichmentRecord)>>(iter: I) -> Self {
        Self {
            records: RwLock::new(iter.into_iter().collect()),
        }
    }
}

impl EnrichmentLookup for InMemoryEnrichment {
    fn lookup(&self, key: &EntityKey) -> Option<EnrichmentRecord> {
        // A poisoned table degrades to "no enrichment".
        self.records.read().ok()?.get(key).cloned()
    }
}
