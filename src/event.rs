//! Check-result events delivered by the monitoring core.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entity::{EntityKey, EntityKind};

/// Callback channel an event arrives on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallbackKind {
    /// Host check data.
    HostCheck,
    /// Service check data.
    ServiceCheck,
}

impl CallbackKind {
    /// Both callbacks, in registration order.
    pub const ALL: [Self; 2] = [Self::HostCheck, Self::ServiceCheck];

    /// The entity kind whose checks arrive on this callback.
    #[must_use]
    pub const fn entity_kind(self) -> EntityKind {
        match self {
            Self::HostCheck => EntityKind::Host,
            Self::ServiceCheck => EntityKind::Service,
        }
    }
}

/// Point in a check's life cycle at which the event was raised.
///
/// Only [`CheckPhase::Processed`] carries a final result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckPhase {
    /// Before an asynchronous check is scheduled.
    AsyncPrecheck,
    /// Before a synchronous check runs.
    SyncPrecheck,
    /// Check was started.
    Initiate,
    /// Check result was processed; the state fields are final.
    Processed,
    /// Raw check result, before processing starts.
    RawStart,
    /// Raw check result, processing finished.
    RawEnd,
    /// A phase this gateway does not know about.
    #[serde(other)]
    Other,
}

/// Result of one completed check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckEvent {
    /// Checked host, or owner of the checked service.
    pub host_name: String,
    /// Set for service checks only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_description: Option<String>,
    /// When the check result was produced; whole seconds on the wire.
    #[serde(with = "chrono::serde::ts_seconds")]
    pub timestamp: DateTime<Utc>,
    /// Attempt number of this check.
    #[serde(default)]
    pub current_attempt: i32,
    /// Attempts before a soft state turns hard.
    #[serde(default)]
    pub max_attempts: i32,
    /// 0 soft, nonzero hard.
    #[serde(default)]
    pub state_type: i32,
    /// Numeric state code, interpreted per entity kind.
    #[serde(default)]
    pub state: i32,
    /// First line of plugin output.
    #[serde(default)]
    pub output: Option<String>,
    /// Remaining plugin output lines.
    #[serde(default)]
    pub long_output: Option<String>,
    /// Performance data, when the core processes it.
    #[serde(default)]
    pub perf_data: Option<String>,
}

impl CheckEvent {
    /// A host check result with zeroed counters and no output.
    #[must_use]
    pub fn host(host_name: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            host_name: host_name.into(),
            service_description: None,
            timestamp,
            current_attempt: 1,
            max_attempts: 1,
            state_type: 0,
            state: 0,
            output: None,
            long_output: None,
            perf_data: None,
        }
    }

    /// A service check result with zeroed counters and no output.
    #[must_use]
    pub fn service(
        host_name: impl Into<String>,
        service_description: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            service_description: Some(service_description.into()),
            ..Self::host(host_name, timestamp)
        }
    }

    #[must_use]
    /// Set state code and state type.
    pub fn with_state(mut self, state: i32, state_type: i32) -> Self {
        self.state = state;
        self.state_type = state_type;
        self
    }

    #[must_use]
    /// Set attempt counters.
    pub fn with_attempts(mut self, current_attempt: i32, max_attempts: i32) -> Self {
        self.current_attempt = current_attempt;
        self.max_attempts = max_attempts;
        self
    }

    #[must_use]
    /// Set the first output line.
    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        self.output = Some(output.into());
        self
    }

    #[must_use]
    /// Set the remaining output lines.
    pub fn with_long_output(mut self, long_output: impl Into<String>) -> Self {
        self.long_output = Some(long_output.into());
        self
    }

    #[must_use]
    /// Set performance data.
    pub fn with_perf_data(mut self, perf_data: impl Into<String>) -> Self {
        self.perf_data = Some(perf_data.into());
        self
    }
}

/// An event as raised by the monitoring core, before any filtering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokerEvent {
    /// Callback the event was raised on.
    pub callback: CallbackKind,
    /// Life-cycle phase of the check.
    pub phase: CheckPhase,
    /// Check data; absent when the core passed nothing usable.
    #[serde(default)]
    pub data: Option<CheckEvent>,
}

impl BrokerEvent {
    /// A processed host or service check, on the callback matching its data.
    #[must_use]
    pub fn processed(data: CheckEvent) -> Self {
        let callback = if data.service_description.is_some() {
            CallbackKind::ServiceCheck
        } else {
            CallbackKind::HostCheck
        };
        Self {
            callback,
            phase: CheckPhase::Processed,
            data: Some(data),
        }
    }

    /// Replace the phase, keeping callback and data.
    #[must_use]
    pub fn in_phase(mut self, phase: CheckPhase) -> Self {
        self.phase = phase;
        self
    }

    /// Entity the event is about, if the payload is well-formed.
    ///
    /// Requires a non-empty host name; service callbacks also need a non-empty
    /// service description and host callbacks must not carry one.
    #[must_use]
    pub fn entity_key(&self) -> Option<EntityKey> {
        let data = self.data.as_ref()?;
        if data.host_name.is_empty() {
            return None;
        }
        match (self.callback, data.service_description.as_deref()) {
            (CallbackKind::HostCheck, None) => Some(EntityKey::host(&data.host_name)),
            (CallbackKind::ServiceCheck, Some(svc)) if !svc.is_empty() => {
                Some(EntityKey::service(&data.host_name, svc))
            }
            _ => None,
        }
    }
}
