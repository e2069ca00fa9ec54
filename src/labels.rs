//! Human-readable renderings of state codes.
//!
//! The tables are plain data so the snapshot pipeline stays one code path for
//! both entity kinds.

use crate::entity::EntityKind;

/// A code-to-label table with a fallback for codes outside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateLabels {
    labels: &'static [&'static str],
    fallback: &'static str,
}

impl StateLabels {
    /// Build a table; `labels[i]` renders code `i`.
    #[must_use]
    pub const fn new(labels: &'static [&'static str], fallback: &'static str) -> Self {
        Self { labels, fallback }
    }

    /// Label for `code`, or the fallback.
    #[must_use]
    pub fn label(&self, code: i32) -> &'static str {
        usize::try_from(code)
            .ok()
            .and_then(|i| self.labels.get(i))
            .copied()
            .unwrap_or(self.fallback)
    }
}

/// Host states: 0 UP, 1 DOWN, 2 UNREACHABLE.
pub const HOST_STATES: StateLabels = StateLabels::new(&["UP", "DOWN", "UNREACHABLE"], "(unknown)");

/// Service states: 0 OK, 1 WARNING, 2 CRITICAL.
pub const SERVICE_STATES: StateLabels = StateLabels::new(&["OK", "WARNING", "CRITICAL"], "UNKNOWN");

/// State table for an entity kind.
#[must_use]
pub const fn state_labels(kind: EntityKind) -> &'static StateLabels {
    match kind {
        EntityKind::Host => &HOST_STATES,
        EntityKind::Service => &SERVICE_STATES,
    }
}

/// `HARD` for a confirmed state (any nonzero state type), `SOFT` otherwise.
#[must_use]
pub const fn state_type_label(state_type: i32) -> &'static str {
    if state_type != 0 {
        "HARD"
    } else {
        "SOFT"
    }
}
