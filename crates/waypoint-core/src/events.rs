//! # Observability Hook
//!
//! The engine emits one `EngineEvent` per action step, per navigation hop and
//! per navigation request. Collectors subscribe by implementing `EventSink`;
//! the engine itself neither formats nor persists events.

use crate::action::ActionKind;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

/// A structured engine event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EngineEvent {
    ActionStep {
        kind: ActionKind,
        target: String,
        success: bool,
        matches: usize,
        duration_ms: u64,
    },
    NavigationHop {
        hop: usize,
        from: String,
        to: String,
        success: bool,
        duration_ms: u64,
    },
    Navigation {
        target: String,
        success: bool,
        hops: usize,
        duration_ms: u64,
    },
}

impl EngineEvent {
    #[must_use]
    pub fn success(&self) -> bool {
        match self {
            EngineEvent::ActionStep { success, .. }
            | EngineEvent::NavigationHop { success, .. }
            | EngineEvent::Navigation { success, .. } => *success,
        }
    }
}

/// Receives engine events.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &EngineEvent);
}

impl<T: EventSink + ?Sized> EventSink for Arc<T> {
    fn emit(&self, event: &EngineEvent) {
        (**self).emit(event);
    }
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: &EngineEvent) {}
}

/// Forwards events to `tracing` as structured fields.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: &EngineEvent) {
        match event {
            EngineEvent::ActionStep {
                kind,
                target,
                success,
                matches,
                duration_ms,
            } => tracing::debug!(%kind, on = target.as_str(), success, matches, duration_ms, "action step"),
            EngineEvent::NavigationHop {
                hop,
                from,
                to,
                success,
                duration_ms,
            } => tracing::debug!(hop, from = from.as_str(), to = to.as_str(), success, duration_ms, "navigation hop"),
            EngineEvent::Navigation {
                target,
                success,
                hops,
                duration_ms,
            } => tracing::info!(state = target.as_str(), success, hops, duration_ms, "navigation finished"),
        }
    }
}

/// Keeps every event in memory.
#[derive(Debug, Default)]
pub struct EventLog {
    events: Mutex<Vec<EngineEvent>>,
}

impl EventLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the events received so far.
    #[must_use]
    pub fn events(&self) -> Vec<EngineEvent> {
        self.events
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.events().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        match self.events.lock() {
            Ok(mut guard) => guard.clear(),
            Err(poisoned) => poisoned.into_inner().clear(),
        }
    }
}

impl EventSink for EventLog {
    fn emit(&self, event: &EngineEvent) {
        match self.events.lock() {
            Ok(mut guard) => guard.push(event.clone()),
            Err(poisoned) => poisoned.into_inner().push(event.clone()),
        }
    }
}
