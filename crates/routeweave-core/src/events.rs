//! Assembly event system for observability.
//!
//! Emits [`AssemblyEvent`]s via a [`tokio::sync::broadcast`] channel so that
//! observers (loggers, tooling, tests) can follow route assembly without
//! coupling to the weaving engine.

use serde::{Deserialize, Serialize};

/// Events emitted while a context is assembled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssemblyEvent {
    AssemblyStarted {
        context_id: String,
        route_count: usize,
        intercept_count: usize,
    },
    InterceptApplied {
        route_id: String,
        intercept_id: String,
        wrapped: usize,
    },
    OutputsDropped {
        route_id: String,
        intercept_id: String,
        count: usize,
    },
    RouteWoven {
        route_id: String,
        exception_handlers: usize,
        layers: usize,
    },
    AssemblyFailed {
        route_id: String,
        error: String,
    },
    AssemblyCompleted {
        context_id: String,
        route_count: usize,
    },
}

/// Event emitter wrapping a broadcast sender.
#[derive(Clone)]
pub struct EventEmitter {
    sender: tokio::sync::broadcast::Sender<AssemblyEvent>,
}

impl EventEmitter {
    /// Create a new emitter with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = tokio::sync::broadcast::channel(capacity);
        Self { sender }
    }

    /// Emit an event to all current subscribers.
    ///
    /// If there are no active receivers the event is silently dropped.
    pub fn emit(&self, event: AssemblyEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<AssemblyEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventEmitter {
    fn default() -> Self {
        Self::new(256)
    }
}
