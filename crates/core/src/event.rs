//! Domain event system: decoupled observation of the runtime.
//!
//! The orchestrator, fallback chain, and session sweeper publish events;
//! anything interested (logs, metrics, a UI) can subscribe without coupling.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// How a turn ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnOutcome {
    Done,
    MaxTurns,
    ProvidersExhausted,
}

/// All domain events in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DomainEvent {
    /// A `run_turn` call finished and its exchange was appended to history
    TurnCompleted {
        session_id: String,
        outcome: TurnOutcome,
        model_steps: u32,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// A tool was dispatched
    ToolExecuted {
        session_id: String,
        tool_name: String,
        success: bool,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// A provider candidate failed a call
    ProviderFailed {
        provider: String,
        model: String,
        kind: String,
        message: String,
        timestamp: DateTime<Utc>,
    },

    /// A provider candidate was taken out of rotation after an auth failure
    ProviderDisabled {
        provider: String,
        model: String,
        timestamp: DateTime<Utc>,
    },

    /// Idle sessions were evicted
    SessionsSwept {
        evicted: usize,
        remaining: usize,
        timestamp: DateTime<Utc>,
    },
}

/// A broadcast-based event bus for domain events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub.
pub struct EventBus {
    sender: broadcast::Sender<Arc<DomainEvent>>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: DomainEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DomainEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
