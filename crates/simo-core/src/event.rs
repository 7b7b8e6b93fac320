use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::sync::Arc;
use tokio::sync::broadcast;

/// Events published by the pipeline for observers (UI, logs, tests).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    // ── Execution ──────────────────────────────────────────────
    CommandSent {
        command: String,
        origin: String,
    },
    TransportFailed {
        command: String,
    },
    ContractViolation {
        rule: String,
        detail: String,
    },
    IntentRejected {
        kind: String,
        reason: String,
    },
    Stopped {
        trigger: String,
    },

    // ── Confirmation ───────────────────────────────────────────
    ConfirmationRequested {
        request_id: Uuid,
        prompt: String,
    },
    ConfirmationResolved {
        request_id: Uuid,
        status: String,
    },

    // ── Safety ─────────────────────────────────────────────────
    SafetyBlocked {
        signal: String,
        source: String,
    },
    SafetyWarning {
        distance_cm: f64,
    },
    SafetyCleared,

    // ── Suggestions ────────────────────────────────────────────
    SuggestionsQueued {
        count: usize,
        raw_text: String,
    },
    SuggestionsCleared {
        reason: String,
    },
    FluencyOffered {
        prompt: String,
        source: String,
    },
    FluencyCleared {
        reason: String,
    },

    // ── System ─────────────────────────────────────────────────
    Shutdown,
}

/// A broadcast-based event bus for pipeline observers.
#[derive(Clone)]
pub struct EventBus {
    sender: Arc<broadcast::Sender<Event>>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn publish(&self, event: Event) {
        // Ignore send errors (no subscribers).
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}
