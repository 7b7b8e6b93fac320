use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use simo_core::{MAX_SEQUENCE_STEPS, Suggestion, SuggestionStatus, collapse_and_cap};
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueStatus {
    #[default]
    Empty,
    HasSuggestions,
    Executing,
}

/// One step as shown in [`QueueState`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepView {
    #[serde(flatten)]
    pub suggestion: Suggestion,
    pub is_current: bool,
    pub is_completed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueState {
    pub status: QueueStatus,
    pub total: usize,
    pub current: usize,
    pub remaining: usize,
    pub raw_text: Option<String>,
    pub steps: Vec<StepView>,
}

#[derive(Debug, Default)]
struct QueueInner {
    steps: Vec<Suggestion>,
    current: usize,
    status: QueueStatus,
    raw_text: Option<String>,
}

impl QueueInner {
    fn reset(&mut self) {
        self.steps.clear();
        self.current = 0;
        self.status = QueueStatus::Empty;
        self.raw_text = None;
    }
}

/// Advisory steps from one multi-clause utterance.
///
/// A queue is not a plan: each peeked step becomes a fresh intent that must
/// pass the guard and the confirmation policy. Nothing here executes.
#[derive(Clone)]
pub struct SuggestionQueue {
    inner: Arc<RwLock<QueueInner>>,
    max_steps: usize,
}

impl Default for SuggestionQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl SuggestionQueue {
    pub fn new() -> Self {
        Self {
            inner: Arc::default(),
            max_steps: MAX_SEQUENCE_STEPS,
        }
    }

    /// Lower the step cap. Never above [`MAX_SEQUENCE_STEPS`].
    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps.clamp(1, MAX_SEQUENCE_STEPS);
        self
    }

    /// Replace the queue. An empty list clears it; a STOP anywhere leaves
    /// only that STOP, and the list is capped.
    pub fn set_suggestions(&self, suggestions: Vec<Suggestion>, raw_text: &str) {
        let suggestions = collapse_and_cap(suggestions, self.max_steps);
        let mut inner = self.inner.write();
        if suggestions.is_empty() {
            inner.reset();
            return;
        }
        inner.steps = suggestions
            .into_iter()
            .map(|mut s| {
                s.status = SuggestionStatus::Pending;
                s.fail_reason = None;
                s
            })
            .collect();
        inner.current = 0;
        inner.status = QueueStatus::HasSuggestions;
        inner.raw_text = Some(raw_text.to_string());
        info!(count = inner.steps.len(), raw_text, "suggestions queued");
    }

    /// Current step, without removing it.
    pub fn peek(&self) -> Option<Suggestion> {
        let inner = self.inner.read();
        inner.steps.get(inner.current).cloned()
    }

    pub fn mark_executing(&self) {
        let mut inner = self.inner.write();
        let current = inner.current;
        if let Some(step) = inner.steps.get_mut(current) {
            step.status = SuggestionStatus::Executing;
            inner.status = QueueStatus::Executing;
        }
    }

    /// Whether the current step has been handed to the guard and not yet
    /// resolved.
    pub fn is_executing(&self) -> bool {
        self.inner.read().status == QueueStatus::Executing
    }

    /// Finish the current step and move on. Clears the queue when the last
    /// step completes.
    pub fn mark_completed(&self) {
        let mut inner = self.inner.write();
        let current = inner.current;
        let Some(step) = inner.steps.get_mut(current) else {
            return;
        };
        step.status = SuggestionStatus::Completed;
        inner.current += 1;
        if inner.current >= inner.steps.len() {
            info!("all suggestions completed");
            inner.reset();
        } else {
            inner.status = QueueStatus::HasSuggestions;
        }
    }

    /// Fail the current step and discard every step after it. The failed
    /// step stays visible with its reason.
    pub fn mark_failed(&self, reason: &str) {
        let mut inner = self.inner.write();
        let current = inner.current;
        let Some(step) = inner.steps.get_mut(current) else {
            return;
        };
        step.status = SuggestionStatus::Failed;
        step.fail_reason = Some(reason.to_string());
        let dropped = inner.steps.len() - current - 1;
        inner.steps.truncate(current + 1);
        inner.current = inner.steps.len();
        inner.status = QueueStatus::Empty;
        info!(reason, dropped, "suggestion failed, remaining steps discarded");
    }

    /// Drop everything. Returns `false` when there was nothing to drop.
    pub fn clear(&self, reason: &str) -> bool {
        let mut inner = self.inner.write();
        if inner.steps.is_empty() {
            return false;
        }
        debug!(reason, "suggestion queue cleared");
        inner.reset();
        true
    }

    pub fn has_pending(&self) -> bool {
        let inner = self.inner.read();
        inner.current < inner.steps.len()
    }

    pub fn remaining(&self) -> usize {
        let inner = self.inner.read();
        inner.steps.len().saturating_sub(inner.current)
    }

    pub fn state(&self) -> QueueState {
        let inner = self.inner.read();
        QueueState {
            status: inner.status,
            total: inner.steps.len(),
            current: inner.current,
            remaining: inner.steps.len().saturating_sub(inner.current),
            raw_text: inner.raw_text.clone(),
            steps: inner
                .steps
                .iter()
                .enumerate()
                .map(|(i, s)| StepView {
                    suggestion: s.clone(),
                    is_current: i == inner.current,
                    is_completed: s.status == SuggestionStatus::Completed,
                })
                .collect(),
        }
    }
}
