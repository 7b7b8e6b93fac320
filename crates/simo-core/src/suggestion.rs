use serde::{Deserialize, Serialize};

use crate::intent::{Action, Intent, Origin};

/// Upper bound on steps kept from a single utterance.
pub const MAX_SEQUENCE_STEPS: usize = 5;

/// Confidence assigned when a queued step is turned back into an intent.
pub const SEQUENCE_STEP_CONFIDENCE: f64 = 0.8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SuggestionStatus {
    #[default]
    Pending,
    Executing,
    Completed,
    Failed,
}

/// One advisory step parsed out of a multi-clause utterance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    pub action: Action,
    pub raw_text: String,
    #[serde(default)]
    pub status: SuggestionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fail_reason: Option<String>,
}

impl Suggestion {
    pub fn new(action: Action, raw_text: impl Into<String>) -> Self {
        Self {
            action,
            raw_text: raw_text.into(),
            status: SuggestionStatus::Pending,
            fail_reason: None,
        }
    }

    pub fn stop(raw_text: impl Into<String>) -> Self {
        Self::new(Action::Stop, raw_text)
    }

    pub fn is_stop(&self) -> bool {
        self.action == Action::Stop
    }

    /// Fresh intent for this step. It still has to pass the guard and the
    /// confirmation policy like any other intent.
    pub fn to_intent(&self) -> Intent {
        Intent::new(
            self.action,
            SEQUENCE_STEP_CONFIDENCE,
            self.raw_text.clone(),
            Origin::Sequence,
        )
    }
}

/// A STOP anywhere collapses the list to that single STOP; otherwise the list
/// is truncated to `max_steps`.
pub fn collapse_and_cap(suggestions: Vec<Suggestion>, max_steps: usize) -> Vec<Suggestion> {
    if let Some(stop) = suggestions.iter().find(|s| s.is_stop()) {
        return vec![stop.clone()];
    }
    let mut suggestions = suggestions;
    suggestions.truncate(max_steps);
    suggestions
}
