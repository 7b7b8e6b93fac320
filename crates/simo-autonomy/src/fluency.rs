use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use simo_core::{Action, Intent, Millis, Origin, RobotMode, SharedClock, Suggestion};
use std::sync::Arc;
use tracing::{debug, info};

use crate::prompt::fluency_prompt;
use crate::reply::{ReplyDecision, ReplyVocabulary};

/// Where an offered next step came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FluencySource {
    /// The next queued step of a multi-clause utterance.
    Sequence,
    /// A repeat of the MOVE that just finished.
    Repeat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FluencyContext {
    pub mode: RobotMode,
    pub safety_blocked: bool,
}

impl FluencyContext {
    /// Suggestions are only offered to an idle, unblocked robot.
    pub fn can_suggest(&self) -> bool {
        self.mode == RobotMode::Idle && !self.safety_blocked
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FluencySuggestion {
    pub action: Action,
    pub prompt: String,
    pub source: FluencySource,
    pub created_at: Millis,
    pub expire_at: Millis,
}

impl FluencySuggestion {
    /// Accepted suggestions carry full confidence and still pass the guard
    /// and the confirmation policy.
    pub fn to_intent(&self, raw_text: &str) -> Intent {
        let origin = match self.source {
            FluencySource::Sequence => Origin::Sequence,
            FluencySource::Repeat => Origin::Fluency,
        };
        Intent::new(self.action, 1.0, raw_text, origin)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FluencyReply {
    NoSuggestion,
    Accepted {
        intent: Intent,
        source: FluencySource,
    },
    Cancelled {
        source: FluencySource,
    },
    Ignored,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FluencyView {
    pub suggested_next: Option<Action>,
    pub prompt: Option<String>,
    pub expires_in_ms: Option<Millis>,
    pub source: Option<FluencySource>,
    pub last_clear_reason: Option<String>,
}

#[derive(Debug, Default)]
struct FluencyInner {
    offered: Option<FluencySuggestion>,
    last_clear_reason: Option<String>,
}

impl FluencyInner {
    fn clear(&mut self, reason: &str) -> bool {
        self.last_clear_reason = Some(reason.to_string());
        match self.offered.take() {
            Some(offered) => {
                debug!(reason, source = ?offered.source, "fluency suggestion cleared");
                true
            }
            None => false,
        }
    }

    fn expire(&mut self, now: Millis) -> Option<FluencySuggestion> {
        if self.offered.as_ref().is_some_and(|o| now >= o.expire_at) {
            let expired = self.offered.take();
            self.last_clear_reason = Some("expired".to_string());
            return expired;
        }
        None
    }
}

/// Motion actions only. Presets are already guaranteed by [`Action`].
fn suggestible(action: Action) -> Option<Action> {
    action.is_motion().then_some(action)
}

/// Repeat only a finished MOVE; never repeat a TURN.
fn repeat_of(last: &Intent) -> Option<Action> {
    match last.action() {
        action @ Action::Move { .. } => Some(action),
        _ => None,
    }
}

/// Offers at most one "shall I continue?" step after an action finishes.
///
/// An offer is advice. It disappears on STOP, a safety block, an unrelated
/// utterance, or TTL expiry, and an accepted offer re-enters the pipeline as
/// a fresh intent.
#[derive(Clone)]
pub struct FluencyManager {
    inner: Arc<Mutex<FluencyInner>>,
    vocabulary: ReplyVocabulary,
    clock: SharedClock,
    ttl_ms: u64,
}

impl FluencyManager {
    pub fn new(clock: SharedClock, ttl_ms: u64) -> Self {
        Self {
            inner: Arc::new(Mutex::new(FluencyInner::default())),
            vocabulary: ReplyVocabulary::FLUENCY,
            clock,
            ttl_ms,
        }
    }

    pub fn with_vocabulary(mut self, vocabulary: ReplyVocabulary) -> Self {
        self.vocabulary = vocabulary;
        self
    }

    /// Called once a motion has finished. Prefers the next queued step and
    /// falls back to repeating the last MOVE.
    pub fn on_action_completed(
        &self,
        last: Option<&Intent>,
        next: Option<&Suggestion>,
        ctx: FluencyContext,
    ) -> Option<FluencySuggestion> {
        let now = self.clock.now_ms();
        let mut inner = self.inner.lock();
        inner.expire(now);

        if !ctx.can_suggest() {
            inner.clear("cannot_suggest");
            return None;
        }

        let (action, source) = match next.and_then(|s| suggestible(s.action)) {
            Some(action) => (action, FluencySource::Sequence),
            None => match last.and_then(repeat_of) {
                Some(action) => (action, FluencySource::Repeat),
                None => {
                    inner.clear("no_suggestion");
                    return None;
                }
            },
        };

        let offered = FluencySuggestion {
            action,
            prompt: fluency_prompt(&action),
            source,
            created_at: now,
            expire_at: now + self.ttl_ms,
        };
        info!(kind = %action.kind(), ?source, prompt = %offered.prompt, "offering next step");
        inner.offered = Some(offered.clone());
        Some(offered)
    }

    /// Clear the offer when the robot became blocked; run before routing a
    /// new utterance.
    pub fn on_user_utterance(&self, safety_blocked: bool) {
        let now = self.clock.now_ms();
        let mut inner = self.inner.lock();
        if safety_blocked {
            inner.clear("safety_blocked");
        }
        inner.expire(now);
    }

    pub fn handle_reply(&self, text: &str) -> FluencyReply {
        let now = self.clock.now_ms();
        let mut inner = self.inner.lock();
        inner.expire(now);

        let Some(source) = inner.offered.as_ref().map(|o| o.source) else {
            return FluencyReply::NoSuggestion;
        };

        match self.vocabulary.parse(text) {
            ReplyDecision::Confirm => {
                let intent = match inner.offered.as_ref() {
                    Some(offered) => offered.to_intent(text),
                    None => return FluencyReply::NoSuggestion,
                };
                inner.clear("accepted");
                FluencyReply::Accepted { intent, source }
            }
            ReplyDecision::Cancel => {
                inner.clear("cancelled");
                FluencyReply::Cancelled { source }
            }
            ReplyDecision::Ignore => FluencyReply::Ignored,
        }
    }

    /// Drop the offer. Returns `false` when there was none.
    pub fn clear(&self, reason: &str) -> bool {
        self.inner.lock().clear(reason)
    }

    /// Expire a stale offer; returns it so callers can react.
    pub fn tick(&self) -> Option<FluencySuggestion> {
        let now = self.clock.now_ms();
        let expired = self.inner.lock().expire(now);
        if let Some(ref offered) = expired {
            debug!(source = ?offered.source, "fluency suggestion expired");
        }
        expired
    }

    /// Live offer present. Stale offers are left for [`FluencyManager::tick`].
    pub fn has_suggestion(&self) -> bool {
        let now = self.clock.now_ms();
        self.inner
            .lock()
            .offered
            .as_ref()
            .is_some_and(|o| now < o.expire_at)
    }

    pub fn view(&self) -> FluencyView {
        let now = self.clock.now_ms();
        let inner = self.inner.lock();
        let live = inner.offered.as_ref().filter(|o| now < o.expire_at);
        FluencyView {
            suggested_next: live.map(|o| o.action),
            prompt: live.map(|o| o.prompt.clone()),
            expires_in_ms: live.map(|o| o.expire_at.saturating_sub(now)),
            source: live.map(|o| o.source),
            last_clear_reason: inner.last_clear_reason.clone(),
        }
    }
}
