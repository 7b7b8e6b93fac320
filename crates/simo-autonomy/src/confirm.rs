use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use simo_core::{Execution, Intent, IntentExecutor, IntentKind, Millis, RobotMode, SharedClock};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::prompt::confirmation_prompt;
use crate::reply::{ReplyDecision, ReplyVocabulary};

/// Duration assumed when a pending intent carries no usable value.
const FALLBACK_DURATION_MS: u32 = 800;
const MIN_DURATION_MS: u32 = 50;

/// Clamp a duration into `[50, max_ms]`, rounding; non-finite or missing
/// values become 800.
pub fn clamp_duration_ms(ms: Option<f64>, max_ms: u32) -> u32 {
    match ms {
        Some(ms) if ms.is_finite() => {
            ms.round().clamp(f64::from(MIN_DURATION_MS), f64::from(max_ms)) as u32
        }
        _ => FALLBACK_DURATION_MS,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfirmState {
    #[default]
    Idle,
    Awaiting,
    Confirmed,
    Cancelled,
}

/// What the confirmation policy looks at besides the intent itself.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfirmContext {
    pub mode: RobotMode,
    pub last_kind: Option<IntentKind>,
    pub last_stop_at: Option<Millis>,
    pub turn_streak: u32,
    pub now: Millis,
}

/// Which intents need a human "yes" before they run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfirmPolicy {
    pub execute_threshold: f64,
    pub boundary_upper: f64,
    pub long_move_ms: u32,
    pub stop_settle_ms: u64,
}

impl Default for ConfirmPolicy {
    fn default() -> Self {
        Self {
            execute_threshold: 0.8,
            boundary_upper: 0.85,
            long_move_ms: 800,
            stop_settle_ms: 1500,
        }
    }
}

impl ConfirmPolicy {
    pub fn from_config(guard: &simo_config::GuardConfig, confirm: &simo_config::ConfirmConfig) -> Self {
        Self {
            execute_threshold: guard.execute_threshold,
            boundary_upper: confirm.boundary_upper,
            long_move_ms: confirm.long_move_ms,
            stop_settle_ms: confirm.stop_settle_ms,
        }
    }

    /// Pure policy check. STOP, NONE and the BEEP diagnostic never need
    /// confirmation.
    pub fn need_confirm(&self, intent: &Intent, ctx: &ConfirmContext) -> bool {
        let kind = intent.kind();
        if matches!(kind, IntentKind::Stop | IntentKind::None | IntentKind::Beep) {
            return false;
        }

        let confidence = intent.confidence();
        if confidence >= self.execute_threshold && confidence < self.boundary_upper {
            return true;
        }

        if kind == IntentKind::Move
            && intent.duration_ms().unwrap_or(0) > self.long_move_ms
        {
            return true;
        }

        if kind == IntentKind::Turn
            && (ctx.last_kind == Some(IntentKind::Turn) || ctx.turn_streak >= 1)
        {
            return true;
        }

        if let Some(stopped_at) = ctx.last_stop_at {
            if ctx.now.saturating_sub(stopped_at) < self.stop_settle_ms {
                return true;
            }
        }

        kind == IntentKind::Query && ctx.mode.is_moving()
    }
}

/// A question waiting for an answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfirmationRequest {
    pub id: Uuid,
    pub intent: Intent,
    /// Clamped duration shown to the user.
    pub duration_ms: u32,
    pub prompt: String,
    pub asked_at: Millis,
    pub timeout_at: Millis,
}

/// Result of [`ConfirmationManager::handle_allowed_intent`].
#[derive(Debug, Clone, PartialEq)]
pub enum ConfirmOutcome {
    Executed(Execution),
    Rejected { reason: String },
    Asked { request_id: Uuid, prompt: String },
}

/// Result of [`ConfirmationManager::handle_user_reply`].
#[derive(Debug, Clone, PartialEq)]
pub enum ReplyOutcome {
    NoPending,
    Expired { intent: Intent },
    Confirmed { intent: Intent, execution: Execution },
    Cancelled { intent: Intent },
    Ignored { prompt: String },
}

/// Read-only view of the confirmation layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfirmView {
    pub state: ConfirmState,
    pub awaiting: bool,
    pub pending: Option<ConfirmationRequest>,
    pub prompt: Option<String>,
    pub expires_in_ms: Option<Millis>,
}

#[derive(Debug, Default)]
struct ConfirmInner {
    state: ConfirmState,
    pending: Option<ConfirmationRequest>,
    last_kind: Option<IntentKind>,
    last_stop_at: Option<Millis>,
    turn_streak: u32,
}

impl ConfirmInner {
    fn take_pending(&mut self, next: ConfirmState) -> Option<ConfirmationRequest> {
        self.state = next;
        self.pending.take()
    }

    fn sweep_expired(&mut self, now: Millis) -> Option<ConfirmationRequest> {
        match &self.pending {
            Some(p) if now >= p.timeout_at => self.take_pending(ConfirmState::Idle),
            _ => None,
        }
    }

    /// Context bookkeeping after an intent is handed to the executor.
    fn note_executed(&mut self, kind: IntentKind, now: Millis) {
        match kind {
            IntentKind::Stop => {
                self.last_stop_at = Some(now);
                self.turn_streak = 0;
            }
            IntentKind::Turn => self.turn_streak += 1,
            _ => self.turn_streak = 0,
        }
        self.last_kind = Some(kind);
    }
}

/// Human-in-the-loop gate between the guard and the execution choke point.
///
/// Holds at most one pending question. Execution goes through the injected
/// [`IntentExecutor`]; the manager's lock is never held while executing.
#[derive(Clone)]
pub struct ConfirmationManager {
    inner: Arc<Mutex<ConfirmInner>>,
    policy: ConfirmPolicy,
    vocabulary: ReplyVocabulary,
    executor: Arc<dyn IntentExecutor>,
    clock: SharedClock,
    timeout_ms: u64,
    max_duration_ms: u32,
}

impl ConfirmationManager {
    pub fn new(
        policy: ConfirmPolicy,
        executor: Arc<dyn IntentExecutor>,
        clock: SharedClock,
        timeout_ms: u64,
    ) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ConfirmInner::default())),
            policy,
            vocabulary: ReplyVocabulary::CONFIRMATION,
            executor,
            clock,
            timeout_ms,
            max_duration_ms: 3000,
        }
    }

    pub fn with_vocabulary(mut self, vocabulary: ReplyVocabulary) -> Self {
        self.vocabulary = vocabulary;
        self
    }

    pub fn with_max_duration_ms(mut self, max_ms: u32) -> Self {
        self.max_duration_ms = max_ms;
        self
    }

    pub fn policy(&self) -> &ConfirmPolicy {
        &self.policy
    }

    pub fn is_awaiting(&self) -> bool {
        self.inner.lock().pending.is_some()
    }

    pub fn context(&self, mode: RobotMode) -> ConfirmContext {
        let inner = self.inner.lock();
        ConfirmContext {
            mode,
            last_kind: inner.last_kind,
            last_stop_at: inner.last_stop_at,
            turn_streak: inner.turn_streak,
            now: self.clock.now_ms(),
        }
    }

    /// Route an intent the guard has already accepted.
    pub fn handle_allowed_intent(&self, intent: Intent, mode: RobotMode) -> ConfirmOutcome {
        let now = self.clock.now_ms();

        if intent.is_stop() {
            {
                let mut inner = self.inner.lock();
                if inner.take_pending(ConfirmState::Idle).is_some() {
                    debug!("pending confirmation dropped by STOP");
                }
                inner.note_executed(IntentKind::Stop, now);
            }
            return ConfirmOutcome::Executed(self.executor.execute(&intent));
        }

        let mut inner = self.inner.lock();
        if let Some(expired) = inner.sweep_expired(now) {
            debug!(request_id = %expired.id, "pending confirmation expired");
        }
        if inner.pending.is_some() {
            return ConfirmOutcome::Rejected {
                reason: "awaiting confirmation; answer the pending question first".to_string(),
            };
        }

        let ctx = ConfirmContext {
            mode,
            last_kind: inner.last_kind,
            last_stop_at: inner.last_stop_at,
            turn_streak: inner.turn_streak,
            now,
        };

        if self.policy.need_confirm(&intent, &ctx) {
            let duration_ms = match intent.duration_ms() {
                Some(ms) => clamp_duration_ms(Some(f64::from(ms)), self.max_duration_ms),
                None => 0,
            };
            let prompt = confirmation_prompt(&intent, mode, duration_ms);
            let request = ConfirmationRequest {
                id: Uuid::new_v4(),
                intent: intent.clone(),
                duration_ms,
                prompt: prompt.clone(),
                asked_at: now,
                timeout_at: now + self.timeout_ms,
            };
            info!(request_id = %request.id, kind = %intent.kind(), %prompt, "asking for confirmation");
            let request_id = request.id;
            inner.pending = Some(request);
            inner.state = ConfirmState::Awaiting;
            return ConfirmOutcome::Asked { request_id, prompt };
        }

        inner.note_executed(intent.kind(), now);
        drop(inner);
        ConfirmOutcome::Executed(self.executor.execute(&intent))
    }

    /// Interpret a reply to the pending question.
    pub fn handle_user_reply(&self, text: &str) -> ReplyOutcome {
        let now = self.clock.now_ms();
        let mut inner = self.inner.lock();

        let Some(timeout_at) = inner.pending.as_ref().map(|p| p.timeout_at) else {
            return ReplyOutcome::NoPending;
        };

        if now >= timeout_at {
            return match inner.take_pending(ConfirmState::Idle) {
                Some(expired) => {
                    info!(request_id = %expired.id, "reply arrived after confirmation expired");
                    ReplyOutcome::Expired {
                        intent: expired.intent,
                    }
                }
                None => ReplyOutcome::NoPending,
            };
        }

        match self.vocabulary.parse(text) {
            ReplyDecision::Confirm => {
                let Some(request) = inner.take_pending(ConfirmState::Confirmed) else {
                    return ReplyOutcome::NoPending;
                };
                inner.note_executed(request.intent.kind(), now);
                drop(inner);
                info!(request_id = %request.id, "confirmation accepted");
                let execution = self.executor.execute(&request.intent);
                ReplyOutcome::Confirmed {
                    intent: request.intent,
                    execution,
                }
            }
            ReplyDecision::Cancel => match inner.take_pending(ConfirmState::Cancelled) {
                Some(request) => {
                    info!(request_id = %request.id, "confirmation cancelled");
                    ReplyOutcome::Cancelled {
                        intent: request.intent,
                    }
                }
                None => ReplyOutcome::NoPending,
            },
            ReplyDecision::Ignore => ReplyOutcome::Ignored {
                prompt: inner
                    .pending
                    .as_ref()
                    .map(|p| p.prompt.clone())
                    .unwrap_or_default(),
            },
        }
    }

    /// Drop any pending question and remember the stop. Always available,
    /// independent of timeout. Does not execute anything itself.
    pub fn force_stop(&self) -> Option<ConfirmationRequest> {
        let now = self.clock.now_ms();
        let mut inner = self.inner.lock();
        inner.note_executed(IntentKind::Stop, now);
        inner.take_pending(ConfirmState::Idle)
    }

    /// Sweep an expired question; returns it so callers can react.
    pub fn tick(&self) -> Option<ConfirmationRequest> {
        let now = self.clock.now_ms();
        let expired = self.inner.lock().sweep_expired(now);
        if let Some(ref request) = expired {
            info!(request_id = %request.id, "confirmation timed out");
        }
        expired
    }

    pub fn view(&self) -> ConfirmView {
        let now = self.clock.now_ms();
        let inner = self.inner.lock();
        ConfirmView {
            state: inner.state,
            awaiting: inner.pending.is_some(),
            pending: inner.pending.clone(),
            prompt: inner.pending.as_ref().map(|p| p.prompt.clone()),
            expires_in_ms: inner
                .pending
                .as_ref()
                .map(|p| p.timeout_at.saturating_sub(now)),
        }
    }
}

