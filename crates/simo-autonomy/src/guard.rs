use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use simo_core::{
    Action, EXECUTION_THRESHOLD, Intent, IntentKind, Millis, OneShotTimer, Origin, RobotMode,
    SharedClock,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Thresholds the guard enforces.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GuardPolicy {
    pub execute_threshold: f64,
    pub revert_grace_ms: u64,
}

impl Default for GuardPolicy {
    fn default() -> Self {
        Self {
            execute_threshold: EXECUTION_THRESHOLD,
            revert_grace_ms: 100,
        }
    }
}

impl From<&simo_config::GuardConfig> for GuardPolicy {
    fn from(config: &simo_config::GuardConfig) -> Self {
        Self {
            execute_threshold: config.execute_threshold,
            revert_grace_ms: config.revert_grace_ms,
        }
    }
}

/// The guard's answer for one intent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuardDecision {
    pub execute: bool,
    pub reason: String,
    pub command: Option<String>,
    /// Set for QUERY: nothing to execute, answer from state instead.
    #[serde(default)]
    pub query: bool,
}

impl GuardDecision {
    fn allow(reason: &str, command: Option<String>) -> Self {
        Self {
            execute: true,
            reason: reason.to_string(),
            command,
            query: false,
        }
    }

    fn reject(reason: String) -> Self {
        Self {
            execute: false,
            reason,
            command: None,
            query: false,
        }
    }
}

/// Read-only view of the robot state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RobotSnapshot {
    pub mode: RobotMode,
    pub last_intent: Option<Intent>,
    pub state_changed_at: Millis,
    /// Time spent in the current mode.
    pub uptime_ms: Millis,
    pub last_reject: Option<String>,
    /// Time until a moving robot is considered idle again.
    pub revert_in_ms: Option<Millis>,
}

#[derive(Debug)]
struct GuardState {
    mode: RobotMode,
    last_intent: Option<Intent>,
    state_changed_at: Millis,
    last_reject: Option<String>,
    revert: OneShotTimer,
}

impl GuardState {
    fn set_mode(&mut self, mode: RobotMode, now: Millis) {
        self.mode = mode;
        self.state_changed_at = now;
    }
}

/// Owns [`RobotMode`] and decides whether an intent may execute.
///
/// Mode only changes through [`RobotGuard::should_execute`],
/// [`RobotGuard::force_stop`], the revert timer in [`RobotGuard::tick`], and a
/// reported transport failure.
#[derive(Clone)]
pub struct RobotGuard {
    state: Arc<RwLock<GuardState>>,
    policy: GuardPolicy,
    clock: SharedClock,
}

impl RobotGuard {
    pub fn new(policy: GuardPolicy, clock: SharedClock) -> Self {
        let now = clock.now_ms();
        Self {
            state: Arc::new(RwLock::new(GuardState {
                mode: RobotMode::Idle,
                last_intent: None,
                state_changed_at: now,
                last_reject: None,
                revert: OneShotTimer::new(),
            })),
            policy,
            clock,
        }
    }

    pub fn mode(&self) -> RobotMode {
        self.state.read().mode
    }

    /// Evaluate without committing anything. Used to reject early, before a
    /// confirmation question is asked.
    pub fn check(&self, intent: &Intent) -> GuardDecision {
        let mode = self.state.read().mode;
        self.evaluate(intent, mode)
    }

    /// Evaluate and commit: STOP resets to idle, MOVE/TURN enter `moving` and
    /// arm the revert timer.
    pub fn should_execute(&self, intent: &Intent) -> GuardDecision {
        let now = self.clock.now_ms();
        let mut state = self.state.write();
        let decision = self.evaluate(intent, state.mode);

        if !decision.execute {
            if !decision.query {
                info!(kind = %intent.kind(), reason = %decision.reason, "guard rejected intent");
                state.last_reject = Some(decision.reason.clone());
            }
            return decision;
        }

        match intent.action() {
            Action::Stop => {
                state.revert.cancel();
                state.set_mode(RobotMode::Idle, now);
                state.last_intent = Some(intent.clone());
            }
            Action::Move { duration, .. } | Action::Turn { duration, .. } => {
                let due = now + u64::from(duration.ms()) + self.policy.revert_grace_ms;
                state.revert.arm(due);
                state.set_mode(RobotMode::Moving, now);
                state.last_intent = Some(intent.clone());
                debug!(kind = %intent.kind(), due, "robot moving");
            }
            // BEEP leaves state alone
            _ => {}
        }
        decision
    }

    fn evaluate(&self, intent: &Intent, mode: RobotMode) -> GuardDecision {
        match intent.kind() {
            IntentKind::Stop => GuardDecision::allow("STOP executes immediately", intent.command()),
            IntentKind::None => GuardDecision::reject("intent unclear".to_string()),
            _ if intent.confidence() < self.policy.execute_threshold => {
                GuardDecision::reject(format!(
                    "confidence below threshold ({:.2} < {})",
                    intent.confidence(),
                    self.policy.execute_threshold
                ))
            }
            IntentKind::Move | IntentKind::Turn if mode.is_moving() => {
                GuardDecision::reject("already moving; stop first".to_string())
            }
            IntentKind::Query => GuardDecision {
                execute: false,
                reason: "query needs no hardware action".to_string(),
                command: None,
                query: true,
            },
            IntentKind::Beep => GuardDecision::allow("buzzer test", intent.command()),
            IntentKind::Move | IntentKind::Turn => {
                GuardDecision::allow("passed all checks", intent.command())
            }
        }
    }

    /// Unconditional reset to idle. Always available, also mid-callback.
    pub fn force_stop(&self) -> GuardDecision {
        let now = self.clock.now_ms();
        let mut state = self.state.write();
        state.revert.cancel();
        state.set_mode(RobotMode::Idle, now);
        state.last_intent = Some(Intent::new(Action::Stop, 1.0, "[FORCE_STOP]", Origin::Rule));
        GuardDecision::allow("forced stop", Some("S".to_string()))
    }

    /// The last committed command never reached the controller.
    pub fn record_transport_failure(&self, reason: &str) {
        let now = self.clock.now_ms();
        let mut state = self.state.write();
        warn!(reason, "command not delivered, guard entering error state");
        state.revert.cancel();
        state.set_mode(RobotMode::Error, now);
        state.last_reject = Some(reason.to_string());
    }

    /// Poll the revert timer. Returns the intent that just finished when a
    /// motion completes.
    pub fn tick(&self) -> Option<Intent> {
        let now = self.clock.now_ms();
        let mut state = self.state.write();
        if !state.revert.fire_if_due(now) || state.mode != RobotMode::Moving {
            return None;
        }
        state.set_mode(RobotMode::Idle, now);
        debug!("motion finished, robot idle");
        state.last_intent.clone()
    }

    pub fn snapshot(&self) -> RobotSnapshot {
        let now = self.clock.now_ms();
        let state = self.state.read();
        RobotSnapshot {
            mode: state.mode,
            last_intent: state.last_intent.clone(),
            state_changed_at: state.state_changed_at,
            uptime_ms: now.saturating_sub(state.state_changed_at),
            last_reject: state.last_reject.clone(),
            revert_in_ms: state.revert.remaining(now),
        }
    }

    pub fn reset(&self) {
        let now = self.clock.now_ms();
        let mut state = self.state.write();
        state.revert.cancel();
        state.set_mode(RobotMode::Idle, now);
        state.last_intent = None;
        state.last_reject = None;
    }
}
