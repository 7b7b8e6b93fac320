use simo_autonomy::RobotGuard;
use simo_core::{
    CommandChannel, Event, EventBus, Execution, Intent, IntentExecutor, InvariantContext,
    assert_invariant,
};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// The single writer to the command channel.
///
/// Every intent is checked against the execution contract, then committed by
/// the guard, then rendered and sent. Transport failures come back as
/// `executed: false` and are never retried.
#[derive(Clone)]
pub struct ChokePoint {
    guard: RobotGuard,
    channel: Arc<dyn CommandChannel>,
    events: EventBus,
}

impl ChokePoint {
    pub fn new(guard: RobotGuard, channel: Arc<dyn CommandChannel>, events: EventBus) -> Self {
        Self {
            guard,
            channel,
            events,
        }
    }

    pub fn guard(&self) -> &RobotGuard {
        &self.guard
    }

    pub fn channel(&self) -> &Arc<dyn CommandChannel> {
        &self.channel
    }

    /// Reset the guard and send `S` without any checks.
    pub fn emergency_stop(&self, trigger: &str) -> Execution {
        let decision = self.guard.force_stop();
        let command = decision.command.unwrap_or_else(|| "S".to_string());
        warn!(trigger, "emergency stop");
        self.write(&command, trigger, true)
    }

    fn write(&self, command: &str, origin: &str, is_stop: bool) -> Execution {
        if self.channel.send(command) {
            info!(command, origin, "command sent");
            self.events.publish(Event::CommandSent {
                command: command.to_string(),
                origin: origin.to_string(),
            });
            return Execution::sent(command);
        }

        self.events.publish(Event::TransportFailed {
            command: command.to_string(),
        });
        // the guard is already idle after a STOP
        if !is_stop {
            self.guard
                .record_transport_failure(&format!("transport refused {command}"));
        } else {
            warn!(command, "STOP could not be delivered");
        }
        Execution::undelivered(command, "transport not connected")
    }
}

impl IntentExecutor for ChokePoint {
    fn execute(&self, intent: &Intent) -> Execution {
        let ctx = InvariantContext::new(self.guard.mode());
        if let Err(violation) = assert_invariant(&intent.to_frame(), &ctx) {
            error!(
                rule = %violation.rule,
                detail = %violation.detail,
                kind = %intent.kind(),
                origin = %intent.origin(),
                "execution contract violated"
            );
            self.events.publish(Event::ContractViolation {
                rule: violation.rule.to_string(),
                detail: violation.detail.clone(),
            });
            return Execution::refused(violation.to_string());
        }

        let decision = self.guard.should_execute(intent);
        if !decision.execute {
            if !decision.query {
                self.events.publish(Event::IntentRejected {
                    kind: intent.kind().to_string(),
                    reason: decision.reason.clone(),
                });
            }
            return Execution::refused(decision.reason);
        }

        let Some(command) = decision.command else {
            debug!(kind = %intent.kind(), "nothing to send");
            return Execution::refused("intent renders no command");
        };
        self.write(&command, &intent.origin().to_string(), intent.is_stop())
    }
}
