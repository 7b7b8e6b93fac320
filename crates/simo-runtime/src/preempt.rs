use simo_autonomy::{ConfirmationManager, FluencyManager, SuggestionQueue};
use simo_core::{Event, EventBus, Execution, Intent, IntentExecutor};
use simo_safety::{SafetySignal, SensorSource, StopHandler};
use tracing::info;

use crate::executor::ChokePoint;

/// Everything a STOP has to reach.
///
/// Holds handles, not owners, so it can run from inside the safety arbiter's
/// update without touching the arbiter itself.
#[derive(Clone)]
pub struct Preemptor {
    choke: ChokePoint,
    confirm: ConfirmationManager,
    queue: SuggestionQueue,
    fluency: FluencyManager,
    events: EventBus,
}

impl Preemptor {
    pub fn new(
        choke: ChokePoint,
        confirm: ConfirmationManager,
        queue: SuggestionQueue,
        fluency: FluencyManager,
        events: EventBus,
    ) -> Self {
        Self {
            choke,
            confirm,
            queue,
            fluency,
            events,
        }
    }

    /// A spoken (or model-produced) STOP. Runs the intent through the
    /// choke point so the guard records it as the last intent.
    pub fn user_stop(&self, intent: &Intent) -> Execution {
        let execution = self.choke.execute(intent);
        self.cascade("user", "stop");
        execution
    }

    /// Unconditional STOP from anywhere else: safety, shutdown.
    pub fn force_stop(&self, trigger: &str, reason: &str) -> Execution {
        let execution = self.choke.emergency_stop(trigger);
        self.cascade(trigger, reason);
        execution
    }

    fn cascade(&self, trigger: &str, reason: &str) {
        if let Some(request) = self.confirm.force_stop() {
            self.events.publish(Event::ConfirmationResolved {
                request_id: request.id,
                status: "stopped".into(),
            });
        }
        if self.queue.clear(reason) {
            self.events.publish(Event::SuggestionsCleared {
                reason: reason.to_string(),
            });
        }
        if self.fluency.clear(reason) {
            self.events.publish(Event::FluencyCleared {
                reason: reason.to_string(),
            });
        }
        info!(trigger, reason, "stopped");
        self.events.publish(Event::Stopped {
            trigger: trigger.to_string(),
        });
    }
}

impl StopHandler for Preemptor {
    fn stop_now(&self, signal: SafetySignal, source: SensorSource) {
        self.events.publish(Event::SafetyBlocked {
            signal: signal.to_string(),
            source: source.to_string(),
        });
        self.force_stop(&format!("safety:{signal}"), "safety_blocked");
    }
}
