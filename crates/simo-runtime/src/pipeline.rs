use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use simo_autonomy::{
    ConfirmOutcome, ConfirmPolicy, ConfirmView, ConfirmationManager, FluencyContext,
    FluencyManager, FluencyReply, FluencySource, FluencyView, GuardPolicy, QueueState,
    ReplyOutcome, ReplyVocabulary, RobotGuard, RobotSnapshot, SuggestionQueue,
};
use simo_config::SimoConfig;
use simo_core::{
    ChannelStatus, CommandChannel, Event, EventBus, Execution, Intent, IntentKind, MAX_DURATION_MS,
    Origin, Result, RobotMode, SharedClock, Suggestion, SystemClock,
};
use simo_device::RecordingChannel;
use simo_nlu::{LlmCall, LlmParser, NluMerge, OpenAiClient, Parser, RuleParser, Understanding};
use simo_safety::{SafetyArbiter, SafetyMode, SafetyState, SafetyThresholds, SafetyUpdate, SensorSample};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::executor::ChokePoint;
use crate::preempt::Preemptor;

/// What one utterance led to.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PipelineOutcome {
    /// A command reached the controller.
    Executed { intent: Intent, execution: Execution },
    /// The intent was approved but nothing was delivered.
    Failed { intent: Intent, execution: Execution },
    Stopped { execution: Execution },
    Asked { prompt: String },
    Rejected { reason: String },
    Cancelled,
    Expired,
    Answered { answer: String },
    /// A reply that answered nothing; the question still stands.
    Reprompt { prompt: String },
    NotUnderstood,
}

impl PipelineOutcome {
    /// Short user-facing reply.
    pub fn reply(&self) -> String {
        match self {
            PipelineOutcome::Executed { execution, .. } => match &execution.command {
                Some(command) => format!("好的（{command}）"),
                None => "好的".to_string(),
            },
            PipelineOutcome::Failed { execution, .. } => format!(
                "没有执行：{}",
                execution.reason.as_deref().unwrap_or("未知原因")
            ),
            PipelineOutcome::Stopped { .. } => "已停止".to_string(),
            PipelineOutcome::Asked { prompt } | PipelineOutcome::Reprompt { prompt } => {
                prompt.clone()
            }
            PipelineOutcome::Rejected { reason } => format!("不能执行：{reason}"),
            PipelineOutcome::Cancelled => "好的，取消了".to_string(),
            PipelineOutcome::Expired => "确认已超时，请重新说一遍".to_string(),
            PipelineOutcome::Answered { answer } => answer.clone(),
            PipelineOutcome::NotUnderstood => "没听懂，请再说一遍".to_string(),
        }
    }
}

/// Things that happen on their own, reported by [`Pipeline::tick`].
#[derive(Debug, Clone, PartialEq)]
pub enum TickEvent {
    MotionFinished { intent: Intent },
    Offered { prompt: String, source: FluencySource },
    /// With fluency disabled, the next queued step goes straight back in.
    NextStep(PipelineOutcome),
    ConfirmationExpired { prompt: String },
    SuggestionExpired { prompt: String },
}

/// Everything the read-only query surface exposes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineSnapshot {
    pub robot: RobotSnapshot,
    pub confirmation: ConfirmView,
    pub safety: SafetyState,
    pub queue: QueueState,
    pub fluency: FluencyView,
    pub channel: ChannelStatus,
}

impl PipelineSnapshot {
    /// Templated status sentence used to answer QUERY.
    pub fn describe(&self) -> String {
        let mut parts = vec![match self.robot.mode {
            RobotMode::Idle => "我现在停着".to_string(),
            RobotMode::Moving => "我正在移动".to_string(),
            RobotMode::Error => "上一条指令没有送到控制器".to_string(),
        }];
        parts.push(match self.safety.mode {
            SafetyMode::Safe => "周围安全".to_string(),
            SafetyMode::Warning => match self.safety.sensors.distance_cm() {
                Some(cm) => format!("前方大约{cm:.0}厘米有障碍物"),
                None => "前方有障碍物".to_string(),
            },
            SafetyMode::Blocked => "被障碍物挡住了".to_string(),
        });
        if self.queue.remaining > 0 {
            parts.push(format!("还有{}步没做", self.queue.remaining));
        }
        if self.confirmation.awaiting {
            parts.push("正在等你确认".to_string());
        }
        if !self.channel.connected {
            parts.push("控制器没有连接".to_string());
        }
        format!("{}。", parts.join("，"))
    }
}

/// One instance of every component, wired together.
///
/// All methods take `&self`: components are shared handles, and the safety
/// arbiter sits behind its own lock. STOP is handled synchronously before
/// anything else an utterance could trigger.
pub struct Pipeline {
    guard: RobotGuard,
    choke: ChokePoint,
    confirm: ConfirmationManager,
    queue: SuggestionQueue,
    fluency: FluencyManager,
    preemptor: Preemptor,
    safety: Mutex<SafetyArbiter>,
    nlu: NluMerge,
    rules: RuleParser,
    events: EventBus,
    fluency_enabled: bool,
}

impl Pipeline {
    pub fn builder(config: SimoConfig) -> PipelineBuilder {
        PipelineBuilder::new(config)
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn guard(&self) -> &RobotGuard {
        &self.guard
    }

    pub fn confirmation(&self) -> &ConfirmationManager {
        &self.confirm
    }

    pub fn queue(&self) -> &SuggestionQueue {
        &self.queue
    }

    pub fn fluency(&self) -> &FluencyManager {
        &self.fluency
    }

    pub fn channel(&self) -> &Arc<dyn CommandChannel> {
        self.choke.channel()
    }

    pub fn is_safety_blocked(&self) -> bool {
        self.safety.lock().is_blocked()
    }

    // ── Utterances ─────────────────────────────────────────────

    pub async fn handle_text(&self, text: &str) -> PipelineOutcome {
        let text = text.trim();
        if text.is_empty() {
            return PipelineOutcome::NotUnderstood;
        }

        self.fluency.on_user_utterance(self.is_safety_blocked());

        // STOP outranks every pending question
        if let Understanding::Intent(intent) = self.rules.parse(text) {
            if intent.is_stop() {
                return self.stop(&intent);
            }
        }

        if self.confirm.is_awaiting() {
            if let Some(outcome) = self.answer_confirmation(text) {
                return outcome;
            }
        }

        if self.fluency.has_suggestion() {
            if let Some(outcome) = self.answer_fluency(text) {
                return outcome;
            }
        }

        let result = self.nlu.understand(text).await;
        debug!(source = %result.source, confidence = result.confidence, "utterance understood");
        match result.understanding {
            Understanding::Intent(intent) if intent.is_stop() => self.stop(&intent),
            Understanding::Intent(intent) => {
                self.clear_queue("superseded");
                self.submit(intent)
            }
            Understanding::Suggestions(steps) => self.start_sequence(steps, text),
            Understanding::Nothing => PipelineOutcome::NotUnderstood,
        }
    }

    fn stop(&self, intent: &Intent) -> PipelineOutcome {
        PipelineOutcome::Stopped {
            execution: self.preemptor.user_stop(intent),
        }
    }

    fn answer_confirmation(&self, text: &str) -> Option<PipelineOutcome> {
        let request_id = self.confirm.view().pending.map(|p| p.id);
        let outcome = self.confirm.handle_user_reply(text);

        let status = match &outcome {
            ReplyOutcome::NoPending => return None,
            ReplyOutcome::Ignored { prompt } => {
                // a reply that is really a new command still meets the gate
                return Some(match self.rules.parse(text) {
                    Understanding::Intent(intent) => self.submit(intent),
                    _ => PipelineOutcome::Reprompt {
                        prompt: prompt.clone(),
                    },
                });
            }
            ReplyOutcome::Expired { .. } => "expired",
            ReplyOutcome::Confirmed { .. } => "confirmed",
            ReplyOutcome::Cancelled { .. } => "cancelled",
        };
        if let Some(request_id) = request_id {
            self.events.publish(Event::ConfirmationResolved {
                request_id,
                status: status.to_string(),
            });
        }

        Some(match outcome {
            ReplyOutcome::Confirmed { intent, execution } => self.finish(intent, execution),
            ReplyOutcome::Cancelled { intent } => {
                self.fail_step(&intent, "confirmation cancelled");
                PipelineOutcome::Cancelled
            }
            ReplyOutcome::Expired { intent } => {
                self.fail_step(&intent, "confirmation expired");
                PipelineOutcome::Expired
            }
            ReplyOutcome::NoPending | ReplyOutcome::Ignored { .. } => {
                PipelineOutcome::NotUnderstood
            }
        })
    }

    fn answer_fluency(&self, text: &str) -> Option<PipelineOutcome> {
        match self.fluency.handle_reply(text) {
            FluencyReply::NoSuggestion => None,
            FluencyReply::Accepted { intent, source } => {
                self.events.publish(Event::FluencyCleared {
                    reason: "accepted".into(),
                });
                if source == FluencySource::Sequence {
                    self.queue.mark_executing();
                }
                Some(self.submit(intent))
            }
            FluencyReply::Cancelled { source } => {
                self.events.publish(Event::FluencyCleared {
                    reason: "cancelled".into(),
                });
                if source == FluencySource::Sequence {
                    self.queue.mark_failed("declined");
                }
                Some(PipelineOutcome::Cancelled)
            }
            FluencyReply::Ignored => {
                if self.fluency.clear("new_utterance") {
                    self.events.publish(Event::FluencyCleared {
                        reason: "new_utterance".into(),
                    });
                }
                self.clear_queue("superseded");
                None
            }
        }
    }

    fn start_sequence(&self, steps: Vec<Suggestion>, text: &str) -> PipelineOutcome {
        if steps.iter().any(Suggestion::is_stop) {
            return self.stop(&Intent::stop(text));
        }

        self.queue.set_suggestions(steps, text);
        let state = self.queue.state();
        self.events.publish(Event::SuggestionsQueued {
            count: state.total,
            raw_text: text.to_string(),
        });

        let Some(step) = self.queue.peek() else {
            return PipelineOutcome::NotUnderstood;
        };
        self.queue.mark_executing();
        self.submit(step.to_intent())
    }

    /// Guard check, safety gate, then the confirmation policy. The guard only
    /// commits inside the choke point.
    fn submit(&self, intent: Intent) -> PipelineOutcome {
        let decision = self.guard.check(&intent);
        if decision.query {
            if !self.guard.mode().is_moving() {
                return self.answer_query();
            }
        } else if !decision.execute {
            return self.reject(&intent, decision.reason);
        }

        if intent.is_motion() {
            let block = self.safety.lock().block_reason();
            if let Some(block) = block {
                return self.reject(&intent, format!("safety blocked: {}", block.reason));
            }
        }

        match self
            .confirm
            .handle_allowed_intent(intent.clone(), self.guard.mode())
        {
            ConfirmOutcome::Executed(execution) => self.finish(intent, execution),
            ConfirmOutcome::Rejected { reason } => self.reject(&intent, reason),
            ConfirmOutcome::Asked { request_id, prompt } => {
                self.events.publish(Event::ConfirmationRequested {
                    request_id,
                    prompt: prompt.clone(),
                });
                PipelineOutcome::Asked { prompt }
            }
        }
    }

    fn finish(&self, intent: Intent, execution: Execution) -> PipelineOutcome {
        if intent.kind() == IntentKind::Query {
            // a confirmed query while moving was asked as "stop first?"
            if self.guard.mode().is_moving() {
                self.preemptor.user_stop(&Intent::stop(intent.raw_text()));
            }
            return self.answer_query();
        }
        if execution.executed {
            return PipelineOutcome::Executed { intent, execution };
        }
        let reason = execution.reason.clone().unwrap_or_default();
        self.fail_step(&intent, &reason);
        PipelineOutcome::Failed { intent, execution }
    }

    fn reject(&self, intent: &Intent, reason: String) -> PipelineOutcome {
        info!(kind = %intent.kind(), origin = %intent.origin(), %reason, "intent rejected");
        self.events.publish(Event::IntentRejected {
            kind: intent.kind().to_string(),
            reason: reason.clone(),
        });
        self.fail_step(intent, &reason);
        PipelineOutcome::Rejected { reason }
    }

    /// A queued step that did not run takes the rest of the queue with it.
    fn fail_step(&self, intent: &Intent, reason: &str) {
        if intent.origin() == Origin::Sequence && self.queue.is_executing() {
            self.queue.mark_failed(reason);
        }
    }

    fn clear_queue(&self, reason: &str) {
        if self.queue.clear(reason) {
            self.events.publish(Event::SuggestionsCleared {
                reason: reason.to_string(),
            });
        }
    }

    fn answer_query(&self) -> PipelineOutcome {
        PipelineOutcome::Answered {
            answer: self.snapshot().describe(),
        }
    }

    // ── Time ───────────────────────────────────────────────────

    /// Poll every timer once.
    pub fn tick(&self) -> Vec<TickEvent> {
        let mut events = Vec::new();

        if let Some(done) = self.guard.tick() {
            if self.queue.is_executing() {
                self.queue.mark_completed();
            }
            events.push(TickEvent::MotionFinished {
                intent: done.clone(),
            });
            events.extend(self.after_motion(&done));
        }

        if let Some(expired) = self.confirm.tick() {
            self.fail_step(&expired.intent, "confirmation expired");
            self.events.publish(Event::ConfirmationResolved {
                request_id: expired.id,
                status: "expired".into(),
            });
            events.push(TickEvent::ConfirmationExpired {
                prompt: expired.prompt,
            });
        }

        if let Some(expired) = self.fluency.tick() {
            if expired.source == FluencySource::Sequence {
                self.queue.mark_failed("suggestion expired");
            }
            self.events.publish(Event::FluencyCleared {
                reason: "expired".into(),
            });
            events.push(TickEvent::SuggestionExpired {
                prompt: expired.prompt,
            });
        }

        events
    }

    fn after_motion(&self, done: &Intent) -> Option<TickEvent> {
        let next = self.queue.peek();

        if !self.fluency_enabled {
            let step = next?;
            self.queue.mark_executing();
            return Some(TickEvent::NextStep(self.submit(step.to_intent())));
        }

        let ctx = FluencyContext {
            mode: self.guard.mode(),
            safety_blocked: self.is_safety_blocked(),
        };
        let offered = self.fluency.on_action_completed(Some(done), next.as_ref(), ctx);

        // the queue only advances through a sequence offer
        let continues = offered
            .as_ref()
            .is_some_and(|o| o.source == FluencySource::Sequence);
        if next.is_some() && !continues {
            self.clear_queue("sequence_interrupted");
        }

        offered.map(|o| {
            self.events.publish(Event::FluencyOffered {
                prompt: o.prompt.clone(),
                source: source_name(o.source).to_string(),
            });
            TickEvent::Offered {
                prompt: o.prompt,
                source: o.source,
            }
        })
    }

    // ── Sensors ────────────────────────────────────────────────

    pub fn update_sensors(&self, sample: &SensorSample) -> SafetyUpdate {
        let mut safety = self.safety.lock();
        let before = safety.mode();
        let update = safety.update(sample);
        drop(safety);

        match update {
            SafetyUpdate::Warning { distance_cm } if before != SafetyMode::Warning => {
                self.events.publish(Event::SafetyWarning { distance_cm });
            }
            SafetyUpdate::Safe { cleared: true } => self.events.publish(Event::SafetyCleared),
            _ => {}
        }
        update
    }

    /// Read the channel's cached sensors and feed them to the arbiter.
    pub fn poll_sensors(&self) -> SafetyUpdate {
        let data = self.choke.channel().sensor_data();
        self.update_sensors(&SensorSample::from(&data))
    }

    // ── Query surface ──────────────────────────────────────────

    pub fn snapshot(&self) -> PipelineSnapshot {
        PipelineSnapshot {
            robot: self.guard.snapshot(),
            confirmation: self.confirm.view(),
            safety: self.safety.lock().state(),
            queue: self.queue.state(),
            fluency: self.fluency.view(),
            channel: self.choke.channel().status(),
        }
    }

    /// Stop the robot and announce shutdown.
    pub fn shutdown(&self) -> Execution {
        let execution = self.preemptor.force_stop("shutdown", "shutdown");
        self.events.publish(Event::Shutdown);
        execution
    }
}

/// Rules from config, plus the given model or else the one in `[nlu.llm]`.
pub fn nlu_from_config(config: &SimoConfig, llm: Option<Arc<dyn LlmCall>>) -> Result<NluMerge> {
    let llm = match llm {
        Some(llm) => Some(llm),
        None => OpenAiClient::from_config(&config.nlu.llm)?
            .map(|client| Arc::new(client) as Arc<dyn LlmCall>),
    };
    let mut nlu = NluMerge::from_config(config);
    if let Some(llm) = llm {
        let timeout = Duration::from_millis(config.nlu.llm.timeout_ms);
        nlu = nlu.with_llm(LlmParser::new(llm, timeout).with_max_steps(config.sequence.max_steps));
    }
    Ok(nlu)
}

fn source_name(source: FluencySource) -> &'static str {
    match source {
        FluencySource::Sequence => "sequence",
        FluencySource::Repeat => "repeat",
    }
}

/// Builds a [`Pipeline`] from config, with injectable clock, channel and
/// model for tests and the CLI.
pub struct PipelineBuilder {
    config: SimoConfig,
    clock: Option<SharedClock>,
    channel: Option<Arc<dyn CommandChannel>>,
    llm: Option<Arc<dyn LlmCall>>,
    events: Option<EventBus>,
}

impl PipelineBuilder {
    pub fn new(config: SimoConfig) -> Self {
        Self {
            config,
            clock: None,
            channel: None,
            llm: None,
            events: None,
        }
    }

    pub fn with_clock(mut self, clock: SharedClock) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn with_channel(mut self, channel: Arc<dyn CommandChannel>) -> Self {
        self.channel = Some(channel);
        self
    }

    /// Use this model instead of the one in `[nlu.llm]`.
    pub fn with_llm(mut self, llm: Arc<dyn LlmCall>) -> Self {
        self.llm = Some(llm);
        self
    }

    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    pub fn build(self) -> Result<Pipeline> {
        let config = self.config;
        let clock = self.clock.unwrap_or_else(SystemClock::shared);
        let events = self.events.unwrap_or_default();
        let channel = self
            .channel
            .unwrap_or_else(|| Arc::new(RecordingChannel::new()));

        let guard = RobotGuard::new(GuardPolicy::from(&config.guard), clock.clone());
        let choke = ChokePoint::new(guard.clone(), channel, events.clone());

        let max_duration_ms = config.guard.max_duration_ms.min(MAX_DURATION_MS as u64) as u32;
        let confirm = ConfirmationManager::new(
            ConfirmPolicy::from_config(&config.guard, &config.confirm),
            Arc::new(choke.clone()),
            clock.clone(),
            config.confirm.timeout_ms,
        )
        .with_vocabulary(
            ReplyVocabulary::CONFIRMATION.with_permissive_cancel(config.confirm.permissive_cancel),
        )
        .with_max_duration_ms(max_duration_ms);

        let queue = SuggestionQueue::new().with_max_steps(config.sequence.max_steps);
        let fluency = FluencyManager::new(clock.clone(), config.fluency.ttl_ms).with_vocabulary(
            ReplyVocabulary::FLUENCY.with_permissive_cancel(config.confirm.permissive_cancel),
        );

        let preemptor = Preemptor::new(
            choke.clone(),
            confirm.clone(),
            queue.clone(),
            fluency.clone(),
            events.clone(),
        );
        let safety = SafetyArbiter::new(
            SafetyThresholds::from(&config.safety),
            Box::new(preemptor.clone()),
            clock,
        );

        let nlu = nlu_from_config(&config, self.llm)?;

        info!(
            llm = nlu.has_llm(),
            fluency = config.fluency.enabled,
            "pipeline ready"
        );

        Ok(Pipeline {
            guard,
            choke,
            confirm,
            queue,
            fluency,
            preemptor,
            safety: Mutex::new(safety),
            nlu,
            rules: RuleParser::new(),
            events,
            fluency_enabled: config.fluency.enabled,
        })
    }
}
