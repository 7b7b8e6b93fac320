#[cfg(test)]
mod tests {
    use parking_lot::Mutex;
    use simo_autonomy::*;
    use simo_core::{
        Action, Direction, DurationPreset, Execution, Intent, IntentExecutor, ManualClock,
        Origin, RobotMode, Suggestion, SuggestionStatus,
    };
    use std::sync::Arc;

    /// Executor that records every intent it is handed.
    #[derive(Default)]
    struct Recorder {
        executed: Mutex<Vec<Intent>>,
    }

    impl IntentExecutor for Recorder {
        fn execute(&self, intent: &Intent) -> Execution {
            self.executed.lock().push(intent.clone());
            match intent.command() {
                Some(cmd) => Execution::sent(cmd),
                None => Execution::refused("nothing to send"),
            }
        }
    }

    fn motion(dir: Direction, preset: DurationPreset, confidence: f64) -> Intent {
        Intent::new(Action::motion(dir, preset), confidence, "test", Origin::Rule)
    }

    // ── Guard ──────────────────────────────────────────────────

    mod guard {
        use super::*;

        fn guard() -> (RobotGuard, ManualClock) {
            let clock = ManualClock::new(1_000);
            (RobotGuard::new(GuardPolicy::default(), clock.shared()), clock)
        }

        #[test]
        fn test_move_enters_moving_and_reverts() {
            let (guard, clock) = guard();
            let intent = motion(Direction::F, DurationPreset::Short, 0.9);
            let decision = guard.should_execute(&intent);
            assert!(decision.execute);
            assert_eq!(decision.command.as_deref(), Some("F,400"));
            assert_eq!(guard.mode(), RobotMode::Moving);

            clock.advance(400);
            assert!(guard.tick().is_none());
            clock.advance(100);
            let done = guard.tick().unwrap();
            assert_eq!(done.kind(), simo_core::IntentKind::Move);
            assert_eq!(guard.mode(), RobotMode::Idle);
        }

        #[test]
        fn test_rejects_motion_while_moving() {
            let (guard, _clock) = guard();
            guard.should_execute(&motion(Direction::F, DurationPreset::Medium, 0.9));
            let second = guard.should_execute(&motion(Direction::L, DurationPreset::Short, 0.9));
            assert!(!second.execute);
            assert!(second.reason.contains("already moving"));
            assert_eq!(guard.snapshot().last_reject.as_deref(), Some(second.reason.as_str()));
        }

        #[test]
        fn test_stop_always_executes() {
            let (guard, _clock) = guard();
            guard.should_execute(&motion(Direction::B, DurationPreset::Long, 0.9));
            let stop = guard.should_execute(&Intent::stop("停"));
            assert!(stop.execute);
            assert_eq!(stop.command.as_deref(), Some("S"));
            assert_eq!(guard.mode(), RobotMode::Idle);
            assert!(guard.snapshot().revert_in_ms.is_none());
        }

        #[test]
        fn test_low_confidence_and_none_rejected() {
            let (guard, _clock) = guard();
            let low = guard.should_execute(&motion(Direction::F, DurationPreset::Short, 0.79));
            assert!(!low.execute);
            assert!(low.reason.contains("confidence"));
            let none = guard.should_execute(&Intent::none("嗯？"));
            assert!(!none.execute);
            assert_eq!(none.reason, "intent unclear");
        }

        #[test]
        fn test_query_answers_without_command() {
            let (guard, _clock) = guard();
            let q = Intent::new(Action::Query, 0.9, "状态", Origin::Rule);
            let decision = guard.check(&q);
            assert!(!decision.execute);
            assert!(decision.query);
            assert!(decision.command.is_none());
        }

        #[test]
        fn test_check_does_not_commit() {
            let (guard, _clock) = guard();
            let decision = guard.check(&motion(Direction::F, DurationPreset::Short, 0.9));
            assert!(decision.execute);
            assert_eq!(guard.mode(), RobotMode::Idle);
        }

        #[test]
        fn test_force_stop_and_transport_failure() {
            let (guard, _clock) = guard();
            guard.should_execute(&motion(Direction::F, DurationPreset::Short, 0.9));
            guard.record_transport_failure("link down");
            assert_eq!(guard.mode(), RobotMode::Error);
            let forced = guard.force_stop();
            assert_eq!(forced.command.as_deref(), Some("S"));
            assert_eq!(guard.mode(), RobotMode::Idle);
            assert_eq!(
                guard.snapshot().last_intent.unwrap().raw_text(),
                "[FORCE_STOP]"
            );
        }

        #[test]
        fn test_beep_leaves_mode() {
            let (guard, _clock) = guard();
            let beep = Intent::new(Action::Beep, 0.9, "叫一声", Origin::Rule);
            assert!(guard.should_execute(&beep).execute);
            assert_eq!(guard.mode(), RobotMode::Idle);
        }
    }

    // ── Confirmation ───────────────────────────────────────────

    mod confirm {
        use super::*;

        fn manager() -> (ConfirmationManager, Arc<Recorder>, ManualClock) {
            let clock = ManualClock::new(10_000);
            let recorder = Arc::new(Recorder::default());
            let manager = ConfirmationManager::new(
                ConfirmPolicy::default(),
                recorder.clone(),
                clock.shared(),
                5_000,
            );
            (manager, recorder, clock)
        }

        #[test]
        fn test_clamp_duration() {
            assert_eq!(clamp_duration_ms(Some(10.0), 3000), 50);
            assert_eq!(clamp_duration_ms(Some(9_999.0), 3000), 3000);
            assert_eq!(clamp_duration_ms(Some(812.6), 3000), 813);
            assert_eq!(clamp_duration_ms(Some(f64::NAN), 3000), 800);
            assert_eq!(clamp_duration_ms(None, 3000), 800);
        }

        #[test]
        fn test_policy_rules() {
            let policy = ConfirmPolicy::default();
            let ctx = ConfirmContext {
                mode: RobotMode::Idle,
                last_kind: None,
                last_stop_at: None,
                turn_streak: 0,
                now: 10_000,
            };
            assert!(!policy.need_confirm(&Intent::stop("停"), &ctx));
            assert!(policy.need_confirm(&motion(Direction::F, DurationPreset::Short, 0.82), &ctx));
            assert!(!policy.need_confirm(&motion(Direction::F, DurationPreset::Medium, 0.9), &ctx));
            assert!(policy.need_confirm(&motion(Direction::F, DurationPreset::Long, 0.9), &ctx));

            let after_turn = ConfirmContext {
                last_kind: Some(simo_core::IntentKind::Turn),
                turn_streak: 1,
                ..ctx
            };
            assert!(policy.need_confirm(&motion(Direction::L, DurationPreset::Short, 0.9), &after_turn));

            let after_stop = ConfirmContext {
                last_stop_at: Some(9_000),
                ..ctx
            };
            assert!(policy.need_confirm(&motion(Direction::F, DurationPreset::Short, 0.9), &after_stop));

            let moving = ConfirmContext {
                mode: RobotMode::Moving,
                ..ctx
            };
            let q = Intent::new(Action::Query, 0.9, "状态", Origin::Rule);
            assert!(policy.need_confirm(&q, &moving));
            assert!(!policy.need_confirm(&q, &ctx));
        }

        #[test]
        fn test_beep_never_asks() {
            let policy = ConfirmPolicy::default();
            let beep = Intent::new(Action::Beep, 0.82, "叫一声", Origin::Rule);
            let just_stopped = ConfirmContext {
                mode: RobotMode::Idle,
                last_kind: Some(simo_core::IntentKind::Stop),
                last_stop_at: Some(9_900),
                turn_streak: 0,
                now: 10_000,
            };
            assert!(!policy.need_confirm(&beep, &just_stopped));
        }

        #[test]
        fn test_plain_intent_executes() {
            let (manager, recorder, _clock) = manager();
            let outcome = manager.handle_allowed_intent(
                motion(Direction::F, DurationPreset::Medium, 0.9),
                RobotMode::Idle,
            );
            assert!(matches!(outcome, ConfirmOutcome::Executed(ref e) if e.executed));
            assert_eq!(recorder.executed.lock().len(), 1);
        }

        #[test]
        fn test_long_move_asks_then_confirms() {
            let (manager, recorder, _clock) = manager();
            let outcome = manager.handle_allowed_intent(
                motion(Direction::F, DurationPreset::Long, 0.9),
                RobotMode::Idle,
            );
            let ConfirmOutcome::Asked { prompt, .. } = outcome else {
                panic!("expected a question, got {outcome:?}");
            };
            assert_eq!(prompt, "要向前走一段吗？（大约1200毫秒）");
            assert!(manager.is_awaiting());
            assert!(recorder.executed.lock().is_empty());

            let reply = manager.handle_user_reply("好的");
            assert!(matches!(reply, ReplyOutcome::Confirmed { .. }));
            assert_eq!(recorder.executed.lock().len(), 1);
            assert!(!manager.is_awaiting());
            assert_eq!(manager.view().state, ConfirmState::Confirmed);
        }

        #[test]
        fn test_cancel_and_ignore() {
            let (manager, recorder, _clock) = manager();
            manager.handle_allowed_intent(
                motion(Direction::B, DurationPreset::Long, 0.9),
                RobotMode::Idle,
            );
            assert!(matches!(
                manager.handle_user_reply("今天天气"),
                ReplyOutcome::Ignored { .. }
            ));
            assert!(manager.is_awaiting());
            assert!(matches!(
                manager.handle_user_reply("还是不要了"),
                ReplyOutcome::Cancelled { .. }
            ));
            assert!(recorder.executed.lock().is_empty());
            assert_eq!(manager.handle_user_reply("好"), ReplyOutcome::NoPending);
        }

        #[test]
        fn test_expired_reply() {
            let (manager, recorder, clock) = manager();
            manager.handle_allowed_intent(
                motion(Direction::F, DurationPreset::Long, 0.9),
                RobotMode::Idle,
            );
            clock.advance(5_000);
            assert!(matches!(
                manager.handle_user_reply("好"),
                ReplyOutcome::Expired { .. }
            ));
            assert!(recorder.executed.lock().is_empty());
        }

        #[test]
        fn test_tick_sweeps_expired() {
            let (manager, _recorder, clock) = manager();
            manager.handle_allowed_intent(
                motion(Direction::F, DurationPreset::Long, 0.9),
                RobotMode::Idle,
            );
            clock.advance(4_999);
            assert!(manager.tick().is_none());
            clock.advance(1);
            assert!(manager.tick().is_some());
            assert!(!manager.is_awaiting());
        }

        #[test]
        fn test_pending_rejects_new_intent_but_not_stop() {
            let (manager, recorder, _clock) = manager();
            manager.handle_allowed_intent(
                motion(Direction::F, DurationPreset::Long, 0.9),
                RobotMode::Idle,
            );
            let other = manager.handle_allowed_intent(
                motion(Direction::L, DurationPreset::Short, 0.9),
                RobotMode::Idle,
            );
            assert!(matches!(other, ConfirmOutcome::Rejected { .. }));

            let stop = manager.handle_allowed_intent(Intent::stop("停"), RobotMode::Idle);
            assert!(matches!(stop, ConfirmOutcome::Executed(_)));
            assert!(!manager.is_awaiting());
            assert_eq!(recorder.executed.lock().len(), 1);
            assert!(recorder.executed.lock()[0].is_stop());
        }

        #[test]
        fn test_force_stop_clears_and_settles() {
            let (manager, recorder, clock) = manager();
            manager.handle_allowed_intent(
                motion(Direction::F, DurationPreset::Long, 0.9),
                RobotMode::Idle,
            );
            assert!(manager.force_stop().is_some());
            assert!(!manager.is_awaiting());
            assert!(recorder.executed.lock().is_empty());

            // Right after a stop, even a short move is asked about.
            clock.advance(500);
            let outcome = manager.handle_allowed_intent(
                motion(Direction::F, DurationPreset::Short, 0.9),
                RobotMode::Idle,
            );
            assert!(matches!(outcome, ConfirmOutcome::Asked { .. }));
        }

        #[test]
        fn test_second_turn_needs_confirmation() {
            let (manager, _recorder, _clock) = manager();
            let first = manager.handle_allowed_intent(
                motion(Direction::L, DurationPreset::Short, 0.9),
                RobotMode::Idle,
            );
            assert!(matches!(first, ConfirmOutcome::Executed(_)));
            let second = manager.handle_allowed_intent(
                motion(Direction::R, DurationPreset::Short, 0.9),
                RobotMode::Idle,
            );
            let ConfirmOutcome::Asked { prompt, .. } = second else {
                panic!("expected a question");
            };
            assert!(prompt.starts_with("要继续右转吗"));
        }
    }

    // ── Suggestion queue ───────────────────────────────────────

    mod queue {
        use super::*;

        fn steps() -> Vec<Suggestion> {
            vec![
                Suggestion::new(Action::motion(Direction::F, DurationPreset::Medium), "前进"),
                Suggestion::new(Action::motion(Direction::L, DurationPreset::Medium), "左转"),
                Suggestion::new(Action::motion(Direction::B, DurationPreset::Short), "后退"),
            ]
        }

        #[test]
        fn test_walks_through_steps() {
            let queue = SuggestionQueue::new();
            queue.set_suggestions(steps(), "前进然后左转再后退");
            assert_eq!(queue.state().status, QueueStatus::HasSuggestions);

            queue.mark_executing();
            assert!(queue.is_executing());
            queue.mark_completed();
            let state = queue.state();
            assert_eq!(state.current, 1);
            assert_eq!(state.remaining, 2);
            assert!(state.steps[0].is_completed);
            assert!(state.steps[1].is_current);

            queue.mark_completed();
            queue.mark_completed();
            assert!(!queue.has_pending());
            assert_eq!(queue.state().status, QueueStatus::Empty);
            assert_eq!(queue.state().total, 0);
        }

        #[test]
        fn test_failure_discards_rest() {
            let queue = SuggestionQueue::new();
            queue.set_suggestions(steps(), "x");
            queue.mark_completed();
            queue.mark_failed("guard rejected");
            let state = queue.state();
            assert_eq!(state.status, QueueStatus::Empty);
            assert_eq!(state.total, 2);
            assert_eq!(state.steps[1].suggestion.status, SuggestionStatus::Failed);
            assert_eq!(
                state.steps[1].suggestion.fail_reason.as_deref(),
                Some("guard rejected")
            );
            assert!(!queue.has_pending());
            assert!(queue.peek().is_none());
        }

        fn forward_steps(n: usize) -> Vec<Suggestion> {
            (0..n)
                .map(|_| Suggestion::new(Action::motion(Direction::F, DurationPreset::Short), "前进"))
                .collect()
        }

        #[test]
        fn test_caps_long_lists() {
            let queue = SuggestionQueue::new();
            queue.set_suggestions(forward_steps(7), "一直往前");
            assert_eq!(queue.state().total, 5);

            let short = SuggestionQueue::new().with_max_steps(2);
            short.set_suggestions(forward_steps(7), "一直往前");
            assert_eq!(short.state().total, 2);
        }

        #[test]
        fn test_stop_collapses_list() {
            let queue = SuggestionQueue::new();
            let mut list = forward_steps(7);
            list.insert(3, Suggestion::stop("停"));
            queue.set_suggestions(list, "前进前进前进停");

            let state = queue.state();
            assert_eq!(state.total, 1);
            assert!(queue.peek().is_some_and(|s| s.is_stop()));
        }

        #[test]
        fn test_clear_is_noop_when_empty() {
            let queue = SuggestionQueue::new();
            assert!(!queue.clear("stop"));
            queue.set_suggestions(steps(), "x");
            assert!(queue.clear("stop"));
            assert!(queue.peek().is_none());
        }

        #[test]
        fn test_state_serializes_snake_case() {
            let queue = SuggestionQueue::new();
            queue.set_suggestions(steps(), "x");
            let json = serde_json::to_value(queue.state()).unwrap();
            assert_eq!(json["status"], "has_suggestions");
            assert_eq!(json["steps"][0]["is_current"], true);
            assert_eq!(json["steps"][0]["status"], "PENDING");
        }
    }

    // ── Fluency ────────────────────────────────────────────────

    mod fluency {
        use super::*;

        const IDLE: FluencyContext = FluencyContext {
            mode: RobotMode::Idle,
            safety_blocked: false,
        };

        fn manager() -> (FluencyManager, ManualClock) {
            let clock = ManualClock::new(0);
            (FluencyManager::new(clock.shared(), 5_000), clock)
        }

        #[test]
        fn test_repeats_last_move() {
            let (fluency, _clock) = manager();
            let last = motion(Direction::F, DurationPreset::Medium, 0.9);
            let offered = fluency.on_action_completed(Some(&last), None, IDLE).unwrap();
            assert_eq!(offered.source, FluencySource::Repeat);
            assert_eq!(offered.prompt, "我可以继续向前走，要继续吗？");
            assert!(fluency.has_suggestion());
        }

        #[test]
        fn test_never_repeats_turn() {
            let (fluency, _clock) = manager();
            let last = motion(Direction::L, DurationPreset::Short, 0.9);
            assert!(fluency.on_action_completed(Some(&last), None, IDLE).is_none());
            assert_eq!(
                fluency.view().last_clear_reason.as_deref(),
                Some("no_suggestion")
            );
        }

        #[test]
        fn test_prefers_queued_step() {
            let (fluency, _clock) = manager();
            let last = motion(Direction::F, DurationPreset::Medium, 0.9);
            let next = Suggestion::new(Action::motion(Direction::R, DurationPreset::Short), "右转");
            let offered = fluency
                .on_action_completed(Some(&last), Some(&next), IDLE)
                .unwrap();
            assert_eq!(offered.source, FluencySource::Sequence);
            assert_eq!(offered.action.direction(), Some(Direction::R));
        }

        #[test]
        fn test_blocked_or_moving_never_suggests() {
            let (fluency, _clock) = manager();
            let last = motion(Direction::F, DurationPreset::Medium, 0.9);
            let blocked = FluencyContext {
                safety_blocked: true,
                ..IDLE
            };
            assert!(fluency.on_action_completed(Some(&last), None, blocked).is_none());
            let moving = FluencyContext {
                mode: RobotMode::Moving,
                ..IDLE
            };
            assert!(fluency.on_action_completed(Some(&last), None, moving).is_none());
        }

        #[test]
        fn test_accept_yields_fresh_intent() {
            let (fluency, _clock) = manager();
            let last = motion(Direction::B, DurationPreset::Short, 0.85);
            fluency.on_action_completed(Some(&last), None, IDLE);
            let FluencyReply::Accepted { intent, source } = fluency.handle_reply("要") else {
                panic!("expected acceptance");
            };
            assert_eq!(source, FluencySource::Repeat);
            assert_eq!(intent.confidence(), 1.0);
            assert_eq!(intent.origin(), Origin::Fluency);
            assert_eq!(intent.command().as_deref(), Some("B,400"));
            assert!(!fluency.has_suggestion());
        }

        #[test]
        fn test_cancel_ignore_and_expiry() {
            let (fluency, clock) = manager();
            let last = motion(Direction::F, DurationPreset::Short, 0.9);
            fluency.on_action_completed(Some(&last), None, IDLE);
            assert_eq!(fluency.handle_reply("你好"), FluencyReply::Ignored);
            assert!(matches!(
                fluency.handle_reply("不了"),
                FluencyReply::Cancelled { .. }
            ));

            fluency.on_action_completed(Some(&last), None, IDLE);
            clock.advance(5_000);
            assert!(!fluency.has_suggestion());
            assert!(fluency.tick().is_some());
            assert_eq!(fluency.handle_reply("好"), FluencyReply::NoSuggestion);
        }

        #[test]
        fn test_clear_returns_whether_dropped() {
            let (fluency, _clock) = manager();
            assert!(!fluency.clear("stop"));
            let last = motion(Direction::F, DurationPreset::Short, 0.9);
            fluency.on_action_completed(Some(&last), None, IDLE);
            fluency.on_user_utterance(true);
            assert!(!fluency.has_suggestion());
            assert_eq!(
                fluency.view().last_clear_reason.as_deref(),
                Some("safety_blocked")
            );
        }
    }

    // ── Reply vocabulary ───────────────────────────────────────

    mod reply {
        use super::*;

        #[test]
        fn test_confirmation_words() {
            let v = ReplyVocabulary::CONFIRMATION;
            assert_eq!(v.parse(" 确认 "), ReplyDecision::Confirm);
            assert_eq!(v.parse("好的"), ReplyDecision::Confirm);
            assert_eq!(v.parse("行啊"), ReplyDecision::Confirm);
            assert_eq!(v.parse("取消"), ReplyDecision::Cancel);
            assert_eq!(v.parse("我觉得不太好"), ReplyDecision::Cancel);
            assert_eq!(v.parse("往前"), ReplyDecision::Ignore);
        }

        #[test]
        fn test_strict_cancel() {
            let v = ReplyVocabulary::CONFIRMATION.with_permissive_cancel(false);
            assert_eq!(v.parse("我觉得不太好"), ReplyDecision::Ignore);
            assert_eq!(v.parse("不行"), ReplyDecision::Cancel);
        }
    }
}
