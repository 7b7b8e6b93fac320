#[cfg(test)]
mod tests {
    use simo_core::{Action, Direction, DurationPreset, IntentKind, Origin, SimoError};
    use simo_nlu::*;
    use std::sync::Arc;
    use std::time::Duration;

    fn intent_of(u: Understanding) -> simo_core::Intent {
        match u {
            Understanding::Intent(intent) => intent,
            other => panic!("expected an intent, got {other:?}"),
        }
    }

    // ── Rule parser ────────────────────────────────────────────

    mod rules {
        use super::*;

        #[test]
        fn test_basic_directions() {
            let p = RuleParser::new();
            let fwd = intent_of(p.parse("前进"));
            assert_eq!(fwd.action(), Action::motion(Direction::F, DurationPreset::Medium));
            assert_eq!(fwd.confidence(), 0.85);
            assert_eq!(fwd.origin(), Origin::Rule);

            assert_eq!(intent_of(p.parse("左转")).direction(), Some(Direction::L));
            assert_eq!(intent_of(p.parse("向右")).direction(), Some(Direction::R));
            assert_eq!(intent_of(p.parse("往后退")).direction(), Some(Direction::B));
            assert_eq!(intent_of(p.parse("go forward")).direction(), Some(Direction::F));
        }

        #[test]
        fn test_duration_modifiers() {
            let p = RuleParser::new();
            assert_eq!(
                intent_of(p.parse("后退一点")).duration(),
                Some(DurationPreset::Short)
            );
            assert_eq!(
                intent_of(p.parse("往前走多一点")).duration(),
                Some(DurationPreset::Long)
            );
        }

        #[test]
        fn test_stop_has_priority() {
            let p = RuleParser::new();
            for text in ["停", "别动", "STOP", "等一下再往前", "站住"] {
                let intent = intent_of(p.parse(text));
                assert!(intent.is_stop(), "{text} should stop");
                assert_eq!(intent.confidence(), 0.95);
            }
        }

        #[test]
        fn test_beep_and_query() {
            let p = RuleParser::new();
            let beep = intent_of(p.parse("叫一声"));
            assert_eq!(beep.kind(), IntentKind::Beep);
            assert_eq!(beep.confidence(), 0.9);
            assert_eq!(intent_of(p.parse("你现在什么状态")).kind(), IntentKind::Query);
        }

        #[test]
        fn test_side_step_defaults_right() {
            let intent = intent_of(RuleParser::new().parse("让开"));
            assert_eq!(intent.direction(), Some(Direction::R));
            assert_eq!(intent.confidence(), 0.7);
        }

        #[test]
        fn test_unrelated_text() {
            let p = RuleParser::new();
            assert!(p.parse("今天天气不错").is_nothing());
            assert!(p.parse("   ").is_nothing());
        }
    }

    // ── Sequence segmenter ─────────────────────────────────────

    mod sequence {
        use super::*;

        #[test]
        fn test_two_steps() {
            let steps = SequenceParser::default().suggestions("前进然后左转");
            assert_eq!(steps.len(), 2);
            assert_eq!(steps[0].action, Action::motion(Direction::F, DurationPreset::Medium));
            assert_eq!(steps[1].action, Action::motion(Direction::L, DurationPreset::Medium));
            assert_eq!(steps[1].raw_text, "左转");
        }

        #[test]
        fn test_stop_collapses() {
            let steps = SequenceParser::default().suggestions("前进然后停");
            assert_eq!(steps.len(), 1);
            assert!(steps[0].is_stop());
        }

        #[test]
        fn test_capped_at_five() {
            let steps = SequenceParser::default().suggestions("前进，后退，左转，右转，前进，后退");
            assert_eq!(steps.len(), 5);
            assert!(SequenceParser::new(2).suggestions("前进，后退，左转").len() == 2);
        }

        #[test]
        fn test_non_motion_clauses_dropped() {
            let steps = SequenceParser::default().suggestions("叫一声然后前进");
            assert_eq!(steps.len(), 1);
            assert_eq!(steps[0].action.direction(), Some(Direction::F));
        }
    }

    // ── Merge ──────────────────────────────────────────────────

    mod merge {
        use super::*;

        fn with_llm(llm: MockLlm) -> NluMerge {
            NluMerge::default().with_llm(LlmParser::new(Arc::new(llm), Duration::from_millis(200)))
        }

        #[tokio::test]
        async fn test_sequence_beats_single_rule() {
            let result = NluMerge::default().understand("前进然后左转").await;
            assert_eq!(result.source, NluSource::RuleSequence);
            assert_eq!(result.confidence, 0.8);
            let Understanding::Suggestions(steps) = result.understanding else {
                panic!("expected suggestions");
            };
            assert_eq!(steps.len(), 2);
            assert_eq!(steps[0].action.direction(), Some(Direction::F));
        }

        #[tokio::test]
        async fn test_single_rule() {
            let result = NluMerge::default().understand("后退").await;
            assert_eq!(result.source, NluSource::Rule);
            assert_eq!(intent_of(result.understanding).direction(), Some(Direction::B));
        }

        #[tokio::test]
        async fn test_nothing_without_llm() {
            let merge = NluMerge::default();
            assert!(!merge.has_llm());
            let result = merge.understand("唱首歌").await;
            assert_eq!(result.source, NluSource::None);
            assert_eq!(result.confidence, 0.0);
            assert_eq!(merge.understand("").await.source, NluSource::None);
        }

        #[tokio::test]
        async fn test_rules_skip_llm() {
            let llm = MockLlm::new();
            let merge = with_llm(llm.clone());
            merge.understand("前进").await;
            assert_eq!(llm.call_count(), 0);
        }

        #[tokio::test]
        async fn test_llm_single_becomes_intent() {
            let llm = MockLlm::new().with_response(
                r#"{"suggestions":[{"intent":"TURN","direction":"L","duration_ms":1200}],"confidence":0.9}"#,
            );
            let result = with_llm(llm.clone()).understand("唱首歌").await;
            assert_eq!(result.source, NluSource::Llm);
            let intent = intent_of(result.understanding);
            assert_eq!(intent.action(), Action::motion(Direction::L, DurationPreset::Long));
            assert_eq!(intent.confidence(), 0.9);
            assert_eq!(intent.origin(), Origin::Llm);
            assert_eq!(*llm.calls.lock(), vec!["唱首歌".to_string()]);
        }

        #[tokio::test]
        async fn test_llm_sequence() {
            let llm = MockLlm::new().with_response(
                r#"Sure: {"suggestions":[{"intent":"MOVE","direction":"F","duration_ms":800},{"intent":"TURN","direction":"R","duration_ms":400}],"confidence":1.7}"#,
            );
            let result = with_llm(llm).understand("绕一下桌子").await;
            assert_eq!(result.source, NluSource::LlmSequence);
            assert_eq!(result.confidence, 1.0);
            let Understanding::Suggestions(steps) = result.understanding else {
                panic!("expected suggestions");
            };
            assert_eq!(steps.len(), 2);
        }

        #[tokio::test]
        async fn test_llm_stop_collapses() {
            let llm = MockLlm::new().with_response(
                r#"{"suggestions":[{"intent":"MOVE","direction":"F","duration_ms":800},{"intent":"STOP"}],"confidence":0.9}"#,
            );
            let result = with_llm(llm).understand("唱首歌").await;
            assert_eq!(result.source, NluSource::Llm);
            assert!(intent_of(result.understanding).is_stop());
        }

        #[tokio::test]
        async fn test_llm_failures_mean_nothing() {
            let llm = MockLlm::new()
                .with_error("boom")
                .with_response("I think you want to dance")
                .with_response(r#"{"suggestions":[{"intent":"DANCE"}],"confidence":0.9}"#);
            let merge = with_llm(llm.clone());
            for _ in 0..3 {
                assert_eq!(merge.understand("唱首歌").await.source, NluSource::None);
            }
            assert_eq!(llm.call_count(), 3);
        }
    }

    // ── LLM parser ─────────────────────────────────────────────

    mod llm {
        use super::*;

        #[tokio::test]
        async fn test_timeout() {
            let llm = MockLlm::new().with_reply(
                MockReply::text(r#"{"suggestions":[],"confidence":0}"#)
                    .delayed(Duration::from_millis(500)),
            );
            let parser = LlmParser::new(Arc::new(llm), Duration::from_millis(20));
            let err = parser.parse("唱首歌").await.unwrap_err();
            assert!(matches!(err, SimoError::LlmTimeout(20)));
        }

        #[tokio::test]
        async fn test_unparseable() {
            let llm = MockLlm::new().with_response("no json");
            let parser = LlmParser::new(Arc::new(llm), Duration::from_secs(1));
            assert!(matches!(
                parser.parse("x").await.unwrap_err(),
                SimoError::UnparseableOutput(_)
            ));
        }

        #[tokio::test]
        async fn test_missing_confidence_is_zero() {
            let llm = MockLlm::new().with_response(
                r#"{"suggestions":[{"intent":"MOVE","direction":"B","duration_ms":390}]}"#,
            );
            let parser = LlmParser::new(Arc::new(llm), Duration::from_secs(1));
            let out = parser.parse("x").await.unwrap();
            assert_eq!(out.confidence, 0.0);
            assert_eq!(out.suggestions[0].action.duration(), Some(DurationPreset::Short));
        }

        #[test]
        fn test_prompt_lists_closed_vocabulary() {
            assert!(SYSTEM_PROMPT.contains("MOVE(F=前进, B=后退)"));
            assert!(SYSTEM_PROMPT.contains("[400, 800, 1200]"));
        }
    }
}
