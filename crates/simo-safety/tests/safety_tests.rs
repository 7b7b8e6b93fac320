#[cfg(test)]
mod tests {
    use parking_lot::Mutex;
    use simo_core::{ManualClock, SensorData};
    use simo_safety::*;
    use std::sync::Arc;

    fn arbiter() -> (SafetyArbiter, Arc<Mutex<Vec<(SafetySignal, SensorSource)>>>) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&calls);
        let stop = move |signal: SafetySignal, source: SensorSource| {
            sink.lock().push((signal, source));
        };
        let arbiter = SafetyArbiter::new(
            SafetyThresholds::default(),
            Box::new(stop),
            ManualClock::new(0).shared(),
        );
        (arbiter, calls)
    }

    // ── Transition tests ───────────────────────────────────────

    mod transitions {
        use super::*;

        #[test]
        fn test_close_obstacle_blocks_and_stops_once() {
            let (mut arbiter, calls) = arbiter();
            let update = arbiter.update(&SensorSample::ultrasonic(5.0));
            assert_eq!(
                update,
                SafetyUpdate::Triggered {
                    signal: SafetySignal::ObstacleNear,
                    source: SensorSource::Ultrasonic
                }
            );
            assert!(arbiter.is_blocked());

            // Same hazard again: no second stop.
            assert_eq!(
                arbiter.update(&SensorSample::ultrasonic(4.0)),
                SafetyUpdate::StillBlocked
            );
            assert_eq!(calls.lock().len(), 1);
        }

        #[test]
        fn test_clear_sample_lifts_block() {
            let (mut arbiter, _calls) = arbiter();
            arbiter.update(&SensorSample::ultrasonic(5.0));
            assert_eq!(
                arbiter.update(&SensorSample::ultrasonic(40.0)),
                SafetyUpdate::Safe { cleared: true }
            );
            assert!(!arbiter.is_blocked());
            assert_eq!(arbiter.mode(), SafetyMode::Safe);
            assert!(arbiter.block_reason().is_none());
        }

        #[test]
        fn test_retrigger_after_clear() {
            let (mut arbiter, calls) = arbiter();
            arbiter.update(&SensorSample::ultrasonic(5.0));
            arbiter.update(&SensorSample::ultrasonic(40.0));
            arbiter.update(&SensorSample::ultrasonic(6.0));
            assert_eq!(calls.lock().len(), 2);
        }

        #[test]
        fn test_warning_band() {
            let (mut arbiter, calls) = arbiter();
            assert_eq!(
                arbiter.update(&SensorSample::ultrasonic(10.0)),
                SafetyUpdate::Warning { distance_cm: 10.0 }
            );
            assert_eq!(arbiter.mode(), SafetyMode::Warning);
            assert!(!arbiter.is_blocked());
            assert!(calls.lock().is_empty());

            let state = arbiter.state();
            assert_eq!(state.reason, Some(SafetySignal::ObstacleNear));
            assert_eq!(state.source, Some(SensorSource::Ultrasonic));
            assert!(arbiter.block_reason().is_none());
        }

        #[test]
        fn test_new_hazard_while_blocked_updates_reason() {
            let (mut arbiter, calls) = arbiter();
            arbiter.update(&SensorSample::infrared(0, 0));
            assert_eq!(
                arbiter.update(&SensorSample::ultrasonic(5.0)),
                SafetyUpdate::StillBlocked
            );
            assert_eq!(
                arbiter.block_reason(),
                Some(BlockReason {
                    reason: SafetySignal::ObstacleNear,
                    source: SensorSource::Ultrasonic
                })
            );
            assert_eq!(calls.lock().len(), 1);
        }

        #[test]
        fn test_block_is_sticky_through_warning() {
            let (mut arbiter, _calls) = arbiter();
            arbiter.update(&SensorSample::ultrasonic(5.0));
            assert_eq!(
                arbiter.update(&SensorSample::ultrasonic(12.0)),
                SafetyUpdate::StillBlocked
            );
            assert!(arbiter.is_blocked());
        }

        #[test]
        fn test_both_ir_blocked() {
            let (mut arbiter, calls) = arbiter();
            let update = arbiter.update(&SensorSample::infrared(0, 0));
            assert!(matches!(
                update,
                SafetyUpdate::Triggered {
                    signal: SafetySignal::SideBlocked,
                    source: SensorSource::Infrared
                }
            ));
            assert_eq!(
                arbiter.block_reason(),
                Some(BlockReason {
                    reason: SafetySignal::SideBlocked,
                    source: SensorSource::Infrared
                })
            );
            assert_eq!(calls.lock().len(), 1);
        }

        #[test]
        fn test_single_ir_is_safe() {
            let (mut arbiter, _calls) = arbiter();
            assert_eq!(
                arbiter.update(&SensorSample::infrared(0, 1)),
                SafetyUpdate::Safe { cleared: false }
            );
        }

        #[test]
        fn test_warning_outranks_infrared() {
            let (mut arbiter, calls) = arbiter();
            let sample = SensorSample {
                ultrasonic_cm: Some(12.0),
                ir_left: Some(0),
                ir_right: Some(0),
            };
            assert!(matches!(arbiter.update(&sample), SafetyUpdate::Warning { .. }));
            assert!(calls.lock().is_empty());
        }

        #[test]
        fn test_zero_distance_means_no_echo() {
            let (mut arbiter, calls) = arbiter();
            assert_eq!(
                arbiter.update(&SensorSample::ultrasonic(0.0)),
                SafetyUpdate::Safe { cleared: false }
            );
            assert!(calls.lock().is_empty());
        }
    }

    // ── Cache tests ────────────────────────────────────────────

    mod cache {
        use super::*;

        #[test]
        fn test_partial_samples_merge() {
            let (mut arbiter, _calls) = arbiter();
            arbiter.update(&SensorSample::ultrasonic(30.0));
            arbiter.update(&SensorSample::infrared(1, 0));
            let state = arbiter.state();
            assert_eq!(state.sensors.ultrasonic_cm, Some(30.0));
            assert_eq!(state.sensors.ir_right, Some(0));
        }

        #[test]
        fn test_from_sensor_data() {
            let mut data = SensorData::default();
            data.ultrasonic.distance = Some(7.5);
            data.infrared.left = Some(1);
            let sample = SensorSample::from(&data);
            assert_eq!(sample.ultrasonic_cm, Some(7.5));
            assert_eq!(sample.ir_left, Some(1));
            assert_eq!(sample.ir_right, None);
        }

        #[test]
        fn test_state_serializes() {
            let (mut arbiter, _calls) = arbiter();
            arbiter.update(&SensorSample::ultrasonic(5.0));
            let json = serde_json::to_value(arbiter.state()).unwrap();
            assert_eq!(json["mode"], "blocked");
            assert_eq!(json["reason"], "OBSTACLE_NEAR");
            assert_eq!(json["source"], "ultrasonic");
        }
    }

    // ── Custom rule tests ──────────────────────────────────────

    struct AlwaysHazard;

    impl SafetyRule for AlwaysHazard {
        fn name(&self) -> &str {
            "always"
        }

        fn evaluate(&self, _: &SensorSample, _: &SafetyThresholds) -> Assessment {
            Assessment::Hazard {
                signal: SafetySignal::ObstacleNear,
                source: SensorSource::Ultrasonic,
            }
        }
    }

    #[test]
    fn test_custom_rule_runs_after_builtins() {
        let (mut arbiter, calls) = arbiter();
        arbiter.add_rule(Box::new(AlwaysHazard));
        assert!(matches!(
            arbiter.update(&SensorSample::ultrasonic(50.0)),
            SafetyUpdate::Triggered { .. }
        ));
        assert_eq!(calls.lock().len(), 1);
    }
}
