use crate::types::{SafetySignal, SafetyThresholds, SensorSample, SensorSource};

/// What a single rule concludes about a sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Assessment {
    /// Nothing to report; the next rule decides.
    Clear,
    /// Close, but not close enough to stop.
    Warning { distance_cm: f64 },
    /// Stop now.
    Hazard {
        signal: SafetySignal,
        source: SensorSource,
    },
}

/// A single hazard rule. Rules run in registration order and the first
/// non-`Clear` answer wins.
pub trait SafetyRule: Send + Sync {
    fn name(&self) -> &str;
    fn evaluate(&self, sample: &SensorSample, thresholds: &SafetyThresholds) -> Assessment;
}

// ── Built-in rules ─────────────────────────────────────────────

/// Forward distance from the ultrasonic sensor.
pub struct UltrasonicRule;

impl SafetyRule for UltrasonicRule {
    fn name(&self) -> &str {
        "ultrasonic"
    }

    fn evaluate(&self, sample: &SensorSample, thresholds: &SafetyThresholds) -> Assessment {
        let Some(distance_cm) = sample.distance_cm() else {
            return Assessment::Clear;
        };
        if distance_cm < thresholds.danger_cm {
            Assessment::Hazard {
                signal: SafetySignal::ObstacleNear,
                source: SensorSource::Ultrasonic,
            }
        } else if distance_cm < thresholds.warning_cm {
            Assessment::Warning { distance_cm }
        } else {
            Assessment::Clear
        }
    }
}

/// Both side IR sensors report an obstacle.
pub struct InfraredRule;

impl SafetyRule for InfraredRule {
    fn name(&self) -> &str {
        "infrared"
    }

    fn evaluate(&self, sample: &SensorSample, _thresholds: &SafetyThresholds) -> Assessment {
        if sample.both_sides_blocked() {
            Assessment::Hazard {
                signal: SafetySignal::SideBlocked,
                source: SensorSource::Infrared,
            }
        } else {
            Assessment::Clear
        }
    }
}
