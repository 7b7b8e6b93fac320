use simo_core::SharedClock;
use tracing::{debug, info, warn};

use crate::rules::{Assessment, InfraredRule, SafetyRule, UltrasonicRule};
use crate::types::{
    BlockReason, SafetyMode, SafetySignal, SafetyState, SafetyThresholds, SensorSample,
    SensorSource,
};

/// The stop routine the arbiter calls when it enters `blocked`.
///
/// Implementations must be callable while the arbiter is mid-update, so they
/// may not reach back into the arbiter.
pub trait StopHandler: Send + Sync {
    fn stop_now(&self, signal: SafetySignal, source: SensorSource);
}

impl<F> StopHandler for F
where
    F: Fn(SafetySignal, SensorSource) + Send + Sync,
{
    fn stop_now(&self, signal: SafetySignal, source: SensorSource) {
        self(signal, source)
    }
}

/// Result of feeding one sample to the arbiter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SafetyUpdate {
    /// Just entered `blocked`; the stop routine ran.
    Triggered {
        signal: SafetySignal,
        source: SensorSource,
    },
    /// Still `blocked` from an earlier trigger.
    StillBlocked,
    Warning { distance_cm: f64 },
    /// `safe`; `cleared` is true when this sample lifted a block.
    Safe { cleared: bool },
}

/// Owns [`SafetyState`]. Fed samples, it decides whether the robot must stop.
pub struct SafetyArbiter {
    rules: Vec<Box<dyn SafetyRule>>,
    thresholds: SafetyThresholds,
    stop: Box<dyn StopHandler>,
    clock: SharedClock,
    mode: SafetyMode,
    /// Why the mode is not `safe`: the hazard while blocked, the near
    /// obstacle while warning.
    reason: Option<BlockReason>,
    sensors: SensorSample,
    updated_at: u64,
}

impl SafetyArbiter {
    pub fn new(thresholds: SafetyThresholds, stop: Box<dyn StopHandler>, clock: SharedClock) -> Self {
        let updated_at = clock.now_ms();
        let mut arbiter = Self {
            rules: Vec::new(),
            thresholds,
            stop,
            clock,
            mode: SafetyMode::Safe,
            reason: None,
            sensors: SensorSample::default(),
            updated_at,
        };
        // Forward distance outranks the side sensors.
        arbiter.add_rule(Box::new(UltrasonicRule));
        arbiter.add_rule(Box::new(InfraredRule));
        arbiter
    }

    pub fn add_rule(&mut self, rule: Box<dyn SafetyRule>) {
        self.rules.push(rule);
    }

    /// Merge a (possibly partial) sample into the cache and re-evaluate.
    pub fn update(&mut self, sample: &SensorSample) -> SafetyUpdate {
        self.updated_at = self.clock.now_ms();
        self.sensors.merge(sample);

        match self.assess() {
            Assessment::Hazard { signal, source } => {
                let hazard = BlockReason {
                    reason: signal,
                    source,
                };
                if self.mode == SafetyMode::Blocked {
                    if self.reason != Some(hazard) {
                        debug!(%signal, %source, "block reason changed");
                        self.reason = Some(hazard);
                    }
                    return SafetyUpdate::StillBlocked;
                }
                warn!(%signal, %source, sensors = ?self.sensors, "safety stop triggered");
                self.mode = SafetyMode::Blocked;
                self.reason = Some(hazard);
                self.stop.stop_now(signal, source);
                SafetyUpdate::Triggered { signal, source }
            }
            Assessment::Warning { distance_cm } => {
                if self.mode == SafetyMode::Blocked {
                    // blocked only lifts on a fully clear sample
                    return SafetyUpdate::StillBlocked;
                }
                debug!(distance_cm, "obstacle within warning distance");
                self.mode = SafetyMode::Warning;
                self.reason = Some(BlockReason {
                    reason: SafetySignal::ObstacleNear,
                    source: SensorSource::Ultrasonic,
                });
                SafetyUpdate::Warning { distance_cm }
            }
            Assessment::Clear => {
                let cleared = self.mode == SafetyMode::Blocked;
                if cleared {
                    info!(reason = ?self.reason.map(|b| b.reason), "safety block cleared");
                }
                self.mode = SafetyMode::Safe;
                self.reason = None;
                SafetyUpdate::Safe { cleared }
            }
        }
    }

    fn assess(&self) -> Assessment {
        for rule in &self.rules {
            match rule.evaluate(&self.sensors, &self.thresholds) {
                Assessment::Clear => continue,
                verdict => {
                    debug!(rule = rule.name(), ?verdict, "safety rule fired");
                    return verdict;
                }
            }
        }
        Assessment::Clear
    }

    pub fn is_blocked(&self) -> bool {
        self.mode == SafetyMode::Blocked
    }

    /// The active block, if any. A warning has a reason but no block.
    pub fn block_reason(&self) -> Option<BlockReason> {
        self.reason.filter(|_| self.is_blocked())
    }

    pub fn mode(&self) -> SafetyMode {
        self.mode
    }

    pub fn state(&self) -> SafetyState {
        SafetyState {
            mode: self.mode,
            blocked: self.is_blocked(),
            reason: self.reason.map(|b| b.reason),
            source: self.reason.map(|b| b.source),
            sensors: self.sensors,
            updated_at: self.updated_at,
        }
    }
}
