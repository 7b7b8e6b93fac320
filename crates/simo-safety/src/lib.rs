//! # simo-safety
//!
//! Sensor-driven safety arbitration. The arbiter watches ultrasonic and
//! infrared samples, moves between `safe`, `warning` and `blocked`, and on
//! entering `blocked` invokes an injected stop routine. It never issues
//! motion of its own.

pub mod arbiter;
pub mod rules;
pub mod types;

pub use arbiter::{SafetyArbiter, SafetyUpdate, StopHandler};
pub use rules::{Assessment, InfraredRule, SafetyRule, UltrasonicRule};
pub use types::{
    BlockReason, SafetyMode, SafetySignal, SafetyState, SafetyThresholds, SensorSample,
    SensorSource,
};
