use serde::{Deserialize, Serialize};
use simo_core::{Millis, SensorData};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SafetyMode {
    #[default]
    Safe,
    Warning,
    Blocked,
}

/// Why the arbiter stopped the robot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SafetySignal {
    ObstacleNear,
    SideBlocked,
}

impl fmt::Display for SafetySignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SafetySignal::ObstacleNear => write!(f, "OBSTACLE_NEAR"),
            SafetySignal::SideBlocked => write!(f, "SIDE_BLOCKED"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SensorSource {
    Ultrasonic,
    Infrared,
}

impl fmt::Display for SensorSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SensorSource::Ultrasonic => write!(f, "ultrasonic"),
            SensorSource::Infrared => write!(f, "infrared"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SafetyThresholds {
    pub danger_cm: f64,
    pub warning_cm: f64,
}

impl Default for SafetyThresholds {
    fn default() -> Self {
        Self {
            danger_cm: 8.0,
            warning_cm: 15.0,
        }
    }
}

impl From<&simo_config::SafetyConfig> for SafetyThresholds {
    fn from(config: &simo_config::SafetyConfig) -> Self {
        Self {
            danger_cm: config.danger_cm,
            warning_cm: config.warning_cm,
        }
    }
}

/// One reading (or partial reading) of the hazard sensors.
///
/// IR flags follow the controller convention: 0 = obstacle, 1 = clear.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SensorSample {
    pub ultrasonic_cm: Option<f64>,
    pub ir_left: Option<u8>,
    pub ir_right: Option<u8>,
}

impl SensorSample {
    pub fn ultrasonic(cm: f64) -> Self {
        Self {
            ultrasonic_cm: Some(cm),
            ..Default::default()
        }
    }

    pub fn infrared(left: u8, right: u8) -> Self {
        Self {
            ir_left: Some(left),
            ir_right: Some(right),
            ..Default::default()
        }
    }

    /// Overlay the fields present in `newer`; absent fields keep their value.
    pub fn merge(&mut self, newer: &SensorSample) {
        if newer.ultrasonic_cm.is_some() {
            self.ultrasonic_cm = newer.ultrasonic_cm;
        }
        if newer.ir_left.is_some() {
            self.ir_left = newer.ir_left;
        }
        if newer.ir_right.is_some() {
            self.ir_right = newer.ir_right;
        }
    }

    /// A usable ultrasonic distance; zero and negative readings mean no echo.
    pub fn distance_cm(&self) -> Option<f64> {
        self.ultrasonic_cm.filter(|cm| cm.is_finite() && *cm > 0.0)
    }

    pub fn both_sides_blocked(&self) -> bool {
        self.ir_left == Some(0) && self.ir_right == Some(0)
    }
}

impl From<&SensorData> for SensorSample {
    fn from(data: &SensorData) -> Self {
        Self {
            ultrasonic_cm: data.ultrasonic.distance,
            ir_left: data.infrared.left,
            ir_right: data.infrared.right,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockReason {
    pub reason: SafetySignal,
    pub source: SensorSource,
}

/// Read-only view of the arbiter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafetyState {
    pub mode: SafetyMode,
    pub blocked: bool,
    pub reason: Option<SafetySignal>,
    pub source: Option<SensorSource>,
    pub sensors: SensorSample,
    pub updated_at: Millis,
}
