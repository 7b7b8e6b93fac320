use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SimoError;

/// The closed set of things an utterance can ask the robot to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum IntentKind {
    Move,
    Turn,
    Stop,
    Query,
    None,
    Beep,
}

impl IntentKind {
    pub const ALL: [IntentKind; 6] = [
        IntentKind::Move,
        IntentKind::Turn,
        IntentKind::Stop,
        IntentKind::Query,
        IntentKind::None,
        IntentKind::Beep,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            IntentKind::Move => "MOVE",
            IntentKind::Turn => "TURN",
            IntentKind::Stop => "STOP",
            IntentKind::Query => "QUERY",
            IntentKind::None => "NONE",
            IntentKind::Beep => "BEEP",
        }
    }

    /// MOVE and TURN are the only kinds that displace the robot.
    pub fn is_motion(self) -> bool {
        matches!(self, IntentKind::Move | IntentKind::Turn)
    }
}

impl fmt::Display for IntentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IntentKind {
    type Err = SimoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        IntentKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| SimoError::InvalidIntent(vec![format!("unknown intent kind: {s}")]))
    }
}

/// Single-letter controller direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    F,
    B,
    L,
    R,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::F => "F",
            Direction::B => "B",
            Direction::L => "L",
            Direction::R => "R",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = SimoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "F" => Ok(Direction::F),
            "B" => Ok(Direction::B),
            "L" => Ok(Direction::L),
            "R" => Ok(Direction::R),
            other => Err(SimoError::InvalidIntent(vec![format!(
                "unknown direction: {other}"
            )])),
        }
    }
}

/// Direction of travel for a MOVE.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Heading {
    Forward,
    Backward,
}

impl Heading {
    pub fn direction(self) -> Direction {
        match self {
            Heading::Forward => Direction::F,
            Heading::Backward => Direction::B,
        }
    }
}

/// Direction of rotation for a TURN.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub fn direction(self) -> Direction {
        match self {
            Side::Left => Direction::L,
            Side::Right => Direction::R,
        }
    }
}

/// The only durations a motion command may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "u32", try_from = "u32")]
pub enum DurationPreset {
    Short,
    Medium,
    Long,
}

impl DurationPreset {
    pub const ALL: [DurationPreset; 3] = [
        DurationPreset::Short,
        DurationPreset::Medium,
        DurationPreset::Long,
    ];

    pub fn ms(self) -> u32 {
        match self {
            DurationPreset::Short => 400,
            DurationPreset::Medium => 800,
            DurationPreset::Long => 1200,
        }
    }

    /// Exact lookup; anything off-preset is `None`.
    pub fn from_ms(ms: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.ms() == ms)
    }

    /// Nearest preset to an arbitrary value. Ties go to the shorter preset and
    /// non-finite input falls back to `Medium`.
    pub fn snap(ms: f64) -> Self {
        if !ms.is_finite() {
            return DurationPreset::Medium;
        }
        let mut best = DurationPreset::Short;
        for preset in Self::ALL {
            if (f64::from(preset.ms()) - ms).abs() < (f64::from(best.ms()) - ms).abs() {
                best = preset;
            }
        }
        best
    }
}

impl From<DurationPreset> for u32 {
    fn from(p: DurationPreset) -> u32 {
        p.ms()
    }
}

impl TryFrom<u32> for DurationPreset {
    type Error = String;

    fn try_from(ms: u32) -> Result<Self, Self::Error> {
        DurationPreset::from_ms(ms).ok_or_else(|| format!("duration {ms}ms is not a preset"))
    }
}

/// What the robot is asked to do, with kind-specific fields.
///
/// Direction/kind mismatches are unrepresentable: a MOVE can only carry a
/// [`Heading`], a TURN only a [`Side`], and durations are always presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Action {
    Move {
        heading: Heading,
        duration: DurationPreset,
    },
    Turn {
        side: Side,
        duration: DurationPreset,
    },
    Stop,
    Query,
    None,
    Beep,
}

impl Action {
    pub fn kind(&self) -> IntentKind {
        match self {
            Action::Move { .. } => IntentKind::Move,
            Action::Turn { .. } => IntentKind::Turn,
            Action::Stop => IntentKind::Stop,
            Action::Query => IntentKind::Query,
            Action::None => IntentKind::None,
            Action::Beep => IntentKind::Beep,
        }
    }

    pub fn direction(&self) -> Option<Direction> {
        match self {
            Action::Move { heading, .. } => Some(heading.direction()),
            Action::Turn { side, .. } => Some(side.direction()),
            _ => None,
        }
    }

    pub fn duration(&self) -> Option<DurationPreset> {
        match self {
            Action::Move { duration, .. } | Action::Turn { duration, .. } => Some(*duration),
            _ => None,
        }
    }

    pub fn is_motion(&self) -> bool {
        self.kind().is_motion()
    }

    /// Build a motion action from a controller direction letter.
    pub fn motion(direction: Direction, duration: DurationPreset) -> Self {
        match direction {
            Direction::F => Action::Move {
                heading: Heading::Forward,
                duration,
            },
            Direction::B => Action::Move {
                heading: Heading::Backward,
                duration,
            },
            Direction::L => Action::Turn {
                side: Side::Left,
                duration,
            },
            Direction::R => Action::Turn {
                side: Side::Right,
                duration,
            },
        }
    }

    /// Controller command for this action; QUERY and NONE have none.
    pub fn command(&self) -> Option<String> {
        match self {
            Action::Stop => Some("S".to_string()),
            Action::Beep => Some("BEEP".to_string()),
            Action::Move { .. } | Action::Turn { .. } => {
                let direction = self.direction()?;
                let duration = self.duration()?;
                Some(format!("{},{}", direction, duration.ms()))
            }
            Action::Query | Action::None => None,
        }
    }
}

/// Which producer created an intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    #[default]
    Rule,
    Llm,
    Sequence,
    Fluency,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Origin::Rule => write!(f, "rule"),
            Origin::Llm => write!(f, "llm"),
            Origin::Sequence => write!(f, "sequence"),
            Origin::Fluency => write!(f, "fluency"),
        }
    }
}

/// A typed, validated intent. Consumed once and never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Intent {
    action: Action,
    confidence: f64,
    raw_text: String,
    origin: Origin,
}

impl Intent {
    /// Confidence is clamped into `[0, 1]`; NaN becomes 0.
    pub fn new(action: Action, confidence: f64, raw_text: impl Into<String>, origin: Origin) -> Self {
        let confidence = if confidence.is_nan() {
            0.0
        } else {
            confidence.clamp(0.0, 1.0)
        };
        Self {
            action,
            confidence,
            raw_text: raw_text.into(),
            origin,
        }
    }

    pub fn stop(raw_text: impl Into<String>) -> Self {
        Self::new(Action::Stop, 1.0, raw_text, Origin::Rule)
    }

    pub fn none(raw_text: impl Into<String>) -> Self {
        Self::new(Action::None, 0.0, raw_text, Origin::Rule)
    }

    pub fn action(&self) -> Action {
        self.action
    }

    pub fn kind(&self) -> IntentKind {
        self.action.kind()
    }

    pub fn direction(&self) -> Option<Direction> {
        self.action.direction()
    }

    pub fn duration(&self) -> Option<DurationPreset> {
        self.action.duration()
    }

    pub fn duration_ms(&self) -> Option<u32> {
        self.action.duration().map(DurationPreset::ms)
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn raw_text(&self) -> &str {
        &self.raw_text
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }

    pub fn is_stop(&self) -> bool {
        self.action == Action::Stop
    }

    pub fn is_motion(&self) -> bool {
        self.action.is_motion()
    }

    pub fn with_origin(mut self, origin: Origin) -> Self {
        self.origin = origin;
        self
    }

    pub fn command(&self) -> Option<String> {
        self.action.command()
    }

    /// Loose wire representation, used by the contract checks and for logging.
    pub fn to_frame(&self) -> IntentFrame {
        IntentFrame {
            intent: self.kind().as_str().to_string(),
            direction: self.direction().map(|d| d.as_str().to_string()),
            duration_ms: self.duration_ms().map(f64::from),
            confidence: Some(self.confidence),
            raw_text: self.raw_text.clone(),
        }
    }
}

impl TryFrom<&IntentFrame> for Intent {
    type Error = SimoError;

    /// Strict conversion: the frame must pass [`validate`] first. STOP ignores
    /// any stray direction or duration.
    fn try_from(frame: &IntentFrame) -> Result<Self, Self::Error> {
        let report = validate(frame);
        if !report.valid {
            return Err(SimoError::InvalidIntent(report.errors));
        }
        let kind: IntentKind = frame.intent.parse()?;
        let confidence = frame.confidence.unwrap_or(1.0);
        let action = match kind {
            IntentKind::Stop => Action::Stop,
            IntentKind::Query => Action::Query,
            IntentKind::None => Action::None,
            IntentKind::Beep => Action::Beep,
            IntentKind::Move | IntentKind::Turn => {
                let direction: Direction = frame.direction.as_deref().unwrap_or_default().parse()?;
                let duration = frame
                    .duration_ms
                    .filter(|ms| ms.fract() == 0.0 && *ms >= 0.0)
                    .and_then(|ms| DurationPreset::from_ms(ms as u32))
                    .ok_or_else(|| {
                        SimoError::InvalidIntent(vec!["duration_ms is not a preset".to_string()])
                    })?;
                Action::motion(direction, duration)
            }
        };
        Ok(Intent::new(action, confidence, frame.raw_text.clone(), Origin::Rule))
    }
}

/// Loosely-typed intent as it arrives from outside (JSON, tests, logs).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct IntentFrame {
    pub intent: String,
    #[serde(default)]
    pub direction: Option<String>,
    #[serde(default)]
    pub duration_ms: Option<f64>,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub raw_text: String,
}

impl IntentFrame {
    pub fn new(intent: impl Into<String>) -> Self {
        Self {
            intent: intent.into(),
            ..Default::default()
        }
    }

    pub fn direction(mut self, direction: impl Into<String>) -> Self {
        self.direction = Some(direction.into());
        self
    }

    pub fn duration_ms(mut self, ms: f64) -> Self {
        self.duration_ms = Some(ms);
        self
    }

    pub fn confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence);
        self
    }
}

/// Result of structural validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Validation {
    pub valid: bool,
    pub errors: Vec<String>,
}

/// Structural validation of an incoming frame. Pure; never panics.
pub fn validate(frame: &IntentFrame) -> Validation {
    let mut errors = Vec::new();

    let kind = match frame.intent.parse::<IntentKind>() {
        Ok(kind) => kind,
        Err(_) => {
            errors.push(format!("illegal intent kind: {}", frame.intent));
            return Validation {
                valid: false,
                errors,
            };
        }
    };

    if kind == IntentKind::Stop {
        return Validation {
            valid: true,
            errors,
        };
    }

    match kind {
        IntentKind::Move => {
            if !matches!(frame.direction.as_deref(), Some("F") | Some("B")) {
                errors.push(format!(
                    "MOVE only allows F/B, got: {}",
                    frame.direction.as_deref().unwrap_or("null")
                ));
            }
        }
        IntentKind::Turn => {
            if !matches!(frame.direction.as_deref(), Some("L") | Some("R")) {
                errors.push(format!(
                    "TURN only allows L/R, got: {}",
                    frame.direction.as_deref().unwrap_or("null")
                ));
            }
        }
        _ => {
            if frame.direction.is_some() {
                errors.push(format!("{kind} carries no direction"));
            }
            if frame.duration_ms.is_some() {
                errors.push(format!("{kind} carries no duration"));
            }
        }
    }

    if kind.is_motion() {
        let on_preset = frame.duration_ms.is_some_and(|ms| {
            DurationPreset::ALL
                .into_iter()
                .any(|p| f64::from(p.ms()) == ms)
        });
        if !on_preset {
            errors.push(format!(
                "duration_ms must be 400/800/1200, got: {}",
                frame
                    .duration_ms
                    .map(|ms| ms.to_string())
                    .unwrap_or_else(|| "null".to_string())
            ));
        }
    }

    match frame.confidence {
        Some(c) if (0.0..=1.0).contains(&c) => {}
        other => errors.push(format!(
            "confidence must be a number in [0,1], got: {}",
            other
                .map(|c| c.to_string())
                .unwrap_or_else(|| "null".to_string())
        )),
    }

    Validation {
        valid: errors.is_empty(),
        errors,
    }
}
