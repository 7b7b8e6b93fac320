//! Execution contract.
//!
//! Every intent that reaches the execution choke point must satisfy these
//! rules. A violation means an upstream component let something through that
//! it should not have; it is a defect, not a user-facing rejection.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::intent::{DurationPreset, IntentFrame, IntentKind};
use crate::types::RobotMode;

/// Minimum confidence for MOVE/TURN to execute.
pub const EXECUTION_THRESHOLD: f64 = 0.8;

/// Hard ceiling on any motion duration.
pub const MAX_DURATION_MS: f64 = 3000.0;

/// The individual contract rules, in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvariantRule {
    KindWhitelist,
    NoneNeverExecutes,
    ConfidenceFloor,
    NoMotionWhileMoving,
    DurationBounds,
    DirectionMatchesKind,
}

impl fmt::Display for InvariantRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            InvariantRule::KindWhitelist => "kind_whitelist",
            InvariantRule::NoneNeverExecutes => "none_never_executes",
            InvariantRule::ConfidenceFloor => "confidence_floor",
            InvariantRule::NoMotionWhileMoving => "no_motion_while_moving",
            InvariantRule::DurationBounds => "duration_bounds",
            InvariantRule::DirectionMatchesKind => "direction_matches_kind",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
#[error("invariant {rule} violated: {detail}")]
pub struct InvariantViolation {
    pub rule: InvariantRule,
    pub detail: String,
}

impl InvariantViolation {
    fn new(rule: InvariantRule, detail: impl Into<String>) -> Self {
        Self {
            rule,
            detail: detail.into(),
        }
    }
}

/// Robot-side context the contract depends on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InvariantContext {
    pub mode: RobotMode,
}

impl InvariantContext {
    pub fn new(mode: RobotMode) -> Self {
        Self { mode }
    }
}

/// Non-throwing result of [`check_invariant`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvariantCheck {
    pub valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Assert the execution contract, failing on the first broken rule.
pub fn assert_invariant(
    frame: &IntentFrame,
    ctx: &InvariantContext,
) -> Result<(), InvariantViolation> {
    let kind: IntentKind = frame.intent.parse().map_err(|_| {
        InvariantViolation::new(
            InvariantRule::KindWhitelist,
            format!("intent kind \"{}\" is not whitelisted", frame.intent),
        )
    })?;

    match kind {
        IntentKind::Stop => return Ok(()),
        IntentKind::None => {
            return Err(InvariantViolation::new(
                InvariantRule::NoneNeverExecutes,
                "NONE must never execute",
            ));
        }
        IntentKind::Query | IntentKind::Beep => return Ok(()),
        IntentKind::Move | IntentKind::Turn => {}
    }

    let confidence = frame.confidence.unwrap_or(0.0);
    if confidence.is_nan() || confidence < EXECUTION_THRESHOLD {
        return Err(InvariantViolation::new(
            InvariantRule::ConfidenceFloor,
            format!("confidence {confidence} < {EXECUTION_THRESHOLD}"),
        ));
    }

    if ctx.mode.is_moving() {
        return Err(InvariantViolation::new(
            InvariantRule::NoMotionWhileMoving,
            format!("{kind} requested while moving"),
        ));
    }

    let duration = frame.duration_ms.unwrap_or(0.0);
    if !duration.is_finite() {
        return Err(InvariantViolation::new(
            InvariantRule::DurationBounds,
            "duration_ms must be a finite number",
        ));
    }
    if duration > MAX_DURATION_MS {
        return Err(InvariantViolation::new(
            InvariantRule::DurationBounds,
            format!("duration_ms {duration} > {MAX_DURATION_MS}"),
        ));
    }
    if !DurationPreset::ALL
        .into_iter()
        .any(|p| f64::from(p.ms()) == duration)
    {
        return Err(InvariantViolation::new(
            InvariantRule::DurationBounds,
            format!("duration_ms {duration} is not one of 400/800/1200"),
        ));
    }

    let direction = frame.direction.as_deref();
    let direction_ok = match kind {
        IntentKind::Move => matches!(direction, Some("F") | Some("B")),
        _ => matches!(direction, Some("L") | Some("R")),
    };
    if !direction_ok {
        return Err(InvariantViolation::new(
            InvariantRule::DirectionMatchesKind,
            format!(
                "{kind} cannot carry direction \"{}\"",
                direction.unwrap_or("null")
            ),
        ));
    }

    Ok(())
}

/// Same rules as [`assert_invariant`], reported instead of returned as an error.
pub fn check_invariant(frame: &IntentFrame, ctx: &InvariantContext) -> InvariantCheck {
    match assert_invariant(frame, ctx) {
        Ok(()) => InvariantCheck {
            valid: true,
            error: None,
        },
        Err(violation) => InvariantCheck {
            valid: false,
            error: Some(violation.to_string()),
        },
    }
}
