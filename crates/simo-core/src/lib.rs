//! # simo-core
//!
//! Core types, contracts, and primitives for the Simo intent safety pipeline.
//! This crate defines the shared vocabulary used by every other crate in the workspace:
//! the intent model, the execution contract, the clock abstraction, the command
//! channel trait, and the event bus.

pub mod channel;
pub mod clock;
pub mod error;
pub mod event;
pub mod intent;
pub mod invariant;
pub mod suggestion;
pub mod types;

pub use channel::{ChannelStatus, CommandChannel, InfraredReading, SensorData, UltrasonicReading};
pub use clock::{Clock, ManualClock, OneShotTimer, SharedClock, SystemClock};
pub use error::{Result, SimoError};
pub use event::{Event, EventBus};
pub use intent::{
    Action, Direction, DurationPreset, Heading, Intent, IntentFrame, IntentKind, Origin, Side,
    Validation, validate,
};
pub use invariant::{
    EXECUTION_THRESHOLD, InvariantCheck, InvariantContext, InvariantRule, InvariantViolation,
    MAX_DURATION_MS, assert_invariant, check_invariant,
};
pub use suggestion::{
    MAX_SEQUENCE_STEPS, SEQUENCE_STEP_CONFIDENCE, Suggestion, SuggestionStatus, collapse_and_cap,
};
pub use types::*;
