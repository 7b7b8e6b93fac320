//! # simo-autonomy
//!
//! Everything that decides whether and when an approved intent may move the
//! robot: the state-machine guard, the human confirmation workflow, the
//! multi-step suggestion queue, and post-action fluency suggestions.
//!
//! Each component is a cheap-to-clone handle over its own state, so the stop
//! routine can reach all of them from inside a safety callback.

pub mod confirm;
pub mod fluency;
pub mod guard;
pub mod prompt;
pub mod queue;
pub mod reply;

pub use confirm::{
    ConfirmContext, ConfirmOutcome, ConfirmPolicy, ConfirmState, ConfirmView, ConfirmationManager,
    ConfirmationRequest, ReplyOutcome, clamp_duration_ms,
};
pub use fluency::{
    FluencyContext, FluencyManager, FluencyReply, FluencySource, FluencySuggestion, FluencyView,
};
pub use guard::{GuardDecision, GuardPolicy, RobotGuard, RobotSnapshot};
pub use queue::{QueueState, QueueStatus, StepView, SuggestionQueue};
pub use reply::{ReplyDecision, ReplyVocabulary};
