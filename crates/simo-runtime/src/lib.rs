//! # simo-runtime
//!
//! Glue between understanding and motion.
//!
//! ## Architecture
//!
//! ```text
//!   utterance ──► NLU merge ──► Intent | Suggestions
//!                                   │
//!                                   ▼
//!                             Robot guard (check)
//!                                   │
//!                                   ▼
//!                          Confirmation manager ──► ask / execute
//!                                   │
//!                                   ▼
//!   sensor samples ──► Safety ──► Choke point ──► CommandChannel
//!                      arbiter      ▲
//!                         │         │
//!                         └──► Preemptor (STOP, clear queue + fluency)
//! ```
//!
//! Only the [`ChokePoint`] writes to the command channel. The [`Pipeline`]
//! owns one instance of every component and is driven either directly (tests)
//! or by [`driver::run`] inside a tokio task.

pub mod driver;
pub mod executor;
pub mod pipeline;
pub mod preempt;

pub use driver::{DriverOptions, run};
pub use executor::ChokePoint;
pub use pipeline::{
    Pipeline, PipelineBuilder, PipelineOutcome, PipelineSnapshot, TickEvent, nlu_from_config,
};
pub use preempt::Preemptor;
