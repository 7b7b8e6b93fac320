//! # simo-nlu
//!
//! Turns an utterance into either one [`Intent`](simo_core::Intent) or a short
//! list of advisory [`Suggestion`](simo_core::Suggestion)s.
//!
//! Local rules come first. An optional LLM is consulted only when the rules
//! find nothing, and its output is sanitized into the same closed vocabulary.
//! Nothing in this crate can execute anything.

pub mod llm;
pub mod merge;
pub mod mock;
pub mod openai;
pub mod parser;
pub mod rules;
pub mod sequence;

pub use llm::{LlmCall, LlmOutput, LlmParser, SYSTEM_PROMPT, extract_json, sanitize_suggestions};
pub use merge::{NluMerge, NluResult, NluSource};
pub use mock::{MockLlm, MockReply};
pub use openai::OpenAiClient;
pub use parser::{Parser, Understanding};
pub use rules::RuleParser;
pub use sequence::SequenceParser;
