use thiserror::Error;

use crate::invariant::InvariantViolation;

/// Unified error type for the entire Simo pipeline.
#[derive(Error, Debug)]
pub enum SimoError {
    // ── Intent errors ──────────────────────────────────────────
    #[error("invalid intent: {}", .0.join("; "))]
    InvalidIntent(Vec<String>),

    #[error(transparent)]
    Invariant(#[from] InvariantViolation),

    // ── NLU errors ─────────────────────────────────────────────
    #[error("llm error: {0}")]
    Llm(String),

    #[error("llm timed out after {0}ms")]
    LlmTimeout(u64),

    #[error("unparseable model output: {0}")]
    UnparseableOutput(String),

    // ── Transport errors ───────────────────────────────────────
    #[error("channel not connected: {0}")]
    ChannelNotConnected(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("malformed controller frame: {0}")]
    MalformedFrame(String),

    // ── Config errors ──────────────────────────────────────────
    #[error("config error: {0}")]
    Config(String),

    #[error("config validation failed: {field}: {reason}")]
    ConfigValidation { field: String, reason: String },

    // ── Generic wrappers ───────────────────────────────────────
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, SimoError>;
