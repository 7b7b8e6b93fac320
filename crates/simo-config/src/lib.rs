//! # simo-config
//!
//! Configuration system for the Simo pipeline. Reads from `simo.toml`, then
//! applies environment variable overrides, then validates.

pub mod loader;
pub mod schema;

pub use loader::ConfigLoader;
pub use schema::SimoConfig;
pub use schema::{
    ConfigWarning, ConfirmConfig, DeviceConfig, FluencyConfig, GuardConfig, LlmConfig,
    LoggingConfig, NluConfig, SafetyConfig, SequenceConfig, WarningSeverity,
};
