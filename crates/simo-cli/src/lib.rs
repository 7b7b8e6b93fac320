//! # simo-cli
//!
//! Command-line interface for the Simo intent safety pipeline.
//!
//! ## Commands
//!
//! - `simo run`: Read utterances from stdin and drive the robot
//! - `simo parse`: Show what the NLU makes of one utterance
//! - `simo config`: Show the effective configuration
//! - `simo version`: Show version and build info

pub mod commands;

pub use commands::Cli;
