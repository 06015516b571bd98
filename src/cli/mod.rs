//! Command-line interface for worldreward.
//!
//! Provides commands for scenario generation, video rendering, verification,
//! and reward scoring.

mod commands;

pub use commands::{parse_cli, run, run_with_cli};
