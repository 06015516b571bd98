//! Shared utilities.

pub mod json_extraction;
