//! world-reward: physics-verifiable evaluation pipeline for video world models.
//!
//! This library generates physics test scenarios with a text model, renders
//! them with a video model, and judges the rendered videos with a
//! vision-language model to produce ternary reward scores.

// Core modules
pub mod cli;
pub mod config;
pub mod dataset;
pub mod error;
pub mod gemini;
pub mod generator;
pub mod models;
pub mod prompts;
pub mod scorer;
pub mod utils;
pub mod verifier;
pub mod video;

// Re-export commonly used error types
pub use error::{
    ConfigError, GeminiError, GenerationError, ParsingError, VerificationError, VideoError,
};
