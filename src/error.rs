//! Error types for world-reward operations.
//!
//! Defines error types for each pipeline subsystem:
//! - Domain configuration loading
//! - Gemini API transport
//! - Model response parsing
//! - Dataset generation
//! - Video rendering
//! - Verification and scoring

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while loading a domain configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to parse config '{path}': {message}")]
    InvalidYaml { path: PathBuf, message: String },

    #[error("Config '{path}' root must be a mapping")]
    NotAMapping { path: PathBuf },

    #[error("Config '{path}' is missing required field: '{field}'")]
    MissingField { path: PathBuf, field: String },

    #[error("Category {index} in '{path}' is missing required field: 'name'")]
    MissingCategoryName { path: PathBuf, index: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that can occur when calling the Gemini API.
#[derive(Debug, Error)]
pub enum GeminiError {
    #[error("Missing API key: set GEMINI_API_KEY or pass --api-key")]
    MissingApiKey,

    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    #[error("API error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that can occur while parsing a model response.
#[derive(Debug, Error)]
pub enum ParsingError {
    #[error("Empty response body from model")]
    EmptyResponse,

    #[error("Invalid JSON: {message}\nRaw response:\n{preview}")]
    InvalidJson { message: String, preview: String },

    #[error("Expected JSON array, got {actual}")]
    NotAnArray { actual: String },

    #[error("Expected JSON object, got {actual}")]
    NotAnObject { actual: String },
}

/// Errors that can occur during scenario dataset generation.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Generation failed for domain '{domain}': {reason}")]
    Domain { domain: String, reason: String },

    #[error("No valid scenarios produced for domain '{domain}'")]
    NoValidScenarios { domain: String },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("CSV write error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that can occur while rendering a single video.
///
/// The video pipeline never propagates these past the batch boundary;
/// they are folded into empty-path outcomes and logged.
#[derive(Debug, Error)]
pub enum VideoError {
    #[error("Launch failed for '{scenario_id}': {reason}")]
    Launch { scenario_id: String, reason: String },

    #[error("Render operation for '{scenario_id}' returned no video")]
    NoVideo { scenario_id: String },

    #[error("Download failed for '{scenario_id}': {reason}")]
    Download { scenario_id: String, reason: String },

    #[error("Dataset read error: {0}")]
    Dataset(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that can occur while verifying a single scenario.
#[derive(Debug, Error)]
pub enum VerificationError {
    #[error("Verification failed for '{scenario_id}': {reason}")]
    Failed { scenario_id: String, reason: String },

    #[error("Timed out after {seconds}s waiting for uploaded video of '{scenario_id}' to become active")]
    ProcessingTimeout { scenario_id: String, seconds: u64 },

    #[error("Upload for '{scenario_id}' ended in state {state}")]
    UploadFailed { scenario_id: String, state: String },

    #[error("Model returned an empty verification response for '{scenario_id}'")]
    EmptyResponse { scenario_id: String },

    #[error("Dataset read error: {0}")]
    Dataset(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
