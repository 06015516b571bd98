//! Scenario dataset generation orchestrator.
//!
//! Loads a domain config, asks the text model for scenario records, validates
//! them into typed [`Scenario`]s, and writes the timestamped CSV dataset.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use tracing::{info, warn};

use crate::config::{load_domain_config, DomainConfig};
use crate::dataset::write_dataset;
use crate::error::{GenerationError, ParsingError};
use crate::gemini::{SamplingParams, TextGenerator};
use crate::models::{Confidence, Scenario};
use crate::prompts::build_generation_prompt;
use crate::utils::json_extraction::extract_json_payload;

/// Sampling used for scenario generation.
const GENERATION_TEMPERATURE: f64 = 0.8;
const GENERATION_TOP_P: f64 = 0.95;

/// How many characters of a bad response to keep in parse errors.
const ERROR_PREVIEW_CHARS: usize = 500;

/// Orchestrates the end-to-end scenario generation pipeline.
pub struct ScenarioGenerator {
    client: Arc<dyn TextGenerator>,
}

/// A raw scenario record as returned by the text model, before validation.
#[derive(Debug, Deserialize)]
struct RawScenario {
    category: String,
    world_prompt: String,
    action: String,
    #[serde(default)]
    video_prompt: String,
    verification_question: String,
    expected_answer: String,
    #[serde(default = "default_confidence")]
    confidence: String,
}

fn default_confidence() -> String {
    "medium".to_string()
}

impl ScenarioGenerator {
    pub fn new(client: Arc<dyn TextGenerator>) -> Self {
        Self { client }
    }

    /// Generate a dataset of physics-verifiable scenarios.
    ///
    /// Returns the path of the written CSV file.
    ///
    /// # Errors
    ///
    /// Fails on config errors, API/transport errors, an unparseable model
    /// response, or when no raw record survives validation. Individual
    /// malformed records are dropped with a warning, not fatal.
    pub async fn generate(
        &self,
        config_path: &Path,
        count: usize,
        output_dir: &Path,
    ) -> Result<PathBuf, GenerationError> {
        let config = load_domain_config(config_path)?;
        let prompt = build_generation_prompt(&config, count);

        info!(
            domain = %config.domain_name,
            count,
            categories = config.categories.len(),
            "requesting scenarios from text model"
        );

        let raw_records = self
            .generate_scenarios_json(&prompt)
            .await
            .map_err(|e| GenerationError::Domain {
                domain: config.domain_id.clone(),
                reason: e.to_string(),
            })?;

        let scenarios = parse_raw_scenarios(&raw_records, &config);
        if scenarios.is_empty() {
            return Err(GenerationError::NoValidScenarios {
                domain: config.domain_id,
            });
        }

        info!(valid = scenarios.len(), raw = raw_records.len(), "validated scenarios");

        let output_path = build_output_path(&config, output_dir);
        write_dataset(&scenarios, &output_path)?;

        info!(path = %output_path.display(), "dataset written");
        Ok(output_path)
    }

    /// Call the text model and parse its response as a JSON array of records.
    ///
    /// Strict contract: an empty body, invalid JSON, or a non-array top-level
    /// value is always an error, never coerced.
    async fn generate_scenarios_json(
        &self,
        prompt: &str,
    ) -> Result<Vec<serde_json::Value>, anyhow::Error> {
        let params = SamplingParams::default()
            .with_temperature(GENERATION_TEMPERATURE)
            .with_top_p(GENERATION_TOP_P);
        let response = self.client.generate_text(prompt, &params).await?;

        Ok(parse_scenarios_response(&response)?)
    }
}

/// Parse a raw model response into a JSON array of record values.
fn parse_scenarios_response(response: &str) -> Result<Vec<serde_json::Value>, ParsingError> {
    if response.trim().is_empty() {
        return Err(ParsingError::EmptyResponse);
    }

    let payload = extract_json_payload(response);
    let parsed: serde_json::Value =
        serde_json::from_str(&payload).map_err(|e| ParsingError::InvalidJson {
            message: e.to_string(),
            preview: response.chars().take(ERROR_PREVIEW_CHARS).collect(),
        })?;

    match parsed {
        serde_json::Value::Array(records) => Ok(records),
        other => Err(ParsingError::NotAnArray {
            actual: json_type_name(&other).to_string(),
        }),
    }
}

fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

/// Convert raw JSON records into validated [`Scenario`]s.
///
/// IDs are assigned over the *validated* sequence, so they are always
/// contiguous even when malformed records are dropped.
fn parse_raw_scenarios(raw_records: &[serde_json::Value], config: &DomainConfig) -> Vec<Scenario> {
    let mut scenarios: Vec<Scenario> = Vec::new();

    for (position, raw) in raw_records.iter().enumerate() {
        match validate_record(raw) {
            Ok((record, confidence)) => {
                let scenario_id = format!("{}-{:03}", config.id_prefix, scenarios.len() + 1);
                scenarios.push(Scenario {
                    scenario_id,
                    category: record.category,
                    world_prompt: record.world_prompt,
                    action: record.action,
                    video_prompt: record.video_prompt,
                    verification_question: record.verification_question,
                    expected_answer: record.expected_answer.to_lowercase(),
                    confidence,
                });
            }
            Err(reason) => {
                warn!(record = position + 1, %reason, "skipping invalid scenario record");
            }
        }
    }

    scenarios
}

fn validate_record(raw: &serde_json::Value) -> Result<(RawScenario, Confidence), String> {
    let record: RawScenario =
        serde_json::from_value(raw.clone()).map_err(|e| e.to_string())?;

    let confidence = Confidence::parse(&record.confidence)
        .ok_or_else(|| format!("unparseable confidence '{}'", record.confidence))?;

    let answer = record.expected_answer.to_lowercase();
    if answer != "yes" && answer != "no" {
        return Err(format!("expected_answer must be yes/no, got '{answer}'"));
    }

    Ok((record, confidence))
}

/// Build a timestamped output file path: `{domain_id}_{YYYYMMDD_HHMMSS}.csv`.
fn build_output_path(config: &DomainConfig, output_dir: &Path) -> PathBuf {
    let timestamp = Utc::now().format("%Y%m%d_%H%M%S");
    output_dir.join(format!("{}_{}.csv", config.domain_id, timestamp))
}
