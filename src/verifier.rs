//! VLM verification of rendered videos.
//!
//! For each scenario with a rendered video, the verifier uploads the video to
//! the Files service, waits for server-side processing, asks the
//! vision-language model the scenario's yes/no question, and converts the
//! answer into a ternary reward. The remote file is deleted exactly once per
//! upload, whatever the judgment outcome, so repeated runs do not accumulate
//! staged videos.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::dataset::load_scenarios;
use crate::error::VerificationError;
use crate::gemini::{RemoteFile, VideoJudge};
use crate::models::{compute_reward, Scenario, VerificationResult};
use crate::prompts::build_verification_prompt;
use crate::utils::json_extraction::extract_json_payload;

const DEFAULT_REASONING: &str = "No reasoning provided.";

/// Timing knobs for the upload-processing wait.
#[derive(Debug, Clone)]
pub struct VerifierConfig {
    /// Delay between processing-state checks on an uploaded file.
    pub poll_interval: Duration,
    /// Total wall-clock budget for an uploaded file to become active.
    pub max_processing: Duration,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            max_processing: Duration::from_secs(120),
        }
    }
}

impl VerifierConfig {
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_max_processing(mut self, max_processing: Duration) -> Self {
        self.max_processing = max_processing;
        self
    }
}

/// The judgment object the vision-language model is asked to emit.
#[derive(Debug, Deserialize)]
struct Judgment {
    #[serde(default)]
    answer: String,
    #[serde(default)]
    reasoning: String,
}

/// Verifies rendered videos against their scenarios' expected outcomes.
pub struct Verifier {
    judge: Arc<dyn VideoJudge>,
    config: VerifierConfig,
}

impl Verifier {
    pub fn new(judge: Arc<dyn VideoJudge>) -> Self {
        Self {
            judge,
            config: VerifierConfig::default(),
        }
    }

    pub fn with_config(mut self, config: VerifierConfig) -> Self {
        self.config = config;
        self
    }

    /// Verify every scenario in a dataset against its rendered video.
    ///
    /// Scenarios without a video at `{videos_dir}/{scenario_id}.mp4` are
    /// skipped, as are scenarios whose judgment fails; both are logged and
    /// neither aborts the batch. The returned list holds one result per
    /// successfully judged scenario.
    pub async fn verify_dataset(
        &self,
        dataset_path: &Path,
        videos_dir: &Path,
    ) -> Vec<VerificationResult> {
        let scenarios = match load_scenarios(dataset_path) {
            Ok(scenarios) => scenarios,
            Err(e) => {
                let err = VerificationError::Dataset(e);
                warn!(path = %dataset_path.display(), error = %err, "failed to read dataset");
                return Vec::new();
            }
        };

        let total = scenarios.len();
        info!(total, "verifying rendered videos");

        let mut results = Vec::new();
        for (idx, scenario) in scenarios.iter().enumerate() {
            let position = idx + 1;
            let video_path = videos_dir.join(format!("{}.mp4", scenario.scenario_id));
            if !video_path.exists() {
                warn!(
                    scenario = %scenario.scenario_id,
                    position, total,
                    "no rendered video, skipping"
                );
                continue;
            }

            info!(scenario = %scenario.scenario_id, position, total, "verifying");
            match self.verify_scenario(scenario, &video_path).await {
                Ok(result) => {
                    info!(
                        scenario = %scenario.scenario_id,
                        answer = %result.vlm_answer,
                        reward = result.reward.value(),
                        "verified"
                    );
                    results.push(result);
                }
                Err(e) => {
                    warn!(scenario = %scenario.scenario_id, error = %e, "verification failed");
                }
            }
        }

        info!(verified = results.len(), total, "verification complete");
        results
    }

    /// Verify one scenario against its rendered video.
    pub async fn verify_scenario(
        &self,
        scenario: &Scenario,
        video_path: &Path,
    ) -> Result<VerificationResult, VerificationError> {
        let file = self
            .judge
            .upload_video(video_path)
            .await
            .map_err(|e| VerificationError::Failed {
                scenario_id: scenario.scenario_id.clone(),
                reason: e.to_string(),
            })?;

        // The staged file is deleted exactly once, on every path after a
        // successful upload.
        let judgment = self.judge_staged_video(scenario, &file).await;
        if let Err(e) = self.judge.delete_file(&file.name).await {
            warn!(scenario = %scenario.scenario_id, file = %file.name, error = %e, "failed to delete staged video");
        }
        let (vlm_answer, vlm_reasoning) = judgment?;

        let reward = compute_reward(&vlm_answer, &scenario.expected_answer);
        Ok(VerificationResult {
            scenario_id: scenario.scenario_id.clone(),
            category: scenario.category.clone(),
            verification_question: scenario.verification_question.clone(),
            expected_answer: scenario.expected_answer.clone(),
            vlm_answer,
            vlm_reasoning,
            reward,
            video_path: video_path.display().to_string(),
        })
    }

    /// Wait for the uploaded file to become active, then ask the model the
    /// scenario's verification question.
    async fn judge_staged_video(
        &self,
        scenario: &Scenario,
        file: &RemoteFile,
    ) -> Result<(String, String), VerificationError> {
        let mut file = file.clone();
        let started = Instant::now();
        while file.is_processing() {
            if started.elapsed() >= self.config.max_processing {
                return Err(VerificationError::ProcessingTimeout {
                    scenario_id: scenario.scenario_id.clone(),
                    seconds: self.config.max_processing.as_secs(),
                });
            }
            tokio::time::sleep(self.config.poll_interval).await;
            file = self.judge.get_file(&file.name).await.map_err(|e| {
                VerificationError::Failed {
                    scenario_id: scenario.scenario_id.clone(),
                    reason: e.to_string(),
                }
            })?;
        }
        if !file.is_active() {
            return Err(VerificationError::UploadFailed {
                scenario_id: scenario.scenario_id.clone(),
                state: file.state.clone(),
            });
        }

        let prompt = build_verification_prompt(&scenario.verification_question);
        let response = self
            .judge
            .judge_video(&file, &prompt)
            .await
            .map_err(|e| VerificationError::Failed {
                scenario_id: scenario.scenario_id.clone(),
                reason: e.to_string(),
            })?;

        parse_judgment(&scenario.scenario_id, &response)
    }
}

/// Parse the model's judgment response into `(answer, reasoning)`.
///
/// Answers outside the yes/no/undetermined vocabulary are coerced to
/// `"undetermined"` so malformed judgments score zero rather than poisoning
/// the reward signal.
fn parse_judgment(
    scenario_id: &str,
    response: &str,
) -> Result<(String, String), VerificationError> {
    if response.trim().is_empty() {
        return Err(VerificationError::EmptyResponse {
            scenario_id: scenario_id.to_string(),
        });
    }

    let payload = extract_json_payload(response);
    let judgment: Judgment =
        serde_json::from_str(&payload).map_err(|e| VerificationError::Failed {
            scenario_id: scenario_id.to_string(),
            reason: format!("invalid judgment JSON: {e}"),
        })?;

    let answer = judgment.answer.trim().to_lowercase();
    let answer = match answer.as_str() {
        "yes" | "no" | "undetermined" => answer,
        other => {
            warn!(scenario = %scenario_id, answer = %other, "unexpected answer, treating as undetermined");
            "undetermined".to_string()
        }
    };
    let reasoning = if judgment.reasoning.trim().is_empty() {
        DEFAULT_REASONING.to_string()
    } else {
        judgment.reasoning.trim().to_string()
    };

    Ok((answer, reasoning))
}
