//! Data models for scenarios, verification results, and reward scores.

use serde::{Deserialize, Serialize};

/// How unambiguous the expected answer of a scenario is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl Confidence {
    /// Parse a confidence label, case-insensitively.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "high" => Some(Self::High),
            "medium" => Some(Self::Medium),
            "low" => Some(Self::Low),
            _ => None,
        }
    }
}

/// Ternary reward signal for physics verification.
///
/// `+1`: the rendered video matches the expected physical outcome.
/// ` 0`: insufficient visual evidence to determine the outcome.
/// `-1`: the rendered video violates the expected physical outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RewardScore {
    Correct,
    Undetermined,
    Incorrect,
}

impl RewardScore {
    /// The signed integer value used in result CSVs and reward sums.
    pub fn value(self) -> i64 {
        match self {
            Self::Correct => 1,
            Self::Undetermined => 0,
            Self::Incorrect => -1,
        }
    }
}

// Serialized as the signed integer string ("1", "0", "-1") so result CSVs
// are directly consumable by downstream reward tooling.
impl Serialize for RewardScore {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(self.value())
    }
}

impl<'de> Deserialize<'de> for RewardScore {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match i64::deserialize(deserializer)? {
            1 => Ok(Self::Correct),
            0 => Ok(Self::Undetermined),
            -1 => Ok(Self::Incorrect),
            other => Err(serde::de::Error::custom(format!(
                "invalid reward value: {other}"
            ))),
        }
    }
}

/// A single physics-verifiable scenario for world model evaluation.
///
/// Each scenario describes a 3D scene, an action that triggers a physical
/// event, and a yes/no verification question with a known ground-truth
/// answer. Field order matches the scenario CSV column contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    pub scenario_id: String,
    pub category: String,
    pub world_prompt: String,
    pub action: String,
    /// Cinematic render prompt. Must never reveal the expected outcome.
    pub video_prompt: String,
    pub verification_question: String,
    /// Always lowercase `"yes"` or `"no"`.
    pub expected_answer: String,
    pub confidence: Confidence,
}

/// Result of verifying a single scenario against its rendered video.
///
/// Field order matches the results CSV column contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationResult {
    pub scenario_id: String,
    pub category: String,
    pub verification_question: String,
    pub expected_answer: String,
    /// `"yes"`, `"no"`, or `"undetermined"`.
    pub vlm_answer: String,
    pub vlm_reasoning: String,
    pub reward: RewardScore,
    pub video_path: String,
}

/// Outcome of one scenario in the video pipeline.
///
/// An empty `video_path` means the render failed or timed out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoOutcome {
    pub scenario_id: String,
    pub video_path: String,
}

impl VideoOutcome {
    pub fn succeeded(&self) -> bool {
        !self.video_path.is_empty()
    }
}

/// Compute the ternary reward by comparing the VLM answer to ground truth.
pub fn compute_reward(vlm_answer: &str, expected_answer: &str) -> RewardScore {
    let vlm_answer = vlm_answer.to_lowercase();
    if vlm_answer == "undetermined" {
        return RewardScore::Undetermined;
    }
    if vlm_answer == expected_answer.to_lowercase() {
        return RewardScore::Correct;
    }
    RewardScore::Incorrect
}
