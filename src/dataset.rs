//! CSV persistence for scenario datasets and verification results.
//!
//! Column order is a contract: the scenario CSV is written by the generator
//! and read back by both the video pipeline and the verifier, and the results
//! CSV is consumed by downstream reward tooling. Both orders are fixed by the
//! struct field order in [`crate::models`].

use std::path::Path;

use crate::models::{Scenario, VerificationResult};

/// Write a scenario dataset to a CSV file, creating parent directories.
pub fn write_dataset(scenarios: &[Scenario], output_path: &Path) -> Result<(), csv::Error> {
    ensure_parent(output_path)?;
    let mut writer = csv::Writer::from_path(output_path)?;
    for scenario in scenarios {
        writer.serialize(scenario)?;
    }
    writer.flush()?;
    Ok(())
}

/// Load a scenario dataset from a CSV file.
pub fn load_scenarios(dataset_path: &Path) -> Result<Vec<Scenario>, csv::Error> {
    let mut reader = csv::Reader::from_path(dataset_path)?;
    reader.deserialize().collect()
}

/// Write verification results to a CSV file, creating parent directories.
pub fn write_results(
    results: &[VerificationResult],
    output_path: &Path,
) -> Result<(), csv::Error> {
    ensure_parent(output_path)?;
    let mut writer = csv::Writer::from_path(output_path)?;
    for result in results {
        writer.serialize(result)?;
    }
    writer.flush()?;
    Ok(())
}

/// Load verification results from a CSV file.
pub fn load_results(results_path: &Path) -> Result<Vec<VerificationResult>, csv::Error> {
    let mut reader = csv::Reader::from_path(results_path)?;
    reader.deserialize().collect()
}

fn ensure_parent(path: &Path) -> Result<(), std::io::Error> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Confidence, RewardScore};
    use tempfile::TempDir;

    fn sample_scenario(id: &str) -> Scenario {
        Scenario {
            scenario_id: id.to_string(),
            category: "vehicle_collision".to_string(),
            world_prompt: "A highway at dusk.".to_string(),
            action: "A car hits the guardrail.".to_string(),
            video_prompt: "Wide shot of a car on a highway.".to_string(),
            verification_question: "Does the car deform?".to_string(),
            expected_answer: "yes".to_string(),
            confidence: Confidence::High,
        }
    }

    #[test]
    fn test_scenario_csv_header_order() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dataset.csv");
        write_dataset(&[sample_scenario("AD-001")], &path).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let header = contents.lines().next().unwrap();
        assert_eq!(
            header,
            "scenario_id,category,world_prompt,action,video_prompt,\
             verification_question,expected_answer,confidence"
        );
        assert!(contents.contains("AD-001"));
        assert!(contents.contains(",high"));
    }

    #[test]
    fn test_scenario_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("dataset.csv");
        let scenarios = vec![sample_scenario("AD-001"), sample_scenario("AD-002")];

        write_dataset(&scenarios, &path).unwrap();
        let loaded = load_scenarios(&path).unwrap();
        assert_eq!(loaded, scenarios);
    }

    #[test]
    fn test_results_csv_header_and_reward_encoding() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("results.csv");
        let results = vec![
            VerificationResult {
                scenario_id: "AD-001".to_string(),
                category: "vehicle_collision".to_string(),
                verification_question: "Does the car deform?".to_string(),
                expected_answer: "yes".to_string(),
                vlm_answer: "yes".to_string(),
                vlm_reasoning: "Visible crumpling.".to_string(),
                reward: RewardScore::Correct,
                video_path: "/videos/AD-001.mp4".to_string(),
            },
            VerificationResult {
                scenario_id: "AD-002".to_string(),
                category: "braking".to_string(),
                verification_question: "Does it stop?".to_string(),
                expected_answer: "no".to_string(),
                vlm_answer: "undetermined".to_string(),
                vlm_reasoning: "Video too dark.".to_string(),
                reward: RewardScore::Undetermined,
                video_path: "/videos/AD-002.mp4".to_string(),
            },
        ];

        write_results(&results, &path).unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        let header = contents.lines().next().unwrap();
        assert_eq!(
            header,
            "scenario_id,category,verification_question,expected_answer,\
             vlm_answer,vlm_reasoning,reward,video_path"
        );
        // Reward serialized as signed integer string
        assert!(contents.contains(",1,"));
        assert!(contents.contains(",0,"));

        let loaded = load_results(&path).unwrap();
        assert_eq!(loaded, results);
    }
}
