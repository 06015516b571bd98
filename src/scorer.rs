//! Reward aggregation over verification results.
//!
//! Pure functions: results in, per-category and overall tallies out. The
//! accuracy figure only counts evaluable judgments (correct + incorrect);
//! undetermined results contribute zero reward and are excluded from the
//! denominator.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use crate::models::{RewardScore, VerificationResult};

/// Reward counts for one scoring bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tally {
    pub correct: usize,
    pub undetermined: usize,
    pub incorrect: usize,
}

impl Tally {
    fn add(&mut self, reward: RewardScore) {
        match reward {
            RewardScore::Correct => self.correct += 1,
            RewardScore::Undetermined => self.undetermined += 1,
            RewardScore::Incorrect => self.incorrect += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.correct + self.undetermined + self.incorrect
    }

    /// Sum of signed rewards.
    pub fn total_reward(&self) -> i64 {
        self.correct as i64 - self.incorrect as i64
    }

    /// Integer percentage of correct judgments among evaluable ones, or 0
    /// when every result was undetermined.
    pub fn accuracy_percent(&self) -> u64 {
        let evaluable = self.correct + self.incorrect;
        if evaluable == 0 {
            return 0;
        }
        (self.correct * 100 / evaluable) as u64
    }
}

/// Aggregated scores for a verification run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreReport {
    pub overall: Tally,
    /// Per-category tallies, sorted by category name.
    pub categories: BTreeMap<String, Tally>,
}

/// Aggregate verification results into per-category and overall tallies.
pub fn score_results(results: &[VerificationResult]) -> ScoreReport {
    let mut overall = Tally::default();
    let mut categories: BTreeMap<String, Tally> = BTreeMap::new();
    for result in results {
        overall.add(result.reward);
        categories
            .entry(result.category.clone())
            .or_default()
            .add(result.reward);
    }
    ScoreReport { overall, categories }
}

/// Render a score report as a human-readable text block.
pub fn render_report(report: &ScoreReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", "=".repeat(60));
    let _ = writeln!(out, "VERIFICATION REPORT");
    let _ = writeln!(out, "{}", "=".repeat(60));
    let _ = writeln!(
        out,
        "Overall: {} scenarios | {} | accuracy {}% | total reward {}",
        report.overall.total(),
        format_counts(&report.overall),
        report.overall.accuracy_percent(),
        report.overall.total_reward(),
    );
    if !report.categories.is_empty() {
        let _ = writeln!(out, "\nBy category:");
        for (category, tally) in &report.categories {
            let _ = writeln!(
                out,
                "  {category:<28} {} | accuracy {}% | reward {}",
                format_counts(tally),
                tally.accuracy_percent(),
                tally.total_reward(),
            );
        }
    }
    out
}

fn format_counts(tally: &Tally) -> String {
    format!(
        "+1: {}  0: {}  -1: {}",
        tally.correct, tally.undetermined, tally.incorrect
    )
}
