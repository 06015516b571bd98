//! Parallel video generation pipeline.
//!
//! Two-phase design to maximize throughput against the rate-limited render
//! service: phase 1 launches one asynchronous render operation per scenario,
//! phase 2 sweeps all in-flight operations once per tick until every one is
//! settled or the wall-clock budget runs out.
//!
//! Render progress is modeled as a tagged-union state per scenario, advanced
//! by a pure reducer ([`apply_poll`]) so the polling loop carries no hidden
//! mutable aliasing and the transition logic is testable with synthetic tick
//! sequences.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{info, warn};

use crate::dataset::load_scenarios;
use crate::error::VideoError;
use crate::gemini::VideoBackend;
use crate::models::VideoOutcome;

/// Timing knobs for the polling loop.
#[derive(Debug, Clone)]
pub struct VideoPipelineConfig {
    /// Delay between poll sweeps.
    pub poll_interval: Duration,
    /// Total wall-clock budget for the poll phase. On breach, every
    /// still-pending operation is declared timed out.
    pub max_poll: Duration,
}

impl Default for VideoPipelineConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(10),
            max_poll: Duration::from_secs(1800),
        }
    }
}

impl VideoPipelineConfig {
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_max_poll(mut self, max_poll: Duration) -> Self {
        self.max_poll = max_poll;
        self
    }
}

/// State of one render operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderState {
    /// In flight; holds the opaque operation name.
    Launched(String),
    /// Video downloaded to the given path.
    Completed(PathBuf),
    /// Permanently failed; never retried within a run.
    Failed(String),
    /// Still pending when the wall-clock budget ran out.
    TimedOut,
}

impl RenderState {
    fn is_launched(&self) -> bool {
        matches!(self, Self::Launched(_))
    }
}

/// What one poll sweep learned about an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    StillRunning,
    /// Operation finished and its video was downloaded to this path.
    Downloaded(PathBuf),
    /// Operation finished with an error, or the poll/download itself failed.
    Failed(String),
    TimedOut,
}

/// Advance a render state by one poll outcome. Settled states never regress.
pub fn apply_poll(state: RenderState, outcome: PollOutcome) -> RenderState {
    match (state, outcome) {
        (RenderState::Launched(op), PollOutcome::StillRunning) => RenderState::Launched(op),
        (RenderState::Launched(_), PollOutcome::Downloaded(path)) => RenderState::Completed(path),
        (RenderState::Launched(_), PollOutcome::Failed(reason)) => RenderState::Failed(reason),
        (RenderState::Launched(_), PollOutcome::TimedOut) => RenderState::TimedOut,
        (settled, _) => settled,
    }
}

/// An in-flight render being tracked by the poll loop.
#[derive(Debug)]
struct PendingRender {
    scenario_id: String,
    output_path: PathBuf,
    state: RenderState,
}

/// Renders videos for every scenario in a dataset.
pub struct VideoPipeline {
    backend: Arc<dyn VideoBackend>,
    config: VideoPipelineConfig,
}

impl VideoPipeline {
    pub fn new(backend: Arc<dyn VideoBackend>) -> Self {
        Self {
            backend,
            config: VideoPipelineConfig::default(),
        }
    }

    pub fn with_config(mut self, config: VideoPipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// Generate videos for all scenarios in a CSV dataset.
    ///
    /// Never fails as a batch: every scenario yields a [`VideoOutcome`], with
    /// an empty `video_path` marking failure. A scenario whose output file
    /// already exists is reported successful without any remote call, which
    /// makes re-runs idempotent.
    ///
    /// The returned list is in completion/iteration order, not launch order.
    pub async fn generate_from_dataset(
        &self,
        dataset_path: &Path,
        output_dir: &Path,
    ) -> Vec<VideoOutcome> {
        let scenarios = match load_scenarios(dataset_path) {
            Ok(scenarios) => scenarios,
            Err(e) => {
                let err = VideoError::Dataset(e);
                warn!(path = %dataset_path.display(), error = %err, "failed to read dataset");
                return Vec::new();
            }
        };
        if let Err(e) = std::fs::create_dir_all(output_dir) {
            let err = VideoError::Io(e);
            warn!(dir = %output_dir.display(), error = %err, "failed to create output directory");
        }

        let total = scenarios.len();
        info!(total, dir = %output_dir.display(), "generating videos");

        let mut outcomes: Vec<VideoOutcome> = Vec::new();
        let mut pending: Vec<PendingRender> = Vec::new();

        // Phase 1: launch everything that still needs rendering.
        for (idx, scenario) in scenarios.iter().enumerate() {
            let position = idx + 1;
            if scenario.video_prompt.is_empty() {
                warn!(
                    scenario = %scenario.scenario_id,
                    position, total,
                    "no video prompt, skipping"
                );
                continue;
            }

            let output_path = output_dir.join(format!("{}.mp4", scenario.scenario_id));
            if output_path.exists() {
                info!(
                    scenario = %scenario.scenario_id,
                    position, total,
                    "already rendered, skipping"
                );
                outcomes.push(VideoOutcome {
                    scenario_id: scenario.scenario_id.clone(),
                    video_path: output_path.display().to_string(),
                });
                continue;
            }

            match self.backend.launch_render(&scenario.video_prompt).await {
                Ok(operation) => {
                    info!(scenario = %scenario.scenario_id, position, total, "render launched");
                    pending.push(PendingRender {
                        scenario_id: scenario.scenario_id.clone(),
                        output_path,
                        state: RenderState::Launched(operation),
                    });
                }
                Err(e) => {
                    let err = VideoError::Launch {
                        scenario_id: scenario.scenario_id.clone(),
                        reason: e.to_string(),
                    };
                    warn!(error = %err, "launch failed");
                    outcomes.push(VideoOutcome {
                        scenario_id: scenario.scenario_id.clone(),
                        video_path: String::new(),
                    });
                }
            }
        }

        if !pending.is_empty() {
            info!(launched = pending.len(), "polling for completion");
            self.poll_until_settled(&mut pending).await;
        }

        // Fold poll results into the outcome list, in pending-set order.
        for render in &pending {
            let video_path = match &render.state {
                RenderState::Completed(path) => path.display().to_string(),
                _ => String::new(),
            };
            outcomes.push(VideoOutcome {
                scenario_id: render.scenario_id.clone(),
                video_path,
            });
        }

        let successful = outcomes.iter().filter(|o| o.succeeded()).count();
        info!(successful, total, "video generation complete");
        outcomes
    }

    /// Phase 2: sweep all in-flight operations once per tick until none is
    /// launched or the wall-clock budget is exhausted.
    async fn poll_until_settled(&self, pending: &mut [PendingRender]) {
        let started = Instant::now();

        while pending.iter().any(|p| p.state.is_launched()) {
            if started.elapsed() >= self.config.max_poll {
                for render in pending.iter_mut().filter(|p| p.state.is_launched()) {
                    warn!(scenario = %render.scenario_id, "render timed out");
                    render.state =
                        apply_poll(render.state.clone(), PollOutcome::TimedOut);
                }
                break;
            }

            tokio::time::sleep(self.config.poll_interval).await;

            // Fan out one poll per in-flight operation, join before applying.
            let polls: Vec<_> = pending
                .iter()
                .enumerate()
                .filter_map(|(i, p)| match &p.state {
                    RenderState::Launched(op) => Some((i, op.clone())),
                    _ => None,
                })
                .map(|(i, op)| {
                    let backend = Arc::clone(&self.backend);
                    async move { (i, backend.poll_render(&op).await) }
                })
                .collect();

            for (i, poll) in futures::future::join_all(polls).await {
                let render = &mut pending[i];
                let outcome = match poll {
                    Ok(status) if !status.done => PollOutcome::StillRunning,
                    Ok(status) => {
                        if let Some(reason) = status.error {
                            PollOutcome::Failed(reason)
                        } else if let Some(uri) = status.video_uri {
                            self.download(&render.scenario_id, &uri, &render.output_path)
                                .await
                        } else {
                            PollOutcome::Failed(
                                VideoError::NoVideo {
                                    scenario_id: render.scenario_id.clone(),
                                }
                                .to_string(),
                            )
                        }
                    }
                    Err(e) => PollOutcome::Failed(e.to_string()),
                };

                match &outcome {
                    PollOutcome::Downloaded(path) => {
                        info!(scenario = %render.scenario_id, path = %path.display(), "video saved");
                    }
                    PollOutcome::Failed(reason) => {
                        warn!(scenario = %render.scenario_id, %reason, "render failed");
                    }
                    _ => {}
                }
                render.state = apply_poll(render.state.clone(), outcome);
            }

            let remaining = pending.iter().filter(|p| p.state.is_launched()).count();
            if remaining > 0 {
                info!(remaining, "still generating");
            }
        }
    }

    async fn download(&self, scenario_id: &str, uri: &str, dest: &Path) -> PollOutcome {
        match self.backend.download_video(uri, dest).await {
            Ok(()) => PollOutcome::Downloaded(dest.to_path_buf()),
            Err(e) => {
                let err = VideoError::Download {
                    scenario_id: scenario_id.to_string(),
                    reason: e.to_string(),
                };
                warn!(error = %err, "download failed");
                PollOutcome::Failed(err.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::write_dataset;
    use crate::error::GeminiError;
    use crate::gemini::RenderPoll;
    use crate::models::{Confidence, Scenario};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// Scripted backend: every launch succeeds, polls replay `poll_script`
    /// round-robin, downloads write an empty file.
    struct MockBackend {
        launches: AtomicUsize,
        polls: AtomicUsize,
        downloads: AtomicUsize,
        poll_done: bool,
        poll_error: Option<String>,
        fail_launches_for: Vec<String>,
    }

    impl MockBackend {
        fn completing() -> Self {
            Self {
                launches: AtomicUsize::new(0),
                polls: AtomicUsize::new(0),
                downloads: AtomicUsize::new(0),
                poll_done: true,
                poll_error: None,
                fail_launches_for: Vec::new(),
            }
        }

        fn never_finishing() -> Self {
            Self {
                poll_done: false,
                ..Self::completing()
            }
        }
    }

    #[async_trait]
    impl VideoBackend for MockBackend {
        async fn launch_render(&self, prompt: &str) -> Result<String, GeminiError> {
            self.launches.fetch_add(1, Ordering::SeqCst);
            if self.fail_launches_for.iter().any(|p| prompt.contains(p)) {
                return Err(GeminiError::RequestFailed("launch rejected".to_string()));
            }
            Ok(format!("operations/op-{}", self.launches.load(Ordering::SeqCst)))
        }

        async fn poll_render(&self, _operation: &str) -> Result<RenderPoll, GeminiError> {
            self.polls.fetch_add(1, Ordering::SeqCst);
            Ok(RenderPoll {
                done: self.poll_done,
                video_uri: if self.poll_done && self.poll_error.is_none() {
                    Some("https://example/video.mp4".to_string())
                } else {
                    None
                },
                error: self.poll_error.clone(),
            })
        }

        async fn download_video(&self, _uri: &str, dest: &Path) -> Result<(), GeminiError> {
            self.downloads.fetch_add(1, Ordering::SeqCst);
            std::fs::write(dest, b"video")?;
            Ok(())
        }
    }

    fn scenario(id: &str, video_prompt: &str) -> Scenario {
        Scenario {
            scenario_id: id.to_string(),
            category: "vehicle_collision".to_string(),
            world_prompt: "A highway.".to_string(),
            action: "A car hits the guardrail.".to_string(),
            video_prompt: video_prompt.to_string(),
            verification_question: "Does the car deform?".to_string(),
            expected_answer: "yes".to_string(),
            confidence: Confidence::High,
        }
    }

    fn fast_config() -> VideoPipelineConfig {
        VideoPipelineConfig::default()
            .with_poll_interval(Duration::from_millis(0))
            .with_max_poll(Duration::from_secs(30))
    }

    fn write_test_dataset(dir: &TempDir, scenarios: &[Scenario]) -> PathBuf {
        let path = dir.path().join("dataset.csv");
        write_dataset(scenarios, &path).unwrap();
        path
    }

    #[test]
    fn test_reducer_transitions() {
        let launched = RenderState::Launched("operations/op-1".to_string());

        assert_eq!(
            apply_poll(launched.clone(), PollOutcome::StillRunning),
            launched
        );
        assert_eq!(
            apply_poll(launched.clone(), PollOutcome::Downloaded(PathBuf::from("a.mp4"))),
            RenderState::Completed(PathBuf::from("a.mp4"))
        );
        assert_eq!(
            apply_poll(launched.clone(), PollOutcome::Failed("boom".to_string())),
            RenderState::Failed("boom".to_string())
        );
        assert_eq!(apply_poll(launched, PollOutcome::TimedOut), RenderState::TimedOut);
    }

    #[test]
    fn test_reducer_settled_states_never_regress() {
        let failed = RenderState::Failed("boom".to_string());
        assert_eq!(
            apply_poll(failed.clone(), PollOutcome::Downloaded(PathBuf::from("a.mp4"))),
            failed
        );
        let completed = RenderState::Completed(PathBuf::from("a.mp4"));
        assert_eq!(
            apply_poll(completed.clone(), PollOutcome::Failed("late".to_string())),
            completed
        );
    }

    #[test]
    fn test_reducer_synthetic_tick_sequence() {
        let mut state = RenderState::Launched("operations/op-1".to_string());
        for outcome in [
            PollOutcome::StillRunning,
            PollOutcome::StillRunning,
            PollOutcome::Downloaded(PathBuf::from("v.mp4")),
            PollOutcome::TimedOut,
        ] {
            state = apply_poll(state, outcome);
        }
        assert_eq!(state, RenderState::Completed(PathBuf::from("v.mp4")));
    }

    #[tokio::test]
    async fn test_happy_path_renders_all() {
        let dir = TempDir::new().unwrap();
        let dataset = write_test_dataset(
            &dir,
            &[scenario("AD-001", "prompt one"), scenario("AD-002", "prompt two")],
        );
        let backend = Arc::new(MockBackend::completing());
        let pipeline = VideoPipeline::new(backend.clone()).with_config(fast_config());

        let outcomes = pipeline
            .generate_from_dataset(&dataset, &dir.path().join("videos"))
            .await;

        assert_eq!(outcomes.len(), 2);
        assert!(outcomes.iter().all(VideoOutcome::succeeded));
        assert_eq!(backend.launches.load(Ordering::SeqCst), 2);
        assert_eq!(backend.downloads.load(Ordering::SeqCst), 2);
        assert!(dir.path().join("videos").join("AD-001.mp4").exists());
    }

    #[tokio::test]
    async fn test_rerun_with_existing_videos_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let dataset = write_test_dataset(
            &dir,
            &[scenario("AD-001", "prompt one"), scenario("AD-002", "prompt two")],
        );
        let videos_dir = dir.path().join("videos");
        std::fs::create_dir_all(&videos_dir).unwrap();
        std::fs::write(videos_dir.join("AD-001.mp4"), b"video").unwrap();
        std::fs::write(videos_dir.join("AD-002.mp4"), b"video").unwrap();

        let backend = Arc::new(MockBackend::completing());
        let pipeline = VideoPipeline::new(backend.clone()).with_config(fast_config());

        let outcomes = pipeline.generate_from_dataset(&dataset, &videos_dir).await;

        assert_eq!(outcomes.len(), 2);
        assert!(outcomes.iter().all(VideoOutcome::succeeded));
        // A prior successful render is never re-requested.
        assert_eq!(backend.launches.load(Ordering::SeqCst), 0);
        assert_eq!(backend.polls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_timeout_marks_pending_operations_failed() {
        let dir = TempDir::new().unwrap();
        let dataset = write_test_dataset(&dir, &[scenario("PS-001", "a prompt")]);
        let backend = Arc::new(MockBackend::never_finishing());
        let pipeline = VideoPipeline::new(backend).with_config(
            VideoPipelineConfig::default()
                .with_poll_interval(Duration::from_millis(0))
                .with_max_poll(Duration::from_secs(0)),
        );

        let outcomes = pipeline
            .generate_from_dataset(&dataset, &dir.path().join("videos"))
            .await;

        assert_eq!(
            outcomes,
            vec![VideoOutcome {
                scenario_id: "PS-001".to_string(),
                video_path: String::new(),
            }]
        );
    }

    #[tokio::test]
    async fn test_launch_failure_is_isolated() {
        let dir = TempDir::new().unwrap();
        let dataset = write_test_dataset(
            &dir,
            &[scenario("AD-001", "doomed prompt"), scenario("AD-002", "fine prompt")],
        );
        let backend = Arc::new(MockBackend {
            fail_launches_for: vec!["doomed".to_string()],
            ..MockBackend::completing()
        });
        let pipeline = VideoPipeline::new(backend).with_config(fast_config());

        let outcomes = pipeline
            .generate_from_dataset(&dataset, &dir.path().join("videos"))
            .await;

        assert_eq!(outcomes.len(), 2);
        let by_id = |id: &str| outcomes.iter().find(|o| o.scenario_id == id).unwrap();
        assert!(!by_id("AD-001").succeeded());
        assert!(by_id("AD-002").succeeded());
    }

    #[tokio::test]
    async fn test_empty_video_prompt_is_skipped_entirely() {
        let dir = TempDir::new().unwrap();
        let dataset = write_test_dataset(&dir, &[scenario("AD-001", "")]);
        let backend = Arc::new(MockBackend::completing());
        let pipeline = VideoPipeline::new(backend.clone()).with_config(fast_config());

        let outcomes = pipeline
            .generate_from_dataset(&dataset, &dir.path().join("videos"))
            .await;

        assert!(outcomes.is_empty());
        assert_eq!(backend.launches.load(Ordering::SeqCst), 0);
    }
}
