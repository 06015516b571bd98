//! CLI command definitions for worldreward.
//!
//! Each subcommand maps to one pipeline stage: `generate` produces a scenario
//! dataset, `videos` renders it, `verify` judges the renders, and `score`
//! aggregates rewards from a results file.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;
use tracing::info;

use crate::config::{list_available_domains, resolve_domain_config_path, Settings};
use crate::dataset::{load_results, write_results};
use crate::gemini::{GeminiClient, DEFAULT_TEXT_MODEL, DEFAULT_VIDEO_MODEL};
use crate::generator::ScenarioGenerator;
use crate::scorer::{render_report, score_results};
use crate::verifier::Verifier;
use crate::video::VideoPipeline;

/// Default number of scenarios per generated dataset.
const DEFAULT_SCENARIO_COUNT: usize = 10;

/// Default root directory for datasets, videos, and results.
const DEFAULT_DATA_DIR: &str = "data";

/// Physics-verifiable evaluation pipeline for video world models.
#[derive(Parser)]
#[command(name = "worldreward")]
#[command(about = "Generate, render, and verify physics test scenarios for video world models")]
#[command(version)]
#[command(
    long_about = "worldreward generates physics-verifiable scenarios with a text model, renders them with a video model, and judges the rendered videos with a vision-language model to produce ternary rewards.\n\nExample usage:\n  worldreward generate --domain autonomous_driving --count 10\n  worldreward videos --dataset data/datasets/autonomous_driving_20260830_120000.csv\n  worldreward verify --dataset data/datasets/autonomous_driving_20260830_120000.csv"
)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,

    /// Google AI Studio API key (can also be set via GEMINI_API_KEY env var).
    #[arg(long, env = "GEMINI_API_KEY", global = true)]
    pub api_key: Option<String>,

    /// Root directory for datasets, videos, results, and configs.
    #[arg(long, default_value = DEFAULT_DATA_DIR, global = true)]
    pub data_dir: String,
}

/// Available CLI subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Generate a scenario dataset for a physics domain.
    #[command(alias = "gen")]
    Generate(GenerateArgs),

    /// Render videos for every scenario in a dataset.
    Videos(VideosArgs),

    /// Judge rendered videos and write a results CSV.
    Verify(VerifyArgs),

    /// Aggregate rewards from a results CSV.
    Score(ScoreArgs),

    /// List the available domain configurations.
    ListDomains,
}

/// Arguments for `worldreward generate`.
#[derive(Parser, Debug)]
pub struct GenerateArgs {
    /// Domain to generate scenarios for (see `list-domains`).
    #[arg(short, long)]
    pub domain: String,

    /// Number of scenarios to request.
    #[arg(short, long, default_value_t = DEFAULT_SCENARIO_COUNT)]
    pub count: usize,

    /// Text model to use for generation.
    #[arg(short, long, default_value = DEFAULT_TEXT_MODEL)]
    pub model: String,
}

/// Arguments for `worldreward videos`.
#[derive(Parser, Debug)]
pub struct VideosArgs {
    /// Scenario dataset CSV to render.
    #[arg(short, long)]
    pub dataset: String,

    /// Output directory for rendered videos.
    /// Defaults to `{data_dir}/videos/{dataset stem}`.
    #[arg(short, long)]
    pub output_dir: Option<String>,

    /// Video model to use for rendering.
    #[arg(short, long, default_value = DEFAULT_VIDEO_MODEL)]
    pub model: String,
}

/// Arguments for `worldreward verify`.
#[derive(Parser, Debug)]
pub struct VerifyArgs {
    /// Scenario dataset CSV to verify.
    #[arg(short, long)]
    pub dataset: String,

    /// Directory holding the rendered videos.
    /// Defaults to `{data_dir}/videos/{dataset stem}`.
    #[arg(long)]
    pub videos_dir: Option<String>,

    /// Vision-language model to use for judgment.
    #[arg(short, long, default_value = DEFAULT_TEXT_MODEL)]
    pub model: String,

    /// Output path for the results CSV.
    /// Defaults to `{data_dir}/results/results_{dataset stem}.csv`.
    #[arg(short, long)]
    pub output: Option<String>,
}

/// Arguments for `worldreward score`.
#[derive(Parser, Debug)]
pub struct ScoreArgs {
    /// Results CSV produced by `verify`.
    #[arg(short, long)]
    pub results: String,
}

/// Parse CLI arguments without running a command.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Run the CLI by parsing arguments and executing the command.
pub async fn run() -> anyhow::Result<()> {
    run_with_cli(parse_cli()).await
}

/// Run the CLI with the parsed arguments.
///
/// This is the main entry point for the worldreward CLI.
pub async fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Generate(ref args) => {
            let settings = build_settings(&cli, &args.model, DEFAULT_VIDEO_MODEL);
            run_generate_command(&settings, args).await?;
        }
        Commands::Videos(ref args) => {
            let settings = build_settings(&cli, DEFAULT_TEXT_MODEL, &args.model);
            run_videos_command(&settings, args).await?;
        }
        Commands::Verify(ref args) => {
            let settings = build_settings(&cli, &args.model, DEFAULT_VIDEO_MODEL);
            run_verify_command(&settings, args).await?;
        }
        Commands::Score(ref args) => {
            run_score_command(args)?;
        }
        Commands::ListDomains => {
            let settings = build_settings(&cli, DEFAULT_TEXT_MODEL, DEFAULT_VIDEO_MODEL);
            run_list_domains_command(&settings);
        }
    }
    Ok(())
}

/// Build process settings from global CLI arguments.
fn build_settings(cli: &Cli, text_model: &str, video_model: &str) -> Settings {
    Settings {
        api_key: cli.api_key.clone().unwrap_or_default(),
        text_model: text_model.to_string(),
        video_model: video_model.to_string(),
        data_dir: PathBuf::from(&cli.data_dir),
    }
}

fn build_client(settings: &Settings) -> anyhow::Result<Arc<GeminiClient>> {
    let client = GeminiClient::new(
        settings.api_key.clone(),
        settings.text_model.clone(),
        settings.video_model.clone(),
    )?;
    Ok(Arc::new(client))
}

/// Default per-dataset directory for rendered videos.
fn default_videos_dir(settings: &Settings, dataset: &Path) -> PathBuf {
    settings.videos_dir().join(dataset_stem(dataset))
}

fn dataset_stem(dataset: &Path) -> String {
    dataset
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("dataset")
        .to_string()
}

async fn run_generate_command(settings: &Settings, args: &GenerateArgs) -> anyhow::Result<()> {
    let search_dirs = settings.config_search_dirs();
    let config_path = resolve_domain_config_path(&args.domain, &search_dirs).ok_or_else(|| {
        let available = list_available_domains(&search_dirs);
        anyhow::anyhow!(
            "Unknown domain '{}'. Available domains: {}",
            args.domain,
            if available.is_empty() {
                "(none found)".to_string()
            } else {
                available.join(", ")
            }
        )
    })?;

    info!(domain = %args.domain, count = args.count, model = %settings.text_model, "generating scenarios");
    let client = build_client(settings)?;
    let generator = ScenarioGenerator::new(client);
    let dataset_path = generator
        .generate(&config_path, args.count, &settings.datasets_dir())
        .await?;

    println!("Dataset written to {}", dataset_path.display());
    Ok(())
}

async fn run_videos_command(settings: &Settings, args: &VideosArgs) -> anyhow::Result<()> {
    let dataset = PathBuf::from(&args.dataset);
    let output_dir = args
        .output_dir
        .as_ref()
        .map(PathBuf::from)
        .unwrap_or_else(|| default_videos_dir(settings, &dataset));

    let client = build_client(settings)?;
    let pipeline = VideoPipeline::new(client);
    let outcomes = pipeline.generate_from_dataset(&dataset, &output_dir).await;

    let successful = outcomes.iter().filter(|o| o.succeeded()).count();
    println!(
        "Rendered {}/{} videos into {}",
        successful,
        outcomes.len(),
        output_dir.display()
    );
    Ok(())
}

async fn run_verify_command(settings: &Settings, args: &VerifyArgs) -> anyhow::Result<()> {
    let dataset = PathBuf::from(&args.dataset);
    let videos_dir = args
        .videos_dir
        .as_ref()
        .map(PathBuf::from)
        .unwrap_or_else(|| default_videos_dir(settings, &dataset));
    let output = args.output.as_ref().map(PathBuf::from).unwrap_or_else(|| {
        settings
            .results_dir()
            .join(format!("results_{}.csv", dataset_stem(&dataset)))
    });

    let client = build_client(settings)?;
    let verifier = Verifier::new(client);
    let results = verifier.verify_dataset(&dataset, &videos_dir).await;

    write_results(&results, &output)?;
    println!("Results written to {}", output.display());
    println!();
    print!("{}", render_report(&score_results(&results)));
    Ok(())
}

fn run_score_command(args: &ScoreArgs) -> anyhow::Result<()> {
    let results = load_results(Path::new(&args.results))?;
    print!("{}", render_report(&score_results(&results)));
    Ok(())
}

fn run_list_domains_command(settings: &Settings) {
    let domains = list_available_domains(&settings.config_search_dirs());
    if domains.is_empty() {
        println!("No domain configs found. Add YAML files under configs/.");
        return;
    }
    println!("Available domains:");
    for domain in domains {
        println!("  {domain}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_args_defaults() {
        let cli = Cli::try_parse_from(["worldreward", "generate", "--domain", "autonomous_driving"])
            .unwrap();
        match cli.command {
            Commands::Generate(args) => {
                assert_eq!(args.domain, "autonomous_driving");
                assert_eq!(args.count, DEFAULT_SCENARIO_COUNT);
                assert_eq!(args.model, DEFAULT_TEXT_MODEL);
            }
            _ => panic!("expected generate command"),
        }
        assert_eq!(cli.log_level, "info");
        assert_eq!(cli.data_dir, DEFAULT_DATA_DIR);
    }

    #[test]
    fn test_generate_requires_domain() {
        assert!(Cli::try_parse_from(["worldreward", "generate"]).is_err());
    }

    #[test]
    fn test_videos_args_parse() {
        let cli = Cli::try_parse_from([
            "worldreward",
            "videos",
            "--dataset",
            "data/datasets/ad.csv",
            "--output-dir",
            "/tmp/videos",
        ])
        .unwrap();
        match cli.command {
            Commands::Videos(args) => {
                assert_eq!(args.dataset, "data/datasets/ad.csv");
                assert_eq!(args.output_dir.as_deref(), Some("/tmp/videos"));
                assert_eq!(args.model, DEFAULT_VIDEO_MODEL);
            }
            _ => panic!("expected videos command"),
        }
    }

    #[test]
    fn test_default_videos_dir_uses_dataset_stem() {
        let settings = Settings {
            api_key: "key".to_string(),
            text_model: DEFAULT_TEXT_MODEL.to_string(),
            video_model: DEFAULT_VIDEO_MODEL.to_string(),
            data_dir: PathBuf::from("data"),
        };
        let dir = default_videos_dir(&settings, Path::new("data/datasets/ad_20260830.csv"));
        assert_eq!(dir, PathBuf::from("data/videos/ad_20260830"));
    }

    #[test]
    fn test_global_args_apply_after_subcommand() {
        let cli = Cli::try_parse_from([
            "worldreward",
            "score",
            "--results",
            "results.csv",
            "--log-level",
            "debug",
            "--data-dir",
            "/srv/worldreward",
        ])
        .unwrap();
        assert_eq!(cli.log_level, "debug");
        assert_eq!(cli.data_dir, "/srv/worldreward");
    }
}
