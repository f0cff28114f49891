// ==============================================================================
// main.rs - Epigenetic Clock Entry Point
// ==============================================================================
// Description: Command-line interface for DNA methylation age prediction
// Author: Matt Barham
// Created: 2026-03-06
// Modified: 2026-03-09
// Version: 1.0.0
// ==============================================================================

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use epigenetic_clock::config::{
    DEFAULT_CLIP_HIGH, DEFAULT_CLIP_LOW, DEFAULT_HEADER_SKIP_LINES, DEFAULT_IDENTIFIER_PATTERN,
    DEFAULT_IMPUTE, DEFAULT_PARALLEL_THRESHOLD,
};
use epigenetic_clock::output::{self, ClockOutput, OutputFormat, RunMetadata};
use epigenetic_clock::parsers::{model_digest, BetaMatrixReader, CoefficientParser};
use epigenetic_clock::{
    ClipRange, ClockConfig, ClockScorer, Input, LoaderConfig, Model, SamplePrediction,
    ScorerConfig,
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Title lines preceding the coefficient header (dropped only when the
    /// first line is not a header)
    #[arg(long, env = "CLOCK_HEADER_SKIP_LINES", default_value_t = DEFAULT_HEADER_SKIP_LINES, global = true)]
    header_skip_lines: usize,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Summarize a coefficient file
    Inspect {
        /// Coefficient table (CpG ID + weight columns)
        #[arg(short, long, env = "CLOCK_MODEL")]
        model: PathBuf,
    },

    /// Predict DNA methylation age
    Score(ScoreArgs),
}

#[derive(clap::Args, Debug)]
struct ScoreArgs {
    /// Coefficient table (CpG ID + weight columns)
    #[arg(short, long, env = "CLOCK_MODEL")]
    model: PathBuf,

    /// Beta values: probes x samples or samples x probes (.csv, .tsv, .gz)
    #[arg(short, long)]
    betas: PathBuf,

    /// Score a single named column of the beta file (e.g. medianByCpG)
    #[arg(long)]
    column: Option<String>,

    /// Value used for CpGs missing from a sample
    #[arg(long, env = "CLOCK_IMPUTE", default_value_t = DEFAULT_IMPUTE)]
    impute: f64,

    /// Lower bound of predicted age
    #[arg(long, default_value_t = DEFAULT_CLIP_LOW, allow_negative_numbers = true)]
    clip_low: f64,

    /// Upper bound of predicted age
    #[arg(long, default_value_t = DEFAULT_CLIP_HIGH, allow_negative_numbers = true)]
    clip_high: f64,

    /// Regex identifying probe labels when inferring matrix orientation
    #[arg(long, default_value = DEFAULT_IDENTIFIER_PATTERN)]
    identifier_pattern: String,

    /// Minimum sample count for parallel scoring (0 = never)
    #[arg(long, default_value_t = DEFAULT_PARALLEL_THRESHOLD)]
    parallel_threshold: usize,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Csv)]
    format: OutputFormat,

    /// Output file (stdout if omitted)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    // Initialize tracing (stderr; stdout carries results)
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "epigenetic_clock=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    match args.command {
        Command::Inspect { model } => inspect(&model, args.header_skip_lines),
        Command::Score(score_args) => score(score_args, args.header_skip_lines),
    }
}

fn load(path: &Path, config: &LoaderConfig) -> Result<(Model, CoefficientParser)> {
    let mut parser = CoefficientParser::from_config(config);
    let model = parser
        .parse(path)
        .with_context(|| format!("Failed to load clock coefficients from {:?}", path))?;
    Ok((model, parser))
}

fn inspect(path: &Path, header_skip_lines: usize) -> Result<()> {
    let config = LoaderConfig::for_path(path).with_header_skip_lines(header_skip_lines);
    let (model, parser) = load(path, &config)?;
    let summary = model.summary();
    let digest = model_digest(path)?;

    println!("Coefficient file:  {}", path.display());
    println!("SHA-256:           {}", digest);
    println!(
        "Identifier column: {}",
        parser.identifier_column.as_deref().unwrap_or("-")
    );
    println!(
        "Weight column:     {}",
        parser.weight_column.as_deref().unwrap_or("-")
    );
    println!("CpG coefficients:  {}", summary.features);
    println!("Intercept:         {:.6}", summary.intercept);
    println!("Sum |weight|:      {:.6}", summary.abs_weight_sum);
    println!("Rows skipped:      {}", parser.skipped_count);

    Ok(())
}

fn score(args: ScoreArgs, header_skip_lines: usize) -> Result<()> {
    let config = ClockConfig {
        loader: LoaderConfig::for_path(&args.model).with_header_skip_lines(header_skip_lines),
        scorer: ScorerConfig {
            impute: args.impute,
            clip: ClipRange {
                low: args.clip_low,
                high: args.clip_high,
            },
            identifier_pattern: args.identifier_pattern,
            parallel_threshold: args.parallel_threshold,
        },
    };
    config.validate().context("Invalid scoring configuration")?;

    let (model, _) = load(&args.model, &config.loader)?;
    let digest = model_digest(&args.model)?;
    let scorer = ClockScorer::new(model, config.scorer)?;

    let mut reader =
        BetaMatrixReader::new().with_header_skip_lines(config.loader.header_skip_lines);
    let (labels, input) = match &args.column {
        Some(column) => {
            let vector = reader
                .read_column(&args.betas, column)
                .with_context(|| format!("Failed to read column {:?} of {:?}", column, args.betas))?;
            (vec![column.clone()], Input::Single(vector))
        }
        None => {
            let batch = reader
                .read(&args.betas)
                .with_context(|| format!("Failed to read beta matrix {:?}", args.betas))?;
            let oriented = scorer.orient(batch)?;
            info!(
                "Scoring {} samples ({:?})",
                oriented.n_samples(),
                oriented.orientation()
            );
            (oriented.sample_labels().to_vec(), Input::Batch(oriented))
        }
    };

    let scores = scorer.score_detailed(&input)?;
    let n_features = scorer.model().len();

    let predictions: Vec<SamplePrediction> = labels
        .into_iter()
        .zip(scores)
        .map(|(sample_id, score)| {
            if score.coverage * 2 < n_features {
                warn!(
                    "Sample {} reports only {}/{} clock CpGs; the rest are imputed",
                    sample_id, score.coverage, n_features
                );
            }
            SamplePrediction {
                sample_id,
                predicted_age: score.predicted,
                coverage: score.coverage,
            }
        })
        .collect();

    let result = ClockOutput {
        metadata: RunMetadata::new(&args.model, digest, scorer.model(), scorer.config()),
        predictions,
    };

    output::write_output(&result, args.format, args.output.as_deref())
}
