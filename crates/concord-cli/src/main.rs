//! Concord CLI - ensemble consensus over noisy toxicity classifiers

use std::path::PathBuf;

use clap::Parser;
use concord_core::{ConcordConfig, Pipeline};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "concord")]
#[command(about = "Concord - multi-source ensemble consensus for toxicity labels")]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true, default_value = "concord.toml")]
    config: PathBuf,

    /// Log at debug level (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Classify the corpus with every source, resuming the row store
    Run,
    /// Dedup, bucket and vote over the row store
    Analyze,
    /// Build correction sets and the truth table
    Correct,
    /// Show row-store length and resume offset
    Status,
    /// Check configuration validity
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let config = ConcordConfig::load(&cli.config)?;

    match cli.command {
        Commands::Run => {
            let pipeline = Pipeline::new(config)?;
            let summary = pipeline.run().await?;
            println!("{summary}");
        }
        Commands::Analyze => {
            let pipeline = Pipeline::new(config)?;
            let report = pipeline.analyze()?;
            let summary = &report.summary;
            println!(
                "{} rows, {} unique, {} duplicates removed",
                summary.total_rows, summary.unique_rows, summary.duplicates_removed
            );
            for (label, analysis) in [("all", &summary.full), ("unique", &summary.unique)] {
                let b = &analysis.buckets;
                println!(
                    "[{label}] common_tp={} common_tn={} common_fp={} common_fn={} \
                     at_least_one_fp={} at_least_one_fn={} excluded={} reconciled={}",
                    b.common_tp,
                    b.common_tn,
                    b.common_fp,
                    b.common_fn,
                    b.at_least_one_fp,
                    b.at_least_one_fn,
                    b.excluded,
                    analysis.reconciled
                );
            }
            println!("outputs in {}", pipeline.config().output_dir.display());
        }
        Commands::Correct => {
            let pipeline = Pipeline::new(config)?;
            let report = pipeline.correct().await?;
            for set in &report.summary.sets {
                println!(
                    "{}: {} rows -> {} toxic, {} clean ({} re-screened, {} failed)",
                    set.bucket,
                    set.input_rows,
                    set.toxic_truth,
                    set.clean_truth,
                    set.rescreened,
                    set.rescreen_failures
                );
            }
            println!(
                "truth table: {} entries ({} duplicates removed, {} conflicts)",
                report.summary.truth_entries,
                report.summary.truth_duplicates_removed,
                report.summary.conflicts.len()
            );
        }
        Commands::Status => {
            let pipeline = Pipeline::new(config)?;
            println!("{}", pipeline.status()?);
        }
        Commands::Check => {
            config.validate()?;
            if let Err(err) = config.validate_for_run() {
                println!("warning: {err}");
            }
            println!(
                "{}: ok ({} sources)",
                cli.config.display(),
                config.sources.len()
            );
        }
    }

    Ok(())
}
