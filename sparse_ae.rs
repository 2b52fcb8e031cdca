use clap::Parser;
use rust_sparse_autoencoder::cluster::{run_local_cluster, ClusterRun};
use rust_sparse_autoencoder::config::{load_config, TrainingConfig};
use rust_sparse_autoencoder::error::Result;
use std::path::PathBuf;
use std::process;
use std::time::Instant;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Trains a stacked sparse autoencoder over an in-process worker cluster.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON training configuration
    config: PathBuf,

    /// Number of workers (overrides the configuration)
    #[arg(long)]
    workers: Option<usize>,

    /// Base random seed (overrides the configuration)
    #[arg(long)]
    seed: Option<u64>,
}

fn init_tracing(debug_logging: bool) {
    let default = if debug_logging { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .init();
}

/// Loads the configuration and applies command-line overrides.
fn prepare_config(args: &Args) -> Result<TrainingConfig> {
    let mut config = load_config(&args.config)?;
    if let Some(workers) = args.workers {
        config.workers = workers;
    }
    if args.seed.is_some() {
        config.seed = args.seed;
    }
    config.validate()?;
    Ok(config)
}

fn format_summary(config: &TrainingConfig, run: &ClusterRun, seconds: f64) -> String {
    let mut lines = vec![
        "\n=== Training Summary ===".to_string(),
        format!("Method: {}", config.learning_method),
        format!("Workers: {}", run.reports.len()),
        format!("Layer sizes: {:?}", run.stack().sizes()),
        format!("{:<8}{:>16}{:>16}{:>12}", "Layer", "Initial cost", "Final cost", "Iters"),
    ];
    for (layer, (initial, last)) in run.mean_costs().into_iter().enumerate() {
        let iterations: usize = run.reports.iter().map(|w| w[layer].iterations).sum();
        lines.push(format!("{layer:<8}{initial:>16.6}{last:>16.6}{iterations:>12}"));
    }
    lines.push(format!("Total training time: {seconds:.2} seconds"));
    lines.push("========================".to_string());
    lines.join("\n")
}

fn main() {
    let args = Args::parse();
    let config = prepare_config(&args).unwrap_or_else(|e| {
        eprintln!("Could not load configuration {}: {}", args.config.display(), e);
        process::exit(1);
    });
    init_tracing(config.debug_logging);

    info!(config = %args.config.display(), workers = config.workers, "starting training");
    let start = Instant::now();
    match run_local_cluster(&config) {
        Ok(run) => {
            println!("{}", format_summary(&config, &run, start.elapsed().as_secs_f64()));
        }
        Err(e) => {
            error!(error = %e, "training failed");
            process::exit(1);
        }
    }
}
