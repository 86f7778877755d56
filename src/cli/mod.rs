//! Command-line interface for the label-center converter.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info, warn};
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::processors::batch::{self, BatchReport};
use crate::PipelineConfig;

#[derive(Parser)]
#[command(name = "pcd-label-centers")]
#[command(
    about = "Reduce labeled ASCII PCD files to one center per cluster, written to <file>.labels",
    version
)]
pub struct Cli {
    /// Glob matching the PCD files to convert (quote it, e.g. "./data/labelled/**/*.pcd")
    pattern: String,

    /// Path to YAML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Increase verbosity
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Log and skip files that fail instead of stopping the run
    #[arg(long)]
    keep_going: bool,

    /// Convert files concurrently
    #[arg(long)]
    parallel: bool,
}

/// Create a progress bar for a known number of files
fn create_progress_bar(len: usize) -> ProgressBar {
    let pb = ProgressBar::new(len as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
    );
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

/// Print a summary box
fn print_summary(title: &str, items: &[(&str, String)]) {
    println!();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║ {:<62} ║", title);
    println!("╠══════════════════════════════════════════════════════════════╣");
    for (key, value) in items {
        let display_value = if value.chars().count() > 39 {
            let head: String = value.chars().take(36).collect();
            format!("{}...", head)
        } else {
            value.clone()
        };
        println!("║ {:<20}: {:<39} ║", key, display_value);
    }
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();
}

fn load_config(path: Option<&Path>) -> PipelineConfig {
    match path {
        Some(path) => match PipelineConfig::from_yaml(path) {
            Ok(cfg) => {
                info!("Loaded config from: {}", path.display());
                cfg
            }
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}, using defaults",
                    path.display(),
                    e
                );
                PipelineConfig::default()
            }
        },
        None => PipelineConfig::default(),
    }
}

pub fn run() {
    let cli = Cli::parse();

    // Initialize logging based on verbosity (must come first)
    env_logger::Builder::new()
        .filter_level(match cli.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        })
        .format_timestamp_secs()
        .init();

    let mut config = load_config(cli.config.as_deref());

    // Flags can only switch these on
    config.batch.keep_going |= cli.keep_going;
    config.batch.parallel |= cli.parallel;

    let start = Instant::now();

    match cmd_convert(&cli.pattern, &config) {
        Ok(report) => {
            print_summary(
                "Label Centers Complete",
                &[
                    ("Pattern", cli.pattern.clone()),
                    ("Files written", report.files_written().to_string()),
                    ("Files failed", report.files_failed().to_string()),
                    ("Clusters", report.total_clusters().to_string()),
                    ("Distance threshold", config.clustering.distance_threshold.to_string()),
                    ("Duration", format!("{:.2?}", start.elapsed())),
                ],
            );

            if !report.is_success() {
                error!("{} file(s) could not be converted", report.files_failed());
                std::process::exit(1);
            }
        }
        Err(e) => {
            error!("Conversion failed: {:#}", e);
            std::process::exit(1);
        }
    }
}

fn cmd_convert(pattern: &str, config: &PipelineConfig) -> Result<BatchReport> {
    let paths = batch::expand_pattern(pattern)?;

    println!("Converting {} file(s) matching {}", paths.len(), pattern);
    if config.batch.keep_going {
        println!("Failing files will be skipped");
    }

    let pb = create_progress_bar(paths.len());

    let result = batch::run_batch(&paths, config, |path| {
        pb.set_message(
            path.file_name()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_default(),
        );
        pb.inc(1);
    });

    pb.finish_and_clear();

    result.with_context(|| format!("while converting files matching '{}'", pattern))
}
