//! Batch conversion of PCD files into `.labels` files.
//!
//! Every matched file is handled on its own: load, cluster, write
//! `<file>.labels`. Nothing is shared between files, so they may be
//! processed concurrently with rayon.

use std::path::{Path, PathBuf};

use log::{debug, error, info, trace, warn};
use rayon::prelude::*;
use thiserror::Error;

use crate::config::{ClusteringConfig, ErrorPolicy, PipelineConfig};
use crate::core::loaders::{load_pcd, LoaderError, SchemaError};
use crate::core::writers::{format_labels, labels_path, write_labels, WriteError};
use crate::processors::clustering::{cluster_points, summarize, ClusteringSummary};

/// Errors that can occur while converting files.
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("invalid glob pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },

    #[error("'{0}' is a directory, not a point cloud file")]
    NotAFile(PathBuf),

    #[error(transparent)]
    Load(#[from] LoaderError),

    #[error("cannot cluster '{path}': {source}")]
    Schema {
        path: PathBuf,
        #[source]
        source: SchemaError,
    },

    #[error(transparent)]
    Write(#[from] WriteError),
}

/// Result of converting one file.
#[derive(Debug, Clone)]
pub struct FileOutcome {
    pub input: PathBuf,
    pub output: PathBuf,
    pub summary: ClusteringSummary,
}

/// A file that could not be converted.
#[derive(Debug)]
pub struct FileFailure {
    pub path: PathBuf,
    pub error: BatchError,
}

/// Outcome of a whole run.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub outcomes: Vec<FileOutcome>,
    pub failures: Vec<FileFailure>,
}

impl BatchReport {
    /// Number of `.labels` files written.
    pub fn files_written(&self) -> usize {
        self.outcomes.len()
    }

    pub fn files_failed(&self) -> usize {
        self.failures.len()
    }

    /// Clusters written across all files.
    pub fn total_clusters(&self) -> usize {
        self.outcomes.iter().map(|o| o.summary.clusters).sum()
    }

    /// True when no file failed.
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Expand a glob pattern into the paths it matches, in sorted order.
///
/// Entries the walk cannot read are logged and skipped. Matching nothing
/// is not an error.
///
/// # Errors
///
/// Returns [`BatchError::Pattern`] if the pattern is malformed.
pub fn expand_pattern(pattern: &str) -> Result<Vec<PathBuf>, BatchError> {
    let entries = glob::glob(pattern).map_err(|source| BatchError::Pattern {
        pattern: pattern.to_string(),
        source,
    })?;

    let mut paths = Vec::new();
    for entry in entries {
        match entry {
            Ok(path) => paths.push(path),
            Err(e) => warn!("skipping {}: {}", e.path().display(), e.error()),
        }
    }

    if paths.is_empty() {
        warn!("pattern '{}' matched no files", pattern);
    } else {
        debug!("pattern '{}' matched {} paths", pattern, paths.len());
    }

    Ok(paths)
}

/// Load one PCD file, cluster it and write `<path>.labels`.
///
/// Nothing is written when loading or clustering fails.
///
/// # Errors
///
/// Returns an error if the path is a directory, the file cannot be read or
/// parsed, its fields cannot be clustered, or the output cannot be written.
pub fn process_file(path: &Path, config: &ClusteringConfig) -> Result<FileOutcome, BatchError> {
    if path.is_dir() {
        return Err(BatchError::NotAFile(path.to_path_buf()));
    }

    let table = load_pcd(path)?;

    let clusters = cluster_points(&table, config).map_err(|source| BatchError::Schema {
        path: path.to_path_buf(),
        source,
    })?;
    let summary = summarize(&table, &clusters, config);

    let file_name = path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("unknown");
    info!(
        "{}: {} points ({} background), {} clusters",
        file_name, summary.points, summary.background_points, summary.clusters
    );
    debug!(
        "{}: clusters per class {:?}, {} assignments",
        file_name, summary.clusters_per_class, summary.assignments
    );
    trace!("{}:\n{}", file_name, format_labels(&clusters));

    let output = labels_path(path);
    write_labels(&output, &clusters)?;
    info!("Labels -> {}", output.display());

    Ok(FileOutcome {
        input: path.to_path_buf(),
        output,
        summary,
    })
}

/// Process every path, honoring the configured error policy.
///
/// `on_done` is called once per path after it has been handled, whatever
/// the outcome; use it to drive a progress display.
///
/// # Errors
///
/// With [`ErrorPolicy::Abort`], returns the error of the first failing file
/// (in input order). With [`ErrorPolicy::Continue`] failures are collected
/// in the report and this never fails.
pub fn run_batch<F>(
    paths: &[PathBuf],
    config: &PipelineConfig,
    on_done: F,
) -> Result<BatchReport, BatchError>
where
    F: Fn(&Path) + Sync,
{
    let policy = config.batch.error_policy();
    let clustering = &config.clustering;

    let convert = |path: &PathBuf| {
        let result = process_file(path, clustering);
        on_done(path.as_path());
        result
    };

    let mut report = BatchReport::default();

    if config.batch.parallel {
        // Outputs of files after a failing one are still written in this mode.
        let results: Vec<_> = paths.par_iter().map(convert).collect();
        for (path, result) in paths.iter().zip(results) {
            record(&mut report, path, result, policy)?;
        }
    } else {
        for path in paths {
            let result = convert(path);
            record(&mut report, path, result, policy)?;
        }
    }

    Ok(report)
}

fn record(
    report: &mut BatchReport,
    path: &Path,
    result: Result<FileOutcome, BatchError>,
    policy: ErrorPolicy,
) -> Result<(), BatchError> {
    match result {
        Ok(outcome) => report.outcomes.push(outcome),
        Err(e) => match policy {
            ErrorPolicy::Abort => return Err(e),
            ErrorPolicy::Continue => {
                error!("{}: {}", path.display(), e);
                report.failures.push(FileFailure {
                    path: path.to_path_buf(),
                    error: e,
                });
            }
        },
    }
    Ok(())
}
