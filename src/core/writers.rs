//! Writer for `.labels` files.
//!
//! A `.labels` file is written next to each input cloud and holds one line
//! per cluster:
//!
//! ```text
//! x y z label
//! 0.05 0.0 0.0 1
//! 5.0 5.0 5.0 1
//! ```
//!
//! Coordinates are the cluster center in shortest round-trip decimal form;
//! the label is the integer class.

use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use csv::{Terminator, WriterBuilder};
use thiserror::Error;

use crate::processors::clustering::Cluster;

/// Header line of every `.labels` file.
pub const LABELS_HEADER: [&str; 4] = ["x", "y", "z", "label"];

/// Suffix appended to the input file name.
pub const LABELS_SUFFIX: &str = ".labels";

/// Errors that can occur during write operations.
#[derive(Error, Debug)]
pub enum WriteError {
    /// Failed to create parent directories.
    #[error("failed to create parent directories for '{path}': {source}")]
    CreateDirectory {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to create or open file for writing.
    #[error("failed to create file '{path}': {source}")]
    CreateFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to write data to file.
    #[error("failed to write to file '{path}': {source}")]
    WriteFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Record writing error.
    #[error("record write error for '{path}': {source}")]
    CsvError {
        path: String,
        #[source]
        source: csv::Error,
    },
}

/// Result type for write operations.
pub type Result<T> = std::result::Result<T, WriteError>;

/// Output path for an input cloud: the input path with `.labels` appended.
///
/// ```
/// use pcd_label_centers::core::writers::labels_path;
/// use std::path::{Path, PathBuf};
///
/// assert_eq!(labels_path(Path::new("scans/a.pcd")), PathBuf::from("scans/a.pcd.labels"));
/// ```
pub fn labels_path(input: &Path) -> PathBuf {
    let mut name: OsString = input.as_os_str().to_owned();
    name.push(LABELS_SUFFIX);
    PathBuf::from(name)
}

/// Creates parent directories for a file path if they don't exist.
fn ensure_parent_dirs(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| WriteError::CreateDirectory {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
    }
    Ok(())
}

/// One output row for a cluster.
fn cluster_record(cluster: &Cluster) -> [String; 4] {
    let [x, y, z] = cluster.center();
    [
        format!("{:?}", x),
        format!("{:?}", y),
        format!("{:?}", z),
        cluster.class().to_string(),
    ]
}

/// Write the header and one row per cluster to `writer`.
pub fn write_labels_to<W: Write>(writer: W, clusters: &[Cluster]) -> csv::Result<()> {
    let mut csv_writer = WriterBuilder::new()
        .delimiter(b' ')
        .terminator(Terminator::Any(b'\n'))
        .has_headers(false)
        .from_writer(writer);

    csv_writer.write_record(LABELS_HEADER)?;
    for cluster in clusters {
        csv_writer.write_record(&cluster_record(cluster))?;
    }
    csv_writer.flush()?;

    Ok(())
}

/// Render clusters as the text of a `.labels` file.
pub fn format_labels(clusters: &[Cluster]) -> String {
    let mut buf = Vec::new();
    // Writing to a Vec cannot fail and every field is valid UTF-8.
    let _ = write_labels_to(&mut buf, clusters);
    String::from_utf8_lossy(&buf).into_owned()
}

/// Write clusters to a `.labels` file.
///
/// # Arguments
///
/// * `path` - Output file path (parent directories will be created if needed)
/// * `clusters` - Clusters in the order they should be listed
///
/// # Errors
///
/// Returns an error if:
/// - Parent directories cannot be created
/// - File cannot be created or written to
pub fn write_labels(path: &Path, clusters: &[Cluster]) -> Result<()> {
    ensure_parent_dirs(path)?;

    let file = File::create(path).map_err(|e| WriteError::CreateFile {
        path: path.display().to_string(),
        source: e,
    })?;
    let mut buf_writer = BufWriter::new(file);

    write_labels_to(&mut buf_writer, clusters).map_err(|e| WriteError::CsvError {
        path: path.display().to_string(),
        source: e,
    })?;

    buf_writer.flush().map_err(|e| WriteError::WriteFile {
        path: path.display().to_string(),
        source: e,
    })?;

    Ok(())
}
