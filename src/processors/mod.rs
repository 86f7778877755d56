//! Data processing modules.

pub mod batch;
pub mod clustering;

// Re-export key types for convenience
pub use batch::{expand_pattern, process_file, run_batch, BatchError, BatchReport, FileOutcome};
pub use clustering::{cluster_points, summarize, Cluster, ClusteringSummary};
