//! Reduce labeled point clouds to per-cluster label centers.
//!
//! This crate provides tools for:
//! - Parsing ASCII PCD files with `x y z ... label` fields
//! - Greedy clustering of same-label points within a fixed radius
//! - Writing one `x y z label` line per cluster to `<file>.labels`
//! - Converting every file matched by a glob, one file at a time
//!
//! # Example
//!
//! ```no_run
//! use pcd_label_centers::{core::loaders::load_pcd, processors::clustering::cluster_points};
//! use pcd_label_centers::ClusteringConfig;
//!
//! let table = load_pcd("scan.pcd").unwrap();
//! let clusters = cluster_points(&table, &ClusteringConfig::default()).unwrap();
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod processors;

pub use config::{BatchConfig, ClusteringConfig, ErrorPolicy, PipelineConfig};
pub use crate::core::loaders::{PointTable, SchemaError};
pub use processors::clustering::Cluster;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
