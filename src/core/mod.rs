//! Core data types and I/O operations.

pub mod loaders;
pub mod writers;

pub use loaders::{load_pcd, parse_pcd, FormatError, LoaderError, Point, PointTable, SchemaError};
pub use writers::{format_labels, labels_path, write_labels, WriteError};
