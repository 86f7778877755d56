//! Loader for ASCII PCD point cloud files.
//!
//! A PCD file starts with a header of `KEY value...` lines. Only two of them
//! matter here:
//! - `FIELDS x y z ... label ...` names the per-point values
//! - `DATA ascii` ends the header; every following line is one point
//!
//! `POINTS n` is cross-checked against the number of rows read. Everything
//! else (`VERSION`, `SIZE`, `TYPE`, `COUNT`, `WIDTH`, `HEIGHT`, `VIEWPOINT`)
//! is accepted and ignored.

use std::fs;
use std::path::{Path, PathBuf};

use csv::ReaderBuilder;
use log::{debug, warn};
use thiserror::Error;

/// Names the first three fields must carry, in order.
pub const COORDINATE_FIELDS: [&str; 3] = ["x", "y", "z"];

/// Name of the field holding the integer class of each point.
pub const LABEL_FIELD: &str = "label";

/// One point: a value per field, in the table's field order.
pub type Point = Vec<f64>;

/// Errors raised while parsing PCD text.
#[derive(Error, Debug)]
pub enum FormatError {
    #[error("no FIELDS header line")]
    MissingFields,

    #[error("no `DATA ascii` line")]
    MissingData,

    #[error("unsupported DATA encoding '{0}', only ascii is supported")]
    UnsupportedEncoding(String),

    #[error("line {line}: expected {expected} values, found {found}")]
    FieldCountMismatch {
        line: u64,
        expected: usize,
        found: usize,
    },

    #[error("line {line}: '{value}' is not a finite number")]
    InvalidNumber { line: u64, value: String },

    #[error("unreadable data row: {0}")]
    Csv(#[from] csv::Error),
}

/// Errors raised when a point table does not have the shape clustering needs.
#[derive(Error, Debug, PartialEq)]
pub enum SchemaError {
    #[error("fields must start with x y z, found {found:?}")]
    CoordinateFields { found: Vec<String> },

    #[error("no 'label' field in {fields:?}")]
    MissingLabel { fields: Vec<String> },

    #[error("point {index} has {found} values, expected {expected}")]
    RowLength {
        index: usize,
        expected: usize,
        found: usize,
    },
}

/// Errors that can occur during file loading.
#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("failed to read '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid PCD file '{path}': {source}")]
    Format {
        path: PathBuf,
        #[source]
        source: FormatError,
    },
}

/// Result type for loader operations.
pub type Result<T> = std::result::Result<T, LoaderError>;

/// Parsed points together with the names of their fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointTable {
    fields: Vec<String>,
    points: Vec<Point>,
}

impl PointTable {
    /// Builds a table, rejecting any point whose length differs from the field count.
    pub fn new(fields: Vec<String>, points: Vec<Point>) -> std::result::Result<Self, SchemaError> {
        if let Some((index, point)) = points
            .iter()
            .enumerate()
            .find(|(_, p)| p.len() != fields.len())
        {
            return Err(SchemaError::RowLength {
                index,
                expected: fields.len(),
                found: point.len(),
            });
        }
        Ok(Self { fields, points })
    }

    #[inline]
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    #[inline]
    pub fn points(&self) -> &[Point] {
        &self.points
    }

    /// Returns the number of points in the table.
    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Position of the first field called `name`.
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f == name)
    }

    /// Checks that the table can be clustered and returns the label column.
    ///
    /// The first three fields must be exactly `x`, `y`, `z` and some field
    /// must be named `label`.
    pub fn label_index(&self) -> std::result::Result<usize, SchemaError> {
        let has_coordinates = self.fields.len() >= COORDINATE_FIELDS.len()
            && self
                .fields
                .iter()
                .zip(COORDINATE_FIELDS)
                .all(|(field, expected)| field == expected);
        if !has_coordinates {
            return Err(SchemaError::CoordinateFields {
                found: self.fields.iter().take(3).cloned().collect(),
            });
        }

        self.field_index(LABEL_FIELD)
            .ok_or_else(|| SchemaError::MissingLabel {
                fields: self.fields.clone(),
            })
    }

    /// Mean of every field over all points; empty when the table is empty.
    pub fn field_means(&self) -> Vec<f64> {
        if self.points.is_empty() {
            return Vec::new();
        }
        let mut sums = vec![0.0f64; self.fields.len()];
        for point in &self.points {
            for (sum, value) in sums.iter_mut().zip(point) {
                *sum += value;
            }
        }
        let n = self.points.len() as f64;
        sums.into_iter().map(|s| s / n).collect()
    }
}

/// Header values picked up before the data section.
struct Header<'a> {
    fields: Option<Vec<String>>,
    declared_points: Option<usize>,
    /// Text following the `DATA ascii` line.
    body: &'a str,
    /// 1-based file line number of the first body line.
    body_line: u64,
}

fn parse_header(text: &str) -> std::result::Result<Header<'_>, FormatError> {
    let mut fields = None;
    let mut declared_points = None;
    let mut offset = 0usize;
    let mut line_no = 0u64;

    for raw in text.split_inclusive('\n') {
        offset += raw.len();
        line_no += 1;

        let mut tokens = raw.split_whitespace();
        match tokens.next() {
            Some("FIELDS") if fields.is_none() => {
                fields = Some(tokens.map(str::to_string).collect());
            }
            Some("POINTS") => {
                declared_points = tokens.next().and_then(|n| n.parse().ok());
            }
            Some("DATA") => {
                let encoding = tokens.next().unwrap_or_default();
                if encoding != "ascii" {
                    return Err(FormatError::UnsupportedEncoding(encoding.to_string()));
                }
                return Ok(Header {
                    fields,
                    declared_points,
                    body: &text[offset..],
                    body_line: line_no + 1,
                });
            }
            _ => {}
        }
    }

    Err(FormatError::MissingData)
}

fn parse_value(value: &str, line: u64) -> std::result::Result<f64, FormatError> {
    value
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| FormatError::InvalidNumber {
            line,
            value: value.to_string(),
        })
}

/// Parse the text of an ASCII PCD file into a point table.
///
/// Blank lines in the data section (including the one left by the final
/// newline) are skipped. Every other row must hold exactly one numeric
/// value per declared field.
///
/// # Errors
///
/// Returns a [`FormatError`] if the FIELDS or `DATA ascii` line is missing,
/// the data is not ASCII, a row has the wrong number of values, or a value
/// is not a finite number.
pub fn parse_pcd(text: &str) -> std::result::Result<PointTable, FormatError> {
    let header = parse_header(text)?;
    let fields = header.fields.ok_or(FormatError::MissingFields)?;

    let mut reader = ReaderBuilder::new()
        .delimiter(b' ')
        .has_headers(false)
        .flexible(true)
        .quoting(false)
        .from_reader(header.body.as_bytes());

    let mut points = Vec::with_capacity(header.declared_points.unwrap_or(0).min(1 << 20));

    for result in reader.records() {
        let record = result?;
        if record.iter().all(str::is_empty) {
            continue;
        }

        let line = header.body_line + record.position().map_or(1, |p| p.line()) - 1;
        if record.len() != fields.len() {
            return Err(FormatError::FieldCountMismatch {
                line,
                expected: fields.len(),
                found: record.len(),
            });
        }

        let point = record
            .iter()
            .map(|v| parse_value(v, line))
            .collect::<std::result::Result<Point, _>>()?;
        points.push(point);
    }

    if let Some(declared) = header.declared_points {
        if declared != points.len() {
            warn!(
                "POINTS header declares {} points but {} rows were read",
                declared,
                points.len()
            );
        }
    }

    // Row lengths were checked above.
    Ok(PointTable { fields, points })
}

/// Load and parse an ASCII PCD file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or is not valid ASCII PCD.
pub fn load_pcd<P: AsRef<Path>>(path: P) -> Result<PointTable> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|source| LoaderError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let table = parse_pcd(&text).map_err(|source| LoaderError::Format {
        path: path.to_path_buf(),
        source,
    })?;

    debug!(
        "{}: {} points, fields {:?}, field means {:?}",
        path.display(),
        table.len(),
        table.fields(),
        table.field_means()
    );

    Ok(table)
}
