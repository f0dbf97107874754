//! Error types for the geodat library
//!
//! Only data loading can fail. Lookups are total functions returning
//! `Option`, so nothing in this module ever reaches the read path.

use crate::format::DataFile;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for load operations
pub type Result<T, E = LoadError> = std::result::Result<T, E>;

/// Structural problems found in a range or location table
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TableError {
    /// Byte length is not a whole number of records
    #[error("length {len} is not a multiple of the {record_size}-byte record size")]
    PartialRecord {
        /// Table length in bytes
        len: usize,
        /// Expected record size in bytes
        record_size: usize,
    },

    /// A record whose start address is greater than its end address
    #[error("record {index} has start > end")]
    InvertedRange {
        /// Index of the offending record
        index: usize,
    },

    /// A record that does not start strictly after the previous record's end
    #[error("record {index} does not start after the previous record ends")]
    Unordered {
        /// Index of the offending record
        index: usize,
    },
}

/// Error raised by a reload attempt
///
/// A failed reload never publishes anything; the previously published
/// snapshot stays active.
#[derive(Error, Debug)]
pub enum LoadError {
    /// Reading a data file failed for a reason other than absence
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        /// File being read
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// A data file was read but its contents are structurally invalid
    #[error("invalid {file}: {source}")]
    Table {
        /// Which data file
        file: DataFile,
        /// What is wrong with it
        #[source]
        source: TableError,
    },

    /// The directory watcher could not be started
    #[error("watch error: {0}")]
    Watch(String),
}

/// Error raised while encoding data files with [`crate::builder::DataSetBuilder`]
#[derive(Error, Debug)]
pub enum BuildError {
    /// Range start is greater than its end
    #[error("invalid range {start}..={end}")]
    InvalidRange {
        /// Start as written by the caller
        start: String,
        /// End as written by the caller
        end: String,
    },

    /// Two ranges of the same family intersect
    #[error("range starting at {start} overlaps the previous range")]
    Overlap {
        /// Start of the second range
        start: String,
    },

    /// A range references a location id that was never added
    #[error("unknown location id {0}")]
    UnknownLocation(u32),

    /// A text value does not fit its fixed-width field
    #[error("{field} value {value:?} exceeds {width} bytes")]
    FieldTooLong {
        /// Field name
        field: &'static str,
        /// Rejected value
        value: String,
        /// Field width in bytes
        width: usize,
    },

    /// A legacy record has no country to write
    #[error("range starting at {start} has no country code")]
    MissingCountry {
        /// Start of the range
        start: String,
    },

    /// Writing an output file failed
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl LoadError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        LoadError::Io {
            path: path.into(),
            source,
        }
    }
}
