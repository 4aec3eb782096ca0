//! Typed errors for configuration mistakes and report invariants.
//!
//! Bad *data* never surfaces here: the cleaning pipeline records data problems
//! in the QC report. These errors cover the cases that must stop a run before
//! any cleaning starts, plus the constructor checks of [`crate::qc::QcReport`].

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Unknown number locale '{0}' (expected one of: auto, us, eu)")]
    UnknownLocale(String),

    #[error("Invalid --map value: '{0}' (expected target=source)")]
    InvalidMapping(String),

    #[error("--map entries must have non-empty target and source (target=source): '{0}'")]
    EmptyMappingSide(String),

    #[error("Profile not found: {} (expected lines like revenue=Sales)", .0.display())]
    ProfileNotFound(PathBuf),

    #[error("Profile path is a directory, not a file: {}", .0.display())]
    ProfileNotAFile(PathBuf),

    #[error("Invalid profile line {line} in {}: {source}", .path.display())]
    ProfileLine {
        path: PathBuf,
        line: usize,
        #[source]
        source: Box<ConfigError>,
    },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QcError {
    #[error("rows_out ({rows_out}) must be <= rows_in ({rows_in})")]
    RowsOutExceedsRowsIn { rows_in: usize, rows_out: usize },

    #[error("dropped_rows ({dropped_rows}) must equal rows_in - rows_out ({expected})")]
    DroppedMismatch { dropped_rows: usize, expected: usize },
}
