//! Quality-control report emitted alongside every run.
//!
//! The report always satisfies `rows_out <= rows_in` and
//! `dropped_rows == rows_in - rows_out`. Both hold by construction: the only
//! ways to obtain a [`QcReport`] are the checked constructors, the pipeline's
//! [`QcBuilder`], and deserialization (which re-runs the checks).

use std::path::{Path, PathBuf};

use anyhow::Result;
use log::warn;
use serde::{Deserialize, Serialize};

use crate::{error::QcError, io_utils};

pub const QC_REPORT_FILE: &str = "qc_report.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "QcReportFields")]
pub struct QcReport {
    rows_in: usize,
    rows_out: usize,
    dropped_rows: usize,
    missing_columns: Vec<String>,
    warnings: Vec<String>,
}

#[derive(Deserialize)]
struct QcReportFields {
    rows_in: usize,
    rows_out: usize,
    dropped_rows: usize,
    #[serde(default)]
    missing_columns: Option<Vec<String>>,
    #[serde(default)]
    warnings: Option<Vec<String>>,
}

impl TryFrom<QcReportFields> for QcReport {
    type Error = QcError;

    fn try_from(fields: QcReportFields) -> Result<Self, Self::Error> {
        QcReport::from_parts(
            fields.rows_in,
            fields.rows_out,
            fields.dropped_rows,
            fields.missing_columns.unwrap_or_default(),
            fields.warnings.unwrap_or_default(),
        )
    }
}

impl QcReport {
    /// Derives `dropped_rows` from the two row counts.
    pub fn new(
        rows_in: usize,
        rows_out: usize,
        missing_columns: Vec<String>,
        warnings: Vec<String>,
    ) -> Result<Self, QcError> {
        let dropped_rows = rows_in.checked_sub(rows_out).ok_or(QcError::RowsOutExceedsRowsIn {
            rows_in,
            rows_out,
        })?;
        Self::from_parts(rows_in, rows_out, dropped_rows, missing_columns, warnings)
    }

    pub fn from_parts(
        rows_in: usize,
        rows_out: usize,
        dropped_rows: usize,
        missing_columns: Vec<String>,
        warnings: Vec<String>,
    ) -> Result<Self, QcError> {
        if rows_out > rows_in {
            return Err(QcError::RowsOutExceedsRowsIn { rows_in, rows_out });
        }
        let expected = rows_in - rows_out;
        if dropped_rows != expected {
            return Err(QcError::DroppedMismatch {
                dropped_rows,
                expected,
            });
        }
        Ok(Self {
            rows_in,
            rows_out,
            dropped_rows,
            missing_columns,
            warnings,
        })
    }

    /// Report for an input that had no data rows at all.
    pub fn empty_input() -> Self {
        Self {
            rows_in: 0,
            rows_out: 0,
            dropped_rows: 0,
            missing_columns: Vec::new(),
            warnings: vec!["Input file has 0 rows.".to_string()],
        }
    }

    pub fn rows_in(&self) -> usize {
        self.rows_in
    }

    pub fn rows_out(&self) -> usize {
        self.rows_out
    }

    pub fn dropped_rows(&self) -> usize {
        self.dropped_rows
    }

    pub fn missing_columns(&self) -> &[String] {
        &self.missing_columns
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn save(&self, out_dir: &Path) -> Result<PathBuf> {
        io_utils::write_json(&out_dir.join(QC_REPORT_FILE), self)
    }
}

/// Accumulates warnings while the pipeline runs; consumed into a [`QcReport`].
#[derive(Debug)]
pub struct QcBuilder {
    rows_in: usize,
    missing_columns: Vec<String>,
    warnings: Vec<String>,
}

impl QcBuilder {
    pub fn new(rows_in: usize) -> Self {
        Self {
            rows_in,
            missing_columns: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        warn!("{message}");
        self.warnings.push(message);
    }

    pub fn set_missing_columns(&mut self, mut columns: Vec<String>) {
        columns.sort();
        self.missing_columns = columns;
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// `rows_out` is capped at `rows_in`.
    pub fn finish(self, rows_out: usize) -> QcReport {
        let rows_out = rows_out.min(self.rows_in);
        QcReport {
            rows_in: self.rows_in,
            rows_out,
            dropped_rows: self.rows_in - rows_out,
            missing_columns: self.missing_columns,
            warnings: self.warnings,
        }
    }
}
