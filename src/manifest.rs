//! Audit record written for every invocation, successful or not.

use std::{
    fs::File,
    io::{self, BufReader},
    path::{Path, PathBuf},
};

use anyhow::Result;
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::{io_utils, qc::QcReport};

pub const MANIFEST_FILE: &str = "run_manifest.json";
pub const TOOL_NAME: &str = "spreadsheet-rescue";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Success,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    MissingColumns,
    DuplicateColumns,
    EmptyInput,
    LoadFailed,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::MissingColumns => "missing_columns",
            ErrorCode::DuplicateColumns => "duplicate_columns",
            ErrorCode::EmptyInput => "empty_input",
            ErrorCode::LoadFailed => "load_failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunManifest {
    pub run_id: Uuid,
    pub tool: String,
    pub version: String,
    pub input_path: String,
    pub output_dir: String,
    pub created_at_utc: String,
    pub rows_in: usize,
    pub rows_out: usize,
    pub sha256: String,
    pub status: RunStatus,
    pub error_code: Option<ErrorCode>,
    pub error_message: Option<String>,
}

impl RunManifest {
    /// Fresh run id; paths are recorded in absolute form when they resolve.
    pub fn new(input: &Path, out_dir: &Path, created_at_utc: String) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            tool: TOOL_NAME.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            input_path: display_path(input),
            output_dir: display_path(out_dir),
            created_at_utc,
            rows_in: 0,
            rows_out: 0,
            sha256: sha256_file(input).unwrap_or_default(),
            status: RunStatus::Success,
            error_code: None,
            error_message: None,
        }
    }

    pub fn succeeded(mut self, qc: &QcReport) -> Self {
        self.rows_in = qc.rows_in();
        self.rows_out = qc.rows_out();
        self.status = RunStatus::Success;
        self.error_code = None;
        self.error_message = None;
        self
    }

    /// A failed run never reports surviving rows.
    pub fn failed(mut self, rows_in: usize, code: ErrorCode, message: impl Into<String>) -> Self {
        self.rows_in = rows_in;
        self.rows_out = 0;
        self.status = RunStatus::Failed;
        self.error_code = Some(code);
        self.error_message = Some(message.into());
        self
    }

    pub fn save(&self, out_dir: &Path) -> Result<PathBuf> {
        io_utils::write_json(&out_dir.join(MANIFEST_FILE), self)
    }
}

fn display_path(path: &Path) -> String {
    path.canonicalize()
        .or_else(|_| std::path::absolute(path))
        .unwrap_or_else(|_| path.to_path_buf())
        .display()
        .to_string()
}

/// Lowercase hex SHA-256 of a file's contents.
pub fn sha256_file(path: &Path) -> io::Result<String> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut hasher = Sha256::new();
    io::copy(&mut reader, &mut hasher)?;
    Ok(format!("{:x}", hasher.finalize()))
}

pub fn utc_now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn sha256_matches_known_digest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("abc.txt");
        fs::write(&path, "abc").unwrap();
        assert_eq!(
            sha256_file(&path).unwrap(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn failure_forces_rows_out_to_zero_and_serializes_codes() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.csv");
        fs::write(&input, "date\n").unwrap();
        let qc = QcReport::new(5, 3, vec![], vec![]).unwrap();
        let manifest = RunManifest::new(&input, dir.path(), utc_now_rfc3339())
            .succeeded(&qc)
            .failed(5, ErrorCode::MissingColumns, "Missing required columns: cost");
        assert_eq!(manifest.rows_out, 0);
        assert_eq!(manifest.status, RunStatus::Failed);

        let json = serde_json::to_value(&manifest).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["error_code"], "missing_columns");
        assert_eq!(json["tool"], TOOL_NAME);
        assert_eq!(json["sha256"].as_str().map(str::len), Some(64));
    }

    #[test]
    fn missing_input_hashes_to_empty_string() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = RunManifest::new(&dir.path().join("absent.csv"), dir.path(), utc_now_rfc3339());
        assert_eq!(manifest.sha256, "");
        assert!(manifest.error_code.is_none());
        assert!(chrono::DateTime::parse_from_rfc3339(&manifest.created_at_utc).is_ok());
    }
}
