//! File I/O: loading input tables and writing JSON artifacts.
//!
//! - **Loading**: `.csv`/`.tsv`/`.txt` are decoded (BOM stripped, UTF-8 with a
//!   Windows-1252 fallback unless an encoding is forced), the delimiter is
//!   sniffed from the header line, and ragged rows are padded. Spreadsheets
//!   (`.xlsx`, `.xlsm`, `.xls`, `.ods`) are read from their first sheet.
//! - **JSON artifacts**: pretty-printed with sorted keys and written through a
//!   `.tmp` sibling that is renamed into place.

use std::{
    ffi::OsString,
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, anyhow, bail};
use calamine::{Data, DataType, Reader, open_workbook_auto};
use chrono::Timelike;
use encoding_rs::{Encoding, UTF_8, WINDOWS_1252};
use log::debug;
use serde::Serialize;

use crate::data::RawTable;

pub const DEFAULT_CSV_DELIMITER: u8 = b',';
pub const DEFAULT_TSV_DELIMITER: u8 = b'\t';

const SNIFF_CANDIDATES: [u8; 4] = [b',', b';', b'\t', b'|'];

/// Cell texts read as missing values.
const NA_PLACEHOLDERS: [&str; 9] = ["NA", "N/A", "null", "NULL", "NaN", "None", "#N/A", "n/a", "nan"];

const TEXT_EXTENSIONS: [&str; 3] = ["csv", "tsv", "txt"];
const SPREADSHEET_EXTENSIONS: [&str; 4] = ["xlsx", "xlsm", "xls", "ods"];

/// `None` means "detect": UTF-8 first, Windows-1252 as fallback.
pub fn resolve_encoding(label: Option<&str>) -> Result<Option<&'static Encoding>> {
    label
        .map(|value| {
            Encoding::for_label(value.trim().as_bytes())
                .ok_or_else(|| anyhow!("Unknown encoding '{value}'"))
        })
        .transpose()
}

fn extension(path: &Path) -> String {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default()
}

pub fn load_table(
    path: &Path,
    delimiter: Option<u8>,
    encoding: Option<&'static Encoding>,
) -> Result<RawTable> {
    if !path.exists() {
        bail!("Input file not found: {}", path.display());
    }
    if !path.is_file() {
        bail!("Input path is not a file: {}", path.display());
    }
    let ext = extension(path);
    let table = if TEXT_EXTENSIONS.contains(&ext.as_str()) {
        load_delimited(path, delimiter, encoding)?
    } else if SPREADSHEET_EXTENSIONS.contains(&ext.as_str()) {
        load_spreadsheet(path)?
    } else {
        bail!(
            "Unsupported file type: '.{ext}'. Use .csv, .tsv, .txt, .xlsx, .xlsm, .xls or .ods"
        );
    };
    debug!(
        "Loaded {} row(s) x {} column(s) from {:?}",
        table.len(),
        table.headers().len(),
        path
    );
    Ok(table)
}

fn load_delimited(
    path: &Path,
    delimiter: Option<u8>,
    encoding: Option<&'static Encoding>,
) -> Result<RawTable> {
    let bytes = fs::read(path).with_context(|| format!("Reading input file {path:?}"))?;
    let text = decode_input(&bytes, encoding)
        .with_context(|| format!("Could not read {} (decode failed)", path.display()))?;
    let delimiter = resolve_input_delimiter(path, delimiter, &text);
    debug!("Using delimiter {:?} for {:?}", delimiter as char, path);

    let mut reader = open_csv_reader(text.as_bytes(), delimiter);
    let headers = reader
        .headers()
        .with_context(|| format!("Parsing header row of {path:?}"))?
        .iter()
        .map(str::to_string)
        .collect::<Vec<_>>();
    let headers = label_blank_headers(headers);
    let mut rows = Vec::new();
    for (idx, record) in reader.records().enumerate() {
        let record =
            record.with_context(|| format!("Parsing row {} of {}", idx + 2, path.display()))?;
        rows.push(record.iter().map(text_cell).collect());
    }
    Ok(RawTable::new(headers, rows))
}

/// Forced encodings must decode cleanly; otherwise UTF-8 falls back to Windows-1252.
pub fn decode_input(bytes: &[u8], encoding: Option<&'static Encoding>) -> Result<String> {
    match encoding {
        Some(encoding) => decode_bytes(bytes, encoding),
        None => {
            let (text, _, had_errors) = UTF_8.decode(bytes);
            if !had_errors {
                return Ok(text.into_owned());
            }
            debug!("Input is not valid UTF-8; decoding as windows-1252");
            decode_bytes(bytes, WINDOWS_1252)
        }
    }
}

/// Decodes with BOM sniffing, so a UTF-8 BOM never reaches the first header.
pub fn decode_bytes(bytes: &[u8], encoding: &'static Encoding) -> Result<String> {
    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        Err(anyhow!(
            "Failed to decode text with encoding {}",
            encoding.name()
        ))
    } else {
        Ok(text.into_owned())
    }
}

/// An explicit delimiter wins, `.tsv` means tab, anything else is sniffed.
pub fn resolve_input_delimiter(path: &Path, provided: Option<u8>, text: &str) -> u8 {
    provided.unwrap_or_else(|| match extension(path).as_str() {
        "tsv" => DEFAULT_TSV_DELIMITER,
        _ => sniff_delimiter(text),
    })
}

/// Most frequent candidate in the first line; ties go to the earlier candidate.
pub fn sniff_delimiter(text: &str) -> u8 {
    let header = text.lines().next().unwrap_or_default();
    let mut best = (DEFAULT_CSV_DELIMITER, 0);
    for candidate in SNIFF_CANDIDATES {
        let count = header.bytes().filter(|b| *b == candidate).count();
        if count > best.1 {
            best = (candidate, count);
        }
    }
    best.0
}

pub fn open_csv_reader<R>(reader: R, delimiter: u8) -> csv::Reader<R>
where
    R: std::io::Read,
{
    let mut builder = csv::ReaderBuilder::new();
    builder
        .has_headers(true)
        .delimiter(delimiter)
        .double_quote(true)
        .flexible(true);
    builder.from_reader(reader)
}

/// Blank header cells (trailing delimiters, unnamed spreadsheet columns) become
/// `Unnamed: <index>`, so they never collide with each other.
pub fn label_blank_headers(headers: Vec<String>) -> Vec<String> {
    headers
        .into_iter()
        .enumerate()
        .map(|(idx, header)| {
            if header.trim().is_empty() {
                format!("Unnamed: {idx}")
            } else {
                header
            }
        })
        .collect()
}

fn text_cell(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || NA_PLACEHOLDERS.contains(&trimmed) {
        None
    } else {
        Some(raw.to_string())
    }
}

fn load_spreadsheet(path: &Path) -> Result<RawTable> {
    let mut workbook = open_workbook_auto(path)
        .with_context(|| format!("Opening workbook {}", path.display()))?;
    let Some(sheet) = workbook.sheet_names().first().cloned() else {
        return Ok(RawTable::default());
    };
    let range = workbook
        .worksheet_range(&sheet)
        .with_context(|| format!("Reading sheet '{sheet}' of {}", path.display()))?;
    let mut rows = range.rows();
    let Some(header_row) = rows.next() else {
        return Ok(RawTable::default());
    };
    let headers = label_blank_headers(
        header_row
            .iter()
            .map(|cell| spreadsheet_cell(cell).unwrap_or_default())
            .collect(),
    );
    let rows = rows
        .map(|row| row.iter().map(spreadsheet_cell).collect::<Vec<_>>())
        .filter(|row: &Vec<Option<String>>| row.iter().any(Option::is_some))
        .collect();
    Ok(RawTable::new(headers, rows))
}

/// Renders a workbook cell the way it would appear in a CSV export.
fn spreadsheet_cell(cell: &Data) -> Option<String> {
    match cell {
        Data::Empty | Data::Error(_) => None,
        Data::String(text) => text_cell(text),
        Data::Float(value) => Some(value.to_string()),
        Data::Int(value) => Some(value.to_string()),
        Data::Bool(value) => Some(value.to_string()),
        Data::DateTime(_) => cell.as_datetime().map(|stamp| {
            if stamp.time().num_seconds_from_midnight() == 0 {
                stamp.format("%Y-%m-%d").to_string()
            } else {
                stamp.format("%Y-%m-%d %H:%M:%S").to_string()
            }
        }),
        Data::DateTimeIso(text) | Data::DurationIso(text) => text_cell(text),
    }
}

/// Writes `value` as pretty JSON with sorted keys, atomically.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<PathBuf> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Creating directory {}", parent.display()))?;
    }
    // serde_json's default map is ordered, so the round trip sorts keys.
    let sorted = serde_json::to_value(value).context("Serializing JSON artifact")?;
    let mut payload = serde_json::to_string_pretty(&sorted)?;
    payload.push('\n');

    let mut tmp_name = OsString::from(path.as_os_str());
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);
    fs::write(&tmp_path, payload).with_context(|| format!("Writing {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path)
        .with_context(|| format!("Moving {} into place", path.display()))?;
    Ok(path.to_path_buf())
}
