#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use calamine::{Data, DataType, Reader, open_workbook_auto};
use rust_xlsxwriter::{ExcelDateTime, Format, Workbook};
use tempfile::{TempDir, tempdir};

pub const SALES_HEADER: &str = "Date,Product,Region,Revenue,Cost,Units";

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    /// Creates a fresh scratch directory for the current test case.
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    /// Returns the root path for all files owned by this workspace.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        self.write_bytes(name, contents.as_bytes())
    }

    pub fn write_bytes(&self, name: &str, contents: &[u8]) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        fs::write(&path, contents).expect("write temp file contents");
        path
    }

    /// Writes a CSV with the standard sales header followed by `rows`.
    pub fn sales_csv(&self, name: &str, rows: &[&str]) -> PathBuf {
        let mut contents = String::from(SALES_HEADER);
        for row in rows {
            contents.push('\n');
            contents.push_str(row);
        }
        contents.push('\n');
        self.write(name, &contents)
    }

    /// Writes a one-sheet workbook: a header row, then `rows` of typed cells.
    pub fn sales_xlsx(&self, name: &str, headers: &[&str], rows: &[Vec<Cell>]) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        let date_format = Format::new().set_num_format("yyyy-mm-dd");
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        for (col, header) in headers.iter().enumerate() {
            sheet.write_string(0, col as u16, *header).expect("write header");
        }
        for (idx, row) in rows.iter().enumerate() {
            let row_num = idx as u32 + 1;
            for (col, cell) in row.iter().enumerate() {
                let col = col as u16;
                match cell {
                    Cell::Blank => {}
                    Cell::Text(text) => {
                        sheet.write_string(row_num, col, *text).expect("write text");
                    }
                    Cell::Number(value) => {
                        sheet.write_number(row_num, col, *value).expect("write number");
                    }
                    Cell::Date(y, m, d) => {
                        let date = ExcelDateTime::from_ymd(*y, *m, *d).expect("valid date");
                        sheet
                            .write_datetime_with_format(row_num, col, &date, &date_format)
                            .expect("write date");
                    }
                }
            }
        }
        workbook.save(&path).expect("save workbook");
        path
    }

    pub fn out_dir(&self) -> PathBuf {
        self.path().join("out")
    }

    pub fn read_json(&self, relative: &str) -> serde_json::Value {
        let text = fs::read_to_string(self.out_dir().join(relative)).expect("read json artifact");
        serde_json::from_str(&text).expect("parse json artifact")
    }

    pub fn read_output(&self, relative: &str) -> String {
        fs::read_to_string(self.out_dir().join(relative)).expect("read output file")
    }

    /// One line per row of a `Final_Report.xlsx` sheet, cells joined by commas.
    pub fn read_sheet(&self, sheet: &str) -> String {
        let mut workbook =
            open_workbook_auto(self.out_dir().join("Final_Report.xlsx")).expect("open report");
        let range = workbook.worksheet_range(sheet).expect("sheet exists");
        range
            .rows()
            .map(|row| row.iter().map(render_cell).collect::<Vec<_>>().join(","))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Typed cell for building workbook inputs.
pub enum Cell {
    Blank,
    Text(&'static str),
    Number(f64),
    Date(u16, u8, u8),
}

fn render_cell(cell: &Data) -> String {
    match cell {
        Data::String(text) => text.clone(),
        Data::Float(value) => value.to_string(),
        Data::Int(value) => value.to_string(),
        Data::Bool(value) => value.to_string(),
        Data::DateTime(_) => cell
            .as_datetime()
            .map(|stamp| stamp.date().format("%Y-%m-%d").to_string())
            .unwrap_or_default(),
        _ => String::new(),
    }
}

/// `spreadsheet-rescue <command> -i <input> -o <workspace>/out` plus `extra`.
pub fn command(workspace: &TestWorkspace, subcommand: &str, input: &Path, extra: &[&str]) -> Command {
    let mut cmd = Command::cargo_bin("spreadsheet-rescue").expect("binary exists");
    cmd.env_remove("RUST_LOG")
        .arg(subcommand)
        .arg("-i")
        .arg(input)
        .arg("-o")
        .arg(workspace.out_dir())
        .args(extra);
    cmd
}
