//! Report writer: `Final_Report.xlsx` with one worksheet per view.
//!
//! Numbers are stored as numbers and dates as date cells, so reading the
//! workbook back yields the aggregator's values unchanged. The file is saved
//! under a temporary name and renamed into place.

use std::{
    ffi::OsString,
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use chrono::{Datelike, NaiveDate};
use log::debug;
use rust_xlsxwriter::{Color, ExcelDateTime, Format, FormatAlign, Workbook, Worksheet};

use crate::{
    aggregate::{KpiSet, PROFIT_MARGIN, TopGroups, WeeklyRow},
    data::{CleanedTable, Value},
    qc::QcReport,
};

pub const REPORT_FILE: &str = "Final_Report.xlsx";
pub const SHEET_NAMES: [&str; 5] = ["Dashboard", "Weekly", "Top_Products", "Top_Regions", "Clean_Data"];

const CURRENCY_FORMAT: &str = "#,##0.00";
const INTEGER_FORMAT: &str = "#,##0";
const PERCENT_FORMAT: &str = "0.0\"%\"";
const DATE_FORMAT: &str = "yyyy-mm-dd";
const HEADER_FILL: u32 = 0x2F5496;

/// Everything a report needs, borrowed from the run that produced it.
#[derive(Debug, Clone, Copy)]
pub struct ReportInputs<'a> {
    pub table: &'a CleanedTable,
    pub kpis: &'a KpiSet,
    pub weekly: &'a [WeeklyRow],
    pub top_products: &'a TopGroups,
    pub top_regions: &'a TopGroups,
    pub qc: &'a QcReport,
}

struct Sheet {
    name: &'static str,
    headers: Vec<&'static str>,
    rows: Vec<Vec<Value>>,
}

/// Cell formats shared by every worksheet.
struct Formats {
    header: Format,
    currency: Format,
    integer: Format,
    percent: Format,
    date: Format,
    plain: Format,
}

impl Formats {
    fn new() -> Self {
        Self {
            header: Format::new()
                .set_bold()
                .set_font_color(Color::White)
                .set_background_color(Color::RGB(HEADER_FILL))
                .set_align(FormatAlign::Center),
            currency: Format::new().set_num_format(CURRENCY_FORMAT),
            integer: Format::new().set_num_format(INTEGER_FORMAT),
            percent: Format::new().set_num_format(PERCENT_FORMAT),
            date: Format::new().set_num_format(DATE_FORMAT),
            plain: Format::new(),
        }
    }

    /// Number format for a data column, by its header name.
    fn for_column(&self, column: &str) -> &Format {
        match column {
            "revenue" | "cost" | "profit" => &self.currency,
            "units" => &self.integer,
            _ => &self.plain,
        }
    }
}

pub fn write_report(out_dir: &Path, inputs: &ReportInputs<'_>) -> Result<PathBuf> {
    let report_path = out_dir.join(REPORT_FILE);
    let mut tmp_name = OsString::from(report_path.as_os_str());
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);

    let formats = Formats::new();
    let mut workbook = Workbook::new();
    for sheet in build_sheets(inputs) {
        let worksheet = workbook.add_worksheet();
        if sheet.name == "Dashboard" {
            write_dashboard(worksheet, &sheet, &formats)?;
        } else {
            write_sheet(worksheet, &sheet, &formats)?;
        }
        debug!("Prepared sheet {} with {} row(s)", sheet.name, sheet.rows.len());
    }

    if let Err(err) = workbook.save(&tmp_path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(err).with_context(|| format!("Writing workbook {}", tmp_path.display()));
    }
    fs::rename(&tmp_path, &report_path)
        .with_context(|| format!("Moving report into {}", report_path.display()))?;
    Ok(report_path)
}

fn write_header(worksheet: &mut Worksheet, sheet: &Sheet, formats: &Formats) -> Result<()> {
    worksheet.set_name(sheet.name)?;
    for (col, header) in sheet.headers.iter().enumerate() {
        worksheet.write_string_with_format(0, col as u16, *header, &formats.header)?;
    }
    worksheet.set_freeze_panes(1, 0)?;
    Ok(())
}

fn write_sheet(worksheet: &mut Worksheet, sheet: &Sheet, formats: &Formats) -> Result<()> {
    write_header(worksheet, sheet, formats)?;
    for (idx, row) in sheet.rows.iter().enumerate() {
        for (col, (header, value)) in sheet.headers.iter().zip(row).enumerate() {
            let format = formats.for_column(header);
            write_value(worksheet, idx as u32 + 1, col as u16, value, format, formats)?;
        }
    }
    worksheet.autofit();
    Ok(())
}

fn write_dashboard(worksheet: &mut Worksheet, sheet: &Sheet, formats: &Formats) -> Result<()> {
    write_header(worksheet, sheet, formats)?;
    for (idx, row) in sheet.rows.iter().enumerate() {
        let row_num = idx as u32 + 1;
        let [label, value] = row.as_slice() else {
            continue;
        };
        let label_text = label.as_display();
        worksheet.write_string(row_num, 0, label_text.as_str())?;
        let format = match (label_text.as_str(), value) {
            (PROFIT_MARGIN, _) => &formats.percent,
            (_, Value::Integer(_)) => &formats.integer,
            (_, Value::Float(_)) => &formats.currency,
            _ => &formats.plain,
        };
        write_value(worksheet, row_num, 1, value, format, formats)?;
    }
    worksheet.set_column_width(0, 22)?;
    worksheet.set_column_width(1, 60)?;
    Ok(())
}

fn write_value(
    worksheet: &mut Worksheet,
    row: u32,
    col: u16,
    value: &Value,
    number_format: &Format,
    formats: &Formats,
) -> Result<()> {
    match value {
        Value::Text(text) => {
            worksheet.write_string(row, col, text.as_str())?;
        }
        Value::Integer(number) => {
            worksheet.write_number_with_format(row, col, *number as f64, number_format)?;
        }
        Value::Float(number) => {
            worksheet.write_number_with_format(row, col, *number, number_format)?;
        }
        Value::Date(date) => {
            worksheet.write_datetime_with_format(row, col, &excel_date(*date)?, &formats.date)?;
        }
    }
    Ok(())
}

fn excel_date(date: NaiveDate) -> Result<ExcelDateTime> {
    let year = u16::try_from(date.year())
        .with_context(|| format!("Date {date} is outside the workbook date range"))?;
    ExcelDateTime::from_ymd(year, date.month() as u8, date.day() as u8)
        .with_context(|| format!("Date {date} is outside the workbook date range"))
}

fn build_sheets(inputs: &ReportInputs<'_>) -> Vec<Sheet> {
    vec![
        dashboard_sheet(inputs.kpis, inputs.qc),
        Sheet {
            name: "Weekly",
            headers: vec!["week", "revenue", "cost", "profit", "units"],
            rows: inputs
                .weekly
                .iter()
                .map(|w| {
                    vec![
                        w.week.into(),
                        w.revenue.into(),
                        w.cost.into(),
                        w.profit.into(),
                        w.units.into(),
                    ]
                })
                .collect(),
        },
        top_sheet("Top_Products", inputs.top_products),
        top_sheet("Top_Regions", inputs.top_regions),
        Sheet {
            name: "Clean_Data",
            headers: vec![
                "date", "product", "region", "revenue", "cost", "units", "profit", "week",
            ],
            rows: inputs
                .table
                .iter()
                .map(|row| {
                    vec![
                        row.date.into(),
                        row.product.as_str().into(),
                        row.region.as_str().into(),
                        row.revenue.into(),
                        row.cost.into(),
                        row.units.into(),
                        row.profit.into(),
                        row.week.into(),
                    ]
                })
                .collect(),
        },
    ]
}

/// KPIs in their fixed order, then row counts and QC notes.
fn dashboard_sheet(kpis: &KpiSet, qc: &QcReport) -> Sheet {
    let mut rows: Vec<Vec<Value>> = kpis
        .iter()
        .map(|(label, value)| vec![label.into(), value.clone()])
        .collect();
    for (label, count) in [
        ("Rows In", qc.rows_in()),
        ("Rows Out", qc.rows_out()),
        ("Dropped Rows", qc.dropped_rows()),
    ] {
        rows.push(vec![label.into(), Value::Integer(count as i64)]);
    }
    if qc.warnings().is_empty() {
        rows.push(vec!["Note".into(), "No warnings".into()]);
    }
    for warning in qc.warnings() {
        rows.push(vec!["Note".into(), warning.as_str().into()]);
    }
    Sheet {
        name: "Dashboard",
        headers: vec!["metric", "value"],
        rows,
    }
}

fn top_sheet(name: &'static str, top: &TopGroups) -> Sheet {
    Sheet {
        name,
        headers: vec![top.by.column_name(), "revenue", "profit"],
        rows: top
            .rows
            .iter()
            .map(|group| {
                vec![
                    group.key.as_str().into(),
                    group.revenue.into(),
                    group.profit.into(),
                ]
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        aggregate::{compute_dashboard_kpis, compute_top_products, compute_top_regions, compute_weekly},
        data::RawTable,
        pipeline::{CleanOptions, clean},
    };
    use calamine::{Data, DataType, Reader, open_workbook_auto};

    #[test]
    fn workbook_holds_every_sheet_with_typed_cells() {
        let raw = RawTable::from_text(
            &["date", "product", "region", "revenue", "cost", "units"],
            &[
                vec!["2024-01-02", "Widget", "US", "100.5", "40", "10"],
                vec!["2024-01-09", "Gadget", "EU", "200", "80", "20"],
            ],
        );
        let outcome = clean(&raw, &CleanOptions::default());
        let kpis = compute_dashboard_kpis(&outcome.table);
        let weekly = compute_weekly(&outcome.table);
        let products = compute_top_products(&outcome.table, 10);
        let regions = compute_top_regions(&outcome.table, 10);
        let inputs = ReportInputs {
            table: &outcome.table,
            kpis: &kpis,
            weekly: &weekly,
            top_products: &products,
            top_regions: &regions,
            qc: &outcome.report,
        };

        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(REPORT_FILE), "stale").unwrap();

        let path = write_report(dir.path(), &inputs).unwrap();
        assert_eq!(path, dir.path().join(REPORT_FILE));
        assert!(!dir.path().join("Final_Report.xlsx.tmp").exists());

        let mut workbook = open_workbook_auto(&path).unwrap();
        assert_eq!(workbook.sheet_names(), SHEET_NAMES.map(str::to_string).to_vec());

        let clean_data = workbook.worksheet_range("Clean_Data").unwrap();
        assert_eq!(
            clean_data.get_value((0, 0)),
            Some(&Data::String("date".to_string()))
        );
        let date = clean_data.get_value((1, 0)).and_then(|cell| cell.as_datetime());
        assert_eq!(
            date.map(|stamp| stamp.date()),
            NaiveDate::from_ymd_opt(2024, 1, 2)
        );
        assert_eq!(clean_data.get_value((1, 3)), Some(&Data::Float(100.5)));
        assert_eq!(clean_data.get_value((1, 6)), Some(&Data::Float(60.5)));

        let dashboard = workbook.worksheet_range("Dashboard").unwrap();
        assert_eq!(
            dashboard.get_value((1, 0)),
            Some(&Data::String("Total Revenue".to_string()))
        );
        assert_eq!(dashboard.get_value((1, 1)), Some(&Data::Float(300.5)));
        let notes: Vec<String> = dashboard
            .rows()
            .filter_map(|row| row.get(1).and_then(|cell| cell.get_string()).map(str::to_string))
            .collect();
        assert!(notes.contains(&"No warnings".to_string()));

        let top = workbook.worksheet_range("Top_Regions").unwrap();
        assert_eq!(top.get_value((1, 0)), Some(&Data::String("EU".to_string())));
        assert_eq!(top.get_value((1, 2)), Some(&Data::Float(120.0)));
    }
}
