//! The cleaning pass: raw table in, typed rows plus a QC report out.
//!
//! [`clean`] never fails on bad data. Duplicate or missing required columns
//! end the pass early with an empty table; unparseable cells only drop their
//! row. Everything noteworthy lands in the report's warnings.

use chrono::NaiveDate;
use log::{debug, info};

use crate::{
    data::{CleanedRow, CleanedTable, REQUIRED_COLUMNS, RawTable},
    dates::{ambiguity_warning, count_ambiguous, first_ambiguous, parse_date, week_start},
    headers::describe_duplicates,
    mapping::{ColumnMapping, HeaderResolution},
    numeric::{NumberLocale, coerce_column},
    qc::{QcBuilder, QcReport},
};

pub const EMPTY_RESULT_WARNING: &str = "Cleaned dataset is empty — no valid rows remain";
pub const ZERO_REVENUE_WARNING: &str = "Total revenue is 0 after cleaning";

#[derive(Debug, Clone, Default)]
pub struct CleanOptions {
    /// Read `N/N/Y` dates as day/month instead of month/day.
    pub dayfirst: bool,
    pub number_locale: NumberLocale,
    pub mapping: ColumnMapping,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanStatus {
    Cleaned,
    /// Schema was valid but no row survived.
    Empty,
    DuplicateColumns,
    MissingColumns,
}

impl CleanStatus {
    pub fn is_schema_failure(&self) -> bool {
        matches!(
            self,
            CleanStatus::DuplicateColumns | CleanStatus::MissingColumns
        )
    }

    /// Manifest error code for the hard-failure states.
    pub fn error_code(&self) -> Option<&'static str> {
        match self {
            CleanStatus::DuplicateColumns => Some("duplicate_columns"),
            CleanStatus::MissingColumns => Some("missing_columns"),
            CleanStatus::Cleaned | CleanStatus::Empty => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CleanOutcome {
    pub table: CleanedTable,
    pub report: QcReport,
    pub status: CleanStatus,
}

/// Positions of the six required columns in the raw table.
struct RequiredColumns {
    date: usize,
    product: usize,
    region: usize,
    revenue: usize,
    cost: usize,
    units: usize,
}

impl RequiredColumns {
    fn locate(resolution: &HeaderResolution) -> Result<Self, Vec<String>> {
        let find = |name: &str| resolution.position(name);
        match (
            find("date"),
            find("product"),
            find("region"),
            find("revenue"),
            find("cost"),
            find("units"),
        ) {
            (
                Some(date),
                Some(product),
                Some(region),
                Some(revenue),
                Some(cost),
                Some(units),
            ) => Ok(Self {
                date,
                product,
                region,
                revenue,
                cost,
                units,
            }),
            _ => Err(resolution.missing(&REQUIRED_COLUMNS)),
        }
    }
}

pub fn clean(raw: &RawTable, options: &CleanOptions) -> CleanOutcome {
    let rows_in = raw.len();
    let mut qc = QcBuilder::new(rows_in);
    debug!(
        "Cleaning {} row(s) with locale={} dayfirst={}",
        rows_in, options.number_locale, options.dayfirst
    );

    let resolution = HeaderResolution::resolve(raw.headers(), &options.mapping);
    let duplicates = resolution.duplicates();
    if !duplicates.is_empty() {
        qc.warn(describe_duplicates(&duplicates));
        return schema_failure(qc, CleanStatus::DuplicateColumns);
    }

    let columns = match RequiredColumns::locate(&resolution) {
        Ok(columns) => columns,
        Err(missing) => {
            qc.warn(format!("Missing required columns: {}", missing.join(", ")));
            qc.set_missing_columns(missing);
            return schema_failure(qc, CleanStatus::MissingColumns);
        }
    };

    let dates = coerce_dates(raw, columns.date, options.dayfirst, &mut qc);

    let mut coerce_numeric = |name: &str, index: usize| {
        let (values, stats) = coerce_column(&raw.column(index), options.number_locale);
        debug!("Column '{name}': {stats:?}");
        for warning in stats.warnings(name) {
            qc.warn(warning);
        }
        values
    };
    let revenue = coerce_numeric("revenue", columns.revenue);
    let cost = coerce_numeric("cost", columns.cost);
    let units = coerce_numeric("units", columns.units);

    let products = text_column(raw, columns.product);
    let regions = text_column(raw, columns.region);

    let mut rows = Vec::with_capacity(rows_in);
    for idx in 0..rows_in {
        let (Some(date), Some(product), Some(region), Some(revenue), Some(cost), Some(units)) = (
            dates[idx],
            products[idx].as_ref(),
            regions[idx].as_ref(),
            revenue[idx],
            cost[idx],
            units[idx],
        ) else {
            continue;
        };
        rows.push(CleanedRow {
            date,
            product: product.clone(),
            region: region.clone(),
            revenue,
            cost,
            units,
            profit: revenue - cost,
            week: week_start(date),
        });
    }

    let dropped = rows_in - rows.len();
    if dropped > 0 {
        qc.warn(format!("Dropped {dropped} rows with invalid/missing values"));
    }

    // Stable: rows sharing a date keep their input order.
    rows.sort_by_key(|row| row.date);
    let table = CleanedTable::from_sorted(rows);

    let status = if table.is_empty() {
        qc.warn(EMPTY_RESULT_WARNING);
        CleanStatus::Empty
    } else {
        if table.total_revenue() == 0.0 {
            qc.warn(ZERO_REVENUE_WARNING);
        }
        CleanStatus::Cleaned
    };

    let report = qc.finish(table.len());
    info!(
        "Cleaned {} of {} row(s); {} dropped",
        report.rows_out(),
        report.rows_in(),
        report.dropped_rows()
    );
    CleanOutcome {
        table,
        report,
        status,
    }
}

fn schema_failure(qc: QcBuilder, status: CleanStatus) -> CleanOutcome {
    CleanOutcome {
        table: CleanedTable::default(),
        report: qc.finish(0),
        status,
    }
}

fn coerce_dates(
    raw: &RawTable,
    index: usize,
    dayfirst: bool,
    qc: &mut QcBuilder,
) -> Vec<Option<NaiveDate>> {
    let cells = raw.column(index);
    let ambiguous = count_ambiguous(cells.iter().copied());
    if let Some(example) = first_ambiguous(cells.iter().copied()) {
        qc.warn(ambiguity_warning(ambiguous, example, dayfirst));
    }
    let parsed: Vec<Option<NaiveDate>> = cells
        .iter()
        .map(|cell| cell.and_then(|token| parse_date(token, dayfirst)))
        .collect();
    let unparseable = cells
        .iter()
        .zip(&parsed)
        .filter(|(cell, date)| cell.is_some_and(|t| !t.trim().is_empty()) && date.is_none())
        .count();
    if unparseable > 0 {
        qc.warn(format!("Found {unparseable} rows with unparseable dates"));
    }
    parsed
}

/// Trimmed text cells; blank cells become null.
fn text_column(raw: &RawTable, index: usize) -> Vec<Option<String>> {
    raw.column(index)
        .into_iter()
        .map(|cell| {
            cell.map(str::trim)
                .filter(|text| !text.is_empty())
                .map(str::to_string)
        })
        .collect()
}
