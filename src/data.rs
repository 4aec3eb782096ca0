use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Canonical columns every sales export must provide, in report order.
pub const REQUIRED_COLUMNS: [&str; 6] = ["date", "product", "region", "revenue", "cost", "units"];

/// Untyped table as handed over by the loader: ordered raw headers and
/// string-or-null cells. Every row has exactly one cell per header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawTable {
    headers: Vec<String>,
    rows: Vec<Vec<Option<String>>>,
}

impl RawTable {
    /// Short rows are padded with nulls, long rows truncated to the header count.
    pub fn new(headers: Vec<String>, rows: Vec<Vec<Option<String>>>) -> Self {
        let width = headers.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, None);
                row
            })
            .collect();
        Self { headers, rows }
    }

    /// Builds a table from literal text; empty cells become null.
    pub fn from_text(headers: &[&str], rows: &[Vec<&str>]) -> Self {
        let headers = headers.iter().map(|h| h.to_string()).collect();
        let rows = rows
            .iter()
            .map(|row| {
                row.iter()
                    .map(|cell| (!cell.is_empty()).then(|| cell.to_string()))
                    .collect()
            })
            .collect();
        Self::new(headers, rows)
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<Option<String>>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column(&self, index: usize) -> Vec<Option<&str>> {
        self.rows
            .iter()
            .map(|row| row.get(index).and_then(|cell| cell.as_deref()))
            .collect()
    }
}

/// One validated sales row plus its derived `profit` and `week`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleanedRow {
    pub date: NaiveDate,
    pub product: String,
    pub region: String,
    pub revenue: f64,
    pub cost: f64,
    pub units: f64,
    pub profit: f64,
    pub week: NaiveDate,
}

/// Cleaned rows, ascending by date.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CleanedTable {
    rows: Vec<CleanedRow>,
}

impl CleanedTable {
    pub(crate) fn from_sorted(rows: Vec<CleanedRow>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[CleanedRow] {
        &self.rows
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CleanedRow> {
        self.rows.iter()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn total_revenue(&self) -> f64 {
        self.rows.iter().map(|row| row.revenue).sum()
    }
}

impl<'a> IntoIterator for &'a CleanedTable {
    type Item = &'a CleanedRow;
    type IntoIter = std::slice::Iter<'a, CleanedRow>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

/// Cell value written into report sheets.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Value {
    Text(String),
    Integer(i64),
    Float(f64),
    Date(NaiveDate),
}

impl Value {
    /// Floats use the shortest text that parses back to the same `f64`.
    pub fn as_display(&self) -> String {
        match self {
            Value::Text(s) => s.clone(),
            Value::Integer(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Date(d) => d.format("%Y-%m-%d").to_string(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_display())
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<NaiveDate> for Value {
    fn from(value: NaiveDate) -> Self {
        Value::Date(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_table_pads_short_rows_and_truncates_long_rows() {
        let table = RawTable::new(
            vec!["a".into(), "b".into()],
            vec![
                vec![Some("1".into())],
                vec![Some("1".into()), Some("2".into()), Some("3".into())],
            ],
        );
        assert_eq!(table.rows()[0], vec![Some("1".to_string()), None]);
        assert_eq!(table.rows()[1].len(), 2);
        assert_eq!(table.column(1), vec![None, Some("2")]);
    }

    #[test]
    fn from_text_maps_empty_cells_to_null() {
        let table = RawTable::from_text(&["x", "y"], &[vec!["", "v"]]);
        assert_eq!(table.rows()[0], vec![None, Some("v".to_string())]);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn value_display_round_trips_floats_and_formats_dates() {
        assert_eq!(Value::Float(1234.56).as_display(), "1234.56");
        assert_eq!(Value::Float(0.1 + 0.2).as_display().parse::<f64>().unwrap(), 0.1 + 0.2);
        assert_eq!(Value::Float(350.0).as_display(), "350");
        let date = NaiveDate::from_ymd_opt(2024, 5, 6).unwrap();
        assert_eq!(Value::Date(date).to_string(), "2024-05-06");
        assert_eq!(Value::from("N/A").to_string(), "N/A");
    }
}
