//! Weekly totals, top-N rankings and dashboard KPIs over a cleaned table.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

use crate::data::{CleanedRow, CleanedTable, Value};

pub const DEFAULT_TOP_N: usize = 10;

pub const TOTAL_REVENUE: &str = "Total Revenue";
pub const TOTAL_PROFIT: &str = "Total Profit";
pub const PROFIT_MARGIN: &str = "Profit Margin %";
pub const TOTAL_UNITS: &str = "Total Units";
pub const TOP_PRODUCT: &str = "Top Product";
pub const TOP_REGION: &str = "Top Region";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeeklyRow {
    pub week: NaiveDate,
    pub revenue: f64,
    pub cost: f64,
    pub profit: f64,
    pub units: f64,
}

/// Per-week sums, ascending by week.
pub fn compute_weekly(table: &CleanedTable) -> Vec<WeeklyRow> {
    let mut weeks: BTreeMap<NaiveDate, WeeklyRow> = BTreeMap::new();
    for row in table {
        let entry = weeks.entry(row.week).or_insert_with(|| WeeklyRow {
            week: row.week,
            revenue: 0.0,
            cost: 0.0,
            profit: 0.0,
            units: 0.0,
        });
        entry.revenue += row.revenue;
        entry.cost += row.cost;
        entry.profit += row.profit;
        entry.units += row.units;
    }
    weeks.into_values().collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupBy {
    Product,
    Region,
}

impl GroupBy {
    pub fn column_name(&self) -> &'static str {
        match self {
            GroupBy::Product => "product",
            GroupBy::Region => "region",
        }
    }

    fn key<'a>(&self, row: &'a CleanedRow) -> &'a str {
        match self {
            GroupBy::Product => &row.product,
            GroupBy::Region => &row.region,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupTotal {
    pub key: String,
    pub revenue: f64,
    pub profit: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TopGroups {
    pub by: GroupBy,
    pub rows: Vec<GroupTotal>,
}

/// Groups summed by revenue, highest first, at most `n` of them.
///
/// Groups are visited in key order and the sort is stable, so equal revenue
/// keeps key order.
pub fn compute_top(table: &CleanedTable, by: GroupBy, n: usize) -> TopGroups {
    let mut groups: BTreeMap<&str, (f64, f64)> = BTreeMap::new();
    for row in table {
        let totals = groups.entry(by.key(row)).or_insert((0.0, 0.0));
        totals.0 += row.revenue;
        totals.1 += row.profit;
    }
    let mut rows: Vec<GroupTotal> = groups
        .into_iter()
        .map(|(key, (revenue, profit))| GroupTotal {
            key: key.to_string(),
            revenue,
            profit,
        })
        .collect();
    rows.sort_by(|a, b| b.revenue.total_cmp(&a.revenue));
    rows.truncate(n);
    TopGroups { by, rows }
}

pub fn compute_top_products(table: &CleanedTable, n: usize) -> TopGroups {
    compute_top(table, GroupBy::Product, n)
}

pub fn compute_top_regions(table: &CleanedTable, n: usize) -> TopGroups {
    compute_top(table, GroupBy::Region, n)
}

/// Dashboard KPIs; the six fixed labels always come first and in order.
#[derive(Debug, Clone, PartialEq)]
pub struct KpiSet {
    entries: Vec<(String, Value)>,
}

impl KpiSet {
    fn fixed(
        revenue: Value,
        profit: Value,
        margin: Value,
        units: Value,
        product: Value,
        region: Value,
    ) -> Self {
        let entries = [
            (TOTAL_REVENUE, revenue),
            (TOTAL_PROFIT, profit),
            (PROFIT_MARGIN, margin),
            (TOTAL_UNITS, units),
            (TOP_PRODUCT, product),
            (TOP_REGION, region),
        ]
        .into_iter()
        .map(|(label, value)| (label.to_string(), value))
        .collect();
        Self { entries }
    }

    pub fn get(&self, label: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(name, _)| name == label)
            .map(|(_, value)| value)
    }

    /// Adds or replaces a caller-defined KPI after the fixed ones.
    pub fn insert_extra(&mut self, label: impl Into<String>, value: impl Into<Value>) {
        let label = label.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(name, _)| *name == label) {
            Some(slot) => slot.1 = value,
            None => self.entries.push((label, value)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(label, value)| (label.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Two decimals, exact halves to even.
fn round2(value: f64) -> f64 {
    (value * 100.0).round_ties_even() / 100.0
}

pub fn compute_dashboard_kpis(table: &CleanedTable) -> KpiSet {
    if table.is_empty() {
        return KpiSet::fixed(
            Value::Float(0.0),
            Value::Float(0.0),
            Value::Float(0.0),
            Value::Integer(0),
            Value::from("N/A"),
            Value::from("N/A"),
        );
    }

    let revenue: f64 = table.iter().map(|row| row.revenue).sum();
    let profit: f64 = table.iter().map(|row| row.profit).sum();
    let units: f64 = table.iter().map(|row| row.units).sum();
    let margin = if revenue != 0.0 {
        round2(100.0 * profit / revenue)
    } else {
        0.0
    };
    let leader = |by: GroupBy| {
        compute_top(table, by, 1)
            .rows
            .into_iter()
            .next()
            .map_or_else(|| Value::from("N/A"), |group| Value::Text(group.key))
    };

    KpiSet::fixed(
        Value::Float(round2(revenue)),
        Value::Float(round2(profit)),
        Value::Float(margin),
        Value::Integer(units.trunc() as i64),
        leader(GroupBy::Product),
        leader(GroupBy::Region),
    )
}
