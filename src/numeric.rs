//! Locale-aware numeric token parsing.
//!
//! Raw spreadsheet numbers arrive as text such as `"$1,234.56"`, `"(12.50)"`,
//! `"1.234,56 €"`, `"10%"` or `"12 345"`. [`parse_number`] strips the
//! decoration in a fixed order, resolves `,`/`.` according to a
//! [`NumberLocale`], and parses what remains as `f64`. Besides the value it
//! reports provenance flags (decimal comma seen, ambiguous grouping seen,
//! percent stripped) so callers can summarize how a column was read without
//! re-parsing it.
//!
//! ## Preprocessing order
//!
//! 1. trim surrounding whitespace
//! 2. `(X)` becomes `-X` (accounting negatives)
//! 3. drop em/en dash placeholders
//! 4. drop `%` (the value is *not* divided by 100)
//! 5. drop currency symbols `$ € £`
//! 6. drop whitespace sitting between two digits (space grouping)
//! 7. drop apostrophes and underscores (alternate grouping marks)
//! 8. empty, lone `-` or lone `+` means "no value"; a leading `+` is dropped
//!
//! The separator heuristics of the `auto` locale are order-sensitive and are
//! kept in exactly this order; see [`resolve_auto`].

use std::{fmt, str::FromStr, sync::OnceLock};

use clap::ValueEnum;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[value(rename_all = "kebab-case")]
#[serde(rename_all = "lowercase")]
pub enum NumberLocale {
    #[default]
    Auto,
    Us,
    Eu,
}

impl NumberLocale {
    pub fn as_str(&self) -> &'static str {
        match self {
            NumberLocale::Auto => "auto",
            NumberLocale::Us => "us",
            NumberLocale::Eu => "eu",
        }
    }
}

impl fmt::Display for NumberLocale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NumberLocale {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(NumberLocale::Auto),
            "us" => Ok(NumberLocale::Us),
            "eu" => Ok(NumberLocale::Eu),
            _ => Err(ConfigError::UnknownLocale(value.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NumericValue {
    Value(f64),
    /// Nothing left after preprocessing (blank, dash placeholder, lone sign).
    Empty,
    /// Text remained but it is not a number.
    Invalid,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParsedNumber {
    pub value: NumericValue,
    pub eu_decimal_comma: bool,
    pub ambiguous_grouping: bool,
    pub had_percent: bool,
}

impl ParsedNumber {
    fn new(value: NumericValue) -> Self {
        Self {
            value,
            eu_decimal_comma: false,
            ambiguous_grouping: false,
            had_percent: false,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self.value {
            NumericValue::Value(v) => Some(v),
            NumericValue::Empty | NumericValue::Invalid => None,
        }
    }
}

/// Separator resolution result: the dot-decimal text plus provenance flags.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Resolved {
    text: String,
    eu_decimal_comma: bool,
    ambiguous_grouping: bool,
}

impl Resolved {
    fn unchanged(text: &str) -> Self {
        Self {
            text: text.to_string(),
            eu_decimal_comma: false,
            ambiguous_grouping: false,
        }
    }

    fn thousands(text: &str, separator: char, ambiguous: bool) -> Self {
        Self {
            text: text.replace(separator, ""),
            eu_decimal_comma: false,
            ambiguous_grouping: ambiguous,
        }
    }

    /// Dots are grouping, the comma(s) decimal.
    fn decimal_comma(text: &str) -> Self {
        Self {
            text: text.replace('.', "").replace(',', "."),
            eu_decimal_comma: true,
            ambiguous_grouping: false,
        }
    }
}

fn comma_grouped() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[+-]?\d{1,3}(,\d{3})+$").expect("valid regex"))
}

fn dot_grouped() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[+-]?\d{1,3}(\.\d{3})+$").expect("valid regex"))
}

fn comma_grouped_with_decimal() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[+-]?\d{1,3}(,\d{3})+,\d{1,2}$").expect("valid regex"))
}

pub fn parse_number(token: &str, locale: NumberLocale) -> ParsedNumber {
    let (body, had_percent) = preprocess(token);
    let mut parsed = match body {
        None => ParsedNumber::new(NumericValue::Empty),
        Some(body) => {
            let resolved = match locale {
                NumberLocale::Us => resolve_us(&body),
                NumberLocale::Eu => resolve_eu(&body),
                NumberLocale::Auto => resolve_auto(&body),
            };
            let value = match resolved.text.parse::<f64>() {
                Ok(v) if v.is_finite() => NumericValue::Value(v),
                _ => NumericValue::Invalid,
            };
            ParsedNumber {
                value,
                eu_decimal_comma: resolved.eu_decimal_comma,
                ambiguous_grouping: resolved.ambiguous_grouping,
                had_percent: false,
            }
        }
    };
    parsed.had_percent = had_percent;
    parsed
}

/// Applies the locale-independent cleanup. Returns `None` when no value is left.
fn preprocess(token: &str) -> (Option<String>, bool) {
    let trimmed = token.trim();
    let mut body = if trimmed.len() >= 2 && trimmed.starts_with('(') && trimmed.ends_with(')') {
        format!("-{}", trimmed[1..trimmed.len() - 1].trim())
    } else {
        trimmed.to_string()
    };
    body.retain(|c| !matches!(c, '\u{2014}' | '\u{2013}'));
    let had_percent = body.contains('%');
    body.retain(|c| !matches!(c, '%' | '$' | '€' | '£'));
    let mut body = drop_digit_spacing(&body);
    body.retain(|c| !matches!(c, '\'' | '_'));

    let body = body.trim();
    if body.is_empty() || body == "-" || body == "+" {
        return (None, had_percent);
    }
    let body = body.strip_prefix('+').unwrap_or(body);
    (Some(body.to_string()), had_percent)
}

/// Removes whitespace runs that have a digit on both sides (`"12 345"`).
fn drop_digit_spacing(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    let mut out = String::with_capacity(value.len());
    let mut idx = 0;
    while idx < chars.len() {
        if !chars[idx].is_whitespace() {
            out.push(chars[idx]);
            idx += 1;
            continue;
        }
        let start = idx;
        while idx < chars.len() && chars[idx].is_whitespace() {
            idx += 1;
        }
        let between_digits = start > 0
            && chars[start - 1].is_ascii_digit()
            && idx < chars.len()
            && chars[idx].is_ascii_digit();
        if !between_digits {
            out.extend(&chars[start..idx]);
        }
    }
    out
}

/// Digits after a single occurrence of `separator`, if the tail is all digits.
fn single_separator_tail(body: &str, separator: char) -> Option<usize> {
    if body.matches(separator).count() != 1 {
        return None;
    }
    let (_, tail) = body.split_once(separator)?;
    (!tail.is_empty() && tail.chars().all(|c| c.is_ascii_digit())).then_some(tail.len())
}

fn resolve_us(body: &str) -> Resolved {
    let has_comma = body.contains(',');
    let has_dot = body.contains('.');
    if (has_comma && has_dot) || comma_grouped().is_match(body) {
        Resolved::thousands(body, ',', false)
    } else {
        Resolved::unchanged(body)
    }
}

fn resolve_eu(body: &str) -> Resolved {
    let has_comma = body.contains(',');
    let has_dot = body.contains('.');
    if has_comma && has_dot {
        return Resolved::decimal_comma(body);
    }
    if has_comma {
        return match single_separator_tail(body, ',') {
            Some(1..=3) => Resolved::decimal_comma(body),
            _ => Resolved::unchanged(body),
        };
    }
    if has_dot && dot_grouped().is_match(body) {
        return Resolved::thousands(body, '.', false);
    }
    Resolved::unchanged(body)
}

/// Best-effort separator detection. The branch order matters: a lone
/// 3-digit-grouped comma is read as thousands (flagged ambiguous) before the
/// 1–2 trailing digit decimal-comma rule is considered.
fn resolve_auto(body: &str) -> Resolved {
    let has_comma = body.contains(',');
    let has_dot = body.contains('.');

    if has_comma && has_dot {
        let last_comma = body.rfind(',');
        let last_dot = body.rfind('.');
        return if last_comma > last_dot {
            Resolved::decimal_comma(body)
        } else {
            Resolved::thousands(body, ',', false)
        };
    }

    if has_comma {
        let commas = body.matches(',').count();
        if comma_grouped().is_match(body) {
            return Resolved::thousands(body, ',', commas == 1);
        }
        match single_separator_tail(body, ',') {
            Some(1..=2) => return Resolved::decimal_comma(body),
            Some(3) => return Resolved::thousands(body, ',', true),
            _ => {}
        }
        if comma_grouped_with_decimal().is_match(body) {
            if let Some(split) = body.rfind(',') {
                let (groups, fraction) = body.split_at(split);
                return Resolved {
                    text: format!("{}.{}", groups.replace(',', ""), &fraction[1..]),
                    eu_decimal_comma: true,
                    ambiguous_grouping: false,
                };
            }
        }
        return Resolved::unchanged(body);
    }

    if has_dot && dot_grouped().is_match(body) {
        let dots = body.matches('.').count();
        return Resolved::thousands(body, '.', dots == 1);
    }
    Resolved::unchanged(body)
}

/// Per-column tallies gathered while coercing a numeric column.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NumericColumnStats {
    pub percent_cells: usize,
    pub eu_decimal_cells: usize,
    pub ambiguous_cells: usize,
    pub invalid_cells: usize,
}

impl NumericColumnStats {
    fn record(&mut self, parsed: &ParsedNumber) {
        if parsed.had_percent {
            self.percent_cells += 1;
        }
        if parsed.eu_decimal_comma {
            self.eu_decimal_cells += 1;
        }
        if parsed.ambiguous_grouping {
            self.ambiguous_cells += 1;
        }
        if parsed.value == NumericValue::Invalid {
            self.invalid_cells += 1;
        }
    }

    /// QC warnings for this column, in percent / decimal comma / grouping order.
    pub fn warnings(&self, column: &str) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.percent_cells > 0 {
            warnings.push(format!(
                "Found {} values with '%' in {column}; treated as plain numbers",
                self.percent_cells
            ));
        }
        if self.eu_decimal_cells > 0 {
            warnings.push(format!(
                "Detected EU decimal commas in {column}: {}",
                value_count(self.eu_decimal_cells)
            ));
        }
        if self.ambiguous_cells > 0 {
            warnings.push(format!(
                "Detected ambiguous separators in {column}: {}; interpreted as thousands separators",
                value_count(self.ambiguous_cells)
            ));
        }
        warnings
    }
}

fn value_count(count: usize) -> String {
    if count == 1 {
        "1 value".to_string()
    } else {
        format!("{count} values")
    }
}

/// Coerces every cell of a column; null cells stay null.
pub fn coerce_column(
    cells: &[Option<&str>],
    locale: NumberLocale,
) -> (Vec<Option<f64>>, NumericColumnStats) {
    let mut stats = NumericColumnStats::default();
    let values = cells
        .iter()
        .map(|cell| {
            let raw = (*cell)?;
            let parsed = parse_number(raw, locale);
            stats.record(&parsed);
            parsed.as_f64()
        })
        .collect();
    (values, stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn value(token: &str, locale: NumberLocale) -> Option<f64> {
        parse_number(token, locale).as_f64()
    }

    #[test]
    fn locale_parses_from_str_case_insensitively() {
        assert_eq!("EU".parse::<NumberLocale>().unwrap(), NumberLocale::Eu);
        assert_eq!(" us ".parse::<NumberLocale>().unwrap(), NumberLocale::Us);
        assert_eq!(
            "fr".parse::<NumberLocale>().unwrap_err(),
            ConfigError::UnknownLocale("fr".to_string())
        );
    }

    #[test]
    fn us_and_eu_grouped_tokens_agree() {
        assert_eq!(value("1,234.56", NumberLocale::Us), Some(1234.56));
        let eu = parse_number("1.234,56", NumberLocale::Eu);
        assert_eq!(eu.as_f64(), Some(1234.56));
        assert!(eu.eu_decimal_comma);
    }

    #[test]
    fn parentheses_become_negative() {
        assert_eq!(value("(123.45)", NumberLocale::Auto), Some(-123.45));
        assert_eq!(value("($1,000)", NumberLocale::Us), Some(-1000.0));
    }

    #[test]
    fn percent_is_stripped_not_scaled() {
        let parsed = parse_number("10%", NumberLocale::Auto);
        assert_eq!(parsed.as_f64(), Some(10.0));
        assert!(parsed.had_percent);
    }

    #[test]
    fn currency_symbols_and_spacing_are_removed() {
        assert_eq!(value("$1,250.00", NumberLocale::Auto), Some(1250.0));
        assert_eq!(value("€ 99", NumberLocale::Auto), Some(99.0));
        assert_eq!(value("£12 345", NumberLocale::Auto), Some(12345.0));
        assert_eq!(value("1\u{a0}234,5", NumberLocale::Eu), Some(1234.5));
        assert_eq!(value("1'234'567", NumberLocale::Auto), Some(1234567.0));
        assert_eq!(value("1_000", NumberLocale::Us), Some(1000.0));
        assert_eq!(value("+42", NumberLocale::Us), Some(42.0));
    }

    #[test]
    fn placeholders_and_lone_signs_are_empty() {
        for token in ["", "   ", "—", "–", "-", "+", "$", "()"] {
            assert_eq!(
                parse_number(token, NumberLocale::Auto).value,
                NumericValue::Empty,
                "token {token:?}"
            );
        }
    }

    #[test]
    fn garbage_is_invalid_not_a_panic() {
        for token in ["bad", "12abc", "1,2,3", "inf", "NaN", "1.2.3,4,5"] {
            assert_eq!(
                parse_number(token, NumberLocale::Auto).value,
                NumericValue::Invalid,
                "token {token:?}"
            );
        }
    }

    #[test]
    fn us_strips_commas_only_when_grouped_or_mixed() {
        assert_eq!(value("1,234,567", NumberLocale::Us), Some(1234567.0));
        assert_eq!(value("1,5", NumberLocale::Us), None);
        assert_eq!(value("12.5", NumberLocale::Us), Some(12.5));
    }

    #[test]
    fn eu_rules() {
        let single = parse_number("12,5", NumberLocale::Eu);
        assert_eq!(single.as_f64(), Some(12.5));
        assert!(single.eu_decimal_comma);
        assert_eq!(value("1,234", NumberLocale::Eu), Some(1.234));
        assert_eq!(value("1.234.567", NumberLocale::Eu), Some(1234567.0));
        assert_eq!(value("12.5", NumberLocale::Eu), Some(12.5));
        assert_eq!(value("1,2345", NumberLocale::Eu), None);
    }

    #[test]
    fn auto_last_separator_is_decimal() {
        let eu = parse_number("1.234,56", NumberLocale::Auto);
        assert_eq!(eu.as_f64(), Some(1234.56));
        assert!(eu.eu_decimal_comma);
        let us = parse_number("1,234.56", NumberLocale::Auto);
        assert_eq!(us.as_f64(), Some(1234.56));
        assert!(!us.eu_decimal_comma);
    }

    #[test]
    fn auto_single_grouped_comma_is_ambiguous_thousands() {
        let parsed = parse_number("1,234", NumberLocale::Auto);
        assert_eq!(parsed.as_f64(), Some(1234.0));
        assert!(parsed.ambiguous_grouping);
        assert!(!parsed.eu_decimal_comma);

        let multi = parse_number("1,234,567", NumberLocale::Auto);
        assert_eq!(multi.as_f64(), Some(1234567.0));
        assert!(!multi.ambiguous_grouping);
    }

    #[test]
    fn auto_short_comma_tail_is_decimal() {
        let parsed = parse_number("12,5", NumberLocale::Auto);
        assert_eq!(parsed.as_f64(), Some(12.5));
        assert!(parsed.eu_decimal_comma);
        assert_eq!(value("0,99", NumberLocale::Auto), Some(0.99));
    }

    #[test]
    fn auto_long_head_with_three_digit_tail_is_ambiguous() {
        let parsed = parse_number("1234,567", NumberLocale::Auto);
        assert_eq!(parsed.as_f64(), Some(1234567.0));
        assert!(parsed.ambiguous_grouping);
    }

    #[test]
    fn auto_multi_group_with_short_tail_is_eu_decimal() {
        let parsed = parse_number("1,234,56", NumberLocale::Auto);
        assert_eq!(parsed.as_f64(), Some(1234.56));
        assert!(parsed.eu_decimal_comma);
    }

    #[test]
    fn auto_dot_grouping() {
        let single = parse_number("1.234", NumberLocale::Auto);
        assert_eq!(single.as_f64(), Some(1234.0));
        assert!(single.ambiguous_grouping);
        let multi = parse_number("1.234.567", NumberLocale::Auto);
        assert_eq!(multi.as_f64(), Some(1234567.0));
        assert!(!multi.ambiguous_grouping);
        assert_eq!(value("3.14", NumberLocale::Auto), Some(3.14));
    }

    #[test]
    fn coerce_column_tallies_flags_and_keeps_nulls() {
        let cells = [Some("10%"), None, Some("1,234"), Some("12,5"), Some("x")];
        let (values, stats) = coerce_column(&cells, NumberLocale::Auto);
        assert_eq!(values, vec![Some(10.0), None, Some(1234.0), Some(12.5), None]);
        assert_eq!(
            stats,
            NumericColumnStats {
                percent_cells: 1,
                eu_decimal_cells: 1,
                ambiguous_cells: 1,
                invalid_cells: 1,
            }
        );
        let warnings = stats.warnings("revenue");
        assert_eq!(warnings.len(), 3);
        assert!(warnings[0].contains("values with '%' in revenue"));
        assert_eq!(warnings[1], "Detected EU decimal commas in revenue: 1 value");
        assert_eq!(
            warnings[2],
            "Detected ambiguous separators in revenue: 1 value; interpreted as thousands separators"
        );
    }

    fn apply_grouping(value: &str, separator: char) -> String {
        let chars: Vec<char> = value.chars().collect();
        if chars.len() <= 3 {
            return value.to_string();
        }
        let mut grouped = String::new();
        let mut index = chars.len() % 3;
        if index == 0 {
            index = 3;
        }
        grouped.extend(&chars[..index]);
        while index < chars.len() {
            grouped.push(separator);
            grouped.extend(&chars[index..index + 3]);
            index += 3;
        }
        grouped
    }

    proptest! {
        #[test]
        fn grouped_tokens_parse_identically_across_locales(
            integer in 1000u64..=99_999_999,
            cents in 0u32..=99,
        ) {
            let expected: f64 = format!("{integer}.{cents:02}").parse().unwrap();
            let us = format!("{}.{cents:02}", apply_grouping(&integer.to_string(), ','));
            let eu = format!("{},{cents:02}", apply_grouping(&integer.to_string(), '.'));
            prop_assert_eq!(value(&us, NumberLocale::Us), Some(expected));
            prop_assert_eq!(value(&eu, NumberLocale::Eu), Some(expected));
            prop_assert_eq!(value(&us, NumberLocale::Auto), Some(expected));
            prop_assert_eq!(value(&eu, NumberLocale::Auto), Some(expected));
        }
    }
}
