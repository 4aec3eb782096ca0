//! Flexible date parsing with an explicit day-first / month-first policy.
//!
//! Exports mix ISO dates, `D/M/Y` or `M/D/Y` with `/`, `-` or `.` separators,
//! two-digit years, month names and datetime stamps. Numeric day/month pairs
//! are read in the preferred order and fall back to the swapped order only
//! when the preferred reading is not a real date (e.g. `13/01/2024` read
//! month-first).

use std::sync::OnceLock;

use chrono::{Datelike, Days, NaiveDate};
use regex::Regex;

/// Formats tried after the numeric patterns, most specific first.
const NAMED_FORMATS: &[&str] = &[
    "%d %b %Y",
    "%d %B %Y",
    "%d-%b-%Y",
    "%d-%B-%Y",
    "%b %d %Y",
    "%B %d %Y",
    "%b %d, %Y",
    "%B %d, %Y",
    "%a, %d %b %Y",
    "%A, %B %d, %Y",
];

fn iso_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(\d{4})[-/.](\d{1,2})[-/.](\d{1,2})$").expect("valid regex")
    })
}

fn compact_iso_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^(\d{4})(\d{2})(\d{2})$").expect("valid regex"))
}

fn day_month_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(\d{1,2})[-/.](\d{1,2})[-/.](\d{2}|\d{4})$").expect("valid regex")
    })
}

fn ambiguous_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^\s*(\d{1,2})[/-](\d{1,2})[/-]\d{2,4}\s*$").expect("valid regex")
    })
}

fn time_suffix() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)[ T]\d{1,2}:\d{2}(:\d{2}(\.\d+)?)?\s*(am|pm)?\s*(z|[+-]\d{2}:?\d{2})?$")
            .expect("valid regex")
    })
}

/// Parses `token` into a calendar date; unparseable tokens yield `None`.
pub fn parse_date(token: &str, dayfirst: bool) -> Option<NaiveDate> {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return None;
    }
    let date_part = time_suffix().replace(trimmed, "");
    let date_part = date_part.trim();

    if let Some(caps) = iso_pattern()
        .captures(date_part)
        .or_else(|| compact_iso_pattern().captures(date_part))
    {
        let year = caps[1].parse().ok()?;
        let month = caps[2].parse().ok()?;
        let day = caps[3].parse().ok()?;
        return NaiveDate::from_ymd_opt(year, month, day);
    }

    if let Some(caps) = day_month_pattern().captures(date_part) {
        let first: u32 = caps[1].parse().ok()?;
        let second: u32 = caps[2].parse().ok()?;
        let year = expand_year(&caps[3])?;
        let (day, month) = if dayfirst {
            (first, second)
        } else {
            (second, first)
        };
        return NaiveDate::from_ymd_opt(year, month, day)
            .or_else(|| NaiveDate::from_ymd_opt(year, day, month));
    }

    NAMED_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(date_part, fmt).ok())
}

/// Two-digit years pivot at 69: `00..=68` are 20xx, `69..=99` are 19xx.
fn expand_year(raw: &str) -> Option<i32> {
    let value: i32 = raw.parse().ok()?;
    Some(match raw.len() {
        2 if value < 69 => 2000 + value,
        2 => 1900 + value,
        _ => value,
    })
}

/// True when both leading numbers of a `N/N/Y` token could be a day or a month.
pub fn is_ambiguous_token(token: &str) -> bool {
    ambiguous_pattern().captures(token).is_some_and(|caps| {
        let in_month_range =
            |idx: usize| caps[idx].parse::<u32>().is_ok_and(|v| (1..=12).contains(&v));
        in_month_range(1) && in_month_range(2)
    })
}

pub fn count_ambiguous<'a, I>(tokens: I) -> usize
where
    I: IntoIterator<Item = Option<&'a str>>,
{
    tokens
        .into_iter()
        .flatten()
        .filter(|token| is_ambiguous_token(token))
        .count()
}

/// First token in the column that `is_ambiguous_token` accepts, trimmed.
pub fn first_ambiguous<'a, I>(tokens: I) -> Option<&'a str>
where
    I: IntoIterator<Item = Option<&'a str>>,
{
    tokens
        .into_iter()
        .flatten()
        .find(|token| is_ambiguous_token(token))
        .map(str::trim)
}

pub fn ambiguity_warning(count: usize, example: &str, dayfirst: bool) -> String {
    let order = if dayfirst { "day/month" } else { "month/day" };
    format!("Found {count} ambiguous dates (e.g. '{example}'); interpreted as {order}")
}

/// Monday starting the Monday–Sunday week that contains `date`.
pub fn week_start(date: NaiveDate) -> NaiveDate {
    let offset = u64::from(date.weekday().num_days_from_monday());
    date.checked_sub_days(Days::new(offset)).unwrap_or(date)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn ambiguous_token_honours_dayfirst_policy() {
        assert_eq!(parse_date("01/02/2024", false), Some(ymd(2024, 1, 2)));
        assert_eq!(parse_date("01/02/2024", true), Some(ymd(2024, 2, 1)));
        assert!(is_ambiguous_token("01/02/2024"));
    }

    #[test]
    fn iso_and_compact_forms_ignore_policy() {
        assert_eq!(parse_date("2024-03-05", true), Some(ymd(2024, 3, 5)));
        assert_eq!(parse_date("2024/03/05", false), Some(ymd(2024, 3, 5)));
        assert_eq!(parse_date("20240305", false), Some(ymd(2024, 3, 5)));
        assert_eq!(parse_date(" 2024-03-05T10:15:00Z ", false), Some(ymd(2024, 3, 5)));
        assert_eq!(parse_date("2024-03-05 10:15", true), Some(ymd(2024, 3, 5)));
    }

    #[test]
    fn impossible_preferred_order_falls_back_to_swapped() {
        assert_eq!(parse_date("13/01/2024", false), Some(ymd(2024, 1, 13)));
        assert_eq!(parse_date("01/13/2024", true), Some(ymd(2024, 1, 13)));
        assert!(!is_ambiguous_token("13/01/2024"));
    }

    #[test]
    fn two_digit_years_and_other_separators() {
        assert_eq!(parse_date("05.03.24", true), Some(ymd(2024, 3, 5)));
        assert_eq!(parse_date("3-5-99", false), Some(ymd(1999, 3, 5)));
        assert_eq!(parse_date("3/5/2024 4:30 PM", false), Some(ymd(2024, 3, 5)));
    }

    #[test]
    fn month_names_are_supported() {
        assert_eq!(parse_date("5 Mar 2024", false), Some(ymd(2024, 3, 5)));
        assert_eq!(parse_date("March 5, 2024", true), Some(ymd(2024, 3, 5)));
        assert_eq!(parse_date("05-Mar-2024", false), Some(ymd(2024, 3, 5)));
    }

    #[test]
    fn garbage_yields_none() {
        for token in ["", "not-a-date", "2024-02-30", "32/13/2024", "yesterday"] {
            assert_eq!(parse_date(token, false), None, "token {token:?}");
        }
    }

    #[test]
    fn count_ambiguous_skips_nulls_and_unambiguous_tokens() {
        let tokens = [
            Some("01/02/2024"),
            None,
            Some("2024-01-02"),
            Some("12-11-24"),
            Some("25/12/2024"),
        ];
        assert_eq!(count_ambiguous(tokens), 2);
        assert_eq!(first_ambiguous([None, Some("25/12/2024"), Some(" 12-11-24 ")]), Some("12-11-24"));
        assert_eq!(first_ambiguous([Some("2024-01-02")]), None);
        assert_eq!(
            ambiguity_warning(2, "12-11-24", true),
            "Found 2 ambiguous dates (e.g. '12-11-24'); interpreted as day/month"
        );
    }

    #[test]
    fn week_start_is_monday_for_sunday_ending_weeks() {
        assert_eq!(week_start(ymd(2024, 1, 1)), ymd(2024, 1, 1));
        assert_eq!(week_start(ymd(2024, 1, 7)), ymd(2024, 1, 1));
        assert_eq!(week_start(ymd(2024, 1, 10)), ymd(2024, 1, 8));
        assert_eq!(week_start(ymd(2024, 3, 3)), ymd(2024, 2, 26));
    }
}
