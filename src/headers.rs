//! Header canonicalization and duplicate detection.
//!
//! A canonical column name is the raw header trimmed, lowercased, and with
//! every internal whitespace run collapsed to a single underscore. Two raw
//! headers that land on the same canonical name make the schema untrustworthy,
//! so duplicates are surfaced here and treated as fatal by the pipeline.

use std::collections::BTreeMap;
use std::fmt;

use itertools::Itertools;

pub fn normalize_header(raw: &str) -> String {
    raw.split_whitespace().map(str::to_lowercase).join("_")
}

pub fn normalize_headers(raw: &[String]) -> Vec<String> {
    raw.iter().map(|name| normalize_header(name)).collect()
}

/// Canonical names that occur more than once, sorted.
pub fn find_duplicates(names: &[String]) -> Vec<String> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for name in names {
        *counts.entry(name.as_str()).or_insert(0) += 1;
    }
    counts
        .into_iter()
        .filter(|(_, count)| *count > 1)
        .map(|(name, _)| name.to_string())
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicateKind {
    /// Raw headers that differ only in case or whitespace.
    AfterNormalization,
    /// Distinct headers sent to the same target by a column mapping.
    ProducedByMapping,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateColumn {
    pub name: String,
    pub sources: Vec<String>,
    pub kind: DuplicateKind,
}

impl fmt::Display for DuplicateColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sources = self.sources.iter().map(|s| format!("'{s}'")).join(", ");
        write!(f, "{} (from {})", self.name, sources)
    }
}

/// Renders the single QC warning for a set of duplicate columns.
pub fn describe_duplicates(duplicates: &[DuplicateColumn]) -> String {
    let section = |kind: DuplicateKind| {
        duplicates
            .iter()
            .filter(|dup| dup.kind == kind)
            .map(ToString::to_string)
            .join(", ")
    };
    let normalized = section(DuplicateKind::AfterNormalization);
    let mapped = section(DuplicateKind::ProducedByMapping);
    let mut parts = Vec::new();
    if !normalized.is_empty() {
        parts.push(format!("Duplicate columns after normalization: {normalized}"));
    }
    if !mapped.is_empty() {
        parts.push(format!("Duplicate columns produced by mapping: {mapped}"));
    }
    parts.join("; ")
}
