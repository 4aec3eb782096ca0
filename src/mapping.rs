//! Column mapping (`target=source` renames) and header resolution.
//!
//! Mappings are keyed by the canonical form of the *source* header, so
//! `--map revenue=Sales` matches a raw header spelled `" SALES "`. Entries can
//! come from a profile file and from the command line; they are applied in
//! that order so direct entries win, and every override is recorded.

use std::{
    collections::{BTreeMap, btree_map::Entry},
    fs,
    path::Path,
};

use anyhow::{Context, Result};
use log::debug;

use crate::{
    error::ConfigError,
    headers::{
        DuplicateColumn, DuplicateKind, find_duplicates, normalize_header, normalize_headers,
    },
};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnMapping {
    entries: BTreeMap<String, String>,
    overrides: Vec<String>,
}

impl ColumnMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a mapping from `target=source` entries, applied in order.
    pub fn from_entries<I, S>(entries: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut mapping = Self::new();
        for entry in entries {
            mapping.apply_entry(entry.as_ref())?;
        }
        Ok(mapping)
    }

    /// Merges profile entries (if any) with direct entries; direct entries are
    /// applied last and take precedence on conflicting sources.
    pub fn from_profile_and_entries(profile: Option<&Path>, direct: &[String]) -> Result<Self> {
        let mut mapping = Self::new();
        if let Some(path) = profile {
            for (line_no, line) in load_profile(path)? {
                mapping
                    .apply_entry(&line)
                    .map_err(|err| ConfigError::ProfileLine {
                        path: path.to_path_buf(),
                        line: line_no,
                        source: Box::new(err),
                    })?;
            }
        }
        for entry in direct {
            mapping.apply_entry(entry)?;
        }
        Ok(mapping)
    }

    pub fn apply_entry(&mut self, raw: &str) -> Result<(), ConfigError> {
        let (target, source) = parse_entry(raw)?;
        self.insert(&source, &target);
        Ok(())
    }

    /// Maps `source` to `target` (both canonicalized). Last insert wins.
    pub fn insert(&mut self, source: &str, target: &str) {
        let source = normalize_header(source);
        let target = normalize_header(target);
        match self.entries.entry(source) {
            Entry::Occupied(mut existing) => {
                self.overrides
                    .push(format!("Overriding mapping for source '{}'", existing.key()));
                existing.insert(target);
            }
            Entry::Vacant(slot) => {
                slot.insert(target);
            }
        }
    }

    pub fn get(&self, source: &str) -> Option<&str> {
        self.entries.get(source).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(s, t)| (s.as_str(), t.as_str()))
    }

    /// Messages for every source that was mapped more than once.
    pub fn overrides(&self) -> &[String] {
        &self.overrides
    }
}

/// Splits `target=source` on the first `=` and canonicalizes both sides.
pub fn parse_entry(raw: &str) -> Result<(String, String), ConfigError> {
    let (target, source) = raw
        .split_once('=')
        .ok_or_else(|| ConfigError::InvalidMapping(raw.to_string()))?;
    let target = normalize_header(target);
    let source = normalize_header(source);
    if target.is_empty() || source.is_empty() {
        return Err(ConfigError::EmptyMappingSide(raw.to_string()));
    }
    Ok((target, source))
}

/// Non-blank, non-comment profile lines with their 1-based line numbers.
pub fn parse_profile(contents: &str) -> Vec<(usize, String)> {
    contents
        .lines()
        .enumerate()
        .map(|(idx, line)| (idx + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'))
        .map(|(line_no, line)| (line_no, line.to_string()))
        .collect()
}

pub fn load_profile(path: &Path) -> Result<Vec<(usize, String)>> {
    if !path.exists() {
        return Err(ConfigError::ProfileNotFound(path.to_path_buf()).into());
    }
    if path.is_dir() {
        return Err(ConfigError::ProfileNotAFile(path.to_path_buf()).into());
    }
    let contents =
        fs::read_to_string(path).with_context(|| format!("Reading profile {path:?}"))?;
    let lines = parse_profile(&contents);
    debug!("Loaded {} mapping line(s) from profile {:?}", lines.len(), path);
    Ok(lines)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedColumn {
    pub raw: String,
    pub normalized: String,
    pub canonical: String,
}

impl ResolvedColumn {
    pub fn is_mapped(&self) -> bool {
        self.normalized != self.canonical
    }
}

/// Raw headers paired with their canonical (normalized, then mapped) names.
#[derive(Debug, Clone)]
pub struct HeaderResolution {
    columns: Vec<ResolvedColumn>,
}

impl HeaderResolution {
    pub fn resolve(raw_headers: &[String], mapping: &ColumnMapping) -> Self {
        let columns = raw_headers
            .iter()
            .zip(normalize_headers(raw_headers))
            .map(|(raw, normalized)| {
                let canonical = mapping
                    .get(&normalized)
                    .map(str::to_string)
                    .unwrap_or_else(|| normalized.clone());
                ResolvedColumn {
                    raw: raw.clone(),
                    normalized,
                    canonical,
                }
            })
            .collect();
        Self { columns }
    }

    pub fn columns(&self) -> &[ResolvedColumn] {
        &self.columns
    }

    pub fn canonical_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.canonical.clone()).collect()
    }

    pub fn position(&self, canonical: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.canonical == canonical)
    }

    /// Canonical names claimed by more than one raw column, sorted by name.
    ///
    /// A collision counts as a normalization duplicate when at least two of the
    /// colliding raw headers normalize to the same text; otherwise the mapping
    /// produced it.
    pub fn duplicates(&self) -> Vec<DuplicateColumn> {
        find_duplicates(&self.canonical_names())
            .into_iter()
            .map(|name| {
                let members: Vec<&ResolvedColumn> =
                    self.columns.iter().filter(|c| c.canonical == name).collect();
                let normalization_clash = members.iter().enumerate().any(|(idx, left)| {
                    members[idx + 1..]
                        .iter()
                        .any(|right| right.normalized == left.normalized)
                });
                DuplicateColumn {
                    sources: members.iter().map(|m| m.raw.clone()).collect(),
                    name,
                    kind: if normalization_clash {
                        DuplicateKind::AfterNormalization
                    } else {
                        DuplicateKind::ProducedByMapping
                    },
                }
            })
            .collect()
    }

    /// Required names absent from the resolved headers, sorted.
    pub fn missing(&self, required: &[&str]) -> Vec<String> {
        let mut missing = required
            .iter()
            .filter(|name| self.position(name).is_none())
            .map(|name| name.to_string())
            .collect::<Vec<_>>();
        missing.sort();
        missing
    }
}
