//! Starred texts, deduplicated by exact text.
//!
//! The text itself is the identity: two toggles with the same text but
//! different kinds or metadata address the same entry, and the first one
//! written wins. Entries are kept most-recent-first.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::serde_compat::{ImportRecord, id_from_any, sanitize_metadata};
use crate::time::unix_ms_to_iso8601;
use crate::tokenizer::contains_ignore_case;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FavoriteKind {
    /// A remix produced by a collision.
    #[default]
    Collision,
    /// A single fragment starred from the field.
    Signal,
}

impl FavoriteKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Collision => "collision",
            Self::Signal => "signal",
        }
    }
}

impl fmt::Display for FavoriteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FavoriteKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "collision" => Ok(Self::Collision),
            "signal" => Ok(Self::Signal),
            other => Err(format!("unknown favorite kind '{other}'")),
        }
    }
}

/// Kind selector for listing; `All` disables the kind criterion.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum KindFilter {
    #[default]
    All,
    Only(FavoriteKind),
}

impl KindFilter {
    fn admits(self, kind: FavoriteKind) -> bool {
        match self {
            KindFilter::All => true,
            KindFilter::Only(k) => k == kind,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FavoriteEntry {
    #[serde(deserialize_with = "id_from_any")]
    pub id: String,
    pub text: String,
    #[serde(rename = "type", default)]
    pub kind: FavoriteKind,
    #[serde(default)]
    pub date: String,
    /// Creation time, unix milliseconds.
    #[serde(rename = "timestamp", default)]
    pub created_at: i64,
    #[serde(flatten)]
    pub metadata: Map<String, Value>,
}

impl FavoriteEntry {
    pub fn new(text: &str, kind: FavoriteKind, metadata: Map<String, Value>, now_ms: i64) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            text: text.to_string(),
            kind,
            date: unix_ms_to_iso8601(now_ms),
            created_at: now_ms,
            metadata: sanitize_metadata(metadata),
        }
    }

    fn from_import(record: ImportRecord, now_ms: i64) -> Self {
        let created_at = record.timestamp.map(|t| t as i64).unwrap_or(now_ms);
        Self {
            id: Uuid::new_v4().to_string(),
            date: record
                .date
                .unwrap_or_else(|| unix_ms_to_iso8601(created_at)),
            text: record.text,
            kind: record.kind,
            created_at,
            metadata: sanitize_metadata(record.metadata),
        }
    }

    pub fn word_count(&self) -> usize {
        self.text.split_whitespace().count()
    }
}

/// Result of a toggle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Toggle {
    Added,
    Removed,
    /// Empty text is never stored.
    Ignored,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub received: usize,
    pub added: usize,
    pub skipped: usize,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct FavoriteStats {
    pub total: usize,
    pub collisions: usize,
    pub signals: usize,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Favorites {
    entries: Vec<FavoriteEntry>,
}

impl Favorites {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from stored entries. Later duplicates of a text are dropped.
    pub fn from_entries(entries: Vec<FavoriteEntry>) -> Self {
        let mut seen = HashSet::new();
        let entries = entries
            .into_iter()
            .filter(|e| seen.insert(e.text.clone()))
            .collect();
        Self { entries }
    }

    pub fn entries(&self) -> &[FavoriteEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, text: &str) -> bool {
        self.entries.iter().any(|e| e.text == text)
    }

    pub fn get_by_text(&self, text: &str) -> Option<&FavoriteEntry> {
        self.entries.iter().find(|e| e.text == text)
    }

    /// Star `text` if absent (at the front), unstar it if present.
    pub fn toggle(
        &mut self,
        text: &str,
        kind: FavoriteKind,
        metadata: Map<String, Value>,
        now_ms: i64,
    ) -> Toggle {
        if text.is_empty() {
            return Toggle::Ignored;
        }
        if self.contains(text) {
            self.entries.retain(|e| e.text != text);
            Toggle::Removed
        } else {
            let entry = FavoriteEntry::new(text, kind, metadata, now_ms);
            self.entries.insert(0, entry);
            Toggle::Added
        }
    }

    /// Entries admitted by both the kind and the (case-insensitive) text
    /// criteria, in stored order. An empty search admits everything.
    pub fn filter(&self, kind: KindFilter, search: &str) -> Vec<&FavoriteEntry> {
        self.entries
            .iter()
            .filter(|e| kind.admits(e.kind))
            .filter(|e| search.is_empty() || contains_ignore_case(&e.text, search))
            .collect()
    }

    /// All entries, newest first.
    pub fn sorted_by_recency(&self) -> Vec<&FavoriteEntry> {
        by_recency(self.entries.iter().collect())
    }

    /// Append every record whose text is not stored yet, with a fresh id.
    /// Duplicates (including repeats inside the batch) are skipped untouched.
    pub fn import_merge(&mut self, records: Vec<ImportRecord>, now_ms: i64) -> ImportReport {
        let mut report = ImportReport {
            received: records.len(),
            ..Default::default()
        };
        for record in records {
            if record.text.is_empty() || self.contains(&record.text) {
                report.skipped += 1;
                continue;
            }
            self.entries.push(FavoriteEntry::from_import(record, now_ms));
            report.added += 1;
        }
        report
    }

    /// Human-readable serialization of the full set.
    pub fn export_all(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.entries)
    }

    /// Remove exactly the entries whose ids are listed. Returns how many went.
    pub fn clear(&mut self, ids: &[String]) -> usize {
        let doomed: HashSet<&str> = ids.iter().map(String::as_str).collect();
        let before = self.entries.len();
        self.entries.retain(|e| !doomed.contains(e.id.as_str()));
        before - self.entries.len()
    }

    pub fn clear_all(&mut self) -> usize {
        let n = self.entries.len();
        self.entries.clear();
        n
    }

    pub fn stats(&self) -> FavoriteStats {
        let collisions = self
            .entries
            .iter()
            .filter(|e| e.kind == FavoriteKind::Collision)
            .count();
        FavoriteStats {
            total: self.entries.len(),
            collisions,
            signals: self.entries.len() - collisions,
        }
    }
}

/// Stable sort, newest `created_at` first.
pub fn by_recency(mut entries: Vec<&FavoriteEntry>) -> Vec<&FavoriteEntry> {
    entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    entries
}

/// Metadata attached when starring a remix.
pub fn remix_metadata() -> Map<String, Value> {
    let mut m = Map::new();
    m.insert("source".to_string(), Value::from("remix"));
    m
}

/// Metadata attached when starring a single fragment.
pub fn signal_metadata(node_id: &str) -> Map<String, Value> {
    let mut m = Map::new();
    m.insert("nodeId".to_string(), Value::from(node_id));
    m
}
