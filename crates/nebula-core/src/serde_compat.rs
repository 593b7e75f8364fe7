//! JSON wire format for favorites.
//!
//! Entries are flat objects: `{"id", "text", "type", "date", "timestamp", ...}`
//! where every extra key is free-form metadata. Files written by the browser
//! client carry numeric ids; ids are never trusted on import and are
//! regenerated, so only `text` is required.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::favorites::{FavoriteEntry, FavoriteKind};

/// Keys owned by `FavoriteEntry` itself; metadata may not shadow them.
pub const RESERVED_KEYS: [&str; 5] = ["id", "text", "type", "date", "timestamp"];

/// A favorite as found in an import file, before it gets a fresh id.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct ImportRecord {
    pub text: String,
    #[serde(rename = "type", default)]
    pub kind: FavoriteKind,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub timestamp: Option<f64>,
    #[serde(flatten)]
    pub metadata: Map<String, Value>,
}

/// Periodic full-snapshot backup envelope.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Backup {
    pub timestamp: String,
    pub count: usize,
    pub data: Vec<FavoriteEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportError {
    /// The payload is not JSON at all.
    Json(String),
    /// Valid JSON, but not an array of records.
    NotAnArray,
    /// Record `index` is not favorite-shaped.
    Record { index: usize, reason: String },
}

impl fmt::Display for ImportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImportError::Json(msg) => write!(f, "invalid file format: {msg}"),
            ImportError::NotAnArray => write!(f, "invalid file format: expected a JSON array"),
            ImportError::Record { index, reason } => {
                write!(f, "invalid favorite at position {index}: {reason}")
            }
        }
    }
}

impl std::error::Error for ImportError {}

/// Parse an import payload. Either every record parses or nothing is returned.
pub fn parse_import(json: &str) -> Result<Vec<ImportRecord>, ImportError> {
    let value: Value = serde_json::from_str(json).map_err(|e| ImportError::Json(e.to_string()))?;
    let Value::Array(items) = value else {
        return Err(ImportError::NotAnArray);
    };

    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            let mut record: ImportRecord =
                serde_json::from_value(item).map_err(|e| ImportError::Record {
                    index,
                    reason: e.to_string(),
                })?;
            record.metadata.remove("id");
            Ok(record)
        })
        .collect()
}

/// Drop metadata keys that would collide with entry fields on the wire.
pub fn sanitize_metadata(mut metadata: Map<String, Value>) -> Map<String, Value> {
    for key in RESERVED_KEYS {
        metadata.remove(key);
    }
    metadata
}

/// Accept both string and numeric ids; numbers are rendered as-is.
pub(crate) fn id_from_any<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "id must be a string or number, got {other}"
        ))),
    }
}
