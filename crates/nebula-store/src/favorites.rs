//! Favorites persisted as a single JSON blob.
//!
//! Every mutation is applied to a copy, the copy is written in one
//! transaction, and only then does it replace the in-memory set. A failed
//! write leaves both disk and memory at the last successful state.

use serde_json::{Map, Value};

use nebula_core::time::unix_ms_to_iso8601;
use nebula_core::{
    Backup, FavoriteKind, Favorites, ImportRecord, ImportReport, Toggle, parse_import,
};

use crate::error::{Result, StoreError};
use crate::store::Store;

pub const FAVORITES_KEY: &str = "nebulaFavorites";
pub const BACKUP_KEY: &str = "nebulaFavorites_backup";

#[derive(Debug, Default)]
pub struct PersistentFavorites {
    current: Favorites,
}

impl PersistentFavorites {
    /// Load the stored set. A missing blob is an empty set; a corrupt one
    /// is an error rather than silent data loss.
    pub fn load(store: &Store) -> Result<Self> {
        let current = read_stored(store)?;
        tracing::debug!(count = current.len(), "loaded favorites");
        Ok(Self { current })
    }

    pub fn get(&self) -> &Favorites {
        &self.current
    }

    /// Pick up writes made by other processes sharing the database.
    pub fn reload(&mut self, store: &Store) -> Result<()> {
        self.current = read_stored(store)?;
        Ok(())
    }

    fn commit(&mut self, store: &Store, next: Favorites) -> Result<()> {
        let json = serde_json::to_string(&next)
            .map_err(|e| StoreError::InvalidData(format!("favorites serialization: {e}")))?;
        store.put_blob(FAVORITES_KEY, &json)?;
        self.current = next;
        Ok(())
    }

    // Mutations start from the stored set, not the in-memory copy, so a
    // long-lived handle never writes back a stale set over newer writes.

    pub fn toggle(
        &mut self,
        store: &Store,
        text: &str,
        kind: FavoriteKind,
        metadata: Map<String, Value>,
        now_ms: i64,
    ) -> Result<Toggle> {
        let mut next = read_stored(store)?;
        let outcome = next.toggle(text, kind, metadata, now_ms);
        if outcome != Toggle::Ignored {
            self.commit(store, next)?;
        }
        Ok(outcome)
    }

    pub fn import_records(
        &mut self,
        store: &Store,
        records: Vec<ImportRecord>,
        now_ms: i64,
    ) -> Result<ImportReport> {
        let mut next = read_stored(store)?;
        let report = next.import_merge(records, now_ms);
        if report.added > 0 {
            self.commit(store, next)?;
        }
        tracing::info!(
            received = report.received,
            added = report.added,
            "imported favorites"
        );
        Ok(report)
    }

    /// Parse and merge an import payload. A malformed payload is rejected
    /// before anything is touched.
    pub fn import_json(&mut self, store: &Store, json: &str, now_ms: i64) -> Result<ImportReport> {
        let records = parse_import(json)?;
        self.import_records(store, records, now_ms)
    }

    /// Remove exactly the listed ids.
    pub fn clear(&mut self, store: &Store, ids: &[String]) -> Result<usize> {
        let mut next = read_stored(store)?;
        let removed = next.clear(ids);
        if removed > 0 {
            self.commit(store, next)?;
        }
        Ok(removed)
    }

    pub fn clear_all(&mut self, store: &Store) -> Result<usize> {
        let mut next = read_stored(store)?;
        let removed = next.clear_all();
        self.commit(store, next)?;
        Ok(removed)
    }

    /// Snapshot the stored set under the backup key. Skipped while empty.
    pub fn backup(&mut self, store: &Store, now_ms: i64) -> Result<Option<Backup>> {
        self.reload(store)?;
        if self.current.is_empty() {
            return Ok(None);
        }
        let backup = Backup {
            timestamp: unix_ms_to_iso8601(now_ms),
            count: self.current.len(),
            data: self.current.entries().to_vec(),
        };
        let json = serde_json::to_string(&backup)
            .map_err(|e| StoreError::InvalidData(format!("backup serialization: {e}")))?;
        store.put_blob(BACKUP_KEY, &json)?;
        tracing::info!(count = backup.count, "favorites backup written");
        Ok(Some(backup))
    }

    pub fn load_backup(store: &Store) -> Result<Option<Backup>> {
        store
            .get_blob(BACKUP_KEY)?
            .map(|json| {
                serde_json::from_str(&json)
                    .map_err(|e| StoreError::InvalidData(format!("backup is corrupt: {e}")))
            })
            .transpose()
    }

    /// Replace the current set with the last backup. Returns the restored
    /// count, or `None` when no backup exists.
    pub fn restore_backup(&mut self, store: &Store) -> Result<Option<usize>> {
        let Some(backup) = Self::load_backup(store)? else {
            return Ok(None);
        };
        let next = Favorites::from_entries(backup.data);
        let count = next.len();
        self.commit(store, next)?;
        tracing::info!(count, taken_at = %backup.timestamp, "favorites restored from backup");
        Ok(Some(count))
    }

    /// Drop the backup slot. Returns whether one existed.
    pub fn discard_backup(store: &Store) -> Result<bool> {
        store.delete_blob(BACKUP_KEY)
    }
}

fn read_stored(store: &Store) -> Result<Favorites> {
    match store.get_blob(FAVORITES_KEY)? {
        None => Ok(Favorites::new()),
        Some(json) => {
            let entries = serde_json::from_str(&json).map_err(|e| {
                StoreError::InvalidData(format!("stored favorites are corrupt: {e}"))
            })?;
            Ok(Favorites::from_entries(entries))
        }
    }
}
