use std::fs;
use std::path::{Path, PathBuf};

use nebula_core::ImportReport;
use nebula_core::time::date_stamp;

use crate::error::{Result, StoreError};
use crate::favorites::PersistentFavorites;
use crate::store::Store;

/// Default export file name, stamped with the UTC date.
pub fn export_file_name(now_ms: i64) -> String {
    format!("nebula-favorites-{}.json", date_stamp(now_ms))
}

/// Resolve the export target: an explicit file path, a directory to drop
/// the default name into, or the default name in the working directory.
pub fn export_path(target: Option<&Path>, now_ms: i64) -> PathBuf {
    match target {
        Some(p) if p.is_dir() => p.join(export_file_name(now_ms)),
        Some(p) => p.to_path_buf(),
        None => PathBuf::from(export_file_name(now_ms)),
    }
}

impl PersistentFavorites {
    /// Write the full set as pretty JSON.
    pub fn export_file(&self, path: &Path) -> Result<()> {
        let json = self
            .get()
            .export_all()
            .map_err(|e| StoreError::InvalidData(format!("JSON export failed: {e}")))?;
        fs::write(path, json).map_err(|e| {
            StoreError::InvalidData(format!("failed to write {}: {e}", path.display()))
        })
    }

    /// Merge a favorites file into the set. The file is fully validated
    /// before anything is written.
    pub fn import_file(&mut self, store: &Store, path: &Path, now_ms: i64) -> Result<ImportReport> {
        let json = fs::read_to_string(path).map_err(|e| {
            StoreError::InvalidData(format!("failed to read {}: {e}", path.display()))
        })?;
        self.import_json(store, &json, now_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nebula_core::FavoriteKind;
    use serde_json::Map;

    const T0: i64 = 1_771_632_000_000;

    #[test]
    fn test_export_file_name() {
        assert_eq!(export_file_name(T0), "nebula-favorites-2026-02-21.json");
    }

    #[test]
    fn test_export_path_into_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = export_path(Some(dir.path()), T0);
        assert_eq!(path, dir.path().join("nebula-favorites-2026-02-21.json"));
        let explicit = dir.path().join("mine.json");
        assert_eq!(export_path(Some(&explicit), T0), explicit);
    }

    #[test]
    fn test_export_import_between_stores() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("favs.json");

        let a = Store::open_in_memory().unwrap();
        let mut favs_a = PersistentFavorites::load(&a).unwrap();
        favs_a
            .toggle(&a, "first", FavoriteKind::Collision, Map::new(), T0)
            .unwrap();
        favs_a
            .toggle(&a, "second", FavoriteKind::Signal, Map::new(), T0 + 1)
            .unwrap();
        favs_a.export_file(&path).unwrap();

        let b = Store::open_in_memory().unwrap();
        let mut favs_b = PersistentFavorites::load(&b).unwrap();
        let report = favs_b.import_file(&b, &path, T0 + 2).unwrap();
        assert_eq!(report.added, 2);
        assert_eq!(favs_b.get().stats(), favs_a.get().stats());

        let again = favs_b.import_file(&b, &path, T0 + 3).unwrap();
        assert_eq!(again.added, 0);
        assert_eq!(favs_b.get().len(), 2);
    }

    #[test]
    fn test_import_missing_file() {
        let store = Store::open_in_memory().unwrap();
        let mut favs = PersistentFavorites::load(&store).unwrap();
        let err = favs
            .import_file(&store, Path::new("/nonexistent/favs.json"), T0)
            .unwrap_err();
        assert!(err.to_string().contains("failed to read"));
    }

    #[test]
    fn test_import_garbage_file_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, "definitely not json").unwrap();
        let store = Store::open_in_memory().unwrap();
        let mut favs = PersistentFavorites::load(&store).unwrap();
        assert!(matches!(
            favs.import_file(&store, &path, T0),
            Err(StoreError::Import(_))
        ));
        assert!(favs.get().is_empty());
    }
}
