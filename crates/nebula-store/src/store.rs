use std::path::Path;

use rusqlite::{Connection, OptionalExtension, params};
use uuid::Uuid;

use nebula_core::time::now_unix_ms;
use nebula_core::{Fragment, Identity};

use crate::error::Result;
use crate::schema;

const IDENTITY_KEY: &str = "anonymous_identity";

pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        schema::initialize(&conn)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        schema::initialize(&conn)?;
        Ok(Self { conn })
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    pub fn schema_version(&self) -> Result<Option<i64>> {
        schema::get_schema_version(&self.conn)
    }

    // --- Metadata ---

    pub fn get_metadata(&self, key: &str) -> Result<Option<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT value FROM metadata WHERE key = ?1")?;
        Ok(stmt.query_row([key], |row| row.get(0)).optional()?)
    }

    pub fn set_metadata(&self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO metadata (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    /// The local anonymous identity, created on first use.
    pub fn identity(&self) -> Result<Identity> {
        if let Some(token) = self.get_metadata(IDENTITY_KEY)? {
            return Ok(Identity::new(token));
        }
        let token = Uuid::new_v4().to_string();
        self.set_metadata(IDENTITY_KEY, &token)?;
        tracing::debug!("created anonymous identity");
        Ok(Identity::new(token))
    }

    // --- Key-value blobs ---

    pub fn get_blob(&self, key: &str) -> Result<Option<String>> {
        let mut stmt = self.conn.prepare("SELECT value FROM blobs WHERE key = ?1")?;
        Ok(stmt.query_row([key], |row| row.get(0)).optional()?)
    }

    /// Write a blob in its own transaction. Either the new value is fully
    /// stored or the previous one is left untouched.
    pub fn put_blob(&self, key: &str, value: &str) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT OR REPLACE INTO blobs (key, value, updated_at) VALUES (?1, ?2, ?3)",
            params![key, value, now_unix_ms()],
        )?;
        tx.commit()?;
        Ok(())
    }

    pub fn delete_blob(&self, key: &str) -> Result<bool> {
        let n = self.conn.execute("DELETE FROM blobs WHERE key = ?1", [key])?;
        Ok(n > 0)
    }

    // --- Fragment log ---

    /// Append a fragment. Id and timestamp are assigned here, never by the caller.
    pub fn append_fragment(&self, content: &str, source: &str) -> Result<Fragment> {
        let fragment = Fragment {
            id: Uuid::new_v4().to_string(),
            content: content.to_string(),
            created_at: now_unix_ms(),
        };
        self.conn.execute(
            "INSERT INTO fragments (id, content, created_at, source) VALUES (?1, ?2, ?3, ?4)",
            params![fragment.id, fragment.content, fragment.created_at, source],
        )?;
        Ok(fragment)
    }

    /// Newest-first snapshot of at most `limit` fragments.
    pub fn recent_fragments(&self, limit: usize) -> Result<Vec<Fragment>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, content, created_at FROM fragments
             ORDER BY created_at DESC, rowid DESC LIMIT ?1",
        )?;
        let rows = stmt
            .query_map([limit as i64], |row| {
                Ok(Fragment {
                    id: row.get(0)?,
                    content: row.get(1)?,
                    created_at: row.get(2)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn fragment_count(&self) -> Result<u64> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM fragments", [], |row| row.get(0))?;
        Ok(n as u64)
    }

    /// Fold the WAL back into the main file. Called on clean shutdown.
    pub fn checkpoint_truncate(&self) -> Result<()> {
        self.conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
        Ok(())
    }
}
