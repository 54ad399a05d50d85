use chrono::Utc;
use feedhead_core::{Error, Payload, PayloadWithId, Result, StreamStructure};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, warn};

use crate::store::StorageBackend;

/// SQLite-backed journals and content.
#[derive(Clone)]
pub struct SqliteStore {
    inner: Arc<Mutex<Connection>>,
    db_path: PathBuf,
}

impl SqliteStore {
    /// Open (or create) the feed database at the given path.
    pub fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::Storage(format!("Failed to create db directory: {}", e))
            })?;
        }

        let conn = Connection::open(db_path)
            .map_err(|e| Error::Storage(format!("Failed to open feed db: {}", e)))?;

        // WAL keeps readers off the writer's lock
        conn.execute_batch("PRAGMA journal_mode=WAL;").ok();

        let store = Self {
            inner: Arc::new(Mutex::new(conn)),
            db_path: db_path.to_path_buf(),
        };
        store.init_schema()?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.inner
            .lock()
            .map_err(|e| Error::Storage(format!("Lock error: {}", e)))
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.lock()?;

        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS journal (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id TEXT NOT NULL,
                operation TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_journal_session ON journal(session_id, seq);

            CREATE TABLE IF NOT EXISTS content (
                content_id TEXT PRIMARY KEY,
                payload BLOB NOT NULL,
                updated_at TEXT NOT NULL
            );
            ",
        )
        .map_err(|e| Error::Storage(format!("Failed to init feed schema: {}", e)))?;

        debug!(path = %self.db_path.display(), "Feed store schema initialized");
        Ok(())
    }
}

impl StorageBackend for SqliteStore {
    fn read_journal(&self, session_id: &str) -> Result<Vec<StreamStructure>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare("SELECT operation FROM journal WHERE session_id = ?1 ORDER BY seq")
            .map_err(|e| Error::Storage(format!("Query error: {}", e)))?;

        let rows = stmt
            .query_map(params![session_id], |row| row.get::<_, String>(0))
            .map_err(|e| Error::Storage(format!("Query error: {}", e)))?;

        let mut structures = Vec::new();
        for row in rows {
            let raw = row.map_err(|e| Error::Storage(format!("Row error: {}", e)))?;
            match serde_json::from_str::<StreamStructure>(&raw) {
                Ok(structure) => structures.push(structure),
                Err(e) => {
                    warn!(error = %e, session_id = %session_id, "Skipping unreadable journal entry");
                }
            }
        }
        Ok(structures)
    }

    fn append_journal(&self, session_id: &str, structures: &[StreamStructure]) -> Result<()> {
        let mut conn = self.lock()?;
        let now = Utc::now().to_rfc3339();

        let tx = conn
            .transaction()
            .map_err(|e| Error::Storage(format!("Transaction error: {}", e)))?;
        for structure in structures {
            let raw = serde_json::to_string(structure)?;
            tx.execute(
                "INSERT INTO journal (session_id, operation, created_at) VALUES (?1, ?2, ?3)",
                params![session_id, raw, now],
            )
            .map_err(|e| Error::Storage(format!("Insert error: {}", e)))?;
        }
        tx.commit()
            .map_err(|e| Error::Storage(format!("Commit error: {}", e)))?;

        debug!(session_id = %session_id, count = structures.len(), "Journal appended");
        Ok(())
    }

    fn delete_journal(&self, session_id: &str) -> Result<()> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM journal WHERE session_id = ?1", params![session_id])
            .map_err(|e| Error::Storage(format!("Delete error: {}", e)))?;
        Ok(())
    }

    fn journal_ids(&self) -> Result<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare("SELECT DISTINCT session_id FROM journal ORDER BY session_id")
            .map_err(|e| Error::Storage(format!("Query error: {}", e)))?;
        let ids = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(|e| Error::Storage(format!("Query error: {}", e)))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| Error::Storage(format!("Row error: {}", e)))?;
        Ok(ids)
    }

    fn read_content(&self, content_ids: &[String]) -> Result<Vec<PayloadWithId>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare("SELECT payload FROM content WHERE content_id = ?1")
            .map_err(|e| Error::Storage(format!("Query error: {}", e)))?;

        let mut found = Vec::with_capacity(content_ids.len());
        for id in content_ids {
            let payload: Option<Vec<u8>> = stmt
                .query_row(params![id], |row| row.get(0))
                .optional()
                .map_err(|e| Error::Storage(format!("Query error: {}", e)))?;
            if let Some(bytes) = payload {
                found.push(PayloadWithId::new(id.clone(), Payload::new(bytes)));
            }
        }
        Ok(found)
    }

    fn write_content(&self, items: &[PayloadWithId]) -> Result<()> {
        let mut conn = self.lock()?;
        let now = Utc::now().to_rfc3339();

        let tx = conn
            .transaction()
            .map_err(|e| Error::Storage(format!("Transaction error: {}", e)))?;
        for item in items {
            tx.execute(
                "INSERT INTO content (content_id, payload, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(content_id) DO UPDATE SET payload = excluded.payload, updated_at = excluded.updated_at",
                params![item.content_id, item.payload.as_bytes(), now],
            )
            .map_err(|e| Error::Storage(format!("Upsert error: {}", e)))?;
        }
        tx.commit()
            .map_err(|e| Error::Storage(format!("Commit error: {}", e)))?;
        Ok(())
    }

    fn content_count(&self) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM content", [], |row| row.get(0))
            .map_err(|e| Error::Storage(format!("Query error: {}", e)))?;
        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_store() -> (SqliteStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let db_path = dir.path().join("feed.db");
        let store = SqliteStore::open(&db_path).unwrap();
        (store, dir)
    }

    #[test]
    fn test_journal_preserves_order() {
        let (store, _dir) = test_store();
        store
            .append_journal(
                "$HEAD",
                &[
                    StreamStructure::append("root", None),
                    StreamStructure::append("a", Some("root")),
                ],
            )
            .unwrap();
        store
            .append_journal("$HEAD", &[StreamStructure::remove("a", Some("root"))])
            .unwrap();

        let journal = store.read_journal("$HEAD").unwrap();
        assert_eq!(
            journal,
            vec![
                StreamStructure::append("root", None),
                StreamStructure::append("a", Some("root")),
                StreamStructure::remove("a", Some("root")),
            ]
        );
    }

    #[test]
    fn test_journals_are_per_session() {
        let (store, _dir) = test_store();
        store
            .append_journal("$HEAD", &[StreamStructure::append("root", None)])
            .unwrap();
        store
            .append_journal("s1", &[StreamStructure::append("x", None)])
            .unwrap();

        assert_eq!(
            store.journal_ids().unwrap(),
            vec!["$HEAD".to_string(), "s1".to_string()]
        );
        store.delete_journal("s1").unwrap();
        assert!(store.read_journal("s1").unwrap().is_empty());
        assert_eq!(store.read_journal("$HEAD").unwrap().len(), 1);
    }

    #[test]
    fn test_content_upsert() {
        let (store, _dir) = test_store();
        store
            .write_content(&[PayloadWithId::new("a", Payload::from("v1"))])
            .unwrap();
        store
            .write_content(&[PayloadWithId::new("a", Payload::from("v2"))])
            .unwrap();

        let found = store
            .read_content(&["a".to_string(), "missing".to_string()])
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].payload.as_bytes(), b"v2");
        assert_eq!(store.content_count().unwrap(), 1);
    }

    #[test]
    fn test_reopen_keeps_data() {
        let dir = TempDir::new().unwrap();
        let db_path = dir.path().join("feed.db");
        {
            let store = SqliteStore::open(&db_path).unwrap();
            store
                .append_journal("$HEAD", &[StreamStructure::append("root", None)])
                .unwrap();
        }
        let store = SqliteStore::open(&db_path).unwrap();
        assert_eq!(store.read_journal("$HEAD").unwrap().len(), 1);
    }
}
