//! SQLite-backed durable store, the source of truth for record existence.

use crate::adapter::{BackendAdapter, BackendKind, Capability};
use crate::error::BackendError;
use crate::model::{MemoryMetadata, MemoryRecord, MetadataFilters};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::debug;
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;
use uuid::Uuid;

/// Default adapter name for the SQLite durable store.
const DEFAULT_NAME: &str = "sqlite-durable";

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS memory_records (
    id TEXT PRIMARY KEY,
    content TEXT NOT NULL,
    metadata TEXT NOT NULL,
    embedding BLOB,
    origin_backend TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_memory_records_created_at
    ON memory_records(created_at);
"#;

/// Durable store persisting records as rows keyed by id.
pub struct SqliteDurableStore {
    name: String,
    conn: Mutex<Connection>,
}

impl SqliteDurableStore {
    /// Open or create the database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, BackendError> {
        let conn = Connection::open(path.as_ref())?;
        conn.execute_batch(SCHEMA)?;
        debug!(
            "opened durable store (path={})",
            path.as_ref().display()
        );
        Ok(Self {
            name: DEFAULT_NAME.to_string(),
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database.
    pub fn in_memory() -> Result<Self, BackendError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            name: DEFAULT_NAME.to_string(),
            conn: Mutex::new(conn),
        })
    }

    fn serialize_embedding(embedding: &[f32]) -> Vec<u8> {
        embedding.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    fn deserialize_embedding(data: &[u8]) -> Vec<f32> {
        data.chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect()
    }

    fn row_to_record(
        id: String,
        content: String,
        metadata: String,
        embedding: Option<Vec<u8>>,
        origin_backend: String,
        created_at: String,
    ) -> Result<MemoryRecord, BackendError> {
        let id = Uuid::parse_str(&id)
            .map_err(|err| BackendError::Unreachable(format!("corrupt record id: {err}")))?;
        let metadata: MemoryMetadata = serde_json::from_str(&metadata)?;
        let created_at = DateTime::parse_from_rfc3339(&created_at)
            .map_err(|err| BackendError::Unreachable(format!("corrupt timestamp: {err}")))?
            .with_timezone(&Utc);
        Ok(MemoryRecord {
            id,
            content,
            embedding: embedding.as_deref().map(Self::deserialize_embedding),
            metadata,
            origin_backend,
            created_at,
        })
    }
}

#[async_trait]
impl BackendAdapter for SqliteDurableStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Durable
    }

    fn capabilities(&self) -> &'static [Capability] {
        &[
            Capability::Put,
            Capability::Get,
            Capability::Delete,
            Capability::Scan,
        ]
    }

    async fn probe(&self) -> Result<(), BackendError> {
        let conn = self.conn.lock();
        conn.query_row("SELECT 1", [], |_| Ok(()))?;
        Ok(())
    }

    async fn put(&self, record: &MemoryRecord) -> Result<(), BackendError> {
        let metadata = serde_json::to_string(&record.metadata)?;
        let embedding = record.embedding.as_deref().map(Self::serialize_embedding);
        let conn = self.conn.lock();
        conn.execute(
            "INSERT OR REPLACE INTO memory_records
                (id, content, metadata, embedding, origin_backend, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                record.id.to_string(),
                record.content,
                metadata,
                embedding,
                record.origin_backend,
                record.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<MemoryRecord>, BackendError> {
        let conn = self.conn.lock();
        let row = conn
            .query_row(
                "SELECT id, content, metadata, embedding, origin_backend, created_at
                 FROM memory_records WHERE id = ?1",
                params![id.to_string()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, Option<Vec<u8>>>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, String>(5)?,
                    ))
                },
            )
            .optional()?;
        match row {
            Some((id, content, metadata, embedding, origin_backend, created_at)) => Ok(Some(
                Self::row_to_record(id, content, metadata, embedding, origin_backend, created_at)?,
            )),
            None => Ok(None),
        }
    }

    async fn delete(&self, id: Uuid) -> Result<bool, BackendError> {
        let conn = self.conn.lock();
        let removed = conn.execute(
            "DELETE FROM memory_records WHERE id = ?1",
            params![id.to_string()],
        )?;
        Ok(removed > 0)
    }

    async fn scan(&self, filters: &MetadataFilters) -> Result<Vec<MemoryRecord>, BackendError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, content, metadata, embedding, origin_backend, created_at
             FROM memory_records ORDER BY created_at DESC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, Option<Vec<u8>>>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
            ))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (id, content, metadata, embedding, origin_backend, created_at) = row?;
            let record =
                Self::row_to_record(id, content, metadata, embedding, origin_backend, created_at)?;
            if record.metadata.matches(filters) {
                records.push(record);
            }
        }
        debug!("durable scan returned {} records", records.len());
        Ok(records)
    }

    async fn count(&self) -> Result<usize, BackendError> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM memory_records", [], |row| {
            row.get(0)
        })?;
        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::SqliteDurableStore;
    use crate::adapter::BackendAdapter;
    use crate::model::{FilterValue, MemoryMetadata, MemoryRecord, MetadataFilters};
    use pretty_assertions::assert_eq;

    fn record(content: &str, category: &str, embedding: Option<Vec<f32>>) -> MemoryRecord {
        MemoryRecord::new(
            content,
            MemoryMetadata {
                category: Some(category.to_string()),
                importance: 5,
                ..MemoryMetadata::default()
            },
            embedding,
            "sqlite-durable",
        )
    }

    #[tokio::test]
    async fn put_get_round_trips_embedding_and_metadata() {
        let store = SqliteDurableStore::in_memory().expect("open");
        let stored = record("Python is great", "pref", Some(vec![0.25, -0.5, 1.0]));
        store.put(&stored).await.expect("put");

        let loaded = store.get(stored.id).await.expect("get").expect("present");
        assert_eq!(loaded.content, stored.content);
        assert_eq!(loaded.embedding, stored.embedding);
        assert_eq!(loaded.metadata, stored.metadata);
        assert_eq!(loaded.origin_backend, stored.origin_backend);
    }

    #[tokio::test]
    async fn degraded_record_round_trips_without_embedding() {
        let store = SqliteDurableStore::in_memory().expect("open");
        let stored = record("hello", "note", None);
        store.put(&stored).await.expect("put");

        let loaded = store.get(stored.id).await.expect("get").expect("present");
        assert!(loaded.is_degraded());
    }

    #[tokio::test]
    async fn delete_reports_existence() {
        let store = SqliteDurableStore::in_memory().expect("open");
        let stored = record("hello", "note", None);
        store.put(&stored).await.expect("put");

        assert!(store.delete(stored.id).await.expect("first delete"));
        assert!(!store.delete(stored.id).await.expect("second delete"));
        assert_eq!(store.get(stored.id).await.expect("get"), None);
    }

    #[tokio::test]
    async fn scan_applies_filters() {
        let store = SqliteDurableStore::in_memory().expect("open");
        store
            .put(&record("Python is great", "pref", None))
            .await
            .expect("put");
        store
            .put(&record("meeting at noon", "event", None))
            .await
            .expect("put");

        let mut filters = MetadataFilters::new();
        filters.insert("category".to_string(), FilterValue::One("pref".to_string()));
        let matched = store.scan(&filters).await.expect("scan");
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].content, "Python is great");

        let all = store.scan(&MetadataFilters::new()).await.expect("scan all");
        assert_eq!(all.len(), 2);
        assert_eq!(store.count().await.expect("count"), 2);
    }

    #[tokio::test]
    async fn persists_to_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("memory.db");
        let stored = record("durable", "note", Some(vec![1.0, 0.0]));
        {
            let store = SqliteDurableStore::open(&path).expect("open");
            store.put(&stored).await.expect("put");
        }

        let reopened = SqliteDurableStore::open(&path).expect("reopen");
        let loaded = reopened.get(stored.id).await.expect("get").expect("present");
        assert_eq!(loaded.content, "durable");
        assert_eq!(loaded.embedding, Some(vec![1.0, 0.0]));
    }
}
