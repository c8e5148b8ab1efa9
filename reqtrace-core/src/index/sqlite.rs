//! SQLite-backed vector index
//!
//! Vectors are stored as little-endian f32 blobs next to their JSON metadata.
//! Nearest-neighbour queries scan the project's collection and rank in
//! process, which is fine for requirement-sized corpora.

use chrono::Utc;
use rusqlite::{params, Connection};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

use super::{filter_matches, rank, Collection, IndexEntry, IndexFilter, QueryHit, VectorIndex};
use crate::embedding::check_dimensions;
use crate::errors::{Result, TraceError};

/// Current schema version
const SCHEMA_VERSION: i32 = 1;

/// Persistent vector index in a single SQLite file
///
/// All calls on one instance share a single connection, so concurrent
/// queries through the same handle run one at a time.
pub struct SqliteIndex {
    path: PathBuf,
    dimensions: usize,
    conn: Mutex<Connection>,
}

impl SqliteIndex {
    /// Opens or creates the index file
    pub fn open<P: AsRef<Path>>(path: P, dimensions: usize) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(&path).map_err(|e| {
            TraceError::IndexUnavailable(format!("cannot open {}: {}", path.display(), e))
        })?;

        // WAL keeps readers in other handles unblocked during a write. Within
        // one handle the connection mutex still serializes every call.
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        let index = Self {
            path,
            dimensions,
            conn: Mutex::new(conn),
        };
        index.init_schema()?;
        debug!(path = %index.path.display(), dimensions, "Opened SQLite vector index");
        Ok(index)
    }

    /// Index backed by a private in-memory database
    pub fn in_memory(dimensions: usize) -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| TraceError::IndexUnavailable(format!("cannot open in-memory index: {}", e)))?;
        let index = Self {
            path: PathBuf::from(":memory:"),
            dimensions,
            conn: Mutex::new(conn),
        };
        index.init_schema()?;
        Ok(index)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| TraceError::IndexUnavailable("index connection lock poisoned".to_string()))
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.lock()?;

        let current_version: i32 = conn
            .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
                row.get(0)
            })
            .unwrap_or(0);

        if current_version == 0 {
            conn.execute_batch(include_str!("schema.sql"))?;
        } else if current_version != SCHEMA_VERSION {
            return Err(TraceError::IndexUnavailable(format!(
                "index schema version {} is not supported, expected {}",
                current_version, SCHEMA_VERSION
            )));
        }
        Ok(())
    }

    fn load(
        conn: &Connection,
        project_id: &str,
        collection: Collection,
        filter: Option<&IndexFilter>,
    ) -> Result<Vec<IndexEntry>> {
        let mut stmt = conn.prepare(
            "SELECT id, vector, metadata, document FROM index_entries
             WHERE project_id = ?1 AND collection = ?2 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![project_id, collection.as_str()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, Vec<u8>>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;

        let mut entries = Vec::new();
        for row in rows {
            let (id, blob, metadata, document) = row?;
            let metadata: Map<String, Value> = serde_json::from_str(&metadata)?;
            if !filter_matches(filter, &metadata) {
                continue;
            }
            let vector = decode_vector(&blob).ok_or_else(|| {
                TraceError::IndexUnavailable(format!("corrupt vector stored for entry {}", id))
            })?;
            entries.push(IndexEntry {
                id,
                vector,
                metadata,
                document,
            });
        }
        Ok(entries)
    }
}

impl VectorIndex for SqliteIndex {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn upsert_batch(
        &self,
        project_id: &str,
        collection: Collection,
        entries: Vec<IndexEntry>,
    ) -> Result<()> {
        for entry in &entries {
            check_dimensions(self.dimensions, &entry.vector)?;
        }

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let now = Utc::now().to_rfc3339();
        {
            let mut stmt = tx.prepare(
                "INSERT OR REPLACE INTO index_entries
                 (project_id, collection, id, dimensions, vector, metadata, document, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )?;
            for entry in &entries {
                stmt.execute(params![
                    project_id,
                    collection.as_str(),
                    entry.id,
                    entry.vector.len() as i64,
                    encode_vector(&entry.vector),
                    serde_json::to_string(&entry.metadata)?,
                    entry.document,
                    now,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn query(
        &self,
        project_id: &str,
        collection: Collection,
        vector: &[f32],
        top_n: usize,
        filter: Option<&IndexFilter>,
    ) -> Result<Vec<QueryHit>> {
        check_dimensions(self.dimensions, vector)?;
        let conn = self.lock()?;
        let entries = Self::load(&conn, project_id, collection, filter)?;
        Ok(rank(&entries, vector, top_n, None))
    }

    fn get(
        &self,
        project_id: &str,
        collection: Collection,
        filter: Option<&IndexFilter>,
    ) -> Result<Vec<IndexEntry>> {
        let conn = self.lock()?;
        Self::load(&conn, project_id, collection, filter)
    }

    fn delete(
        &self,
        project_id: &str,
        collection: Collection,
        filter: Option<&IndexFilter>,
    ) -> Result<usize> {
        let mut conn = self.lock()?;

        if filter.is_none() {
            let removed = conn.execute(
                "DELETE FROM index_entries WHERE project_id = ?1 AND collection = ?2",
                params![project_id, collection.as_str()],
            )?;
            return Ok(removed);
        }

        let doomed = Self::load(&conn, project_id, collection, filter)?;
        let tx = conn.transaction()?;
        let mut removed = 0;
        {
            let mut stmt = tx.prepare(
                "DELETE FROM index_entries WHERE project_id = ?1 AND collection = ?2 AND id = ?3",
            )?;
            for entry in &doomed {
                removed += stmt.execute(params![project_id, collection.as_str(), entry.id])?;
            }
        }
        tx.commit()?;
        Ok(removed)
    }

    fn count(&self, project_id: &str, collection: Collection) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM index_entries WHERE project_id = ?1 AND collection = ?2",
            params![project_id, collection.as_str()],
            |row| row.get(0),
        )?;
        Ok(usize::try_from(count).unwrap_or(0))
    }
}

fn encode_vector(vector: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vector.len() * 4);
    for value in vector {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

fn decode_vector(blob: &[u8]) -> Option<Vec<f32>> {
    if blob.len() % 4 != 0 {
        return None;
    }
    Some(
        blob.chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn entry(id: &str, vector: Vec<f32>) -> IndexEntry {
        IndexEntry::new(id, vector, format!("text of {}", id))
            .with_metadata("kind", "requirement")
            .with_metadata("requirement_id", 7u32)
    }

    #[test]
    fn test_entries_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("index.db");

        {
            let index = SqliteIndex::open(&path, 2).unwrap();
            index
                .upsert_batch(
                    "proj",
                    Collection::Requirements,
                    vec![entry("1", vec![1.0, 0.0]), entry("2", vec![0.0, 1.0])],
                )
                .unwrap();
        }

        let index = SqliteIndex::open(&path, 2).unwrap();
        assert_eq!(index.count("proj", Collection::Requirements).unwrap(), 2);
        let stored = index.get("proj", Collection::Requirements, None).unwrap();
        assert_eq!(stored[0], entry("1", vec![1.0, 0.0]));
    }

    #[test]
    fn test_separate_handles_share_the_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("index.db");
        let writer = SqliteIndex::open(&path, 2).unwrap();
        let reader = SqliteIndex::open(&path, 2).unwrap();

        let mode: String = writer
            .conn
            .lock()
            .unwrap()
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .unwrap();
        assert_eq!(mode.to_lowercase(), "wal");

        writer
            .upsert("p1", Collection::TestCases, entry("TC-1", vec![1.0, 0.0]))
            .unwrap();
        assert_eq!(reader.count("p1", Collection::TestCases).unwrap(), 1);
    }

    #[test]
    fn test_query_ranks_nearest_first() {
        let index = SqliteIndex::in_memory(2).unwrap();
        index
            .upsert_batch(
                "proj",
                Collection::TestCases,
                vec![
                    entry("far", vec![0.0, 1.0]),
                    entry("near", vec![1.0, 0.1]),
                    entry("exact", vec![1.0, 0.0]),
                ],
            )
            .unwrap();

        let hits = index
            .query("proj", Collection::TestCases, &[1.0, 0.0], 2, None)
            .unwrap();
        let ids: Vec<&str> = hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["exact", "near"]);
        assert_eq!(hits[0].document, "text of exact");
    }

    #[test]
    fn test_filtered_delete() {
        let index = SqliteIndex::in_memory(2).unwrap();
        index
            .upsert_batch(
                "proj",
                Collection::Links,
                vec![
                    entry("7:a", vec![1.0, 0.0]),
                    IndexEntry::new("8:a", vec![1.0, 0.0], "other").with_metadata("requirement_id", 8u32),
                ],
            )
            .unwrap();

        let filter = IndexFilter::new().field("requirement_id", 7u32);
        assert_eq!(index.delete("proj", Collection::Links, Some(&filter)).unwrap(), 1);
        assert_eq!(index.count("proj", Collection::Links).unwrap(), 1);
        assert_eq!(index.delete("proj", Collection::Links, None).unwrap(), 1);
        assert_eq!(index.count("proj", Collection::Links).unwrap(), 0);
    }

    #[test]
    fn test_rejects_wrong_width() {
        let index = SqliteIndex::in_memory(3).unwrap();
        let err = index
            .upsert("proj", Collection::Requirements, entry("1", vec![1.0, 0.0]))
            .unwrap_err();
        assert!(matches!(err, TraceError::DimensionMismatch { .. }));
        assert!(index
            .query("proj", Collection::Requirements, &[1.0], 3, None)
            .is_err());
    }

    #[test]
    fn test_unsupported_schema_version() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("index.db");
        {
            let conn = Connection::open(&path).unwrap();
            conn.execute_batch("CREATE TABLE schema_version (version INTEGER NOT NULL); INSERT INTO schema_version VALUES (99);")
                .unwrap();
        }
        let err = SqliteIndex::open(&path, 2).err().unwrap();
        assert!(err.is_index_failure());
    }

    #[test]
    fn test_vector_blob_round_trip() {
        let vector = vec![0.5f32, -1.25, 3.0];
        assert_eq!(decode_vector(&encode_vector(&vector)), Some(vector));
        assert_eq!(decode_vector(&[0u8; 5]), None);
    }
}
