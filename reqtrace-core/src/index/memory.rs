//! In-memory vector index

use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::{filter_matches, rank, Collection, IndexEntry, IndexFilter, QueryHit, VectorIndex};
use crate::embedding::check_dimensions;
use crate::errors::{Result, TraceError};

type Store = HashMap<(String, Collection), BTreeMap<String, IndexEntry>>;

/// Vector index held in process memory, for tests and ephemeral runs
#[derive(Debug)]
pub struct InMemoryIndex {
    dimensions: usize,
    store: RwLock<Store>,
}

impl InMemoryIndex {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            store: RwLock::new(HashMap::new()),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Store>> {
        self.store
            .read()
            .map_err(|_| TraceError::IndexUnavailable("in-memory index lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Store>> {
        self.store
            .write()
            .map_err(|_| TraceError::IndexUnavailable("in-memory index lock poisoned".to_string()))
    }
}

fn key(project_id: &str, collection: Collection) -> (String, Collection) {
    (project_id.to_string(), collection)
}

impl VectorIndex for InMemoryIndex {
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
        let mut store = self.write()?;
        let bucket = store.entry(key(project_id, collection)).or_default();
        for entry in entries {
            bucket.insert(entry.id.clone(), entry);
        }
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
        let store = self.read()?;
        Ok(match store.get(&key(project_id, collection)) {
            Some(bucket) => rank(bucket.values(), vector, top_n, filter),
            None => Vec::new(),
        })
    }

    fn get(
        &self,
        project_id: &str,
        collection: Collection,
        filter: Option<&IndexFilter>,
    ) -> Result<Vec<IndexEntry>> {
        let store = self.read()?;
        Ok(store
            .get(&key(project_id, collection))
            .map(|bucket| {
                bucket
                    .values()
                    .filter(|entry| filter_matches(filter, &entry.metadata))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn delete(
        &self,
        project_id: &str,
        collection: Collection,
        filter: Option<&IndexFilter>,
    ) -> Result<usize> {
        let mut store = self.write()?;
        let Some(bucket) = store.get_mut(&key(project_id, collection)) else {
            return Ok(0);
        };
        let before = bucket.len();
        bucket.retain(|_, entry| !filter_matches(filter, &entry.metadata));
        Ok(before - bucket.len())
    }

    fn count(&self, project_id: &str, collection: Collection) -> Result<usize> {
        let store = self.read()?;
        Ok(store
            .get(&key(project_id, collection))
            .map_or(0, BTreeMap::len))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str, vector: Vec<f32>, requirement_id: u32) -> IndexEntry {
        IndexEntry::new(id, vector, format!("doc {}", id)).with_metadata("requirement_id", requirement_id)
    }

    #[test]
    fn test_upsert_replaces_by_id() {
        let index = InMemoryIndex::new(2);
        index.upsert("p1", Collection::Requirements, entry("1", vec![1.0, 0.0], 1)).unwrap();
        index.upsert("p1", Collection::Requirements, entry("1", vec![0.0, 1.0], 1)).unwrap();
        assert_eq!(index.count("p1", Collection::Requirements).unwrap(), 1);
        let stored = index.get("p1", Collection::Requirements, None).unwrap();
        assert_eq!(stored[0].vector, vec![0.0, 1.0]);
    }

    #[test]
    fn test_projects_and_collections_are_isolated() {
        let index = InMemoryIndex::new(2);
        index.upsert("p1", Collection::Requirements, entry("1", vec![1.0, 0.0], 1)).unwrap();
        index.upsert("p2", Collection::Requirements, entry("1", vec![1.0, 0.0], 1)).unwrap();
        assert_eq!(index.count("p1", Collection::Requirements).unwrap(), 1);
        assert_eq!(index.count("p1", Collection::TestCases).unwrap(), 0);
        assert!(index
            .query("p3", Collection::Requirements, &[1.0, 0.0], 5, None)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_query_filter_and_delete() {
        let index = InMemoryIndex::new(2);
        index
            .upsert_batch(
                "p",
                Collection::Links,
                vec![
                    entry("1:a", vec![1.0, 0.0], 1),
                    entry("1:b", vec![0.6, 0.8], 1),
                    entry("2:a", vec![1.0, 0.0], 2),
                ],
            )
            .unwrap();

        let filter = IndexFilter::new().field("requirement_id", 1u32);
        let hits = index
            .query("p", Collection::Links, &[1.0, 0.0], 10, Some(&filter))
            .unwrap();
        let ids: Vec<&str> = hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["1:a", "1:b"]);

        assert_eq!(index.delete("p", Collection::Links, Some(&filter)).unwrap(), 2);
        assert_eq!(index.count("p", Collection::Links).unwrap(), 1);
    }

    #[test]
    fn test_dimension_mismatch_is_rejected() {
        let index = InMemoryIndex::new(3);
        let err = index
            .upsert("p", Collection::TestCases, entry("t", vec![1.0], 1))
            .unwrap_err();
        assert!(matches!(err, TraceError::DimensionMismatch { expected: 3, actual: 1 }));
    }
}
