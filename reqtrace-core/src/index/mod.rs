//! Vector index abstraction
//!
//! The traceability engine persists embeddings for requirements, test cases
//! and semantic links in named collections, scoped per project. Any store
//! that implements [`VectorIndex`] can back it.

mod memory;
mod sqlite;

pub use memory::InMemoryIndex;
pub use sqlite::SqliteIndex;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::fmt;

use crate::embedding::cosine_distance;
use crate::errors::Result;

/// Named collections within a project
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    Requirements,
    TestCases,
    Links,
}

impl Collection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Requirements => "requirements",
            Collection::TestCases => "test_cases",
            Collection::Links => "links",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A stored vector with its metadata and source document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub id: String,
    pub vector: Vec<f32>,
    pub metadata: Map<String, Value>,
    pub document: String,
}

impl IndexEntry {
    pub fn new(id: impl Into<String>, vector: Vec<f32>, document: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            vector,
            metadata: Map::new(),
            document: document.into(),
        }
    }

    pub fn with_metadata(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }
}

/// One nearest-neighbour result
#[derive(Debug, Clone, PartialEq)]
pub struct QueryHit {
    pub id: String,
    pub metadata: Map<String, Value>,
    pub document: String,
    /// Cosine distance in [0, 2]
    pub distance: f64,
}

/// Metadata equality constraints; an empty filter matches everything
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexFilter {
    equals: Map<String, Value>,
}

impl IndexFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.equals.insert(key.to_string(), value.into());
        self
    }

    pub fn matches(&self, metadata: &Map<String, Value>) -> bool {
        self.equals
            .iter()
            .all(|(key, value)| metadata.get(key) == Some(value))
    }
}

/// Storage for embeddings, scoped by project and collection
///
/// Implementations must tolerate concurrent readers. Entry ids are unique
/// within one project and collection; upserting an existing id replaces it.
pub trait VectorIndex: Send + Sync {
    /// Width every stored vector must have
    fn dimensions(&self) -> usize;

    fn upsert(&self, project_id: &str, collection: Collection, entry: IndexEntry) -> Result<()> {
        self.upsert_batch(project_id, collection, vec![entry])
    }

    fn upsert_batch(
        &self,
        project_id: &str,
        collection: Collection,
        entries: Vec<IndexEntry>,
    ) -> Result<()>;

    /// Up to `top_n` entries nearest to `vector`, closest first
    fn query(
        &self,
        project_id: &str,
        collection: Collection,
        vector: &[f32],
        top_n: usize,
        filter: Option<&IndexFilter>,
    ) -> Result<Vec<QueryHit>>;

    /// All entries matching the filter, ordered by id
    fn get(
        &self,
        project_id: &str,
        collection: Collection,
        filter: Option<&IndexFilter>,
    ) -> Result<Vec<IndexEntry>>;

    /// Removes matching entries and returns how many were removed
    fn delete(
        &self,
        project_id: &str,
        collection: Collection,
        filter: Option<&IndexFilter>,
    ) -> Result<usize>;

    fn count(&self, project_id: &str, collection: Collection) -> Result<usize>;
}

fn filter_matches(filter: Option<&IndexFilter>, metadata: &Map<String, Value>) -> bool {
    filter.map_or(true, |f| f.matches(metadata))
}

/// Ranks entries by cosine distance to `vector`, ties broken by id
fn rank<'a, I>(entries: I, vector: &[f32], top_n: usize, filter: Option<&IndexFilter>) -> Vec<QueryHit>
where
    I: IntoIterator<Item = &'a IndexEntry>,
{
    let mut hits: Vec<QueryHit> = entries
        .into_iter()
        .filter(|entry| filter_matches(filter, &entry.metadata))
        .map(|entry| QueryHit {
            id: entry.id.clone(),
            metadata: entry.metadata.clone(),
            document: entry.document.clone(),
            distance: cosine_distance(vector, &entry.vector),
        })
        .collect();

    hits.sort_by(|a, b| {
        a.distance
            .partial_cmp(&b.distance)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.id.cmp(&b.id))
    });
    hits.truncate(top_n);
    hits
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_matches_all_fields() {
        let mut metadata = Map::new();
        metadata.insert("requirement_id".to_string(), Value::from(3u32));
        metadata.insert("link_type".to_string(), Value::from("semantic"));

        assert!(IndexFilter::new().matches(&metadata));
        assert!(IndexFilter::new().field("requirement_id", 3u32).matches(&metadata));
        assert!(!IndexFilter::new()
            .field("requirement_id", 3u32)
            .field("link_type", "direct")
            .matches(&metadata));
        assert!(!IndexFilter::new().field("missing", 1).matches(&metadata));
    }

    #[test]
    fn test_rank_orders_by_distance_then_id() {
        let entries = vec![
            IndexEntry::new("b", vec![1.0, 0.0], "b"),
            IndexEntry::new("a", vec![1.0, 0.0], "a"),
            IndexEntry::new("c", vec![0.0, 1.0], "c"),
        ];
        let hits = rank(&entries, &[1.0, 0.0], 2, None);
        let ids: Vec<&str> = hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert!(hits[0].distance.abs() < 1e-9);
    }
}
