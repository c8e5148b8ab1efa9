//! Embedding-based traceability
//!
//! The vector index is the durable state: requirement, test-case and
//! link embeddings live there, scoped per project. A
//! [`TraceabilityMatrix`] is a snapshot rebuilt on every call.

use chrono::Utc;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

use crate::config::TraceConfig;
use crate::embedding::Embedder;
use crate::errors::{Result, TraceError};
use crate::index::{Collection, IndexEntry, IndexFilter, VectorIndex};
use crate::models::{
    CoverageAnalysis, ImpactResult, LinkType, RankedRequirement, Requirement,
    RequirementPriority, RequirementType, TestCase, TraceLink, TraceabilityMatrix,
};

/// Maintains the requirement/test-case graph for any number of projects
pub struct TraceabilityEngine {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    config: TraceConfig,
    /// Serializes matrix builds per project; readers never take these
    project_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl TraceabilityEngine {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
        config: TraceConfig,
    ) -> Result<Self> {
        if embedder.dimensions() != index.dimensions() {
            return Err(TraceError::DimensionMismatch {
                expected: index.dimensions(),
                actual: embedder.dimensions(),
            });
        }
        Ok(Self {
            embedder,
            index,
            config,
            project_locks: Mutex::new(HashMap::new()),
        })
    }

    pub fn config(&self) -> &TraceConfig {
        &self.config
    }

    fn project_lock(&self, project_id: &str) -> Result<Arc<Mutex<()>>> {
        let mut locks = self
            .project_locks
            .lock()
            .map_err(|_| TraceError::IndexUnavailable("project lock table poisoned".to_string()))?;
        Ok(locks.entry(project_id.to_string()).or_default().clone())
    }

    /// Indexes requirements and test cases, links them and reports coverage
    pub fn build_traceability_matrix(
        &self,
        requirements: &[Requirement],
        test_cases: &[TestCase],
        project_id: &str,
    ) -> Result<TraceabilityMatrix> {
        let lock = self.project_lock(project_id)?;
        let _guard = lock.lock().map_err(|_| {
            TraceError::IndexUnavailable(format!("write lock for project {} poisoned", project_id))
        })?;
        debug!(project_id, "Acquired project write lock");

        let requirement_texts: Vec<&str> = requirements.iter().map(|r| r.embedding_text()).collect();
        let requirement_vectors = self.embedder.embed_batch(&requirement_texts)?;
        let test_case_texts: Vec<String> = test_cases.iter().map(TestCase::embedding_text).collect();
        let test_case_refs: Vec<&str> = test_case_texts.iter().map(String::as_str).collect();
        let test_case_vectors = self.embedder.embed_batch(&test_case_refs)?;

        self.store_requirements(project_id, requirements, &requirement_vectors)?;
        self.store_test_cases(project_id, test_cases, &test_case_vectors, &test_case_texts)?;

        let mut links: Vec<TraceLink> = test_cases
            .iter()
            .filter_map(|tc| tc.requirement_id.map(|rid| TraceLink::direct(rid, tc.id.clone())))
            .collect();
        let direct_pairs: HashSet<(u32, String)> = links
            .iter()
            .map(|l| (l.requirement_id, l.test_case_id.clone()))
            .collect();

        let rebuilt: BTreeSet<u32> = requirements
            .iter()
            .map(|r| r.id)
            .chain(links.iter().map(|l| l.requirement_id))
            .collect();
        self.clear_links(project_id, &rebuilt)?;
        self.store_direct_links(project_id, test_cases, &test_case_vectors, &test_case_texts)?;

        let semantic = self.link_semantically(
            project_id,
            requirements,
            &requirement_vectors,
            test_cases,
            &direct_pairs,
        )?;
        links.extend(semantic);

        let coverage = coverage_analysis(requirements, &links);
        let mut test_cases_by_type: BTreeMap<String, usize> = BTreeMap::new();
        for tc in test_cases {
            *test_cases_by_type.entry(tc.test_type.clone()).or_default() += 1;
        }

        info!(
            project_id,
            requirements = requirements.len(),
            test_cases = test_cases.len(),
            links = links.len(),
            coverage = coverage.coverage_percentage,
            "Built traceability matrix"
        );

        Ok(TraceabilityMatrix {
            project_id: project_id.to_string(),
            requirements: requirements.to_vec(),
            test_cases: test_cases.to_vec(),
            links,
            coverage,
            test_cases_by_type,
            generated_at: Utc::now(),
        })
    }

    fn store_requirements(
        &self,
        project_id: &str,
        requirements: &[Requirement],
        vectors: &[Vec<f32>],
    ) -> Result<()> {
        if requirements.is_empty() {
            return Ok(());
        }
        let entries = requirements
            .iter()
            .zip(vectors)
            .map(|(req, vector)| {
                IndexEntry::new(req.id.to_string(), vector.clone(), req.embedding_text())
                    .with_metadata("requirement_id", req.id)
                    .with_metadata("requirement_type", req.requirement_type.as_str())
                    .with_metadata("priority", req.priority.as_str())
                    .with_metadata("section", req.section.as_str())
                    .with_metadata("quality_score", req.quality_score())
            })
            .collect();
        self.index
            .upsert_batch(project_id, Collection::Requirements, entries)
    }

    fn store_test_cases(
        &self,
        project_id: &str,
        test_cases: &[TestCase],
        vectors: &[Vec<f32>],
        texts: &[String],
    ) -> Result<()> {
        if test_cases.is_empty() {
            return Ok(());
        }
        let entries = test_cases
            .iter()
            .zip(vectors)
            .zip(texts)
            .map(|((tc, vector), text)| {
                let mut entry = IndexEntry::new(tc.id.as_str(), vector.clone(), text.as_str())
                    .with_metadata("test_case_id", tc.id.as_str())
                    .with_metadata("name", tc.name.as_str())
                    .with_metadata("test_type", tc.test_type.as_str())
                    .with_metadata("priority", tc.priority.as_str());
                if let Some(rid) = tc.requirement_id {
                    entry = entry.with_metadata("requirement_id", rid);
                }
                entry
            })
            .collect();
        self.index
            .upsert_batch(project_id, Collection::TestCases, entries)
    }

    /// Drops every persisted link of the given requirements
    fn clear_links(&self, project_id: &str, requirement_ids: &BTreeSet<u32>) -> Result<()> {
        let mut removed = 0;
        for id in requirement_ids {
            let stale = IndexFilter::new().field("requirement_id", *id);
            removed += self.index.delete(project_id, Collection::Links, Some(&stale))?;
        }
        debug!(project_id, removed, "Cleared stale links");
        Ok(())
    }

    fn store_direct_links(
        &self,
        project_id: &str,
        test_cases: &[TestCase],
        vectors: &[Vec<f32>],
        texts: &[String],
    ) -> Result<()> {
        let entries: Vec<IndexEntry> = test_cases
            .iter()
            .zip(vectors)
            .zip(texts)
            .filter_map(|((tc, vector), text)| {
                let rid = tc.requirement_id?;
                Some(
                    IndexEntry::new(format!("{}:{}", rid, tc.id), vector.clone(), text.as_str())
                        .with_metadata("requirement_id", rid)
                        .with_metadata("test_case_id", tc.id.as_str())
                        .with_metadata("link_type", LinkType::Direct.as_str())
                        .with_metadata("similarity_score", 1.0)
                        .with_metadata("confidence", 1.0),
                )
            })
            .collect();
        if entries.is_empty() {
            return Ok(());
        }
        self.index.upsert_batch(project_id, Collection::Links, entries)
    }

    /// Queries nearest test cases per requirement and persists the semantic links
    fn link_semantically(
        &self,
        project_id: &str,
        requirements: &[Requirement],
        vectors: &[Vec<f32>],
        test_cases: &[TestCase],
        direct_pairs: &HashSet<(u32, String)>,
    ) -> Result<Vec<TraceLink>> {
        if test_cases.is_empty() {
            return Ok(Vec::new());
        }

        // Earlier builds may have left test cases this call does not know about
        let current: HashSet<&str> = test_cases.iter().map(|tc| tc.id.as_str()).collect();
        let stored = self.index.count(project_id, Collection::TestCases)?;
        let limit = self.config.top_n + stored.saturating_sub(current.len());

        let mut links = Vec::new();
        let mut entries = Vec::new();
        for (req, vector) in requirements.iter().zip(vectors) {
            let hits = self
                .index
                .query(project_id, Collection::TestCases, vector, limit, None)?;
            for hit in hits
                .into_iter()
                .filter(|hit| current.contains(hit.id.as_str()))
                .take(self.config.top_n)
            {
                let similarity = (1.0 - hit.distance).clamp(0.0, 1.0);
                if similarity <= self.config.semantic_link_threshold
                    || direct_pairs.contains(&(req.id, hit.id.clone()))
                {
                    continue;
                }
                let confidence = (similarity * self.config.confidence_scale).min(1.0);
                let link = TraceLink::semantic(req.id, hit.id.as_str(), similarity, confidence);

                entries.push(
                    IndexEntry::new(
                        format!("{}:{}", req.id, hit.id),
                        vector.clone(),
                        hit.document.as_str(),
                    )
                    .with_metadata("requirement_id", req.id)
                    .with_metadata("test_case_id", hit.id.as_str())
                    .with_metadata("link_type", LinkType::Semantic.as_str())
                    .with_metadata("similarity_score", link.similarity_score)
                    .with_metadata("confidence", link.confidence),
                );
                links.push(link);
            }
        }

        if !entries.is_empty() {
            self.index
                .upsert_batch(project_id, Collection::Links, entries)?;
        }
        debug!(project_id, semantic_links = links.len(), "Persisted semantic links");
        Ok(links)
    }

    /// Test cases affected by a change to one requirement, read from the
    /// links persisted by the latest matrix build
    pub fn find_impact_analysis(&self, requirement_id: u32, project_id: &str) -> Result<ImpactResult> {
        let links_of = |link_type: LinkType| -> Result<Vec<IndexEntry>> {
            let filter = IndexFilter::new()
                .field("requirement_id", requirement_id)
                .field("link_type", link_type.as_str());
            self.index.get(project_id, Collection::Links, Some(&filter))
        };

        let direct: BTreeSet<String> = links_of(LinkType::Direct)?
            .into_iter()
            .filter_map(|entry| linked_test_case(&entry))
            .collect();

        let semantic: BTreeSet<String> = links_of(LinkType::Semantic)?
            .into_iter()
            .filter(|entry| {
                entry
                    .metadata
                    .get("similarity_score")
                    .and_then(Value::as_f64)
                    .is_some_and(|s| s > self.config.impact_threshold)
            })
            .filter_map(|entry| linked_test_case(&entry))
            .collect();

        let impacted: BTreeSet<String> = direct.union(&semantic).cloned().collect();
        Ok(ImpactResult {
            requirement_id,
            direct_impact_count: direct.len(),
            semantic_impact_count: semantic.len(),
            total_impact_count: impacted.len(),
            impacted_test_cases: impacted,
        })
    }

    /// Requirements ranked by similarity to free text; similarity is `1 - distance / 2`
    pub fn semantic_search_requirements(
        &self,
        query: &str,
        project_id: &str,
        top_n: Option<usize>,
    ) -> Result<Vec<RankedRequirement>> {
        let vector = self.embedder.embed(query)?;
        let top_n = top_n.unwrap_or(self.config.search_top_n);
        let hits = self
            .index
            .query(project_id, Collection::Requirements, &vector, top_n, None)?;

        Ok(hits
            .into_iter()
            .map(|hit| {
                let requirement_id = hit
                    .metadata
                    .get("requirement_id")
                    .and_then(Value::as_u64)
                    .and_then(|id| u32::try_from(id).ok())
                    .or_else(|| hit.id.parse().ok())
                    .unwrap_or_default();
                let text_field = |key: &str| hit.metadata.get(key).and_then(Value::as_str);
                RankedRequirement {
                    requirement_id,
                    requirement_type: text_field("requirement_type").and_then(RequirementType::parse),
                    priority: text_field("priority").and_then(RequirementPriority::parse),
                    similarity: (1.0 - hit.distance / 2.0).clamp(0.0, 1.0),
                    text: hit.document,
                }
            })
            .collect())
    }
}

fn linked_test_case(entry: &IndexEntry) -> Option<String> {
    entry
        .metadata
        .get("test_case_id")
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Direct, semantic and combined coverage over the given requirements.
///
/// Links to ids outside `requirements` are ignored, so the percentage stays
/// within [0, 100].
pub fn coverage_analysis(requirements: &[Requirement], links: &[TraceLink]) -> CoverageAnalysis {
    let known: HashSet<u32> = requirements.iter().map(|r| r.id).collect();
    let mut direct: HashSet<u32> = HashSet::new();
    let mut semantic: HashSet<u32> = HashSet::new();
    for link in links.iter().filter(|l| known.contains(&l.requirement_id)) {
        match link.link_type {
            LinkType::Direct => direct.insert(link.requirement_id),
            LinkType::Semantic => semantic.insert(link.requirement_id),
        };
    }

    let covered: HashSet<u32> = direct.union(&semantic).copied().collect();
    let total = known.len();
    let coverage_percentage = if total == 0 {
        0.0
    } else {
        covered.len() as f64 / total as f64 * 100.0
    };

    CoverageAnalysis {
        total_requirements: total,
        direct_coverage: direct.len(),
        semantic_coverage: semantic.len(),
        total_coverage: covered.len(),
        coverage_percentage,
        uncovered_requirements: requirements
            .iter()
            .map(|r| r.id)
            .filter(|id| !covered.contains(id))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashingEmbedder;
    use crate::index::InMemoryIndex;
    use crate::models::{QualityScores, RequirementFormat};

    fn requirement(id: u32, text: &str) -> Requirement {
        Requirement {
            id,
            original_text: text.to_string(),
            cleaned_text: text.to_string(),
            requirement_type: RequirementType::Functional,
            priority: RequirementPriority::High,
            scores: QualityScores::new(0.2, 0.0, 0.5, 0.8),
            entities: Vec::new(),
            key_phrases: Vec::new(),
            dependencies: Vec::new(),
            risks: Vec::new(),
            format_detected: RequirementFormat::Prose,
            section: "main".to_string(),
            metadata: BTreeMap::new(),
        }
    }

    fn engine() -> TraceabilityEngine {
        TraceabilityEngine::new(
            Arc::new(HashingEmbedder::new(384)),
            Arc::new(InMemoryIndex::new(384)),
            TraceConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_dimension_mismatch_rejected() {
        let result = TraceabilityEngine::new(
            Arc::new(HashingEmbedder::new(64)),
            Arc::new(InMemoryIndex::new(32)),
            TraceConfig::default(),
        );
        assert!(matches!(result, Err(TraceError::DimensionMismatch { .. })));
    }

    #[test]
    fn test_coverage_empty_is_zero() {
        let coverage = coverage_analysis(&[], &[TraceLink::direct(1, "TC-1")]);
        assert_eq!(coverage.total_requirements, 0);
        assert_eq!(coverage.coverage_percentage, 0.0);
    }

    #[test]
    fn test_coverage_counts_union() {
        let reqs = vec![
            requirement(1, "a"),
            requirement(2, "b"),
            requirement(3, "c"),
            requirement(4, "d"),
        ];
        let links = vec![
            TraceLink::direct(1, "TC-1"),
            TraceLink::semantic(1, "TC-2", 0.9, 1.0),
            TraceLink::semantic(2, "TC-2", 0.4, 0.6),
            TraceLink::direct(99, "TC-3"),
        ];
        let coverage = coverage_analysis(&reqs, &links);
        assert_eq!(coverage.direct_coverage, 1);
        assert_eq!(coverage.semantic_coverage, 2);
        assert_eq!(coverage.total_coverage, 2);
        assert_eq!(coverage.coverage_percentage, 50.0);
        assert_eq!(coverage.uncovered_requirements, vec![3, 4]);
    }

    #[test]
    fn test_direct_link_and_impact() {
        let engine = engine();
        let reqs = vec![requirement(1, "The system shall allow users to log in.")];
        let tcs = vec![TestCase::new("TC-1", "Verify user login with valid credentials").for_requirement(1)];

        let matrix = engine.build_traceability_matrix(&reqs, &tcs, "p1").unwrap();
        let direct: Vec<&TraceLink> = matrix
            .links
            .iter()
            .filter(|l| l.link_type == LinkType::Direct)
            .collect();
        assert_eq!(direct.len(), 1);
        assert_eq!(direct[0].confidence, 1.0);
        assert_eq!(matrix.coverage.total_coverage, 1);
        assert_eq!(matrix.test_cases_by_type.get("positive"), Some(&1));

        let impact = engine.find_impact_analysis(1, "p1").unwrap();
        assert_eq!(impact.direct_impact_count, 1);
        assert_eq!(impact.semantic_impact_count, 0);
        assert_eq!(impact.total_impact_count, 1);
        assert!(impact.impacted_test_cases.contains("TC-1"));
    }

    #[test]
    fn test_semantic_links_respect_threshold() {
        let engine = engine();
        let reqs = vec![requirement(1, "Export monthly sales reports as CSV files")];
        let tcs = vec![
            TestCase::new("TC-1", "Export monthly sales reports as CSV files"),
            TestCase::new("TC-2", "Password reset email arrives"),
        ];
        let matrix = engine.build_traceability_matrix(&reqs, &tcs, "p1").unwrap();
        let semantic: Vec<&TraceLink> = matrix
            .links
            .iter()
            .filter(|l| l.link_type == LinkType::Semantic)
            .collect();
        assert_eq!(semantic.len(), 1);
        assert_eq!(semantic[0].test_case_id, "TC-1");
        assert!(semantic[0].similarity_score > 0.99);
        assert_eq!(semantic[0].confidence, 1.0);
        assert_eq!(matrix.coverage.semantic_coverage, 1);

        let impact = engine.find_impact_analysis(1, "p1").unwrap();
        assert_eq!(impact.semantic_impact_count, 1);
        assert_eq!(impact.direct_impact_count, 0);
    }

    #[test]
    fn test_rebuild_replaces_stale_links() {
        let engine = engine();
        let reqs = vec![requirement(1, "Export monthly sales reports as CSV files")];
        let first = vec![TestCase::new("TC-1", "Export monthly sales reports as CSV files")];
        engine.build_traceability_matrix(&reqs, &first, "p1").unwrap();

        let second = vec![TestCase::new("TC-2", "Password reset email arrives")];
        let matrix = engine.build_traceability_matrix(&reqs, &second, "p1").unwrap();
        assert!(matrix.links.is_empty());
        assert_eq!(matrix.coverage.total_coverage, 0);
        assert_eq!(engine.find_impact_analysis(1, "p1").unwrap().total_impact_count, 0);
    }

    #[test]
    fn test_rebuild_drops_direct_links_not_reasserted() {
        let engine = engine();
        let reqs = vec![requirement(1, "The system shall allow users to log in.")];
        let first = vec![TestCase::new("TC-1", "Verify login with valid credentials").for_requirement(1)];
        engine.build_traceability_matrix(&reqs, &first, "p1").unwrap();
        assert_eq!(engine.find_impact_analysis(1, "p1").unwrap().direct_impact_count, 1);

        let second = vec![TestCase::new("TC-9", "Quarterly invoice archive rotation")];
        let matrix = engine.build_traceability_matrix(&reqs, &second, "p1").unwrap();
        assert_eq!(matrix.coverage.direct_coverage, 0);

        let impact = engine.find_impact_analysis(1, "p1").unwrap();
        assert_eq!(impact.direct_impact_count, 0);
        assert!(impact.impacted_test_cases.is_empty());
    }

    #[test]
    fn test_semantic_search_ranks_requirements() {
        let engine = engine();
        let reqs = vec![
            requirement(1, "Users can reset their password by email"),
            requirement(2, "Export monthly sales reports as CSV files"),
        ];
        engine.build_traceability_matrix(&reqs, &[], "p1").unwrap();

        let results = engine
            .semantic_search_requirements("monthly sales reports", "p1", None)
            .unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].requirement_id, 2);
        assert_eq!(results[0].requirement_type, Some(RequirementType::Functional));
        assert_eq!(results[0].priority, Some(RequirementPriority::High));
        assert!(results[0].similarity > results[1].similarity);
        assert!(results.iter().all(|r| (0.0..=1.0).contains(&r.similarity)));

        let limited = engine
            .semantic_search_requirements("monthly sales reports", "p1", Some(1))
            .unwrap();
        assert_eq!(limited.len(), 1);
    }

    #[test]
    fn test_projects_do_not_share_links() {
        let engine = engine();
        let reqs = vec![requirement(1, "Export monthly sales reports as CSV files")];
        let tcs = vec![TestCase::new("TC-1", "Export monthly sales reports as CSV files")];
        engine.build_traceability_matrix(&reqs, &tcs, "p1").unwrap();

        let impact = engine.find_impact_analysis(1, "p2").unwrap();
        assert_eq!(impact.total_impact_count, 0);
    }
}
