use std::sync::Arc;

use reqtrace_core::{
    Collection, HashingEmbedder, InMemoryIndex, LinkType, RequirementExtractor, SqliteIndex,
    TestCase, TraceConfig, TraceabilityEngine, VectorIndex,
};
use tempfile::TempDir;
use tracing_subscriber::{fmt, EnvFilter};

fn init_logging() {
    let _ = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

const DOCUMENT: &str =
    "1. The system shall allow users to log in. 2. The system must encrypt passwords.";

#[test]
fn test_direct_link_covers_requirement() {
    init_logging();
    let extractor = RequirementExtractor::default();
    let reqs = extractor.extract_requirements(DOCUMENT).unwrap();
    let login = reqs[..1].to_vec();

    let engine = TraceabilityEngine::new(
        extractor.embedder(),
        Arc::new(InMemoryIndex::new(384)),
        TraceConfig::default(),
    )
    .unwrap();
    let tests = vec![TestCase::new("TC-1", "Verify login with valid credentials").for_requirement(login[0].id)];

    let matrix = engine.build_traceability_matrix(&login, &tests, "shop").unwrap();
    assert_eq!(matrix.coverage.total_requirements, 1);
    assert_eq!(matrix.coverage.total_coverage, 1);
    assert_eq!(matrix.coverage.coverage_percentage, 100.0);
    assert!(matrix
        .links_for(login[0].id)
        .any(|l| l.link_type == LinkType::Direct && l.test_case_id == "TC-1"));

    let impact = engine.find_impact_analysis(login[0].id, "shop").unwrap();
    assert_eq!(impact.direct_impact_count, 1);
    assert_eq!(impact.semantic_impact_count, 0);
}

#[test]
fn test_matrix_persists_in_sqlite() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("index.db");
    let extractor = RequirementExtractor::default();
    let reqs = extractor.extract_requirements(DOCUMENT).unwrap();
    let tests = vec![
        TestCase::new("TC-1", "The system must encrypt passwords").with_test_type("security"),
        TestCase::new("TC-2", "Quarterly invoice archive rotation"),
    ];

    {
        let index = Arc::new(SqliteIndex::open(&path, 384).unwrap());
        let engine =
            TraceabilityEngine::new(extractor.embedder(), index, TraceConfig::default()).unwrap();
        let matrix = engine.build_traceability_matrix(&reqs, &tests, "shop").unwrap();

        assert_eq!(matrix.test_cases_by_type.get("security"), Some(&1));
        assert!(matrix
            .links
            .iter()
            .any(|l| l.link_type == LinkType::Semantic && l.requirement_id == reqs[1].id && l.test_case_id == "TC-1"));
        assert!(matrix.coverage.semantic_coverage >= 1);
    }

    // A fresh engine over the same file answers from persisted state
    let index = Arc::new(SqliteIndex::open(&path, 384).unwrap());
    assert_eq!(index.count("shop", Collection::Requirements).unwrap(), 2);
    assert_eq!(index.count("shop", Collection::TestCases).unwrap(), 2);

    let engine = TraceabilityEngine::new(
        Arc::new(HashingEmbedder::default()),
        index,
        TraceConfig::default(),
    )
    .unwrap();
    let impact = engine.find_impact_analysis(reqs[1].id, "shop").unwrap();
    assert_eq!(impact.semantic_impact_count, 1);
    assert!(impact.impacted_test_cases.contains("TC-1"));

    let ranked = engine
        .semantic_search_requirements("encrypt passwords", "shop", Some(1))
        .unwrap();
    assert_eq!(ranked.len(), 1);
    assert_eq!(ranked[0].requirement_id, reqs[1].id);
}

#[test]
fn test_search_in_unknown_project_is_empty() {
    let engine = TraceabilityEngine::new(
        Arc::new(HashingEmbedder::default()),
        Arc::new(InMemoryIndex::new(384)),
        TraceConfig::default(),
    )
    .unwrap();
    assert!(engine
        .semantic_search_requirements("anything", "nowhere", None)
        .unwrap()
        .is_empty());
}
