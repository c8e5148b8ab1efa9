use std::collections::BTreeMap;
use std::sync::Arc;

use reqtrace_core::{
    EngineConfig, ExtractionStrategy, HeuristicPipeline, RequirementCandidate, RequirementExtractor,
    RequirementFormat, RequirementPriority, RequirementScorer, RequirementType,
};

fn candidate(text: &str) -> RequirementCandidate {
    RequirementCandidate {
        source_id: "pattern-1".to_string(),
        text: text.to_string(),
        cleaned_text: text.to_string(),
        strategy: ExtractionStrategy::LinguisticPattern,
        section: "main".to_string(),
        raw_metadata: BTreeMap::new(),
    }
}

#[test]
fn test_inline_numbered_list() {
    let extractor = RequirementExtractor::default();
    let reqs = extractor
        .extract_requirements(
            "1. The system shall allow users to log in. 2. The system must encrypt passwords.",
        )
        .unwrap();

    assert_eq!(reqs.len(), 2);
    assert!(reqs[0].cleaned_text.contains("log in"));
    assert_eq!(reqs[1].requirement_type, RequirementType::Security);
    assert_eq!(reqs[1].priority, RequirementPriority::Critical);
    assert!(reqs.iter().all(|r| (0.0..=1.0).contains(&r.quality_score())));
}

#[test]
fn test_empty_document() {
    let extractor = RequirementExtractor::default();
    assert!(extractor.extract_requirements("").unwrap().is_empty());
}

#[test]
fn test_formal_document_with_metadata() {
    let text = "# Functional Requirements\n\
REQ-001: The system shall export monthly sales reports as CSV files.\n\
Priority: Low\n\
REQ-002: The system must lock an account after 5 failed login attempts.\n";

    let extractor = RequirementExtractor::from_config(&EngineConfig::default());
    let report = extractor.extract_with_report(text).unwrap();
    let reqs = &report.requirements;

    assert!(!report.fallback_used);
    assert_eq!(reqs.len(), 2);
    assert!(reqs[0].cleaned_text.contains("export monthly sales reports"));
    assert_eq!(reqs[0].priority, RequirementPriority::Low);
    assert_eq!(reqs[0].format_detected, RequirementFormat::Formal);
    assert_eq!(reqs[0].section, "Functional Requirements");
    assert_eq!(reqs[1].priority, RequirementPriority::Critical);
    assert!(report.document.formats.contains(&RequirementFormat::Formal));
}

#[test]
fn test_vague_wording_scores_worse() {
    let scorer = RequirementScorer::new(Arc::new(HeuristicPipeline));
    let vague = scorer.score(1, candidate("The system may approximately handle several users."));
    let clear = scorer.score(
        2,
        candidate("The system shall handle at least 500 concurrent users within 2 seconds."),
    );

    assert_eq!(vague.scores.ambiguity(), 0.6);
    assert!(vague.scores.testability() < clear.scores.testability());
    assert!(vague.quality_score() < clear.quality_score());
}

#[test]
fn test_outline_headed_document() {
    let text = "2.1 Reporting Module\n\
The system shall export monthly reports to CSV.\n\
\n\
2.2 Security Controls\n\
The system must encrypt stored passwords with AES.";

    let reqs = RequirementExtractor::default().extract_requirements(text).unwrap();
    let cleaned: Vec<&str> = reqs.iter().map(|r| r.cleaned_text.as_str()).collect();
    assert_eq!(
        cleaned,
        vec![
            "The system shall export monthly reports to CSV.",
            "The system must encrypt stored passwords with AES."
        ]
    );
    assert_eq!(reqs[0].section, "2.1 Reporting Module");
    assert_eq!(reqs[1].section, "2.2 Security Controls");
}
