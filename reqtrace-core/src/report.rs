//! Extraction run reports
//!
//! A report wraps the requirements of one run with what produced them:
//! document figures, per-strategy yields, and an aggregate quality picture.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::models::{round_to, ExtractionStrategy, Requirement};
use crate::structure::DocumentMetadata;

/// Aggregate quality figures over a requirement set
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QualitySummary {
    pub total: usize,
    /// Mean quality score, rounded to 3 places; 0 for an empty set
    pub average_quality: f64,
    pub average_ambiguity: f64,
    pub average_testability: f64,
    pub by_type: BTreeMap<String, usize>,
    pub by_priority: BTreeMap<String, usize>,
    pub by_risk: BTreeMap<String, usize>,
    /// Ids of requirements carrying at least one risk tag
    pub flagged: Vec<u32>,
}

impl QualitySummary {
    pub fn from_requirements(requirements: &[Requirement]) -> Self {
        let mut summary = QualitySummary {
            total: requirements.len(),
            ..Default::default()
        };
        if requirements.is_empty() {
            return summary;
        }

        let mut quality = 0.0;
        let mut ambiguity = 0.0;
        let mut testability = 0.0;
        for req in requirements {
            quality += req.quality_score();
            ambiguity += req.scores.ambiguity();
            testability += req.scores.testability();

            *summary
                .by_type
                .entry(req.requirement_type.as_str().to_string())
                .or_default() += 1;
            *summary
                .by_priority
                .entry(req.priority.as_str().to_string())
                .or_default() += 1;
            for risk in &req.risks {
                *summary.by_risk.entry(risk.as_str().to_string()).or_default() += 1;
            }
            if !req.risks.is_empty() {
                summary.flagged.push(req.id);
            }
        }

        let n = requirements.len() as f64;
        summary.average_quality = round_to(quality / n, 3);
        summary.average_ambiguity = round_to(ambiguity / n, 3);
        summary.average_testability = round_to(testability / n, 3);
        summary
    }
}

/// Everything one extraction run produced
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionReport {
    pub run_id: Uuid,
    pub processed_at: DateTime<Utc>,
    pub document: DocumentMetadata,
    /// Candidates each strategy emitted before deduplication
    pub strategy_yields: BTreeMap<ExtractionStrategy, usize>,
    pub fallback_used: bool,
    pub candidates_before_dedup: usize,
    pub requirements: Vec<Requirement>,
    pub quality_summary: QualitySummary,
}

impl ExtractionReport {
    pub fn new(
        document: DocumentMetadata,
        strategy_yields: BTreeMap<ExtractionStrategy, usize>,
        fallback_used: bool,
        candidates_before_dedup: usize,
        requirements: Vec<Requirement>,
    ) -> Self {
        let quality_summary = QualitySummary::from_requirements(&requirements);
        Self {
            run_id: Uuid::new_v4(),
            processed_at: Utc::now(),
            document,
            strategy_yields,
            fallback_used,
            candidates_before_dedup,
            requirements,
            quality_summary,
        }
    }

    /// A report for input with nothing to extract
    pub fn empty(document: DocumentMetadata) -> Self {
        Self::new(document, BTreeMap::new(), false, 0, Vec::new())
    }

    /// Candidates removed as near-duplicates
    pub fn duplicates_removed(&self) -> usize {
        self.candidates_before_dedup
            .saturating_sub(self.requirements.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        QualityScores, RequirementFormat, RequirementPriority, RequirementType, RiskTag,
    };

    fn requirement(id: u32, kind: RequirementType, scores: QualityScores, risks: Vec<RiskTag>) -> Requirement {
        Requirement {
            id,
            original_text: "text".to_string(),
            cleaned_text: "text".to_string(),
            requirement_type: kind,
            priority: RequirementPriority::High,
            scores,
            entities: Vec::new(),
            key_phrases: Vec::new(),
            dependencies: Vec::new(),
            risks,
            format_detected: RequirementFormat::Prose,
            section: "main".to_string(),
            metadata: BTreeMap::new(),
        }
    }

    #[test]
    fn test_summary_of_nothing() {
        let summary = QualitySummary::from_requirements(&[]);
        assert_eq!(summary.total, 0);
        assert_eq!(summary.average_quality, 0.0);
        assert!(summary.by_type.is_empty());
    }

    #[test]
    fn test_summary_breakdowns() {
        let reqs = vec![
            requirement(1, RequirementType::Security, QualityScores::new(0.0, 0.0, 1.0, 1.0), vec![]),
            requirement(
                2,
                RequirementType::Security,
                QualityScores::new(1.0, 1.0, 0.0, 0.0),
                vec![RiskTag::HighAmbiguity, RiskTag::LowTestability],
            ),
            requirement(3, RequirementType::Data, QualityScores::new(0.0, 0.0, 0.0, 0.0), vec![]),
        ];
        let summary = QualitySummary::from_requirements(&reqs);

        assert_eq!(summary.total, 3);
        assert_eq!(summary.by_type.get("security"), Some(&2));
        assert_eq!(summary.by_type.get("data"), Some(&1));
        assert_eq!(summary.by_priority.get("high"), Some(&3));
        assert_eq!(summary.by_risk.get("high_ambiguity"), Some(&1));
        assert_eq!(summary.flagged, vec![2]);
        // qualities 1.0, 0.0, 0.5
        assert_eq!(summary.average_quality, 0.5);
    }

    #[test]
    fn test_report_counts_duplicates() {
        let mut yields = BTreeMap::new();
        yields.insert(ExtractionStrategy::NumberedList, 2);
        yields.insert(ExtractionStrategy::LinguisticPattern, 2);
        let report = ExtractionReport::new(
            DocumentMetadata::default(),
            yields,
            true,
            4,
            vec![requirement(1, RequirementType::Functional, QualityScores::default(), vec![])],
        );
        assert_eq!(report.duplicates_removed(), 3);
        assert_eq!(report.quality_summary.total, 1);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["strategy_yields"]["numbered_list"], 2);
    }

    #[test]
    fn test_empty_reports_have_distinct_ids() {
        let a = ExtractionReport::empty(DocumentMetadata::default());
        let b = ExtractionReport::empty(DocumentMetadata::default());
        assert_ne!(a.run_id, b.run_id);
        assert!(a.requirements.is_empty());
    }
}
