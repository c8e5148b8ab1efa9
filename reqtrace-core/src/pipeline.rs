//! Requirement extraction pipeline
//!
//! Text flows through normalization, structure analysis, the extraction
//! strategies, embedding deduplication and finally scoring. Ids are assigned
//! only after deduplication, so they are dense and follow document order.

use std::sync::Arc;
use tracing::{debug, info};

use crate::config::{DedupConfig, EngineConfig, ExtractionConfig};
use crate::dedup::Deduplicator;
use crate::embedding::{Embedder, HashingEmbedder};
use crate::errors::Result;
use crate::extract::CandidateExtractor;
use crate::models::Requirement;
use crate::nlp::{HeuristicPipeline, LinguisticPipeline};
use crate::preprocess::{is_effectively_empty, normalize_text};
use crate::report::ExtractionReport;
use crate::scoring::RequirementScorer;
use crate::structure::{analyze_structure, DocumentMetadata};

/// Turns requirement documents into scored, deduplicated requirements
pub struct RequirementExtractor {
    embedder: Arc<dyn Embedder>,
    extractor: CandidateExtractor,
    scorer: RequirementScorer,
    dedup: DedupConfig,
}

impl RequirementExtractor {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        pipeline: Arc<dyn LinguisticPipeline>,
        extraction: ExtractionConfig,
        dedup: DedupConfig,
    ) -> Self {
        Self {
            embedder,
            extractor: CandidateExtractor::new(extraction),
            scorer: RequirementScorer::new(pipeline),
            dedup,
        }
    }

    /// Built-in embedder and linguistic pipeline, sized and tuned by `config`
    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(
            Arc::new(HashingEmbedder::new(config.embedding_dimensions)),
            Arc::new(HeuristicPipeline),
            config.extraction.clone(),
            config.dedup.clone(),
        )
    }

    pub fn embedder(&self) -> Arc<dyn Embedder> {
        Arc::clone(&self.embedder)
    }

    /// Extracts requirements; empty input yields an empty list
    pub fn extract_requirements(&self, text: &str) -> Result<Vec<Requirement>> {
        Ok(self.extract_with_report(text)?.requirements)
    }

    /// Extracts requirements and reports how the run went
    pub fn extract_with_report(&self, text: &str) -> Result<ExtractionReport> {
        if is_effectively_empty(text) {
            debug!("Input is empty, nothing to extract");
            return Ok(ExtractionReport::empty(DocumentMetadata::default()));
        }

        let normalized = normalize_text(text);
        let structure = analyze_structure(&normalized, self.extractor.config().min_section_line_chars);
        let document = structure.metadata(&normalized);

        let set = self.extractor.extract(&normalized, &structure);
        let candidates_before_dedup = set.len();

        let unique = Deduplicator::new(self.embedder.as_ref(), self.dedup.similarity_threshold)
            .dedup(set.candidates)?;
        let requirements = self.scorer.score_all(unique);

        info!(
            sections = document.section_count,
            candidates = candidates_before_dedup,
            requirements = requirements.len(),
            fallback = set.fallback_used,
            "Extracted requirements"
        );

        Ok(ExtractionReport::new(
            document,
            set.yields,
            set.fallback_used,
            candidates_before_dedup,
            requirements,
        ))
    }
}

impl Default for RequirementExtractor {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}
