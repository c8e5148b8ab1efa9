//! Multi-strategy candidate extraction
//!
//! Strategies one through four always run. The semantic fallback runs only
//! when they produce fewer candidates than the configured floor; that rule
//! lives in [`fallback_required`] so it can be tested on its own.

pub mod filter;
pub mod strategies;

use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::config::ExtractionConfig;
use crate::models::{ExtractionStrategy, RequirementCandidate};
use crate::structure::DocumentStructure;

pub use filter::{clean_candidate, has_requirement_indicator, split_metadata, CandidateFilter};
pub use strategies::{
    CandidateStrategy, ExtractionContext, FormalIdStrategy, LinguisticPatternStrategy,
    NumberedListStrategy, SectionBasedStrategy, SemanticFallbackStrategy, DEFAULT_SECTION,
};

/// Returns true when the primary strategies found too little to trust
pub fn fallback_required(primary_yield: usize, floor: usize) -> bool {
    primary_yield < floor
}

/// Candidates from one document together with per-strategy yields
#[derive(Debug, Clone, Default)]
pub struct CandidateSet {
    /// Candidates in strategy order, then document order
    pub candidates: Vec<RequirementCandidate>,
    pub yields: BTreeMap<ExtractionStrategy, usize>,
    pub fallback_used: bool,
}

impl CandidateSet {
    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}

/// Runs the extraction strategies over one analyzed document
pub struct CandidateExtractor {
    primary: Vec<Box<dyn CandidateStrategy>>,
    fallback: Box<dyn CandidateStrategy>,
    filter: CandidateFilter,
    config: ExtractionConfig,
}

impl CandidateExtractor {
    pub fn new(config: ExtractionConfig) -> Self {
        Self {
            primary: vec![
                Box::new(FormalIdStrategy),
                Box::new(NumberedListStrategy),
                Box::new(SectionBasedStrategy),
                Box::new(LinguisticPatternStrategy),
            ],
            fallback: Box::new(SemanticFallbackStrategy),
            filter: CandidateFilter::new(&config),
            config,
        }
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    pub fn extract(&self, text: &str, structure: &DocumentStructure) -> CandidateSet {
        let ctx = ExtractionContext {
            text,
            structure,
            filter: &self.filter,
            config: &self.config,
        };

        let mut set = CandidateSet::default();
        for strategy in &self.primary {
            let found = strategy.extract(&ctx);
            debug!(strategy = %strategy.kind(), count = found.len(), "Strategy finished");
            set.yields.insert(strategy.kind(), found.len());
            set.candidates.extend(found);
        }

        if fallback_required(set.candidates.len(), self.config.fallback_floor) {
            let found = self.fallback.extract(&ctx);
            info!(
                primary = set.candidates.len(),
                floor = self.config.fallback_floor,
                fallback = found.len(),
                "Primary strategies below floor, ran semantic fallback"
            );
            set.yields.insert(self.fallback.kind(), found.len());
            set.candidates.extend(found);
            set.fallback_used = true;
        }

        set
    }
}

impl Default for CandidateExtractor {
    fn default() -> Self {
        Self::new(ExtractionConfig::default())
    }
}
