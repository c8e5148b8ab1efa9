pub mod config;
pub mod dedup;
pub mod embedding;
pub mod errors;
pub mod extract;
pub mod index;
pub mod models;
pub mod nlp;
pub mod patterns;
pub mod pipeline;
pub mod preprocess;
pub mod report;
pub mod scoring;
pub mod structure;
pub mod trace;

// Re-export commonly used types
pub use config::{
    default_config_path, default_index_path, get_config_dir, DedupConfig, EngineConfig,
    ExtractionConfig, TraceConfig,
};
pub use dedup::Deduplicator;
pub use embedding::{cosine_similarity, Embedder, HashingEmbedder};
pub use errors::{Result, TraceError};
pub use extract::{fallback_required, CandidateExtractor, CandidateSet, CandidateStrategy};
pub use index::{
    Collection, InMemoryIndex, IndexEntry, IndexFilter, QueryHit, SqliteIndex, VectorIndex,
};
pub use models::{
    CoverageAnalysis, Entity, ExtractionStrategy, ImpactResult, LinkType, QualityScores,
    RankedRequirement, Requirement, RequirementCandidate, RequirementFormat, RequirementPriority,
    RequirementType, RiskTag, TestCase, TraceLink, TraceabilityMatrix,
};
pub use nlp::{Analysis, HeuristicPipeline, LinguisticPipeline, UnavailablePipeline};
pub use pipeline::RequirementExtractor;
pub use report::{ExtractionReport, QualitySummary};
pub use scoring::RequirementScorer;
pub use structure::{analyze_structure, DocumentMetadata, DocumentStructure, Section};
pub use trace::{coverage_analysis, TraceabilityEngine};
