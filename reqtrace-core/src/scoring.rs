//! Requirement scoring
//!
//! Turns deduplicated candidates into complete [`Requirement`] records:
//! type, priority, the four component scores, entities, key phrases,
//! dependency tags and risk flags. Scoring never fails. When the linguistic
//! pipeline is unavailable, entities and key phrases come back empty and
//! every numeric score is still computed.

use rayon::prelude::*;
use regex::Regex;
use std::sync::{Arc, LazyLock};
use tracing::{debug, warn};

use crate::models::{
    round_to, Entity, QualityScores, Requirement, RequirementCandidate, RequirementFormat,
    RequirementPriority, RequirementType, RiskTag,
};
use crate::nlp::{Analysis, LinguisticPipeline};
use crate::patterns::{self, count_term, count_terms};

/// Keyword lists per category. Order breaks ties.
const TYPE_KEYWORDS: &[(RequirementType, &[&str])] = &[
    (
        RequirementType::Security,
        &[
            "security", "secure", "authentication", "authenticate", "authorization", "authorize",
            "encrypt", "encrypted", "encryption", "password", "passwords", "permission",
            "permissions", "access control", "login", "audit", "ssl", "tls", "token", "privacy",
            "two-factor",
        ],
    ),
    (
        RequirementType::Performance,
        &[
            "performance", "fast", "speed", "response time", "latency", "throughput", "seconds",
            "milliseconds", "ms", "concurrent", "scalability", "scalable", "capacity", "uptime",
            "availability", "load",
        ],
    ),
    (
        RequirementType::Ui,
        &[
            "interface", "user interface", "ui", "screen", "button", "page", "layout", "form",
            "menu", "dashboard", "click", "navigation", "display",
        ],
    ),
    (
        RequirementType::Data,
        &[
            "data", "database", "record", "records", "storage", "store", "backup", "field",
            "fields", "retention", "archive",
        ],
    ),
    (
        RequirementType::Integration,
        &[
            "integration", "integrate", "api", "third-party", "external system", "import",
            "export", "sync", "synchronize", "webhook",
        ],
    ),
    (
        RequirementType::Reporting,
        &[
            "report", "reports", "reporting", "chart", "charts", "analytics", "summary",
            "metrics", "statistics",
        ],
    ),
    (
        RequirementType::Business,
        &[
            "business", "revenue", "cost", "customer", "customers", "policy", "compliance",
            "regulation", "invoice", "billing", "payment",
        ],
    ),
];

/// Priority indicator words, strongest level first
const PRIORITY_INDICATORS: &[(RequirementPriority, &[&str])] = &[
    (
        RequirementPriority::Critical,
        &["must", "critical", "mandatory", "essential", "vital", "required"],
    ),
    (
        RequirementPriority::High,
        &["shall", "important", "high priority"],
    ),
    (RequirementPriority::Medium, &["should", "medium priority"]),
    (
        RequirementPriority::Low,
        &["may", "could", "optional", "nice to have", "low priority"],
    ),
];

const CLAUSE_WORDS: &[&str] = &["and", "or", "but", "which", "that", "while", "whereas"];

const CONDITIONALS: &[&str] = &[
    "if", "when", "unless", "whenever", "provided that", "in case", "otherwise", "except",
];

const VAGUE_TERMS: &[&str] = &[
    "appropriate", "adequate", "reasonable", "user-friendly", "easy", "simple", "fast", "quick",
    "efficient", "flexible", "robust", "intuitive", "seamless", "good", "better", "approximately",
    "normally", "usually", "typically", "generally", "possibly", "maybe", "probably", "may",
    "might",
    "etc", "and so on", "if possible", "as needed", "as appropriate", "state-of-the-art",
];

const VAGUE_QUANTIFIERS: &[&str] = &[
    "several", "many", "few", "some", "various", "numerous", "most", "a lot of", "lots of",
    "a number of", "sufficient", "enough", "large", "small",
];

const PRECISION_PHRASES: &[&str] = &[
    "exactly", "within", "at least", "at most", "no more than", "no less than", "less than",
    "greater than", "more than", "maximum", "minimum", "between", "every", "each", "only",
];

const MEASURABLE_UNITS: &[&str] = &[
    "ms", "millisecond", "milliseconds", "second", "seconds", "minute", "minutes", "hour",
    "hours", "day", "days", "%", "percent", "kb", "mb", "gb", "tb", "users", "requests",
    "transactions", "characters", "digits", "times", "attempts",
];

const CLARITY_MODALS: &[&str] = &["shall", "must", "will"];

const COMPONENT_NOUNS: &[&str] = &["system", "database", "api", "service", "module", "component"];

const DEPENDENCY_ENTITY_LABELS: &[&str] = &["ORG", "PRODUCT", "PERSON"];

const MAX_KEY_PHRASES: usize = 5;

static NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d+(?:[.,]\d+)?\b").expect("valid regex"));

static PERCENT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d\s?%").expect("valid regex"));

/// Completes requirement records from candidates
#[derive(Clone)]
pub struct RequirementScorer {
    pipeline: Arc<dyn LinguisticPipeline>,
}

impl RequirementScorer {
    pub fn new(pipeline: Arc<dyn LinguisticPipeline>) -> Self {
        Self { pipeline }
    }

    /// Scores candidates in parallel, assigning ids 1..=n in input order
    pub fn score_all(&self, candidates: Vec<RequirementCandidate>) -> Vec<Requirement> {
        let scored: Vec<(Requirement, bool)> = candidates
            .into_par_iter()
            .enumerate()
            .map(|(i, candidate)| {
                let id = u32::try_from(i + 1).unwrap_or(u32::MAX);
                self.score_inner(id, candidate)
            })
            .collect();

        let degraded = scored.iter().filter(|(_, degraded)| *degraded).count();
        if degraded > 0 {
            warn!(
                pipeline = self.pipeline.name(),
                degraded,
                "Linguistic pipeline unavailable, entities and key phrases left empty"
            );
        }
        scored.into_iter().map(|(requirement, _)| requirement).collect()
    }

    pub fn score(&self, id: u32, candidate: RequirementCandidate) -> Requirement {
        let (requirement, degraded) = self.score_inner(id, candidate);
        if degraded {
            warn!(
                pipeline = self.pipeline.name(),
                id, "Linguistic pipeline unavailable, entities and key phrases left empty"
            );
        }
        requirement
    }

    fn score_inner(&self, id: u32, candidate: RequirementCandidate) -> (Requirement, bool) {
        let text = if candidate.cleaned_text.trim().is_empty() {
            candidate.text.as_str()
        } else {
            candidate.cleaned_text.as_str()
        };
        let lower = text.to_lowercase();

        let (analysis, degraded) = match self.pipeline.analyze(text) {
            Ok(analysis) => (analysis, false),
            Err(e) => {
                debug!(id, error = %e, "Pipeline analysis failed");
                (Analysis::default(), true)
            }
        };

        let complexity = complexity_score(text, &lower);
        let ambiguity = ambiguity_score(&lower);
        let specificity = specificity_score(text, &lower);
        let testability = testability_score(&lower, specificity, ambiguity);
        let scores = QualityScores::new(complexity, ambiguity, specificity, testability);

        let requirement = Requirement {
            id,
            original_text: candidate.text.clone(),
            cleaned_text: candidate.cleaned_text.clone(),
            requirement_type: classify_type(&lower),
            priority: determine_priority(
                candidate.raw_metadata.get("priority").map(String::as_str),
                &lower,
            ),
            scores,
            key_phrases: analysis
                .noun_phrases
                .iter()
                .take(MAX_KEY_PHRASES)
                .cloned()
                .collect(),
            dependencies: find_dependencies(&lower, &analysis.entities, &candidate),
            risks: assess_risks(&scores),
            entities: analysis.entities,
            format_detected: detect_format(&candidate),
            section: candidate.section,
            metadata: candidate.raw_metadata,
        };
        (requirement, degraded)
    }
}

/// Category with the most keyword hits; `functional` when nothing matches
pub fn classify_type(lower: &str) -> RequirementType {
    let mut best = RequirementType::Functional;
    let mut best_hits = 0;
    for (kind, keywords) in TYPE_KEYWORDS {
        let hits = count_terms(lower, keywords);
        if hits > best_hits {
            best = *kind;
            best_hits = hits;
        }
    }
    best
}

/// Declared priority when it names a level, otherwise the strongest indicator word
pub fn determine_priority(declared: Option<&str>, lower: &str) -> RequirementPriority {
    if let Some(priority) = declared.and_then(RequirementPriority::parse) {
        return priority;
    }
    PRIORITY_INDICATORS
        .iter()
        .find(|(_, words)| words.iter().any(|w| count_term(lower, w) > 0))
        .map(|(priority, _)| *priority)
        .unwrap_or_default()
}

pub fn complexity_score(text: &str, lower: &str) -> f64 {
    let words = text.split_whitespace().count() as f64;
    let clause_markers =
        (text.matches([',', ';']).count() + count_terms(lower, CLAUSE_WORDS)) as f64;
    let conditionals = count_terms(lower, CONDITIONALS) as f64;

    let parts = [
        (words / 50.0).min(1.0),
        (clause_markers / 3.0).min(1.0),
        (conditionals / 2.0).min(1.0),
    ];
    round_to(parts.iter().sum::<f64>() / 3.0, 3)
}

pub fn ambiguity_score(lower: &str) -> f64 {
    let hits = count_terms(lower, VAGUE_TERMS) + count_terms(lower, VAGUE_QUANTIFIERS);
    round_to((hits as f64 / 5.0).min(1.0), 3)
}

pub fn specificity_score(text: &str, lower: &str) -> f64 {
    let indicators = (NUMBER.find_iter(text).count() + count_terms(lower, PRECISION_PHRASES)) as f64;
    let units = (count_terms(lower, MEASURABLE_UNITS) + PERCENT.find_iter(text).count()) as f64;
    round_to(((0.6 * indicators + 0.4 * units) / 8.0).min(1.0), 3)
}

pub fn testability_score(lower: &str, specificity: f64, ambiguity: f64) -> f64 {
    let clarity = (count_terms(lower, CLARITY_MODALS) as f64 / 3.0).min(1.0);
    round_to((specificity + clarity + (1.0 - ambiguity)) / 3.0, 3)
}

pub fn assess_risks(scores: &QualityScores) -> Vec<RiskTag> {
    let mut risks = Vec::new();
    if scores.ambiguity() > 0.7 {
        risks.push(RiskTag::HighAmbiguity);
    }
    if scores.complexity() > 0.8 {
        risks.push(RiskTag::HighComplexity);
    }
    if scores.testability() < 0.3 {
        risks.push(RiskTag::LowTestability);
    }
    if scores.ambiguity() > 0.5 && scores.complexity() > 0.6 {
        risks.push(RiskTag::HighInterpretationRisk);
    }
    risks
}

/// Component nouns, named entities and cross-referenced requirement ids
fn find_dependencies(
    lower: &str,
    entities: &[Entity],
    candidate: &RequirementCandidate,
) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    let mut push = |tag: String| {
        if !tags.contains(&tag) {
            tags.push(tag);
        }
    };

    for noun in COMPONENT_NOUNS {
        let plural = format!("{}s", noun);
        if count_term(lower, noun) > 0 || count_term(lower, &plural) > 0 {
            push(format!("component:{}", noun));
        }
    }
    for entity in entities {
        if DEPENDENCY_ENTITY_LABELS.contains(&entity.label.as_str()) {
            push(format!("{}:{}", entity.label.to_lowercase(), entity.text));
        }
    }
    for id in patterns::find_requirement_ids(&candidate.text) {
        if id.id != candidate.source_id && !id.anchor {
            push(format!("requirement:{}", id.id));
        }
    }
    tags
}

fn detect_format(candidate: &RequirementCandidate) -> RequirementFormat {
    if patterns::USER_STORY.is_match(&candidate.cleaned_text) {
        RequirementFormat::UserStory
    } else if patterns::is_table_row(candidate.text.trim()) {
        RequirementFormat::Tabular
    } else {
        candidate.strategy.implied_format()
    }
}
