use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Represents the category a requirement was classified into
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum RequirementType {
    Functional,
    NonFunctional,
    Security,
    Performance,
    Ui,
    Data,
    Integration,
    Reporting,
    Business,
}

impl RequirementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequirementType::Functional => "functional",
            RequirementType::NonFunctional => "non_functional",
            RequirementType::Security => "security",
            RequirementType::Performance => "performance",
            RequirementType::Ui => "ui",
            RequirementType::Data => "data",
            RequirementType::Integration => "integration",
            RequirementType::Reporting => "reporting",
            RequirementType::Business => "business",
        }
    }

    /// Parse a type label such as "Non-Functional" or "security"
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().replace(['-', ' '], "_").as_str() {
            "functional" => Some(RequirementType::Functional),
            "non_functional" | "nonfunctional" => Some(RequirementType::NonFunctional),
            "security" => Some(RequirementType::Security),
            "performance" => Some(RequirementType::Performance),
            "ui" | "user_interface" => Some(RequirementType::Ui),
            "data" => Some(RequirementType::Data),
            "integration" => Some(RequirementType::Integration),
            "reporting" => Some(RequirementType::Reporting),
            "business" => Some(RequirementType::Business),
            _ => None,
        }
    }
}

impl Default for RequirementType {
    fn default() -> Self {
        RequirementType::Functional
    }
}

impl fmt::Display for RequirementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Represents the priority of a requirement
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum RequirementPriority {
    Critical,
    High,
    Medium,
    Low,
}

impl RequirementPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequirementPriority::Critical => "critical",
            RequirementPriority::High => "high",
            RequirementPriority::Medium => "medium",
            RequirementPriority::Low => "low",
        }
    }

    /// Parse a declared priority label, case-insensitively
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "critical" => Some(RequirementPriority::Critical),
            "high" => Some(RequirementPriority::High),
            "medium" => Some(RequirementPriority::Medium),
            "low" => Some(RequirementPriority::Low),
            _ => None,
        }
    }
}

impl Default for RequirementPriority {
    fn default() -> Self {
        RequirementPriority::Medium
    }
}

impl fmt::Display for RequirementPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Layout signal found in a document or attributed to a single requirement
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum RequirementFormat {
    Formal,
    Numbered,
    UserStory,
    Tabular,
    /// Free prose; never reported at document level
    Prose,
}

impl RequirementFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequirementFormat::Formal => "formal",
            RequirementFormat::Numbered => "numbered",
            RequirementFormat::UserStory => "user_story",
            RequirementFormat::Tabular => "tabular",
            RequirementFormat::Prose => "prose",
        }
    }
}

impl fmt::Display for RequirementFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The extraction strategy that produced a candidate
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionStrategy {
    FormalId,
    NumberedList,
    SectionBased,
    LinguisticPattern,
    SemanticFallback,
}

impl ExtractionStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractionStrategy::FormalId => "formal_id",
            ExtractionStrategy::NumberedList => "numbered_list",
            ExtractionStrategy::SectionBased => "section_based",
            ExtractionStrategy::LinguisticPattern => "linguistic_pattern",
            ExtractionStrategy::SemanticFallback => "semantic_fallback",
        }
    }

    /// The requirement format implied by the strategy alone
    pub fn implied_format(&self) -> RequirementFormat {
        match self {
            ExtractionStrategy::FormalId => RequirementFormat::Formal,
            ExtractionStrategy::NumberedList => RequirementFormat::Numbered,
            _ => RequirementFormat::Prose,
        }
    }
}

impl fmt::Display for ExtractionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Unvalidated requirement text emitted by one extraction strategy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequirementCandidate {
    /// Strategy-assigned identifier (e.g. "REQ-001" or "numbered-3"); not final
    pub source_id: String,
    /// Verbatim span the strategy captured
    pub text: String,
    pub cleaned_text: String,
    pub strategy: ExtractionStrategy,
    /// Name of the originating section
    pub section: String,
    /// Key/value pairs parsed from inline metadata lines
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub raw_metadata: BTreeMap<String, String>,
}

/// A named-entity span reported by the linguistic pipeline
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Entity {
    pub text: String,
    pub label: String,
}

impl Entity {
    pub fn new(text: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            label: label.into(),
        }
    }
}

/// Risk flags raised by the scorer
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum RiskTag {
    HighAmbiguity,
    HighComplexity,
    LowTestability,
    HighInterpretationRisk,
}

impl RiskTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskTag::HighAmbiguity => "high_ambiguity",
            RiskTag::HighComplexity => "high_complexity",
            RiskTag::LowTestability => "low_testability",
            RiskTag::HighInterpretationRisk => "high_interpretation_risk",
        }
    }
}

impl fmt::Display for RiskTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

const COMPLEXITY_WEIGHT: f64 = 0.2;
const AMBIGUITY_WEIGHT: f64 = 0.3;
const TESTABILITY_WEIGHT: f64 = 0.3;
const SPECIFICITY_WEIGHT: f64 = 0.2;

/// Rounds a score to the given number of decimal places
pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

/// The four component scores as they appear on the wire
#[derive(Debug, Clone, Copy, Deserialize)]
struct ScoreComponents {
    complexity: f64,
    ambiguity: f64,
    specificity: f64,
    testability: f64,
}

impl From<ScoreComponents> for QualityScores {
    fn from(c: ScoreComponents) -> Self {
        QualityScores::new(c.complexity, c.ambiguity, c.specificity, c.testability)
    }
}

/// Component scores plus the quality score derived from them.
///
/// Fields are private so that `quality_score` can only ever be the weighted
/// composite of the components; deserialization recomputes it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "ScoreComponents")]
pub struct QualityScores {
    complexity: f64,
    ambiguity: f64,
    specificity: f64,
    testability: f64,
    quality_score: f64,
}

impl QualityScores {
    /// Builds the score set, clamping every component into [0, 1]
    pub fn new(complexity: f64, ambiguity: f64, specificity: f64, testability: f64) -> Self {
        let complexity = clamp_unit(complexity);
        let ambiguity = clamp_unit(ambiguity);
        let specificity = clamp_unit(specificity);
        let testability = clamp_unit(testability);

        let quality = COMPLEXITY_WEIGHT * (1.0 - complexity)
            + AMBIGUITY_WEIGHT * (1.0 - ambiguity)
            + TESTABILITY_WEIGHT * testability
            + SPECIFICITY_WEIGHT * specificity;

        Self {
            complexity,
            ambiguity,
            specificity,
            testability,
            quality_score: clamp_unit(round_to(quality, 2)),
        }
    }

    pub fn complexity(&self) -> f64 {
        self.complexity
    }

    pub fn ambiguity(&self) -> f64 {
        self.ambiguity
    }

    pub fn specificity(&self) -> f64 {
        self.specificity
    }

    pub fn testability(&self) -> f64 {
        self.testability
    }

    pub fn quality_score(&self) -> f64 {
        self.quality_score
    }
}

impl Default for QualityScores {
    fn default() -> Self {
        Self::new(0.0, 0.0, 0.0, 0.0)
    }
}

fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// A deduplicated, scored requirement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Requirement {
    /// Sequential identifier, unique within one processing run
    pub id: u32,

    pub original_text: String,

    pub cleaned_text: String,

    pub requirement_type: RequirementType,

    pub priority: RequirementPriority,

    /// Complexity, ambiguity, specificity, testability and the derived quality score
    pub scores: QualityScores,

    #[serde(default)]
    pub entities: Vec<Entity>,

    /// Ordered noun phrases, at most five
    #[serde(default)]
    pub key_phrases: Vec<String>,

    /// Symbolic dependency tags such as "component:database"
    #[serde(default)]
    pub dependencies: Vec<String>,

    #[serde(default)]
    pub risks: Vec<RiskTag>,

    pub format_detected: RequirementFormat,

    pub section: String,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

impl Requirement {
    pub fn quality_score(&self) -> f64 {
        self.scores.quality_score()
    }

    /// Text used when embedding this requirement
    pub fn embedding_text(&self) -> &str {
        if self.cleaned_text.trim().is_empty() {
            &self.original_text
        } else {
            &self.cleaned_text
        }
    }
}

/// An externally generated test case
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCase {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_result: Option<String>,
    pub test_type: String,
    pub priority: String,
    /// Present only when the generator linked the test to a requirement explicitly
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requirement_id: Option<u32>,
}

impl TestCase {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: None,
            expected_result: None,
            test_type: "positive".to_string(),
            priority: "medium".to_string(),
            requirement_id: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_expected_result(mut self, expected: impl Into<String>) -> Self {
        self.expected_result = Some(expected.into());
        self
    }

    pub fn with_test_type(mut self, test_type: impl Into<String>) -> Self {
        self.test_type = test_type.into();
        self
    }

    pub fn for_requirement(mut self, requirement_id: u32) -> Self {
        self.requirement_id = Some(requirement_id);
        self
    }

    /// Name, description and expected result joined for embedding
    pub fn embedding_text(&self) -> String {
        let mut parts = vec![self.name.as_str()];
        if let Some(description) = &self.description {
            parts.push(description);
        }
        if let Some(expected) = &self.expected_result {
            parts.push(expected);
        }
        parts
            .into_iter()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// How a trace link was established
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum LinkType {
    /// From an explicit requirement reference on the test case
    Direct,
    /// Inferred from embedding similarity
    Semantic,
}

impl LinkType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkType::Direct => "direct",
            LinkType::Semantic => "semantic",
        }
    }
}

impl fmt::Display for LinkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An edge between a requirement and a test case
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceLink {
    pub requirement_id: u32,
    pub test_case_id: String,
    pub link_type: LinkType,
    pub similarity_score: f64,
    pub confidence: f64,
}

impl TraceLink {
    /// A direct link always carries similarity and confidence of 1.0
    pub fn direct(requirement_id: u32, test_case_id: impl Into<String>) -> Self {
        Self {
            requirement_id,
            test_case_id: test_case_id.into(),
            link_type: LinkType::Direct,
            similarity_score: 1.0,
            confidence: 1.0,
        }
    }

    pub fn semantic(
        requirement_id: u32,
        test_case_id: impl Into<String>,
        similarity: f64,
        confidence: f64,
    ) -> Self {
        Self {
            requirement_id,
            test_case_id: test_case_id.into(),
            link_type: LinkType::Semantic,
            similarity_score: clamp_unit(similarity),
            confidence: clamp_unit(confidence),
        }
    }
}

/// Coverage statistics over one requirement set
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CoverageAnalysis {
    pub total_requirements: usize,
    pub direct_coverage: usize,
    pub semantic_coverage: usize,
    pub total_coverage: usize,
    pub coverage_percentage: f64,
    pub uncovered_requirements: Vec<u32>,
}

/// Derived snapshot of requirements, test cases and the links between them
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceabilityMatrix {
    pub project_id: String,
    pub requirements: Vec<Requirement>,
    pub test_cases: Vec<TestCase>,
    pub links: Vec<TraceLink>,
    pub coverage: CoverageAnalysis,
    pub test_cases_by_type: BTreeMap<String, usize>,
    pub generated_at: DateTime<Utc>,
}

impl TraceabilityMatrix {
    /// Links attached to one requirement
    pub fn links_for(&self, requirement_id: u32) -> impl Iterator<Item = &TraceLink> {
        self.links
            .iter()
            .filter(move |l| l.requirement_id == requirement_id)
    }
}

/// Test cases potentially affected by a change to one requirement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpactResult {
    pub requirement_id: u32,
    pub direct_impact_count: usize,
    pub semantic_impact_count: usize,
    pub total_impact_count: usize,
    /// Combined unique test case ids, sorted
    pub impacted_test_cases: BTreeSet<String>,
}

/// A requirement returned by semantic search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedRequirement {
    pub requirement_id: u32,
    pub text: String,
    pub requirement_type: Option<RequirementType>,
    pub priority: Option<RequirementPriority>,
    pub similarity: f64,
}
