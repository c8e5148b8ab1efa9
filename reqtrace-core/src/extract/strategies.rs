//! The five candidate extraction strategies
//!
//! Every strategy is independent: it reads the normalized text and the
//! analyzed structure, and returns candidates in document order. Strategies
//! never fail; malformed input simply yields fewer candidates.

use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;

use crate::config::ExtractionConfig;
use crate::models::{ExtractionStrategy, RequirementCandidate};
use crate::patterns::{self, header_level, prose_segments, split_sentences, NUMBERED_MARKER};
use crate::structure::DocumentStructure;

use super::filter::{clean_candidate, split_metadata, CandidateFilter};

/// Section name used when a candidate precedes every header
pub const DEFAULT_SECTION: &str = "main";

static DESCRIPTION_LABEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*description\s*:").expect("valid regex"));

static SECTION_TITLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)requirement|functional|specification").expect("valid regex")
});

static OBLIGATION_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)\b(?:shall|must|should|will)\s+\w+",
        r"(?i)\b(?:is|are)\s+required\s+to\b",
        r"(?i)\bneeds?\s+to\b",
        r"(?i)\b(?:has|have)\s+to\b",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid regex"))
    .collect()
});

static SUBJECT_KEYWORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:system|application|software|platform|service|users?|administrators?|customers?|operators?|shall|must|should|will|needs?|required)\b",
    )
    .expect("valid regex")
});

static ACTION_VERB: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:allow|provide|support|display|enable|generate|store|validate|send|create|update|delete|process|manage|calculate|notify|export|import|track|log|record|encrypt|authenticate|access|view|search|upload|download|submit|approve|receive|handle|integrate|maintain|prevent|restrict|respond|check|verify|show)(?:s|es|ed|d|ing)?\b",
    )
    .expect("valid regex")
});

/// Inputs shared by all strategies for one document
pub struct ExtractionContext<'a> {
    pub text: &'a str,
    pub structure: &'a DocumentStructure,
    pub filter: &'a CandidateFilter,
    pub config: &'a ExtractionConfig,
}

impl ExtractionContext<'_> {
    fn section_at(&self, offset: usize) -> String {
        self.structure
            .section_at(offset)
            .unwrap_or(DEFAULT_SECTION)
            .to_string()
    }
}

/// One way of finding requirement candidates in a document
pub trait CandidateStrategy: Send + Sync {
    fn kind(&self) -> ExtractionStrategy;

    fn extract(&self, ctx: &ExtractionContext<'_>) -> Vec<RequirementCandidate>;
}

/// Requirements introduced by identifiers such as "REQ-001" or "3.1.2"
#[derive(Debug, Default, Clone, Copy)]
pub struct FormalIdStrategy;

impl CandidateStrategy for FormalIdStrategy {
    fn kind(&self) -> ExtractionStrategy {
        ExtractionStrategy::FormalId
    }

    fn extract(&self, ctx: &ExtractionContext<'_>) -> Vec<RequirementCandidate> {
        let anchors: Vec<_> = patterns::find_requirement_ids(ctx.text)
            .into_iter()
            .filter(|m| m.anchor)
            .collect();

        let mut candidates = Vec::new();
        for (i, anchor) in anchors.iter().enumerate() {
            let limit = anchors.get(i + 1).map_or(ctx.text.len(), |next| next.start);
            if limit <= anchor.end {
                continue;
            }
            let raw = &ctx.text[anchor.end..limit];
            let body = &raw[..body_extent(raw)];

            let (content, mut metadata) = split_metadata(trim_separator(body));
            let content = lift_title(&content, &mut metadata);
            let cleaned = clean_candidate(&content);
            if !ctx.filter.passes_structure(&cleaned) {
                continue;
            }

            candidates.push(RequirementCandidate {
                source_id: anchor.id.clone(),
                text: ctx.text[anchor.start..anchor.end + body.len()].trim().to_string(),
                cleaned_text: cleaned,
                strategy: self.kind(),
                section: ctx.section_at(anchor.start),
                raw_metadata: metadata,
            });
        }
        candidates
    }
}

/// Items introduced by "<int>. " markers
#[derive(Debug, Default, Clone, Copy)]
pub struct NumberedListStrategy;

impl CandidateStrategy for NumberedListStrategy {
    fn kind(&self) -> ExtractionStrategy {
        ExtractionStrategy::NumberedList
    }

    fn extract(&self, ctx: &ExtractionContext<'_>) -> Vec<RequirementCandidate> {
        // (start of the number, start of the item body)
        let markers: Vec<(usize, usize)> = NUMBERED_MARKER
            .captures_iter(ctx.text)
            .filter_map(|caps| {
                let number = caps.get(1)?;
                let whole = caps.get(0)?;
                Some((number.start(), whole.end()))
            })
            .collect();

        let mut candidates = Vec::new();
        for (i, &(number_start, body_start)) in markers.iter().enumerate() {
            let limit = markers.get(i + 1).map_or(ctx.text.len(), |next| next.0);
            if limit <= body_start {
                continue;
            }
            let raw = &ctx.text[body_start..limit];
            let body = &raw[..body_extent(raw)];

            let (content, metadata) = split_metadata(body);
            let cleaned = clean_candidate(&content);
            if !ctx.filter.passes_structure(&cleaned) {
                continue;
            }

            candidates.push(RequirementCandidate {
                source_id: format!("numbered-{}", candidates.len() + 1),
                text: ctx.text[number_start..body_start + body.len()].trim().to_string(),
                cleaned_text: cleaned,
                strategy: self.kind(),
                section: ctx.section_at(number_start),
                raw_metadata: metadata,
            });
        }
        candidates
    }
}

/// Sentences inside sections titled as requirements or specifications
#[derive(Debug, Default, Clone, Copy)]
pub struct SectionBasedStrategy;

impl CandidateStrategy for SectionBasedStrategy {
    fn kind(&self) -> ExtractionStrategy {
        ExtractionStrategy::SectionBased
    }

    fn extract(&self, ctx: &ExtractionContext<'_>) -> Vec<RequirementCandidate> {
        let mut candidates = Vec::new();
        for section in &ctx.structure.sections {
            if !SECTION_TITLE.is_match(&section.title) {
                continue;
            }
            for segment in prose_segments(&section.text()) {
                for sentence in split_sentences(&segment.text) {
                    let cleaned = clean_candidate(&sentence);
                    if !ctx.filter.is_valid(&cleaned) {
                        continue;
                    }
                    candidates.push(RequirementCandidate {
                        source_id: format!("section-{}", candidates.len() + 1),
                        text: sentence,
                        cleaned_text: cleaned,
                        strategy: self.kind(),
                        section: section.title.clone(),
                        raw_metadata: BTreeMap::new(),
                    });
                }
            }
        }
        candidates
    }
}

/// Sentences phrased as obligations ("shall", "must", "needs to", ...)
#[derive(Debug, Default, Clone, Copy)]
pub struct LinguisticPatternStrategy;

impl CandidateStrategy for LinguisticPatternStrategy {
    fn kind(&self) -> ExtractionStrategy {
        ExtractionStrategy::LinguisticPattern
    }

    fn extract(&self, ctx: &ExtractionContext<'_>) -> Vec<RequirementCandidate> {
        sentence_candidates(ctx, self.kind(), "pattern", |sentence| {
            OBLIGATION_PATTERNS.iter().any(|re| re.is_match(sentence))
        })
    }
}

/// Last resort for documents without explicit requirement markers
#[derive(Debug, Default, Clone, Copy)]
pub struct SemanticFallbackStrategy;

impl CandidateStrategy for SemanticFallbackStrategy {
    fn kind(&self) -> ExtractionStrategy {
        ExtractionStrategy::SemanticFallback
    }

    fn extract(&self, ctx: &ExtractionContext<'_>) -> Vec<RequirementCandidate> {
        let min = ctx.config.fallback_min_sentence_chars;
        let max = ctx.config.fallback_max_sentence_chars;
        sentence_candidates(ctx, self.kind(), "fallback", |sentence| {
            let len = sentence.chars().count();
            (min..=max).contains(&len)
                && SUBJECT_KEYWORD.is_match(sentence)
                && ACTION_VERB.is_match(sentence)
        })
    }
}

/// Splits the whole document into sentences and keeps the ones `accept`
/// selects and the full validity filter passes
fn sentence_candidates<F>(
    ctx: &ExtractionContext<'_>,
    strategy: ExtractionStrategy,
    id_prefix: &str,
    accept: F,
) -> Vec<RequirementCandidate>
where
    F: Fn(&str) -> bool,
{
    let mut candidates = Vec::new();
    for segment in prose_segments(ctx.text) {
        let section = ctx.section_at(segment.offset);
        for sentence in split_sentences(&segment.text) {
            if !accept(&sentence) {
                continue;
            }
            let cleaned = clean_candidate(&sentence);
            if !ctx.filter.is_valid(&cleaned) {
                continue;
            }
            candidates.push(RequirementCandidate {
                source_id: format!("{}-{}", id_prefix, candidates.len() + 1),
                text: sentence,
                cleaned_text: cleaned,
                strategy,
                section: section.clone(),
                raw_metadata: BTreeMap::new(),
            });
        }
    }
    candidates
}

/// Byte length of the body that belongs to an identifier or list marker.
///
/// The body ends at a blank line once content has been seen, or at the
/// next header line.
fn body_extent(raw: &str) -> usize {
    let mut consumed = 0;
    let mut seen_content = false;

    for (i, line) in raw.split_inclusive('\n').enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            if seen_content {
                break;
            }
        } else if i > 0 && header_level(trimmed).is_some() {
            break;
        } else {
            seen_content = true;
        }
        consumed += line.len();
    }
    consumed
}

/// Moves a title line that precedes a "Description:" line into the metadata
fn lift_title(content: &str, metadata: &mut BTreeMap<String, String>) -> String {
    let lines: Vec<&str> = content.lines().collect();
    match lines.iter().position(|line| DESCRIPTION_LABEL.is_match(line)) {
        Some(idx) if idx > 0 => {
            let title = trim_separator(&lines[..idx].join(" ")).to_string();
            if !title.is_empty() {
                metadata.entry("title".to_string()).or_insert(title);
            }
            lines[idx..].join("\n")
        }
        _ => content.to_string(),
    }
}

/// Drops the ":" / "-" / ")" that separates an identifier from its body
fn trim_separator(raw: &str) -> &str {
    raw.trim_start_matches(|c: char| matches!(c, ':' | '-' | ')' | '.') || c.is_whitespace())
        .trim_end()
}
