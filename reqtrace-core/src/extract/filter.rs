//! Candidate validity filter, text cleaning and inline metadata parsing

use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;

use crate::config::ExtractionConfig;
use crate::patterns::{self, METADATA_LINE};

static HEADING_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(?:#{1,6}\s|[-=_*]{3,}\s*$)").expect("valid regex"));

static REQUIREMENT_INDICATOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:shall|must|should|will|required|requires|needs?\s+to|has\s+to|have\s+to|the\s+(?:system|application|software|platform|service|solution)|users?\s+(?:can|should|must|may)|able\s+to|allows?|provides?|supports?|enables?|i\s+want)\b",
    )
    .expect("valid regex")
});

/// Leading list markers, formal ids and metadata labels stripped during cleaning
static LEADING_NOISE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^\s*(?:\*\*|__|\d{1,3}[.)]\s+|[-*+>]\s+|\(?[a-z]\)\s+|\[R-\d+\]\s*[:.)-]?\s*|(?:REQ|FR|NFR|BR|UC)-\d+\s*[:.)-]?\s*|requirement\s+\d+\s*[:.)-]?\s*|\d+(?:\.\d+)+\s*[:.)-]?\s*|(?:description|requirement|details|statement|text|summary|title)\s*:\s*)",
    )
    .expect("valid regex")
});

/// The shared gate every strategy's output must pass
#[derive(Debug, Clone)]
pub struct CandidateFilter {
    min_chars: usize,
    min_words: usize,
}

impl CandidateFilter {
    pub fn new(config: &ExtractionConfig) -> Self {
        Self {
            min_chars: config.min_candidate_chars,
            min_words: config.min_candidate_words,
        }
    }

    /// Length, metadata-line and word-count checks
    pub fn passes_structure(&self, text: &str) -> bool {
        let trimmed = text.trim();
        if trimmed.chars().count() < self.min_chars {
            return false;
        }
        if METADATA_LINE.is_match(trimmed)
            || patterns::is_table_row(trimmed)
            || HEADING_MARKER.is_match(trimmed)
        {
            return false;
        }
        trimmed.split_whitespace().count() >= self.min_words
    }

    /// Structural checks plus the requirement-indicator requirement
    pub fn is_valid(&self, text: &str) -> bool {
        self.passes_structure(text) && has_requirement_indicator(text)
    }
}

impl Default for CandidateFilter {
    fn default() -> Self {
        Self::new(&ExtractionConfig::default())
    }
}

pub fn has_requirement_indicator(text: &str) -> bool {
    REQUIREMENT_INDICATOR.is_match(text)
}

/// Strips list markers, id prefixes and metadata labels from every line,
/// collapses whitespace and guarantees terminal punctuation.
pub fn clean_candidate(text: &str) -> String {
    let joined = text
        .lines()
        .map(strip_leading_noise)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    let mut cleaned = joined
        .trim()
        .trim_end_matches(|c: char| c == '*' || c == '_')
        .trim_end()
        .to_string();
    if cleaned.is_empty() {
        return cleaned;
    }

    match cleaned.chars().last() {
        Some('.') | Some('!') | Some('?') => {}
        Some(':') | Some(';') | Some(',') => {
            cleaned.pop();
            cleaned.push('.');
        }
        _ => cleaned.push('.'),
    }
    cleaned
}

fn strip_leading_noise(line: &str) -> String {
    let mut current: String = line.split_whitespace().collect::<Vec<_>>().join(" ");
    loop {
        let stripped = LEADING_NOISE.replace(&current, "").into_owned();
        if stripped == current || stripped.trim().is_empty() {
            return current;
        }
        current = stripped;
    }
}

/// Separates inline metadata from a requirement body.
///
/// Whole "Key: value" lines are removed and recorded under the lowercased
/// key; a trailing "Priority: High" inside a content line is lifted out too.
pub fn split_metadata(body: &str) -> (String, BTreeMap<String, String>) {
    let mut metadata = BTreeMap::new();
    let mut kept: Vec<String> = Vec::new();

    for line in body.lines() {
        if let Some(caps) = METADATA_LINE.captures(line) {
            let value = caps[2].trim();
            if !value.is_empty() {
                metadata
                    .entry(caps[1].to_lowercase())
                    .or_insert_with(|| value.to_string());
            }
            continue;
        }

        if let Some(caps) = patterns::INLINE_PRIORITY.captures(line) {
            metadata
                .entry("priority".to_string())
                .or_insert_with(|| caps[1].to_lowercase());
            kept.push(patterns::INLINE_PRIORITY.replace(line, "").into_owned());
            continue;
        }

        kept.push(line.to_string());
    }

    (kept.join("\n").trim().to_string(), metadata)
}
