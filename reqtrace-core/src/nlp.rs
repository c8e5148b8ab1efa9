//! Linguistic analysis used by the scorer
//!
//! The scorer only needs named entities and noun phrases. Any NLP backend can
//! sit behind [`LinguisticPipeline`]; [`HeuristicPipeline`] is a rule-based
//! implementation that needs no model files.

use regex::Regex;
use std::sync::LazyLock;

use crate::errors::{Result, TraceError};
use crate::models::Entity;

/// Entities and noun phrases found in one text
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Analysis {
    pub entities: Vec<Entity>,
    /// Noun phrases in order of first appearance, without duplicates
    pub noun_phrases: Vec<String>,
}

pub trait LinguisticPipeline: Send + Sync {
    fn name(&self) -> &str;

    fn analyze(&self, text: &str) -> Result<Analysis>;
}

static MONEY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)[$€£]\s?\d[\d,]*(?:\.\d+)?|\b\d[\d,]*(?:\.\d+)?\s?(?:usd|eur|gbp|dollars|euros)\b")
        .expect("valid regex")
});

static QUANTITY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b\d+(?:\.\d+)?\s?(?:%|percent|ms|milliseconds?|seconds?|minutes?|hours?|days?|kb|mb|gb|tb|users|requests|transactions|records)(?:\b|$)",
    )
    .expect("valid regex")
});

static ACRONYM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[A-Z][A-Z0-9]{1,9}\b").expect("valid regex"));

static CAPITALIZED_SPAN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b[A-Z][a-z0-9]+(?:[ \t]+[A-Z][a-z0-9]+)*\b").expect("valid regex")
});

/// Uppercase tokens that are identifiers or emphasis rather than names
const ACRONYM_EXCLUDES: &[&str] = &[
    "REQ", "FR", "NFR", "BR", "UC", "ID", "TBD", "NA", "OK", "SHALL", "MUST", "SHOULD", "MAY",
    "NOT",
];

const PRODUCT_ACRONYMS: &[&str] = &[
    "API", "REST", "SQL", "CSV", "PDF", "JSON", "XML", "HTTP", "HTTPS", "SSO", "LDAP", "SMS",
    "UI", "AWS", "SAP", "CRM", "ERP",
];

const ORG_SUFFIXES: &[&str] = &[
    "Inc", "Corp", "Corporation", "Ltd", "LLC", "Bank", "Team", "Department", "Agency",
    "Group", "Company", "University",
];

const PERSON_TITLES: &[&str] = &["Mr", "Mrs", "Ms", "Dr"];

/// Words that end a noun phrase
const PHRASE_BREAKS: &[&str] = &[
    "a", "an", "the", "this", "that", "these", "those", "each", "every", "all", "any", "some",
    "shall", "must", "should", "will", "may", "can", "could", "would", "might", "not", "be",
    "is", "are", "was", "were", "been", "being", "has", "have", "had", "do", "does", "to",
    "of", "in", "on", "at", "by", "for", "with", "from", "into", "within", "via", "after",
    "before", "during", "and", "or", "but", "if", "when", "while", "unless", "so", "than",
    "as", "it", "they", "their", "its", "them", "which", "who", "whom", "where", "allow",
    "allows", "provide", "provides", "support", "supports", "display", "displays", "enable",
    "enables", "generate", "generates", "store", "stores", "validate", "validates", "send",
    "sends", "create", "creates", "update", "updates", "delete", "deletes", "process",
    "processes", "manage", "manages", "export", "exports", "import", "imports", "encrypt",
    "encrypts", "log", "logs", "respond", "responds", "receive", "receives", "handle",
    "handles", "view", "reset", "access", "need", "needs", "want", "required", "able",
];

const MAX_PHRASE_WORDS: usize = 4;

/// Rule-based entity tagging and noun-phrase chunking
#[derive(Debug, Default, Clone, Copy)]
pub struct HeuristicPipeline;

impl HeuristicPipeline {
    fn entities(&self, text: &str) -> Vec<Entity> {
        let mut entities: Vec<Entity> = Vec::new();
        let mut push = |entity: Entity| {
            if !entities.contains(&entity) {
                entities.push(entity);
            }
        };

        for m in MONEY.find_iter(text) {
            push(Entity::new(m.as_str().trim(), "MONEY"));
        }
        for m in QUANTITY.find_iter(text) {
            push(Entity::new(m.as_str().trim(), "QUANTITY"));
        }
        for m in ACRONYM.find_iter(text) {
            let token = m.as_str();
            if ACRONYM_EXCLUDES.contains(&token) || token.chars().all(|c| c.is_ascii_digit()) {
                continue;
            }
            let label = if PRODUCT_ACRONYMS.contains(&token) {
                "PRODUCT"
            } else {
                "ORG"
            };
            push(Entity::new(token, label));
        }
        for m in CAPITALIZED_SPAN.find_iter(text) {
            if starts_sentence(text, m.start()) {
                continue;
            }
            if let Some(label) = classify_span(text, m.start(), m.as_str()) {
                push(Entity::new(m.as_str(), label));
            }
        }
        entities
    }

    fn noun_phrases(&self, text: &str) -> Vec<String> {
        let mut phrases: Vec<String> = Vec::new();
        for clause in text.split(|c: char| matches!(c, '.' | ',' | ';' | ':' | '!' | '?' | '(' | ')')) {
            let mut current: Vec<String> = Vec::new();
            for word in clause.split_whitespace() {
                let word = word
                    .trim_matches(|c: char| !c.is_alphanumeric() && c != '-')
                    .to_lowercase();
                if word.is_empty() || PHRASE_BREAKS.contains(&word.as_str()) {
                    take_phrase(&mut current, &mut phrases);
                    continue;
                }
                current.push(word);
                if current.len() == MAX_PHRASE_WORDS {
                    take_phrase(&mut current, &mut phrases);
                }
            }
            take_phrase(&mut current, &mut phrases);
        }
        phrases
    }
}

impl LinguisticPipeline for HeuristicPipeline {
    fn name(&self) -> &str {
        "heuristic"
    }

    fn analyze(&self, text: &str) -> Result<Analysis> {
        Ok(Analysis {
            entities: self.entities(text),
            noun_phrases: self.noun_phrases(text),
        })
    }
}

/// A pipeline whose backend could not be loaded; every call fails
#[derive(Debug, Clone)]
pub struct UnavailablePipeline {
    reason: String,
}

impl UnavailablePipeline {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl LinguisticPipeline for UnavailablePipeline {
    fn name(&self) -> &str {
        "unavailable"
    }

    fn analyze(&self, _text: &str) -> Result<Analysis> {
        Err(TraceError::PipelineUnavailable(self.reason.clone()))
    }
}

fn take_phrase(current: &mut Vec<String>, phrases: &mut Vec<String>) {
    if current.is_empty() {
        return;
    }
    let phrase = current.join(" ");
    current.clear();
    let substantive = phrase.chars().filter(|c| c.is_alphabetic()).count() >= 3;
    if substantive && !phrases.contains(&phrase) {
        phrases.push(phrase);
    }
}

fn starts_sentence(text: &str, start: usize) -> bool {
    let before = text[..start].trim_end_matches([' ', '\t']);
    if before.is_empty() || before.ends_with('\n') {
        return true;
    }
    if before.ends_with('.') {
        // "Dr. Jane Smith" continues the sentence
        let token = before
            .trim_end_matches('.')
            .rsplit(char::is_whitespace)
            .next()
            .unwrap_or_default();
        return !PERSON_TITLES.contains(&token);
    }
    before.ends_with(['!', '?', ':'])
}

fn classify_span(text: &str, start: usize, span: &str) -> Option<&'static str> {
    let last = span.split_whitespace().last()?;
    if ORG_SUFFIXES.contains(&last) {
        return Some("ORG");
    }

    let previous = text[..start]
        .trim_end()
        .trim_end_matches('.')
        .rsplit(char::is_whitespace)
        .next()
        .unwrap_or_default();
    if PERSON_TITLES.contains(&previous) {
        return Some("PERSON");
    }

    // Lone capitalized common words ("Admin", "Users") are too noisy to tag
    if span.split_whitespace().count() >= 2 {
        Some("PRODUCT")
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(analysis: &Analysis) -> Vec<(&str, &str)> {
        analysis
            .entities
            .iter()
            .map(|e| (e.text.as_str(), e.label.as_str()))
            .collect()
    }

    #[test]
    fn test_entities_by_label() {
        let analysis = HeuristicPipeline
            .analyze("Invoices above $5,000 are exported to SAP via the REST API within 200 ms for Acme Bank.")
            .unwrap();
        let found = labels(&analysis);
        assert!(found.contains(&("$5,000", "MONEY")));
        assert!(found.contains(&("200 ms", "QUANTITY")));
        assert!(found.contains(&("SAP", "PRODUCT")));
        assert!(found.contains(&("API", "PRODUCT")));
        assert!(found.contains(&("Acme Bank", "ORG")));
    }

    #[test]
    fn test_person_after_title() {
        let analysis = HeuristicPipeline
            .analyze("Reports are approved by Dr. Jane Smith each month.")
            .unwrap();
        assert!(labels(&analysis).contains(&("Jane Smith", "PERSON")));
    }

    #[test]
    fn test_sentence_initial_words_are_not_entities() {
        let analysis = HeuristicPipeline
            .analyze("Users can reset passwords. Administrators can disable accounts.")
            .unwrap();
        assert!(analysis.entities.is_empty());
    }

    #[test]
    fn test_noun_phrases_in_order() {
        let analysis = HeuristicPipeline
            .analyze("The system shall export monthly sales reports to the finance team.")
            .unwrap();
        assert_eq!(
            analysis.noun_phrases,
            vec!["system", "monthly sales reports", "finance team"]
        );
    }

    #[test]
    fn test_unavailable_pipeline_errors() {
        let pipeline = UnavailablePipeline::new("model not installed");
        assert!(matches!(
            pipeline.analyze("text"),
            Err(TraceError::PipelineUnavailable(_))
        ));
    }
}
