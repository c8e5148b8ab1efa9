//! Shared lexical patterns
//!
//! Regexes and small scanners used by both the structure analyzer and the
//! extraction strategies. Patterns are compiled once.

use regex::Regex;
use std::sync::LazyLock;

pub static MARKDOWN_HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(#{1,6})\s+(\S.*)$").expect("valid regex"));

pub static OUTLINE_HEADING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+(?:\.\d+)+)\.?\s+([A-Za-z].*)$").expect("valid regex")
});

/// Modal verbs that mark a line as a statement rather than a caption
pub static OBLIGATION_WORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:shall|must|should|will|may|can|needs?\s+to)\b").expect("valid regex")
});

/// Requirement identifiers that may appear anywhere in prose
pub static FORMAL_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:REQ|FR|NFR|BR|UC)-\d+\b|\[R-\d+\]|\brequirement\s+\d+\b")
        .expect("valid regex")
});

/// Decimal outline numbers at the start of a line ("3.1.2")
pub static OUTLINE_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[ \t]*(\d+(?:\.\d+)+)\b").expect("valid regex"));

/// "<int>. " list markers at line start or directly after a sentence terminator
pub static NUMBERED_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)(?:^[ \t]*|[.!?;:][ \t]+)(\d{1,3})\.[ \t]+").expect("valid regex")
});

pub static LIST_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(?:\d{1,3}[.)]|[-*+]|\(?[a-zA-Z]\))\s+").expect("valid regex"));

pub static USER_STORY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bas an?\s+[\w\s-]{1,40}?,?\s+i\s+(?:want|need|would like|can)\b")
        .expect("valid regex")
});

pub static TABLE_ROW: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*\|.*\|\s*$").expect("valid regex"));

/// Inline "Key: value" metadata lines
pub static METADATA_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^\s*[-*]?\s*(priority|type|owner|status|category|source|date|version|author)\s*:\s*(.*?)\s*$",
    )
    .expect("valid regex")
});

/// Priority declared in the middle of a line ("... Priority: High")
pub static INLINE_PRIORITY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)[\s(\[,;]*\bpriority\s*[:=]\s*(critical|high|medium|low)\b[)\]]?")
        .expect("valid regex")
});

/// Fixed section captions recognized regardless of numbering
pub const SECTION_CAPTIONS: &[&str] = &[
    "introduction",
    "overview",
    "purpose",
    "scope",
    "background",
    "requirements",
    "functional requirements",
    "non-functional requirements",
    "nonfunctional requirements",
    "business requirements",
    "system requirements",
    "user requirements",
    "performance requirements",
    "security requirements",
    "interface requirements",
    "data requirements",
    "user stories",
    "use cases",
    "specifications",
    "technical specifications",
    "assumptions",
    "constraints",
    "dependencies",
    "acceptance criteria",
    "glossary",
    "appendix",
];

/// Returns the header level if the line is a section header
pub fn header_level(line: &str) -> Option<(usize, String)> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Some(caps) = MARKDOWN_HEADING.captures(trimmed) {
        let level = caps[1].len();
        let title = caps[2].trim().trim_end_matches('#').trim().to_string();
        return Some((level, title));
    }

    if let Some(caps) = OUTLINE_HEADING.captures(trimmed) {
        let title = caps[2].trim();
        let is_caption = title.split_whitespace().count() <= 8
            && !title.ends_with('.')
            && !OBLIGATION_WORD.is_match(title);
        if is_caption {
            let level = caps[1].split('.').count();
            return Some((level, trimmed.to_string()));
        }
    }

    let caption = trimmed
        .trim_matches(|c: char| c == '*' || c == '=' || c == '_')
        .trim()
        .trim_end_matches(':')
        .trim();
    let lowered = caption.to_lowercase();
    if SECTION_CAPTIONS.contains(&lowered.as_str()) {
        return Some((1, caption.to_string()));
    }

    None
}

pub fn is_metadata_line(line: &str) -> bool {
    METADATA_LINE.is_match(line)
}

pub fn is_table_row(line: &str) -> bool {
    TABLE_ROW.is_match(line) || line.matches('|').count() >= 2
}

/// Occurrence of a requirement identifier in the text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdMatch {
    pub start: usize,
    pub end: usize,
    pub id: String,
    /// True when the identifier introduces a requirement rather than refers to one
    pub anchor: bool,
}

/// Finds formal IDs and line-leading outline numbers, ordered by position
pub fn find_requirement_ids(text: &str) -> Vec<IdMatch> {
    let mut matches: Vec<IdMatch> = FORMAL_ID
        .find_iter(text)
        .map(|m| IdMatch {
            start: m.start(),
            end: m.end(),
            id: canonical_id(m.as_str()),
            anchor: is_anchor(text, m.start(), m.end()),
        })
        .collect();

    for caps in OUTLINE_ID.captures_iter(text) {
        if let Some(m) = caps.get(1) {
            // A numbered caption opens a section, not a requirement
            if header_level(line_at(text, m.start())).is_some() {
                continue;
            }
            if !matches.iter().any(|x| x.start <= m.start() && m.start() < x.end) {
                matches.push(IdMatch {
                    start: m.start(),
                    end: m.end(),
                    id: m.as_str().to_string(),
                    anchor: true,
                });
            }
        }
    }

    matches.sort_by_key(|m| m.start);
    matches
}

fn line_at(text: &str, offset: usize) -> &str {
    let start = text[..offset].rfind('\n').map_or(0, |i| i + 1);
    let end = text[offset..].find('\n').map_or(text.len(), |i| offset + i);
    &text[start..end]
}

/// Normalizes an identifier for use as a source id ("req-1" -> "REQ-1")
pub fn canonical_id(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.to_lowercase().starts_with("requirement") {
        let number = trimmed
            .split_whitespace()
            .last()
            .unwrap_or_default()
            .to_string();
        return format!("Requirement {}", number);
    }
    trimmed.to_uppercase()
}

/// An ID introduces a requirement when it leads its line or is followed by ':' / ' - '
fn is_anchor(text: &str, start: usize, end: usize) -> bool {
    let line_start = text[..start].rfind('\n').map(|i| i + 1).unwrap_or(0);
    let prefix = &text[line_start..start];
    if prefix
        .chars()
        .all(|c| c.is_whitespace() || matches!(c, '*' | '-' | '#' | '|' | '>'))
    {
        return true;
    }

    let rest = text[end..].trim_start_matches([' ', '\t']);
    rest.starts_with(':') || rest.starts_with("- ") || rest.starts_with(']')
}

const ABBREVIATIONS: &[&str] = &[
    "e.g", "i.e", "etc", "vs", "mr", "mrs", "dr", "fig", "approx", "incl",
];

/// Splits text into sentences on terminal punctuation followed by whitespace.
///
/// List markers ("2.") and common abbreviations do not end a sentence.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let chars: Vec<(usize, char)> = text.char_indices().collect();

    for (i, &(pos, c)) in chars.iter().enumerate() {
        if !matches!(c, '.' | '!' | '?') {
            continue;
        }
        let next_is_space = chars.get(i + 1).map(|&(_, n)| n.is_whitespace()).unwrap_or(true);
        if !next_is_space {
            continue;
        }
        if c == '.' && !ends_sentence(&text[start..pos]) {
            continue;
        }

        let end = pos + c.len_utf8();
        let sentence = text[start..end].trim();
        if !sentence.is_empty() {
            sentences.push(sentence.to_string());
        }
        start = end;
    }

    let tail = text[start..].trim();
    if !tail.is_empty() {
        sentences.push(tail.to_string());
    }
    sentences
}

fn ends_sentence(before: &str) -> bool {
    let last_token = before
        .rsplit(|c: char| c.is_whitespace() || c == '(')
        .next()
        .unwrap_or_default();
    if last_token.is_empty() {
        return false;
    }
    if last_token.chars().all(|c| c.is_ascii_digit()) {
        // A bare "2." opening the span is a list marker, not a sentence
        return before.trim() != last_token;
    }
    let lowered = last_token.to_lowercase();
    if ABBREVIATIONS.contains(&lowered.as_str()) {
        return false;
    }
    // Single capital initials ("J. Smith")
    !(last_token.len() == 1 && last_token.chars().all(|c| c.is_ascii_uppercase()))
}

/// A run of prose lines and the byte offset of its first line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub offset: usize,
    pub text: String,
}

/// Groups lines into prose segments: blank lines, headers, list items and
/// identifier anchors start a new segment; metadata lines and table rows are dropped.
pub fn prose_segments(text: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut current_offset = 0;
    let mut offset = 0;

    for line in text.split('\n') {
        let line_start = offset;
        offset += line.len() + 1;

        let trimmed = line.trim();
        if trimmed.is_empty() || header_level(trimmed).is_some() {
            flush(&mut current, current_offset, &mut segments);
            continue;
        }
        if is_metadata_line(trimmed) || is_table_row(trimmed) {
            flush(&mut current, current_offset, &mut segments);
            continue;
        }
        let starts_item = LIST_LINE.is_match(trimmed)
            || find_requirement_ids(trimmed)
                .first()
                .is_some_and(|m| m.start == 0 && m.anchor);
        if starts_item {
            flush(&mut current, current_offset, &mut segments);
        }
        if current.is_empty() {
            current_offset = line_start;
        }
        current.push(trimmed);
    }
    flush(&mut current, current_offset, &mut segments);

    segments
}

fn flush(current: &mut Vec<&str>, offset: usize, segments: &mut Vec<Segment>) {
    if !current.is_empty() {
        segments.push(Segment {
            offset,
            text: current.join(" "),
        });
        current.clear();
    }
}

/// Counts whole-word occurrences of each term in already-lowercased text
pub fn count_terms(lower: &str, terms: &[&str]) -> usize {
    terms.iter().map(|term| count_term(lower, term)).sum()
}

/// Counts whole-word occurrences of one term in already-lowercased text
pub fn count_term(lower: &str, term: &str) -> usize {
    if term.is_empty() {
        return 0;
    }
    let mut count = 0;
    let mut from = 0;
    while let Some(pos) = lower[from..].find(term) {
        let start = from + pos;
        let end = start + term.len();
        let before_ok = lower[..start]
            .chars()
            .next_back()
            .map_or(true, |c| !c.is_alphanumeric());
        let after_ok = lower[end..]
            .chars()
            .next()
            .map_or(true, |c| !c.is_alphanumeric());
        if before_ok && after_ok {
            count += 1;
        }
        from = end;
    }
    count
}
