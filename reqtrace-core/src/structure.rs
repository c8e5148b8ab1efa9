//! Document structure analysis
//!
//! Segments normalized text into a flat list of titled sections and detects
//! which requirement layouts the document uses.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::models::RequirementFormat;
use crate::patterns::{self, header_level, is_table_row};

/// Title of the bucket that collects lines before the first header
pub const MAIN_SECTION: &str = "Main";

/// A titled run of content lines
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub title: String,
    /// Heading depth: markdown '#' count, outline depth, or 1 for captions
    pub level: usize,
    pub lines: Vec<String>,
}

impl Section {
    fn new(title: impl Into<String>, level: usize) -> Self {
        Self {
            title: title.into(),
            level,
            lines: Vec::new(),
        }
    }

    pub fn text(&self) -> String {
        self.lines.join("\n")
    }
}

/// Summary figures for a document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub line_count: usize,
    pub word_count: usize,
    pub character_count: usize,
    pub section_count: usize,
    pub formats: BTreeSet<RequirementFormat>,
}

/// Output of the structure analyzer
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentStructure {
    pub sections: Vec<Section>,
    pub formats: BTreeSet<RequirementFormat>,
    /// Byte offset and title of every header line, in document order
    headers: Vec<(usize, String)>,
}

impl DocumentStructure {
    /// Title of the section that contains the given byte offset
    pub fn section_at(&self, offset: usize) -> Option<&str> {
        let idx = self.headers.partition_point(|(start, _)| *start <= offset);
        if idx == 0 {
            None
        } else {
            Some(self.headers[idx - 1].1.as_str())
        }
    }

    pub fn section(&self, title: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.title == title)
    }

    pub fn metadata(&self, text: &str) -> DocumentMetadata {
        DocumentMetadata {
            line_count: text.lines().count(),
            word_count: text.split_whitespace().count(),
            character_count: text.chars().count(),
            section_count: self.sections.len(),
            formats: self.formats.clone(),
        }
    }
}

/// Splits normalized text into sections and detects format signals
pub fn analyze_structure(text: &str, min_line_chars: usize) -> DocumentStructure {
    let mut sections: Vec<Section> = Vec::new();
    let mut headers: Vec<(usize, String)> = Vec::new();
    let mut current: Option<usize> = None;
    let mut offset = 0;

    for raw_line in text.split('\n') {
        let line_start = offset;
        offset += raw_line.len() + 1;

        let line = raw_line.trim();
        if let Some((level, title)) = header_level(line) {
            headers.push((line_start, title.clone()));
            // Flat title -> lines map: a repeated title reuses its bucket
            current = Some(match sections.iter().position(|s| s.title == title) {
                Some(idx) => idx,
                None => {
                    sections.push(Section::new(title, level));
                    sections.len() - 1
                }
            });
            continue;
        }

        if line.chars().count() <= min_line_chars {
            continue;
        }

        let idx = match current {
            Some(idx) => idx,
            None => {
                let idx = match sections.iter().position(|s| s.title == MAIN_SECTION) {
                    Some(idx) => idx,
                    None => {
                        sections.push(Section::new(MAIN_SECTION, 0));
                        sections.len() - 1
                    }
                };
                current = Some(idx);
                idx
            }
        };
        sections[idx].lines.push(line.to_string());
    }

    DocumentStructure {
        sections,
        formats: detect_formats(text),
        headers,
    }
}

/// Detects which requirement layouts appear in the text
pub fn detect_formats(text: &str) -> BTreeSet<RequirementFormat> {
    let mut formats = BTreeSet::new();

    if patterns::FORMAL_ID.is_match(text) {
        formats.insert(RequirementFormat::Formal);
    }
    if patterns::NUMBERED_MARKER.is_match(text) {
        formats.insert(RequirementFormat::Numbered);
    }
    if patterns::USER_STORY.is_match(text) {
        formats.insert(RequirementFormat::UserStory);
    }
    if text.lines().filter(|l| is_table_row(l)).count() >= 2 {
        formats.insert(RequirementFormat::Tabular);
    }

    formats
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = "Project intro text that is long enough.\n\
# Functional Requirements\n\
REQ-001: The system shall allow login.\n\
short\n\
## 2.1 Reports\n\
1. The system must export reports.\n\
SCOPE\n\
Out of scope items are listed here.";

    #[test]
    fn test_sections_and_main_bucket() {
        let structure = analyze_structure(DOC, 10);
        let titles: Vec<&str> = structure.sections.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(
            titles,
            vec![MAIN_SECTION, "Functional Requirements", "2.1 Reports", "SCOPE"]
        );
        let functional = structure.section("Functional Requirements").unwrap();
        assert_eq!(functional.level, 1);
        assert_eq!(functional.lines, vec!["REQ-001: The system shall allow login."]);
        assert_eq!(structure.section("2.1 Reports").unwrap().level, 2);
    }

    #[test]
    fn test_repeated_title_appends_to_bucket() {
        let text = "# Notes\nFirst note line is here.\n# Other\nOther line is long.\n# Notes\nSecond note line here.";
        let structure = analyze_structure(text, 10);
        assert_eq!(structure.sections.len(), 2);
        assert_eq!(structure.section("Notes").unwrap().lines.len(), 2);
    }

    #[test]
    fn test_section_at_offset() {
        let structure = analyze_structure(DOC, 10);
        assert_eq!(structure.section_at(0), None);
        let pos = DOC.find("REQ-001").unwrap();
        assert_eq!(structure.section_at(pos), Some("Functional Requirements"));
        let pos = DOC.find("Out of scope").unwrap();
        assert_eq!(structure.section_at(pos), Some("SCOPE"));
    }

    #[test]
    fn test_detect_formats() {
        let formats = detect_formats(DOC);
        assert!(formats.contains(&RequirementFormat::Formal));
        assert!(formats.contains(&RequirementFormat::Numbered));
        assert!(!formats.contains(&RequirementFormat::UserStory));

        let story = "As a customer, I want to reset my password so that I can log in.";
        assert!(detect_formats(story).contains(&RequirementFormat::UserStory));

        let table = "| ID | Text |\n|----|------|\n| 1 | Login |";
        assert!(detect_formats(table).contains(&RequirementFormat::Tabular));
    }

    #[test]
    fn test_metadata_counts() {
        let structure = analyze_structure(DOC, 10);
        let meta = structure.metadata(DOC);
        assert_eq!(meta.line_count, 8);
        assert_eq!(meta.section_count, 4);
        assert!(meta.word_count > 20);
    }
}
