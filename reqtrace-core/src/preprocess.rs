//! Text normalization applied before structural analysis

/// Normalizes line endings, typographic characters and whitespace.
///
/// Line structure is preserved: headers, list markers and blank-line
/// boundaries all matter downstream. Within a line, runs of whitespace
/// collapse to one space. Three or more consecutive blank lines collapse
/// to a single blank line.
pub fn normalize_text(raw: &str) -> String {
    let unified = raw.replace("\r\n", "\n").replace('\r', "\n");

    let mut lines: Vec<String> = Vec::new();
    let mut blank_run = 0;

    for line in unified.lines() {
        let normalized = normalize_line(line);
        if normalized.is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        lines.push(normalized);
    }

    // Leading and trailing blank lines carry no structure
    while lines.first().is_some_and(|l| l.is_empty()) {
        lines.remove(0);
    }
    while lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }

    lines.join("\n")
}

/// Returns true if the text has nothing left after normalization
pub fn is_effectively_empty(text: &str) -> bool {
    text.chars().all(|c| c.is_whitespace() || c.is_control())
}

fn normalize_line(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut pending_space = false;

    for c in line.chars() {
        let mapped = map_char(c);
        match mapped {
            None => continue,
            Some(' ') => pending_space = !out.is_empty(),
            Some(ch) => {
                if pending_space {
                    out.push(' ');
                    pending_space = false;
                }
                out.push(ch);
            }
        }
    }

    out
}

/// Maps typographic and control characters onto plain ASCII equivalents.
/// `None` drops the character; `Some(' ')` marks whitespace.
fn map_char(c: char) -> Option<char> {
    match c {
        '\u{2018}' | '\u{2019}' | '\u{201B}' | '\u{2032}' => Some('\''),
        '\u{201C}' | '\u{201D}' | '\u{201F}' | '\u{2033}' => Some('"'),
        '\u{2013}' | '\u{2014}' | '\u{2212}' => Some('-'),
        '\u{2022}' | '\u{25CF}' | '\u{25AA}' | '\u{25E6}' => Some('*'),
        '\u{2026}' => Some('.'),
        '\u{FEFF}' | '\u{200B}' | '\u{200C}' | '\u{200D}' => None,
        c if c.is_whitespace() => Some(' '),
        c if c.is_control() => None,
        c => Some(c),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_collapses_inline_whitespace() {
        let text = "The  system\tshall   respond.";
        assert_eq!(normalize_text(text), "The system shall respond.");
    }

    #[test]
    fn test_normalize_preserves_line_structure() {
        let text = "\r\n\r\n# Scope\r\n\r\n\r\n\r\n1. First item\r\n2. Second item\r\n\r\n";
        assert_eq!(normalize_text(text), "# Scope\n\n1. First item\n2. Second item");
    }

    #[test]
    fn test_normalize_maps_typographic_characters() {
        let text = "\u{FEFF}\u{201C}Users\u{201D} can\u{2019}t \u{2014} ever\u{2026}";
        assert_eq!(normalize_text(text), "\"Users\" can't - ever.");
    }

    #[test]
    fn test_is_effectively_empty() {
        assert!(is_effectively_empty(""));
        assert!(is_effectively_empty(" \n\t \u{0007}"));
        assert!(!is_effectively_empty(" a "));
    }
}
