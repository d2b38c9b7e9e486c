//! BibTeX scanning.
//!
//! Entries are located by their `@type{` opener and read with brace counting.
//! Field values may be braced, quoted or bare. `@comment`, `@preamble` and
//! `@string` blocks are skipped.

use crate::bibtex::structure::RawBibEntry;
use crate::codec::Format;
use crate::error::ParseError;

const IGNORED_BLOCK_TYPES: [&str; 3] = ["comment", "preamble", "string"];

/// Character cursor that keeps track of the current line.
struct Scanner {
    chars: Vec<char>,
    pos: usize,
    line: usize,
}

impl Scanner {
    fn new(input: &str) -> Self {
        Self {
            chars: input.chars().collect(),
            pos: 0,
            line: 1,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
        }
        Some(c)
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    fn take_while(&mut self, mut keep: impl FnMut(char) -> bool) -> String {
        let mut out = String::new();
        while let Some(c) = self.peek().filter(|&c| keep(c)) {
            out.push(c);
            self.bump();
        }
        out
    }

    /// Advances to the next `@`; returns `false` at end of input.
    fn skip_to_entry(&mut self) -> bool {
        while let Some(c) = self.peek() {
            if c == '@' {
                return true;
            }
            self.bump();
        }
        false
    }

    /// Reads a balanced group after its opening delimiter has been consumed,
    /// returning the raw contents without the closing delimiter.
    ///
    /// Backslash escapes are kept verbatim and never count as delimiters.
    fn read_balanced(&mut self, close: char) -> Option<String> {
        let open = if close == ')' { '(' } else { '{' };
        let mut depth = 0usize;
        let mut out = String::new();
        loop {
            let c = self.bump()?;
            match c {
                '\\' => {
                    out.push(c);
                    out.push(self.bump()?);
                }
                c if c == open => {
                    depth += 1;
                    out.push(c);
                }
                c if c == close => {
                    if depth == 0 {
                        return Some(out);
                    }
                    depth -= 1;
                    out.push(c);
                }
                c => out.push(c),
            }
        }
    }

    /// Reads a `"..."` value after the opening quote; braces nest inside.
    fn read_quoted(&mut self) -> Option<String> {
        let mut depth = 0usize;
        let mut out = String::new();
        loop {
            let c = self.bump()?;
            match c {
                '\\' => {
                    out.push(c);
                    out.push(self.bump()?);
                }
                '"' if depth == 0 => return Some(out),
                '{' => {
                    depth += 1;
                    out.push(c);
                }
                '}' => {
                    depth = depth.saturating_sub(1);
                    out.push(c);
                }
                c => out.push(c),
            }
        }
    }
}

/// Parse BibTeX text into raw entries.
pub(crate) fn bibtex_parse(input: &str) -> Result<Vec<RawBibEntry>, ParseError> {
    let mut scanner = Scanner::new(input);
    let mut entries = Vec::new();
    let mut blocks = 0;

    while scanner.skip_to_entry() {
        let line = scanner.line;
        scanner.bump();
        let entry_type = scanner
            .take_while(|c| c.is_ascii_alphanumeric())
            .to_lowercase();
        scanner.skip_whitespace();

        let close = match scanner.peek() {
            Some('{') => '}',
            Some('(') => ')',
            // A stray '@' in free text
            _ => continue,
        };
        if entry_type.is_empty() {
            continue;
        }
        scanner.bump();

        if IGNORED_BLOCK_TYPES.contains(&entry_type.as_str()) {
            scanner.read_balanced(close).ok_or_else(|| {
                ParseError::at(
                    Format::BibTex,
                    blocks + 1,
                    line,
                    format!("unterminated @{entry_type} block"),
                )
            })?;
            continue;
        }

        blocks += 1;
        entries.push(parse_entry(&mut scanner, entry_type, close, blocks, line)?);
    }

    Ok(entries)
}

fn parse_entry(
    scanner: &mut Scanner,
    entry_type: String,
    close: char,
    block: usize,
    line: usize,
) -> Result<RawBibEntry, ParseError> {
    let error = |message: String| ParseError::at(Format::BibTex, block, line, message);
    let unterminated = || error("unterminated entry: missing closing brace".to_string());

    let key = scanner
        .take_while(|c| c != ',' && c != close && c != '\n')
        .trim()
        .to_string();
    let mut entry = RawBibEntry::new(entry_type, key, block, line);

    loop {
        scanner.skip_whitespace();
        match scanner.peek() {
            None => return Err(unterminated()),
            Some(c) if c == close => {
                scanner.bump();
                return Ok(entry);
            }
            Some(',') => {
                scanner.bump();
                continue;
            }
            Some(_) => {}
        }

        let name = scanner
            .take_while(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | ':' | '.'))
            .to_lowercase();
        if name.is_empty() {
            let found = scanner.peek().unwrap_or_default();
            return Err(error(format!("expected a field name, found '{found}'")));
        }
        scanner.skip_whitespace();
        if scanner.bump() != Some('=') {
            return Err(error(format!("expected '=' after field '{name}'")));
        }
        scanner.skip_whitespace();

        let value = match scanner.peek() {
            Some('{') => {
                scanner.bump();
                scanner.read_balanced('}').ok_or_else(unterminated)?
            }
            Some('"') => {
                scanner.bump();
                scanner
                    .read_quoted()
                    .ok_or_else(|| error(format!("unterminated quote in field '{name}'")))?
            }
            Some(_) => scanner.take_while(|c| c != ',' && c != close && !c.is_whitespace()),
            None => return Err(unterminated()),
        };
        entry.add_field(name, &value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_braced_quoted_and_bare_values() {
        let input = r#"
Some preamble text with an email@example.org address.

@Article{smith2020,
  title = {The {DNA} of \{braces\}},
  journal = "Journal of {Things}",
  year = 2020,
  author = {Smith, J and Doe, A}
}
"#;
        let entries = bibtex_parse(input).unwrap();
        assert_eq!(entries.len(), 1);
        let entry = &entries[0];
        assert_eq!(entry.entry_type, "article");
        assert_eq!(entry.key, "smith2020");
        assert_eq!(entry.line, 4);
        assert_eq!(entry.get("title"), Some("The DNA of {braces}"));
        assert_eq!(entry.get("journal"), Some("Journal of Things"));
        assert_eq!(entry.get("year"), Some("2020"));
    }

    #[test]
    fn test_skips_comment_blocks() {
        let input = "@comment{ignore {this}}\n@misc{k, title = {Kept}}\n";
        let entries = bibtex_parse(input).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].block, 1);
        assert_eq!(entries[0].get("title"), Some("Kept"));
    }

    #[test]
    fn test_line_breaks_are_collapsed() {
        let input = "@article{k,\n  title = {A title\n    split over\n    lines}\n}";
        let entries = bibtex_parse(input).unwrap();
        assert_eq!(entries[0].get("title"), Some("A title split over lines"));
    }

    #[test]
    fn test_unterminated_brace() {
        let input = "@article{a, title = {One}}\n\n@article{b,\n  title = {Two\n";
        let error = bibtex_parse(input).unwrap_err();
        assert_eq!(error.format, Format::BibTex);
        assert_eq!(error.block, 2);
        assert_eq!(error.line, 3);
        assert!(error.message.contains("unterminated"));
    }

    #[test]
    fn test_missing_equals() {
        let error = bibtex_parse("@article{k, title {x}}").unwrap_err();
        assert!(error.message.contains("'='"));
    }

    #[test]
    fn test_empty_input() {
        assert!(bibtex_parse("").unwrap().is_empty());
    }
}
