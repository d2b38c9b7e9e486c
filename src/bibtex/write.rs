//! BibTeX serialization and citation key generation.

use crate::CanonicalRecord;
use crate::utils::parse_author_name;
use itertools::Itertools;
use std::collections::HashSet;

/// Hands out unique citation keys for one output document.
#[derive(Debug, Default)]
pub(crate) struct KeyAllocator {
    used: HashSet<String>,
}

impl KeyAllocator {
    /// `surname` + `year`, with `a`, `b`, ... appended on collision.
    pub(crate) fn allocate(&mut self, record: &CanonicalRecord) -> String {
        let surname: String = record
            .authors
            .first()
            .map(|author| parse_author_name(author).0)
            .unwrap_or_default()
            .chars()
            .filter(char::is_ascii_alphanumeric)
            .collect::<String>()
            .to_lowercase();
        let surname = if surname.is_empty() { "anon".to_string() } else { surname };
        let year = record
            .year
            .map_or_else(|| "nd".to_string(), |year| year.to_string());

        let base = format!("{surname}{year}");
        let mut key = base.clone();
        let mut n = 0;
        while self.used.contains(&key) {
            n += 1;
            key = format!("{base}{}", suffix(n));
        }
        self.used.insert(key.clone());
        key
    }
}

/// 1 → "a", 26 → "z", 27 → "aa", ...
fn suffix(mut n: usize) -> String {
    let mut letters = Vec::new();
    while n > 0 {
        n -= 1;
        letters.push(char::from(b'a' + (n % 26) as u8));
        n /= 26;
    }
    letters.iter().rev().collect()
}

/// Escapes BibTeX grouping characters and folds line breaks into spaces.
pub(crate) fn escape(value: &str) -> String {
    let folded = value
        .split(['\r', '\n'])
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .join(" ");
    let mut out = String::with_capacity(folded.len());
    for c in folded.chars() {
        if matches!(c, '{' | '}' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Serializes one record as an `@article` entry.
pub(crate) fn write_entry(out: &mut String, key: &str, record: &CanonicalRecord) {
    let mut fields: Vec<(&str, String)> = Vec::new();
    if !record.authors.is_empty() {
        fields.push(("author", record.authors.iter().join(" and ")));
    }
    fields.push(("title", record.title.clone()));
    fields.push(("journal", record.source_title.clone()));
    fields.push((
        "year",
        record.year.map(|year| year.to_string()).unwrap_or_default(),
    ));
    if let Some(doi) = &record.doi {
        fields.push(("doi", doi.clone()));
    }
    for (name, values) in [
        ("keywords", &record.keywords),
        ("affiliation", &record.affiliations),
        ("countries", &record.countries),
    ] {
        if !values.is_empty() {
            fields.push((name, values.iter().join("; ")));
        }
    }
    if record.citation_count > 0 {
        fields.push(("times-cited", record.citation_count.to_string()));
    }
    fields.push(("database", record.origin.to_string()));
    if !record.raw_key.is_empty() {
        fields.push(("unique-id", record.raw_key.clone()));
    }

    out.push_str(&format!("@article{{{key},\n"));
    let body = fields
        .iter()
        .map(|(name, value)| format!("  {name} = {{{}}}", escape(value)))
        .join(",\n");
    out.push_str(&body);
    out.push_str("\n}\n");
}
