//! BibTeX entry data and its conversion into canonical records.

use crate::codec::Format;
use crate::error::ParseError;
use crate::regex::Regex;
use crate::utils::split_list;
use crate::{CanonicalRecord, Origin, display_doi};
use std::collections::{BTreeSet, HashMap};
use std::sync::LazyLock;
use tracing::{debug, trace};

static AUTHOR_SPLIT_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\s+and\s+").unwrap());

/// One `@type{key, ...}` entry with unescaped field values.
#[derive(Debug, Clone)]
pub(crate) struct RawBibEntry {
    pub(crate) entry_type: String,
    pub(crate) key: String,
    fields: HashMap<String, String>,
    pub(crate) block: usize,
    pub(crate) line: usize,
}

impl RawBibEntry {
    pub(crate) fn new(entry_type: String, key: String, block: usize, line: usize) -> Self {
        Self {
            entry_type,
            key,
            fields: HashMap::new(),
            block,
            line,
        }
    }

    /// Stores a field; the first occurrence of a name wins.
    pub(crate) fn add_field(&mut self, name: String, raw_value: &str) {
        self.fields
            .entry(name)
            .or_insert_with(|| unescape(&collapse_lines(raw_value)));
    }

    /// Non-empty value of a field.
    pub(crate) fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(String::as_str)
            .filter(|value| !value.is_empty())
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError::at(Format::BibTex, self.block, self.line, message)
    }
}

/// Joins wrapped lines with single spaces.
fn collapse_lines(value: &str) -> String {
    value
        .split(['\r', '\n'])
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Resolves `\{`, `\}` and `\\`, and drops unescaped grouping braces.
///
/// Other control sequences such as `\&` are kept as written.
fn unescape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some(next @ ('{' | '}' | '\\')) => out.push(next),
                Some(next) => {
                    out.push('\\');
                    out.push(next);
                }
                None => out.push('\\'),
            },
            '{' | '}' => {}
            c => out.push(c),
        }
    }
    out
}

impl TryFrom<RawBibEntry> for CanonicalRecord {
    type Error = ParseError;

    fn try_from(entry: RawBibEntry) -> Result<Self, Self::Error> {
        trace!(entry_type = %entry.entry_type, key = %entry.key, "Converting entry");
        let title = entry
            .get("title")
            .ok_or_else(|| entry.error(format!("entry '{}' has no title", entry.key)))?
            .to_string();

        let authors: Vec<String> = entry
            .get("author")
            .map(|value| {
                AUTHOR_SPLIT_REGEX
                    .split(value)
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        let year = entry.get("year").and_then(|value| value.trim().parse().ok());

        let source_title = entry
            .get("journal")
            .or_else(|| entry.get("booktitle"))
            .unwrap_or_default()
            .to_string();

        let list = |name: &str| -> BTreeSet<String> {
            entry
                .get(name)
                .map(|value| split_list(value, ";").map(String::from).collect())
                .unwrap_or_default()
        };

        let citation_count = match entry.get("times-cited") {
            Some(value) => value
                .trim()
                .parse()
                .map_err(|_| entry.error(format!("invalid times-cited value '{value}'")))?,
            None => 0,
        };

        let origin = match entry.get("database") {
            Some(value) => value.parse().unwrap_or_else(|_| {
                debug!(database = %value, key = %entry.key, "Unrecognized database name, using Combined");
                Origin::Combined
            }),
            None => Origin::default(),
        };

        Ok(CanonicalRecord {
            title,
            authors,
            year,
            source_title,
            doi: entry.get("doi").and_then(display_doi),
            affiliations: list("affiliation"),
            countries: list("countries"),
            keywords: list("keywords"),
            citation_count,
            origin,
            raw_key: entry.get("unique-id").unwrap_or_default().to_string(),
        })
    }
}
