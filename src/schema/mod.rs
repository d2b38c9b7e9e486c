//! Schema normalization of raw export rows.
//!
//! Scopus and Web of Science name the same information differently (`Title`
//! vs `TI`, `Source title` vs `SO`, ...) and pack multi-valued fields into
//! delimited cells. The [`SchemaNormalizer`] maps one raw row onto a
//! [`CanonicalRecord`] using a per-source [`SourceMapping`].
//!
//! # Example
//!
//! ```
//! use bibharmony::schema::{RawRecord, SchemaNormalizer};
//! use bibharmony::Source;
//!
//! let raw = RawRecord::from_pairs(1, [
//!     ("TI", "Deep Learning for X"),
//!     ("AU", "Smith, J; Doe, A"),
//!     ("PY", "2020"),
//!     ("C1", "[Smith, J; Doe, A] Univ X, Boston, MA 02115 USA."),
//! ]);
//!
//! let record = SchemaNormalizer::new().normalize(&raw, Source::Wos).unwrap();
//! assert_eq!(record.authors, vec!["Smith, J", "Doe, A"]);
//! assert!(record.countries.contains("United States"));
//! ```

mod countries;
mod mapping;

pub use countries::CountryTable;
pub use mapping::{ColumnAliases, SourceMapping};

use crate::config::Config;
use crate::regex::Regex;
use crate::utils::{display_doi, split_list, split_outside_brackets, strip_et_al};
use crate::{CanonicalRecord, Source};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::LazyLock;
use thiserror::Error;
use tracing::{debug, warn};

static YEAR_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b(\d{4})\b").unwrap());

static AUTHOR_ID_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*\(\d+\)\s*$").unwrap());

static ADDRESS_AUTHORS_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\[[^\]]*\]\s*").unwrap());

/// One row of a source export, keyed by column header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRecord {
    /// 1-based data row number within the export
    pub row: usize,
    fields: HashMap<String, String>,
}

impl RawRecord {
    /// Create a record from `(header, value)` pairs.
    pub fn from_pairs<I, K, V>(row: usize, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut record = Self {
            row,
            fields: HashMap::new(),
        };
        for (header, value) in pairs {
            record.insert(header.as_ref(), value);
        }
        record
    }

    /// Insert a cell; headers are matched case-insensitively.
    pub fn insert(&mut self, header: &str, value: impl Into<String>) {
        self.fields.insert(header_key(header), value.into());
    }

    /// Cell text for a header, if the column exists.
    pub fn get(&self, header: &str) -> Option<&str> {
        self.fields.get(&header_key(header)).map(String::as_str)
    }

    /// First non-blank cell among the aliases, in alias order.
    fn first_value(&self, aliases: &[String]) -> Option<&str> {
        aliases
            .iter()
            .filter_map(|alias| self.get(alias))
            .map(str::trim)
            .find(|value| !value.is_empty())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.values().all(|value| value.trim().is_empty())
    }
}

fn header_key(header: &str) -> String {
    header.trim_start_matches('\u{feff}').trim().to_lowercase()
}

/// A raw row that could not yield a canonical record.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("malformed record {raw_key} (row {row}): missing required field '{field}'")]
pub struct MalformedRecord {
    pub raw_key: String,
    pub row: usize,
    /// The required field that could not be extracted
    pub field: &'static str,
}

/// Normalized records of one export plus the rows that had to be dropped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedBatch {
    pub records: Vec<CanonicalRecord>,
    pub dropped: Vec<MalformedRecord>,
}

impl NormalizedBatch {
    /// Number of dropped rows.
    pub fn dropped_count(&self) -> usize {
        self.dropped.len()
    }
}

/// Maps raw export rows onto the canonical schema.
#[derive(Debug, Clone)]
pub struct SchemaNormalizer {
    scopus: SourceMapping,
    wos: SourceMapping,
    countries: CountryTable,
}

impl Default for SchemaNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaNormalizer {
    /// Creates a normalizer with the built-in mappings.
    #[must_use]
    pub fn new() -> Self {
        Self {
            scopus: SourceMapping::for_source(Source::Scopus),
            wos: SourceMapping::for_source(Source::Wos),
            countries: CountryTable::new(),
        }
    }

    /// Creates a normalizer from a loaded configuration.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            scopus: config.scopus.clone(),
            wos: config.wos.clone(),
            countries: CountryTable::new().with_overrides(&config.countries),
        }
    }

    /// The mapping used for a source.
    pub fn mapping(&self, source: Source) -> &SourceMapping {
        match source {
            Source::Scopus => &self.scopus,
            Source::Wos => &self.wos,
        }
    }

    /// Normalizes one raw row.
    ///
    /// # Errors
    ///
    /// Returns [`MalformedRecord`] when no title can be extracted.
    pub fn normalize(
        &self,
        raw: &RawRecord,
        source: Source,
    ) -> Result<CanonicalRecord, MalformedRecord> {
        let mapping = self.mapping(source);
        let columns = &mapping.columns;

        let raw_key = raw
            .first_value(&columns.raw_key)
            .map(String::from)
            .unwrap_or_else(|| format!("{}:row-{}", source.slug(), raw.row));

        let title = raw
            .first_value(&columns.title)
            .map(collapse_whitespace)
            .ok_or_else(|| MalformedRecord {
                raw_key: raw_key.clone(),
                row: raw.row,
                field: "title",
            })?;

        let authors = match raw.first_value(&columns.authors) {
            Some(cell) => parse_authors(cell, &mapping.author_delimiter),
            None => raw
                .first_value(&columns.authors_full)
                .map(|cell| parse_authors(cell, &mapping.author_delimiter))
                .unwrap_or_default(),
        };

        let affiliations: BTreeSet<String> = raw
            .first_value(&columns.affiliations)
            .map(|cell| parse_affiliations(cell, &mapping.affiliation_delimiter))
            .unwrap_or_default();

        let mut countries: BTreeSet<String> = affiliations
            .iter()
            .filter_map(|affiliation| self.countries.from_affiliation(affiliation))
            .collect();
        if let Some(cell) = raw.first_value(&columns.countries) {
            countries.extend(
                split_list(cell, &mapping.affiliation_delimiter)
                    .filter_map(|token| self.countries.canonical(token)),
            );
        }

        let mut keywords = BTreeSet::new();
        for aliases in [&columns.author_keywords, &columns.index_keywords] {
            if let Some(cell) = raw.first_value(aliases) {
                keywords.extend(
                    split_list(cell, &mapping.keyword_delimiter).map(|k| k.to_lowercase()),
                );
            }
        }

        let record = CanonicalRecord {
            title,
            authors,
            year: raw.first_value(&columns.year).and_then(parse_year),
            source_title: raw
                .first_value(&columns.source_title)
                .map(collapse_whitespace)
                .unwrap_or_default(),
            doi: raw.first_value(&columns.doi).and_then(display_doi),
            affiliations,
            countries,
            keywords,
            citation_count: raw
                .first_value(&columns.cited_by)
                .and_then(parse_count)
                .unwrap_or(0),
            origin: source.into(),
            raw_key,
        };

        debug!(raw_key = %record.raw_key, source = %source, "Normalized record");
        Ok(record)
    }

    /// Normalizes every row of an export, collecting the rows that fail.
    pub fn normalize_all(&self, raws: &[RawRecord], source: Source) -> NormalizedBatch {
        let mut batch = NormalizedBatch::default();
        for raw in raws {
            match self.normalize(raw, source) {
                Ok(record) => batch.records.push(record),
                Err(error) => {
                    warn!(raw_key = %error.raw_key, row = error.row, field = error.field, "Dropping malformed record");
                    batch.dropped.push(error);
                }
            }
        }
        batch
    }
}

fn collapse_whitespace(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Leading four-digit year, e.g. "2020", "2020/05/01", "Dec 2019".
fn parse_year(value: &str) -> Option<i32> {
    YEAR_REGEX
        .captures(value)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

fn parse_count(value: &str) -> Option<u32> {
    value.replace(',', "").trim().parse().ok()
}

/// Splits an author cell, dropping "et al." markers, author ids and repeats.
fn parse_authors(cell: &str, delimiter: &str) -> Vec<String> {
    let cell = strip_et_al(cell);
    let mut seen = HashSet::new();
    split_list(&cell, delimiter)
        .map(|name| AUTHOR_ID_REGEX.replace(name, "").trim().to_string())
        .filter(|name| !name.is_empty())
        .filter(|name| seen.insert(name.to_lowercase()))
        .collect()
}

/// Splits an address cell, removing WoS bracketed author lists.
fn parse_affiliations(cell: &str, delimiter: &str) -> BTreeSet<String> {
    split_outside_brackets(cell, delimiter)
        .into_iter()
        .map(|address| {
            ADDRESS_AUTHORS_REGEX
                .replace(address, "")
                .trim()
                .trim_end_matches('.')
                .trim()
                .to_string()
        })
        .filter(|address| !address.is_empty())
        .collect()
}
