//! Reading raw database exports.
//!
//! Scopus exports CSV with a header row; Web of Science "tab-delimited" exports
//! use two-letter field tags as headers. Both are read into [`RawRecord`]s that
//! the [`crate::schema::SchemaNormalizer`] understands.
//!
//! ```
//! use bibharmony::export::{detect_source, read_export_auto};
//! use bibharmony::Source;
//!
//! let (source, rows) = read_export_auto("PT\tAU\tTI\tPY\tUT\nJ\tSmith, J\tA Paper\t2021\tWOS:1\n").unwrap();
//! assert_eq!(source, Source::Wos);
//! assert_eq!(rows[0].get("TI"), Some("A Paper"));
//! ```

use crate::Source;
use crate::schema::RawRecord;
use csv::{ReaderBuilder, Trim};
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// Error types for reading exports
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("malformed export: {0}")]
    Csv(#[from] csv::Error),

    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot tell whether the export comes from Scopus or Web of Science")]
    UnknownSource,
}

/// Headers only Web of Science tab-delimited exports carry.
const WOS_MARKERS: &[&str] = &["ut", "ti", "py", "so", "pt"];

/// Headers only Scopus CSV exports carry.
const SCOPUS_MARKERS: &[&str] = &["eid", "source title", "link", "title"];

/// Guesses the source database from an export's header row.
///
/// Returns `None` when neither set of marker columns is present.
pub fn detect_source<'a>(headers: impl IntoIterator<Item = &'a str>) -> Option<Source> {
    let headers: Vec<String> = headers
        .into_iter()
        .map(|h| h.trim_start_matches('\u{feff}').trim().to_lowercase())
        .collect();
    let score = |markers: &[&str]| {
        markers
            .iter()
            .filter(|marker| headers.iter().any(|h| h == *marker))
            .count()
    };

    let (wos, scopus) = (score(WOS_MARKERS), score(SCOPUS_MARKERS));
    match wos.cmp(&scopus) {
        std::cmp::Ordering::Greater => Some(Source::Wos),
        std::cmp::Ordering::Less => Some(Source::Scopus),
        std::cmp::Ordering::Equal => None,
    }
}

fn header_line(text: &str) -> &str {
    text.trim_start_matches('\u{feff}')
        .lines()
        .next()
        .unwrap_or_default()
}

/// Reads an export whose source is already known.
///
/// The delimiter is chosen from the header line: tab if present, comma
/// otherwise. Rows that are entirely blank are skipped; ragged rows are
/// accepted and missing cells treated as absent.
///
/// # Errors
///
/// Returns [`ExportError::Csv`] if the text is not valid delimited data.
pub fn read_export(text: &str, source: Source) -> Result<Vec<RawRecord>, ExportError> {
    let text = text.trim_start_matches('\u{feff}');
    let tabbed = header_line(text).contains('\t');

    let mut builder = ReaderBuilder::new();
    builder.flexible(true).trim(Trim::Headers);
    if tabbed {
        // WoS cells contain bare quotes that are not CSV quoting
        builder.delimiter(b'\t').quoting(false);
    }
    let mut reader = builder.from_reader(text.as_bytes());

    let headers: Vec<String> = reader.headers()?.iter().map(String::from).collect();

    let mut rows = Vec::new();
    for (index, result) in reader.records().enumerate() {
        let record = result?;
        let raw = RawRecord::from_pairs(index + 1, headers.iter().zip(record.iter()));
        if !raw.is_empty() {
            rows.push(raw);
        }
    }

    debug!(source = %source, rows = rows.len(), columns = headers.len(), "Read export");
    Ok(rows)
}

/// Reads an export and detects its source from the header row.
///
/// # Errors
///
/// Returns [`ExportError::UnknownSource`] when detection fails.
pub fn read_export_auto(text: &str) -> Result<(Source, Vec<RawRecord>), ExportError> {
    let line = header_line(text);
    let delimiter = if line.contains('\t') { '\t' } else { ',' };
    let source = detect_source(line.split(delimiter).map(|h| h.trim_matches('"')))
        .ok_or(ExportError::UnknownSource)?;
    Ok((source, read_export(text, source)?))
}

/// Reads an export file, detecting the source when `source` is `None`.
pub fn read_export_file(
    path: impl AsRef<Path>,
    source: Option<Source>,
) -> Result<(Source, Vec<RawRecord>), ExportError> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|source| ExportError::Io {
        path: path.display().to_string(),
        source,
    })?;
    match source {
        Some(source) => Ok((source, read_export(&text, source)?)),
        None => read_export_auto(&text),
    }
}
