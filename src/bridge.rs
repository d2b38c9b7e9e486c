//! Flat CSV output of a harmonized corpus and a diagnostic summary.
//!
//! The CSV is meant for spreadsheet tools and R-based bibliometric packages,
//! so multi-valued fields are joined with `"; "` and a UTF-8 byte order mark
//! can be prepended.
//!
//! ```
//! use bibharmony::bridge::{CorpusSummary, write_corpus_csv};
//! use bibharmony::harmonize::Harmonizer;
//!
//! let result = Harmonizer::new().harmonize(&[]);
//! let mut out = Vec::new();
//! write_corpus_csv(&mut out, &result.records, false).unwrap();
//! assert!(String::from_utf8(out).unwrap().starts_with("title,authors,year"));
//!
//! let summary = CorpusSummary::from_records(&result.records);
//! assert_eq!(summary.total_publications, 0);
//! ```

use crate::harmonize::HarmonizedRecord;
use crate::{CanonicalRecord, Origin};
use itertools::Itertools;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::Path;

const BOM: &[u8] = "\u{feff}".as_bytes();

/// Joiner for multi-valued cells.
pub const LIST_SEPARATOR: &str = "; ";

#[derive(Debug, Serialize)]
struct CorpusRow<'a> {
    title: &'a str,
    authors: String,
    year: Option<i32>,
    source_title: &'a str,
    doi: Option<&'a str>,
    affiliations: String,
    countries: String,
    keywords: String,
    citation_count: u32,
    origin: Origin,
    source_count: usize,
    raw_key: &'a str,
}

impl<'a> From<&'a HarmonizedRecord> for CorpusRow<'a> {
    fn from(harmonized: &'a HarmonizedRecord) -> Self {
        let record = &harmonized.record;
        Self {
            title: &record.title,
            authors: record.authors.iter().join(LIST_SEPARATOR),
            year: record.year,
            source_title: &record.source_title,
            doi: record.doi.as_deref(),
            affiliations: record.affiliations.iter().join(LIST_SEPARATOR),
            countries: record.countries.iter().join(LIST_SEPARATOR),
            keywords: record.keywords.iter().join(LIST_SEPARATOR),
            citation_count: record.citation_count,
            origin: record.origin,
            source_count: harmonized.source_count,
            raw_key: &record.raw_key,
        }
    }
}

/// Writes the corpus as CSV, one row per harmonized record.
///
/// The header row is written even for an empty corpus.
pub fn write_corpus_csv<W: Write>(
    mut writer: W,
    records: &[HarmonizedRecord],
    with_bom: bool,
) -> Result<(), csv::Error> {
    if with_bom {
        writer.write_all(BOM)?;
    }
    let mut csv = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);
    csv.write_record([
        "title",
        "authors",
        "year",
        "source_title",
        "doi",
        "affiliations",
        "countries",
        "keywords",
        "citation_count",
        "origin",
        "source_count",
        "raw_key",
    ])?;
    for harmonized in records {
        csv.serialize(CorpusRow::from(harmonized))?;
    }
    csv.flush()?;
    Ok(())
}

/// Writes the corpus CSV to `path`, creating parent directories.
pub fn write_corpus_csv_file(
    path: impl AsRef<Path>,
    records: &[HarmonizedRecord],
    with_bom: bool,
) -> Result<(), csv::Error> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let file = BufWriter::new(File::create(path)?);
    write_corpus_csv(file, records, with_bom)?;
    tracing::info!(path = %path.display(), records = records.len(), "Wrote corpus CSV");
    Ok(())
}

/// Publications and citations of one year.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnnualCount {
    pub year: i32,
    pub publications: usize,
    pub citations: u64,
    pub avg_citations: f64,
}

/// Headline indicators of a harmonized corpus.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorpusSummary {
    pub total_publications: usize,
    pub total_citations: u64,
    pub mean_citations: f64,
    pub median_citations: f64,
    /// Largest h such that h publications have at least h citations each
    pub h_index: usize,
    pub unique_authors: usize,
    pub first_year: Option<i32>,
    pub latest_year: Option<i32>,
    /// Publications per origin tag
    pub by_origin: BTreeMap<Origin, usize>,
    pub annual: Vec<AnnualCount>,
}

impl CorpusSummary {
    pub fn from_records(records: &[HarmonizedRecord]) -> Self {
        let citations: Vec<u32> = records
            .iter()
            .map(|h| h.record.citation_count)
            .sorted_unstable_by(|a, b| b.cmp(a))
            .collect();
        let total_citations: u64 = citations.iter().map(|&c| u64::from(c)).sum();

        let h_index = citations
            .iter()
            .enumerate()
            .take_while(|&(rank, &count)| count as usize > rank)
            .count();

        let median_citations = match citations.len() {
            0 => 0.0,
            n if n % 2 == 1 => f64::from(citations[n / 2]),
            n => (f64::from(citations[n / 2 - 1]) + f64::from(citations[n / 2])) / 2.0,
        };

        let mut annual: BTreeMap<i32, (usize, u64)> = BTreeMap::new();
        for h in records {
            if let Some(year) = h.record.year {
                let entry = annual.entry(year).or_default();
                entry.0 += 1;
                entry.1 += u64::from(h.record.citation_count);
            }
        }

        Self {
            total_publications: records.len(),
            total_citations,
            mean_citations: round2(if records.is_empty() {
                0.0
            } else {
                total_citations as f64 / records.len() as f64
            }),
            median_citations: round2(median_citations),
            h_index,
            unique_authors: records
                .iter()
                .flat_map(|h| h.record.authors.iter())
                .map(|a| a.to_lowercase())
                .unique()
                .count(),
            first_year: annual.keys().next().copied(),
            latest_year: annual.keys().next_back().copied(),
            by_origin: records.iter().map(|h| h.record.origin).counts().into_iter().collect(),
            annual: annual
                .into_iter()
                .map(|(year, (publications, citations))| AnnualCount {
                    year,
                    publications,
                    citations,
                    avg_citations: round2(citations as f64 / publications as f64),
                })
                .collect(),
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// The `k` most frequent values of a multi-valued field, most frequent
/// first and alphabetical on ties.
pub fn top_entities<'a, F, I>(records: &'a [HarmonizedRecord], k: usize, field: F) -> Vec<(String, usize)>
where
    F: Fn(&'a CanonicalRecord) -> I,
    I: IntoIterator<Item = &'a String>,
{
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for h in records {
        for value in field(&h.record) {
            *counts.entry(value.as_str()).or_default() += 1;
        }
    }
    counts
        .into_iter()
        .sorted_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)))
        .take(k)
        .map(|(value, count)| (value.to_string(), count))
        .collect()
}

/// Writes the summary as pretty-printed JSON.
pub fn write_summary_json<W: Write>(writer: W, summary: &CorpusSummary) -> io::Result<()> {
    serde_json::to_writer_pretty(writer, summary).map_err(io::Error::from)
}
