//! RIS format data structures.
//!
//! Lines are first collected into a [`RawRisData`] per reference; the
//! conversion into a [`CanonicalRecord`] then picks values by priority:
//!
//! - **First-wins**: title (`TI`, then `T1`), year (`PY`, then `Y1`), DOI
//! - **Priority-based**: source title (`JF` > `JO` > `T2`)
//! - **Collected**: authors, keywords, addresses and countries keep every value

use crate::codec::Format;
use crate::error::ParseError;
use crate::ris::tags::RisTag;
use crate::{CanonicalRecord, Origin, display_doi};
use std::collections::{BTreeSet, HashMap};
use tracing::debug;

/// Structured raw data of one RIS reference.
#[derive(Debug, Clone)]
pub(crate) struct RawRisData {
    /// Key-value pair data from the RIS file data.
    pub(crate) data: HashMap<RisTag, Vec<String>>,
    /// Authors in the order they appear, from `AU` and `A1`.
    pub(crate) authors: Vec<String>,
    /// 1-based index of this reference in the input.
    pub(crate) block: usize,
    /// Line of the opening `TY` tag.
    pub(crate) line: usize,
    /// Tag of the last value, for wrapped continuation lines.
    last_tag: Option<RisTag>,
}

impl RawRisData {
    pub(crate) fn new(block: usize, line: usize) -> Self {
        Self {
            data: HashMap::new(),
            authors: Vec::new(),
            block,
            line,
            last_tag: None,
        }
    }

    /// Add a tag-value pair to the data.
    pub(crate) fn add_data(&mut self, tag: RisTag, value: String) {
        if tag.is_author_tag() {
            self.authors.push(value);
        } else {
            self.data.entry(tag.clone()).or_default().push(value);
        }
        self.last_tag = Some(tag);
    }

    /// Append a wrapped line to the most recent value.
    pub(crate) fn continue_last(&mut self, text: &str) {
        let last = match &self.last_tag {
            Some(tag) if tag.is_author_tag() => self.authors.last_mut(),
            Some(tag) => self.data.get_mut(tag).and_then(|values| values.last_mut()),
            None => None,
        };
        if let Some(value) = last {
            if !value.is_empty() {
                value.push(' ');
            }
            value.push_str(text);
        }
    }

    /// Get the first non-empty value for a tag, if it exists.
    pub(crate) fn get_first(&self, tag: &RisTag) -> Option<&String> {
        self.data
            .get(tag)
            .and_then(|values| values.iter().find(|v| !v.is_empty()))
    }

    /// Remove and return all non-empty values for a tag.
    pub(crate) fn remove(&mut self, tag: &RisTag) -> Vec<String> {
        self.data
            .remove(tag)
            .unwrap_or_default()
            .into_iter()
            .filter(|v| !v.is_empty())
            .collect()
    }

    /// Get the best journal name based on tag priority.
    pub(crate) fn get_best_journal(&self) -> Option<String> {
        self.data
            .iter()
            .filter_map(|(tag, values)| {
                let priority = tag.journal_priority()?;
                let value = values.iter().find(|v| !v.is_empty())?;
                Some((priority, value))
            })
            .min_by_key(|(priority, _)| *priority)
            .map(|(_, value)| value.clone())
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError::at(Format::Ris, self.block, self.line, message)
    }
}

/// Year from `2020`, `2020/05/01/`, `1998///` or `999`: the leading integer
/// of the first `/`-separated field.
fn parse_year(value: &str) -> Option<i32> {
    let field = value.split('/').next().unwrap_or_default().trim();
    let sign = usize::from(field.starts_with('-'));
    let end = field[sign..]
        .find(|c: char| !c.is_ascii_digit())
        .map_or(field.len(), |pos| pos + sign);
    field[..end].parse().ok()
}

impl TryFrom<RawRisData> for CanonicalRecord {
    type Error = ParseError;

    fn try_from(mut raw: RawRisData) -> Result<Self, Self::Error> {
        let title = raw
            .get_first(&RisTag::Title)
            .or_else(|| raw.get_first(&RisTag::TitleAlternative))
            .cloned()
            .ok_or_else(|| raw.error("reference has no title (TI)"))?;

        let year = raw
            .get_first(&RisTag::PublicationYear)
            .or_else(|| raw.get_first(&RisTag::DatePrimary))
            .and_then(|value| parse_year(value));

        let source_title = raw.get_best_journal().unwrap_or_default();

        let doi = raw
            .remove(&RisTag::Doi)
            .into_iter()
            .find_map(|value| display_doi(&value));

        let citation_count = match raw.get_first(&RisTag::TimesCited) {
            Some(value) => value
                .trim()
                .parse()
                .map_err(|_| raw.error(format!("invalid times cited (C3): '{value}'")))?,
            None => 0,
        };

        let origin = match raw.get_first(&RisTag::Database) {
            Some(value) => value.parse().unwrap_or_else(|_| {
                debug!(database = %value, "Unrecognized database name, using Combined");
                Origin::Combined
            }),
            None => Origin::default(),
        };

        let raw_key = raw
            .get_first(&RisTag::AccessionNumber)
            .cloned()
            .unwrap_or_default();

        Ok(CanonicalRecord {
            title,
            authors: std::mem::take(&mut raw.authors)
                .into_iter()
                .filter(|author| !author.is_empty())
                .collect(),
            year,
            source_title,
            doi,
            affiliations: raw.remove(&RisTag::Address).into_iter().collect(),
            countries: raw.remove(&RisTag::Countries).into_iter().collect(),
            keywords: raw.remove(&RisTag::Keywords).into_iter().collect::<BTreeSet<_>>(),
            citation_count,
            origin,
            raw_key,
        })
    }
}
