//! Vault entry types.

use crate::CanonicalRecord;
use crate::utils::display_doi;
use chrono::{DateTime, Utc};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Stable identifier of a vault entry, displayed as `V000001`.
///
/// Ids are assigned in insertion order and never reused, even after the
/// entry they named has been removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VaultId(pub u64);

impl fmt::Display for VaultId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "V{:06}", self.0)
    }
}

impl FromStr for VaultId {
    type Err = String;

    /// Accepts `V000042`, `v42` and `42`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let digits = s
            .strip_prefix('V')
            .or_else(|| s.strip_prefix('v'))
            .unwrap_or(s);
        digits
            .parse()
            .map(VaultId)
            .map_err(|_| format!("invalid vault id: '{s}'"))
    }
}

/// A curated record together with its vault bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VaultEntry {
    pub vault_id: VaultId,
    pub record: CanonicalRecord,
    pub added_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub notes: String,
}

impl VaultEntry {
    /// Whether `needle` (already lower-cased) occurs in any searchable field.
    pub(crate) fn matches(&self, needle: &str) -> bool {
        let record = &self.record;
        let contains = |value: &str| value.to_lowercase().contains(needle);
        contains(&record.title)
            || record.authors.iter().map(String::as_str).any(contains)
            || contains(&record.source_title)
            || record.keywords.iter().map(String::as_str).any(contains)
            || record.doi.as_deref().is_some_and(contains)
            || contains(&self.notes)
    }
}

/// Field-level overwrite applied by [`Vault::update`](super::Vault::update).
///
/// `None` leaves a field untouched. For the optional record fields the inner
/// `Option` is the new value, so `year: Some(None)` clears the year. A new DOI
/// is stored in its bare form.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VaultPatch {
    pub title: Option<String>,
    pub authors: Option<Vec<String>>,
    pub year: Option<Option<i32>>,
    pub source_title: Option<String>,
    pub doi: Option<Option<String>>,
    pub affiliations: Option<BTreeSet<String>>,
    pub countries: Option<BTreeSet<String>>,
    pub keywords: Option<BTreeSet<String>>,
    pub citation_count: Option<u32>,
    pub notes: Option<String>,
}

impl VaultPatch {
    /// Whether applying the patch would change nothing.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub(crate) fn apply(self, entry: &mut VaultEntry) {
        let record = &mut entry.record;
        if let Some(title) = self.title {
            record.title = title;
        }
        if let Some(authors) = self.authors {
            record.authors = authors;
        }
        if let Some(year) = self.year {
            record.year = year;
        }
        if let Some(source_title) = self.source_title {
            record.source_title = source_title;
        }
        if let Some(doi) = self.doi {
            record.doi = doi.as_deref().and_then(display_doi);
        }
        if let Some(affiliations) = self.affiliations {
            record.affiliations = affiliations;
        }
        if let Some(countries) = self.countries {
            record.countries = countries;
        }
        if let Some(keywords) = self.keywords {
            record.keywords = keywords;
        }
        if let Some(citation_count) = self.citation_count {
            record.citation_count = citation_count;
        }
        if let Some(notes) = self.notes {
            entry.notes = notes;
        }
    }
}

/// One-line APA-style preview of an entry.
///
/// ```
/// use bibharmony::CanonicalRecord;
/// use bibharmony::vault::{VaultEntry, VaultId, format_apa};
///
/// let now = chrono::Utc::now();
/// let entry = VaultEntry {
///     vault_id: VaultId(1),
///     record: CanonicalRecord {
///         title: "Mapping the Machine Learning Landscape".to_string(),
///         authors: vec!["Hassan, M.".to_string(), "Kabir, M. E.".to_string()],
///         year: Some(2025),
///         source_title: "IEEE Access".to_string(),
///         doi: Some("10.1109/ACCESS.2025.3620637".to_string()),
///         ..Default::default()
///     },
///     added_at: now,
///     updated_at: now,
///     notes: String::new(),
/// };
/// assert_eq!(
///     format_apa(&entry),
///     "Hassan, M., Kabir, M. E. (2025). Mapping the Machine Learning Landscape. \
///      *IEEE Access*. https://doi.org/10.1109/ACCESS.2025.3620637"
/// );
/// ```
pub fn format_apa(entry: &VaultEntry) -> String {
    let record = &entry.record;
    let mut out = String::new();
    if !record.authors.is_empty() {
        out.push_str(&record.authors.iter().join(", "));
        out.push(' ');
    }
    match record.year {
        Some(year) => out.push_str(&format!("({year}). ")),
        None => out.push_str("(n.d.). "),
    }
    out.push_str(record.title.trim_end_matches('.'));
    out.push('.');
    if !record.source_title.is_empty() {
        out.push_str(&format!(" *{}*.", record.source_title));
    }
    if let Some(doi) = &record.doi {
        out.push_str(&format!(" https://doi.org/{doi}"));
    }
    out
}
