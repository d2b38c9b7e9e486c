//! Harmonization of Scopus and Web of Science exports into one corpus.
//!
//! The engine flattens every input set, sorts the records canonically and then
//! groups them in two passes:
//!
//! 1. **DOI pass**: records with equal DOI keys join one group.
//! 2. **Title pass**: within year blocks (a year is compared against itself
//!    and the following year; records without a year are compared against
//!    everything) the [`RecordMatcher`] scores every pair that is not already
//!    decided by DOIs. Verdicts can be computed in parallel; they are always
//!    applied sequentially in canonical pair order, so the outcome does not
//!    depend on scheduling or input order.
//!
//! Records whose known years are more than one apart are never scored, so
//! [`MatcherConfig::far_year_factor`] has no effect on grouping.
//!
//! A group never holds two different DOIs. A title match that would join
//! groups with conflicting DOIs is refused and reported, as are ambiguous
//! pairs that stay apart. Groups are transitive, so every pair of members in
//! a merged group is checked again: a pair that does not match on its own is
//! reported as an [`IndirectMerge`](ConflictKind::IndirectMerge).
//!
//! ## Merge policy
//!
//! | Field | Merged value |
//! |---|---|
//! | `title` | longest title not truncated with `...`, first on ties |
//! | `authors` | union in first-seen order, case-insensitive |
//! | `year`, `doi` | first present |
//! | `source_title` | longest |
//! | `citation_count` | maximum |
//! | `keywords`, `affiliations`, `countries` | union |
//! | `origin` | `Combined` when the group spans both databases |
//! | `raw_key` | first member's |

use crate::matcher::{
    MatchKind, MatchVerdict, MatcherConfig, PreparedRecord, RecordMatcher, normalize_title,
};
use crate::{CanonicalRecord, Origin};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info, warn};

/// Records of one export, tagged with where they came from.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceSet {
    pub origin: Origin,
    pub records: Vec<CanonicalRecord>,
}

impl SourceSet {
    pub fn new(origin: Origin, records: Vec<CanonicalRecord>) -> Self {
        Self { origin, records }
    }
}

/// Which databases take part in a harmonization run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HarmonizeMode {
    ScopusOnly,
    WosOnly,
    #[default]
    Combined,
}

impl HarmonizeMode {
    /// Whether records of `origin` take part in this mode.
    pub fn includes(self, origin: Origin) -> bool {
        match self {
            HarmonizeMode::ScopusOnly => origin == Origin::Scopus,
            HarmonizeMode::WosOnly => origin == Origin::Wos,
            HarmonizeMode::Combined => true,
        }
    }

    /// Keeps the input sets that take part in this mode.
    pub fn select(self, sets: Vec<SourceSet>) -> Vec<SourceSet> {
        sets.into_iter()
            .filter(|set| self.includes(set.origin))
            .collect()
    }
}

impl fmt::Display for HarmonizeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            HarmonizeMode::ScopusOnly => "scopus",
            HarmonizeMode::WosOnly => "wos",
            HarmonizeMode::Combined => "combined",
        })
    }
}

impl FromStr for HarmonizeMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "scopus" | "scopus-only" => Ok(HarmonizeMode::ScopusOnly),
            "wos" | "wos-only" => Ok(HarmonizeMode::WosOnly),
            "combined" | "both" => Ok(HarmonizeMode::Combined),
            other => Err(format!("unknown mode: '{other}'")),
        }
    }
}

/// Configuration options for the harmonization run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HarmonizerConfig {
    /// Score candidate pairs on the rayon pool. Ignored without the
    /// `parallel` feature.
    pub run_in_parallel: bool,
    pub matcher: MatcherConfig,
}

impl Default for HarmonizerConfig {
    fn default() -> Self {
        Self {
            run_in_parallel: true,
            matcher: MatcherConfig::default(),
        }
    }
}

/// One publication of the harmonized corpus.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HarmonizedRecord {
    /// The merged record
    pub record: CanonicalRecord,
    /// Number of input records merged into this one
    pub source_count: usize,
    /// Raw keys of the merged input records, in canonical order
    pub members: Vec<String>,
}

/// Why a pair of records needs review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConflictKind {
    /// The title score fell between the thresholds
    Ambiguous,
    /// The titles match but the records' groups carry different DOIs
    DoiConflict,
    /// The pair did not match on its own but ended in one group through
    /// other members
    IndirectMerge,
}

impl fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConflictKind::Ambiguous => "ambiguous",
            ConflictKind::DoiConflict => "doi-conflict",
            ConflictKind::IndirectMerge => "indirect-merge",
        })
    }
}

/// A pair of records that a curator should look at.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchConflict {
    pub kind: ConflictKind,
    pub left_key: String,
    pub left_title: String,
    pub right_key: String,
    pub right_title: String,
    pub score: f64,
}

/// Conflicts of one run, in canonical pair order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConflictReport {
    pub conflicts: Vec<MatchConflict>,
}

impl ConflictReport {
    pub fn len(&self) -> usize {
        self.conflicts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conflicts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MatchConflict> {
        self.conflicts.iter()
    }

    /// Conflicts of one kind.
    pub fn of_kind(&self, kind: ConflictKind) -> impl Iterator<Item = &MatchConflict> {
        self.conflicts.iter().filter(move |c| c.kind == kind)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct HarmonizationResult {
    pub records: Vec<HarmonizedRecord>,
    pub conflicts: ConflictReport,
}

/// Union-find over record indices.
///
/// The root of a group is always its smallest index, and each root carries
/// the DOI key of its group so DOI conflicts are caught when joining.
struct Groups {
    parent: Vec<usize>,
    doi: Vec<Option<String>>,
}

impl Groups {
    fn new(prepared: &[PreparedRecord]) -> Self {
        Self {
            parent: (0..prepared.len()).collect(),
            doi: prepared.iter().map(|p| p.doi_key.clone()).collect(),
        }
    }

    fn find(&mut self, i: usize) -> usize {
        let mut root = i;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        let mut node = i;
        while self.parent[node] != root {
            let next = self.parent[node];
            self.parent[node] = root;
            node = next;
        }
        root
    }

    /// Joins the groups of `a` and `b`; returns `false` if their DOIs differ.
    fn union(&mut self, a: usize, b: usize) -> bool {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra == rb {
            return true;
        }
        if let (Some(x), Some(y)) = (&self.doi[ra], &self.doi[rb]) {
            if x != y {
                return false;
            }
        }
        let (root, child) = if ra < rb { (ra, rb) } else { (rb, ra) };
        self.parent[child] = root;
        if self.doi[root].is_none() {
            self.doi[root] = self.doi[child].take();
        }
        true
    }
}

/// Merges source sets into a deduplicated corpus.
///
/// # Examples
///
/// ```
/// use bibharmony::harmonize::{Harmonizer, HarmonizerConfig, SourceSet};
/// use bibharmony::{CanonicalRecord, Origin};
///
/// let record = |title: &str| CanonicalRecord {
///     title: title.to_string(),
///     year: Some(2021),
///     ..Default::default()
/// };
///
/// let harmonizer = Harmonizer::new().with_config(HarmonizerConfig {
///     run_in_parallel: false,
///     ..Default::default()
/// });
/// let result = harmonizer.harmonize(&[
///     SourceSet::new(Origin::Scopus, vec![record("Machine Learning Survey")]),
///     SourceSet::new(Origin::Wos, vec![record("A Survey of Machine Learning")]),
/// ]);
///
/// assert_eq!(result.records.len(), 2);
/// assert_eq!(result.conflicts.len(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Harmonizer {
    config: HarmonizerConfig,
    matcher: RecordMatcher,
}

impl Harmonizer {
    /// Creates a harmonizer with default matching thresholds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_config(mut self, config: HarmonizerConfig) -> Self {
        self.matcher = RecordMatcher::new().with_config(config.matcher);
        self.config = config;
        self
    }

    pub fn config(&self) -> &HarmonizerConfig {
        &self.config
    }

    /// Harmonizes the given source sets.
    ///
    /// Records of a set tagged `Scopus` or `WoS` take that origin; records of
    /// a `Combined` set keep their own.
    pub fn harmonize(&self, inputs: &[SourceSet]) -> HarmonizationResult {
        let records = Self::canonical_order(inputs);
        let prepared: Vec<PreparedRecord> = records.iter().map(PreparedRecord::new).collect();
        let mut groups = Groups::new(&prepared);

        // DOI pass
        let mut first_with_doi: HashMap<&str, usize> = HashMap::new();
        for (i, p) in prepared.iter().enumerate() {
            if let Some(key) = p.doi_key.as_deref() {
                match first_with_doi.get(key) {
                    Some(&first) => {
                        groups.union(first, i);
                    }
                    None => {
                        first_with_doi.insert(key, i);
                    }
                }
            }
        }

        let pairs = Self::candidate_pairs(&prepared, &mut groups);
        let verdicts = self.score_pairs(&prepared, &pairs);

        let mut conflicts = Vec::new();
        let mut ambiguous = Vec::new();
        for (i, j, verdict) in verdicts {
            match verdict.kind {
                MatchKind::Same => {
                    if !groups.union(i, j) {
                        warn!(
                            left = %records[i].raw_key,
                            right = %records[j].raw_key,
                            "Title match refused: DOIs disagree"
                        );
                        conflicts.push((i, j, conflict(ConflictKind::DoiConflict, &records, i, j, verdict)));
                    }
                }
                MatchKind::Ambiguous => ambiguous.push((i, j, verdict)),
                MatchKind::Different => {}
            }
        }
        for (i, j, verdict) in ambiguous {
            if groups.find(i) != groups.find(j) {
                debug!(left = %records[i].raw_key, right = %records[j].raw_key, score = verdict.score, "Ambiguous pair");
                conflicts.push((i, j, conflict(ConflictKind::Ambiguous, &records, i, j, verdict)));
            }
        }

        let mut members: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for i in 0..records.len() {
            members.entry(groups.find(i)).or_default().push(i);
        }
        for indices in members.values() {
            for (n, &i) in indices.iter().enumerate() {
                for &j in &indices[n + 1..] {
                    let verdict = self.matcher.compare_prepared(&prepared[i], &prepared[j]);
                    if verdict.kind != MatchKind::Same {
                        warn!(
                            left = %records[i].raw_key,
                            right = %records[j].raw_key,
                            score = verdict.score,
                            "Records merged through other group members"
                        );
                        conflicts.push((i, j, conflict(ConflictKind::IndirectMerge, &records, i, j, verdict)));
                    }
                }
            }
        }
        conflicts.sort_by_key(|&(i, j, _)| (i, j));
        let conflicts: Vec<MatchConflict> = conflicts.into_iter().map(|(_, _, c)| c).collect();

        let harmonized: Vec<HarmonizedRecord> = members
            .values()
            .map(|indices| merge_group(indices.iter().map(|&i| &records[i]).collect()))
            .collect();

        info!(
            input = records.len(),
            output = harmonized.len(),
            merged = records.len() - harmonized.len(),
            conflicts = conflicts.len(),
            "Harmonization finished"
        );

        HarmonizationResult {
            records: harmonized,
            conflicts: ConflictReport { conflicts },
        }
    }

    /// Flattens the inputs and sorts them by normalized title, then by full
    /// record content.
    fn canonical_order(inputs: &[SourceSet]) -> Vec<CanonicalRecord> {
        let mut keyed: Vec<(String, CanonicalRecord)> = inputs
            .iter()
            .flat_map(|set| {
                set.records.iter().map(move |record| {
                    let mut record = record.clone();
                    if set.origin != Origin::Combined {
                        record.origin = set.origin;
                    }
                    (normalize_title(&record.title), record)
                })
            })
            .collect();
        keyed.sort();
        keyed.into_iter().map(|(_, record)| record).collect()
    }

    /// Index pairs `(i, j)`, `i < j`, worth scoring, in ascending order.
    fn candidate_pairs(prepared: &[PreparedRecord], groups: &mut Groups) -> Vec<(usize, usize)> {
        let mut by_year: BTreeMap<i32, Vec<usize>> = BTreeMap::new();
        let mut unknown_year = Vec::new();
        for (i, p) in prepared.iter().enumerate() {
            match p.record.year {
                Some(year) => by_year.entry(year).or_default().push(i),
                None => unknown_year.push(i),
            }
        }

        let mut pairs = HashSet::new();
        let mut push = |a: usize, b: usize| {
            if a != b {
                pairs.insert((a.min(b), a.max(b)));
            }
        };
        for (year, block) in &by_year {
            for (n, &a) in block.iter().enumerate() {
                for &b in &block[n + 1..] {
                    push(a, b);
                }
            }
            if let Some(next) = year.checked_add(1).and_then(|next| by_year.get(&next)) {
                for &a in block {
                    for &b in next {
                        push(a, b);
                    }
                }
            }
        }
        for &a in &unknown_year {
            for b in 0..prepared.len() {
                push(a, b);
            }
        }

        let mut pairs: Vec<(usize, usize)> = pairs
            .into_iter()
            .filter(|&(a, b)| {
                // Both carry DOIs: already settled by the DOI pass
                !(prepared[a].doi_key.is_some() && prepared[b].doi_key.is_some())
            })
            .filter(|&(a, b)| groups.find(a) != groups.find(b))
            .collect();
        pairs.sort_unstable();
        pairs
    }

    fn score_pairs(
        &self,
        prepared: &[PreparedRecord],
        pairs: &[(usize, usize)],
    ) -> Vec<(usize, usize, MatchVerdict)> {
        let score = |&(i, j): &(usize, usize)| {
            (i, j, self.matcher.compare_prepared(&prepared[i], &prepared[j]))
        };

        #[cfg(feature = "parallel")]
        {
            if self.config.run_in_parallel {
                use rayon::prelude::*;
                // collect() on an indexed parallel iterator keeps pair order
                return pairs.par_iter().map(score).collect();
            }
        }

        pairs.iter().map(score).collect()
    }
}

fn conflict(
    kind: ConflictKind,
    records: &[CanonicalRecord],
    i: usize,
    j: usize,
    verdict: MatchVerdict,
) -> MatchConflict {
    MatchConflict {
        kind,
        left_key: records[i].raw_key.clone(),
        left_title: records[i].title.clone(),
        right_key: records[j].raw_key.clone(),
        right_title: records[j].title.clone(),
        score: verdict.score,
    }
}

fn is_truncated(title: &str) -> bool {
    let title = title.trim_end();
    title.ends_with("...") || title.ends_with('…')
}

/// Longest value by character count, first on ties.
fn longest<'a>(values: impl Iterator<Item = &'a str>) -> Option<&'a str> {
    values.fold(None, |best: Option<&str>, value| match best {
        Some(b) if b.chars().count() >= value.chars().count() => Some(b),
        _ => Some(value),
    })
}

/// Merges the members of one group, given in canonical order.
fn merge_group(members: Vec<&CanonicalRecord>) -> HarmonizedRecord {
    let first = members[0];

    let title = longest(
        members
            .iter()
            .map(|r| r.title.as_str())
            .filter(|t| !is_truncated(t)),
    )
    .or_else(|| longest(members.iter().map(|r| r.title.as_str())))
    .unwrap_or_default()
    .to_string();

    let mut seen = HashSet::new();
    let authors = members
        .iter()
        .flat_map(|r| r.authors.iter())
        .filter(|name| seen.insert(name.to_lowercase()))
        .cloned()
        .collect();

    let origins: HashSet<Origin> = members.iter().map(|r| r.origin).collect();
    let origin = match (origins.len(), origins.iter().next()) {
        (1, Some(&only)) => only,
        _ => Origin::Combined,
    };

    let record = CanonicalRecord {
        title,
        authors,
        year: members.iter().find_map(|r| r.year),
        source_title: longest(members.iter().map(|r| r.source_title.as_str()))
            .unwrap_or_default()
            .to_string(),
        doi: members.iter().find_map(|r| r.doi.clone()),
        affiliations: members
            .iter()
            .flat_map(|r| r.affiliations.iter().cloned())
            .collect(),
        countries: members
            .iter()
            .flat_map(|r| r.countries.iter().cloned())
            .collect(),
        keywords: members
            .iter()
            .flat_map(|r| r.keywords.iter().cloned())
            .collect(),
        citation_count: members
            .iter()
            .map(|r| r.citation_count)
            .max()
            .unwrap_or_default(),
        origin,
        raw_key: first.raw_key.clone(),
    };

    HarmonizedRecord {
        record,
        source_count: members.len(),
        members: members.iter().map(|r| r.raw_key.clone()).collect(),
    }
}
