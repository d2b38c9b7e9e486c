//! Pairwise record matching.
//!
//! Two canonical records are compared in two stages:
//!
//! 1. **DOI**: when both records carry a DOI, the comparison keys decide
//!    alone. Equal keys are the same publication, unequal keys are not,
//!    whatever the titles say.
//! 2. **Title**: otherwise the titles are tokenized (lower-cased, punctuation
//!    stripped, stop words removed) and scored as the mean of the token-set
//!    overlap (Jaccard) and the token-order similarity (normalized Levenshtein
//!    distance over token sequences). The score is scaled by a year-proximity
//!    factor and compared against two thresholds.
//!
//! Scores between the thresholds are [`MatchKind::Ambiguous`]: such pairs are
//! surfaced for review and never merged automatically.
//!
//! # Example
//!
//! ```
//! use bibharmony::matcher::{MatchKind, RecordMatcher};
//! use bibharmony::CanonicalRecord;
//!
//! let a = CanonicalRecord {
//!     title: "Machine Learning Survey".to_string(),
//!     year: Some(2021),
//!     ..Default::default()
//! };
//! let b = CanonicalRecord {
//!     title: "A Survey of Machine Learning".to_string(),
//!     year: Some(2021),
//!     ..Default::default()
//! };
//!
//! let verdict = RecordMatcher::new().compare(&a, &b);
//! assert_eq!(verdict.kind, MatchKind::Ambiguous);
//! ```

use crate::CanonicalRecord;
use crate::regex::Regex;
use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::LazyLock;
use strsim::generic_levenshtein;
use tracing::trace;

static UNICODE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<U\+([0-9A-Fa-f]+)>").unwrap());

static MARKUP_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"</?(sup|sub|inf|i|b|em)>").unwrap());

const ENTITY_REPLACEMENTS: [(&str, &str); 3] = [("&lt;", "<"), ("&gt;", ">"), ("&amp;", "&")];

/// English words ignored when comparing titles.
const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "by", "for", "from", "in", "into", "is", "of", "on",
    "or", "the", "to", "via", "with",
];

/// Thresholds and factors of the title stage.
///
/// # Examples
///
/// ```
/// use bibharmony::matcher::{MatcherConfig, RecordMatcher};
///
/// let config = MatcherConfig {
///     same_threshold: 0.95,
///     ..Default::default()
/// };
/// let matcher = RecordMatcher::new().with_config(config);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatcherConfig {
    /// Scores at or above this are the same publication
    pub same_threshold: f64,
    /// Scores below this are different publications
    pub different_threshold: f64,
    /// Score multiplier when the years differ by exactly one
    pub near_year_factor: f64,
    /// Score multiplier when the years differ by more than one.
    ///
    /// Only [`RecordMatcher::compare`] applies it. The harmonizer never scores
    /// records whose known years are more than one apart, so there it cannot
    /// turn such a pair into a match.
    pub far_year_factor: f64,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            same_threshold: 0.90,
            different_threshold: 0.55,
            near_year_factor: 0.9,
            far_year_factor: 0.5,
        }
    }
}

/// Outcome of comparing two records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MatchKind {
    Same,
    Different,
    /// Too close to call; needs human review
    Ambiguous,
}

/// Which stage decided a verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MatchRule {
    Doi,
    Title,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MatchVerdict {
    pub kind: MatchKind,
    pub rule: MatchRule,
    /// Combined score in `[0, 1]`; 1.0 or 0.0 for DOI decisions
    pub score: f64,
}

/// A record with its comparison keys computed once.
#[derive(Debug)]
pub(crate) struct PreparedRecord<'a> {
    pub(crate) record: &'a CanonicalRecord,
    pub(crate) doi_key: Option<String>,
    pub(crate) normalized_title: String,
    pub(crate) tokens: Vec<CompactString>,
}

impl<'a> PreparedRecord<'a> {
    pub(crate) fn new(record: &'a CanonicalRecord) -> Self {
        let normalized_title = normalize_title(&record.title);
        let tokens = normalized_title
            .split(' ')
            .filter(|word| !word.is_empty() && !STOP_WORDS.contains(word))
            .map(CompactString::from)
            .collect();
        Self {
            record,
            doi_key: record.doi_key(),
            normalized_title,
            tokens,
        }
    }
}

/// Lower-cases a title, expands `<U+XXXX>` escapes, drops markup and replaces
/// every run of non-alphanumeric characters with one space.
pub(crate) fn normalize_title(title: &str) -> String {
    let mut s = UNICODE_REGEX
        .replace_all(title, |caps: &crate::regex::Captures| {
            u32::from_str_radix(&caps[1], 16)
                .ok()
                .and_then(char::from_u32)
                .map(|c| c.to_string())
                .unwrap_or_else(|| caps[0].to_string())
        })
        .to_lowercase();
    for (entity, replacement) in ENTITY_REPLACEMENTS {
        s = s.replace(entity, replacement);
    }
    let s = MARKUP_REGEX.replace_all(&s, "");

    s.split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Decides whether two canonical records denote the same publication.
#[derive(Debug, Default, Clone)]
pub struct RecordMatcher {
    config: MatcherConfig,
}

impl RecordMatcher {
    /// Creates a matcher with the default thresholds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_config(mut self, config: MatcherConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &MatcherConfig {
        &self.config
    }

    /// Compares two records.
    pub fn compare(&self, a: &CanonicalRecord, b: &CanonicalRecord) -> MatchVerdict {
        self.compare_prepared(&PreparedRecord::new(a), &PreparedRecord::new(b))
    }

    pub(crate) fn compare_prepared(&self, a: &PreparedRecord, b: &PreparedRecord) -> MatchVerdict {
        if let (Some(x), Some(y)) = (&a.doi_key, &b.doi_key) {
            let same = x == y;
            return MatchVerdict {
                kind: if same { MatchKind::Same } else { MatchKind::Different },
                rule: MatchRule::Doi,
                score: if same { 1.0 } else { 0.0 },
            };
        }

        let score = title_score(a, b) * self.year_factor(a.record.year, b.record.year);
        let kind = if score >= self.config.same_threshold {
            MatchKind::Same
        } else if score < self.config.different_threshold {
            MatchKind::Different
        } else {
            MatchKind::Ambiguous
        };

        trace!(a = %a.record.raw_key, b = %b.record.raw_key, score, ?kind, "Compared titles");
        MatchVerdict {
            kind,
            rule: MatchRule::Title,
            score,
        }
    }

    fn year_factor(&self, a: Option<i32>, b: Option<i32>) -> f64 {
        match (a, b) {
            (Some(a), Some(b)) => match a.abs_diff(b) {
                0 => 1.0,
                1 => self.config.near_year_factor,
                _ => self.config.far_year_factor,
            },
            _ => 1.0,
        }
    }
}

/// Mean of token-set overlap and token-order similarity.
fn title_score(a: &PreparedRecord, b: &PreparedRecord) -> f64 {
    if a.tokens.is_empty() || b.tokens.is_empty() {
        let equal = !a.normalized_title.is_empty() && a.normalized_title == b.normalized_title;
        return if a.tokens.is_empty() && b.tokens.is_empty() && equal {
            1.0
        } else {
            0.0
        };
    }

    let set_a: HashSet<&CompactString> = a.tokens.iter().collect();
    let set_b: HashSet<&CompactString> = b.tokens.iter().collect();
    let shared = set_a.intersection(&set_b).count();
    let overlap = shared as f64 / set_a.union(&set_b).count() as f64;

    let longest = a.tokens.len().max(b.tokens.len());
    let distance = generic_levenshtein(&a.tokens, &b.tokens);
    let order = 1.0 - distance as f64 / longest as f64;

    (overlap + order) / 2.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::*;

    fn record(title: &str, year: Option<i32>, doi: Option<&str>) -> CanonicalRecord {
        CanonicalRecord {
            title: title.to_string(),
            year,
            doi: doi.map(String::from),
            ..Default::default()
        }
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_equal_doi_keys_are_same() {
        let verdict = RecordMatcher::new().compare(
            &record("Deep Learning for X", Some(2020), Some("10.1/ABC")),
            &record("Something else entirely", Some(2015), Some("https://doi.org/10.1/abc")),
        );
        assert_eq!(verdict.kind, MatchKind::Same);
        assert_eq!(verdict.rule, MatchRule::Doi);
        assert_eq!(verdict.score, 1.0);
    }

    #[test]
    fn test_different_dois_win_over_identical_titles() {
        let verdict = RecordMatcher::new().compare(
            &record("Deep Learning for X", Some(2020), Some("10.1/abc")),
            &record("Deep Learning for X", Some(2020), Some("10.1/abd")),
        );
        assert_eq!(verdict.kind, MatchKind::Different);
        assert_eq!(verdict.rule, MatchRule::Doi);
    }

    #[test]
    fn test_one_sided_doi_falls_back_to_title() {
        let verdict = RecordMatcher::new().compare(
            &record("Deep Learning for X", Some(2020), Some("10.1/abc")),
            &record("Deep learning for X.", Some(2020), None),
        );
        assert_eq!(verdict.kind, MatchKind::Same);
        assert_eq!(verdict.rule, MatchRule::Title);
        assert!(approx(verdict.score, 1.0));
    }

    #[test]
    fn test_reordered_title_is_ambiguous() {
        let verdict = RecordMatcher::new().compare(
            &record("Machine Learning Survey", Some(2021), None),
            &record("A Survey of Machine Learning", Some(2021), None),
        );
        assert_eq!(verdict.kind, MatchKind::Ambiguous);
        assert!(approx(verdict.score, 2.0 / 3.0));
    }

    #[test]
    fn test_unrelated_titles_are_different() {
        let verdict = RecordMatcher::new().compare(
            &record("Graph neural networks for traffic", Some(2021), None),
            &record("Soil moisture retrieval from radar", Some(2021), None),
        );
        assert_eq!(verdict.kind, MatchKind::Different);
        assert!(approx(verdict.score, 0.0));
    }

    #[rstest]
    #[case(Some(2020), Some(2020), 1.0, MatchKind::Same)]
    #[case(Some(2020), Some(2021), 0.9, MatchKind::Same)]
    #[case(Some(2020), Some(2022), 0.5, MatchKind::Different)]
    #[case(None, Some(2022), 1.0, MatchKind::Same)]
    fn test_year_factor(
        #[case] year_a: Option<i32>,
        #[case] year_b: Option<i32>,
        #[case] expected_score: f64,
        #[case] expected_kind: MatchKind,
    ) {
        let verdict = RecordMatcher::new().compare(
            &record("Federated learning at the edge", year_a, None),
            &record("Federated Learning at the Edge", year_b, None),
        );
        assert!(approx(verdict.score, expected_score));
        assert_eq!(verdict.kind, expected_kind);
    }

    #[rstest]
    #[case(i32::MIN, 1)]
    #[case(i32::MAX, i32::MIN)]
    #[case(i32::MAX, i32::MAX - 1)]
    fn test_extreme_years(#[case] year_a: i32, #[case] year_b: i32) {
        let verdict = RecordMatcher::new().compare(
            &record("Federated learning at the edge", Some(year_a), None),
            &record("Federated Learning at the Edge", Some(year_b), None),
        );
        let expected = if year_a.abs_diff(year_b) == 1 { 0.9 } else { 0.5 };
        assert!(approx(verdict.score, expected));
    }

    #[test]
    fn test_thresholds_come_from_config() {
        let matcher = RecordMatcher::new().with_config(MatcherConfig {
            same_threshold: 0.6,
            ..Default::default()
        });
        let verdict = matcher.compare(
            &record("Machine Learning Survey", Some(2021), None),
            &record("A Survey of Machine Learning", Some(2021), None),
        );
        assert_eq!(verdict.kind, MatchKind::Same);
    }

    #[test]
    fn test_stop_word_only_titles() {
        let matcher = RecordMatcher::new();
        let verdict = matcher.compare(&record("The Of", None, None), &record("the of", None, None));
        assert_eq!(verdict.kind, MatchKind::Same);

        let verdict = matcher.compare(&record("The Of", None, None), &record("On", None, None));
        assert_eq!(verdict.kind, MatchKind::Different);
    }

    #[rstest]
    #[case("Deep  Learning: a Review!", "deep learning a review")]
    #[case("CO<sub>2</sub> capture", "co2 capture")]
    #[case("Caf<U+00E9> culture", "café culture")]
    #[case("Risk &amp; reward", "risk reward")]
    fn test_normalize_title(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(normalize_title(input), expected);
    }
}
