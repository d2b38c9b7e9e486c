//! Country name normalization for affiliation strings.

use std::collections::{BTreeMap, HashMap};

/// Alias → canonical country name, lower-case keys.
const DEFAULT_COUNTRIES: &[(&str, &str)] = &[
    ("usa", "United States"),
    ("u.s.a", "United States"),
    ("us", "United States"),
    ("united states", "United States"),
    ("united states of america", "United States"),
    ("uk", "United Kingdom"),
    ("united kingdom", "United Kingdom"),
    ("england", "United Kingdom"),
    ("scotland", "United Kingdom"),
    ("wales", "United Kingdom"),
    ("north ireland", "United Kingdom"),
    ("northern ireland", "United Kingdom"),
    ("china", "China"),
    ("peoples r china", "China"),
    ("people's republic of china", "China"),
    ("pr china", "China"),
    ("p.r. china", "China"),
    ("south korea", "South Korea"),
    ("korea south", "South Korea"),
    ("republic of korea", "South Korea"),
    ("iran", "Iran"),
    ("iran islamic republic", "Iran"),
    ("islamic republic of iran", "Iran"),
    ("russia", "Russia"),
    ("russian federation", "Russia"),
    ("vietnam", "Vietnam"),
    ("viet nam", "Vietnam"),
    ("turkey", "Turkey"),
    ("turkiye", "Turkey"),
    ("u arab emirates", "United Arab Emirates"),
    ("united arab emirates", "United Arab Emirates"),
    ("uae", "United Arab Emirates"),
    ("taiwan", "Taiwan"),
    ("hong kong", "Hong Kong"),
    ("japan", "Japan"),
    ("india", "India"),
    ("germany", "Germany"),
    ("france", "France"),
    ("italy", "Italy"),
    ("spain", "Spain"),
    ("canada", "Canada"),
    ("australia", "Australia"),
    ("brazil", "Brazil"),
    ("netherlands", "Netherlands"),
    ("the netherlands", "Netherlands"),
    ("switzerland", "Switzerland"),
    ("sweden", "Sweden"),
    ("thailand", "Thailand"),
    ("bangladesh", "Bangladesh"),
    ("pakistan", "Pakistan"),
    ("malaysia", "Malaysia"),
    ("singapore", "Singapore"),
    ("indonesia", "Indonesia"),
    ("saudi arabia", "Saudi Arabia"),
    ("egypt", "Egypt"),
    ("south africa", "South Africa"),
    ("nigeria", "Nigeria"),
    ("mexico", "Mexico"),
];

/// Lookup table that resolves the country at the end of an affiliation.
#[derive(Debug, Clone)]
pub struct CountryTable {
    aliases: HashMap<String, String>,
}

impl Default for CountryTable {
    fn default() -> Self {
        Self::new()
    }
}

impl CountryTable {
    #[must_use]
    pub fn new() -> Self {
        Self {
            aliases: DEFAULT_COUNTRIES
                .iter()
                .map(|(alias, name)| (alias.to_string(), name.to_string()))
                .collect(),
        }
    }

    /// Adds or replaces aliases; keys are matched case-insensitively.
    #[must_use]
    pub fn with_overrides(mut self, overrides: &BTreeMap<String, String>) -> Self {
        for (alias, name) in overrides {
            self.aliases
                .insert(alias.trim().to_lowercase(), name.trim().to_string());
        }
        self
    }

    fn lookup(&self, token: &str) -> Option<&str> {
        self.aliases
            .get(&token.trim().to_lowercase())
            .map(String::as_str)
    }

    /// Normalizes a country token, keeping unknown tokens verbatim.
    pub fn canonical(&self, token: &str) -> Option<String> {
        let token = token.trim().trim_end_matches('.').trim();
        if token.is_empty() {
            return None;
        }
        if let Some(name) = self.lookup(token) {
            return Some(name.to_string());
        }
        // "CA 94305 USA", "Beijing 100084" and similar postal suffixes
        if let Some(name) = token.split_whitespace().last().and_then(|w| self.lookup(w)) {
            return Some(name.to_string());
        }
        Some(token.to_string())
    }

    /// Country of one affiliation: its last comma-separated segment.
    pub fn from_affiliation(&self, affiliation: &str) -> Option<String> {
        affiliation
            .rsplit(',')
            .next()
            .and_then(|segment| self.canonical(segment))
    }
}
