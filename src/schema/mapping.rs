//! Column mappings from source exports to canonical fields.

use crate::Source;
use serde::{Deserialize, Serialize};

/// Header aliases for each canonical field, matched case-insensitively.
///
/// The first alias that is present with a non-empty value wins.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnAliases {
    pub title: Vec<String>,
    pub authors: Vec<String>,
    /// Consulted only when `authors` is empty
    pub authors_full: Vec<String>,
    pub year: Vec<String>,
    pub source_title: Vec<String>,
    pub doi: Vec<String>,
    pub affiliations: Vec<String>,
    pub author_keywords: Vec<String>,
    pub index_keywords: Vec<String>,
    pub cited_by: Vec<String>,
    pub countries: Vec<String>,
    pub raw_key: Vec<String>,
}

/// How one source's export is mapped to the canonical schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceMapping {
    #[serde(default)]
    pub columns: ColumnAliases,
    #[serde(default = "default_delimiter")]
    pub author_delimiter: String,
    #[serde(default = "default_delimiter")]
    pub affiliation_delimiter: String,
    #[serde(default = "default_delimiter")]
    pub keyword_delimiter: String,
}

fn default_delimiter() -> String {
    ";".to_string()
}

fn aliases(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

impl SourceMapping {
    /// Built-in mapping for the given source.
    pub fn for_source(source: Source) -> Self {
        match source {
            Source::Scopus => Self::scopus(),
            Source::Wos => Self::wos(),
        }
    }

    /// Column names of the Scopus CSV export.
    pub fn scopus() -> Self {
        Self {
            columns: ColumnAliases {
                title: aliases(&["Title"]),
                authors: aliases(&["Authors"]),
                authors_full: aliases(&["Author full names"]),
                year: aliases(&["Year"]),
                source_title: aliases(&["Source title"]),
                doi: aliases(&["DOI"]),
                affiliations: aliases(&["Affiliations"]),
                author_keywords: aliases(&["Author Keywords"]),
                index_keywords: aliases(&["Index Keywords"]),
                cited_by: aliases(&["Cited by"]),
                countries: aliases(&["Country/Territory"]),
                raw_key: aliases(&["EID"]),
            },
            author_delimiter: default_delimiter(),
            affiliation_delimiter: default_delimiter(),
            keyword_delimiter: default_delimiter(),
        }
    }

    /// Field tags of the Web of Science tab-delimited export.
    pub fn wos() -> Self {
        Self {
            columns: ColumnAliases {
                title: aliases(&["TI"]),
                authors: aliases(&["AU"]),
                authors_full: aliases(&["AF"]),
                year: aliases(&["PY"]),
                source_title: aliases(&["SO"]),
                doi: aliases(&["DI"]),
                affiliations: aliases(&["C1"]),
                author_keywords: aliases(&["DE"]),
                index_keywords: aliases(&["ID"]),
                cited_by: aliases(&["TC", "Z9"]),
                countries: aliases(&["CU"]),
                raw_key: aliases(&["UT"]),
            },
            author_delimiter: default_delimiter(),
            affiliation_delimiter: default_delimiter(),
            keyword_delimiter: default_delimiter(),
        }
    }
}
