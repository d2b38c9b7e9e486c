//! Harmonize bibliographic exports from Scopus and Web of Science and keep a
//! curated citation vault.
//!
//! `bibharmony` reads the tabular exports both databases produce, maps their
//! differing column conventions onto one canonical record, reconciles the
//! records into a single deduplicated corpus and stores curated records in a
//! persistent vault that can be exported as BibTeX or RIS.
//!
//! # Key Features
//!
//! - **Schema normalization**: versioned, configurable column mappings for
//!   Scopus CSV and WoS tab-delimited exports
//! - **Record matching**:
//!   - DOI-based matching first
//!   - Token-overlap title matching with year proximity as a fallback
//!   - Low-confidence pairs are reported, never merged
//! - **Harmonization**: deterministic grouping, field-level merge policy,
//!   provenance and a conflict report; optional parallel matching
//! - **Citation vault**: append/update store with atomic persistence
//! - **Interchange**: BibTeX and RIS encoding and decoding
//!
//! # Basic Usage
//!
//! ```rust
//! use bibharmony::export::read_export;
//! use bibharmony::harmonize::{Harmonizer, SourceSet};
//! use bibharmony::schema::SchemaNormalizer;
//! use bibharmony::{Origin, Source};
//!
//! let scopus = "Title,Year,DOI\nDeep Learning for X,2020,10.1/ABC\n";
//! let wos = "TI\tPY\tDI\nDeep Learning for X\t2020\t10.1/abc\n";
//!
//! let normalizer = SchemaNormalizer::new();
//! let scopus = normalizer.normalize_all(&read_export(scopus, Source::Scopus).unwrap(), Source::Scopus);
//! let wos = normalizer.normalize_all(&read_export(wos, Source::Wos).unwrap(), Source::Wos);
//!
//! let result = Harmonizer::new().harmonize(&[
//!     SourceSet::new(Origin::Scopus, scopus.records),
//!     SourceSet::new(Origin::Wos, wos.records),
//! ]);
//! assert_eq!(result.records.len(), 1);
//! assert_eq!(result.records[0].source_count, 2);
//! assert_eq!(result.records[0].record.origin, Origin::Combined);
//! ```
//!
//! # Citation Vault
//!
//! ```rust,no_run
//! use bibharmony::vault::Vault;
//! use bibharmony::{CanonicalRecord, Format};
//!
//! let vault = Vault::open("vault/citations.json").unwrap();
//! let entry = vault
//!     .add(CanonicalRecord {
//!         title: "Mapping the Machine Learning Landscape".to_string(),
//!         doi: Some("10.1109/ACCESS.2025.3620637".to_string()),
//!         ..Default::default()
//!     })
//!     .unwrap();
//! println!("added {}", entry.vault_id);
//! println!("{}", vault.export(Format::BibTex));
//! ```
//!
//! # Error Handling
//!
//! Each component reports its own error type ([`schema::MalformedRecord`],
//! [`ParseError`], [`vault::VaultError`], [`config::ConfigError`],
//! [`export::ExportError`]); the crate-level [`Error`] wraps all of them for
//! callers that want a single type.
//!
//! # Thread Safety
//!
//! The vault serializes writers and hands readers immutable snapshots, so it
//! can be shared between threads behind an `Arc`. The harmonizer can spread
//! pairwise matching across a rayon pool (`parallel` feature).

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub mod bibtex;
pub mod bridge;
pub mod codec;
pub mod config;
pub mod error;
pub mod export;
pub mod harmonize;
pub mod matcher;
mod regex;
pub mod ris;
pub mod schema;
mod utils;
pub mod vault;

// Reexports
pub use bibtex::BibTexCodec;
pub use codec::{Format, RecordCodec};
pub use error::ParseError;
pub use ris::RisCodec;
pub use utils::{display_doi, doi_key};

/// A specialized Result type for crate-level operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the crate's fallible entry points.
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Vault(#[from] vault::VaultError),

    #[error(transparent)]
    Config(#[from] config::ConfigError),

    #[error(transparent)]
    Export(#[from] export::ExportError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// The database an export was taken from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Source {
    Scopus,
    #[serde(rename = "WoS")]
    Wos,
}

impl Source {
    /// Short lower-case name used in generated record keys.
    pub fn slug(self) -> &'static str {
        match self {
            Source::Scopus => "scopus",
            Source::Wos => "wos",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Origin::from(*self).fmt(f)
    }
}

/// Provenance tag of a canonical record.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum Origin {
    Scopus,
    #[serde(rename = "WoS")]
    Wos,
    /// Merged from both databases, or of unrecorded provenance.
    #[default]
    Combined,
}

impl From<Source> for Origin {
    fn from(source: Source) -> Self {
        match source {
            Source::Scopus => Origin::Scopus,
            Source::Wos => Origin::Wos,
        }
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Origin::Scopus => "Scopus",
            Origin::Wos => "Web of Science",
            Origin::Combined => "Combined",
        })
    }
}

impl FromStr for Origin {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "scopus" => Ok(Origin::Scopus),
            "wos" | "web of science" | "web of science core collection" => Ok(Origin::Wos),
            "combined" => Ok(Origin::Combined),
            other => Err(format!("unknown origin: '{other}'")),
        }
    }
}

/// A bibliographic record in the canonical schema shared by every source.
#[derive(
    Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct CanonicalRecord {
    /// Title of the work, never empty once normalized
    pub title: String,
    /// Author names in publication order
    pub authors: Vec<String>,
    /// Publication year, `None` when unknown
    pub year: Option<i32>,
    /// Journal, proceedings or book title
    pub source_title: String,
    /// DOI as it should be displayed (original casing)
    pub doi: Option<String>,
    /// Author affiliations
    pub affiliations: BTreeSet<String>,
    /// Countries derived from the affiliations
    pub countries: BTreeSet<String>,
    /// Lower-cased author and index keywords
    pub keywords: BTreeSet<String>,
    /// Times cited as reported by the source database
    pub citation_count: u32,
    /// Which database the record came from
    pub origin: Origin,
    /// Back-reference to the raw export row, for auditing only
    pub raw_key: String,
}

impl CanonicalRecord {
    /// The DOI in comparison form: lower-cased with URL prefixes removed.
    pub fn doi_key(&self) -> Option<String> {
        self.doi.as_deref().and_then(doi_key)
    }
}
