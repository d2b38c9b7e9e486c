//! Interchange formats for canonical records.
//!
//! # Example
//!
//! ```
//! use bibharmony::{CanonicalRecord, Format};
//!
//! let records = vec![CanonicalRecord {
//!     title: "Example Title".to_string(),
//!     authors: vec!["Smith, John".to_string()],
//!     year: Some(2023),
//!     ..Default::default()
//! }];
//!
//! let text = Format::Ris.encode(&records);
//! assert_eq!(Format::Ris.decode(&text).unwrap(), records);
//! ```

use crate::{BibTexCodec, CanonicalRecord, ParseError, RisCodec};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Trait for implementing record codecs.
pub trait RecordCodec {
    /// The format this codec reads and writes.
    fn format(&self) -> Format;

    /// Serialize records into interchange text, one block per record.
    fn encode(&self, records: &[CanonicalRecord]) -> String;

    /// Parse interchange text into records.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError`] for the first structurally malformed block;
    /// no records are returned in that case.
    fn decode(&self, input: &str) -> Result<Vec<CanonicalRecord>, ParseError>;
}

/// Supported interchange formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Format {
    BibTex,
    Ris,
}

impl Format {
    /// File extension, without the dot.
    pub fn extension(self) -> &'static str {
        match self {
            Format::BibTex => "bib",
            Format::Ris => "ris",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            Format::BibTex => "application/x-bibtex",
            Format::Ris => "application/x-research-info-systems",
        }
    }

    /// Guess the format from a file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?.to_lowercase();
        match extension.as_str() {
            "bib" | "bibtex" => Some(Format::BibTex),
            "ris" => Some(Format::Ris),
            _ => None,
        }
    }

    fn codec(self) -> &'static dyn RecordCodec {
        match self {
            Format::BibTex => &BibTexCodec,
            Format::Ris => &RisCodec,
        }
    }

    pub fn encode(self, records: &[CanonicalRecord]) -> String {
        self.codec().encode(records)
    }

    pub fn decode(self, input: &str) -> Result<Vec<CanonicalRecord>, ParseError> {
        self.codec().decode(input)
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Format::BibTex => "BibTeX",
            Format::Ris => "RIS",
        })
    }
}

impl FromStr for Format {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "bib" | "bibtex" => Ok(Format::BibTex),
            "ris" => Ok(Format::Ris),
            other => Err(format!("unknown format: '{other}'")),
        }
    }
}
