//! BibTeX codec.
//!
//! Every record is written as an `@article` entry whose citation key is built
//! from the first author's surname and the year (`smith2020`, `smith2020a`,
//! `anonnd`). Field values are brace-delimited; literal `{`, `}` and `\` are
//! backslash-escaped.
//!
//! | Field | BibTeX name |
//! |---|---|
//! | title | `title` |
//! | authors | `author` (joined with ` and `) |
//! | year | `year` |
//! | source title | `journal` (`booktitle` accepted) |
//! | DOI | `doi` |
//! | keywords | `keywords` (joined with `; `) |
//! | affiliations | `affiliation` (joined with `; `) |
//! | countries | `countries` (joined with `; `) |
//! | times cited | `times-cited` |
//! | origin | `database` |
//! | raw key | `unique-id` |
//!
//! # Example
//!
//! ```
//! use bibharmony::{BibTexCodec, RecordCodec};
//!
//! let input = r#"@article{smith2020,
//!   title = {Example Title},
//!   author = {Smith, John and Doe, Jane},
//!   year = {2020}
//! }"#;
//!
//! let records = BibTexCodec::new().decode(input).unwrap();
//! assert_eq!(records[0].authors, vec!["Smith, John", "Doe, Jane"]);
//! ```

mod parse;
mod structure;
mod write;

use crate::CanonicalRecord;
use crate::codec::{Format, RecordCodec};
use crate::error::ParseError;
use parse::bibtex_parse;
use write::{KeyAllocator, write_entry};

/// Codec for BibTeX bibliographies.
#[derive(Debug, Clone, Copy, Default)]
pub struct BibTexCodec;

impl BibTexCodec {
    /// Creates a new BibTeX codec instance.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl RecordCodec for BibTexCodec {
    fn format(&self) -> Format {
        Format::BibTex
    }

    fn encode(&self, records: &[CanonicalRecord]) -> String {
        let mut keys = KeyAllocator::default();
        let mut out = String::new();
        for (i, record) in records.iter().enumerate() {
            if i > 0 {
                out.push('\n');
            }
            let key = keys.allocate(record);
            write_entry(&mut out, &key, record);
        }
        out
    }

    /// Parses every entry in a BibTeX document.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError`] for an unbalanced entry, a malformed field or
    /// an entry without a title. No records are returned in that case.
    fn decode(&self, input: &str) -> Result<Vec<CanonicalRecord>, ParseError> {
        bibtex_parse(input)?
            .into_iter()
            .map(CanonicalRecord::try_from)
            .collect()
    }
}
