//! RIS codec.
//!
//! Records are written as `TY  - JOUR` ... `ER  - ` blocks separated by a
//! blank line. Multi-valued fields repeat their tag (`AU`, `KW`, `AD`, `C1`).
//!
//! | Field | Tag |
//! |---|---|
//! | title | `TI` (`T1` accepted) |
//! | authors | `AU` (`A1` accepted) |
//! | year | `PY` (`Y1` accepted) |
//! | source title | `JO` (`JF`, `T2` accepted) |
//! | DOI | `DO` |
//! | keywords | `KW` |
//! | affiliations | `AD` |
//! | countries | `C1` |
//! | times cited | `C3` |
//! | origin | `DB` |
//! | raw key | `AN` |
//!
//! # Example
//!
//! ```
//! use bibharmony::{RecordCodec, RisCodec};
//!
//! let input = r#"TY  - JOUR
//! TI  - Example Title
//! AU  - Smith, John
//! ER  -"#;
//!
//! let records = RisCodec::new().decode(input).unwrap();
//! assert_eq!(records[0].title, "Example Title");
//! ```

mod parse;
mod structure;
mod tags;
mod write;

use crate::codec::{Format, RecordCodec};
use crate::error::ParseError;
use crate::CanonicalRecord;
use parse::ris_parse;
use write::write_reference;

/// Codec for RIS formatted citations.
///
/// RIS is a standardized format for bibliographic citations that uses two-letter
/// tags at the start of each line to denote different citation fields.
#[derive(Debug, Clone, Copy, Default)]
pub struct RisCodec;

impl RisCodec {
    /// Creates a new RIS codec instance.
    ///
    /// # Examples
    ///
    /// ```
    /// use bibharmony::RisCodec;
    /// let codec = RisCodec::new();
    /// ```
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl RecordCodec for RisCodec {
    fn format(&self) -> Format {
        Format::Ris
    }

    fn encode(&self, records: &[CanonicalRecord]) -> String {
        let mut out = String::new();
        for (i, record) in records.iter().enumerate() {
            if i > 0 {
                out.push('\n');
            }
            write_reference(&mut out, record);
        }
        out
    }

    /// Parses a string containing one or more references in RIS format.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError`] if a reference is not terminated with `ER`, an
    /// `ER` or field appears outside a reference, or a reference has no title.
    fn decode(&self, input: &str) -> Result<Vec<CanonicalRecord>, ParseError> {
        ris_parse(input)?
            .into_iter()
            .map(CanonicalRecord::try_from)
            .collect()
    }
}
