//! RIS tags understood by the codec.
//!
//! See: http://en.wikipedia.org/wiki/RIS_(file_format)

/// RIS format tags.
///
/// Only the tags the canonical record maps to are named; everything else is
/// kept as [`RisTag::Unknown`] and ignored on conversion.
#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Eq, PartialEq, Hash, Clone)]
pub enum RisTag {
    /// TY - Type of reference
    Type,
    /// TI - Primary title
    Title,
    /// T1 - Primary title (alternative)
    TitleAlternative,
    /// AU - Author
    Author,
    /// A1 - Primary author
    AuthorPrimary,
    /// JF - Journal/Periodical name: full format
    JournalFull,
    /// JO - Journal/Periodical name: full format (alternative)
    JournalFullAlternative,
    /// T2 - Secondary title (journal title alternative)
    SecondaryTitle,
    /// PY - Publication year
    PublicationYear,
    /// Y1 - Primary date
    DatePrimary,
    /// DO - DOI
    Doi,
    /// KW - Keywords
    Keywords,
    /// AD - Author address
    Address,
    /// C1 - Custom 1, used for countries
    Countries,
    /// C3 - Custom 3, used for times cited
    TimesCited,
    /// DB - Name of database
    Database,
    /// AN - Accession number
    AccessionNumber,
    /// ER - End of reference
    EndOfReference,
    /// Unknown tag
    Unknown(String),
}

impl RisTag {
    /// Convert a string tag to a RisTag enum.
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "TY" => RisTag::Type,
            "TI" => RisTag::Title,
            "T1" => RisTag::TitleAlternative,
            "AU" => RisTag::Author,
            "A1" => RisTag::AuthorPrimary,
            "JF" => RisTag::JournalFull,
            "JO" => RisTag::JournalFullAlternative,
            "T2" => RisTag::SecondaryTitle,
            "PY" => RisTag::PublicationYear,
            "Y1" => RisTag::DatePrimary,
            "DO" => RisTag::Doi,
            "KW" => RisTag::Keywords,
            "AD" => RisTag::Address,
            "C1" => RisTag::Countries,
            "C3" => RisTag::TimesCited,
            "DB" => RisTag::Database,
            "AN" => RisTag::AccessionNumber,
            "ER" => RisTag::EndOfReference,
            _ => RisTag::Unknown(tag.to_string()),
        }
    }

    /// Convert a RisTag enum back to its string representation.
    pub fn as_tag(&self) -> &str {
        match self {
            RisTag::Type => "TY",
            RisTag::Title => "TI",
            RisTag::TitleAlternative => "T1",
            RisTag::Author => "AU",
            RisTag::AuthorPrimary => "A1",
            RisTag::JournalFull => "JF",
            RisTag::JournalFullAlternative => "JO",
            RisTag::SecondaryTitle => "T2",
            RisTag::PublicationYear => "PY",
            RisTag::DatePrimary => "Y1",
            RisTag::Doi => "DO",
            RisTag::Keywords => "KW",
            RisTag::Address => "AD",
            RisTag::Countries => "C1",
            RisTag::TimesCited => "C3",
            RisTag::Database => "DB",
            RisTag::AccessionNumber => "AN",
            RisTag::EndOfReference => "ER",
            RisTag::Unknown(tag) => tag,
        }
    }

    /// Check if this tag represents an author field.
    pub fn is_author_tag(&self) -> bool {
        matches!(self, RisTag::Author | RisTag::AuthorPrimary)
    }

    /// Priority of this tag as a journal name source; lower wins.
    pub fn journal_priority(&self) -> Option<u8> {
        match self {
            RisTag::JournalFull => Some(1),
            RisTag::JournalFullAlternative => Some(2),
            RisTag::SecondaryTitle => Some(3),
            _ => None,
        }
    }
}
