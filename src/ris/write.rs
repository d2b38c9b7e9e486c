//! RIS serialization.

use crate::CanonicalRecord;
use crate::ris::tags::RisTag;

/// Appends one `XX  - value` line; line breaks inside the value are folded
/// into spaces.
fn push_line(out: &mut String, tag: RisTag, value: &str) {
    let value = value
        .split(['\r', '\n'])
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    out.push_str(&format!("{}  - {}\n", tag.as_tag(), value));
}

/// Serializes one record as a `TY` ... `ER` block.
pub(crate) fn write_reference(out: &mut String, record: &CanonicalRecord) {
    push_line(out, RisTag::Type, "JOUR");
    push_line(out, RisTag::Title, &record.title);
    for author in &record.authors {
        push_line(out, RisTag::Author, author);
    }
    if let Some(year) = record.year {
        push_line(out, RisTag::PublicationYear, &year.to_string());
    }
    if !record.source_title.is_empty() {
        push_line(out, RisTag::JournalFullAlternative, &record.source_title);
    }
    if let Some(doi) = &record.doi {
        push_line(out, RisTag::Doi, doi);
    }
    for keyword in &record.keywords {
        push_line(out, RisTag::Keywords, keyword);
    }
    for affiliation in &record.affiliations {
        push_line(out, RisTag::Address, affiliation);
    }
    for country in &record.countries {
        push_line(out, RisTag::Countries, country);
    }
    if record.citation_count > 0 {
        push_line(out, RisTag::TimesCited, &record.citation_count.to_string());
    }
    push_line(out, RisTag::Database, &record.origin.to_string());
    if !record.raw_key.is_empty() {
        push_line(out, RisTag::AccessionNumber, &record.raw_key);
    }
    out.push_str("ER  - \n");
}
