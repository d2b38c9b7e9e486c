//! RIS format parsing implementation.
//!
//! This module handles the low-level parsing of RIS formatted text.

use crate::codec::Format;
use crate::error::ParseError;
use crate::regex::Regex;
use crate::ris::structure::RawRisData;
use crate::ris::tags::RisTag;
use either::Either::{self, Left, Right};
use std::sync::LazyLock;

static TAG_LINE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Z][A-Z0-9])\s{0,2}-(?:\s(.*))?$").unwrap());

/// Parse the content of a RIS formatted file, returning structured data.
///
/// Text outside references (export banners such as `Record #1 of 2`) is
/// skipped. Lines inside a reference that do not start with a tag continue
/// the previous value.
pub(crate) fn ris_parse(ris_text: &str) -> Result<Vec<RawRisData>, ParseError> {
    let mut references = Vec::new();
    let mut current: Option<RawRisData> = None;
    let mut blocks = 0;

    for (index, line) in ris_text.lines().enumerate() {
        let line_number = index + 1;
        let line = line.trim_start_matches('\u{feff}').trim_end();
        if line.trim().is_empty() {
            continue;
        }

        match parse_ris_line(line) {
            Left((RisTag::Type, content)) => {
                if let Some(open) = &current {
                    return Err(ParseError::at(
                        Format::Ris,
                        open.block,
                        open.line,
                        format!("reference not terminated with ER before the TY on line {line_number}"),
                    ));
                }
                blocks += 1;
                let mut reference = RawRisData::new(blocks, line_number);
                reference.add_data(RisTag::Type, content);
                current = Some(reference);
            }
            Left((RisTag::EndOfReference, _)) => match current.take() {
                Some(reference) => references.push(reference),
                None => {
                    return Err(ParseError::at(
                        Format::Ris,
                        blocks + 1,
                        line_number,
                        "ER without a preceding TY",
                    ));
                }
            },
            Left((tag, content)) => match current.as_mut() {
                Some(reference) => reference.add_data(tag, content),
                None => {
                    return Err(ParseError::at(
                        Format::Ris,
                        blocks + 1,
                        line_number,
                        format!("{} field outside a reference (missing TY)", tag.as_tag()),
                    ));
                }
            },
            Right(text) => {
                if let Some(reference) = current.as_mut() {
                    reference.continue_last(text.trim());
                }
            }
        }
    }

    if let Some(open) = current {
        return Err(ParseError::at(
            Format::Ris,
            open.block,
            open.line,
            "reference not terminated with ER",
        ));
    }

    Ok(references)
}

/// Split a line into its tag and value, or return it as free text.
fn parse_ris_line(line: &str) -> Either<(RisTag, String), &str> {
    match TAG_LINE_REGEX.captures(line) {
        Some(caps) => {
            let tag = RisTag::from_tag(&caps[1]);
            let content = caps.get(2).map_or("", |m| m.as_str()).trim().to_string();
            Left((tag, content))
        }
        None => Right(line),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::*;

    #[rstest]
    #[case("TY  - JOUR", RisTag::Type, "JOUR")]
    #[case("TI  - Test Title", RisTag::Title, "Test Title")]
    #[case("AU  - Smith, John", RisTag::Author, "Smith, John")]
    #[case("ER  -", RisTag::EndOfReference, "")]
    #[case("ER  - ", RisTag::EndOfReference, "")]
    #[case("DO  - 10.1000/test", RisTag::Doi, "10.1000/test")]
    #[case("TY - JOUR", RisTag::Type, "JOUR")]
    fn test_parse_ris_line_tagged(
        #[case] line: &str,
        #[case] expected_tag: RisTag,
        #[case] expected_content: &str,
    ) {
        assert_eq!(
            parse_ris_line(line),
            Left((expected_tag, expected_content.to_string()))
        );
    }

    #[rstest]
    #[case("Record #1 of 10")]
    #[case("Provider: Some Provider")]
    #[case("continued text of a long abstract")]
    #[case("TYNoSeparator")]
    fn test_parse_ris_line_free_text(#[case] line: &str) {
        assert_eq!(parse_ris_line(line), Right(line));
    }

    #[test]
    fn test_parse_multiple_references_with_banners() {
        let input = "Record #1 of 2\nProvider: Test Provider\n\nTY  - JOUR\nTI  - First Article\nAU  - Smith, John\nER  - \n\nRecord #2 of 2\nTY  - BOOK\nTI  - Second Article\nER  - \n";
        let result = ris_parse(input).unwrap();
        assert_eq!(result.len(), 2);
        assert_eq!(result[1].block, 2);
        assert_eq!(result[1].line, 10);
        assert_eq!(
            result[1].get_first(&RisTag::Title),
            Some(&"Second Article".to_string())
        );
    }

    #[test]
    fn test_parse_empty_input() {
        assert!(ris_parse("").unwrap().is_empty());
    }

    #[test]
    fn test_missing_er_is_an_error() {
        let error = ris_parse("TY  - JOUR\nTI  - Open\n").unwrap_err();
        assert_eq!(error.block, 1);
        assert_eq!(error.line, 1);
        assert!(error.message.contains("ER"));
    }

    #[test]
    fn test_new_type_before_er_is_an_error() {
        let error = ris_parse("TY  - JOUR\nTI  - One\nTY  - JOUR\nTI  - Two\nER  - \n").unwrap_err();
        assert_eq!(error.block, 1);
        assert!(error.message.contains("line 3"));
    }

    #[test]
    fn test_er_without_type_is_an_error() {
        let error = ris_parse("TY  - JOUR\nTI  - One\nER  - \nER  - \n").unwrap_err();
        assert_eq!(error.block, 2);
        assert_eq!(error.line, 4);
    }
}
