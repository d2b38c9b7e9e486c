use crate::regex::Regex;
use std::sync::LazyLock;

static ET_AL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\s*\bet\s+al\b\.?\s*").unwrap());

/// Formats a DOI for display by removing URL prefixes, `doi:` labels and
/// `[doi]` suffixes while keeping the original casing.
///
/// Returns `None` when the string does not contain a DOI.
///
/// # Arguments
///
/// * `doi_str` - The DOI string to format
pub fn display_doi(doi_str: &str) -> Option<String> {
    if doi_str.is_empty() {
        return None;
    }
    let doi: String = doi_str
        .trim()
        .trim_end_matches("[doi]")
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();

    // Every DOI starts with the "10." directory indicator
    doi.find("10.").map(|pos| doi[pos..].to_string())
}

/// Formats a DOI for comparison: display form, lower-cased.
///
/// # Arguments
///
/// * `doi_str` - The DOI string to format
pub fn doi_key(doi_str: &str) -> Option<String> {
    display_doi(doi_str).map(|doi| doi.to_lowercase())
}

/// Helper function to parse author names in various formats
pub fn parse_author_name(name: &str) -> (String, String) {
    // Handle formats like "Lastname, Firstname", "Lastname, FN", or "Lastname FN"
    let parts: Vec<&str> = if name.contains(',') {
        name.split(',').collect()
    } else {
        name.split_whitespace().collect()
    };

    match parts.len() {
        0 => (String::new(), String::new()),
        1 => (parts[0].trim().to_string(), String::new()),
        2 => {
            let family = parts[0].trim().to_string();
            let given = parts[1].trim().to_string();
            (family, given)
        }
        _ => {
            let family = parts[0].trim().to_string();
            let given = parts[1..].join(" ").trim().to_string();
            (family, given)
        }
    }
}

/// Splits a delimited cell into trimmed, non-empty parts.
pub fn split_list<'a>(value: &'a str, delimiter: &'a str) -> impl Iterator<Item = &'a str> + 'a {
    value
        .split(delimiter)
        .map(str::trim)
        .filter(|part| !part.is_empty())
}

/// Splits a delimited cell like [`split_list`], but never inside `[...]`.
///
/// Web of Science address cells prefix every address with the bracketed list
/// of authors at that address, and those lists use the same delimiter.
pub fn split_outside_brackets<'a>(value: &'a str, delimiter: &str) -> Vec<&'a str> {
    if delimiter.is_empty() {
        return vec![value.trim()].into_iter().filter(|s| !s.is_empty()).collect();
    }

    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    let mut chars = value.char_indices();

    while let Some((i, c)) = chars.next() {
        match c {
            '[' => depth += 1,
            ']' => depth = depth.saturating_sub(1),
            _ if depth == 0 && value[i..].starts_with(delimiter) => {
                parts.push(&value[start..i]);
                start = i + delimiter.len();
                // Skip the rest of a multi-byte delimiter
                for _ in 1..delimiter.chars().count() {
                    chars.next();
                }
            }
            _ => {}
        }
    }
    parts.push(&value[start..]);

    parts
        .into_iter()
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect()
}

/// Removes "et al." markers from an author cell.
pub fn strip_et_al(value: &str) -> String {
    ET_AL_REGEX.replace_all(value, " ").trim().to_string()
}
