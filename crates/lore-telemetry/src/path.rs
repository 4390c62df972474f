//! Path-label normalization (§4.9): bounds metric cardinality by collapsing
//! purely numeric and UUID/24-hex-char segments (our lexicographic ids are
//! 26 chars, close enough to the same family) into `:id`.

use regex::Regex;
use std::sync::OnceLock;

fn uuid_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$").unwrap()
    })
}

fn hex_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[0-9a-fA-F]{20,32}$").unwrap())
}

/// Our own 26-char ULID primary keys don't fit the 24-hex pattern above —
/// match them on length and alphanumeric shape instead of the exact
/// Crockford-base32 alphabet.
fn ulid_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[0-9A-Za-z]{26}$").unwrap())
}

fn is_id_segment(segment: &str) -> bool {
    if segment.is_empty() {
        return false;
    }
    if segment.chars().all(|c| c.is_ascii_digit()) {
        return true;
    }
    uuid_pattern().is_match(segment) || hex_id_pattern().is_match(segment) || ulid_pattern().is_match(segment)
}

pub fn normalize(path: &str) -> String {
    path.split('/')
        .map(|segment| if is_id_segment(segment) { ":id" } else { segment })
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_segments_are_normalized() {
        assert_eq!(normalize("/v1/lessons/42"), "/v1/lessons/:id");
    }

    #[test]
    fn uuid_segments_are_normalized() {
        assert_eq!(
            normalize("/v1/keys/550e8400-e29b-41d4-a716-446655440000"),
            "/v1/keys/:id"
        );
    }

    #[test]
    fn ulid_segments_are_normalized() {
        assert_eq!(normalize("/v1/lessons/01ARZ3NDEKTSV4RRFFQ69G5FAV"), "/v1/lessons/:id");
    }

    #[test]
    fn non_id_segments_are_left_alone() {
        assert_eq!(normalize("/v1/lessons/search"), "/v1/lessons/search");
        assert_eq!(normalize("/health"), "/health");
    }
}
