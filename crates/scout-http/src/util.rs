// crates/scout-http/src/util.rs
// ============================================================================
// Module: URL Helpers
// Description: Minimal query-string encoding, avoiding a dedicated URL crate.
// Purpose: Build GitHub API URLs from a path and an ordered set of query params.
// Dependencies: none
// ============================================================================

/// Percent-encodes a query parameter value per RFC 3986 `unreserved` rules.
#[must_use]
pub fn percent_encode(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.as_bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(*byte as char);
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

/// Builds a full URL from a base, a path, and ordered `(key, value)` query
/// parameters. Parameters are encoded; the path is appended verbatim.
#[must_use]
pub fn build_url(base_url: &str, path: &str, query: &[(&str, String)]) -> String {
    let mut url = format!("{}{}", base_url.trim_end_matches('/'), path);
    if !query.is_empty() {
        url.push('?');
        let pairs: Vec<String> = query.iter().map(|(key, value)| format!("{key}={}", percent_encode(value))).collect();
        url.push_str(&pairs.join("&"));
    }
    url
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, reason = "Test assertions use unwrap/expect for clarity.")]
    use super::*;

    #[test]
    fn percent_encode_escapes_reserved_characters() {
        assert_eq!(percent_encode("topic:vector-database"), "topic%3Avector-database");
        assert_eq!(percent_encode("a b"), "a%20b");
        assert_eq!(percent_encode("plain-text_1.0~ok"), "plain-text_1.0~ok");
    }

    #[test]
    fn build_url_joins_base_path_and_query() {
        let url = build_url("https://api.github.com/", "/search/repositories", &[("q", "topic:vector-database".to_string()), ("page", "1".to_string())]);
        assert_eq!(url, "https://api.github.com/search/repositories?q=topic%3Avector-database&page=1");
    }

    #[test]
    fn build_url_without_query_has_no_trailing_question_mark() {
        let url = build_url("https://api.github.com", "/rate_limit", &[]);
        assert_eq!(url, "https://api.github.com/rate_limit");
    }
}
