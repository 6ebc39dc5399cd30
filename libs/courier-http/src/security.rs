//! HTTP security utilities.

/// Maximum body preview size for error messages (8KB).
///
/// Non-2xx bodies are included in `HttpError::HttpStatus` for debugging;
/// this caps how much of the body is read.
pub const ERROR_BODY_PREVIEW_LIMIT: usize = 8 * 1024;

/// Header names whose values are never written to logs.
pub const SENSITIVE_HEADERS: &[&str] = &[
    "authorization",
    "proxy-authorization",
    "cookie",
    "set-cookie",
];

/// Whether the value of `name` must be redacted in diagnostics.
#[must_use]
pub fn is_sensitive_header(name: &str) -> bool {
    SENSITIVE_HEADERS
        .iter()
        .any(|sensitive| sensitive.eq_ignore_ascii_case(name))
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn authorization_is_sensitive_in_any_case() {
        assert!(is_sensitive_header("Authorization"));
        assert!(is_sensitive_header("COOKIE"));
        assert!(!is_sensitive_header("accept"));
    }
}
