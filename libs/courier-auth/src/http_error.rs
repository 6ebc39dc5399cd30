/// Render an [`HttpError`](courier_http::HttpError) as a log-safe message
/// prefixed with the caller context (for example `"OAuth2 token"`).
///
/// Status errors carry only the status code; response bodies stay out of
/// messages because token endpoints echo request details in them.
#[must_use]
pub fn format_http_error(e: &courier_http::HttpError, prefix: &str) -> String {
    use courier_http::HttpError;

    match e {
        HttpError::HttpStatus { status, .. } => format!("{prefix} HTTP {status}"),
        HttpError::Json(err) => format!("{prefix} JSON parse failed: {err}"),
        HttpError::Timeout(duration) => format!("{prefix} request timed out after {duration:?}"),
        HttpError::Cancelled => format!("{prefix} request cancelled"),
        HttpError::Transport(err) => format!("{prefix} transport error: {err}"),
        HttpError::Tls(err) => format!("{prefix} TLS error: {err}"),
        HttpError::BodyTooLarge { limit, actual } => {
            format!("{prefix} response too large: limit {limit} bytes, got {actual} bytes")
        }
        HttpError::RequestBuild(err) => format!("{prefix} request build failed: {err}"),
        HttpError::InvalidHeaderValue(err) => format!("{prefix} invalid header value: {err}"),
        HttpError::Overloaded => format!("{prefix} request rejected: transport overloaded"),
        HttpError::ServiceClosed => format!("{prefix} transport unavailable"),
        HttpError::InvalidUri { url, reason, .. } => {
            format!("{prefix} invalid URL '{url}': {reason}")
        }
        HttpError::InvalidScheme { scheme, reason } => {
            format!("{prefix} invalid scheme '{scheme}': {reason}")
        }
        // Unknown variants may format request data; keep them opaque
        _ => format!("{prefix} request failed"),
    }
}
