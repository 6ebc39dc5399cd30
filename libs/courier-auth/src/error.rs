use thiserror::Error;

/// Errors from a token-endpoint exchange.
///
/// No variant ever carries a client secret, password or token in its
/// formatted output.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TokenError {
    /// Transport failure or non-2xx status from the token endpoint.
    ///
    /// Produced by [`format_http_error`](crate::format_http_error); the
    /// response body is never included.
    #[error("{0}")]
    Http(String),

    /// The endpoint answered 2xx with a body that is not a usable token.
    #[error("invalid token response: {0}")]
    InvalidResponse(String),

    /// `token_type` was present and not `Bearer`.
    #[error("unsupported token type: {0}")]
    UnsupportedTokenType(String),

    /// The client configuration cannot produce a token request.
    #[error("OAuth2 config error: {0}")]
    ConfigError(String),
}
