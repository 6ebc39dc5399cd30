use std::fmt;

use courier_auth::TokenError;
use courier_http::HttpError;
use thiserror::Error;

use crate::callback::ErrorKind;
use crate::config::ConfigError;
use crate::params::ParamsError;

/// A credential header that could not be turned into an HTTP header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderFault {
    pub name: String,
    pub reason: &'static str,
}

impl fmt::Display for HeaderFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}': {}", self.name, self.reason)
    }
}

/// Why a dispatch failed.
///
/// Every variant maps onto one [`ErrorKind`] through [`kind`](Self::kind);
/// that kind is what the callback receives.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DispatchError {
    #[error("request URL is empty")]
    EmptyUrl,

    #[error("malformed credential headers: {}", join_faults(.0))]
    MalformedHeaders(Vec<HeaderFault>),

    #[error("basic auth mode without a secret")]
    MissingBasicSecret,

    #[error("basic auth secret is not a valid header value")]
    InvalidBasicSecret,

    #[error("OAuth2 mode without OAuth2 client configuration")]
    MissingOAuthConfig,

    #[error("invalid OAuth2 client configuration: {0}")]
    OAuthConfig(#[source] TokenError),

    #[error("platform marker {0:?} is not a valid header value")]
    InvalidPlatform(String),

    #[error(transparent)]
    Params(#[from] ParamsError),

    #[error("token exchange failed: {0}")]
    Token(#[source] TokenError),

    #[error(transparent)]
    Transport(#[from] HttpError),

    #[error("dispatch task panicked")]
    Panicked,

    #[error("dispatch task was cancelled before completing")]
    Aborted,
}

impl DispatchError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Token(_) => ErrorKind::AuthorizationException,
            Self::Transport(e) if e.is_connection_error() => ErrorKind::ServerConnectionError,
            _ => ErrorKind::RuntimeException,
        }
    }
}

fn join_faults(faults: &[HeaderFault]) -> String {
    faults
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Failure to assemble a [`RestClient`](crate::RestClient).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BuildError {
    #[error("a callback context handle is required")]
    MissingContext,

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to build HTTP transport: {0}")]
    Http(#[from] HttpError),
}
