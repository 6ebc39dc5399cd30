use std::fmt;

use tokio::sync::mpsc::UnboundedSender;

use crate::strategy::{DecodeError, Response};

/// Category of a failed dispatch, delivered with the request URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The exchange failed on the network: connect, TLS, timeout or
    /// cancellation.
    ServerConnectionError,
    /// A local fault: malformed header, missing credential data, invalid
    /// URL or an unexpected failure inside the pipeline.
    RuntimeException,
    /// The token exchange that precedes an authenticated request failed.
    AuthorizationException,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::ServerConnectionError => "ServerConnectionError",
            Self::RuntimeException => "RuntimeException",
            Self::AuthorizationException => "AuthorizationException",
        })
    }
}

/// Receiver of a dispatch outcome.
///
/// For every dispatch exactly one of these methods is called, on the
/// [`CallbackContext`](crate::CallbackContext) the dispatcher was given.
pub trait ResultCallback: Send + 'static {
    fn on_success(&mut self, response: Response);

    fn on_failure(&mut self, url: &str, kind: ErrorKind);

    /// The response arrived but could not be decoded by the call's strategy.
    ///
    /// Defaults to [`on_failure`](Self::on_failure) with the kind given by
    /// [`DecodeError::kind`].
    fn on_decode_error(&mut self, url: &str, error: DecodeError) {
        tracing::warn!(url, error = %error, "response could not be decoded");
        self.on_failure(url, error.kind());
    }
}

/// A dispatch outcome as a value.
#[derive(Debug)]
pub enum Outcome {
    Success(Response),
    Failure { url: String, kind: ErrorKind },
    DecodeError { url: String, error: DecodeError },
}

impl Outcome {
    /// The failure kind, if this is a failure.
    #[must_use]
    pub fn failure_kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Failure { kind, .. } => Some(*kind),
            Self::Success(_) | Self::DecodeError { .. } => None,
        }
    }
}

/// Forwards outcomes into a channel, for callers that prefer to await them.
impl ResultCallback for UnboundedSender<Outcome> {
    fn on_success(&mut self, response: Response) {
        let _ = self.send(Outcome::Success(response));
    }

    fn on_failure(&mut self, url: &str, kind: ErrorKind) {
        let _ = self.send(Outcome::Failure {
            url: url.to_owned(),
            kind,
        });
    }

    fn on_decode_error(&mut self, url: &str, error: DecodeError) {
        let _ = self.send(Outcome::DecodeError {
            url: url.to_owned(),
            error,
        });
    }
}
