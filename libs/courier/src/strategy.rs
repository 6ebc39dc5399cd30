//! How a call negotiates its payload and decodes the response.

use std::path::{Path, PathBuf};

use bytes::Bytes;
use courier_http::{HttpError, HttpResponse};
use http::{HeaderMap, StatusCode};
use http_body_util::BodyExt;
use thiserror::Error;
use tokio::io::AsyncWriteExt;

use crate::callback::ErrorKind;

/// Failure to turn a received response into a [`Response`].
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DecodeError {
    #[error("failed to read response body: {0}")]
    Read(#[from] HttpError),

    #[error("response body is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to write response body to {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl DecodeError {
    /// Failure kind reported when the callback does not handle decode
    /// errors itself.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Read(e) if e.is_connection_error() => ErrorKind::ServerConnectionError,
            _ => ErrorKind::RuntimeException,
        }
    }
}

/// `Content-Type` and `Accept` sent with a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Negotiation {
    pub content_type: &'static str,
    pub accept: &'static str,
}

/// Decoding mode of one call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ResponseStrategy {
    /// UTF-8 text (invalid sequences are replaced).
    Text,
    /// Raw bytes, kept in memory or streamed into `destination`.
    File { destination: Option<PathBuf> },
    /// A JSON document; an empty body decodes to `null`.
    #[default]
    Json,
}

impl ResponseStrategy {
    #[must_use]
    pub fn negotiation(&self) -> Negotiation {
        match self {
            Self::Text => Negotiation {
                content_type: "application/text",
                accept: "application/text",
            },
            Self::File { .. } => Negotiation {
                content_type: "application/x-www-form-urlencoded",
                accept: "application/octet-stream",
            },
            Self::Json => Negotiation {
                content_type: "application/json",
                accept: "application/json",
            },
        }
    }

    /// Decode a received response. Any status is accepted; the status is
    /// kept on the returned [`Response`].
    ///
    /// # Errors
    /// Returns `DecodeError` if the body cannot be read, is not JSON under
    /// [`ResponseStrategy::Json`], or cannot be written to the destination file.
    pub async fn decode(&self, response: HttpResponse) -> Result<Response, DecodeError> {
        let status = response.status();
        let headers = response.headers().clone();

        let body = match self {
            Self::Text => {
                let bytes = response.bytes().await?;
                Body::Text(String::from_utf8_lossy(&bytes).into_owned())
            }
            Self::File { destination: None } => Body::Bytes(response.bytes().await?),
            Self::File {
                destination: Some(path),
            } => {
                let written = write_to_file(response, path).await?;
                tracing::debug!(path = %path.display(), bytes = written, "response saved");
                Body::File(path.clone())
            }
            Self::Json => {
                let bytes = response.bytes().await?;
                if bytes.iter().all(u8::is_ascii_whitespace) {
                    Body::Json(serde_json::Value::Null)
                } else {
                    Body::Json(serde_json::from_slice(&bytes)?)
                }
            }
        };

        Ok(Response {
            status,
            headers,
            body,
        })
    }
}

async fn write_to_file(response: HttpResponse, path: &Path) -> Result<u64, DecodeError> {
    let io_err = |source| DecodeError::Io {
        path: path.to_path_buf(),
        source,
    };

    let mut file = tokio::fs::File::create(path).await.map_err(io_err)?;
    let mut body = std::pin::pin!(response.into_limited_body());
    let mut written = 0u64;

    while let Some(frame) = body.frame().await {
        if let Some(chunk) = frame?.data_ref() {
            file.write_all(chunk).await.map_err(io_err)?;
            written += chunk.len() as u64;
        }
    }
    file.flush().await.map_err(io_err)?;

    Ok(written)
}

/// Decoded payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    Text(String),
    Bytes(Bytes),
    /// Location the body was written to.
    File(PathBuf),
    Json(serde_json::Value),
}

/// A decoded response, as delivered to
/// [`ResultCallback::on_success`](crate::ResultCallback::on_success).
#[derive(Debug, Clone)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: Body,
}

impl Response {
    #[must_use]
    pub fn new(status: StatusCode, headers: HeaderMap, body: Body) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    #[must_use]
    pub fn body(&self) -> &Body {
        &self.body
    }

    #[must_use]
    pub fn into_body(self) -> Body {
        self.body
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(status: StatusCode, body: &'static str) -> HttpResponse {
        HttpResponse::from_bytes(status, HeaderMap::new(), body)
    }

    #[test]
    fn negotiation_table() {
        let cases = [
            (ResponseStrategy::Text, "application/text", "application/text"),
            (
                ResponseStrategy::File { destination: None },
                "application/x-www-form-urlencoded",
                "application/octet-stream",
            ),
            (ResponseStrategy::Json, "application/json", "application/json"),
        ];
        for (strategy, content_type, accept) in cases {
            let n = strategy.negotiation();
            assert_eq!(n.content_type, content_type, "{strategy:?}");
            assert_eq!(n.accept, accept, "{strategy:?}");
        }
    }

    #[tokio::test]
    async fn text_decodes_lossily() {
        let resp = HttpResponse::from_bytes(StatusCode::OK, HeaderMap::new(), &b"caf\xC3\xA9 \xFF"[..]);
        let decoded = ResponseStrategy::Text.decode(resp).await.unwrap();
        assert_eq!(decoded.body(), &Body::Text("caf\u{e9} \u{fffd}".to_owned()));
    }

    #[tokio::test]
    async fn json_keeps_non_success_status() {
        let decoded = ResponseStrategy::Json
            .decode(raw(StatusCode::NOT_FOUND, r#"{"error":"missing"}"#))
            .await
            .unwrap();
        assert_eq!(decoded.status(), StatusCode::NOT_FOUND);
        assert!(!decoded.is_success());
        assert_eq!(decoded.into_body(), Body::Json(json!({"error": "missing"})));
    }

    #[tokio::test]
    async fn json_empty_body_is_null() {
        let decoded = ResponseStrategy::Json
            .decode(raw(StatusCode::NO_CONTENT, ""))
            .await
            .unwrap();
        assert_eq!(decoded.body(), &Body::Json(serde_json::Value::Null));
    }

    #[tokio::test]
    async fn json_malformed_is_decode_error() {
        let err = ResponseStrategy::Json
            .decode(raw(StatusCode::OK, "{not json"))
            .await
            .unwrap_err();
        assert!(matches!(err, DecodeError::Json(_)));
        assert_eq!(err.kind(), ErrorKind::RuntimeException);
    }

    #[tokio::test]
    async fn file_in_memory() {
        let decoded = ResponseStrategy::File { destination: None }
            .decode(raw(StatusCode::OK, "\u{1}\u{2}"))
            .await
            .unwrap();
        assert_eq!(decoded.body(), &Body::Bytes(Bytes::from_static(b"\x01\x02")));
    }

    #[tokio::test]
    async fn file_streams_to_destination() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.bin");
        let strategy = ResponseStrategy::File {
            destination: Some(path.clone()),
        };

        let decoded = strategy.decode(raw(StatusCode::OK, "binary-data")).await.unwrap();
        assert_eq!(decoded.body(), &Body::File(path.clone()));
        assert_eq!(std::fs::read(&path).unwrap(), b"binary-data");
    }

    #[tokio::test]
    async fn file_unwritable_destination_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let strategy = ResponseStrategy::File {
            destination: Some(dir.path().join("missing-dir").join("out.bin")),
        };

        let err = strategy.decode(raw(StatusCode::OK, "x")).await.unwrap_err();
        assert!(matches!(err, DecodeError::Io { .. }));
        assert_eq!(err.kind(), ErrorKind::RuntimeException);
    }

    #[test]
    fn read_failure_kinds() {
        let reset = DecodeError::Read(HttpError::Transport(Box::new(std::io::Error::new(
            std::io::ErrorKind::ConnectionReset,
            "reset",
        ))));
        assert_eq!(reset.kind(), ErrorKind::ServerConnectionError);

        let too_large = DecodeError::Read(HttpError::BodyTooLarge {
            limit: 4,
            actual: 8,
        });
        assert_eq!(too_large.kind(), ErrorKind::RuntimeException);
    }
}
