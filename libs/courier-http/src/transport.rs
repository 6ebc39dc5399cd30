//! The seam between request pipelines and the network.
//!
//! Pipelines build an [`OutgoingRequest`] and hand it to a [`Transport`].
//! [`HttpClient`] is the production implementation; tests substitute
//! in-memory doubles that record what was submitted.

use crate::client::HttpClient;
use crate::error::HttpError;
use crate::response::HttpResponse;
use async_trait::async_trait;
use bytes::Bytes;
use http::header::{HeaderName, HeaderValue};

/// A fully built request, ready for submission.
///
/// Headers keep the order in which they were added; a name may appear more
/// than once.
#[derive(Debug, Clone)]
pub struct OutgoingRequest {
    pub method: http::Method,
    pub url: String,
    pub tag: Option<String>,
    pub headers: Vec<(HeaderName, HeaderValue)>,
    pub body: Bytes,
}

impl OutgoingRequest {
    #[must_use]
    pub fn new(method: http::Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            tag: None,
            headers: Vec::new(),
            body: Bytes::new(),
        }
    }

    #[must_use]
    pub fn with_tag(mut self, tag: Option<String>) -> Self {
        self.tag = tag;
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Append a header that is already known to be valid.
    pub fn push_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.headers.push((name, value));
    }

    /// First value recorded for `name`.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&HeaderValue> {
        self.headers
            .iter()
            .find(|(n, _)| n.as_str().eq_ignore_ascii_case(name))
            .map(|(_, v)| v)
    }

    /// Headers as `(name, value)` string pairs, in emission order.
    ///
    /// Values that are not visible ASCII are rendered lossily.
    #[must_use]
    pub fn header_pairs(&self) -> Vec<(String, String)> {
        self.headers
            .iter()
            .map(|(n, v)| {
                (
                    n.as_str().to_owned(),
                    String::from_utf8_lossy(v.as_bytes()).into_owned(),
                )
            })
            .collect()
    }
}

/// Submits requests and cancels them by tag.
///
/// `submit` returns `Ok` for every HTTP status. `Err` means the exchange
/// itself failed; [`HttpError::is_connection_error`] tells network-level
/// failures apart from request construction problems.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn submit(&self, request: OutgoingRequest) -> Result<HttpResponse, HttpError>;

    /// Abort every in-flight request carrying `tag`.
    fn cancel_tag(&self, tag: &str) -> bool;

    /// Abort every in-flight request.
    fn cancel_all(&self);
}

#[async_trait]
impl Transport for HttpClient {
    async fn submit(&self, request: OutgoingRequest) -> Result<HttpResponse, HttpError> {
        let OutgoingRequest {
            method,
            url,
            tag,
            headers,
            body,
        } = request;

        let mut builder = self.request(method, &url).header_values(headers);
        if let Some(tag) = tag {
            builder = builder.tag(tag);
        }
        builder.body_bytes(body).send().await
    }

    fn cancel_tag(&self, tag: &str) -> bool {
        HttpClient::cancel_tag(self, tag)
    }

    fn cancel_all(&self) {
        HttpClient::cancel_all(self);
    }
}
