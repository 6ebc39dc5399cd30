use crate::cancel::CancelRegistry;
use crate::client::{BufferedService, map_buffer_error, try_acquire_buffer_slot};
use crate::config::TransportSecurity;
use crate::error::{HttpError, InvalidUriKind};
use crate::response::{HttpResponse, ResponseBody};
use bytes::Bytes;
use http::header::{HeaderName, HeaderValue};
use http::{Request, Response};
use http_body_util::Full;
use tower::Service;

/// One request on its way through the client's middleware stack.
///
/// Created by [`HttpClient::request`](crate::HttpClient::request). Headers
/// are emitted in the order they were added.
#[must_use = "RequestBuilder does nothing until .send() is called"]
pub struct RequestBuilder {
    service: BufferedService,
    cancel: CancelRegistry,
    max_body_size: usize,
    method: http::Method,
    url: String,
    tag: Option<String>,
    headers: Vec<(HeaderName, HeaderValue)>,
    body: Bytes,
    /// Transport security mode for URL scheme validation
    transport_security: TransportSecurity,
}

impl RequestBuilder {
    /// Create a new request builder (internal use only)
    pub(crate) fn new(
        service: BufferedService,
        cancel: CancelRegistry,
        max_body_size: usize,
        method: http::Method,
        url: String,
        transport_security: TransportSecurity,
    ) -> Self {
        Self {
            service,
            cancel,
            max_body_size,
            method,
            url,
            tag: None,
            headers: Vec::new(),
            body: Bytes::new(),
            transport_security,
        }
    }

    /// Attach a cancellation tag.
    ///
    /// All in-flight requests sharing a tag are aborted together by
    /// [`HttpClient::cancel_tag`](crate::HttpClient::cancel_tag).
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    /// Add headers that were already validated by the caller.
    pub fn header_values(mut self, headers: Vec<(HeaderName, HeaderValue)>) -> Self {
        self.headers.extend(headers);
        self
    }

    /// Set request body as raw bytes
    pub fn body_bytes(mut self, body: Bytes) -> Self {
        self.body = body;
        self
    }

    /// Validate URL and scheme against transport security configuration.
    fn validate_url(&self) -> Result<http::Uri, HttpError> {
        let uri: http::Uri =
            self.url
                .parse()
                .map_err(|e: http::uri::InvalidUri| HttpError::InvalidUri {
                    url: self.url.clone(),
                    kind: InvalidUriKind::ParseError,
                    reason: e.to_string(),
                })?;

        if uri.authority().is_none() {
            return Err(HttpError::InvalidUri {
                url: self.url.clone(),
                kind: InvalidUriKind::MissingAuthority,
                reason: "missing host/authority".to_owned(),
            });
        }

        match uri.scheme_str() {
            Some("https") => Ok(uri),
            Some("http") => match self.transport_security {
                TransportSecurity::AllowInsecureHttp => Ok(uri),
                TransportSecurity::TlsOnly => Err(HttpError::InvalidScheme {
                    scheme: "http".to_owned(),
                    reason: "HTTPS required (transport security is TlsOnly)".to_owned(),
                }),
            },
            Some(scheme) => Err(HttpError::InvalidScheme {
                scheme: scheme.to_owned(),
                reason: "only http:// and https:// schemes are supported".to_owned(),
            }),
            None => Err(HttpError::InvalidUri {
                url: self.url.clone(),
                kind: InvalidUriKind::MissingScheme,
                reason: "missing scheme".to_owned(),
            }),
        }
    }

    /// Send the request and return the response
    ///
    /// Returns `Ok` for every HTTP status.
    ///
    /// # Errors
    ///
    /// Returns `HttpError` if:
    /// - Request building failed
    /// - URL scheme is invalid for the transport security mode
    /// - Network/transport error or request timeout
    /// - The request was cancelled through its tag
    /// - The request queue is full (`Overloaded`)
    pub async fn send(mut self) -> Result<HttpResponse, HttpError> {
        let uri = self.validate_url()?;

        let mut builder = Request::builder().method(self.method).uri(uri);

        // The http builder appends, so repeated names are all emitted in order
        for (name, value) in self.headers {
            builder = builder.header(name, value);
        }

        let request = builder.body(Full::new(self.body))?;

        let guard = self.cancel.register(self.tag.as_deref());
        if guard.token().is_cancelled() {
            return Err(HttpError::Cancelled);
        }

        try_acquire_buffer_slot(&mut self.service).await?;

        let inner: Response<ResponseBody> = tokio::select! {
            biased;
            () = guard.token().cancelled() => {
                tracing::debug!(url = %self.url, tag = ?self.tag, "request cancelled");
                return Err(HttpError::Cancelled);
            }
            result = self.service.call(request) => result.map_err(map_buffer_error)?,
        };

        Ok(HttpResponse {
            inner,
            max_body_size: self.max_body_size,
        })
    }
}
