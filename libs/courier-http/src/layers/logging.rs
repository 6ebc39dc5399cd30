use crate::security::is_sensitive_header;
use bytes::Bytes;
use http::{HeaderMap, Request, Response};
use http_body_util::Full;
use std::fmt::Write as _;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;
use tower::{Layer, Service};

/// Logs outbound requests and their outcome at `debug` level.
///
/// Each exchange runs inside an `outgoing_http` span carrying the method and
/// the URL without its query string. Header values listed in
/// [`SENSITIVE_HEADERS`](crate::security::SENSITIVE_HEADERS) are redacted.
#[derive(Clone, Default)]
pub struct LoggingLayer;

impl LoggingLayer {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl<S> Layer<S> for LoggingLayer {
    type Service = LoggingService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        LoggingService { inner }
    }
}

#[derive(Clone)]
pub struct LoggingService<S> {
    inner: S,
}

impl<S, ResBody> Service<Request<Full<Bytes>>> for LoggingService<S>
where
    S: Service<Request<Full<Bytes>>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send,
    S::Error: std::fmt::Display + Send + 'static,
    ResBody: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Full<Bytes>>) -> Self::Future {
        use tracing::Instrument;

        let uri = req.uri();
        let url = format!(
            "{}://{}{}",
            uri.scheme_str().unwrap_or("https"),
            uri.authority().map_or("", http::uri::Authority::as_str),
            uri.path()
        );
        let span = tracing::debug_span!(
            "outgoing_http",
            http.method = %req.method(),
            http.url = %url,
        );
        span.in_scope(|| {
            tracing::debug!(headers = %redacted_headers(req.headers()), "--> request");
        });

        // Call the instance that was poll_ready'd and leave a fresh clone behind
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(
            async move {
                let started = Instant::now();
                let result = inner.call(req).await;
                let elapsed_ms = started.elapsed().as_millis();

                match &result {
                    Ok(response) => tracing::debug!(
                        status = response.status().as_u16(),
                        elapsed_ms,
                        headers = %redacted_headers(response.headers()),
                        "<-- response"
                    ),
                    Err(e) => tracing::debug!(error = %e, elapsed_ms, "<-- failed"),
                }
                result
            }
            .instrument(span),
        )
    }
}

/// Render headers as `name: value` pairs, hiding sensitive values.
fn redacted_headers(headers: &HeaderMap) -> String {
    let mut out = String::new();
    for (name, value) in headers {
        if !out.is_empty() {
            out.push_str(", ");
        }
        if is_sensitive_header(name.as_str()) {
            let _ = write!(out, "{name}: <redacted>");
        } else {
            let _ = write!(out, "{name}: {}", String::from_utf8_lossy(value.as_bytes()));
        }
    }
    out
}
