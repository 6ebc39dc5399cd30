use crate::builder::HttpClientBuilder;
use crate::cancel::CancelRegistry;
use crate::config::TransportSecurity;
use crate::error::HttpError;
use crate::request::RequestBuilder;
use crate::response::ResponseBody;
use bytes::Bytes;
use http::{Request, Response};
use http_body_util::Full;
use std::future::Future;
use std::pin::Pin;
use tower::Service;
use tower::buffer::Buffer;

/// Type alias for the future type of the inner service
pub type ServiceFuture =
    Pin<Box<dyn Future<Output = Result<Response<ResponseBody>, HttpError>> + Send>>;

/// Type alias for the buffered service
pub type BufferedService = Buffer<Request<Full<Bytes>>, ServiceFuture>;

/// HTTP client with tower middleware stack
///
/// The stack covers timeouts, User-Agent injection, transparent
/// decompression, redirects and optional request logging. Use
/// [`HttpClientBuilder`] to construct instances with custom configuration.
///
/// # Thread Safety
///
/// `HttpClient` is `Clone + Send + Sync`. Cloning is cheap (internal channel
/// clone) and clones share the connection pool and the cancellation registry.
#[derive(Clone)]
pub struct HttpClient {
    pub(crate) service: BufferedService,
    pub(crate) cancel: CancelRegistry,
    pub(crate) max_body_size: usize,
    pub(crate) transport_security: TransportSecurity,
}

impl HttpClient {
    /// Create a new HTTP client with default configuration
    ///
    /// # Errors
    /// Returns an error if TLS initialization fails
    pub fn new() -> Result<Self, HttpError> {
        HttpClientBuilder::new().build()
    }

    /// Create a builder for configuring the HTTP client
    #[must_use]
    pub fn builder() -> HttpClientBuilder {
        HttpClientBuilder::new()
    }

    /// Create a request builder
    ///
    /// Backs [`Transport::submit`](crate::Transport::submit). The URL must be
    /// absolute (scheme and host). Plain `http://` URLs require
    /// [`TransportSecurity::AllowInsecureHttp`].
    pub fn request(&self, method: http::Method, url: &str) -> RequestBuilder {
        RequestBuilder::new(
            self.service.clone(),
            self.cancel.clone(),
            self.max_body_size,
            method,
            url.to_owned(),
            self.transport_security,
        )
    }

    /// Cancel every in-flight request carrying `tag`.
    ///
    /// Cancelled requests fail with [`HttpError::Cancelled`]. Returns `true`
    /// if any request was registered under the tag.
    pub fn cancel_tag(&self, tag: &str) -> bool {
        self.cancel.cancel_tag(tag)
    }

    /// Cancel every in-flight request.
    pub fn cancel_all(&self) {
        self.cancel.cancel_all();
    }
}

/// Map buffer errors to `HttpError`
///
/// Buffer can return `ServiceError` which wraps the inner service error,
/// or `Closed` if the buffer worker has shut down.
pub fn map_buffer_error(err: tower::BoxError) -> HttpError {
    match err.downcast::<HttpError>() {
        Ok(http_err) => *http_err,
        Err(err) => {
            tracing::error!(
                error = %err,
                "buffer worker closed unexpectedly; service unavailable"
            );
            HttpError::ServiceClosed
        }
    }
}

/// Try to acquire a buffer slot with fail-fast semantics.
///
/// If the buffer is full, returns `HttpError::Overloaded` immediately instead
/// of blocking.
pub async fn try_acquire_buffer_slot(service: &mut BufferedService) -> Result<(), HttpError> {
    use std::task::Poll;

    let poll_result = std::future::poll_fn(|cx| match service.poll_ready(cx) {
        Poll::Ready(result) => Poll::Ready(Some(result)),
        Poll::Pending => Poll::Ready(None),
    })
    .await;

    match poll_result {
        Some(Ok(())) => Ok(()),
        Some(Err(e)) => Err(map_buffer_error(e)),
        None => Err(HttpError::Overloaded),
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::error::HttpError;
    use crate::response::HttpResponse;
    use crate::transport::{OutgoingRequest, Transport};
    use http::header::{CONTENT_TYPE, HeaderValue};
    use httpmock::prelude::*;
    use serde_json::json;
    use std::time::Duration;

    fn test_client() -> HttpClient {
        HttpClientBuilder::new().allow_insecure_http().build().unwrap()
    }

    async fn get(client: &HttpClient, url: &str) -> Result<HttpResponse, HttpError> {
        client
            .submit(OutgoingRequest::new(http::Method::GET, url))
            .await
    }

    #[tokio::test]
    async fn test_http_client_get() {
        let server = MockServer::start();
        let _m = server.mock(|when, then| {
            when.method(GET).path("/test");
            then.status(200).json_body(json!({"success": true}));
        });

        let client = test_client();
        let resp = get(&client, &server.url("/test")).await.unwrap();

        assert_eq!(resp.status(), http::StatusCode::OK);
    }

    #[tokio::test]
    async fn test_http_client_post_form() {
        let server = MockServer::start();
        let m = server.mock(|when, then| {
            when.method(POST)
                .path("/submit")
                .header("content-type", "application/x-www-form-urlencoded")
                .body("key1=value1&key2=value2");
            then.status(200).json_body(json!({"received": true}));
        });

        let client = test_client();
        let mut req = OutgoingRequest::new(http::Method::POST, server.url("/submit"))
            .with_body("key1=value1&key2=value2");
        req.push_header(
            CONTENT_TYPE,
            HeaderValue::from_static("application/x-www-form-urlencoded"),
        );

        let resp = client.submit(req).await.unwrap();
        assert_eq!(resp.status(), http::StatusCode::OK);
        m.assert();
    }

    #[tokio::test]
    async fn test_json_body_parsing() {
        #[derive(serde::Deserialize)]
        struct TestResponse {
            name: String,
            value: i32,
        }

        let server = MockServer::start();
        let _m = server.mock(|when, then| {
            when.method(GET).path("/json");
            then.status(200)
                .json_body(json!({"name": "test", "value": 42}));
        });

        let client = test_client();
        let data: TestResponse = get(&client, &server.url("/json"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(data.name, "test");
        assert_eq!(data.value, 42);
    }

    #[tokio::test]
    async fn test_json_non_success_is_status_error() {
        let server = MockServer::start();
        let _m = server.mock(|when, then| {
            when.method(GET).path("/denied");
            then.status(403).body("forbidden");
        });

        let client = test_client();
        let result = get(&client, &server.url("/denied"))
            .await
            .unwrap()
            .json::<serde_json::Value>()
            .await;

        match result {
            Err(HttpError::HttpStatus {
                status,
                body_preview,
                ..
            }) => {
                assert_eq!(status, http::StatusCode::FORBIDDEN);
                assert_eq!(body_preview, "forbidden");
            }
            other => panic!("expected HttpStatus, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_body_size_limit() {
        let server = MockServer::start();
        let large_body = "x".repeat(64 * 1024);
        let _m = server.mock(|when, then| {
            when.method(GET).path("/large");
            then.status(200).body(&large_body);
        });

        let client = HttpClientBuilder::new()
            .allow_insecure_http()
            .max_body_size(1024)
            .build()
            .unwrap();

        let result = get(&client, &server.url("/large")).await.unwrap().bytes().await;

        assert!(matches!(result, Err(HttpError::BodyTooLarge { .. })));
    }

    #[tokio::test]
    async fn test_custom_user_agent() {
        let server = MockServer::start();
        let m = server.mock(|when, then| {
            when.method(GET)
                .path("/ua")
                .header("user-agent", "custom/1.0");
            then.status(200);
        });

        let client = HttpClientBuilder::new()
            .allow_insecure_http()
            .user_agent("custom/1.0")
            .build()
            .unwrap();

        get(&client, &server.url("/ua")).await.unwrap();
        m.assert();
    }

    #[tokio::test]
    async fn test_http_rejected_when_tls_only() {
        let client = HttpClientBuilder::new().build().unwrap();
        let result = get(&client, "http://example.com/").await;

        assert!(matches!(result, Err(HttpError::InvalidScheme { .. })));
    }

    #[tokio::test]
    async fn test_relative_url_rejected() {
        let client = test_client();
        let result = get(&client, "/just/a/path").await;

        assert!(matches!(result, Err(HttpError::InvalidUri { .. })));
    }

    #[tokio::test]
    async fn test_cancel_tag_aborts_in_flight_request() {
        let server = MockServer::start();
        let _m = server.mock(|when, then| {
            when.method(GET).path("/slow");
            then.status(200).delay(Duration::from_secs(5));
        });

        let client = test_client();
        let req = OutgoingRequest::new(http::Method::GET, server.url("/slow"))
            .with_tag(Some("screen".to_owned()));
        let submitter = client.clone();
        let pending = tokio::spawn(async move { submitter.submit(req).await });

        // Wait until the request is registered before cancelling it
        for _ in 0..100 {
            if client.cancel.active_tags() > 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(Transport::cancel_tag(&client, "screen"));

        let result = pending.await.unwrap();
        assert!(matches!(result, Err(HttpError::Cancelled)));
    }

    #[tokio::test]
    async fn test_connection_refused_is_connection_error() {
        let client = test_client();
        // Port 1 is reserved and nothing listens there
        let err = get(&client, "http://127.0.0.1:1/").await.unwrap_err();

        assert!(err.is_connection_error(), "unexpected error: {err:?}");
    }
}
