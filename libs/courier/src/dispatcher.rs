//! The dispatch pipeline.
//!
//! [`Dispatcher::dispatch`] is the single submission path: it builds the
//! outgoing request, submits it, decodes the answer and reports the outcome.
//! [`Dispatcher::dispatch_authenticated`] first runs the `OAuth2` token
//! exchange, stores `Authorization: Bearer <token>` in the credential model
//! and then continues on that same path.
//!
//! Whatever happens (including a panic inside the pipeline task) the
//! callback is invoked exactly once, on the caller's [`CallbackContext`].
//!
//! [`CallbackContext`]: crate::CallbackContext

use std::sync::Arc;

use courier_auth::OAuth2Client;
use courier_http::{OutgoingRequest, Transport};
use http::header::{ACCEPT, AUTHORIZATION, CACHE_CONTROL, CONTENT_TYPE, HeaderName, HeaderValue};
use parking_lot::Mutex;
use tokio::task::JoinHandle;

use crate::call::Call;
use crate::callback::ResultCallback;
use crate::context::ContextHandle;
use crate::credential::{AuthMode, CredentialModel};
use crate::error::{DispatchError, HeaderFault};
use crate::strategy::{DecodeError, Response};

/// Default value of the `os` platform marker header.
pub const DEFAULT_PLATFORM: &str = "rust";

/// Key under which the bearer token is stored in the credential headers.
const AUTHORIZATION_KEY: &str = "Authorization";

/// An outgoing request together with the credential headers that had to
/// be left out of it.
#[derive(Debug)]
pub struct BuiltRequest {
    pub request: OutgoingRequest,
    pub faults: Vec<HeaderFault>,
}

/// Builds, submits and reports requests over a shared [`Transport`].
///
/// Cloning is cheap; clones share the transport and the callback context.
#[derive(Clone)]
pub struct Dispatcher {
    transport: Arc<dyn Transport>,
    context: ContextHandle,
    platform: Arc<str>,
}

impl Dispatcher {
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>, context: ContextHandle) -> Self {
        Self {
            transport,
            context,
            platform: Arc::from(DEFAULT_PLATFORM),
        }
    }

    /// Set the value sent in the `os` header.
    #[must_use]
    pub fn with_platform(mut self, platform: impl Into<String>) -> Self {
        self.platform = Arc::from(platform.into());
        self
    }

    #[must_use]
    pub fn platform(&self) -> &str {
        &self.platform
    }

    #[must_use]
    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// Submit `call` with the credentials as they are.
    ///
    /// Must be called within a tokio runtime. The outcome is posted to the
    /// callback context; the returned handle resolves once it has been
    /// posted.
    pub fn dispatch(
        &self,
        call: Call,
        credentials: CredentialModel,
        callback: impl ResultCallback,
    ) -> DispatchHandle {
        self.spawn(call, credentials, Box::new(callback), false)
    }

    /// Acquire a token first when the credentials are in `OAuth2` mode,
    /// then submit like [`dispatch`](Self::dispatch).
    ///
    /// A failed token exchange is reported as
    /// [`ErrorKind::AuthorizationException`](crate::ErrorKind::AuthorizationException)
    /// and nothing is submitted. Other modes go straight to submission.
    pub fn dispatch_authenticated(
        &self,
        call: Call,
        credentials: CredentialModel,
        callback: impl ResultCallback,
    ) -> DispatchHandle {
        self.spawn(call, credentials, Box::new(callback), true)
    }

    /// Cancel every in-flight request tagged `tag`.
    pub fn cancel_tag(&self, tag: &str) -> bool {
        self.transport.cancel_tag(tag)
    }

    /// Cancel every in-flight request.
    pub fn cancel_all(&self) {
        self.transport.cancel_all();
    }

    /// Build the request [`dispatch`](Self::dispatch) would submit.
    ///
    /// Header order: `cache-control`, `os`, `content-type`, `accept`, the
    /// Basic `authorization` header in Basic mode, then the credential
    /// headers in their stored order. Credential headers with an empty value
    /// are skipped. Entries that are not valid HTTP headers are left out and
    /// listed in [`BuiltRequest::faults`].
    ///
    /// # Errors
    /// Returns `DispatchError` if the URL is empty, the body cannot be
    /// encoded, the platform marker is not a header value, or Basic mode
    /// has no usable secret.
    pub fn build_request(
        &self,
        call: &Call,
        credentials: &CredentialModel,
    ) -> Result<BuiltRequest, DispatchError> {
        if call.url.trim().is_empty() {
            return Err(DispatchError::EmptyUrl);
        }
        let body = call.params.to_body()?;
        let platform = HeaderValue::from_str(&self.platform)
            .map_err(|_| DispatchError::InvalidPlatform(self.platform.to_string()))?;
        let negotiation = call.strategy.negotiation();

        let mut request = OutgoingRequest::new(call.method.clone(), call.url.clone())
            .with_tag(call.tag.clone())
            .with_body(body);
        request.push_header(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        request.push_header(HeaderName::from_static("os"), platform);
        request.push_header(CONTENT_TYPE, HeaderValue::from_static(negotiation.content_type));
        request.push_header(ACCEPT, HeaderValue::from_static(negotiation.accept));

        if credentials.mode() == AuthMode::Basic {
            request.push_header(AUTHORIZATION, basic_authorization(credentials)?);
        }

        let mut faults = Vec::new();
        for (name, value) in credentials.headers().iter() {
            if value.is_empty() {
                continue;
            }
            match (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                (Ok(name), Ok(value)) => request.push_header(name, value),
                (Err(_), _) => faults.push(HeaderFault {
                    name: name.to_owned(),
                    reason: "invalid header name",
                }),
                (Ok(_), Err(_)) => faults.push(HeaderFault {
                    name: name.to_owned(),
                    reason: "invalid header value",
                }),
            }
        }

        Ok(BuiltRequest { request, faults })
    }

    fn spawn(
        &self,
        call: Call,
        mut credentials: CredentialModel,
        callback: Box<dyn ResultCallback>,
        authenticated: bool,
    ) -> DispatchHandle {
        let sink = CallbackSink::new(callback, self.context.clone(), &call.url);
        let watcher_sink = sink.clone();
        let this = self.clone();

        let pipeline = tokio::spawn(async move {
            let ready = if authenticated {
                this.authenticate(&call, &mut credentials).await
            } else {
                Ok(())
            };
            match ready {
                Ok(()) => this.submit(&call, &credentials, &sink).await,
                Err(e) => sink.fail(&e),
            }
            credentials
        });

        // Reports a pipeline that ended without reporting, e.g. after a panic
        let task = tokio::spawn(async move {
            match pipeline.await {
                Ok(credentials) => Some(credentials),
                Err(e) => {
                    let error = if e.is_panic() {
                        DispatchError::Panicked
                    } else {
                        DispatchError::Aborted
                    };
                    watcher_sink.fail(&error);
                    None
                }
            }
        });

        DispatchHandle { task }
    }

    async fn authenticate(
        &self,
        call: &Call,
        credentials: &mut CredentialModel,
    ) -> Result<(), DispatchError> {
        if credentials.mode() != AuthMode::OAuth2 {
            return Ok(());
        }
        let config = credentials
            .oauth2_config()
            .ok_or(DispatchError::MissingOAuthConfig)?;
        let client = OAuth2Client::new(config.clone()).map_err(DispatchError::OAuthConfig)?;

        let headers = credentials.headers().to_pairs();
        let token = client
            .request_access_token(
                self.transport.as_ref(),
                &headers,
                call.tag.as_deref(),
            )
            .await
            .map_err(DispatchError::Token)?;

        let mut augmented = credentials.headers().clone();
        augmented.insert(AUTHORIZATION_KEY, token.bearer().expose());
        credentials.set_headers(augmented);
        Ok(())
    }

    async fn submit(&self, call: &Call, credentials: &CredentialModel, sink: &CallbackSink) {
        let built = match self.build_request(call, credentials) {
            Ok(built) => built,
            Err(e) => {
                sink.fail(&e);
                return;
            }
        };
        if !built.faults.is_empty() {
            sink.fail(&DispatchError::MalformedHeaders(built.faults));
            return;
        }

        tracing::debug!(method = %call.method, url = %call.url, tag = ?call.tag, "submitting request");
        match self.transport.submit(built.request).await {
            Ok(response) => match call.strategy.decode(response).await {
                Ok(decoded) => sink.success(decoded),
                Err(e) => sink.decode_error(e),
            },
            Err(e) => sink.fail(&DispatchError::Transport(e)),
        }
    }
}

fn basic_authorization(credentials: &CredentialModel) -> Result<HeaderValue, DispatchError> {
    let secret = credentials
        .basic_secret()
        .filter(|s| !s.is_empty())
        .ok_or(DispatchError::MissingBasicSecret)?;
    let mut value = HeaderValue::try_from(format!("Basic {}", secret.expose()))
        .map_err(|_| DispatchError::InvalidBasicSecret)?;
    value.set_sensitive(true);
    Ok(value)
}

/// Completion of a spawned dispatch.
pub struct DispatchHandle {
    task: JoinHandle<Option<CredentialModel>>,
}

impl DispatchHandle {
    /// Wait until the outcome has been posted to the callback context.
    ///
    /// Returns the credential model as the pipeline left it (with the bearer
    /// header after a successful token exchange), or `None` if the pipeline
    /// did not run to completion.
    pub async fn join(self) -> Option<CredentialModel> {
        self.task.await.ok().flatten()
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// Delivers at most one outcome, however many times it is asked to.
#[derive(Clone)]
struct CallbackSink {
    slot: Arc<Mutex<Option<Box<dyn ResultCallback>>>>,
    context: ContextHandle,
    url: Arc<str>,
}

impl CallbackSink {
    fn new(callback: Box<dyn ResultCallback>, context: ContextHandle, url: &str) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Some(callback))),
            context,
            url: Arc::from(url),
        }
    }

    fn take(&self) -> Option<Box<dyn ResultCallback>> {
        let callback = self.slot.lock().take();
        if callback.is_none() {
            tracing::debug!(url = %self.url, "outcome already delivered");
        }
        callback
    }

    fn success(&self, response: Response) {
        if let Some(mut callback) = self.take() {
            tracing::debug!(url = %self.url, status = response.status().as_u16(), "request completed");
            self.context.post(move || callback.on_success(response));
        }
    }

    fn fail(&self, error: &DispatchError) {
        let Some(mut callback) = self.take() else {
            return;
        };
        let kind = error.kind();
        tracing::warn!(url = %self.url, %kind, error = %error, "dispatch failed");
        let url = Arc::clone(&self.url);
        self.context.post(move || callback.on_failure(&url, kind));
    }

    fn decode_error(&self, error: DecodeError) {
        if let Some(mut callback) = self.take() {
            let url = Arc::clone(&self.url);
            self.context
                .post(move || callback.on_decode_error(&url, error));
        }
    }
}
