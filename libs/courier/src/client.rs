use std::sync::Arc;
use std::time::Duration;

use courier_http::{HttpClientBuilder, Transport};
use serde::Serialize;

use crate::call::Call;
use crate::callback::ResultCallback;
use crate::config::RestClientConfig;
use crate::context::ContextHandle;
use crate::credential::{AuthMode, CredentialModel, HeaderMapping};
use crate::dispatcher::{DispatchHandle, Dispatcher};
use crate::error::BuildError;
use crate::params::{ParamsError, RequestParams};
use crate::strategy::ResponseStrategy;

/// Entry point for applications: a dispatcher plus a credential template.
///
/// Each call gets its own copy of the template, so concurrent calls never
/// observe each other's bearer tokens. Calls in `OAuth2` mode go through the
/// token exchange first; every other mode is submitted directly.
///
/// # Example
///
/// ```ignore
/// let mut context = CallbackContext::new();
/// let config = RestClientConfig::load(Some(Path::new("courier.yaml")))?;
/// let client = RestClientBuilder::with_config(config)
///     .context(context.handle())
///     .build()?;
///
/// let handle = client
///     .get("https://api.example.com/profile")
///     .tag("profile-screen")
///     .send(callback);
/// context.run_until(handle.join()).await;
/// ```
#[derive(Clone)]
pub struct RestClient {
    dispatcher: Dispatcher,
    credentials: CredentialModel,
}

impl RestClient {
    #[must_use]
    pub fn builder() -> RestClientBuilder {
        RestClientBuilder::new()
    }

    /// Wrap an existing dispatcher.
    #[must_use]
    pub fn from_parts(dispatcher: Dispatcher, credentials: CredentialModel) -> Self {
        Self {
            dispatcher,
            credentials,
        }
    }

    /// A copy of the credential template.
    #[must_use]
    pub fn auth_model(&self) -> CredentialModel {
        self.credentials.clone()
    }

    /// A copy of the credential template with `extra` headers added.
    ///
    /// On a key present in both, the template's value is kept.
    #[must_use]
    pub fn auth_model_with(&self, extra: HeaderMapping) -> CredentialModel {
        let mut headers = extra;
        headers.extend_from(self.credentials.headers());
        self.credentials.clone().with_headers(headers)
    }

    pub fn get(&self, url: impl Into<String>) -> CallBuilder<'_> {
        CallBuilder::new(self, Call::get(url))
    }

    pub fn post(&self, url: impl Into<String>) -> CallBuilder<'_> {
        CallBuilder::new(self, Call::post(url))
    }

    pub fn put(&self, url: impl Into<String>) -> CallBuilder<'_> {
        CallBuilder::new(self, Call::put(url))
    }

    pub fn patch(&self, url: impl Into<String>) -> CallBuilder<'_> {
        CallBuilder::new(self, Call::patch(url))
    }

    pub fn delete(&self, url: impl Into<String>) -> CallBuilder<'_> {
        CallBuilder::new(self, Call::delete(url))
    }

    /// Submit `call` with explicit credentials, choosing the path by mode.
    pub fn execute(
        &self,
        call: Call,
        credentials: CredentialModel,
        callback: impl ResultCallback,
    ) -> DispatchHandle {
        match credentials.mode() {
            AuthMode::OAuth2 => self
                .dispatcher
                .dispatch_authenticated(call, credentials, callback),
            AuthMode::None | AuthMode::Basic => {
                self.dispatcher.dispatch(call, credentials, callback)
            }
        }
    }

    /// Cancel every in-flight request. Their callbacks receive
    /// `ServerConnectionError`.
    pub fn cancel_all_requests(&self) {
        self.dispatcher.cancel_all();
    }

    /// Cancel in-flight requests tagged `tag`. Returns `false` if none were
    /// in flight.
    pub fn cancel_call_with_tag(&self, tag: &str) -> bool {
        self.dispatcher.cancel_tag(tag)
    }

    #[must_use]
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }
}

/// One call being assembled by [`RestClient`].
#[must_use = "CallBuilder does nothing until .send() is called"]
pub struct CallBuilder<'a> {
    client: &'a RestClient,
    call: Call,
    extra_headers: HeaderMapping,
}

impl<'a> CallBuilder<'a> {
    fn new(client: &'a RestClient, call: Call) -> Self {
        Self {
            client,
            call,
            extra_headers: HeaderMapping::new(),
        }
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.call = self.call.with_tag(tag);
        self
    }

    pub fn params(mut self, params: RequestParams) -> Self {
        self.call = self.call.with_params(params);
        self
    }

    /// Send `value` as a JSON body.
    ///
    /// # Errors
    /// Returns `ParamsError::Json` if `value` cannot be serialized.
    pub fn json<T: Serialize>(self, value: &T) -> Result<Self, ParamsError> {
        Ok(self.params(RequestParams::json(value)?))
    }

    pub fn form<K, V>(self, fields: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.params(RequestParams::form(fields))
    }

    pub fn strategy(mut self, strategy: ResponseStrategy) -> Self {
        self.call = self.call.with_strategy(strategy);
        self
    }

    /// Add a header for this call only. Template headers win on equal keys.
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_headers.insert(key, value);
        self
    }

    pub fn send(self, callback: impl ResultCallback) -> DispatchHandle {
        let credentials = if self.extra_headers.is_empty() {
            self.client.auth_model()
        } else {
            self.client.auth_model_with(self.extra_headers)
        };
        self.client.execute(self.call, credentials, callback)
    }
}

/// Builder for [`RestClient`].
///
/// Without an explicit transport, an [`HttpClient`](courier_http::HttpClient)
/// is built from the configuration; that requires a tokio runtime.
#[must_use]
pub struct RestClientBuilder {
    config: RestClientConfig,
    transport: Option<Arc<dyn Transport>>,
    context: Option<ContextHandle>,
    credentials: Option<CredentialModel>,
}

impl Default for RestClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RestClientBuilder {
    pub fn new() -> Self {
        Self::with_config(RestClientConfig::default())
    }

    pub fn with_config(config: RestClientConfig) -> Self {
        Self {
            config,
            transport: None,
            context: None,
            credentials: None,
        }
    }

    /// Use `transport` instead of building an HTTP client.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Where callbacks run. Required.
    pub fn context(mut self, context: ContextHandle) -> Self {
        self.context = Some(context);
        self
    }

    /// Use `credentials` as the template instead of deriving it from the
    /// configuration.
    pub fn credentials(mut self, credentials: CredentialModel) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn platform(mut self, platform: impl Into<String>) -> Self {
        self.config.platform = platform.into();
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    /// Log every request and response at `debug` level.
    pub fn debug_logging(mut self, enabled: bool) -> Self {
        self.config.debug_logging = enabled;
        self
    }

    /// Permit plain `http://` URLs. Meant for local mock servers.
    pub fn allow_insecure_http(mut self) -> Self {
        self.config.allow_insecure_http = true;
        self
    }

    /// # Errors
    /// Returns `BuildError` if no context was given, the configured
    /// credentials are incomplete, or the HTTP client cannot be built.
    pub fn build(self) -> Result<RestClient, BuildError> {
        let context = self.context.ok_or(BuildError::MissingContext)?;
        let credentials = match self.credentials {
            Some(credentials) => credentials,
            None => self.config.credentials()?,
        };
        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(HttpClientBuilder::with_config(self.config.http_config()).build()?),
        };

        tracing::debug!(
            auth_mode = ?credentials.mode(),
            platform = %self.config.platform,
            "rest client ready"
        );

        let dispatcher = Dispatcher::new(transport, context).with_platform(self.config.platform);
        Ok(RestClient {
            dispatcher,
            credentials,
        })
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::context::CallbackContext;

    #[test]
    fn build_requires_context() {
        let result = RestClient::builder()
            .credentials(CredentialModel::none())
            .build();
        assert!(matches!(result, Err(BuildError::MissingContext)));
    }

    #[tokio::test]
    async fn build_propagates_incomplete_credentials() {
        let context = CallbackContext::new();
        let config = RestClientConfig {
            auth_mode: AuthMode::Basic,
            ..RestClientConfig::default()
        };
        let result = RestClientBuilder::with_config(config)
            .context(context.handle())
            .build();
        assert!(matches!(result, Err(BuildError::Config(_))));
    }

    #[tokio::test]
    async fn auth_model_with_keeps_template_values() {
        let context = CallbackContext::new();
        let template = CredentialModel::none()
            .with_header("X-App", "template")
            .with_header("X-Locale", "en");
        let client = RestClient::builder()
            .context(context.handle())
            .credentials(template)
            .build()
            .unwrap();

        let extra: HeaderMapping = [("X-App", "extra"), ("X-Trace", "t-1")].into_iter().collect();
        let model = client.auth_model_with(extra);

        let pairs: Vec<_> = model.headers().iter().collect();
        assert_eq!(
            pairs,
            [("X-App", "template"), ("X-Trace", "t-1"), ("X-Locale", "en")]
        );
        assert_eq!(client.auth_model().headers().len(), 2);
    }

    #[tokio::test]
    async fn builder_sets_platform() {
        let context = CallbackContext::new();
        let client = RestClient::builder()
            .context(context.handle())
            .platform("ios")
            .build()
            .unwrap();
        assert_eq!(client.dispatcher().platform(), "ios");
    }
}
