use courier_http::{HttpError, OutgoingRequest, Transport};
use http::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, HeaderName, HeaderValue};
use url::Url;
use zeroize::Zeroizing;

use crate::basic::BasicCredentials;
use crate::config::OAuthClientConfig;
use crate::error::TokenError;
use crate::http_error::format_http_error;
use crate::types::{AccessToken, ClientAuthMethod, GrantType, TokenResponse};

const CONTEXT: &str = "OAuth2 token";

/// Performs token-endpoint exchanges over a shared [`Transport`].
///
/// Every call is a fresh exchange; tokens are not cached.
#[derive(Debug, Clone)]
pub struct OAuth2Client {
    config: OAuthClientConfig,
    token_endpoint: Url,
    /// Space-joined scopes, `None` when the list is empty.
    scope: Option<String>,
}

impl OAuth2Client {
    /// # Errors
    ///
    /// Returns [`TokenError::ConfigError`] if the configuration does not
    /// validate or the token endpoint cannot be resolved.
    pub fn new(config: OAuthClientConfig) -> Result<Self, TokenError> {
        config.validate()?;
        let token_endpoint = config.resolve_token_endpoint()?;
        let scope = (!config.scopes.is_empty()).then(|| config.scopes.join(" "));

        Ok(Self {
            config,
            token_endpoint,
            scope,
        })
    }

    #[must_use]
    pub fn token_endpoint(&self) -> &Url {
        &self.token_endpoint
    }

    #[must_use]
    pub fn config(&self) -> &OAuthClientConfig {
        &self.config
    }

    /// Exchange the configured credentials for an access token.
    ///
    /// `headers` are forwarded on the token request after the client's own
    /// headers. `tag` is attached to the token request, so cancelling that
    /// tag on the transport also aborts the exchange. Entries with an empty value, an `Authorization` name or a
    /// name/value that is not a valid HTTP header are not forwarded; client
    /// authentication owns `Authorization` here.
    ///
    /// # Errors
    ///
    /// - [`TokenError::Http`] on transport failure or a non-2xx status
    /// - [`TokenError::InvalidResponse`] if the body is not a token response
    /// - [`TokenError::UnsupportedTokenType`] if `token_type` is not `Bearer`
    pub async fn request_access_token(
        &self,
        transport: &dyn Transport,
        headers: &[(String, String)],
        tag: Option<&str>,
    ) -> Result<AccessToken, TokenError> {
        let request = self
            .build_request(headers)?
            .with_tag(tag.map(str::to_owned));

        tracing::debug!(
            endpoint = %self.token_endpoint,
            grant_type = self.config.grant_type.as_str(),
            "requesting access token"
        );

        let response = transport
            .submit(request)
            .await
            .map_err(|e| TokenError::Http(format_http_error(&e, CONTEXT)))?;

        let token_resp: TokenResponse = match response.json().await {
            Ok(parsed) => parsed,
            Err(HttpError::Json(e)) => return Err(TokenError::InvalidResponse(e.to_string())),
            Err(e) => return Err(TokenError::Http(format_http_error(&e, CONTEXT))),
        };

        if let Some(ref tt) = token_resp.token_type
            && !tt.eq_ignore_ascii_case("bearer")
        {
            return Err(TokenError::UnsupportedTokenType(tt.clone()));
        }
        if token_resp.access_token.is_empty() {
            return Err(TokenError::InvalidResponse("empty access_token".into()));
        }

        let token = AccessToken::from(token_resp);
        tracing::debug!(expires_in = ?token.expires_in(), "access token acquired");
        Ok(token)
    }

    fn build_request(&self, headers: &[(String, String)]) -> Result<OutgoingRequest, TokenError> {
        let mut fields: Vec<(&str, &str)> = vec![("grant_type", self.config.grant_type.as_str())];

        // Temporary plaintext copies are scrubbed on drop
        let password;
        if let GrantType::Password {
            username,
            password: secret,
        } = &self.config.grant_type
        {
            password = Zeroizing::new(secret.expose().to_owned());
            fields.push(("username", username));
            fields.push(("password", &password));
        }

        if let Some(ref scope) = self.scope {
            fields.push(("scope", scope));
        }

        let client_secret;
        if self.config.auth_method == ClientAuthMethod::Form {
            client_secret = Zeroizing::new(self.config.client_secret.expose().to_owned());
            fields.push(("client_id", &self.config.client_id));
            fields.push(("client_secret", &client_secret));
        }

        let body = Zeroizing::new(serde_urlencoded::to_string(&fields).map_err(|e| {
            TokenError::ConfigError(format!("token request form encoding failed: {e}"))
        })?);

        let mut request = OutgoingRequest::new(http::Method::POST, self.token_endpoint.as_str())
            .with_body(body.as_bytes().to_vec());
        request.push_header(
            CONTENT_TYPE,
            HeaderValue::from_static("application/x-www-form-urlencoded"),
        );
        request.push_header(ACCEPT, HeaderValue::from_static("application/json"));

        if self.config.auth_method == ClientAuthMethod::Basic {
            let encoded = BasicCredentials::encode(
                &self.config.client_id,
                self.config.client_secret.expose(),
            );
            let value = Zeroizing::new(format!("Basic {}", encoded.expose()));
            let mut value = HeaderValue::from_str(&value).map_err(|_| {
                TokenError::ConfigError("client credentials are not a valid header value".into())
            })?;
            value.set_sensitive(true);
            request.push_header(AUTHORIZATION, value);
        }

        for (name, value) in headers {
            if value.is_empty() || name.eq_ignore_ascii_case(AUTHORIZATION.as_str()) {
                continue;
            }
            match (
                HeaderName::try_from(name.as_str()),
                HeaderValue::try_from(value.as_str()),
            ) {
                (Ok(name), Ok(value)) => request.push_header(name, value),
                _ => tracing::warn!(header = %name, "skipping malformed header on token request"),
            }
        }

        Ok(request)
    }
}
