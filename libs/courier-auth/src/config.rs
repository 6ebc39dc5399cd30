use std::fmt;

use url::Url;

use crate::error::TokenError;
use crate::secret::SecretString;
use crate::types::{ClientAuthMethod, GrantType};

/// Token path appended to `site` when no explicit endpoint is configured.
pub const DEFAULT_TOKEN_PATH: &str = "/oauth/token";

/// Configuration of an OAuth2 token exchange.
///
/// The endpoint is either given directly in
/// [`token_endpoint`](Self::token_endpoint) or derived from
/// [`site`](Self::site) and [`token_path`](Self::token_path). Exactly one of
/// the two must be set; [`validate`](Self::validate) enforces it.
///
/// `Debug` redacts the client secret.
#[derive(Clone)]
pub struct OAuthClientConfig {
    /// Full token endpoint URL (mutually exclusive with `site`).
    pub token_endpoint: Option<Url>,

    /// Authorization server base URL (mutually exclusive with `token_endpoint`).
    pub site: Option<Url>,

    /// Path joined onto `site` (default: `/oauth/token`).
    pub token_path: String,

    pub client_id: String,

    pub client_secret: SecretString,

    pub grant_type: GrantType,

    /// Requested scopes, sent space-joined.
    pub scopes: Vec<String>,

    pub auth_method: ClientAuthMethod,
}

impl OAuthClientConfig {
    /// Check that the configuration can produce a token request.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::ConfigError`] if the client id or secret is
    /// empty, if neither or both of `token_endpoint` and `site` are set, or if
    /// the password grant has no username.
    pub fn validate(&self) -> Result<(), TokenError> {
        if self.client_id.trim().is_empty() {
            return Err(TokenError::ConfigError("client_id must not be empty".into()));
        }
        if self.client_secret.is_empty() {
            return Err(TokenError::ConfigError(
                "client_secret must not be empty".into(),
            ));
        }
        if let GrantType::Password { username, .. } = &self.grant_type
            && username.trim().is_empty()
        {
            return Err(TokenError::ConfigError(
                "password grant requires a username".into(),
            ));
        }
        match (&self.token_endpoint, &self.site) {
            (Some(_), Some(_)) => Err(TokenError::ConfigError(
                "token_endpoint and site are mutually exclusive".into(),
            )),
            (None, None) => Err(TokenError::ConfigError(
                "one of token_endpoint or site must be set".into(),
            )),
            _ => Ok(()),
        }
    }

    /// The URL token requests are posted to.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::ConfigError`] if no endpoint is configured or
    /// `token_path` cannot be joined onto `site`.
    pub fn resolve_token_endpoint(&self) -> Result<Url, TokenError> {
        if let Some(endpoint) = &self.token_endpoint {
            return Ok(endpoint.clone());
        }
        let site = self
            .site
            .as_ref()
            .ok_or_else(|| TokenError::ConfigError("site is required".into()))?;
        site.join(&self.token_path).map_err(|e| {
            TokenError::ConfigError(format!("invalid token_path '{}': {e}", self.token_path))
        })
    }
}

impl Default for OAuthClientConfig {
    fn default() -> Self {
        Self {
            token_endpoint: None,
            site: None,
            token_path: DEFAULT_TOKEN_PATH.to_owned(),
            client_id: String::new(),
            client_secret: SecretString::new(String::new()),
            grant_type: GrantType::default(),
            scopes: Vec::new(),
            auth_method: ClientAuthMethod::default(),
        }
    }
}

impl fmt::Debug for OAuthClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthClientConfig")
            .field("token_endpoint", &self.token_endpoint)
            .field("site", &self.site)
            .field("token_path", &self.token_path)
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("grant_type", &self.grant_type)
            .field("scopes", &self.scopes)
            .field("auth_method", &self.auth_method)
            .finish()
    }
}
