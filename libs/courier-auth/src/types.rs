use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::secret::SecretString;

/// How the client proves its identity to the token endpoint.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientAuthMethod {
    /// `Authorization: Basic base64(client_id:client_secret)`
    #[default]
    Basic,
    /// `client_id` and `client_secret` as form fields.
    Form,
}

/// The grant requested from the token endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum GrantType {
    /// `grant_type=client_credentials`
    #[default]
    ClientCredentials,
    /// `grant_type=password` with resource-owner credentials.
    Password {
        username: String,
        password: SecretString,
    },
}

impl GrantType {
    /// The `grant_type` form value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ClientCredentials => "client_credentials",
            Self::Password { .. } => "password",
        }
    }
}

/// Token endpoint response body.
///
/// Deserialize-only so a token is never serialized by accident.
#[derive(Deserialize)]
pub(crate) struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

/// An access token issued by the authorization server.
#[derive(Debug, Clone)]
pub struct AccessToken {
    token: SecretString,
    expires_in: Option<Duration>,
    refresh_token: Option<SecretString>,
    scope: Option<String>,
}

impl AccessToken {
    pub fn new(token: impl Into<SecretString>) -> Self {
        Self {
            token: token.into(),
            expires_in: None,
            refresh_token: None,
            scope: None,
        }
    }

    /// The raw token value.
    #[must_use]
    pub fn secret(&self) -> &str {
        self.token.expose()
    }

    /// `Bearer <token>`, ready for an `Authorization` header.
    #[must_use]
    pub fn bearer(&self) -> SecretString {
        SecretString::new(format!("Bearer {}", self.token.expose()))
    }

    #[must_use]
    pub fn expires_in(&self) -> Option<Duration> {
        self.expires_in
    }

    #[must_use]
    pub fn refresh_token(&self) -> Option<&SecretString> {
        self.refresh_token.as_ref()
    }

    #[must_use]
    pub fn scope(&self) -> Option<&str> {
        self.scope.as_deref()
    }
}

impl From<TokenResponse> for AccessToken {
    fn from(resp: TokenResponse) -> Self {
        Self {
            token: SecretString::new(resp.access_token),
            expires_in: resp.expires_in.map(Duration::from_secs),
            refresh_token: resp.refresh_token.map(SecretString::new),
            scope: resp.scope,
        }
    }
}
