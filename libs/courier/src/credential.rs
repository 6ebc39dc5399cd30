//! Credentials attached to dispatched requests.

use courier_auth::{BasicCredentials, OAuthClientConfig, SecretString};
use serde::{Deserialize, Serialize};

/// Which credential a request carries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    #[default]
    None,
    /// `Authorization: Basic <secret>` on every request.
    Basic,
    /// A token exchange precedes every request; the token is sent as
    /// `Authorization: Bearer <token>`.
    #[serde(rename = "oauth2")]
    OAuth2,
}

/// Ordered header collection with unique, case-sensitive keys.
///
/// Entries are emitted in insertion order. Inserting an existing key
/// replaces its value without moving it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderMapping {
    entries: Vec<(String, String)>,
}

impl HeaderMapping {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace `key`. Returns the previous value, if any.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => Some(std::mem::replace(existing, value)),
            None => {
                self.entries.push((key, value));
                None
            }
        }
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        let index = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(index).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Copy every entry of `other` into `self`; `other` wins on equal keys.
    pub fn extend_from(&mut self, other: &HeaderMapping) {
        for (k, v) in other.iter() {
            self.insert(k, v);
        }
    }

    #[must_use]
    pub fn to_pairs(&self) -> Vec<(String, String)> {
        self.entries.clone()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for HeaderMapping {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut mapping = Self::new();
        for (k, v) in iter {
            mapping.insert(k, v);
        }
        mapping
    }
}

/// The credential state of one dispatch.
///
/// Callers own it. The authenticated path replaces its header mapping after
/// a successful token exchange, so concurrent authenticated dispatches need
/// their own clones.
#[derive(Debug, Clone, Default)]
pub struct CredentialModel {
    mode: AuthMode,
    headers: HeaderMapping,
    basic_secret: Option<SecretString>,
    oauth2: Option<OAuthClientConfig>,
}

impl CredentialModel {
    /// No credential.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Basic mode with a pre-encoded secret, sent verbatim after `Basic `.
    #[must_use]
    pub fn basic(secret: impl Into<SecretString>) -> Self {
        Self {
            mode: AuthMode::Basic,
            basic_secret: Some(secret.into()),
            ..Self::default()
        }
    }

    /// Basic mode from a user name and password.
    #[must_use]
    pub fn basic_from_user(user: &str, password: &str) -> Self {
        Self::basic(BasicCredentials::encode(user, password))
    }

    #[must_use]
    pub fn oauth2(config: OAuthClientConfig) -> Self {
        Self {
            mode: AuthMode::OAuth2,
            oauth2: Some(config),
            ..Self::default()
        }
    }

    /// Assemble a model from its parts without checking that the secrets
    /// match the mode; the dispatcher reports a mismatch when it is used.
    #[must_use]
    pub fn from_parts(
        mode: AuthMode,
        headers: HeaderMapping,
        basic_secret: Option<SecretString>,
        oauth2: Option<OAuthClientConfig>,
    ) -> Self {
        Self {
            mode,
            headers,
            basic_secret,
            oauth2,
        }
    }

    #[must_use]
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key, value);
        self
    }

    #[must_use]
    pub fn with_headers(mut self, headers: HeaderMapping) -> Self {
        self.headers = headers;
        self
    }

    #[must_use]
    pub fn mode(&self) -> AuthMode {
        self.mode
    }

    #[must_use]
    pub fn headers(&self) -> &HeaderMapping {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMapping {
        &mut self.headers
    }

    /// Replace the header mapping wholesale.
    pub fn set_headers(&mut self, headers: HeaderMapping) {
        self.headers = headers;
    }

    #[must_use]
    pub fn basic_secret(&self) -> Option<&SecretString> {
        self.basic_secret.as_ref()
    }

    #[must_use]
    pub fn oauth2_config(&self) -> Option<&OAuthClientConfig> {
        self.oauth2.as_ref()
    }
}
